pub mod schema;
pub mod text;

pub use schema::{
    CodeMethods, ExtractionDepth, HierarchicalExtraction, HighLevel, LowLevel, MethodRecord,
    MidLevel, QuoteRecord, StatRecord, NO_ABSTRACT_SENTINEL, NOT_EXTRACTED_SENTINEL,
};

use regex::Regex;
use serde_json::{Value, json};

/// Sentences with one of these verbs become the contribution claim.
const CONTRIBUTION_VERBS: &[&str] = &["propose", "develop", "demonstrate", "show", "achieve", "improve"];
/// Sentences with one of these verbs become verbatim quotes.
const QUOTE_VERBS: &[&str] = &["demonstrate", "show", "prove", "found", "discovered", "achieved"];
/// Capitalized tokens that are sentence furniture, not method names.
const METHOD_STOPWORDS: &[&str] = &["The", "This", "We", "Our", "Results", "Methods", "Figure", "Table"];

/// Read-only paper content handed to an analyzer.
#[derive(Debug, Clone)]
pub struct PaperInput {
    pub title: String,
    pub abstract_text: String,
}

/// Extraction as an abstract capability, so the heuristic provider can be
/// swapped for a semantic service without touching the orchestrator.
pub trait PaperAnalyzer: Send + Sync {
    fn extract(&self, paper: &PaperInput, depth: ExtractionDepth) -> HierarchicalExtraction;
    fn model_name(&self) -> &str;
}

/// Heuristic provider: regex pattern matching over title and abstract.
pub struct RuleBasedExtractor {
    first_sentence: Regex,
    equality_stat: Regex,
    percent_stat: Regex,
    p_value: Regex,
    capitalized_term: Regex,
}

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self {
            first_sentence: Regex::new(r"(?s)^(.*?[.!?])").unwrap(),
            // "accuracy = 0.95", "AUC: 92%"
            equality_stat: Regex::new(r"(?i)(\w+)\s*[=:]\s*([\d.]+%?)").unwrap(),
            // "95% accuracy"
            percent_stat: Regex::new(r"([\d.]+%)\s*([A-Za-z]\w*)").unwrap(),
            // "p < 0.05", "p = 1e-4"
            p_value: Regex::new(r"(?i)\bp\s*[<>=]\s*([\d.e-]+)").unwrap(),
            capitalized_term: Regex::new(r"[A-Z][A-Za-z]*(?:-[A-Z][A-Za-z]*)*").unwrap(),
        }
    }
}

impl Default for RuleBasedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperAnalyzer for RuleBasedExtractor {
    fn extract(&self, paper: &PaperInput, depth: ExtractionDepth) -> HierarchicalExtraction {
        let mut extraction = HierarchicalExtraction::empty();

        extraction.high_level = serde_json::to_value(self.extract_high_level(paper))
            .unwrap_or_else(|_| json!({}));

        if depth.includes_mid() {
            extraction.mid_level = serde_json::to_value(self.extract_mid_level(&paper.abstract_text))
                .unwrap_or_else(|_| json!({}));
        }

        if depth.includes_full() {
            extraction.low_level = serde_json::to_value(self.extract_low_level(&paper.abstract_text))
                .unwrap_or_else(|_| json!({}));
            extraction.code_methods =
                serde_json::to_value(CodeMethods::default()).unwrap_or_else(|_| json!({}));
        }

        extraction
    }

    fn model_name(&self) -> &str {
        "rule-based"
    }
}

impl RuleBasedExtractor {
    fn extract_high_level(&self, paper: &PaperInput) -> HighLevel {
        let abstract_text = paper.abstract_text.trim();

        let novelty = if abstract_text.is_empty() {
            NO_ABSTRACT_SENTINEL.to_string()
        } else {
            self.first_sentence
                .captures(abstract_text)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_else(|| NO_ABSTRACT_SENTINEL.to_string())
        };

        let contribution = abstract_text
            .split(['.', '!', '?'])
            .find(|sentence| {
                let lower = sentence.to_lowercase();
                CONTRIBUTION_VERBS.iter().any(|verb| lower.contains(verb))
            })
            .map(|sentence| sentence.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NOT_EXTRACTED_SENTINEL.to_string());

        HighLevel {
            main_claim: paper.title.trim().to_string(),
            novelty,
            contribution,
        }
    }

    fn extract_mid_level(&self, abstract_text: &str) -> MidLevel {
        let mut stats = Vec::new();

        for captures in self.equality_stat.captures_iter(abstract_text) {
            stats.push(StatRecord {
                stat_type: "performance".to_string(),
                metric: captures[1].to_string(),
                value: coerce_numeric(&captures[2]),
                context: captures[0].to_string(),
                page: "abstract".to_string(),
            });
        }

        for captures in self.percent_stat.captures_iter(abstract_text) {
            stats.push(StatRecord {
                stat_type: "performance".to_string(),
                metric: captures[2].to_string(),
                value: coerce_numeric(&captures[1]),
                context: captures[0].to_string(),
                page: "abstract".to_string(),
            });
        }

        for captures in self.p_value.captures_iter(abstract_text) {
            stats.push(StatRecord {
                stat_type: "p-value".to_string(),
                metric: "statistical significance".to_string(),
                value: coerce_numeric(&captures[1]),
                context: captures[0].to_string(),
                page: "abstract".to_string(),
            });
        }

        // Capitalized technical terms, skipping sentence-initial words and
        // the stopword list; first occurrence of a surface form wins.
        let mut methods: Vec<MethodRecord> = Vec::new();
        let bytes = abstract_text.as_bytes();
        for m in self.capitalized_term.find_iter(abstract_text) {
            let start = m.start();
            if start == 0 {
                continue;
            }
            if start >= 2 && bytes[start - 2] == b'.' && bytes[start - 1].is_ascii_whitespace() {
                continue;
            }
            let name = m.as_str();
            if METHOD_STOPWORDS.contains(&name) {
                continue;
            }
            if methods.iter().any(|existing| existing.name == name) {
                continue;
            }
            methods.push(MethodRecord {
                name: name.to_string(),
                parameters: serde_json::Map::new(),
                page: "abstract".to_string(),
            });
        }

        MidLevel { stats, methods }
    }

    fn extract_low_level(&self, abstract_text: &str) -> LowLevel {
        let quotes = text::split_sentences(abstract_text)
            .into_iter()
            .enumerate()
            .filter(|(_, sentence)| {
                let lower = sentence.to_lowercase();
                QUOTE_VERBS.iter().any(|verb| lower.contains(verb))
            })
            .map(|(index, sentence)| QuoteRecord {
                text: sentence.trim().to_string(),
                page: "abstract".to_string(),
                section: "Abstract".to_string(),
                context: format!("Sentence {} of abstract", index + 1),
            })
            .collect();

        LowLevel { quotes }
    }
}

/// Best-effort numeric coercion: strips a trailing `%` and parses as f64,
/// falling back to the raw matched string.
fn coerce_numeric(raw: &str) -> Value {
    let stripped = raw.strip_suffix('%').unwrap_or(raw);
    match stripped.parse::<f64>() {
        Ok(number) => json!(number),
        Err(_) => json!(raw),
    }
}
