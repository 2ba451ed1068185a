use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Sentinel when a paper carries no abstract.
pub const NO_ABSTRACT_SENTINEL: &str = "No abstract available";
/// Sentinel when no sentence matches the contribution vocabulary.
pub const NOT_EXTRACTED_SENTINEL: &str = "Not extracted";

/// How deep a single extraction reaches. Strictly ordered filter:
/// `HighOnly` populates only the high level, `Mid` adds the mid level,
/// `Full` populates all four fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionDepth {
    HighOnly,
    Mid,
    Full,
}

impl ExtractionDepth {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high_only" => Some(ExtractionDepth::HighOnly),
            "mid" => Some(ExtractionDepth::Mid),
            "full" => Some(ExtractionDepth::Full),
            _ => None,
        }
    }

    pub fn includes_mid(&self) -> bool {
        *self >= ExtractionDepth::Mid
    }

    pub fn includes_full(&self) -> bool {
        *self >= ExtractionDepth::Full
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighLevel {
    pub main_claim: String,
    pub novelty: String,
    pub contribution: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatRecord {
    #[serde(rename = "type")]
    pub stat_type: String,
    pub metric: String,
    /// Number when coercible, otherwise the raw matched string.
    pub value: Value,
    pub context: String,
    pub page: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodRecord {
    pub name: String,
    pub parameters: serde_json::Map<String, Value>,
    pub page: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MidLevel {
    pub stats: Vec<StatRecord>,
    pub methods: Vec<MethodRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub text: String,
    pub page: String,
    pub section: String,
    pub context: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LowLevel {
    pub quotes: Vec<QuoteRecord>,
}

/// Algorithmic detail requires full-text structural parsing, which is an
/// external capability; the rule-based provider always emits empty lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeMethods {
    pub algorithms: Vec<Value>,
    pub equations: Vec<Value>,
    pub hyperparameters: Vec<Value>,
}

/// Four-level extraction as persisted. A level outside the requested depth
/// is the empty JSON object, never null and never partially populated, so
/// readers never branch on key presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchicalExtraction {
    pub high_level: Value,
    pub mid_level: Value,
    pub low_level: Value,
    pub code_methods: Value,
}

impl HierarchicalExtraction {
    pub fn empty() -> Self {
        Self {
            high_level: json!({}),
            mid_level: json!({}),
            low_level: json!({}),
            code_methods: json!({}),
        }
    }
}
