use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;

use extract::NOT_EXTRACTED_SENTINEL;

/// Rendering caps for the one-page synthesis.
const MAX_KEY_FINDINGS: usize = 4;
const MAX_METHODS: usize = 3;
const MAX_STATS_PER_METHOD: usize = 2;
const MAX_TOP_PAPERS: usize = 5;
const MAX_CHARACTERISTICS: usize = 2;

/// One paper's extraction, flattened for aggregation. The level fields hold
/// whatever the store persisted; an empty object means the level was not
/// extracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSummary {
    pub paper_id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub pmid: Option<String>,
    pub high_level: Value,
    pub mid_level: Value,
    pub low_level: Value,
}

/// Synthesis as an abstract capability; the template renderer is one
/// swappable provider.
pub trait DomainWriter: Send + Sync {
    fn synthesize(&self, domain: &str, papers: &[PaperSummary]) -> String;
}

/// Heuristic provider: deterministic template aggregation over extractions.
pub struct TemplateSynthesizer;

impl DomainWriter for TemplateSynthesizer {
    fn synthesize(&self, domain: &str, papers: &[PaperSummary]) -> String {
        synthesize_single_domain(domain, papers)
    }
}

/// Generate the one-page markdown synthesis for a domain. Deterministic for
/// a given input set, and never fails: an empty paper list produces the
/// placeholder document with the same section headers.
pub fn synthesize_single_domain(domain: &str, papers: &[PaperSummary]) -> String {
    if papers.is_empty() {
        return empty_synthesis(domain);
    }

    let key_findings = extract_key_findings(papers);
    let approaches = extract_statistical_approaches(papers);
    let insight = cross_field_insight(domain, papers);
    let top_papers = top_papers_list(papers);

    build_markdown(domain, &key_findings, &approaches, &insight, &top_papers)
}

fn extract_key_findings(papers: &[PaperSummary]) -> Vec<String> {
    let mut findings = Vec::new();

    for paper in papers {
        let pmid = paper.pmid.as_deref().unwrap_or("N/A");
        let year = paper
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        if let Some(contribution) = paper.high_level.get("contribution").and_then(Value::as_str) {
            if !contribution.is_empty() && contribution != NOT_EXTRACTED_SENTINEL {
                findings.push(format!("{contribution} (PMID: {pmid}, {year})"));
            }
        }

        if let Some(stat) = paper
            .mid_level
            .get("stats")
            .and_then(Value::as_array)
            .and_then(|stats| stats.first())
        {
            let metric = stat.get("metric").and_then(Value::as_str).unwrap_or("Unknown");
            let value = render_value(stat.get("value"));
            let page = stat.get("page").and_then(Value::as_str).unwrap_or("N/A");
            findings.push(format!("Achieved {metric} of {value} (PMID: {pmid}, p.{page})"));
        }
    }

    findings.truncate(MAX_KEY_FINDINGS);
    findings
}

#[derive(Debug)]
struct Approach {
    name: String,
    parameters: serde_json::Map<String, Value>,
    stats: Vec<Value>,
    pmids: Vec<String>,
}

/// Group stats by method name. The first method listed per paper is the
/// attribution target for that paper's stats; parameter maps merge across
/// papers with later values overwriting on key collision.
fn extract_statistical_approaches(papers: &[PaperSummary]) -> Vec<Approach> {
    let mut approaches: Vec<Approach> = Vec::new();

    for paper in papers {
        let pmid = paper.pmid.as_deref().unwrap_or("N/A");
        let methods = paper
            .mid_level
            .get("methods")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let stats = paper
            .mid_level
            .get("stats")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for method in &methods {
            let name = method
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();

            let entry = match approaches.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing,
                None => {
                    approaches.push(Approach {
                        name: name.clone(),
                        parameters: serde_json::Map::new(),
                        stats: Vec::new(),
                        pmids: Vec::new(),
                    });
                    approaches.last_mut().expect("just pushed")
                }
            };

            if let Some(params) = method.get("parameters").and_then(Value::as_object) {
                for (key, value) in params {
                    entry.parameters.insert(key.clone(), value.clone());
                }
            }
            if !entry.pmids.iter().any(|p| p == pmid) {
                entry.pmids.push(pmid.to_string());
            }
        }

        if let Some(first_method) = methods.first() {
            let first_name = first_method
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            if let Some(entry) = approaches.iter_mut().find(|a| a.name == first_name) {
                entry.stats.extend(stats);
            }
        }
    }

    approaches.truncate(MAX_METHODS);
    approaches
}

/// Map stat metric names of the first three papers onto fixed domain
/// characteristics, then render the fixed transfer-insight template.
fn cross_field_insight(domain: &str, papers: &[PaperSummary]) -> String {
    let mut characteristics: Vec<&str> = Vec::new();

    for paper in papers.iter().take(3) {
        let stats = paper
            .mid_level
            .get("stats")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for stat in &stats {
            let metric = stat
                .get("metric")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            if metric.contains("sparse") || metric.contains("sparsity") {
                push_unique(&mut characteristics, "sparse data");
            }
            if metric.contains("overdispers") {
                push_unique(&mut characteristics, "overdispersion");
            }
        }
    }

    if characteristics.is_empty() {
        characteristics.push("statistical modeling");
    }
    characteristics.truncate(MAX_CHARACTERISTICS);

    format!(
        "**Similarity**: {domain} exhibits {}, which is common in other domains with similar data structures.\n\
         \n\
         **Transferable**:\n\
         - Statistical methods and loss functions developed for {domain}\n\
         - Parameter estimation approaches\n\
         - Validation strategies\n\
         \n\
         **Expected Impact**: Methods showing 15-30% improvement in {domain} may transfer to domains with similar statistical properties.",
        characteristics.join(", ")
    )
}

fn push_unique<'a>(list: &mut Vec<&'a str>, item: &'a str) {
    if !list.contains(&item) {
        list.push(item);
    }
}

struct RankedPaper {
    title: String,
    year: String,
    pmid: String,
    contribution: String,
}

/// Every paper ranked by year descending; an absent year sorts as 0
/// (oldest). Stable, so equal years keep input order.
fn top_papers_list(papers: &[PaperSummary]) -> Vec<RankedPaper> {
    let mut ranked: Vec<(i64, RankedPaper)> = papers
        .iter()
        .map(|paper| {
            let year = paper.year.unwrap_or(0);
            let contribution = paper
                .high_level
                .get("contribution")
                .and_then(Value::as_str)
                .unwrap_or("N/A")
                .to_string();
            (
                year,
                RankedPaper {
                    title: paper.title.clone(),
                    year: paper
                        .year
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "N/A".to_string()),
                    pmid: paper.pmid.clone().unwrap_or_else(|| "N/A".to_string()),
                    contribution,
                },
            )
        })
        .collect();

    ranked.sort_by_key(|(year, _)| Reverse(*year));
    ranked.truncate(MAX_TOP_PAPERS);
    ranked.into_iter().map(|(_, paper)| paper).collect()
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "N/A".to_string(),
    }
}

fn domain_title(domain: &str) -> String {
    domain
        .replace('-', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_markdown(
    domain: &str,
    key_findings: &[String],
    approaches: &[Approach],
    insight: &str,
    top_papers: &[RankedPaper],
) -> String {
    let mut doc = format!("# {}: Domain Synthesis\n\n", domain_title(domain));

    doc.push_str("## Key Findings\n\n");
    if key_findings.is_empty() {
        doc.push_str("- No key findings extracted\n");
    } else {
        for finding in key_findings {
            doc.push_str(&format!("- {finding}\n"));
        }
    }
    doc.push('\n');

    doc.push_str("## Statistical Approaches\n\n");
    if approaches.is_empty() {
        doc.push_str("No statistical approaches extracted\n\n");
    } else {
        for (index, approach) in approaches.iter().enumerate() {
            doc.push_str(&format!("{}. **{}**\n", index + 1, approach.name));
            if !approach.parameters.is_empty() {
                let params = approach
                    .parameters
                    .iter()
                    .map(|(k, v)| format!("{k}={}", render_value(Some(v))))
                    .collect::<Vec<_>>()
                    .join(", ");
                doc.push_str(&format!("   - Parameters: {params}\n"));
            }
            for stat in approach.stats.iter().take(MAX_STATS_PER_METHOD) {
                let metric = stat.get("metric").and_then(Value::as_str).unwrap_or("Unknown");
                let value = render_value(stat.get("value"));
                let page = stat.get("page").and_then(Value::as_str).unwrap_or("N/A");
                doc.push_str(&format!("   - **Key stat**: {metric} = {value} (p.{page})\n"));
            }
            if !approach.pmids.is_empty() {
                doc.push_str(&format!("   - References: PMIDs {}\n", approach.pmids.join(", ")));
            }
            doc.push('\n');
        }
    }

    doc.push_str("## Cross-Field Transfer\n\n");
    doc.push_str(insight);
    doc.push_str("\n\n");

    doc.push_str("## Top Papers\n\n");
    if top_papers.is_empty() {
        doc.push_str("No papers available\n\n");
    } else {
        for (index, paper) in top_papers.iter().enumerate() {
            doc.push_str(&format!("{}. **{}** ({})\n", index + 1, paper.title, paper.year));
            doc.push_str(&format!("   - PMID: {}\n", paper.pmid));
            if paper.contribution != "N/A" && paper.contribution != NOT_EXTRACTED_SENTINEL {
                doc.push_str(&format!("   - {}\n", paper.contribution));
            }
            doc.push('\n');
        }
    }

    doc.push_str("---\n\n*Generated by the rule-based domain synthesizer.*\n");
    doc
}

fn empty_synthesis(domain: &str) -> String {
    format!(
        "# {}: Domain Synthesis\n\
         \n\
         ## Key Findings\n\
         \n\
         No papers available for this domain.\n\
         \n\
         ## Statistical Approaches\n\
         \n\
         No statistical approaches extracted.\n\
         \n\
         ## Cross-Field Transfer\n\
         \n\
         No cross-field insights available.\n\
         \n\
         ## Top Papers\n\
         \n\
         No papers available.\n\
         \n\
         ---\n\
         \n\
         *Generated by the rule-based domain synthesizer.*\n",
        domain_title(domain)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(id: i64, title: &str, year: Option<i64>, pmid: &str) -> PaperSummary {
        PaperSummary {
            paper_id: id,
            title: title.to_string(),
            year,
            pmid: Some(pmid.to_string()),
            high_level: json!({
                "main_claim": title,
                "novelty": "First sentence.",
                "contribution": format!("We propose method {id}"),
            }),
            mid_level: json!({
                "stats": [
                    {"type": "performance", "metric": "SSIM", "value": 0.6, "page": "abstract"},
                    {"type": "performance", "metric": "PCC", "value": 0.4, "page": "abstract"},
                    {"type": "performance", "metric": "MSE", "value": 0.2, "page": "abstract"},
                ],
                "methods": [
                    {"name": "Poisson", "parameters": {"lambda": 1.0}, "page": "abstract"},
                ],
            }),
            low_level: json!({"quotes": []}),
        }
    }

    #[test]
    fn test_empty_domain_has_all_headers_and_no_data_bodies() {
        let doc = synthesize_single_domain("spatial-transcriptomics", &[]);
        assert!(doc.starts_with("# Spatial Transcriptomics: Domain Synthesis"));
        assert!(doc.contains("## Key Findings"));
        assert!(doc.contains("## Statistical Approaches"));
        assert!(doc.contains("## Cross-Field Transfer"));
        assert!(doc.contains("## Top Papers"));
        assert!(doc.contains("No papers available for this domain."));
        assert!(doc.contains("No statistical approaches extracted."));
    }

    #[test]
    fn test_key_findings_capped_at_four_overall() {
        let papers = vec![
            summary(1, "Paper One", Some(2022), "p1"),
            summary(2, "Paper Two", Some(2023), "p2"),
            summary(3, "Paper Three", Some(2024), "p3"),
        ];
        let doc = synthesize_single_domain("loss-functions", &papers);

        // Each paper contributes a contribution finding plus a stat finding,
        // truncated to four in first-come order.
        assert!(doc.contains("We propose method 1 (PMID: p1, 2022)"));
        assert!(doc.contains("Achieved SSIM of 0.6 (PMID: p1, p.abstract)"));
        assert!(doc.contains("We propose method 2 (PMID: p2, 2023)"));
        assert!(doc.contains("Achieved SSIM of 0.6 (PMID: p2, p.abstract)"));
        assert!(!doc.contains("We propose method 3 (PMID: p3, 2024)"));
    }

    #[test]
    fn test_stats_rendered_per_method_capped_at_two() {
        let papers = vec![summary(1, "Paper One", Some(2022), "p1")];
        let doc = synthesize_single_domain("loss-functions", &papers);
        assert!(doc.contains("**Key stat**: SSIM = 0.6"));
        assert!(doc.contains("**Key stat**: PCC = 0.4"));
        assert!(!doc.contains("**Key stat**: MSE"));
    }

    #[test]
    fn test_parameter_merge_last_writer_wins() {
        let mut first = summary(1, "A", Some(2020), "p1");
        first.mid_level = json!({
            "stats": [],
            "methods": [{"name": "Poisson", "parameters": {"lambda": 1.0}, "page": "abstract"}],
        });
        let mut second = summary(2, "B", Some(2021), "p2");
        second.mid_level = json!({
            "stats": [],
            "methods": [{"name": "Poisson", "parameters": {"lambda": 2.0, "eps": 0.1}, "page": "abstract"}],
        });

        let doc = synthesize_single_domain("loss-functions", &[first, second]);
        assert!(doc.contains("lambda=2"));
        assert!(doc.contains("eps=0.1"));
        assert!(doc.contains("References: PMIDs p1, p2"));
    }

    #[test]
    fn test_top_papers_sorted_by_year_descending_missing_year_last() {
        let papers = vec![
            summary(1, "Old Paper", Some(2018), "p1"),
            summary(2, "Undated Paper", None, "p2"),
            summary(3, "New Paper", Some(2024), "p3"),
        ];
        let doc = synthesize_single_domain("loss-functions", &papers);

        let new_pos = doc.find("New Paper").unwrap();
        let old_pos = doc.find("Old Paper").unwrap();
        let undated_pos = doc.find("Undated Paper").unwrap();
        assert!(new_pos < old_pos);
        assert!(old_pos < undated_pos);
    }

    #[test]
    fn test_cross_field_characteristics_from_metric_names() {
        let mut paper = summary(1, "A", Some(2020), "p1");
        paper.mid_level = json!({
            "stats": [
                {"type": "performance", "metric": "sparsity_index", "value": 0.9, "page": "abstract"},
                {"type": "performance", "metric": "overdispersion_ratio", "value": 1.2, "page": "abstract"},
            ],
            "methods": [],
        });
        let doc = synthesize_single_domain("spatial-transcriptomics", &[paper]);
        assert!(doc.contains("exhibits sparse data, overdispersion"));
    }

    #[test]
    fn test_cross_field_fallback_label() {
        let mut paper = summary(1, "A", Some(2020), "p1");
        paper.mid_level = json!({"stats": [], "methods": []});
        let doc = synthesize_single_domain("deep-learning", &[paper]);
        assert!(doc.contains("exhibits statistical modeling"));
    }

    #[test]
    fn test_sentinel_contribution_excluded_from_findings() {
        let mut paper = summary(1, "A", Some(2020), "p1");
        paper.high_level = json!({
            "main_claim": "A",
            "novelty": "N.",
            "contribution": NOT_EXTRACTED_SENTINEL,
        });
        paper.mid_level = json!({"stats": [], "methods": []});
        let doc = synthesize_single_domain("deep-learning", &[paper]);
        assert!(doc.contains("- No key findings extracted"));
    }

    #[test]
    fn test_empty_extraction_objects_do_not_panic() {
        let paper = PaperSummary {
            paper_id: 1,
            title: "Bare".into(),
            year: None,
            pmid: None,
            high_level: json!({}),
            mid_level: json!({}),
            low_level: json!({}),
        };
        let doc = synthesize_single_domain("deep-learning", &[paper]);
        assert!(doc.contains("## Top Papers"));
        assert!(doc.contains("**Bare** (N/A)"));
    }
}
