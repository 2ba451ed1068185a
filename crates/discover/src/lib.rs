use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use store::Store;

/// Matches returned per targeted discovery call.
const MAX_MATCHES: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetedMatch {
    pub query: String,
    pub professor: String,
    pub paper_id: i64,
    pub paper_title: String,
    pub pmid: Option<String>,
    pub score: usize,
}

/// Shared response shape for both discovery modes, so the orchestrator can
/// proceed uniformly even when a mode finds nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub professors_added: usize,
    pub papers_added: usize,
    pub breakdown_by_domain: HashMap<String, usize>,
    pub targeted_matches: Vec<TargetedMatch>,
}

/// Targeted discovery: score every known paper by the number of query
/// tokens found (case-insensitive substring) in its title or its
/// professor's name. Keeps score > 0, dedupes (query, paper) pairs, and
/// returns the top 20 sorted by score descending; ties keep first-seen
/// order (stable sort).
pub fn discover_targeted(store: &Store, queries: &[String]) -> Result<DiscoveryReport> {
    let papers = store.all_papers()?;

    let mut matches: Vec<TargetedMatch> = Vec::new();
    let mut professors_found: HashSet<i64> = HashSet::new();
    let mut papers_found: HashSet<i64> = HashSet::new();

    for query in queries {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();

        for paper in &papers {
            let title = paper.title.to_lowercase();
            let professor = paper
                .professor_name
                .as_deref()
                .unwrap_or_default()
                .to_lowercase();

            let score = terms
                .iter()
                .filter(|term| title.contains(*term) || professor.contains(*term))
                .count();
            if score == 0 {
                continue;
            }

            papers_found.insert(paper.id);
            if let Some(professor_id) = paper.professor_id {
                professors_found.insert(professor_id);
            }

            let already_recorded = matches
                .iter()
                .any(|m| m.query == *query && m.paper_id == paper.id);
            if !already_recorded {
                matches.push(TargetedMatch {
                    query: query.clone(),
                    professor: paper.professor_name.clone().unwrap_or_default(),
                    paper_id: paper.id,
                    paper_title: paper.title.clone(),
                    pmid: paper.pmid.clone(),
                    score,
                });
            }
        }
    }

    matches.sort_by_key(|m| Reverse(m.score));
    matches.truncate(MAX_MATCHES);

    debug!(
        queries = queries.len(),
        papers = papers_found.len(),
        "targeted discovery scored known papers"
    );

    Ok(DiscoveryReport {
        professors_added: professors_found.len(),
        papers_added: papers_found.len(),
        breakdown_by_domain: HashMap::new(),
        targeted_matches: matches,
    })
}

/// Broad discovery as a pluggable capability. The production search
/// integration is intentionally not guessed at; providers only have to
/// honor the response shape.
pub trait BroadSearchProvider: Send + Sync {
    fn search(&self, store: &Store, domains: &[String]) -> Result<DiscoveryReport>;
}

/// Default provider: finds nothing, returns the contract shape with zeros.
pub struct NullSearch;

impl BroadSearchProvider for NullSearch {
    fn search(&self, _store: &Store, domains: &[String]) -> Result<DiscoveryReport> {
        let breakdown = domains.iter().map(|d| (d.clone(), 0)).collect();
        Ok(DiscoveryReport {
            breakdown_by_domain: breakdown,
            ..DiscoveryReport::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::NewPaper;

    fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    fn add_paper(store: &Store, title: &str, professor: Option<(&str, &str)>) -> i64 {
        let professor_id =
            professor.map(|(name, affiliation)| store.upsert_professor(name, affiliation).unwrap());
        store
            .insert_paper(&NewPaper {
                title: title.into(),
                professor_id,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_score_counts_distinct_query_tokens() {
        let store = seeded_store();
        let strong = add_paper(&store, "Poisson Loss for Sparse Data", None);
        let weak = add_paper(&store, "Data Pipelines at Scale", None);

        let report =
            discover_targeted(&store, &["Poisson loss sparse data".to_string()]).unwrap();

        assert_eq!(report.papers_added, 2);
        assert_eq!(report.targeted_matches[0].paper_id, strong);
        assert_eq!(report.targeted_matches[0].score, 4);
        assert_eq!(report.targeted_matches[1].paper_id, weak);
        assert_eq!(report.targeted_matches[1].score, 1);
    }

    #[test]
    fn test_professor_name_matches_count() {
        let store = seeded_store();
        add_paper(&store, "Unrelated Title", Some(("Yuankai Huo", "Vanderbilt University")));

        let report = discover_targeted(&store, &["huo imaging".to_string()]).unwrap();
        assert_eq!(report.papers_added, 1);
        assert_eq!(report.professors_added, 1);
        assert_eq!(report.targeted_matches[0].score, 1);
    }

    #[test]
    fn test_zero_score_papers_excluded() {
        let store = seeded_store();
        add_paper(&store, "Completely Unrelated", None);

        let report = discover_targeted(&store, &["poisson".to_string()]).unwrap();
        assert_eq!(report.papers_added, 0);
        assert!(report.targeted_matches.is_empty());
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let store = seeded_store();
        let first = add_paper(&store, "Poisson Models A", None);
        let second = add_paper(&store, "Poisson Models B", None);

        let report = discover_targeted(&store, &["poisson".to_string()]).unwrap();
        assert_eq!(report.targeted_matches[0].paper_id, first);
        assert_eq!(report.targeted_matches[1].paper_id, second);
    }

    #[test]
    fn test_matches_capped_at_twenty() {
        let store = seeded_store();
        for i in 0..25 {
            add_paper(&store, &format!("Poisson Study {i}"), None);
        }
        let report = discover_targeted(&store, &["poisson".to_string()]).unwrap();
        assert_eq!(report.targeted_matches.len(), 20);
        assert_eq!(report.papers_added, 25);
    }

    #[test]
    fn test_null_broad_search_keeps_contract_shape() {
        let store = seeded_store();
        let report = NullSearch
            .search(&store, &["deep-learning".to_string()])
            .unwrap();
        assert_eq!(report.professors_added, 0);
        assert_eq!(report.papers_added, 0);
        assert_eq!(report.breakdown_by_domain.get("deep-learning"), Some(&0));
    }
}
