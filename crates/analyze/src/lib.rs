use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use store::RunMode;

/// Ordered domain -> keyword map. Declaration order decides the order of
/// detected domains on the run.
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("spatial-transcriptomics", &["spatial transcriptomics", "visium"]),
    ("loss-functions", &["loss function", "mse", "poisson"]),
    ("deep-learning", &["deep learning", "neural network"]),
    ("computational-pathology", &["pathology", "histology"]),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStructure {
    pub has_results: bool,
    pub tables: Vec<String>,
    pub figures: Vec<String>,
    pub readme_exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoAnalysis {
    pub detected_mode: RunMode,
    pub repo_structure: RepoStructure,
    pub detected_domains: Vec<String>,
}

/// Classify a repository into an operating mode and candidate domains.
///
/// `primary_research` requires a `tables/` directory with at least one CSV
/// and a `figures/` directory; anything else is `review`. A missing README
/// or missing data directories is a negative result, not an error; only a
/// nonexistent repository path fails.
pub fn analyze_repository(repo_path: &str) -> Result<RepoAnalysis> {
    let repo = Path::new(repo_path);
    if !repo.is_dir() {
        anyhow::bail!("repository path does not exist: {repo_path}");
    }

    let tables_dir = repo.join("tables");
    let figures_dir = repo.join("figures");
    let readme = repo.join("README.md");

    let tables = list_files_with_extension(&tables_dir, "csv")?;
    let figures = list_files_with_extension(&figures_dir, "png")?;

    let has_results = tables_dir.is_dir() && figures_dir.is_dir() && !tables.is_empty();
    let detected_mode = if has_results {
        RunMode::PrimaryResearch
    } else {
        RunMode::Review
    };

    let readme_exists = readme.is_file();
    let detected_domains = if readme_exists {
        let text = fs::read_to_string(&readme)
            .with_context(|| format!("failed to read {}", readme.display()))?
            .to_lowercase();
        detect_domains(&text)
    } else {
        Vec::new()
    };

    Ok(RepoAnalysis {
        detected_mode,
        repo_structure: RepoStructure {
            has_results,
            tables,
            figures,
            readme_exists,
        },
        detected_domains,
    })
}

fn detect_domains(readme_lower: &str) -> Vec<String> {
    DOMAIN_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| readme_lower.contains(kw)))
        .map(|(domain, _)| domain.to_string())
        .collect()
}

/// Non-recursive listing, matching the shallow glob of the analyzer.
fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
