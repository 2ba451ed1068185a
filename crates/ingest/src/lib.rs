pub mod csv;
pub mod figures;

pub use csv::CsvTable;
pub use figures::FigureEntry;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::warn;

/// Column-name tokens treated as reportable metrics.
const METRIC_PATTERNS: &[&str] = &["SSIM", "PCC", "MSE", "MAE", "RMSE", "R2", "Accuracy", "F1"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFinding {
    pub claim: String,
    pub stat: String,
    pub details: serde_json::Value,
    pub source: String,
    pub constraint: String,
}

/// Structured ingestion result. The constraints are prose rules that later
/// generated sections must not contradict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub key_findings: Vec<KeyFinding>,
    pub figures_catalog: Vec<FigureEntry>,
    pub constraints: Vec<String>,
}

/// Parse every CSV under `tables/` and catalog every figure under
/// `figures/`. A malformed CSV is skipped with a warning; it never aborts
/// the remaining files.
pub fn ingest_results_data(repo_path: &str) -> Result<IngestReport> {
    let repo = Path::new(repo_path);
    let mut key_findings = Vec::new();
    let mut constraints = Vec::new();

    let tables_dir = repo.join("tables");
    if tables_dir.is_dir() {
        let mut csv_paths: Vec<_> = std::fs::read_dir(&tables_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("csv"))
            .collect();
        csv_paths.sort();

        for path in csv_paths {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            match csv::CsvTable::read(&path) {
                Ok(table) => {
                    ingest_table(&table, &file_name, &mut key_findings, &mut constraints);
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "skipping malformed CSV");
                    continue;
                }
            }
        }
    }

    let figures_catalog = figures::catalog_figures(repo)?;
    if !figures_catalog.is_empty() {
        constraints.push(format!(
            "Must use figures from figures/ directory: {} figures available",
            figures_catalog.len()
        ));
    }

    Ok(IngestReport {
        key_findings,
        figures_catalog,
        constraints,
    })
}

fn ingest_table(
    table: &CsvTable,
    file_name: &str,
    key_findings: &mut Vec<KeyFinding>,
    constraints: &mut Vec<String>,
) {
    // Metric columns: one summary finding per matching column.
    for pattern in METRIC_PATTERNS {
        for column in table.columns_containing(pattern) {
            let values = table.numeric_column(&column);
            if values.is_empty() {
                continue;
            }
            let summary = ColumnSummary::from_values(&values);
            key_findings.push(KeyFinding {
                claim: format!("Mean {}: {:.3} (\u{b1}{:.3})", column, summary.mean, summary.std),
                stat: format!("{} = {:.3}", column, summary.mean),
                details: json!({
                    "mean": summary.mean,
                    "median": summary.median,
                    "std": summary.std,
                    "min": summary.min,
                    "max": summary.max,
                }),
                source: format!("tables/{file_name}"),
                constraint: format!("Must cite exact values from {file_name}"),
            });
        }
    }

    // Comparison columns: win rate = fraction of rows with a positive value.
    for column in table.delta_columns() {
        let total_count = table.row_count();
        if total_count == 0 {
            continue;
        }
        let positive_count = table
            .numeric_column(&column)
            .iter()
            .filter(|v| **v > 0.0)
            .count();
        let percentage = (positive_count as f64 / total_count as f64) * 100.0;
        key_findings.push(KeyFinding {
            claim: format!(
                "{column} positive in {positive_count}/{total_count} cases ({percentage:.1}%)"
            ),
            stat: format!("{column} wins = {percentage:.1}%"),
            details: json!({
                "positive_count": positive_count,
                "total_count": total_count,
                "percentage": percentage,
            }),
            source: format!("tables/{file_name}"),
            constraint: format!("Win rate must match {file_name}"),
        });
    }

    constraints.push(format!("All values must match {file_name} exactly"));

    // A Gene column restricts later citations to its identifier set.
    if let Some(genes) = table.distinct_values("Gene") {
        constraints.push(format!(
            "Gene names limited to those in {file_name}: {} genes",
            genes.len()
        ));
    }
}

struct ColumnSummary {
    mean: f64,
    median: f64,
    std: f64,
    min: f64,
    max: f64,
}

impl ColumnSummary {
    fn from_values(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        // Sample standard deviation; a single observation has no spread.
        let std = if values.len() > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };

        Self {
            mean,
            median,
            std,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn repo_with_table(csv: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tables")).unwrap();
        fs::write(dir.path().join("tables/results.csv"), csv).unwrap();
        dir
    }

    #[test]
    fn test_metric_column_summary() {
        let repo = repo_with_table("Gene,SSIM_Poisson\nA,0.2\nB,0.4\nC,0.6\n");
        let report = ingest_results_data(repo.path().to_str().unwrap()).unwrap();

        let finding = report
            .key_findings
            .iter()
            .find(|f| f.stat.starts_with("SSIM_Poisson ="))
            .expect("metric finding");
        assert_eq!(finding.details["mean"].as_f64().unwrap(), 0.4);
        assert_eq!(finding.details["median"].as_f64().unwrap(), 0.4);
        assert_eq!(finding.source, "tables/results.csv");
        assert!(finding.constraint.contains("exact values"));
    }

    #[test]
    fn test_delta_win_rate_is_75_percent() {
        let repo = repo_with_table("Gene,Delta_SSIM\nA,0.1\nB,0.2\nC,0.3\nD,-0.1\n");
        let report = ingest_results_data(repo.path().to_str().unwrap()).unwrap();

        let finding = report
            .key_findings
            .iter()
            .find(|f| f.stat.contains("wins"))
            .expect("win-rate finding");
        assert_eq!(finding.stat, "Delta_SSIM wins = 75.0%");
        assert_eq!(finding.details["positive_count"], 3);
        assert_eq!(finding.details["total_count"], 4);
        assert_eq!(finding.details["percentage"].as_f64().unwrap(), 75.0);
    }

    #[test]
    fn test_gene_constraint_counts_distinct_ids() {
        let repo = repo_with_table("Gene,MSE\nTSPAN8,0.1\nTSPAN8,0.2\nOLFM4,0.3\n");
        let report = ingest_results_data(repo.path().to_str().unwrap()).unwrap();
        assert!(
            report
                .constraints
                .iter()
                .any(|c| c.contains("2 genes"))
        );
    }

    #[test]
    fn test_malformed_csv_is_skipped_not_fatal() {
        let repo = repo_with_table("Gene,SSIM\nA,0.5\n");
        // Second file has a ragged row and must not abort the batch.
        fs::write(
            repo.path().join("tables/broken.csv"),
            "Gene,SSIM\nA,0.5,extra,fields\n",
        )
        .unwrap();

        let report = ingest_results_data(repo.path().to_str().unwrap()).unwrap();
        assert!(
            report
                .key_findings
                .iter()
                .any(|f| f.source == "tables/results.csv")
        );
        assert!(report.key_findings.iter().all(|f| f.source != "tables/broken.csv"));
    }

    #[test]
    fn test_figure_catalog_and_constraint() {
        let repo = repo_with_table("Gene,SSIM\nA,0.5\n");
        fs::create_dir_all(repo.path().join("figures/supplement")).unwrap();
        fs::write(repo.path().join("figures/main_result.png"), b"png").unwrap();
        fs::write(repo.path().join("figures/supplement/extra_panel.pdf"), b"pdf").unwrap();

        let report = ingest_results_data(repo.path().to_str().unwrap()).unwrap();
        assert_eq!(report.figures_catalog.len(), 2);
        assert!(
            report
                .figures_catalog
                .iter()
                .any(|f| f.suggested_caption == "Main Result")
        );
        assert!(report.constraints.iter().any(|c| c.contains("2 figures")));
    }

    #[test]
    fn test_no_tables_dir_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = ingest_results_data(dir.path().to_str().unwrap()).unwrap();
        assert!(report.key_findings.is_empty());
        assert!(report.constraints.is_empty());
    }
}
