use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigureEntry {
    /// Path relative to the repository root.
    pub filename: String,
    pub suggested_caption: String,
}

/// Catalog every image and PDF under `figures/`, recursively. The caption
/// is derived from the file stem: underscores to spaces, title-cased.
pub fn catalog_figures(repo: &Path) -> Result<Vec<FigureEntry>> {
    let figures_dir = repo.join("figures");
    if !figures_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(&figures_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !matches!(extension, "png" | "pdf") {
            continue;
        }
        let relative = path.strip_prefix(repo).unwrap_or(path);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        entries.push(FigureEntry {
            filename: relative.to_string_lossy().to_string(),
            suggested_caption: caption_from_stem(stem),
        });
    }
    Ok(entries)
}

fn caption_from_stem(stem: &str) -> String {
    stem.replace('_', " ")
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_title_cases_underscored_stem() {
        assert_eq!(caption_from_stem("ssim_comparison_plot"), "Ssim Comparison Plot");
        assert_eq!(caption_from_stem("overview"), "Overview");
    }

    #[test]
    fn test_catalog_recurses_and_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("figures/nested")).unwrap();
        std::fs::write(dir.path().join("figures/a_plot.png"), b"x").unwrap();
        std::fs::write(dir.path().join("figures/nested/b_plot.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("figures/notes.txt"), b"x").unwrap();

        let catalog = catalog_figures(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.iter().all(|f| f.filename.starts_with("figures/")));
    }
}
