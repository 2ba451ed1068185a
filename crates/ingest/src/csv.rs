use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Minimal comma-separated table. Experimental outputs are plain numeric
/// grids, so a full CSV dialect (quoting, embedded separators) is not
/// needed; a ragged or headerless file is rejected as malformed.
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());
        let header_line = lines.next().context("empty CSV file")?;
        let headers: Vec<String> = header_line.split(',').map(|h| h.trim().to_string()).collect();
        if headers.iter().all(|h| h.is_empty()) {
            anyhow::bail!("CSV header row is empty");
        }

        let mut rows = Vec::new();
        for (index, line) in lines.enumerate() {
            let fields: Vec<String> = line.split(',').map(|f| f.trim().to_string()).collect();
            if fields.len() != headers.len() {
                anyhow::bail!(
                    "row {} has {} fields, expected {}",
                    index + 2,
                    fields.len(),
                    headers.len()
                );
            }
            rows.push(fields);
        }

        Ok(Self { headers, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column names containing `token` as a case-sensitive substring, in
    /// header order.
    pub fn columns_containing(&self, token: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|h| h.contains(token))
            .cloned()
            .collect()
    }

    /// Comparison columns; both `Delta` and `delta` spellings are checked.
    pub fn delta_columns(&self) -> Vec<String> {
        self.headers
            .iter()
            .filter(|h| h.contains("Delta") || h.contains("delta"))
            .cloned()
            .collect()
    }

    /// Parseable numeric values of a column; non-numeric cells are skipped.
    pub fn numeric_column(&self, column: &str) -> Vec<f64> {
        let Some(index) = self.headers.iter().position(|h| h == column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter_map(|cell| cell.parse::<f64>().ok())
            .collect()
    }

    /// Distinct values of an exactly-named column, or None if absent.
    pub fn distinct_values(&self, column: &str) -> Option<BTreeSet<String>> {
        let index = self.headers.iter().position(|h| h == column)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| row.get(index))
                .cloned()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_columns() {
        let table = CsvTable::parse("Gene,SSIM_Poisson,Delta_SSIM\nA,0.5,0.1\nB,0.7,-0.2\n").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns_containing("SSIM"), vec!["SSIM_Poisson", "Delta_SSIM"]);
        assert_eq!(table.delta_columns(), vec!["Delta_SSIM"]);
        assert_eq!(table.numeric_column("SSIM_Poisson"), vec![0.5, 0.7]);
    }

    #[test]
    fn test_non_numeric_cells_skipped() {
        let table = CsvTable::parse("MSE\n0.1\nn/a\n0.3\n").unwrap();
        assert_eq!(table.numeric_column("MSE"), vec![0.1, 0.3]);
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        assert!(CsvTable::parse("A,B\n1,2,3\n").is_err());
        assert!(CsvTable::parse("").is_err());
    }
}
