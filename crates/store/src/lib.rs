pub mod records;
pub mod schema;

pub use records::{
    DomainRow, DomainSynthesisRow, ExtractionRow, ManuscriptRow, NewPaper, Paper, Professor,
    RunMode, RunStatus, Section, SynthesisRun,
};

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Single source of truth for the pipeline. One `Store` wraps one short-lived
/// SQLite connection; stages open it on entry and drop it on return, so no
/// connection outlives a stage call.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    // ---- synthesis runs ----

    pub fn create_run(&self, repo_path: &str, mode: RunMode, domains: &[String]) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO synthesis_runs (repo_path, mode, detected_domains, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                repo_path,
                mode.as_str(),
                serde_json::to_string(domains)?,
                RunStatus::Analyzing.as_str()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn run(&self, id: i64) -> Result<SynthesisRun> {
        self.conn
            .query_row(
                "SELECT id, repo_path, mode, detected_domains, main_finding,
                        papers_found, papers_extracted, domains_synthesized, status, created_at
                 FROM synthesis_runs WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                entity: "synthesis run",
                id,
            })
            .and_then(|raw| {
                let mode = RunMode::parse(&raw.2)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown run mode: {}", raw.2)))?;
                let status = RunStatus::parse(&raw.8)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown run status: {}", raw.8)))?;
                let main_finding = match raw.4 {
                    Some(text) => Some(serde_json::from_str(&text)?),
                    None => None,
                };
                Ok(SynthesisRun {
                    id: raw.0,
                    repo_path: raw.1,
                    mode,
                    detected_domains: serde_json::from_str(&raw.3)?,
                    main_finding,
                    papers_found: raw.5,
                    papers_extracted: raw.6,
                    domains_synthesized: raw.7,
                    status,
                    created_at: raw.9,
                })
            })
    }

    /// Advance a run to `next`. Rejects any transition that is not the exact
    /// successor of the persisted state, so a skipped or repeated stage
    /// surfaces instead of silently producing degenerate artifacts.
    pub fn advance_status(&self, run_id: i64, next: RunStatus) -> Result<()> {
        let current = self.run(run_id)?.status;
        if current.next() != Some(next) {
            return Err(StoreError::InvalidTransition {
                from: current.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.conn.execute(
            "UPDATE synthesis_runs SET status = ?1 WHERE id = ?2",
            params![next.as_str(), run_id],
        )?;
        Ok(())
    }

    pub fn set_main_finding(&self, run_id: i64, finding: &serde_json::Value) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE synthesis_runs SET main_finding = ?1 WHERE id = ?2",
            params![serde_json::to_string(finding)?, run_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "synthesis run",
                id: run_id,
            });
        }
        Ok(())
    }

    pub fn set_papers_found(&self, run_id: i64, count: i64) -> Result<()> {
        self.set_counter(run_id, "papers_found", count)
    }

    pub fn set_papers_extracted(&self, run_id: i64, count: i64) -> Result<()> {
        self.set_counter(run_id, "papers_extracted", count)
    }

    pub fn set_domains_synthesized(&self, run_id: i64, count: i64) -> Result<()> {
        self.set_counter(run_id, "domains_synthesized", count)
    }

    fn set_counter(&self, run_id: i64, column: &'static str, count: i64) -> Result<()> {
        // Column names come from the three fixed callers above, never input.
        let sql = format!("UPDATE synthesis_runs SET {column} = ?1 WHERE id = ?2");
        let updated = self.conn.execute(&sql, params![count, run_id])?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "synthesis run",
                id: run_id,
            });
        }
        Ok(())
    }

    // ---- professors and papers ----

    /// Insert-if-absent keyed by (name, affiliation); returns the existing
    /// row id on repeat invocation.
    pub fn upsert_professor(&self, name: &str, affiliation: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO professors (name, affiliation) VALUES (?1, ?2)",
            params![name, affiliation],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM professors WHERE name = ?1 AND affiliation = ?2",
            params![name, affiliation],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Insert a paper, reusing an existing row when the pmid is already
    /// known. Returns the paper id either way.
    pub fn insert_paper(&self, paper: &NewPaper) -> Result<i64> {
        if let Some(pmid) = &paper.pmid {
            let existing: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM papers WHERE pmid = ?1",
                    params![pmid],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }
        }
        self.conn.execute(
            "INSERT INTO papers (pmid, title, year, authors, journal, abstract, full_text, doi, domain, professor_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                paper.pmid,
                paper.title,
                paper.year,
                serde_json::to_string(&paper.authors)?,
                paper.journal,
                paper.abstract_text,
                paper.full_text,
                paper.doi,
                paper.domain,
                paper.professor_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn paper(&self, id: i64) -> Result<Paper> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.pmid, p.title, p.year, p.authors, p.journal, p.abstract,
                    p.full_text, p.doi, p.domain, p.professor_id, prof.name
             FROM papers p
             LEFT JOIN professors prof ON p.professor_id = prof.id
             WHERE p.id = ?1",
        )?;
        stmt.query_row(params![id], Self::paper_from_row)
            .optional()?
            .ok_or(StoreError::NotFound { entity: "paper", id })
    }

    pub fn all_papers(&self) -> Result<Vec<Paper>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.pmid, p.title, p.year, p.authors, p.journal, p.abstract,
                    p.full_text, p.doi, p.domain, p.professor_id, prof.name
             FROM papers p
             LEFT JOIN professors prof ON p.professor_id = prof.id
             ORDER BY p.id",
        )?;
        let rows = stmt.query_map([], Self::paper_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn all_paper_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM papers ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn paper_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Paper> {
        let authors_json: Option<String> = row.get(4)?;
        let authors = authors_json
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok())
            .unwrap_or_default();
        Ok(Paper {
            id: row.get(0)?,
            pmid: row.get(1)?,
            title: row.get(2)?,
            year: row.get(3)?,
            authors,
            journal: row.get(5)?,
            abstract_text: row.get(6)?,
            full_text: row.get(7)?,
            doi: row.get(8)?,
            domain: row.get(9)?,
            professor_id: row.get(10)?,
            professor_name: row.get(11)?,
        })
    }

    // ---- extractions ----

    /// Update-if-exists keyed by paper id. Re-extraction overwrites all four
    /// levels and stamps `extracted_at`.
    pub fn upsert_extraction(
        &self,
        paper_id: i64,
        high: &serde_json::Value,
        mid: &serde_json::Value,
        low: &serde_json::Value,
        code: &serde_json::Value,
        model: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO paper_extractions
                 (paper_id, high_level, mid_level, low_level, code_methods, extraction_model, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(paper_id) DO UPDATE SET
                 high_level = excluded.high_level,
                 mid_level = excluded.mid_level,
                 low_level = excluded.low_level,
                 code_methods = excluded.code_methods,
                 extraction_model = excluded.extraction_model,
                 extracted_at = excluded.extracted_at",
            params![
                paper_id,
                serde_json::to_string(high)?,
                serde_json::to_string(mid)?,
                serde_json::to_string(low)?,
                serde_json::to_string(code)?,
                model,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn extraction(&self, paper_id: i64) -> Result<Option<ExtractionRow>> {
        self.conn
            .query_row(
                "SELECT paper_id, high_level, mid_level, low_level, code_methods,
                        extraction_model, extracted_at
                 FROM paper_extractions WHERE paper_id = ?1",
                params![paper_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?
            .map(|raw| {
                Ok(ExtractionRow {
                    paper_id: raw.0,
                    high_level: serde_json::from_str(&raw.1)?,
                    mid_level: serde_json::from_str(&raw.2)?,
                    low_level: serde_json::from_str(&raw.3)?,
                    code_methods: serde_json::from_str(&raw.4)?,
                    extraction_model: raw.5,
                    extracted_at: raw.6,
                })
            })
            .transpose()
    }

    pub fn count_extractions(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM paper_extractions", [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Papers tagged with `domain_name` that have a persisted extraction,
    /// with their extraction levels attached.
    pub fn extracted_papers_for_domain(&self, domain_name: &str) -> Result<Vec<(Paper, ExtractionRow)>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.pmid, p.title, p.year, p.authors, p.journal, p.abstract,
                    p.full_text, p.doi, p.domain, p.professor_id, NULL,
                    pe.high_level, pe.mid_level, pe.low_level, pe.code_methods,
                    pe.extraction_model, pe.extracted_at
             FROM papers p
             JOIN paper_extractions pe ON p.id = pe.paper_id
             WHERE p.domain = ?1
             ORDER BY p.id",
        )?;
        let rows = stmt.query_map(params![domain_name], |row| {
            let paper = Self::paper_from_row(row)?;
            Ok((
                paper,
                row.get::<_, String>(12)?,
                row.get::<_, String>(13)?,
                row.get::<_, String>(14)?,
                row.get::<_, String>(15)?,
                row.get::<_, Option<String>>(16)?,
                row.get::<_, Option<String>>(17)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (paper, high, mid, low, code, model, at) = row?;
            let extraction = ExtractionRow {
                paper_id: paper.id,
                high_level: serde_json::from_str(&high)?,
                mid_level: serde_json::from_str(&mid)?,
                low_level: serde_json::from_str(&low)?,
                code_methods: serde_json::from_str(&code)?,
                extraction_model: model,
                extracted_at: at,
            };
            out.push((paper, extraction));
        }
        Ok(out)
    }

    // ---- domains ----

    /// Create-on-first-reference keyed by unique name.
    pub fn ensure_domain(&self, name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO domains (name) VALUES (?1)",
            params![name],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM domains WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn domain(&self, id: i64) -> Result<DomainRow> {
        self.conn
            .query_row(
                "SELECT id, name, description FROM domains WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DomainRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                entity: "domain",
                id,
            })
    }

    // ---- domain syntheses ----

    /// Upsert keyed by (run, domain); recomputation replaces the previous
    /// synthesis for the pair.
    pub fn upsert_domain_synthesis(
        &self,
        run_id: i64,
        domain_id: i64,
        summary_markdown: &str,
        paper_ids: &[i64],
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO domain_syntheses
                 (synthesis_run_id, domain_id, summary_markdown, papers_analyzed, paper_ids, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(synthesis_run_id, domain_id) DO UPDATE SET
                 summary_markdown = excluded.summary_markdown,
                 papers_analyzed = excluded.papers_analyzed,
                 paper_ids = excluded.paper_ids,
                 generated_at = excluded.generated_at",
            params![
                run_id,
                domain_id,
                summary_markdown,
                paper_ids.len() as i64,
                serde_json::to_string(paper_ids)?,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn count_syntheses_for_run(&self, run_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM domain_syntheses WHERE synthesis_run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Syntheses for one run only; assembly must never read across runs.
    pub fn syntheses_for_run(&self, run_id: i64) -> Result<Vec<DomainSynthesisRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT ds.synthesis_run_id, ds.domain_id, d.name, ds.summary_markdown,
                    ds.papers_analyzed, ds.paper_ids
             FROM domain_syntheses ds
             JOIN domains d ON ds.domain_id = d.id
             WHERE ds.synthesis_run_id = ?1
             ORDER BY ds.id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (run, domain_id, name, markdown, analyzed, ids) = row?;
            out.push(DomainSynthesisRow {
                synthesis_run_id: run,
                domain_id,
                domain_name: name,
                summary_markdown: markdown,
                papers_analyzed: analyzed,
                paper_ids: serde_json::from_str(&ids)?,
            });
        }
        Ok(out)
    }

    // ---- manuscripts ----

    /// Write one section column, creating the manuscript row on first use.
    pub fn set_section(&self, run_id: i64, section: Section, text: &str) -> Result<()> {
        let column = match section {
            Section::Abstract => "abstract",
            Section::Introduction => "introduction",
            Section::Methods => "methods",
            Section::Results => "results",
            Section::Discussion => "discussion",
        };
        let now = chrono::Utc::now().to_rfc3339();
        let sql = format!(
            "INSERT INTO manuscripts (synthesis_run_id, {column}, generated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(synthesis_run_id) DO UPDATE SET
                 {column} = excluded.{column},
                 generated_at = excluded.generated_at"
        );
        self.conn.execute(&sql, params![run_id, text, now])?;
        Ok(())
    }

    pub fn set_full_document(&self, run_id: i64, document: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO manuscripts (synthesis_run_id, full_document, generated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(synthesis_run_id) DO UPDATE SET
                 full_document = excluded.full_document,
                 generated_at = excluded.generated_at",
            params![run_id, document, now],
        )?;
        Ok(())
    }

    pub fn manuscript(&self, run_id: i64) -> Result<Option<ManuscriptRow>> {
        self.conn
            .query_row(
                "SELECT synthesis_run_id, abstract, introduction, methods, results,
                        discussion, full_document
                 FROM manuscripts WHERE synthesis_run_id = ?1",
                params![run_id],
                |row| {
                    Ok(ManuscriptRow {
                        synthesis_run_id: row.get(0)?,
                        abstract_text: row.get(1)?,
                        introduction: row.get(2)?,
                        methods: row.get(3)?,
                        results: row.get(4)?,
                        discussion: row.get(5)?,
                        full_document: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    #[test]
    fn test_run_lifecycle() {
        let store = test_store();
        let id = store
            .create_run("/tmp/repo", RunMode::PrimaryResearch, &["loss-functions".into()])
            .unwrap();

        let run = store.run(id).unwrap();
        assert_eq!(run.status, RunStatus::Analyzing);
        assert_eq!(run.detected_domains, vec!["loss-functions".to_string()]);
        assert!(run.main_finding.is_none());

        store.set_main_finding(id, &json!({"key_findings": []})).unwrap();
        let run = store.run(id).unwrap();
        assert!(run.main_finding.is_some());
    }

    #[test]
    fn test_status_advances_only_to_successor() {
        let store = test_store();
        let id = store.create_run("", RunMode::Review, &[]).unwrap();

        // Skipping discovering is rejected.
        let err = store.advance_status(id, RunStatus::Extracting).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        // Going backward is rejected.
        store.advance_status(id, RunStatus::Discovering).unwrap();
        let err = store.advance_status(id, RunStatus::Discovering).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        store.advance_status(id, RunStatus::Extracting).unwrap();
        store.advance_status(id, RunStatus::Synthesizing).unwrap();
        store.advance_status(id, RunStatus::Writing).unwrap();
        store.advance_status(id, RunStatus::Complete).unwrap();
        assert_eq!(store.run(id).unwrap().status, RunStatus::Complete);
    }

    #[test]
    fn test_professor_upsert_is_idempotent() {
        let store = test_store();
        let a = store.upsert_professor("Ada Lovelace", "Analytical U").unwrap();
        let b = store.upsert_professor("Ada Lovelace", "Analytical U").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_paper_insert_reuses_pmid() {
        let store = test_store();
        let paper = NewPaper {
            pmid: Some("12345".into()),
            title: "A Paper".into(),
            ..Default::default()
        };
        let a = store.insert_paper(&paper).unwrap();
        let b = store.insert_paper(&paper).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.all_papers().unwrap().len(), 1);
    }

    #[test]
    fn test_extraction_upsert_overwrites() {
        let store = test_store();
        let paper_id = store
            .insert_paper(&NewPaper {
                title: "A Paper".into(),
                ..Default::default()
            })
            .unwrap();

        let empty = json!({});
        store
            .upsert_extraction(paper_id, &json!({"main_claim": "v1"}), &empty, &empty, &empty, "rule-based")
            .unwrap();
        store
            .upsert_extraction(paper_id, &json!({"main_claim": "v2"}), &empty, &empty, &empty, "rule-based")
            .unwrap();

        assert_eq!(store.count_extractions().unwrap(), 1);
        let row = store.extraction(paper_id).unwrap().unwrap();
        assert_eq!(row.high_level["main_claim"], "v2");
        assert!(row.extracted_at.is_some());
    }

    #[test]
    fn test_domain_synthesis_upsert_keyed_by_run_and_domain() {
        let store = test_store();
        let run = store.create_run("", RunMode::Review, &[]).unwrap();
        let other_run = store.create_run("", RunMode::Review, &[]).unwrap();
        let domain = store.ensure_domain("loss-functions").unwrap();

        store.upsert_domain_synthesis(run, domain, "v1", &[1, 2]).unwrap();
        store.upsert_domain_synthesis(run, domain, "v2", &[1, 2]).unwrap();
        store.upsert_domain_synthesis(other_run, domain, "other", &[]).unwrap();

        assert_eq!(store.count_syntheses_for_run(run).unwrap(), 1);
        let rows = store.syntheses_for_run(run).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].summary_markdown, "v2");
        assert_eq!(rows[0].paper_ids, vec![1, 2]);
    }

    #[test]
    fn test_sections_set_independently() {
        let store = test_store();
        let run = store.create_run("", RunMode::Review, &[]).unwrap();

        store.set_section(run, Section::Abstract, "the abstract").unwrap();
        store.set_section(run, Section::Results, "the results").unwrap();

        let manuscript = store.manuscript(run).unwrap().unwrap();
        assert_eq!(manuscript.section(Section::Abstract), Some("the abstract"));
        assert_eq!(manuscript.section(Section::Results), Some("the results"));
        assert_eq!(manuscript.section(Section::Methods), None);
    }

    #[test]
    fn test_missing_run_is_not_found() {
        let store = test_store();
        let err = store.run(999).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "synthesis run", id: 999 }));
    }
}
