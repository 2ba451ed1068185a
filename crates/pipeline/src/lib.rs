use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use discover::{BroadSearchProvider, NullSearch};
pub use discover::DiscoveryReport;
use extract::{ExtractionDepth, PaperAnalyzer, PaperInput, RuleBasedExtractor};
use store::{RunMode, RunStatus, Section, Store, StoreError, SynthesisRun};
use synthesize::{DomainWriter, PaperSummary, TemplateSynthesizer};
use writeup::detect_field;

/// Caller-facing failure taxonomy. Batch item failures are data
/// (`ItemFailure`), not members of this enum.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => PipelineError::NotFound { entity, id },
            StoreError::InvalidTransition { from, to } => {
                PipelineError::InvalidTransition { from, to }
            }
            other => PipelineError::Store(other),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Other(e.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: i64,
    pub error: String,
}

/// Batch outcome. `successful + failed == total`; one entry in `errors`
/// per failed item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<ItemFailure>,
}

impl BatchReport {
    fn record(&mut self, item_id: i64, outcome: Result<()>) {
        self.total += 1;
        match outcome {
            Ok(()) => self.successful += 1,
            Err(e) => {
                warn!(item_id, error = %e, "batch item failed");
                self.failed += 1;
                self.errors.push(ItemFailure {
                    item_id,
                    error: e.to_string(),
                });
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOutcome {
    pub synthesis_run_id: i64,
    #[serde(flatten)]
    pub analysis: analyze::RepoAnalysis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub synthesis_run_id: i64,
    pub key_findings: usize,
    pub figures_cataloged: usize,
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManuscriptOutcome {
    pub synthesis_run_id: i64,
    pub field: writeup::Field,
    pub sections_generated: usize,
    pub document_length: usize,
    pub output_path: Option<String>,
}

/// Accepted manuscript types for full generation. Only the run's stored
/// mode drives prose; the type gates the request shape.
const MANUSCRIPT_TYPES: &[&str] = &["research", "review", "extended-review", "hypothesis"];

/// Stage orchestrator. Holds the database path plus the three swappable
/// capabilities; every stage call opens a fresh store connection and
/// re-reads run state, so no in-memory state crosses stages.
pub struct Pipeline {
    db_path: PathBuf,
    analyzer: Box<dyn PaperAnalyzer>,
    writer: Box<dyn DomainWriter>,
    broad_search: Box<dyn BroadSearchProvider>,
}

impl Pipeline {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            analyzer: Box::new(RuleBasedExtractor::new()),
            writer: Box::new(TemplateSynthesizer),
            broad_search: Box::new(NullSearch),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Box<dyn PaperAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_writer(mut self, writer: Box<dyn DomainWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_broad_search(mut self, provider: Box<dyn BroadSearchProvider>) -> Self {
        self.broad_search = provider;
        self
    }

    fn store(&self) -> Result<Store> {
        Ok(Store::open(&self.db_path)?)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Classify a repository and create the run at `analyzing`.
    pub fn analyze_repo(&self, repo_path: &str) -> Result<AnalyzeOutcome> {
        let analysis = analyze::analyze_repository(repo_path)?;
        let store = self.store()?;
        let run_id = store.create_run(repo_path, analysis.detected_mode, &analysis.detected_domains)?;
        info!(
            run_id,
            mode = analysis.detected_mode.as_str(),
            domains = analysis.detected_domains.len(),
            "created synthesis run"
        );
        Ok(AnalyzeOutcome {
            synthesis_run_id: run_id,
            analysis,
        })
    }

    /// Parse the run's tables and figures into `main_finding`, then advance
    /// to `discovering`.
    pub fn ingest_results(&self, run_id: i64) -> Result<IngestOutcome> {
        let store = self.store()?;
        let run = store.run(run_id)?;

        let report = ingest::ingest_results_data(&run.repo_path)?;
        store.set_main_finding(run_id, &serde_json::to_value(&report)?)?;
        store.advance_status(run_id, RunStatus::Discovering)?;

        Ok(IngestOutcome {
            synthesis_run_id: run_id,
            key_findings: report.key_findings.len(),
            figures_cataloged: report.figures_catalog.len(),
            constraints: report.constraints,
        })
    }

    /// Run one discovery mode, record `papers_found`, advance to
    /// `extracting`.
    pub fn discover_literature(
        &self,
        run_id: i64,
        search_mode: &str,
        queries: &[String],
    ) -> Result<DiscoveryReport> {
        let store = self.store()?;
        let run = store.run(run_id)?;

        let report = match search_mode {
            "targeted" => discover::discover_targeted(&store, queries)?,
            "broad" => self.broad_search.search(&store, &run.detected_domains)?,
            other => {
                return Err(PipelineError::Validation(format!(
                    "unknown search mode '{other}', expected 'targeted' or 'broad'"
                )));
            }
        };

        store.set_papers_found(run_id, report.papers_added as i64)?;
        store.advance_status(run_id, RunStatus::Extracting)?;
        Ok(report)
    }

    /// Extract every requested paper (default: all known papers). A failed
    /// item never aborts the batch. `papers_extracted` is recomputed from
    /// persisted extraction rows, then the run advances to `synthesizing`.
    pub fn extract_papers(
        &self,
        run_id: i64,
        paper_ids: Option<Vec<i64>>,
        depth: ExtractionDepth,
    ) -> Result<BatchReport> {
        let store = self.store()?;
        store.run(run_id)?;

        let ids = match paper_ids {
            Some(ids) => ids,
            None => store.all_paper_ids()?,
        };

        let mut report = BatchReport::default();
        for paper_id in ids {
            let outcome = self.extract_one(&store, paper_id, depth);
            report.record(paper_id, outcome);
        }

        store.set_papers_extracted(run_id, store.count_extractions()?)?;
        store.advance_status(run_id, RunStatus::Synthesizing)?;
        Ok(report)
    }

    fn extract_one(&self, store: &Store, paper_id: i64, depth: ExtractionDepth) -> Result<()> {
        let paper = store.paper(paper_id)?;
        let input = PaperInput {
            title: paper.title,
            abstract_text: paper.abstract_text.unwrap_or_default(),
        };
        let extraction = self.analyzer.extract(&input, depth);
        store.upsert_extraction(
            paper_id,
            &extraction.high_level,
            &extraction.mid_level,
            &extraction.low_level,
            &extraction.code_methods,
            self.analyzer.model_name(),
        )?;
        Ok(())
    }

    /// Synthesize every requested domain (default: the run's detected
    /// domains, created on first reference). `domains_synthesized` is
    /// recomputed from persisted rows, then the run advances to `writing`.
    pub fn synthesize_domains(
        &self,
        run_id: i64,
        domain_ids: Option<Vec<i64>>,
    ) -> Result<BatchReport> {
        let store = self.store()?;
        let run = store.run(run_id)?;

        let ids = match domain_ids {
            Some(ids) => ids,
            None => {
                let mut resolved = Vec::with_capacity(run.detected_domains.len());
                for name in &run.detected_domains {
                    resolved.push(store.ensure_domain(name)?);
                }
                resolved
            }
        };

        let mut report = BatchReport::default();
        for domain_id in ids {
            let outcome = self.synthesize_one(&store, run_id, domain_id);
            report.record(domain_id, outcome);
        }

        store.set_domains_synthesized(run_id, store.count_syntheses_for_run(run_id)?)?;
        store.advance_status(run_id, RunStatus::Writing)?;
        Ok(report)
    }

    fn synthesize_one(&self, store: &Store, run_id: i64, domain_id: i64) -> Result<()> {
        let domain = store.domain(domain_id)?;
        let papers = store.extracted_papers_for_domain(&domain.name)?;

        let summaries: Vec<PaperSummary> = papers
            .into_iter()
            .map(|(paper, extraction)| PaperSummary {
                paper_id: paper.id,
                title: paper.title,
                year: paper.year,
                pmid: paper.pmid,
                high_level: extraction.high_level,
                mid_level: extraction.mid_level,
                low_level: extraction.low_level,
            })
            .collect();

        let paper_ids: Vec<i64> = summaries.iter().map(|s| s.paper_id).collect();
        let markdown = self.writer.synthesize(&domain.name, &summaries);
        store.upsert_domain_synthesis(run_id, domain_id, &markdown, &paper_ids)?;
        Ok(())
    }

    /// Render and persist one section under the caller-supplied mode.
    /// Repeatable; never advances status.
    pub fn generate_section(&self, run_id: i64, section: Section, mode: RunMode) -> Result<String> {
        let store = self.store()?;
        let run = store.run(run_id)?;
        let text = self.render_section(&store, &run, section, mode)?;
        store.set_section(run_id, section, &text)?;
        Ok(text)
    }

    fn render_section(
        &self,
        store: &Store,
        run: &SynthesisRun,
        section: Section,
        mode: RunMode,
    ) -> Result<String> {
        let syntheses = match mode {
            RunMode::Review => store.syntheses_for_run(run.id)?,
            RunMode::PrimaryResearch => Vec::new(),
        };
        Ok(writeup::generate_section(
            section,
            mode,
            run.main_finding.as_ref(),
            &syntheses,
        ))
    }

    /// Generate all five sections in fixed order, assemble the field
    /// template, persist the document, advance to `complete`. Optionally
    /// writes the document to `output_path`.
    pub fn generate_manuscript(
        &self,
        run_id: i64,
        manuscript_type: &str,
        title: &str,
        authors: &str,
        output_path: Option<&Path>,
    ) -> Result<ManuscriptOutcome> {
        if !MANUSCRIPT_TYPES.contains(&manuscript_type) {
            return Err(PipelineError::Validation(format!(
                "unknown manuscript type '{manuscript_type}', expected one of {MANUSCRIPT_TYPES:?}"
            )));
        }

        let store = self.store()?;
        let run = store.run(run_id)?;

        for section in Section::ALL {
            let text = self.render_section(&store, &run, section, run.mode)?;
            store.set_section(run_id, section, &text)?;
        }

        let manuscript = store.manuscript(run_id)?.ok_or(PipelineError::NotFound {
            entity: "manuscript",
            id: run_id,
        })?;
        let document = writeup::assemble_manuscript(
            &manuscript,
            &run.detected_domains,
            title,
            authors,
        )?;

        store.set_full_document(run_id, &document)?;
        store.advance_status(run_id, RunStatus::Complete)?;

        let written_to = match output_path {
            Some(path) => {
                std::fs::write(path, &document)
                    .map_err(|e| anyhow::anyhow!("writing manuscript to {path:?}: {e}"))?;
                Some(path.display().to_string())
            }
            None => None,
        };
        info!(run_id, length = document.len(), "manuscript assembled");

        Ok(ManuscriptOutcome {
            synthesis_run_id: run_id,
            field: detect_field(&run.detected_domains),
            sections_generated: Section::ALL.len(),
            document_length: document.len(),
            output_path: written_to,
        })
    }
}
