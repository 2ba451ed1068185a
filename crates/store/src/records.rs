use serde::{Deserialize, Serialize};

/// Operating mode of a synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    PrimaryResearch,
    Review,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::PrimaryResearch => "primary_research",
            RunMode::Review => "review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary_research" => Some(RunMode::PrimaryResearch),
            "review" => Some(RunMode::Review),
            _ => None,
        }
    }
}

/// Finite run state. Each state is reachable only from its predecessor;
/// `next()` defines the single legal successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Analyzing,
    Discovering,
    Extracting,
    Synthesizing,
    Writing,
    Complete,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Analyzing => "analyzing",
            RunStatus::Discovering => "discovering",
            RunStatus::Extracting => "extracting",
            RunStatus::Synthesizing => "synthesizing",
            RunStatus::Writing => "writing",
            RunStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analyzing" => Some(RunStatus::Analyzing),
            "discovering" => Some(RunStatus::Discovering),
            "extracting" => Some(RunStatus::Extracting),
            "synthesizing" => Some(RunStatus::Synthesizing),
            "writing" => Some(RunStatus::Writing),
            "complete" => Some(RunStatus::Complete),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<RunStatus> {
        match self {
            RunStatus::Analyzing => Some(RunStatus::Discovering),
            RunStatus::Discovering => Some(RunStatus::Extracting),
            RunStatus::Extracting => Some(RunStatus::Synthesizing),
            RunStatus::Synthesizing => Some(RunStatus::Writing),
            RunStatus::Writing => Some(RunStatus::Complete),
            RunStatus::Complete => None,
        }
    }
}

/// Manuscript section. Closed set so no caller-supplied string ever
/// selects a storage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
}

impl Section {
    /// Fixed generation order for full-manuscript assembly.
    pub const ALL: [Section; 5] = [
        Section::Abstract,
        Section::Introduction,
        Section::Methods,
        Section::Results,
        Section::Discussion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Abstract => "abstract",
            Section::Introduction => "introduction",
            Section::Methods => "methods",
            Section::Results => "results",
            Section::Discussion => "discussion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "abstract" => Some(Section::Abstract),
            "introduction" => Some(Section::Introduction),
            "methods" => Some(Section::Methods),
            "results" => Some(Section::Results),
            "discussion" => Some(Section::Discussion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRun {
    pub id: i64,
    pub repo_path: String,
    pub mode: RunMode,
    pub detected_domains: Vec<String>,
    pub main_finding: Option<serde_json::Value>,
    pub papers_found: i64,
    pub papers_extracted: i64,
    pub domains_synthesized: i64,
    pub status: RunStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professor {
    pub id: i64,
    pub name: String,
    pub affiliation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub id: i64,
    pub pmid: Option<String>,
    pub title: String,
    pub year: Option<i64>,
    pub authors: Vec<String>,
    pub journal: Option<String>,
    pub abstract_text: Option<String>,
    pub full_text: Option<String>,
    pub doi: Option<String>,
    pub domain: Option<String>,
    pub professor_id: Option<i64>,
    /// Joined professor name, when requested.
    pub professor_name: Option<String>,
}

/// Paper fields for insertion; id is assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPaper {
    pub pmid: Option<String>,
    pub title: String,
    pub year: Option<i64>,
    pub authors: Vec<String>,
    pub journal: Option<String>,
    pub abstract_text: Option<String>,
    pub full_text: Option<String>,
    pub doi: Option<String>,
    pub domain: Option<String>,
    pub professor_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRow {
    pub paper_id: i64,
    pub high_level: serde_json::Value,
    pub mid_level: serde_json::Value,
    pub low_level: serde_json::Value,
    pub code_methods: serde_json::Value,
    pub extraction_model: Option<String>,
    pub extracted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSynthesisRow {
    pub synthesis_run_id: i64,
    pub domain_id: i64,
    pub domain_name: String,
    pub summary_markdown: String,
    pub papers_analyzed: i64,
    pub paper_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManuscriptRow {
    pub synthesis_run_id: i64,
    pub abstract_text: Option<String>,
    pub introduction: Option<String>,
    pub methods: Option<String>,
    pub results: Option<String>,
    pub discussion: Option<String>,
    pub full_document: Option<String>,
}

impl ManuscriptRow {
    pub fn section(&self, section: Section) -> Option<&str> {
        match section {
            Section::Abstract => self.abstract_text.as_deref(),
            Section::Introduction => self.introduction.as_deref(),
            Section::Methods => self.methods.as_deref(),
            Section::Results => self.results.as_deref(),
            Section::Discussion => self.discussion.as_deref(),
        }
    }
}
