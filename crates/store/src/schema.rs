/// Evidence store schema. Extraction levels and detected domains are stored
/// as JSON text so the four-level extraction shape stays opaque to SQL.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS professors (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    affiliation TEXT NOT NULL,
    UNIQUE(name, affiliation)
);

CREATE TABLE IF NOT EXISTS papers (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    pmid         TEXT UNIQUE,
    title        TEXT NOT NULL,
    year         INTEGER,
    authors      TEXT,
    journal      TEXT,
    abstract     TEXT,
    full_text    TEXT,
    doi          TEXT,
    domain       TEXT,
    professor_id INTEGER REFERENCES professors(id)
);

CREATE TABLE IF NOT EXISTS paper_extractions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    paper_id         INTEGER NOT NULL UNIQUE REFERENCES papers(id),
    high_level       TEXT NOT NULL DEFAULT '{}',
    mid_level        TEXT NOT NULL DEFAULT '{}',
    low_level        TEXT NOT NULL DEFAULT '{}',
    code_methods     TEXT NOT NULL DEFAULT '{}',
    extraction_model TEXT,
    extracted_at     TEXT
);

CREATE TABLE IF NOT EXISTS domains (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS synthesis_runs (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_path           TEXT NOT NULL DEFAULT '',
    mode                TEXT NOT NULL,
    detected_domains    TEXT NOT NULL DEFAULT '[]',
    main_finding        TEXT,
    papers_found        INTEGER NOT NULL DEFAULT 0,
    papers_extracted    INTEGER NOT NULL DEFAULT 0,
    domains_synthesized INTEGER NOT NULL DEFAULT 0,
    status              TEXT NOT NULL DEFAULT 'analyzing',
    created_at          TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS domain_syntheses (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    synthesis_run_id INTEGER NOT NULL REFERENCES synthesis_runs(id),
    domain_id        INTEGER NOT NULL REFERENCES domains(id),
    summary_markdown TEXT NOT NULL,
    papers_analyzed  INTEGER NOT NULL DEFAULT 0,
    paper_ids        TEXT NOT NULL DEFAULT '[]',
    generated_at     TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(synthesis_run_id, domain_id)
);

CREATE TABLE IF NOT EXISTS manuscripts (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    synthesis_run_id INTEGER NOT NULL UNIQUE REFERENCES synthesis_runs(id),
    abstract         TEXT,
    introduction     TEXT,
    methods          TEXT,
    results          TEXT,
    discussion       TEXT,
    full_document    TEXT,
    generated_at     TEXT
);
"#;
