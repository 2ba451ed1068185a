use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use extract::ExtractionDepth;
use pipeline::{Pipeline, PipelineError};
use store::{RunMode, Section, Store};

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Map the pipeline failure taxonomy onto HTTP statuses. Anything outside
/// the taxonomy surfaces as a 500 with diagnostic text, never a bare crash.
fn into_response(e: PipelineError) -> ApiError {
    let status = match &e {
        PipelineError::NotFound { .. } => StatusCode::NOT_FOUND,
        PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::InvalidTransition { .. } => StatusCode::CONFLICT,
        PipelineError::Store(_) | PipelineError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

/// Run a blocking pipeline call off the async executor. SQLite access is
/// synchronous; every handler funnels through here.
async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Pipeline) -> Result<T, PipelineError> + Send + 'static,
{
    let pipeline = state.pipeline.clone();
    tokio::task::spawn_blocking(move || op(&pipeline))
        .await
        .map_err(|e| {
            into_response(PipelineError::Other(anyhow_join_error(e)))
        })?
        .map_err(into_response)
}

fn anyhow_join_error(e: tokio::task::JoinError) -> anyhow::Error {
    anyhow::anyhow!("pipeline task panicked: {e}")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_path =
        PathBuf::from(std::env::var("SYNTHESIS_DB").unwrap_or_else(|_| "synthesis.db".into()));
    Store::open(&db_path)
        .and_then(|store| store.init_schema())
        .expect("failed to initialize database schema");

    let state = AppState {
        pipeline: Arc::new(Pipeline::new(db_path)),
    };

    let app = Router::new()
        .route("/analyze_repo", post(analyze_repo))
        .route("/ingest_results", post(ingest_results))
        .route("/discover_literature", post(discover_literature))
        .route("/extract_papers", post(extract_papers))
        .route("/synthesize_domains", post(synthesize_domains))
        .route("/generate_section", post(generate_section))
        .route("/generate_manuscript", post(generate_manuscript))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("failed to bind 0.0.0.0:3000");

    tracing::info!("server listening on http://localhost:3000");

    axum::serve(listener, app).await.expect("server error");
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    repo_path: String,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    #[serde(flatten)]
    outcome: pipeline::AnalyzeOutcome,
    next_step: &'static str,
}

/// Every run starts its advance through ingest_results; for a review run
/// that call records an empty finding set before discovery.
fn analyze_next_step(mode: RunMode) -> &'static str {
    match mode {
        RunMode::PrimaryResearch => "Call ingest_results to load experimental data",
        RunMode::Review => "Call ingest_results to start the run, then discover_literature",
    }
}

async fn analyze_repo(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let outcome = run_blocking(&state, move |p| p.analyze_repo(&req.repo_path)).await?;
    let next_step = analyze_next_step(outcome.analysis.detected_mode);
    Ok(Json(AnalyzeResponse { outcome, next_step }))
}

#[derive(Deserialize)]
struct IngestRequest {
    synthesis_run_id: i64,
}

#[derive(Serialize)]
struct IngestResponse {
    #[serde(flatten)]
    outcome: pipeline::IngestOutcome,
    next_step: &'static str,
}

async fn ingest_results(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let outcome = run_blocking(&state, move |p| p.ingest_results(req.synthesis_run_id)).await?;
    Ok(Json(IngestResponse {
        outcome,
        next_step: "Call discover_literature",
    }))
}

#[derive(Deserialize)]
struct DiscoverRequest {
    synthesis_run_id: i64,
    /// Required; "targeted" or "broad". An absent mode is a request error,
    /// never a silent default.
    mode: String,
    #[serde(default)]
    search_queries: Vec<String>,
}

#[derive(Serialize)]
struct DiscoverResponse {
    #[serde(flatten)]
    report: pipeline::DiscoveryReport,
    next_step: &'static str,
}

async fn discover_literature(
    State(state): State<AppState>,
    Json(req): Json<DiscoverRequest>,
) -> Result<Json<DiscoverResponse>, ApiError> {
    let report = run_blocking(&state, move |p| {
        p.discover_literature(req.synthesis_run_id, &req.mode, &req.search_queries)
    })
    .await?;
    Ok(Json(DiscoverResponse {
        report,
        next_step: "Call extract_papers",
    }))
}

#[derive(Deserialize)]
struct ExtractRequest {
    synthesis_run_id: i64,
    paper_ids: Option<Vec<i64>>,
    #[serde(default = "default_depth")]
    extraction_depth: String,
}

fn default_depth() -> String {
    "full".into()
}

#[derive(Serialize)]
struct BatchResponse {
    #[serde(flatten)]
    report: pipeline::BatchReport,
    next_step: &'static str,
}

async fn extract_papers(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let depth = ExtractionDepth::parse(&req.extraction_depth).ok_or_else(|| {
        into_response(PipelineError::Validation(format!(
            "unknown extraction depth '{}', expected high_only, mid, or full",
            req.extraction_depth
        )))
    })?;
    let report = run_blocking(&state, move |p| {
        p.extract_papers(req.synthesis_run_id, req.paper_ids, depth)
    })
    .await?;
    Ok(Json(BatchResponse {
        report,
        next_step: "Call synthesize_domains",
    }))
}

#[derive(Deserialize)]
struct SynthesizeRequest {
    synthesis_run_id: i64,
    domain_ids: Option<Vec<i64>>,
}

async fn synthesize_domains(
    State(state): State<AppState>,
    Json(req): Json<SynthesizeRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let report = run_blocking(&state, move |p| {
        p.synthesize_domains(req.synthesis_run_id, req.domain_ids)
    })
    .await?;
    Ok(Json(BatchResponse {
        report,
        next_step: "Call generate_section or generate_manuscript",
    }))
}

#[derive(Deserialize)]
struct SectionRequest {
    synthesis_run_id: i64,
    section: String,
    /// Required; "primary_research" or "review". Selects the grounding
    /// source for the rendered section.
    mode: String,
}

#[derive(Serialize)]
struct SectionResponse {
    section: &'static str,
    preview: String,
    length: usize,
}

const PREVIEW_CHARS: usize = 200;

async fn generate_section(
    State(state): State<AppState>,
    Json(req): Json<SectionRequest>,
) -> Result<Json<SectionResponse>, ApiError> {
    let section = Section::parse(&req.section).ok_or_else(|| {
        into_response(PipelineError::Validation(format!(
            "unknown section '{}'",
            req.section
        )))
    })?;
    let mode = RunMode::parse(&req.mode).ok_or_else(|| {
        into_response(PipelineError::Validation(format!(
            "unknown mode '{}', expected primary_research or review",
            req.mode
        )))
    })?;
    let text = run_blocking(&state, move |p| {
        p.generate_section(req.synthesis_run_id, section, mode)
    })
    .await?;
    Ok(Json(SectionResponse {
        section: section.as_str(),
        preview: text.chars().take(PREVIEW_CHARS).collect(),
        length: text.len(),
    }))
}

#[derive(Deserialize)]
struct ManuscriptRequest {
    synthesis_run_id: i64,
    #[serde(default = "default_manuscript_type")]
    mode: String,
    #[serde(default = "default_title")]
    title: String,
    #[serde(default = "default_authors")]
    authors: String,
    output_path: Option<String>,
}

fn default_manuscript_type() -> String {
    "research".into()
}

fn default_title() -> String {
    "Manuscript Title".into()
}

fn default_authors() -> String {
    "Author Names".into()
}

async fn generate_manuscript(
    State(state): State<AppState>,
    Json(req): Json<ManuscriptRequest>,
) -> Result<Json<pipeline::ManuscriptOutcome>, ApiError> {
    let outcome = run_blocking(&state, move |p| {
        p.generate_manuscript(
            req.synthesis_run_id,
            &req.mode,
            &req.title,
            &req.authors,
            req.output_path.as_deref().map(std::path::Path::new),
        )
    })
    .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_request_keeps_caller_mode() {
        let req: DiscoverRequest =
            serde_json::from_str(r#"{"synthesis_run_id":1,"mode":"broad"}"#).unwrap();
        assert_eq!(req.mode, "broad");
        assert!(req.search_queries.is_empty());

        let req: DiscoverRequest = serde_json::from_str(
            r#"{"synthesis_run_id":1,"mode":"targeted","search_queries":["poisson loss"]}"#,
        )
        .unwrap();
        assert_eq!(req.mode, "targeted");
        assert_eq!(req.search_queries, vec!["poisson loss"]);
    }

    #[test]
    fn test_discover_request_without_mode_is_rejected() {
        let result: Result<DiscoverRequest, _> =
            serde_json::from_str(r#"{"synthesis_run_id":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_section_request_requires_mode() {
        let req: SectionRequest = serde_json::from_str(
            r#"{"synthesis_run_id":1,"section":"results","mode":"review"}"#,
        )
        .unwrap();
        assert_eq!(req.mode, "review");
        assert!(RunMode::parse(&req.mode).is_some());

        let result: Result<SectionRequest, _> =
            serde_json::from_str(r#"{"synthesis_run_id":1,"section":"results"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_review_hint_names_an_executable_operation() {
        // discover_literature is only reachable from discovering, so the
        // hint after analysis must start with ingest_results in both modes.
        assert!(analyze_next_step(RunMode::PrimaryResearch).contains("ingest_results"));
        assert!(analyze_next_step(RunMode::Review).contains("ingest_results"));
    }
}
