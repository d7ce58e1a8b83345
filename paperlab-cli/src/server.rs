//! HTTP API: screened search and full analysis over JSON.

use crate::research::{AnalysisRun, ResearchApp, ScreenedPaper};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use paperlab_core::PaperLabError;
use paperlab_core::discovery::clamp_max_papers;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub type SharedApp = Arc<ResearchApp>;

#[derive(Debug, Deserialize)]
pub struct ResearchParams {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub criteria: String,
    pub max_papers: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub question: String,
    #[serde(default)]
    pub criteria: String,
    pub max_papers: Option<usize>,
    /// Download PDFs before analysis.
    #[serde(default = "default_true")]
    pub full_text: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct ResearchResponse {
    status: &'static str,
    keywords: Vec<String>,
    /// Papers left after relevance screening.
    total_results: usize,
    /// Papers found before screening.
    initial_results: usize,
    papers: Vec<ScreenedPaper>,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    status: &'static str,
    keywords: Vec<String>,
    #[serde(flatten)]
    run: AnalysisRun,
}

/// Failure body: `{"status": "error", "error": "..."}`.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PaperLabError> for ApiError {
    fn from(e: PaperLabError) -> Self {
        let status = match e {
            PaperLabError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(error = %self.message, "API error");
        }
        let body = serde_json::json!({ "status": "error", "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

pub fn router(app: SharedApp) -> Router {
    Router::new()
        .route("/api/research", get(research_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn research_handler(
    State(app): State<SharedApp>,
    Query(params): Query<ResearchParams>,
) -> Result<Json<ResearchResponse>, ApiError> {
    if params.question.trim().is_empty() {
        return Err(ApiError::bad_request("Research question is required"));
    }
    let max_papers = clamp_max_papers(params.max_papers.unwrap_or(usize::MAX));

    let found = app
        .discover(&params.question, &params.criteria, max_papers)
        .await?;
    if let Some(message) = found.error {
        return Err(ApiError::bad_request(message));
    }
    let initial_results = found.papers.len();
    let papers = app.screen(&params.question, found.papers).await;
    info!(initial_results, kept = papers.len(), "Research request served");

    Ok(Json(ResearchResponse {
        status: "success",
        keywords: found.keywords,
        total_results: papers.len(),
        initial_results,
        papers,
    }))
}

async fn analyze_handler(
    State(app): State<SharedApp>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::bad_request("Research question is required"));
    }
    let max_papers = clamp_max_papers(request.max_papers.unwrap_or(usize::MAX));

    let found = app
        .discover(&request.question, &request.criteria, max_papers)
        .await?;
    if let Some(message) = found.error {
        return Err(ApiError::bad_request(message));
    }
    if found.papers.is_empty() {
        return Err(ApiError::bad_request("No papers matched the question and criteria"));
    }

    let run = app
        .analyze(&request.question, found.papers, request.full_text)
        .await
        .map_err(PaperLabError::from)?;
    Ok(Json(AnalyzeResponse {
        status: "success",
        keywords: found.keywords,
        run,
    }))
}

/// Bind and serve until the process is stopped.
pub async fn run(app: SharedApp, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "PaperLab API listening");
    axum::serve(listener, router(app)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::testing::offline_app;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let app = router(Arc::new(offline_app()));
        let resp = app.oneshot(request).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_research_requires_question() {
        let (status, body) = send(get("/api/research")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Research question is required");
    }

    #[tokio::test]
    async fn test_research_reports_screened_papers() {
        let (status, body) = send(get("/api/research?question=does%20sleep%20help")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["initial_results"], 2);
        assert_eq!(body["total_results"], 1);
        assert_eq!(body["keywords"][0], "sleep");
        assert_eq!(body["papers"][0]["id"], "2401.00001");
        assert_eq!(body["papers"][0]["relevance"]["is_relevant"], true);
    }

    #[tokio::test]
    async fn test_research_rejects_overlong_question() {
        let uri = format!("/api/research?question={}", "q".repeat(1001));
        let (status, body) = send(get(&uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("1001"));
    }

    #[tokio::test]
    async fn test_analyze_returns_results_and_report() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"question": "does sleep help?", "full_text": false}"#))
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["report"]["total_papers_processed"], 2);
    }
}
