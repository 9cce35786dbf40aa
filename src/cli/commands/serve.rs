//! HTTP API server for the course assistant.
//!
//! Provides JSON endpoints for queries and course statistics.

use crate::cli::Output;
use crate::config::Settings;
use crate::course::SourceReference;
use crate::orchestrator::Orchestrator;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: &str,
    port: u16,
    docs: Option<PathBuf>,
    settings: Settings,
) -> anyhow::Result<()> {
    let docs_dir = docs.unwrap_or_else(|| settings.docs_dir());
    let orchestrator = Orchestrator::new(settings)?;

    if docs_dir.is_dir() {
        info!("Loading initial documents from {}", docs_dir.display());
        match orchestrator.ingest_folder(&docs_dir, false).await {
            Ok(report) => Output::success(&format!(
                "Loaded {} courses with {} chunks",
                report.added.len(),
                report.chunk_count()
            )),
            Err(e) => {
                warn!("Startup ingestion failed: {}", e);
                Output::warning(&format!("Could not load documents: {}", e));
            }
        }
    } else {
        warn!("Docs folder {} not found, starting empty", docs_dir.display());
    }

    let state = Arc::new(AppState { orchestrator });
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Pensum API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Query", "POST /api/query");
    Output::kv("Courses", "GET  /api/courses");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/courses", get(courses))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<SourceReference>,
    session_id: String,
}

#[derive(Serialize, Deserialize)]
struct CourseStats {
    total_courses: usize,
    course_titles: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: &crate::PensumError) -> axum::response::Response {
    let status = if e.is_upstream() {
        StatusCode::BAD_GATEWAY
    } else if matches!(e, crate::PensumError::InvalidInput(_)) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error!("Request failed: {}", e);
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    let session_id = match req.session_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => state.orchestrator.create_session(),
    };

    match state
        .orchestrator
        .answer_query(&req.query, Some(&session_id))
        .await
    {
        Ok(answer) => Json(QueryResponse {
            answer: answer.answer,
            sources: answer.sources,
            session_id,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn courses(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.orchestrator.course_analytics().await {
        Ok(analytics) => Json(CourseStats {
            total_courses: analytics.total_courses,
            course_titles: analytics.course_titles,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}
