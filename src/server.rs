use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::CohortError;
use crate::interface::QueryPipeline;
use crate::roster::Record;
use crate::scope::RoleScope;
use crate::stats::{self, DatasetOverview, GroupSummary};

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub role: RoleScope,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub condition: String,
    pub results: Vec<Record>,
    pub count: usize,
    pub timestamp: String,
}

#[derive(Deserialize)]
pub struct StatsParams {
    pub grade: Option<i64>,
    pub class_name: Option<String>,
    #[serde(default = "default_group_by")]
    pub group_by: String,
}

fn default_group_by() -> String {
    "class_name".to_string()
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub overview: DatasetOverview,
    pub quiz_score_by_group: Vec<GroupSummary>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
    pub timestamp: String,
}

pub fn router(pipeline: Arc<QueryPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/v1/query", post(handle_query))
        .route("/v1/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .with_state(pipeline)
        .layer(cors)
}

async fn handle_query(
    State(pipeline): State<Arc<QueryPipeline>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let started = std::time::Instant::now();
    match pipeline.query(&request.query, &request.role).await {
        Ok(result) => {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            info!(ms = elapsed_ms, rows = result.count, condition = %result.condition, "query complete");
            Ok(Json(QueryResponse {
                condition: result.condition,
                count: result.count,
                results: result.rows,
                timestamp: timestamp(),
            }))
        }
        Err(e) => {
            warn!(error = %e, "query failed");
            Err(error_response(e))
        }
    }
}

async fn handle_stats(
    State(pipeline): State<Arc<QueryPipeline>>,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let scope = RoleScope { grade: params.grade, class_name: params.class_name };
    let rows = pipeline.rows_in(&scope);
    let overview = stats::overview(pipeline.roster(), &rows);
    let quiz_score_by_group =
        stats::grouped_mean(pipeline.registry(), &rows, &params.group_by, "quiz_score")
            .map_err(error_response)?;
    Ok(Json(StatsResponse { overview, quiz_score_by_group, timestamp: timestamp() }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cohort",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": timestamp(),
    }))
}

// Error details of internal faults stay in the logs; callers get the
// taxonomy and a phrasing they can show as-is.
fn error_response(e: CohortError) -> (StatusCode, Json<ErrorResponse>) {
    let retryable = e.is_retryable();
    let (status, code, message) = match &e {
        CohortError::TranslationUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "translation_unavailable",
            "the language service could not be reached, try again".to_string(),
        ),
        CohortError::TranslationInvalid(_) | CohortError::SchemaViolation { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "query_not_understood",
            "could not understand query".to_string(),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error".to_string()),
    };
    (status, Json(ErrorResponse { error: message, code, retryable, timestamp: timestamp() }))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}
