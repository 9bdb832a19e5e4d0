//! HTTP request handlers

use super::types::{ErrorResponse, ModelsResponse, QueryRequest, QueryResponse};
use super::AppState;
use crate::llm::ToolDescriptor;
use crate::runtime::RuntimeError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(run_query))
        .route("/tools", get(list_tools))
        .route("/models", get(list_models))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Query
// ============================================================

async fn run_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("query must not be empty".to_string()));
    }

    // Dropped when the client disconnects and axum drops this future, which
    // cancels the session's in-flight model request or tool
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let report = state
        .runtime
        .run_query(query, req.model.as_deref(), cancel)
        .await
        .map_err(|e| match e {
            RuntimeError::UnknownModel(_) => AppError::BadRequest(e.to_string()),
            RuntimeError::NoModels => AppError::Unavailable(e.to_string()),
        })?;

    Ok(Json(QueryResponse::from(report)))
}

// ============================================================
// Catalog and models
// ============================================================

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.runtime.catalog().describe_all())
}

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("toolrelay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
