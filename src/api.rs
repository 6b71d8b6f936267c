// REST API with Axum
//
// Handlers are thin: parse into typed requests, call the store, map errors.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::company::{Company, Entry};
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::ingest::{self, IngestResponse, NewEntryRequest};
use crate::query::{self, CompanyQuery, CompanyQueryParams};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

impl AppState {
    pub fn new(store: Arc<Store>) -> Self {
        AppState { store }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Store(err) => {
                tracing::error!("store failure: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct CompaniesResponse {
    companies: Vec<Company>,
}

#[derive(Deserialize)]
struct SuggestParams {
    #[serde(default)]
    q: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/company - Create company or append entry
async fn create_entry(
    State(state): State<AppState>,
    payload: Result<Json<NewEntryRequest>, JsonRejection>,
) -> AppResult<Json<IngestResponse>> {
    let Json(request) = payload.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let response = ingest::ingest(&state.store, request)?;
    Ok(Json(response))
}

/// GET /api/companies - Search, filter and sort
async fn list_companies(
    State(state): State<AppState>,
    Query(params): Query<CompanyQueryParams>,
) -> AppResult<Json<CompaniesResponse>> {
    let company_query = CompanyQuery::try_from(params)?;
    let companies = query::search(&state.store, &company_query)?;

    tracing::debug!(query = %company_query.name, results = companies.len(), "company search");

    Ok(Json(CompaniesResponse { companies }))
}

/// GET /api/company-names?q= - Autocomplete
async fn company_names(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> AppResult<Json<Vec<String>>> {
    let prefix = params.q.trim();
    if prefix.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(state.store.suggest_names(prefix)?))
}

/// GET /api/company-history/:name - Entries oldest first
async fn company_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Vec<Entry>>> {
    Ok(Json(state.store.history(&name)?))
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// Build the full router: API under /api, front end at / and /static
pub fn router(state: AppState, static_dir: &FsPath) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/company", post(create_entry))
        .route("/companies", get(list_companies))
        .route("/company-names", get(company_names))
        .route("/company-history/:name", get(company_history))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
