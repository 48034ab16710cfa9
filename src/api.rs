//! ==============================================================================
//! api.rs - http routes
//! ==============================================================================
//!
//! routes:
//!     POST /api/sensor-data   validate, stamp id + time, store
//!     GET  /api/sensor-data   list, optional ?sensorType= filter
//!     GET  /health            always healthy, reports the storage backend
//!     GET  /*                 static form (frontend dir)
//!
//! every api answer carries `success`; failures add a `message`.
//!
//! relationships:
//!     - used by: main.rs (builds the app and serves it)
//!     - uses: storage (ReadingStore behind AppState)
//!     - uses: domain.rs (Submission validation, Reading, IdGenerator)
//!
//! ==============================================================================

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::domain::{iso_timestamp, IdGenerator, Reading, Submission};
use crate::error::ApiError;
use crate::storage::ReadingStore;

// ==============================================================================
// shared state
// ==============================================================================
// handed to every handler by axum. the store is chosen once at startup,
// tests inject their own.

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub ids: Arc<IdGenerator>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self {
            store,
            ids: Arc::new(IdGenerator::new()),
        }
    }
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub data: Reading,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub data: Vec<Reading>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub sensor_type: Option<String>,
}

/// api routes only
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sensor-data", get(list_readings).post(submit_reading))
        .route("/health", get(health))
        .with_state(state)
}

/// api routes plus the static form, cors and request tracing
pub fn app(state: AppState, frontend_dir: &Path) -> Router {
    api_router(state)
        .fallback_service(ServeDir::new(frontend_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// POST /api/sensor-data
async fn submit_reading(
    State(state): State<AppState>,
    body: Result<Json<Submission>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(submission) = body.map_err(|e| ApiError::MalformedBody(e.body_text()))?;
    let valid = submission.validate()?;

    let now = chrono::Utc::now();
    let reading = Reading::new(valid, state.ids.next_id(now), now);
    state.store.insert(&reading).await?;

    tracing::info!(
        "stored reading {} ({} = {} @ {}), storage {}",
        reading.id,
        reading.sensor_type,
        reading.value,
        reading.location,
        state.store.backend()
    );

    Ok(Json(SubmitResponse {
        success: true,
        message: "Data submitted successfully".to_string(),
        data: reading,
    }))
}

/// GET /api/sensor-data?sensorType=
async fn list_readings(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::MalformedBody(e.body_text()))?;
    // an empty ?sensorType= means no filter
    let filter = params.sensor_type.as_deref().filter(|t| !t.is_empty());
    let data = state.store.list(filter).await?;
    Ok(Json(ListResponse { success: true, data }))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": iso_timestamp(chrono::Utc::now()),
        "services": {
            "api": "operational",
            "storage": state.store.backend().to_string(),
        }
    }))
}
