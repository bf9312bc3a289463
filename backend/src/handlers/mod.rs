// HTTP Handlers
//
// Thin collaborator surface over the engine: read-only listings for the
// admin UI, plus the trigger and incident-close entry points domain
// event producers call.

pub mod automation;
pub mod sla;

pub use automation::{run_routes, trigger_routes, workflow_routes};
pub use sla::sla_routes;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::{database, AppState};

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if database::health_check(&state.db_pool).await {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "degraded" })),
        )
    }
}
