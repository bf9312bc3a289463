// SLA target and incident endpoints

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiResult, AppError};
use crate::AppState;
use tempo_shared::{IncidentStatus, SlaIncident, SlaTarget};

pub fn sla_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/targets", get(list_targets))
        .route("/incidents", get(list_incidents))
        .route("/incidents/close", post(close_incidents))
}

async fn list_targets(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<SlaTarget>>> {
    let targets = state.store.list_sla_targets().await?;
    Ok(Json(targets))
}

#[derive(Debug, Deserialize)]
struct ListIncidentsQuery {
    status: Option<IncidentStatus>,
}

async fn list_incidents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListIncidentsQuery>,
) -> ApiResult<Json<Vec<SlaIncident>>> {
    let incidents = state.store.list_incidents(query.status).await?;
    Ok(Json(incidents))
}

#[derive(Debug, Deserialize)]
struct CloseIncidentsRequest {
    entity_type: String,
    entity_id: String,
}

async fn close_incidents(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CloseIncidentsRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if request.entity_type.trim().is_empty() || request.entity_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "entity_type and entity_id are required".into(),
        ));
    }

    let resolved = state
        .reconciler
        .close_incidents_for_entity(&request.entity_type, &request.entity_id)
        .await?;

    Ok(Json(serde_json::json!({ "resolved": resolved })))
}
