// Workflow and run endpoints

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiResult, AppError};
use crate::AppState;
use tempo_shared::{RunStatus, Workflow, WorkflowRun};

pub fn workflow_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_workflows))
}

pub fn run_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_runs))
}

pub fn trigger_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(enqueue_trigger))
}

async fn list_workflows(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Workflow>>> {
    let workflows = state.store.list_workflows().await?;
    Ok(Json(workflows))
}

#[derive(Debug, Deserialize)]
struct ListRunsQuery {
    status: Option<RunStatus>,
}

async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRunsQuery>,
) -> ApiResult<Json<Vec<WorkflowRun>>> {
    let runs = state.store.list_runs(query.status).await?;
    Ok(Json(runs))
}

#[derive(Debug, Deserialize)]
struct EnqueueTriggerRequest {
    trigger_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

async fn enqueue_trigger(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnqueueTriggerRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if request.trigger_type.trim().is_empty() {
        return Err(AppError::BadRequest("trigger_type is required".into()));
    }

    let runs = state
        .engine
        .enqueue_trigger(&request.trigger_type, request.payload)
        .await?;

    Ok(Json(serde_json::json!({ "queued": runs.len() })))
}
