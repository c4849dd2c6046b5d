use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use warden_task::TaskResult;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunParams {
    confirm: Option<String>,
}

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let capabilities = state.capabilities.snapshot();
    let tasks: Vec<_> = capabilities.tasks().cloned().collect();
    Json(json!({
        "total": tasks.len(),
        "tasks": tasks,
    }))
}

pub async fn run(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<RunParams>,
) -> ApiResult<Json<TaskResult>> {
    let confirmed = params.confirm.as_deref() == Some("true");
    let task = state
        .capabilities
        .snapshot()
        .check_task(&name, confirmed)?
        .clone();

    tracing::info!(task = %task.name, dangerous = task.dangerous, "running task");
    Ok(Json(state.tasks.run(&task).await?))
}
