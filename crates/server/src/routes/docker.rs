use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use warden_core::Error;
use warden_host::containers::{ContainerActionResult, ContainerInfo, ContainerList, LogOptions};
use warden_host::ServiceAction;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    all: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    tail: Option<String>,
    since: Option<String>,
    until: Option<String>,
    timestamps: Option<String>,
}

fn flag(value: Option<&str>) -> bool {
    matches!(value, Some("true" | "1"))
}

fn ensure_enabled(state: &AppState) -> ApiResult<()> {
    if state.settings().docker_enabled {
        Ok(())
    } else {
        Err(Error::unavailable("docker", "disabled by configuration").into())
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ContainerList>> {
    ensure_enabled(&state)?;
    let containers = state.containers.list(flag(params.all.as_deref())).await?;
    Ok(Json(ContainerList {
        total: containers.len(),
        containers,
    }))
}

pub async fn inspect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContainerInfo>> {
    ensure_enabled(&state)?;
    Ok(Json(state.containers.inspect(&id).await?))
}

pub async fn act(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> ApiResult<Json<ContainerActionResult>> {
    ensure_enabled(&state)?;
    let action: ServiceAction = action.parse()?;
    Ok(Json(state.containers.act(&id, action).await?))
}

pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LogParams>,
) -> ApiResult<Json<Value>> {
    ensure_enabled(&state)?;
    let options = LogOptions {
        tail: params.tail,
        since: params.since.filter(|s| !s.is_empty()),
        until: params.until.filter(|s| !s.is_empty()),
        timestamps: flag(params.timestamps.as_deref()),
    };
    let logs = state.containers.logs(&id, &options).await?;

    Ok(Json(json!({
        "id": id,
        "logs": logs,
    })))
}
