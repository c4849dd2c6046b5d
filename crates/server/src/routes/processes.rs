use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use warden_core::Error;
use warden_host::processes::{KillRequest, KillResponse, ProcessList, DEFAULT_LIMIT};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<usize>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ProcessList>> {
    let limit = params.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
    Ok(Json(state.processes.list_top(limit).await?))
}

pub async fn kill(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    body: Option<Json<KillRequest>>,
) -> ApiResult<Json<KillResponse>> {
    let pid: u32 = pid
        .parse()
        .map_err(|_| Error::bad_request(format!("invalid pid '{pid}'")))?;
    let signal = body.and_then(|Json(req)| req.signal);

    tracing::info!(pid, signal, "kill requested");
    Ok(Json(state.processes.kill(pid, signal).await?))
}
