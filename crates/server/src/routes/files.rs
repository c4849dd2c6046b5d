use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use warden_host::files::{DirectoryListing, DiskUsageInfo, FileContent};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PathParam {
    #[serde(default)]
    path: String,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PathParam>,
) -> ApiResult<Json<DirectoryListing>> {
    let path = state.capabilities.snapshot().check_path(&params.path)?;
    Ok(Json(state.files.list_directory(&path).await?))
}

pub async fn content(
    State(state): State<AppState>,
    Query(params): Query<PathParam>,
) -> ApiResult<Json<FileContent>> {
    let path = state.capabilities.snapshot().check_path(&params.path)?;
    Ok(Json(state.files.read_file(&path).await?))
}

pub async fn disk_usage(
    State(state): State<AppState>,
    Query(params): Query<PathParam>,
) -> ApiResult<Json<DiskUsageInfo>> {
    let path = state.capabilities.snapshot().check_path(&params.path)?;
    Ok(Json(state.files.disk_usage(&path).await?))
}
