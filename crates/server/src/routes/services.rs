use axum::extract::{Path, State};
use axum::Json;
use warden_host::services::{ServiceActionResult, ServiceInfo, ServiceList};
use warden_host::ServiceAction;

use crate::error::ApiResult;
use crate::state::AppState;

/// Loaded units that are on the service allow-list
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<ServiceList>> {
    let capabilities = state.capabilities.snapshot();
    let services: Vec<ServiceInfo> = state
        .services
        .list()
        .await?
        .into_iter()
        .filter(|s| capabilities.is_service_allowed(&s.name))
        .collect();

    Ok(Json(ServiceList {
        total: services.len(),
        services,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceInfo>> {
    state.capabilities.snapshot().check_service(&name)?;
    Ok(Json(state.services.get(&name).await?))
}

pub async fn act(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
) -> ApiResult<Json<ServiceActionResult>> {
    let action: ServiceAction = action.parse()?;
    state.capabilities.snapshot().check_service(&name)?;
    Ok(Json(state.services.act(&name, action).await?))
}
