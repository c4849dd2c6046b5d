use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use warden_config::settings::SettingsView;
use warden_config::EnvFile;
use warden_core::constants::{ALLOWED_PATHS_VAR, ALLOWED_SERVICES_VAR};
use warden_core::Error;
use warden_security::generate_secret;

use super::setup::SaveKeyRequest;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    allowed_paths: Option<Vec<String>>,
    allowed_services: Option<Vec<String>>,
}

fn clean(items: Option<Vec<String>>) -> Option<Vec<String>> {
    items
        .map(|list| {
            list.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|list| !list.is_empty())
}

pub async fn get(State(state): State<AppState>) -> Json<SettingsView> {
    Json(state.settings().view(state.credentials.is_configured()))
}

/// Persist new allow-lists and swap them in for subsequent requests
pub async fn update(
    State(state): State<AppState>,
    body: Option<Json<SettingsUpdate>>,
) -> ApiResult<Json<Value>> {
    let Some(Json(update)) = body else {
        return Err(Error::bad_request("invalid request").into());
    };
    let paths = clean(update.allowed_paths);
    let services = clean(update.allowed_services);
    if paths.is_none() && services.is_none() {
        return Err(Error::bad_request("no settings to update").into());
    }

    let _guard = state.settings_lock.lock();
    let mut settings = (*state.settings()).clone();
    let mut updates = Vec::new();
    if let Some(paths) = paths {
        updates.push((ALLOWED_PATHS_VAR, paths.join(",")));
        settings.allowed_paths = paths;
    }
    if let Some(services) = services {
        updates.push((ALLOWED_SERVICES_VAR, services.join(",")));
        settings.allowed_services = services;
    }

    EnvFile::new(settings.env_file.clone()).update(&updates)?;

    let response = json!({
        "message": "settings updated",
        "allowed_paths": settings.allowed_paths,
        "allowed_services": settings.allowed_services,
    });
    tracing::info!(
        paths = ?settings.allowed_paths,
        services = ?settings.allowed_services,
        "allow-lists updated"
    );
    state.replace_settings(settings);

    Ok(Json(response))
}

pub async fn generate_key() -> Json<Value> {
    Json(json!({ "api_key": generate_secret() }))
}

/// Replace the shared secret. Outstanding session tokens stay valid until they expire.
pub async fn rotate_key(
    State(state): State<AppState>,
    body: Option<Json<SaveKeyRequest>>,
) -> ApiResult<Json<Value>> {
    let secret = body.map(|Json(b)| b).unwrap_or_default().into_secret()?;

    let _guard = state.secret_lock.lock();
    state.rotate_secret(secret)?;

    Ok(Json(json!({
        "message": "API key saved successfully",
        "env_file": state.settings().env_file.display().to_string(),
    })))
}
