//! First-run flow: only reachable while no shared secret is configured

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use warden_core::{Error, Secret};
use warden_security::generate_secret;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SaveKeyRequest {
    pub api_key: Option<String>,
}

impl SaveKeyRequest {
    pub fn into_secret(self) -> ApiResult<Secret> {
        self.api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Secret::new)
            .ok_or_else(|| Error::bad_request("invalid request: api_key is required").into())
    }
}

fn ensure_open(state: &AppState) -> ApiResult<()> {
    if state.credentials.is_configured() {
        return Err(Error::conflict("setup already completed").into());
    }
    Ok(())
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "setup_mode": !state.credentials.is_configured(),
        "env_file": state.settings().env_file.display().to_string(),
    }))
}

pub async fn generate(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_open(&state)?;
    Ok(Json(json!({ "api_key": generate_secret() })))
}

/// Persist and activate the first secret; the setup endpoints close behind it
pub async fn save(
    State(state): State<AppState>,
    body: Option<Json<SaveKeyRequest>>,
) -> ApiResult<Json<Value>> {
    let secret = body.map(|Json(b)| b).unwrap_or_default().into_secret()?;

    let _guard = state.secret_lock.lock();
    ensure_open(&state)?;
    state.rotate_secret(secret)?;

    tracing::info!("setup completed, shared secret configured");
    Ok(Json(json!({
        "message": "API key saved successfully",
        "env_file": state.settings().env_file.display().to_string(),
    })))
}
