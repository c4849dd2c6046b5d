use axum::extract::State;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use warden_core::constants::MAX_SESSION_TTL_SECS;
use warden_core::Error;
use warden_security::SessionTokens;

use crate::error::ApiResult;
use crate::gate::AuthContext;
use crate::state::AppState;

const DEFAULT_ROLE: &str = "admin";
const DEFAULT_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    role: Option<String>,
    ttl_seconds: Option<i64>,
}

/// Exchange the shared secret for a session token.
///
/// Only callers holding the secret itself may mint tokens; a session cannot
/// extend itself.
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Option<Json<TokenRequest>>,
) -> ApiResult<Json<Value>> {
    if auth != AuthContext::Secret {
        return Err(Error::forbidden(
            "auth/token",
            "session tokens can only be issued with the shared secret",
        )
        .into());
    }

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let role = request
        .role
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_ROLE.to_string());
    let ttl_seconds = request.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
    if !(1..=MAX_SESSION_TTL_SECS).contains(&ttl_seconds) {
        return Err(Error::bad_request(format!(
            "ttl_seconds must be between 1 and {MAX_SESSION_TTL_SECS}"
        ))
        .into());
    }

    let ttl = Duration::seconds(ttl_seconds);
    let token = state
        .tokens
        .issue(&role, ttl)
        .map_err(|e| Error::internal(e.to_string()))?;

    tracing::info!(role = %role, ttl_seconds, "session token issued");
    Ok(Json(json!({
        "token": token,
        "role": role,
        "expires_at": Utc::now() + ttl,
    })))
}
