use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;
use warden_core::{Error, AGENT_NAME, AGENT_VERSION};
use warden_host::cache::{KEY_ALL, KEY_CPU, KEY_DISK, KEY_MEMORY, KEY_NETWORK};

use crate::error::ApiResult;
use crate::state::AppState;

/// Push interval of `/api/events`
pub const EVENT_INTERVAL: Duration = Duration::from_secs(2);

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "version": AGENT_VERSION,
        "setup_mode": !state.credentials.is_configured(),
    }))
}

pub async fn info(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let host = state.metrics.host().await?;
    Ok(Json(json!({
        "hostname": host.hostname,
        "os": host.os,
        "platform": host.platform,
        "kernel": host.kernel_version,
        "arch": host.kernel_arch,
        "uptime": host.uptime_human,
        "agent": AGENT_NAME,
        "version": AGENT_VERSION,
        "agent_uptime_seconds": state.uptime().as_secs(),
    })))
}

pub async fn all_metrics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    cached(&state, KEY_ALL, || state.metrics.all()).await
}

pub async fn cpu(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    cached(&state, KEY_CPU, || state.metrics.cpu()).await
}

pub async fn memory(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    cached(&state, KEY_MEMORY, || state.metrics.memory()).await
}

pub async fn disk(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    cached(&state, KEY_DISK, || state.metrics.disk()).await
}

pub async fn network(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    cached(&state, KEY_NETWORK, || state.metrics.network()).await
}

async fn cached<T, F, Fut>(state: &AppState, key: &'static str, collect: F) -> ApiResult<Json<Value>>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = warden_core::Result<T>>,
{
    let value = state
        .metrics_cache
        .get_or_try_insert(key, || async move {
            let metrics = collect().await?;
            Ok::<_, Error>(serde_json::to_value(metrics)?)
        })
        .await?;
    Ok(Json(value))
}

/// Server-sent `metrics` events until the client leaves or the agent shuts down
pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let shutdown = state.shutdown.listener();

    let ticks = stream::unfold((state, true), |(state, first)| async move {
        if !first {
            tokio::time::sleep(EVENT_INTERVAL).await;
        }
        let event = metrics_event(&state).await;
        Some((Ok::<_, Infallible>(event), (state, false)))
    });

    Sse::new(ticks.take_until(shutdown.wait())).keep_alive(KeepAlive::default())
}

async fn metrics_event(state: &AppState) -> Event {
    let rendered = match state.metrics.all().await {
        Ok(metrics) => Event::default().event("metrics").json_data(&metrics),
        Err(e) => {
            tracing::warn!(error = %e, "metrics collection failed");
            Event::default()
                .event("error")
                .json_data(json!({ "error": e.public_message() }))
        }
    };
    rendered.unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
