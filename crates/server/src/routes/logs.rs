use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use warden_host::journal::{LogStream, DEFAULT_LINES};
use warden_host::JournalQuery;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FollowParams {
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    unit: Option<String>,
    priority: Option<String>,
    lines: Option<String>,
    since: Option<String>,
    until: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinesParam {
    lines: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Numeric query values that fail to parse are ignored
fn number<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    non_empty(value).and_then(|v| v.trim().parse().ok())
}

fn check_unit(state: &AppState, unit: Option<&str>) -> ApiResult<()> {
    if let Some(unit) = unit {
        state.capabilities.snapshot().check_service(unit)?;
    }
    Ok(())
}

/// Follow the journal as `log` server-sent events
pub async fn follow(
    State(state): State<AppState>,
    Query(params): Query<FollowParams>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let unit = non_empty(params.unit);
    check_unit(&state, unit.as_deref())?;

    let entries = state.journal.follow(unit.as_deref())?;
    tracing::debug!(unit = ?unit, "journal follow started");

    let events = entries
        .map(|entry| {
            let event = Event::default()
                .event("log")
                .json_data(&entry)
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
            Ok::<_, Infallible>(event)
        })
        .take_until(state.shutdown.listener().wait());

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<LogStream>> {
    let query = JournalQuery {
        unit: non_empty(params.unit),
        priority: number(params.priority),
        lines: number(params.lines),
        since: non_empty(params.since),
        until: non_empty(params.until),
    };
    check_unit(&state, query.unit.as_deref())?;

    Ok(Json(state.journal.query(&query).await?))
}

pub async fn unit(
    State(state): State<AppState>,
    Path(unit): Path<String>,
    Query(params): Query<LinesParam>,
) -> ApiResult<Json<Value>> {
    check_unit(&state, Some(&unit))?;
    let lines = number(params.lines).filter(|n| *n > 0).unwrap_or(DEFAULT_LINES);
    let entries = state.journal.recent(&unit, lines).await?;

    Ok(Json(json!({
        "unit": unit,
        "entries": entries,
    })))
}
