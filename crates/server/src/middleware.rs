//! axum adapter for the request gate.
//!
//! Wraps the whole chain and the handler in panic recovery, counts the request
//! as in flight, and logs one line per request once the response is ready.

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::error::error_response;
use crate::gate::{GateContext, GateRequest, GateResponse, Verdict};
use crate::state::AppState;

pub async fn gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let _in_flight = state.in_flight.enter();
    let started = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let mut ctx = GateContext::new(gate_request(&request, peer));
    let mut response = match dispatch(&state, &mut ctx, request, next).await {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(
                method = %method,
                path = %path,
                panic = %panic_message(panic.as_ref()),
                "handler panicked"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    };
    // Whatever the gate decided about CORS applies to failures too
    response
        .headers_mut()
        .extend(std::mem::take(&mut ctx.response_headers));

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        client = %peer.map_or_else(|| "unknown".to_string(), |p| p.ip().to_string()),
        authenticated = ctx.auth.is_some(),
        "request"
    );

    response
}

fn gate_request(request: &Request, peer: Option<SocketAddr>) -> GateRequest {
    let query = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(q)| q)
        .unwrap_or_default();

    GateRequest {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        headers: request.headers().clone(),
        query,
        peer,
    }
}

/// Run the chain, then the handler. A panic in either unwinds to here; the
/// context keeps the response headers set before it.
async fn dispatch(
    state: &AppState,
    ctx: &mut GateContext,
    mut request: Request,
    next: Next,
) -> Result<Response, Box<dyn Any + Send>> {
    let verdict = panic::catch_unwind(AssertUnwindSafe(|| state.gate.evaluate(ctx)))?;

    match verdict {
        Verdict::Respond(answer) => Ok(render(answer)),
        Verdict::Continue => {
            if let Some(auth) = ctx.auth.clone() {
                request.extensions_mut().insert(auth);
            }
            AssertUnwindSafe(next.run(request)).catch_unwind().await
        }
    }
}

fn render(answer: GateResponse) -> Response {
    match answer.body {
        Some(body) => (answer.status, Json(body)).into_response(),
        None => answer.status.into_response(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_render_without_body() {
        let response = render(GateResponse::empty(StatusCode::NO_CONTENT));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
