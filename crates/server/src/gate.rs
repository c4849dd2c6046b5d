//! The request gate.
//!
//! Every request runs through an ordered chain of [`Interceptor`]s before a
//! handler sees it. Each stage either lets the request continue or answers it
//! on the spot, in which case nothing after it runs. The chain itself knows
//! nothing about axum; [`crate::middleware`] adapts it.

pub mod auth;
pub mod cors;
pub mod rate;

use axum::http::{HeaderMap, Method, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use warden_core::AuthMethod;
use warden_security::SessionClaims;

pub use auth::{extract_token, Authenticate};
pub use cors::Cors;
pub use rate::RateLimit;

/// Path prefix of the routes that require authentication
pub const PROTECTED_PREFIX: &str = "/api/";

/// What the gate sees of a request
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub peer: Option<SocketAddr>,
}

impl GateRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            peer: None,
        }
    }

    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.path.starts_with(PROTECTED_PREFIX)
    }

    /// Rate-limit key: the peer IP, without the port
    #[must_use]
    pub fn client_key(&self) -> String {
        self.peer
            .map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
    }
}

/// Identity established by the authentication stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    Secret,
    Session(SessionClaims),
}

impl AuthContext {
    #[must_use]
    pub fn method(&self) -> AuthMethod {
        match self {
            AuthContext::Secret => AuthMethod::Secret,
            AuthContext::Session(_) => AuthMethod::Session,
        }
    }
}

/// A request moving through the chain
#[derive(Debug)]
pub struct GateContext {
    pub request: GateRequest,
    /// Headers added to whatever response ends up being sent
    pub response_headers: HeaderMap,
    pub auth: Option<AuthContext>,
}

impl GateContext {
    #[must_use]
    pub fn new(request: GateRequest) -> Self {
        Self {
            request,
            response_headers: HeaderMap::new(),
            auth: None,
        }
    }
}

/// Terminal answer produced by an interceptor
#[derive(Debug, Clone, PartialEq)]
pub struct GateResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl GateResponse {
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    #[must_use]
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: Some(json!({ "error": message })),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Continue,
    Respond(GateResponse),
}

/// One stage of the gate
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn intercept(&self, ctx: &mut GateContext) -> Verdict;
}

/// The ordered chain
pub struct RequestGate {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl RequestGate {
    #[must_use]
    pub fn new(interceptors: Vec<Box<dyn Interceptor>>) -> Self {
        Self { interceptors }
    }

    /// Run the chain until a stage answers or every stage lets the request through
    pub fn evaluate(&self, ctx: &mut GateContext) -> Verdict {
        for interceptor in &self.interceptors {
            if let Verdict::Respond(response) = interceptor.intercept(ctx) {
                tracing::debug!(
                    stage = interceptor.name(),
                    status = response.status.as_u16(),
                    path = %ctx.request.path,
                    "request stopped at gate"
                );
                return Verdict::Respond(response);
            }
        }
        Verdict::Continue
    }

    pub fn stages(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.interceptors.iter().map(|i| i.name())
    }
}

impl std::fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stages()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        calls: Arc<AtomicUsize>,
        verdict: Verdict,
    }

    impl Interceptor for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn intercept(&self, _ctx: &mut GateContext) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    #[test]
    fn test_chain_short_circuits() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let gate = RequestGate::new(vec![
            Box::new(Counting {
                calls: Arc::clone(&first),
                verdict: Verdict::Respond(GateResponse::empty(StatusCode::NO_CONTENT)),
            }),
            Box::new(Counting {
                calls: Arc::clone(&second),
                verdict: Verdict::Continue,
            }),
        ]);

        let mut ctx = GateContext::new(GateRequest::new(Method::GET, "/health"));
        assert!(matches!(gate.evaluate(&mut ctx), Verdict::Respond(_)));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_client_key_drops_port() {
        let mut request = GateRequest::new(Method::GET, "/api/info");
        assert_eq!(request.client_key(), "unknown");
        request.peer = Some("10.0.0.7:51234".parse().unwrap());
        assert_eq!(request.client_key(), "10.0.0.7");
        assert!(request.is_protected());
        assert!(!GateRequest::new(Method::GET, "/apix").is_protected());
    }
}
