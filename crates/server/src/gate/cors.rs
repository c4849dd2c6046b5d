use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use warden_core::is_wildcard_list;

use super::{GateContext, GateResponse, Interceptor, Verdict};

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Origin, Content-Type, Authorization";
const MAX_AGE: &str = "86400";

/// Cross-origin headers, and the answer to preflight requests
#[derive(Debug, Clone)]
pub struct Cors {
    allowed_origins: Vec<String>,
}

impl Cors {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    fn allow_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        if is_wildcard_list(&self.allowed_origins) {
            return Some(HeaderValue::from_static("*"));
        }
        let origin = origin?;
        let text = origin.to_str().ok()?;
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == text)
            .then(|| origin.clone())
    }
}

impl Interceptor for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn intercept(&self, ctx: &mut GateContext) -> Verdict {
        let headers = &mut ctx.response_headers;
        if let Some(origin) = self.allow_origin(ctx.request.headers.get(ORIGIN)) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE));

        if ctx.request.method == Method::OPTIONS {
            return Verdict::Respond(GateResponse::empty(StatusCode::NO_CONTENT));
        }
        Verdict::Continue
    }
}
