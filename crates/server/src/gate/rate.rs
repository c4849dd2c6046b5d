use axum::http::StatusCode;
use std::sync::Arc;
use warden_security::RateLimiter;

use super::{GateContext, GateResponse, Interceptor, Verdict};

/// Per-client admission, keyed on the peer IP
#[derive(Debug, Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl Interceptor for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn intercept(&self, ctx: &mut GateContext) -> Verdict {
        let key = ctx.request.client_key();
        if self.limiter.allow(&key) {
            return Verdict::Continue;
        }

        tracing::warn!(client = %key, path = %ctx.request.path, "rate limit exceeded");
        Verdict::Respond(GateResponse::error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate limit exceeded",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateRequest;
    use axum::http::Method;
    use warden_security::RateLimitConfig;

    fn ctx(peer: &str) -> GateContext {
        let mut request = GateRequest::new(Method::GET, "/health");
        request.peer = Some(peer.parse().unwrap());
        GateContext::new(request)
    }

    #[test]
    fn test_ports_share_a_window() {
        let stage = RateLimit::new(Arc::new(RateLimiter::new(RateLimitConfig::per_second(2))));
        assert_eq!(stage.intercept(&mut ctx("10.0.0.1:1000")), Verdict::Continue);
        assert_eq!(stage.intercept(&mut ctx("10.0.0.1:2000")), Verdict::Continue);

        let Verdict::Respond(response) = stage.intercept(&mut ctx("10.0.0.1:3000")) else {
            panic!("third request should be limited");
        };
        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(stage.intercept(&mut ctx("10.0.0.2:1000")), Verdict::Continue);
    }
}
