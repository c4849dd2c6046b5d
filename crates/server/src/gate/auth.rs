use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use warden_security::{CredentialStore, SessionTokens};

use super::{AuthContext, GateContext, GateResponse, Interceptor, Verdict};

const BEARER_PREFIX: &str = "Bearer ";
const TOKEN_QUERY_PARAM: &str = "token";

pub const MISSING_TOKEN: &str = "missing authentication token";
pub const INVALID_TOKEN: &str = "invalid authentication token";

/// The presented credential.
///
/// `Authorization: Bearer <t>` first, then any other `Authorization` value
/// used as-is, then the `token` query parameter. A non-empty header always
/// wins over the query.
#[must_use]
pub fn extract_token(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(value) = header {
        let token = value.strip_prefix(BEARER_PREFIX).map_or(value, str::trim);
        return Some(token.to_string()).filter(|t| !t.is_empty());
    }

    query
        .get(TOKEN_QUERY_PARAM)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Shared secret or session token, for everything under `/api/`
pub struct Authenticate {
    credentials: Arc<CredentialStore>,
    tokens: Arc<dyn SessionTokens>,
}

impl Authenticate {
    pub fn new(credentials: Arc<CredentialStore>, tokens: Arc<dyn SessionTokens>) -> Self {
        Self {
            credentials,
            tokens,
        }
    }

    fn authenticate(&self, token: &str) -> Option<AuthContext> {
        if self.credentials.validate(token) {
            return Some(AuthContext::Secret);
        }
        match self.tokens.verify(token) {
            Ok(claims) => Some(AuthContext::Session(claims)),
            Err(e) => {
                tracing::debug!(error = %e, "session token rejected");
                None
            }
        }
    }
}

impl Interceptor for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn intercept(&self, ctx: &mut GateContext) -> Verdict {
        if !ctx.request.is_protected() {
            return Verdict::Continue;
        }

        let Some(token) = extract_token(&ctx.request.headers, &ctx.request.query) else {
            return Verdict::Respond(GateResponse::error(StatusCode::UNAUTHORIZED, MISSING_TOKEN));
        };

        match self.authenticate(&token) {
            Some(auth) => {
                ctx.auth = Some(auth);
                Verdict::Continue
            }
            None => {
                tracing::warn!(
                    client = %ctx.request.client_key(),
                    path = %ctx.request.path,
                    "authentication failed"
                );
                Verdict::Respond(GateResponse::error(StatusCode::UNAUTHORIZED, INVALID_TOKEN))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateRequest;
    use axum::http::{HeaderValue, Method};
    use chrono::Duration;
    use warden_core::{Result, Secret};
    use warden_security::{SecretPersistence, TokenService};

    struct NoPersistence;

    impl SecretPersistence for NoPersistence {
        fn persist(&self, _secret: &Secret) -> Result<()> {
            Ok(())
        }
    }

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn stage() -> (Authenticate, Arc<TokenService>) {
        let credentials = Arc::new(CredentialStore::new(
            Some(Secret::new(KEY)),
            None,
            Box::new(NoPersistence),
        ));
        let tokens = Arc::new(TokenService::new(KEY.as_bytes()));
        let dyn_tokens: Arc<dyn SessionTokens> = tokens.clone();
        (Authenticate::new(credentials, dyn_tokens), tokens)
    }

    fn request(path: &str, authorization: Option<&str>) -> GateContext {
        let mut request = GateRequest::new(Method::GET, path);
        if let Some(value) = authorization {
            request
                .headers
                .insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        GateContext::new(request)
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_extract_precedence() {
        let mut headers = HeaderMap::new();
        let q = query(&[("token", "from-query")]);
        assert_eq!(extract_token(&headers, &q).as_deref(), Some("from-query"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("raw-token"));
        assert_eq!(extract_token(&headers, &q).as_deref(), Some("raw-token"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers, &q).as_deref(), Some("abc"));

        assert_eq!(extract_token(&HeaderMap::new(), &HashMap::new()), None);
    }

    #[test]
    fn test_public_paths_skip_auth() {
        let (stage, _) = stage();
        let mut ctx = request("/health", None);
        assert_eq!(stage.intercept(&mut ctx), Verdict::Continue);
        assert!(ctx.auth.is_none());
    }

    #[test]
    fn test_missing_and_invalid() {
        let (stage, _) = stage();
        assert_eq!(
            stage.intercept(&mut request("/api/info", None)),
            Verdict::Respond(GateResponse::error(StatusCode::UNAUTHORIZED, MISSING_TOKEN))
        );
        assert_eq!(
            stage.intercept(&mut request("/api/info", Some("Bearer nope"))),
            Verdict::Respond(GateResponse::error(StatusCode::UNAUTHORIZED, INVALID_TOKEN))
        );
    }

    #[test]
    fn test_secret_and_session() {
        let (stage, tokens) = stage();

        let mut ctx = request("/api/info", Some(&format!("Bearer {KEY}")));
        assert_eq!(stage.intercept(&mut ctx), Verdict::Continue);
        assert_eq!(ctx.auth, Some(AuthContext::Secret));

        let token = tokens.issue("viewer", Duration::hours(1)).unwrap();
        let mut ctx = request("/api/info", Some(&format!("Bearer {token}")));
        assert_eq!(stage.intercept(&mut ctx), Verdict::Continue);
        match ctx.auth {
            Some(AuthContext::Session(claims)) => assert_eq!(claims.role, "viewer"),
            other => panic!("expected session, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_session_is_rejected() {
        let (stage, tokens) = stage();
        let token = tokens.issue("viewer", Duration::hours(-1)).unwrap();
        let mut ctx = request("/api/info", Some(&format!("Bearer {token}")));
        assert!(matches!(stage.intercept(&mut ctx), Verdict::Respond(_)));
    }
}
