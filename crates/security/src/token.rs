//! Session tokens: HMAC-signed JWTs carrying `{sub, iat, exp, iss}`.
//!
//! Verification reports the first failing check in a fixed order: shape,
//! signing method, signature, expiry, issuer. Expiry uses zero leeway.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use warden_core::constants::{AGENT_NAME, MAX_SESSION_TTL_SECS};

const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unexpected signing method: {alg}")]
    WrongSigningMethod { alg: String },

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token issuer is not {AGENT_NAME}")]
    InvalidIssuer,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// What a verified token says about its bearer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionClaims {
    pub role: String,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issue and verify session tokens
pub trait SessionTokens: Send + Sync {
    /// Issue a token for `role` that expires `ttl` from now (`ttl` may be negative)
    fn issue(&self, role: &str, ttl: Duration) -> Result<String, TokenError>;

    fn verify(&self, token: &str) -> Result<SessionClaims, TokenError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RawClaims {
    sub: String,
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: Option<String>,
}

/// HS256 token service with a key fixed at construction
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.set_issuer(&[AGENT_NAME]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Service keyed with random bytes; its tokens die with the process
    pub fn ephemeral() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(&key)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &Algorithm::HS256)
            .field("issuer", &AGENT_NAME)
            .finish_non_exhaustive()
    }
}

impl SessionTokens for TokenService {
    fn issue(&self, role: &str, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RawClaims {
            sub: role.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: AGENT_NAME.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        check_signing_method(token)?;

        let data = decode::<RawClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                JwtErrorKind::InvalidSignature => TokenError::BadSignature,
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                JwtErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
                JwtErrorKind::InvalidAlgorithm => TokenError::WrongSigningMethod {
                    alg: "unknown".to_string(),
                },
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;

        let claims = data.claims;
        Ok(SessionClaims {
            role: claims.sub,
            issuer: claims.iss,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }
}

/// Key that signed tokens before the last rotation; verify-only
#[derive(Clone)]
struct RetiredKey {
    service: Arc<TokenService>,
    rotated_at: DateTime<Utc>,
}

impl RetiredKey {
    /// Only tokens minted before the rotation, with a lifetime the agent could
    /// have issued, are honoured. `iat` has second precision, so the rotation
    /// second itself is excluded.
    fn honours(&self, claims: &SessionClaims) -> bool {
        claims.issued_at.timestamp() < self.rotated_at.timestamp()
            && claims.expires_at <= self.rotated_at + Duration::seconds(MAX_SESSION_TTL_SECS)
    }
}

/// Session token keys that follow secret rotation.
///
/// New tokens are always signed with the current key. After [`rekey`], the
/// previous key still verifies tokens it signed before the rotation until they
/// expire, but anything it signs afterwards is rejected.
///
/// [`rekey`]: SessionKeys::rekey
pub struct SessionKeys {
    current: RwLock<Arc<TokenService>>,
    retired: RwLock<Option<RetiredKey>>,
}

impl SessionKeys {
    pub fn new(service: TokenService) -> Self {
        Self {
            current: RwLock::new(Arc::new(service)),
            retired: RwLock::new(None),
        }
    }

    /// Sign with `secret` from now on
    pub fn rekey(&self, secret: &[u8]) {
        self.rekey_at(secret, Utc::now());
    }

    pub fn rekey_at(&self, secret: &[u8], now: DateTime<Utc>) {
        let next = Arc::new(TokenService::new(secret));
        let previous = std::mem::replace(&mut *self.current.write(), next);
        *self.retired.write() = Some(RetiredKey {
            service: previous,
            rotated_at: now,
        });
        tracing::info!("session token key rotated");
    }

    fn current(&self) -> Arc<TokenService> {
        self.current.read().clone()
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("retired", &self.retired.read().as_ref().map(|r| r.rotated_at))
            .finish_non_exhaustive()
    }
}

impl SessionTokens for SessionKeys {
    fn issue(&self, role: &str, ttl: Duration) -> Result<String, TokenError> {
        self.current().issue(role, ttl)
    }

    fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        match self.current().verify(token) {
            Err(TokenError::BadSignature) => {}
            other => return other,
        }

        let Some(retired) = self.retired.read().clone() else {
            return Err(TokenError::BadSignature);
        };
        let claims = retired.service.verify(token)?;
        if retired.honours(&claims) {
            Ok(claims)
        } else {
            tracing::warn!(role = %claims.role, "token signed with a retired key after rotation");
            Err(TokenError::BadSignature)
        }
    }
}

/// Reject anything that is not three segments with an HMAC-SHA2 header,
/// before the signature is looked at.
fn check_signing_method(token: &str) -> Result<(), TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::Malformed(
            "expected three dot-separated segments".to_string(),
        ));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|e| TokenError::Malformed(format!("header is not base64url: {e}")))?;
    let header: RawHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| TokenError::Malformed(format!("header is not JSON: {e}")))?;

    match header.alg.as_deref() {
        Some("HS256" | "HS384" | "HS512") => Ok(()),
        Some(other) => Err(TokenError::WrongSigningMethod {
            alg: other.to_string(),
        }),
        None => Err(TokenError::Malformed("header has no alg".to_string())),
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| TokenError::Malformed(format!("timestamp {secs} out of range")))
}
