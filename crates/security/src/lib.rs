//! Access-control core for warden
//!
//! Everything a request must pass before a handler may touch the host:
//! - `credentials`: the shared secret, checked in constant time, rotatable
//! - `token`: signed, time-bounded session tokens
//! - `rate_limit`: exact sliding-window admission per client key
//! - `capabilities`: closed-world allow-lists for services, paths and tasks

pub mod capabilities;
pub mod credentials;
pub mod rate_limit;
pub mod token;

pub use capabilities::{CapabilityRegistry, CapabilityStore};
pub use credentials::{generate_secret, CredentialStore, SecretPersistence};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use token::{SessionClaims, SessionKeys, SessionTokens, TokenError, TokenService};
