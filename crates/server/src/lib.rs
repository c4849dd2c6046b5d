//! HTTP surface of the warden agent
//!
//! ## Key Components
//!
//! - **`gate`**: the framework-neutral interceptor chain (CORS, rate limit,
//!   authentication) every request passes before dispatch.
//! - **`middleware`**: adapts the gate to axum, adding panic recovery,
//!   in-flight accounting and request logging.
//! - **`routes`**: handlers. Capability checks happen here, against the
//!   current capability snapshot, before any host collaborator is called.
//! - **`server`**: listener, periodic upkeep and graceful shutdown.

pub mod error;
pub mod gate;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use gate::{AuthContext, RequestGate};
pub use routes::router;
pub use server::Server;
pub use state::AppState;
