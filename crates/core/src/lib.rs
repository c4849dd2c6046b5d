//! Core domain types, errors, and constants for the `warden` agent.
//!
//! ## Key Components
//!
//! - **`errors`**: The primary `Error` enum and `Result` alias. Every variant
//!   classifies into an [`ErrorKind`], which is what the HTTP layer turns into
//!   a status code.
//! - **`types`**: Domain types shared across crates, such as the redacted
//!   [`Secret`] and the immutable [`TaskDefinition`].
//! - **`constants`**: Environment variable names, defaults, and identity
//!   strings.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, ErrorKind, Result},
    types::*,
};
