//! Shared utilities for warden
//!
//! Small pieces used by more than one crate: atomic file persistence, the
//! tracing subscriber setup, and the process-wide shutdown signal.

pub mod atomic_file;
pub mod logging;
pub mod shutdown;

pub use atomic_file::*;
pub use shutdown::{Shutdown, ShutdownListener};
