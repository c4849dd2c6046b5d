//! Task execution for warden
//!
//! Tasks are predefined shell commands from the capability table. This crate
//! only runs them; deciding whether a caller may run one is the security
//! crate's job.

pub mod executor;

pub use executor::{SystemTaskExecutor, TaskExecutor, TaskResult};
