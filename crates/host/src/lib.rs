//! Host collaborators for warden
//!
//! Thin wrappers around the machine: `sysinfo` for statistics and processes,
//! and the standard host tools (`systemctl`, `journalctl`, `docker`) for
//! everything else. Nothing in here decides whether a caller may do
//! something; callers are authorized before they reach this crate.

pub mod cache;
pub mod command;
pub mod containers;
pub mod files;
pub mod journal;
pub mod metrics;
pub mod processes;
pub mod services;

pub use cache::MetricsCache;
pub use containers::{ContainerRuntime, DockerCli};
pub use files::FileBrowser;
pub use journal::{JournalQuery, JournalReader};
pub use metrics::MetricsCollector;
pub use processes::ProcessManager;
pub use services::{ServiceAction, ServiceManager, Systemctl};
