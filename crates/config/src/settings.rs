//! The agent's settings snapshot

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use warden_core::constants::*;
use warden_core::{Secret, TaskDefinition};

use crate::tasks::default_tasks;

/// Immutable settings for one process lifetime (or until replaced by an update)
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub read_timeout: Duration,
    /// Upper bound for long-running task execution
    pub write_timeout: Duration,

    /// Shared secret; `None` puts the agent into setup mode
    pub api_key: Option<Secret>,
    /// Distinct token signing secret, if configured
    pub jwt_secret: Option<Secret>,

    pub allowed_origins: Vec<String>,
    pub rate_limit_rps: usize,
    pub docker_enabled: bool,
    pub log_level: String,

    pub allowed_services: Vec<String>,
    pub allowed_paths: Vec<String>,
    pub tasks: Vec<TaskDefinition>,

    pub env_file: PathBuf,
    pub shutdown_grace: Duration,
}

/// What `GET /api/settings` reports. Never carries secret material.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub port: u16,
    pub host: String,
    pub allowed_origins: Vec<String>,
    pub allowed_services: Vec<String>,
    pub allowed_paths: Vec<String>,
    pub docker_enabled: bool,
    pub log_level: String,
    pub rate_limit_rps: usize,
    pub env_file: String,
    pub setup_mode: bool,
    pub api_key_configured: bool,
}

impl Settings {
    /// No shared secret configured yet
    #[must_use]
    pub fn setup_mode(&self) -> bool {
        self.api_key.is_none()
    }

    /// `host:port` bind string
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn view(&self, api_key_configured: bool) -> SettingsView {
        SettingsView {
            port: self.port,
            host: self.host.clone(),
            allowed_origins: self.allowed_origins.clone(),
            allowed_services: self.allowed_services.clone(),
            allowed_paths: self.allowed_paths.clone(),
            docker_enabled: self.docker_enabled,
            log_level: self.log_level.clone(),
            rate_limit_rps: self.rate_limit_rps,
            env_file: self.env_file.display().to_string(),
            setup_mode: !api_key_configured,
            api_key_configured,
        }
    }

    /// Settings with fixed secrets and small allow-lists, for tests
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            api_key: Some(Secret::new("test-api-key")),
            jwt_secret: Some(Secret::new("test-jwt-secret")),
            allowed_origins: vec![WILDCARD.to_string()],
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            docker_enabled: true,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            allowed_services: vec!["test-service".to_string()],
            allowed_paths: vec!["/tmp".to_string(), "/var/log".to_string()],
            tasks: default_tasks(),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}
