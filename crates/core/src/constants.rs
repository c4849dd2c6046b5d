/// Constants used throughout the warden codebase
// Identity
pub const AGENT_NAME: &str = "warden-agent";
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

// Environment variable names
pub const ENV_FILE_VAR: &str = "ENV_FILE";
pub const HOST_VAR: &str = "HOST";
pub const PORT_VAR: &str = "PORT";
pub const READ_TIMEOUT_VAR: &str = "READ_TIMEOUT_SECONDS";
pub const WRITE_TIMEOUT_VAR: &str = "WRITE_TIMEOUT_SECONDS";
pub const API_KEY_VAR: &str = "API_KEY";
pub const JWT_SECRET_VAR: &str = "JWT_SECRET";
pub const ALLOWED_ORIGINS_VAR: &str = "ALLOWED_ORIGINS";
pub const RATE_LIMIT_RPS_VAR: &str = "RATE_LIMIT_RPS";
pub const DOCKER_ENABLED_VAR: &str = "DOCKER_ENABLED";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const ALLOWED_SERVICES_VAR: &str = "ALLOWED_SERVICES";
pub const ALLOWED_PATHS_VAR: &str = "ALLOWED_PATHS";
pub const SHUTDOWN_GRACE_VAR: &str = "SHUTDOWN_GRACE_SECONDS";

// Defaults
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8091;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_RATE_LIMIT_RPS: usize = 100;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

pub const DEFAULT_ALLOWED_SERVICES: &[&str] = &[
    "warden-agent",
    "docker",
    "nginx",
    "ssh",
    "tailscaled",
];

/// Browsable roots used when the path allow-list is empty
pub const DEFAULT_ALLOWED_PATHS: &[&str] = &["/var/log", "/etc", "/home", "/opt", "/tmp"];

/// Allow-list entry meaning "everything"
pub const WILDCARD: &str = "*";

/// Minimum accepted length for a saved shared secret
pub const MIN_SECRET_LEN: usize = 32;

/// Longest lifetime a session token may be issued with (7 days)
pub const MAX_SESSION_TTL_SECS: i64 = 7 * 24 * 3600;
