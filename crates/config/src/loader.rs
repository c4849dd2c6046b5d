//! Settings loader
//!
//! Reads the env file (if any) and the process environment, with process
//! variables taking precedence, and produces a [`Settings`] snapshot. Values
//! that fail to parse fall back to their defaults with a warning rather than
//! aborting startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use warden_core::constants::*;
use warden_core::{Error, Result, Secret};

use crate::settings::Settings;
use crate::tasks::default_tasks;

/// Builder-style loader; by default it reads the real process environment
#[derive(Debug, Default)]
pub struct SettingsLoader {
    env_file: Option<PathBuf>,
    vars: Option<HashMap<String, String>>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this env file instead of discovering one
    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Use these variables instead of the process environment
    pub fn vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }

    /// Load the settings
    pub fn load(self) -> Result<Settings> {
        let process_vars = self.vars.unwrap_or_else(|| std::env::vars().collect());

        let env_file = self
            .env_file
            .or_else(|| process_vars.get(ENV_FILE_VAR).filter(|v| !v.is_empty()).map(PathBuf::from))
            .unwrap_or_else(discover_env_file);

        let mut merged = read_env_file(&env_file)?;
        merged.extend(process_vars);

        Ok(build(&Vars(merged), env_file))
    }
}

/// `.env` in the working directory, then next to the executable
fn discover_env_file() -> PathBuf {
    let local = PathBuf::from(DEFAULT_ENV_FILE);
    if local.exists() {
        return local;
    }

    if let Some(beside_exe) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_ENV_FILE)))
    {
        if beside_exe.exists() {
            return beside_exe;
        }
    }

    local
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no env file, using process environment only");
        return Ok(HashMap::new());
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        Error::configuration(format!("failed to read env file '{}': {e}", path.display()))
    })?;

    let mut vars = HashMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unparsable env file line");
            }
        }
    }
    Ok(vars)
}

struct Vars(HashMap<String, String>);

impl Vars {
    fn string(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.string(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(variable = key, value = %raw, "invalid value, using default");
                default
            }),
            None => default,
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.string(key).as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("1" | "t" | "true" | "yes" | "on") => true,
            Some("0" | "f" | "false" | "no" | "off") => false,
            Some(other) => {
                tracing::warn!(variable = key, value = other, "invalid boolean, using default");
                default
            }
            None => default,
        }
    }

    /// Comma-separated list; unset or blank means `default`
    fn list_or(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.0.get(key).filter(|v| !v.trim().is_empty()) {
            Some(raw) => split_list(raw),
            None => default.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn secret(&self, key: &str) -> Option<Secret> {
        self.string(key).map(Secret::new)
    }
}

/// Split a comma-separated value, trimming items and dropping empty ones
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn build(vars: &Vars, env_file: PathBuf) -> Settings {
    let mut rate_limit_rps = vars.parsed_or(RATE_LIMIT_RPS_VAR, DEFAULT_RATE_LIMIT_RPS);
    if rate_limit_rps == 0 {
        tracing::warn!(variable = RATE_LIMIT_RPS_VAR, "rate limit must be positive, using default");
        rate_limit_rps = DEFAULT_RATE_LIMIT_RPS;
    }

    Settings {
        host: vars.string_or(HOST_VAR, DEFAULT_HOST),
        port: vars.parsed_or(PORT_VAR, DEFAULT_PORT),
        read_timeout: Duration::from_secs(
            vars.parsed_or(READ_TIMEOUT_VAR, DEFAULT_READ_TIMEOUT_SECS),
        ),
        write_timeout: Duration::from_secs(
            vars.parsed_or(WRITE_TIMEOUT_VAR, DEFAULT_WRITE_TIMEOUT_SECS),
        ),
        api_key: vars.secret(API_KEY_VAR),
        jwt_secret: vars.secret(JWT_SECRET_VAR),
        allowed_origins: vars.list_or(ALLOWED_ORIGINS_VAR, &[WILDCARD]),
        rate_limit_rps,
        docker_enabled: vars.bool_or(DOCKER_ENABLED_VAR, true),
        log_level: vars.string_or(LOG_LEVEL_VAR, DEFAULT_LOG_LEVEL),
        allowed_services: vars.list_or(ALLOWED_SERVICES_VAR, DEFAULT_ALLOWED_SERVICES),
        allowed_paths: vars.list_or(ALLOWED_PATHS_VAR, DEFAULT_ALLOWED_PATHS),
        tasks: default_tasks(),
        env_file,
        shutdown_grace: Duration::from_secs(
            vars.parsed_or(SHUTDOWN_GRACE_VAR, DEFAULT_SHUTDOWN_GRACE_SECS),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn load(dir: &TempDir, pairs: &[(&str, &str)]) -> Settings {
        SettingsLoader::new()
            .env_file(dir.path().join(".env"))
            .vars(vars(pairs))
            .load()
            .unwrap()
    }

    #[test]
    fn test_defaults_without_secret_enter_setup_mode() {
        let dir = TempDir::new().unwrap();
        let settings = load(&dir, &[]);

        assert!(settings.setup_mode());
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.rate_limit_rps, DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(settings.allowed_origins, vec!["*"]);
        assert_eq!(settings.allowed_paths.len(), DEFAULT_ALLOWED_PATHS.len());
        assert!(settings.docker_enabled);
    }

    #[test]
    fn test_process_vars_override_env_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "API_KEY=from-file\nPORT=9000\n").unwrap();

        let settings = load(&dir, &[("PORT", "9100")]);
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.api_key.as_ref().map(Secret::expose), Some("from-file"));
    }

    #[test]
    fn test_env_file_quotes_and_comments() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".env"),
            "# agent\nexport PORT=9200\nJWT_SECRET=\"signing key\"\n\nLOG_LEVEL=debug # verbose\n",
        )
        .unwrap();

        let settings = load(&dir, &[]);
        assert_eq!(settings.port, 9200);
        assert_eq!(settings.jwt_secret.as_ref().map(Secret::expose), Some("signing key"));
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_lists_are_trimmed() {
        let dir = TempDir::new().unwrap();
        let settings = load(
            &dir,
            &[
                ("API_KEY", "k"),
                ("ALLOWED_SERVICES", " nginx , ssh,,"),
                ("ALLOWED_ORIGINS", "https://a.example,https://b.example"),
            ],
        );
        assert_eq!(settings.allowed_services, vec!["nginx", "ssh"]);
        assert_eq!(settings.allowed_origins.len(), 2);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let dir = TempDir::new().unwrap();
        let settings = load(
            &dir,
            &[("PORT", "eighty"), ("RATE_LIMIT_RPS", "0"), ("DOCKER_ENABLED", "maybe")],
        );
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.rate_limit_rps, DEFAULT_RATE_LIMIT_RPS);
        assert!(settings.docker_enabled);
    }

    #[test]
    fn test_docker_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let settings = load(&dir, &[("DOCKER_ENABLED", "false")]);
        assert!(!settings.docker_enabled);
    }

    #[test]
    fn test_blank_secret_is_unset() {
        let dir = TempDir::new().unwrap();
        let settings = load(&dir, &[("API_KEY", "   "), ("JWT_SECRET", "")]);
        assert!(settings.api_key.is_none());
        assert!(settings.jwt_secret.is_none());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_list(" , ").is_empty());
    }
}
