use eyre::{eyre, WrapErr};
use std::path::PathBuf;
use warden_core::constants::{DEFAULT_LOG_LEVEL, LOG_LEVEL_VAR};
use warden_server::{AppState, Server};

pub async fn execute(
    env_file: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> eyre::Result<()> {
    // Process environment first; the env file's LOG_LEVEL applies once loaded
    let initial_level =
        std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    let logging = warden_utils::logging::init(&initial_level)
        .map_err(|e| eyre!("failed to initialise logging: {e}"))?;

    let mut settings = super::load_settings(env_file)?;
    logging
        .set_level(&settings.log_level)
        .map_err(|e| eyre!("failed to apply {LOG_LEVEL_VAR}: {e}"))?;
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }

    tracing::info!(
        version = warden_core::AGENT_VERSION,
        env_file = %settings.env_file.display(),
        docker = settings.docker_enabled,
        rate_limit_rps = settings.rate_limit_rps,
        "starting {}",
        warden_core::AGENT_NAME
    );

    Server::new(AppState::new(settings))
        .serve()
        .await
        .wrap_err("agent stopped with an error")
}
