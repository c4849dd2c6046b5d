use chrono::Duration;
use eyre::eyre;
use std::path::PathBuf;
use warden_security::{CredentialStore, SessionTokens, TokenService};

pub fn execute(env_file: Option<PathBuf>, role: &str, ttl_seconds: i64) -> eyre::Result<()> {
    let settings = super::load_settings(env_file)?;
    let secret = CredentialStore::from_settings(&settings)
        .signing_secret()
        .ok_or_else(|| eyre!("no API_KEY or JWT_SECRET configured; run `warden keygen --save` first"))?;

    let token =
        TokenService::new(secret.expose().as_bytes()).issue(role, Duration::seconds(ttl_seconds))?;

    println!("{token}");
    Ok(())
}
