//! The shared secret.
//!
//! Comparison hashes both sides with SHA-256 and compares the digests with
//! `subtle`, so neither the position of the first mismatching byte nor the
//! length of the stored secret shows up in response timing.

use parking_lot::RwLock;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use warden_config::{EnvFile, Settings};
use warden_core::constants::{API_KEY_VAR, MIN_SECRET_LEN};
use warden_core::{Error, Result, Secret};

/// Length of a generated secret in bytes (hex doubles it)
const GENERATED_SECRET_BYTES: usize = 32;

/// Durable storage for a rotated secret
pub trait SecretPersistence: Send + Sync {
    fn persist(&self, secret: &Secret) -> Result<()>;
}

impl SecretPersistence for EnvFile {
    fn persist(&self, secret: &Secret) -> Result<()> {
        self.update(&[(API_KEY_VAR, secret.expose().to_string())])
    }
}

pub struct CredentialStore {
    api_secret: RwLock<Option<Arc<Secret>>>,
    signing_secret: Option<Secret>,
    persistence: Box<dyn SecretPersistence>,
}

impl CredentialStore {
    pub fn new(
        api_secret: Option<Secret>,
        signing_secret: Option<Secret>,
        persistence: Box<dyn SecretPersistence>,
    ) -> Self {
        Self {
            api_secret: RwLock::new(api_secret.filter(|s| !s.is_empty()).map(Arc::new)),
            signing_secret: signing_secret.filter(|s| !s.is_empty()),
            persistence,
        }
    }

    /// Store backed by the settings' env file
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.api_key.clone(),
            settings.jwt_secret.clone(),
            Box::new(EnvFile::new(settings.env_file.clone())),
        )
    }

    /// True iff `presented` is non-empty and equals the stored secret
    pub fn validate(&self, presented: &str) -> bool {
        if presented.is_empty() {
            return false;
        }
        let Some(stored) = self.current() else {
            return false;
        };

        let expected = Sha256::digest(stored.expose().as_bytes());
        let actual = Sha256::digest(presented.as_bytes());
        expected.as_slice().ct_eq(actual.as_slice()).into()
    }

    /// Persist `new_secret`, then make it the only accepted credential.
    ///
    /// Outstanding session tokens are unaffected; they expire on their own.
    pub fn rotate(&self, new_secret: Secret) -> Result<()> {
        if new_secret.len() < MIN_SECRET_LEN {
            return Err(Error::bad_request(format!(
                "API key must be at least {MIN_SECRET_LEN} characters"
            )));
        }

        self.persistence.persist(&new_secret)?;
        *self.api_secret.write() = Some(Arc::new(new_secret));

        tracing::info!("shared secret rotated");
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.api_secret.read().is_some()
    }

    /// Session tokens are signed with the API secret, so rotating it must re-key them
    pub fn signs_with_api_secret(&self) -> bool {
        self.signing_secret.is_none()
    }

    /// The token signing secret: the distinct one if configured, else the API secret
    pub fn signing_secret(&self) -> Option<Secret> {
        self.signing_secret
            .clone()
            .or_else(|| self.current().map(|s| (*s).clone()))
    }

    fn current(&self) -> Option<Arc<Secret>> {
        self.api_secret.read().clone()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("configured", &self.is_configured())
            .field("distinct_signing_secret", &self.signing_secret.is_some())
            .finish()
    }
}

/// Generate a new random secret, hex encoded
pub fn generate_secret() -> String {
    let mut bytes = [0u8; GENERATED_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
