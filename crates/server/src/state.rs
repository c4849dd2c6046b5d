//! Shared state behind every handler

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use warden_config::Settings;
use warden_core::{Result, Secret};
use warden_host::{
    ContainerRuntime, DockerCli, FileBrowser, JournalReader, MetricsCache, MetricsCollector,
    ProcessManager, ServiceManager, Systemctl,
};
use warden_security::{
    CapabilityRegistry, CapabilityStore, CredentialStore, RateLimitConfig, RateLimiter,
    SessionKeys, SessionTokens, TokenService,
};
use warden_task::{SystemTaskExecutor, TaskExecutor};
use warden_utils::Shutdown;

use crate::gate::{Authenticate, Cors, RateLimit, RequestGate};

/// Requests currently inside the gate middleware
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    pub fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.0))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Everything handlers and the gate share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<RwLock<Arc<Settings>>>,
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<SessionKeys>,
    pub limiter: Arc<RateLimiter>,
    pub capabilities: Arc<CapabilityStore>,
    pub gate: Arc<RequestGate>,

    pub services: Arc<dyn ServiceManager>,
    pub containers: Arc<dyn ContainerRuntime>,
    pub tasks: Arc<dyn TaskExecutor>,
    pub journal: JournalReader,
    pub metrics: MetricsCollector,
    pub metrics_cache: Arc<MetricsCache>,
    pub processes: ProcessManager,
    pub files: FileBrowser,

    /// Serialises secret changes so the setup flow can only complete once
    pub secret_lock: Arc<Mutex<()>>,
    /// Serialises allow-list updates so the env file and snapshot agree
    pub settings_lock: Arc<Mutex<()>>,
    pub in_flight: InFlight,
    pub shutdown: Shutdown,
    pub started_at: Instant,
}

impl AppState {
    /// State wired to the real host collaborators
    pub fn new(settings: Settings) -> Self {
        let credentials = Arc::new(CredentialStore::from_settings(&settings));
        Self::with_credentials(settings, credentials)
    }

    /// State using a caller-provided credential store
    pub fn with_credentials(settings: Settings, credentials: Arc<CredentialStore>) -> Self {
        let tokens = Arc::new(SessionKeys::new(match credentials.signing_secret() {
            Some(secret) => TokenService::new(secret.expose().as_bytes()),
            None => {
                tracing::warn!("no shared secret configured, starting in setup mode");
                TokenService::ephemeral()
            }
        }));

        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::per_second(
            settings.rate_limit_rps,
        )));
        let capabilities = Arc::new(CapabilityStore::new(CapabilityRegistry::from_settings(
            &settings,
        )));
        let gate = Arc::new(RequestGate::new(vec![
            Box::new(Cors::new(settings.allowed_origins.clone())),
            Box::new(RateLimit::new(Arc::clone(&limiter))),
            Box::new(Authenticate::new(
                Arc::clone(&credentials),
                Arc::clone(&tokens) as Arc<dyn SessionTokens>,
            )),
        ]));
        let write_timeout = settings.write_timeout;

        Self {
            settings: Arc::new(RwLock::new(Arc::new(settings))),
            credentials,
            tokens,
            limiter,
            capabilities,
            gate,
            services: Arc::new(Systemctl::new()),
            containers: Arc::new(DockerCli::new()),
            tasks: Arc::new(SystemTaskExecutor::new(write_timeout)),
            journal: JournalReader::new(),
            metrics: MetricsCollector::new(),
            metrics_cache: Arc::new(MetricsCache::default()),
            processes: ProcessManager::new(),
            files: FileBrowser::new(),
            secret_lock: Arc::new(Mutex::new(())),
            settings_lock: Arc::new(Mutex::new(())),
            in_flight: InFlight::default(),
            shutdown: Shutdown::new(),
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_service_manager(mut self, services: Arc<dyn ServiceManager>) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn with_container_runtime(mut self, containers: Arc<dyn ContainerRuntime>) -> Self {
        self.containers = containers;
        self
    }

    #[must_use]
    pub fn with_task_executor(mut self, tasks: Arc<dyn TaskExecutor>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Persist and activate a new shared secret.
    ///
    /// When tokens are signed with the shared secret they follow it; the old
    /// key keeps verifying only the tokens it issued before this call.
    /// Callers hold `secret_lock`.
    pub fn rotate_secret(&self, secret: Secret) -> Result<()> {
        let signing = self
            .credentials
            .signs_with_api_secret()
            .then(|| secret.clone());
        self.credentials.rotate(secret)?;
        if let Some(signing) = signing {
            self.tokens.rekey(signing.expose().as_bytes());
        }
        Ok(())
    }

    /// Current settings snapshot
    pub fn settings(&self) -> Arc<Settings> {
        self.settings.read().clone()
    }

    /// Publish new settings and the capability table derived from them
    pub fn replace_settings(&self, settings: Settings) {
        self.capabilities
            .replace(CapabilityRegistry::from_settings(&settings));
        *self.settings.write() = Arc::new(settings);
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("credentials", &self.credentials)
            .field("gate", &self.gate)
            .field("in_flight", &self.in_flight.count())
            .finish_non_exhaustive()
    }
}
