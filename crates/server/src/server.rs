//! Listener, background upkeep and graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use warden_core::{Error, Result};

use crate::routes;
use crate::state::AppState;

/// How often idle rate windows and stale cache entries are dropped
pub const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Bind the configured address and serve until SIGINT/SIGTERM
    pub async fn serve(self) -> Result<()> {
        let addr = self.state.settings().addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::configuration(format!("failed to bind {addr}: {e}")))?;
        self.run(listener, warden_utils::shutdown::os_signal()).await
    }

    /// Serve on `listener` until `signal` resolves, then drain.
    ///
    /// Streams are told to stop, in-flight requests get the configured grace
    /// period, and whatever is still running afterwards is dropped.
    pub async fn run<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let state = self.state;
        let local_addr = listener.local_addr()?;
        let grace = state.settings().shutdown_grace;
        let app = routes::router(state.clone());

        let drain = state.shutdown.listener();
        let mut server = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(drain.wait())
            .await
        });
        let janitor = spawn_janitor(state.clone());

        tracing::info!(
            addr = %local_addr,
            setup_mode = !state.credentials.is_configured(),
            "listening"
        );

        tokio::select! {
            () = signal => {
                tracing::info!("shutdown signal received, draining");
            }
            joined = &mut server => {
                janitor.abort();
                return flatten(joined);
            }
        }

        state.shutdown.trigger();
        let result = match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                tracing::warn!(
                    outstanding = state.in_flight.count(),
                    grace_secs = grace.as_secs(),
                    "grace period elapsed, closing remaining connections"
                );
                server.abort();
                Ok(())
            }
        };
        janitor.abort();

        tracing::info!("server stopped");
        result
    }
}

fn flatten(
    joined: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    joined
        .map_err(|e| Error::internal(format!("server task failed: {e}")))?
        .map_err(|e| Error::internal(format!("server error: {e}")))
}

fn spawn_janitor(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(JANITOR_INTERVAL);
        ticker.tick().await;
        let stop = state.shutdown.listener().wait();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                () = &mut stop => break,
                _ = ticker.tick() => {
                    let pruned = state.limiter.prune_idle();
                    state.metrics_cache.purge_expired();
                    if pruned > 0 {
                        tracing::debug!(pruned, remaining = state.limiter.tracked_keys(), "pruned idle rate windows");
                    }
                }
            }
        }
    })
}
