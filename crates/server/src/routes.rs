//! Route table

mod auth;
mod docker;
mod files;
mod logs;
mod processes;
mod services;
mod settings;
mod setup;
mod system;
mod tasks;

use axum::routing::{get, post};
use axum::{middleware, Router};

use crate::state::AppState;

/// The complete application, gate included
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/info", get(system::info))
        .route("/metrics", get(system::all_metrics))
        .route("/metrics/cpu", get(system::cpu))
        .route("/metrics/memory", get(system::memory))
        .route("/metrics/disk", get(system::disk))
        .route("/metrics/network", get(system::network))
        .route("/events", get(system::events))
        .route("/processes", get(processes::list))
        .route("/processes/:pid/kill", post(processes::kill))
        .route("/services", get(services::list))
        .route("/services/:name", get(services::get))
        .route("/services/:name/:action", post(services::act))
        .route("/logs", get(logs::follow))
        .route("/logs/query", get(logs::query))
        .route("/logs/:unit", get(logs::unit))
        .route("/docker/containers", get(docker::list))
        .route("/docker/containers/:id", get(docker::inspect))
        .route("/docker/containers/:id/logs", get(docker::logs))
        .route("/docker/containers/:id/:action", post(docker::act))
        .route("/files", get(files::list))
        .route("/files/content", get(files::content))
        .route("/files/diskusage", get(files::disk_usage))
        .route("/tasks", get(tasks::list))
        .route("/tasks/:name/run", post(tasks::run))
        .route("/auth/token", post(auth::issue_token))
        .route("/settings", get(settings::get).put(settings::update))
        .route("/settings/generate-key", post(settings::generate_key))
        .route("/settings/api-key", post(settings::rotate_key));

    let setup = Router::new()
        .route("/status", get(setup::status))
        .route("/generate", post(setup::generate))
        .route("/save", post(setup::save));

    Router::new()
        .route("/health", get(system::health))
        .nest("/setup", setup)
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), crate::middleware::gate))
        .with_state(state)
}
