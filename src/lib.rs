// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod autosave;
pub mod catalog;
pub mod coefficients;
pub mod config;
pub mod journal;
pub mod metrics;
pub mod pillars;
pub mod remote;
pub mod scoring;
pub mod storage;
pub mod sync;
pub mod telemetry;
pub mod trends;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::scoring::{ScoreContext, ScoreStrategy};

use axum::Router;

/// Full HTTP app (API + `/metrics`) from the resolved config.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load_default()?;
    app_with_state(AppState::from_config(&cfg)?)
}

pub fn app_with_state(state: AppState) -> anyhow::Result<Router> {
    let metrics = crate::metrics::Metrics::init()?;
    Ok(api::router(state).merge(metrics.router()))
}
