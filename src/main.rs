//! Wellness pillars service: binary entrypoint.
//! Loads config, boots tracing, and serves the axum router through Shuttle.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use wellness_pillars::{app_with_state, telemetry, AppConfig, AppState};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    let cfg = AppConfig::load_default().context("loading wellness config")?;
    tracing::info!(
        data_dir = %cfg.storage.data_dir.display(),
        remote = cfg.remote_enabled(),
        strategy = ?cfg.scoring.default_strategy,
        "starting wellness service"
    );

    let state = AppState::from_config(&cfg).context("building app state")?;
    let router = app_with_state(state)?;

    Ok(router.into())
}
