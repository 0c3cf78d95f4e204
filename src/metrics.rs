use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const SAVES_TOTAL: &str = "wellness_saves_total";
pub const REMOTE_FAILURES_TOTAL: &str = "wellness_remote_sync_failures_total";
pub const REMOTE_FALLBACKS_TOTAL: &str = "wellness_remote_fallbacks_total";
pub const AUTOSAVE_SCHEDULED_TOTAL: &str = "wellness_autosave_scheduled_total";
pub const CATALOG_QUESTIONS: &str = "wellness_catalog_questions";

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. The recorder is process-global, so
    /// later calls reuse the first handle.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))
            })?
            .clone();
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Register descriptions once per process.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(SAVES_TOTAL, "Day and settings saves, labelled by target.");
        describe_counter!(
            REMOTE_FAILURES_TOTAL,
            "Remote mirror writes that failed after the local write succeeded."
        );
        describe_counter!(
            REMOTE_FALLBACKS_TOTAL,
            "Reads served from the local store because the mirror failed."
        );
        describe_counter!(
            AUTOSAVE_SCHEDULED_TOTAL,
            "Debounced saves scheduled (including ones later superseded)."
        );
        describe_gauge!(CATALOG_QUESTIONS, "Questions in the resolved catalog.");
    });
}

pub fn set_catalog_size(total_questions: usize) {
    gauge!(CATALOG_QUESTIONS).set(total_questions as f64);
}
