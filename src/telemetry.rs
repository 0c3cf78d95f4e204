//! Tracing setup.
//!
//! `RUST_LOG` wins when set; otherwise `wellness=info,warn`.
//! `WELLNESS_LOG_JSON=1` switches the fmt layer to JSON lines.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "WELLNESS_LOG_JSON";
const DEFAULT_FILTER: &str = "wellness=info,warn";

/// Install the global subscriber. Safe to call more than once; only the first
/// call (or a subscriber installed elsewhere) takes effect.
pub fn init_tracing() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");

        let registry = tracing_subscriber::registry().with(filter);
        let res = if json {
            registry.with(fmt::layer().json()).try_init()
        } else {
            registry.with(fmt::layer().compact()).try_init()
        };
        if res.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    });
}
