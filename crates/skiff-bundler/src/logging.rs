//! Tracing setup for skiff binaries. Only available with the `logging`
//! feature.
//!
//! The bundler itself just emits tracing events; library users install
//! whatever subscriber they like. Binaries call [`init_logging`] once at
//! startup with a filter directive: a bare level (`"warn"`, `"debug"`)
//! or any richer tracing expression (`"skiff_bundler=debug,info"`).
//! The `SKIFF_LOG` environment variable, when set, wins over the
//! directive.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Check a filter directive without installing a subscriber. Lets a CLI
/// reject a bad `--log-level` before any work starts.
pub fn validate_directive(directive: &str) -> Result<(), String> {
    EnvFilter::try_new(directive)
        .map(|_| ())
        .map_err(|e| format!("invalid log filter '{directive}': {e}"))
}

/// Install the global subscriber. Safe to call more than once; only the
/// first call takes effect.
pub fn init_logging(directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("SKIFF_LOG")
            .or_else(|_| EnvFilter::try_new(directive))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    });
}
