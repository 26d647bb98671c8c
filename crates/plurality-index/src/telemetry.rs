//! Tracing setup for binaries embedding the index

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Install a fmt subscriber filtered by `RUST_LOG`, or `default_filter` when
/// it is unset.
///
/// Only the first call in a process does anything. If another subscriber is
/// already installed it is left in place.
pub fn init_tracing(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init();

        if installed.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    });
}
