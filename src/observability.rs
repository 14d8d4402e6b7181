//! Structured logging setup.
//!
//! Uses `tracing-subscriber` with an `EnvFilter` (`RUST_LOG` wins over the
//! configured level) and either plain or JSON output.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing with the given level and output format.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true);

        Registry::default().with(env_filter).with(fmt_layer).try_init()
    };

    if result.is_ok() {
        tracing::debug!(level, json, "Tracing initialized");
    }
}
