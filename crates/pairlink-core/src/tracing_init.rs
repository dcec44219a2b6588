//! Shared tracing/logging initialization.
//!
//! Sets up `tracing_subscriber` with an env-filter and optional JSON output.
//! Logs go to stderr so tokens printed on stdout stay copy-pasteable.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the pairlink crates log at
/// `config.level`.
pub fn init_tracing(config: &LogConfig) {
    let default_filter = format!(
        "pairlink={level},pairlink_core={level},pairlink_crypto={level}",
        level = config.level
    );
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or(default_filter),
    );
    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
