//! Log setup

use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::LogConfig;

/// Map a configured level name to a filter directive
fn directive(level: &str) -> String {
    match level.trim().to_lowercase().as_str() {
        "none" | "off" => "off".to_string(),
        "warning" => "warn".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Only the first
/// call in a process installs anything.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive(&config.level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Tracing subscriber already installed");
    }
}
