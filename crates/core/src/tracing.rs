//! Logging initialization for native front-ends and tools
//!
//! Library code only emits `tracing` events; binaries call [`init_tracing`]
//! once at startup to install a subscriber.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "tutora_http=debug")
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Create configuration from environment variables
    ///
    /// - `RUST_LOG`: log level filter
    /// - `TUTORA_LOG_JSON`: `1` or `true` for JSON output
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let json = std::env::var("TUTORA_LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self { log_level, json }
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already set
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Initialize with configuration from the environment
///
/// # Errors
///
/// Returns an error if a global subscriber is already set
pub fn init_default() -> Result<()> {
    init_tracing(&LogConfig::from_env())
}
