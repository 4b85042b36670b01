// Logging setup
//
// Console logging through tracing-subscriber. Logs go to stderr so the
// summary on stdout stays machine readable.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "signload=info,signload_core=info";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log filter (e.g., "info", "debug", "signload_core=debug")
    pub log_filter: Option<String>,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            ..Default::default()
        }
    }

    /// Resolve the filter, falling back to the default on empty or invalid input
    pub fn env_filter(&self) -> EnvFilter {
        self.log_filter
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber
///
/// Returns `false` if a subscriber was already installed (e.g. in tests).
pub fn init_logging(config: LogConfig) -> bool {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(config.with_target)
        .with_writer(std::io::stderr)
        .with_filter(config.env_filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok()
}
