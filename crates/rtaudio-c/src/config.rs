//! Environment-driven settings read when an instance is created.

use std::sync::Once;

use rtaudio_engine::Api;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

pub const API_VAR: &str = "RTAUDIO_API";
pub const LOG_VAR: &str = "RTAUDIO_LOG";
pub const SHOW_WARNINGS_VAR: &str = "RTAUDIO_SHOW_WARNINGS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShimConfig {
    /// Backend preferred when the caller leaves the API unspecified.
    pub api: Option<Api>,
    /// `EnvFilter` directive; logging stays off when unset.
    pub log_filter: Option<String>,
    pub show_warnings: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            api: None,
            log_filter: None,
            show_warnings: true,
        }
    }
}

impl ShimConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Values that do
    /// not parse are skipped with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup(API_VAR).filter(|value| !value.trim().is_empty()) {
            match Api::from_name(&name) {
                Some(Api::Unspecified) | None => {
                    tracing::warn!(target: "rtaudio::config", "ignoring {API_VAR}={name:?}: unknown API");
                }
                Some(api) => config.api = Some(api),
            }
        }

        config.log_filter = lookup(LOG_VAR).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup(SHOW_WARNINGS_VAR) {
            match parse_bool(&value) {
                Some(show) => config.show_warnings = show,
                None => tracing::warn!(
                    target: "rtaudio::config",
                    "ignoring {SHOW_WARNINGS_VAR}={value:?}: expected a boolean"
                ),
            }
        }

        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

static LOGGING: Once = Once::new();

/// Installs a `fmt` subscriber the first time a filter is configured. A
/// subscriber installed by the host application wins.
pub fn init_logging(config: &ShimConfig) {
    let Some(filter) = config.log_filter.as_deref() else {
        return;
    };
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .ok();
    });
}
