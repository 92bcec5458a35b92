#![forbid(unsafe_code)]

//! Tracing subscriber bootstrap.
//!
//! Library code only emits events; a host calls [`init`] once at startup.
//! The `SKILLPLAN_LOG` environment variable, when set and non-empty, replaces
//! the configured filter directive.

use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, LoggingConfig};

/// Environment variable overriding [`LoggingConfig::filter`].
pub const LOG_ENV: &str = "SKILLPLAN_LOG";

/// Pick the filter directive: a non-empty override wins over the fallback.
fn build_filter(env_override: Option<String>, fallback: &str) -> Result<EnvFilter, ConfigError> {
    let directive = env_override
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| fallback.to_owned());
    EnvFilter::try_new(&directive).map_err(|err| ConfigError::Filter(format!("{directive}: {err}")))
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` if a global subscriber was already installed, which
/// makes repeated calls harmless.
pub fn init(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let filter = build_filter(std::env::var(LOG_ENV).ok(), &config.filter)?;
    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    };
    if installed {
        tracing::debug!(target: "skillplan.session", json = config.json, "logging initialized");
    }
    Ok(installed)
}
