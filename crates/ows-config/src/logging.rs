//! Tracing setup for services embedding the loader
//!
//! The loader itself only emits `tracing` events. A service installs one
//! subscriber at startup, usually through
//! [`LoaderSettings::init_logging`](crate::LoaderSettings::init_logging).

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{ConfigError, Result};

/// Loader events at `info`, everything else at `warn`.
pub const DEFAULT_FILTER: &str = "ows_config=info,ows_fs=info,warn";

/// Parse filter directives such as `ows_config=debug,warn`.
pub fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| ConfigError::invalid(format!("Invalid log filter '{directives}': {e}")))
}

/// `RUST_LOG` when set and non-empty, else `directives`.
pub fn filter(directives: &str) -> Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.trim().is_empty() => parse_filter(&env),
        _ => parse_filter(directives),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(directives: &str) -> Result<()> {
    let fmt_layer = fmt::layer().with_target(true).with_level(true).compact();
    tracing_subscriber::registry()
        .with(filter(directives)?)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::invalid(format!("Cannot install log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(parse_filter(DEFAULT_FILTER).is_ok());
        assert!(parse_filter("ows_config=debug").is_ok());
    }

    #[test]
    fn bad_directive_is_invalid() {
        let err = parse_filter("ows_config=loud").unwrap_err();
        assert!(err.to_string().contains("ows_config=loud"));
    }

    #[test]
    fn second_init_fails() {
        // Another test may already have installed a subscriber.
        let _ = init(DEFAULT_FILTER);
        assert!(init(DEFAULT_FILTER).is_err());
        tracing::info!(target: "ows_config", "logging initialised");
    }
}
