//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::ResilienceConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from a TOML file.
///
/// The result is not normalized; run [`crate::config::normalize`] before use.
pub fn load_config(path: &Path) -> Result<ResilienceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ResilienceConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides to `config`.
///
/// Takes the variables as an iterator so only the binary touches the
/// process environment (`apply_env_overrides(&mut cfg, std::env::vars())`).
/// Unknown names are skipped; unparseable values are logged and ignored.
pub fn apply_env_overrides<I, K, V>(config: &mut ResilienceConfig, vars: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (key, value) in vars {
        let (key, value) = (key.as_ref(), value.as_ref().trim());
        let breaker = &mut config.breaker;
        let retries = &mut config.retries;
        let applied = match key {
            "CB_MAX_REQUESTS" => set(&mut breaker.half_open_max_requests, key, value),
            "CB_INTERVAL_SECONDS" => set_secs_as_ms(&mut breaker.window_ms, key, value),
            "CB_TIMEOUT_SECONDS" => set_secs_as_ms(&mut breaker.open_timeout_ms, key, value),
            "CB_MIN_REQUESTS" => set(&mut breaker.min_requests, key, value),
            "CB_FAILURE_RATIO" => set(&mut breaker.failure_ratio, key, value),
            "CB_CONSECUTIVE_FAILURES" => set(&mut breaker.consecutive_failures, key, value),
            "RETRY_MAX_RETRIES" => set(&mut retries.max_retries, key, value),
            "RETRY_BASE_DELAY_MS" => set(&mut retries.base_delay_ms, key, value),
            "RETRY_MAX_DELAY_MS" => set(&mut retries.max_delay_ms, key, value),
            _ => continue,
        };
        if applied {
            tracing::debug!(variable = key, value, "Applied environment override");
        }
    }
}

fn set<T: FromStr>(slot: &mut T, key: &str, value: &str) -> bool {
    match value.parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => {
            tracing::warn!(variable = key, value, "Ignoring unparseable environment override");
            false
        }
    }
}

fn set_secs_as_ms(slot: &mut u64, key: &str, value: &str) -> bool {
    let mut secs = 0u64;
    if !set(&mut secs, key, value) {
        return false;
    }
    *slot = secs.saturating_mul(1000);
    true
}
