//! Configuration loading from environment variables.
//!
//! Uses the following environment variables:
//! - `RACELINE_FRAME_INTERVAL_MS`: animation frame period (default: 16)
//! - `RACELINE_HEALTH_POLL_INTERVAL_MS`: engine health poll period (default: 250)
//! - `RACELINE_FINISH_BUFFER`: finish channel capacity (default: 64)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;
pub const DEFAULT_HEALTH_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_FINISH_BUFFER: usize = 64;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Animation frame period. Progress is computed from wall-clock elapsed
    /// time, so a delayed frame never slows the advertised fraction.
    pub frame_interval: Duration,

    /// Period of the per-car mid-run health poll.
    pub health_poll_interval: Duration,

    /// Capacity of the finish-report channel between clocks and the arbiter.
    pub finish_buffer: usize,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            health_poll_interval: Duration::from_millis(DEFAULT_HEALTH_POLL_INTERVAL_MS),
            finish_buffer: DEFAULT_FINISH_BUFFER,
        }
    }
}

impl RaceConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            frame_interval: Duration::from_millis(env_parse(
                "RACELINE_FRAME_INTERVAL_MS",
                DEFAULT_FRAME_INTERVAL_MS,
            )?),
            health_poll_interval: Duration::from_millis(env_parse(
                "RACELINE_HEALTH_POLL_INTERVAL_MS",
                DEFAULT_HEALTH_POLL_INTERVAL_MS,
            )?),
            finish_buffer: env_parse("RACELINE_FINISH_BUFFER", DEFAULT_FINISH_BUFFER)?,
        })
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: {value}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = RaceConfig::default();
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert_eq!(config.health_poll_interval, Duration::from_millis(250));
        assert_eq!(config.finish_buffer, 64);
    }
}
