//! Configuration Module
//!
//! Handles loading engine defaults from environment variables and the
//! lifespan input accepted by node builders.

use std::env;
use std::time::Duration;

use crate::duration::{parse_duration, DurationParseError};

// == Lifespan ==
/// Minimum residency window requested for cached values.
///
/// Accepts integer milliseconds, a [`Duration`] or a duration string such as
/// `"5m"`. Zero or negative values disable the TTL floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifespan {
    Millis(i64),
    Text(String),
}

impl Lifespan {
    /// Resolves the lifespan into a floor duration, `Duration::ZERO` when disabled.
    pub fn to_duration(&self) -> Result<Duration, DurationParseError> {
        let ms = match self {
            Lifespan::Millis(ms) => *ms,
            Lifespan::Text(text) => parse_duration(text)?,
        };
        Ok(Duration::from_millis(ms.max(0) as u64))
    }
}

impl Default for Lifespan {
    fn default() -> Self {
        Lifespan::Millis(0)
    }
}

impl From<u64> for Lifespan {
    fn from(ms: u64) -> Self {
        Lifespan::Millis(i64::try_from(ms).unwrap_or(i64::MAX))
    }
}

impl From<i64> for Lifespan {
    fn from(ms: i64) -> Self {
        Lifespan::Millis(ms)
    }
}

impl From<Duration> for Lifespan {
    fn from(duration: Duration) -> Self {
        Lifespan::Millis(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Lifespan {
    fn from(text: &str) -> Self {
        Lifespan::Text(text.to_string())
    }
}

impl From<String> for Lifespan {
    fn from(text: String) -> Self {
        Lifespan::Text(text)
    }
}

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL floor for nodes that do not set their own lifespan
    pub default_lifespan: Duration,
    /// Background sweep task interval
    pub sweep_interval: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ENTANGLE_LIFESPAN` - Default TTL floor, duration string or milliseconds (default: 0, disabled)
    /// - `ENTANGLE_SWEEP_INTERVAL` - Sweep frequency, duration string or milliseconds (default: 1s)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_lifespan: env::var("ENTANGLE_LIFESPAN")
                .ok()
                .and_then(|v| Lifespan::from(v).to_duration().ok())
                .unwrap_or(defaults.default_lifespan),
            sweep_interval: env::var("ENTANGLE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| Lifespan::from(v).to_duration().ok())
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.sweep_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_lifespan: Duration::ZERO,
            sweep_interval: Duration::from_secs(1),
        }
    }
}
