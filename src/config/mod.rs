// src/config/mod.rs

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LimiterError, Result};

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Settings for the rate-limiting service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Redis address, `host:port`
    pub redis_addr: String,

    /// Maximum admissions per window for one key
    pub limit: usize,

    /// Trailing window over which admissions are counted
    #[serde(with = "duration_serde")]
    pub window: Duration,

    /// Listen port
    pub port: u16,
}

impl LimiterSettings {
    /// Load from the environment, falling back to the documented defaults.
    /// Invalid values are fatal; nothing re-reads the environment later.
    pub fn from_env() -> Result<Self> {
        let limit = env_or("RATE_LIMIT", "10")
            .parse::<usize>()
            .map_err(|e| LimiterError::Config(format!("RATE_LIMIT: {e}")))?;
        if limit == 0 {
            return Err(LimiterError::Config("RATE_LIMIT must be positive".into()));
        }

        let window = parse_duration(&env_or("WINDOW_SIZE", "1m"))
            .map_err(|e| LimiterError::Config(format!("WINDOW_SIZE: {e}")))?;

        let port = env_or("PORT", "8081")
            .parse::<u16>()
            .map_err(|e| LimiterError::Config(format!("PORT: {e}")))?;

        Ok(Self {
            redis_addr: env_or("REDIS_ADDR", "localhost:6379"),
            limit,
            window,
            port,
        })
    }
}

/// One pool member as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub url: String,
    pub weight: u32,
}

/// Settings for the load-balancer service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerSettings {
    /// Pool members in configuration order
    pub backends: Vec<BackendSettings>,

    /// Listen port
    pub port: u16,

    /// How often each backend is probed
    #[serde(with = "duration_serde")]
    pub probe_interval: Duration,

    /// Per-probe HTTP timeout
    #[serde(with = "duration_serde")]
    pub probe_timeout: Duration,
}

impl BalancerSettings {
    pub fn from_env() -> Result<Self> {
        let backends = vec![
            backend_from_env("BACKEND_1_URL", "localhost:8081", "BACKEND_1_WEIGHT", "2")?,
            backend_from_env("BACKEND_2_URL", "localhost:8082", "BACKEND_2_WEIGHT", "1")?,
        ];

        let port = env_or("LB_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| LimiterError::Config(format!("LB_PORT: {e}")))?;

        let probe_interval = parse_duration(&env_or("PROBE_INTERVAL", "10s"))
            .map_err(|e| LimiterError::Config(format!("PROBE_INTERVAL: {e}")))?;
        let probe_timeout = parse_duration(&env_or("PROBE_TIMEOUT", "2s"))
            .map_err(|e| LimiterError::Config(format!("PROBE_TIMEOUT: {e}")))?;

        Ok(Self {
            backends,
            port,
            probe_interval,
            probe_timeout,
        })
    }
}

fn backend_from_env(
    url_var: &str,
    url_default: &str,
    weight_var: &str,
    weight_default: &str,
) -> Result<BackendSettings> {
    let weight = env_or(weight_var, weight_default)
        .parse::<u32>()
        .map_err(|e| LimiterError::Config(format!("{weight_var}: {e}")))?;
    if weight == 0 {
        return Err(LimiterError::Config(format!(
            "{weight_var} must be positive"
        )));
    }

    Ok(BackendSettings {
        url: env_or(url_var, url_default),
        weight,
    })
}

/// Configuration for the Redis storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis address, `host:port`
    pub addr: String,

    /// Timeout for establishing the connection and for health pings
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,
}

impl RedisConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connection_timeout: Duration::from_secs(2),
        }
    }
}

/// Parse a duration string of the form the original deployment used:
/// a number followed by `ms`, `s`, `m` or `h` (`"300ms"`, `"10s"`, `"1m"`).
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let unit_at = s.find(|c: char| !c.is_ascii_digit() && c != '.');
    let (number, unit) = match unit_at {
        Some(i) => s.split_at(i),
        None => (s, "s"),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration {input:?}"))?;
    if value <= 0.0 {
        return Err(format!("duration must be positive: {input:?}"));
    }

    let seconds = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return Err(format!("unknown unit in duration {input:?}")),
    };

    Ok(Duration::from_secs_f64(seconds))
}

// Helper module to serialize/deserialize Duration with serde
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_units() {
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn parses_bare_number_as_seconds() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn parses_fractional_values() {
        assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("0.5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10fortnights").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("0s").is_err());
    }
}
