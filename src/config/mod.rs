//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Where team records live
#[derive(Clone, Debug, PartialEq)]
pub enum StoreBackend {
    /// In-process map; state is lost on restart
    Memory,
    /// Supabase PostgREST `teams` table
    Supabase {
        url: String,
        /// Service role key (bypasses RLS - server only!)
        service_role_key: String,
    },
}

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,

    /// Neighbor and elimination radius in meters
    pub proximity_threshold_m: f64,
    /// Period of the nearby-teams broadcast
    pub broadcast_interval: Duration,

    /// Transport ping period for WebSocket liveness
    pub ws_ping_interval: Duration,
    /// Extra silence tolerated past the ping interval before a socket is dropped
    pub ws_ping_timeout: Duration,
    /// Per-connection outbound queue capacity
    pub ws_outbound_buffer: usize,

    pub request_timeout: Duration,
    pub store: StoreBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            client_origin: "*".to_string(),
            proximity_threshold_m: 10.0,
            broadcast_interval: Duration::from_millis(1000),
            ws_ping_interval: Duration::from_secs(10),
            ws_ping_timeout: Duration::from_secs(5),
            ws_outbound_buffer: 64,
            request_timeout: Duration::from_secs(10),
            store: StoreBackend::Memory,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match (lookup("PORT"), lookup("SERVER_ADDR")) {
            (Some(port), _) => format!("0.0.0.0:{}", port)
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            (None, Some(addr)) => addr.parse().map_err(|_| ConfigError::InvalidAddress)?,
            (None, None) => defaults.server_addr,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let proximity_threshold_m: f64 =
            parse_or(&lookup, "PROXIMITY_THRESHOLD_METERS", defaults.proximity_threshold_m)?;
        if !proximity_threshold_m.is_finite() || proximity_threshold_m <= 0.0 {
            return Err(ConfigError::Invalid("PROXIMITY_THRESHOLD_METERS"));
        }

        let broadcast_ms: u64 = parse_or(&lookup, "BROADCAST_INTERVAL_MS", 1000)?;
        if broadcast_ms == 0 {
            return Err(ConfigError::Invalid("BROADCAST_INTERVAL_MS"));
        }
        let ping_interval_secs: u64 = parse_or(&lookup, "WS_PING_INTERVAL_SECS", 10)?;
        if ping_interval_secs == 0 {
            return Err(ConfigError::Invalid("WS_PING_INTERVAL_SECS"));
        }

        let store = match lookup("STORE_BACKEND").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("supabase") => StoreBackend::Supabase {
                url: lookup("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                service_role_key: lookup("SUPABASE_SERVICE_ROLE_KEY")
                    .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
            },
            Some(_) => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };

        Ok(Self {
            server_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            client_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.client_origin),
            proximity_threshold_m,
            broadcast_interval: Duration::from_millis(broadcast_ms),
            ws_ping_interval: Duration::from_secs(ping_interval_secs),
            ws_ping_timeout: Duration::from_secs(parse_or(&lookup, "WS_PING_TIMEOUT_SECS", 5)?),
            ws_outbound_buffer: parse_or(&lookup, "WS_OUTBOUND_BUFFER", 64)?,
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 10)?),
            store,
        })
    }

    /// How long a socket may stay silent before it is considered dead
    pub fn ws_idle_timeout(&self) -> Duration {
        self.ws_ping_interval + self.ws_ping_timeout
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.proximity_threshold_m, 10.0);
        assert_eq!(config.broadcast_interval, Duration::from_secs(1));
        assert_eq!(config.ws_idle_timeout(), Duration::from_secs(15));
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn port_wins_over_server_addr() {
        let config = load(&[("PORT", "3000"), ("SERVER_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(config.server_addr.port(), 3000);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("BROADCAST_INTERVAL_MS", "250"),
            ("PROXIMITY_THRESHOLD_METERS", "25.5"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.broadcast_interval, Duration::from_millis(250));
        assert_eq!(config.proximity_threshold_m, 25.5);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("SERVER_ADDR", "not-an-addr")]),
            Err(ConfigError::InvalidAddress)
        ));
        assert!(matches!(
            load(&[("BROADCAST_INTERVAL_MS", "0")]),
            Err(ConfigError::Invalid("BROADCAST_INTERVAL_MS"))
        ));
        assert!(matches!(
            load(&[("PROXIMITY_THRESHOLD_METERS", "-3")]),
            Err(ConfigError::Invalid("PROXIMITY_THRESHOLD_METERS"))
        ));
    }

    #[test]
    fn supabase_backend_requires_credentials() {
        assert!(matches!(
            load(&[("STORE_BACKEND", "supabase")]),
            Err(ConfigError::Missing("SUPABASE_URL"))
        ));

        let config = load(&[
            ("STORE_BACKEND", "supabase"),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
        ])
        .unwrap();
        assert!(matches!(config.store, StoreBackend::Supabase { .. }));
    }
}
