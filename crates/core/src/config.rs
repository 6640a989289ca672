//! Configuration types

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::ConfigError;

pub const DEFAULT_ENDPOINT: &str =
    "https://web-api.coinmarketcap.com/v1/cryptocurrency/listings/latest?convert=USD,CNY";

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address()
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address {}: {e}", self.address())))
    }
}

/// Refresh cycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub endpoint: String,
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Currency codes requested from each quote section
    pub currencies: Vec<String>,
    /// Prefix of every exported instrument name
    pub namespace: String,
    /// Purge assets not refreshed within this many seconds; retain forever when unset
    pub stale_after_secs: Option<u64>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            interval_secs: 30,
            fetch_timeout_secs: 10,
            currencies: vec!["USD".to_string(), "CNY".to_string()],
            namespace: "coin".to_string(),
            stale_after_secs: None,
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }

    /// Currency codes normalized to upper case
    pub fn currency_codes(&self) -> Vec<String> {
        self.currencies.iter().map(|c| c.trim().to_uppercase()).collect()
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file path; empty disables the file sink
    pub file: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "crypto-market-overwatch.log".to_string(),
            json: false,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverwatchConfig {
    pub server: ServerConfig,
    pub collector: CollectorConfig,
    pub logging: LoggingConfig,
}

impl OverwatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if self.collector.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval must be at least 1 second".into()));
        }
        if self.collector.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch timeout must be at least 1 second".into()));
        }
        if self.collector.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".into()));
        }
        if self.collector.namespace.is_empty()
            || !self
                .collector
                .namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "namespace {:?} is not a valid metric prefix",
                self.collector.namespace
            )));
        }

        for code in &self.collector.currencies {
            let code = code.trim();
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Invalid(format!(
                    "currency code {:?} must be ASCII letters or digits",
                    code
                )));
            }
        }

        Ok(())
    }
}
