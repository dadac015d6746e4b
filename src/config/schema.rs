//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Message carried by breaker rejections unless configured otherwise.
pub const DEFAULT_BREAKER_MESSAGE: &str = "Functionality disabled due to previous errors.";

/// Root configuration for the client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for every request URL (e.g., "https://api.example.com").
    pub base_url: String,

    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,

    /// Answer from the response cache first and refresh from the network.
    pub cache_then_network: bool,

    /// Circuit breaker settings. Absent means no breaking.
    pub circuit_breaker: Option<BreakerConfig>,

    /// Transport pass-through options, copied into every request.
    pub options: BTreeMap<String, serde_json::Value>,

    /// HTTP transport settings.
    pub transport: TransportConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            base_url: String::new(),
            headers,
            cache_then_network: false,
            circuit_breaker: None,
            options: BTreeMap::new(),
            transport: TransportConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Milliseconds an open breaker waits before letting a probe through.
    pub grace_period_ms: u64,

    /// Consecutive countable failures that open the breaker.
    pub threshold: u32,

    /// Message carried by short-circuited calls.
    pub message: String,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 5000,
            threshold: 5,
            message: DEFAULT_BREAKER_MESSAGE.to_string(),
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Request timeout (total time for request/response) in milliseconds.
    pub timeout_ms: u64,

    /// User-Agent header value.
    pub user_agent: String,

    /// Ignore proxy settings from the environment.
    pub no_proxy: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: concat!("resilient-client/", env!("CARGO_PKG_VERSION")).to_string(),
            no_proxy: false,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// JSON file the in-memory cache is loaded from and saved to.
    pub persistence_path: Option<String>,

    /// Entries older than this are treated as missing.
    pub max_age_secs: Option<u64>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "");
        assert!(config.headers.contains_key("Content-Type"));
        assert!(!config.cache_then_network);
        assert!(config.circuit_breaker.is_none());

        let breaker = BreakerConfig::default();
        assert_eq!(breaker.grace_period_ms, 5000);
        assert_eq!(breaker.threshold, 5);
        assert_eq!(breaker.message, DEFAULT_BREAKER_MESSAGE);
    }

    #[test]
    fn test_breaker_fields_merge_with_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            base_url = "https://api.example.com"

            [circuit_breaker]
            threshold = 6
            "#,
        )
        .unwrap();

        let breaker = config.circuit_breaker.unwrap();
        assert_eq!(breaker.threshold, 6);
        assert_eq!(breaker.grace_period_ms, 5000);
        assert_eq!(breaker.message, DEFAULT_BREAKER_MESSAGE);
        assert_eq!(config.base_url, "https://api.example.com");
    }

    #[test]
    fn test_pass_through_options() {
        let config: ClientConfig = toml::from_str(
            r#"
            [options]
            credentials = "same-origin"

            [options.nested]
            x = "y"
            "#,
        )
        .unwrap();

        assert_eq!(config.options["credentials"], "same-origin");
        assert_eq!(config.options["nested"]["x"], "y");
    }

    #[test]
    fn test_log_format_parsing() {
        let config: ClientConfig = toml::from_str(
            r#"
            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}
