//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Durations are plain milliseconds, `0` meaning "disabled".

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Header size used when `max_header_bytes` is not positive.
pub const DEFAULT_MAX_HEADER_BYTES: i64 = 1 << 20;

/// The smallest read buffer hyper accepts.
pub const MIN_HEADER_BUF_BYTES: usize = 8192;

/// Root configuration for one HTTP server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub addr: String,

    /// Time allowed for reading a request body.
    pub read_timeout_ms: u64,

    /// Time allowed for reading request headers.
    pub read_header_timeout_ms: u64,

    /// Time allowed for producing a response.
    pub write_timeout_ms: u64,

    /// Keep-alive interval for idle HTTP/2 connections.
    pub idle_timeout_ms: u64,

    /// Maximum request header size. Non-positive values use the default.
    pub max_header_bytes: i64,

    /// Maximum JSON body size accepted while binding.
    pub max_body_bytes: usize,

    /// Verbose framework logging and per-request HTTP traces.
    pub debug: bool,

    /// Health check path. Answers `GET` with `200 OK` when set.
    pub ping_uri: Option<String>,

    /// Bound on draining connections at shutdown.
    pub shutdown_timeout_ms: u64,

    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            read_timeout_ms: 0,
            read_header_timeout_ms: 0,
            write_timeout_ms: 0,
            idle_timeout_ms: 0,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: 2 * 1024 * 1024,
            debug: false,
            ping_uri: None,
            shutdown_timeout_ms: 5000,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub fn read_header_timeout(&self) -> Option<Duration> {
        millis(self.read_header_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        millis(self.idle_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Effective header limit in bytes.
    pub fn max_header_bytes(&self) -> usize {
        let configured = if self.max_header_bytes <= 0 {
            DEFAULT_MAX_HEADER_BYTES
        } else {
            self.max_header_bytes
        };
        usize::try_from(configured)
            .unwrap_or(usize::MAX)
            .max(MIN_HEADER_BUF_BYTES)
    }

    /// The health check path with a leading `/`, if one is configured.
    pub fn ping_path(&self) -> Option<String> {
        let uri = self.ping_uri.as_deref()?.trim();
        if uri.is_empty() {
            return None;
        }
        if uri.starts_with('/') {
            Some(uri.to_string())
        } else {
            Some(format!("/{}", uri))
        }
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Interval between live task samples.
    pub sample_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            sample_interval_secs: 20,
        }
    }
}

impl ObservabilityConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ServerConfig = toml::from_str(r#"addr = "127.0.0.1:9000""#).unwrap();

        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_header_bytes(), 1 << 20);
        assert_eq!(config.observability.sample_interval(), Duration::from_secs(20));
    }

    #[test]
    fn test_full_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            addr = "0.0.0.0:8000"
            read_timeout_ms = 1500
            write_timeout_ms = 3000
            max_header_bytes = 4096
            debug = true
            ping_uri = "ping"

            [observability]
            metrics_enabled = true
            metrics_address = "127.0.0.1:9191"
            "#,
        )
        .unwrap();

        assert_eq!(config.read_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.write_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(config.max_header_bytes(), MIN_HEADER_BUF_BYTES);
        assert!(config.debug);
        assert_eq!(config.ping_path().as_deref(), Some("/ping"));
        assert!(config.observability.metrics_enabled);
    }

    #[test]
    fn test_max_header_fallback() {
        let config = ServerConfig {
            max_header_bytes: -1,
            ..Default::default()
        };
        assert_eq!(config.max_header_bytes(), DEFAULT_MAX_HEADER_BYTES as usize);
    }

    #[test]
    fn test_ping_path_normalization() {
        let mut config = ServerConfig::default();
        assert_eq!(config.ping_path(), None);

        config.ping_uri = Some("/health".into());
        assert_eq!(config.ping_path().as_deref(), Some("/health"));

        config.ping_uri = Some("".into());
        assert_eq!(config.ping_path(), None);
    }
}
