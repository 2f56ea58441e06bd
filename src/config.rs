use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upstream deadline when no override is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Upper bound for buffered JSON request bodies (4 MiB). Anything larger
/// must use the streaming path or is rejected.
pub const DEFAULT_MAX_JSON_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listen host address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Allowed target host patterns, in configuration order.
    /// An empty list denies every target.
    pub allowed_hosts: Vec<String>,

    /// Shared secret for the auth check; `None` disables authentication
    pub api_key: Option<String>,

    /// Upstream request deadline in milliseconds
    pub request_timeout_ms: u64,

    /// Maximum size of a buffered JSON request body in bytes
    pub max_json_body_bytes: usize,

    /// Follow upstream redirects during dispatch. Redirected hosts are
    /// NOT re-validated against the allowlist; disable to close that gap.
    pub follow_redirects: bool,

    /// Log level
    pub log_level: String,
}

impl ProxyConfig {
    /// Load configuration from environment variables.
    ///
    /// Pipeline settings (allowed hosts, API key, timeout) never fail:
    /// absent or malformed values degrade to safe defaults — deny-all
    /// for the allowlist, no-auth for the key, 30s for the timeout.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("PROXY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PROXY_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("Invalid PROXY_PORT")?;

        let allowed_hosts = parse_host_list(
            &std::env::var("ALLOWED_HOSTS")
                .or_else(|_| std::env::var("PROXY_ALLOWED_HOSTS"))
                .unwrap_or_default(),
        );

        let api_key = normalize_api_key(
            std::env::var("PROXY_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .ok(),
        );

        let request_timeout_ms = parse_timeout_ms(std::env::var("PROXY_TIMEOUT_MS").ok());

        let max_json_body_bytes = std::env::var("MAX_JSON_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_JSON_BODY_BYTES);

        let follow_redirects = std::env::var("PROXY_FOLLOW_REDIRECTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            host,
            port,
            allowed_hosts,
            api_key,
            request_timeout_ms,
            max_json_body_bytes,
            follow_redirects,
            log_level,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            anyhow::bail!("PROXY_TIMEOUT_MS must be greater than 0");
        }

        if self.max_json_body_bytes == 0 {
            anyhow::bail!("MAX_JSON_BODY_BYTES must be greater than 0");
        }

        for pattern in &self.allowed_hosts {
            let trimmed = pattern.trim();
            if trimmed.is_empty() {
                anyhow::bail!("Allowed host patterns must not be empty strings");
            }
            if trimmed == "*." {
                anyhow::bail!("Wildcard host patterns must name a suffix, got \"*.\"");
            }
        }

        Ok(())
    }

    /// Get the upstream deadline as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Get the listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the shared-secret auth check is active
    pub fn auth_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Split a comma-separated pattern list, trimming whitespace and dropping
/// empty entries while preserving order.
fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// An unset or empty key means "no auth required".
fn normalize_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// Absent, non-numeric or non-positive values fall back to the default.
fn parse_timeout_ms(raw: Option<String>) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_TIMEOUT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ProxyConfig {
        ProxyConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_hosts: vec!["api.example.com".to_string()],
            api_key: None,
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_json_body_bytes: DEFAULT_MAX_JSON_BODY_BYTES,
            follow_redirects: true,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_parse_host_list() {
        assert_eq!(
            parse_host_list("api.example.com, *.internal.net ,,other.io"),
            vec!["api.example.com", "*.internal.net", "other.io"]
        );
        assert!(parse_host_list("").is_empty());
        assert!(parse_host_list(" , ,").is_empty());
    }

    #[test]
    fn test_parse_host_list_preserves_order() {
        assert_eq!(
            parse_host_list("b.com,a.com,c.com"),
            vec!["b.com", "a.com", "c.com"]
        );
    }

    #[test]
    fn test_normalize_api_key() {
        assert_eq!(
            normalize_api_key(Some("secret".to_string())),
            Some("secret".to_string())
        );
        assert_eq!(normalize_api_key(Some("  ".to_string())), None);
        assert_eq!(normalize_api_key(Some(String::new())), None);
        assert_eq!(normalize_api_key(None), None);
    }

    #[test]
    fn test_parse_timeout_ms_defaults() {
        assert_eq!(parse_timeout_ms(Some("5000".to_string())), 5000);
        assert_eq!(parse_timeout_ms(Some("0".to_string())), DEFAULT_TIMEOUT_MS);
        assert_eq!(
            parse_timeout_ms(Some("not-a-number".to_string())),
            DEFAULT_TIMEOUT_MS
        );
        assert_eq!(parse_timeout_ms(None), DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_config_validation() {
        let mut config = base_config();
        assert!(config.validate().is_ok());

        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.request_timeout_ms = DEFAULT_TIMEOUT_MS;

        config.max_json_body_bytes = 0;
        assert!(config.validate().is_err());
        config.max_json_body_bytes = DEFAULT_MAX_JSON_BODY_BYTES;

        // Empty allowlist is valid configuration (deny-all), not an error
        config.allowed_hosts.clear();
        assert!(config.validate().is_ok());

        // A wildcard without a suffix names nothing
        config.allowed_hosts = vec!["*.".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_enabled() {
        let mut config = base_config();
        assert!(!config.auth_enabled());
        config.api_key = Some("secret".to_string());
        assert!(config.auth_enabled());
    }
}
