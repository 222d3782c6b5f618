//! Ad Manager connector configuration

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tapline_core::TapError;

pub const DEFAULT_BASE_URL: &str = "https://admanager.googleapis.com/v1/";

/// Runtime configuration for the Ad Manager streams
#[derive(Debug, Clone)]
pub struct Config {
    /// API root, always ending in `/`
    pub base_url: String,
    pub network_id: String,
    /// Static OAuth bearer token
    pub access_token: Option<String>,
    /// Delay between operation polls
    pub poll_interval: Duration,
    /// Wall-clock budget for one report operation
    pub timeout: Duration,
    /// `pageSize` for `:fetchRows`
    pub page_size: u32,
    /// Report display name → creation body (usually `{"reportDefinition": {...}}`)
    pub reports: BTreeMap<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            network_id: String::new(),
            access_token: None,
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            page_size: 10_000,
            reports: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Fail fast on missing identifiers.
    pub fn validate(&self) -> Result<(), TapError> {
        if self.network_id.trim().is_empty() {
            return Err(TapError::Config(
                "missing required config value: admanager.network_id".to_string(),
            ));
        }
        if self.access_token.as_deref().is_none_or(str::is_empty) {
            return Err(TapError::Config(
                "missing required config value: admanager.access_token".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(TapError::Config("admanager.page_size must be positive".to_string()));
        }
        Ok(())
    }

    /// `networks/{network_id}`
    pub fn network_scope(&self) -> String {
        format!("networks/{}", self.network_id.trim())
    }

    /// Absolute URL for a resource path relative to the API root
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// Join a base URL and a relative resource path with exactly one `/`
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            network_id: "1234".to_string(),
            access_token: Some("ya29.token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.page_size, 10_000);
        assert!(config.reports.is_empty());
    }

    #[test]
    fn missing_network_is_config_error() {
        let config = Config {
            network_id: " ".to_string(),
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, TapError::Config(ref m) if m.contains("network_id")));
    }

    #[test]
    fn missing_token_is_config_error() {
        let config = Config {
            access_token: Some(String::new()),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(TapError::Config(_))));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn urls() {
        let config = valid();
        assert_eq!(config.network_scope(), "networks/1234");
        assert_eq!(
            config.url("networks/1234/reports"),
            "https://admanager.googleapis.com/v1/networks/1234/reports"
        );
        assert_eq!(join_url("http://h/v1", "/x"), "http://h/v1/x");
    }
}
