//! Configuration loading from TOML files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

/// Global configuration for tapline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub http: HttpConfig,
    pub admanager: AdManagerConfig,
    pub on24: On24Config,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_dir: PathBuf,
    pub compression_level: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("./data"),
            compression_level: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total attempts for throttled requests
    pub max_retries: u32,
    /// Exponential backoff base in seconds
    pub base_delay_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: tapline_core::retry::DEFAULT_MAX_ATTEMPTS,
            base_delay_secs: tapline_core::retry::DEFAULT_BASE_DELAY.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdManagerConfig {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub network_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_token: Option<String>,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
    pub page_size: u32,
    /// Display name → report body, e.g. `[admanager.reports.Daily.reportDefinition]`
    pub reports: BTreeMap<String, serde_json::Value>,
}

impl Default for AdManagerConfig {
    fn default() -> Self {
        let defaults = tapline_admanager::Config::default();
        Self {
            base_url: defaults.base_url,
            network_id: None,
            access_token: std::env::var("GAM_ACCESS_TOKEN").ok(),
            poll_interval_secs: defaults.poll_interval.as_secs(),
            timeout_secs: defaults.timeout.as_secs(),
            page_size: defaults.page_size,
            reports: BTreeMap::new(),
        }
    }
}

impl AdManagerConfig {
    pub fn to_source(&self) -> tapline_admanager::Config {
        tapline_admanager::Config {
            base_url: self.base_url.clone(),
            network_id: self.network_id.clone().unwrap_or_default(),
            access_token: self.access_token.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            page_size: self.page_size,
            reports: self.reports.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct On24Config {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub client_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_token_key: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_token_secret: Option<String>,
    /// YYYY-MM-DD
    pub start_date: Option<String>,
    pub items_per_page: u32,
    pub max_pages_per_event: Option<u32>,
}

impl Default for On24Config {
    fn default() -> Self {
        let defaults = tapline_on24::Config::default();
        Self {
            base_url: defaults.base_url,
            client_id: None,
            access_token_key: std::env::var("ON24_ACCESS_TOKEN_KEY").ok(),
            access_token_secret: std::env::var("ON24_ACCESS_TOKEN_SECRET").ok(),
            start_date: None,
            items_per_page: defaults.items_per_page,
            max_pages_per_event: None,
        }
    }
}

impl On24Config {
    pub fn to_source(&self) -> Result<tapline_on24::Config> {
        let start_date = self
            .start_date
            .as_deref()
            .map(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d"))
            .transpose()
            .with_context(|| format!("Invalid on24.start_date: {:?}", self.start_date))?;
        Ok(tapline_on24::Config {
            base_url: self.base_url.clone(),
            client_id: self.client_id.clone().unwrap_or_default(),
            access_token_key: self.access_token_key.clone(),
            access_token_secret: self.access_token_secret.clone(),
            start_date,
            items_per_page: self.items_per_page,
            max_pages_per_event: self.max_pages_per_event,
        })
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

/// Show whether a secret is set without revealing it
pub fn mask(secret: Option<&str>) -> String {
    let chars: Vec<char> = secret.unwrap_or_default().chars().collect();
    match chars.len() {
        0 => "not set".to_string(),
        n if n > 8 => format!(
            "{}…{}",
            chars[..2].iter().collect::<String>(),
            chars[n - 2..].iter().collect::<String>()
        ),
        _ => "configured".to_string(),
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./tapline.toml (current directory)
    /// 2. ~/.config/tapline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("tapline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "tapline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.output.default_dir, PathBuf::from("./data"));
        assert_eq!(config.output.compression_level, 3);
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.base_delay_secs, 2);
        assert_eq!(config.admanager.timeout_secs, 300);
        assert_eq!(config.on24.items_per_page, 100);
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("TAPLINE_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${TAPLINE_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("TAPLINE_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn mask_secrets() {
        assert_eq!(mask(None), "not set");
        assert_eq!(mask(Some("")), "not set");
        assert_eq!(mask(Some("short")), "configured");
        assert_eq!(mask(Some("ya29.abcdefgh")), "ya…gh");
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[http]
max_retries = 3

[admanager]
network_id = "1234"
access_token = "literal-token"
timeout_secs = 60

[admanager.reports.Daily.reportDefinition]
dimensions = ["DATE"]
metrics = ["IMPRESSIONS", "CLICKS"]

[on24]
client_id = "10001"
access_token_key = "k"
access_token_secret = "s"
start_date = "2024-01-15"
items_per_page = 50
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.http.base_delay_secs, 2);

        let gam = config.admanager.to_source();
        assert_eq!(gam.network_id, "1234");
        assert_eq!(gam.timeout, Duration::from_secs(60));
        assert_eq!(gam.poll_interval, Duration::from_secs(5));
        assert_eq!(
            gam.reports["Daily"]["reportDefinition"]["metrics"],
            serde_json::json!(["IMPRESSIONS", "CLICKS"])
        );
        assert!(gam.validate().is_ok());

        let on24 = config.on24.to_source().unwrap();
        assert_eq!(on24.start_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(on24.items_per_page, 50);
        assert!(on24.validate().is_ok());
    }

    #[test]
    fn bad_start_date_rejected() {
        let config: Config = toml::from_str("[on24]\nstart_date = \"15/01/2024\"\n").unwrap();
        assert!(config.on24.to_source().is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tapline.toml");
        std::fs::write(&path, "[output]\ncompression_level = 9\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.output.compression_level, 9);
        assert!(Config::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
