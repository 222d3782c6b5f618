//! ON24 connector configuration

use chrono::NaiveDate;
use tapline_core::TapError;

pub const DEFAULT_BASE_URL: &str = "https://api.on24.com/v2";

/// Runtime configuration for the ON24 streams
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub client_id: String,
    pub access_token_key: Option<String>,
    pub access_token_secret: Option<String>,
    /// Lower bound for listed events (`startDate`)
    pub start_date: Option<NaiveDate>,
    /// `itemsPerPage` for every paged endpoint
    pub items_per_page: u32,
    /// Hard bound on child pages per event
    pub max_pages_per_event: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: String::new(),
            access_token_key: None,
            access_token_secret: None,
            start_date: None,
            items_per_page: 100,
            max_pages_per_event: None,
        }
    }
}

fn required(value: Option<&str>, name: &str) -> Result<(), TapError> {
    if value.is_none_or(|v| v.trim().is_empty()) {
        return Err(TapError::Config(format!(
            "missing required config value: on24.{name}"
        )));
    }
    Ok(())
}

impl Config {
    /// Fail fast on missing identifiers and credentials.
    pub fn validate(&self) -> Result<(), TapError> {
        required(Some(self.client_id.as_str()), "client_id")?;
        required(self.access_token_key.as_deref(), "access_token_key")?;
        required(self.access_token_secret.as_deref(), "access_token_secret")?;
        if self.items_per_page == 0 {
            return Err(TapError::Config("on24.items_per_page must be positive".to_string()));
        }
        Ok(())
    }

    /// `{base}/client/{client_id}/event`
    pub fn events_url(&self) -> String {
        format!(
            "{}/client/{}/event",
            self.base_url.trim_end_matches('/'),
            self.client_id.trim()
        )
    }

    /// `{base}/client/{client_id}/event/{event_id}/{resource}`
    pub fn event_url(&self, event_id: &str, resource: &str) -> String {
        format!("{}/{event_id}/{resource}", self.events_url())
    }
}
