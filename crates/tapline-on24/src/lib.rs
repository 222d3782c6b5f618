//! Tapline ON24 - webinar events and their per-event child streams
//!
//! `events` is an offset-paged parent stream; `attendees` and
//! `registrants` are walked per event, with identifiers normalized to
//! integers and the owning `eventid` injected into every child record.

pub mod children;
pub mod config;
pub mod events;
pub mod paging;

use tapline_core::{HttpGateway, ReqwestTransport, TapError, Transport};

// Re-exports
pub use children::{ChildResource, EVENT_KEY};
pub use config::Config;
pub use events::EventsStream;

/// Gateway over `transport` carrying the access token pair.
pub fn gateway(config: &Config, transport: Box<dyn Transport>) -> Result<HttpGateway, TapError> {
    config.validate()?;
    let key = config.access_token_key.as_deref().unwrap_or_default();
    let secret = config.access_token_secret.as_deref().unwrap_or_default();
    Ok(HttpGateway::new(transport)
        .with_header("accessTokenKey", key)
        .with_header("accessTokenSecret", secret))
}

/// Validated gateway over the shared reqwest client.
pub fn connect(config: &Config) -> Result<HttpGateway, TapError> {
    gateway(config, Box::new(ReqwestTransport::new()))
}
