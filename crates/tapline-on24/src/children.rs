//! Per-event child streams: attendees and registrants

use serde_json::Value;
use tapline_core::{
    ChildRecords, HttpGateway, IdNormalizer, Page, ParentSource, TapError, WalkerConfig,
    for_each_child,
};

use crate::config::Config;
use crate::paging::OffsetEndpoint;

/// Parent key on events, and foreign key on children
pub const EVENT_KEY: &str = "eventid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildResource {
    Attendees,
    Registrants,
}

impl ChildResource {
    pub const ALL: [ChildResource; 2] = [Self::Attendees, Self::Registrants];

    /// Stream name and items field
    pub fn name(self) -> &'static str {
        match self {
            Self::Attendees => "attendees",
            Self::Registrants => "registrants",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Path segment under `/event/{eventid}/`
    fn path_segment(self) -> &'static str {
        match self {
            Self::Attendees => "attendee",
            Self::Registrants => "registrant",
        }
    }

    fn total_key(self) -> &'static str {
        match self {
            Self::Attendees => "totalattendees",
            Self::Registrants => "totalregistrants",
        }
    }

    pub fn endpoint(self, config: &Config, event_id: &str) -> OffsetEndpoint {
        OffsetEndpoint::new(
            config.event_url(event_id, self.path_segment()),
            self.name(),
            self.total_key(),
            config.items_per_page,
        )
    }

    pub fn walker_config(self, config: &Config) -> WalkerConfig {
        let mut walker = WalkerConfig::new(self.name(), EVENT_KEY, config.items_per_page)
            .foreign_key(EVENT_KEY);
        walker.max_pages_per_parent = config.max_pages_per_event;
        walker
    }

    /// Walk every event of `events`, paging this resource per event.
    pub fn walk<'a>(
        self,
        gateway: &'a HttpGateway,
        config: &Config,
        events: &'a dyn ParentSource,
    ) -> ChildRecords<'a, impl FnMut(&Value, u32) -> Result<Page, TapError> + 'a> {
        let config_for_pages = config.clone();
        let fetch_page = move |event_id: &Value, page_index: u32| {
            self.endpoint(&config_for_pages, &path_id(event_id))
                .fetch(gateway, page_index)
        };
        for_each_child(
            events,
            fetch_page,
            self.walker_config(config),
            IdNormalizer::default(),
            gateway.clock(),
            gateway.observer(),
        )
    }
}

/// Identifier as it appears in a URL path
fn path_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn names() {
        assert_eq!(ChildResource::from_name("attendees"), Some(ChildResource::Attendees));
        assert_eq!(ChildResource::from_name("registrants"), Some(ChildResource::Registrants));
        assert_eq!(ChildResource::from_name("events"), None);
    }

    #[test]
    fn walker_config_uses_event_key() {
        let config = Config {
            items_per_page: 50,
            max_pages_per_event: Some(10),
            ..Default::default()
        };
        let w = ChildResource::Registrants.walker_config(&config);
        assert_eq!(w.parent_key, "eventid");
        assert_eq!(w.foreign_key, "eventid");
        assert_eq!(w.page_size, 50);
        assert_eq!(w.max_pages_per_parent, Some(10));
    }

    #[test]
    fn path_ids() {
        assert_eq!(path_id(&json!(77)), "77");
        assert_eq!(path_id(&json!("x-1")), "x-1");
    }
}
