//! Plain list streams under a network: orders, placements, reports

use tapline_core::{CursorPager, HttpGateway};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStream {
    Orders,
    Placements,
    Reports,
}

impl ListStream {
    pub const ALL: [ListStream; 3] = [Self::Orders, Self::Placements, Self::Reports];

    /// Stream name, also the collection path segment and the items field
    pub fn name(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Placements => "placements",
            Self::Reports => "reports",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn pager<'a>(self, gateway: &'a HttpGateway, config: &Config) -> CursorPager<'a> {
        let url = config.url(&format!("{}/{}", config.network_scope(), self.name()));
        CursorPager::new(gateway, self.name(), url, self.name())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tapline_core::testing::{Harness, MockTransport, json_ok};

    use super::*;

    fn config() -> Config {
        Config {
            base_url: "https://gam.test/v1/".to_string(),
            network_id: "21".to_string(),
            access_token: Some("t".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn names_roundtrip() {
        for s in ListStream::ALL {
            assert_eq!(ListStream::from_name(s.name()), Some(s));
        }
        assert_eq!(ListStream::from_name("report_results"), None);
    }

    #[test]
    fn orders_follow_page_tokens() {
        let h = Harness::new(MockTransport::scripted([
            json_ok(json!({"orders": [{"orderId": "1"}], "nextPageToken": "n"})),
            json_ok(json!({"orders": [{"orderId": "2"}]})),
        ]));
        let gw = h.gateway();
        let pager = ListStream::Orders.pager(&gw, &config());
        let ids: Vec<String> = pager
            .records()
            .map(|r| r.unwrap()["orderId"].as_str().unwrap().to_string())
            .collect();

        assert_eq!(ids, vec!["1", "2"]);
        let reqs = h.transport.requests();
        assert_eq!(reqs[0].url, "https://gam.test/v1/networks/21/orders");
        assert_eq!(reqs[1].query_value("pageToken"), Some("n"));
        assert_eq!(h.observer.count("page_fetched"), 2);
    }

    #[test]
    fn placements_missing_field_is_empty() {
        let h = Harness::new(MockTransport::scripted([json_ok(json!({}))]));
        let gw = h.gateway();
        let pager = ListStream::Placements.pager(&gw, &config());
        assert_eq!(pager.fetch_all().unwrap().len(), 0);
    }
}
