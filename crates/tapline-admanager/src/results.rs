//! Report result rows via `:fetchRows`

use serde_json::Value;
use tapline_core::{CursorPager, HttpGateway, TapError};

use crate::config::join_url;

pub const DEFAULT_PAGE_SIZE: u32 = 10_000;

/// Every row of one report result, in server order
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub result_name: String,
    pub rows: Vec<Value>,
}

pub struct ResultPaginator<'a> {
    gateway: &'a HttpGateway,
    base_url: String,
    page_size: u32,
}

impl<'a> ResultPaginator<'a> {
    pub fn new(gateway: &'a HttpGateway, base_url: impl Into<String>) -> Self {
        Self {
            gateway,
            base_url: base_url.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Pager over `{base}{result}:fetchRows`; iterate `.pages()` for lazy access.
    pub fn pager(&self, result_name: &str) -> CursorPager<'a> {
        let url = join_url(&self.base_url, &format!("{result_name}:fetchRows"));
        CursorPager::new(self.gateway, "report_rows", url, "rows").page_size(self.page_size)
    }

    pub fn fetch_all(&self, result_name: &str) -> Result<ResultSet, TapError> {
        let rows = self.pager(result_name).fetch_all()?;
        log::debug!("{result_name}: fetched {} rows", rows.len());
        Ok(ResultSet {
            result_name: result_name.to_string(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tapline_core::Response;
    use tapline_core::testing::{Harness, MockTransport, json_ok};

    use super::*;

    const BASE: &str = "https://gam.test/v1/";
    const RESULT: &str = "networks/1/reports/7/results/3";

    #[test]
    fn follows_tokens_in_order() {
        let h = Harness::new(MockTransport::scripted([
            json_ok(json!({"rows": [{"n": 1}, {"n": 2}], "nextPageToken": "a"})),
            json_ok(json!({"rows": [{"n": 3}], "nextPageToken": "b"})),
            json_ok(json!({"rows": [{"n": 4}]})),
        ]));
        let gw = h.gateway();
        let set = ResultPaginator::new(&gw, BASE).fetch_all(RESULT).unwrap();

        let ns: Vec<i64> = set.rows.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2, 3, 4]);
        assert_eq!(set.result_name, RESULT);

        let reqs = h.transport.requests();
        assert_eq!(
            reqs[0].url,
            "https://gam.test/v1/networks/1/reports/7/results/3:fetchRows"
        );
        assert_eq!(reqs[0].query_value("pageSize"), Some("10000"));
        assert_eq!(reqs[0].query_value("pageToken"), None);
        assert_eq!(reqs[1].query_value("pageToken"), Some("a"));
        assert_eq!(reqs[2].query_value("pageToken"), Some("b"));
    }

    #[test]
    fn empty_token_ends() {
        let h = Harness::new(MockTransport::scripted([json_ok(
            json!({"rows": [], "nextPageToken": ""}),
        )]));
        let gw = h.gateway();
        let set = ResultPaginator::new(&gw, BASE).fetch_all(RESULT).unwrap();
        assert!(set.rows.is_empty());
    }

    #[test]
    fn repeated_token_stops() {
        let h = Harness::new(MockTransport::new(|_| {
            json_ok(json!({"rows": [1], "nextPageToken": "same"}))
        }));
        let gw = h.gateway();
        let set = ResultPaginator::new(&gw, BASE).fetch_all(RESULT).unwrap();
        assert_eq!(set.rows.len(), 2);
        assert_eq!(h.transport.request_count(), 2);
    }

    #[test]
    fn invalid_json_carries_raw_body() {
        let h = Harness::new(MockTransport::scripted([Ok(Response::new(
            200,
            "<html>oops</html>",
        ))]));
        let gw = h.gateway();
        let err = ResultPaginator::new(&gw, BASE)
            .page_size(50)
            .fetch_all(RESULT)
            .unwrap_err();
        match err {
            TapError::InvalidPage { body, .. } => assert_eq!(body, "<html>oops</html>"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lazy_pages() {
        let h = Harness::new(MockTransport::scripted([
            json_ok(json!({"rows": [1], "nextPageToken": "a"})),
            json_ok(json!({"rows": [2]})),
        ]));
        let gw = h.gateway();
        let paginator = ResultPaginator::new(&gw, BASE);
        let pager = paginator.pager(RESULT);
        let mut pages = pager.pages();

        assert_eq!(pages.next().unwrap().unwrap().items, vec![json!(1)]);
        assert_eq!(h.transport.request_count(), 1);
        assert_eq!(pages.next().unwrap().unwrap().items, vec![json!(2)]);
        assert!(pages.next().is_none());
    }
}
