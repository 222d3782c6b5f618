//! ON24 events: the parent stream for attendees and registrants

use std::collections::VecDeque;

use serde_json::Value;
use tapline_core::{Event, HttpGateway, IdNormalizer, ParentSource, TapError};

use crate::config::Config;
use crate::paging::OffsetEndpoint;

/// Date format expected by `startDate`
pub const START_DATE_FORMAT: &str = "%Y-%m-%d";

pub struct EventsStream<'a> {
    gateway: &'a HttpGateway,
    endpoint: OffsetEndpoint,
    normalizer: IdNormalizer,
}

impl<'a> EventsStream<'a> {
    pub fn new(gateway: &'a HttpGateway, config: &Config) -> Self {
        let mut endpoint = OffsetEndpoint::new(
            config.events_url(),
            "events",
            "totalevents",
            config.items_per_page,
        );
        if let Some(date) = config.start_date {
            endpoint = endpoint.query("startDate", date.format(START_DATE_FORMAT));
        }
        Self {
            gateway,
            endpoint,
            normalizer: IdNormalizer::default(),
        }
    }

    /// Lazy, normalized event records; each call starts from page 0.
    pub fn iter(&self) -> EventRecords<'_> {
        EventRecords {
            stream: self,
            page_index: 0,
            previous: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }
}

impl ParentSource for EventsStream<'_> {
    fn records(&self) -> Box<dyn Iterator<Item = Result<Value, TapError>> + '_> {
        Box::new(self.iter())
    }
}

pub struct EventRecords<'s> {
    stream: &'s EventsStream<'s>,
    page_index: u32,
    previous: Option<Vec<Value>>,
    buffer: VecDeque<Value>,
    done: bool,
}

impl EventRecords<'_> {
    fn fetch_next(&mut self) -> Result<(), TapError> {
        let stream = self.stream;
        let page_size = stream.endpoint.page_size();
        let page = stream.endpoint.fetch(stream.gateway, self.page_index)?;
        stream.gateway.observer().observe(&Event::PageFetched {
            resource: "events".to_string(),
            page_index: self.page_index,
            rows: page.items.len(),
        });

        if self.previous.as_ref() == Some(&page.items) {
            log::warn!("events: page {} repeats the previous page, stopping", self.page_index);
            self.done = true;
            return Ok(());
        }

        let short = page.items.len() < page_size as usize;
        self.page_index += 1;
        let total_reached = page
            .total_count
            .is_some_and(|total| u64::from(self.page_index) * u64::from(page_size) >= total);
        self.done = short || total_reached;

        self.buffer
            .extend(page.items.iter().cloned().map(|e| stream.normalizer.normalize(e)));
        self.previous = Some(page.items);
        Ok(())
    }
}

impl Iterator for EventRecords<'_> {
    type Item = Result<Value, TapError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.buffer.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_next() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;
    use tapline_core::testing::{Harness, MockTransport, json_ok, status};

    use super::*;

    fn config(items_per_page: u32) -> Config {
        Config {
            base_url: "https://on24.test/v2".to_string(),
            client_id: "5".to_string(),
            access_token_key: Some("k".to_string()),
            access_token_secret: Some("s".to_string()),
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            items_per_page,
            ..Default::default()
        }
    }

    fn events(ids: &[i64]) -> Value {
        let events: Vec<Value> = ids.iter().map(|id| json!({"eventid": id.to_string()})).collect();
        json!({ "events": events })
    }

    #[test]
    fn stops_on_short_page() {
        let h = Harness::new(MockTransport::scripted([
            json_ok(events(&[1, 2])),
            json_ok(events(&[3])),
        ]));
        let gw = h.gateway();
        let config = config(2);
        let stream = EventsStream::new(&gw, &config);

        let ids: Vec<Value> = stream.iter().map(|e| e.unwrap()["eventid"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);

        let reqs = h.transport.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].url, "https://on24.test/v2/client/5/event");
        assert_eq!(reqs[0].query_value("startDate"), Some("2024-02-01"));
        assert_eq!(reqs[0].query_value("pageOffset"), Some("0"));
        assert_eq!(reqs[1].query_value("pageOffset"), Some("1"));
    }

    #[test]
    fn stops_on_empty_page() {
        let h = Harness::new(MockTransport::scripted([
            json_ok(events(&[1, 2])),
            json_ok(events(&[])),
        ]));
        let gw = h.gateway();
        let config = config(2);
        assert_eq!(EventsStream::new(&gw, &config).iter().count(), 2);
    }

    #[test]
    fn stops_when_total_reached() {
        let h = Harness::new(MockTransport::scripted([json_ok(
            json!({"events": [{"eventid": 1}, {"eventid": 2}], "totalevents": 2}),
        )]));
        let gw = h.gateway();
        let config = config(2);
        assert_eq!(EventsStream::new(&gw, &config).iter().count(), 2);
        assert_eq!(h.transport.request_count(), 1);
    }

    #[test]
    fn restartable() {
        let h = Harness::new(MockTransport::new(|_| json_ok(events(&[9]))));
        let gw = h.gateway();
        let config = config(2);
        let stream = EventsStream::new(&gw, &config);
        assert_eq!(stream.records().count(), 1);
        assert_eq!(stream.records().count(), 1);
        assert_eq!(h.transport.request_count(), 2);
    }

    #[test]
    fn error_ends_stream() {
        let h = Harness::new(MockTransport::scripted([status(500)]));
        let gw = h.gateway();
        let config = config(2);
        let stream = EventsStream::new(&gw, &config);
        let mut it = stream.iter();
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());
    }
}
