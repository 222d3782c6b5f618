//! Dependent stream walker: per-parent child pagination
//!
//! A parent stream exposes a restartable lazy record producer
//! ([`ParentSource`]). The walker drives it to exhaustion and, for every
//! parent, pages through a child resource by page index until one of:
//!
//! - an empty page
//! - `page_index * page_size >= total_count` (total taken from page 0)
//! - a page identical to the previous one
//! - the optional per-parent page bound
//!
//! Child records are normalized and tagged with the parent id. Failures for
//! one parent abandon that parent only; a failing parent source ends the
//! walk.

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;

use crate::clock::Clock;
use crate::error::TapError;
use crate::events::{Event, Observer};
use crate::normalize::{IdNormalizer, coerce_id};
use crate::paginate::Page;
use crate::retry::linear_backoff;

/// Restartable, finite, lazy producer of parent records.
pub trait ParentSource {
    fn records(&self) -> Box<dyn Iterator<Item = Result<Value, TapError>> + '_>;
}

#[derive(Clone, Debug)]
pub struct WalkerConfig {
    /// Label used in events and logs
    pub resource: String,
    /// Field holding the parent identity
    pub parent_key: String,
    /// Field injected into each child record
    pub foreign_key: String,
    pub page_size: u32,
    /// Same-page retries after a connection-class error
    pub max_connection_retries: u32,
    pub connection_backoff: Duration,
    pub max_pages_per_parent: Option<u32>,
}

impl WalkerConfig {
    pub fn new(resource: impl Into<String>, parent_key: impl Into<String>, page_size: u32) -> Self {
        let parent_key = parent_key.into();
        Self {
            resource: resource.into(),
            foreign_key: parent_key.clone(),
            parent_key,
            page_size,
            max_connection_retries: 3,
            connection_backoff: Duration::from_secs(2),
            max_pages_per_parent: None,
        }
    }

    pub fn foreign_key(mut self, key: impl Into<String>) -> Self {
        self.foreign_key = key.into();
        self
    }
}

/// Counters for one walk
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub parents_visited: usize,
    pub parents_skipped: usize,
    pub parents_abandoned: usize,
    pub pages_fetched: usize,
    pub records_emitted: usize,
}

/// Walk every parent of `parent` and page its children through `fetch_page`.
pub fn for_each_child<'a, F>(
    parent: &'a dyn ParentSource,
    fetch_page: F,
    config: WalkerConfig,
    normalizer: IdNormalizer,
    clock: &'a dyn Clock,
    observer: &'a dyn Observer,
) -> ChildRecords<'a, F>
where
    F: FnMut(&Value, u32) -> Result<Page, TapError>,
{
    ChildRecords {
        parents: parent.records(),
        fetch_page,
        config,
        normalizer,
        clock,
        observer,
        current: None,
        buffer: VecDeque::new(),
        summary: WalkSummary::default(),
        done: false,
    }
}

/// Pagination state for the parent being walked
struct ParentCursor {
    id: Value,
    label: String,
    next_index: u32,
    total: Option<u64>,
    previous: Option<Vec<Value>>,
}

pub struct ChildRecords<'a, F> {
    parents: Box<dyn Iterator<Item = Result<Value, TapError>> + 'a>,
    fetch_page: F,
    config: WalkerConfig,
    normalizer: IdNormalizer,
    clock: &'a dyn Clock,
    observer: &'a dyn Observer,
    current: Option<ParentCursor>,
    buffer: VecDeque<Value>,
    summary: WalkSummary,
    done: bool,
}

impl<F> ChildRecords<'_, F>
where
    F: FnMut(&Value, u32) -> Result<Page, TapError>,
{
    pub fn summary(&self) -> &WalkSummary {
        &self.summary
    }

    /// Identity of a parent record, coerced to an integer when possible
    fn parent_id(&self, record: &Value) -> Option<Value> {
        let raw = record.get(&self.config.parent_key)?;
        match raw {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            other => Some(coerce_id(other).map_or_else(|| other.clone(), Value::from)),
        }
    }

    fn fetch_with_retry(&mut self, id: &Value, label: &str, page_index: u32) -> Result<Page, TapError> {
        let mut attempt = 0u32;
        loop {
            match (self.fetch_page)(id, page_index) {
                Err(e) if e.is_transient() && attempt < self.config.max_connection_retries => {
                    attempt += 1;
                    let delay = linear_backoff(self.config.connection_backoff, attempt);
                    log::debug!("{} parent {label}: {e}", self.config.resource);
                    self.observer.observe(&Event::ConnectionRetry {
                        resource: self.config.resource.clone(),
                        page_index,
                        attempt,
                        delay,
                    });
                    self.clock.sleep(delay);
                }
                other => return other,
            }
        }
    }

    fn abandon(&mut self, cursor: &ParentCursor, error: &TapError) {
        let reason = if error.is_authorization_denied() {
            "authorization denied".to_string()
        } else if error.is_transient() {
            format!(
                "connection failed after {} retries",
                self.config.max_connection_retries
            )
        } else {
            log::error!(
                "{} parent {}: page {} failed: {error}",
                self.config.resource,
                cursor.label,
                cursor.next_index
            );
            error.to_string()
        };
        self.summary.parents_abandoned += 1;
        self.observer.observe(&Event::ParentAbandoned {
            parent: cursor.label.clone(),
            page_index: cursor.next_index,
            reason,
        });
    }

    /// Fetch the next page of the current parent, re-arming it unless finished.
    fn advance(&mut self, mut cursor: ParentCursor) {
        if let Some(max) = self.config.max_pages_per_parent {
            if cursor.next_index >= max {
                log::warn!(
                    "{} parent {}: page bound {max} reached",
                    self.config.resource,
                    cursor.label
                );
                return;
            }
        }

        let page_index = cursor.next_index;
        let page = match self.fetch_with_retry(&cursor.id, &cursor.label, page_index) {
            Ok(p) => p,
            Err(e) => {
                self.abandon(&cursor, &e);
                return;
            }
        };
        self.summary.pages_fetched += 1;
        self.observer.observe(&Event::PageFetched {
            resource: self.config.resource.clone(),
            page_index,
            rows: page.items.len(),
        });

        if page.is_empty() {
            return;
        }
        if cursor.previous.as_ref() == Some(&page.items) {
            log::warn!(
                "{} parent {}: page {page_index} repeats the previous page, stopping",
                self.config.resource,
                cursor.label
            );
            return;
        }
        if page_index == 0 {
            cursor.total = page.total_count;
        }

        for item in &page.items {
            match self.normalizer.normalize(item.clone()) {
                Value::Object(mut map) => {
                    map.insert(self.config.foreign_key.clone(), cursor.id.clone());
                    self.buffer.push_back(Value::Object(map));
                }
                other => log::warn!(
                    "{} parent {}: dropping non-object record {other}",
                    self.config.resource,
                    cursor.label
                ),
            }
        }

        cursor.next_index += 1;
        let exhausted = cursor.total.is_some_and(|total| {
            u64::from(cursor.next_index) * u64::from(self.config.page_size) >= total
        });
        cursor.previous = Some(page.items);
        if !exhausted {
            self.current = Some(cursor);
        }
    }
}

impl<F> Iterator for ChildRecords<'_, F>
where
    F: FnMut(&Value, u32) -> Result<Page, TapError>,
{
    type Item = Result<Value, TapError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.summary.records_emitted += 1;
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            if let Some(cursor) = self.current.take() {
                self.advance(cursor);
                continue;
            }

            match self.parents.next() {
                None => {
                    self.done = true;
                    log::debug!("{} walk finished: {:?}", self.config.resource, self.summary);
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(record)) => {
                    self.summary.parents_visited += 1;
                    match self.parent_id(&record) {
                        Some(id) => {
                            let label = match &id {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            self.current = Some(ParentCursor {
                                id,
                                label,
                                next_index: 0,
                                total: None,
                                previous: None,
                            });
                        }
                        None => {
                            self.summary.parents_skipped += 1;
                            log::warn!(
                                "{}: parent record without '{}', skipping",
                                self.config.resource,
                                self.config.parent_key
                            );
                        }
                    }
                }
            }
        }
    }
}
