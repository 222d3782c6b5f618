//! Page decoding and cursor-token pagination

use std::collections::VecDeque;

use serde_json::Value;

use crate::error::TapError;
use crate::events::Event;
use crate::gateway::HttpGateway;
use crate::transport::Request;

/// Query parameter carrying the page size
pub const PAGE_SIZE_PARAM: &str = "pageSize";
/// Query parameter carrying the cursor
pub const PAGE_TOKEN_PARAM: &str = "pageToken";
/// Response field carrying the next cursor
pub const NEXT_PAGE_TOKEN_KEY: &str = "nextPageToken";

/// One page of raw records
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Opaque cursor for the next page; `None` ends cursor pagination
    pub cursor_token: Option<String>,
    /// Total item count, when the API reports one
    pub total_count: Option<u64>,
}

impl Page {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }

    pub fn with_cursor(mut self, token: impl Into<String>) -> Self {
        self.cursor_token = Some(token.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Decode a JSON page body.
    ///
    /// A missing items field is an empty page. Anything that is not a JSON
    /// object, or an items field that is not an array, is `InvalidPage`
    /// carrying the raw body.
    pub fn decode(endpoint: &str, body: &str, shape: &PageShape) -> Result<Self, TapError> {
        let invalid = || TapError::InvalidPage {
            endpoint: endpoint.to_string(),
            body: body.to_string(),
        };
        let mut value: Value = serde_json::from_str(body).map_err(|_| invalid())?;
        let obj = value.as_object_mut().ok_or_else(invalid)?;

        let items = match obj.remove(&shape.items_key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(invalid()),
        };
        let cursor_token = shape
            .token_key
            .as_ref()
            .and_then(|k| obj.get(k))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let total_count = shape
            .total_key
            .as_ref()
            .and_then(|k| obj.get(k))
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.trim().parse().ok()));

        Ok(Self {
            items,
            cursor_token,
            total_count,
        })
    }
}

/// Where a page body keeps its items, cursor and total
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageShape {
    pub items_key: String,
    pub token_key: Option<String>,
    pub total_key: Option<String>,
}

impl PageShape {
    /// `{ "<items>": [...], "nextPageToken": "..." }`
    pub fn cursor(items_key: impl Into<String>) -> Self {
        Self {
            items_key: items_key.into(),
            token_key: Some(NEXT_PAGE_TOKEN_KEY.to_string()),
            total_key: None,
        }
    }

    /// `{ "<items>": [...], "<total>": N }`
    pub fn offset(items_key: impl Into<String>, total_key: Option<String>) -> Self {
        Self {
            items_key: items_key.into(),
            token_key: None,
            total_key,
        }
    }
}

/// Walks a `pageToken`/`nextPageToken` chain to completion
#[derive(Debug)]
pub struct CursorPager<'a> {
    gateway: &'a HttpGateway,
    resource: String,
    url: String,
    shape: PageShape,
    page_size: Option<u32>,
    query: Vec<(String, String)>,
}

impl<'a> CursorPager<'a> {
    /// `resource` labels events; `items_key` names the records array.
    pub fn new(
        gateway: &'a HttpGateway,
        resource: impl Into<String>,
        url: impl Into<String>,
        items_key: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            resource: resource.into(),
            url: url.into(),
            shape: PageShape::cursor(items_key),
            page_size: None,
            query: Vec::new(),
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Extra query parameter sent with every page
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Lazy page sequence, starting with no token.
    pub fn pages(&self) -> CursorPages<'_> {
        CursorPages {
            pager: self,
            next_token: None,
            page_index: 0,
            finished: false,
        }
    }

    /// Lazy record sequence across all pages.
    pub fn records(&self) -> CursorRecords<'_> {
        CursorRecords {
            pages: self.pages(),
            buffer: VecDeque::new(),
        }
    }

    /// Every record of every page, in page order.
    pub fn fetch_all(&self) -> Result<Vec<Value>, TapError> {
        let mut all = Vec::new();
        for page in self.pages() {
            all.extend(page?.items);
        }
        Ok(all)
    }

    fn request(&self, token: Option<&str>) -> Request {
        let mut req = Request::get(&self.url);
        req.query.extend(self.query.iter().cloned());
        if let Some(n) = self.page_size {
            req = req.query(PAGE_SIZE_PARAM, n);
        }
        if let Some(t) = token {
            req = req.query(PAGE_TOKEN_PARAM, t);
        }
        req
    }
}

pub struct CursorPages<'p> {
    pager: &'p CursorPager<'p>,
    next_token: Option<String>,
    page_index: u32,
    finished: bool,
}

impl CursorPages<'_> {
    /// Index of the next page to be requested
    pub fn page_index(&self) -> u32 {
        self.page_index
    }
}

impl Iterator for CursorPages<'_> {
    type Item = Result<Page, TapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let pager = self.pager;
        let req = pager.request(self.next_token.as_deref());
        let endpoint = req.endpoint();

        let page = pager
            .gateway
            .send(req)
            .and_then(|resp| Page::decode(&endpoint, &resp.body, &pager.shape));
        let page = match page {
            Ok(p) => p,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        pager.gateway.observer().observe(&Event::PageFetched {
            resource: pager.resource.clone(),
            page_index: self.page_index,
            rows: page.items.len(),
        });

        match &page.cursor_token {
            None => self.finished = true,
            Some(token) if self.next_token.as_ref() == Some(token) => {
                log::warn!(
                    "{}: server repeated page token at page {}, stopping",
                    pager.resource,
                    self.page_index
                );
                self.finished = true;
            }
            Some(token) => self.next_token = Some(token.clone()),
        }
        self.page_index += 1;
        Some(Ok(page))
    }
}

pub struct CursorRecords<'p> {
    pages: CursorPages<'p>,
    buffer: VecDeque<Value>,
}

impl Iterator for CursorRecords<'_> {
    type Item = Result<Value, TapError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            match self.pages.next()? {
                Ok(page) => self.buffer.extend(page.items),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
