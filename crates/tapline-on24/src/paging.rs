//! Offset paging: `itemsPerPage` + zero-based `pageOffset`

use tapline_core::{HttpGateway, Page, PageShape, Request, TapError};

pub const ITEMS_PER_PAGE_PARAM: &str = "itemsPerPage";
pub const PAGE_OFFSET_PARAM: &str = "pageOffset";

/// One paged collection endpoint
#[derive(Debug, Clone)]
pub struct OffsetEndpoint {
    url: String,
    shape: PageShape,
    page_size: u32,
    query: Vec<(String, String)>,
}

impl OffsetEndpoint {
    /// `items_key` holds the records, `total_key` the optional total count.
    pub fn new(url: impl Into<String>, items_key: &str, total_key: &str, page_size: u32) -> Self {
        Self {
            url: url.into(),
            shape: PageShape::offset(items_key, Some(total_key.to_string())),
            page_size,
            query: Vec::new(),
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn fetch(&self, gateway: &HttpGateway, page_index: u32) -> Result<Page, TapError> {
        let mut req = Request::get(&self.url);
        req.query.extend(self.query.iter().cloned());
        let req = req
            .query(ITEMS_PER_PAGE_PARAM, self.page_size)
            .query(PAGE_OFFSET_PARAM, page_index);
        let endpoint = req.endpoint();
        let response = gateway.send(req)?;
        Page::decode(&endpoint, &response.body, &self.shape)
    }
}
