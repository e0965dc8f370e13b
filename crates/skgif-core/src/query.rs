//! Filtered, paginated result pages.
//!
//! [`QueryEngine`] is what the HTTP layer talks to. Product queries go to
//! the [`Store`] and through the [`ProductMapper`]; topic queries are
//! answered from the [`TopicIndex`] alone.
//!
//! Pages are 1-based and ordered by the store's sort key (document id for
//! products, concept URI for topics), so consecutive pages over an
//! unchanged corpus are disjoint and preserve that order. `total` comes
//! from a separate count and is a best-effort snapshot under concurrent
//! imports.
//!
//! A document that fails to map is skipped and reported in
//! [`ResultPage::skipped`]; such a page may hold fewer items than `limit`
//! even when more documents match.

use std::sync::Arc;

use crate::error::{FilterError, QueryError};
use crate::filter::{DocumentFilter, TopicSearch};
use crate::mapper::ProductMapper;
use crate::models::{Product, TopicTerm};
use crate::store::Store;
use crate::topic_index::TopicIndex;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    /// Storage ids of matching documents that could not be mapped.
    pub skipped: Vec<String>,
}

impl<T> ResultPage<T> {
    pub fn empty(offset: u64, limit: u64) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            offset,
            limit,
            skipped: Vec::new(),
        }
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// Page-size policy of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Validate `page`/`page_size` query parameters.
    ///
    /// A page below 1 or a page size of 0 is rejected; a page size above
    /// the maximum is clamped to it.
    pub fn request(&self, page: Option<u64>, page_size: Option<u64>) -> Result<PageRequest, FilterError> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(FilterError::InvalidValue("page must be at least 1".to_string()));
        }
        let page_size = match page_size {
            None => self.default_page_size,
            Some(0) => {
                return Err(FilterError::InvalidValue("page_size must be at least 1".to_string()))
            }
            Some(n) => n.min(self.max_page_size),
        };
        Ok(PageRequest { page, page_size })
    }
}

/// Slice an ordered, fully materialised result list.
pub fn paginate<T>(all: Vec<T>, request: PageRequest) -> ResultPage<T> {
    let total = all.len() as u64;
    let offset = request.offset();
    let items = all
        .into_iter()
        .skip(offset.min(usize::MAX as u64) as usize)
        .take(request.page_size as usize)
        .collect();
    ResultPage {
        items,
        total,
        offset,
        limit: request.page_size,
        skipped: Vec::new(),
    }
}

/// Normalise a product id from the request path: a full URL resolves to
/// its last path segment, also when a proxy collapsed its `//`.
pub fn product_key(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("http:/") || raw.starts_with("https:/") {
        if let Ok(url) = url::Url::parse(raw) {
            if let Some(last) = url.path().trim_matches('/').rsplit('/').next().filter(|s| !s.is_empty()) {
                return last.to_string();
            }
        }
    }
    raw.to_string()
}

/// Normalise a topic id from the request path: percent-decoded, and with a
/// `https:/` collapsed by a proxy restored to `https://`.
pub fn topic_key(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    for scheme in ["https:/", "http:/"] {
        if decoded.starts_with(scheme) && !decoded.starts_with(&format!("{}/", scheme)) {
            return decoded.replacen(scheme, &format!("{}/", scheme), 1);
        }
    }
    decoded
}

pub struct QueryEngine {
    store: Arc<dyn Store>,
    mapper: Arc<ProductMapper>,
    index: Arc<TopicIndex>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn Store>, mapper: Arc<ProductMapper>, index: Arc<TopicIndex>) -> Self {
        Self { store, mapper, index }
    }

    /// Products matching the `filter` parameter, one page.
    ///
    /// Storage errors abort the whole page; mapping errors skip the document.
    pub async fn query_products(
        &self,
        filter: Option<&str>,
        request: PageRequest,
    ) -> Result<ResultPage<Product>, QueryError> {
        let filter = DocumentFilter::parse(filter)?;
        let total = self
            .store
            .count(&filter)
            .await
            .map_err(QueryError::Unavailable)?;
        let docs = self
            .store
            .find(&filter, request.offset(), request.page_size)
            .await
            .map_err(QueryError::Unavailable)?;

        let mut page = ResultPage::empty(request.offset(), request.page_size);
        page.total = total;
        for doc in docs {
            match self.mapper.map_product(&doc.body).await {
                Ok(product) => page.items.push(product),
                Err(e) => {
                    tracing::warn!(id = %doc.id, error = %e, "Skipping document that failed to map");
                    page.skipped.push(doc.id);
                }
            }
        }
        tracing::debug!(
            total = page.total,
            returned = page.items.len(),
            skipped = page.skipped.len(),
            offset = page.offset,
            "Product page built"
        );
        Ok(page)
    }

    /// A single product. `Ok(None)` when no document has that id.
    pub async fn find_product(&self, id: &str) -> Result<Option<Product>, QueryError> {
        let key = product_key(id);
        let Some(doc) = self.store.get(&key).await.map_err(QueryError::Unavailable)? else {
            return Ok(None);
        };
        self.mapper
            .map_product(&doc.body)
            .await
            .map(Some)
            .map_err(|source| QueryError::Mapping { id: doc.id, source })
    }

    /// Topics matching the `filter` parameter, or all topics without one.
    pub fn page_topics(&self, filter: Option<&str>, request: PageRequest) -> Result<ResultPage<TopicTerm>, QueryError> {
        let topics: Vec<TopicTerm> = match TopicSearch::parse(filter)? {
            Some(search) => self
                .index
                .search(&search.term, &search.language)
                .into_iter()
                .map(|c| c.to_topic_term())
                .collect(),
            None => self.index.concepts().map(|c| c.to_topic_term()).collect(),
        };
        Ok(paginate(topics, request))
    }

    pub fn find_topic(&self, id: &str) -> Option<TopicTerm> {
        self.index.lookup(&topic_key(id)).map(|c| c.to_topic_term())
    }

    pub fn topic_index(&self) -> &TopicIndex {
        &self.index
    }
}
