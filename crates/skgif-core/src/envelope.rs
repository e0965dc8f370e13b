//! JSON-LD wrapping and pagination meta.
//!
//! The arity of a response is decided by the caller through [`Envelope`],
//! never by inspecting the data:
//!
//! ```text
//! Entity  →  { "@context": [...], "local_identifier": ..., ... }
//! Page    →  { "@context": [...], "meta": {...}, "@graph": [ ... ] }
//! ```

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::EnvelopeError;
use crate::query::PageRequest;

pub const SKG_IF_CONTEXT: &str = "https://w3id.org/skg-if/context/1.0.1/skg-if.json";
pub const SANDBOX_BASE: &str = "https://w3id.org/skg-if/sandbox/cessda/";

pub const SEARCH_RESULT_PAGE: &str = "search_result_page";
pub const SEARCH_RESULT: &str = "search_result";

/// What is being wrapped.
pub enum Envelope<'a, T> {
    Entity(&'a T),
    Page { items: &'a [T], meta: &'a PageMeta },
}

/// The `@context` attached to every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonLdContext {
    context: String,
    base: String,
}

impl Default for JsonLdContext {
    fn default() -> Self {
        Self::new(SKG_IF_CONTEXT, SANDBOX_BASE)
    }
}

impl JsonLdContext {
    pub fn new(context: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            base: base.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn to_value(&self) -> Value {
        json!([self.context, { "@base": self.base }])
    }

    pub fn wrap<T: Serialize>(&self, envelope: Envelope<'_, T>) -> Result<Value, EnvelopeError> {
        match envelope {
            Envelope::Entity(entity) => self.wrap_entity(entity),
            Envelope::Page { items, meta } => self.wrap_page(items, meta),
        }
    }

    /// A single node with the context merged in at the top level.
    pub fn wrap_entity<T: Serialize>(&self, entity: &T) -> Result<Value, EnvelopeError> {
        let Value::Object(node) = serde_json::to_value(entity)? else {
            return Err(EnvelopeError::NotANode);
        };
        let mut out = Map::with_capacity(node.len() + 1);
        out.insert("@context".to_string(), self.to_value());
        out.extend(node);
        Ok(Value::Object(out))
    }

    pub fn wrap_page<T: Serialize>(&self, items: &[T], meta: &PageMeta) -> Result<Value, EnvelopeError> {
        Ok(json!({
            "@context": self.to_value(),
            "meta": serde_json::to_value(meta)?,
            "@graph": serde_json::to_value(items)?,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub local_identifier: String,
    pub entity_type: &'static str,
}

impl PageLink {
    fn page(local_identifier: String) -> Self {
        Self {
            local_identifier,
            entity_type: SEARCH_RESULT_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartOf {
    pub local_identifier: String,
    pub entity_type: &'static str,
    pub total_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<PageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<PageLink>,
}

/// The `meta` block of a result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub local_identifier: String,
    pub entity_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<PageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<PageLink>,
    pub part_of: PartOf,
}

/// Endpoint URL plus the non-empty query parameters, form-encoded.
/// `page_size` is left out when it equals the endpoint default.
pub fn build_url(
    endpoint: &str,
    default_page_size: u64,
    filter: Option<&str>,
    page: Option<u64>,
    page_size: Option<u64>,
) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        query.append_pair("filter", filter);
        any = true;
    }
    if let Some(page) = page {
        query.append_pair("page", &page.to_string());
        any = true;
    }
    if let Some(size) = page_size.filter(|s| *s != default_page_size) {
        query.append_pair("page_size", &size.to_string());
        any = true;
    }
    if any {
        format!("{}?{}", endpoint, query.finish())
    } else {
        endpoint.to_string()
    }
}

impl PageMeta {
    /// Links for `request` over `total` results at `endpoint`.
    ///
    /// Previous/next links appear only when such a page exists; first/last
    /// links only when there is more than one page.
    pub fn build(
        endpoint: &str,
        filter: Option<&str>,
        request: PageRequest,
        total: u64,
        default_page_size: u64,
    ) -> Self {
        let size = request.page_size.max(1);
        let total_pages = total.div_ceil(size);
        let link = |page: u64| build_url(endpoint, default_page_size, filter, Some(page), Some(size));

        let previous_page = (total_pages > 0 && request.page > 1).then(|| PageLink::page(link(request.page - 1)));
        let next_page = (request.page < total_pages).then(|| PageLink::page(link(request.page + 1)));
        let (first_page, last_page) = if total_pages > 1 {
            (Some(PageLink::page(link(1))), Some(PageLink::page(link(total_pages))))
        } else {
            (None, None)
        };

        Self {
            local_identifier: link(request.page),
            entity_type: SEARCH_RESULT_PAGE,
            previous_page,
            next_page,
            part_of: PartOf {
                local_identifier: build_url(endpoint, default_page_size, filter, None, None),
                entity_type: SEARCH_RESULT,
                total_items: total,
                first_page,
                last_page,
            },
        }
    }
}
