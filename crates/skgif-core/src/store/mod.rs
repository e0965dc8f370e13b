//! Document storage abstraction.
//!
//! The [`Store`] trait is the only view the query engine has of the study
//! collection: count, page through, and fetch raw documents. Documents stay
//! untyped JSON at this layer and are parsed by the mapper.
//!
//! Implementations must be `Send + Sync` to be shared across request tasks.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::filter::DocumentFilter;

/// A raw stored study document together with its storage key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub body: Value,
}

/// Read access to the study collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`count`](Store::count) | Number of documents matching a filter |
/// | [`find`](Store::find) | One page of matching documents, ordered by `id` ascending |
/// | [`get`](Store::get) | A single document by `id` or study number |
///
/// `count` and `find` are separate reads. A concurrent import between them
/// can make `total` disagree with the visible documents by the size of the
/// import.
#[async_trait]
pub trait Store: Send + Sync {
    async fn count(&self, filter: &DocumentFilter) -> Result<u64>;

    async fn find(
        &self,
        filter: &DocumentFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<StoredDocument>>;

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>>;
}
