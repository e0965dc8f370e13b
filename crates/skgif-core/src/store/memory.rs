//! In-memory [`Store`] implementation for tests.
//!
//! Documents live in a `BTreeMap` keyed by storage id behind a
//! `std::sync::RwLock`, so iteration order is the same `id` ascending order
//! the SQLite store uses.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::filter::DocumentFilter;

use super::{Store, StoredDocument};

pub struct InMemoryStore {
    docs: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace a document under `id`.
    pub fn insert(&self, id: impl Into<String>, body: Value) -> Result<()> {
        let mut docs = self.docs.write().map_err(|_| anyhow!("store lock poisoned"))?;
        docs.insert(id.into(), body);
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn count(&self, filter: &DocumentFilter) -> Result<u64> {
        let docs = self.docs.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(docs.values().filter(|body| filter.matches(body)).count() as u64)
    }

    async fn find(
        &self,
        filter: &DocumentFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<StoredDocument>> {
        let docs = self.docs.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(docs
            .iter()
            .filter(|(_, body)| filter.matches(body))
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(id, body)| StoredDocument {
                id: id.clone(),
                body: body.clone(),
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let docs = self.docs.read().map_err(|_| anyhow!("store lock poisoned"))?;
        if let Some(body) = docs.get(id) {
            return Ok(Some(StoredDocument {
                id: id.to_string(),
                body: body.clone(),
            }));
        }
        Ok(docs
            .iter()
            .find(|(_, body)| body.get("study_number").and_then(Value::as_str) == Some(id))
            .map(|(key, body)| StoredDocument {
                id: key.clone(),
                body: body.clone(),
            }))
    }
}
