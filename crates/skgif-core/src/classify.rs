//! Topic classification of study subject terms.
//!
//! A study's classifications and keywords are turned into topics in two
//! ways. A term whose own URI is a concept of the [`TopicIndex`] resolves
//! directly. Every other term becomes a [`ClassificationInput`] that goes
//! through the cache and, on a miss, the external [`Classifier`]; the
//! returned codes are then looked up in the index and unknown codes dropped.
//!
//! Classifier failures and timeouts never fail a mapping: the input simply
//! contributes no topics and nothing is cached for it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::cache::{ClassificationCache, ClassificationCacheEntry};
use crate::document::{non_empty, SubjectTerm};
use crate::models::TopicConcept;
use crate::topic_index::TopicIndex;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 3600;

/// The text sent to the classifier, with the context that affects its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationInput {
    pub text: String,
    pub language: String,
    /// Vocabulary the term came from in the source record, empty if unknown.
    pub scheme: String,
}

impl ClassificationInput {
    pub fn new(text: impl Into<String>, language: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            scheme: scheme.into(),
        }
    }

    pub fn from_term(term: &SubjectTerm) -> Option<Self> {
        let text = term.label()?;
        Some(Self::new(
            text,
            non_empty(term.language.as_deref()).unwrap_or("en"),
            non_empty(term.system_name.as_deref()).unwrap_or(""),
        ))
    }

    /// Trimmed, lowercased, with whitespace runs collapsed to one space.
    pub fn normalized_text(&self) -> String {
        self.text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// The language tag as sent to the classifier.
    pub fn normalized_language(&self) -> String {
        self.language.trim().to_lowercase()
    }

    /// SHA-256 hex over the normalized input and the classifier version.
    pub fn cache_key(&self, classifier_version: &str) -> String {
        let text = self.normalized_text();
        let language = self.normalized_language();
        let mut hasher = Sha256::new();
        for part in [text.as_str(), language.as_str(), self.scheme.trim(), classifier_version] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// External controlled-vocabulary classification service.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Identifies the classifier and vocabulary release; part of every cache key.
    fn version(&self) -> &str;

    /// A disabled classifier is never called and its (empty) answers are not cached.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Concept codes for the input, best first.
    async fn classify(&self, input: &ClassificationInput) -> Result<Vec<String>>;
}

pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    fn version(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn classify(&self, _input: &ClassificationInput) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Cache-aware classification resolved through the topic index.
pub struct TopicClassifier {
    index: Arc<TopicIndex>,
    cache: Arc<dyn ClassificationCache>,
    classifier: Arc<dyn Classifier>,
    timeout: Duration,
    ttl: Duration,
}

impl TopicClassifier {
    pub fn new(
        index: Arc<TopicIndex>,
        cache: Arc<dyn ClassificationCache>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            index,
            cache,
            classifier,
            timeout: DEFAULT_TIMEOUT,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Entries older than `ttl` are refreshed on their next lookup.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Raw concept codes for one input: cache first, classifier on miss.
    ///
    /// A stale entry is refreshed, and kept if the refresh fails.
    pub async fn codes_for(&self, input: &ClassificationInput) -> Vec<String> {
        if !self.classifier.is_enabled() {
            return Vec::new();
        }
        let key = input.cache_key(self.classifier.version());

        let cached = match self.cache.get(&key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Classification cache read failed, treating as miss");
                None
            }
        };
        let stale = match cached {
            Some(entry) if entry.is_fresh(self.ttl, Utc::now()) => return entry.topics,
            other => other,
        };

        match tokio::time::timeout(self.timeout, self.classifier.classify(input)).await {
            Ok(Ok(codes)) => {
                let entry = ClassificationCacheEntry::new(key, codes);
                if let Err(e) = self.cache.put(&entry).await {
                    tracing::warn!(error = %format!("{:#}", e), "Classification cache write failed");
                }
                entry.topics
            }
            Ok(Err(e)) => {
                tracing::warn!(text = %input.text, error = %format!("{:#}", e), "Classifier call failed");
                stale.map(|entry| entry.topics).unwrap_or_default()
            }
            Err(_) => {
                tracing::warn!(
                    text = %input.text,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Classifier call timed out"
                );
                stale.map(|entry| entry.topics).unwrap_or_default()
            }
        }
    }

    /// Topics for a study's subject terms, deduplicated, in term order.
    pub async fn topics_for(&self, study: &str, terms: &[&SubjectTerm]) -> Vec<TopicConcept> {
        let mut seen = HashSet::new();
        let mut topics = Vec::new();

        for term in terms {
            if let Some(concept) = non_empty(term.uri.as_deref()).and_then(|uri| self.index.lookup(uri)) {
                if seen.insert(concept.id.clone()) {
                    topics.push(concept.clone());
                }
                continue;
            }
            let Some(input) = ClassificationInput::from_term(term) else {
                continue;
            };
            for code in self.codes_for(&input).await {
                match self.index.lookup(&code) {
                    Some(concept) => {
                        if seen.insert(concept.id.clone()) {
                            topics.push(concept.clone());
                        }
                    }
                    None => {
                        tracing::warn!(study = %study, code = %code, "Classification code not in topic index, dropped");
                    }
                }
            }
        }
        topics
    }
}
