//! Error kinds of the transformation pipeline.
//!
//! Each enum corresponds to one failure class: startup (thesaurus),
//! per-document mapping, client filter errors, and request-level query
//! failures. Callers branch on the variant, never on message text.

use thiserror::Error;

/// The thesaurus export could not be turned into a [`TopicIndex`](crate::topic_index::TopicIndex).
///
/// Fatal at startup: the service does not serve with a corrupt index.
#[derive(Error, Debug)]
pub enum TopicIndexError {
    #[error("failed to read thesaurus export: {0}")]
    Io(#[from] std::io::Error),

    #[error("thesaurus export is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("thesaurus export has no @graph or node list at the top level")]
    MissingGraph,

    #[error("thesaurus export contains no skos:Concept nodes")]
    NoConcepts,
}

/// A single raw document could not be mapped to a Product.
///
/// Recovered by the query engine: the document is skipped and logged.
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("document is missing mandatory field '{0}'")]
    MissingField(&'static str),

    #[error("document has an unexpected shape: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A client-supplied filter or pagination parameter was rejected.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid filter keys: {}", .0.join(", "))]
    UnknownKeys(Vec<String>),

    #[error("Filter keys not implemented: {}", .0.join(", "))]
    NotImplemented(Vec<String>),

    #[error("Filter parameter is malformed: '{0}'. Expected format: 'key1:value1,key2:value2'")]
    Malformed(String),

    #[error("{0}")]
    InvalidValue(String),
}

/// A request-level failure of the query engine.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("storage unavailable: {0:#}")]
    Unavailable(anyhow::Error),

    #[error("document '{id}' could not be mapped: {source}")]
    Mapping {
        id: String,
        #[source]
        source: MappingError,
    },
}

/// An entity could not be wrapped as a JSON-LD node.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("entity does not serialize to a JSON object")]
    NotANode,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
