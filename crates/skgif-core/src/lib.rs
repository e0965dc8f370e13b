//! # SKG-IF Core
//!
//! Transformation core of the SKG-IF API: turns loosely structured study
//! records and a SKOS thesaurus export into SKG-IF `Product` and `Topic`
//! JSON-LD entities.
//!
//! This crate contains no HTTP server, SQL driver or filesystem access.
//! Storage, the classification cache and the external classifier are
//! reached through the [`store::Store`], [`cache::ClassificationCache`] and
//! [`classify::Classifier`] traits, so the whole pipeline runs against
//! in-memory substitutes in tests.
//!
//! ## Pipeline
//!
//! ```text
//! query params ──▶ filter ──▶ Store::find ──▶ ProductMapper ──▶ envelope
//!                                              │   │    │
//!                               IdentifierResolver │  TopicClassifier
//!                                             TopicIndex  (cache + classifier)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | SKG-IF output entities and thesaurus concepts |
//! | [`document`] | Typed view over raw study documents |
//! | [`resolver`] | Identifier scheme resolution to URIs |
//! | [`topic_index`] | In-memory SKOS concept index |
//! | [`cache`] | Classification cache trait and in-memory backends |
//! | [`classify`] | Classifier trait and cache-aware classification |
//! | [`access`] | Data-access category mappings |
//! | [`mapper`] | Study document → SKG-IF Product |
//! | [`filter`] | SKG-IF filter string parsing |
//! | [`query`] | Filtered, paginated result pages |
//! | [`envelope`] | JSON-LD wrapping and pagination meta |
//! | [`store`] | Document store trait and in-memory store |

pub mod access;
pub mod cache;
pub mod classify;
pub mod document;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod models;
pub mod query;
pub mod resolver;
pub mod store;
pub mod topic_index;
