//! # SKG-IF API
//!
//! Serves CESSDA study metadata as SKG-IF Products and the ELSST thesaurus
//! as SKG-IF Topics, in JSON-LD.
//!
//! The transformation itself lives in the `skgif-core` crate. This crate
//! supplies the outer layers: configuration, the SQLite study store and
//! classification cache, the Skosmos classifier client, study import, the
//! HTTP server and the `skgif` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │studies.json │──▶│   import    │──▶│ SQLite       │
//! │(array/JSONL)│   │  (upsert)   │   │ studies      │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//! ┌─────────────┐   ┌─────────────┐   ┌──────▼───────┐
//! │ ELSST SKOS  │──▶│ TopicIndex  │──▶│ QueryEngine  │◀── Skosmos + cache
//! │  JSON-LD    │   │ (in memory) │   │ (skgif-core) │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!                 ┌──────────┐         ┌──────────┐
//!                 │   CLI    │         │   HTTP   │
//!                 │ (skgif)  │         │ JSON-LD  │
//!                 └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! skgif init                    # create databases
//! skgif import studies.jsonl    # load study documents
//! skgif get FSD1234             # print one product
//! skgif topics poverty          # search thesaurus labels
//! skgif serve                   # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite study store |
//! | [`sqlite_cache`] | SQLite classification cache |
//! | [`classifier`] | Skosmos classification client |
//! | [`services`] | Startup wiring of the query engine |
//! | [`ingest`] | Study import |
//! | [`get`] | Single product lookup (CLI) |
//! | [`search`] | Topic label search (CLI) |
//! | [`server`] | SKG-IF HTTP server |

pub mod classifier;
pub mod config;
pub mod db;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod server;
pub mod services;
pub mod sqlite_cache;
pub mod sqlite_store;
