//! Startup wiring shared by the server and the CLI.
//!
//! Loads the thesaurus and data-access mappings, opens the study store and
//! the classification cache, and assembles the query engine. A missing or
//! corrupt thesaurus is fatal; an unusable cache database only disables
//! caching.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

use skgif_core::access::DataAccessMappings;
use skgif_core::cache::{ClassificationCache, NoCache};
use skgif_core::classify::TopicClassifier;
use skgif_core::envelope::JsonLdContext;
use skgif_core::mapper::ProductMapper;
use skgif_core::query::{Pagination, QueryEngine};
use skgif_core::resolver::IdentifierResolver;
use skgif_core::topic_index::TopicIndex;

use crate::classifier::create_classifier;
use crate::config::Config;
use crate::db;
use crate::migrate::create_study_schema;
use crate::sqlite_cache::SqliteCache;
use crate::sqlite_store::SqliteStore;

/// Everything a request needs, built once per process.
pub struct Services {
    pub engine: Arc<QueryEngine>,
    pub jsonld: JsonLdContext,
    pub pagination: Pagination,
}

pub fn load_topic_index(config: &Config) -> Result<TopicIndex> {
    let path = &config.thesaurus.path;
    let file = File::open(path)
        .with_context(|| format!("Failed to open thesaurus export: {}", path.display()))?;
    TopicIndex::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to load thesaurus export: {}", path.display()))
}

pub fn load_access_mappings(config: &Config) -> Result<DataAccessMappings> {
    let Some(path) = &config.mapping.data_access_path else {
        return Ok(DataAccessMappings::default());
    };
    let file = File::open(path)
        .with_context(|| format!("Failed to open data access mappings: {}", path.display()))?;
    let mappings = DataAccessMappings::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse data access mappings: {}", path.display()))?;
    tracing::info!(archives = mappings.archive_count(), "Data access mappings loaded");
    Ok(mappings)
}

async fn open_cache(config: &Config) -> Arc<dyn ClassificationCache> {
    match SqliteCache::open(&config.cache.path).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            tracing::warn!(
                path = %config.cache.path.display(),
                error = %format!("{:#}", e),
                "Classification cache unavailable, continuing without cache"
            );
            Arc::new(NoCache)
        }
    }
}

pub async fn build_services(config: &Config) -> Result<Services> {
    let index = Arc::new(load_topic_index(config)?);
    let access = Arc::new(load_access_mappings(config)?);

    let cache = open_cache(config).await;
    let classifier = create_classifier(&config.classification)?;
    let topics = TopicClassifier::new(index.clone(), cache, classifier)
        .with_timeout(Duration::from_secs(config.classification.timeout_secs))
        .with_ttl(Duration::from_secs(config.cache.ttl_secs));

    let mapper = ProductMapper::new(
        IdentifierResolver::new(config.jsonld.base.clone()),
        Arc::new(topics),
        access,
    )
    .with_topic_scheme(config.thesaurus.scheme_name.clone());

    let pool = db::connect(&config.db.path).await?;
    create_study_schema(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));

    Ok(Services {
        engine: Arc::new(QueryEngine::new(store, Arc::new(mapper), index)),
        jsonld: JsonLdContext::new(config.jsonld.context.clone(), config.jsonld.base.clone()),
        pagination: Pagination {
            default_page_size: config.api.default_page_size,
            max_page_size: config.api.max_page_size,
        },
    })
}
