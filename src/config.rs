use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use skgif_core::envelope::{SANDBOX_BASE, SKG_IF_CONTEXT};
use skgif_core::query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub thesaurus: ThesaurusConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub jsonld: JsonLdConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/classification-cache.sqlite")
}
fn default_ttl_secs() -> u64 {
    skgif_core::classify::DEFAULT_TTL_SECS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThesaurusConfig {
    pub path: PathBuf,
    #[serde(default = "default_scheme_name")]
    pub scheme_name: String,
}

fn default_scheme_name() -> String {
    "ELSST".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassificationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_vocab")]
    pub vocab: String,
    #[serde(default = "default_classifier_version")]
    pub version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_codes")]
    pub max_codes: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
            vocab: default_vocab(),
            version: default_classifier_version(),
            timeout_secs: default_timeout_secs(),
            max_codes: default_max_codes(),
        }
    }
}

impl ClassificationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_vocab() -> String {
    "elsst-5".to_string()
}
fn default_classifier_version() -> String {
    "1".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_codes() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Public base URL, used to build pagination links.
    pub base_url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl ApiConfig {
    /// Absolute URL of a collection endpoint, e.g. `products`.
    pub fn endpoint(&self, collection: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", base, collection)
        } else {
            format!("{}/{}/{}", base, prefix, collection)
        }
    }
}

fn default_prefix() -> String {
    "api".to_string()
}
fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}
fn default_max_page_size() -> u64 {
    MAX_PAGE_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct JsonLdConfig {
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default = "default_base")]
    pub base: String,
}

impl Default for JsonLdConfig {
    fn default() -> Self {
        Self {
            context: default_context(),
            base: default_base(),
        }
    }
}

fn default_context() -> String {
    SKG_IF_CONTEXT.to_string()
}
fn default_base() -> String {
    SANDBOX_BASE.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MappingConfig {
    #[serde(default)]
    pub data_access_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate pagination
    if config.api.default_page_size == 0 {
        anyhow::bail!("api.default_page_size must be > 0");
    }
    if config.api.max_page_size == 0 {
        anyhow::bail!("api.max_page_size must be > 0");
    }
    if config.api.default_page_size > config.api.max_page_size {
        anyhow::bail!(
            "api.default_page_size ({}) must not exceed api.max_page_size ({})",
            config.api.default_page_size,
            config.api.max_page_size
        );
    }

    // Validate classification
    match config.classification.provider.as_str() {
        "disabled" => {}
        "skosmos" => {
            if config.classification.url.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("classification.url must be specified when provider is 'skosmos'");
            }
            if config.classification.max_codes == 0 {
                anyhow::bail!("classification.max_codes must be > 0");
            }
        }
        other => anyhow::bail!(
            "Unknown classification provider: '{}'. Must be disabled or skosmos.",
            other
        ),
    }

    Ok(config)
}
