//! HTTP classifier backed by a Skosmos REST endpoint.
//!
//! Sends the label text of a study subject term to
//! `GET {url}/search?vocab={vocab}&query={text}&lang={lang}` and takes the
//! concept URIs of the hits, best first, as topic codes. Timeouts are
//! enforced both by the HTTP client and by the caller.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use skgif_core::classify::{ClassificationInput, Classifier, DisabledClassifier};

use crate::config::ClassificationConfig;

pub struct SkosmosClassifier {
    client: reqwest::Client,
    url: String,
    vocab: String,
    max_codes: usize,
    version: String,
}

impl SkosmosClassifier {
    pub fn new(config: &ClassificationConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("classification.url required for skosmos provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            vocab: config.vocab.clone(),
            max_codes: config.max_codes,
            version: format!("skosmos:{}:{}", config.vocab, config.version),
        })
    }
}

#[async_trait]
impl Classifier for SkosmosClassifier {
    fn version(&self) -> &str {
        &self.version
    }

    async fn classify(&self, input: &ClassificationInput) -> Result<Vec<String>> {
        let text = input.normalized_text();
        let language = input.normalized_language();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(format!("{}/search", self.url))
            .query(&[
                ("vocab", self.vocab.as_str()),
                ("query", text.as_str()),
                ("lang", language.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Skosmos search error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_search_response(&json, self.max_codes)
    }
}

/// Extract `results[].uri`, truncated to `max_codes`.
fn parse_search_response(json: &serde_json::Value, max_codes: usize) -> Result<Vec<String>> {
    let results = json
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Skosmos response: missing results array"))?;

    Ok(results
        .iter()
        .filter_map(|hit| hit.get("uri").and_then(|u| u.as_str()))
        .take(max_codes)
        .map(str::to_string)
        .collect())
}

/// Build the classifier selected by `[classification].provider`.
pub fn create_classifier(config: &ClassificationConfig) -> Result<Arc<dyn Classifier>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledClassifier)),
        "skosmos" => Ok(Arc::new(SkosmosClassifier::new(config)?)),
        other => bail!("Unknown classification provider: {}", other),
    }
}
