//! Study import.
//!
//! Reads a JSON array or JSON-lines file of raw study documents and upserts
//! each one into the `studies` table under its record id (aggregator
//! identifier, else study number). Re-importing the same file is a no-op
//! apart from `imported_at`.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use skgif_core::document::StudyDocument;

use crate::config::Config;
use crate::db;
use crate::migrate::create_study_schema;
use crate::sqlite_store::SqliteStore;

/// Outcome of one import run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub read: u64,
    pub upserted: u64,
    pub skipped: u64,
}

/// Parse either a JSON array of documents or one document per line.
pub fn parse_documents(content: &str) -> Result<Vec<Value>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let docs: Vec<Value> =
            serde_json::from_str(trimmed).with_context(|| "Failed to parse JSON array of studies")?;
        return Ok(docs);
    }

    let mut docs = Vec::new();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let doc: Value = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse study on line {}", n + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

pub async fn import_documents(store: &SqliteStore, docs: &[Value]) -> Result<ImportStats> {
    let mut stats = ImportStats {
        read: docs.len() as u64,
        ..ImportStats::default()
    };

    for (n, raw) in docs.iter().enumerate() {
        let doc = match StudyDocument::from_value(raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(position = n, error = %e, "Skipping malformed study");
                stats.skipped += 1;
                continue;
            }
        };
        let Some(id) = doc.record_id() else {
            tracing::warn!(position = n, "Skipping study without identifier");
            stats.skipped += 1;
            continue;
        };
        let study_number = doc.study_number.as_deref().map(str::trim);
        store.upsert(id, study_number, raw).await?;
        stats.upserted += 1;
    }

    Ok(stats)
}

pub async fn run_import(config: &Config, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read studies file: {}", file.display()))?;
    let docs = parse_documents(&content)?;

    let pool = db::connect(&config.db.path).await?;
    create_study_schema(&pool).await?;
    let store = SqliteStore::new(pool);

    let stats = import_documents(&store, &docs).await?;
    tracing::info!(
        read = stats.read,
        upserted = stats.upserted,
        skipped = stats.skipped,
        "Import finished"
    );

    println!("import {}", file.display());
    println!("  read: {} studies", stats.read);
    println!("  upserted studies: {}", stats.upserted);
    println!("  skipped: {}", stats.skipped);
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skgif_core::filter::DocumentFilter;
    use skgif_core::store::Store;
    use tempfile::TempDir;

    #[test]
    fn test_parse_array_and_lines() {
        let array = r#"  [{"study_number": "A"}, {"study_number": "B"}]"#;
        assert_eq!(parse_documents(array).unwrap().len(), 2);

        let lines = "{\"study_number\": \"A\"}\n\n{\"study_number\": \"B\"}\n";
        assert_eq!(parse_documents(lines).unwrap().len(), 2);

        let err = parse_documents("{\"study_number\": \"A\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_import_skips_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("studies.sqlite")).await.unwrap();
        create_study_schema(&pool).await.unwrap();
        let store = SqliteStore::new(pool);

        let docs = vec![
            json!({ "_aggregator_identifier": "agg-1", "study_number": "FSD1" }),
            json!({ "study_number": "FSD2" }),
            json!({ "study_titles": [{ "study_title": "No id" }] }),
            json!({ "study_number": "FSD3", "study_titles": "not a list" }),
        ];

        let stats = import_documents(&store, &docs).await.unwrap();
        assert_eq!(
            stats,
            ImportStats {
                read: 4,
                upserted: 2,
                skipped: 2
            }
        );

        import_documents(&store, &docs).await.unwrap();
        assert_eq!(store.count(&DocumentFilter::default()).await.unwrap(), 2);
        assert_eq!(store.get("FSD1").await.unwrap().unwrap().id, "agg-1");
    }
}
