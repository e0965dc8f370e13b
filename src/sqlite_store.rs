//! SQLite-backed [`Store`] implementation.
//!
//! Study documents are kept as JSON text in the `studies` table. Product
//! filters are translated into `json_each` subqueries so that counting and
//! paging happen inside SQLite rather than in memory.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use skgif_core::filter::{DocumentFilter, FieldPath, MatchMode, Predicate};
use skgif_core::store::{Store, StoredDocument};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace one study document.
    pub async fn upsert(&self, id: &str, study_number: Option<&str>, body: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO studies (id, study_number, body, imported_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                study_number = excluded.study_number,
                body = excluded.body,
                imported_at = excluded.imported_at
            "#,
        )
        .bind(id)
        .bind(study_number)
        .bind(body.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Escape `LIKE` wildcards in a user-supplied value.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// SQL condition for one field path. Field names come from the static
/// filter table and are never user input.
fn field_condition(field: &FieldPath, mode: MatchMode) -> String {
    let comparison = match mode {
        MatchMode::Exact => "LOWER(json_extract(e.value, '$.{field}')) = LOWER(?)",
        MatchMode::Contains => {
            "LOWER(json_extract(e.value, '$.{field}')) LIKE '%' || LOWER(?) || '%' ESCAPE '\\'"
        }
    }
    .replace("{field}", field.field);
    format!(
        "EXISTS (SELECT 1 FROM json_each(\
         CASE WHEN json_valid(studies.body) THEN studies.body ELSE '{{}}' END, '$.{}') AS e \
         WHERE e.type = 'object' AND {})",
        field.list, comparison
    )
}

fn predicate_condition(predicate: &Predicate, binds: &mut Vec<String>) -> String {
    let value = match predicate.mode {
        MatchMode::Exact => predicate.value.clone(),
        MatchMode::Contains => escape_like(&predicate.value),
    };
    let alternatives: Vec<String> = predicate
        .fields
        .iter()
        .map(|field| {
            binds.push(value.clone());
            field_condition(field, predicate.mode)
        })
        .collect();
    format!("({})", alternatives.join(" OR "))
}

/// `WHERE` clause (possibly empty) and its bind values, in order.
fn where_clause(filter: &DocumentFilter) -> (String, Vec<String>) {
    let mut binds = Vec::new();
    if filter.is_empty() {
        return (String::new(), binds);
    }
    let conditions: Vec<String> = filter
        .predicates
        .iter()
        .map(|p| predicate_condition(p, &mut binds))
        .collect();
    (format!(" WHERE {}", conditions.join(" AND ")), binds)
}

/// A body that is not JSON comes back as `null`, which the mapper rejects,
/// so the document is skipped instead of failing the page.
fn parse_body(id: &str, body: &str) -> Value {
    match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Stored study is not valid JSON");
            Value::Null
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn count(&self, filter: &DocumentFilter) -> Result<u64> {
        let (clause, binds) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM studies{}", clause);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        let count = query.fetch_one(&self.pool).await?;

        Ok(count.max(0) as u64)
    }

    async fn find(
        &self,
        filter: &DocumentFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<StoredDocument>> {
        let (clause, binds) = where_clause(filter);
        let sql = format!(
            "SELECT id, body FROM studies{} ORDER BY id ASC LIMIT ? OFFSET ?",
            clause
        );

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        let rows = query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let body: String = row.get("body");
                let body = parse_body(&id, &body);
                StoredDocument { id, body }
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        // An exact id match wins over a study number match.
        let row = sqlx::query(
            r#"
            SELECT id, body FROM studies
            WHERE id = ? OR study_number = ?
            ORDER BY (id = ?) DESC, id ASC
            LIMIT 1
            "#,
        )
        .bind(id)
        .bind(id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let key: String = row.get("id");
                let body: String = row.get("body");
                let body = parse_body(&key, &body);
                Ok(Some(StoredDocument { id: key, body }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate::create_study_schema;
    use serde_json::json;
    use skgif_core::access::DataAccessMappings;
    use skgif_core::cache::NoCache;
    use skgif_core::classify::{DisabledClassifier, TopicClassifier};
    use skgif_core::mapper::ProductMapper;
    use skgif_core::query::{PageRequest, QueryEngine};
    use skgif_core::resolver::IdentifierResolver;
    use skgif_core::topic_index::TopicIndex;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn store_with(docs: &[Value]) -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("studies.sqlite")).await.unwrap();
        create_study_schema(&pool).await.unwrap();
        let store = SqliteStore::new(pool);
        for doc in docs {
            let id = doc["study_number"].as_str().unwrap();
            store.upsert(id, Some(id), doc).await.unwrap();
        }
        (tmp, store)
    }

    fn study(number: &str, title: &str, pi_link: &str) -> Value {
        json!({
            "study_number": number,
            "study_titles": [{ "study_title": title, "language": "en" }],
            "principal_investigators": [
                { "principal_investigator": "Virtanen, Aino", "external_link": pi_link, "external_link_title": "ORCID" }
            ]
        })
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[tokio::test]
    async fn test_count_and_find_with_filter() {
        let (_tmp, store) = store_with(&[
            study("FSD3", "Youth Barometer 2019", "https://orcid.org/0000-0002-1825-0097"),
            study("FSD1", "Finnish Voter Survey", "https://orcid.org/0000-0001-5109-3700"),
            study("FSD2", "Youth Barometer 2020", "https://orcid.org/0000-0001-5109-3700"),
        ])
        .await;

        let all = DocumentFilter::default();
        assert_eq!(store.count(&all).await.unwrap(), 3);
        let ids: Vec<String> = store
            .find(&all, 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["FSD1", "FSD2", "FSD3"]);

        let filter = DocumentFilter::parse(Some("cf.search.title:youth barometer")).unwrap();
        assert_eq!(store.count(&filter).await.unwrap(), 2);
        let page = store.find(&filter, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "FSD3");

        let filter = DocumentFilter::parse(Some(
            "contributions.by.identifiers.id:HTTPS://ORCID.ORG/0000-0001-5109-3700,cf.search.title:barometer",
        ))
        .unwrap();
        let ids: Vec<String> = store
            .find(&filter, 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["FSD2"]);
    }

    #[tokio::test]
    async fn test_like_wildcards_are_literal() {
        let (_tmp, store) = store_with(&[study("FSD1", "Survey", "x")]).await;
        let filter = DocumentFilter::parse(Some("cf.search.title:%")).unwrap();
        assert_eq!(store.count(&filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_get_by_study_number() {
        let (_tmp, store) = store_with(&[]).await;
        store
            .upsert("agg-1", Some("FSD1"), &json!({ "study_number": "FSD1", "v": 1 }))
            .await
            .unwrap();
        store
            .upsert("agg-1", Some("FSD1"), &json!({ "study_number": "FSD1", "v": 2 }))
            .await
            .unwrap();

        assert_eq!(store.count(&DocumentFilter::default()).await.unwrap(), 1);
        let doc = store.get("FSD1").await.unwrap().unwrap();
        assert_eq!(doc.id, "agg-1");
        assert_eq!(doc.body["v"], 2);
        assert!(store.get("FSD9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_body_is_skipped_not_fatal() {
        let (_tmp, store) = store_with(&[study("FSD1", "Youth Barometer", "x")]).await;
        sqlx::query("INSERT INTO studies (id, study_number, body, imported_at) VALUES ('FSD0', 'FSD0', '{oops', 0)")
            .execute(&store.pool)
            .await
            .unwrap();

        let all = DocumentFilter::default();
        let docs = store.find(&all, 0, 10).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "FSD0");
        assert!(docs[0].body.is_null());
        assert!(store.get("FSD0").await.unwrap().unwrap().body.is_null());

        let filter = DocumentFilter::parse(Some("cf.search.title:barometer")).unwrap();
        assert_eq!(store.count(&filter).await.unwrap(), 1);

        let index = Arc::new(TopicIndex::default());
        let topics = TopicClassifier::new(index.clone(), Arc::new(NoCache), Arc::new(DisabledClassifier));
        let mapper = ProductMapper::new(
            IdentifierResolver::new("https://w3id.org/skg-if/sandbox/cessda/"),
            Arc::new(topics),
            Arc::new(DataAccessMappings::default()),
        );
        let engine = QueryEngine::new(Arc::new(store), Arc::new(mapper), index);
        let page = engine
            .query_products(None, PageRequest { page: 1, page_size: 10 })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].local_identifier, "FSD1");
        assert_eq!(page.skipped, vec!["FSD0".to_string()]);
    }
}
