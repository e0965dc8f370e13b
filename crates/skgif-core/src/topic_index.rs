//! In-memory SKOS concept index.
//!
//! Built once from a thesaurus JSON-LD export and never mutated afterwards.
//! The index is an ordinary value: the application constructs it at
//! startup and hands it (behind an `Arc`) to every request, tests build
//! substitutes with [`TopicIndex::from_concepts`].
//!
//! # Accepted input
//!
//! - `{"@graph": [...]}`, a list of such objects, or a bare node list.
//! - Property keys as full SKOS IRIs, `skos:`-prefixed CURIEs, or bare terms.
//! - Label values as `{"@language", "@value"}` objects or lists of them.
//! - Relations as `{"@id"}` objects, plain IRI strings, or lists of either.
//!
//! Optional fields that are missing or malformed are treated as empty.
//! A top level that is not JSON, or that has no node list, is an error.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use crate::error::TopicIndexError;
use crate::models::{LangMap, TopicConcept};

const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";

/// Concept lookup plus a per-language label index for search.
#[derive(Debug, Clone, Default)]
pub struct TopicIndex {
    concepts: BTreeMap<String, TopicConcept>,
    /// language → (lowercased label, concept id)
    labels: BTreeMap<String, Vec<(String, String)>>,
}

/// Property values under any of the accepted spellings of a SKOS term.
fn skos_property<'a>(node: &'a Value, term: &str) -> Option<&'a Value> {
    node.get(format!("{}{}", SKOS, term))
        .or_else(|| node.get(format!("skos:{}", term)))
        .or_else(|| node.get(term))
}

fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

fn language_values(node: &Value, term: &str) -> Vec<(String, String)> {
    as_list(skos_property(node, term))
        .into_iter()
        .filter_map(|label| {
            let lang = label.get("@language")?.as_str()?.trim();
            let value = label.get("@value")?.as_str()?.trim();
            if lang.is_empty() || value.is_empty() {
                None
            } else {
                Some((lang.to_string(), value.to_string()))
            }
        })
        .collect()
}

fn relation_ids(node: &Value, term: &str) -> Vec<String> {
    as_list(skos_property(node, term))
        .into_iter()
        .filter_map(|rel| match rel {
            Value::String(id) => Some(id.clone()),
            other => other.get("@id")?.as_str().map(str::to_string),
        })
        .collect()
}

fn is_concept(node: &Value) -> bool {
    as_list(node.get("@type"))
        .into_iter()
        .filter_map(Value::as_str)
        .any(|t| t == format!("{}Concept", SKOS) || t == "skos:Concept" || t == "Concept")
}

fn parse_concept(node: &Value) -> Option<TopicConcept> {
    if !is_concept(node) {
        return None;
    }
    let id = node.get("@id")?.as_str()?.trim();
    if id.is_empty() {
        return None;
    }

    let mut pref_labels = LangMap::new();
    for (lang, value) in language_values(node, "prefLabel") {
        pref_labels.entry(lang).or_insert(value);
    }

    let mut alt_labels: LangMap<Vec<String>> = LangMap::new();
    for (lang, value) in language_values(node, "altLabel") {
        alt_labels.entry(lang).or_default().push(value);
    }

    Some(TopicConcept {
        id: id.to_string(),
        pref_labels,
        alt_labels,
        broader: relation_ids(node, "broader"),
        narrower: relation_ids(node, "narrower"),
    })
}

fn graph_nodes(data: &Value) -> Result<Vec<&Value>, TopicIndexError> {
    match data {
        Value::Object(obj) => match obj.get("@graph") {
            Some(Value::Array(nodes)) => Ok(nodes.iter().collect()),
            _ => Err(TopicIndexError::MissingGraph),
        },
        Value::Array(items) => {
            let graphs: Vec<&Value> = items
                .iter()
                .filter_map(|item| item.get("@graph").and_then(Value::as_array))
                .flatten()
                .collect();
            if graphs.is_empty() {
                Ok(items.iter().collect())
            } else {
                Ok(graphs)
            }
        }
        _ => Err(TopicIndexError::MissingGraph),
    }
}

impl TopicIndex {
    /// Parse a thesaurus export from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TopicIndexError> {
        let data: Value = serde_json::from_reader(reader)?;
        Self::from_value(&data)
    }

    pub fn from_json_str(json: &str) -> Result<Self, TopicIndexError> {
        let data: Value = serde_json::from_str(json)?;
        Self::from_value(&data)
    }

    /// Build the index from an already-parsed export.
    ///
    /// Fails when there is no node list or when no node is a `skos:Concept`.
    pub fn from_value(data: &Value) -> Result<Self, TopicIndexError> {
        let nodes = graph_nodes(data)?;
        let index = Self::from_concepts(nodes.into_iter().filter_map(parse_concept));
        if index.is_empty() {
            return Err(TopicIndexError::NoConcepts);
        }
        tracing::info!(
            concepts = index.len(),
            languages = index.labels.len(),
            "Topic index built"
        );
        Ok(index)
    }

    /// Build an index from concepts directly. Later duplicates of an id are ignored.
    pub fn from_concepts(concepts: impl IntoIterator<Item = TopicConcept>) -> Self {
        let mut index = TopicIndex::default();
        for concept in concepts {
            if index.concepts.contains_key(&concept.id) {
                continue;
            }
            for (lang, label) in &concept.pref_labels {
                index
                    .labels
                    .entry(lang.clone())
                    .or_default()
                    .push((label.to_lowercase(), concept.id.clone()));
            }
            for (lang, labels) in &concept.alt_labels {
                let entries = index.labels.entry(lang.clone()).or_default();
                for label in labels {
                    entries.push((label.to_lowercase(), concept.id.clone()));
                }
            }
            index.concepts.insert(concept.id.clone(), concept);
        }
        index
    }

    /// Concept by URI. `None` means the id is not in the thesaurus.
    pub fn lookup(&self, id: &str) -> Option<&TopicConcept> {
        self.concepts.get(id)
    }

    /// Concepts whose preferred or alternative label in `lang` contains
    /// `text` (case-insensitive), ordered by concept id.
    pub fn search(&self, text: &str, lang: &str) -> Vec<&TopicConcept> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let ids: BTreeSet<&str> = self
            .labels
            .get(lang)
            .into_iter()
            .flatten()
            .filter(|(label, _)| label.contains(&needle))
            .map(|(_, id)| id.as_str())
            .collect();
        ids.into_iter().filter_map(|id| self.concepts.get(id)).collect()
    }

    /// All concepts, ordered by id.
    pub fn concepts(&self) -> impl Iterator<Item = &TopicConcept> {
        self.concepts.values()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEACHING: &str = "https://elsst.cessda.eu/id/5/000e1113-ffda-4088-8278-020b6dc71e20";
    const EDUCATION: &str = "https://elsst.cessda.eu/id/5/0b7c2a47-0a3e-4d38-9f1e-6b1b7a1f1c11";

    fn export() -> Value {
        json!({
            "@context": {},
            "@graph": [
                {
                    "@id": TEACHING,
                    "@type": ["http://www.w3.org/2004/02/skos/core#Concept"],
                    "http://www.w3.org/2004/02/skos/core#prefLabel": [
                        { "@language": "en", "@value": "TEACHING PROFESSION" },
                        { "@language": "fr", "@value": "Profession d'enseignant" }
                    ],
                    "http://www.w3.org/2004/02/skos/core#altLabel": [
                        { "@language": "en", "@value": "Teachers" }
                    ],
                    "http://www.w3.org/2004/02/skos/core#broader": { "@id": EDUCATION }
                },
                {
                    "@id": EDUCATION,
                    "@type": "skos:Concept",
                    "skos:prefLabel": { "@language": "en", "@value": "EDUCATION" },
                    "skos:narrower": [TEACHING]
                },
                {
                    "@id": "https://elsst.cessda.eu/id/5/scheme",
                    "@type": "http://www.w3.org/2004/02/skos/core#ConceptScheme"
                },
                "not a node"
            ]
        })
    }

    #[test]
    fn test_load_concepts_and_relations() {
        let index = TopicIndex::from_value(&export()).unwrap();
        assert_eq!(index.len(), 2);

        let teaching = index.lookup(TEACHING).unwrap();
        assert_eq!(teaching.pref_labels["en"], "TEACHING PROFESSION");
        assert_eq!(teaching.pref_labels["fr"], "Profession d'enseignant");
        assert_eq!(teaching.alt_labels["en"], vec!["Teachers".to_string()]);
        assert_eq!(teaching.broader, vec![EDUCATION.to_string()]);
        assert!(teaching.narrower.is_empty());

        let education = index.lookup(EDUCATION).unwrap();
        assert!(education.broader.is_empty());
        assert_eq!(education.narrower, vec![TEACHING.to_string()]);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let index = TopicIndex::from_value(&export()).unwrap();
        assert!(index.lookup("https://elsst.cessda.eu/id/5/nonexistent").is_none());
    }

    #[test]
    fn test_search_pref_and_alt_labels() {
        let index = TopicIndex::from_value(&export()).unwrap();

        let hits: Vec<&str> = index.search("teach", "en").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(hits, vec![TEACHING]);

        let hits = index.search("EDUC", "en");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, EDUCATION);

        assert!(index.search("teach", "de").is_empty());
        assert!(index.search("   ", "en").is_empty());
    }

    #[test]
    fn test_list_of_graph_documents() {
        let data = json!([{ "@graph": export()["@graph"].clone() }]);
        let index = TopicIndex::from_value(&data).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_malformed_top_level_is_fatal() {
        assert!(matches!(
            TopicIndex::from_json_str("{ not json"),
            Err(TopicIndexError::Json(_))
        ));
        assert!(matches!(
            TopicIndex::from_value(&json!({ "concepts": [] })),
            Err(TopicIndexError::MissingGraph)
        ));
        assert!(matches!(
            TopicIndex::from_value(&json!("just a string")),
            Err(TopicIndexError::MissingGraph)
        ));
        assert!(matches!(
            TopicIndex::from_value(&json!({ "@graph": [] })),
            Err(TopicIndexError::NoConcepts)
        ));
    }

    #[test]
    fn test_concept_without_labels_is_kept() {
        let data = json!({ "@graph": [{ "@id": "urn:c1", "@type": "Concept" }] });
        let index = TopicIndex::from_value(&data).unwrap();
        let c = index.lookup("urn:c1").unwrap();
        assert!(c.pref_labels.is_empty());
        assert!(c.broader.is_empty());
    }
}
