//! SKG-IF output entities and thesaurus concepts.
//!
//! Products and their nested entities are derived per request and never
//! persisted. Optional fields are `Option`s that are skipped when absent, so
//! the serialized shape never carries `null` or empty placeholders.

use serde::Serialize;
use std::collections::BTreeMap;

/// Values keyed by BCP 47 language tag (`"en"`, `"fi"`, ...).
pub type LangMap<T> = BTreeMap<String, T>;

/// SKG-IF `entity_type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Person,
    Organisation,
    Agent,
    Venue,
    Datasource,
    Grant,
    Topic,
}

/// An identifier after scheme resolution.
///
/// Exactly one of `uri` and `local_uri` is set. `uri` when the scheme has a
/// known resolution rule and the value passed its shape check, `local_uri`
/// (under the configured base, not dereferenceable) otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentifier {
    pub scheme: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_uri: Option<String>,
}

impl ResolvedIdentifier {
    /// The resolvable URI if there is one, else the local URI.
    pub fn canonical_uri(&self) -> &str {
        self.uri
            .as_deref()
            .or(self.local_uri.as_deref())
            .unwrap_or(&self.value)
    }

    pub fn is_resolvable(&self) -> bool {
        self.uri.is_some()
    }
}

/// A named actor or container: person, organisation, agent, venue or data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedEntity {
    pub local_identifier: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<Vec<ResolvedIdentifier>>,
    pub entity_type: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub role: String,
    pub by: NamedEntity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_affiliations: Option<Vec<NamedEntity>>,
}

/// A topic term, used both inside Products and as a standalone Topic node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicTerm {
    pub local_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<Vec<ResolvedIdentifier>>,
    pub entity_type: EntityKind,
    pub labels: LangMap<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTopic {
    pub term: TopicTerm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestationDates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRights {
    pub status: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Biblio {
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub venue: Option<NamedEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosting_data_source: Option<NamedEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifestation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<ManifestationDates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_rights: Option<AccessRights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biblio: Option<Biblio>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grant {
    pub local_identifier: String,
    pub entity_type: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_agency: Option<NamedEntity>,
}

/// The SKG-IF Product derived from one study document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub local_identifier: String,
    pub entity_type: EntityKind,
    pub product_type: String,
    pub identifiers: Vec<ResolvedIdentifier>,
    pub titles: LangMap<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstracts: Option<LangMap<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<ProductTopic>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributions: Option<Vec<Contribution>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifestations: Option<Vec<Manifestation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<Vec<Grant>>,
}

/// One thesaurus concept, immutable once the index is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicConcept {
    /// Concept URI.
    pub id: String,
    pub pref_labels: LangMap<String>,
    pub alt_labels: LangMap<Vec<String>>,
    pub broader: Vec<String>,
    pub narrower: Vec<String>,
}

impl TopicConcept {
    /// The concept as a standalone SKG-IF Topic node.
    pub fn to_topic_term(&self) -> TopicTerm {
        TopicTerm {
            local_identifier: self.id.clone(),
            identifiers: None,
            entity_type: EntityKind::Topic,
            labels: self.pref_labels.clone(),
        }
    }
}
