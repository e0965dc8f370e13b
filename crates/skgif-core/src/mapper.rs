//! Study document → SKG-IF Product.
//!
//! [`ProductMapper::map_product`] is a deterministic function of the raw
//! document, the topic index and the classification cache contents. Nested
//! entities get stable local identifiers: the resolvable URI of their own
//! identifier when they have one, else `otf___{study}___{kind}-{n}` where
//! `n` is the 1-based position of the entity within the product.
//!
//! Optional outputs with nothing to say are omitted rather than emitted
//! as `null` or empty lists.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::access::DataAccessMappings;
use crate::classify::TopicClassifier;
use crate::document::{non_empty, PrincipalInvestigator, StudyDocument, SubjectTerm};
use crate::error::MappingError;
use crate::models::{
    AccessRights, Biblio, Contribution, EntityKind, Grant, LangMap, Manifestation,
    ManifestationDates, NamedEntity, Product, ProductTopic, ResolvedIdentifier, TopicConcept,
    TopicTerm,
};
use crate::resolver::IdentifierResolver;

pub const PRODUCT_TYPE: &str = "research data";
pub const CONTRIBUTION_ROLE: &str = "author";

const DEFAULT_LANGUAGE: &str = "en";
const AFFILIATION_PID_ROLE: &str = "affiliation-pid";

const VENUE_NAME: &str = "Consortium of European Social Science Data Archives";

/// Known ROR ids of archives, by distributor name.
const ARCHIVE_RORS: &[(&str, &str)] = &[
    ("Finnish Social Science Data Archive", "033003e23"),
    (VENUE_NAME, "02wg9xc72"),
];

/// Display names that differ from the name archives use for themselves.
const ARCHIVE_DISPLAY_NAMES: &[(&str, &str)] = &[(
    "Finnish Social Science Data Archive",
    "Tampere University. Finnish Social Science Data Archive",
)];

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn language_of(lang: Option<&str>) -> &str {
    non_empty(lang).unwrap_or(DEFAULT_LANGUAGE)
}

/// Items grouped by language, groups in order of first appearance.
fn group_by_language<'a, T>(
    items: &'a [T],
    lang: impl Fn(&T) -> Option<&str>,
    missing: &'a str,
) -> Vec<(&'a str, Vec<&'a T>)> {
    let mut groups: Vec<(&str, Vec<&T>)> = Vec::new();
    for item in items {
        let key = non_empty(lang(item)).unwrap_or(missing);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(item),
            None => groups.push((key, vec![item])),
        }
    }
    groups
}

/// The English group if there is one, else the first group seen.
fn preferred_group<'a, T>(groups: Vec<(&'a str, Vec<&'a T>)>) -> Vec<&'a T> {
    let mut first = None;
    for (lang, members) in groups {
        if lang == DEFAULT_LANGUAGE {
            return members;
        }
        first.get_or_insert(members);
    }
    first.unwrap_or_default()
}

/// Mints `otf___` local identifiers scoped to one study.
struct LocalIds<'a> {
    study: &'a str,
}

impl LocalIds<'_> {
    fn mint(&self, kind: &str, n: usize) -> String {
        format!("otf___{}___{}-{}", self.study, kind, n)
    }

    /// The resolvable URI of the first resolvable identifier, else a minted id.
    fn for_entity(&self, identifiers: Option<&[ResolvedIdentifier]>, kind: &str, n: usize) -> String {
        identifiers
            .into_iter()
            .flatten()
            .find(|id| id.is_resolvable())
            .map(|id| id.canonical_uri().to_string())
            .unwrap_or_else(|| self.mint(kind, n))
    }
}

fn entity(
    local_identifier: String,
    name: &str,
    identifiers: Option<Vec<ResolvedIdentifier>>,
    kind: EntityKind,
) -> NamedEntity {
    NamedEntity {
        local_identifier,
        name: name.to_string(),
        identifiers,
        entity_type: kind,
    }
}

/// Maps study documents to Products.
///
/// Shares the topic classifier and access mappings with every other mapper
/// built from the same application state; holds no per-request state.
pub struct ProductMapper {
    resolver: IdentifierResolver,
    topics: Arc<TopicClassifier>,
    access: Arc<DataAccessMappings>,
    topic_scheme: String,
}

impl ProductMapper {
    pub fn new(
        resolver: IdentifierResolver,
        topics: Arc<TopicClassifier>,
        access: Arc<DataAccessMappings>,
    ) -> Self {
        Self {
            resolver,
            topics,
            access,
            topic_scheme: "ELSST".to_string(),
        }
    }

    /// Scheme name attached to topic identifiers.
    pub fn with_topic_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.topic_scheme = scheme.into();
        self
    }

    /// Parse and map one raw stored document.
    pub async fn map_product(&self, raw: &Value) -> Result<Product, MappingError> {
        let doc = StudyDocument::from_value(raw)?;
        self.map_document(&doc).await
    }

    pub async fn map_document(&self, doc: &StudyDocument) -> Result<Product, MappingError> {
        let study = non_empty(doc.study_number.as_deref()).ok_or(MappingError::MissingField("study_number"))?;
        let ids = LocalIds { study };

        let mut titles: LangMap<Vec<String>> = LangMap::new();
        for t in &doc.study_titles {
            if let Some(title) = non_empty(t.study_title.as_deref()) {
                titles
                    .entry(language_of(t.language.as_deref()).to_string())
                    .or_default()
                    .push(title.to_string());
            }
        }

        let mut abstracts: LangMap<Vec<String>> = LangMap::new();
        for a in &doc.abstracts {
            if let Some(text) = non_empty(a.text.as_deref()) {
                abstracts
                    .entry(language_of(a.language.as_deref()).to_string())
                    .or_default()
                    .push(text.to_string());
            }
        }

        let terms: Vec<&SubjectTerm> = doc.classifications.iter().chain(doc.keywords.iter()).collect();
        let topics: Vec<ProductTopic> = self
            .topics
            .topics_for(study, &terms)
            .await
            .iter()
            .map(|concept| self.product_topic(concept))
            .collect();

        let contributions = self.contributions(doc, &ids);
        let funding = self.funding(doc, &ids);

        Ok(Product {
            local_identifier: study.to_string(),
            entity_type: EntityKind::Product,
            product_type: PRODUCT_TYPE.to_string(),
            identifiers: self.identifiers(doc),
            titles,
            abstracts: (!abstracts.is_empty()).then_some(abstracts),
            topics: (!topics.is_empty()).then_some(topics),
            contributions: (!contributions.is_empty()).then_some(contributions),
            manifestations: Some(vec![self.manifestation(doc, &ids)]),
            funding: (!funding.is_empty()).then_some(funding),
        })
    }

    /// English identifiers first, deduplicated by `(agency, identifier)`.
    fn identifiers(&self, doc: &StudyDocument) -> Vec<ResolvedIdentifier> {
        let is_en = |lang: Option<&str>| non_empty(lang) == Some(DEFAULT_LANGUAGE);
        let ordered = doc
            .identifiers
            .iter()
            .filter(|i| is_en(i.language.as_deref()))
            .chain(doc.identifiers.iter().filter(|i| !is_en(i.language.as_deref())));

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for i in ordered {
            let (Some(agency), Some(value)) = (non_empty(i.agency.as_deref()), non_empty(i.identifier.as_deref())) else {
                tracing::debug!(agency = ?i.agency, identifier = ?i.identifier, "Skipping incomplete study identifier");
                continue;
            };
            if seen.insert((agency, value)) {
                out.push(self.resolver.resolve(agency, value));
            }
        }
        out
    }

    fn product_topic(&self, concept: &TopicConcept) -> ProductTopic {
        let mut term: TopicTerm = concept.to_topic_term();
        term.identifiers = Some(vec![self.resolver.external(&self.topic_scheme, &concept.id)]);
        ProductTopic { term }
    }

    fn contributions(&self, doc: &StudyDocument, ids: &LocalIds<'_>) -> Vec<Contribution> {
        let groups = group_by_language(&doc.principal_investigators, |pi| pi.language.as_deref(), "unknown");
        preferred_group(groups)
            .into_iter()
            .enumerate()
            .filter_map(|(i, pi)| self.contribution(pi, i + 1, ids))
            .collect()
    }

    fn contribution(&self, pi: &PrincipalInvestigator, n: usize, ids: &LocalIds<'_>) -> Option<Contribution> {
        let Some(name) = non_empty(pi.principal_investigator.as_deref()) else {
            tracing::debug!(study = %ids.study, position = n, "Skipping principal investigator without a name");
            return None;
        };
        let link_title = pi
            .external_link_title
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .unwrap_or_default();
        let role = pi
            .external_link_role
            .as_deref()
            .map(|r| r.trim().to_lowercase())
            .unwrap_or_default();
        let organization = non_empty(pi.organization.as_deref());

        let kind = if link_title == "ror" && organization.is_none() {
            EntityKind::Organisation
        } else if organization.is_some() || link_title == "orcid" {
            EntityKind::Person
        } else {
            EntityKind::Agent
        };

        let mut own_ids = None;
        let mut affiliation_ids = None;
        if let Some(link) = non_empty(pi.external_link.as_deref()) {
            if IdentifierResolver::is_allowed_scheme(&link_title) {
                let resolved = Some(vec![self.resolver.resolve(&link_title, link)]);
                if role == AFFILIATION_PID_ROLE {
                    affiliation_ids = resolved;
                } else {
                    own_ids = resolved;
                }
            }
        }

        let kind_name = match kind {
            EntityKind::Person => "person",
            EntityKind::Organisation => "organisation",
            _ => "agent",
        };
        let by = entity(ids.for_entity(own_ids.as_deref(), kind_name, n), name, own_ids, kind);

        let declared_affiliations = match (kind, organization) {
            (EntityKind::Person, Some(org)) => Some(vec![entity(
                ids.for_entity(affiliation_ids.as_deref(), "affiliation", n),
                org,
                affiliation_ids,
                EntityKind::Organisation,
            )]),
            _ => None,
        };

        Some(Contribution {
            role: CONTRIBUTION_ROLE.to_string(),
            by,
            declared_affiliations,
        })
    }

    fn manifestation(&self, doc: &StudyDocument, ids: &LocalIds<'_>) -> Manifestation {
        let publication = doc
            .distribution_dates
            .iter()
            .find_map(|d| non_empty(d.distribution_date.as_deref()))
            .or_else(|| {
                doc.publication_dates
                    .iter()
                    .find_map(|d| non_empty(d.publication_date.as_deref()))
            })
            .map(|date| vec![date.to_string()]);

        let mut collected: Vec<String> = Vec::new();
        for period in &doc.collection_periods {
            if let Some(date) = non_empty(period.collection_period.as_deref()) {
                if !collected.iter().any(|c| c == date) {
                    collected.push(date.to_string());
                }
            }
        }

        let dates = (publication.is_some() || !collected.is_empty()).then(|| ManifestationDates {
            publication,
            collected: (!collected.is_empty()).then_some(collected),
        });

        Manifestation {
            dates,
            access_rights: self.access_rights(doc),
            biblio: Some(Biblio {
                venue: Some(self.venue()),
                hosting_data_source: self.hosting_data_source(doc, ids),
            }),
        }
    }

    /// English description preferred; omitted when the study has none.
    fn access_rights(&self, doc: &StudyDocument) -> Option<AccessRights> {
        let mut description: Option<&str> = None;
        for entry in &doc.data_access {
            if let Some(text) = non_empty(entry.data_access.as_deref()) {
                if description.is_none() || non_empty(entry.language.as_deref()) == Some(DEFAULT_LANGUAGE) {
                    description = Some(text);
                }
            }
        }
        let description = description?;
        let abbreviation = doc
            .distributors
            .first()
            .and_then(|d| non_empty(d.abbreviation.as_deref()));
        Some(AccessRights {
            status: self.access.category(abbreviation, description),
            description: description.to_string(),
        })
    }

    fn venue(&self) -> NamedEntity {
        let ror = self.archive_ror(VENUE_NAME);
        entity(
            ror.iter().find_map(|id| id.uri.clone()).unwrap_or_default(),
            VENUE_NAME,
            Some(ror),
            EntityKind::Venue,
        )
    }

    fn archive_ror(&self, name: &str) -> Vec<ResolvedIdentifier> {
        lookup(ARCHIVE_RORS, name)
            .map(|ror| self.resolver.resolve("ror", ror))
            .into_iter()
            .collect()
    }

    fn hosting_data_source(&self, doc: &StudyDocument, ids: &LocalIds<'_>) -> Option<NamedEntity> {
        let mut chosen = None;
        for d in &doc.distributors {
            if chosen.is_none() || non_empty(d.language.as_deref()) == Some(DEFAULT_LANGUAGE) {
                chosen = Some(d);
            }
        }
        let name = non_empty(chosen?.distributor.as_deref())?;
        let identifiers = self.archive_ror(name);
        let local_identifier = ids.for_entity(Some(identifiers.as_slice()), "datasource", 1);
        Some(entity(
            local_identifier,
            lookup(ARCHIVE_DISPLAY_NAMES, name).unwrap_or(name),
            (!identifiers.is_empty()).then_some(identifiers),
            EntityKind::Datasource,
        ))
    }

    /// Grants from the English group (else the first language seen),
    /// deduplicated by grant number, or agency name when there is none.
    fn funding(&self, doc: &StudyDocument, ids: &LocalIds<'_>) -> Vec<Grant> {
        let entries: Vec<_> = doc
            .grant_numbers
            .iter()
            .chain(doc.funding_agencies.iter())
            .filter(|e| non_empty(e.agency.as_deref()).is_some() || non_empty(e.grant_number.as_deref()).is_some())
            .cloned()
            .collect();
        let selected = preferred_group(group_by_language(&entries, |e| e.language.as_deref(), ""));

        let mut seen = HashSet::new();
        let mut grants = Vec::new();
        for (i, entry) in selected.into_iter().enumerate() {
            let n = i + 1;
            let agency = non_empty(entry.agency.as_deref());
            let grant_number = non_empty(entry.grant_number.as_deref());
            let Some(key) = grant_number.or(agency) else {
                continue;
            };
            if !seen.insert(key.to_string()) {
                continue;
            }
            grants.push(Grant {
                local_identifier: ids.mint("grant", n),
                entity_type: EntityKind::Grant,
                grant_number: grant_number.map(str::to_string),
                funding_agency: agency.map(|name| entity(ids.mint("funder", n), name, None, EntityKind::Organisation)),
            });
        }
        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::classify::{ClassificationInput, Classifier};
    use crate::topic_index::TopicIndex;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers from a fixed table keyed by lowercased text.
    struct TableClassifier {
        answers: HashMap<String, Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Classifier for TableClassifier {
        fn version(&self) -> &str {
            "table-1"
        }

        async fn classify(&self, input: &ClassificationInput) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .answers
                .get(&input.normalized_text())
                .cloned()
                .unwrap_or_default())
        }
    }

    fn mapper_with(classifier: Arc<TableClassifier>) -> ProductMapper {
        let concept = TopicConcept {
            id: "C1".into(),
            pref_labels: LangMap::from([("en".to_string(), "Migration".to_string())]),
            alt_labels: LangMap::new(),
            broader: vec![],
            narrower: vec![],
        };
        let index = Arc::new(TopicIndex::from_concepts([concept]));
        let topics = TopicClassifier::new(index, Arc::new(MemoryCache::new()), classifier);
        let access = DataAccessMappings::from_json_str(
            r#"{ "FSD": { "dataRestrctnXPath": [ { "content": "Open for all.", "accessCategory": "Open" } ] } }"#,
        )
        .unwrap();
        ProductMapper::new(
            IdentifierResolver::new("https://w3id.org/skg-if/sandbox/cessda/"),
            Arc::new(topics),
            Arc::new(access),
        )
    }

    fn mapper() -> (ProductMapper, Arc<TableClassifier>) {
        let classifier = Arc::new(TableClassifier {
            answers: HashMap::from([
                ("migration".to_string(), vec!["C1".to_string()]),
                ("astrology".to_string(), vec!["C99".to_string()]),
            ]),
            calls: AtomicUsize::new(0),
        });
        (mapper_with(classifier.clone()), classifier)
    }

    fn study() -> Value {
        json!({
            "_aggregator_identifier": "7b0c9d",
            "study_number": "FSD3217",
            "identifiers": [
                { "identifier": "urn:nbn:fi:fsd:T-FSD3217", "agency": "URN", "language": "fi" },
                { "identifier": "10.60686/t-fsd3217", "agency": "DOI", "language": "en" },
                { "identifier": "urn:nbn:fi:fsd:T-FSD3217", "agency": "URN", "language": "en" }
            ],
            "study_titles": [
                { "study_title": "Migration Attitudes 2019", "language": "en" },
                { "study_title": "Maahanmuuttoasenteet 2019", "language": "fi" }
            ],
            "abstracts": [{ "abstract": "Survey on attitudes.", "language": null }],
            "keywords": [{ "keyword": "Migration", "language": "en" }],
            "principal_investigators": [
                {
                    "principal_investigator": "Virtanen, Matti",
                    "organization": "Tampereen yliopisto",
                    "language": "fi"
                },
                {
                    "principal_investigator": "Virtanen, Matti",
                    "organization": "University of Tampere",
                    "external_link": "0000-0002-1825-0097",
                    "external_link_title": "ORCID",
                    "language": "en"
                },
                {
                    "principal_investigator": "Statistics Finland",
                    "external_link": "https://ror.org/03d0g3w42",
                    "external_link_title": "ROR",
                    "language": "en"
                }
            ],
            "distribution_dates": [{ "distribution_date": null }, { "distribution_date": "2020-05-04" }],
            "publication_dates": [{ "publication_date": "2019" }],
            "collection_periods": [
                { "collection_period": "2019-03-01", "language": "fi" },
                { "collection_period": "2019-03-01", "language": "en" },
                { "collection_period": "2019-04-30", "language": "en" }
            ],
            "data_access": [
                { "data_access": "Avoin kaikille.", "language": "fi" },
                { "data_access": "Open for all.", "language": "en" }
            ],
            "distributors": [
                { "distributor": "Yhteiskuntatieteellinen tietoarkisto", "abbreviation": "FSD", "language": "fi" },
                { "distributor": "Finnish Social Science Data Archive", "abbreviation": "FSD", "language": "en" }
            ],
            "grant_numbers": [
                { "agency": "Academy of Finland", "grant_number": "AKA-1", "language": "en" },
                { "agency": "Suomen Akatemia", "grant_number": "AKA-1", "language": "fi" }
            ],
            "funding_agencies": [
                { "agency": "Academy of Finland", "grant_number": "AKA-1", "language": "en" },
                { "agency": "Kone Foundation", "language": "en" }
            ]
        })
    }

    #[tokio::test]
    async fn test_known_code_becomes_topic() {
        let (mapper, _) = mapper();
        let product = mapper.map_product(&study()).await.unwrap();
        let topics = product.topics.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].term.local_identifier, "C1");
        assert_eq!(topics[0].term.labels["en"], "Migration");
        assert_eq!(topics[0].term.entity_type, EntityKind::Topic);
    }

    #[tokio::test]
    async fn test_unknown_code_is_omitted() {
        let (mapper, _) = mapper();
        let mut doc = study();
        doc["keywords"] = json!([{ "keyword": "astrology", "language": "en" }]);
        let product = mapper.map_product(&doc).await.unwrap();
        assert!(product.topics.is_none());
    }

    #[tokio::test]
    async fn test_mapping_is_idempotent() {
        let (mapper, classifier) = mapper();
        let first = mapper.map_product(&study()).await.unwrap();
        let second = mapper.map_product(&study()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_core_fields() {
        let (mapper, _) = mapper();
        let product = mapper.map_product(&study()).await.unwrap();
        assert_eq!(product.local_identifier, "FSD3217");
        assert_eq!(product.product_type, "research data");
        assert_eq!(product.titles["fi"], vec!["Maahanmuuttoasenteet 2019"]);
        assert_eq!(product.abstracts.unwrap()["en"], vec!["Survey on attitudes."]);

        let schemes: Vec<&str> = product.identifiers.iter().map(|i| i.scheme.as_str()).collect();
        assert_eq!(schemes, vec!["doi", "urn"]);
        assert_eq!(
            product.identifiers[0].uri.as_deref(),
            Some("https://doi.org/10.60686/t-fsd3217")
        );
    }

    #[tokio::test]
    async fn test_english_principal_investigators_selected() {
        let (mapper, _) = mapper();
        let product = mapper.map_product(&study()).await.unwrap();
        let contributions = product.contributions.unwrap();
        assert_eq!(contributions.len(), 2);

        let person = &contributions[0];
        assert_eq!(person.role, "author");
        assert_eq!(person.by.entity_type, EntityKind::Person);
        assert_eq!(person.by.local_identifier, "https://orcid.org/0000-0002-1825-0097");
        let affiliations = person.declared_affiliations.as_ref().unwrap();
        assert_eq!(affiliations[0].name, "University of Tampere");
        assert_eq!(affiliations[0].local_identifier, "otf___FSD3217___affiliation-1");

        let org = &contributions[1];
        assert_eq!(org.by.entity_type, EntityKind::Organisation);
        assert_eq!(org.by.local_identifier, "https://ror.org/03d0g3w42");
        assert!(org.declared_affiliations.is_none());
    }

    #[tokio::test]
    async fn test_first_language_group_when_no_english() {
        let (mapper, _) = mapper();
        let mut doc = study();
        doc["principal_investigators"] = json!([
            { "principal_investigator": "Svensson, Anna", "language": "sv" },
            { "principal_investigator": "Virtanen, Matti", "language": "fi" }
        ]);
        let contributions = mapper.map_product(&doc).await.unwrap().contributions.unwrap();
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].by.name, "Svensson, Anna");
        assert_eq!(contributions[0].by.entity_type, EntityKind::Agent);
        assert_eq!(contributions[0].by.local_identifier, "otf___FSD3217___agent-1");
    }

    #[tokio::test]
    async fn test_affiliation_pid_moves_identifier() {
        let (mapper, _) = mapper();
        let mut doc = study();
        doc["principal_investigators"] = json!([{
            "principal_investigator": "Virtanen, Matti",
            "organization": "Tampere University",
            "external_link": "https://ror.org/033003e23",
            "external_link_title": "ROR",
            "external_link_role": "Affiliation-PID"
        }]);
        let contributions = mapper.map_product(&doc).await.unwrap().contributions.unwrap();
        let c = &contributions[0];
        assert_eq!(c.by.entity_type, EntityKind::Person);
        assert!(c.by.identifiers.is_none());
        let aff = &c.declared_affiliations.as_ref().unwrap()[0];
        assert_eq!(aff.local_identifier, "https://ror.org/033003e23");
    }

    #[tokio::test]
    async fn test_disallowed_link_scheme_dropped() {
        let (mapper, _) = mapper();
        let mut doc = study();
        doc["principal_investigators"] = json!([{
            "principal_investigator": "Virtanen, Matti",
            "external_link": "https://example.org/people/42",
            "external_link_title": "Homepage"
        }]);
        let contributions = mapper.map_product(&doc).await.unwrap().contributions.unwrap();
        assert!(contributions[0].by.identifiers.is_none());
    }

    #[tokio::test]
    async fn test_invalid_orcid_serializes_local_uri() {
        let (mapper, _) = mapper();
        let mut doc = study();
        doc["principal_investigators"] = json!([{
            "principal_investigator": "Virtanen, Matti",
            "external_link": "0000-0002-1825-0098",
            "external_link_title": "ORCID"
        }]);
        let product = mapper.map_product(&doc).await.unwrap();
        let json = serde_json::to_value(&product).unwrap();
        let by = &json["contributions"][0]["by"];

        assert_eq!(by["local_identifier"], "otf___FSD3217___person-1");
        let id = &by["identifiers"][0];
        assert_eq!(id["scheme"], "orcid");
        assert!(id.get("uri").is_none());
        assert_eq!(
            id["local_uri"],
            "https://w3id.org/skg-if/sandbox/cessda/identifier/orcid/0000-0002-1825-0098"
        );

        let doi = &json["identifiers"][0];
        assert_eq!(doi["uri"], "https://doi.org/10.60686/t-fsd3217");
        assert!(doi.get("local_uri").is_none());
    }

    #[tokio::test]
    async fn test_manifestation() {
        let (mapper, _) = mapper();
        let product = mapper.map_product(&study()).await.unwrap();
        let m = &product.manifestations.unwrap()[0];

        let dates = m.dates.as_ref().unwrap();
        assert_eq!(dates.publication.as_deref(), Some(&["2020-05-04".to_string()][..]));
        assert_eq!(dates.collected.as_ref().unwrap(), &vec!["2019-03-01", "2019-04-30"]);

        let access = m.access_rights.as_ref().unwrap();
        assert_eq!(access.status, "open");
        assert_eq!(access.description, "Open for all.");

        let biblio = m.biblio.as_ref().unwrap();
        assert_eq!(biblio.venue.as_ref().unwrap().local_identifier, "https://ror.org/02wg9xc72");
        let host = biblio.hosting_data_source.as_ref().unwrap();
        assert_eq!(host.name, "Tampere University. Finnish Social Science Data Archive");
        assert_eq!(host.local_identifier, "https://ror.org/033003e23");
    }

    #[tokio::test]
    async fn test_publication_date_fallback() {
        let (mapper, _) = mapper();
        let mut doc = study();
        doc["distribution_dates"] = json!([]);
        let product = mapper.map_product(&doc).await.unwrap();
        let dates = product.manifestations.unwrap()[0].dates.clone().unwrap();
        assert_eq!(dates.publication, Some(vec!["2019".to_string()]));
    }

    #[tokio::test]
    async fn test_funding_deduplicated() {
        let (mapper, _) = mapper();
        let funding = mapper.map_product(&study()).await.unwrap().funding.unwrap();
        assert_eq!(funding.len(), 2);
        assert_eq!(funding[0].grant_number.as_deref(), Some("AKA-1"));
        assert_eq!(funding[0].funding_agency.as_ref().unwrap().name, "Academy of Finland");
        assert!(funding[1].grant_number.is_none());
        assert_eq!(funding[1].funding_agency.as_ref().unwrap().name, "Kone Foundation");
    }

    #[tokio::test]
    async fn test_missing_study_number_fails() {
        let (mapper, _) = mapper();
        let err = mapper
            .map_product(&json!({ "_aggregator_identifier": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, MappingError::MissingField("study_number")));
    }

    #[tokio::test]
    async fn test_minimal_document_omits_optionals() {
        let (mapper, _) = mapper();
        let product = mapper.map_product(&json!({ "study_number": "FSD1" })).await.unwrap();
        let out = serde_json::to_value(&product).unwrap();
        assert!(out.get("abstracts").is_none());
        assert!(out.get("topics").is_none());
        assert!(out.get("contributions").is_none());
        assert!(out.get("funding").is_none());
        assert!(!out.to_string().contains("null"));
        assert_eq!(out["identifiers"], json!([]));
    }
}
