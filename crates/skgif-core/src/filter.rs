//! SKG-IF filter string parsing.
//!
//! Filters arrive as a single `filter` query parameter of comma-separated
//! `key:value` pairs. Product filters become a [`DocumentFilter`]: a
//! conjunction of [`Predicate`]s over fields of the raw study documents,
//! which storage backends either evaluate directly ([`DocumentFilter::matches`])
//! or translate into their own query language via [`Predicate::fields`].
//!
//! Topic filters are parsed separately into a [`TopicSearch`].

use serde_json::Value;

use crate::error::FilterError;

/// How a predicate value is compared against a document field.
///
/// Both modes are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Contains,
}

/// A string field inside a list of objects in the raw document,
/// e.g. `principal_investigators[].external_link`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath {
    pub list: &'static str,
    pub field: &'static str,
}

const fn path(list: &'static str, field: &'static str) -> FieldPath {
    FieldPath { list, field }
}

const PI_LINK: FieldPath = path("principal_investigators", "external_link");
const PI_LINK_TITLE: FieldPath = path("principal_investigators", "external_link_title");

/// Supported product filter keys, their comparison mode and the document
/// fields they range over. A predicate with several fields matches when
/// any of them does.
const PRODUCT_FILTERS: &[(&str, MatchMode, &[FieldPath])] = &[
    ("identifiers.id", MatchMode::Exact, &[path("identifiers", "identifier")]),
    ("identifiers.scheme", MatchMode::Exact, &[path("identifiers", "agency")]),
    ("contributions.by.identifiers.id", MatchMode::Exact, &[PI_LINK]),
    ("contributions.by.identifiers.scheme", MatchMode::Exact, &[PI_LINK_TITLE]),
    (
        "contributions.by.name",
        MatchMode::Contains,
        &[path("principal_investigators", "principal_investigator")],
    ),
    ("contributions.declared_affiliations.identifiers.id", MatchMode::Exact, &[PI_LINK]),
    (
        "contributions.declared_affiliations.identifiers.scheme",
        MatchMode::Exact,
        &[PI_LINK_TITLE],
    ),
    (
        "contributions.declared_affiliations.name",
        MatchMode::Contains,
        &[path("principal_investigators", "organization")],
    ),
    (
        "funding.grant_number",
        MatchMode::Contains,
        &[path("grant_numbers", "grant_number")],
    ),
    ("cf.search.title", MatchMode::Contains, &[path("study_titles", "study_title")]),
    (
        "cf.search.title_abstract",
        MatchMode::Contains,
        &[path("study_titles", "study_title"), path("abstracts", "abstract")],
    ),
    ("cf.contributions_orcid", MatchMode::Contains, &[PI_LINK]),
    ("cf.contributions_aff_ror", MatchMode::Contains, &[PI_LINK]),
];

/// Valid SKG-IF product filter keys this service does not support.
const NOT_IMPLEMENTED: &[&str] = &[
    "product_type",
    "contributions.by.local_identifier",
    "contributions.by.family_name",
    "contributions.by.given_name",
    "contributions.declared_affiliations.local_identifier",
    "contributions.declared_affiliations.short_name",
    "funding.local_identifier",
    "funding.identifiers.id",
    "funding.identifiers.scheme",
    "cf.contributions_aff_country",
    "cf.cites",
    "cf.cites_by",
    "cf.cites_doi",
    "cf.cites_by_doi",
];

/// Split a filter string into trimmed `(key, value)` pairs.
///
/// Empty segments are ignored. A segment without `:` or with an empty
/// value is malformed. Spaces inside keys are dropped.
fn split_pairs(filter: &str) -> Result<Vec<(String, String)>, FilterError> {
    let mut pairs = Vec::new();
    for segment in filter.split(',') {
        if segment.trim().is_empty() {
            continue;
        }
        let (key, value) = segment
            .split_once(':')
            .ok_or_else(|| FilterError::Malformed(segment.trim().to_string()))?;
        let key: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return Err(FilterError::Malformed(segment.trim().to_string()));
        }
        pairs.push((key, value.to_string()));
    }
    Ok(pairs)
}

/// One conjunct of a product filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub key: &'static str,
    pub mode: MatchMode,
    pub fields: &'static [FieldPath],
    pub value: String,
}

impl Predicate {
    /// Whether any field path of the document satisfies this predicate.
    pub fn matches(&self, doc: &Value) -> bool {
        let needle = self.value.to_lowercase();
        self.fields.iter().any(|field| {
            doc.get(field.list)
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|item| item.get(field.field).and_then(Value::as_str))
                .any(|text| {
                    let text = text.to_lowercase();
                    match self.mode {
                        MatchMode::Exact => text == needle,
                        MatchMode::Contains => text.contains(&needle),
                    }
                })
        })
    }
}

/// A conjunctive filter over raw study documents. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub predicates: Vec<Predicate>,
}

impl DocumentFilter {
    /// Parse the `filter` query parameter for product listings.
    ///
    /// Known-but-unsupported SKG-IF keys are reported before unknown keys,
    /// and each class is reported in full rather than stopping at the first.
    pub fn parse(filter: Option<&str>) -> Result<Self, FilterError> {
        let Some(filter) = filter.filter(|f| !f.trim().is_empty()) else {
            return Ok(Self::default());
        };

        let mut predicates = Vec::new();
        let mut unknown = Vec::new();
        let mut not_implemented = Vec::new();

        for (key, value) in split_pairs(filter)? {
            if NOT_IMPLEMENTED.contains(&key.as_str()) {
                not_implemented.push(key);
                continue;
            }
            match PRODUCT_FILTERS.iter().find(|(name, _, _)| *name == key) {
                Some(&(name, mode, fields)) => predicates.push(Predicate {
                    key: name,
                    mode,
                    fields,
                    value,
                }),
                None => unknown.push(key),
            }
        }

        if !not_implemented.is_empty() {
            return Err(FilterError::NotImplemented(not_implemented));
        }
        if !unknown.is_empty() {
            return Err(FilterError::UnknownKeys(unknown));
        }
        Ok(Self { predicates })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.predicates.iter().all(|p| p.matches(doc))
    }
}

/// Parsed topic filter: a label search in one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSearch {
    pub term: String,
    pub language: String,
}

pub const TOPIC_LABELS_KEY: &str = "cf.search.labels";
pub const TOPIC_LANGUAGE_KEY: &str = "cf.search.language";
const MIN_TERM_CHARS: usize = 3;

impl TopicSearch {
    /// Parse the `filter` parameter of the topic listing.
    ///
    /// `Ok(None)` means no filter: list every topic.
    pub fn parse(filter: Option<&str>) -> Result<Option<Self>, FilterError> {
        let Some(filter) = filter.filter(|f| !f.trim().is_empty()) else {
            return Ok(None);
        };

        let mut term = None;
        let mut language = None;
        let mut unknown = Vec::new();
        for (key, value) in split_pairs(filter)? {
            match key.as_str() {
                TOPIC_LABELS_KEY => term = Some(value),
                TOPIC_LANGUAGE_KEY => language = Some(value),
                _ => unknown.push(key),
            }
        }
        if !unknown.is_empty() {
            return Err(FilterError::UnknownKeys(unknown));
        }

        let Some(term) = term else {
            return Err(FilterError::InvalidValue(format!(
                "A '{}' key with a value of at least {} characters must be provided in the filter.",
                TOPIC_LABELS_KEY, MIN_TERM_CHARS
            )));
        };
        Self::new(&term, language.as_deref().unwrap_or("en")).map(Some)
    }

    /// A validated label search: the term has at least three characters
    /// after trimming and the language is a two-letter lowercase code.
    pub fn new(term: &str, language: &str) -> Result<Self, FilterError> {
        let term = term.trim();
        if term.chars().count() < MIN_TERM_CHARS {
            return Err(FilterError::InvalidValue(format!(
                "Search term must be at least {} characters, got '{}'",
                MIN_TERM_CHARS, term
            )));
        }
        if language.len() != 2 || !language.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(FilterError::InvalidValue(format!(
                "Language must be a 2-letter ISO 639-1 code, got '{}'",
                language
            )));
        }
        Ok(Self {
            term: term.to_string(),
            language: language.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn study() -> Value {
        json!({
            "study_number": "FSD3217",
            "identifiers": [{ "identifier": "10.1234/ABC", "agency": "DOI" }],
            "study_titles": [{ "study_title": "Finnish Migration Survey 2019", "language": "en" }],
            "abstracts": [{ "abstract": "Attitudes towards asylum seekers.", "language": "en" }],
            "principal_investigators": [{
                "principal_investigator": "Virtanen, Matti",
                "organization": "University of Tampere",
                "external_link": "https://orcid.org/0000-0002-1825-0097",
                "external_link_title": "ORCID"
            }],
            "grant_numbers": [{ "agency": "Academy of Finland", "grant_number": "AKA-1234" }]
        })
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = DocumentFilter::parse(None).unwrap();
        assert!(filter.is_empty());
        assert!(filter.matches(&json!({})));
        assert!(DocumentFilter::parse(Some("  ")).unwrap().is_empty());
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let filter = DocumentFilter::parse(Some("identifiers.id:10.1234/abc")).unwrap();
        assert!(filter.matches(&study()));

        let filter = DocumentFilter::parse(Some("identifiers.id:10.1234")).unwrap();
        assert!(!filter.matches(&study()));
    }

    #[test]
    fn test_value_may_contain_colons() {
        let filter = DocumentFilter::parse(Some(
            "contributions.by.identifiers.id:https://orcid.org/0000-0002-1825-0097",
        ))
        .unwrap();
        assert_eq!(filter.predicates[0].value, "https://orcid.org/0000-0002-1825-0097");
        assert!(filter.matches(&study()));
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let filter = DocumentFilter::parse(Some("cf.search.title:migration,funding.grant_number:aka")).unwrap();
        assert_eq!(filter.predicates.len(), 2);
        assert!(filter.matches(&study()));

        let filter = DocumentFilter::parse(Some("cf.search.title:migration,funding.grant_number:xyz")).unwrap();
        assert!(!filter.matches(&study()));
    }

    #[test]
    fn test_title_abstract_searches_both() {
        let filter = DocumentFilter::parse(Some("cf.search.title_abstract:asylum")).unwrap();
        assert!(filter.matches(&study()));
        let filter = DocumentFilter::parse(Some("cf.search.title_abstract:survey")).unwrap();
        assert!(filter.matches(&study()));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = DocumentFilter::parse(Some("cf.search.title:x,foo:1,bar:2")).unwrap_err();
        assert_eq!(err, FilterError::UnknownKeys(vec!["foo".into(), "bar".into()]));
        assert_eq!(err.to_string(), "Invalid filter keys: foo, bar");
    }

    #[test]
    fn test_not_implemented_keys_take_precedence() {
        let err = DocumentFilter::parse(Some("foo:1,product_type:literature")).unwrap_err();
        assert_eq!(err, FilterError::NotImplemented(vec!["product_type".into()]));
    }

    #[test]
    fn test_malformed_pairs() {
        assert!(matches!(
            DocumentFilter::parse(Some("cf.search.title")),
            Err(FilterError::Malformed(_))
        ));
        assert!(matches!(
            DocumentFilter::parse(Some("cf.search.title:  ")),
            Err(FilterError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_or_mistyped_fields_do_not_match() {
        let filter = DocumentFilter::parse(Some("cf.search.title:migration")).unwrap();
        assert!(!filter.matches(&json!({ "study_titles": null })));
        assert!(!filter.matches(&json!({ "study_titles": [{ "study_title": 5 }] })));
    }

    #[test]
    fn test_topic_search_defaults_language() {
        let search = TopicSearch::parse(Some("cf.search.labels:migr")).unwrap().unwrap();
        assert_eq!(search.term, "migr");
        assert_eq!(search.language, "en");

        let search = TopicSearch::parse(Some("cf.search.labels:armut,cf.search.language:de"))
            .unwrap()
            .unwrap();
        assert_eq!(search.language, "de");

        assert_eq!(TopicSearch::parse(None).unwrap(), None);
    }

    #[test]
    fn test_topic_search_validation() {
        assert!(matches!(
            TopicSearch::parse(Some("cf.search.labels:ab")),
            Err(FilterError::InvalidValue(_))
        ));
        assert!(matches!(
            TopicSearch::parse(Some("cf.search.language:en")),
            Err(FilterError::InvalidValue(_))
        ));
        assert!(matches!(
            TopicSearch::parse(Some("cf.search.labels:poverty,cf.search.language:EN")),
            Err(FilterError::InvalidValue(_))
        ));
        assert!(matches!(
            TopicSearch::parse(Some("cf.search.labels:poverty,foo:bar")),
            Err(FilterError::UnknownKeys(_))
        ));
    }

    #[test]
    fn test_topic_search_new() {
        let search = TopicSearch::new("  köyhyys ", "fi").unwrap();
        assert_eq!(search.term, "köyhyys");
        assert_eq!(search.language, "fi");

        let err = TopicSearch::new(" ab ", "en").unwrap_err();
        assert!(err.to_string().contains("at least 3 characters"));
        assert!(TopicSearch::new("poverty", "eng").is_err());
        assert!(TopicSearch::new("poverty", "").is_err());
    }
}
