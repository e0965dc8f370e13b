//! Typed view over raw study documents.
//!
//! Raw documents are stored as loosely structured JSON. At the mapping
//! boundary they are parsed into [`StudyDocument`], where every field is
//! optional and every list defaults to empty (explicit `null` included).
//! A field of the wrong JSON type makes the whole document malformed.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::MappingError;

/// Treat a missing or `null` value as `T::default()`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudyDocument {
    #[serde(rename = "_aggregator_identifier")]
    pub aggregator_identifier: Option<String>,
    pub study_number: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub identifiers: Vec<SourceIdentifier>,
    #[serde(deserialize_with = "nullable")]
    pub study_titles: Vec<StudyTitle>,
    #[serde(deserialize_with = "nullable")]
    pub abstracts: Vec<StudyAbstract>,
    #[serde(deserialize_with = "nullable")]
    pub classifications: Vec<SubjectTerm>,
    #[serde(deserialize_with = "nullable")]
    pub keywords: Vec<SubjectTerm>,
    #[serde(deserialize_with = "nullable")]
    pub principal_investigators: Vec<PrincipalInvestigator>,
    #[serde(deserialize_with = "nullable")]
    pub distribution_dates: Vec<DistributionDate>,
    #[serde(deserialize_with = "nullable")]
    pub publication_dates: Vec<PublicationDate>,
    #[serde(deserialize_with = "nullable")]
    pub collection_periods: Vec<CollectionPeriod>,
    #[serde(deserialize_with = "nullable")]
    pub data_access: Vec<DataAccess>,
    #[serde(deserialize_with = "nullable")]
    pub distributors: Vec<Distributor>,
    #[serde(deserialize_with = "nullable")]
    pub grant_numbers: Vec<FundingEntry>,
    #[serde(deserialize_with = "nullable")]
    pub funding_agencies: Vec<FundingEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceIdentifier {
    pub identifier: Option<String>,
    pub agency: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudyTitle {
    pub study_title: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudyAbstract {
    #[serde(rename = "abstract")]
    pub text: Option<String>,
    pub language: Option<String>,
}

/// A classification or keyword entry. Both share the same shape:
/// the label lives in `description` for classifications and in
/// `keyword` for keywords.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubjectTerm {
    pub system_name: Option<String>,
    pub uri: Option<String>,
    pub description: Option<String>,
    pub keyword: Option<String>,
    pub language: Option<String>,
}

impl SubjectTerm {
    pub fn label(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or(self.keyword.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrincipalInvestigator {
    pub principal_investigator: Option<String>,
    pub organization: Option<String>,
    pub external_link: Option<String>,
    pub external_link_title: Option<String>,
    pub external_link_role: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DistributionDate {
    pub distribution_date: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublicationDate {
    pub publication_date: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectionPeriod {
    pub collection_period: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataAccess {
    pub data_access: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Distributor {
    pub distributor: Option<String>,
    pub abbreviation: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FundingEntry {
    pub agency: Option<String>,
    pub grant_number: Option<String>,
    pub language: Option<String>,
}

impl StudyDocument {
    /// Parse a raw stored document.
    pub fn from_value(raw: &Value) -> Result<Self, MappingError> {
        Ok(Self::deserialize(raw)?)
    }

    /// The storage key of the record: aggregator identifier, else study number.
    pub fn record_id(&self) -> Option<&str> {
        non_empty(self.aggregator_identifier.as_deref()).or(non_empty(self.study_number.as_deref()))
    }
}

/// `Some` only for strings with visible content, trimmed.
pub(crate) fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_lists_default_to_empty() {
        let doc = StudyDocument::from_value(&json!({
            "study_number": "FSD1234",
            "identifiers": null,
            "abstracts": null
        }))
        .unwrap();
        assert!(doc.identifiers.is_empty());
        assert!(doc.abstracts.is_empty());
        assert_eq!(doc.study_number.as_deref(), Some("FSD1234"));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let err = StudyDocument::from_value(&json!({ "study_titles": "not a list" })).unwrap_err();
        assert!(matches!(err, MappingError::Malformed(_)));
    }

    #[test]
    fn test_record_id_prefers_aggregator_identifier() {
        let doc = StudyDocument::from_value(&json!({
            "_aggregator_identifier": "abc123",
            "study_number": "FSD1234"
        }))
        .unwrap();
        assert_eq!(doc.record_id(), Some("abc123"));

        let doc = StudyDocument::from_value(&json!({
            "_aggregator_identifier": "  ",
            "study_number": "FSD1234"
        }))
        .unwrap();
        assert_eq!(doc.record_id(), Some("FSD1234"));
    }

    #[test]
    fn test_subject_label_falls_back_to_keyword() {
        let term = SubjectTerm {
            keyword: Some(" migration ".to_string()),
            ..Default::default()
        };
        assert_eq!(term.label(), Some("migration"));
    }
}
