//! Data-access category mappings.
//!
//! Each archive (keyed by distributor abbreviation) publishes the access
//! condition texts it uses, grouped by the metadata section they come from,
//! together with a harmonised access category. A study's access rights
//! status is the category of the first entry whose text equals the study's
//! access description.

use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;

/// Status used when no mapping matches.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Sections searched, in order.
const SECTIONS: &[&str] = &["dataRestrctnXPath", "dataAccessAltXPath"];

#[derive(Debug, Clone, Deserialize)]
pub struct AccessMapping {
    pub content: String,
    #[serde(rename = "accessCategory")]
    pub access_category: String,
}

/// Distributor abbreviation → section name → mapping entries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DataAccessMappings {
    archives: HashMap<String, HashMap<String, Vec<AccessMapping>>>,
}

impl DataAccessMappings {
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }

    /// Lowercased access category for a description, [`UNCATEGORIZED`] when unmapped.
    pub fn category(&self, distributor: Option<&str>, description: &str) -> String {
        let Some(sections) = distributor.and_then(|abbr| self.archives.get(abbr)) else {
            return UNCATEGORIZED.to_string();
        };
        SECTIONS
            .iter()
            .filter_map(|section| sections.get(*section))
            .flatten()
            .find(|entry| entry.content == description)
            .map(|entry| entry.access_category.to_lowercase())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }
}
