use serde::{Deserialize, Serialize};

use crate::links::{found_online, FoundOnline};

pub const NO_DESCRIPTION_PLACEHOLDER: &str = "No description available.";

/// One web source the search-grounded model attached to its answer.
///
/// Both fields are optional on the wire; a citation missing either one is
/// dropped when links are listed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Citation {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl Citation {
    pub fn web(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            title: Some(title.into()),
        }
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn is_valid(&self) -> bool {
        self.uri().is_some() && self.title().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    description: String,
    citations: Vec<Citation>,
}

impl SearchResult {
    /// Absent or blank text falls back to [`NO_DESCRIPTION_PLACEHOLDER`].
    /// Citations are kept exactly as received.
    pub fn new(description: Option<String>, citations: Vec<Citation>) -> Self {
        let description = description
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION_PLACEHOLDER.to_string());
        Self {
            description,
            citations,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn found_online(&self) -> FoundOnline {
        found_online(&self.citations)
    }
}
