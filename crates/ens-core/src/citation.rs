//! Authorship records attached to metric kinds and filters.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Category of the module a citation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitedModuleType {
    /// An ensemble metric kind.
    EnsembleMetric,
    /// A filter consuming ensemble metrics.
    Filter,
}

/// Unpublished module attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Module name.
    pub module: String,
    /// Module category.
    pub module_type: CitedModuleType,
    /// Author names.
    pub authors: String,
    /// Author affiliation.
    pub affiliation: String,
    /// Contact address.
    pub email: String,
    /// Free-form description of the contribution.
    pub note: String,
}

/// Ordered, de-duplicated collection of citations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationList {
    entries: Vec<Citation>,
}

impl CitationList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a citation unless an identical one is already present.
    pub fn add(&mut self, citation: Citation) {
        if !self.entries.contains(&citation) {
            self.entries.push(citation);
        }
    }

    /// Appends every citation from another list.
    pub fn extend(&mut self, other: CitationList) {
        for citation in other.entries {
            self.add(citation);
        }
    }

    /// Returns true when no citations were recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded citations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over the recorded citations.
    pub fn iter(&self) -> impl Iterator<Item = &Citation> {
        self.entries.iter()
    }

    /// Renders the author information as indented plain text.
    pub fn to_human_readable(&self) -> String {
        let mut out = String::new();
        for citation in &self.entries {
            let _ = writeln!(out, "{} ({:?}):", citation.module, citation.module_type);
            let _ = writeln!(out, "\t{}", citation.authors);
            for field in [&citation.affiliation, &citation.email] {
                if !field.is_empty() {
                    let _ = writeln!(out, "\t{field}");
                }
            }
            let _ = writeln!(out, "\t{}", citation.note);
        }
        out
    }
}
