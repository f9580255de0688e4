//! Sourced terms: atomic textual values with provenance.
//!
//! Every value that enters the alias registry remembers where it came from:
//! which source, which row, and which field. Knowing the origin of a spelling
//! matters when a reviewer has to decide which variant is canonical.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::similarity::normalize;

/// Identifier of a record source (e.g. `"tax_roll"`, `"voter_file"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Creates a source identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Role a term plays inside an alias entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermCategory {
    /// The canonical spelling.
    Primary,
    /// Near-identical spelling of the same value.
    Homonym,
    /// Different spelling with the same meaning.
    Synonym,
    /// Unverified variant awaiting review.
    Candidate,
}

impl TermCategory {
    /// Variant categories in index-rebuild order.
    pub const VARIANTS: [Self; 3] = [Self::Homonym, Self::Synonym, Self::Candidate];

    /// Returns true for the three variant categories.
    #[must_use]
    pub const fn is_variant(self) -> bool {
        !matches!(self, Self::Primary)
    }
}

impl fmt::Display for TermCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Homonym => write!(f, "homonym"),
            Self::Synonym => write!(f, "synonym"),
            Self::Candidate => write!(f, "candidate"),
        }
    }
}

/// Normalizes a term into its registry key form.
#[must_use]
pub fn normalize_key(value: &str) -> String {
    normalize(value)
}

/// An immutable textual value with provenance.
///
/// # Examples
///
/// ```
/// use reclink::{SourcedTerm, TermCategory};
///
/// let term = SourcedTerm::new("  John  Smith ", "voter_file", "owner_name").with_origin_row(12);
/// assert_eq!(term.key(), "john smith");
/// assert_eq!(term.category, TermCategory::Primary);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcedTerm {
    /// Text as it appeared in the source.
    pub value: String,
    /// Source the term came from.
    pub source: SourceId,
    /// Row in the source, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_row: Option<u64>,
    /// Source field the term was read from.
    pub field: String,
    /// Role of the term within its entry.
    pub category: TermCategory,
}

impl SourcedTerm {
    /// Creates a primary term without a row reference.
    #[must_use]
    pub fn new(value: impl Into<String>, source: impl Into<SourceId>, field: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: source.into(),
            origin_row: None,
            field: field.into(),
            category: TermCategory::Primary,
        }
    }

    /// Returns a copy carrying the given origin row.
    #[must_use]
    pub fn with_origin_row(mut self, row: u64) -> Self {
        self.origin_row = Some(row);
        self
    }

    /// Returns a copy filed under another category. Provenance is preserved.
    #[must_use]
    pub fn with_category(mut self, category: TermCategory) -> Self {
        self.category = category;
        self
    }

    /// Returns a new term with the same provenance and a different value.
    #[must_use]
    pub fn derive(&self, value: impl Into<String>, category: TermCategory) -> Self {
        Self {
            value: value.into(),
            source: self.source.clone(),
            origin_row: self.origin_row,
            field: self.field.clone(),
            category,
        }
    }

    /// Normalized registry key of this term.
    #[must_use]
    pub fn key(&self) -> String {
        normalize_key(&self.value)
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
