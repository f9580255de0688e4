//! Alias entries and their registry metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StorageId;
use crate::term::{SourcedTerm, TermCategory};

/// Variant spellings of an entry, bucketed by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alternatives {
    /// Spelling variants of the same name.
    pub homonyms: Vec<SourcedTerm>,
    /// Different names for the same identity.
    pub synonyms: Vec<SourcedTerm>,
    /// Loosely related terms awaiting review.
    pub candidates: Vec<SourcedTerm>,
}

impl Alternatives {
    fn bucket(&self, category: TermCategory) -> &[SourcedTerm] {
        match category {
            TermCategory::Homonym => &self.homonyms,
            TermCategory::Synonym => &self.synonyms,
            TermCategory::Candidate => &self.candidates,
            TermCategory::Primary => &[],
        }
    }

    fn bucket_mut(&mut self, category: TermCategory) -> Option<&mut Vec<SourcedTerm>> {
        match category {
            TermCategory::Homonym => Some(&mut self.homonyms),
            TermCategory::Synonym => Some(&mut self.synonyms),
            TermCategory::Candidate => Some(&mut self.candidates),
            TermCategory::Primary => None,
        }
    }

    /// Number of variants across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.homonyms.len() + self.synonyms.len() + self.candidates.len()
    }

    /// True when no variant is filed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One canonical identity: a primary term plus its known variants.
///
/// The entry's key is the normalized value of its primary term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    /// Canonical term; its key is the entry key.
    pub primary: SourcedTerm,
    /// Known variants.
    #[serde(default)]
    pub alternatives: Alternatives,
}

impl AliasEntry {
    /// Creates an entry with no variants. The term is filed as primary.
    #[must_use]
    pub fn new(primary: SourcedTerm) -> Self {
        Self {
            primary: primary.with_category(TermCategory::Primary),
            alternatives: Alternatives::default(),
        }
    }

    /// Canonical key.
    #[must_use]
    pub fn key(&self) -> String {
        self.primary.key()
    }

    /// Builder-style [`Self::push_variant`].
    #[must_use]
    pub fn with_variant(mut self, term: SourcedTerm, category: TermCategory) -> Self {
        self.push_variant(term, category);
        self
    }

    /// Files `term` under `category`.
    ///
    /// Returns false (and changes nothing) if `category` is `Primary`, the term
    /// is blank, or the entry already holds a term with the same key.
    pub fn push_variant(&mut self, term: SourcedTerm, category: TermCategory) -> bool {
        let key = term.key();
        if key.is_empty() || self.holds(&key) {
            return false;
        }
        match self.alternatives.bucket_mut(category) {
            Some(bucket) => {
                bucket.push(term.with_category(category));
                true
            }
            None => false,
        }
    }

    /// Variants of one category.
    #[must_use]
    pub fn variants(&self, category: TermCategory) -> &[SourcedTerm] {
        self.alternatives.bucket(category)
    }

    /// Primary followed by homonyms, synonyms and candidates.
    pub fn terms(&self) -> impl Iterator<Item = &SourcedTerm> {
        std::iter::once(&self.primary).chain(
            TermCategory::VARIANTS
                .into_iter()
                .flat_map(move |category| self.alternatives.bucket(category).iter()),
        )
    }

    /// Category of the variant with `key`, if this entry holds one.
    #[must_use]
    pub fn variant_category(&self, key: &str) -> Option<TermCategory> {
        TermCategory::VARIANTS
            .into_iter()
            .find(|&category| self.alternatives.bucket(category).iter().any(|t| t.key() == key))
    }

    fn holds(&self, key: &str) -> bool {
        self.terms().any(|t| t.key() == key)
    }

    /// Removes and returns the variant with `key`.
    pub fn take_variant(&mut self, key: &str) -> Option<SourcedTerm> {
        for category in TermCategory::VARIANTS {
            let bucket = self.alternatives.bucket_mut(category)?;
            if let Some(pos) = bucket.iter().position(|t| t.key() == key) {
                return Some(bucket.remove(pos));
            }
        }
        None
    }

    /// Replaces the primary term with a new value, keeping provenance.
    #[must_use]
    pub fn rekeyed(mut self, value: &str) -> Self {
        self.primary = self.primary.derive(value, TermCategory::Primary);
        self
    }
}

/// Bookkeeping the registry keeps per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Backend id of the entry blob.
    pub storage_id: StorageId,
    /// When the entry was first stored.
    pub created_at: DateTime<Utc>,
    /// When the entry was last written.
    pub last_modified_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(value: &str) -> SourcedTerm {
        SourcedTerm::new(value, "tax", "owner_name")
    }

    #[test]
    fn test_push_variant_sets_category_and_rejects_duplicates() {
        let mut entry = AliasEntry::new(term("JOHN SMITH"));
        assert!(entry.push_variant(term("JON SMITH"), TermCategory::Homonym));
        assert!(!entry.push_variant(term("jon  smith"), TermCategory::Synonym));
        assert!(!entry.push_variant(term("John Smith"), TermCategory::Synonym));
        assert!(!entry.push_variant(term("J SMITH"), TermCategory::Primary));
        assert!(!entry.push_variant(term("  "), TermCategory::Candidate));

        assert_eq!(entry.variants(TermCategory::Homonym)[0].category, TermCategory::Homonym);
        assert_eq!(entry.alternatives.len(), 1);
    }

    #[test]
    fn test_terms_in_rebuild_order() {
        let entry = AliasEntry::new(term("JOHN SMITH"))
            .with_variant(term("J SMITH"), TermCategory::Candidate)
            .with_variant(term("JOHNNY SMITH"), TermCategory::Synonym)
            .with_variant(term("JON SMITH"), TermCategory::Homonym);
        let keys: Vec<String> = entry.terms().map(SourcedTerm::key).collect();
        assert_eq!(keys, vec!["john smith", "jon smith", "johnny smith", "j smith"]);
    }

    #[test]
    fn test_take_variant() {
        let mut entry = AliasEntry::new(term("JOHN SMITH")).with_variant(term("JON SMITH"), TermCategory::Synonym);
        assert_eq!(entry.variant_category("jon smith"), Some(TermCategory::Synonym));
        let taken = entry.take_variant("jon smith").unwrap();
        assert_eq!(taken.value, "JON SMITH");
        assert!(entry.alternatives.is_empty());
        assert!(entry.take_variant("jon smith").is_none());
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = AliasEntry::new(term("ACME")).with_variant(term("ACME INC"), TermCategory::Synonym);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["primary"]["value"], "ACME");
        assert_eq!(json["alternatives"]["synonyms"][0]["category"], "synonym");
        let back: AliasEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
