//! Variation Index: normalized variant to canonical key.

use std::collections::HashMap;

use tracing::debug;

use super::entry::AliasEntry;

/// Derived lookup map over every term of every entry.
///
/// Primary keys are indexed first so an entry is always reachable by its own
/// key. Variants follow in registration order; when two entries claim the same
/// variant, the first-registered mapping wins and the later claim is counted
/// as shadowed.
#[derive(Debug, Clone, Default)]
pub struct VariationIndex {
    map: HashMap<String, String>,
    shadowed: usize,
}

impl VariationIndex {
    /// Builds the index over entries in registration order.
    pub fn rebuild<'a>(entries: impl IntoIterator<Item = &'a AliasEntry> + Clone) -> Self {
        let mut index = Self::default();
        for entry in entries.clone() {
            index.map.insert(entry.key(), entry.key());
        }
        for entry in entries {
            index.insert_variants(entry);
        }
        index
    }

    /// Indexes a newly appended entry.
    ///
    /// Equivalent to a full rebuild when `entry` is the last-registered entry.
    pub fn append(&mut self, entry: &AliasEntry) {
        let key = entry.key();
        if let Some(previous) = self.map.insert(key.clone(), key.clone()) {
            if previous != key {
                self.shadowed += 1;
                debug!(%key, dropped = %previous, "primary key shadows variant");
            }
        }
        self.insert_variants(entry);
    }

    fn insert_variants(&mut self, entry: &AliasEntry) {
        let key = entry.key();
        for term in entry.terms().skip(1) {
            let variant = term.key();
            if variant.is_empty() {
                continue;
            }
            match self.map.get(&variant) {
                None => {
                    self.map.insert(variant, key.clone());
                }
                Some(existing) if *existing != key => {
                    self.shadowed += 1;
                    debug!(%variant, kept = %existing, dropped = %key, "shadowed variant");
                }
                Some(_) => {}
            }
        }
    }

    /// Canonical key for a normalized variant.
    #[must_use]
    pub fn get(&self, variant: &str) -> Option<&str> {
        self.map.get(variant).map(String::as_str)
    }

    /// Number of indexed variants (including primary keys).
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Variant claims dropped because another entry registered them first.
    #[must_use]
    pub const fn shadowed(&self) -> usize {
        self.shadowed
    }
}
