//! Alias registry: canonical terms and their variants.
//!
//! The registry is an explicit context object over a [`RegistryStorage`]
//! backend. Its lifecycle is `open → query* → mutate* → drop`:
//!
//! ```
//! use reclink::registry::{AliasEntry, AliasRegistry};
//! use reclink::storage::InMemoryStorage;
//! use reclink::{SourcedTerm, TermCategory};
//!
//! let registry = AliasRegistry::open(InMemoryStorage::new()).unwrap();
//! let entry = AliasEntry::new(SourcedTerm::new("WILLIAM", "voter", "first_name"))
//!     .with_variant(SourcedTerm::new("BILL", "tax", "first_name"), TermCategory::Synonym);
//! registry.add(entry).unwrap();
//!
//! let hit = registry.lookup_exact("Bill").unwrap().unwrap();
//! assert_eq!(hit.primary.value, "WILLIAM");
//! ```
//!
//! Reads take a shared lock. Mutations take the exclusive lock, persist to
//! storage first and only then update entries and the Variation Index, so a
//! failed mutation leaves the previous state untouched.

mod builder;
mod entry;
mod index;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::{debug, info, warn};

pub use builder::{BuildReport, DuplicateResolver, MergeAsSynonyms, RegistryBuilder, Resolution};
pub use entry::{AliasEntry, Alternatives, EntryMetadata};
pub use index::VariationIndex;

use crate::compare::NameDirectory;
use crate::error::RegistryError;
use crate::similarity::StringSimilarity;
use crate::storage::{RegistryStorage, StorageError, StorageId};
use crate::term::{normalize_key, SourcedTerm, TermCategory};

fn lock_err(context: &'static str) -> RegistryError {
    RegistryError::LockPoisoned { context }
}

fn encode(entry: &AliasEntry) -> Result<Vec<u8>, RegistryError> {
    serde_json::to_vec(entry).map_err(|e| RegistryError::Storage(StorageError::Serialization(e.to_string())))
}

fn decode(id: StorageId, bytes: &[u8]) -> Result<AliasEntry, RegistryError> {
    serde_json::from_slice(bytes).map_err(|e| RegistryError::Corrupt {
        id: id.to_string(),
        message: e.to_string(),
    })
}

fn storage_err(err: StorageError) -> RegistryError {
    match err {
        StorageError::Corrupt { id, message } => RegistryError::Corrupt {
            id: id.to_string(),
            message,
        },
        other => RegistryError::Storage(other),
    }
}

/// Best fuzzy match for a term.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Matched entry.
    pub entry: AliasEntry,
    /// Similarity of the term to the matching primary or variant.
    pub score: f64,
}

#[derive(Debug, Clone)]
struct Slot {
    entry: AliasEntry,
    metadata: EntryMetadata,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Entries in registration order.
    slots: Vec<Slot>,
    by_key: HashMap<String, usize>,
    index: VariationIndex,
}

impl RegistryState {
    fn reindex(&mut self) {
        self.by_key = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.entry.key(), i))
            .collect();
        self.index = VariationIndex::rebuild(self.slots.iter().map(|s| &s.entry));
        debug!(
            entries = self.slots.len(),
            variants = self.index.len(),
            shadowed = self.index.shadowed(),
            "rebuilt variation index"
        );
    }

    fn slot(&self, key: &str) -> Option<&Slot> {
        self.by_key.get(key).map(|&i| &self.slots[i])
    }

    fn resolve(&self, term: &str) -> Option<&Slot> {
        let key = self.index.get(&normalize_key(term))?;
        self.slot(key)
    }
}

/// Canonical-term database backed by a [`RegistryStorage`].
#[derive(Debug)]
pub struct AliasRegistry<S: RegistryStorage> {
    storage: S,
    similarity: StringSimilarity,
    state: RwLock<RegistryState>,
}

impl<S: RegistryStorage> AliasRegistry<S> {
    /// Opens a registry with the default string metric.
    ///
    /// # Errors
    /// See [`Self::open_with`].
    pub fn open(storage: S) -> Result<Self, RegistryError> {
        Self::open_with(storage, StringSimilarity::default())
    }

    /// Loads every stored entry and builds the Variation Index.
    ///
    /// Entries load in creation order (ties by storage id). A stored entry
    /// whose key is already taken by an earlier one is skipped with a warning.
    ///
    /// # Errors
    /// - `Corrupt` if a stored entry cannot be decoded
    /// - `Storage` if the backend fails
    pub fn open_with(storage: S, similarity: StringSimilarity) -> Result<Self, RegistryError> {
        let mut loaded = Vec::new();
        for id in storage.list_entries().map_err(storage_err)? {
            let bytes = storage.read_entry(id).map_err(storage_err)?;
            let entry = decode(id, &bytes)?;
            let meta = storage.entry_metadata(id).map_err(storage_err)?;
            loaded.push(Slot {
                entry,
                metadata: EntryMetadata {
                    storage_id: id,
                    created_at: meta.created_at,
                    last_modified_at: meta.last_modified_at,
                },
            });
        }
        loaded.sort_by(|a, b| {
            a.metadata
                .created_at
                .cmp(&b.metadata.created_at)
                .then_with(|| a.metadata.storage_id.cmp(&b.metadata.storage_id))
        });

        let mut state = RegistryState::default();
        for slot in loaded {
            let key = slot.entry.key();
            if state.by_key.contains_key(&key) {
                warn!(%key, storage_id = %slot.metadata.storage_id, "skipping stored entry with duplicate key");
                continue;
            }
            state.by_key.insert(key, state.slots.len());
            state.slots.push(slot);
        }
        state.reindex();
        info!(entries = state.slots.len(), "opened alias registry");

        Ok(Self {
            storage,
            similarity,
            state: RwLock::new(state),
        })
    }

    /// The backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Entry whose primary or variant normalizes to `term`.
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn lookup_exact(&self, term: &str) -> Result<Option<AliasEntry>, RegistryError> {
        let state = self.state.read().map_err(|_| lock_err("registry.lookup_exact"))?;
        Ok(state.resolve(term).map(|slot| slot.entry.clone()))
    }

    /// Entry whose primary key is `key` (variants are not consulted).
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn get(&self, key: &str) -> Result<Option<AliasEntry>, RegistryError> {
        let state = self.state.read().map_err(|_| lock_err("registry.get"))?;
        Ok(state.slot(&normalize_key(key)).map(|s| s.entry.clone()))
    }

    /// Canonical key for `term`, if indexed.
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn resolve_key(&self, term: &str) -> Result<Option<String>, RegistryError> {
        let state = self.state.read().map_err(|_| lock_err("registry.resolve_key"))?;
        Ok(state.index.get(&normalize_key(term)).map(str::to_string))
    }

    /// Exact lookup, falling back to the most similar entry at or above `threshold`.
    ///
    /// An entry's score is its best score over the primary and all variants.
    /// Ties keep the earlier-registered entry.
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn lookup_fuzzy(&self, term: &str, threshold: f64) -> Result<Option<FuzzyMatch>, RegistryError> {
        let state = self.state.read().map_err(|_| lock_err("registry.lookup_fuzzy"))?;
        if let Some(slot) = state.resolve(term) {
            return Ok(Some(FuzzyMatch {
                entry: slot.entry.clone(),
                score: 1.0,
            }));
        }

        let needle = normalize_key(term);
        let mut best: Option<(usize, f64)> = None;
        for (i, slot) in state.slots.iter().enumerate() {
            let score = slot
                .entry
                .terms()
                .map(|t| self.similarity.similarity_normalized(&needle, &t.key()))
                .fold(0.0_f64, f64::max);
            if score >= threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        Ok(best.map(|(i, score)| FuzzyMatch {
            entry: state.slots[i].entry.clone(),
            score,
        }))
    }

    /// All entries in registration order.
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn entries(&self) -> Result<Vec<AliasEntry>, RegistryError> {
        let state = self.state.read().map_err(|_| lock_err("registry.entries"))?;
        Ok(state.slots.iter().map(|s| s.entry.clone()).collect())
    }

    /// Number of entries.
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn len(&self) -> Result<usize, RegistryError> {
        let state = self.state.read().map_err(|_| lock_err("registry.len"))?;
        Ok(state.slots.len())
    }

    /// Returns true if the registry holds no entries.
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }

    /// Metadata of the entry with primary key `key`.
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn metadata(&self, key: &str) -> Result<Option<EntryMetadata>, RegistryError> {
        let state = self.state.read().map_err(|_| lock_err("registry.metadata"))?;
        Ok(state.slot(&normalize_key(key)).map(|s| s.metadata))
    }

    /// Variant claims currently hidden by an earlier-registered entry.
    ///
    /// # Errors
    /// `LockPoisoned` if a writer panicked.
    pub fn shadowed_variants(&self) -> Result<usize, RegistryError> {
        let state = self.state.read().map_err(|_| lock_err("registry.shadowed_variants"))?;
        Ok(state.index.shadowed())
    }

    /// Adds a new entry.
    ///
    /// # Errors
    /// - `EmptyPrimary` if the primary term is blank
    /// - `DuplicateKey` if an entry with the same primary key exists
    /// - `Storage` if the backend fails; the registry is unchanged
    pub fn add(&self, entry: AliasEntry) -> Result<EntryMetadata, RegistryError> {
        let key = entry.key();
        if key.is_empty() {
            return Err(RegistryError::EmptyPrimary);
        }
        let bytes = encode(&entry)?;

        let mut state = self.state.write().map_err(|_| lock_err("registry.add"))?;
        if state.by_key.contains_key(&key) {
            return Err(RegistryError::DuplicateKey { key });
        }

        let storage_id = self.storage.create_entry(&bytes).map_err(storage_err)?;
        let metadata = self.fresh_metadata(storage_id);

        state.index.append(&entry);
        let position = state.slots.len();
        state.by_key.insert(key.clone(), position);
        state.slots.push(Slot { entry, metadata });
        debug!(%key, %storage_id, "added alias entry");
        Ok(metadata)
    }

    /// Files a new variant under an existing entry.
    ///
    /// Returns false when the entry already holds a term with that key.
    ///
    /// # Errors
    /// - `NotFound` if no entry has primary key `key`
    /// - `InvalidCategory` if `category` is `Primary`
    /// - `Storage` if the backend fails; the registry is unchanged
    pub fn add_variant(&self, key: &str, term: SourcedTerm, category: TermCategory) -> Result<bool, RegistryError> {
        if !category.is_variant() {
            return Err(RegistryError::InvalidCategory { category });
        }
        let key = normalize_key(key);
        let mut state = self.state.write().map_err(|_| lock_err("registry.add_variant"))?;
        let position = *state.by_key.get(&key).ok_or_else(|| RegistryError::NotFound { key: key.clone() })?;

        let mut updated = state.slots[position].entry.clone();
        if !updated.push_variant(term, category) {
            return Ok(false);
        }
        self.commit(&mut state, position, updated)?;
        debug!(%key, %category, "added variant");
        Ok(true)
    }

    /// Overwrites the entry with primary key `key`.
    ///
    /// The replacement may carry a different key as long as it is not another
    /// entry's primary key.
    ///
    /// # Errors
    /// - `NotFound` if `key` is absent
    /// - `AlreadyExists` if the replacement's key belongs to another entry
    /// - `Storage` if the backend fails; the registry is unchanged
    pub fn replace(&self, key: &str, entry: AliasEntry) -> Result<(), RegistryError> {
        let key = normalize_key(key);
        let mut state = self.state.write().map_err(|_| lock_err("registry.replace"))?;
        let position = *state.by_key.get(&key).ok_or_else(|| RegistryError::NotFound { key: key.clone() })?;
        let new_key = entry.key();
        if new_key != key && state.by_key.contains_key(&new_key) {
            return Err(RegistryError::AlreadyExists { key: new_key });
        }
        self.commit(&mut state, position, entry)?;
        debug!(%key, %new_key, "replaced alias entry");
        Ok(())
    }

    /// Removes an entry by relocating its stored record.
    ///
    /// # Errors
    /// - `NotFound` if `key` is absent
    /// - `Storage` if the backend fails; the registry is unchanged
    pub fn remove(&self, key: &str) -> Result<AliasEntry, RegistryError> {
        let key = normalize_key(key);
        let mut state = self.state.write().map_err(|_| lock_err("registry.remove"))?;
        let position = *state.by_key.get(&key).ok_or_else(|| RegistryError::NotFound { key: key.clone() })?;
        let storage_id = state.slots[position].metadata.storage_id;

        self.storage.relocate_entry(storage_id).map_err(storage_err)?;

        let removed = state.slots.remove(position);
        state.reindex();
        info!(%key, %storage_id, "removed alias entry");
        Ok(removed.entry)
    }

    /// Makes `new_value` the primary term of the entry keyed `old_key`.
    ///
    /// The old primary is filed under `demote_to`. If the entry already holds
    /// `new_value` as a variant, that term (with its provenance) is promoted;
    /// otherwise a new term is derived from the old primary's provenance.
    ///
    /// # Errors
    /// - `NotFound` if `old_key` is absent
    /// - `AlreadyExists` if `new_value` is another entry's primary key
    /// - `InvalidCategory` if `demote_to` is `Primary`
    /// - `EmptyPrimary` if `new_value` is blank
    /// - `Storage` if the backend fails; the registry is unchanged
    pub fn reassign_primary(
        &self,
        old_key: &str,
        new_value: &str,
        demote_to: TermCategory,
    ) -> Result<AliasEntry, RegistryError> {
        if !demote_to.is_variant() {
            return Err(RegistryError::InvalidCategory { category: demote_to });
        }
        let old_key = normalize_key(old_key);
        let new_key = normalize_key(new_value);
        if new_key.is_empty() {
            return Err(RegistryError::EmptyPrimary);
        }

        let mut state = self.state.write().map_err(|_| lock_err("registry.reassign_primary"))?;
        let position = *state
            .by_key
            .get(&old_key)
            .ok_or_else(|| RegistryError::NotFound { key: old_key.clone() })?;
        if new_key == old_key {
            return Ok(state.slots[position].entry.clone());
        }
        if state.by_key.contains_key(&new_key) {
            return Err(RegistryError::AlreadyExists { key: new_key });
        }

        let mut updated = state.slots[position].entry.clone();
        let old_primary = updated.primary.clone();
        let promoted = updated
            .take_variant(&new_key)
            .unwrap_or_else(|| old_primary.derive(new_value, TermCategory::Primary));
        updated.primary = promoted.with_category(TermCategory::Primary);
        updated.push_variant(old_primary, demote_to);

        self.commit(&mut state, position, updated.clone())?;
        info!(%old_key, %new_key, demoted_to = %demote_to, "reassigned primary term");
        Ok(updated)
    }

    /// Persists `entry` over the slot at `position`, then applies it.
    fn commit(&self, state: &mut RegistryState, position: usize, entry: AliasEntry) -> Result<(), RegistryError> {
        let bytes = encode(&entry)?;
        let storage_id = state.slots[position].metadata.storage_id;
        self.storage.write_entry(storage_id, &bytes).map_err(storage_err)?;

        let created_at = state.slots[position].metadata.created_at;
        let mut metadata = self.fresh_metadata(storage_id);
        metadata.created_at = created_at;
        state.slots[position] = Slot { entry, metadata };
        state.reindex();
        Ok(())
    }

    fn fresh_metadata(&self, storage_id: StorageId) -> EntryMetadata {
        match self.storage.entry_metadata(storage_id) {
            Ok(meta) => EntryMetadata {
                storage_id,
                created_at: meta.created_at,
                last_modified_at: meta.last_modified_at,
            },
            Err(err) => {
                warn!(%storage_id, error = %err, "entry metadata unavailable, using local clock");
                let now = Utc::now();
                EntryMetadata {
                    storage_id,
                    created_at: now,
                    last_modified_at: now,
                }
            }
        }
    }
}

impl<S: RegistryStorage> NameDirectory for AliasRegistry<S> {
    fn canonical_key(&self, term: &str) -> Option<String> {
        self.resolve_key(term).ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use std::sync::Arc;

    fn term(value: &str) -> SourcedTerm {
        SourcedTerm::new(value, "tax", "owner_name")
    }

    fn registry() -> AliasRegistry<Arc<InMemoryStorage>> {
        AliasRegistry::open(Arc::new(InMemoryStorage::new())).unwrap()
    }

    #[test]
    fn test_add_then_lookup_exact() {
        let reg = registry();
        reg.add(AliasEntry::new(term("John Smith"))).unwrap();
        let hit = reg.lookup_exact("  JOHN   smith").unwrap().unwrap();
        assert_eq!(hit.primary.value, "John Smith");
        assert!(reg.lookup_exact("jane doe").unwrap().is_none());
    }

    #[test]
    fn test_add_duplicate_key_rejected() {
        let reg = registry();
        reg.add(AliasEntry::new(term("ACME"))).unwrap();
        let err = reg.add(AliasEntry::new(term("acme"))).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKey { .. }));
        assert_eq!(reg.len().unwrap(), 1);
    }

    #[test]
    fn test_add_variant_indexes_it() {
        let reg = registry();
        reg.add(AliasEntry::new(term("WILLIAM"))).unwrap();
        assert!(reg.add_variant("william", term("BILL"), TermCategory::Synonym).unwrap());
        assert!(!reg.add_variant("william", term("bill"), TermCategory::Candidate).unwrap());
        assert_eq!(reg.resolve_key("Bill").unwrap().as_deref(), Some("william"));

        let err = reg.add_variant("nobody", term("X"), TermCategory::Synonym).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        let err = reg.add_variant("william", term("WILL"), TermCategory::Primary).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCategory { .. }));
    }

    #[test]
    fn test_remove_relocates() {
        let storage = Arc::new(InMemoryStorage::new());
        let reg = AliasRegistry::open(Arc::clone(&storage)).unwrap();
        reg.add(AliasEntry::new(term("ACME")).with_variant(term("ACME INC"), TermCategory::Synonym))
            .unwrap();
        let removed = reg.remove("acme").unwrap();
        assert_eq!(removed.primary.value, "ACME");
        assert!(reg.lookup_exact("acme inc").unwrap().is_none());
        assert_eq!(storage.relocated_entries().unwrap().len(), 1);
        assert!(matches!(reg.remove("acme"), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn test_reassign_promotes_existing_variant() {
        let reg = registry();
        let bill = SourcedTerm::new("BILL", "voter", "first_name").with_origin_row(42);
        reg.add(AliasEntry::new(term("WILLIAM")).with_variant(bill, TermCategory::Synonym))
            .unwrap();

        let updated = reg.reassign_primary("william", "Bill", TermCategory::Homonym).unwrap();
        assert_eq!(updated.primary.value, "BILL");
        assert_eq!(updated.primary.origin_row, Some(42));
        assert_eq!(updated.primary.category, TermCategory::Primary);
        assert_eq!(updated.variants(TermCategory::Homonym)[0].value, "WILLIAM");
        assert!(updated.variants(TermCategory::Synonym).is_empty());

        assert_eq!(reg.resolve_key("william").unwrap().as_deref(), Some("bill"));
        assert!(reg.metadata("william").unwrap().is_none());
        assert!(reg.metadata("bill").unwrap().is_some());
    }

    #[test]
    fn test_reassign_synthesizes_new_term() {
        let reg = registry();
        reg.add(AliasEntry::new(term("JON SMITH").with_origin_row(3))).unwrap();
        let updated = reg.reassign_primary("jon smith", "JOHN SMITH", TermCategory::Candidate).unwrap();
        assert_eq!(updated.primary.value, "JOHN SMITH");
        assert_eq!(updated.primary.origin_row, Some(3));
        assert_eq!(updated.variants(TermCategory::Candidate)[0].value, "JON SMITH");
    }

    #[test]
    fn test_reassign_errors() {
        let reg = registry();
        reg.add(AliasEntry::new(term("A CORP"))).unwrap();
        reg.add(AliasEntry::new(term("B CORP"))).unwrap();
        assert!(matches!(
            reg.reassign_primary("c corp", "d corp", TermCategory::Synonym),
            Err(RegistryError::NotFound { .. })
        ));
        assert!(matches!(
            reg.reassign_primary("a corp", "B Corp", TermCategory::Synonym),
            Err(RegistryError::AlreadyExists { .. })
        ));
        assert!(matches!(
            reg.reassign_primary("a corp", "Z corp", TermCategory::Primary),
            Err(RegistryError::InvalidCategory { .. })
        ));
        assert!(matches!(
            reg.reassign_primary("a corp", "  ", TermCategory::Synonym),
            Err(RegistryError::EmptyPrimary)
        ));
        assert_eq!(reg.lookup_exact("a corp").unwrap().unwrap().primary.value, "A CORP");
    }

    #[test]
    fn test_lookup_fuzzy() {
        let reg = registry();
        reg.add(AliasEntry::new(term("JOHNSON")).with_variant(term("JONSON"), TermCategory::Homonym))
            .unwrap();
        reg.add(AliasEntry::new(term("PETERSON"))).unwrap();

        let exact = reg.lookup_fuzzy("jonson", 0.9).unwrap().unwrap();
        assert!((exact.score - 1.0).abs() < 1e-12);

        let fuzzy = reg.lookup_fuzzy("JOHNSEN", 0.8).unwrap().unwrap();
        assert_eq!(fuzzy.entry.primary.value, "JOHNSON");
        assert!(fuzzy.score >= 0.8);

        assert!(reg.lookup_fuzzy("ZZZ", 0.8).unwrap().is_none());
    }

    #[test]
    fn test_failed_mutation_keeps_state() {
        let storage = Arc::new(InMemoryStorage::new());
        let reg = AliasRegistry::open(Arc::clone(&storage)).unwrap();
        reg.add(AliasEntry::new(term("WILLIAM"))).unwrap();

        storage.set_offline(true);
        let err = reg.add_variant("william", term("BILL"), TermCategory::Synonym).unwrap_err();
        assert!(matches!(err, RegistryError::Storage(StorageError::Unavailable(_))));
        assert!(reg.add(AliasEntry::new(term("ROBERT"))).is_err());
        assert!(reg.remove("william").is_err());
        storage.set_offline(false);

        assert!(reg.lookup_exact("bill").unwrap().is_none());
        assert!(reg.lookup_exact("william").unwrap().is_some());
        assert_eq!(reg.len().unwrap(), 1);
    }

    #[test]
    fn test_reopen_restores_registration_order() {
        let storage = Arc::new(InMemoryStorage::new());
        {
            let reg = AliasRegistry::open(Arc::clone(&storage)).unwrap();
            reg.add(AliasEntry::new(term("JOHN SMITH")).with_variant(term("J SMITH"), TermCategory::Candidate))
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
            reg.add(AliasEntry::new(term("JANE SMITH")).with_variant(term("J SMITH"), TermCategory::Candidate))
                .unwrap();
        }
        let reg = AliasRegistry::open(storage).unwrap();
        assert_eq!(reg.len().unwrap(), 2);
        assert_eq!(reg.resolve_key("j smith").unwrap().as_deref(), Some("john smith"));
        assert_eq!(reg.shadowed_variants().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_entry_fails_open() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.create_entry(b"not json").unwrap();
        let err = AliasRegistry::open(storage).unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn test_registry_as_name_directory() {
        let reg = registry();
        reg.add(AliasEntry::new(term("WILLIAM")).with_variant(term("BILL"), TermCategory::Synonym))
            .unwrap();
        let directory: &dyn NameDirectory = &reg;
        assert_eq!(directory.canonical_key("bill").as_deref(), Some("william"));
        assert_eq!(directory.canonical_key("bob"), None);
    }
}
