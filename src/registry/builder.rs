//! Builds alias entries from raw sourced terms and feeds them to a registry.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use super::{AliasEntry, AliasRegistry};
use crate::cluster::{ClusterThresholds, ClusteringEngine};
use crate::error::RegistryError;
use crate::similarity::StringSimilarity;
use crate::storage::RegistryStorage;
use crate::term::{SourcedTerm, TermCategory};

/// Outcome of a duplicate-key resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// False aborts the build with `DuplicateKey`.
    pub resolved: bool,
    /// Add the candidate under this primary value instead.
    pub new_key: Option<String>,
    /// Replace the existing entry with this one.
    pub modified_entry: Option<AliasEntry>,
}

impl Resolution {
    /// Leaves the collision unresolved.
    #[must_use]
    pub fn unresolved() -> Self {
        Self::default()
    }
}

/// Decides what to do when a built entry's key is already registered.
pub trait DuplicateResolver: Send + Sync {
    /// Decides how `candidate` relates to the registered `existing` entry.
    fn resolve(&self, existing: &AliasEntry, candidate: &AliasEntry) -> Resolution;
}

/// Folds every term of the candidate into the existing entry as a synonym.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeAsSynonyms;

impl DuplicateResolver for MergeAsSynonyms {
    fn resolve(&self, existing: &AliasEntry, candidate: &AliasEntry) -> Resolution {
        let mut merged = existing.clone();
        for term in candidate.terms() {
            merged.push_variant(term.clone(), TermCategory::Synonym);
        }
        Resolution {
            resolved: true,
            new_key: None,
            modified_entry: Some(merged),
        }
    }
}

/// Counts from one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Terms accepted after dropping blanks and exact duplicates.
    pub terms: usize,
    /// Entries added to the registry.
    pub added: usize,
    /// Collisions resolved by replacing the existing entry.
    pub merged: usize,
    /// Collisions resolved by adding the candidate under a new key.
    pub rekeyed: usize,
    /// Collisions resolved by dropping the candidate.
    pub dropped: usize,
}

/// A registry write decided before any write is made.
enum Step {
    Add(AliasEntry),
    Resolved {
        key: String,
        modified: Option<AliasEntry>,
        rekeyed: Option<AliasEntry>,
    },
}

/// Clusters raw terms into alias entries.
///
/// ```
/// use reclink::registry::RegistryBuilder;
/// use reclink::{SourcedTerm, TermCategory};
///
/// let terms = ["JOHN SMITH", "JON SMITH", "JANE DOE"]
///     .map(|v| SourcedTerm::new(v, "tax", "owner_name"));
/// let entries = RegistryBuilder::default().plan(terms);
/// assert_eq!(entries.len(), 2);
/// assert_eq!(entries[0].variants(TermCategory::Homonym)[0].value, "JON SMITH");
/// ```
pub struct RegistryBuilder<'r> {
    clustering: ClusteringEngine,
    similarity: StringSimilarity,
    resolver: Option<&'r dyn DuplicateResolver>,
}

impl Default for RegistryBuilder<'_> {
    fn default() -> Self {
        Self::new(ClusterThresholds::default(), StringSimilarity::default())
    }
}

impl std::fmt::Debug for RegistryBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("clustering", &self.clustering)
            .field("similarity", &self.similarity)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl<'r> RegistryBuilder<'r> {
    /// A builder with no resolver.
    #[must_use]
    pub const fn new(thresholds: ClusterThresholds, similarity: StringSimilarity) -> Self {
        Self {
            clustering: ClusteringEngine::new(thresholds),
            similarity,
            resolver: None,
        }
    }

    /// Injects the callback consulted on primary-key collisions.
    #[must_use]
    pub fn with_resolver(mut self, resolver: &'r dyn DuplicateResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Groups terms into entries without touching any registry.
    ///
    /// Blank terms are dropped and exact duplicates (same normalized value)
    /// keep their first occurrence. Terms are blocked by the first character
    /// of their normalized value; blocks and entries follow first appearance.
    /// Within a block only pairs whose lengths allow a homonym score are
    /// compared.
    pub fn plan(&self, terms: impl IntoIterator<Item = SourcedTerm>) -> Vec<AliasEntry> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut blocks: Vec<(char, Vec<(String, SourcedTerm)>)> = Vec::new();
        let mut block_of: HashMap<char, usize> = HashMap::new();

        for term in terms {
            let key = term.key();
            let Some(first) = key.chars().next() else {
                continue;
            };
            if !seen.insert(key.clone()) {
                continue;
            }
            let slot = *block_of.entry(first).or_insert_with(|| {
                blocks.push((first, Vec::new()));
                blocks.len() - 1
            });
            blocks[slot].1.push((key, term));
        }

        let homonym = self.clustering.thresholds().homonym;
        let mut entries = Vec::new();
        for (first, block) in blocks {
            let clusters = {
                let lengths: Vec<usize> = block.iter().map(|(key, _)| key.chars().count()).collect();
                let mut order: Vec<usize> = (0..block.len()).collect();
                order.sort_by_key(|&i| (lengths[i], i));
                let (lengths, order) = (&lengths, &order);
                // lengths ascend along `order`, so the bound only falls further
                let pairs = order.iter().enumerate().flat_map(move |(at, &i)| {
                    order[at + 1..]
                        .iter()
                        .take_while(move |&&j| self.similarity.length_bound(lengths[i], lengths[j]) + 1e-9 >= homonym)
                        .map(move |&j| (i, j))
                });
                self.clustering.cluster_pairs(block.len(), pairs, |i, j| {
                    self.similarity.similarity_normalized(&block[i].0, &block[j].0)
                })
            };
            debug!(block = %first, terms = block.len(), clusters = clusters.len(), "clustered block");
            for cluster in clusters {
                let mut entry = AliasEntry::new(block[cluster.representative].1.clone());
                for member in &cluster.members {
                    entry.push_variant(block[member.index].1.clone(), member.category);
                }
                entries.push(entry);
            }
        }
        entries
    }

    /// Plans entries from `terms` and adds them to `registry`.
    ///
    /// Every collision is resolved before the first write, so a build that
    /// fails on a collision leaves the registry untouched.
    ///
    /// # Errors
    /// - `DuplicateKey` when a collision has no resolver, the resolver
    ///   declines, or a re-keyed candidate lands on a key already in use
    /// - any registry error raised while adding or replacing; entries
    ///   applied before that point stay applied
    pub fn build_into<S: RegistryStorage>(
        &self,
        registry: &AliasRegistry<S>,
        terms: impl IntoIterator<Item = SourcedTerm>,
    ) -> Result<BuildReport, RegistryError> {
        let entries = self.plan(terms);
        let mut report = BuildReport {
            terms: entries.iter().map(|e| e.alternatives.len() + 1).sum(),
            ..BuildReport::default()
        };

        let mut claimed: HashSet<String> = entries.iter().map(AliasEntry::key).collect();
        let mut steps = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = entry.key();
            let Some(existing) = registry.get(&key)? else {
                steps.push(Step::Add(entry));
                continue;
            };

            let Some(resolver) = self.resolver else {
                warn!(%key, "duplicate primary key and no resolver configured");
                return Err(RegistryError::DuplicateKey { key });
            };
            let resolution = resolver.resolve(&existing, &entry);
            if !resolution.resolved {
                warn!(%key, "duplicate primary key left unresolved");
                return Err(RegistryError::DuplicateKey { key });
            }

            let rekeyed = resolution.new_key.as_deref().map(|new_key| entry.rekeyed(new_key));
            if let Some(rekeyed) = &rekeyed {
                let new_key = rekeyed.key();
                if !claimed.insert(new_key.clone()) || registry.get(&new_key)?.is_some() {
                    warn!(%key, %new_key, "re-keyed candidate collides with an existing key");
                    return Err(RegistryError::DuplicateKey { key: new_key });
                }
            }
            steps.push(Step::Resolved {
                key,
                modified: resolution.modified_entry,
                rekeyed,
            });
        }

        for step in steps {
            match step {
                Step::Add(entry) => {
                    registry.add(entry)?;
                    report.added += 1;
                }
                Step::Resolved { key, modified, rekeyed } => {
                    let mut applied = false;
                    if let Some(modified) = modified {
                        registry.replace(&key, modified)?;
                        report.merged += 1;
                        applied = true;
                    }
                    if let Some(rekeyed) = rekeyed {
                        registry.add(rekeyed)?;
                        report.rekeyed += 1;
                        applied = true;
                    }
                    if !applied {
                        report.dropped += 1;
                    }
                    debug!(%key, "resolved duplicate primary key");
                }
            }
        }

        info!(
            terms = report.terms,
            added = report.added,
            merged = report.merged,
            rekeyed = report.rekeyed,
            dropped = report.dropped,
            "built registry entries"
        );
        Ok(report)
    }
}
