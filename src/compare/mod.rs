//! Field comparators and the weighted comparison engine.
//!
//! Every comparable bundle implements [`Comparable`]. Records expose their
//! bundles as a [`FieldSet`] of tagged [`Field`] values; dispatch between
//! bundle kinds happens on the enum, and comparing two different kinds is a
//! [`CompareError::TypeMismatch`] rather than a score.
//!
//! Comparators return `Ok(None)` when there is no comparable data (for example
//! two empty names); such fields are skipped by the engine.

pub mod address;
pub mod aux;
pub mod contact;
pub mod engine;
pub mod name;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::MatchPolicy;
use crate::error::CompareError;
use crate::similarity::StringSimilarity;

pub use address::{Address, AddressMode, AddressPolicy, RegionPolicy};
pub use aux::AuxBundle;
pub use contact::{ContactBundle, ContactPolicy};
pub use engine::{Boost, BoostPolicy, Comparison, ScoreComponent, WeightMap, WeightedComparisonEngine};
pub use name::{Name, NamePolicy};

/// Field name of the name bundle.
pub const NAME: &str = "name";
/// Field name of the contact bundle.
pub const CONTACT: &str = "contact";
/// Field name of the auxiliary-info bundle.
pub const AUX: &str = "aux";

/// Resolves free-text terms to canonical keys (e.g. nickname directories).
///
/// Implemented by [`crate::registry::AliasRegistry`].
pub trait NameDirectory: Send + Sync {
    /// Returns the canonical key for `term`, if the directory knows it.
    fn canonical_key(&self, term: &str) -> Option<String>;
}

/// Everything a comparator needs besides the two values being compared.
#[derive(Clone, Copy)]
pub struct CompareContext<'a> {
    policy: &'a MatchPolicy,
    similarity: StringSimilarity,
    directory: Option<&'a dyn NameDirectory>,
}

impl<'a> CompareContext<'a> {
    /// Creates a context without a name directory.
    #[must_use]
    pub fn new(policy: &'a MatchPolicy) -> Self {
        Self {
            policy,
            similarity: StringSimilarity::new(policy.similarity),
            directory: None,
        }
    }

    /// Attaches a name directory consulted by the name comparator.
    #[must_use]
    pub fn with_directory(mut self, directory: &'a dyn NameDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// The match policy.
    #[must_use]
    pub const fn policy(&self) -> &'a MatchPolicy {
        self.policy
    }

    /// The string metric built from the policy's substitution costs.
    #[must_use]
    pub const fn similarity(&self) -> &StringSimilarity {
        &self.similarity
    }

    /// The attached name directory, if any.
    #[must_use]
    pub fn directory(&self) -> Option<&'a dyn NameDirectory> {
        self.directory
    }
}

impl std::fmt::Debug for CompareContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompareContext")
            .field("similarity", &self.similarity)
            .field("has_directory", &self.directory.is_some())
            .finish_non_exhaustive()
    }
}

/// Capability shared by every comparable bundle.
pub trait Comparable {
    /// Scores `self` against `other` in `[0, 1]`.
    ///
    /// Returns `Ok(None)` when neither side carries comparable data.
    ///
    /// # Errors
    /// `CompareError::TypeMismatch` when the two values are of incompatible kinds.
    fn compare(&self, other: &Self, ctx: &CompareContext<'_>) -> Result<Option<f64>, CompareError>;
}

/// A comparable sub-object of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Field {
    /// A structured person name.
    Name(Name),
    /// Several person names (e.g. a household's members); compares as the best pair.
    Names(Vec<Name>),
    /// Address and email bundle.
    Contact(ContactBundle),
    /// Free text such as an organization name.
    Text(String),
    /// Auxiliary key/value information.
    Aux(AuxBundle),
}

impl Field {
    /// Kind label used in mismatch reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::Names(_) => "names",
            Self::Contact(_) => "contact",
            Self::Text(_) => "text",
            Self::Aux(_) => "aux",
        }
    }
}

fn best_of<'n>(
    left: impl IntoIterator<Item = &'n Name>,
    right: &[Name],
    ctx: &CompareContext<'_>,
) -> Result<Option<f64>, CompareError> {
    let mut best: Option<f64> = None;
    for a in left {
        for b in right {
            if let Some(score) = a.compare(b, ctx)? {
                best = Some(best.map_or(score, |current| current.max(score)));
            }
        }
    }
    Ok(best)
}

impl Comparable for Field {
    fn compare(&self, other: &Self, ctx: &CompareContext<'_>) -> Result<Option<f64>, CompareError> {
        match (self, other) {
            (Self::Name(a), Self::Name(b)) => a.compare(b, ctx),
            (Self::Name(a), Self::Names(b)) => best_of(std::iter::once(a), b, ctx),
            (Self::Names(a), Self::Name(b)) => best_of(a, std::slice::from_ref(b), ctx),
            (Self::Names(a), Self::Names(b)) => best_of(a, b, ctx),
            (Self::Contact(a), Self::Contact(b)) => a.compare(b, ctx),
            (Self::Text(a), Self::Text(b)) => {
                if a.trim().is_empty() && b.trim().is_empty() {
                    return Ok(None);
                }
                Ok(Some(ctx.similarity().similarity(a, b)))
            }
            (Self::Aux(a), Self::Aux(b)) => a.compare(b, ctx),
            (a, b) => Err(CompareError::TypeMismatch {
                left: a.kind(),
                right: b.kind(),
            }),
        }
    }
}

/// Named comparable sub-fields of one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: BTreeMap<String, Field>,
}

impl FieldSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any previous value under that name.
    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    /// Builder-style [`Self::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.insert(name, field);
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
