//! Comparable records: individuals, households and organizations.
//!
//! Records arrive already parsed into structured fields. Each exposes its
//! comparable sub-objects as a [`FieldSet`] so that the weighted engine can
//! score any two records without knowing their concrete kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compare::{
    AuxBundle, CompareContext, Comparison, ContactBundle, Field, FieldSet, Name, WeightedComparisonEngine, AUX,
    CONTACT, NAME,
};
use crate::error::CompareError;
use crate::term::SourceId;

/// Stable key of a record within a population.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Wraps a key as given.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for RecordKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Kind of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// [`Individual`] records.
    Individual,
    /// [`Household`] records.
    Household,
    /// [`Organization`] records.
    Organization,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Household => write!(f, "household"),
            Self::Organization => write!(f, "organization"),
        }
    }
}

/// A single person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Key, unique within a population.
    pub key: RecordKey,
    /// Source the record was loaded from.
    pub source: SourceId,
    /// Parsed person name.
    pub name: Name,
    /// Addresses and email.
    #[serde(default)]
    pub contact: ContactBundle,
    /// Auxiliary facts.
    #[serde(default)]
    pub aux: AuxBundle,
}

impl Individual {
    /// A person with no contact or auxiliary data.
    #[must_use]
    pub fn new(key: impl Into<RecordKey>, source: impl Into<SourceId>, name: Name) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            name,
            contact: ContactBundle::default(),
            aux: AuxBundle::default(),
        }
    }

    /// Returns a copy with the contact bundle set.
    #[must_use]
    pub fn with_contact(mut self, contact: ContactBundle) -> Self {
        self.contact = contact;
        self
    }

    /// Returns a copy with the auxiliary bundle set.
    #[must_use]
    pub fn with_aux(mut self, aux: AuxBundle) -> Self {
        self.aux = aux;
        self
    }
}

/// Several people sharing one contact bundle.
///
/// Members carry their own keys and may also appear as top-level records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    /// Key, unique within a population.
    pub key: RecordKey,
    /// Source the record was loaded from.
    pub source: SourceId,
    /// People in the household.
    pub members: Vec<Individual>,
    /// Addresses and email.
    #[serde(default)]
    pub contact: ContactBundle,
}

impl Household {
    /// A household with no contact data.
    #[must_use]
    pub fn new(key: impl Into<RecordKey>, source: impl Into<SourceId>, members: Vec<Individual>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            members,
            contact: ContactBundle::default(),
        }
    }

    /// Returns a copy with the contact bundle set.
    #[must_use]
    pub fn with_contact(mut self, contact: ContactBundle) -> Self {
        self.contact = contact;
        self
    }
}

/// A business, trust, agency or other non-person entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Key, unique within a population.
    pub key: RecordKey,
    /// Source the record was loaded from.
    pub source: SourceId,
    /// Organization name as written.
    pub name: String,
    /// Addresses and email.
    #[serde(default)]
    pub contact: ContactBundle,
    /// Auxiliary facts.
    #[serde(default)]
    pub aux: AuxBundle,
}

impl Organization {
    /// An organization with no contact or auxiliary data.
    #[must_use]
    pub fn new(key: impl Into<RecordKey>, source: impl Into<SourceId>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            name: name.into(),
            contact: ContactBundle::default(),
            aux: AuxBundle::default(),
        }
    }

    /// Returns a copy with the contact bundle set.
    #[must_use]
    pub fn with_contact(mut self, contact: ContactBundle) -> Self {
        self.contact = contact;
        self
    }
}

/// Any comparable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// A person.
    Individual(Individual),
    /// People sharing a contact bundle.
    Household(Household),
    /// A non-person entity.
    Organization(Organization),
}

impl Record {
    /// Record key.
    #[must_use]
    pub const fn key(&self) -> &RecordKey {
        match self {
            Self::Individual(r) => &r.key,
            Self::Household(r) => &r.key,
            Self::Organization(r) => &r.key,
        }
    }

    /// Record source.
    #[must_use]
    pub const fn source(&self) -> &SourceId {
        match self {
            Self::Individual(r) => &r.source,
            Self::Household(r) => &r.source,
            Self::Organization(r) => &r.source,
        }
    }

    /// Record kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Individual(_) => RecordKind::Individual,
            Self::Household(_) => RecordKind::Household,
            Self::Organization(_) => RecordKind::Organization,
        }
    }

    /// Name-like fields used for consensus and export.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Individual(r) => r.name.to_string(),
            Self::Household(r) => r
                .members
                .iter()
                .map(|m| m.name.to_string())
                .collect::<Vec<_>>()
                .join(" & "),
            Self::Organization(r) => r.name.trim().to_string(),
        }
    }

    /// Contact bundle.
    #[must_use]
    pub const fn contact(&self) -> &ContactBundle {
        match self {
            Self::Individual(r) => &r.contact,
            Self::Household(r) => &r.contact,
            Self::Organization(r) => &r.contact,
        }
    }

    /// Comparable sub-fields of this record.
    #[must_use]
    pub fn fields(&self) -> FieldSet {
        match self {
            Self::Individual(r) => FieldSet::new()
                .with(NAME, Field::Name(r.name.clone()))
                .with(CONTACT, Field::Contact(r.contact.clone()))
                .with(AUX, Field::Aux(r.aux.clone())),
            Self::Household(r) => FieldSet::new()
                .with(NAME, Field::Names(r.members.iter().map(|m| m.name.clone()).collect()))
                .with(CONTACT, Field::Contact(r.contact.clone())),
            Self::Organization(r) => FieldSet::new()
                .with(NAME, Field::Text(r.name.clone()))
                .with(CONTACT, Field::Contact(r.contact.clone()))
                .with(AUX, Field::Aux(r.aux.clone())),
        }
    }

    /// Keys of records embedded in this one (a household's members).
    #[must_use]
    pub fn embedded_keys(&self) -> Vec<&RecordKey> {
        match self {
            Self::Household(r) => r.members.iter().map(|m| &m.key).collect(),
            Self::Individual(_) | Self::Organization(_) => Vec::new(),
        }
    }

    /// Scores `other` against this record using this record's weight map.
    ///
    /// # Errors
    /// `CompareError::TypeMismatch` when a shared field holds incompatible kinds,
    /// e.g. a person name against an organization name.
    pub fn compare(&self, other: &Self, ctx: &CompareContext<'_>) -> Result<Option<Comparison>, CompareError> {
        let policy = ctx.policy();
        let engine = WeightedComparisonEngine::new(policy.weights.for_kind(self.kind()), &policy.boost);
        engine.compare(&self.fields(), &other.fields(), ctx)
    }
}

impl From<Individual> for Record {
    fn from(r: Individual) -> Self {
        Self::Individual(r)
    }
}

impl From<Household> for Record {
    fn from(r: Household) -> Self {
        Self::Household(r)
    }
}

impl From<Organization> for Record {
    fn from(r: Organization) -> Self {
        Self::Organization(r)
    }
}
