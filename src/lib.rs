//! # reclink - entity resolution core
//!
//! reclink decides which records from several sources (tax rolls, voter
//! files, licensing lists) describe the same real-world person, household or
//! organization.
//!
//! ## Core Concepts
//!
//! - **StringSimilarity**: vowel-aware weighted edit distance in `[0, 1]`
//! - **Comparators**: address, contact-bundle and name scoring
//! - **WeightedComparisonEngine**: per-record-type weights with a match boost
//! - **AliasRegistry**: canonical spellings with their variants and provenance
//! - **ClusteringEngine**: union-find grouping of similar strings
//! - **GroupBuilder**: phased founder expansion with near-misses and consensus
//!
//! ## Usage
//!
//! ```rust
//! use reclink::compare::{Address, ContactBundle, Name};
//! use reclink::group::{GroupBuilder, Population};
//! use reclink::record::Individual;
//! use reclink::MatchPolicy;
//!
//! let home = ContactBundle::with_primary(Address::po_box("648").in_city("NEW SHOREHAM", "RI").with_postal_code("02807"));
//! let population = Population::from_records([
//!     Individual::new("tax-1", "tax", Name::new(Some("JOHN"), Some("SMITH"))).with_contact(home.clone()).into(),
//!     Individual::new("voter-9", "voter", Name::new(Some("JON"), Some("SMITH"))).with_contact(home).into(),
//! ])?;
//!
//! let policy = MatchPolicy::default().validate()?;
//! let result = GroupBuilder::new(&policy).build(&population)?;
//! assert_eq!(result.groups.len(), 1);
//! # Ok::<(), reclink::error::ReclinkError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cluster;
pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod group;
pub mod record;
pub mod registry;
pub mod similarity;
pub mod storage;
pub mod term;

pub use cluster::{Cluster, ClusterMember, ClusterThresholds, ClusteringEngine};
pub use compare::{CompareContext, Comparison, NameDirectory};
pub use config::{MatchPolicy, RecordWeights};
pub use error::{CompareError, ReclinkError, ReclinkResult, RegistryError, ValidationError};
pub use group::{Group, GroupBuilder, GroupingResult, Population};
pub use record::{Record, RecordKey, RecordKind};
pub use registry::{AliasEntry, AliasRegistry};
pub use similarity::{StringSimilarity, SubstitutionCosts};
pub use storage::{InMemoryStorage, RegistryStorage, StorageError, StorageId};
pub use term::{SourceId, SourcedTerm, TermCategory};
