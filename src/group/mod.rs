//! Multi-phase grouping of a record population.
//!
//! Phases run in order. Within a phase every still-unassigned record of the
//! phase's slice founds a group; the founder is scored against the whole
//! population and records at or above `true_match` join the group if they are
//! still free. Scores in `[near_match, true_match)`, and true matches already
//! taken by an earlier group, are kept as near-misses for review.
//!
//! ```
//! use reclink::compare::Name;
//! use reclink::group::{GroupBuilder, Population};
//! use reclink::record::Individual;
//! use reclink::MatchPolicy;
//!
//! let population = Population::from_records([
//!     Individual::new("t1", "tax", Name::new(Some("JOHN"), Some("SMITH"))).into(),
//!     Individual::new("v1", "voter", Name::new(Some("JOHN"), Some("SMITH"))).into(),
//!     Individual::new("v2", "voter", Name::new(Some("MARY"), Some("JONES"))).into(),
//! ])
//! .unwrap();
//! let policy = MatchPolicy::default();
//! let result = GroupBuilder::new(&policy).build(&population).unwrap();
//! assert_eq!(result.groups.len(), 2);
//! assert_eq!(result.groups[0].member_keys.len(), 2);
//! ```

mod consensus;
mod pool;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compare::{CompareContext, NameDirectory};
use crate::config::MatchPolicy;
use crate::error::{ReclinkError, ReclinkResult, ValidationError};
use crate::record::{Record, RecordKey, RecordKind};
use crate::term::SourceId;

pub use consensus::{consensus, ConsensusRecord};
use pool::{ScanOutcome, ScanPool};

/// Score thresholds for group membership.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupThresholds {
    /// At or above: the record joins the founder's group.
    pub true_match: f64,
    /// At or above (and below `true_match`): recorded as a near-miss.
    pub near_match: f64,
}

impl Default for GroupThresholds {
    fn default() -> Self {
        Self {
            true_match: 0.85,
            near_match: 0.70,
        }
    }
}

/// Worker pool sizing for founder scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Scan threads; clamped to the number of founders.
    pub workers: usize,
    /// Bound of the job queue.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}

/// The records to be grouped, with unique keys.
#[derive(Debug, Clone, Default)]
pub struct Population {
    records: Vec<Record>,
    by_key: HashMap<RecordKey, usize>,
}

impl Population {
    /// Collects records, rejecting duplicate keys.
    ///
    /// # Errors
    /// `ValidationError::DuplicateRecordKey` when two records share a key.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Result<Self, ValidationError> {
        let mut population = Self::default();
        for record in records {
            let key = record.key().clone();
            if population.by_key.contains_key(&key) {
                return Err(ValidationError::DuplicateRecordKey { key: key.to_string() });
            }
            population.by_key.insert(key, population.records.len());
            population.records.push(record);
        }
        Ok(population)
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Record with `key`.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.index_of(key).map(|i| &self.records[i])
    }

    /// Position of the record with `key`.
    #[must_use]
    pub fn index_of(&self, key: &RecordKey) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn record(&self, index: usize) -> &Record {
        &self.records[index]
    }
}

/// One phase of the plan: records matching both filters found groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSlice {
    /// Phase name reported on groups and export rows.
    pub name: String,
    /// Only records of this kind, when set.
    #[serde(default)]
    pub kind: Option<RecordKind>,
    /// Only records from this source, when set.
    #[serde(default)]
    pub source: Option<SourceId>,
}

impl PhaseSlice {
    /// A slice selecting every record.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            source: None,
        }
    }

    /// Restricts the slice to one record kind.
    #[must_use]
    pub fn of_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts the slice to one source.
    #[must_use]
    pub fn from_source(mut self, source: impl Into<SourceId>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// True when `record` passes both filters.
    #[must_use]
    pub fn selects(&self, record: &Record) -> bool {
        self.kind.map_or(true, |k| k == record.kind())
            && self.source.as_ref().map_or(true, |s| s == record.source())
    }
}

/// Ordered phases. A catch-all phase for unselected records always runs last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhasePlan {
    phases: Vec<PhaseSlice>,
}

/// Name of the implicit final phase.
pub const CATCH_ALL_PHASE: &str = "remaining";

impl PhasePlan {
    /// A plan running `phases` in order.
    #[must_use]
    pub fn new(phases: Vec<PhaseSlice>) -> Self {
        Self { phases }
    }

    /// Configured phases, catch-all excluded.
    #[must_use]
    pub fn phases(&self) -> &[PhaseSlice] {
        &self.phases
    }
}

impl Default for PhasePlan {
    /// Households, then individuals, then organizations.
    fn default() -> Self {
        Self::new(vec![
            PhaseSlice::new("households").of_kind(RecordKind::Household),
            PhaseSlice::new("individuals").of_kind(RecordKind::Individual),
            PhaseSlice::new("organizations").of_kind(RecordKind::Organization),
        ])
    }
}

/// Which group, if any, owns each record.
#[derive(Debug)]
pub struct AssignmentTable {
    slots: Mutex<Vec<Option<usize>>>,
}

impl AssignmentTable {
    /// A table with every record unassigned.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; len]),
        }
    }

    fn lock(&self) -> ReclinkResult<std::sync::MutexGuard<'_, Vec<Option<usize>>>> {
        self.slots
            .lock()
            .map_err(|_| ReclinkError::internal("assignment table lock poisoned"))
    }

    /// # Errors
    /// Returns an error if the table lock is poisoned.
    pub fn is_assigned(&self, index: usize) -> ReclinkResult<bool> {
        Ok(self.lock()?.get(index).copied().flatten().is_some())
    }

    /// # Errors
    /// Returns an error if the table lock is poisoned.
    pub fn group_of(&self, index: usize) -> ReclinkResult<Option<usize>> {
        Ok(self.lock()?.get(index).copied().flatten())
    }

    /// Assigns `index` to `group` unless it already has one.
    ///
    /// Returns true when the assignment was made.
    ///
    /// # Errors
    /// Returns an error if the table lock is poisoned.
    pub fn assign(&self, index: usize, group: usize) -> ReclinkResult<bool> {
        let mut slots = self.lock()?;
        let Some(slot) = slots.get_mut(index) else {
            return Ok(false);
        };
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(group);
        Ok(true)
    }

    /// # Errors
    /// Returns an error if the table lock is poisoned.
    pub fn unassigned(&self) -> ReclinkResult<usize> {
        Ok(self.lock()?.iter().filter(|s| s.is_none()).count())
    }
}

/// Whether a group's members come from one source or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFlag {
    /// Every member comes from this source.
    Single(SourceId),
    /// Members come from two or more sources.
    Mixed,
}

impl fmt::Display for SourceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(source) => write!(f, "{source}"),
            Self::Mixed => f.write_str("mixed"),
        }
    }
}

/// A founder with its members and near-misses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Short stable id derived from the founding key.
    pub id: String,
    /// Record that founded the group.
    pub founding_key: RecordKey,
    /// Includes the founder.
    pub member_keys: BTreeSet<RecordKey>,
    /// Records that scored near the founder without joining.
    pub near_miss_keys: BTreeSet<RecordKey>,
    /// Index of the phase that founded the group.
    pub origin_phase: usize,
    /// Name of the founding phase.
    pub phase_name: String,
    /// Source make-up of the members.
    pub source_flag: SourceFlag,
    /// Majority view; only for groups with more than one member.
    pub consensus: Option<ConsensusRecord>,
    /// Founder-relative score of each member and near-miss.
    pub scores: BTreeMap<RecordKey, f64>,
}

impl Group {
    fn founded(founder: &Record, origin_phase: usize, phase_name: &str) -> Self {
        let key = founder.key().clone();
        Self {
            id: group_id(&key),
            member_keys: BTreeSet::from([key.clone()]),
            founding_key: key,
            near_miss_keys: BTreeSet::new(),
            origin_phase,
            phase_name: phase_name.to_string(),
            source_flag: SourceFlag::Single(founder.source().clone()),
            consensus: None,
            scores: BTreeMap::new(),
        }
    }

    /// True when `key` is a member.
    #[must_use]
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.member_keys.contains(key)
    }
}

fn group_id(founding_key: &RecordKey) -> String {
    let hash = blake3::hash(founding_key.as_str().as_bytes());
    hash.to_hex().as_str()[..16].to_string()
}

/// Output of [`GroupBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingResult {
    /// Groups in creation order.
    pub groups: Vec<Group>,
    /// Pairs excluded because their fields were of incompatible kinds.
    pub type_mismatches: usize,
}

impl GroupingResult {
    /// The group that owns `key`.
    #[must_use]
    pub fn group_of(&self, key: &RecordKey) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(key))
    }
}

/// Runs the phase plan over a population.
pub struct GroupBuilder<'a> {
    policy: &'a MatchPolicy,
    plan: PhasePlan,
    directory: Option<&'a dyn NameDirectory>,
}

impl fmt::Debug for GroupBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBuilder")
            .field("plan", &self.plan)
            .field("has_directory", &self.directory.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> GroupBuilder<'a> {
    /// A builder using `policy` and the default phase plan.
    #[must_use]
    pub fn new(policy: &'a MatchPolicy) -> Self {
        Self {
            policy,
            plan: PhasePlan::default(),
            directory: None,
        }
    }

    /// Replaces the phase plan.
    #[must_use]
    pub fn with_plan(mut self, plan: PhasePlan) -> Self {
        self.plan = plan;
        self
    }

    /// Name directory used by the name comparator (e.g. an alias registry).
    #[must_use]
    pub fn with_directory(mut self, directory: &'a dyn NameDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Groups `population`.
    ///
    /// Every record ends up a member of exactly one group.
    ///
    /// # Errors
    /// Returns an error if a scan worker cannot be spawned or the assignment
    /// table lock is poisoned.
    pub fn build(&self, population: &Population) -> ReclinkResult<GroupingResult> {
        let mut ctx = CompareContext::new(self.policy);
        if let Some(directory) = self.directory {
            ctx = ctx.with_directory(directory);
        }
        let thresholds = self.policy.group;
        let pool = ScanPool {
            population,
            ctx,
            near_match: thresholds.near_match,
            workers: self.policy.workers.workers,
            queue_capacity: self.policy.workers.queue_capacity,
        };
        let table = AssignmentTable::new(population.len());
        let mut result = GroupingResult::default();

        let phases = self.plan.phases();
        let catch_all = PhaseSlice::new(CATCH_ALL_PHASE);
        let mut all = phases.iter().enumerate().collect::<Vec<_>>();
        all.push((phases.len(), &catch_all));

        for (phase, slice) in all {
            let founders: Vec<usize> = population
                .records()
                .iter()
                .enumerate()
                .filter(|(_, record)| {
                    if phase == phases.len() {
                        !phases.iter().any(|p| p.selects(record))
                    } else {
                        slice.selects(record)
                    }
                })
                .map(|(i, _)| i)
                .collect();
            info!(phase = %slice.name, candidates = founders.len(), "phase started");
            let before = result.groups.len();

            pool.run(&founders, &table, |founder, outcome| {
                self.apply(population, &table, &mut result, phase, &slice.name, founder, outcome)
            })?;

            let unassigned = table.unassigned()?;
            info!(
                phase = %slice.name,
                groups = result.groups.len() - before,
                unassigned,
                "phase finished"
            );
        }

        for group in &mut result.groups {
            if group.member_keys.len() > 1 {
                let members = std::iter::once(&group.founding_key)
                    .chain(group.member_keys.iter().filter(|k| **k != group.founding_key))
                    .filter_map(|k| population.get(k));
                group.consensus = Some(consensus(members));
            }
        }
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self,
        population: &Population,
        table: &AssignmentTable,
        result: &mut GroupingResult,
        phase: usize,
        phase_name: &str,
        founder: usize,
        outcome: ScanOutcome,
    ) -> ReclinkResult<()> {
        let ScanOutcome::Scanned { hits, mismatches } = outcome else {
            return Ok(());
        };
        let group_index = result.groups.len();
        if !table.assign(founder, group_index)? {
            return Ok(());
        }
        result.type_mismatches += mismatches;

        let founder_record = population.record(founder);
        let mut group = Group::founded(founder_record, phase, phase_name);
        self.assign_embedded(population, table, &mut group, group_index, founder_record, None)?;

        let true_match = self.policy.group.true_match;
        for hit in hits {
            let record = population.record(hit.index);
            let key = record.key();
            if group.contains(key) {
                group.scores.entry(key.clone()).or_insert(hit.score);
                continue;
            }
            if hit.score >= true_match && table.assign(hit.index, group_index)? {
                group.member_keys.insert(key.clone());
                group.scores.insert(key.clone(), hit.score);
                self.assign_embedded(population, table, &mut group, group_index, record, Some(hit.score))?;
            } else {
                group.near_miss_keys.insert(key.clone());
                group.scores.insert(key.clone(), hit.score);
            }
        }
        // a record pulled in through a household is no longer a near-miss
        let members = group.member_keys.clone();
        group.near_miss_keys.retain(|k| !members.contains(k));

        group.source_flag = source_flag(population, &group.member_keys);
        debug!(
            group = %group.id,
            founder = %group.founding_key,
            members = group.member_keys.len(),
            near_misses = group.near_miss_keys.len(),
            "group created"
        );
        result.groups.push(group);
        Ok(())
    }

    fn assign_embedded(
        &self,
        population: &Population,
        table: &AssignmentTable,
        group: &mut Group,
        group_index: usize,
        record: &Record,
        score: Option<f64>,
    ) -> ReclinkResult<()> {
        for key in record.embedded_keys() {
            let Some(index) = population.index_of(key) else {
                continue;
            };
            if table.assign(index, group_index)? {
                group.member_keys.insert(key.clone());
                if let Some(score) = score {
                    group.scores.insert(key.clone(), score);
                }
            }
        }
        Ok(())
    }
}

fn source_flag(population: &Population, members: &BTreeSet<RecordKey>) -> SourceFlag {
    let mut sources = members.iter().filter_map(|k| population.get(k)).map(Record::source);
    let Some(first) = sources.next() else {
        return SourceFlag::Mixed;
    };
    if sources.all(|s| s == first) {
        SourceFlag::Single(first.clone())
    } else {
        SourceFlag::Mixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{Address, ContactBundle, Name};
    use crate::record::{Household, Individual, Organization};

    fn person(key: &str, source: &str, first: &str, last: &str) -> Individual {
        Individual::new(key, source, Name::new(Some(first), Some(last))).with_contact(ContactBundle::with_primary(
            Address::street("12", "Main St").with_postal_code("02903"),
        ))
    }

    fn policy(workers: usize) -> MatchPolicy {
        let mut policy = MatchPolicy::default();
        policy.workers.workers = workers;
        policy.workers.queue_capacity = 2;
        policy
    }

    #[test]
    fn test_duplicate_record_key_rejected() {
        let err = Population::from_records([
            person("a", "tax", "JOHN", "SMITH").into(),
            person("a", "voter", "JOHN", "SMITH").into(),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateRecordKey { .. }));
    }

    #[test]
    fn test_every_record_assigned_once() {
        let population = Population::from_records([
            person("t1", "tax", "JOHN", "SMITH").into(),
            person("v1", "voter", "JON", "SMITH").into(),
            person("v2", "voter", "MARY", "JONES").into(),
            Organization::new("o1", "tax", "ACME LLC").into(),
        ])
        .unwrap();
        let policy = policy(3);
        let result = GroupBuilder::new(&policy).build(&population).unwrap();

        let mut seen = BTreeSet::new();
        for group in &result.groups {
            for key in &group.member_keys {
                assert!(seen.insert(key.clone()), "{key} assigned twice");
            }
        }
        assert_eq!(seen.len(), population.len());
        assert!(result.type_mismatches > 0, "people against organizations mismatch");
    }

    #[test]
    fn test_household_phase_claims_embedded_members() {
        let household = Household::new(
            "h1",
            "tax",
            vec![person("h1-1", "tax", "JOHN", "SMITH"), person("h1-2", "tax", "MARY", "SMITH")],
        )
        .with_contact(ContactBundle::with_primary(
            Address::street("12", "Main St").with_postal_code("02903"),
        ));
        let population = Population::from_records([
            person("h1-2", "tax", "MARY", "SMITH").into(),
            person("v1", "voter", "JOHN", "SMITH").into(),
            household.into(),
        ])
        .unwrap();
        let policy = policy(2);
        let result = GroupBuilder::new(&policy).build(&population).unwrap();

        let first = &result.groups[0];
        assert_eq!(first.founding_key.as_str(), "h1");
        assert_eq!(first.phase_name, "households");
        assert!(first.contains(&RecordKey::from("h1-2")));
        assert!(first.contains(&RecordKey::from("v1")));
        assert_eq!(first.source_flag, SourceFlag::Mixed);
        assert!(first.consensus.is_some());
        assert_eq!(result.groups.len(), 1);
    }

    #[test]
    fn test_later_phase_skips_claimed_founders() {
        let population = Population::from_records([
            person("a", "tax", "JOHN", "SMITH").into(),
            person("b", "voter", "JOHN", "SMITH").into(),
        ])
        .unwrap();
        let policy = policy(1);
        let plan = PhasePlan::new(vec![
            PhaseSlice::new("voter").from_source("voter"),
            PhaseSlice::new("tax").from_source("tax"),
        ]);
        let result = GroupBuilder::new(&policy).with_plan(plan).build(&population).unwrap();
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].founding_key.as_str(), "b");
        assert_eq!(result.groups[0].phase_name, "voter");
    }

    #[test]
    fn test_taken_true_match_becomes_near_miss() {
        // name-only organizations: a~b and b~c score about 0.92, a~c just under 0.85
        let population = Population::from_records([
            Organization::new("a", "s1", "ACME HOLDINGS").into(),
            Organization::new("b", "s3", "ACME HOLDING").into(),
            Organization::new("c", "s2", "ACME HOLDIN").into(),
        ])
        .unwrap();
        let policy = policy(2);
        let plan = PhasePlan::new(vec![
            PhaseSlice::new("first").from_source("s1"),
            PhaseSlice::new("second").from_source("s2"),
        ]);
        let result = GroupBuilder::new(&policy).with_plan(plan).build(&population).unwrap();
        assert_eq!(result.groups.len(), 2);

        let first = &result.groups[0];
        assert!(first.contains(&RecordKey::from("b")));
        assert!(first.near_miss_keys.contains(&RecordKey::from("c")));

        let second = &result.groups[1];
        assert_eq!(second.member_keys.len(), 1);
        assert!(second.near_miss_keys.contains(&RecordKey::from("b")));
        assert!(second.near_miss_keys.contains(&RecordKey::from("a")));
        assert!(second.scores[&RecordKey::from("b")] >= policy.group.true_match);
    }

    #[test]
    fn test_catch_all_phase_covers_unselected() {
        let population =
            Population::from_records([Organization::new("o1", "tax", "ACME LLC").into()]).unwrap();
        let policy = policy(1);
        let plan = PhasePlan::new(vec![PhaseSlice::new("people").of_kind(RecordKind::Individual)]);
        let result = GroupBuilder::new(&policy).with_plan(plan).build(&population).unwrap();
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].phase_name, CATCH_ALL_PHASE);
        assert_eq!(result.groups[0].origin_phase, 1);
        assert_eq!(result.groups[0].consensus, None);
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let records: Vec<Record> = (0..24)
            .map(|i| {
                let last = ["SMITH", "SMYTH", "JONES", "JONAS"][i % 4];
                person(&format!("r{i}"), if i % 2 == 0 { "tax" } else { "voter" }, "JOHN", last).into()
            })
            .collect();
        let population = Population::from_records(records).unwrap();
        let sequential = GroupBuilder::new(&policy(1)).build(&population).unwrap();
        let parallel = GroupBuilder::new(&policy(4)).build(&population).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_group_id_is_stable() {
        let a = group_id(&RecordKey::from("t1"));
        assert_eq!(a.len(), 16);
        assert_eq!(a, group_id(&RecordKey::from("t1")));
        assert_ne!(a, group_id(&RecordKey::from("t2")));
    }

    #[test]
    fn test_assignment_table_first_claim_wins() {
        let table = AssignmentTable::new(2);
        assert!(table.assign(0, 7).unwrap());
        assert!(!table.assign(0, 8).unwrap());
        assert_eq!(table.group_of(0).unwrap(), Some(7));
        assert_eq!(table.unassigned().unwrap(), 1);
        assert!(!table.assign(5, 1).unwrap());
    }
}
