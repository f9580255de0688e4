//! Flat rows for reviewing grouping results, and CSV serialization.

use std::io;

use serde::{Deserialize, Serialize};

use crate::compare::Comparison;
use crate::error::{ReclinkError, ReclinkResult};
use crate::group::{Group, GroupingResult, Population};
use crate::record::RecordKey;

/// How a record relates to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The record that founded the group.
    Founder,
    /// A member other than the founder.
    Member,
    /// Scored near the founder without joining.
    NearMiss,
}

/// One founder, member or near-miss of a group.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub group_id: String,
    pub founding_key: String,
    pub record_key: String,
    pub role: Role,
    pub source: String,
    pub display_name: String,
    /// Founder-relative score; empty for the founder.
    pub score: Option<f64>,
    pub phase: String,
    pub source_flag: String,
    pub consensus_name: Option<String>,
}

/// One scored pair with its per-field breakdown flattened to text.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub left_key: String,
    pub right_key: String,
    pub score: f64,
    pub boosted_field: Option<String>,
    pub boost_delta: Option<f64>,
    /// `field=raw@weight` terms separated by `;`.
    pub breakdown: String,
}

impl ComparisonRow {
    /// Flattens `comparison` of `left` against `right`.
    #[must_use]
    pub fn new(left: &RecordKey, right: &RecordKey, comparison: &Comparison) -> Self {
        let breakdown = comparison
            .components
            .iter()
            .map(|c| format!("{}={:.3}@{:.3}", c.field, c.raw, c.weight))
            .collect::<Vec<_>>()
            .join(";");
        Self {
            left_key: left.to_string(),
            right_key: right.to_string(),
            score: comparison.score,
            boosted_field: comparison.boost.as_ref().map(|b| b.field.clone()),
            boost_delta: comparison.boost.as_ref().map(|b| b.delta),
            breakdown,
        }
    }
}

fn row(group: &Group, population: &Population, key: &RecordKey, role: Role) -> GroupRow {
    let record = population.get(key);
    GroupRow {
        group_id: group.id.clone(),
        founding_key: group.founding_key.to_string(),
        record_key: key.to_string(),
        role,
        source: record.map(|r| r.source().to_string()).unwrap_or_default(),
        display_name: record.map(crate::record::Record::display_name).unwrap_or_default(),
        score: group.scores.get(key).copied(),
        phase: group.phase_name.clone(),
        source_flag: group.source_flag.to_string(),
        consensus_name: group.consensus.as_ref().and_then(|c| c.name.clone()),
    }
}

/// Flattens groups into rows: founder first, then members, then near-misses.
#[must_use]
pub fn group_rows(result: &GroupingResult, population: &Population) -> Vec<GroupRow> {
    let mut rows = Vec::new();
    for group in &result.groups {
        rows.push(row(group, population, &group.founding_key, Role::Founder));
        for key in group.member_keys.iter().filter(|k| **k != group.founding_key) {
            rows.push(row(group, population, key, Role::Member));
        }
        for key in &group.near_miss_keys {
            rows.push(row(group, population, key, Role::NearMiss));
        }
    }
    rows
}

fn write_rows<W: io::Write, T: Serialize>(writer: W, rows: &[T]) -> ReclinkResult<()> {
    let export_err = |e: csv::Error| ReclinkError::Export { message: e.to_string() };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);
    for row in rows {
        writer.serialize(row).map_err(export_err)?;
    }
    writer.flush().map_err(|e| ReclinkError::Export { message: e.to_string() })
}

/// Writes group rows as CSV with a header line.
///
/// # Errors
/// `ReclinkError::Export` if serialization or the underlying writer fails.
pub fn write_group_rows<W: io::Write>(writer: W, rows: &[GroupRow]) -> ReclinkResult<()> {
    write_rows(writer, rows)
}

/// Writes comparison rows as CSV with a header line.
///
/// # Errors
/// `ReclinkError::Export` if serialization or the underlying writer fails.
pub fn write_comparison_rows<W: io::Write>(writer: W, rows: &[ComparisonRow]) -> ReclinkResult<()> {
    write_rows(writer, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{CompareContext, Name};
    use crate::config::MatchPolicy;
    use crate::group::GroupBuilder;
    use crate::record::{Individual, Record};

    fn population() -> Population {
        Population::from_records([
            Record::from(Individual::new("t1", "tax", Name::new(Some("JOHN"), Some("SMITH")))),
            Record::from(Individual::new("v1", "voter", Name::new(Some("JOHN"), Some("SMITH")))),
        ])
        .unwrap()
    }

    #[test]
    fn test_group_rows_roles() {
        let population = population();
        let policy = MatchPolicy::default();
        let result = GroupBuilder::new(&policy).build(&population).unwrap();
        let rows = group_rows(&result, &population);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, Role::Founder);
        assert_eq!(rows[0].score, None);
        assert_eq!(rows[1].role, Role::Member);
        assert_eq!(rows[1].source_flag, "mixed");
        assert_eq!(rows[1].consensus_name.as_deref(), Some("JOHN SMITH"));
    }

    #[test]
    fn test_write_group_rows_csv() {
        let population = population();
        let policy = MatchPolicy::default();
        let result = GroupBuilder::new(&policy).build(&population).unwrap();
        let mut out = Vec::new();
        write_group_rows(&mut out, &group_rows(&result, &population)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("group_id,founding_key,record_key,role"));
        assert!(lines.next().unwrap().contains(",founder,"));
        assert!(lines.next().unwrap().contains(",member,"));
    }

    #[test]
    fn test_comparison_row_breakdown() {
        let population = population();
        let policy = MatchPolicy::default();
        let ctx = CompareContext::new(&policy);
        let [a, b] = population.records() else { panic!("two records") };
        let cmp = a.compare(b, &ctx).unwrap().unwrap();
        let row = ComparisonRow::new(a.key(), b.key(), &cmp);
        assert_eq!(row.breakdown, "name=1.000@0.450");
        assert_eq!(row.boosted_field, None);

        let mut out = Vec::new();
        write_comparison_rows(&mut out, &[row]).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("left_key,right_key,score"));
    }
}
