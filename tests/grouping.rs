//! Group building over a mixed population from several sources.

use std::collections::BTreeSet;

use reclink::compare::{Address, ContactBundle, Name};
use reclink::export::{group_rows, write_group_rows, Role};
use reclink::group::{GroupBuilder, PhasePlan, PhaseSlice, Population, SourceFlag};
use reclink::record::{Household, Individual, Organization, Record, RecordKey, RecordKind};
use reclink::MatchPolicy;

fn main_st() -> ContactBundle {
    ContactBundle::with_primary(Address::street("12", "Main St").in_city("Providence", "RI").with_postal_code("02903"))
}

fn island_box() -> ContactBundle {
    ContactBundle::with_primary(Address::po_box("648").in_city("New Shoreham", "RI").with_postal_code("02807"))
}

fn person(key: &str, source: &str, first: &str, last: &str, contact: ContactBundle) -> Individual {
    Individual::new(key, source, Name::new(Some(first), Some(last))).with_contact(contact)
}

fn population() -> Population {
    let smiths = Household::new(
        "tax-h1",
        "tax",
        vec![
            person("tax-h1-a", "tax", "JOHN", "SMITH", main_st()),
            person("tax-h1-b", "tax", "MARY", "SMITH", main_st()),
        ],
    )
    .with_contact(main_st());

    let records: Vec<Record> = vec![
        person("voter-1", "voter", "JON", "SMITH", main_st()).into(),
        person("tax-h1-b", "tax", "MARY", "SMITH", main_st()).into(),
        person("voter-2", "voter", "ELLEN", "DODGE", island_box()).into(),
        person("dmv-7", "dmv", "ELLEN", "DODGE", island_box()).into(),
        Organization::new("tax-o1", "tax", "ISLAND MARINE LLC").with_contact(island_box()).into(),
        Organization::new("sos-o1", "sos", "ISLAND MARINE L.L.C.").with_contact(island_box()).into(),
        smiths.into(),
    ];
    Population::from_records(records).unwrap()
}

fn key(k: &str) -> RecordKey {
    RecordKey::from(k)
}

#[test]
fn default_plan_groups_by_kind_order() {
    let population = population();
    let policy = MatchPolicy::default();
    let result = GroupBuilder::new(&policy).build(&population).unwrap();

    let members: Vec<BTreeSet<RecordKey>> = result.groups.iter().map(|g| g.member_keys.clone()).collect();
    assert_eq!(members.iter().map(BTreeSet::len).sum::<usize>(), population.len());

    let household = &result.groups[0];
    assert_eq!(household.founding_key, key("tax-h1"));
    assert_eq!(household.phase_name, "households");
    assert!(household.contains(&key("tax-h1-b")));
    assert!(household.contains(&key("voter-1")));
    assert_eq!(household.source_flag, SourceFlag::Mixed);

    let dodge = result.group_of(&key("dmv-7")).unwrap();
    assert_eq!(dodge.founding_key, key("voter-2"));
    assert_eq!(dodge.phase_name, "individuals");

    let marine = result.group_of(&key("sos-o1")).unwrap();
    assert_eq!(marine.founding_key, key("tax-o1"));
    let consensus = marine.consensus.as_ref().unwrap();
    assert_eq!(consensus.sources.len(), 2);
    assert_eq!(consensus.primary_address.as_ref().and_then(Address::postal5).as_deref(), Some("02807"));

    assert!(result.type_mismatches > 0);
}

#[test]
fn policy_from_json_tightens_membership() {
    let policy = MatchPolicy::from_json_str(r#"{ "group": { "true_match": 0.99, "near_match": 0.5 } }"#)
        .unwrap()
        .validate()
        .unwrap();
    let population = Population::from_records([
        Record::from(person("a", "tax", "JOHN", "SMITH", main_st())),
        Record::from(person("b", "voter", "JON", "SMITH", main_st())),
        Record::from(person("c", "voter", "JOHN", "SMITH", main_st())),
    ])
    .unwrap();
    let result = GroupBuilder::new(&policy).build(&population).unwrap();

    let first = &result.groups[0];
    assert!(first.contains(&key("c")));
    assert!(first.near_miss_keys.contains(&key("b")));
    assert_eq!(result.groups.len(), 2);

    let rows = group_rows(&result, &population);
    assert_eq!(rows.iter().filter(|r| r.role == Role::NearMiss).count(), 3);
}

#[test]
fn source_phases_pick_founders() {
    let population = population();
    let policy = MatchPolicy::default();
    let plan = PhasePlan::new(vec![
        PhaseSlice::new("dmv").from_source("dmv"),
        PhaseSlice::new("voter people").from_source("voter").of_kind(RecordKind::Individual),
    ]);
    let result = GroupBuilder::new(&policy).with_plan(plan).build(&population).unwrap();

    assert_eq!(result.groups[0].founding_key, key("dmv-7"));
    assert!(result.groups[0].contains(&key("voter-2")));
    assert_eq!(result.group_of(&key("voter-1")).unwrap().phase_name, "voter people");
    assert_eq!(result.group_of(&key("tax-o1")).unwrap().phase_name, "remaining");
}

#[test]
fn exported_csv_lists_every_member() {
    let population = population();
    let policy = MatchPolicy::default();
    let result = GroupBuilder::new(&policy).build(&population).unwrap();
    let rows = group_rows(&result, &population);

    let members = rows.iter().filter(|r| r.role != Role::NearMiss).count();
    assert_eq!(members, population.len());

    let mut out = Vec::new();
    write_group_rows(&mut out, &rows).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), rows.len() + 1);
    assert!(text.contains("ISLAND MARINE LLC"));
}
