//! Property tests for the scoring and grouping invariants.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use reclink::compare::engine::adjust_weights;
use reclink::compare::{
    Address, Boost, BoostPolicy, ContactBundle, Name, WeightMap, WeightedComparisonEngine, CONTACT, NAME,
};
use reclink::group::{GroupBuilder, Population};
use reclink::record::{Household, Individual, Organization, Record};
use reclink::{ClusterThresholds, ClusteringEngine, CompareContext, MatchPolicy, StringSimilarity};

fn word() -> impl Strategy<Value = String> {
    "[A-Za-z ]{0,12}"
}

fn address() -> impl Strategy<Value = Address> {
    ("[0-9]{1,3}", "(Main St|Main Street|Elm Ave|Box Elder St|PO Box [0-9]{2})", "0290[0-9]")
        .prop_map(|(number, street, postal)| Address::street(&number, &street).with_postal_code(&postal))
}

fn score(left: &Record, right: &Record, policy: &MatchPolicy) -> Option<f64> {
    left.compare(right, &CompareContext::new(policy)).unwrap().map(|c| c.score)
}

#[test]
fn cross_kind_comparison_uses_left_weights() {
    let policy = MatchPolicy::default();
    let home = || ContactBundle::with_primary(Address::street("12", "Main St").with_postal_code("02903"));
    let person = Individual::new("voter-1", "voter", Name::new(Some("JOHN"), Some("BALLARD"))).with_contact(home());
    let household: Record = Household::new(
        "tax-h1",
        "tax",
        vec![Individual::new("tax-h1-a", "tax", Name::new(Some("JOHN"), Some("SMITH")))],
    )
    .with_contact(home())
    .into();
    let person: Record = person.into();

    let household_left = score(&household, &person, &policy).unwrap();
    let person_left = score(&person, &household, &policy).unwrap();
    // household weights lean on contact, which matches exactly here
    assert!(household_left > person_left + 0.01, "{household_left} vs {person_left}");
}

#[test]
fn organization_against_individual_is_a_type_mismatch_both_ways() {
    let policy = MatchPolicy::default();
    let ctx = CompareContext::new(&policy);
    let org: Record = Organization::new("sos-1", "sos", "ACME LLC").into();
    let person: Record = Individual::new("voter-1", "voter", Name::new(Some("ACME"), Some("LLC"))).into();
    assert!(org.compare(&person, &ctx).is_err());
    assert!(person.compare(&org, &ctx).is_err());
}

proptest! {
    #[test]
    fn similarity_is_bounded(a in word(), b in word()) {
        let s = StringSimilarity::default().similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn similarity_identity(a in word()) {
        prop_assert_eq!(StringSimilarity::default().similarity(&a, &a), 1.0);
    }

    #[test]
    fn empty_against_non_empty_is_zero(a in "[A-Z]{1,10}") {
        prop_assert_eq!(StringSimilarity::default().similarity("", &a), 0.0);
    }

    #[test]
    fn same_kind_comparison_is_symmetric(
        (first_a, last_a, first_b, last_b) in ("[A-D]{1,5}", "[A-D]{2,6}", "[A-D]{1,5}", "[A-D]{2,6}"),
        address_a in address(),
        address_b in address(),
    ) {
        let policy = MatchPolicy::default();
        let a: Record = Individual::new("a", "tax", Name::new(Some(first_a.as_str()), Some(last_a.as_str())))
            .with_contact(ContactBundle::with_primary(address_a))
            .into();
        let b: Record = Individual::new("b", "voter", Name::new(Some(first_b.as_str()), Some(last_b.as_str())))
            .with_contact(ContactBundle::with_primary(address_b))
            .into();
        match (score(&a, &b, &policy), score(&b, &a, &policy)) {
            (Some(x), Some(y)) => prop_assert!((x - y).abs() < 1e-9, "{} vs {}", x, y),
            (x, y) => prop_assert_eq!(x, y),
        }
    }

    #[test]
    fn engine_score_in_unit_range(
        name in 0.0f64..=1.0,
        contact in 0.0f64..=1.0,
        aux in proptest::option::of(0.0f64..=1.0),
    ) {
        let weights = WeightMap::new([(NAME, 0.45), (CONTACT, 0.45), ("aux", 0.10)]).unwrap();
        let boost = BoostPolicy::default();
        let engine = WeightedComparisonEngine::new(&weights, &boost);
        let mut raw = BTreeMap::from([(NAME.to_string(), name), (CONTACT.to_string(), contact)]);
        if let Some(aux) = aux {
            raw.insert("aux".to_string(), aux);
        }
        let cmp = engine.combine(&raw).unwrap();
        prop_assert!((0.0..=1.0).contains(&cmp.score));
    }

    #[test]
    fn boost_conserves_total_weight(
        name in 0.01f64..10.0,
        contact in 0.01f64..10.0,
        aux in 0.0f64..10.0,
        delta in 0.0f64..0.5,
    ) {
        let weights = WeightMap::new([(NAME, name), (CONTACT, contact), ("aux", aux)]).unwrap();
        let normalized = weights.normalized();
        let boost = Boost { field: NAME.to_string(), delta };
        let adjusted = adjust_weights(&normalized, Some(&boost));
        let total: f64 = adjusted.values().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        prop_assert!(adjusted[NAME] >= normalized[NAME]);
        prop_assert!(adjusted.values().all(|w| *w >= -1e-12));
    }

    #[test]
    fn clustering_is_a_deterministic_partition(words in proptest::collection::vec("[A-C]{1,5}", 0..12)) {
        let sim = StringSimilarity::default();
        let engine = ClusteringEngine::new(ClusterThresholds::default());
        let score = |i: usize, j: usize| sim.similarity(&words[i], &words[j]);
        let first = engine.cluster(words.len(), score);
        let second = engine.cluster(words.len(), score);
        prop_assert_eq!(&first, &second);

        let mut seen = BTreeSet::new();
        for cluster in &first {
            for index in cluster.indices() {
                prop_assert!(seen.insert(index));
            }
        }
        prop_assert_eq!(seen.len(), words.len());
    }

    #[test]
    fn grouping_partitions_population(names in proptest::collection::vec(("[A-D]{1,4}", "[A-D]{2,5}"), 1..16)) {
        let records: Vec<Record> = names
            .iter()
            .enumerate()
            .map(|(i, (first, last))| {
                let source = if i % 2 == 0 { "tax" } else { "voter" };
                Individual::new(format!("r{i}"), source, Name::new(Some(first.as_str()), Some(last.as_str()))).into()
            })
            .collect();
        let population = Population::from_records(records).unwrap();
        let policy = MatchPolicy::default();
        let result = GroupBuilder::new(&policy).build(&population).unwrap();

        let mut seen = BTreeSet::new();
        for group in &result.groups {
            prop_assert!(group.contains(&group.founding_key));
            for key in &group.member_keys {
                prop_assert!(seen.insert(key.clone()));
            }
            prop_assert!(group.near_miss_keys.iter().all(|k| !group.contains(k)));
        }
        prop_assert_eq!(seen.len(), population.len());
    }
}
