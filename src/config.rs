//! Match policy: every tunable weight, threshold and cost in one place.
//!
//! All sections default to the tuned values and deserialize with
//! `#[serde(default)]`, so a JSON file only needs the keys it changes:
//!
//! ```
//! use reclink::MatchPolicy;
//!
//! let policy = MatchPolicy::from_json_str(r#"{ "group": { "true_match": 0.9 } }"#)
//!     .unwrap()
//!     .validate()
//!     .unwrap();
//! assert!((policy.group.true_match - 0.9).abs() < 1e-12);
//! assert!((policy.group.near_match - 0.70).abs() < 1e-12);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterThresholds;
use crate::compare::{AddressPolicy, BoostPolicy, ContactPolicy, NamePolicy, WeightMap, AUX, CONTACT, NAME};
use crate::error::ValidationError;
use crate::group::{GroupThresholds, WorkerConfig};
use crate::record::RecordKind;
use crate::similarity::SubstitutionCosts;

/// Base weight maps per record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordWeights {
    /// Used when an individual is on the left.
    pub individual: WeightMap,
    /// Used when a household is on the left.
    pub household: WeightMap,
    /// Used when an organization is on the left.
    pub organization: WeightMap,
}

impl Default for RecordWeights {
    fn default() -> Self {
        Self {
            individual: WeightMap::from_defaults(&[(NAME, 0.45), (CONTACT, 0.45), (AUX, 0.10)]),
            household: WeightMap::from_defaults(&[(NAME, 0.35), (CONTACT, 0.55), (AUX, 0.10)]),
            organization: WeightMap::from_defaults(&[(NAME, 0.50), (CONTACT, 0.40), (AUX, 0.10)]),
        }
    }
}

impl RecordWeights {
    /// Weight map used when a record of `kind` is on the left of a comparison.
    #[must_use]
    pub const fn for_kind(&self, kind: RecordKind) -> &WeightMap {
        match kind {
            RecordKind::Individual => &self.individual,
            RecordKind::Household => &self.household,
            RecordKind::Organization => &self.organization,
        }
    }
}

/// Aggregate configuration for comparison, registry building and grouping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Edit costs for string similarity.
    pub similarity: SubstitutionCosts,
    /// Primary-field boost rules.
    pub boost: BoostPolicy,
    /// Address comparator settings.
    pub address: AddressPolicy,
    /// Contact bundle comparator settings.
    pub contact: ContactPolicy,
    /// Name comparator settings.
    pub name: NamePolicy,
    /// Field weights per record kind.
    pub weights: RecordWeights,
    /// Registry clustering thresholds.
    pub cluster: ClusterThresholds,
    /// Group membership thresholds.
    pub group: GroupThresholds,
    /// Scan pool sizing.
    pub workers: WorkerConfig,
}

impl MatchPolicy {
    /// Parses a policy from JSON. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns `ValidationError::Config` if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::Config {
            message: e.to_string(),
        })
    }

    /// Reads and parses a JSON policy file.
    ///
    /// # Errors
    /// Returns `ValidationError::Config` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ValidationError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&text)
    }

    /// Checks ranges and threshold ordering.
    ///
    /// # Errors
    /// Returns the first violation found.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let costs = &self.similarity;
        for (field, value) in [
            ("similarity.vowel_vowel", costs.vowel_vowel),
            ("similarity.vowel_consonant", costs.vowel_consonant),
            ("similarity.consonant_consonant", costs.consonant_consonant),
            ("similarity.insert_delete", costs.insert_delete),
        ] {
            positive(field, value)?;
        }

        for (field, value) in [
            ("boost.full_match_delta", self.boost.full_match_delta),
            ("boost.near_match_delta", self.boost.near_match_delta),
            ("boost.near_match_floor", self.boost.near_match_floor),
            ("address.box_mismatch_cap", self.address.box_mismatch_cap),
            ("address.postal_mismatch_factor", self.address.postal_mismatch_factor),
            ("address.postal_mismatch_penalty", self.address.postal_mismatch_penalty),
            ("address.region.same_id_floor", self.address.region.same_id_floor),
            ("address.region.different_id_cap", self.address.region.different_id_cap),
            ("contact.good_primary", self.contact.good_primary),
            ("contact.dominant_weight", self.contact.dominant_weight),
            ("name.initial_match", self.name.initial_match),
            ("cluster.homonym", self.cluster.homonym),
            ("cluster.synonym", self.cluster.synonym),
            ("group.true_match", self.group.true_match),
            ("group.near_match", self.group.near_match),
        ] {
            unit(field, value)?;
        }

        ordered("cluster.homonym", self.cluster.homonym, "cluster.synonym", self.cluster.synonym)?;
        ordered("group.true_match", self.group.true_match, "group.near_match", self.group.near_match)?;
        ordered(
            "boost.full_match_delta",
            self.boost.full_match_delta,
            "boost.near_match_delta",
            self.boost.near_match_delta,
        )?;

        self.weights.individual.validate("weights.individual")?;
        self.weights.household.validate("weights.household")?;
        self.weights.organization.validate("weights.organization")?;

        #[allow(clippy::cast_precision_loss)]
        {
            if self.workers.workers == 0 {
                return Err(ValidationError::NotPositive {
                    field: "workers.workers".to_string(),
                    value: self.workers.workers as f64,
                });
            }
            if self.workers.queue_capacity == 0 {
                return Err(ValidationError::NotPositive {
                    field: "workers.queue_capacity".to_string(),
                    value: self.workers.queue_capacity as f64,
                });
            }
        }

        Ok(self)
    }
}

fn unit(field: &str, value: f64) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::OutOfUnitRange {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::NotPositive {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn ordered(upper: &str, upper_value: f64, lower: &str, lower_value: f64) -> Result<(), ValidationError> {
    if upper_value < lower_value {
        return Err(ValidationError::ThresholdOrder {
            upper: upper.to_string(),
            upper_value,
            lower: lower.to_string(),
            lower_value,
        });
    }
    Ok(())
}
