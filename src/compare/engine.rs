//! Weighted comparison with conditional boosting.
//!
//! The engine scores each named sub-field, optionally boosts one of the two
//! primary fields when it matches clearly better than the other, and
//! normalizes over the fields that were present on both sides.
//!
//! Boosting exists so that a perfect name match (or a perfect contact match)
//! is not drowned out by a weak score in the other primary field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Comparable, CompareContext, FieldSet, CONTACT, NAME};
use crate::error::{CompareError, ValidationError};

const PERFECT: f64 = 1.0 - 1e-9;

/// Base weights per field name.
///
/// Weights need not sum to 1.0; the engine works on the normalized map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightMap(BTreeMap<String, f64>);

impl WeightMap {
    /// Creates a weight map from `(field, weight)` pairs.
    ///
    /// # Errors
    /// Returns an error if a weight is negative or non-finite, or if no weight is positive.
    pub fn new<I, K>(weights: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let map = Self(weights.into_iter().map(|(k, w)| (k.into(), w)).collect());
        map.validate("weights")?;
        Ok(map)
    }

    /// Builds a map from known-good constants without validation.
    pub(crate) fn from_defaults(pairs: &[(&str, f64)]) -> Self {
        Self(pairs.iter().map(|&(k, w)| (k.to_string(), w)).collect())
    }

    /// Checks weights are finite, non-negative and not all zero.
    ///
    /// # Errors
    /// See [`Self::new`].
    pub fn validate(&self, name: &str) -> Result<(), ValidationError> {
        for (field, &weight) in &self.0 {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ValidationError::NotPositive {
                    field: format!("{name}.{field}"),
                    value: weight,
                });
            }
        }
        if self.total() <= 0.0 {
            return Err(ValidationError::EmptyWeightMap {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Sum of all base weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Base weight of a field (0.0 if absent).
    #[must_use]
    pub fn get(&self, field: &str) -> f64 {
        self.0.get(field).copied().unwrap_or(0.0)
    }

    /// Weights scaled to sum to 1.0.
    #[must_use]
    pub fn normalized(&self) -> BTreeMap<String, f64> {
        let total = self.total();
        if total <= 0.0 {
            return BTreeMap::new();
        }
        self.0.iter().map(|(k, w)| (k.clone(), w / total)).collect()
    }
}

/// When and by how much a primary field's weight is boosted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostPolicy {
    /// The two fields competing for a boost.
    pub primary_fields: [String; 2],
    /// Boost when exactly one primary field scores 1.0.
    pub full_match_delta: f64,
    /// Boost when exactly one primary field scores above `near_match_floor`.
    pub near_match_delta: f64,
    /// Score a field must exceed to earn the smaller boost.
    pub near_match_floor: f64,
}

impl Default for BoostPolicy {
    fn default() -> Self {
        Self {
            primary_fields: [NAME.to_string(), CONTACT.to_string()],
            full_match_delta: 0.12,
            near_match_delta: 0.06,
            near_match_floor: 0.95,
        }
    }
}

impl BoostPolicy {
    /// Picks the boost for a pair of primary-field scores.
    ///
    /// At most one boost applies. Returns `None` when both or neither field
    /// qualifies.
    #[must_use]
    pub fn select(&self, scores: &BTreeMap<String, f64>) -> Option<Boost> {
        let [first, second] = &self.primary_fields;
        let (&a, &b) = (scores.get(first)?, scores.get(second)?);

        let a_full = a >= PERFECT;
        let b_full = b >= PERFECT;
        if a_full != b_full {
            let field = if a_full { first } else { second };
            return Some(Boost {
                field: field.clone(),
                delta: self.full_match_delta,
            });
        }
        if a_full && b_full {
            return None;
        }

        let a_near = a > self.near_match_floor;
        let b_near = b > self.near_match_floor;
        if a_near != b_near {
            let field = if a_near { first } else { second };
            return Some(Boost {
                field: field.clone(),
                delta: self.near_match_delta,
            });
        }
        None
    }
}

/// A boost applied to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boost {
    /// Field whose weight grows.
    pub field: String,
    /// Weight moved onto the field from the others.
    pub delta: f64,
}

/// Applies `boost` to normalized weights, taking the delta away from every
/// other field in proportion to its share. The total is conserved.
#[must_use]
pub fn adjust_weights(normalized: &BTreeMap<String, f64>, boost: Option<&Boost>) -> BTreeMap<String, f64> {
    let Some(boost) = boost else {
        return normalized.clone();
    };
    let Some(&boosted) = normalized.get(&boost.field) else {
        return normalized.clone();
    };

    let others: f64 = normalized
        .iter()
        .filter(|(k, _)| **k != boost.field)
        .map(|(_, w)| w)
        .sum();
    if others <= 0.0 {
        return normalized.clone();
    }
    let delta = boost.delta.clamp(0.0, others);

    normalized
        .iter()
        .map(|(k, &w)| {
            let adjusted = if *k == boost.field {
                boosted + delta
            } else {
                w - delta * (w / others)
            };
            (k.clone(), adjusted)
        })
        .collect()
}

/// One field's contribution to a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    /// Field name.
    pub field: String,
    /// Raw similarity of the field.
    pub raw: f64,
    /// Effective weight after boosting, before normalization.
    pub weight: f64,
}

/// Result of a weighted comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Final score in `[0, 1]`.
    pub score: f64,
    /// Per-field breakdown, in field-name order.
    pub components: Vec<ScoreComponent>,
    /// The boost applied, if any.
    pub boost: Option<Boost>,
}

impl Comparison {
    /// Human-readable explanation of the score.
    #[must_use]
    pub fn explain(&self) -> String {
        let mut parts: Vec<String> = self
            .components
            .iter()
            .map(|c| format!("{}: {:.0}% (w={:.2})", c.field, c.raw * 100.0, c.weight))
            .collect();
        if let Some(boost) = &self.boost {
            parts.push(format!("boost {} +{:.2}", boost.field, boost.delta));
        }
        parts.join("; ")
    }
}

/// Applies a weight map and boost policy to two field sets.
#[derive(Debug, Clone, Copy)]
pub struct WeightedComparisonEngine<'a> {
    weights: &'a WeightMap,
    boost: &'a BoostPolicy,
}

impl<'a> WeightedComparisonEngine<'a> {
    /// Creates an engine over borrowed policy values.
    #[must_use]
    pub const fn new(weights: &'a WeightMap, boost: &'a BoostPolicy) -> Self {
        Self { weights, boost }
    }

    /// Compares two field sets.
    ///
    /// Fields missing on either side, or without comparable data, are skipped.
    /// Returns `Ok(None)` when no weighted field could be scored.
    ///
    /// # Errors
    /// `CompareError::TypeMismatch` if a shared field name holds incompatible kinds.
    pub fn compare(
        &self,
        left: &FieldSet,
        right: &FieldSet,
        ctx: &CompareContext<'_>,
    ) -> Result<Option<Comparison>, CompareError> {
        let mut raw = BTreeMap::new();
        for (name, field) in left.iter() {
            if self.weights.get(name) <= 0.0 {
                continue;
            }
            let Some(other) = right.get(name) else {
                continue;
            };
            if let Some(score) = field.compare(other, ctx)? {
                raw.insert(name.to_string(), score.clamp(0.0, 1.0));
            }
        }
        Ok(self.combine(&raw))
    }

    /// Combines already-computed raw field scores into a final score.
    #[must_use]
    pub fn combine(&self, raw: &BTreeMap<String, f64>) -> Option<Comparison> {
        let normalized = self.weights.normalized();
        let boost = self.boost.select(raw);
        let adjusted = adjust_weights(&normalized, boost.as_ref());

        let mut weighted = 0.0;
        let mut used = 0.0;
        let mut components = Vec::with_capacity(raw.len());
        for (field, &score) in raw {
            let weight = adjusted.get(field).copied().unwrap_or(0.0);
            if weight <= 0.0 {
                continue;
            }
            weighted += weight * score;
            used += weight;
            components.push(ScoreComponent {
                field: field.clone(),
                raw: score,
                weight,
            });
        }
        if used <= 0.0 {
            return None;
        }

        Some(Comparison {
            score: (weighted / used).clamp(0.0, 1.0),
            components,
            boost,
        })
    }
}
