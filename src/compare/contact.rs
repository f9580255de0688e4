//! Contact bundles: a primary address, secondary addresses and an email.

use serde::{Deserialize, Serialize};

use super::{Address, Comparable, CompareContext};
use crate::error::CompareError;
use crate::similarity::{normalize, StringSimilarity};

/// Channel weights and the perfect-match override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactPolicy {
    /// Weight of the primary-to-primary address score.
    pub primary_weight: f64,
    /// Weight of the best cross pair involving a secondary address.
    pub secondary_weight: f64,
    /// Weight of the email score.
    pub email_weight: f64,
    /// Primary scores below this enable the secondary cross-pair channel.
    pub good_primary: f64,
    /// Weight given to a channel that matches perfectly.
    pub dominant_weight: f64,
}

impl Default for ContactPolicy {
    fn default() -> Self {
        Self {
            primary_weight: 0.6,
            secondary_weight: 0.2,
            email_weight: 0.2,
            good_primary: 0.85,
            dominant_weight: 0.9,
        }
    }
}

/// Address and email information of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactBundle {
    /// Main mailing or residence address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<Address>,
    /// Other known addresses.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<Address>,
    /// Email address, compared case-insensitively.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ContactBundle {
    /// A bundle with only a primary address.
    #[must_use]
    pub fn with_primary(address: Address) -> Self {
        Self {
            primary: Some(address),
            ..Self::default()
        }
    }

    /// Returns a copy with an email set.
    #[must_use]
    pub fn and_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Returns a copy with one more secondary address.
    #[must_use]
    pub fn and_secondary(mut self, address: Address) -> Self {
        self.secondary.push(address);
        self
    }

    /// Normalized email, if one is present.
    #[must_use]
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(normalize)
            .filter(|e| !e.is_empty())
    }

    fn addresses(&self) -> impl Iterator<Item = (bool, &Address)> {
        self.primary
            .iter()
            .map(|a| (true, a))
            .chain(self.secondary.iter().map(|a| (false, a)))
    }
}

fn email_score(a: &str, b: &str, sim: &StringSimilarity) -> f64 {
    if a == b {
        return 1.0;
    }
    match (a.rsplit_once('@'), b.rsplit_once('@')) {
        (Some((local_a, domain_a)), Some((local_b, domain_b))) if domain_a == domain_b => {
            sim.similarity_normalized(local_a, local_b)
        }
        _ => 0.0,
    }
}

impl Comparable for ContactBundle {
    fn compare(&self, other: &Self, ctx: &CompareContext<'_>) -> Result<Option<f64>, CompareError> {
        let policy = &ctx.policy().contact;

        let primary = match (&self.primary, &other.primary) {
            (Some(a), Some(b)) => a.compare(b, ctx)?,
            _ => None,
        };

        let mut secondary: Option<f64> = None;
        if primary.map_or(true, |p| p < policy.good_primary) {
            for (a_primary, a) in self.addresses() {
                for (b_primary, b) in other.addresses() {
                    if a_primary && b_primary {
                        continue;
                    }
                    if let Some(score) = a.compare(b, ctx)? {
                        secondary = Some(secondary.map_or(score, |s| s.max(score)));
                    }
                }
            }
        }

        let email = match (self.normalized_email(), other.normalized_email()) {
            (Some(a), Some(b)) => Some(email_score(&a, &b, ctx.similarity())),
            _ => None,
        };

        let channels: Vec<(f64, f64)> = [
            (policy.primary_weight, primary),
            (policy.secondary_weight, secondary),
            (policy.email_weight, email),
        ]
        .into_iter()
        .filter_map(|(weight, score)| score.map(|s| (weight, s)))
        .collect();

        if channels.is_empty() {
            return Ok(None);
        }

        let perfect = channels.iter().position(|&(_, score)| score >= 1.0);
        let score = match perfect {
            Some(dominant) if channels.len() > 1 => {
                let rest: f64 = channels
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != dominant)
                    .map(|(_, &(weight, _))| weight)
                    .sum();
                let share = 1.0 - policy.dominant_weight;
                let mut total = policy.dominant_weight * channels[dominant].1;
                for (i, &(weight, score)) in channels.iter().enumerate() {
                    if i != dominant && rest > 0.0 {
                        total += share * weight / rest * score;
                    }
                }
                total
            }
            _ => {
                let used: f64 = channels.iter().map(|&(w, _)| w).sum();
                if used <= 0.0 {
                    return Ok(None);
                }
                channels.iter().map(|&(w, s)| w * s).sum::<f64>() / used
            }
        };
        Ok(Some(score.clamp(0.0, 1.0)))
    }
}
