//! Structured person names.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Comparable, CompareContext};
use crate::error::CompareError;
use crate::similarity::normalize;

/// Weights and rules for name comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamePolicy {
    /// Weight of the last name.
    pub last_weight: f64,
    /// Weight of the first name.
    pub first_weight: f64,
    /// Weight of the remaining name parts.
    pub other_weight: f64,
    /// Score for a bare initial matching the other side's first letter.
    pub initial_match: f64,
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self {
            last_weight: 0.5,
            first_weight: 0.4,
            other_weight: 0.1,
            initial_match: 0.75,
        }
    }
}

/// A person name already split into its parts by the upstream parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    /// Given name or initial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
    /// Middle names, suffixes and anything else the parser kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
}

impl Name {
    /// Creates a name from first and last parts.
    #[must_use]
    pub fn new(first: Option<&str>, last: Option<&str>) -> Self {
        Self {
            first: first.map(str::to_string),
            last: last.map(str::to_string),
            other: None,
        }
    }

    /// Returns a copy with the `other` part set.
    #[must_use]
    pub fn with_other(mut self, other: &str) -> Self {
        self.other = Some(other.to_string());
        self
    }

    /// True when no part carries text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.first, &self.last, &self.other]
            .into_iter()
            .all(|part| present(part.as_deref()).is_none())
    }

    /// Normalized parts, with blanks dropped.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            first: present(self.first.as_deref()),
            last: present(self.last.as_deref()),
            other: present(self.other.as_deref()),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.first, &self.other, &self.last]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect();
        f.write_str(&parts.join(" "))
    }
}

fn present(part: Option<&str>) -> Option<String> {
    part.map(normalize).filter(|p| !p.is_empty())
}

/// Score for one name part, or `None` when both sides lack it.
fn part_score(
    a: Option<&str>,
    b: Option<&str>,
    ctx: &CompareContext<'_>,
    score: impl Fn(&str, &str) -> f64,
) -> Option<f64> {
    match (present(a), present(b)) {
        (None, None) => None,
        (Some(_), None) | (None, Some(_)) => Some(0.0),
        (Some(a), Some(b)) => {
            if a == b {
                return Some(1.0);
            }
            if let Some(directory) = ctx.directory() {
                if let (Some(ka), Some(kb)) = (directory.canonical_key(&a), directory.canonical_key(&b)) {
                    if ka == kb {
                        return Some(1.0);
                    }
                }
            }
            Some(score(&a, &b))
        }
    }
}

impl Comparable for Name {
    fn compare(&self, other: &Self, ctx: &CompareContext<'_>) -> Result<Option<f64>, CompareError> {
        let policy = &ctx.policy().name;
        let sim = ctx.similarity();

        let first = part_score(self.first.as_deref(), other.first.as_deref(), ctx, |a, b| {
            let (short, long) = if a.chars().count() <= b.chars().count() { (a, b) } else { (b, a) };
            if short.chars().count() == 1 && long.starts_with(short) {
                policy.initial_match
            } else {
                sim.similarity_normalized(a, b)
            }
        });
        let last = part_score(self.last.as_deref(), other.last.as_deref(), ctx, |a, b| {
            sim.similarity_normalized(a, b)
        });
        let rest = part_score(self.other.as_deref(), other.other.as_deref(), ctx, |a, b| {
            sim.similarity_normalized(a, b)
        });

        let mut weighted = 0.0;
        let mut used = 0.0;
        for (score, weight) in [
            (last, policy.last_weight),
            (first, policy.first_weight),
            (rest, policy.other_weight),
        ] {
            if let Some(score) = score {
                weighted += weight * score;
                used += weight;
            }
        }
        if used <= 0.0 {
            return Ok(None);
        }
        Ok(Some((weighted / used).clamp(0.0, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::NameDirectory;
    use crate::config::MatchPolicy;

    fn score(a: &Name, b: &Name) -> Option<f64> {
        let policy = MatchPolicy::default();
        a.compare(b, &CompareContext::new(&policy)).unwrap()
    }

    #[test]
    fn test_identical_names() {
        let a = Name::new(Some("John"), Some("Smith"));
        assert_eq!(score(&a, &a.clone()), Some(1.0));
    }

    #[test]
    fn test_absent_on_both_sides_is_excluded() {
        let a = Name::new(None, Some("SMITH"));
        let b = Name::new(None, Some("smith"));
        assert_eq!(score(&a, &b), Some(1.0));
    }

    #[test]
    fn test_absent_on_one_side_counts_as_mismatch() {
        let a = Name::new(Some("JOHN"), Some("SMITH"));
        let b = Name::new(None, Some("SMITH"));
        let s = score(&a, &b).unwrap();
        assert!((s - 0.5 / 0.9).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn test_empty_names_not_comparable() {
        assert_eq!(score(&Name::default(), &Name::new(Some(" "), None)), None);
    }

    #[test]
    fn test_initial_matches_first_name() {
        let a = Name::new(Some("J"), Some("SMITH"));
        let b = Name::new(Some("JOHN"), Some("SMITH"));
        let s = score(&a, &b).unwrap();
        assert!((s - (0.5 + 0.4 * 0.75) / 0.9).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn test_other_part_weighs_little() {
        let a = Name::new(Some("JOHN"), Some("SMITH")).with_other("Q");
        let b = Name::new(Some("JOHN"), Some("SMITH")).with_other("R");
        let s = score(&a, &b).unwrap();
        assert!((s - 0.9).abs() < 1e-9);
    }

    struct Nicknames;

    impl NameDirectory for Nicknames {
        fn canonical_key(&self, term: &str) -> Option<String> {
            match term {
                "bill" | "william" | "will" => Some("william".to_string()),
                _ => None,
            }
        }
    }

    #[test]
    fn test_directory_resolves_nicknames() {
        let policy = MatchPolicy::default();
        let directory = Nicknames;
        let ctx = CompareContext::new(&policy).with_directory(&directory);
        let a = Name::new(Some("Bill"), Some("Clark"));
        let b = Name::new(Some("William"), Some("Clark"));
        assert_eq!(a.compare(&b, &ctx).unwrap(), Some(1.0));

        let plain = CompareContext::new(&policy);
        assert!(a.compare(&b, &plain).unwrap().unwrap() < 1.0);
    }

    #[test]
    fn test_display() {
        let name = Name::new(Some("John"), Some("Smith")).with_other("Q");
        assert_eq!(name.to_string(), "John Q Smith");
    }
}
