//! Vowel-aware edit-distance similarity.
//!
//! Many real-world name variants differ only in their vowels (transliteration,
//! typos such as `JOHANSEN`/`JOHANSON`), so substituting one vowel for another
//! is cheaper than any other substitution.

use serde::{Deserialize, Serialize};

/// Edit costs used by [`StringSimilarity`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstitutionCosts {
    /// Replacing a vowel with another vowel.
    pub vowel_vowel: f64,
    /// Replacing a vowel with a consonant (or the reverse).
    pub vowel_consonant: f64,
    /// Replacing a consonant with another consonant.
    pub consonant_consonant: f64,
    /// Inserting or deleting a character.
    pub insert_delete: f64,
}

impl Default for SubstitutionCosts {
    fn default() -> Self {
        Self {
            vowel_vowel: 0.5,
            vowel_consonant: 1.0,
            consonant_consonant: 1.0,
            insert_delete: 1.0,
        }
    }
}

impl SubstitutionCosts {
    /// Cost of turning `a` into `b`. Identical characters are free.
    #[must_use]
    pub fn substitution(&self, a: char, b: char) -> f64 {
        if a == b {
            return 0.0;
        }
        match (is_vowel(a), is_vowel(b)) {
            (true, true) => self.vowel_vowel,
            (false, false) => self.consonant_consonant,
            _ => self.vowel_consonant,
        }
    }

    /// The largest single-edit cost; distances are scaled by it.
    fn max_cost(&self) -> f64 {
        self.vowel_vowel
            .max(self.vowel_consonant)
            .max(self.consonant_consonant)
            .max(self.insert_delete)
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Case-folds, trims and collapses internal whitespace.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Character-level similarity metric producing scores in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StringSimilarity {
    costs: SubstitutionCosts,
}

impl StringSimilarity {
    /// Creates a metric with custom edit costs.
    #[must_use]
    pub const fn new(costs: SubstitutionCosts) -> Self {
        Self { costs }
    }

    /// Returns the configured costs.
    #[must_use]
    pub const fn costs(&self) -> &SubstitutionCosts {
        &self.costs
    }

    /// Similarity of two strings after normalization.
    ///
    /// `1 − distance / max(len1, len2)`, clamped to `[0, 1]`. Two empty strings
    /// are a perfect match; one empty and one non-empty string never match.
    ///
    /// # Examples
    ///
    /// ```
    /// use reclink::StringSimilarity;
    ///
    /// let sim = StringSimilarity::default();
    /// assert_eq!(sim.similarity("Smith", " SMITH "), 1.0);
    /// assert!(sim.similarity("JOHANSEN", "JOHANSON") > sim.similarity("JOHANSEN", "JOHANSEK"));
    /// ```
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = normalize(a);
        let b = normalize(b);
        self.similarity_normalized(&a, &b)
    }

    /// Similarity of two strings that are already normalized.
    #[must_use]
    pub fn similarity_normalized(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let longest = a.len().max(b.len());
        let scale = self.costs.max_cost();
        if scale <= 0.0 {
            return 1.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let normalized = self.distance(&a, &b) / (longest as f64 * scale);
        (1.0 - normalized).clamp(0.0, 1.0)
    }

    /// Highest similarity two strings of these character lengths can reach.
    ///
    /// Each character of length difference needs at least one insertion.
    #[must_use]
    pub fn length_bound(&self, len_a: usize, len_b: usize) -> f64 {
        let longest = len_a.max(len_b);
        let scale = self.costs.max_cost();
        if longest == 0 || scale <= 0.0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let gap = len_a.abs_diff(len_b) as f64 / longest as f64;
        (1.0 - gap * self.costs.insert_delete / scale).clamp(0.0, 1.0)
    }

    /// Weighted Levenshtein distance using a two-row table.
    fn distance(&self, a: &[char], b: &[char]) -> f64 {
        let indel = self.costs.insert_delete;
        #[allow(clippy::cast_precision_loss)]
        let mut prev: Vec<f64> = (0..=b.len()).map(|j| j as f64 * indel).collect();
        let mut curr = vec![0.0f64; b.len() + 1];

        for (i, &ca) in a.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            {
                curr[0] = (i + 1) as f64 * indel;
            }
            for (j, &cb) in b.iter().enumerate() {
                let substitute = prev[j] + self.costs.substitution(ca, cb);
                let delete = prev[j + 1] + indel;
                let insert = curr[j] + indel;
                curr[j + 1] = substitute.min(delete).min(insert);
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        prev[b.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_and_empty() {
        let sim = StringSimilarity::default();
        assert_eq!(sim.similarity("", ""), 1.0);
        assert_eq!(sim.similarity("", "abc"), 0.0);
        assert_eq!(sim.similarity("abc", ""), 0.0);
        assert_eq!(sim.similarity("Ocean View", "ocean   view"), 1.0);
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let sim = StringSimilarity::default();
        assert_eq!(sim.similarity("   ", ""), 1.0);
        assert_eq!(sim.similarity("  ", "x"), 0.0);
    }

    #[test]
    fn test_vowel_substitution_is_cheaper() {
        let sim = StringSimilarity::default();
        let vowel = sim.similarity("SMYTHE", "SMITHE");
        let vowel_vowel = sim.similarity("JOHANSEN", "JOHANSON");
        let consonant = sim.similarity("JOHANSEN", "JOHANSEK");
        assert!(vowel_vowel > consonant, "{vowel_vowel} <= {consonant}");
        assert!(vowel < 1.0);
    }

    #[test]
    fn test_single_deletion() {
        let sim = StringSimilarity::default();
        let score = sim.similarity("JOHN SMITH", "JON SMITH");
        assert!((score - 0.9).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_completely_different_digits() {
        let sim = StringSimilarity::default();
        assert_eq!(sim.similarity("648", "247"), 1.0 - 2.0 / 3.0);
        assert_eq!(sim.similarity("123", "456"), 0.0);
    }

    #[test]
    fn test_custom_costs() {
        let sim = StringSimilarity::new(SubstitutionCosts {
            vowel_vowel: 0.1,
            ..SubstitutionCosts::default()
        });
        let score = sim.similarity("ANA", "ANE");
        assert!((score - (1.0 - 0.1 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_length_bound_caps_similarity() {
        let sim = StringSimilarity::default();
        for (a, b) in [("SMITH", "SMITHSON"), ("AL", "ALEXANDER"), ("ACME", "ACME CORP")] {
            let bound = sim.length_bound(a.chars().count(), b.chars().count());
            assert!(sim.similarity(a, b) <= bound + 1e-12, "{a} vs {b}");
        }
        assert!((sim.length_bound(4, 8) - 0.5).abs() < 1e-12);
        assert_eq!(sim.length_bound(6, 6), 1.0);
    }

    #[test]
    fn test_symmetric() {
        let sim = StringSimilarity::default();
        assert_eq!(sim.similarity("KATHERINE", "CATHRYN"), sim.similarity("CATHRYN", "KATHERINE"));
    }
}
