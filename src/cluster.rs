//! Union-find clustering of near-duplicate textual variants.
//!
//! Items whose pairwise score reaches the homonym threshold are joined, and
//! joins are transitive. Each resulting cluster elects the member most similar
//! on average to the others as its representative; the rest are bucketed by
//! their score against that representative.

use serde::{Deserialize, Serialize};

use crate::term::TermCategory;

/// Score thresholds for joining and bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterThresholds {
    /// Pairs at or above this are joined and bucketed as homonyms.
    pub homonym: f64,
    /// Members at or above this (but below `homonym`) are synonyms.
    pub synonym: f64,
}

impl Default for ClusterThresholds {
    fn default() -> Self {
        Self {
            homonym: 0.85,
            synonym: 0.70,
        }
    }
}

impl ClusterThresholds {
    /// Bucket for a score against the representative.
    #[must_use]
    pub fn categorize(&self, score: f64) -> TermCategory {
        if score >= self.homonym {
            TermCategory::Homonym
        } else if score >= self.synonym {
            TermCategory::Synonym
        } else {
            TermCategory::Candidate
        }
    }
}

/// A non-representative member of a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterMember {
    /// Index of the item in the clustered input.
    pub index: usize,
    /// Score against the representative.
    pub score: f64,
    /// Bucket chosen from `score`.
    pub category: TermCategory,
}

/// One cluster of item indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Index of the elected representative.
    pub representative: usize,
    /// Remaining members in index order.
    pub members: Vec<ClusterMember>,
}

impl Cluster {
    /// All indices of the cluster, representative first.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        std::iter::once(self.representative)
            .chain(self.members.iter().map(|m| m.index))
            .collect()
    }

    /// Number of items, representative included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len() + 1
    }

    /// Always false; a cluster has at least its representative.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Joins near-duplicate items into clusters and elects a representative for each.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusteringEngine {
    thresholds: ClusterThresholds,
}

impl ClusteringEngine {
    /// Creates an engine with the given thresholds.
    #[must_use]
    pub const fn new(thresholds: ClusterThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn thresholds(&self) -> &ClusterThresholds {
        &self.thresholds
    }

    /// Clusters `n` items given a symmetric pairwise score function.
    ///
    /// Clusters are returned ordered by their lowest member index, so the
    /// partition is deterministic for a given input order.
    pub fn cluster<F>(&self, n: usize, score: F) -> Vec<Cluster>
    where
        F: Fn(usize, usize) -> f64,
    {
        self.cluster_pairs(n, (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j))), score)
    }

    /// Clusters `n` items, considering only `pairs` for joining.
    ///
    /// Pairs left out are treated as scoring below the homonym threshold.
    /// Scores are not retained: representative election rescores pairs
    /// inside each cluster, so memory stays linear in `n`.
    pub fn cluster_pairs<P, F>(&self, n: usize, pairs: P, score: F) -> Vec<Cluster>
    where
        P: IntoIterator<Item = (usize, usize)>,
        F: Fn(usize, usize) -> f64,
    {
        if n == 0 {
            return Vec::new();
        }
        let score = |i: usize, j: usize| {
            if i == j {
                1.0
            } else {
                score(i.min(j), i.max(j)).clamp(0.0, 1.0)
            }
        };

        let mut parent: Vec<usize> = (0..n).collect();
        for (i, j) in pairs {
            if i == j || i >= n || j >= n || find(&mut parent, i) == find(&mut parent, j) {
                continue;
            }
            if score(i, j) >= self.thresholds.homonym {
                union(&mut parent, i, j);
            }
        }

        // Collect members per root; roots are visited in first-index order.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
        for i in 0..n {
            let root = find(&mut parent, i);
            match slot_of_root[root] {
                Some(slot) => groups[slot].push(i),
                None => {
                    slot_of_root[root] = Some(groups.len());
                    groups.push(vec![i]);
                }
            }
        }

        groups
            .into_iter()
            .map(|indices| self.elect(&indices, &score))
            .collect()
    }

    fn elect(&self, indices: &[usize], score: &impl Fn(usize, usize) -> f64) -> Cluster {
        let k = indices.len();
        let mut local = vec![1.0_f64; k * k];
        for a in 0..k {
            for b in (a + 1)..k {
                let s = score(indices[a], indices[b]);
                local[a * k + b] = s;
                local[b * k + a] = s;
            }
        }

        let mut rep = 0;
        if k > 2 {
            let mut best = f64::MIN;
            for a in 0..k {
                let total: f64 = (0..k).filter(|&b| b != a).map(|b| local[a * k + b]).sum();
                // strict comparison keeps the lowest index on ties
                if total > best + 1e-12 {
                    best = total;
                    rep = a;
                }
            }
        }

        let members = (0..k)
            .filter(|&b| b != rep)
            .map(|b| {
                let score = local[rep * k + b];
                ClusterMember {
                    index: indices[b],
                    score,
                    category: self.thresholds.categorize(score),
                }
            })
            .collect();

        Cluster {
            representative: indices[rep],
            members,
        }
    }
}

fn find(parent: &mut [usize], i: usize) -> usize {
    if parent[i] != i {
        parent[i] = find(parent, parent[i]);
    }
    parent[i]
}

fn union(parent: &mut [usize], i: usize, j: usize) {
    let pi = find(parent, i);
    let pj = find(parent, j);
    if pi != pj {
        let (low, high) = if pi < pj { (pi, pj) } else { (pj, pi) };
        parent[high] = low;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::StringSimilarity;

    fn cluster_strings(items: &[&str]) -> Vec<Cluster> {
        let sim = StringSimilarity::default();
        ClusteringEngine::default().cluster(items.len(), |i, j| sim.similarity(items[i], items[j]))
    }

    #[test]
    fn test_homonyms_join() {
        let clusters = cluster_strings(&["JOHN SMITH", "JON SMITH", "JANE DOE"]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].representative, 0);
        assert_eq!(clusters[0].members.len(), 1);
        assert_eq!(clusters[0].members[0].index, 1);
        assert_eq!(clusters[0].members[0].category, TermCategory::Homonym);
        assert_eq!(clusters[1].indices(), vec![2]);
    }

    #[test]
    fn test_transitive_union() {
        // a~b and b~c join even though a and c are far apart
        let scores = [[1.0, 0.9, 0.2], [0.9, 1.0, 0.9], [0.2, 0.9, 1.0]];
        let clusters = ClusteringEngine::default().cluster(3, |i, j| scores[i][j]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].representative, 1);
        assert!(clusters[0].members.iter().all(|m| m.category == TermCategory::Homonym));
    }

    #[test]
    fn test_members_bucketed_against_representative() {
        let scores = [[1.0, 0.9, 0.75, 0.1], [0.9, 1.0, 0.86, 0.1], [0.75, 0.86, 1.0, 0.1], [0.1, 0.1, 0.1, 1.0]];
        let clusters = ClusteringEngine::default().cluster(4, |i, j| scores[i][j]);
        assert_eq!(clusters.len(), 2);
        let first = &clusters[0];
        assert_eq!(first.representative, 1);
        let categories: Vec<_> = first.members.iter().map(|m| (m.index, m.category)).collect();
        assert_eq!(categories, vec![(0, TermCategory::Homonym), (2, TermCategory::Homonym)]);

        let scores = [[1.0, 0.9, 0.75], [0.9, 1.0, 0.2], [0.75, 0.2, 1.0]];
        let clusters = ClusteringEngine::new(ClusterThresholds { homonym: 0.7, synonym: 0.5 })
            .cluster(3, |i, j| scores[i][j]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].representative, 0);
    }

    #[test]
    fn test_tie_prefers_lowest_index() {
        let clusters = ClusteringEngine::default().cluster(2, |_, _| 0.9);
        assert_eq!(clusters[0].representative, 0);
    }

    #[test]
    fn test_synonym_and_candidate_buckets() {
        let t = ClusterThresholds::default();
        assert_eq!(t.categorize(0.85), TermCategory::Homonym);
        assert_eq!(t.categorize(0.70), TermCategory::Synonym);
        assert_eq!(t.categorize(0.69), TermCategory::Candidate);
    }

    #[test]
    fn test_pairs_restrict_joins() {
        let scores = [[1.0, 0.9, 0.9], [0.9, 1.0, 0.9], [0.9, 0.9, 1.0]];
        let clusters = ClusteringEngine::default().cluster_pairs(3, [(2, 1)], |i, j| scores[i][j]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].indices(), vec![0]);
        assert_eq!(clusters[1].representative, 1);
        assert_eq!(clusters[1].members[0].index, 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(ClusteringEngine::default().cluster(0, |_, _| 1.0).is_empty());
    }
}
