//! Random-rollout statistics about the shape of a tree.
//!
//! Search budgets are split across depths using an estimate of how deep the
//! tree is. The sampler performs cheap uniform rollouts from the root and
//! records the depth at which each one stopped and the branching factor met
//! at every depth on the way down.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::node::TreeNode;

/// Summary statistics over a sample of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
}

impl ShapeSummary {
    /// Summarise a non-empty sample. Mean, median and extrema are rounded to
    /// one decimal, the standard deviation (population) to two.
    ///
    /// Returns `None` for an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = sorted.iter().sum::<f64>() / n;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            min: round_to(sorted[0], 1),
            max: round_to(sorted[sorted.len() - 1], 1),
            mean: round_to(mean, 1),
            median: round_to(median, 1),
            std: round_to(variance.sqrt(), 2),
        })
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Accumulates depth and branching-factor samples over random rollouts.
///
/// The root sits at depth 1.
#[derive(Debug, Clone)]
pub struct TreeSampler<N> {
    root: N,
    depths: Vec<usize>,
    branching_factors: BTreeMap<usize, Vec<usize>>,
    elapsed: Duration,
}

impl<N: TreeNode> TreeSampler<N> {
    pub fn new(root: N) -> Self {
        Self {
            root,
            depths: Vec::new(),
            branching_factors: BTreeMap::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Discard previous samples and perform `nb_samples` rollouts.
    pub fn accumulate_stats<R: Rng + ?Sized>(&mut self, nb_samples: usize, rng: &mut R) {
        let start = Instant::now();
        self.depths.clear();
        self.branching_factors.clear();

        for _ in 0..nb_samples {
            self.single_tree_walk(rng);
        }

        self.elapsed = start.elapsed();
        debug!(
            samples = nb_samples,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Tree shape sampled"
        );
    }

    /// One rollout from the root. A dead end stops the walk at its depth.
    pub fn single_tree_walk<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut node = self.root.clone();
        let mut depth = 1;

        while !node.is_terminal() {
            let children = node.children();
            self.branching_factors
                .entry(depth)
                .or_default()
                .push(children.len());

            match children.choose(rng) {
                Some(child) => node = child.clone(),
                None => break,
            }
            depth += 1;
        }

        self.depths.push(depth);
    }

    /// Number of rollouts recorded so far.
    #[inline]
    pub fn nb_samples(&self) -> usize {
        self.depths.len()
    }

    /// Time spent in the last [`accumulate_stats`](Self::accumulate_stats).
    #[inline]
    pub fn time_spent(&self) -> Duration {
        self.elapsed
    }

    /// Depth statistics over the recorded rollouts.
    ///
    /// # Panics
    /// Panics if no rollout was recorded yet.
    pub fn depths_info(&self) -> ShapeSummary {
        let depths: Vec<f64> = self.depths.iter().map(|&d| d as f64).collect();
        ShapeSummary::from_values(&depths)
            .unwrap_or_else(|| panic!("depth statistics requested before sampling the tree"))
    }

    /// Statistics over the mean branching factor of each depth.
    ///
    /// # Panics
    /// Panics if no rollout was recorded yet.
    pub fn branching_factors_info(&self) -> ShapeSummary {
        assert!(
            !self.depths.is_empty(),
            "branching statistics requested before sampling the tree"
        );
        let per_depth: Vec<f64> = self
            .branching_factors
            .values()
            .map(|factors| factors.iter().sum::<usize>() as f64 / factors.len() as f64)
            .collect();
        // A root that is already terminal has no branching samples.
        ShapeSummary::from_values(&per_depth).unwrap_or(ShapeSummary {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            median: 0.0,
            std: 0.0,
        })
    }

    /// Mean rollout depth truncated to an integer, never below 1.
    pub fn mean_depth(&self) -> usize {
        (self.depths_info().mean as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::test_tree::BitString;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_summary_of_values() {
        let summary = ShapeSummary::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((summary.min - 1.0).abs() < 1e-9);
        assert!((summary.max - 4.0).abs() < 1e-9);
        assert!((summary.mean - 2.5).abs() < 1e-9);
        assert!((summary.median - 2.5).abs() < 1e-9);
        // population std of 1..4 = sqrt(1.25) = 1.118
        assert!((summary.std - 1.12).abs() < 1e-9);
    }

    #[test]
    fn test_summary_of_empty_sample() {
        assert!(ShapeSummary::from_values(&[]).is_none());
    }

    #[test]
    fn test_fixed_depth_tree() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        // Prefix "1" never hits the "00" dead end: every rollout has 4 more levels.
        let root = BitString {
            bits: "1".into(),
            length: 5,
        };
        let mut sampler = TreeSampler::new(root);
        sampler.accumulate_stats(25, &mut rng);

        assert_eq!(sampler.nb_samples(), 25);
        let depths = sampler.depths_info();
        assert!((depths.mean - 5.0).abs() < 1e-9);
        assert!((depths.std).abs() < 1e-9);
        assert_eq!(sampler.mean_depth(), 5);

        let branching = sampler.branching_factors_info();
        assert!((branching.mean - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_dead_end_stops_walk() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let root = BitString {
            bits: "00".into(),
            length: 5,
        };
        let mut sampler = TreeSampler::new(root);
        sampler.accumulate_stats(3, &mut rng);

        let depths = sampler.depths_info();
        assert!((depths.max - 1.0).abs() < 1e-9);
        let branching = sampler.branching_factors_info();
        assert!((branching.mean).abs() < 1e-9);
    }

    #[test]
    fn test_resampling_discards_previous_samples() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut sampler = TreeSampler::new(BitString::root(3));
        sampler.accumulate_stats(10, &mut rng);
        sampler.accumulate_stats(4, &mut rng);
        assert_eq!(sampler.nb_samples(), 4);
    }

    #[test]
    #[should_panic(expected = "before sampling")]
    fn test_info_before_sampling_panics() {
        let sampler = TreeSampler::new(BitString::root(3));
        let _ = sampler.depths_info();
    }
}
