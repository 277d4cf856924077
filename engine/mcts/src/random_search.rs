//! Random sampling baseline.
//!
//! Rolls out independently from the root and keeps the best leaf. Leaves are
//! still scored in batches of `buffer_size` and memo hits are free, but there
//! is no other optimisation.

use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;
use tree_core::{rollout, TreeNode};

use crate::evaluator::{Evaluator, Scorer};
use crate::report::SearchReport;
use crate::search::{SearchError, SearchResult, TreeSearch};

pub struct RandomSearch<N: TreeNode, S: Scorer> {
    evaluator: Evaluator<N, S>,
    buffer_size: usize,
    seed: Option<u64>,
    rng: ChaCha20Rng,
    path: Option<Vec<N>>,
    report: Option<SearchReport>,
}

impl<N: TreeNode, S: Scorer> RandomSearch<N, S> {
    /// # Panics
    /// Panics if `buffer_size` is 0.
    pub fn new(evaluator: Evaluator<N, S>, buffer_size: usize, seed: Option<u64>) -> Self {
        assert!(buffer_size >= 1, "buffer_size must be at least 1");
        let rng = match seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        Self {
            evaluator,
            buffer_size,
            seed,
            rng,
            path: None,
            report: None,
        }
    }

    pub fn evaluator(&self) -> &Evaluator<N, S> {
        &self.evaluator
    }

    pub fn report(&self) -> Option<&SearchReport> {
        self.report.as_ref()
    }

    fn flush(&mut self, batch: &mut Vec<N>, best: &mut Option<(N, f64)>) -> Result<(), SearchError> {
        if batch.is_empty() {
            return Ok(());
        }
        debug!(batch_size = batch.len(), "Scoring random leaves");
        let values = self.evaluator.eval(batch)?;
        for (leaf, value) in batch.drain(..).zip(values) {
            keep_best(best, leaf, value);
        }
        Ok(())
    }
}

fn keep_best<N>(best: &mut Option<(N, f64)>, leaf: N, value: f64) {
    let improves = match best {
        Some((_, best_value)) => value > *best_value,
        None => true,
    };
    if improves {
        *best = Some((leaf, value));
    }
}

impl<N: TreeNode, S: Scorer> TreeSearch<N> for RandomSearch<N, S> {
    fn search(&mut self, root: &N, nb_of_tree_walks: usize) -> Result<SearchResult<N>, SearchError> {
        let start = Instant::now();
        self.evaluator.reset();
        if let Some(seed) = self.seed {
            self.rng = ChaCha20Rng::seed_from_u64(seed);
        }

        let mut best = None;
        let mut batch = Vec::with_capacity(self.buffer_size);
        for _ in 0..nb_of_tree_walks {
            let Some(leaf) = rollout(root, &mut self.rng) else {
                continue;
            };
            match self.evaluator.value_from_memory(&leaf) {
                Some(value) => keep_best(&mut best, leaf, value),
                None => {
                    batch.push(leaf);
                    if batch.len() >= self.buffer_size {
                        self.flush(&mut batch, &mut best)?;
                    }
                }
            }
        }
        self.flush(&mut batch, &mut best)?;

        let (leaf, value) = best.ok_or_else(|| SearchError::NoLeafReachable(root.to_string()))?;
        let mut path = vec![root.clone()];
        if &leaf != root {
            path.push(leaf.clone());
        }

        let report = SearchReport::from_evaluator(&self.evaluator, start.elapsed());
        report.log_report();
        self.report = Some(report);
        self.path = Some(path.clone());

        Ok(SearchResult {
            leaf,
            value,
            path,
            walks: nb_of_tree_walks,
        })
    }

    fn path(&self) -> &[N] {
        self.path
            .as_deref()
            .unwrap_or_else(|| panic!("search path requested before any search ran"))
    }
}
