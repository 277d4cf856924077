//! Summary of a finished search.

use std::time::Duration;

use tracing::info;
use tree_core::TreeNode;

use crate::evaluator::{Evaluator, Scorer};

/// What the last search cost and found.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    /// Leaf values served by the evaluator, memo hits included.
    pub evaluations: usize,

    /// Share of served values that were for an already-served leaf.
    pub duplicate_share: f64,

    pub elapsed: Duration,

    /// Share of `elapsed` spent inside the scorer.
    pub scoring_share: f64,

    pub best_leaf: Option<String>,
    pub best_value: Option<f64>,
}

impl SearchReport {
    pub fn from_evaluator<N: TreeNode, S: Scorer>(
        evaluator: &Evaluator<N, S>,
        elapsed: Duration,
    ) -> Self {
        let evaluations = evaluator.history().len();
        let distinct = evaluator
            .history()
            .iter()
            .map(|(leaf, _)| leaf)
            .collect::<std::collections::HashSet<_>>()
            .len();

        let duplicate_share = if evaluations == 0 {
            0.0
        } else {
            1.0 - distinct as f64 / evaluations as f64
        };
        let scoring_share = if elapsed.is_zero() {
            0.0
        } else {
            (evaluator.time_spent().as_secs_f64() / elapsed.as_secs_f64()).min(1.0)
        };
        let best = evaluator.best_result();

        Self {
            evaluations,
            duplicate_share,
            elapsed,
            scoring_share,
            best_leaf: best.map(|(leaf, _)| leaf.identity()),
            best_value: best.map(|(_, value)| value),
        }
    }

    pub fn log_report(&self) {
        info!(
            evaluations = self.evaluations,
            duplicate_pct = %format!("{:.1}", self.duplicate_share * 100.0),
            elapsed_ms = self.elapsed.as_millis() as u64,
            scoring_pct = %format!("{:.1}", self.scoring_share * 100.0),
            best_value = ?self.best_value,
            best_leaf = self.best_leaf.as_deref().unwrap_or("-"),
            "Search finished"
        );
    }
}
