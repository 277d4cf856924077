//! Random restarts over a fixed walk budget.
//!
//! Several independent searches from the same root, each with its own share
//! of the budget and its own rollout seed, reduce the variance of a single
//! search. The best result across restarts is kept; a restart that reaches
//! no leaf is skipped, and the search fails only when every restart does.

use std::time::Instant;

use tracing::{debug, info, warn};
use tree_core::TreeNode;

use crate::config::MctsConfig;
use crate::evaluator::{Evaluator, Scorer};
use crate::report::SearchReport;
use crate::search::{MonteCarloTreeSearch, SearchError, SearchResult, TreeSearch};

/// Split `total` walks over `restarts` searches; the last one takes the
/// remainder.
///
/// # Panics
/// Panics if `restarts` is 0.
pub fn split_budget(total: usize, restarts: usize) -> Vec<usize> {
    assert!(restarts >= 1, "nb_random_restarts must be at least 1");
    let share = total / restarts;
    let mut budgets = vec![share; restarts];
    budgets[restarts - 1] += total % restarts;
    budgets
}

/// MCTS with `nb_random_restarts` independent searches.
pub struct RandomRestartsMCTS<N: TreeNode, S: Scorer> {
    inner: MonteCarloTreeSearch<N, S>,
    nb_random_restarts: usize,
    path: Option<Vec<N>>,
    budgets: Vec<usize>,
}

impl<N, S> RandomRestartsMCTS<N, S>
where
    N: TreeNode + 'static,
    S: Scorer + Clone + 'static,
{
    /// # Panics
    /// Panics if `config.nb_random_restarts` is 0.
    pub fn new(evaluator: Evaluator<N, S>, config: MctsConfig) -> Result<Self, SearchError> {
        assert!(
            config.nb_random_restarts >= 1,
            "nb_random_restarts must be at least 1"
        );
        let nb_random_restarts = config.nb_random_restarts;
        Ok(Self {
            inner: MonteCarloTreeSearch::new(evaluator, config)?,
            nb_random_restarts,
            path: None,
            budgets: Vec::new(),
        })
    }
}

impl<N: TreeNode, S: Scorer> RandomRestartsMCTS<N, S> {
    pub fn inner(&self) -> &MonteCarloTreeSearch<N, S> {
        &self.inner
    }

    pub fn evaluator(&self) -> &Evaluator<N, S> {
        self.inner.evaluator()
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator<N, S> {
        self.inner.evaluator_mut()
    }

    /// Walk budgets of the last search, one per restart.
    pub fn budgets(&self) -> &[usize] {
        &self.budgets
    }

    pub fn report(&self) -> Option<&SearchReport> {
        self.inner.report()
    }
}

impl<N: TreeNode, S: Scorer> TreeSearch<N> for RandomRestartsMCTS<N, S> {
    fn search(&mut self, root: &N, nb_of_tree_walks: usize) -> Result<SearchResult<N>, SearchError> {
        let start = Instant::now();
        let seed = self.inner.config().seed;
        self.budgets = split_budget(nb_of_tree_walks, self.nb_random_restarts);

        self.inner.evaluator_mut().reset();
        if let Some(seed) = seed {
            self.inner.set_seed(seed);
        }
        self.inner.initialize_distributor(self.budgets[0], root);

        let mut best: Option<SearchResult<N>> = None;
        let mut walks = 0;
        let last = self.budgets.len() - 1;
        for (i, &budget) in self.budgets.iter().enumerate() {
            // An empty share only runs when nothing else produced a result.
            if budget == 0 && (i < last || best.is_some()) {
                debug!(restart = i + 1, "Skipping restart without walks");
                continue;
            }

            info!(
                restart = i + 1,
                of = self.nb_random_restarts,
                walks = budget,
                "Performing random restart"
            );
            self.inner.distributor_mut().reset_remaining(budget);
            if let Some(seed) = seed {
                self.inner.set_seed(seed.wrapping_add(i as u64));
            }

            let result = match self.inner.run_single(root) {
                Ok(result) => result,
                Err(SearchError::NoLeafReachable(at)) => {
                    walks += self.inner.distributor().consumed();
                    warn!(restart = i + 1, node = %at, "Restart reached no leaf");
                    continue;
                }
                Err(e) => return Err(e),
            };
            walks += result.walks;
            info!(restart = i + 1, value = result.value, leaf = %result.leaf, "Restart finished");

            let improves = match &best {
                Some(current) => result.value > current.value,
                None => true,
            };
            if improves {
                best = Some(result);
            }
        }

        let mut best = best.ok_or_else(|| SearchError::NoLeafReachable(root.to_string()))?;
        best.walks = walks;

        let report = SearchReport::from_evaluator(self.inner.evaluator(), start.elapsed());
        report.log_report();
        self.inner.set_outcome(best.path.clone(), report);
        self.path = Some(best.path.clone());
        Ok(best)
    }

    fn path(&self) -> &[N] {
        self.path
            .as_deref()
            .unwrap_or_else(|| panic!("search path requested before any search ran"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_budget() {
        assert_eq!(split_budget(10, 3), vec![3, 3, 4]);
        assert_eq!(split_budget(9, 3), vec![3, 3, 3]);
        assert_eq!(split_budget(2, 3), vec![0, 0, 2]);
        assert_eq!(split_budget(7, 1), vec![7]);
    }

    #[test]
    #[should_panic(expected = "nb_random_restarts must be at least 1")]
    fn test_split_budget_zero_restarts() {
        split_budget(10, 0);
    }
}
