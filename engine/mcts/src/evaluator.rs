//! Leaf evaluation with memoisation.
//!
//! A [`Scorer`] turns a batch of leaf identities into rewards; it is the
//! expensive part of the search (typically a language model). The
//! [`Evaluator`] wraps a scorer with a memo so that no leaf is ever scored
//! twice, a history of every value it served, and timing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tree_core::TreeNode;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Scorer returned {got} values for a batch of {expected} leaves")]
    BatchLengthMismatch { expected: usize, got: usize },

    #[error("Evaluation worker disconnected")]
    WorkerDisconnected,

    #[error("Worker process I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker protocol error: {0}")]
    Protocol(String),
}

/// Scores batches of leaves given by their identity strings.
///
/// The returned vector must have the same length and order as the input.
/// Closures `FnMut(&[String]) -> Vec<f64>` are scorers.
pub trait Scorer: Send {
    /// Load whatever the scorer needs (a model, a process). Called once,
    /// before the first batch, on the thread that will do the scoring.
    fn build(&mut self) -> Result<(), EvaluatorError> {
        Ok(())
    }

    fn score(&mut self, leaves: &[String]) -> Result<Vec<f64>, EvaluatorError>;
}

impl<F> Scorer for F
where
    F: FnMut(&[String]) -> Vec<f64> + Send,
{
    fn score(&mut self, leaves: &[String]) -> Result<Vec<f64>, EvaluatorError> {
        Ok(self(leaves))
    }
}

/// Memoising evaluator over a scorer.
pub struct Evaluator<N, S> {
    scorer: S,
    built: bool,

    memory: HashMap<N, f64>,

    /// Pre-seeded values, restored by [`reset`](Self::reset).
    default_values: HashMap<N, f64>,

    /// Every (leaf, value) served, memo hits included.
    history: Vec<(N, f64)>,

    best: Option<(N, f64)>,

    time_spent: Duration,
}

impl<N: TreeNode, S: Scorer> Evaluator<N, S> {
    pub fn new(scorer: S) -> Self {
        Self {
            scorer,
            built: false,
            memory: HashMap::new(),
            default_values: HashMap::new(),
            history: Vec::new(),
            best: None,
            time_spent: Duration::ZERO,
        }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Build the scorer if that has not happened yet.
    pub fn build(&mut self) -> Result<(), EvaluatorError> {
        if !self.built {
            self.scorer.build()?;
            self.built = true;
        }
        Ok(())
    }

    /// Score `leaves` in one scorer call and memoise the values.
    pub fn eval(&mut self, leaves: &[N]) -> Result<Vec<f64>, EvaluatorError> {
        self.build()?;

        let identities: Vec<String> = leaves.iter().map(TreeNode::identity).collect();
        let start = Instant::now();
        let values = self.scorer.score(&identities)?;
        self.time_spent += start.elapsed();

        self.record(leaves, &values)?;
        Ok(values)
    }

    /// Memoise values computed elsewhere, e.g. by an evaluation worker.
    pub fn record(&mut self, leaves: &[N], values: &[f64]) -> Result<(), EvaluatorError> {
        if leaves.len() != values.len() {
            return Err(EvaluatorError::BatchLengthMismatch {
                expected: leaves.len(),
                got: values.len(),
            });
        }

        for (leaf, &value) in leaves.iter().zip(values) {
            self.memory.insert(leaf.clone(), value);
            let improves = match &self.best {
                Some((_, best_value)) => value > *best_value,
                None => true,
            };
            if improves {
                self.best = Some((leaf.clone(), value));
            }
            self.history.push((leaf.clone(), value));
        }
        Ok(())
    }

    #[inline]
    pub fn has_already_eval(&self, leaf: &N) -> bool {
        self.memory.contains_key(leaf)
    }

    /// Memoised value of `leaf`, recorded in the history when present.
    pub fn value_from_memory(&mut self, leaf: &N) -> Option<f64> {
        let value = *self.memory.get(leaf)?;
        self.history.push((leaf.clone(), value));
        Some(value)
    }

    /// Give `leaf` a fixed value without ever scoring it.
    pub fn set_default_value(&mut self, leaf: N, value: f64) {
        self.memory.insert(leaf.clone(), value);
        self.default_values.insert(leaf, value);
    }

    /// Forget everything except the default values.
    pub fn reset(&mut self) {
        self.memory = self.default_values.clone();
        self.history.clear();
        self.best = None;
        self.time_spent = Duration::ZERO;
    }

    /// Add scoring time measured outside this evaluator.
    pub fn add_time_spent(&mut self, elapsed: Duration) {
        self.time_spent += elapsed;
    }

    /// Time spent inside the scorer since the last reset.
    #[inline]
    pub fn time_spent(&self) -> Duration {
        self.time_spent
    }

    pub fn history(&self) -> &[(N, f64)] {
        &self.history
    }

    pub fn history_of_terminal_nodes(&self) -> Vec<&N> {
        self.history.iter().map(|(leaf, _)| leaf).collect()
    }

    pub fn history_of_values(&self) -> Vec<f64> {
        self.history.iter().map(|&(_, value)| value).collect()
    }

    /// Number of distinct leaves in memory, defaults included.
    #[inline]
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Best scored leaf since the last reset.
    pub fn best_result(&self) -> Option<(&N, f64)> {
        self.best.as_ref().map(|(leaf, value)| (leaf, *value))
    }

    /// The `n` best memoised leaves, best first; ties ordered by identity.
    pub fn top_n_best(&self, n: usize) -> Vec<(N, f64)> {
        let mut entries: Vec<(&N, f64)> = self.memory.iter().map(|(k, &v)| (k, v)).collect();
        entries.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.identity().cmp(&b.0.identity()))
        });
        entries
            .into_iter()
            .take(n)
            .map(|(leaf, value)| (leaf.clone(), value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toy_trees::{scorers, DigitString};
    use tree_core::TreeNode;

    fn leaves(digits: &[&str]) -> Vec<DigitString> {
        digits
            .iter()
            .map(|d| {
                d.chars().fold(DigitString::root(d.len(), 10), |node, c| {
                    node.children()
                        .into_iter()
                        .find(|child| child.digits().ends_with(c))
                        .unwrap()
                })
            })
            .collect()
    }

    #[test]
    fn test_eval_memoises() {
        let mut evaluator = Evaluator::new(scorers::batched(scorers::digit_mean));
        let batch = leaves(&["9", "0"]);

        let values = evaluator.eval(&batch).unwrap();
        assert_eq!(values.len(), 2);
        assert!(evaluator.has_already_eval(&batch[0]));
        assert_eq!(evaluator.value_from_memory(&batch[0]), Some(1.0));
        assert_eq!(evaluator.value_from_memory(&batch[0]), Some(1.0));
        assert_eq!(evaluator.history_of_values(), vec![1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_value_from_memory_unknown_leaf() {
        let mut evaluator = Evaluator::new(scorers::constant(0.5));
        let batch = leaves(&["3"]);
        assert_eq!(evaluator.value_from_memory(&batch[0]), None);
        assert!(evaluator.history().is_empty());
    }

    #[test]
    fn test_batch_length_mismatch() {
        let mut evaluator = Evaluator::new(|_: &[String]| vec![1.0]);
        let err = evaluator.eval(&leaves(&["1", "2"])).unwrap_err();
        assert!(matches!(
            err,
            EvaluatorError::BatchLengthMismatch {
                expected: 2,
                got: 1
            }
        ));
        assert_eq!(evaluator.memory_len(), 0);
    }

    #[test]
    fn test_default_values_survive_reset() {
        let mut evaluator = Evaluator::new(scorers::constant(0.5));
        let batch = leaves(&["1", "2"]);
        evaluator.set_default_value(batch[0].clone(), -1.0);
        evaluator.eval(&batch[1..]).unwrap();

        evaluator.reset();
        assert!(evaluator.has_already_eval(&batch[0]));
        assert!(!evaluator.has_already_eval(&batch[1]));
        assert_eq!(evaluator.value_from_memory(&batch[0]), Some(-1.0));
        assert!(evaluator.best_result().is_none());
    }

    #[test]
    fn test_best_and_top_n() {
        let mut evaluator = Evaluator::new(scorers::batched(scorers::digit_mean));
        evaluator.eval(&leaves(&["3", "9", "6"])).unwrap();

        let (best, value) = evaluator.best_result().unwrap();
        assert_eq!(best.digits(), "9");
        assert!((value - 1.0).abs() < 1e-9);

        let top: Vec<String> = evaluator
            .top_n_best(2)
            .into_iter()
            .map(|(leaf, _)| leaf.digits().to_string())
            .collect();
        assert_eq!(top, vec!["9", "6"]);
    }

    #[test]
    fn test_build_called_once() {
        struct Counting {
            builds: usize,
        }
        impl Scorer for Counting {
            fn build(&mut self) -> Result<(), EvaluatorError> {
                self.builds += 1;
                Ok(())
            }
            fn score(&mut self, leaves: &[String]) -> Result<Vec<f64>, EvaluatorError> {
                Ok(vec![0.0; leaves.len()])
            }
        }

        let mut evaluator = Evaluator::new(Counting { builds: 0 });
        evaluator.eval(&leaves(&["1"])).unwrap();
        evaluator.eval(&leaves(&["2"])).unwrap();
        assert_eq!(evaluator.scorer().builds, 1);
    }

    #[test]
    fn test_scorer_failure_is_surfaced() {
        struct Failing;
        impl Scorer for Failing {
            fn score(&mut self, _: &[String]) -> Result<Vec<f64>, EvaluatorError> {
                Err(EvaluatorError::ScoringFailed("model unavailable".to_string()))
            }
        }

        let mut evaluator = Evaluator::new(Failing);
        let err = evaluator.eval(&leaves(&["1"])).unwrap_err();
        assert!(err.to_string().contains("model unavailable"));
    }
}
