//! Evaluation buffers between the search loop and the evaluator.
//!
//! The search adds `(counter node, leaf)` pairs and later pops
//! `(counter node, leaf, reward)` triples to backpropagate. In between, the
//! buffer answers memoised leaves at once, groups the others into batches of
//! `buffer_size` distinct leaves, and scores each distinct leaf once even
//! when several counter nodes asked for it.

use std::collections::HashMap;
use std::mem;

use tracing::debug;
use tree_core::TreeNode;

use crate::evaluator::{Evaluator, EvaluatorError, Scorer};
use crate::node::NodeId;

/// A reward ready to be backpropagated from `node`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLeaf<N> {
    pub node: NodeId,
    pub leaf: N,
    pub reward: f64,
}

/// Contract shared by the synchronous and worker-backed buffers.
pub trait EvalBuffer<N: TreeNode, S: Scorer> {
    /// Queue `leaf` for `node`. May score a full batch before returning.
    fn add(
        &mut self,
        evaluator: &mut Evaluator<N, S>,
        node: NodeId,
        leaf: N,
    ) -> Result<(), EvaluatorError>;

    /// Take every reward available now, without waiting.
    fn pop_results(
        &mut self,
        evaluator: &mut Evaluator<N, S>,
    ) -> Result<Vec<ScoredLeaf<N>>, EvaluatorError>;

    /// Score the partial batch and wait for everything outstanding.
    fn force_eval(&mut self, evaluator: &mut Evaluator<N, S>) -> Result<(), EvaluatorError>;

    /// Distinct leaves queued or being scored.
    fn pending(&self) -> usize;

    /// Drop every queued leaf, outstanding batch and unread result.
    ///
    /// Results refer to counter nodes of one tree and must not reach the
    /// next one.
    fn clear(&mut self);
}

/// Distinct leaves of one batch, in insertion order, with the counter nodes
/// waiting on each.
#[derive(Debug)]
pub(crate) struct BatchIndex<N> {
    leaves: Vec<N>,
    waiting: Vec<Vec<NodeId>>,
    positions: HashMap<N, usize>,
}

/// A batch taken out of the index.
#[derive(Debug)]
pub(crate) struct Batch<N> {
    pub leaves: Vec<N>,
    pub waiting: Vec<Vec<NodeId>>,
}

impl<N: TreeNode> BatchIndex<N> {
    pub fn new() -> Self {
        Self {
            leaves: Vec::new(),
            waiting: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, leaf: N, node: NodeId) {
        match self.positions.get(&leaf) {
            Some(&i) => self.waiting[i].push(node),
            None => {
                self.positions.insert(leaf.clone(), self.leaves.len());
                self.leaves.push(leaf);
                self.waiting.push(vec![node]);
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn clear(&mut self) {
        self.leaves.clear();
        self.waiting.clear();
        self.positions.clear();
    }

    pub fn take(&mut self) -> Batch<N> {
        self.positions.clear();
        Batch {
            leaves: mem::take(&mut self.leaves),
            waiting: mem::take(&mut self.waiting),
        }
    }
}

impl<N: TreeNode> Batch<N> {
    /// One result per waiting counter node.
    pub fn fan_out(self, values: &[f64], results: &mut Vec<ScoredLeaf<N>>) {
        for ((leaf, nodes), &reward) in self.leaves.into_iter().zip(self.waiting).zip(values) {
            for node in nodes {
                results.push(ScoredLeaf {
                    node,
                    leaf: leaf.clone(),
                    reward,
                });
            }
        }
    }
}

/// Buffer scoring full batches inline, on the search thread.
#[derive(Debug)]
pub struct SyncEvalBuffer<N> {
    buffer_size: usize,
    index: BatchIndex<N>,
    results: Vec<ScoredLeaf<N>>,
}

impl<N: TreeNode> SyncEvalBuffer<N> {
    /// # Panics
    /// Panics if `buffer_size` is 0.
    pub fn new(buffer_size: usize) -> Self {
        assert!(buffer_size >= 1, "buffer_size must be at least 1");
        Self {
            buffer_size,
            index: BatchIndex::new(),
            results: Vec::new(),
        }
    }

    /// Distinct leaves waiting for the next batch.
    #[inline]
    pub fn pending(&self) -> usize {
        self.index.len()
    }

    /// Drop queued leaves and unread results.
    pub fn clear(&mut self) {
        self.index.clear();
        self.results.clear();
    }

    fn compute<S: Scorer>(&mut self, evaluator: &mut Evaluator<N, S>) -> Result<(), EvaluatorError> {
        let batch = self.index.take();
        debug!(batch_size = batch.leaves.len(), "Scoring batch");
        let values = evaluator.eval(&batch.leaves)?;
        batch.fan_out(&values, &mut self.results);
        Ok(())
    }
}

impl<N: TreeNode, S: Scorer> EvalBuffer<N, S> for SyncEvalBuffer<N> {
    fn add(
        &mut self,
        evaluator: &mut Evaluator<N, S>,
        node: NodeId,
        leaf: N,
    ) -> Result<(), EvaluatorError> {
        if let Some(reward) = evaluator.value_from_memory(&leaf) {
            self.results.push(ScoredLeaf { node, leaf, reward });
            return Ok(());
        }

        self.index.insert(leaf, node);
        if self.index.len() >= self.buffer_size {
            self.compute(evaluator)?;
        }
        Ok(())
    }

    fn pop_results(
        &mut self,
        _evaluator: &mut Evaluator<N, S>,
    ) -> Result<Vec<ScoredLeaf<N>>, EvaluatorError> {
        Ok(mem::take(&mut self.results))
    }

    fn force_eval(&mut self, evaluator: &mut Evaluator<N, S>) -> Result<(), EvaluatorError> {
        if !self.index.is_empty() {
            self.compute(evaluator)?;
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        SyncEvalBuffer::pending(self)
    }

    fn clear(&mut self) {
        SyncEvalBuffer::clear(self)
    }
}
