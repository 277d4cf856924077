//! MCTS search implementation.
//!
//! Each tree walk runs five phases:
//! 1. Selection: descend the counter tree to an unexpanded frontier node
//! 2. Expansion: add the frontier's children once it has enough visits
//! 3. Simulation: random rollout from the frontier to a leaf
//! 4. Evaluation: hand the leaf to the evaluation buffer
//! 5. Backpropagation: apply every reward the buffer has ready
//!
//! After each walk the resource distributor may move the search root one
//! level down, to the top or most visited child; the old root is frozen.

use std::slice;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, info, trace};
use tree_core::{rollout, TreeNode};

use crate::buffer::{EvalBuffer, SyncEvalBuffer};
use crate::config::{ChildRootSelection, MctsConfig, ParallelBackend};
use crate::distributor::ResourceDistributor;
use crate::evaluator::{Evaluator, EvaluatorError, Scorer};
use crate::node::NodeId;
use crate::parallel::ParallelEvalBuffer;
use crate::report::SearchReport;
use crate::tree::CounterTree;

/// Errors that can occur during a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Evaluator error: {0}")]
    EvaluatorError(#[from] EvaluatorError),

    #[error("No leaf reachable from <{0}>")]
    NoLeafReachable(String),
}

/// Result of a search.
#[derive(Debug, Clone)]
pub struct SearchResult<N> {
    /// Best leaf found
    pub leaf: N,

    /// Its evaluator value
    pub value: f64,

    /// Successive search roots, then `leaf` when it is not the last root
    pub path: Vec<N>,

    /// Tree walks performed
    pub walks: usize,
}

/// Anything that looks for a high-value leaf under a root.
pub trait TreeSearch<N: TreeNode> {
    fn search(&mut self, root: &N, nb_of_tree_walks: usize) -> Result<SearchResult<N>, SearchError>;

    /// Path of the last search.
    ///
    /// # Panics
    /// Panics if no search ran yet.
    fn path(&self) -> &[N];
}

/// Single-player Monte Carlo Tree Search.
pub struct MonteCarloTreeSearch<N: TreeNode, S: Scorer> {
    evaluator: Evaluator<N, S>,
    buffer: Box<dyn EvalBuffer<N, S>>,
    distributor: ResourceDistributor,
    config: MctsConfig,
    rng: ChaCha20Rng,

    /// Counter tree of the last run
    tree: Option<CounterTree<N>>,
    path: Option<Vec<N>>,
    report: Option<SearchReport>,
}

impl<N, S> MonteCarloTreeSearch<N, S>
where
    N: TreeNode + 'static,
    S: Scorer + Clone + 'static,
{
    /// Create a search scoring leaves with `evaluator`.
    ///
    /// Starts the evaluation worker when a parallel backend is configured.
    ///
    /// # Panics
    /// Panics if `buffer_size` is 0.
    pub fn new(evaluator: Evaluator<N, S>, config: MctsConfig) -> Result<Self, SearchError> {
        let buffer: Box<dyn EvalBuffer<N, S>> = match config.parallel {
            ParallelBackend::None => Box::new(SyncEvalBuffer::new(config.buffer_size)),
            ParallelBackend::Thread => Box::new(ParallelEvalBuffer::with_thread(
                config.buffer_size,
                config.max_in_flight_batches,
                evaluator.scorer().clone(),
            )?),
            ParallelBackend::Process => Box::new(ParallelEvalBuffer::with_process(
                config.buffer_size,
                config.max_in_flight_batches,
                config.worker_command.clone(),
            )?),
        };

        let rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };

        Ok(Self {
            evaluator,
            buffer,
            distributor: ResourceDistributor::new(config.allocation.clone()),
            config,
            rng,
            tree: None,
            path: None,
            report: None,
        })
    }
}

impl<N: TreeNode, S: Scorer> MonteCarloTreeSearch<N, S> {
    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator<N, S> {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator<N, S> {
        &mut self.evaluator
    }

    pub fn distributor(&self) -> &ResourceDistributor {
        &self.distributor
    }

    pub fn distributor_mut(&mut self) -> &mut ResourceDistributor {
        &mut self.distributor
    }

    /// Counter tree of the last run, if any.
    pub fn tree(&self) -> Option<&CounterTree<N>> {
        self.tree.as_ref()
    }

    /// Report of the last search, if any.
    pub fn report(&self) -> Option<&SearchReport> {
        self.report.as_ref()
    }

    /// Reseed the rollout randomness.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
    }

    /// Give the distributor its budget, sampling the tree when needed.
    pub fn initialize_distributor(&mut self, total_budget: usize, root: &N) {
        self.distributor
            .initialize(total_budget, root, &mut self.rng);
    }

    /// One search from `root` with the distributor's remaining budget.
    ///
    /// The evaluator memo is kept; callers reset it between unrelated
    /// searches. The evaluation buffer starts empty and is emptied again
    /// when the run fails.
    pub fn run_single(&mut self, root: &N) -> Result<SearchResult<N>, SearchError> {
        self.buffer.clear();
        let outcome = self.walk_tree(root);
        if outcome.is_err() {
            self.buffer.clear();
        }
        outcome
    }

    fn walk_tree(&mut self, root: &N) -> Result<SearchResult<N>, SearchError> {
        let mut tree = CounterTree::new(root.clone());
        let mut current = tree.root();
        let mut depth = 1;
        let mut roots = vec![root.clone()];
        let mut walks = 0;

        prepare_root(&mut tree, current);
        self.distributor.set_new_position(depth, current);

        while !is_done(&tree, current) && self.distributor.still_has_budget() {
            self.distributor.consume_one_unit();
            walks += 1;

            let frontier = self.selection_phase(&mut tree, current);
            self.expansion_phase(&mut tree, frontier);
            if let Some(leaf) = self.simulation_phase(&tree, frontier) {
                self.buffer.add(&mut self.evaluator, frontier, leaf)?;
            }
            self.backpropagation_phase(&mut tree)?;

            if !is_done(&tree, current) && self.distributor.go_to_children(&tree) {
                self.buffer.force_eval(&mut self.evaluator)?;
                self.backpropagation_phase(&mut tree)?;

                tree.freeze(current);
                current = match self.config.child_root_selection {
                    ChildRootSelection::TopChild => tree.top_child(current),
                    ChildRootSelection::MostVisited => tree.most_visited_child(current),
                };
                depth += 1;

                let reference = tree.get(current).reference.clone();
                info!(depth, root = %reference, "Moving search root");
                debug!("{}", tree.describe(current));
                roots.push(reference);

                prepare_root(&mut tree, current);
                self.distributor.set_new_position(depth, current);
            }
        }

        self.buffer.force_eval(&mut self.evaluator)?;
        self.backpropagation_phase(&mut tree)?;

        let stats = tree.stats();
        debug!(
            nodes = stats.total_nodes,
            root_visits = stats.root_visits,
            root_mean_reward = stats.root_mean_reward,
            max_depth = stats.max_depth,
            walks,
            "Search tree"
        );

        let result = self.final_result(&tree, current, roots, walks);
        self.tree = Some(tree);
        result
    }

    fn selection_phase(&self, tree: &mut CounterTree<N>, root: NodeId) -> NodeId {
        let mut node = root;
        tree.get_mut(node).count += 1;
        while tree.get(node).is_expanded() {
            node = tree.select_child(node, &self.config.selection);
            tree.get_mut(node).count += 1;
        }
        node
    }

    fn expansion_phase(&self, tree: &mut CounterTree<N>, id: NodeId) {
        let node = tree.get(id);
        if node.reference.is_terminal() {
            tree.set_as_solved(id);
            return;
        }
        if node.count < self.config.expansion_threshold {
            return;
        }
        if tree.expand(id) == 0 {
            trace!(node = %tree.get(id).reference, "Dead end expanded");
            tree.set_as_solved(id);
        }
    }

    fn simulation_phase(&mut self, tree: &CounterTree<N>, id: NodeId) -> Option<N> {
        let start = &tree.get(id).reference;
        let leaf = rollout(start, &mut self.rng);
        match &leaf {
            Some(leaf) => trace!(frontier = %start, leaf = %leaf, "Rollout"),
            None => trace!(frontier = %start, "Rollout hit a dead end"),
        }
        leaf
    }

    fn backpropagation_phase(&mut self, tree: &mut CounterTree<N>) -> Result<(), SearchError> {
        for scored in self.buffer.pop_results(&mut self.evaluator)? {
            tree.backpropagate(scored.node, scored.reward, &scored.leaf);
        }
        Ok(())
    }

    /// Leaf and value for the final root `current`.
    fn final_result(
        &mut self,
        tree: &CounterTree<N>,
        current: NodeId,
        mut path: Vec<N>,
        walks: usize,
    ) -> Result<SearchResult<N>, SearchError> {
        let node = tree.get(current);
        let leaf = if node.reference.is_terminal() {
            node.reference.clone()
        } else if let Some(top_leaf) = &node.top_leaf {
            top_leaf.clone()
        } else {
            rollout(&node.reference, &mut self.rng)
                .ok_or_else(|| SearchError::NoLeafReachable(node.reference.to_string()))?
        };

        let value = match self.evaluator.value_from_memory(&leaf) {
            Some(value) => value,
            None => self.evaluator.eval(slice::from_ref(&leaf))?[0],
        };

        if path.last() != Some(&leaf) {
            path.push(leaf.clone());
        }

        Ok(SearchResult {
            leaf,
            value,
            path,
            walks,
        })
    }

    pub(crate) fn set_outcome(&mut self, path: Vec<N>, report: SearchReport) {
        self.path = Some(path);
        self.report = Some(report);
    }
}

impl<N: TreeNode, S: Scorer> TreeSearch<N> for MonteCarloTreeSearch<N, S> {
    fn search(&mut self, root: &N, nb_of_tree_walks: usize) -> Result<SearchResult<N>, SearchError> {
        let start = Instant::now();
        self.evaluator.reset();
        if let Some(seed) = self.config.seed {
            self.set_seed(seed);
        }
        self.initialize_distributor(nb_of_tree_walks, root);

        let result = self.run_single(root)?;

        let report = SearchReport::from_evaluator(&self.evaluator, start.elapsed());
        report.log_report();
        self.set_outcome(result.path.clone(), report);
        Ok(result)
    }

    fn path(&self) -> &[N] {
        self.path
            .as_deref()
            .unwrap_or_else(|| panic!("search path requested before any search ran"))
    }
}

/// Expand a new search root so selection can start below it.
fn prepare_root<N: TreeNode>(tree: &mut CounterTree<N>, id: NodeId) {
    let node = tree.get(id);
    if node.is_expanded() || node.reference.is_terminal() {
        return;
    }
    if tree.expand(id) == 0 {
        tree.set_as_solved(id);
    }
}

#[inline]
fn is_done<N: TreeNode>(tree: &CounterTree<N>, id: NodeId) -> bool {
    let node = tree.get(id);
    node.reference.is_terminal() || node.solved
}
