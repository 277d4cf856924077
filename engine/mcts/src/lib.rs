//! Single-player Monte Carlo Tree Search (MCTS) over implicit trees.
//!
//! This crate searches any tree implementing [`tree_core::TreeNode`] for a
//! leaf that an external scorer rates highly. The scorer is a black box that
//! takes a batch of leaf identities and returns one value per leaf, so leaves
//! are collected into batches before being scored.
//!
//! # Overview
//!
//! Each tree walk consists of five phases:
//!
//! 1. **Selection**: descend the counter tree with a UCB policy until an
//!    unexpanded node is reached
//! 2. **Expansion**: add the node's children once it has been visited enough
//! 3. **Simulation**: random rollout from that node to a leaf
//! 4. **Evaluation**: queue the leaf in an evaluation buffer, which scores
//!    leaves in batches and never scores the same leaf twice
//! 5. **Backpropagation**: apply every ready reward from the scored leaf's
//!    frontier node up to the search root
//!
//! A [`ResourceDistributor`] may move the search root down the tree during
//! the search, spending a share of the walk budget at each depth.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mcts::{Evaluator, MctsConfig, MonteCarloTreeSearch, TreeSearch};
//! use toy_trees::{scorers, DigitString};
//!
//! let evaluator = Evaluator::new(scorers::batched(scorers::digit_mean));
//! let config = MctsConfig::for_testing();
//! let mut search = MonteCarloTreeSearch::new(evaluator, config).unwrap();
//!
//! let result = search.search(&DigitString::root(4, 10), 200).unwrap();
//! println!("Best leaf: {} ({})", result.leaf, result.value);
//! println!("Path: {:?}", search.path());
//! ```
//!
//! # Configuration
//!
//! The [`MctsConfig`] struct controls search behavior:
//!
//! - `buffer_size`: leaves per scoring batch (default: 1)
//! - `selection`: UCB formula and its constants
//! - `expansion_threshold`: visits a node needs before it is expanded
//! - `allocation`: how the walk budget is spread over depths
//! - `parallel`: score batches inline, on a worker thread or in a worker
//!   process
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |           MonteCarloTreeSearch / RandomRestartsMCTS         |
//! +-------------------------------------------------------------+
//! |  +-------------+  +---------------------+  +-------------+  |
//! |  | CounterTree |  | ResourceDistributor |  | EvalBuffer  |  |
//! |  |   (arena)   |  |   (walk budget)     |  |  (batches)  |  |
//! |  +-------------+  +---------------------+  +------+------+  |
//! |                                                   |         |
//! |                                            +------v------+  |
//! |                                            |  Evaluator  |  |
//! |                                            | memo+Scorer |  |
//! |                                            +-------------+  |
//! +-------------------------------------------------------------+
//! ```

pub mod buffer;
pub mod config;
pub mod distributor;
pub mod evaluator;
pub mod node;
pub mod parallel;
pub mod process;
pub mod random_search;
pub mod report;
pub mod restarts;
pub mod search;
pub mod selection;
pub mod tree;

// Re-export main types
pub use buffer::{EvalBuffer, ScoredLeaf, SyncEvalBuffer};
pub use config::{
    AllocationConfig, AllocationStrategy, ChildRootSelection, MctsConfig, ParallelBackend,
    SelectionPolicy,
};
pub use distributor::ResourceDistributor;
pub use evaluator::{Evaluator, EvaluatorError, Scorer};
pub use node::{CounterNode, NodeId};
pub use parallel::{ParallelEvalBuffer, ScorerFactory};
pub use process::ProcessScorer;
pub use random_search::RandomSearch;
pub use report::SearchReport;
pub use restarts::{split_budget, RandomRestartsMCTS};
pub use search::{MonteCarloTreeSearch, SearchError, SearchResult, TreeSearch};
pub use selection::{single_player_ucb, standard_ucb};
pub use tree::{CounterTree, TreeStats};
