//! MCTS configuration parameters.

use std::fmt;
use std::str::FromStr;

/// Score used to pick among visited, unsolved children.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionPolicy {
    /// `mean + sqrt(k * ln(parent.count / child.count))`
    Standard { k: f64 },

    /// Standard UCB plus a variance bonus
    /// `sqrt((sum_sq - count * mean^2 + d) / count)`.
    SinglePlayer { c: f64, d: f64 },
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::SinglePlayer { c: 1.0, d: 100.0 }
    }
}

/// How the walk budget is spread over successive root depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationStrategy {
    /// Same quota at every depth, over 80% of the mean tree depth.
    Uniform,
    /// Quota decreasing linearly with depth.
    Linear,
    /// Everything spent at the root; the search never descends.
    #[default]
    AllFromRoot,
    /// Descend once the best child dominates the second best.
    Dynamic,
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocationStrategy::Uniform => "uniform",
            AllocationStrategy::Linear => "linear",
            AllocationStrategy::AllFromRoot => "all_from_root",
            AllocationStrategy::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

impl FromStr for AllocationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(' ', "_").as_str() {
            "uniform" => Ok(AllocationStrategy::Uniform),
            "linear" => Ok(AllocationStrategy::Linear),
            "all_from_root" => Ok(AllocationStrategy::AllFromRoot),
            "dynamic" => Ok(AllocationStrategy::Dynamic),
            other => Err(format!("unknown allocation strategy '{}'", other)),
        }
    }
}

/// Resource distributor parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationConfig {
    pub strategy: AllocationStrategy,

    /// Rollouts sampled to estimate the tree's mean depth (uniform and linear).
    pub stats_samples: usize,

    /// Dominance ratio for the dynamic strategy.
    pub dynamic_ratio: f64,

    /// Added to the second best reward sum before applying `dynamic_ratio`.
    pub dynamic_smoothing: f64,

    /// Share of the mean depth over which uniform and linear quotas are spread.
    pub depth_shrink: f64,

    /// Floor of any per-depth quota.
    pub min_walks_per_depth: usize,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            strategy: AllocationStrategy::AllFromRoot,
            stats_samples: 100,
            dynamic_ratio: 2.0,
            dynamic_smoothing: 1.0,
            depth_shrink: 0.8,
            min_walks_per_depth: 1,
        }
    }
}

impl AllocationConfig {
    pub fn new(strategy: AllocationStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_stats_samples(mut self, samples: usize) -> Self {
        self.stats_samples = samples;
        self
    }

    pub fn with_dynamic_ratio(mut self, ratio: f64) -> Self {
        self.dynamic_ratio = ratio;
        self
    }
}

/// Which child becomes the next root when the search descends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildRootSelection {
    /// Child through which the best leaf was found.
    #[default]
    TopChild,
    MostVisited,
}

impl FromStr for ChildRootSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_child" => Ok(ChildRootSelection::TopChild),
            "most_visited" => Ok(ChildRootSelection::MostVisited),
            other => Err(format!("unknown child root selection '{}'", other)),
        }
    }
}

/// Where batches of leaves are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParallelBackend {
    /// Scored inline by the search loop.
    #[default]
    None,
    /// Scored by a clone of the scorer on a worker thread.
    Thread,
    /// Scored by an external worker process (see [`crate::ProcessScorer`]).
    Process,
}

impl FromStr for ParallelBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ParallelBackend::None),
            "thread" | "multithread" => Ok(ParallelBackend::Thread),
            "process" | "multiprocess" => Ok(ParallelBackend::Process),
            other => Err(format!("unknown parallel backend '{}'", other)),
        }
    }
}

/// Configuration for Monte Carlo Tree Search.
#[derive(Debug, Clone, PartialEq)]
pub struct MctsConfig {
    /// Distinct leaves accumulated before a batch is scored.
    pub buffer_size: usize,

    pub selection: SelectionPolicy,

    /// Visits a frontier node needs before it is expanded.
    pub expansion_threshold: u32,

    /// Independent searches sharing the walk budget.
    pub nb_random_restarts: usize,

    pub allocation: AllocationConfig,

    pub child_root_selection: ChildRootSelection,

    pub parallel: ParallelBackend,

    /// Batches handed to the worker before `add` blocks.
    pub max_in_flight_batches: usize,

    /// Program and arguments of the scoring process (process backend only).
    pub worker_command: Vec<String>,

    /// Rollout seed; restarts use `seed + index`. Entropy when unset.
    pub seed: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1,
            selection: SelectionPolicy::default(),
            expansion_threshold: 0,
            nb_random_restarts: 1,
            allocation: AllocationConfig::default(),
            child_root_selection: ChildRootSelection::TopChild,
            parallel: ParallelBackend::None,
            max_in_flight_batches: 2,
            worker_command: Vec::new(),
            seed: None,
        }
    }
}

impl MctsConfig {
    /// Create a small, reproducible config for testing.
    pub fn for_testing() -> Self {
        Self {
            buffer_size: 4,
            seed: Some(42),
            ..Self::default()
        }
    }

    /// Builder pattern: set evaluation batch size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_expansion_threshold(mut self, threshold: u32) -> Self {
        self.expansion_threshold = threshold;
        self
    }

    pub fn with_random_restarts(mut self, restarts: usize) -> Self {
        self.nb_random_restarts = restarts;
        self
    }

    pub fn with_allocation(mut self, allocation: AllocationConfig) -> Self {
        self.allocation = allocation;
        self
    }

    pub fn with_child_root_selection(mut self, selection: ChildRootSelection) -> Self {
        self.child_root_selection = selection;
        self
    }

    /// Builder pattern: score batches on a worker.
    pub fn with_parallel(mut self, backend: ParallelBackend, max_in_flight: usize) -> Self {
        self.parallel = backend;
        self.max_in_flight_batches = max_in_flight;
        self
    }

    pub fn with_worker_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.worker_command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MctsConfig::default();
        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.nb_random_restarts, 1);
        assert_eq!(config.allocation.strategy, AllocationStrategy::AllFromRoot);
        match config.selection {
            SelectionPolicy::SinglePlayer { c, d } => {
                assert!((c - 1.0).abs() < 1e-9);
                assert!((d - 100.0).abs() < 1e-9);
            }
            other => panic!("unexpected default selection {:?}", other),
        }
    }

    #[test]
    fn test_builder_pattern() {
        let config = MctsConfig::default()
            .with_buffer_size(16)
            .with_random_restarts(3)
            .with_parallel(ParallelBackend::Thread, 4)
            .with_seed(7);

        assert_eq!(config.buffer_size, 16);
        assert_eq!(config.nb_random_restarts, 3);
        assert_eq!(config.parallel, ParallelBackend::Thread);
        assert_eq!(config.max_in_flight_batches, 4);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_strategy_names() {
        for strategy in [
            AllocationStrategy::Uniform,
            AllocationStrategy::Linear,
            AllocationStrategy::AllFromRoot,
            AllocationStrategy::Dynamic,
        ] {
            assert_eq!(strategy.to_string().parse::<AllocationStrategy>(), Ok(strategy));
        }
        assert_eq!(
            "All From Root".parse::<AllocationStrategy>(),
            Ok(AllocationStrategy::AllFromRoot)
        );
        assert!("greedy".parse::<AllocationStrategy>().is_err());
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!("multithread".parse::<ParallelBackend>(), Ok(ParallelBackend::Thread));
        assert_eq!("process".parse::<ParallelBackend>(), Ok(ParallelBackend::Process));
        assert_eq!("none".parse::<ParallelBackend>(), Ok(ParallelBackend::None));
    }
}
