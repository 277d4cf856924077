//! Deserializable config sections and their conversion to [`MctsConfig`].

use anyhow::{anyhow, Context, Result};
use mcts::{
    AllocationConfig, AllocationStrategy, ChildRootSelection, MctsConfig, ParallelBackend,
    SelectionPolicy,
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::defaults;

// Field defaults for `#[serde(default = "...")]`, read from config.defaults.toml.

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_buffer_size() -> usize {
    defaults::buffer_size()
}
fn d_selection() -> String {
    defaults::selection().into()
}
fn d_ucb_c() -> f64 {
    defaults::ucb_c()
}
fn d_ucb_d() -> f64 {
    defaults::ucb_d()
}
fn d_ucb_k() -> f64 {
    defaults::ucb_k()
}
fn d_expansion_threshold() -> u32 {
    defaults::expansion_threshold()
}
fn d_restarts() -> usize {
    defaults::nb_random_restarts()
}
fn d_child_root_selection() -> String {
    defaults::child_root_selection().into()
}
fn d_seed() -> Option<u64> {
    defaults::seed()
}
fn d_strategy() -> String {
    defaults::strategy().into()
}
fn d_stats_samples() -> usize {
    defaults::stats_samples()
}
fn d_dynamic_ratio() -> f64 {
    defaults::dynamic_ratio()
}
fn d_dynamic_smoothing() -> f64 {
    defaults::dynamic_smoothing()
}
fn d_depth_shrink() -> f64 {
    defaults::depth_shrink()
}
fn d_min_walks() -> usize {
    defaults::min_walks_per_depth()
}
fn d_backend() -> String {
    defaults::backend().into()
}
fn d_max_in_flight() -> usize {
    defaults::max_in_flight_batches()
}
fn d_command() -> Vec<String> {
    defaults::command().to_vec()
}

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub allocation: AllocationSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
}

/// Settings shared by every binary
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
        }
    }
}

/// Tree search configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchSettings {
    #[serde(default = "d_buffer_size")]
    pub buffer_size: usize,
    /// "single_player" or "standard"
    #[serde(default = "d_selection")]
    pub selection: String,
    #[serde(default = "d_ucb_c")]
    pub ucb_c: f64,
    #[serde(default = "d_ucb_d")]
    pub ucb_d: f64,
    /// Exploration constant of the standard policy
    #[serde(default = "d_ucb_k")]
    pub ucb_k: f64,
    #[serde(default = "d_expansion_threshold")]
    pub expansion_threshold: u32,
    #[serde(default = "d_restarts")]
    pub nb_random_restarts: usize,
    #[serde(default = "d_child_root_selection")]
    pub child_root_selection: String,
    /// Rollout seed (None = seeded from entropy)
    #[serde(default = "d_seed")]
    pub seed: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            buffer_size: defaults::buffer_size(),
            selection: defaults::selection().into(),
            ucb_c: defaults::ucb_c(),
            ucb_d: defaults::ucb_d(),
            ucb_k: defaults::ucb_k(),
            expansion_threshold: defaults::expansion_threshold(),
            nb_random_restarts: defaults::nb_random_restarts(),
            child_root_selection: defaults::child_root_selection().into(),
            seed: defaults::seed(),
        }
    }
}

/// Walk budget allocation configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AllocationSettings {
    #[serde(default = "d_strategy")]
    pub strategy: String,
    #[serde(default = "d_stats_samples")]
    pub stats_samples: usize,
    #[serde(default = "d_dynamic_ratio")]
    pub dynamic_ratio: f64,
    #[serde(default = "d_dynamic_smoothing")]
    pub dynamic_smoothing: f64,
    #[serde(default = "d_depth_shrink")]
    pub depth_shrink: f64,
    #[serde(default = "d_min_walks")]
    pub min_walks_per_depth: usize,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            strategy: defaults::strategy().into(),
            stats_samples: defaults::stats_samples(),
            dynamic_ratio: defaults::dynamic_ratio(),
            dynamic_smoothing: defaults::dynamic_smoothing(),
            depth_shrink: defaults::depth_shrink(),
            min_walks_per_depth: defaults::min_walks_per_depth(),
        }
    }
}

/// Evaluation worker configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkerSettings {
    #[serde(default = "d_backend")]
    pub backend: String,
    #[serde(default = "d_max_in_flight")]
    pub max_in_flight_batches: usize,
    /// Scoring process command line, used by the "process" backend
    #[serde(default = "d_command")]
    pub command: Vec<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            backend: defaults::backend().into(),
            max_in_flight_batches: defaults::max_in_flight_batches(),
            command: defaults::command().to_vec(),
        }
    }
}

impl CentralConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.common.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.common.log_level
            ));
        }

        if self.search.buffer_size == 0 {
            return Err(anyhow!("search.buffer_size must be greater than 0"));
        }

        if self.search.nb_random_restarts == 0 {
            return Err(anyhow!("search.nb_random_restarts must be greater than 0"));
        }

        if self.allocation.depth_shrink <= 0.0 {
            return Err(anyhow!("allocation.depth_shrink must be positive"));
        }

        if self.allocation.dynamic_ratio <= 0.0 {
            return Err(anyhow!("allocation.dynamic_ratio must be positive"));
        }

        if self.worker.max_in_flight_batches == 0 {
            return Err(anyhow!(
                "worker.max_in_flight_batches must be greater than 0"
            ));
        }

        let backend = self.parallel_backend()?;
        if backend == ParallelBackend::Process && self.worker.command.is_empty() {
            return Err(anyhow!(
                "worker.command cannot be empty with the process backend"
            ));
        }

        self.selection_policy()?;
        self.allocation_strategy()?;
        self.child_root_selection()?;
        Ok(())
    }

    pub fn selection_policy(&self) -> Result<SelectionPolicy> {
        match self.search.selection.as_str() {
            "single_player" => Ok(SelectionPolicy::SinglePlayer {
                c: self.search.ucb_c,
                d: self.search.ucb_d,
            }),
            "standard" => Ok(SelectionPolicy::Standard {
                k: self.search.ucb_k,
            }),
            other => Err(anyhow!(
                "unknown selection policy '{}', expected single_player or standard",
                other
            )),
        }
    }

    pub fn allocation_strategy(&self) -> Result<AllocationStrategy> {
        self.allocation
            .strategy
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("invalid allocation.strategy")
    }

    pub fn child_root_selection(&self) -> Result<ChildRootSelection> {
        self.search
            .child_root_selection
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("invalid search.child_root_selection")
    }

    pub fn parallel_backend(&self) -> Result<ParallelBackend> {
        self.worker
            .backend
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("invalid worker.backend")
    }

    /// Validate and build the search engine's configuration.
    pub fn to_mcts_config(&self) -> Result<MctsConfig> {
        self.validate()?;

        let allocation = AllocationConfig {
            strategy: self.allocation_strategy()?,
            stats_samples: self.allocation.stats_samples,
            dynamic_ratio: self.allocation.dynamic_ratio,
            dynamic_smoothing: self.allocation.dynamic_smoothing,
            depth_shrink: self.allocation.depth_shrink,
            min_walks_per_depth: self.allocation.min_walks_per_depth,
        };

        Ok(MctsConfig {
            buffer_size: self.search.buffer_size,
            selection: self.selection_policy()?,
            expansion_threshold: self.search.expansion_threshold,
            nb_random_restarts: self.search.nb_random_restarts,
            allocation,
            child_root_selection: self.child_root_selection()?,
            parallel: self.parallel_backend()?,
            max_in_flight_batches: self.worker.max_in_flight_batches,
            worker_command: self.worker.command.clone(),
            seed: self.search.seed,
        })
    }
}
