//! Default configuration values loaded from config.defaults.toml.
//!
//! The defaults file is embedded at compile time, so a binary never depends
//! on it being present at runtime.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    search: SearchDefaults,
    allocation: AllocationDefaults,
    worker: WorkerDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct SearchDefaults {
    buffer_size: usize,
    selection: String,
    ucb_c: f64,
    ucb_d: f64,
    ucb_k: f64,
    expansion_threshold: u32,
    nb_random_restarts: usize,
    child_root_selection: String,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AllocationDefaults {
    strategy: String,
    stats_samples: usize,
    dynamic_ratio: f64,
    dynamic_smoothing: f64,
    depth_shrink: f64,
    min_walks_per_depth: usize,
}

#[derive(Debug, Deserialize)]
struct WorkerDefaults {
    backend: String,
    max_in_flight_batches: usize,
    command: Vec<String>,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// Search
pub fn buffer_size() -> usize {
    DEFAULTS.search.buffer_size
}
pub fn selection() -> &'static str {
    &DEFAULTS.search.selection
}
pub fn ucb_c() -> f64 {
    DEFAULTS.search.ucb_c
}
pub fn ucb_d() -> f64 {
    DEFAULTS.search.ucb_d
}
pub fn ucb_k() -> f64 {
    DEFAULTS.search.ucb_k
}
pub fn expansion_threshold() -> u32 {
    DEFAULTS.search.expansion_threshold
}
pub fn nb_random_restarts() -> usize {
    DEFAULTS.search.nb_random_restarts
}
pub fn child_root_selection() -> &'static str {
    &DEFAULTS.search.child_root_selection
}
pub fn seed() -> Option<u64> {
    DEFAULTS.search.seed
}

// Allocation
pub fn strategy() -> &'static str {
    &DEFAULTS.allocation.strategy
}
pub fn stats_samples() -> usize {
    DEFAULTS.allocation.stats_samples
}
pub fn dynamic_ratio() -> f64 {
    DEFAULTS.allocation.dynamic_ratio
}
pub fn dynamic_smoothing() -> f64 {
    DEFAULTS.allocation.dynamic_smoothing
}
pub fn depth_shrink() -> f64 {
    DEFAULTS.allocation.depth_shrink
}
pub fn min_walks_per_depth() -> usize {
    DEFAULTS.allocation.min_walks_per_depth
}

// Worker
pub fn backend() -> &'static str {
    &DEFAULTS.worker.backend
}
pub fn max_in_flight_batches() -> usize {
    DEFAULTS.worker.max_in_flight_batches
}
pub fn command() -> &'static [String] {
    &DEFAULTS.worker.command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        // Just accessing these will verify the TOML parses correctly
        assert_eq!(log_level(), "info");
        assert_eq!(selection(), "single_player");
        assert_eq!(backend(), "none");
    }

    #[test]
    fn test_search_defaults() {
        assert_eq!(buffer_size(), 1);
        assert!((ucb_c() - 1.0).abs() < f64::EPSILON);
        assert!((ucb_d() - 100.0).abs() < f64::EPSILON);
        assert_eq!(expansion_threshold(), 0);
        assert_eq!(nb_random_restarts(), 1);
        assert_eq!(child_root_selection(), "top_child");
        assert!(seed().is_none());
    }

    #[test]
    fn test_allocation_defaults() {
        assert_eq!(strategy(), "all_from_root");
        assert_eq!(stats_samples(), 100);
        assert!((dynamic_ratio() - 2.0).abs() < f64::EPSILON);
        assert!((dynamic_smoothing() - 1.0).abs() < f64::EPSILON);
        assert!((depth_shrink() - 0.8).abs() < f64::EPSILON);
        assert_eq!(min_walks_per_depth(), 1);
    }

    #[test]
    fn test_worker_defaults() {
        assert_eq!(max_in_flight_batches(), 2);
        assert!(command().is_empty());
    }
}
