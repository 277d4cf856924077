//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Prefix of every environment variable read by this crate.
pub const ENV_PREFIX: &str = "LEAFSEARCH";

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from subdirectory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by LEAFSEARCH_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    match find_config_file() {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            load_from_path(&path)
        }
        None => {
            debug!("No config.toml found, using built-in defaults");
            apply_env_overrides(CentralConfig::default())
        }
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return Some(path);
        }
        warn!(path = %path.display(), "{}_CONFIG not found, searching defaults", ENV_PREFIX);
    }

    CONFIG_SEARCH_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// Load configuration from a specific path.
///
/// An unreadable or malformed file falls back to the built-in defaults.
pub fn load_from_path(path: &Path) -> CentralConfig {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| toml::from_str::<CentralConfig>(&content).map_err(|e| e.to_string()));

    let config = parsed.unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Unusable config file, using defaults");
        CentralConfig::default()
    });
    apply_env_overrides(config)
}

/// Value of `LEAFSEARCH_<SECTION>_<KEY>`, if set and parseable.
fn env_value<T: FromStr>(section: &str, key: &str) -> Option<T> {
    let name = format!(
        "{}_{}_{}",
        ENV_PREFIX,
        section.to_ascii_uppercase(),
        key.to_ascii_uppercase()
    );
    let raw = std::env::var(&name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = %name, value = %raw, "Ignoring unparseable override");
            None
        }
    }
}

/// Override `config.section.field` from `LEAFSEARCH_<SECTION>_<FIELD>`.
macro_rules! env_override {
    ($config:ident . $section:ident . $field:ident) => {
        if let Some(v) = env_value(stringify!($section), stringify!($field)) {
            $config.$section.$field = v;
        }
    };
    // Option<T> field
    ($config:ident . $section:ident . $field:ident, optional) => {
        if let Some(v) = env_value(stringify!($section), stringify!($field)) {
            $config.$section.$field = Some(v);
        }
    };
    // Vec<String> field, whitespace separated
    ($config:ident . $section:ident . $field:ident, words) => {
        if let Some(v) = env_value::<String>(stringify!($section), stringify!($field)) {
            $config.$section.$field = v.split_whitespace().map(String::from).collect();
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: LEAFSEARCH_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    env_override!(config.common.log_level);

    env_override!(config.search.buffer_size);
    env_override!(config.search.selection);
    env_override!(config.search.ucb_c);
    env_override!(config.search.ucb_d);
    env_override!(config.search.ucb_k);
    env_override!(config.search.expansion_threshold);
    env_override!(config.search.nb_random_restarts);
    env_override!(config.search.child_root_selection);
    env_override!(config.search.seed, optional);

    env_override!(config.allocation.strategy);
    env_override!(config.allocation.stats_samples);
    env_override!(config.allocation.dynamic_ratio);
    env_override!(config.allocation.dynamic_smoothing);
    env_override!(config.allocation.depth_shrink);
    env_override!(config.allocation.min_walks_per_depth);

    env_override!(config.worker.backend);
    env_override!(config.worker.max_in_flight_batches);
    env_override!(config.worker.command, words);

    config
}
