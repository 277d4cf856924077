//! Search settings for programs driving the leafsearch engine.
//!
//! [`load_config`] layers three sources, later ones winning:
//! 1. built-in defaults (config.defaults.toml, embedded at compile time)
//! 2. a config.toml file
//! 3. `LEAFSEARCH_<SECTION>_<KEY>` environment variables
//!
//! [`CentralConfig::to_mcts_config`] validates the result and turns it into
//! an [`mcts::MctsConfig`].
//!
//! ```text
//!     LEAFSEARCH_COMMON_LOG_LEVEL=debug
//!     LEAFSEARCH_SEARCH_BUFFER_SIZE=32
//!     LEAFSEARCH_ALLOCATION_STRATEGY=uniform
//!     LEAFSEARCH_WORKER_BACKEND=process
//!     LEAFSEARCH_WORKER_COMMAND="python3 score.py"
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{
    apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS, ENV_PREFIX,
};
pub use structs::*;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when it is set.
pub fn init_tracing(level: &str) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()?;

    Ok(())
}
