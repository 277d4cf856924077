//! Toy trees for the leafsearch engine
//!
//! This crate provides small, fully deterministic trees implementing
//! [`tree_core::TreeNode`], together with cheap scoring functions. They are
//! used by the tests and benchmarks of the search crates and double as
//! reference implementations of the node capability.
//!
//! - [`Derivation`]: leftmost derivations of a tiny context-free [`Grammar`]
//! - [`DigitString`]: fixed-length digit strings, one digit per depth
//! - [`scorers`]: batch scoring closures over leaf identities
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use toy_trees::{Derivation, Grammar, FORK_GRAMMAR};
//! use tree_core::TreeNode;
//!
//! let grammar = Arc::new(Grammar::parse(FORK_GRAMMAR).unwrap());
//! let root = Derivation::root(grammar);
//! assert_eq!(root.children().len(), 2);
//! ```

mod digits;
mod grammar;
pub mod scorers;

pub use digits::DigitString;
pub use grammar::{Derivation, Grammar, GrammarError, Symbol};

/// Root with two branches, each ending in a single word.
pub const FORK_GRAMMAR: &str = "
s -> a | b
a -> 'x'
b -> 'y'
";

/// A few short English sentences.
pub const SENTENCE_GRAMMAR: &str = "
s -> snp vp
vp -> v onp
onp -> np | obj
snp -> np | subj
subj -> 'Bas' | 'he'
obj -> 'Piet' | 'him'
np -> det n
det -> 'the'
n -> 'man'
v -> 'knows'
";

/// Branch `a` needs the symbol `c`, which has no rule: it is a dead end.
pub const DEAD_END_GRAMMAR: &str = "
s -> a | b
a -> 'x' c
b -> 'y'
";

#[cfg(test)]
mod tests;
