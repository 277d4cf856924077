//! Core abstractions for searching implicitly-defined trees.
//!
//! This crate provides the pieces every tree search in the workspace shares:
//! - [`TreeNode`]: the capability a tree must expose to be searched (terminal
//!   test, children, uniform random child, stable identity)
//! - [`rollout`]: a uniform random descent from a node to a terminal leaf
//! - [`TreeSampler`]: random rollouts that estimate the depth and branching
//!   factor of a tree, used to budget a search across depths
//!
//! The search engine never looks inside a node. Two nodes are the same node
//! exactly when their identities (their `Display` strings) are equal, so the
//! `Eq` and `Hash` implementations must agree with `Display`.

pub mod node;
pub mod sampler;

pub use node::{rollout, TreeNode};
pub use sampler::{ShapeSummary, TreeSampler};
