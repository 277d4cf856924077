//! The tree node capability consumed by every search strategy.

use std::fmt;
use std::hash::Hash;

use rand::seq::IteratorRandom;
use rand::Rng;

/// A node of an implicitly-defined tree.
///
/// Implementations are immutable from the search's perspective. Equality and
/// hashing must be consistent with the `Display` representation, which is
/// used as the node identity (memoisation key, worker wire format).
pub trait TreeNode: Clone + Eq + Hash + fmt::Display + fmt::Debug {
    /// Whether this node is a leaf of the tree.
    fn is_terminal(&self) -> bool;

    /// Children of this node, in a stable order.
    ///
    /// Only meaningful on non-terminal nodes. An empty vector on a
    /// non-terminal node marks a dead end: no leaf is reachable from it.
    fn children(&self) -> Vec<Self>;

    /// Uniformly pick one child.
    ///
    /// Returns `None` when the node is a dead end.
    ///
    /// # Panics
    /// Panics when called on a terminal node.
    fn random_children<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Self> {
        assert!(
            !self.is_terminal(),
            "random_children requested on terminal node <{}>",
            self
        );
        self.children().into_iter().choose(rng)
    }

    /// Stable identity string.
    #[inline]
    fn identity(&self) -> String {
        self.to_string()
    }
}

/// Descend uniformly at random from `node` until a terminal node is reached.
///
/// A terminal `node` is its own rollout. Returns `None` if the descent runs
/// into a dead end before reaching a leaf.
pub fn rollout<N: TreeNode, R: Rng + ?Sized>(node: &N, rng: &mut R) -> Option<N> {
    let mut current = node.clone();
    while !current.is_terminal() {
        current = current.random_children(rng)?;
    }
    Some(current)
}
