//! Counter node representation.
//!
//! A counter node wraps one tree node with the statistics gathered by the
//! search: visits, reward sums, the best reward seen below it and the leaf
//! that produced it. Nodes live in a [`CounterTree`](crate::CounterTree)
//! arena and point to their parent by index.

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

/// A node in the counter tree.
#[derive(Debug, Clone)]
pub struct CounterNode<N> {
    /// Wrapped tree node
    pub reference: N,

    /// Parent node index (NONE for the search root)
    pub parent: NodeId,

    /// `None` until expanded; may be empty for a dead end.
    pub children: Option<Vec<NodeId>>,

    /// Number of selection passes through this node
    pub count: u32,

    pub sum_rewards: f64,

    pub sum_sq_rewards: f64,

    /// Best reward backpropagated through this node
    pub top_reward: f64,

    /// Leaf that produced `top_reward`
    pub top_leaf: Option<N>,

    /// No unevaluated leaf is reachable from here.
    pub solved: bool,

    /// Left behind by the search; backpropagation stops here.
    pub frozen: bool,
}

impl<N> CounterNode<N> {
    pub fn new(reference: N, parent: NodeId) -> Self {
        Self {
            reference,
            parent,
            children: None,
            count: 0,
            sum_rewards: 0.0,
            sum_sq_rewards: 0.0,
            top_reward: f64::NEG_INFINITY,
            top_leaf: None,
            solved: false,
            frozen: false,
        }
    }

    /// Mean reward, 0.0 if never visited.
    #[inline]
    pub fn mean_reward(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_rewards / self.count as f64
        }
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// Child ids, empty when not expanded.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or(&[])
    }
}
