//! Counter tree with arena allocation.
//!
//! The counter tree mirrors the part of the search space that has actually
//! been visited. Nodes are stored in a contiguous Vec and referenced by
//! NodeId indices; parent links are plain indices used for backpropagation
//! and solved propagation only.

use std::fmt::Write as _;

use tree_core::TreeNode;

use crate::config::SelectionPolicy;
use crate::node::{CounterNode, NodeId};

/// Counter tree with arena-based node storage.
#[derive(Debug)]
pub struct CounterTree<N> {
    /// Arena storing all nodes
    nodes: Vec<CounterNode<N>>,

    /// Root node index (always 0 after initialization)
    root: NodeId,
}

/// Summary statistics about the counter tree.
#[derive(Debug, Clone, Default)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u32,
    pub root_mean_reward: f64,
    pub max_depth: usize,
}

impl<N: TreeNode> CounterTree<N> {
    /// Create a new tree holding only `root`.
    pub fn new(root: N) -> Self {
        Self {
            nodes: vec![CounterNode::new(root, NodeId::NONE)],
            root: NodeId(0),
        }
    }

    /// Get the root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a reference to a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> &CounterNode<N> {
        &self.nodes[id.0 as usize]
    }

    /// Get a mutable reference to a node by ID.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut CounterNode<N> {
        &mut self.nodes[id.0 as usize]
    }

    /// Allocate a new node and return its ID.
    pub fn allocate(&mut self, node: CounterNode<N>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty (should never be true after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create one child counter per child of the wrapped node.
    ///
    /// Returns the number of children created; zero means a dead end.
    ///
    /// # Panics
    /// Panics if the node was already expanded or wraps a terminal node.
    pub fn expand(&mut self, id: NodeId) -> usize {
        let node = self.get(id);
        assert!(
            !node.is_expanded(),
            "expand called twice on <{}>",
            node.reference
        );
        assert!(
            !node.reference.is_terminal(),
            "expand called on terminal node <{}>",
            node.reference
        );

        let references = node.reference.children();
        let children: Vec<NodeId> = references
            .into_iter()
            .map(|child| self.allocate(CounterNode::new(child, id)))
            .collect();

        let created = children.len();
        self.get_mut(id).children = Some(children);
        created
    }

    /// Add `reward` to `id` and every ancestor up to the first frozen node.
    pub fn backpropagate(&mut self, id: NodeId, reward: f64, leaf: &N) {
        let mut current_id = id;

        while current_id.is_some() {
            let node = self.get_mut(current_id);
            if node.frozen {
                break;
            }

            node.sum_rewards += reward;
            node.sum_sq_rewards += reward * reward;
            if reward > node.top_reward {
                node.top_reward = reward;
                node.top_leaf = Some(leaf.clone());
            }

            current_id = node.parent;
        }
    }

    /// Mark `id` solved and propagate upward while every sibling is solved.
    ///
    /// Propagation stops below a frozen parent.
    pub fn set_as_solved(&mut self, id: NodeId) {
        let mut current_id = id;

        loop {
            self.get_mut(current_id).solved = true;

            let parent_id = self.get(current_id).parent;
            if parent_id.is_none() {
                break;
            }
            let parent = self.get(parent_id);
            if parent.frozen || parent.solved {
                break;
            }
            if !parent.children().iter().all(|&c| self.get(c).solved) {
                break;
            }
            current_id = parent_id;
        }
    }

    /// Stop all further statistic updates on `id`.
    pub fn freeze(&mut self, id: NodeId) {
        self.get_mut(id).frozen = true;
    }

    /// Child with the best `top_reward`; first one on ties.
    ///
    /// # Panics
    /// Panics if the node has no children.
    pub fn top_child(&self, id: NodeId) -> NodeId {
        self.first_max_child(id, |child| child.top_reward)
    }

    /// Child with the most visits; first one on ties.
    ///
    /// # Panics
    /// Panics if the node has no children.
    pub fn most_visited_child(&self, id: NodeId) -> NodeId {
        self.first_max_child(id, |child| child.count as f64)
    }

    fn first_max_child(&self, id: NodeId, key: impl Fn(&CounterNode<N>) -> f64) -> NodeId {
        let node = self.get(id);
        assert!(
            !node.children().is_empty(),
            "children requested on <{}> which has none",
            node.reference
        );

        let mut best = node.children()[0];
        let mut best_key = key(self.get(best));
        for &child in &node.children()[1..] {
            let k = key(self.get(child));
            if k > best_key {
                best = child;
                best_key = k;
            }
        }
        best
    }

    /// Pick the child to descend into during selection.
    ///
    /// Unvisited children come first, in order. Otherwise the unsolved child
    /// maximising `policy` wins, the first one on ties.
    ///
    /// # Panics
    /// Panics if every child is solved (or there are none).
    pub fn select_child(&self, id: NodeId, policy: &SelectionPolicy) -> NodeId {
        let node = self.get(id);

        if let Some(&unvisited) = node.children().iter().find(|&&c| self.get(c).count == 0) {
            return unvisited;
        }

        let mut best: Option<(NodeId, f64)> = None;
        for &child_id in node.children() {
            let child = self.get(child_id);
            if child.solved {
                continue;
            }
            let score = policy.score(child, node);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((child_id, score)),
            }
        }

        match best {
            Some((child_id, _)) => child_id,
            None => panic!(
                "selection requested on <{}> whose children are all solved",
                node.reference
            ),
        }
    }

    /// Path of node ids from the tree root down to `id`.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current_id = id;
        while current_id.is_some() {
            path.push(current_id);
            current_id = self.get(current_id).parent;
        }
        path.reverse();
        path
    }

    /// Get statistics about the tree.
    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);

        let mut max_depth = 0;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            for &child in self.get(id).children() {
                stack.push((child, depth + 1));
            }
        }

        TreeStats {
            total_nodes: self.nodes.len(),
            root_visits: root.count,
            root_mean_reward: root.mean_reward(),
            max_depth,
        }
    }

    /// Multi-line description of a node and its children, for debug logs.
    pub fn describe(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.describe_node(&mut out, id, "");

        let children = self.get(id).children();
        if !children.is_empty() {
            let _ = writeln!(out, "  has {} children", children.len());
            for (i, &child) in children.iter().enumerate() {
                let _ = writeln!(out, "  -- child {} --", i);
                self.describe_node(&mut out, child, "  ");
            }
        }
        out
    }

    fn describe_node(&self, out: &mut String, id: NodeId, indent: &str) {
        let node = self.get(id);
        let top_leaf = node
            .top_leaf
            .as_ref()
            .map(|leaf| leaf.to_string())
            .unwrap_or_else(|| "-".to_string());

        let _ = writeln!(out, "{}node: {}", indent, node.reference);
        let _ = writeln!(out, "{}  count: {}", indent, node.count);
        let _ = writeln!(out, "{}  average_reward: {:.4}", indent, node.mean_reward());
        let _ = writeln!(out, "{}  top_reward: {:.4}", indent, node.top_reward);
        let _ = writeln!(out, "{}  top_leaf: {}", indent, top_leaf);
        let _ = writeln!(
            out,
            "{}  solved: {}",
            indent,
            if node.solved { "yes" } else { "no" }
        );
    }
}
