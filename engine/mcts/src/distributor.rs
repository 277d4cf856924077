//! Walk budget allocation across root depths.
//!
//! The search may spend its whole budget from the tree root, or walk down
//! the tree one root at a time, spending a share of the budget at each depth
//! before moving to the most promising child. The distributor decides when
//! that move happens.
//!
//! Before each walk the search calls [`ResourceDistributor::consume_one_unit`];
//! after each walk it asks [`ResourceDistributor::go_to_children`] whether to
//! descend and [`ResourceDistributor::still_has_budget`] whether to go on.

use rand::Rng;
use tracing::{debug, info};
use tree_core::{TreeNode, TreeSampler};

use crate::config::{AllocationConfig, AllocationStrategy};
use crate::node::NodeId;
use crate::tree::CounterTree;

/// Per-depth walk budget bookkeeping.
#[derive(Debug, Clone)]
pub struct ResourceDistributor {
    config: AllocationConfig,

    /// Estimated mean depth of the tree (uniform and linear strategies).
    mean_depth: Option<usize>,

    /// Linear quota `a * shrink * depth + b`.
    slope: f64,
    intercept: f64,

    total: usize,
    consumed: usize,

    depth: usize,
    position: NodeId,
    quota_at_depth: usize,
    consumed_at_depth: usize,
}

impl ResourceDistributor {
    pub fn new(config: AllocationConfig) -> Self {
        Self {
            config,
            mean_depth: None,
            slope: 0.0,
            intercept: 0.0,
            total: 0,
            consumed: 0,
            depth: 1,
            position: NodeId::NONE,
            quota_at_depth: 0,
            consumed_at_depth: 0,
        }
    }

    #[inline]
    pub fn strategy(&self) -> AllocationStrategy {
        self.config.strategy
    }

    /// Set the total budget, sampling the tree's shape when the strategy
    /// needs its mean depth.
    pub fn initialize<N: TreeNode, R: Rng + ?Sized>(
        &mut self,
        total_budget: usize,
        root: &N,
        rng: &mut R,
    ) {
        info!(strategy = %self.config.strategy, total_budget, "Initializing resource distributor");

        let mean_depth = match self.config.strategy {
            AllocationStrategy::Uniform | AllocationStrategy::Linear => {
                let mut sampler = TreeSampler::new(root.clone());
                sampler.accumulate_stats(self.config.stats_samples.max(1), rng);
                debug!(
                    depths = ?sampler.depths_info(),
                    branching_factors = ?sampler.branching_factors_info(),
                    "Tree statistics"
                );
                sampler.mean_depth()
            }
            AllocationStrategy::AllFromRoot | AllocationStrategy::Dynamic => 1,
        };

        self.initialize_with_depth(total_budget, mean_depth);
    }

    /// Set the total budget with a known mean depth, skipping the sampling.
    pub fn initialize_with_depth(&mut self, total_budget: usize, mean_depth: usize) {
        self.mean_depth = Some(mean_depth.max(1));
        self.reset_remaining(total_budget);
    }

    /// Start a fresh search with `budget` walks, keeping the shape estimate.
    ///
    /// The linear quotas are refitted to the new budget.
    pub fn reset_remaining(&mut self, budget: usize) {
        self.total = budget;
        self.consumed = 0;
        self.fit_linear();
    }

    fn fit_linear(&mut self) {
        let mean_depth = self.mean_depth.unwrap_or(1);
        if self.config.strategy != AllocationStrategy::Linear || mean_depth <= 1 {
            self.slope = 0.0;
            self.intercept = 0.0;
            return;
        }
        let d = mean_depth as f64;
        let r = self.total as f64;
        self.slope = 2.0 / (1.0 - d) * (r / d);
        self.intercept = -2.0 / (1.0 - d) * r;
    }

    #[inline]
    pub fn still_has_budget(&self) -> bool {
        self.consumed < self.total
    }

    /// Record one walk.
    ///
    /// # Panics
    /// Panics if the budget is already exhausted.
    pub fn consume_one_unit(&mut self) {
        assert!(
            self.still_has_budget(),
            "walk consumed after the budget of {} was exhausted",
            self.total
        );
        self.consumed += 1;
        self.consumed_at_depth += 1;
    }

    /// Move the search root to `node` at `depth` (the tree root is depth 1).
    ///
    /// # Panics
    /// Panics if the strategy is `AllFromRoot` and `depth` is not 1, or if the
    /// distributor was not initialized.
    pub fn set_new_position(&mut self, depth: usize, node: NodeId) {
        self.depth = depth;
        self.position = node;
        self.consumed_at_depth = 0;
        self.quota_at_depth = self.compute_quota(depth);

        match self.config.strategy {
            AllocationStrategy::Dynamic => {
                info!(depth, "Walks at this depth are computed dynamically")
            }
            _ => info!(depth, quota = self.quota_at_depth, "Walks allocated at this depth"),
        }
    }

    fn compute_quota(&self, depth: usize) -> usize {
        let floor = self.config.min_walks_per_depth;
        let mean_depth = self
            .mean_depth
            .unwrap_or_else(|| panic!("resource distributor used before initialize"));

        match self.config.strategy {
            AllocationStrategy::AllFromRoot => {
                assert_eq!(
                    depth, 1,
                    "all_from_root allocation requested at depth {}",
                    depth
                );
                self.total
            }
            AllocationStrategy::Uniform => {
                let spread = self.config.depth_shrink * mean_depth as f64;
                let quota = (self.total as f64 / spread).round();
                (quota.max(0.0) as usize).max(floor)
            }
            AllocationStrategy::Linear if mean_depth <= 1 => self.total.max(floor),
            AllocationStrategy::Linear => {
                let quota =
                    (self.slope * self.config.depth_shrink * depth as f64 + self.intercept).trunc();
                (quota.max(0.0) as usize).max(floor)
            }
            // Unused: the dynamic strategy looks at the children instead.
            AllocationStrategy::Dynamic => self.total,
        }
    }

    /// Walks allowed at the current depth.
    #[inline]
    pub fn quota_at_depth(&self) -> usize {
        self.quota_at_depth
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    #[inline]
    pub fn total_budget(&self) -> usize {
        self.total
    }

    /// Whether the search should move its root to a child now.
    ///
    /// Always false once the budget is exhausted.
    pub fn go_to_children<N: TreeNode>(&self, tree: &CounterTree<N>) -> bool {
        if !self.still_has_budget() {
            return false;
        }

        if self.config.strategy != AllocationStrategy::Dynamic {
            return self.consumed_at_depth >= self.quota_at_depth;
        }

        let children = tree.get(self.position).children();
        match children.len() {
            0 => false,
            1 => true,
            _ => {
                let mut sums: Vec<f64> = children
                    .iter()
                    .map(|&c| tree.get(c).sum_rewards)
                    .collect();
                sums.sort_by(|a, b| b.total_cmp(a));
                sums[0] >= self.config.dynamic_ratio * (sums[1] + self.config.dynamic_smoothing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use toy_trees::DigitString;

    fn distributor(strategy: AllocationStrategy) -> ResourceDistributor {
        ResourceDistributor::new(AllocationConfig::new(strategy))
    }

    #[test]
    fn test_uniform_quota() {
        let mut d = distributor(AllocationStrategy::Uniform);
        d.initialize_with_depth(100, 5);
        d.set_new_position(1, NodeId(0));
        assert_eq!(d.quota_at_depth(), 25);

        let tree = CounterTree::new(DigitString::root(4, 2));
        for _ in 0..24 {
            d.consume_one_unit();
            assert!(!d.go_to_children(&tree));
        }
        d.consume_one_unit();
        assert!(d.go_to_children(&tree));

        d.set_new_position(2, NodeId(1));
        assert!(!d.go_to_children(&tree));
    }

    #[test]
    fn test_uniform_quota_floor() {
        let mut d = distributor(AllocationStrategy::Uniform);
        d.initialize_with_depth(1, 10);
        d.set_new_position(1, NodeId(0));
        assert_eq!(d.quota_at_depth(), 1);
    }

    #[test]
    fn test_uniform_initialize_samples_the_tree() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut d = distributor(AllocationStrategy::Uniform);
        // Every rollout of a 4-digit string stops at depth 5.
        d.initialize(100, &DigitString::root(4, 3), &mut rng);
        d.set_new_position(1, NodeId(0));
        assert_eq!(d.quota_at_depth(), 25);
    }

    #[test]
    fn test_linear_quota_decreases() {
        let mut d = distributor(AllocationStrategy::Linear);
        d.initialize_with_depth(100, 5);

        let quotas: Vec<usize> = (1..=7)
            .map(|depth| {
                d.set_new_position(depth, NodeId(0));
                d.quota_at_depth()
            })
            .collect();
        assert_eq!(quotas, vec![42, 34, 26, 18, 10, 2, 1]);
    }

    #[test]
    fn test_linear_single_depth_spends_everything_at_root() {
        let mut d = distributor(AllocationStrategy::Linear);
        d.initialize_with_depth(30, 1);
        d.set_new_position(1, NodeId(0));
        assert_eq!(d.quota_at_depth(), 30);
    }

    #[test]
    fn test_all_from_root_never_descends() {
        let tree = CounterTree::new(DigitString::root(2, 2));
        let mut d = distributor(AllocationStrategy::AllFromRoot);
        d.initialize_with_depth(10, 1);
        d.set_new_position(1, tree.root());

        while d.still_has_budget() {
            d.consume_one_unit();
            assert!(!d.go_to_children(&tree));
        }
        assert_eq!(d.consumed(), 10);
    }

    #[test]
    #[should_panic(expected = "all_from_root allocation requested at depth 2")]
    fn test_all_from_root_rejects_deeper_positions() {
        let mut d = distributor(AllocationStrategy::AllFromRoot);
        d.initialize_with_depth(10, 1);
        d.set_new_position(2, NodeId(1));
    }

    #[test]
    #[should_panic(expected = "budget of 2 was exhausted")]
    fn test_consume_past_budget_panics() {
        let mut d = distributor(AllocationStrategy::AllFromRoot);
        d.initialize_with_depth(2, 1);
        d.set_new_position(1, NodeId(0));
        for _ in 0..3 {
            d.consume_one_unit();
        }
    }

    #[test]
    fn test_dynamic_ratio() {
        let mut tree = CounterTree::new(DigitString::root(2, 3));
        let root = tree.root();
        tree.expand(root);
        let c = tree.get(root).children().to_vec();
        tree.get_mut(c[0]).sum_rewards = 2.0;
        tree.get_mut(c[1]).sum_rewards = 10.0;
        tree.get_mut(c[2]).sum_rewards = 1.0;

        let mut d = ResourceDistributor::new(
            AllocationConfig::new(AllocationStrategy::Dynamic).with_dynamic_ratio(2.0),
        );
        d.initialize_with_depth(100, 1);
        d.set_new_position(1, root);
        d.consume_one_unit();
        assert!(d.go_to_children(&tree));

        // 10 < 2 * (5 + 1)
        tree.get_mut(c[0]).sum_rewards = 5.0;
        assert!(!d.go_to_children(&tree));
    }

    #[test]
    fn test_dynamic_single_child_descends() {
        let mut tree = CounterTree::new(DigitString::root(2, 1));
        let root = tree.root();
        let mut d = distributor(AllocationStrategy::Dynamic);
        d.initialize_with_depth(10, 1);
        d.set_new_position(1, root);
        assert!(!d.go_to_children(&tree));

        tree.expand(root);
        assert!(d.go_to_children(&tree));
    }

    #[test]
    fn test_no_descent_once_budget_is_spent() {
        let mut tree = CounterTree::new(DigitString::root(2, 1));
        let root = tree.root();
        tree.expand(root);
        let mut d = distributor(AllocationStrategy::Dynamic);
        d.initialize_with_depth(1, 1);
        d.set_new_position(1, root);
        d.consume_one_unit();
        assert!(!d.go_to_children(&tree));
    }

    #[test]
    fn test_reset_remaining() {
        let mut d = distributor(AllocationStrategy::Uniform);
        d.initialize_with_depth(100, 5);
        d.set_new_position(1, NodeId(0));
        d.consume_one_unit();

        d.reset_remaining(40);
        assert_eq!(d.consumed(), 0);
        assert_eq!(d.total_budget(), 40);
        d.set_new_position(1, NodeId(0));
        assert_eq!(d.quota_at_depth(), 10);
    }

    #[test]
    fn test_linear_refits_on_reset() {
        let mut d = distributor(AllocationStrategy::Linear);
        d.initialize_with_depth(2, 5);
        d.set_new_position(1, NodeId(0));
        assert_eq!(d.quota_at_depth(), 1);

        d.reset_remaining(100);
        let quotas: Vec<usize> = (1..=5)
            .map(|depth| {
                d.set_new_position(depth, NodeId(0));
                d.quota_at_depth()
            })
            .collect();
        assert_eq!(quotas, vec![42, 34, 26, 18, 10]);
    }

    #[test]
    fn test_strategies_never_exceed_budget() {
        // A dominant first child makes the dynamic strategy descend every walk.
        let mut tree = CounterTree::new(DigitString::root(3, 2));
        let root = tree.root();
        tree.expand(root);
        let first = tree.get(root).children()[0];
        tree.get_mut(first).sum_rewards = 10.0;

        for strategy in [
            AllocationStrategy::Uniform,
            AllocationStrategy::Linear,
            AllocationStrategy::AllFromRoot,
            AllocationStrategy::Dynamic,
        ] {
            let mut d = distributor(strategy);
            d.initialize_with_depth(37, 4);
            let mut depth = 1;
            d.set_new_position(depth, tree.root());
            while d.still_has_budget() {
                d.consume_one_unit();
                if d.go_to_children(&tree) {
                    depth += 1;
                    d.set_new_position(depth, tree.root());
                }
            }
            assert_eq!(d.consumed(), 37, "{}", strategy);
        }
    }
}
