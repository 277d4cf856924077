//! Upper confidence bound scores.
//!
//! Both scores assume the child and its parent have been visited at least
//! once; the search visits every child once before scoring any of them.

use crate::config::SelectionPolicy;
use crate::node::CounterNode;

/// Vanilla UCB1 (Kocsis and Szepesvári, "Bandit based Monte-Carlo Planning").
#[inline]
pub fn standard_ucb<N>(child: &CounterNode<N>, parent: &CounterNode<N>, k: f64) -> f64 {
    let count = child.count as f64;
    let mean = child.sum_rewards / count;
    mean + (k * (parent.count as f64 / count).ln()).sqrt()
}

/// Single-player UCB (Schadd et al., "Single-Player Monte-Carlo Tree Search").
///
/// Adds the possible deviation of the child's rewards to the standard score,
/// `d` keeping the bonus high for children with few, equal rewards.
#[inline]
pub fn single_player_ucb<N>(
    child: &CounterNode<N>,
    parent: &CounterNode<N>,
    c: f64,
    d: f64,
) -> f64 {
    let count = child.count as f64;
    let mean = child.sum_rewards / count;
    let exploration = (c * (parent.count as f64 / count).ln()).sqrt();
    // Rounding can leave the variance slightly negative when d == 0.
    let deviation = ((child.sum_sq_rewards - count * mean * mean + d).max(0.0) / count).sqrt();
    mean + exploration + deviation
}

impl SelectionPolicy {
    #[inline]
    pub fn score<N>(&self, child: &CounterNode<N>, parent: &CounterNode<N>) -> f64 {
        match *self {
            SelectionPolicy::Standard { k } => standard_ucb(child, parent, k),
            SelectionPolicy::SinglePlayer { c, d } => single_player_ucb(child, parent, c, d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    fn node(count: u32, sum: f64, sum_sq: f64) -> CounterNode<()> {
        let mut n = CounterNode::new((), NodeId::NONE);
        n.count = count;
        n.sum_rewards = sum;
        n.sum_sq_rewards = sum_sq;
        n
    }

    #[test]
    fn test_standard_ucb() {
        let parent = node(10, 0.0, 0.0);
        let child = node(5, 2.5, 0.0);
        let expected = 0.5 + (2.0f64).ln().sqrt();
        assert!((standard_ucb(&child, &parent, 1.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_standard_ucb_equal_counts_is_mean() {
        let parent = node(3, 0.0, 0.0);
        let child = node(3, 1.5, 0.0);
        assert!((standard_ucb(&child, &parent, 2.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_player_ucb() {
        let parent = node(8, 0.0, 0.0);
        let child = node(2, 1.0, 0.52);
        // mean 0.5, variance term (0.52 - 0.5 + 100) / 2
        let expected = 0.5 + (4.0f64).ln().sqrt() + (100.02f64 / 2.0).sqrt();
        let score = single_player_ucb(&child, &parent, 1.0, 100.0);
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_policy_dispatch() {
        let parent = node(8, 0.0, 0.0);
        let child = node(2, 1.0, 0.5);
        let standard = SelectionPolicy::Standard { k: 1.0 };
        let single = SelectionPolicy::SinglePlayer { c: 1.0, d: 0.0 };
        assert!((standard.score(&child, &parent) - standard_ucb(&child, &parent, 1.0)).abs() < 1e-12);
        assert!(
            (single.score(&child, &parent) - single_player_ucb(&child, &parent, 1.0, 0.0)).abs()
                < 1e-12
        );
    }

    #[test]
    fn test_variance_bonus_favors_spread_rewards() {
        let parent = node(10, 0.0, 0.0);
        let steady = node(2, 1.0, 0.5);
        let spread = node(2, 1.0, 1.0);
        assert!(
            single_player_ucb(&spread, &parent, 1.0, 0.0)
                > single_player_ucb(&steady, &parent, 1.0, 0.0)
        );
    }
}
