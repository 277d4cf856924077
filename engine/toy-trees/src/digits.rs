//! Fixed-length digit strings.

use std::fmt;

use tree_core::TreeNode;

/// A prefix of a `length`-digit string over the digits `0..base`.
///
/// Every path has exactly `length + 1` nodes and every internal node has
/// `base` children, which makes budgets and solved states easy to predict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DigitString {
    digits: String,
    length: usize,
    base: u32,
}

impl DigitString {
    /// Empty prefix.
    ///
    /// # Panics
    /// Panics if `base` is not in `1..=10`.
    pub fn root(length: usize, base: u32) -> Self {
        assert!((1..=10).contains(&base), "digit base must be in 1..=10");
        Self {
            digits: String::new(),
            length,
            base,
        }
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }
}

impl fmt::Display for DigitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.digits)
    }
}

impl TreeNode for DigitString {
    fn is_terminal(&self) -> bool {
        self.digits.len() >= self.length
    }

    fn children(&self) -> Vec<Self> {
        (0..self.base)
            .filter_map(|d| char::from_digit(d, 10))
            .map(|c| {
                let mut digits = self.digits.clone();
                digits.push(c);
                Self {
                    digits,
                    length: self.length,
                    base: self.base,
                }
            })
            .collect()
    }
}
