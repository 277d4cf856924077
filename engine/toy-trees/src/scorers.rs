//! Cheap scoring functions over leaf identities.
//!
//! Scores are computed from the identity string alone, the same way a real
//! scoring model only ever sees the rendered leaf.

/// Mean digit value of a [`DigitString`](crate::DigitString) identity,
/// normalised to `[0, 1]`. Non-digit characters are ignored.
pub fn digit_mean(identity: &str) -> f64 {
    let digits: Vec<u32> = identity.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.is_empty() {
        return 0.0;
    }
    digits.iter().sum::<u32>() as f64 / (9.0 * digits.len() as f64)
}

/// Fraction of `keywords` that occur as words of `sentence`.
pub fn keyword_fraction(sentence: &str, keywords: &[&str]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let hits = keywords
        .iter()
        .filter(|k| sentence.split_whitespace().any(|w| w == **k))
        .count();
    hits as f64 / keywords.len() as f64
}

/// Lift a per-leaf score into a batch scorer.
pub fn batched<F>(score: F) -> impl FnMut(&[String]) -> Vec<f64> + Clone + Send
where
    F: Fn(&str) -> f64 + Clone + Send,
{
    move |leaves: &[String]| leaves.iter().map(|leaf| score(leaf)).collect()
}

/// Batch scorer returning `value` for every leaf.
pub fn constant(value: f64) -> impl FnMut(&[String]) -> Vec<f64> + Clone + Send {
    batched(move |_: &str| value)
}
