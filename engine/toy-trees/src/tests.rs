use super::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use tree_core::{rollout, TreeNode};

fn grammar(text: &str) -> Arc<Grammar> {
    Arc::new(Grammar::parse(text).unwrap())
}

#[test]
fn test_parse_grammar() {
    let g = Grammar::parse(SENTENCE_GRAMMAR).unwrap();
    assert_eq!(g.start(), "s");
    assert_eq!(g.productions("onp").len(), 2);
    assert_eq!(
        g.productions("subj")[0],
        vec![Symbol::Word("Bas".to_string())]
    );
    assert!(g.productions("missing").is_empty());
}

#[test]
fn test_parse_errors() {
    assert_eq!(Grammar::parse("s 'x'"), Err(GrammarError::MissingArrow(1)));
    assert_eq!(Grammar::parse("\n -> 'x'"), Err(GrammarError::EmptyLhs(2)));
    assert_eq!(Grammar::parse("# only comments"), Err(GrammarError::Empty));
    assert!(matches!(
        Grammar::parse("s -> 'x"),
        Err(GrammarError::UnterminatedQuote(1, _))
    ));
}

#[test]
fn test_words_cannot_look_like_rules() {
    assert_eq!(
        Grammar::parse("s -> a | '<a>'\na -> 'x'"),
        Err(GrammarError::AngleBracketInWord(1, "<a>".to_string()))
    );
    assert!(matches!(
        Grammar::parse("s -> 'x'\nt -> 'a>b'"),
        Err(GrammarError::AngleBracketInWord(2, _))
    ));

    let root = Derivation::root(grammar("s -> a\na -> 'x'"));
    assert_eq!(root.children()[0].to_string(), "<a>");
}

#[test]
fn test_fork_grammar_shape() {
    let root = Derivation::root(grammar(FORK_GRAMMAR));
    assert_eq!(root.to_string(), "<s>");
    assert!(!root.is_terminal());

    let children = root.children();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].to_string(), "<a>");
    assert_eq!(children[1].to_string(), "<b>");

    let leaf = &children[0].children()[0];
    assert!(leaf.is_terminal());
    assert_eq!(leaf.to_string(), "x");
    assert!(leaf.children().is_empty());
}

#[test]
fn test_equality_ignores_grammar_instance() {
    let g = grammar("s -> a a\na -> 'x'");
    let root = Derivation::root(g);
    let once = &root.children()[0];
    assert_eq!(once.to_string(), "<a> <a>");
    let twice = &once.children()[0].children()[0];
    assert_eq!(twice.to_string(), "x x");

    let other = Derivation::root(grammar("s -> a a\na -> 'x'")).children()[0].children()[0]
        .children()[0]
        .clone();
    assert_eq!(twice, &other);
    assert_eq!(twice.identity(), other.identity());
}

#[test]
fn test_dead_end_has_no_children() {
    let root = Derivation::root(grammar(DEAD_END_GRAMMAR));
    let branch_a = &root.children()[0];
    let stuck = &branch_a.children()[0];
    assert_eq!(stuck.to_string(), "x <c>");
    assert!(!stuck.is_terminal());
    assert!(stuck.children().is_empty());
}

#[test]
fn test_sentence_rollouts_are_sentences() {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let root = Derivation::root(grammar(SENTENCE_GRAMMAR));
    for _ in 0..20 {
        let leaf = rollout(&root, &mut rng).unwrap();
        assert!(leaf.is_terminal());
        assert!(leaf.to_string().contains("knows"));
    }
}

#[test]
fn test_digit_string_tree() {
    let root = DigitString::root(3, 4);
    assert_eq!(root.to_string(), "#");
    let children = root.children();
    assert_eq!(children.len(), 4);
    assert_eq!(children[3].digits(), "3");

    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let leaf = rollout(&root, &mut rng).unwrap();
    assert_eq!(leaf.digits().len(), 3);
}

#[test]
#[should_panic(expected = "digit base")]
fn test_digit_string_rejects_large_base() {
    let _ = DigitString::root(2, 11);
}

#[test]
fn test_digit_mean() {
    assert!((scorers::digit_mean("#99") - 1.0).abs() < 1e-9);
    assert!((scorers::digit_mean("#09") - 0.5).abs() < 1e-9);
    assert!(scorers::digit_mean("#").abs() < 1e-9);
}

#[test]
fn test_keyword_fraction() {
    let score = scorers::keyword_fraction("the man knows him", &["man", "Piet"]);
    assert!((score - 0.5).abs() < 1e-9);
    assert!(scorers::keyword_fraction("he knows", &[]).abs() < 1e-9);
}

#[test]
fn test_batched_scorer() {
    let mut scorer = scorers::batched(scorers::digit_mean);
    let scores = scorer(&["#9".to_string(), "#0".to_string()]);
    assert_eq!(scores.len(), 2);
    assert!((scores[0] - 1.0).abs() < 1e-9);
    assert!(scores[1].abs() < 1e-9);

    let mut constant = scorers::constant(0.25);
    assert_eq!(constant(&["a".to_string()]), vec![0.25]);
}
