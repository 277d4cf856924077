//! Leftmost derivations of a small context-free grammar.
//!
//! Rules are written one per line as `lhs -> alt | alt`, where quoted tokens
//! (`'word'`, without angle brackets) are words and bare tokens are rule
//! names. The first rule's left-hand side is the start symbol. A rule name
//! without productions is legal and makes every derivation that needs it a
//! dead end.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thiserror::Error;
use tree_core::TreeNode;

/// Errors raised while parsing a grammar.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("line {0}: missing '->'")]
    MissingArrow(usize),

    #[error("line {0}: empty left-hand side")]
    EmptyLhs(usize),

    #[error("line {0}: unterminated quote in '{1}'")]
    UnterminatedQuote(usize, String),

    #[error("line {0}: word '{1}' contains an angle bracket")]
    AngleBracketInWord(usize, String),

    #[error("grammar has no rules")]
    Empty,
}

/// A grammar symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Word(String),
    Rule(String),
}

impl Symbol {
    #[inline]
    pub fn is_word(&self) -> bool {
        matches!(self, Symbol::Word(_))
    }
}

/// Parsed grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    rules: HashMap<String, Vec<Vec<Symbol>>>,
    start: String,
}

impl Grammar {
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        let mut rules: HashMap<String, Vec<Vec<Symbol>>> = HashMap::new();
        let mut start = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (lhs, rhs) = line
                .split_once("->")
                .ok_or(GrammarError::MissingArrow(line_no))?;
            let lhs = lhs.trim();
            if lhs.is_empty() {
                return Err(GrammarError::EmptyLhs(line_no));
            }

            let productions = rules.entry(lhs.to_string()).or_default();
            for alternative in rhs.split('|') {
                let mut production = Vec::new();
                for token in alternative.split_whitespace() {
                    production.push(parse_symbol(token, line_no)?);
                }
                productions.push(production);
            }

            start.get_or_insert_with(|| lhs.to_string());
        }

        let start = start.ok_or(GrammarError::Empty)?;
        Ok(Self { rules, start })
    }

    /// Start symbol name.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Productions of `rule`; empty when the rule is undefined.
    pub fn productions(&self, rule: &str) -> &[Vec<Symbol>] {
        self.rules.get(rule).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn parse_symbol(token: &str, line_no: usize) -> Result<Symbol, GrammarError> {
    if let Some(rest) = token.strip_prefix('\'') {
        let word = rest
            .strip_suffix('\'')
            .ok_or_else(|| GrammarError::UnterminatedQuote(line_no, token.to_string()))?;
        // Angle brackets mark rule names in the rendered form.
        if word.contains(['<', '>']) {
            return Err(GrammarError::AngleBracketInWord(line_no, word.to_string()));
        }
        Ok(Symbol::Word(word.to_string()))
    } else {
        Ok(Symbol::Rule(token.to_string()))
    }
}

/// A sentential form reached by leftmost derivation from the start symbol.
///
/// Equality and hashing look at the symbols only, which the `Display` form
/// renders injectively (rule names are wrapped in angle brackets).
#[derive(Clone)]
pub struct Derivation {
    grammar: Arc<Grammar>,
    symbols: Vec<Symbol>,
}

impl Derivation {
    pub fn root(grammar: Arc<Grammar>) -> Self {
        let symbols = vec![Symbol::Rule(grammar.start().to_string())];
        Self { grammar, symbols }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

impl PartialEq for Derivation {
    fn eq(&self, other: &Self) -> bool {
        self.symbols == other.symbols
    }
}

impl Eq for Derivation {}

impl Hash for Derivation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbols.hash(state);
    }
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, symbol) in self.symbols.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match symbol {
                Symbol::Word(word) => f.write_str(word)?,
                Symbol::Rule(rule) => write!(f, "<{}>", rule)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Derivation({})", self)
    }
}

impl TreeNode for Derivation {
    fn is_terminal(&self) -> bool {
        self.symbols.iter().all(Symbol::is_word)
    }

    fn children(&self) -> Vec<Self> {
        let Some(position) = self.symbols.iter().position(|s| !s.is_word()) else {
            return Vec::new();
        };
        let Symbol::Rule(rule) = &self.symbols[position] else {
            return Vec::new();
        };

        self.grammar
            .productions(rule)
            .iter()
            .map(|production| {
                let mut symbols = Vec::with_capacity(self.symbols.len() + production.len());
                symbols.extend_from_slice(&self.symbols[..position]);
                symbols.extend(production.iter().cloned());
                symbols.extend_from_slice(&self.symbols[position + 1..]);
                Self {
                    grammar: Arc::clone(&self.grammar),
                    symbols,
                }
            })
            .collect()
    }
}
