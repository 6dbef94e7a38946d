//! Usage-pattern tokenizer and matcher.
//!
//! A usage string such as `"ban <user> for <reason>"` is parsed once, at
//! command registration time, into an ordered sequence of [`Token`]s. Words
//! that begin with the `<` sentinel are parameters; everything else is a
//! literal that must match incoming text exactly, case-sensitively.
//!
//! Matching is all-or-nothing: either every literal lines up and every
//! parameter binds, or no bindings are produced at all. Patterns anchor to
//! the start of the input but not the end, so `"hi"` also matches
//! `"hi there"`; input words beyond the pattern are simply ignored. A
//! parameter in the final position binds greedily instead, folding any
//! trailing words into its value, which is what makes "rest of message"
//! style parameters work:
//!
//! ```
//! use switchboard_core::token::{match_tokens, tokenize};
//!
//! let tokens = tokenize("ban <user> for <reason>");
//! let props = match_tokens(&tokens, "ban alice for spamming the channel").unwrap();
//! assert_eq!(props.get("user"), Some("alice"));
//! assert_eq!(props.get("reason"), Some("spamming the channel"));
//! ```

use crate::properties::Properties;

/// The character that marks a usage word as a named parameter.
pub const PARAMETER_SENTINEL: char = '<';

/// One element of a tokenized usage pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word that must match the corresponding input word exactly.
    Literal(String),
    /// A named placeholder that binds the positionally-corresponding word.
    Parameter(String),
}

impl Token {
    /// Returns `true` for parameter tokens.
    pub fn is_parameter(&self) -> bool {
        matches!(self, Token::Parameter(_))
    }

    /// Returns the literal word or the parameter name.
    pub fn word(&self) -> &str {
        match self {
            Token::Literal(word) | Token::Parameter(word) => word,
        }
    }
}

/// Splits a usage string on whitespace into an ordered token sequence.
///
/// Parameter names are stored without their surrounding angle brackets.
pub fn tokenize(usage: &str) -> Vec<Token> {
    usage
        .split_whitespace()
        .map(|word| {
            if word.starts_with(PARAMETER_SENTINEL) {
                let name = word.trim_start_matches('<').trim_end_matches('>');
                Token::Parameter(name.to_string())
            } else {
                Token::Literal(word.to_string())
            }
        })
        .collect()
}

/// Matches `input` against a token sequence, extracting parameter bindings.
///
/// Returns `None` when the input has too few words or a literal mismatches.
/// Input words beyond the pattern are ignored, except that a parameter in
/// the final position folds them into its binding. An empty token sequence
/// matches only empty input.
pub fn match_tokens(tokens: &[Token], input: &str) -> Option<Properties> {
    let words: Vec<&str> = input.split_whitespace().collect();
    if tokens.is_empty() {
        return words.is_empty().then(Properties::new);
    }
    if words.len() < tokens.len() {
        return None;
    }

    let mut properties = Properties::new();
    for (position, token) in tokens.iter().enumerate() {
        match token {
            Token::Literal(word) => {
                if words[position] != word {
                    return None;
                }
            }
            Token::Parameter(name) => {
                let value = if position == tokens.len() - 1 {
                    words[position..].join(" ")
                } else {
                    words[position].to_string()
                };
                properties.insert(name.clone(), value);
            }
        }
    }

    Some(properties)
}
