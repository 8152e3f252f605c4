//! Keyword and number classification of recognized text tokens.
//!
//! Every token is mapped to exactly one [`TokenClass`]. Command keywords are
//! checked first (print, then reset); only then is the first numeric
//! substring extracted. The classifier checks lexical shape only: it never
//! looks at slot availability or value ranges.
//!
//! Keywords and tokens are compared in NFC, so decomposed input such as
//! `"xo\u{301}a"` matches the keyword `"xóa"`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use printqc_core::config::KeywordConfig;
use printqc_core::types::KeywordMatch;

/// Classification of a single text token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum TokenClass {
    Print,
    Reset,
    /// A decimal number with its separator normalized to `.`.
    Number(String),
    Unrecognized,
}

/// Compiled keyword sets plus the number pattern.
#[derive(Debug, Clone)]
pub struct Classifier {
    print: Vec<Vec<String>>,
    reset: Vec<Vec<String>>,
    match_mode: KeywordMatch,
    number: Regex,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&KeywordConfig::default())
    }
}

impl Classifier {
    /// Build a classifier from configured keyword sets.
    pub fn new(config: &KeywordConfig) -> Self {
        Self {
            print: compile_keywords(&config.print),
            reset: compile_keywords(&config.reset),
            match_mode: config.match_mode,
            number: Regex::new(r"[0-9]+(?:[.,][0-9]+)?").expect("Invalid number regex"),
        }
    }

    /// Classify a token. Surrounding whitespace and case are ignored.
    pub fn classify(&self, text: &str) -> TokenClass {
        let text = normalize(text);
        if text.is_empty() {
            return TokenClass::Unrecognized;
        }

        let words = split_words(&text);
        if self.matches_any(&self.print, &text, &words) {
            return TokenClass::Print;
        }
        if self.matches_any(&self.reset, &text, &words) {
            return TokenClass::Reset;
        }

        match self.number.find(&text) {
            Some(m) => TokenClass::Number(m.as_str().replace(',', ".")),
            None => TokenClass::Unrecognized,
        }
    }

    fn matches_any(&self, keywords: &[Vec<String>], text: &str, words: &[&str]) -> bool {
        keywords.iter().any(|keyword| match self.match_mode {
            KeywordMatch::Substring => text.contains(&keyword.join(" ")),
            KeywordMatch::Word => contains_sequence(words, keyword),
        })
    }
}

/// Lowercase each keyword and split it into words; blank keywords are dropped.
fn compile_keywords(keywords: &[String]) -> Vec<Vec<String>> {
    keywords
        .iter()
        .map(|k| {
            split_words(&normalize(k))
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|words| !words.is_empty())
        .collect()
}

/// Trim, compose to NFC and lowercase.
fn normalize(text: &str) -> String {
    text.trim().nfc().collect::<String>().to_lowercase()
}

/// Combining marks stay inside a word even when they have no composed form.
fn split_words(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || is_combining_mark(c)))
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_sequence(words: &[&str], keyword: &[String]) -> bool {
    words
        .windows(keyword.len())
        .any(|window| window.iter().zip(keyword).all(|(w, k)| *w == k.as_str()))
}
