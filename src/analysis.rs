//! Text normalization shared by index builds and queries.
//!
//! Queries must be normalized with the same stemming and stopword flags the
//! index was built with, so both sides go through a [`TextNormalizer`].

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use stop_words::LANGUAGE;

use crate::error::{PostlineError, Result};

/// Turns raw text into index tokens.
pub trait TextNormalizer: Send + Sync + fmt::Debug {
    /// Normalize `text`; `stemming` applies stemming, `keep_stopwords`
    /// retains stopwords.
    fn normalize(&self, text: &str, stemming: bool, keep_stopwords: bool) -> Vec<String>;
}

/// Lowercased alphanumeric words with optional English stopword removal and
/// Snowball (Porter2) stemming.
pub struct StandardNormalizer {
    non_alphanumeric: Regex,
    stemmer: Stemmer,
    stopwords: HashSet<String>,
}

impl StandardNormalizer {
    pub fn new() -> Result<Self> {
        let non_alphanumeric = Regex::new(r"[^a-zA-Z0-9\s]")
            .map_err(|e| PostlineError::other(format!("invalid normalization pattern: {e}")))?;
        let stopwords = stop_words::get(LANGUAGE::English)
            .iter()
            .map(|word| word.to_lowercase())
            .collect();

        Ok(StandardNormalizer {
            non_alphanumeric,
            stemmer: Stemmer::create(Algorithm::English),
            stopwords,
        })
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }
}

impl fmt::Debug for StandardNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardNormalizer")
            .field("pattern", &self.non_alphanumeric.as_str())
            .field("stemmer", &"<english>")
            .field("stopwords", &self.stopwords.len())
            .finish()
    }
}

impl TextNormalizer for StandardNormalizer {
    fn normalize(&self, text: &str, stemming: bool, keep_stopwords: bool) -> Vec<String> {
        let cleaned = self.non_alphanumeric.replace_all(text, " ");
        cleaned
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|word| keep_stopwords || !self.stopwords.contains(word))
            .map(|word| {
                if stemming {
                    self.stemmer.stem(&word).into_owned()
                } else {
                    word
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_and_case() {
        let normalizer = StandardNormalizer::new().unwrap();
        let tokens = normalizer.normalize("Hello, World!  It's 2024.", false, true);
        assert_eq!(tokens, vec!["hello", "world", "it", "s", "2024"]);
    }

    #[test]
    fn test_stopword_removal() {
        let normalizer = StandardNormalizer::new().unwrap();
        assert!(normalizer.is_stopword("the"));
        let tokens = normalizer.normalize("the cat and the hat", false, false);
        assert_eq!(tokens, vec!["cat", "hat"]);
    }

    #[test]
    fn test_stemming() {
        let normalizer = StandardNormalizer::new().unwrap();
        let tokens = normalizer.normalize("running runs connected", true, true);
        assert_eq!(tokens, vec!["run", "run", "connect"]);
    }

    #[test]
    fn test_empty_text() {
        let normalizer = StandardNormalizer::new().unwrap();
        assert!(normalizer.normalize("  ,;! ", true, false).is_empty());
    }
}
