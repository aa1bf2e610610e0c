//! Query evaluation: posting fetch, candidate selection, scoring and ranking.

pub mod engine;
pub mod posting_list;
pub mod scoring;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PostlineError, Result};

pub use engine::{LookupStats, QueryEngine};
pub use posting_list::PostingList;
pub use scoring::{ScoringConfig, ScoringFunction, idf};

/// How per-token candidate sets are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinAlgorithm {
    /// Documents containing every query token (AND).
    Conjunctive,
    /// Documents containing at least one query token (OR).
    Disjunctive,
}

impl JoinAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinAlgorithm::Conjunctive => "conjunctive",
            JoinAlgorithm::Disjunctive => "disjunctive",
        }
    }
}

impl fmt::Display for JoinAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinAlgorithm {
    type Err = PostlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conjunctive" | "and" => Ok(JoinAlgorithm::Conjunctive),
            "disjunctive" | "or" => Ok(JoinAlgorithm::Disjunctive),
            other => Err(PostlineError::config(format!(
                "unknown join algorithm '{other}'"
            ))),
        }
    }
}

/// A ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The document ID.
    pub doc_id: u64,
    /// The accumulated score.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_algorithm_parsing() {
        assert_eq!(
            "Conjunctive".parse::<JoinAlgorithm>().unwrap(),
            JoinAlgorithm::Conjunctive
        );
        assert_eq!("or".parse::<JoinAlgorithm>().unwrap(), JoinAlgorithm::Disjunctive);
        assert!("xor".parse::<JoinAlgorithm>().is_err());
        assert_eq!(JoinAlgorithm::Disjunctive.to_string(), "disjunctive");
    }
}
