//! Search primitives over large sorted, newline-delimited files.
//!
//! The lexicon (sorted by token) and the doc-stats file (sorted by doc id for a
//! single build) are never loaded into memory. Lookups work on byte offsets:
//! a probe seeks somewhere in the file, snaps forward to the next line start
//! and compares the first field of that line with the key.

pub mod line_file;
pub mod skip;
pub mod ternary;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PostlineError, Result};

pub use line_file::LineFile;
pub use skip::skip_search;
pub use ternary::ternary_search;

/// Algorithm used to locate a key in a sorted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// Three-way partitioning of the byte interval.
    #[default]
    Ternary,
    /// Coarse-to-fine forward skipping.
    Skip,
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMethod::Ternary => f.write_str("ternary"),
            SearchMethod::Skip => f.write_str("skip"),
        }
    }
}

impl FromStr for SearchMethod {
    type Err = PostlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ternary" => Ok(SearchMethod::Ternary),
            "skip" | "skipping" => Ok(SearchMethod::Skip),
            other => Err(PostlineError::config(format!(
                "unknown search method '{other}'"
            ))),
        }
    }
}

/// A line found by a search.
///
/// `start..end` is the byte range of the line including its newline, so
/// `end` is the start offset of the following line (or the file length).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub start: u64,
    pub end: u64,
    pub line: String,
}

/// Key type stored in the first field of a sorted file.
///
/// Text keys compare lexicographically (lexicon tokens); numeric keys compare
/// as integers (doc ids), which differs from string order once ids have
/// different widths.
pub trait LineKey: Ord + fmt::Debug + Sized {
    fn from_field(field: &str) -> Result<Self>;
}

impl LineKey for String {
    fn from_field(field: &str) -> Result<Self> {
        Ok(field.to_string())
    }
}

impl LineKey for u64 {
    fn from_field(field: &str) -> Result<Self> {
        field
            .trim()
            .parse()
            .map_err(|_| PostlineError::format(format!("expected a numeric key, found '{field}'")))
    }
}

/// Parse the key of `line`, i.e. everything before the first `delimiter`.
pub fn line_key<K: LineKey>(line: &str, delimiter: char) -> Result<K> {
    let field = line.split(delimiter).next().unwrap_or_default();
    K::from_field(field)
}

/// Compare the key of `line` with `key`.
pub(crate) fn compare_line<K: LineKey>(line: &str, delimiter: char, key: &K) -> Result<Ordering> {
    Ok(line_key::<K>(line, delimiter)?.cmp(key))
}
