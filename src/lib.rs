//! # postline
//!
//! A disk-resident inverted index for large collections of short documents.
//!
//! ## Features
//!
//! - Bounded-memory builds: sorted chunk files merged with a k-way merge
//! - Unary and gamma compressed posting blocks
//! - Ternary and skip search over sorted files that never get loaded into memory
//! - Conjunctive and disjunctive queries scored with TF-IDF, BM11, BM15 or BM25
//! - Parallel sharded builds

pub mod analysis;
pub mod build;
pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod evaluation;
pub mod index;
pub mod query;
pub mod search;

pub mod prelude {
    pub use crate::analysis::{StandardNormalizer, TextNormalizer};
    pub use crate::build::{BuildReport, IndexBuilder, build_index};
    pub use crate::codec::CompressionMode;
    pub use crate::config::{BuildConfig, IndexOptions, QueryConfig};
    pub use crate::error::{PostlineError, Result};
    pub use crate::index::IndexDescriptor;
    pub use crate::query::{JoinAlgorithm, QueryEngine, ScoringFunction, SearchHit};
    pub use crate::search::SearchMethod;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
