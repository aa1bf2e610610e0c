//! Error types for the Postline library.
//!
//! All errors are represented by the [`PostlineError`] enum. Recoverable
//! conditions such as a token missing from the lexicon are not errors; they
//! surface as `Ok(None)` from the lookup functions instead.
//!
//! # Examples
//!
//! ```
//! use postline::error::{PostlineError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PostlineError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Postline operations.
#[derive(Error, Debug)]
pub enum PostlineError {
    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Index descriptor errors (missing paths, name mismatch, unusable state).
    #[error("Index error: {0}")]
    Index(String),

    /// Codec errors (unsupported compression mode, truncated bit streams).
    #[error("Codec error: {0}")]
    Codec(String),

    /// Malformed lines in lexicon, chunk, doc-stats or descriptor files.
    #[error("Format error: {0}")]
    Format(String),

    /// Query-related errors.
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PostlineError.
pub type Result<T> = std::result::Result<T, PostlineError>;

impl PostlineError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        PostlineError::Index(msg.into())
    }

    /// Create a new codec error.
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        PostlineError::Codec(msg.into())
    }

    /// Create a new format error.
    pub fn format<S: Into<String>>(msg: S) -> Self {
        PostlineError::Format(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        PostlineError::Query(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PostlineError::Config(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PostlineError::Other(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        PostlineError::Other(format!("Invalid argument: {}", msg.into()))
    }
}
