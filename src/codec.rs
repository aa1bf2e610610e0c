//! Integer compression for posting blocks.
//!
//! Posting blocks are stored either as ASCII text (`"g1,g2,...,gn f1,f2,...,fn\n"`)
//! or as a bit-packed stream of unary or Elias-gamma codes. Both codes are
//! self-delimiting and every valid code contains at least one zero bit, so the
//! 1-bit padding appended by [`pack_bits`] can never be mistaken for data.

pub mod bits;
pub mod block;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PostlineError, Result};

pub use bits::{BitReader, encode_gamma, encode_unary, pack_bits, unpack_bits};
pub use block::{PostingBlock, decode_posting_block, make_posting_block};

/// How posting blocks are written to the index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Comma separated ASCII gaps and frequencies.
    #[default]
    None,
    /// Unary codes, bit-packed.
    Unary,
    /// Elias-gamma codes, bit-packed.
    Gamma,
}

impl CompressionMode {
    /// Name used in descriptor files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMode::None => "none",
            CompressionMode::Unary => "unary",
            CompressionMode::Gamma => "gamma",
        }
    }

    /// Whether blocks are bit-packed binary rather than text.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, CompressionMode::None)
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionMode {
    type Err = PostlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "no" | "uncompressed" => Ok(CompressionMode::None),
            "unary" => Ok(CompressionMode::Unary),
            "gamma" => Ok(CompressionMode::Gamma),
            other => Err(PostlineError::codec(format!(
                "unsupported compression mode '{other}'"
            ))),
        }
    }
}
