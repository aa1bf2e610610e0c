//! Term weighting functions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PostlineError, Result};

/// Scoring function applied to each (token, document) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringFunction {
    /// `(1 + ln tf) * idf`.
    TfIdf,
    /// BM25 with full length normalization (b = 1).
    Bm11,
    /// BM25 without length normalization, in the `idf * tf / (tf * k1)` form.
    Bm15,
    /// Okapi BM25.
    Bm25,
}

impl ScoringFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringFunction::TfIdf => "TFIDF",
            ScoringFunction::Bm11 => "BM11",
            ScoringFunction::Bm15 => "BM15",
            ScoringFunction::Bm25 => "BM25",
        }
    }

    /// Whether the weight depends on the document length.
    pub fn needs_doc_length(&self) -> bool {
        matches!(self, ScoringFunction::Bm11 | ScoringFunction::Bm25)
    }

    /// Weight of a token with frequency `tf` in a document of `doc_length`
    /// tokens.
    ///
    /// A zero `tf` always weighs 0, as does a length-normalized function when
    /// the document length or the collection average is unknown or zero.
    pub fn weight(
        &self,
        tf: u32,
        idf: f64,
        doc_length: Option<u64>,
        avg_doc_length: f64,
        params: &ScoringConfig,
    ) -> f64 {
        if tf == 0 {
            return 0.0;
        }
        let tf = tf as f64;
        let k1 = params.k1;

        match self {
            ScoringFunction::TfIdf => (1.0 + tf.ln()) * idf,
            ScoringFunction::Bm15 => idf * tf / (tf * k1),
            ScoringFunction::Bm11 | ScoringFunction::Bm25 => {
                let Some(ratio) = length_ratio(doc_length, avg_doc_length) else {
                    return 0.0;
                };
                let norm = if *self == ScoringFunction::Bm11 {
                    ratio
                } else {
                    1.0 - params.b + params.b * ratio
                };
                idf * tf / (tf + k1 * norm)
            }
        }
    }
}

fn length_ratio(doc_length: Option<u64>, avg_doc_length: f64) -> Option<f64> {
    match doc_length {
        Some(length) if length > 0 && avg_doc_length > 0.0 => Some(length as f64 / avg_doc_length),
        _ => None,
    }
}

impl fmt::Display for ScoringFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringFunction {
    type Err = PostlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tfidf" | "tf-idf" => Ok(ScoringFunction::TfIdf),
            "bm11" => Ok(ScoringFunction::Bm11),
            "bm15" => Ok(ScoringFunction::Bm15),
            "bm25" => Ok(ScoringFunction::Bm25),
            other => Err(PostlineError::config(format!(
                "unknown scoring function '{other}'"
            ))),
        }
    }
}

/// Inverse document frequency `ln(N / df)`, clamped at 0.
pub fn idf(total_docs: u64, doc_freq: u64) -> f64 {
    if total_docs == 0 || doc_freq == 0 {
        return 0.0;
    }
    (total_docs as f64 / doc_freq as f64).ln().max(0.0)
}

/// Tunable constants of the BM family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Term frequency saturation, in `[1.2, 2.0]`.
    pub k1: f64,
    /// Length normalization strength, in `[0, 1]`.
    pub b: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig { k1: 1.2, b: 0.75 }
    }
}

impl ScoringConfig {
    pub fn with_k1(mut self, k1: f64) -> Self {
        self.k1 = k1;
        self
    }

    pub fn with_b(mut self, b: f64) -> Self {
        self.b = b;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1.2..=2.0).contains(&self.k1) {
            return Err(PostlineError::config(format!(
                "k1 must lie in [1.2, 2.0], got {}",
                self.k1
            )));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(PostlineError::config(format!(
                "b must lie in [0, 1], got {}",
                self.b
            )));
        }
        Ok(())
    }
}
