//! Configuration for building and querying indexes.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::CompressionMode;
use crate::error::{PostlineError, Result};
use crate::query::{JoinAlgorithm, ScoringConfig, ScoringFunction};
use crate::search::SearchMethod;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| {
        PostlineError::config(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Options fixed when an index is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Apply Porter stemming to tokens.
    pub stemming: bool,

    /// Keep stopwords instead of dropping them.
    pub keep_stopwords: bool,

    /// Posting block encoding.
    pub compression: CompressionMode,

    /// Number of results returned per query.
    pub k: usize,

    /// Candidate combination; required before querying.
    pub algorithm: Option<JoinAlgorithm>,

    /// Weighting function; required before querying.
    pub scoring: Option<ScoringFunction>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            stemming: false,
            keep_stopwords: true,
            compression: CompressionMode::None,
            k: 10,
            algorithm: None,
            scoring: None,
        }
    }
}

impl IndexOptions {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn with_stemming(mut self, stemming: bool) -> Self {
        self.stemming = stemming;
        self
    }

    pub fn with_keep_stopwords(mut self, keep: bool) -> Self {
        self.keep_stopwords = keep;
        self
    }

    pub fn with_compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_algorithm(mut self, algorithm: JoinAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringFunction) -> Self {
        self.scoring = Some(scoring);
        self
    }
}

/// Configuration of an index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Distinct tokens buffered before a chunk is flushed.
    /// Values below 1 keep the whole build in memory.
    pub chunk_threshold: i64,

    /// Remove chunk files once they have been merged.
    pub delete_chunks: bool,

    /// Stop after this many source rows.
    pub max_documents: Option<u64>,

    /// Number of byte-range shards built in parallel.
    pub partitions: usize,

    /// Worker threads for sharded builds.
    /// If None, uses the number of CPU cores.
    pub threads: Option<usize>,

    /// Remove shard indexes after the global merge.
    pub delete_shards: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            chunk_threshold: 100_000,
            delete_chunks: true,
            max_documents: None,
            partitions: 1,
            threads: None,
            delete_shards: true,
        }
    }
}

impl BuildConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn with_chunk_threshold(mut self, threshold: i64) -> Self {
        self.chunk_threshold = threshold;
        self
    }

    pub fn with_delete_chunks(mut self, delete: bool) -> Self {
        self.delete_chunks = delete;
        self
    }

    pub fn with_max_documents(mut self, max_documents: u64) -> Self {
        self.max_documents = Some(max_documents);
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_delete_shards(mut self, delete: bool) -> Self {
        self.delete_shards = delete;
        self
    }

    /// Threshold as a distinct-token count, `None` when splitting is disabled.
    pub fn split_threshold(&self) -> Option<usize> {
        (self.chunk_threshold >= 1).then_some(self.chunk_threshold as usize)
    }

    /// Number of worker threads to use.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Configuration of a query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How the lexicon and doc-stats files are searched.
    pub search_method: SearchMethod,

    /// Initial step in bytes for skip search.
    pub skip_step: u64,

    /// Capacity of the lexicon lookup cache.
    pub cache_capacity: usize,

    /// BM parameters.
    pub scoring: ScoringConfig,

    /// Cache document lengths resolved during scoring.
    pub cache_doc_lengths: bool,

    /// Drop cached document lengths after every query.
    pub flush_doc_lengths_after_query: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            search_method: SearchMethod::Ternary,
            skip_step: 10_000,
            cache_capacity: 1000,
            scoring: ScoringConfig::default(),
            cache_doc_lengths: true,
            flush_doc_lengths_after_query: true,
        }
    }
}

impl QueryConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn with_search_method(mut self, method: SearchMethod) -> Self {
        self.search_method = method;
        self
    }

    pub fn with_skip_step(mut self, step: u64) -> Self {
        self.skip_step = step;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_doc_length_cache(mut self, enabled: bool, flush_after_query: bool) -> Self {
        self.cache_doc_lengths = enabled;
        self.flush_doc_lengths_after_query = flush_after_query;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        if self.cache_capacity == 0 {
            return Err(PostlineError::config("cache capacity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let build = BuildConfig::default();
        assert_eq!(build.split_threshold(), Some(100_000));
        assert!(build.delete_chunks);
        assert_eq!(build.partitions, 1);

        let query = QueryConfig::default();
        assert_eq!(query.search_method, SearchMethod::Ternary);
        assert_eq!(query.skip_step, 10_000);
        assert_eq!(query.scoring.k1, 1.2);
        assert_eq!(query.scoring.b, 0.75);
        assert!(query.validate().is_ok());

        let options = IndexOptions::default();
        assert_eq!(options.k, 10);
        assert!(options.algorithm.is_none());
    }

    #[test]
    fn test_disabled_splitting() {
        assert_eq!(BuildConfig::default().with_chunk_threshold(0).split_threshold(), None);
        assert_eq!(BuildConfig::default().with_chunk_threshold(-5).split_threshold(), None);
    }

    #[test]
    fn test_load_partial_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("query.json");
        fs::write(&path, r#"{"search_method": "skip", "scoring": {"k1": 1.5, "b": 0.5}}"#).unwrap();

        let config = QueryConfig::from_json_file(&path).unwrap();
        assert_eq!(config.search_method, SearchMethod::Skip);
        assert_eq!(config.scoring.k1, 1.5);
        assert_eq!(config.cache_capacity, 1000);

        let path = temp_dir.path().join("index.json");
        fs::write(&path, r#"{"compression": "gamma", "scoring": "bm25"}"#).unwrap();
        let options = IndexOptions::from_json_file(&path).unwrap();
        assert_eq!(options.compression, CompressionMode::Gamma);
        assert_eq!(options.scoring, Some(ScoringFunction::Bm25));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            BuildConfig::from_json_file(&path),
            Err(PostlineError::Json(_))
        ));
        assert!(BuildConfig::from_json_file(temp_dir.path().join("missing.json")).is_err());
    }
}
