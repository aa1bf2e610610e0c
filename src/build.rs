//! Index construction.
//!
//! Documents are tokenized into a bounded [`PostingBuffer`], flushed as sorted
//! chunk files and merged into one index and lexicon. A sharded build runs the
//! same pipeline per byte range of the collection and merges the shards.

pub mod buffer;
pub mod builder;
pub mod chunk;
pub mod merge;
pub mod shard;

use serde::{Deserialize, Serialize};

pub use buffer::PostingBuffer;
pub use builder::{IndexBuilder, build_index};
pub use chunk::{ChunkReader, PostingEntry, chunk_path, list_chunks, write_chunk};
pub use merge::{
    PostingSink, PostingStream, coalesce_postings, merge_chunks, merge_entries, write_sorted,
};
pub use shard::build_sharded;

/// Counters collected during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Source rows read, malformed ones included.
    pub rows_read: u64,
    pub documents_indexed: u64,
    /// Documents skipped because their doc id was already ingested.
    pub duplicates: u64,
    /// Malformed source rows.
    pub skipped_rows: u64,
    pub chunks_written: usize,
    /// Chunks whose write failed and whose postings were dropped.
    pub chunks_lost: usize,
    /// Distinct tokens written by the final merge.
    pub written_lines: u64,
}

impl BuildReport {
    /// Add the counters of a shard.
    pub fn absorb(&mut self, other: &BuildReport) {
        self.rows_read += other.rows_read;
        self.documents_indexed += other.documents_indexed;
        self.duplicates += other.duplicates;
        self.skipped_rows += other.skipped_rows;
        self.chunks_written += other.chunks_written;
        self.chunks_lost += other.chunks_lost;
    }
}
