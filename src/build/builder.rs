//! Single-process index construction.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, trace, warn};

use crate::analysis::TextNormalizer;
use crate::build::BuildReport;
use crate::build::buffer::PostingBuffer;
use crate::build::chunk::{
    ChunkReader, PostingEntry, chunk_path, list_chunks, write_chunk, write_chunk_entries,
};
use crate::build::merge::{PostingStream, merge_chunks, write_sorted};
use crate::config::BuildConfig;
use crate::document::{Document, TsvDocumentSource};
use crate::error::Result;
use crate::index::{ContentIntervals, DocStat, DocStatsFile, DocStatsWriter, IndexDescriptor};

/// Feeds documents into an index: tokenize, buffer, flush chunks, merge.
#[derive(Debug)]
pub struct IndexBuilder<'a> {
    descriptor: IndexDescriptor,
    normalizer: &'a dyn TextNormalizer,
    buffer: PostingBuffer,
    stats: DocStatsWriter,
    chunk_dir: PathBuf,
    chunk_paths: Vec<PathBuf>,
    next_chunk: usize,
    delete_chunks: bool,
    report: BuildReport,
}

impl<'a> IndexBuilder<'a> {
    /// Prepare a build into `descriptor`.
    ///
    /// A descriptor that already records ingested documents is resumed: its
    /// doc-stats file is appended to, and the postings of earlier runs are
    /// carried into the final merge. Those are either the finished index,
    /// turned back into a chunk, or the chunks of an interrupted run. A fresh
    /// build clears the doc-stats file, stale chunks and any previous index.
    pub fn new(
        descriptor: IndexDescriptor,
        normalizer: &'a dyn TextNormalizer,
        config: &BuildConfig,
    ) -> Result<Self> {
        let (stats_path, index_path, lexicon_path) = {
            let paths = descriptor.require_paths()?;
            (
                paths.stats.to_path_buf(),
                paths.index.to_path_buf(),
                paths.lexicon.to_path_buf(),
            )
        };
        let resume = !descriptor.content.is_empty();
        let chunk_dir = descriptor.work_dir();
        fs::create_dir_all(&chunk_dir)?;
        let existing = list_chunks(&chunk_dir)?;

        let mut chunk_paths = Vec::new();
        if resume {
            info!(
                "Resuming index '{}' with {} documents already ingested",
                descriptor.name,
                descriptor.content.count()
            );
            if stats_path.exists() {
                let dropped = DocStatsFile::retain_ingested(&stats_path, &descriptor.content)?;
                if dropped > 0 {
                    warn!("Dropped {dropped} doc-stats lines of documents that were never recorded");
                }
            }

            if index_path.exists() {
                // Chunks next to a finished index are already merged into it.
                remove_chunks(&existing)?;
                let carried = chunk_path(&chunk_dir, 0);
                let stream =
                    PostingStream::open(&lexicon_path, &index_path, descriptor.compression, 0)?;
                let tokens = write_chunk_entries(&carried, stream)?;
                info!("Carried {tokens} tokens of the previous index into the build");
                fs::remove_file(&index_path)?;
                fs::remove_file(&lexicon_path)?;
                chunk_paths.push(carried);
            } else if !existing.is_empty() {
                info!("Picking up {} chunks of an interrupted build", existing.len());
                chunk_paths = existing.into_iter().map(|(_, path)| path).collect();
                // Only the newest chunk can hold documents the descriptor never recorded.
                if let Some(last) = chunk_paths.last() {
                    prune_chunk(last, &descriptor.content)?;
                }
            }
        } else {
            remove_chunks(&existing)?;
            for path in [&index_path, &lexicon_path] {
                if path.exists() {
                    debug!("Removing previous {}", path.display());
                    fs::remove_file(path)?;
                }
            }
        }
        let stats = DocStatsWriter::create(&stats_path, resume)?;
        let next_chunk = list_chunks(&chunk_dir)?
            .last()
            .map_or(0, |&(number, _)| number + 1);

        Ok(IndexBuilder {
            descriptor,
            normalizer,
            buffer: PostingBuffer::new(config.split_threshold()),
            stats,
            chunk_dir,
            chunk_paths,
            next_chunk,
            delete_chunks: config.delete_chunks,
            report: BuildReport::default(),
        })
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    /// Index one document. Returns `false` if its doc id was already ingested.
    pub fn add_document(&mut self, document: &Document) -> Result<bool> {
        let doc_id = document.doc_id();
        if !self.descriptor.content.insert(doc_id) {
            debug!("Skipping duplicate document {doc_id} ({})", document.external_id);
            self.report.duplicates += 1;
            return Ok(false);
        }

        let tokens = self.normalizer.normalize(
            &document.text,
            self.descriptor.stemming,
            self.descriptor.keep_stopwords,
        );
        trace!("Document {doc_id} has {} tokens", tokens.len());

        self.stats.write(&DocStat {
            doc_id,
            external_id: document.external_id.clone(),
            length: tokens.len() as u64,
        })?;
        self.buffer.add_document(doc_id, &tokens);
        self.descriptor.num_docs += 1;
        self.report.documents_indexed += 1;

        if self.buffer.is_full() {
            self.flush_chunk()?;
        }
        Ok(true)
    }

    /// Write the buffer as the next chunk file.
    ///
    /// A failed write is logged together with the buffered postings, which
    /// are then dropped.
    fn flush_chunk(&mut self) -> Result<()> {
        let path = chunk_path(&self.chunk_dir, self.next_chunk);
        self.next_chunk += 1;
        let entries = self.buffer.drain_sorted();

        match write_chunk(&path, &entries) {
            Ok(()) => {
                debug!("Wrote chunk {} with {} tokens", path.display(), entries.len());
                self.chunk_paths.push(path);
                self.report.chunks_written += 1;
            }
            Err(e) => {
                error!("Failed to write chunk {}: {e}", path.display());
                debug!("Dropped chunk contents: {entries:?}");
                self.report.chunks_lost += 1;
            }
        }

        self.stats.flush()?;
        self.descriptor.save()
    }

    /// Flush what is left, merge the chunks and persist the descriptor.
    pub fn finish(mut self) -> Result<(IndexDescriptor, BuildReport)> {
        self.stats.flush()?;

        let compression = self.descriptor.compression;
        let (index_path, lexicon_path) = {
            let paths = self.descriptor.require_paths()?;
            (paths.index.to_path_buf(), paths.lexicon.to_path_buf())
        };

        let written_lines = if self.chunk_paths.is_empty() && self.report.chunks_lost == 0 {
            let entries = self.buffer.drain_sorted();
            write_sorted(entries, &index_path, &lexicon_path, compression)?
        } else {
            if !self.buffer.is_empty() {
                self.flush_chunk()?;
            }
            merge_chunks(
                &self.chunk_paths,
                &index_path,
                &lexicon_path,
                compression,
                self.delete_chunks,
            )?
        };

        self.descriptor.record_written_lines(written_lines);
        self.report.written_lines = written_lines;
        self.descriptor.save()?;
        info!(
            "Finished index '{}': {} documents, {written_lines} tokens",
            self.descriptor.name, self.descriptor.num_docs
        );
        Ok((self.descriptor, self.report))
    }
}

fn remove_chunks(chunks: &[(usize, PathBuf)]) -> Result<()> {
    for (_, path) in chunks {
        debug!("Removing stale chunk {}", path.display());
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Drop the postings of documents outside `content` from the chunk at `path`.
fn prune_chunk(path: &Path, content: &ContentIntervals) -> Result<()> {
    let mut pruned = Vec::new();
    let mut dropped = 0;
    for entry in ChunkReader::open(path)? {
        let entry = entry?;
        let total = entry.postings.len();
        let postings: Vec<(u64, u32)> = entry
            .postings
            .into_iter()
            .filter(|&(doc_id, _)| content.contains(doc_id))
            .collect();
        dropped += total - postings.len();
        if !postings.is_empty() {
            pruned.push(PostingEntry {
                token: entry.token,
                postings,
            });
        }
    }
    if dropped > 0 {
        warn!(
            "Dropped {dropped} postings of unrecorded documents from {}",
            path.display()
        );
        write_chunk(path, &pruned)?;
    }
    Ok(())
}

/// Build `descriptor` from the TSV collection at `collection`.
///
/// With more than one partition the build is sharded.
pub fn build_index(
    descriptor: IndexDescriptor,
    normalizer: &dyn TextNormalizer,
    collection: &Path,
    config: &BuildConfig,
) -> Result<(IndexDescriptor, BuildReport)> {
    if config.partitions > 1 {
        return crate::build::shard::build_sharded(descriptor, normalizer, collection, config);
    }

    info!(
        "Building index '{}' from {}",
        descriptor.name,
        collection.display()
    );
    let mut source = TsvDocumentSource::open(collection)?.with_limit(config.max_documents);
    let mut builder = IndexBuilder::new(descriptor, normalizer, config)?;
    for document in source.by_ref() {
        builder.add_document(&document?)?;
    }

    let (descriptor, mut report) = builder.finish()?;
    report.rows_read = source.rows_read();
    report.skipped_rows = source.skipped();
    Ok((descriptor, report))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::analysis::StandardNormalizer;
    use crate::config::IndexOptions;
    use crate::index::{DocStatsFile, LexiconFile};

    fn document(row: u64, text: &str) -> Document {
        Document {
            row,
            external_id: format!("D{}", row + 1),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_in_memory_build() {
        let temp_dir = TempDir::new().unwrap();
        let normalizer = StandardNormalizer::new().unwrap();
        let descriptor =
            IndexDescriptor::setup(temp_dir.path(), "mem", &IndexOptions::default()).unwrap();
        let config = BuildConfig::default().with_chunk_threshold(0);

        let mut builder = IndexBuilder::new(descriptor, &normalizer, &config).unwrap();
        assert!(builder.add_document(&document(0, "a b a")).unwrap());
        assert!(builder.add_document(&document(1, "b c")).unwrap());
        assert!(!builder.add_document(&document(1, "b c")).unwrap());
        let (descriptor, report) = builder.finish().unwrap();

        assert_eq!(report.documents_indexed, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.chunks_written, 0);
        assert_eq!(descriptor.num_docs, 2);
        assert_eq!(descriptor.index_rows, 3);
        assert_eq!(descriptor.content.intervals(), &[(1, 2)]);

        let paths = descriptor.require_paths().unwrap();
        assert_eq!(fs::read_to_string(paths.index).unwrap(), "1 2\n1,1 1,1\n2 1\n");
        assert_eq!(fs::read_to_string(paths.lexicon).unwrap(), "a;1;0\nb;2;4\nc;1;12\n");
        assert_eq!(DocStatsFile::read_all(paths.stats).unwrap().len(), 2);
    }

    #[test]
    fn test_chunked_build_matches_in_memory_build() {
        let temp_dir = TempDir::new().unwrap();
        let normalizer = StandardNormalizer::new().unwrap();
        let texts = [
            "the quick brown fox",
            "jumps over the lazy dog",
            "quick quick dog",
            "brown paper bag",
            "a fox in a bag",
        ];

        let mut outputs = Vec::new();
        for (name, threshold) in [("whole", 0), ("split", 3)] {
            let descriptor =
                IndexDescriptor::setup(temp_dir.path(), name, &IndexOptions::default()).unwrap();
            let config = BuildConfig::default().with_chunk_threshold(threshold);
            let mut builder = IndexBuilder::new(descriptor, &normalizer, &config).unwrap();
            for (row, text) in texts.iter().enumerate() {
                builder.add_document(&document(row as u64, text)).unwrap();
            }
            let (descriptor, report) = builder.finish().unwrap();
            if threshold > 0 {
                assert!(report.chunks_written > 1);
                let leftovers = fs::read_dir(descriptor.work_dir())
                    .unwrap()
                    .filter(|e| {
                        e.as_ref()
                            .unwrap()
                            .file_name()
                            .to_string_lossy()
                            .starts_with("chunk_posting_")
                    })
                    .count();
                assert_eq!(leftovers, 0);
            }
            let paths = descriptor.require_paths().unwrap();
            outputs.push((
                fs::read(paths.index).unwrap(),
                LexiconFile::read_all(paths.lexicon).unwrap(),
            ));
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn test_failed_chunk_write_drops_only_that_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let normalizer = StandardNormalizer::new().unwrap();
        let descriptor =
            IndexDescriptor::setup(temp_dir.path(), "lossy", &IndexOptions::default()).unwrap();
        let blocker = descriptor.work_dir().join("chunk_posting_0.txt");
        fs::create_dir_all(&blocker).unwrap();
        let config = BuildConfig::default().with_chunk_threshold(1);

        let mut builder = IndexBuilder::new(descriptor, &normalizer, &config).unwrap();
        builder.add_document(&document(0, "ant bee")).unwrap();
        builder.add_document(&document(1, "cat dog")).unwrap();
        builder.add_document(&document(2, "eel")).unwrap();
        let (descriptor, report) = builder.finish().unwrap();

        assert_eq!(report.chunks_lost, 1);
        assert_eq!(report.chunks_written, 2);
        assert_eq!(report.documents_indexed, 3);
        assert_eq!(descriptor.num_docs, 3);
        assert!(blocker.is_dir());

        let paths = descriptor.require_paths().unwrap();
        let tokens: Vec<String> = LexiconFile::read_all(paths.lexicon)
            .unwrap()
            .into_iter()
            .map(|entry| entry.token)
            .collect();
        assert_eq!(tokens, vec!["cat", "dog", "eel"]);
        assert_eq!(DocStatsFile::read_all(paths.stats).unwrap().len(), 3);
    }

    #[test]
    fn test_resume_prunes_postings_of_unrecorded_documents() {
        let temp_dir = TempDir::new().unwrap();
        let normalizer = StandardNormalizer::new().unwrap();
        let mut descriptor =
            IndexDescriptor::setup(temp_dir.path(), "torn", &IndexOptions::default()).unwrap();
        descriptor.content.insert(1);
        descriptor.num_docs = 1;
        let work_dir = descriptor.work_dir();
        write_chunk(
            &chunk_path(&work_dir, 0),
            &[PostingEntry {
                token: "ant".to_string(),
                postings: vec![(1, 1)],
            }],
        )
        .unwrap();
        write_chunk(
            &chunk_path(&work_dir, 1),
            &[
                PostingEntry {
                    token: "bee".to_string(),
                    postings: vec![(1, 1), (2, 1)],
                },
                PostingEntry {
                    token: "cat".to_string(),
                    postings: vec![(2, 2)],
                },
            ],
        )
        .unwrap();

        let config = BuildConfig::default();
        let mut builder = IndexBuilder::new(descriptor, &normalizer, &config).unwrap();
        assert!(!builder.add_document(&document(0, "ant bee")).unwrap());
        assert!(builder.add_document(&document(1, "cat")).unwrap());
        let (descriptor, report) = builder.finish().unwrap();

        assert_eq!(report.chunks_written, 1);
        let paths = descriptor.require_paths().unwrap();
        let lexicon = LexiconFile::read_all(paths.lexicon).unwrap();
        let rows: Vec<(&str, u64)> = lexicon
            .iter()
            .map(|entry| (entry.token.as_str(), entry.doc_freq))
            .collect();
        assert_eq!(rows, vec![("ant", 1), ("bee", 1), ("cat", 1)]);
        assert_eq!(fs::read_to_string(paths.index).unwrap(), "1 1\n1 1\n2 1\n");
    }
}
