//! Sharded builds.
//!
//! The collection is split into byte ranges that are indexed in parallel into
//! independent shard indexes. Once every shard has finished, their doc-stats
//! are concatenated in shard order and their postings merged with the regular
//! k-way merge. A shard numbers its rows from 1, so a document's global id is
//! its local id plus the rows read by all earlier shards.

use std::path::Path;

use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::analysis::TextNormalizer;
use crate::build::BuildReport;
use crate::build::builder::IndexBuilder;
use crate::build::merge::{PostingStream, merge_entries};
use crate::codec::CompressionMode;
use crate::config::BuildConfig;
use crate::document::{TsvDocumentSource, partition_ranges};
use crate::error::{PostlineError, Result};
use crate::index::{DocStat, DocStatsFile, DocStatsWriter, IndexDescriptor};

/// A finished shard and the doc id offset of its first row.
#[derive(Debug)]
struct Shard {
    descriptor: IndexDescriptor,
    report: BuildReport,
    offset: u64,
}

/// Build `descriptor` from `collection` split into `config.partitions` shards.
///
/// `config.max_documents` limits the rows of each shard.
pub fn build_sharded(
    mut descriptor: IndexDescriptor,
    normalizer: &dyn TextNormalizer,
    collection: &Path,
    config: &BuildConfig,
) -> Result<(IndexDescriptor, BuildReport)> {
    if !descriptor.content.is_empty() {
        return Err(PostlineError::invalid_argument(format!(
            "index '{}' already holds documents; sharded builds start from an empty index",
            descriptor.name
        )));
    }

    let ranges = partition_ranges(collection, config.partitions)?;
    let work_dir = descriptor.work_dir();
    info!(
        "Building index '{}' from {} in {} shards",
        descriptor.name,
        collection.display(),
        ranges.len()
    );

    let thread_pool = ThreadPoolBuilder::new()
        .num_threads(config.thread_count())
        .thread_name(|i| format!("postline-shard-{i}"))
        .build()
        .map_err(|e| PostlineError::other(format!("Failed to create thread pool: {e}")))?;

    let shard_config = config.clone().with_partitions(1);
    let built: Vec<(IndexDescriptor, BuildReport)> = thread_pool.install(|| {
        ranges
            .into_par_iter()
            .enumerate()
            .map(|(i, range)| -> Result<(IndexDescriptor, BuildReport)> {
                let name = format!("{}_shard_{i}", descriptor.name);
                let mut options = descriptor.options();
                options.compression = CompressionMode::None;
                let shard = IndexDescriptor::setup(&work_dir, &name, &options)?;

                debug!("Shard {i} covers bytes {}..{}", range.start, range.end);
                let mut source = TsvDocumentSource::open_range(collection, range)?
                    .with_limit(shard_config.max_documents);
                let mut builder = IndexBuilder::new(shard, normalizer, &shard_config)?;
                for document in source.by_ref() {
                    builder.add_document(&document?)?;
                }
                let (shard, mut report) = builder.finish()?;
                report.rows_read = source.rows_read();
                report.skipped_rows = source.skipped();
                Ok((shard, report))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut offset = 0;
    let shards: Vec<Shard> = built
        .into_iter()
        .map(|(descriptor, report)| {
            let shard = Shard {
                offset,
                descriptor,
                report,
            };
            offset += shard.report.rows_read;
            shard
        })
        .collect();

    let mut report = BuildReport::default();
    for shard in &shards {
        report.absorb(&shard.report);
    }

    let written_lines = merge_shards(&mut descriptor, &shards)?;
    descriptor.record_written_lines(written_lines);
    report.written_lines = written_lines;
    descriptor.save()?;

    if config.delete_shards {
        for shard in shards {
            shard.descriptor.remove()?;
        }
    }

    info!(
        "Finished sharded index '{}': {} documents, {written_lines} tokens",
        descriptor.name, descriptor.num_docs
    );
    Ok((descriptor, report))
}

/// Concatenate shard stats, translate content intervals and merge postings.
fn merge_shards(descriptor: &mut IndexDescriptor, shards: &[Shard]) -> Result<u64> {
    let (stats_path, index_path, lexicon_path) = {
        let paths = descriptor.require_paths()?;
        (
            paths.stats.to_path_buf(),
            paths.index.to_path_buf(),
            paths.lexicon.to_path_buf(),
        )
    };

    let mut stats = DocStatsWriter::create(&stats_path, false)?;
    for shard in shards {
        let shard_paths = shard.descriptor.require_paths()?;
        for stat in DocStatsFile::stream(shard_paths.stats)? {
            let stat = stat?;
            stats.write(&DocStat {
                doc_id: stat.doc_id + shard.offset,
                ..stat
            })?;
        }
        for &(start, end) in shard.descriptor.content.intervals() {
            descriptor
                .content
                .insert_range(start + shard.offset, end + shard.offset);
        }
        descriptor.num_docs += shard.descriptor.num_docs;
    }
    stats.flush()?;

    let gaps = descriptor.content.gaps();
    if !gaps.is_empty() {
        warn!(
            "Index '{}' has {} doc id gaps (malformed rows)",
            descriptor.name,
            gaps.len()
        );
        debug!("Missing doc ids: {gaps:?}");
    }

    let readers = shards
        .iter()
        .map(|shard| {
            let paths = shard.descriptor.require_paths()?;
            PostingStream::open(
                paths.lexicon,
                paths.index,
                shard.descriptor.compression,
                shard.offset,
            )
        })
        .collect::<Result<Vec<_>>>()?;
    merge_entries(readers, &index_path, &lexicon_path, descriptor.compression)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::analysis::StandardNormalizer;
    use crate::build::build_index;
    use crate::config::IndexOptions;
    use crate::index::LexiconFile;

    fn write_collection(path: &Path, rows: usize) {
        let words = ["apple", "banana", "cherry", "date", "elder", "fig", "grape"];
        let mut text = String::new();
        for i in 0..rows {
            if i % 11 == 5 {
                text.push_str("malformed row without tab\n");
                continue;
            }
            let body: Vec<&str> = (0..(i % 4 + 2)).map(|j| words[(i + j * 3) % words.len()]).collect();
            text.push_str(&format!("EXT-{i}\t{}\n", body.join(" ")));
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_sharded_build_matches_single_build() {
        let temp_dir = TempDir::new().unwrap();
        let collection = temp_dir.path().join("collection.tsv");
        write_collection(&collection, 60);
        let normalizer = StandardNormalizer::new().unwrap();
        let options = IndexOptions::default().with_compression(CompressionMode::Gamma);

        let single = IndexDescriptor::setup(temp_dir.path(), "single", &options).unwrap();
        let (single, single_report) =
            build_index(single, &normalizer, &collection, &BuildConfig::default()).unwrap();

        let sharded = IndexDescriptor::setup(temp_dir.path(), "sharded", &options).unwrap();
        let config = BuildConfig::default()
            .with_partitions(3)
            .with_threads(2)
            .with_chunk_threshold(4);
        let (sharded, sharded_report) =
            build_sharded(sharded, &normalizer, &collection, &config).unwrap();

        assert_eq!(sharded_report.rows_read, single_report.rows_read);
        assert_eq!(sharded_report.skipped_rows, single_report.skipped_rows);
        assert_eq!(sharded.num_docs, single.num_docs);
        assert_eq!(sharded.content, single.content);
        assert_eq!(sharded.index_rows, single.index_rows);

        let a = single.require_paths().unwrap();
        let b = sharded.require_paths().unwrap();
        assert_eq!(fs::read(a.index).unwrap(), fs::read(b.index).unwrap());
        assert_eq!(
            LexiconFile::read_all(a.lexicon).unwrap(),
            LexiconFile::read_all(b.lexicon).unwrap()
        );
        assert_eq!(
            DocStatsFile::read_all(a.stats).unwrap(),
            DocStatsFile::read_all(b.stats).unwrap()
        );

        let leftovers: Vec<_> = fs::read_dir(sharded.work_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains("_shard_"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn test_sharded_build_requires_empty_index() {
        let temp_dir = TempDir::new().unwrap();
        let collection = temp_dir.path().join("collection.tsv");
        write_collection(&collection, 10);
        let normalizer = StandardNormalizer::new().unwrap();

        let mut descriptor =
            IndexDescriptor::setup(temp_dir.path(), "busy", &IndexOptions::default()).unwrap();
        descriptor.content.insert(1);
        let config = BuildConfig::default().with_partitions(2);
        assert!(build_sharded(descriptor, &normalizer, &collection, &config).is_err());
    }
}
