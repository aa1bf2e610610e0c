//! Merging sorted posting entries into the final index and lexicon.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::build::chunk::{ChunkReader, PostingEntry};
use crate::codec::{CompressionMode, decode_posting_block, make_posting_block};
use crate::error::{PostlineError, Result};
use crate::index::LexiconEntry;

/// Writes posting blocks to the index file and one lexicon line per token.
///
/// Output goes to `.partial` siblings that replace the real files only in
/// [`PostingSink::finish`], lexicon first, so an index file that exists is
/// always complete.
#[derive(Debug)]
pub struct PostingSink {
    index: BufWriter<File>,
    lexicon: BufWriter<File>,
    index_path: PathBuf,
    lexicon_path: PathBuf,
    compression: CompressionMode,
    offset: u64,
    written_lines: u64,
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

impl PostingSink {
    /// Create the output files, removing any previous ones.
    pub fn create(index_path: &Path, lexicon_path: &Path, compression: CompressionMode) -> Result<Self> {
        for path in [index_path, lexicon_path] {
            if path.exists() {
                debug!("Removing previous {}", path.display());
                fs::remove_file(path)?;
            }
        }
        Ok(PostingSink {
            index: BufWriter::new(File::create(partial_path(index_path))?),
            lexicon: BufWriter::new(File::create(partial_path(lexicon_path))?),
            index_path: index_path.to_path_buf(),
            lexicon_path: lexicon_path.to_path_buf(),
            compression,
            offset: 0,
            written_lines: 0,
        })
    }

    /// Append the block of one token.
    pub fn write_entry(&mut self, entry: &PostingEntry) -> Result<()> {
        let block = make_posting_block(&entry.doc_ids(), &entry.frequencies(), self.compression)?;
        let lexicon_entry = LexiconEntry {
            token: entry.token.clone(),
            doc_freq: entry.postings.len() as u64,
            offset: self.offset,
        };
        self.index.write_all(&block)?;
        writeln!(self.lexicon, "{lexicon_entry}")?;
        self.offset += block.len() as u64;
        self.written_lines += 1;
        Ok(())
    }

    /// Flush both files, move them into place and return the number of tokens
    /// written.
    pub fn finish(self) -> Result<u64> {
        let PostingSink {
            index,
            lexicon,
            index_path,
            lexicon_path,
            written_lines,
            ..
        } = self;
        for (writer, path) in [(lexicon, lexicon_path), (index, index_path)] {
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
            fs::rename(partial_path(&path), &path)?;
        }
        Ok(written_lines)
    }
}

/// Sort postings by doc id and sum the frequencies of repeated doc ids.
pub fn coalesce_postings(postings: &mut Vec<(u64, u32)>) {
    postings.sort_unstable_by_key(|&(doc_id, _)| doc_id);
    postings.dedup_by(|next, kept| {
        if next.0 == kept.0 {
            kept.1 = kept.1.saturating_add(next.1);
            true
        } else {
            false
        }
    });
}

/// K-way merge of token-sorted entry streams.
///
/// Entries with the same token are combined across streams. Only streams
/// that contributed the current token are advanced. Returns the number of
/// distinct tokens written.
pub fn merge_entries<I>(
    mut sources: Vec<I>,
    index_path: &Path,
    lexicon_path: &Path,
    compression: CompressionMode,
) -> Result<u64>
where
    I: Iterator<Item = Result<PostingEntry>>,
{
    let mut heads: Vec<Option<PostingEntry>> = Vec::with_capacity(sources.len());
    let mut heap = BinaryHeap::new();

    for (i, source) in sources.iter_mut().enumerate() {
        let head = source.next().transpose()?;
        if let Some(entry) = &head {
            heap.push(Reverse((entry.token.clone(), i)));
        }
        heads.push(head);
    }

    let mut sink = PostingSink::create(index_path, lexicon_path, compression)?;

    while let Some(Reverse((token, first))) = heap.pop() {
        let mut contributors = vec![first];
        while let Some(Reverse((next_token, _))) = heap.peek() {
            if *next_token != token {
                break;
            }
            if let Some(Reverse((_, i))) = heap.pop() {
                contributors.push(i);
            }
        }

        let mut postings = Vec::new();
        for i in contributors {
            if let Some(entry) = heads[i].take() {
                postings.extend(entry.postings);
            }
            let next = sources[i].next().transpose()?;
            if let Some(entry) = &next {
                if entry.token <= token {
                    return Err(PostlineError::format(format!(
                        "merge input {i} is not sorted: '{}' follows '{token}'",
                        entry.token
                    )));
                }
                heap.push(Reverse((entry.token.clone(), i)));
            }
            heads[i] = next;
        }

        coalesce_postings(&mut postings);
        sink.write_entry(&PostingEntry { token, postings })?;
    }

    sink.finish()
}

/// Merge chunk files into the index and lexicon at the given paths.
pub fn merge_chunks(
    chunk_paths: &[PathBuf],
    index_path: &Path,
    lexicon_path: &Path,
    compression: CompressionMode,
    delete_after_merge: bool,
) -> Result<u64> {
    let readers = chunk_paths
        .iter()
        .map(ChunkReader::open)
        .collect::<Result<Vec<_>>>()?;
    let written_lines = merge_entries(readers, index_path, lexicon_path, compression)?;
    info!(
        "Merged {} chunks into {written_lines} lexicon rows",
        chunk_paths.len()
    );

    if delete_after_merge {
        for path in chunk_paths {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to delete chunk {}: {e}", path.display());
            }
        }
    }
    Ok(written_lines)
}

/// Write entries that are already sorted by token in a single pass.
pub fn write_sorted(
    entries: Vec<PostingEntry>,
    index_path: &Path,
    lexicon_path: &Path,
    compression: CompressionMode,
) -> Result<u64> {
    let mut sink = PostingSink::create(index_path, lexicon_path, compression)?;
    for mut entry in entries {
        coalesce_postings(&mut entry.postings);
        sink.write_entry(&entry)?;
    }
    let written_lines = sink.finish()?;
    debug!("Wrote {written_lines} lexicon rows without merging");
    Ok(written_lines)
}

/// Streams an index token by token in lexicon order, adding `offset` to every
/// doc id.
#[derive(Debug)]
pub struct PostingStream {
    lexicon: Lines<BufReader<File>>,
    index: BufReader<File>,
    index_len: u64,
    compression: CompressionMode,
    pending: Option<LexiconEntry>,
    offset: u64,
}

impl PostingStream {
    pub fn open(
        lexicon_path: &Path,
        index_path: &Path,
        compression: CompressionMode,
        offset: u64,
    ) -> Result<Self> {
        let index = File::open(index_path)?;
        let index_len = index.metadata()?.len();
        let mut stream = PostingStream {
            lexicon: BufReader::new(File::open(lexicon_path)?).lines(),
            index: BufReader::new(index),
            index_len,
            compression,
            pending: None,
            offset,
        };
        stream.pending = stream.next_lexicon_entry()?;
        Ok(stream)
    }

    fn next_lexicon_entry(&mut self) -> Result<Option<LexiconEntry>> {
        for line in self.lexicon.by_ref() {
            let line = line?;
            if !line.is_empty() {
                return Ok(Some(line.parse()?));
            }
        }
        Ok(None)
    }

    fn next_entry(&mut self) -> Result<Option<PostingEntry>> {
        let Some(current) = self.pending.take() else {
            return Ok(None);
        };
        self.pending = self.next_lexicon_entry()?;
        let end = self
            .pending
            .as_ref()
            .map_or(self.index_len, |next| next.offset);
        let len = end.checked_sub(current.offset).ok_or_else(|| {
            PostlineError::format(format!(
                "lexicon offsets decrease after token '{}'",
                current.token
            ))
        })?;

        let mut bytes = vec![0u8; len as usize];
        self.index.read_exact(&mut bytes)?;
        let block = decode_posting_block(&bytes, self.compression)?;
        Ok(Some(PostingEntry {
            token: current.token,
            postings: block
                .iter()
                .map(|(doc_id, frequency)| (doc_id + self.offset, frequency))
                .collect(),
        }))
    }
}

impl Iterator for PostingStream {
    type Item = Result<PostingEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::build::chunk::write_chunk;
    use crate::index::LexiconFile;

    fn entry(token: &str, postings: &[(u64, u32)]) -> PostingEntry {
        PostingEntry {
            token: token.to_string(),
            postings: postings.to_vec(),
        }
    }

    #[test]
    fn test_coalesce() {
        let mut postings = vec![(5, 1), (2, 2), (5, 3), (1, 1)];
        coalesce_postings(&mut postings);
        assert_eq!(postings, vec![(1, 1), (2, 2), (5, 4)]);
    }

    #[test]
    fn test_merge_combines_ties() {
        let temp_dir = TempDir::new().unwrap();
        let chunk_a = temp_dir.path().join("chunk_posting_0.txt");
        let chunk_b = temp_dir.path().join("chunk_posting_1.txt");
        write_chunk(&chunk_a, &[entry("a", &[(1, 2)]), entry("c", &[(2, 1)])]).unwrap();
        write_chunk(&chunk_b, &[entry("a", &[(3, 1)]), entry("b", &[(3, 4)])]).unwrap();

        let index = temp_dir.path().join("index.txt");
        let lexicon = temp_dir.path().join("lexicon.txt");
        let lines = merge_chunks(
            &[chunk_a.clone(), chunk_b.clone()],
            &index,
            &lexicon,
            CompressionMode::None,
            true,
        )
        .unwrap();

        assert_eq!(lines, 3);
        assert_eq!(fs::read_to_string(&index).unwrap(), "1,2 2,1\n3 4\n2 1\n");
        assert_eq!(fs::read_to_string(&lexicon).unwrap(), "a;2;0\nb;1;8\nc;1;12\n");
        assert!(!chunk_a.exists());
        assert!(!chunk_b.exists());
    }

    #[test]
    fn test_merged_blocks_match_doc_freq() {
        let temp_dir = TempDir::new().unwrap();
        let sources = vec![
            vec![entry("apple", &[(1, 1), (4, 2)]), entry("pear", &[(2, 1)])],
            vec![entry("apple", &[(7, 1)]), entry("fig", &[(5, 3)])],
            vec![entry("kiwi", &[(9, 1)]), entry("pear", &[(8, 2), (10, 1)])],
        ];
        let index = temp_dir.path().join("index.bin");
        let lexicon = temp_dir.path().join("lexicon.txt");
        let streams: Vec<_> = sources.into_iter().map(|s| s.into_iter().map(Ok)).collect();
        merge_entries(streams, &index, &lexicon, CompressionMode::Gamma).unwrap();

        let entries = LexiconFile::read_all(&lexicon).unwrap();
        let tokens: Vec<&str> = entries.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["apple", "fig", "kiwi", "pear"]);

        let bytes = fs::read(&index).unwrap();
        for (i, lexicon_entry) in entries.iter().enumerate() {
            let end = entries.get(i + 1).map_or(bytes.len() as u64, |e| e.offset);
            assert!(end > lexicon_entry.offset);
            let block = decode_posting_block(
                &bytes[lexicon_entry.offset as usize..end as usize],
                CompressionMode::Gamma,
            )
            .unwrap();
            assert_eq!(block.len() as u64, lexicon_entry.doc_freq);
        }
    }

    #[test]
    fn test_unsorted_input_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let stream = vec![Ok(entry("b", &[(1, 1)])), Ok(entry("a", &[(2, 1)]))];
        let result = merge_entries(
            vec![stream.into_iter()],
            &temp_dir.path().join("index.txt"),
            &temp_dir.path().join("lexicon.txt"),
            CompressionMode::None,
        );
        assert!(matches!(result, Err(PostlineError::Format(_))));
    }

    #[test]
    fn test_single_chunk_merge_matches_direct_write() {
        let temp_dir = TempDir::new().unwrap();
        let entries = vec![
            entry("alpha", &[(1, 1), (2, 3)]),
            entry("beta", &[(2, 1)]),
            entry("gamma", &[(1, 2), (3, 1), (9, 1)]),
        ];
        let chunk = temp_dir.path().join("chunk_posting_0.txt");
        write_chunk(&chunk, &entries).unwrap();

        for mode in [CompressionMode::None, CompressionMode::Unary, CompressionMode::Gamma] {
            let merged_index = temp_dir.path().join(format!("merged_{mode}.idx"));
            let merged_lexicon = temp_dir.path().join(format!("merged_{mode}.lex"));
            let direct_index = temp_dir.path().join(format!("direct_{mode}.idx"));
            let direct_lexicon = temp_dir.path().join(format!("direct_{mode}.lex"));

            merge_chunks(&[chunk.clone()], &merged_index, &merged_lexicon, mode, false).unwrap();
            write_sorted(entries.clone(), &direct_index, &direct_lexicon, mode).unwrap();

            assert_eq!(fs::read(&merged_index).unwrap(), fs::read(&direct_index).unwrap());
            assert_eq!(fs::read(&merged_lexicon).unwrap(), fs::read(&direct_lexicon).unwrap());
        }
    }

    #[test]
    fn test_posting_stream_reads_back_written_index() {
        let temp_dir = TempDir::new().unwrap();
        let entries = vec![
            entry("alpha", &[(1, 1), (2, 3)]),
            entry("beta", &[(2, 1)]),
            entry("gamma", &[(1, 2), (3, 1), (9, 1)]),
        ];
        for mode in [CompressionMode::None, CompressionMode::Gamma] {
            let index = temp_dir.path().join(format!("index_{mode}"));
            let lexicon = temp_dir.path().join(format!("lexicon_{mode}"));
            write_sorted(entries.clone(), &index, &lexicon, mode).unwrap();

            let streamed: Vec<PostingEntry> = PostingStream::open(&lexicon, &index, mode, 10)
                .unwrap()
                .map(|e| e.unwrap())
                .collect();
            assert_eq!(streamed.len(), entries.len());
            assert_eq!(streamed[0].postings, vec![(11, 1), (12, 3)]);
            assert_eq!(streamed[2].token, "gamma");
            assert_eq!(streamed[2].doc_ids(), vec![11, 13, 19]);
        }
    }

    #[test]
    fn test_unfinished_sink_leaves_no_index() {
        let temp_dir = TempDir::new().unwrap();
        let index = temp_dir.path().join("index.txt");
        let lexicon = temp_dir.path().join("lexicon.txt");
        fs::write(&index, "stale\n").unwrap();

        let mut sink = PostingSink::create(&index, &lexicon, CompressionMode::None).unwrap();
        sink.write_entry(&entry("a", &[(1, 1)])).unwrap();
        drop(sink);
        assert!(!index.exists());
        assert!(!lexicon.exists());

        let sink = PostingSink::create(&index, &lexicon, CompressionMode::None).unwrap();
        assert_eq!(sink.finish().unwrap(), 0);
        assert!(index.exists());
        assert!(!partial_path(&index).exists());
    }
}
