//! Sorted chunk files.
//!
//! A chunk holds one line per token, `token:docid|count;docid|count;...`,
//! sorted by token with postings sorted by doc id.

use std::borrow::Borrow;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PostlineError, Result};

/// The postings of one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingEntry {
    pub token: String,
    /// `(doc_id, frequency)` pairs.
    pub postings: Vec<(u64, u32)>,
}

impl PostingEntry {
    pub fn doc_ids(&self) -> Vec<u64> {
        self.postings.iter().map(|&(doc_id, _)| doc_id).collect()
    }

    pub fn frequencies(&self) -> Vec<u32> {
        self.postings.iter().map(|&(_, frequency)| frequency).collect()
    }
}

impl fmt::Display for PostingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.token)?;
        for (i, (doc_id, frequency)) in self.postings.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{doc_id}|{frequency}")?;
        }
        Ok(())
    }
}

impl FromStr for PostingEntry {
    type Err = PostlineError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || PostlineError::format(format!("malformed chunk line '{line}'"));
        let (token, postings) = line.rsplit_once(':').ok_or_else(malformed)?;

        let postings = postings
            .split(';')
            .map(|pair| {
                let (doc_id, frequency) = pair.split_once('|').ok_or_else(malformed)?;
                Ok((
                    doc_id.trim().parse().map_err(|_| malformed())?,
                    frequency.trim().parse().map_err(|_| malformed())?,
                ))
            })
            .collect::<Result<Vec<(u64, u32)>>>()?;

        Ok(PostingEntry {
            token: token.to_string(),
            postings,
        })
    }
}

const CHUNK_PREFIX: &str = "chunk_posting_";
const CHUNK_SUFFIX: &str = ".txt";

/// Path of chunk number `number` in `dir`.
pub fn chunk_path(dir: &Path, number: usize) -> PathBuf {
    dir.join(format!("{CHUNK_PREFIX}{number}{CHUNK_SUFFIX}"))
}

/// Chunk files found in `dir`, ordered by chunk number.
///
/// Entries that are not regular files are ignored.
pub fn list_chunks(dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let mut chunks = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(number) = name
            .to_str()
            .and_then(|name| name.strip_prefix(CHUNK_PREFIX))
            .and_then(|rest| rest.strip_suffix(CHUNK_SUFFIX))
            .and_then(|number| number.parse::<usize>().ok())
        else {
            continue;
        };
        if entry.file_type()?.is_file() {
            chunks.push((number, entry.path()));
        }
    }
    chunks.sort_unstable_by_key(|&(number, _)| number);
    Ok(chunks)
}

/// Write `entries` (already sorted) to a chunk file at `path`.
pub fn write_chunk(path: &Path, entries: &[PostingEntry]) -> Result<()> {
    write_chunk_entries(path, entries.iter().map(Ok)).map(|_| ())
}

/// Stream sorted entries into a chunk file. Returns the number of lines written.
///
/// The file appears at `path` only once it is complete.
pub fn write_chunk_entries<I, E>(path: &Path, entries: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<E>>,
    E: Borrow<PostingEntry>,
{
    let partial = path.with_extension("partial");
    let written = write_lines(&partial, entries).and_then(|lines| {
        fs::rename(&partial, path)?;
        Ok(lines)
    });
    if written.is_err() && partial.exists() {
        let _ = fs::remove_file(&partial);
    }
    written
}

fn write_lines<I, E>(path: &Path, entries: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<E>>,
    E: Borrow<PostingEntry>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let mut lines = 0;
    for entry in entries {
        writeln!(writer, "{}", entry?.borrow())?;
        lines += 1;
    }
    writer.flush()?;
    Ok(lines)
}

/// Sequential reader over a chunk file.
#[derive(Debug)]
pub struct ChunkReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
}

impl ChunkReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(ChunkReader {
            path,
            lines: BufReader::new(file).lines(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for ChunkReader {
    type Item = Result<PostingEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(line.parse()),
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}
