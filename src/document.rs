//! Source documents.
//!
//! The collection is a tab separated file with one `<external_id>\t<text>`
//! row per line. Rows with any other field count are logged and skipped but
//! still consume a row number, so doc ids stay aligned with line numbers.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use log::{trace, warn};

use crate::error::{PostlineError, Result};

/// One row of the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Zero-based row number within the scanned range.
    pub row: u64,
    pub external_id: String,
    pub text: String,
}

impl Document {
    /// Doc ids start at 1 so that the first gap of a posting list is never 0.
    pub fn doc_id(&self) -> u64 {
        self.row + 1
    }
}

/// Iterator over the rows of a TSV collection.
#[derive(Debug)]
pub struct TsvDocumentSource<R = File> {
    reader: BufReader<R>,
    position: u64,
    end: Option<u64>,
    row: u64,
    limit: Option<u64>,
    skipped: u64,
}

impl TsvDocumentSource<File> {
    /// Read the whole collection at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = open_collection(path.as_ref())?;
        Ok(Self::new(file))
    }

    /// Read only the rows that start inside `range`.
    ///
    /// A row straddling `range.start` belongs to the previous range.
    pub fn open_range<P: AsRef<Path>>(path: P, range: Range<u64>) -> Result<Self> {
        let mut file = open_collection(path.as_ref())?;
        let mut position = range.start;
        if range.start > 0 {
            file.seek(SeekFrom::Start(range.start - 1))?;
        }
        let mut reader = BufReader::new(file);
        if range.start > 0 {
            let mut partial = Vec::new();
            position = range.start - 1 + reader.read_until(b'\n', &mut partial)? as u64;
        }

        Ok(TsvDocumentSource {
            reader,
            position,
            end: Some(range.end),
            row: 0,
            limit: None,
            skipped: 0,
        })
    }
}

impl<R: Read> TsvDocumentSource<R> {
    pub fn new(inner: R) -> Self {
        TsvDocumentSource {
            reader: BufReader::new(inner),
            position: 0,
            end: None,
            row: 0,
            limit: None,
            skipped: 0,
        }
    }

    /// Stop after `limit` rows (valid or not).
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Rows read so far, malformed ones included.
    pub fn rows_read(&self) -> u64 {
        self.row
    }

    /// Malformed rows skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn next_document(&mut self) -> Result<Option<Document>> {
        loop {
            if self.limit.is_some_and(|limit| self.row >= limit) {
                return Ok(None);
            }
            if self.end.is_some_and(|end| self.position >= end) {
                return Ok(None);
            }

            let mut raw = Vec::new();
            let read = self.reader.read_until(b'\n', &mut raw)?;
            if read == 0 {
                return Ok(None);
            }
            self.position += read as u64;
            let row = self.row;
            self.row += 1;

            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 2 {
                warn!("Skipping row {row}: expected 2 fields, found {}", fields.len());
                self.skipped += 1;
                continue;
            }

            trace!("Read row {row} ({})", fields[0]);
            return Ok(Some(Document {
                row,
                external_id: fields[0].to_string(),
                text: fields[1].to_string(),
            }));
        }
    }
}

impl<R: Read> Iterator for TsvDocumentSource<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_document().transpose()
    }
}

fn open_collection(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        PostlineError::invalid_argument(format!("cannot open collection {}: {e}", path.display()))
    })
}

/// Split the file at `path` into `parts` contiguous byte ranges.
pub fn partition_ranges<P: AsRef<Path>>(path: P, parts: usize) -> Result<Vec<Range<u64>>> {
    let len = fs::metadata(path.as_ref())?.len();
    let parts = parts.max(1) as u64;
    let size = len / parts;

    Ok((0..parts)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == parts { len } else { start + size };
            start..end
        })
        .collect())
}
