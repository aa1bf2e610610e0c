//! The doc-stats file: `docid,external_id,length` per line.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;

use crate::error::{PostlineError, Result};
use crate::index::ContentIntervals;
use crate::search::{LineFile, SearchMethod, skip_search, ternary_search};

pub const DOC_STATS_DELIMITER: char = ',';

/// Statistics recorded for one indexed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocStat {
    pub doc_id: u64,
    /// Identifier of the document in the source collection.
    pub external_id: String,
    /// Number of tokens after normalization.
    pub length: u64,
}

impl fmt::Display for DocStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.doc_id, self.external_id, self.length)
    }
}

impl FromStr for DocStat {
    type Err = PostlineError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || PostlineError::format(format!("malformed doc-stats line '{line}'"));
        let (doc_id, rest) = line.split_once(DOC_STATS_DELIMITER).ok_or_else(malformed)?;
        let (external_id, length) = rest.rsplit_once(DOC_STATS_DELIMITER).ok_or_else(malformed)?;
        Ok(DocStat {
            doc_id: doc_id.trim().parse().map_err(|_| malformed())?,
            external_id: external_id.to_string(),
            length: length.trim().parse().map_err(|_| malformed())?,
        })
    }
}

/// Collection-wide totals used by the scoring functions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollectionTotals {
    pub num_docs: u64,
    pub total_length: u64,
}

impl CollectionTotals {
    /// Mean document length, 0 for an empty collection.
    pub fn avg_doc_length(&self) -> f64 {
        if self.num_docs == 0 {
            0.0
        } else {
            self.total_length as f64 / self.num_docs as f64
        }
    }
}

/// Appends doc-stats lines.
#[derive(Debug)]
pub struct DocStatsWriter {
    writer: BufWriter<File>,
}

impl DocStatsWriter {
    /// Open `path` for writing; `append` keeps existing lines.
    pub fn create<P: AsRef<Path>>(path: P, append: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(DocStatsWriter {
            writer: BufWriter::new(file),
        })
    }

    pub fn write(&mut self, stat: &DocStat) -> Result<()> {
        writeln!(self.writer, "{stat}")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Searchable doc-stats file.
///
/// Remembers where the previous hit ended so that looking up consecutive doc
/// ids reads the next line directly instead of searching.
#[derive(Debug)]
pub struct DocStatsFile {
    lines: LineFile,
    previous: Option<(u64, u64)>,
}

impl DocStatsFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(DocStatsFile {
            lines: LineFile::open(path)?,
            previous: None,
        })
    }

    /// Find the stats of `doc_id`.
    ///
    /// The file must be sorted by doc id, as every build writes it.
    pub fn lookup(
        &mut self,
        doc_id: u64,
        method: SearchMethod,
        step: u64,
    ) -> Result<Option<DocStat>> {
        if let Some((previous_id, end)) = self.previous
            && previous_id.checked_add(1) == Some(doc_id)
            && let Some(next) = self.lines.line_at(end)?
        {
            let stat: DocStat = next.line.parse()?;
            if stat.doc_id == doc_id {
                self.previous = Some((doc_id, next.end));
                return Ok(Some(stat));
            }
        }

        let found = match method {
            SearchMethod::Ternary => {
                let len = self.lines.len();
                ternary_search(&mut self.lines, &doc_id, DOC_STATS_DELIMITER, 0, len)?
            }
            SearchMethod::Skip => {
                skip_search(&mut self.lines, &doc_id, DOC_STATS_DELIMITER, step)?
            }
        };
        match found {
            Some(hit) => {
                self.previous = Some((doc_id, hit.end));
                Ok(Some(hit.line.parse()?))
            }
            None => Ok(None),
        }
    }

    /// Count documents and sum their lengths in one pass.
    pub fn scan_totals<P: AsRef<Path>>(path: P) -> Result<CollectionTotals> {
        let mut totals = CollectionTotals::default();
        for stat in Self::stream(path)? {
            let stat = stat?;
            totals.num_docs += 1;
            totals.total_length += stat.length;
        }
        Ok(totals)
    }

    /// Read every line of a doc-stats file in file order.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<DocStat>> {
        Self::stream(path)?.collect()
    }

    /// Iterate the lines of a doc-stats file in file order.
    pub fn stream<P: AsRef<Path>>(path: P) -> Result<impl Iterator<Item = Result<DocStat>>> {
        let reader = BufReader::new(File::open(path)?);
        Ok(reader.lines().filter_map(|line| match line {
            Ok(line) if line.is_empty() => None,
            Ok(line) => Some(line.parse()),
            Err(e) => Some(Err(e.into())),
        }))
    }

    /// Rewrite the file keeping only lines of doc ids in `content`, in strictly
    /// increasing order. Returns the number of lines dropped.
    pub fn retain_ingested<P: AsRef<Path>>(path: P, content: &ContentIntervals) -> Result<u64> {
        let path = path.as_ref();
        let mut partial = OsString::from(path.as_os_str());
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let mut writer = DocStatsWriter::create(&partial, false)?;
        let mut last = None;
        let mut dropped = 0;
        for stat in Self::stream(path)? {
            let stat = stat?;
            if content.contains(stat.doc_id) && last.is_none_or(|last| stat.doc_id > last) {
                last = Some(stat.doc_id);
                writer.write(&stat)?;
            } else {
                debug!("Dropping doc-stats line of document {}", stat.doc_id);
                dropped += 1;
            }
        }
        writer.flush()?;
        drop(writer);

        if dropped > 0 {
            fs::rename(&partial, path)?;
        } else {
            fs::remove_file(&partial)?;
        }
        Ok(dropped)
    }
}
