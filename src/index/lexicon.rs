//! The lexicon file: `token;doc_freq;offset` per line, sorted by token.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

use log::trace;

use crate::error::{PostlineError, Result};
use crate::search::{LineFile, LineMatch, SearchMethod, skip_search, ternary_search};

pub const LEXICON_DELIMITER: char = ';';

/// One lexicon line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub token: String,
    pub doc_freq: u64,
    /// Start of the token's posting block in the index file.
    pub offset: u64,
}

impl fmt::Display for LexiconEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.token, self.doc_freq, self.offset)
    }
}

impl FromStr for LexiconEntry {
    type Err = PostlineError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || PostlineError::format(format!("malformed lexicon line '{line}'"));
        let mut fields = line.rsplitn(3, LEXICON_DELIMITER);
        let offset = fields.next().ok_or_else(malformed)?;
        let doc_freq = fields.next().ok_or_else(malformed)?;
        let token = fields.next().ok_or_else(malformed)?;

        Ok(LexiconEntry {
            token: token.to_string(),
            doc_freq: doc_freq.trim().parse().map_err(|_| malformed())?,
            offset: offset.trim().parse().map_err(|_| malformed())?,
        })
    }
}

/// Result of a successful lexicon lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconHit {
    pub doc_freq: u64,
    /// Byte range of the posting block in the index file.
    pub block: Range<u64>,
}

/// Searchable view of a lexicon paired with its index file.
#[derive(Debug)]
pub struct LexiconFile {
    lines: LineFile,
    index_len: u64,
}

impl LexiconFile {
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(lexicon_path: P, index_path: Q) -> Result<Self> {
        let index_len = fs::metadata(index_path.as_ref())
            .map_err(|e| {
                PostlineError::index(format!(
                    "cannot stat index file {}: {e}",
                    index_path.as_ref().display()
                ))
            })?
            .len();
        Ok(LexiconFile {
            lines: LineFile::open(lexicon_path)?,
            index_len,
        })
    }

    /// Find `token` and the byte range of its posting block.
    ///
    /// The block ends where the next token's block starts, or at the end of
    /// the index file for the last token.
    pub fn lookup(
        &mut self,
        token: &str,
        method: SearchMethod,
        step: u64,
    ) -> Result<Option<LexiconHit>> {
        let key = token.to_string();
        let found = match method {
            SearchMethod::Ternary => {
                let len = self.lines.len();
                ternary_search(&mut self.lines, &key, LEXICON_DELIMITER, 0, len)?
            }
            SearchMethod::Skip => skip_search(&mut self.lines, &key, LEXICON_DELIMITER, step)?,
        };
        let Some(LineMatch { end, line, .. }) = found else {
            trace!("token '{token}' not in lexicon");
            return Ok(None);
        };

        let entry: LexiconEntry = line.parse()?;
        let block_end = match self.lines.line_at(end)? {
            Some(next) => next.line.parse::<LexiconEntry>()?.offset,
            None => self.index_len,
        };
        if block_end < entry.offset {
            return Err(PostlineError::format(format!(
                "lexicon offsets decrease after token '{token}'"
            )));
        }

        Ok(Some(LexiconHit {
            doc_freq: entry.doc_freq,
            block: entry.offset..block_end,
        }))
    }

    /// Read every entry of a lexicon file in order.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<LexiconEntry>> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                entries.push(line.parse()?);
            }
        }
        Ok(entries)
    }
}
