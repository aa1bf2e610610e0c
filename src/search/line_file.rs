//! Byte-offset access to the lines of a text file.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{PostlineError, Result};
use crate::search::LineMatch;

const BACKWARD_SCAN_BLOCK: u64 = 4096;

/// A newline-delimited file read by byte position.
#[derive(Debug)]
pub struct LineFile<R = File> {
    reader: BufReader<R>,
    len: u64,
}

impl LineFile<File> {
    /// Open a file on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PostlineError::index(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::new(file)
    }
}

impl<R: Read + Seek> LineFile<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(LineFile {
            reader: BufReader::new(inner),
            len,
        })
    }

    /// File length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn read_raw_line(&mut self) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        self.reader.read_until(b'\n', &mut raw)?;
        Ok(raw)
    }

    fn to_match(start: u64, raw: Vec<u8>) -> Result<LineMatch> {
        let end = start + raw.len() as u64;
        let mut line = String::from_utf8(raw).map_err(|e| {
            PostlineError::format(format!("line at offset {start} is not UTF-8: {e}"))
        })?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(LineMatch { start, end, line })
    }

    /// Read the line that starts exactly at `start`.
    pub fn line_at(&mut self, start: u64) -> Result<Option<LineMatch>> {
        if start >= self.len {
            return Ok(None);
        }
        self.reader.seek(SeekFrom::Start(start))?;
        let raw = self.read_raw_line()?;
        Self::to_match(start, raw).map(Some)
    }

    /// Return the first full line starting at or after `position`.
    ///
    /// A partial line under `position` is discarded. When no line starts at or
    /// after `position` the last line of the file is returned instead, so the
    /// result is only `None` for an empty file.
    pub fn next_line_at_or_after(&mut self, position: u64) -> Result<Option<LineMatch>> {
        if self.len == 0 {
            return Ok(None);
        }
        if position >= self.len {
            return self.last_line();
        }
        if position == 0 {
            return self.line_at(0);
        }

        // Reading from the previous byte tells whether `position` is a line start.
        self.reader.seek(SeekFrom::Start(position - 1))?;
        let skipped = self.read_raw_line()?;
        let start = position - 1 + skipped.len() as u64;
        if start >= self.len {
            return self.last_line();
        }
        let raw = self.read_raw_line()?;
        Self::to_match(start, raw).map(Some)
    }

    /// Return the last line of the file.
    pub fn last_line(&mut self) -> Result<Option<LineMatch>> {
        if self.len == 0 {
            return Ok(None);
        }

        let mut last_byte = [0u8; 1];
        self.reader.seek(SeekFrom::Start(self.len - 1))?;
        self.reader.read_exact(&mut last_byte)?;
        let search_end = if last_byte[0] == b'\n' {
            self.len - 1
        } else {
            self.len
        };

        let mut block_end = search_end;
        let start = loop {
            if block_end == 0 {
                break 0;
            }
            let block_start = block_end.saturating_sub(BACKWARD_SCAN_BLOCK);
            let mut block = vec![0u8; (block_end - block_start) as usize];
            self.reader.seek(SeekFrom::Start(block_start))?;
            self.reader.read_exact(&mut block)?;
            if let Some(index) = block.iter().rposition(|&b| b == b'\n') {
                break block_start + index as u64 + 1;
            }
            block_end = block_start;
        };

        self.line_at(start)
    }
}
