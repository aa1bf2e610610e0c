//! Ternary search over the byte offsets of a sorted file.

use std::cmp::Ordering;
use std::io::{Read, Seek};

use log::trace;

use crate::error::{PostlineError, Result};
use crate::search::line_file::LineFile;
use crate::search::{LineKey, LineMatch, compare_line};

/// Locate the line whose key equals `key` among the lines starting in
/// `[low, high]`.
///
/// Both pivots are snapped forward to real line starts. A pivot that lands on
/// the upper boundary is forced back onto the first line after the lower
/// boundary so every round consumes at least one line. Returns `Ok(None)` when
/// the key lies outside the bracketing lines, falls in a gap between two
/// adjacent lines, or the same pivot pair comes up twice.
pub fn ternary_search<K, R>(
    file: &mut LineFile<R>,
    key: &K,
    delimiter: char,
    low: u64,
    high: u64,
) -> Result<Option<LineMatch>>
where
    K: LineKey,
    R: Read + Seek,
{
    let Some(mut lo) = file.next_line_at_or_after(low)? else {
        return Ok(None);
    };
    match compare_line(&lo.line, delimiter, key)? {
        Ordering::Equal => return Ok(Some(lo)),
        Ordering::Greater => return Ok(None),
        Ordering::Less => {}
    }

    let upper = if high >= file.len() {
        file.last_line()?
    } else {
        file.next_line_at_or_after(high)?
    };
    let Some(mut hi) = upper else {
        return Ok(None);
    };
    match compare_line(&hi.line, delimiter, key)? {
        Ordering::Equal => return Ok(Some(hi)),
        Ordering::Less => return Ok(None),
        Ordering::Greater => {}
    }

    let mut last_pivots: Option<(u64, u64)> = None;
    let mut repeats = 0;

    loop {
        // lo.key < key < hi.key; candidates start in [lo.end, hi.start).
        if lo.end >= hi.start {
            return Ok(None);
        }

        let first_target = lo.end + (hi.start - lo.end) / 3;
        let p1 = snap_between(file, first_target, lo.end, hi.start)?;
        trace!("ternary pivot 1 at {} for {key:?}", p1.start);
        match compare_line(&p1.line, delimiter, key)? {
            Ordering::Equal => return Ok(Some(p1)),
            Ordering::Greater => {
                hi = p1;
                continue;
            }
            Ordering::Less => lo = p1,
        }

        if lo.end >= hi.start {
            return Ok(None);
        }
        let second_target = lo.end + (hi.start - lo.end) / 2;
        let p2 = snap_between(file, second_target, lo.end, hi.start)?;
        trace!("ternary pivot 2 at {} for {key:?}", p2.start);

        let pivots = (lo.start, p2.start);
        if last_pivots == Some(pivots) {
            repeats += 1;
            if repeats >= 2 {
                return Ok(None);
            }
        } else {
            last_pivots = Some(pivots);
            repeats = 0;
        }

        match compare_line(&p2.line, delimiter, key)? {
            Ordering::Equal => return Ok(Some(p2)),
            Ordering::Greater => hi = p2,
            Ordering::Less => lo = p2,
        }
    }
}

/// Snap `target` to a line start in `[floor, ceiling)`, falling back to the
/// line at `floor` when the next line start reaches `ceiling`.
fn snap_between<R: Read + Seek>(
    file: &mut LineFile<R>,
    target: u64,
    floor: u64,
    ceiling: u64,
) -> Result<LineMatch> {
    if let Some(line) = file.next_line_at_or_after(target.max(floor))? {
        if line.start < ceiling {
            return Ok(line);
        }
    }
    // `floor` is the end of a line that precedes `ceiling`, so a line starts there.
    match file.line_at(floor)? {
        Some(line) => Ok(line),
        None => Err(PostlineError::format(format!(
            "no line starts at offset {floor}"
        ))),
    }
}
