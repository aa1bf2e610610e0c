//! The set of document ids already ingested into an index.

use std::fmt;
use std::str::FromStr;

use crate::error::{PostlineError, Result};

/// Sorted, disjoint, closed intervals of doc ids.
///
/// Adjacent and overlapping intervals are coalesced on insert, so a
/// sequential build is always represented by a single interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIntervals {
    intervals: Vec<(u64, u64)>,
}

impl ContentIntervals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary (possibly overlapping) closed intervals.
    pub fn from_intervals<I: IntoIterator<Item = (u64, u64)>>(intervals: I) -> Self {
        let mut content = ContentIntervals::new();
        for (start, end) in intervals {
            content.insert_range(start, end);
        }
        content
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// The intervals in ascending order.
    pub fn intervals(&self) -> &[(u64, u64)] {
        &self.intervals
    }

    /// Number of doc ids covered.
    pub fn count(&self) -> u64 {
        self.intervals.iter().map(|(a, b)| b - a + 1).sum()
    }

    /// Smallest and largest covered doc id.
    pub fn bounds(&self) -> Option<(u64, u64)> {
        Some((self.intervals.first()?.0, self.intervals.last()?.1))
    }

    /// Whether `doc_id` has already been ingested.
    pub fn contains(&self, doc_id: u64) -> bool {
        let index = self.intervals.partition_point(|&(_, end)| end < doc_id);
        self.intervals
            .get(index)
            .is_some_and(|&(start, _)| start <= doc_id)
    }

    /// Record `doc_id`. Returns `false` if it was already present.
    pub fn insert(&mut self, doc_id: u64) -> bool {
        if self.contains(doc_id) {
            return false;
        }
        self.insert_range(doc_id, doc_id);
        true
    }

    /// Record every doc id in `[start, end]`.
    pub fn insert_range(&mut self, start: u64, end: u64) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };

        // First interval that could touch [start, end] (ends at start - 1 or later).
        let first = self
            .intervals
            .partition_point(|&(_, e)| e.saturating_add(1) < start);
        let mut merged = (start, end);
        let mut last = first;
        while let Some(&(s, e)) = self.intervals.get(last) {
            if s > end.saturating_add(1) {
                break;
            }
            merged.0 = merged.0.min(s);
            merged.1 = merged.1.max(e);
            last += 1;
        }
        self.intervals.splice(first..last, [merged]);
    }

    /// Doc ids missing between the first and last ingested intervals.
    pub fn gaps(&self) -> Vec<(u64, u64)> {
        self.intervals
            .windows(2)
            .map(|pair| (pair[0].1 + 1, pair[1].0 - 1))
            .collect()
    }
}

impl fmt::Display for ContentIntervals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return f.write_str("empty");
        }
        let parts: Vec<String> = self
            .intervals
            .iter()
            .map(|(start, end)| format!("{start},{end}"))
            .collect();
        f.write_str(&parts.join(";"))
    }
}

impl FromStr for ContentIntervals {
    type Err = PostlineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "empty" {
            return Ok(ContentIntervals::new());
        }

        let mut content = ContentIntervals::new();
        for pair in s.split(';') {
            let (start, end) = pair
                .split_once(',')
                .ok_or_else(|| PostlineError::format(format!("malformed content interval '{pair}'")))?;
            let parse = |value: &str| {
                value.trim().parse::<u64>().map_err(|_| {
                    PostlineError::format(format!("malformed content interval '{pair}'"))
                })
            };
            content.insert_range(parse(start)?, parse(end)?);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_inserts_coalesce() {
        let mut content = ContentIntervals::new();
        for doc_id in 1..=5 {
            assert!(content.insert(doc_id));
        }
        assert_eq!(content.intervals(), &[(1, 5)]);
        assert!(!content.insert(3));
        assert_eq!(content.count(), 5);
    }

    #[test]
    fn test_filling_a_hole_joins_neighbours() {
        let mut content = ContentIntervals::from_intervals([(1, 3), (7, 9)]);
        assert_eq!(content.gaps(), vec![(4, 6)]);
        content.insert_range(4, 6);
        assert_eq!(content.intervals(), &[(1, 9)]);
        assert!(content.gaps().is_empty());
    }

    #[test]
    fn test_overlapping_ranges() {
        let mut content = ContentIntervals::from_intervals([(10, 20), (30, 40), (50, 60)]);
        content.insert_range(15, 52);
        assert_eq!(content.intervals(), &[(10, 60)]);
        content.insert_range(0, 0);
        assert_eq!(content.intervals(), &[(0, 0), (10, 60)]);
    }

    #[test]
    fn test_contains() {
        let content = ContentIntervals::from_intervals([(2, 4), (8, 8)]);
        assert!(!content.contains(1));
        assert!(content.contains(2));
        assert!(content.contains(4));
        assert!(!content.contains(5));
        assert!(content.contains(8));
        assert!(!content.contains(9));
    }

    #[test]
    fn test_text_form() {
        let content = ContentIntervals::from_intervals([(1, 100), (201, 300)]);
        assert_eq!(content.to_string(), "1,100;201,300");
        assert_eq!("1,100;201,300".parse::<ContentIntervals>().unwrap(), content);
        assert_eq!(ContentIntervals::new().to_string(), "empty");
        assert!("empty".parse::<ContentIntervals>().unwrap().is_empty());
        assert!("1-100".parse::<ContentIntervals>().is_err());
    }
}
