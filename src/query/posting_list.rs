//! Query-time posting lists with a forward cursor.

use crate::codec::PostingBlock;

/// Decoded postings of one query token.
///
/// The cursor starts on the first posting. `next` and `next_geq` only move
/// forward; `move_cursor` repositions it anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingList {
    token: String,
    /// Document frequency recorded in the lexicon.
    doc_freq: u64,
    doc_ids: Vec<u64>,
    frequencies: Vec<u32>,
    cursor: usize,
}

impl PostingList {
    pub fn new(token: impl Into<String>, doc_freq: u64, block: PostingBlock) -> Self {
        PostingList {
            token: token.into(),
            doc_freq,
            doc_ids: block.doc_ids,
            frequencies: block.frequencies,
            cursor: 0,
        }
    }

    /// The list of a token that is not in the lexicon.
    pub fn empty(token: impl Into<String>) -> Self {
        Self::new(token, 0, PostingBlock::default())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn doc_freq(&self) -> u64 {
        self.doc_freq
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    pub fn doc_ids(&self) -> &[u64] {
        &self.doc_ids
    }

    /// `(doc_id, frequency)` pairs in doc id order, ignoring the cursor.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.doc_ids
            .iter()
            .copied()
            .zip(self.frequencies.iter().copied())
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The posting under the cursor, `None` once the list is exhausted.
    pub fn current(&self) -> Option<(u64, u32)> {
        Some((
            *self.doc_ids.get(self.cursor)?,
            *self.frequencies.get(self.cursor)?,
        ))
    }

    /// Advance one posting and return the new current one.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(u64, u32)> {
        if self.cursor < self.doc_ids.len() {
            self.cursor += 1;
        }
        self.current()
    }

    /// Advance to the first posting with a doc id of at least `target`.
    pub fn next_geq(&mut self, target: u64) -> Option<(u64, u32)> {
        let remaining = self.doc_ids.get(self.cursor..).unwrap_or_default();
        self.cursor += remaining.partition_point(|&doc_id| doc_id < target);
        self.current()
    }

    /// Put the cursor on position `position`, clamped to the end of the list.
    pub fn move_cursor(&mut self, position: usize) {
        self.cursor = position.min(self.doc_ids.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(doc_ids: &[u64]) -> PostingList {
        PostingList::new(
            "t",
            doc_ids.len() as u64,
            PostingBlock {
                doc_ids: doc_ids.to_vec(),
                frequencies: doc_ids.iter().map(|&d| d as u32 % 3 + 1).collect(),
            },
        )
    }

    #[test]
    fn test_next_walks_the_list() {
        let mut postings = list(&[2, 5, 9]);
        assert_eq!(postings.current(), Some((2, 3)));
        assert_eq!(postings.next(), Some((5, 3)));
        assert_eq!(postings.next(), Some((9, 1)));
        assert_eq!(postings.next(), None);
        assert_eq!(postings.next(), None);
        assert_eq!(postings.cursor(), 3);
    }

    #[test]
    fn test_next_geq() {
        let mut postings = list(&[2, 5, 9, 14, 20]);
        assert_eq!(postings.next_geq(5).map(|p| p.0), Some(5));
        assert_eq!(postings.next_geq(6).map(|p| p.0), Some(9));
        // Never moves backwards.
        assert_eq!(postings.next_geq(1).map(|p| p.0), Some(9));
        assert_eq!(postings.next_geq(20).map(|p| p.0), Some(20));
        assert_eq!(postings.next_geq(21), None);

        postings.move_cursor(1);
        assert_eq!(postings.current().map(|p| p.0), Some(5));
        postings.move_cursor(100);
        assert_eq!(postings.cursor(), 5);
        assert!(postings.current().is_none());
    }

    #[test]
    fn test_empty_list() {
        let mut postings = PostingList::empty("missing");
        assert!(postings.is_empty());
        assert_eq!(postings.doc_freq(), 0);
        assert_eq!(postings.token(), "missing");
        assert_eq!(postings.next_geq(1), None);
        assert_eq!(postings.next(), None);
    }
}
