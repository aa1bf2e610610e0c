//! In-memory accumulation of postings for the chunk being built.

use ahash::AHashMap;

use crate::build::chunk::PostingEntry;

/// Postings of the in-flight chunk, keyed by token.
#[derive(Debug, Default)]
pub struct PostingBuffer {
    postings: AHashMap<String, Vec<(u64, u32)>>,
    threshold: Option<usize>,
}

impl PostingBuffer {
    /// `threshold` is the number of distinct tokens after which the buffer
    /// reports itself full; `None` never fills up.
    pub fn new(threshold: Option<usize>) -> Self {
        PostingBuffer {
            postings: AHashMap::new(),
            threshold,
        }
    }

    /// Add `count` occurrences of `token` in `doc_id`.
    pub fn add(&mut self, token: &str, doc_id: u64, count: u32) {
        let Some(postings) = self.postings.get_mut(token) else {
            self.postings.insert(token.to_string(), vec![(doc_id, count)]);
            return;
        };
        // Documents arrive in order, so an existing posting is almost always the last one.
        match postings.iter_mut().rev().find(|(id, _)| *id == doc_id) {
            Some((_, frequency)) => *frequency = frequency.saturating_add(count),
            None => postings.push((doc_id, count)),
        }
    }

    /// Add every token of one document.
    pub fn add_document<S: AsRef<str>>(&mut self, doc_id: u64, tokens: &[S]) {
        let mut counts: AHashMap<&str, u32> = AHashMap::new();
        for token in tokens {
            *counts.entry(token.as_ref()).or_insert(0) += 1;
        }
        for (token, count) in counts {
            self.add(token, doc_id, count);
        }
    }

    /// Whether the number of distinct tokens exceeds the threshold.
    pub fn is_full(&self) -> bool {
        self.threshold.is_some_and(|threshold| self.postings.len() > threshold)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Empty the buffer, returning its entries sorted by token with postings
    /// sorted by doc id.
    pub fn drain_sorted(&mut self) -> Vec<PostingEntry> {
        let mut entries: Vec<PostingEntry> = self
            .postings
            .drain()
            .map(|(token, mut postings)| {
                postings.sort_unstable_by_key(|&(doc_id, _)| doc_id);
                PostingEntry { token, postings }
            })
            .collect();
        entries.sort_unstable_by(|a, b| a.token.cmp(&b.token));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate_per_document() {
        let mut buffer = PostingBuffer::new(None);
        buffer.add_document(1, &["a", "b", "a"]);
        buffer.add_document(2, &["b", "c"]);
        buffer.add("a", 1, 2);

        let entries = buffer.drain_sorted();
        assert!(buffer.is_empty());
        let tokens: Vec<&str> = entries.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["a", "b", "c"]);
        assert_eq!(entries[0].postings, vec![(1, 4)]);
        assert_eq!(entries[1].postings, vec![(1, 1), (2, 1)]);
    }

    #[test]
    fn test_threshold() {
        let mut buffer = PostingBuffer::new(Some(2));
        buffer.add_document(1, &["x", "y"]);
        assert!(!buffer.is_full());
        buffer.add_document(2, &["z"]);
        assert!(buffer.is_full());

        let mut unbounded = PostingBuffer::new(None);
        unbounded.add_document(1, &(0..1000).map(|i| i.to_string()).collect::<Vec<_>>());
        assert!(!unbounded.is_full());
    }

    #[test]
    fn test_postings_sorted_by_doc_id() {
        let mut buffer = PostingBuffer::new(None);
        buffer.add("t", 9, 1);
        buffer.add("t", 3, 1);
        buffer.add("t", 5, 2);
        let entries = buffer.drain_sorted();
        assert_eq!(entries[0].postings, vec![(3, 1), (5, 2), (9, 1)]);
    }
}
