//! Posting block encoding.
//!
//! A block holds the postings of one token: doc ids are sorted, turned into
//! gaps (the first gap is relative to 0) and written together with the
//! per-document frequencies. Compressed blocks start with the entry count so
//! that gaps and frequencies can be split without consulting the lexicon.

use bit_vec::BitVec;

use crate::codec::CompressionMode;
use crate::codec::bits::{BitReader, encode_gamma, encode_unary, pack_bits, unpack_bits};
use crate::error::{PostlineError, Result};

/// Decoded postings of one token, sorted by doc id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostingBlock {
    pub doc_ids: Vec<u64>,
    pub frequencies: Vec<u32>,
}

impl PostingBlock {
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Iterate `(doc_id, frequency)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.doc_ids
            .iter()
            .copied()
            .zip(self.frequencies.iter().copied())
    }
}

/// Encode the postings of one token according to `mode`.
///
/// Input order does not matter: pairs are sorted by doc id before the gaps
/// are computed.
pub fn make_posting_block(
    doc_ids: &[u64],
    frequencies: &[u32],
    mode: CompressionMode,
) -> Result<Vec<u8>> {
    if doc_ids.len() != frequencies.len() {
        return Err(PostlineError::codec(format!(
            "posting block has {} doc ids but {} frequencies",
            doc_ids.len(),
            frequencies.len()
        )));
    }
    if doc_ids.is_empty() {
        return Err(PostlineError::codec("cannot encode an empty posting block"));
    }

    let mut pairs: Vec<(u64, u32)> = doc_ids
        .iter()
        .copied()
        .zip(frequencies.iter().copied())
        .collect();
    pairs.sort_unstable_by_key(|&(doc_id, _)| doc_id);

    let mut gaps = Vec::with_capacity(pairs.len());
    let mut previous = 0u64;
    for &(doc_id, _) in &pairs {
        gaps.push(doc_id - previous);
        previous = doc_id;
    }

    let encode: fn(u64, &mut BitVec) -> Result<()> = match mode {
        CompressionMode::None => {
            let gap_text: Vec<String> = gaps.iter().map(u64::to_string).collect();
            let freq_text: Vec<String> = pairs.iter().map(|(_, f)| f.to_string()).collect();
            return Ok(format!("{} {}\n", gap_text.join(","), freq_text.join(",")).into_bytes());
        }
        CompressionMode::Unary => encode_unary,
        CompressionMode::Gamma => encode_gamma,
    };

    if gaps.contains(&0) {
        return Err(PostlineError::codec(
            "doc id 0 or a repeated doc id cannot be gap-encoded",
        ));
    }

    let mut bits = BitVec::new();
    encode(pairs.len() as u64, &mut bits)?;
    for &gap in &gaps {
        encode(gap, &mut bits)?;
    }
    for &(_, frequency) in &pairs {
        encode(frequency as u64, &mut bits)?;
    }
    Ok(pack_bits(&bits))
}

/// Decode a block produced by [`make_posting_block`] with the same `mode`.
pub fn decode_posting_block(bytes: &[u8], mode: CompressionMode) -> Result<PostingBlock> {
    let (gaps, frequencies) = match mode {
        CompressionMode::None => decode_text(bytes)?,
        CompressionMode::Unary => decode_bits(bytes, |reader| reader.decode_unary())?,
        CompressionMode::Gamma => decode_bits(bytes, |reader| reader.decode_gamma())?,
    };

    let mut doc_ids = Vec::with_capacity(gaps.len());
    let mut running = 0u64;
    for gap in gaps {
        running += gap;
        doc_ids.push(running);
    }

    Ok(PostingBlock {
        doc_ids,
        frequencies,
    })
}

fn decode_text(bytes: &[u8]) -> Result<(Vec<u64>, Vec<u32>)> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| PostlineError::format(format!("posting block is not UTF-8: {e}")))?;
    let (gap_part, freq_part) = text
        .trim()
        .split_once(' ')
        .ok_or_else(|| PostlineError::format(format!("malformed posting block '{text}'")))?;

    let gaps = parse_list::<u64>(gap_part)?;
    let frequencies = parse_list::<u32>(freq_part)?;
    if gaps.len() != frequencies.len() {
        return Err(PostlineError::format(format!(
            "posting block has {} gaps but {} frequencies",
            gaps.len(),
            frequencies.len()
        )));
    }
    Ok((gaps, frequencies))
}

fn parse_list<T: std::str::FromStr>(list: &str) -> Result<Vec<T>> {
    list.trim()
        .split(',')
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| PostlineError::format(format!("invalid integer '{value}'")))
        })
        .collect()
}

fn decode_bits<F>(bytes: &[u8], decode: F) -> Result<(Vec<u64>, Vec<u32>)>
where
    F: Fn(&mut BitReader<'_>) -> Result<u64>,
{
    let bits = unpack_bits(bytes);
    let mut reader = BitReader::new(&bits);

    let count = decode(&mut reader)? as usize;
    let mut gaps = Vec::with_capacity(count);
    for _ in 0..count {
        gaps.push(decode(&mut reader)?);
    }
    let mut frequencies = Vec::with_capacity(count);
    for _ in 0..count {
        let frequency = decode(&mut reader)?;
        let frequency = u32::try_from(frequency)
            .map_err(|_| PostlineError::codec(format!("frequency {frequency} overflows u32")))?;
        frequencies.push(frequency);
    }

    if reader.remaining() >= 8 {
        return Err(PostlineError::codec(format!(
            "{} trailing bits after posting block",
            reader.remaining()
        )));
    }
    Ok((gaps, frequencies))
}
