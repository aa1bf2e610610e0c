//! Unary and Elias-gamma bit codes.
//!
//! Bits are kept in a [`BitVec`] whose byte form is most-significant-bit
//! first, so a packed block reads left to right the same way it was written.

use bit_vec::BitVec;

use crate::error::{PostlineError, Result};

/// Append the unary code of `n`: `n - 1` one-bits followed by a zero-bit.
pub fn encode_unary(n: u64, out: &mut BitVec) -> Result<()> {
    if n == 0 {
        return Err(PostlineError::codec("unary code is undefined for 0"));
    }
    out.grow(n as usize - 1, true);
    out.push(false);
    Ok(())
}

/// Append the Elias-gamma code of `n`.
///
/// The bit length of `n` is written in unary, followed by the low-order bits
/// of `n` without its leading 1.
pub fn encode_gamma(n: u64, out: &mut BitVec) -> Result<()> {
    if n == 0 {
        return Err(PostlineError::codec("gamma code is undefined for 0"));
    }
    let length = u64::BITS - n.leading_zeros();
    encode_unary(length as u64, out)?;
    for shift in (0..length - 1).rev() {
        out.push((n >> shift) & 1 == 1);
    }
    Ok(())
}

/// Group bits into bytes, right-padding the final byte with 1-bits.
pub fn pack_bits(bits: &BitVec) -> Vec<u8> {
    let mut padded = bits.clone();
    let padding = (8 - padded.len() % 8) % 8;
    padded.grow(padding, true);
    padded.to_bytes()
}

/// Expand packed bytes back into a bit stream (padding included).
pub fn unpack_bits(bytes: &[u8]) -> BitVec {
    BitVec::from_bytes(bytes)
}

/// Sequential decoder over a bit stream.
///
/// Each `decode_*` call consumes exactly one value; [`BitReader::remaining`]
/// reports how many bits are left after it.
#[derive(Debug)]
pub struct BitReader<'a> {
    bits: &'a BitVec,
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bits: &'a BitVec) -> Self {
        BitReader { bits, position: 0 }
    }

    /// Bit offset of the next unread bit.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of unread bits, padding included.
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.position
    }

    fn next_bit(&mut self) -> Result<bool> {
        let bit = self
            .bits
            .get(self.position)
            .ok_or_else(|| PostlineError::codec("bit stream ended inside a code"))?;
        self.position += 1;
        Ok(bit)
    }

    /// Decode one unary-coded value.
    pub fn decode_unary(&mut self) -> Result<u64> {
        let mut ones = 0u64;
        while self.next_bit()? {
            ones += 1;
        }
        Ok(ones + 1)
    }

    /// Decode one gamma-coded value.
    pub fn decode_gamma(&mut self) -> Result<u64> {
        let length = self.decode_unary()?;
        if length > u64::BITS as u64 {
            return Err(PostlineError::codec(format!(
                "gamma length prefix {length} exceeds 64 bits"
            )));
        }
        let mut value = 1u64;
        for _ in 1..length {
            value = (value << 1) | self.next_bit()? as u64;
        }
        Ok(value)
    }
}
