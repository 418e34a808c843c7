//! Elias-gamma codes, one code per byte-aligned group
//!
//! A value `x` with `b = floor(log2 x)` is written as `b` one bits, a zero
//! bit, and the `b` low-order bits of `x`. The `2b + 1` code bits are
//! right-aligned in `ceil((2b + 1) / 8)` bytes, the high bits being zero
//! padding, so that every code starts on a byte boundary.

use std::io::Write;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use crate::error::{CodecError, Result};

/// Largest `b` that fits a `u32`
const MAX_BITS: u32 = u32::BITS - 1;

#[inline]
fn bit_length(x: u32) -> u32 {
    MAX_BITS - x.leading_zeros()
}

#[inline]
fn code_bytes(b: u32) -> usize {
    ((2 * b + 1 + 7) / 8) as usize
}

/// Number of bytes used by the code of `x` (`x >= 1`)
pub fn encoded_len(x: u32) -> usize {
    code_bytes(bit_length(x.max(1)))
}

/// Code of `x` right-aligned in a `u64`, with its length in bytes
fn code_of(x: u32) -> std::result::Result<(u64, usize), CodecError> {
    if x == 0 {
        return Err(CodecError::ZeroValue);
    }

    // b ones, a zero, then the b low-order bits of x
    let b = bit_length(x);
    let low = (1u64 << b) - 1;
    let code = (low << (b + 1)) | (x as u64 & low);
    Ok((code, code_bytes(b)))
}

/// Writes the code of `x` and returns the number of bytes written
pub fn encode_into<W: Write + ?Sized>(writer: &mut W, x: u32) -> Result<usize> {
    let (code, n) = code_of(x)?;
    let mut bits = BitWriter::endian(writer, BigEndian);
    bits.write(8 * n as u32, code)?;
    Ok(n)
}

pub fn encode(x: u32) -> std::result::Result<Vec<u8>, CodecError> {
    let (code, n) = code_of(x)?;
    Ok(code.to_be_bytes()[8 - n..].to_vec())
}

/// Decodes a buffer holding exactly one code
pub fn decode(bytes: &[u8]) -> std::result::Result<u32, CodecError> {
    let mut codes = GammaIterator::new(bytes);
    let x = codes.next().ok_or(CodecError::Truncated { offset: 0 })??;
    if codes.offset() != bytes.len() {
        return Err(CodecError::Misaligned {
            offset: codes.offset(),
        });
    }
    Ok(x)
}

/// Decodes concatenated codes, in order
pub fn decode_sequence(bytes: &[u8]) -> std::result::Result<Vec<u32>, CodecError> {
    GammaIterator::new(bytes).collect()
}

/// Lazily decodes concatenated codes; stops after the first error
pub struct GammaIterator<'a> {
    reader: BitReader<&'a [u8], BigEndian>,
    /// Offset of the next code
    offset: usize,
    len: usize,
    failed: bool,
}

impl<'a> GammaIterator<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: BitReader::endian(bytes, BigEndian),
            offset: 0,
            len: bytes.len(),
            failed: false,
        }
    }

    /// Byte offset of the next code
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn next_code(&mut self) -> std::result::Result<u32, CodecError> {
        let offset = self.offset;
        let truncated = move |_: std::io::Error| CodecError::Truncated { offset };

        // Skip the padding; a full zero byte is the code of 1
        let mut zeros = 0u32;
        loop {
            if zeros == 8 {
                self.offset += 1;
                return Ok(1);
            }
            if self.reader.read_bit().map_err(truncated)? {
                break;
            }
            zeros += 1;
        }

        let b = 1 + self.reader.read_unary0().map_err(truncated)?;
        if b > MAX_BITS {
            return Err(CodecError::Overflow { offset });
        }

        let n = code_bytes(b);
        if zeros != 8 * n as u32 - (2 * b + 1) {
            return Err(CodecError::Misaligned { offset });
        }

        let low = self.reader.read::<u32>(b).map_err(truncated)?;
        self.offset += n;
        Ok((1u32 << b) | low)
    }
}

impl<'a> Iterator for GammaIterator<'a> {
    type Item = std::result::Result<u32, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.len {
            return None;
        }
        let code = self.next_code();
        self.failed = code.is_err();
        Some(code)
    }
}
