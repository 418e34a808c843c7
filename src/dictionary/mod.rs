//! Front-coded term dictionary
//!
//! Terms are grouped in blocks of `K` consecutive terms. The metadata
//! file holds one fixed-shape record per term:
//!
//! ```text
//! header:  num_terms: i32, num_tokens: i32
//! record:  review_frequency: i32, collection_frequency: i32,
//!          postings_pointer: i64,
//!          [term_length: i16]    unless last in block
//!          [prefix_length: i16]  unless first in block
//! ```
//!
//! The terms file holds one length-prefixed record per block: the first
//! term in full followed by the suffixes of the other terms, each suffix
//! being stripped of the prefix it shares with its predecessor.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    base::Frequency,
    error::{IndexError, Result},
};

pub mod builder;
pub mod reader;
pub mod vocabulary;

pub use builder::DictionaryWriter;
pub use reader::DictionaryReader;
pub use vocabulary::{Vocabulary, VocabularyBuilder};

/// Default number of terms per block
pub const DEFAULT_BLOCK_SIZE: usize = 10;

/// Metadata of a term
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DictionaryEntry {
    /// Number of distinct documents
    pub review_frequency: Frequency,

    /// Number of occurrences (repeats included)
    pub collection_frequency: Frequency,

    /// Start of the postings blob
    pub postings_pointer: u64,

    /// Term length in bytes; not stored for the last term of a full block
    pub term_length: Option<u16>,

    /// Length of the prefix shared with the previous term (0 for the
    /// first term of a block)
    pub prefix_length: u16,
}

/// Length of the longest common prefix of two terms
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[inline]
pub(crate) fn is_last_in_block(offset: usize, block_size: usize) -> bool {
    offset == block_size - 1
}

fn to_i32(value: u64, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| IndexError::Format(format!("{} {} does not fit 32 bits", what, value)))
}

fn to_u32(value: i32, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| IndexError::Format(format!("negative {} ({})", what, value)))
}

fn to_i16(value: u16) -> Result<i16> {
    i16::try_from(value).map_err(|_| IndexError::Format(format!("term length {} is too long", value)))
}

pub(crate) fn write_header<W: Write>(writer: &mut W, num_terms: usize, num_tokens: u64) -> Result<()> {
    writer.write_i32::<BigEndian>(to_i32(num_terms as u64, "number of terms")?)?;
    writer.write_i32::<BigEndian>(to_i32(num_tokens, "number of tokens")?)?;
    Ok(())
}

/// Returns (number of terms, number of tokens)
pub(crate) fn read_header<R: Read>(reader: &mut R) -> Result<(usize, u64)> {
    let num_terms = to_u32(reader.read_i32::<BigEndian>()?, "number of terms")?;
    let num_tokens = to_u32(reader.read_i32::<BigEndian>()?, "number of tokens")?;
    Ok((num_terms as usize, num_tokens as u64))
}

pub(crate) fn write_entry<W: Write>(
    writer: &mut W,
    entry: &DictionaryEntry,
    offset: usize,
    block_size: usize,
) -> Result<()> {
    writer.write_i32::<BigEndian>(to_i32(entry.review_frequency as u64, "review frequency")?)?;
    writer.write_i32::<BigEndian>(to_i32(entry.collection_frequency as u64, "collection frequency")?)?;
    writer.write_i64::<BigEndian>(entry.postings_pointer as i64)?;

    if !is_last_in_block(offset, block_size) {
        let length = entry.term_length.ok_or_else(|| {
            IndexError::Format(format!("missing term length at block offset {}", offset))
        })?;
        writer.write_i16::<BigEndian>(to_i16(length)?)?;
    }
    if offset != 0 {
        writer.write_i16::<BigEndian>(to_i16(entry.prefix_length)?)?;
    }
    Ok(())
}

pub(crate) fn read_entry<R: Read>(
    reader: &mut R,
    offset: usize,
    block_size: usize,
) -> Result<DictionaryEntry> {
    let review_frequency = to_u32(reader.read_i32::<BigEndian>()?, "review frequency")?;
    let collection_frequency = to_u32(reader.read_i32::<BigEndian>()?, "collection frequency")?;
    let postings_pointer = u64::try_from(reader.read_i64::<BigEndian>()?)
        .map_err(|_| IndexError::Format("negative postings pointer".to_string()))?;

    let mut term_length = None;
    if !is_last_in_block(offset, block_size) {
        let length = reader.read_i16::<BigEndian>()?;
        term_length = Some(
            u16::try_from(length)
                .map_err(|_| IndexError::Format(format!("negative term length ({})", length)))?,
        );
    }
    let mut prefix_length = 0;
    if offset != 0 {
        let length = reader.read_i16::<BigEndian>()?;
        prefix_length = u16::try_from(length)
            .map_err(|_| IndexError::Format(format!("negative prefix length ({})", length)))?;
    }

    Ok(DictionaryEntry {
        review_frequency,
        collection_frequency,
        postings_pointer,
        term_length,
        prefix_length,
    })
}

/// Rebuilds the terms of a block from its entries and front-coded bytes
pub fn decode_block(entries: &[DictionaryEntry], bytes: &[u8]) -> Result<Vec<String>> {
    let mut terms: Vec<Vec<u8>> = Vec::with_capacity(entries.len());
    let mut start = 0;

    for (offset, entry) in entries.iter().enumerate() {
        let prefix = if offset == 0 {
            0
        } else {
            entry.prefix_length as usize
        };
        let previous = terms.last().map(|t| t.as_slice()).unwrap_or(&[]);
        if prefix > previous.len() {
            return Err(IndexError::Format(format!(
                "prefix length {} exceeds the previous term length {}",
                prefix,
                previous.len()
            )));
        }

        let end = match entry.term_length {
            Some(length) if (length as usize) < prefix => {
                return Err(IndexError::Format(format!(
                    "term length {} is shorter than its prefix {}",
                    length, prefix
                )))
            }
            Some(length) => start + length as usize - prefix,
            None => bytes.len(),
        };
        if end > bytes.len() {
            return Err(IndexError::Format(format!(
                "block holds {} bytes, term ends at {}",
                bytes.len(),
                end
            )));
        }

        let mut term = previous[..prefix].to_vec();
        term.extend_from_slice(&bytes[start..end]);
        terms.push(term);
        start = end;
    }

    if start != bytes.len() {
        return Err(IndexError::Format(format!(
            "{} unused bytes at the end of a block",
            bytes.len() - start
        )));
    }

    terms
        .into_iter()
        .map(|t| String::from_utf8(t).map_err(|e| IndexError::Format(e.to_string())))
        .collect()
}
