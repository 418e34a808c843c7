use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use byteorder::{BigEndian, WriteBytesExt};
use log::info;

use super::{
    common_prefix_len, is_last_in_block, write_entry, write_header, DictionaryEntry, Vocabulary,
};
use crate::{
    base::{Len, DICTIONARY_DAT, TERMS_DAT},
    compress::TermStatistics,
    error::{IndexError, Result},
};

/// Writes the term metadata and the front-coded term blocks
pub struct DictionaryWriter {
    block_size: usize,
}

impl DictionaryWriter {
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(IndexError::InvalidOption(
                "the dictionary block size should be positive".to_string(),
            ));
        }
        Ok(Self { block_size })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Writes `dictionary.dat` and `terms.dat` in `folder`
    pub fn write(
        &self,
        folder: &Path,
        vocabulary: &Vocabulary,
        statistics: &[TermStatistics],
        num_tokens: u64,
    ) -> Result<()> {
        if statistics.len() != vocabulary.len() {
            return Err(IndexError::Format(format!(
                "{} term statistics for a vocabulary of {} terms",
                statistics.len(),
                vocabulary.len()
            )));
        }

        let mut metadata = BufWriter::new(File::create(folder.join(DICTIONARY_DAT))?);
        let mut blocks = BufWriter::new(File::create(folder.join(TERMS_DAT))?);

        write_header(&mut metadata, vocabulary.len(), num_tokens)?;

        let mut block: Vec<u8> = Vec::new();
        let mut previous: &[u8] = &[];
        let mut num_blocks = 0;
        for (ix, (term, stats)) in vocabulary.iter().zip(statistics.iter()).enumerate() {
            let term = term.as_bytes();
            let offset = ix % self.block_size;
            if term.len() > i16::MAX as usize {
                return Err(IndexError::Format(format!(
                    "term {} is too long ({} bytes)",
                    ix,
                    term.len()
                )));
            }

            let prefix = if offset == 0 {
                if ix > 0 {
                    write_block(&mut blocks, &block)?;
                    num_blocks += 1;
                }
                block.clear();
                0
            } else {
                common_prefix_len(previous, term)
            };
            block.extend_from_slice(&term[prefix..]);

            let entry = DictionaryEntry {
                review_frequency: stats.review_frequency,
                collection_frequency: stats.collection_frequency,
                postings_pointer: stats.postings_pointer,
                term_length: if is_last_in_block(offset, self.block_size) {
                    None
                } else {
                    Some(term.len() as u16)
                },
                prefix_length: prefix as u16,
            };
            write_entry(&mut metadata, &entry, offset, self.block_size)?;
            previous = term;
        }
        if !vocabulary.is_empty() {
            write_block(&mut blocks, &block)?;
            num_blocks += 1;
        }

        metadata.flush()?;
        blocks.flush()?;
        info!(
            "Wrote dictionary of {} terms in {} blocks of {}",
            vocabulary.len(),
            num_blocks,
            self.block_size
        );
        Ok(())
    }
}

fn write_block<W: Write>(writer: &mut W, block: &[u8]) -> Result<()> {
    let length = u32::try_from(block.len())
        .map_err(|_| IndexError::Format(format!("block of {} bytes is too large", block.len())))?;
    writer.write_u32::<BigEndian>(length)?;
    writer.write_all(block)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::VocabularyBuilder;
    use std::fs;
    use temp_dir::TempDir;

    fn vocabulary(terms: &[&str]) -> Vocabulary {
        let mut builder = VocabularyBuilder::new();
        builder.extend(terms.iter().copied());
        builder.freeze()
    }

    #[test]
    fn test_file_layout() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let vocabulary = vocabulary(&["apple", "ant", "banana"]);
        let statistics = vec![TermStatistics::default(); 3];

        DictionaryWriter::new(2)
            .unwrap()
            .write(dir.path(), &vocabulary, &statistics, 0)
            .unwrap();

        // "ant" + "pple" then "banana", each with a 4-byte length
        let terms = fs::read(dir.path().join(TERMS_DAT)).unwrap();
        let mut expected = vec![0, 0, 0, 7];
        expected.extend_from_slice(b"antpple");
        expected.extend_from_slice(&[0, 0, 0, 6]);
        expected.extend_from_slice(b"banana");
        assert_eq!(terms, expected);

        // Header, then ant (length), apple (prefix), banana (length)
        let metadata = fs::read(dir.path().join(DICTIONARY_DAT)).unwrap();
        assert_eq!(metadata.len(), 8 + (16 + 2) + (16 + 2) + (16 + 2));
    }

    #[test]
    fn test_empty_vocabulary() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        DictionaryWriter::new(4)
            .unwrap()
            .write(dir.path(), &Vocabulary::default(), &[], 0)
            .unwrap();
        assert_eq!(fs::read(dir.path().join(TERMS_DAT)).unwrap().len(), 0);
        assert_eq!(fs::read(dir.path().join(DICTIONARY_DAT)).unwrap().len(), 8);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(DictionaryWriter::new(0).is_err());

        let dir = TempDir::new().expect("Could not create temporary directory");
        let err = DictionaryWriter::new(2)
            .unwrap()
            .write(dir.path(), &vocabulary(&["a"]), &[], 0)
            .unwrap_err();
        assert!(matches!(err, IndexError::Format(_)));
    }
}
