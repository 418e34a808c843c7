use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, info};

use super::{decode_block, read_entry, read_header, DictionaryEntry};
use crate::{
    base::{Posting, TermId, DICTIONARY_DAT, POSTINGS_DAT, TERMS_DAT},
    compress::{fold_postings, gamma, PostingsIterator},
    error::{IndexError, Result},
    utils::buffer::{open_buffer, Buffer},
};

const HEADER_BYTES: u64 = 8;

/// Frequencies and pointer; the lengths are optional
const MIN_RECORD_BYTES: u64 = 16;

/// Read side of the dictionary and of the postings file
///
/// Term metadata is held in memory; term strings are rebuilt block by
/// block when needed.
pub struct DictionaryReader {
    block_size: usize,
    num_tokens: u64,
    entries: Vec<DictionaryEntry>,

    /// Byte range of each block in the terms file
    blocks: Vec<(usize, usize)>,

    terms: Box<dyn Buffer>,
    postings: Box<dyn Buffer>,
}

/// Scans the length prefixes of the terms file
fn block_ranges(terms: &dyn Buffer) -> Result<Vec<(usize, usize)>> {
    let mut blocks = Vec::new();
    let mut position = 0;
    while position < terms.len() {
        let length = terms.slice(position, position + 4)?.read_u32::<BigEndian>()? as usize;
        let start = position + 4;
        let end = start + length;
        if end > terms.len() {
            return Err(IndexError::Format(format!(
                "terms block at {} ends after the end of the file",
                position
            )));
        }
        blocks.push((start, end));
        position = end;
    }
    Ok(blocks)
}

impl DictionaryReader {
    /// Opens the dictionary files of `folder` built with blocks of
    /// `block_size` terms
    pub fn load(folder: &Path, block_size: usize, in_memory: bool) -> Result<Self> {
        if block_size == 0 {
            return Err(IndexError::Format("block size is 0".to_string()));
        }

        let file = File::open(folder.join(DICTIONARY_DAT))?;
        let file_length = file.metadata()?.len();
        let mut metadata = BufReader::new(file);
        let (num_terms, num_tokens) = read_header(&mut metadata)?;
        let max_terms = file_length.saturating_sub(HEADER_BYTES) / MIN_RECORD_BYTES;
        if num_terms as u64 > max_terms {
            return Err(IndexError::Format(format!(
                "{} announces {} terms but holds at most {}",
                DICTIONARY_DAT, num_terms, max_terms
            )));
        }
        let mut entries = Vec::with_capacity(num_terms);
        for ix in 0..num_terms {
            entries.push(read_entry(&mut metadata, ix % block_size, block_size)?);
        }
        if metadata.read(&mut [0u8])? != 0 {
            return Err(IndexError::Format(format!(
                "{} has data after {} records",
                DICTIONARY_DAT, num_terms
            )));
        }

        let terms = open_buffer(&folder.join(TERMS_DAT), in_memory)?;
        let blocks = block_ranges(terms.as_ref())?;
        let expected_blocks = (num_terms + block_size - 1) / block_size;
        if blocks.len() != expected_blocks {
            return Err(IndexError::Format(format!(
                "{} blocks of terms, expected {}",
                blocks.len(),
                expected_blocks
            )));
        }

        let postings = open_buffer(&folder.join(POSTINGS_DAT), in_memory)?;
        let mut previous = 0;
        for (ix, entry) in entries.iter().enumerate() {
            if entry.postings_pointer < previous || entry.postings_pointer > postings.len() as u64 {
                return Err(IndexError::Format(format!(
                    "invalid postings pointer {} for term {}",
                    entry.postings_pointer, ix
                )));
            }
            previous = entry.postings_pointer;
        }

        info!(
            "Loaded dictionary with {} terms in {} blocks ({} tokens, in memory: {})",
            num_terms,
            blocks.len(),
            num_tokens,
            in_memory
        );
        Ok(Self {
            block_size,
            num_tokens,
            entries,
            blocks,
            terms,
            postings,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_terms(&self) -> usize {
        self.entries.len()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of occurrences in the corpus
    pub fn num_tokens(&self) -> u64 {
        self.num_tokens
    }

    pub fn entry(&self, term_id: TermId) -> Option<&DictionaryEntry> {
        self.entries.get(term_id as usize)
    }

    /// Rebuilds the terms of a block
    pub fn block_terms(&self, block: usize) -> Result<Vec<String>> {
        let (start, end) = *self.blocks.get(block).ok_or_else(|| {
            IndexError::Format(format!("block {} out of {}", block, self.blocks.len()))
        })?;
        let first = block * self.block_size;
        let last = (first + self.block_size).min(self.entries.len());
        decode_block(&self.entries[first..last], self.terms.slice(start, end)?)
    }

    pub fn term(&self, term_id: TermId) -> Result<Option<String>> {
        let term_id = term_id as usize;
        if term_id >= self.entries.len() {
            return Ok(None);
        }
        let mut terms = self.block_terms(term_id / self.block_size)?;
        Ok(Some(terms.swap_remove(term_id % self.block_size)))
    }

    /// All the terms, in identifier order
    pub fn terms(&self) -> Result<Vec<String>> {
        let mut terms = Vec::with_capacity(self.entries.len());
        for block in 0..self.blocks.len() {
            terms.extend(self.block_terms(block)?);
        }
        Ok(terms)
    }

    /// Finds the identifier of a term
    pub fn resolve(&self, term: &str) -> Result<Option<TermId>> {
        self.locate(term, |_| {})
    }

    /// Binary search over the blocks; `visit` is called with every block
    /// that gets rebuilt
    pub(crate) fn locate(&self, term: &str, mut visit: impl FnMut(usize)) -> Result<Option<TermId>> {
        let (mut lo, mut hi) = (0, self.blocks.len());
        while lo < hi {
            // Lower median of the blocks left
            let mid = lo + (hi - lo - 1) / 2;
            visit(mid);
            let terms = self.block_terms(mid)?;
            match terms.binary_search_by(|t| t.as_str().cmp(term)) {
                Ok(offset) => {
                    let term_id = (mid * self.block_size + offset) as TermId;
                    debug!("Term {:?} is {} (block {})", term, term_id, mid);
                    return Ok(Some(term_id));
                }
                Err(0) => hi = mid,
                Err(offset) if offset == terms.len() => lo = mid + 1,
                // Falls between two terms of the block
                Err(_) => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Gamma codes of the postings of a term
    pub fn postings_blob(&self, term_id: TermId) -> Result<&[u8]> {
        let ix = term_id as usize;
        let entry = self.entries.get(ix).ok_or_else(|| {
            IndexError::Format(format!("term {} out of {}", term_id, self.entries.len()))
        })?;
        let end = self
            .entries
            .get(ix + 1)
            .map(|e| e.postings_pointer as usize)
            .unwrap_or_else(|| self.postings.len());
        Ok(self.postings.slice(entry.postings_pointer as usize, end)?)
    }

    /// Decodes the whole postings list of a term
    pub fn postings_for(&self, term_id: TermId) -> Result<Vec<Posting>> {
        let values = gamma::decode_sequence(self.postings_blob(term_id)?)?;
        Ok(fold_postings(&values)?)
    }

    /// Lazily decodes the postings list of a term
    pub fn postings_iter(&self, term_id: TermId) -> Result<PostingsIterator<'_>> {
        Ok(PostingsIterator::new(self.postings_blob(term_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::Occurrence,
        compress::compress_postings,
        dictionary::{DictionaryWriter, VocabularyBuilder},
    };
    use indicatif::ProgressBar;
    use rstest::rstest;
    use std::fs;
    use temp_dir::TempDir;

    fn build(dir: &Path, terms: &[&str], occurrences: &[(TermId, u32)], block_size: usize) {
        let mut builder = VocabularyBuilder::new();
        builder.extend(terms.iter().copied());
        let vocabulary = builder.freeze();

        let file = fs::File::create(dir.join(POSTINGS_DAT)).unwrap();
        let stream = occurrences.iter().map(|&(t, d)| Ok(Occurrence::new(t, d)));
        let (statistics, _) =
            compress_postings(stream, terms.len(), file, &ProgressBar::hidden()).unwrap();
        DictionaryWriter::new(block_size)
            .unwrap()
            .write(dir, &vocabulary, &statistics, occurrences.len() as u64)
            .unwrap();
    }

    #[rstest]
    fn test_three_terms(#[values(true, false)] in_memory: bool) {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(
            dir.path(),
            &["apple", "ant", "banana"],
            &[(0, 2), (1, 3), (1, 3), (1, 3), (1, 7), (1, 9), (1, 9), (2, 1)],
            2,
        );

        let reader = DictionaryReader::load(dir.path(), 2, in_memory).unwrap();
        assert_eq!(reader.num_terms(), 3);
        assert_eq!(reader.num_blocks(), 2);
        assert_eq!(reader.num_tokens(), 8);
        assert_eq!(reader.terms().unwrap(), vec!["ant", "apple", "banana"]);

        let mut visited = Vec::new();
        assert_eq!(reader.locate("apple", |b| visited.push(b)).unwrap(), Some(1));
        assert_eq!(visited, vec![0]);

        assert_eq!(reader.resolve("banana").unwrap(), Some(2));
        assert_eq!(reader.term(2).unwrap().as_deref(), Some("banana"));
        assert_eq!(reader.term(3).unwrap(), None);

        let entry = reader.entry(1).unwrap();
        assert_eq!(entry.collection_frequency, 6);
        assert_eq!(entry.review_frequency, 3);
        assert_eq!(
            reader.postings_for(1).unwrap(),
            vec![
                Posting { docid: 3, frequency: 3 },
                Posting { docid: 7, frequency: 1 },
                Posting { docid: 9, frequency: 2 }
            ]
        );
    }

    #[rstest]
    #[case("aardvark")]
    #[case("anteater")]
    #[case("b")]
    #[case("zebra")]
    #[case("")]
    fn test_missing_terms(#[case] term: &str) {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), &["ant", "apple", "banana", "cherry", "date"], &[], 2);

        let reader = DictionaryReader::load(dir.path(), 2, true).unwrap();
        assert_eq!(reader.resolve(term).unwrap(), None);
    }

    #[test]
    fn test_every_term_resolves() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let terms: Vec<String> = (0..47).map(|i| format!("term{:03}", i * 7)).collect();
        let refs: Vec<&str> = terms.iter().map(|t| t.as_str()).collect();

        for block_size in [1, 2, 3, 10, 47, 100] {
            build(dir.path(), &refs, &[], block_size);
            let reader = DictionaryReader::load(dir.path(), block_size, false).unwrap();
            for (ix, term) in terms.iter().enumerate() {
                let mut visits = 0;
                let found = reader.locate(term, |_| visits += 1).unwrap();
                assert_eq!(found, Some(ix as TermId), "{} with blocks of {}", term, block_size);
                assert!(visits <= 1 + (reader.num_blocks() as f64).log2().ceil() as usize);
            }
        }
    }

    #[test]
    fn test_empty_dictionary() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), &[], &[], 3);

        let reader = DictionaryReader::load(dir.path(), 3, false).unwrap();
        assert_eq!(reader.num_terms(), 0);
        assert_eq!(reader.resolve("anything").unwrap(), None);
        assert!(reader.postings_for(0).is_err());
    }

    #[test]
    fn test_wrong_block_size() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), &["a", "b", "c", "d"], &[], 2);
        assert!(DictionaryReader::load(dir.path(), 3, false).is_err());
    }

    #[test]
    fn test_oversized_header() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), &["apple", "banana"], &[], 1);

        // Announce 2^31 - 1 terms
        let path = dir.path().join(DICTIONARY_DAT);
        let mut bytes = fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&i32::MAX.to_be_bytes());
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            DictionaryReader::load(dir.path(), 1, false),
            Err(IndexError::Format(msg)) if msg.contains("2147483647")
        ));
    }

    #[test]
    fn test_truncated_terms_file() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), &["apple", "banana"], &[], 1);

        let path = dir.path().join(TERMS_DAT);
        let mut bytes = fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 2);
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            DictionaryReader::load(dir.path(), 1, true),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_reader_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DictionaryReader>();
    }
}
