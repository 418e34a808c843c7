use std::fmt;
use std::{fs::File, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::index::ReviewIndex;

/// Dense term identifier (rank in the sorted vocabulary)
pub type TermId = u32;
/// Document identifiers start at 1
pub type DocId = u32;
pub type Frequency = u32;

pub const INDEX_CBOR: &str = "index.cbor";
pub const POSTINGS_DAT: &str = "postings.dat";
pub const DICTIONARY_DAT: &str = "dictionary.dat";
pub const TERMS_DAT: &str = "terms.dat";

/// Current version of the on-disk layout
pub const INDEX_VERSION: u32 = 1;

/// Marks object that have a length
pub trait Len {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One instance of a term within a document
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Occurrence {
    pub term_id: TermId,
    pub docid: DocId,
}

impl Occurrence {
    pub fn new(term_id: TermId, docid: DocId) -> Self {
        Self { term_id, docid }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.term_id, self.docid)
    }
}

/// Posting = document ID + number of occurrences of the term in it
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Posting {
    pub docid: DocId,
    pub frequency: Frequency,
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.docid, self.frequency)
    }
}

/// Summary of a build, stored next to the binary files
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IndexInformation {
    pub version: u32,

    /// Number of terms per front-coding block
    pub block_size: usize,

    pub num_terms: usize,

    /// Number of occurrences in the corpus (repeats included)
    pub num_tokens: u64,

    /// Query terms are lower-cased before lookup
    pub case_insensitive: bool,
}

pub fn save_information(information: &IndexInformation, path: &Path) -> Result<()> {
    let info_file = File::options()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path.join(INDEX_CBOR))?;

    ciborium::ser::into_writer(information, info_file)?;
    Ok(())
}

pub fn load_information(path: &Path) -> Result<IndexInformation> {
    let info_file = File::options().read(true).open(path.join(INDEX_CBOR))?;
    let information: IndexInformation = ciborium::de::from_reader(info_file)?;

    if information.version != INDEX_VERSION {
        return Err(IndexError::Format(format!(
            "unsupported index version {} (expected {})",
            information.version, INDEX_VERSION
        )));
    }
    Ok(information)
}

/// Opens an index folder; `in_memory` reads the files instead of mapping them
pub fn load_index(path: &Path, in_memory: bool) -> Result<ReviewIndex> {
    ReviewIndex::load(path, in_memory)
}
