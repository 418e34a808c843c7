//! Query side of the index
//!
//! [`ReviewIndex`] answers term-level questions for the ranking layer.
//! Lookup failures are logged and degrade to empty answers so that a
//! multi-term query still gets the terms that could be read; the `try_`
//! methods surface them instead.

use std::{borrow::Cow, path::Path};

use log::{error, warn};

use crate::{
    base::{load_information, Frequency, IndexInformation, Posting, TermId},
    dictionary::{DictionaryEntry, DictionaryReader},
    error::{IndexError, Result},
};

/// Term statistics and postings, as seen by a ranking function
pub trait InvertedIndex: Send + Sync {
    /// Number of documents containing the term (0 if absent)
    fn token_frequency(&self, term: &str) -> Frequency;

    /// Number of occurrences of the term, repeats included (0 if absent)
    fn collection_frequency(&self, term: &str) -> Frequency;

    /// Postings of the term by increasing document ID (empty if absent)
    fn postings<'a>(&'a self, term: &str) -> Box<dyn Iterator<Item = Posting> + 'a>;

    /// Number of occurrences in the corpus
    fn total_token_count(&self) -> u64;
}

pub struct ReviewIndex {
    information: IndexInformation,
    dictionary: DictionaryReader,
}

impl ReviewIndex {
    /// Loads an index folder
    pub fn load(path: &Path, in_memory: bool) -> Result<Self> {
        let information = load_information(path)?;
        let dictionary = DictionaryReader::load(path, information.block_size, in_memory)?;

        if dictionary.num_terms() != information.num_terms
            || dictionary.num_tokens() != information.num_tokens
        {
            return Err(IndexError::Format(format!(
                "dictionary holds {} terms and {} tokens, index information says {} and {}",
                dictionary.num_terms(),
                dictionary.num_tokens(),
                information.num_terms,
                information.num_tokens
            )));
        }
        Ok(Self {
            information,
            dictionary,
        })
    }

    pub fn information(&self) -> &IndexInformation {
        &self.information
    }

    pub fn dictionary(&self) -> &DictionaryReader {
        &self.dictionary
    }

    pub fn num_terms(&self) -> usize {
        self.dictionary.num_terms()
    }

    fn normalize<'t>(&self, term: &'t str) -> Cow<'t, str> {
        if self.information.case_insensitive {
            Cow::Owned(term.to_lowercase())
        } else {
            Cow::Borrowed(term)
        }
    }

    pub fn term_id(&self, term: &str) -> Result<Option<TermId>> {
        self.dictionary.resolve(&self.normalize(term))
    }

    /// Statistics of a term; lookup errors are logged and treated as a miss
    fn entry(&self, term: &str) -> Option<&DictionaryEntry> {
        match self.term_id(term) {
            Ok(term_id) => term_id.and_then(|id| self.dictionary.entry(id)),
            Err(e) => {
                error!("Could not look up {:?}: {}", term, e);
                None
            }
        }
    }

    /// Decodes all the postings of a term, failing on corrupted data
    pub fn try_postings(&self, term: &str) -> Result<Vec<Posting>> {
        match self.term_id(term)? {
            Some(term_id) => self.dictionary.postings_for(term_id),
            None => Ok(Vec::new()),
        }
    }
}

impl InvertedIndex for ReviewIndex {
    fn token_frequency(&self, term: &str) -> Frequency {
        self.entry(term).map(|e| e.review_frequency).unwrap_or(0)
    }

    fn collection_frequency(&self, term: &str) -> Frequency {
        self.entry(term).map(|e| e.collection_frequency).unwrap_or(0)
    }

    fn postings<'a>(&'a self, term: &str) -> Box<dyn Iterator<Item = Posting> + 'a> {
        let postings = self
            .term_id(term)
            .and_then(|term_id| match term_id {
                Some(term_id) => self.dictionary.postings_iter(term_id).map(Some),
                None => Ok(None),
            });

        match postings {
            Ok(Some(postings)) => {
                let term = term.to_string();
                Box::new(postings.map_while(move |posting| match posting {
                    Ok(posting) => Some(posting),
                    Err(e) => {
                        warn!("Postings of {:?} are truncated: {}", term, e);
                        None
                    }
                }))
            }
            Ok(None) => Box::new(std::iter::empty()),
            Err(e) => {
                error!("Could not read the postings of {:?}: {}", term, e);
                Box::new(std::iter::empty())
            }
        }
    }

    fn total_token_count(&self) -> u64 {
        self.dictionary.num_tokens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::{save_information, POSTINGS_DAT},
        builder::{BuilderOptions, Indexer},
        dictionary::VocabularyBuilder,
    };
    use std::fs;
    use temp_dir::TempDir;

    fn build(dir: &Path, case_insensitive: bool) {
        let mut vocabulary = VocabularyBuilder::new();
        vocabulary.extend(["great", "phone", "screen"]);
        let options = BuilderOptions {
            block_size: 2,
            case_insensitive,
            show_progress: false,
            ..Default::default()
        };
        let mut indexer = Indexer::new(dir, &options, vocabulary.freeze()).unwrap();
        indexer.add_document(1, &[0, 1]).unwrap();
        indexer.add_document(2, &[1, 2, 1]).unwrap();
        indexer.build().unwrap();
    }

    #[test]
    fn test_case_sensitivity() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), false);
        let index = ReviewIndex::load(dir.path(), false).unwrap();
        assert_eq!(index.token_frequency("phone"), 2);
        assert_eq!(index.token_frequency("Phone"), 0);

        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), true);
        let index = ReviewIndex::load(dir.path(), false).unwrap();
        assert_eq!(index.token_frequency("Phone"), 2);
        assert_eq!(index.collection_frequency("PHONE"), 3);
        assert_eq!(index.postings("SCREEN").count(), 1);
    }

    #[test]
    fn test_missing_term() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), false);
        let index = ReviewIndex::load(dir.path(), true).unwrap();

        assert_eq!(index.num_terms(), 3);
        assert_eq!(index.term_id("battery").unwrap(), None);
        assert_eq!(index.token_frequency("battery"), 0);
        assert_eq!(index.collection_frequency("battery"), 0);
        assert_eq!(index.postings("battery").count(), 0);
        assert!(index.try_postings("battery").unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_postings_degrade() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), false);

        // "great" (1 posting) then "phone", whose first code is cut
        let path = dir.path().join(POSTINGS_DAT);
        let mut bytes = fs::read(&path).unwrap();
        let phone = ReviewIndex::load(dir.path(), true)
            .unwrap()
            .dictionary()
            .entry(1)
            .unwrap()
            .postings_pointer as usize;
        bytes[phone] = 0x01;
        fs::write(&path, bytes).unwrap();

        let index = ReviewIndex::load(dir.path(), true).unwrap();
        assert_eq!(index.postings("phone").count(), 0);
        assert!(matches!(
            index.try_postings("phone"),
            Err(IndexError::Codec(_))
        ));
        assert_eq!(index.postings("great").count(), 1);
    }

    #[test]
    fn test_inconsistent_information() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        build(dir.path(), false);

        let mut information = load_information(dir.path()).unwrap();
        information.num_tokens += 1;
        save_information(&information, dir.path()).unwrap();
        assert!(matches!(
            ReviewIndex::load(dir.path(), false),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_missing_folder() {
        let dir = TempDir::new().expect("Could not create temporary directory");
        assert!(ReviewIndex::load(&dir.path().join("nothing"), false).is_err());
    }
}
