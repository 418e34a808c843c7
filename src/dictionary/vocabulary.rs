use std::collections::BTreeSet;

use crate::{
    base::{Len, TermId},
    error::{IndexError, Result},
};

/// Collects the distinct terms of a corpus
///
/// Terms can only be added; [`VocabularyBuilder::freeze`] assigns the
/// term identifiers in sorted order.
#[derive(Default, Debug)]
pub struct VocabularyBuilder {
    terms: BTreeSet<String>,
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, term: &str) {
        if !self.terms.contains(term) {
            self.terms.insert(term.to_string());
        }
    }

    pub fn extend<'a, I: IntoIterator<Item = &'a str>>(&mut self, terms: I) {
        for term in terms {
            self.insert(term);
        }
    }

    pub fn freeze(self) -> Vocabulary {
        Vocabulary {
            terms: self.terms.into_iter().collect(),
        }
    }
}

impl Len for VocabularyBuilder {
    fn len(&self) -> usize {
        self.terms.len()
    }
}

/// Sorted list of distinct terms; the identifier of a term is its rank
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vocabulary {
    terms: Vec<String>,
}

impl Vocabulary {
    /// Builds a vocabulary from terms that are already sorted and distinct
    pub fn from_sorted(terms: Vec<String>) -> Result<Self> {
        if let Some(ix) = terms.windows(2).position(|w| w[0] >= w[1]) {
            return Err(IndexError::InvalidOption(format!(
                "vocabulary is not strictly increasing at term {} ({:?} then {:?})",
                ix + 1,
                terms[ix],
                terms[ix + 1]
            )));
        }
        if terms.len() > i32::MAX as usize {
            return Err(IndexError::InvalidOption(format!(
                "too many terms ({})",
                terms.len()
            )));
        }
        Ok(Self { terms })
    }

    pub fn id(&self, term: &str) -> Option<TermId> {
        self.terms
            .binary_search_by(|t| t.as_str().cmp(term))
            .ok()
            .map(|ix| ix as TermId)
    }

    pub fn term(&self, term_id: TermId) -> Option<&str> {
        self.terms.get(term_id as usize).map(|t| t.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.as_str())
    }
}

impl Len for Vocabulary {
    fn len(&self) -> usize {
        self.terms.len()
    }
}
