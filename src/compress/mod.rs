//! Methods for compressing the posting lists
//!
//! Each term gets one blob of gamma codes:
//! `first docid, (frequency, docid gap)*, last frequency`.

use std::{io::Write, iter::Peekable};

use indicatif::ProgressBar;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    base::{DocId, Frequency, Occurrence, Posting, TermId},
    error::{CodecError, IndexError, Result},
};

pub mod gamma;

use gamma::GammaIterator;

/// Statistics gathered while compressing the postings of a term
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TermStatistics {
    /// Number of distinct documents
    pub review_frequency: Frequency,

    /// Number of occurrences (repeats included)
    pub collection_frequency: Frequency,

    /// Start of the term blob in the postings file
    pub postings_pointer: u64,
}

/// Writes gamma-coded postings and keeps track of the output length
pub struct PostingsWriter<W: Write> {
    writer: W,
    position: u64,
}

/// Returns the next occurrence without consuming it, surfacing stream errors
fn peek_occurrence<I>(occurrences: &mut Peekable<I>) -> Result<Option<Occurrence>>
where
    I: Iterator<Item = Result<Occurrence>>,
{
    if matches!(occurrences.peek(), Some(Err(_))) {
        if let Some(Err(e)) = occurrences.next() {
            return Err(e);
        }
    }
    Ok(occurrences.peek().and_then(|r| r.as_ref().ok()).copied())
}

impl<W: Write> PostingsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            position: 0,
        }
    }

    /// Number of bytes written so far
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    fn emit(&mut self, x: u32) -> Result<()> {
        self.position += gamma::encode_into(&mut self.writer, x)? as u64;
        Ok(())
    }

    /// Consumes the occurrences of `term_id` at the head of the stream
    ///
    /// The stream must be sorted by (term, document); a term without any
    /// occurrence gets an empty blob.
    pub fn write_term<I>(
        &mut self,
        term_id: TermId,
        occurrences: &mut Peekable<I>,
    ) -> Result<TermStatistics>
    where
        I: Iterator<Item = Result<Occurrence>>,
    {
        let mut stats = TermStatistics {
            postings_pointer: self.position,
            ..Default::default()
        };

        let first = match peek_occurrence(occurrences)? {
            Some(o) if o.term_id == term_id => o,
            Some(o) if o.term_id < term_id => {
                return Err(IndexError::Format(format!(
                    "occurrences are not sorted: term {} found after term {}",
                    o.term_id, term_id
                )))
            }
            _ => return Ok(stats),
        };
        occurrences.next();

        self.emit(first.docid)?;
        let mut previous: DocId = first.docid;
        let mut repeats: Frequency = 1;
        stats.review_frequency = 1;
        stats.collection_frequency = 1;

        while let Some(o) = peek_occurrence(occurrences)? {
            if o.term_id != term_id {
                break;
            }
            occurrences.next();

            if o.docid == previous {
                repeats += 1;
            } else if o.docid > previous {
                self.emit(repeats)?;
                self.emit(o.docid - previous)?;
                previous = o.docid;
                repeats = 1;
                stats.review_frequency += 1;
            } else {
                return Err(IndexError::Format(format!(
                    "document IDs should be increasing for term {}: {} after {}",
                    term_id, o.docid, previous
                )));
            }
            stats.collection_frequency += 1;
        }
        self.emit(repeats)?;

        debug!(
            "Term {} at {}: {} documents, {} occurrences",
            term_id, stats.postings_pointer, stats.review_frequency, stats.collection_frequency
        );
        Ok(stats)
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Compresses a merged occurrence stream into `writer`
///
/// Returns the statistics of every term in `0..num_terms` and the number
/// of bytes written.
pub fn compress_postings<I, W>(
    occurrences: I,
    num_terms: usize,
    writer: W,
    progress: &ProgressBar,
) -> Result<(Vec<TermStatistics>, u64)>
where
    I: Iterator<Item = Result<Occurrence>>,
    W: Write,
{
    let mut occurrences = occurrences.peekable();
    let mut postings = PostingsWriter::new(writer);
    let mut terms = Vec::with_capacity(num_terms);

    for term_id in 0..num_terms {
        terms.push(postings.write_term(term_id as TermId, &mut occurrences)?);
        progress.inc(1);
    }

    if let Some(o) = peek_occurrence(&mut occurrences)? {
        return Err(IndexError::Format(format!(
            "occurrence {} refers to a term outside of the vocabulary ({} terms)",
            o, num_terms
        )));
    }

    let length = postings.position();
    postings.into_inner()?;
    info!("Compressed postings of {} terms ({} bytes)", num_terms, length);
    Ok((terms, length))
}

/// Folds decoded (gap, frequency) values into postings
pub fn fold_postings(values: &[u32]) -> std::result::Result<Vec<Posting>, CodecError> {
    if values.len() % 2 != 0 {
        return Err(CodecError::UnpairedValue {
            count: values.len(),
        });
    }

    let mut docid: DocId = 0;
    let mut postings = Vec::with_capacity(values.len() / 2);
    for (ix, pair) in values.chunks_exact(2).enumerate() {
        docid = docid
            .checked_add(pair[0])
            .ok_or(CodecError::Overflow { offset: 2 * ix })?;
        postings.push(Posting {
            docid,
            frequency: pair[1],
        });
    }
    Ok(postings)
}

/// Lazily decodes the blob of a term into postings
pub struct PostingsIterator<'a> {
    codes: GammaIterator<'a>,
    docid: DocId,
    count: usize,
    failed: bool,
}

impl<'a> PostingsIterator<'a> {
    pub fn new(blob: &'a [u8]) -> Self {
        Self {
            codes: GammaIterator::new(blob),
            docid: 0,
            count: 0,
            failed: false,
        }
    }

    fn next_posting(&mut self, gap: u32) -> std::result::Result<Posting, CodecError> {
        let offset = self.codes.offset();
        let frequency = match self.codes.next() {
            Some(frequency) => frequency?,
            None => return Err(CodecError::UnpairedValue { count: self.count }),
        };
        self.count += 1;

        self.docid = self
            .docid
            .checked_add(gap)
            .ok_or(CodecError::Overflow { offset })?;
        Ok(Posting {
            docid: self.docid,
            frequency,
        })
    }
}

impl<'a> Iterator for PostingsIterator<'a> {
    type Item = std::result::Result<Posting, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let posting = self.codes.next()?.and_then(|gap| {
            self.count += 1;
            self.next_posting(gap)
        });
        self.failed = posting.is_err();
        Some(posting)
    }
}
