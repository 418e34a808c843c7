//! Compressed inverted index over a corpus of reviews.
//!
//! Building goes through a memory-bounded external sort of
//! (term, document) occurrences, gamma-coded postings and a
//! front-coded dictionary; see [`builder::Indexer`] and
//! [`index::ReviewIndex`].

pub mod base;
pub mod builder;
pub mod compress;
pub mod dictionary;
pub mod error;
pub mod index;
pub mod sort;
pub mod utils;

pub use error::{CodecError, IndexError, Result};
