//! Random corpora and reference postings for the index tests

pub mod documents;
pub mod index;
