use rand::{seq::SliceRandom, Rng, RngCore};
use rand_distr::{Distribution, Poisson};

use review_index::{
    base::{DocId, Len, TermId},
    dictionary::{Vocabulary, VocabularyBuilder},
};

/// Small alphabet so that many words share a prefix
const LETTERS: &[u8] = b"abcdefgh";

pub struct TestReview {
    pub docid: DocId,
    /// Tokens of the review, repeats included
    pub terms: Vec<TermId>,
}

fn random_word(max_length: usize, rng: &mut dyn RngCore) -> String {
    let length = rng.gen_range(1..=max_length);
    (0..length)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// Creates a vocabulary of `size` distinct random words
pub fn create_vocabulary(size: usize, rng: &mut dyn RngCore) -> Vocabulary {
    let mut builder = VocabularyBuilder::new();
    // Words must be long enough to provide `size` distinct values
    let mut max_length = 3;
    while builder.len() < size {
        if (LETTERS.len() as f64).powi(max_length as i32) < 2. * size as f64 {
            max_length += 1;
            continue;
        }
        builder.insert(&random_word(max_length, rng));
    }
    builder.freeze()
}

/// Creates a review whose length follows a Poisson law
pub fn create_review(
    docid: DocId,
    lambda_words: f64,
    vocabulary_size: usize,
    rng: &mut dyn RngCore,
) -> TestReview {
    let poi = Poisson::new(lambda_words).unwrap();
    let num_words = 1 + poi.sample(rng) as usize;

    let mut terms = Vec::with_capacity(num_words);
    for _ in 0..num_words {
        // Repeat a previous token from time to time
        if !terms.is_empty() && rng.gen_bool(0.3) {
            let term = terms[rng.gen_range(0..terms.len())];
            terms.push(term);
        } else {
            terms.push(rng.gen_range(0..vocabulary_size) as TermId);
        }
    }
    terms.shuffle(rng);

    TestReview { docid, terms }
}
