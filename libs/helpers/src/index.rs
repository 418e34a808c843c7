use std::collections::{BTreeMap, HashMap};

use log::info;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use temp_dir::TempDir;

use crate::documents::{create_review, create_vocabulary, TestReview};
use review_index::{
    base::{DocId, Frequency, Len, Posting, TermId},
    builder::{BuilderOptions, Indexer},
    dictionary::Vocabulary,
};

pub struct TestIndex {
    pub dir: TempDir,
    pub vocabulary: Vocabulary,
    pub reviews: Vec<TestReview>,
    /// Expected postings of every term that occurs
    pub all_terms: HashMap<TermId, Vec<Posting>>,
    pub num_tokens: u64,
    pub indexer: Indexer,
}

impl TestIndex {
    /// Builds an index over random reviews (document IDs start at 1 and
    /// are added in random order)
    pub fn new(
        vocabulary_size: usize,
        review_count: usize,
        lambda_words: f64,
        seed: Option<u64>,
        options: BuilderOptions,
    ) -> Self {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let mut rng = if let Some(seed) = seed {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_entropy()
        };

        let vocabulary = create_vocabulary(vocabulary_size, &mut rng);
        let mut indexer = Indexer::new(dir.path(), &options, vocabulary.clone())
            .expect("Could not create the indexer");

        let mut docids: Vec<DocId> = (1..=review_count as DocId).collect();
        docids.shuffle(&mut rng);

        let mut counts = BTreeMap::<TermId, BTreeMap<DocId, Frequency>>::new();
        let mut reviews = Vec::with_capacity(review_count);
        let mut num_tokens = 0;
        for docid in docids {
            let review = create_review(docid, lambda_words, vocabulary.len(), &mut rng);
            indexer
                .add_document(docid, &review.terms)
                .expect("Error while adding a review to the index");

            for &term_id in review.terms.iter() {
                *counts.entry(term_id).or_default().entry(docid).or_default() += 1;
            }
            num_tokens += review.terms.len() as u64;
            reviews.push(review);
        }

        indexer.build().expect("Error while building the index");
        info!(
            "Built test index with {} reviews and {} tokens in {}",
            review_count,
            num_tokens,
            dir.path().display()
        );

        let all_terms = counts
            .into_iter()
            .map(|(term_id, docs)| {
                let postings = docs
                    .into_iter()
                    .map(|(docid, frequency)| Posting { docid, frequency })
                    .collect();
                (term_id, postings)
            })
            .collect();

        Self {
            dir,
            vocabulary,
            reviews,
            all_terms,
            num_tokens,
            indexer,
        }
    }

    /// Expected postings of a term (empty if it never occurs)
    pub fn expected(&self, term_id: TermId) -> &[Posting] {
        self.all_terms
            .get(&term_id)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }
}

/// Checks that two postings lists are the same
pub fn check_same_postings<I: Iterator<Item = Posting>>(expected: &[Posting], observed: I) {
    let mut count = 0;
    for (ix, b) in observed.enumerate() {
        let a = expected
            .get(ix)
            .unwrap_or_else(|| panic!("Observed postings have more than {} entries", expected.len()));
        assert_eq!(a, &b, "Posting {} differs", ix);
        count += 1;
    }
    assert_eq!(count, expected.len(), "Observed postings are shorter");
}
