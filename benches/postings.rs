use criterion::{criterion_group, criterion_main, Criterion};

use helpers::index::TestIndex;
use review_index::{builder::BuilderOptions, index::InvertedIndex};

fn criterion_benchmark(c: &mut Criterion) {
    let options = BuilderOptions {
        show_progress: false,
        ..Default::default()
    };
    let data = TestIndex::new(5_000, 10_000, 20., Some(1), options);
    let index = data.indexer.to_index(true).expect("Could not load the index");
    let terms: Vec<&str> = data.vocabulary.iter().step_by(50).collect();

    c.bench_function("resolve", |b| {
        b.iter(|| {
            for term in terms.iter() {
                index.term_id(term).expect("Lookup failed");
            }
        })
    });

    c.bench_function("postings", |b| {
        b.iter(|| {
            terms
                .iter()
                .map(|term| index.postings(term).count())
                .sum::<usize>()
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(100);
    targets = criterion_benchmark
}
criterion_main!(benches);
