use criterion::{criterion_group, criterion_main, Criterion};
use phrasedex_core::{QueryParser, TfIdfIndex, Tokenizer};

const WORDS: &[&str] = &[
    "red", "green", "blue", "color", "light", "dark", "shade", "tone", "warm", "cool",
    "bright", "pale", "deep", "soft", "hue", "tint",
];

fn corpus(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            (0..40)
                .map(|j| WORDS[(i * 7 + j * 13 + j / 3) % WORDS.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let text = corpus(50).join(" ");
    let tokenizer = Tokenizer::default();
    c.bench_function("tokenize_corpus", |b| b.iter(|| tokenizer.tokenize(&text)));
}

fn bench_search(c: &mut Criterion) {
    let tokenizer = Tokenizer::default();
    let mut index = TfIdfIndex::new();
    for (i, text) in corpus(2_000).iter().enumerate() {
        index.add_document(&tokenizer.tokenize_document(i.to_string(), text));
    }
    let parser = QueryParser::new().with_normalizer(tokenizer);
    let terms = parser.parse("red shade tint");
    let phrase = parser.parse("\"deep soft\" \"warm cool\"");
    c.bench_function("search_terms", |b| b.iter(|| index.search(&terms, 10)));
    c.bench_function("search_phrases", |b| b.iter(|| index.search(&phrase, 10)));
}

criterion_group!(benches, bench_tokenize, bench_search);
criterion_main!(benches);
