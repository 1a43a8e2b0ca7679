use criterion::{criterion_group, criterion_main, Criterion};
use search_core::tokenizer::tokenize;

const TRANSCRIPT: &str = "[[A man sits at a computer, typing.]] Man: Running the numbers again. \
    The estimate keeps jumping around. Friend: Have you tried turning it off and on again? \
    {{Title text: Every time the compiler finishes, another dependency starts building.}}";

fn bench_tokenize(c: &mut Criterion) {
    let text = TRANSCRIPT.repeat(50);
    c.bench_function("tokenize_transcript", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
