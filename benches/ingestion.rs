//! Delimited-text ingestion throughput: tokenizing, inferring and converting generated input.
//!
//! Run with: cargo bench --bench ingestion

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tabular_ingest::ingestion::{RowSource, SourceOptions, StaticIndicators, Tokenizer};

/// `rows` lines of id, label, score, taken date, flag and an occasional `Q` indicator.
fn generate_tsv(rows: usize) -> String {
    let mut out = String::with_capacity(rows * 48);
    out.push_str("id\tlabel\tscore\ttaken\tflag\n");
    for i in 0..rows {
        let score = if i % 97 == 0 {
            "Q".to_string()
        } else {
            format!("{}.{}", i % 1000, i % 7)
        };
        out.push_str(&format!(
            "{i}\tsample-{i}\t{score}\t2024-{:02}-{:02}\t{}\n",
            i % 12 + 1,
            i % 28 + 1,
            i % 2 == 0
        ));
    }
    out
}

fn bench_tokenizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenizer");
    for rows in [1_000usize, 50_000] {
        let input = generate_tsv(rows);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &input, |b, input| {
            b.iter(|| {
                let mut tok = Tokenizer::new(input.as_bytes(), &SourceOptions::tsv());
                let mut n = 0usize;
                while let Some(record) = tok.next_record().unwrap() {
                    n += record.len();
                }
                black_box(n)
            });
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    for rows in [1_000usize, 50_000] {
        let input = generate_tsv(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("plain", rows), &input, |b, input| {
            b.iter(|| {
                let mut source = RowSource::delimited_text(input.clone(), SourceOptions::tsv());
                black_box(source.load().unwrap().len())
            });
        });
        group.bench_with_input(BenchmarkId::new("indicators", rows), &input, |b, input| {
            b.iter(|| {
                let mut source = RowSource::delimited_text(input.clone(), SourceOptions::tsv())
                    .with_indicators(Arc::new(StaticIndicators::standard()));
                black_box(source.load().unwrap().len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tokenizer, bench_load);
criterion_main!(benches);
