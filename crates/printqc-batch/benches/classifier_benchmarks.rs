//! Benchmarks for token classification.
//!
//! Every recognized utterance goes through the classifier, including stray
//! ambient speech that turns out to be unrecognized, so the unrecognized path
//! matters as much as the number path.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use printqc_batch::{BatchController, Classifier};
use printqc_core::config::KeywordConfig;

/// Realistic recognizer output: numbers, commands and background chatter.
fn generate_tokens(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 6 {
            0 => format!("{}", i % 100),
            1 => format!("{},{}", i % 50, i % 10),
            2 => "khoảng mười hai phẩy năm".to_string(),
            3 => "in đi".to_string(),
            4 => "làm lại từ đầu".to_string(),
            _ => format!("số đo là {}.{} centimet", i % 40, i % 7),
        })
        .collect()
}

fn bench_classify(c: &mut Criterion) {
    let classifier = Classifier::new(&KeywordConfig::default());
    let tokens = generate_tokens(1000);

    let mut group = c.benchmark_group("classifier");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("mixed_tokens", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let token = &tokens[idx % tokens.len()];
            idx += 1;
            black_box(classifier.classify(black_box(token)))
        });
    });

    group.bench_function("unrecognized_chatter", |b| {
        b.iter(|| black_box(classifier.classify(black_box("khoảng mười hai phẩy năm"))));
    });

    group.finish();
}

fn bench_controller_round(c: &mut Criterion) {
    c.bench_function("controller_fill_and_print", |b| {
        b.iter_batched(
            BatchController::default,
            |mut controller| {
                for token in ["12", "25.5", "30", "5.2", "ok"] {
                    let _ = black_box(controller.submit_token(token));
                }
                controller
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_classify, bench_controller_round);
criterion_main!(benches);
