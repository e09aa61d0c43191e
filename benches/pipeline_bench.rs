//! Benchmark suite for retention-engine
//!
//! Run with: cargo bench

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retention_engine::{
    synthetic, ChurnLabeler, EngineConfig, FeatureAggregator, RetentionPipeline, UserProfile,
};

fn bench_feature_aggregation(c: &mut Criterion) {
    let dataset = synthetic::generate(42, 500, 50).unwrap();
    let config = EngineConfig::default();
    let aggregator = FeatureAggregator::new(&dataset.catalog, config.windows).unwrap();

    c.bench_function("FeatureAggregator::aggregate 500 users", |b| {
        b.iter(|| {
            aggregator
                .aggregate(black_box(&dataset.interactions), config.windows.observation_end)
                .unwrap()
        })
    });
}

fn bench_labeling(c: &mut Criterion) {
    let dataset = synthetic::generate(42, 500, 50).unwrap();
    let labeler = ChurnLabeler::new(EngineConfig::default().windows).unwrap();

    c.bench_function("ChurnLabeler::label_population 500 users", |b| {
        b.iter(|| {
            labeler
                .label_population(black_box(&dataset.users), black_box(&dataset.interactions))
                .unwrap()
        })
    });
}

fn bench_full_run(c: &mut Criterion) {
    let dataset = synthetic::generate(42, 500, 50).unwrap();
    let pipeline = RetentionPipeline::new(EngineConfig::default()).unwrap();

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("run 500 users", |b| {
        b.iter(|| pipeline.run(black_box(&dataset)).unwrap())
    });
    group.finish();
}

fn bench_recommend(c: &mut Criterion) {
    let dataset = synthetic::generate(42, 500, 50).unwrap();
    let pipeline = RetentionPipeline::new(EngineConfig::default()).unwrap();
    let run = pipeline.run(&dataset).unwrap();
    let profile = UserProfile::new("u_bench", "stress_reduction");
    let seen: BTreeSet<String> = ["c_001", "c_002"].iter().map(|s| s.to_string()).collect();

    c.bench_function("RecommendationScorer::recommend 50 items", |b| {
        b.iter(|| pipeline.recommend(&run, &dataset.catalog, black_box(&profile), 2, &seen, 5))
    });
}

criterion_group!(
    benches,
    bench_feature_aggregation,
    bench_labeling,
    bench_full_run,
    bench_recommend
);
criterion_main!(benches);
