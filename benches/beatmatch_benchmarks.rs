//! # BeatMatch Performance Benchmarks
//!
//! Benchmarks for the hot paths of a recommendation.
//!
//! ## Benchmark Categories
//!
//! - **Fitness**: Scoring single playlists with each strategy
//! - **Coarse Filter**: Pre-ranking large pools
//! - **Optimizer**: Complete seeded runs
//! - **Catalog**: Loading tracks from SQLite
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench fitness
//! cargo bench optimizer
//! ```

use beatmatch::chromosome::{ChromosomeVector, CHROMOSOME_LEN};
use beatmatch::coarse_filter::CoarseFilter;
use beatmatch::config::{CoarseFilterConfig, FitnessKind, OptimizerConfig};
use beatmatch::db;
use beatmatch::fitness::FitnessEvaluator;
use beatmatch::optimizer::PlaylistOptimizer;
use beatmatch::track::{CandidatePool, TargetVibe, Track};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use tempfile::TempDir;

/// Helper function to create analyzed tracks with reproducible chromosomes
fn create_test_tracks(count: usize) -> Vec<Track> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            let mut values = [0.0; CHROMOSOME_LEN];
            values[0] = rng.gen_range(60.0..180.0);
            values[1] = rng.gen_range(500.0..5000.0);
            values[2] = rng.gen_range(0.0..1.0);
            for v in &mut values[3..] {
                *v = rng.gen_range(-200.0..200.0);
            }
            Track::new(i.to_string(), "DEEZER", format!("Song {i:04}"), format!("Artist {}", i / 5))
                .with_chromosome(ChromosomeVector::new(values))
        })
        .collect()
}

fn create_pool(count: usize) -> CandidatePool {
    CandidatePool::from_tracks(create_test_tracks(count)).0
}

fn target() -> TargetVibe {
    let mut values = [40.0; CHROMOSOME_LEN];
    values[0] = 120.0;
    values[1] = 2200.0;
    values[2] = 0.12;
    TargetVibe::from_seed(ChromosomeVector::new(values))
}

/// Benchmark playlist scoring with both strategies
fn benchmark_fitness(c: &mut Criterion) {
    let mut group = c.benchmark_group("fitness");
    let pool = create_pool(100);
    let genes: Vec<usize> = (0..10).collect();
    let target = target();

    for kind in [FitnessKind::Cosine, FitnessKind::WeightedDistance] {
        let config = OptimizerConfig { fitness: kind, ..OptimizerConfig::default() };
        let evaluator = FitnessEvaluator::from_config(&config).expect("valid config");

        group.bench_function(BenchmarkId::new("score_10_tracks", kind), |b| {
            b.iter(|| evaluator.score(black_box(&pool), black_box(&genes), black_box(&target)))
        });
    }

    group.finish();
}

/// Benchmark coarse filtering of large pools
fn benchmark_coarse_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("coarse_filter");
    let evaluator = FitnessEvaluator::from_config(&OptimizerConfig::default()).expect("valid config");
    let filter = CoarseFilter::new(CoarseFilterConfig::default());
    let target = target();

    for size in [500, 2000, 10000] {
        let pool = create_pool(size);
        group.bench_with_input(BenchmarkId::new("top_100", size), &pool, |b, pool| {
            b.iter(|| filter.apply(black_box(pool), black_box(&target), &evaluator))
        });
    }

    group.finish();
}

/// Benchmark complete optimizer runs per preset shape
fn benchmark_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimizer");
    group.sample_size(20);
    let pool = create_pool(1000);
    let target = target();

    for name in ["classic", "timbre", "light"] {
        let config = OptimizerConfig {
            early_stop_threshold: None,
            ..beatmatch::config::preset(name).expect("built-in preset")
        };
        let optimizer = PlaylistOptimizer::new(config).expect("valid preset");

        group.bench_function(BenchmarkId::new("run_1000_pool", name), |b| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(7);
                optimizer
                    .optimize(black_box(&pool), black_box(&target), &mut rng)
                    .expect("non-empty pool")
            })
        });
    }

    group.finish();
}

/// Benchmark loading the catalog
fn benchmark_catalog(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let mut conn = db::open_catalog(&temp_dir.path().join("bench.db")).expect("Failed to open catalog");
    db::upsert_tracks(&mut conn, &create_test_tracks(1000)).expect("Failed to fill catalog");

    c.bench_function("retrieve_1000_tracks", |b| {
        b.iter(|| db::retrieve_tracks(black_box(&conn)).expect("Failed to read catalog"))
    });
}

criterion_group!(
    benches,
    benchmark_fitness,
    benchmark_coarse_filter,
    benchmark_optimizer,
    benchmark_catalog
);
criterion_main!(benches);
