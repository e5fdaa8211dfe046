//! Benchmarks for the co-occurrence and split stages on synthetic data.
//!
//! Run with: `cargo bench --bench split_engine`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use geosplit::synthetic::SyntheticScenario;
use geosplit::{
    build_dataset, BandSplitter, ClusterSplitter, DuplicateFilter, Observation,
    OverlapGraphBuilder, SplitConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn observations(sites: usize, per_site: usize) -> Vec<Observation> {
    SyntheticScenario {
        site_count: sites,
        observations_per_site: per_site,
        ..SyntheticScenario::default()
    }
    .generate()
    .observations
}

fn bench_config() -> SplitConfig {
    SplitConfig {
        species_threshold: 5,
        ..SplitConfig::default()
    }
}

fn bench_overlap(c: &mut Criterion) {
    let config = bench_config();
    let mut group = c.benchmark_group("overlap");

    for &(sites, per_site) in &[(16, 50), (64, 50), (64, 200)] {
        let obs = observations(sites, per_site);
        group.bench_with_input(
            BenchmarkId::new("build_and_filter", obs.len()),
            &obs,
            |b, obs| {
                b.iter(|| {
                    OverlapGraphBuilder::from_config(&config)
                        .build(obs.clone())
                        .map(|g| g.filter(config.species_threshold))
                })
            },
        );
    }

    group.finish();
}

fn bench_cluster_split(c: &mut Criterion) {
    let config = bench_config();
    let obs = observations(64, 100);
    let table = match OverlapGraphBuilder::from_config(&config).build(obs) {
        Ok(graph) => graph.filter(config.species_threshold),
        Err(e) => panic!("overlap build failed: {e}"),
    };
    let splitter = ClusterSplitter::from_config(&config);

    c.bench_function("cluster_split", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(0);
            splitter.split(&table, &mut rng)
        })
    });
}

/// One grid-shaped cluster of `side * side` points plus a distant outlier.
fn bench_large_cluster(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_cluster");
    group.sample_size(10);

    for &side in &[100usize, 150] {
        let mut obs: Vec<Observation> = (0..side * side)
            .map(|i| {
                let x = (i % side) as f64 * 10.0;
                let y = (i / side) as f64 * 10.0;
                Observation::new(i as u64, x, y, "a")
            })
            .collect();
        obs.push(Observation::new((side * side) as u64, 1e5, 1e5, "a"));
        let table = match OverlapGraphBuilder::new(15.0, 100).build(obs) {
            Ok(graph) => graph.filter(0),
            Err(e) => panic!("overlap build failed: {e}"),
        };
        let splitter = ClusterSplitter::new(1000.0, 1.0, 15.0);

        group.bench_with_input(BenchmarkId::new("split", side * side), &table, |b, table| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(0);
                splitter.split(table, &mut rng)
            })
        });
    }

    group.finish();
}

fn bench_bands_and_dedup(c: &mut Criterion) {
    let config = bench_config();
    let obs = observations(64, 100);

    let bands = BandSplitter::from_config(&config).map(|s| s.with_lat_range(Some((43.0, 47.0))));
    if let Ok(splitter) = bands {
        c.bench_function("band_split", |b| b.iter(|| splitter.split(&obs)));
    }

    let filter = DuplicateFilter::from_config(&config);
    c.bench_function("duplicate_filter", |b| b.iter(|| filter.filter(obs.clone())));
}

fn bench_pipeline(c: &mut Criterion) {
    let config = bench_config();
    let obs = observations(36, 100);

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    group.bench_function("build_dataset", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(config.seed);
            build_dataset(obs.clone(), &config, &mut rng)
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_overlap,
    bench_cluster_split,
    bench_large_cluster,
    bench_bands_and_dedup,
    bench_pipeline
);
criterion_main!(benches);
