//! Benchmarks for ranking, apportionment and network evaluation.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use netclimb::{
    compute::evolution::{
        AccuracyEvaluator, ConfigFactory, DenseFactory, NetworkEvaluator, NetworkRng, apportion,
        rank,
    },
    schema::{Activation, DatasetProvider, ModelRecord, NetworkShape, SyntheticDataset},
};

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");

    for size in [50, 500, 5000] {
        let mut rng = NetworkRng::new(1);
        // Coarse scores so the stable sort sees plenty of ties.
        let records: Vec<ModelRecord> = (1..=size)
            .map(|i| {
                let score = (rng.unit() * 20.0).floor() as f64 / 20.0;
                ModelRecord::new(format!("model-{}", i), score)
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| rank(black_box(records.clone())));
        });
    }

    group.finish();
}

fn bench_apportion(c: &mut Criterion) {
    let mut group = c.benchmark_group("apportion");

    for (n, k) in [(50, 5), (100, 3), (10_000, 7)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_{}", n, k)),
            &(n, k),
            |b, &(n, k)| {
                b.iter(|| apportion(black_box(n), black_box(k)));
            },
        );
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    group.sample_size(20);

    let data = SyntheticDataset {
        samples_per_class: 20,
        ..Default::default()
    }
    .load()
    .unwrap();

    for hidden in [16, 64, 256] {
        let shape = NetworkShape {
            input_size: 28 * 28,
            output_size: 10,
            output_activations: vec![Activation::Softmax],
            hidden_layers: vec![hidden],
        };
        let network = DenseFactory.create_random(&shape, "model-1", "bench", &mut NetworkRng::new(7));
        let evaluator = AccuracyEvaluator::new();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_hidden", hidden)),
            &network,
            |b, network| {
                b.iter(|| evaluator.evaluate(black_box(network), &data));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_rank, bench_apportion, bench_evaluate);
criterion_main!(benches);
