use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ens_core::{EnsembleGenerator, Measure, MoveStatus};
use ens_metrics::{CentralTendency, CentralTendencySummary, EnsembleMetric};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Identity;

impl Measure<f64> for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn calculate(&self, item: &f64) -> f64 {
        *item
    }
}

#[derive(Clone)]
struct Jitter {
    calls: Arc<AtomicU64>,
}

impl EnsembleGenerator<f64> for Jitter {
    fn name(&self) -> &str {
        "jitter"
    }

    fn clone_boxed(&self) -> Box<dyn EnsembleGenerator<f64>> {
        Box::new(self.clone())
    }

    fn apply(&mut self, item: &mut f64) -> MoveStatus {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        *item += (call % 97) as f64;
        MoveStatus::Success
    }
}

fn values(n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..n).map(|_| f64::from(rng.gen_range(0..500u32))).collect()
}

fn bench_finalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("finalize_throughput");
    for n in [1_000usize, 100_000] {
        let data = values(n);
        group.bench_with_input(BenchmarkId::new("summary", n), &data, |b, data| {
            b.iter(|| CentralTendencySummary::from_values(black_box(data)).expect("summary"));
        });
        group.bench_with_input(BenchmarkId::new("engine", n), &data, |b, data| {
            b.iter(|| {
                let mut metric: EnsembleMetric<f64> = EnsembleMetric::new(Box::new(
                    CentralTendency::<f64>::with_measure(Arc::new(Identity)),
                ));
                for value in data {
                    metric.apply(value).expect("apply");
                }
                metric.report().expect("report");
                black_box(metric.get_value("stddev").expect("stddev"))
            });
        });
    }
    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let protocol: Arc<dyn EnsembleGenerator<f64>> = Arc::new(Jitter {
        calls: Arc::new(AtomicU64::new(0)),
    });
    let mut group = c.benchmark_group("generation_throughput");
    for workers in [1usize, 0] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| {
                let mut metric: EnsembleMetric<f64> = EnsembleMetric::new(Box::new(
                    CentralTendency::<f64>::with_measure(Arc::new(Identity)),
                ));
                metric.set_ensemble_generating_protocol(Some(Arc::clone(&protocol)));
                metric
                    .set_ensemble_generating_protocol_repeats(256)
                    .expect("repeats");
                metric.set_n_workers(workers).expect("workers");
                metric.apply(&0.0).expect("apply");
                black_box(metric.items_in_ensemble())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_finalize, bench_generation);
criterion_main!(benches);
