//! Lattice update benchmarks
//!
//! Uses the reference fibrillation parameters: 200x200 cells, 15% vertical
//! coupling, 5% defects, refractory period 50.
//!
//! ```bash
//! cargo bench --bench update
//! ```

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use fibrillation_engine::{LatticeParams, Simulation, UpdateMode};

fn reference_params() -> LatticeParams {
    LatticeParams::new(200, 200, 50).with_probabilities(0.15, 0.05, 0.05)
}

/// Warmed-up simulation so the lattice carries waves instead of resting cells.
fn warmed_up(mode: UpdateMode) -> Simulation {
    let mut sim = Simulation::new(&reference_params(), Some(1)).unwrap().with_mode(mode);
    sim.run(500).unwrap();
    sim
}

fn bench_step(c: &mut Criterion) {
    let mut g = c.benchmark_group("lattice/step");
    g.throughput(Throughput::Elements(200 * 200));

    for (name, mode) in [("sequential", UpdateMode::Sequential), ("parallel", UpdateMode::Parallel)] {
        let mut sim = warmed_up(mode);
        g.bench_function(name, |b| b.iter(|| black_box(sim.step())));
    }
    g.finish();
}

fn bench_run(c: &mut Criterion) {
    let mut g = c.benchmark_group("lattice/run_1000");
    g.sample_size(10);

    for (name, mode) in [("sequential", UpdateMode::Sequential), ("parallel", UpdateMode::Parallel)] {
        g.bench_function(name, |b| {
            b.iter_batched(
                || Simulation::new(&reference_params(), Some(2)).unwrap().with_mode(mode),
                |mut sim| {
                    sim.run(1000).unwrap();
                    black_box(sim.activity_history().len())
                },
                BatchSize::LargeInput,
            )
        });
    }
    g.finish();
}

criterion_group!(benches, bench_step, bench_run);
criterion_main!(benches);
