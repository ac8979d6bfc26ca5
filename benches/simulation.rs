//! Benchmarks for pool stepping, neighbor indexing and the CPU kernel.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::Vec2;

use hearth::config::{CohesionConfig, CohesionStrategy, FireConfig, PhysicsConfig, PoolConfig};
use hearth::gpu::{CpuBackend, GpuParticleManager};
use hearth::neighbors::{CohesionKernel, NeighborPoint, NeighborSampler, SpatialGrid};
use hearth::noise::CoherentNoise;
use hearth::particle::{Particle, ParticleKind, StepContext};
use hearth::{ParticlePool, TurbulenceField, Viewport};

/// A dense fire-shaped blob of `count` particles near the bottom center.
fn blob(count: usize) -> Vec<(Vec2, ParticleKind)> {
    (0..count)
        .map(|i| {
            let ring = (i as f32).sqrt();
            let angle = i as f32 * 2.399;
            let position = Vec2::new(400.0 + angle.cos() * ring * 1.5, 520.0 + angle.sin() * ring * 2.5);
            (position, ParticleKind::ALL[i % 3])
        })
        .collect()
}

fn filled_pool(count: usize) -> ParticlePool {
    let mut pool = ParticlePool::new(&PoolConfig {
        max_particles: count,
        ..Default::default()
    });
    for (position, kind) in blob(count) {
        pool.spawn(Particle::new(position, Vec2::new(0.0, -0.3), kind, 0.7, 1.0e6, 4.0));
    }
    pool
}

fn bench_pool_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_step");
    let physics = PhysicsConfig::default();
    let noise = CoherentNoise::new(1);
    let field = TurbulenceField::new(
        Default::default(),
        noise.clone(),
        Viewport::new(800.0, 600.0),
        44.0,
    );

    let strategies = [
        ("linear", CohesionStrategy::Linear),
        ("grid", CohesionStrategy::Grid),
        ("window", CohesionStrategy::Window { half_width: 8 }),
    ];

    for count in [500, 2000, 6000] {
        let pool = filled_pool(count);
        for (name, strategy) in strategies {
            // Linear is quadratic; skip the sizes where it dominates the run.
            if matches!(strategy, CohesionStrategy::Linear) && count > 2000 {
                continue;
            }
            let cohesion = CohesionConfig {
                strategy,
                ..Default::default()
            };
            group.bench_with_input(BenchmarkId::new(name, count), &count, |b, _| {
                b.iter_batched(
                    || pool.clone(),
                    |mut pool| {
                        let ctx = StepContext {
                            dt_ms: 16.666,
                            now_ms: 1000.0,
                            physics: &physics,
                            cohesion: &cohesion,
                            noise: &noise,
                        };
                        pool.step_all(&ctx, Some(&field));
                        black_box(pool)
                    },
                    BatchSize::LargeInput,
                )
            });
        }
    }

    group.finish();
}

fn bench_spatial_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_grid");
    let kernel = CohesionKernel::from_config(&CohesionConfig::default());

    for count in [1000, 6000] {
        let points: Vec<NeighborPoint> = blob(count)
            .into_iter()
            .map(|(position, kind)| NeighborPoint { position, kind })
            .collect();

        group.bench_with_input(BenchmarkId::new("build", count), &points, |b, points| {
            b.iter(|| black_box(SpatialGrid::build(points, kernel).occupied_cells()))
        });

        let grid = SpatialGrid::build(&points, kernel);
        group.bench_with_input(BenchmarkId::new("query_all", count), &points, |b, points| {
            b.iter(|| {
                let mut sum = Vec2::ZERO;
                for (slot, p) in points.iter().enumerate() {
                    sum += grid.cohesion(slot, p.position);
                }
                black_box(sum)
            })
        });
    }

    group.finish();
}

fn bench_cpu_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_kernel");
    let config = FireConfig::default();

    for count in [10_000, 25_000, 100_000] {
        let mut gpu = GpuParticleManager::from_config(&config);
        if !gpu.initialize_with_backend(Box::new(CpuBackend), count, 800.0, 600.0) {
            continue;
        }
        let mut now = 0.0;
        group.bench_function(BenchmarkId::new("step", count), |b| {
            b.iter(|| {
                now += 16.666;
                black_box(gpu.step(16.666, now).map(<[Vec2]>::len))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pool_step, bench_spatial_grid, bench_cpu_kernel);
criterion_main!(benches);
