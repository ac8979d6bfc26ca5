//! The CPU particle population.
//!
//! Stepping is split in two so removal never interleaves with force
//! computation: [`ParticlePool::step_all`] updates every particle against a
//! snapshot of the whole pool, then [`ParticlePool::prune`] drops the dead
//! and enforces the hard cap.

use glam::Vec2;
use log::debug;

use crate::config::PoolConfig;
use crate::neighbors::{build_sampler, NeighborPoint};
use crate::particle::{Particle, ParticleKind, ParticleView, StepContext};
use crate::turbulence::TurbulenceField;

/// Removals performed by one [`ParticlePool::prune`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Particles whose death predicate held.
    pub died: usize,
    /// Live particles dropped to respect the cap, oldest first.
    pub evicted: usize,
}

/// Insertion-ordered particles, oldest first.
///
/// The pool owns its particles exclusively. Indices are not stable across
/// [`prune`](Self::prune): removal shifts later particles down.
///
/// # Example
///
/// ```ignore
/// let mut pool = ParticlePool::new(&config.pool);
/// pool.spawn(Particle::spawn(origin, ParticleKind::Flame, &config.kinds.flame, &config.physics, &mut rng));
/// pool.step_all(&ctx, Some(&turbulence));
/// let report = pool.prune();
/// assert!(pool.len() <= pool.max_particles());
/// ```
#[derive(Clone, Debug)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    snapshot: Vec<NeighborPoint>,
    max_particles: usize,
    turbulence_coupling: f32,
}

impl ParticlePool {
    /// An empty pool. A cap of zero is raised to one.
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            particles: Vec::new(),
            snapshot: Vec::new(),
            max_particles: config.max_particles.max(1),
            turbulence_coupling: config.turbulence_coupling,
        }
    }

    /// Append a particle. The cap is only enforced by [`prune`](Self::prune).
    pub fn spawn(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// Apply turbulence and update every particle exactly once.
    ///
    /// Cohesion reads positions as they were before this call, so the
    /// result does not depend on iteration order. The neighbor sampler is
    /// chosen from `ctx.cohesion.strategy`. Turbulence is scaled by the
    /// pool's coupling factor before it reaches a particle; pass `None` to
    /// skip it. Dead particles stay in the pool until [`prune`](Self::prune).
    pub fn step_all(&mut self, ctx: &StepContext<'_>, turbulence: Option<&TurbulenceField>) {
        self.snapshot.clear();
        self.snapshot.extend(self.particles.iter().map(|p| NeighborPoint {
            position: p.position(),
            kind: p.kind(),
        }));

        let sampler = build_sampler(&self.snapshot, ctx.cohesion);
        for (slot, particle) in self.particles.iter_mut().enumerate() {
            if let Some(field) = turbulence {
                let force = field.force(particle.position(), ctx.now_ms);
                particle.apply_force(force * self.turbulence_coupling);
            }
            particle.update(ctx, sampler.as_ref(), slot);
        }
    }

    /// Remove dead particles, then evict the oldest beyond the cap.
    ///
    /// After this call `len() <= max_particles()`.
    pub fn prune(&mut self) -> PruneReport {
        let before = self.particles.len();
        self.particles.retain(|p| !p.is_dead());
        let died = before - self.particles.len();

        let evicted = self.particles.len().saturating_sub(self.max_particles);
        if evicted > 0 {
            self.particles.drain(..evicted);
        }

        if died + evicted > 0 {
            debug!("pruned {died} dead and {evicted} over-cap particles");
        }
        PruneReport { died, evicted }
    }

    /// Drop every particle.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// The hard cap enforced by [`prune`](Self::prune).
    #[inline]
    pub fn max_particles(&self) -> usize {
        self.max_particles
    }

    /// Particles, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    /// Render snapshots of every particle, oldest first.
    pub fn views(&self) -> impl Iterator<Item = ParticleView> + '_ {
        self.particles.iter().map(Particle::view)
    }

    /// Number of particles of `kind`.
    pub fn count_kind(&self, kind: ParticleKind) -> usize {
        self.particles.iter().filter(|p| p.kind() == kind).count()
    }

    /// Mean position of the population, if any.
    pub fn centroid(&self) -> Option<Vec2> {
        if self.particles.is_empty() {
            return None;
        }
        let sum: Vec2 = self.particles.iter().map(Particle::position).sum();
        Some(sum / self.particles.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CohesionConfig, CohesionStrategy, PhysicsConfig, TurbulenceConfig};
    use crate::noise::CoherentNoise;
    use crate::viewport::Viewport;

    fn flame(x: f32, y: f32, lifespan_ms: f32) -> Particle {
        Particle::new(Vec2::new(x, y), Vec2::ZERO, ParticleKind::Flame, 0.7, lifespan_ms, 4.0)
    }

    fn pool(max_particles: usize) -> ParticlePool {
        ParticlePool::new(&PoolConfig {
            max_particles,
            ..Default::default()
        })
    }

    #[test]
    fn test_prune_enforces_cap_oldest_first() {
        let mut pool = pool(3);
        for i in 0..5 {
            pool.spawn(flame(i as f32 * 10.0, 300.0, 5000.0));
        }
        let report = pool.prune();
        assert_eq!(report, PruneReport { died: 0, evicted: 2 });
        assert_eq!(pool.len(), 3);
        let xs: Vec<f32> = pool.iter().map(|p| p.position().x).collect();
        assert_eq!(xs, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_prune_removes_dead_before_capping() {
        let mut pool = pool(2);
        pool.spawn(flame(0.0, -100.0, 5000.0));
        pool.spawn(flame(1.0, 300.0, 5000.0));
        pool.spawn(flame(2.0, 300.0, 5000.0));
        let report = pool.prune();
        assert_eq!(report, PruneReport { died: 1, evicted: 0 });
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_step_updates_every_particle_once() {
        let physics = PhysicsConfig::default();
        let cohesion = CohesionConfig::default();
        let noise = CoherentNoise::new(2);
        let ctx = StepContext {
            dt_ms: 10.0,
            now_ms: 10.0,
            physics: &physics,
            cohesion: &cohesion,
            noise: &noise,
        };
        let mut pool = pool(100);
        for i in 0..20 {
            pool.spawn(flame(300.0 + i as f32, 400.0, 5000.0));
        }
        pool.step_all(&ctx, None);
        assert!(pool.iter().all(|p| p.age_ms() == 10.0));
    }

    #[test]
    fn test_step_with_turbulence_and_each_strategy() {
        let physics = PhysicsConfig::default();
        let noise = CoherentNoise::new(2);
        let field = TurbulenceField::new(TurbulenceConfig::default(), noise.clone(), Viewport::default(), 44.0);
        for strategy in [
            CohesionStrategy::Linear,
            CohesionStrategy::Grid,
            CohesionStrategy::Window { half_width: 4 },
            CohesionStrategy::Auto { grid_threshold: 8 },
        ] {
            let cohesion = CohesionConfig {
                strategy,
                ..Default::default()
            };
            let mut pool = pool(100);
            for i in 0..30 {
                pool.spawn(flame(390.0 + (i % 6) as f32 * 3.0, 550.0 - (i / 6) as f32 * 3.0, 5000.0));
            }
            let mut now = 0.0;
            for _ in 0..30 {
                now += 16.666;
                let ctx = StepContext {
                    dt_ms: 16.666,
                    now_ms: now,
                    physics: &physics,
                    cohesion: &cohesion,
                    noise: &noise,
                };
                pool.step_all(&ctx, Some(&field));
                pool.prune();
            }
            assert_eq!(pool.len(), 30, "{strategy:?}");
            let centroid = pool.centroid().unwrap();
            assert!(centroid.is_finite());
            assert!(centroid.y < 550.0, "{strategy:?} should rise");
        }
    }

    #[test]
    fn test_expired_particles_pruned() {
        let physics = PhysicsConfig::default();
        let cohesion = CohesionConfig::default();
        let noise = CoherentNoise::new(2);
        let ctx = StepContext {
            dt_ms: 100.0,
            now_ms: 100.0,
            physics: &physics,
            cohesion: &cohesion,
            noise: &noise,
        };
        let mut pool = pool(10);
        pool.spawn(flame(400.0, 400.0, 50.0));
        pool.spawn(flame(410.0, 400.0, 5000.0));
        pool.step_all(&ctx, None);
        assert_eq!(pool.prune().died, 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.count_kind(ParticleKind::Flame), 1);
    }
}
