//! A single CPU-simulated fire particle.
//!
//! Particles use a unit-mass model: forces accumulate straight into
//! `acceleration`, which is folded into velocity once per [`Particle::update`]
//! and then cleared. Velocities are in pixels per reference frame
//! ([`PhysicsConfig::frame_ms`]); positions advance by
//! `velocity * dt_ms / frame_ms` so motion is frame-rate independent.
//!
//! # Lifecycle
//!
//! A particle shrinks linearly from `base_size` to zero over its lifespan.
//! It dies when its age reaches the lifespan, when it shrinks below the
//! visibility threshold, or when it drifts far above the top edge. Death is
//! latched: once [`Particle::is_dead`] returns `true` it never returns
//! `false` again.

use glam::Vec2;
use rand::Rng;

use crate::config::{CohesionConfig, KindTuning, PhysicsConfig};
use crate::neighbors::NeighborSampler;
use crate::noise::CoherentNoise;

/// Shortest lifespan a particle can be created with.
pub const MIN_LIFESPAN_MS: f32 = 1.0;

/// The closed set of particle categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    /// Body of the flame.
    Flame,
    /// Small, slow, long-lived sparks.
    Ember,
    /// Large, hot particles at the heart of the fire.
    Core,
}

impl ParticleKind {
    /// Every kind, in declaration order.
    ///
    /// Handy for per-kind summaries:
    ///
    /// ```ignore
    /// for kind in ParticleKind::ALL {
    ///     println!("{}: {}", kind.name(), pool.count_kind(kind));
    /// }
    /// ```
    pub const ALL: [ParticleKind; 3] = [ParticleKind::Flame, ParticleKind::Ember, ParticleKind::Core];

    /// Lowercase name, matching the keys of the `kinds` config section.
    pub fn name(&self) -> &'static str {
        match self {
            ParticleKind::Flame => "flame",
            ParticleKind::Ember => "ember",
            ParticleKind::Core => "core",
        }
    }
}

/// Death thresholds captured from [`PhysicsConfig`] at spawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeathLimits {
    /// At or below this size the particle is invisible.
    pub min_visible_size: f32,
    /// Above this y (i.e. smaller) the particle is off-screen for good.
    pub min_y: f32,
}

impl DeathLimits {
    pub fn from_physics(physics: &PhysicsConfig) -> Self {
        Self {
            min_visible_size: physics.min_visible_size,
            min_y: -physics.offscreen_margin,
        }
    }
}

impl Default for DeathLimits {
    fn default() -> Self {
        Self::from_physics(&PhysicsConfig::default())
    }
}

/// Everything a particle needs from its surroundings for one step.
#[derive(Clone, Copy)]
///
/// One context is built per frame and shared by every particle in the
/// pool, so all of them see the same time and constants.
pub struct StepContext<'a> {
    /// Elapsed time for this step. Negative or non-finite values are
    /// treated as zero.
    pub dt_ms: f32,
    /// Monotonic simulation time, used as the noise time axis for flutter.
    pub now_ms: f32,
    /// Buoyancy, drag, flutter and clamp constants.
    pub physics: &'a PhysicsConfig,
    /// Whether and how strongly neighbors pull on each other.
    pub cohesion: &'a CohesionConfig,
    /// Noise source for flutter.
    pub noise: &'a CoherentNoise,
}

/// What a renderer needs to draw one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleView {
    pub position: Vec2,
    pub size: f32,
    /// `age / lifespan`, clamped to `[0, 1]`.
    pub life_ratio: f32,
    pub kind: ParticleKind,
}

/// A flame, ember or core particle.
///
/// Fields are private so the lifecycle invariants hold:
///
/// - `lifespan_ms` is at least [`MIN_LIFESPAN_MS`]
/// - `size` never goes negative and reaches exactly zero at the end of
///   the lifespan
/// - `age_ms` never decreases
/// - once dead, always dead
///
/// # Example
///
/// ```ignore
/// let mut p = Particle::new(Vec2::new(400.0, 550.0), Vec2::new(0.0, -0.3), ParticleKind::Flame, 0.7, 2000.0, 3.0);
/// p.apply_force(Vec2::new(0.02, 0.0));
/// p.update(&ctx, &NoNeighbors, 0);
/// assert!(p.age_ms() > 0.0);
/// ```
#[derive(Clone, Debug)]
pub struct Particle {
    position: Vec2,
    velocity: Vec2,
    acceleration: Vec2,
    kind: ParticleKind,
    heat: f32,
    age_ms: f32,
    lifespan_ms: f32,
    base_size: f32,
    size: f32,
    limits: DeathLimits,
    dead: bool,
}

impl Particle {
    /// Create a particle of `kind` at `position`, drawing its initial
    /// velocity, lifespan and size from `tuning`.
    pub fn spawn<R: Rng + ?Sized>(
        position: Vec2,
        kind: ParticleKind,
        tuning: &KindTuning,
        physics: &PhysicsConfig,
        rng: &mut R,
    ) -> Self {
        let velocity = Vec2::new(tuning.velocity_x.sample(rng), tuning.velocity_y.sample(rng));
        Self::new(
            position,
            velocity,
            kind,
            tuning.heat,
            tuning.lifespan_ms.sample(rng),
            tuning.base_size.sample(rng),
        )
        .with_limits(DeathLimits::from_physics(physics))
    }

    /// Create a particle with explicit parameters.
    ///
    /// Lifespans shorter than [`MIN_LIFESPAN_MS`] (including NaN) are raised
    /// to it; negative sizes become zero.
    pub fn new(
        position: Vec2,
        velocity: Vec2,
        kind: ParticleKind,
        heat: f32,
        lifespan_ms: f32,
        base_size: f32,
    ) -> Self {
        let lifespan_ms = if lifespan_ms.is_finite() {
            lifespan_ms.max(MIN_LIFESPAN_MS)
        } else if lifespan_ms == f32::INFINITY {
            f32::MAX
        } else {
            MIN_LIFESPAN_MS
        };
        let base_size = if base_size.is_finite() { base_size.max(0.0) } else { 0.0 };
        Self {
            position,
            velocity,
            acceleration: Vec2::ZERO,
            kind,
            heat,
            age_ms: 0.0,
            lifespan_ms,
            base_size,
            size: base_size,
            limits: DeathLimits::default(),
            dead: false,
        }
    }

    /// Replace the death thresholds.
    ///
    /// [`Particle::new`] uses [`DeathLimits::default`]; [`Particle::spawn`]
    /// takes them from the physics config.
    pub fn with_limits(mut self, limits: DeathLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Accumulate a force for the next update (unit mass).
    #[inline]
    pub fn apply_force(&mut self, force: Vec2) {
        self.acceleration += force;
    }

    /// Advance one integration step.
    ///
    /// In order:
    ///
    /// 1. buoyancy, `heat * buoyancy_scale` upward
    /// 2. drag, opposing velocity and scaled by `size / drag_reference_size`
    /// 3. flutter, a lateral push from noise at the particle's x and `now_ms`
    /// 4. fold the accumulated acceleration into velocity
    /// 5. cohesion from `neighbors`, scaled by `heat + heat_bias`
    /// 6. clamp velocity
    /// 7. move by `velocity * dt_ms / frame_ms`
    /// 8. clear acceleration
    /// 9. age and shrink
    ///
    /// A particle that is already dead only ages. `slot` is this particle's
    /// index in the population `neighbors` was built from.
    pub fn update(&mut self, ctx: &StepContext<'_>, neighbors: &dyn NeighborSampler, slot: usize) {
        let dt_ms = if ctx.dt_ms.is_finite() { ctx.dt_ms.max(0.0) } else { 0.0 };

        if self.is_dead() {
            self.dead = true;
            self.acceleration = Vec2::ZERO;
            self.advance_age(dt_ms);
            return;
        }

        let physics = ctx.physics;
        let heat = self.heat;

        self.apply_force(Vec2::new(0.0, -heat * physics.buoyancy_scale));

        let drag = self.velocity
            * (-physics.drag_coefficient * (self.size / physics.drag_reference_size));
        self.apply_force(drag);

        let flutter = (ctx.noise.sample2(
            self.position.x * physics.flutter_spatial_scale,
            ctx.now_ms * physics.flutter_time_scale,
        ) - 0.5)
            * (physics.flutter_base + heat * physics.flutter_heat_gain);
        self.apply_force(Vec2::new(flutter, 0.0));

        self.velocity += self.acceleration;

        if ctx.cohesion.enabled {
            let pull = neighbors.cohesion(slot, self.position);
            if pull.is_finite() {
                self.velocity += pull * (ctx.cohesion.strength * (heat + ctx.cohesion.heat_bias));
            }
        }

        self.velocity = physics.velocity_clamp.apply(self.velocity);
        self.position += self.velocity * physics.frames(dt_ms);
        self.acceleration = Vec2::ZERO;

        self.advance_age(dt_ms);
        if self.is_dead() {
            self.dead = true;
        }
    }

    fn advance_age(&mut self, dt_ms: f32) {
        self.age_ms += dt_ms;
        self.size = self.base_size * (1.0 - self.life_ratio());
    }

    /// Whether any death condition holds now or held at an earlier update.
    pub fn is_dead(&self) -> bool {
        self.dead
            || self.age_ms >= self.lifespan_ms
            || self.size <= self.limits.min_visible_size
            || self.position.y < self.limits.min_y
    }

    /// `age / lifespan`, clamped to `[0, 1]`.
    #[inline]
    pub fn life_ratio(&self) -> f32 {
        (self.age_ms / self.lifespan_ms).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    #[inline]
    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    #[inline]
    pub fn kind(&self) -> ParticleKind {
        self.kind
    }

    #[inline]
    pub fn heat(&self) -> f32 {
        self.heat
    }

    #[inline]
    pub fn age_ms(&self) -> f32 {
        self.age_ms
    }

    #[inline]
    pub fn lifespan_ms(&self) -> f32 {
        self.lifespan_ms
    }

    #[inline]
    pub fn base_size(&self) -> f32 {
        self.base_size
    }

    #[inline]
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Snapshot of what a renderer draws.
    pub fn view(&self) -> ParticleView {
        ParticleView {
            position: self.position,
            size: self.size,
            life_ratio: self.life_ratio(),
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KindTable;
    use crate::neighbors::NoNeighbors;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Env {
        physics: PhysicsConfig,
        cohesion: CohesionConfig,
        noise: CoherentNoise,
    }

    impl Env {
        fn new() -> Self {
            Self {
                physics: PhysicsConfig::default(),
                cohesion: CohesionConfig::default(),
                noise: CoherentNoise::new(1),
            }
        }

        fn ctx(&self, dt_ms: f32, now_ms: f32) -> StepContext<'_> {
            StepContext {
                dt_ms,
                now_ms,
                physics: &self.physics,
                cohesion: &self.cohesion,
                noise: &self.noise,
            }
        }
    }

    fn flame_at(y: f32) -> Particle {
        Particle::new(Vec2::new(400.0, y), Vec2::new(0.0, -0.2), ParticleKind::Flame, 0.7, 2000.0, 4.0)
    }

    #[test]
    fn test_spawn_within_tuning() {
        let table = KindTable::default();
        let physics = PhysicsConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        for kind in ParticleKind::ALL {
            let tuning = table.get(kind);
            for _ in 0..100 {
                let p = Particle::spawn(Vec2::new(10.0, 20.0), kind, tuning, &physics, &mut rng);
                assert_eq!(p.kind(), kind);
                assert_eq!(p.heat(), tuning.heat);
                assert!(tuning.lifespan_ms.contains(p.lifespan_ms()));
                assert!(tuning.base_size.contains(p.base_size()));
                assert!(tuning.velocity_x.contains(p.velocity().x));
                assert!(tuning.velocity_y.contains(p.velocity().y));
                assert_eq!(p.size(), p.base_size());
            }
        }
    }

    #[test]
    fn test_lifespan_never_zero() {
        let p = Particle::new(Vec2::ZERO, Vec2::ZERO, ParticleKind::Ember, 0.45, 0.0, 1.0);
        assert_eq!(p.lifespan_ms(), MIN_LIFESPAN_MS);
        let p = Particle::new(Vec2::ZERO, Vec2::ZERO, ParticleKind::Ember, 0.45, -50.0, 1.0);
        assert_eq!(p.lifespan_ms(), MIN_LIFESPAN_MS);
        let p = Particle::new(Vec2::ZERO, Vec2::ZERO, ParticleKind::Ember, 0.45, f32::NAN, -3.0);
        assert_eq!(p.lifespan_ms(), MIN_LIFESPAN_MS);
        assert_eq!(p.size(), 0.0);
    }

    #[test]
    fn test_single_step_to_death() {
        let env = Env::new();
        let mut p = Particle::new(Vec2::new(400.0, 500.0), Vec2::ZERO, ParticleKind::Flame, 0.7, 1000.0, 3.0);
        assert!(!p.is_dead());
        p.update(&env.ctx(1000.0, 1000.0), &NoNeighbors, 0);
        assert!(p.is_dead());
        assert_eq!(p.size(), 0.0);
    }

    #[test]
    fn test_age_and_size_monotonic() {
        let env = Env::new();
        let mut p = flame_at(500.0);
        let mut last_age = p.age_ms();
        let mut last_size = p.size();
        let mut now = 0.0;
        for i in 0..300 {
            let dt = (i % 7) as f32 * 3.0;
            now += dt;
            p.update(&env.ctx(dt, now), &NoNeighbors, 0);
            assert!(p.age_ms() >= last_age);
            assert!(p.size() <= last_size);
            assert!(p.size() >= 0.0);
            last_age = p.age_ms();
            last_size = p.size();
        }
    }

    #[test]
    fn test_negative_dt_does_not_rewind() {
        let env = Env::new();
        let mut p = flame_at(500.0);
        p.update(&env.ctx(100.0, 100.0), &NoNeighbors, 0);
        let age = p.age_ms();
        p.update(&env.ctx(-50.0, 50.0), &NoNeighbors, 0);
        p.update(&env.ctx(f32::NAN, 50.0), &NoNeighbors, 0);
        assert_eq!(p.age_ms(), age);
    }

    #[test]
    fn test_velocity_clamped_under_huge_forces() {
        let env = Env::new();
        let clamp = &env.physics.velocity_clamp;
        let forces = [
            Vec2::new(1e30, 1e30),
            Vec2::new(-1e30, -1e30),
            Vec2::new(f32::INFINITY, f32::NEG_INFINITY),
            Vec2::new(f32::NAN, 5.0),
        ];
        for force in forces {
            let mut p = flame_at(500.0);
            p.apply_force(force);
            p.update(&env.ctx(16.0, 16.0), &NoNeighbors, 0);
            let v = p.velocity();
            assert!(clamp.x.contains(v.x), "vx {} for {force:?}", v.x);
            assert!(clamp.y.contains(v.y), "vy {} for {force:?}", v.y);
            assert_eq!(p.acceleration(), Vec2::ZERO);
        }
    }

    #[test]
    fn test_buoyancy_lifts() {
        let env = Env::new();
        let mut p = Particle::new(Vec2::new(400.0, 500.0), Vec2::ZERO, ParticleKind::Core, 1.0, 5000.0, 10.0);
        let mut now = 0.0;
        for _ in 0..60 {
            now += 16.666;
            p.update(&env.ctx(16.666, now), &NoNeighbors, 0);
        }
        assert!(p.position().y < 500.0);
    }

    #[test]
    fn test_death_is_latched() {
        let env = Env::new();
        // Starts above the cut-off line, moving down fast enough to come back.
        let mut p = Particle::new(Vec2::new(100.0, -51.0), Vec2::new(0.0, 0.5), ParticleKind::Flame, 0.0, 1e6, 50.0);
        assert!(p.is_dead());
        for i in 0..200 {
            p.apply_force(Vec2::new(0.0, 1.0));
            p.update(&env.ctx(16.666, i as f32 * 16.666), &NoNeighbors, 0);
            assert!(p.is_dead());
        }
    }

    #[test]
    fn test_small_particle_dies() {
        let env = Env::new();
        let mut p = Particle::new(Vec2::new(100.0, 300.0), Vec2::ZERO, ParticleKind::Ember, 0.45, 2000.0, 0.6);
        assert!(p.is_dead());
        p.update(&env.ctx(1.0, 1.0), &NoNeighbors, 0);
        assert!(p.is_dead());
    }

    #[test]
    fn test_view() {
        let env = Env::new();
        let mut p = flame_at(500.0);
        p.update(&env.ctx(500.0, 500.0), &NoNeighbors, 0);
        let view = p.view();
        assert_eq!(view.kind, ParticleKind::Flame);
        assert!((view.life_ratio - 0.25).abs() < 1e-6);
        assert!((view.size - 3.0).abs() < 1e-5);
    }
}
