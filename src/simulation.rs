//! The simulation driver.
//!
//! [`FireSimulation`] is the single context object holding every piece of
//! mutable state: the CPU pool, the burners and their emission
//! accumulator, the GPU population and the random source. Each call to
//! [`FireSimulation::frame`] runs one step in a fixed order:
//!
//! 1. emit new particles from the burners
//! 2. apply turbulence and internal forces, integrate and age the pool
//! 3. prune dead particles and enforce the cap
//! 4. advance the GPU population
//!
//! The two populations never interact; a renderer composites them.

use glam::Vec2;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::FrameTime;
use crate::config::FireConfig;
use crate::emitter::{EmitterSet, SpawnRequest};
use crate::gpu::{ComputeBackend, GpuParticleManager};
use crate::noise::CoherentNoise;
use crate::particle::{Particle, ParticleView, StepContext};
use crate::pool::ParticlePool;
use crate::turbulence::TurbulenceField;
use crate::viewport::Viewport;

/// Height above the bottom edge of the marker drawn when GPU data is missing.
const FALLBACK_ANCHOR_OFFSET: f32 = 60.0;

/// What happened to the GPU population this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuStatus {
    /// Disabled by config or by a failed initialization.
    Disabled,
    /// The kernel ran and the snapshot holds fresh positions.
    Updated,
    /// The kernel failed; the snapshot holds the last good positions.
    Unavailable,
}

/// GPU output for a renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GpuFrame<'a> {
    Disabled,
    /// Positions from this frame.
    Positions(&'a [Vec2]),
    /// No update this frame. `last` holds the previous good positions, if
    /// any, and `anchor` is where to draw a fallback indicator.
    Unavailable { last: &'a [Vec2], anchor: Vec2 },
}

/// Counts for one [`FireSimulation::frame`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    /// Emission events (clusters) fired.
    pub events: u32,
    /// Particles added to the pool.
    pub spawned: usize,
    pub died: usize,
    pub evicted: usize,
    /// Pool size after pruning.
    pub live: usize,
    pub gpu: GpuStatus,
}

/// Owns and steps both particle populations.
pub struct FireSimulation {
    config: FireConfig,
    viewport: Viewport,
    rng: StdRng,
    noise: CoherentNoise,
    turbulence: TurbulenceField,
    pool: ParticlePool,
    emitters: EmitterSet,
    spawn_buffer: Vec<SpawnRequest>,
    gpu: GpuParticleManager,
    gpu_enabled: bool,
    gpu_snapshot: Vec<Vec2>,
    gpu_status: GpuStatus,
}

impl FireSimulation {
    /// Build a simulation, bringing up the GPU population if `config`
    /// enables it. GPU failure leaves a CPU-only simulation.
    pub fn new(config: FireConfig, viewport: Viewport) -> Self {
        let mut sim = Self::cpu_only(config, viewport);
        if sim.config.gpu.enabled {
            let ok = sim.gpu.initialize_preferred(
                sim.config.gpu.backend,
                sim.config.gpu.particle_count as usize,
                viewport.width,
                viewport.height,
            );
            sim.adopt_gpu(ok);
        }
        sim
    }

    /// Build a simulation whose GPU population runs on `backend`.
    pub fn with_compute_backend(
        config: FireConfig,
        viewport: Viewport,
        backend: Box<dyn ComputeBackend>,
    ) -> Self {
        let mut sim = Self::cpu_only(config, viewport);
        let ok = sim.gpu.initialize_with_backend(
            backend,
            sim.config.gpu.particle_count as usize,
            viewport.width,
            viewport.height,
        );
        sim.adopt_gpu(ok);
        sim
    }

    fn cpu_only(config: FireConfig, viewport: Viewport) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = CoherentNoise::new(rng.gen());
        let turbulence = TurbulenceField::new(
            config.turbulence.clone(),
            noise.clone(),
            viewport,
            config.emission.baseline_offset,
        );
        let emitters = EmitterSet::new(config.emission.clone(), viewport, &mut rng);

        Self {
            pool: ParticlePool::new(&config.pool),
            gpu: GpuParticleManager::from_config(&config),
            config,
            viewport,
            rng,
            noise,
            turbulence,
            emitters,
            spawn_buffer: Vec::new(),
            gpu_enabled: false,
            gpu_snapshot: Vec::new(),
            gpu_status: GpuStatus::Disabled,
        }
    }

    fn adopt_gpu(&mut self, initialized: bool) {
        self.gpu_enabled = initialized;
        if initialized {
            self.gpu_snapshot = self.gpu.positions().map(<[Vec2]>::to_vec).unwrap_or_default();
            self.gpu_status = GpuStatus::Updated;
        } else {
            warn!("GPU particles unavailable, continuing with the CPU pool only");
            self.gpu_status = GpuStatus::Disabled;
        }
    }

    /// Run one simulation step.
    pub fn frame(&mut self, time: FrameTime) -> FrameReport {
        let dt_ms = if time.dt_ms.is_finite() { time.dt_ms.max(0.0) } else { 0.0 };
        let now_ms = time.now_ms;

        let events = self.emitters.emit(dt_ms, &mut self.rng, &mut self.spawn_buffer);
        let spawned = self.spawn_buffer.len();
        for request in self.spawn_buffer.drain(..) {
            let tuning = self.config.kinds.get(request.kind);
            self.pool.spawn(Particle::spawn(
                request.position,
                request.kind,
                tuning,
                &self.config.physics,
                &mut self.rng,
            ));
        }

        let ctx = StepContext {
            dt_ms,
            now_ms,
            physics: &self.config.physics,
            cohesion: &self.config.cohesion,
            noise: &self.noise,
        };
        self.pool.step_all(&ctx, Some(&self.turbulence));
        let pruned = self.pool.prune();

        let gpu = self.step_gpu(dt_ms, now_ms);

        let report = FrameReport {
            frame: time.frame,
            events,
            spawned,
            died: pruned.died,
            evicted: pruned.evicted,
            live: self.pool.len(),
            gpu,
        };
        debug!("{report:?}");
        report
    }

    fn step_gpu(&mut self, dt_ms: f32, now_ms: f32) -> GpuStatus {
        if !self.gpu_enabled {
            return GpuStatus::Disabled;
        }
        self.gpu_status = match self.gpu.step(dt_ms, now_ms) {
            Some(positions) => {
                self.gpu_snapshot.clear();
                self.gpu_snapshot.extend_from_slice(positions);
                GpuStatus::Updated
            }
            None => GpuStatus::Unavailable,
        };
        self.gpu_status
    }

    /// Adopt a new viewport size: burners are laid out again and the
    /// turbulence and GPU bounds follow.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.emitters.layout(viewport, &mut self.rng);
        self.turbulence.set_viewport(viewport);
        self.gpu.resize(viewport);
    }

    /// Live CPU particles for drawing.
    pub fn particles(&self) -> impl Iterator<Item = ParticleView> + '_ {
        self.pool.views()
    }

    /// GPU population for drawing.
    pub fn gpu_frame(&self) -> GpuFrame<'_> {
        match self.gpu_status {
            GpuStatus::Disabled => GpuFrame::Disabled,
            GpuStatus::Updated => GpuFrame::Positions(&self.gpu_snapshot),
            GpuStatus::Unavailable => GpuFrame::Unavailable {
                last: &self.gpu_snapshot,
                anchor: self.fallback_anchor(),
            },
        }
    }

    /// Where a renderer marks missing GPU output.
    pub fn fallback_anchor(&self) -> Vec2 {
        Vec2::new(
            self.viewport.center_x(),
            self.viewport.baseline(FALLBACK_ANCHOR_OFFSET),
        )
    }

    pub fn gpu_status(&self) -> GpuStatus {
        self.gpu_status
    }

    pub fn gpu_enabled(&self) -> bool {
        self.gpu_enabled
    }

    pub fn gpu(&self) -> &GpuParticleManager {
        &self.gpu
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn emitters(&self) -> &EmitterSet {
        &self.emitters
    }

    pub fn turbulence(&self) -> &TurbulenceField {
        &self.turbulence
    }

    pub fn config(&self) -> &FireConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}
