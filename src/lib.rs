//! # Hearth - particle fire simulation
//!
//! Thousands of short-lived flame, ember and core particles pushed around by
//! buoyancy, drag, turbulent airflow and local cohesion, plus a much larger
//! homogeneous population stepped by a single vectorized kernel on the GPU
//! (or on CPU threads when no GPU is usable).
//!
//! Hearth produces positions, sizes and ages; drawing them is up to you.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hearth::prelude::*;
//!
//! fn main() {
//!     let mut sim = FireSimulation::new(FireConfig::default(), Viewport::new(800.0, 600.0));
//!     let mut clock = Clock::new();
//!     loop {
//!         sim.frame(clock.tick());
//!         for p in sim.particles() {
//!             // draw p.position with p.size, colored by p.kind and p.life_ratio
//!         }
//!         if let GpuFrame::Positions(points) = sim.gpu_frame() {
//!             // draw points
//!         }
//!     }
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Two populations
//!
//! The CPU [`ParticlePool`] holds individually simulated [`Particle`]s that
//! are emitted, age, shrink and die. The [`GpuParticleManager`] holds a
//! fixed number of anonymous slots that are never removed, only respawned
//! at the burners when they leave the screen.
//!
//! ### Forces on a CPU particle
//!
//! | Force | Source |
//! |-------|--------|
//! | Buoyancy | per-kind heat |
//! | Drag | velocity and size |
//! | Flutter | coherent noise, scaled by heat |
//! | Turbulence | [`TurbulenceField`], scaled by the pool coupling |
//! | Cohesion | a [`NeighborSampler`] over the pool |
//!
//! Velocities are clamped after every step, so no combination of forces can
//! blow up.
//!
//! ### Time
//!
//! Every stepping function takes elapsed milliseconds explicitly. The
//! [`Clock`] produces them from wall time, or from a fixed step for headless
//! runs and tests.
//!
//! ### Failure
//!
//! Nothing stops the frame loop. GPU initialization failure degrades to a
//! CPU-only fire; a failed kernel step degrades to
//! [`GpuFrame::Unavailable`] for that frame.

pub mod clock;
pub mod config;
pub mod emitter;
pub mod error;
pub mod gpu;
pub mod neighbors;
pub mod noise;
pub mod particle;
pub mod pool;
pub mod simulation;
pub mod turbulence;
pub mod viewport;

pub use glam::Vec2;

pub use clock::{Clock, FrameTime};
pub use config::FireConfig;
pub use emitter::{Emitter, EmitterSet};
pub use error::{ComputeError, ConfigError};
pub use gpu::{ComputeBackend, CpuBackend, GpuParticleManager};
pub use neighbors::NeighborSampler;
pub use particle::{Particle, ParticleKind, ParticleView};
pub use pool::ParticlePool;
pub use simulation::{FireSimulation, FrameReport, GpuFrame, GpuStatus};
pub use turbulence::TurbulenceField;
pub use viewport::Viewport;

/// Everything needed to drive and draw a fire.
pub mod prelude {
    pub use crate::clock::{Clock, FrameTime};
    pub use crate::config::{BackendPreference, CohesionStrategy, FireConfig};
    pub use crate::gpu::GpuParticleManager;
    pub use crate::particle::{ParticleKind, ParticleView};
    pub use crate::simulation::{FireSimulation, FrameReport, GpuFrame, GpuStatus};
    pub use crate::viewport::Viewport;
    pub use crate::Vec2;
}
