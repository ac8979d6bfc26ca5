//! Tunable constants for the fire simulation.
//!
//! Every magic number in the force model lives here so it can be adjusted
//! without recompiling. Configs serialize to JSON and are loaded by the
//! runner:
//!
//! ```ignore
//! let config = FireConfig::load("campfire.json")?;
//! config.validate()?;
//! let sim = FireSimulation::new(config, Viewport::new(1280.0, 720.0));
//! ```
//!
//! Missing sections fall back to their defaults, which give a campfire
//! sized for an 800x600 view.

mod gpu;
mod kinds;
mod physics;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

pub use gpu::{BackendPreference, GpuConfig, KernelTuning};
pub use kinds::{KindTable, KindTuning};
pub(crate) use physics::clamp_component;
pub use physics::{
    CohesionConfig, CohesionStrategy, ForceClamp, PhysicsConfig, TurbulenceConfig, VelocityClamp,
};

/// A closed interval sampled uniformly.
///
/// Endpoints may be given in either order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f32,
    pub max: f32,
}

impl Span {
    /// A span from `min` to `max`, in either order.
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Endpoints as `(low, high)`.
    #[inline]
    pub fn ordered(&self) -> (f32, f32) {
        if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        }
    }

    /// Draw a value uniformly from the span.
    ///
    /// Interpolates between the endpoints rather than scaling the width, so
    /// spans wider than `f32::MAX` still sample inside their bounds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let (lo, hi) = self.ordered();
        if hi > lo {
            let t: f32 = rng.gen();
            (lo * (1.0 - t) + hi * t).max(lo).min(hi)
        } else {
            lo
        }
    }

    /// Whether `v` lies within the span, endpoints included.
    pub fn contains(&self, v: f32) -> bool {
        let (lo, hi) = self.ordered();
        (lo..=hi).contains(&v)
    }

    /// Both endpoints and the width between them are finite.
    fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && (self.max - self.min).is_finite()
    }
}

/// How emission events are distributed across burners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitterSelection {
    /// Pick a burner uniformly at random per event.
    #[default]
    Random,
    /// Cycle through burners in order.
    RoundRobin,
}

/// Emission rate, burner layout and per-event cluster composition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionConfig {
    /// Emission events per second.
    pub rate_per_sec: f32,
    /// Number of burners laid out across the viewport.
    pub emitter_count: u32,
    /// Horizontal distance between burners as a fraction of viewport width.
    pub emitter_spacing: f32,
    /// Burner height above the bottom edge, in pixels.
    pub baseline_offset: f32,
    /// Per-layout jitter applied to each burner origin.
    pub origin_jitter: [f32; 2],
    /// Which burner each event fires from.
    pub selection: EmitterSelection,
    /// Fewest flame particles per event.
    pub cluster_min: u32,
    /// Most flame particles per event (inclusive).
    pub cluster_max: u32,
    /// Half-extent `[x, y]` of the box flames spawn in around the burner.
    pub flame_jitter: [f32; 2],
    /// Probability of one extra ember per event.
    pub ember_chance: f32,
    /// Half-extent `[x, y]` of the ember spawn box.
    pub ember_jitter: [f32; 2],
    /// Probability of one extra core particle per event.
    pub core_chance: f32,
    /// Half-extent `[x, y]` of the core spawn box.
    pub core_jitter: [f32; 2],
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 240.0,
            emitter_count: 1,
            emitter_spacing: 0.18,
            baseline_offset: 44.0,
            origin_jitter: [3.0, 4.0],
            selection: EmitterSelection::Random,
            cluster_min: 2,
            cluster_max: 4,
            flame_jitter: [6.0, 4.0],
            ember_chance: 0.12,
            ember_jitter: [8.0, 6.0],
            core_chance: 0.08,
            core_jitter: [3.0, 2.0],
        }
    }
}

/// CPU particle pool limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Hard cap on live CPU particles; oldest are evicted first.
    pub max_particles: usize,
    /// Scale applied to the turbulence force before it reaches a particle.
    pub turbulence_coupling: f32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_particles: 6000,
            turbulence_coupling: 0.55,
        }
    }
}

/// Complete simulation configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireConfig {
    pub emission: EmissionConfig,
    pub pool: PoolConfig,
    pub kinds: KindTable,
    pub physics: PhysicsConfig,
    pub cohesion: CohesionConfig,
    pub turbulence: TurbulenceConfig,
    pub gpu: GpuConfig,
    /// Seed for noise and spawn jitter. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl FireConfig {
    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: FireConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.emission;
        if !(e.rate_per_sec.is_finite() && e.rate_per_sec >= 0.0) {
            return Err(ConfigError::invalid(
                "emission.rate_per_sec",
                "must be a non-negative number",
            ));
        }
        for (field, v) in [
            ("emission.emitter_spacing", e.emitter_spacing),
            ("emission.baseline_offset", e.baseline_offset),
        ] {
            if !v.is_finite() {
                return Err(ConfigError::invalid(field, "must be finite"));
            }
        }
        for (field, extent) in [
            ("emission.origin_jitter", e.origin_jitter),
            ("emission.flame_jitter", e.flame_jitter),
            ("emission.ember_jitter", e.ember_jitter),
            ("emission.core_jitter", e.core_jitter),
        ] {
            if !extent.iter().all(|v| v.is_finite()) {
                return Err(ConfigError::invalid(field, "jitter must be finite"));
            }
        }
        if e.emitter_count == 0 {
            return Err(ConfigError::invalid(
                "emission.emitter_count",
                "at least one burner is required",
            ));
        }
        if e.cluster_min > e.cluster_max {
            return Err(ConfigError::invalid(
                "emission.cluster_min",
                format!("{} exceeds cluster_max {}", e.cluster_min, e.cluster_max),
            ));
        }
        for (field, p) in [
            ("emission.ember_chance", e.ember_chance),
            ("emission.core_chance", e.core_chance),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::invalid(field, "probability must be within [0, 1]"));
            }
        }

        if self.pool.max_particles == 0 {
            return Err(ConfigError::invalid(
                "pool.max_particles",
                "must allow at least one particle",
            ));
        }

        self.kinds.validate()?;
        self.physics.validate()?;
        self.cohesion.validate()?;
        self.turbulence.validate()?;
        self.gpu.validate()?;
        Ok(())
    }
}
