//! GPU population tunables.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which compute backend the GPU particle manager may use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Try the GPU, run the kernel on CPU threads if no adapter is usable.
    #[default]
    Auto,
    /// GPU only; initialization fails without an adapter.
    Gpu,
    /// Always run the kernel on CPU threads.
    Cpu,
}

/// Constants of the vectorized integration kernel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelTuning {
    /// Per-step velocity multiplier.
    pub damping: f32,
    /// Constant vertical acceleration per step (negative is up).
    pub buoyancy: f32,
    pub sway_strength: f32,
    /// Tangential pull toward the rotating attractor, per axis.
    pub vorticity: [f32; 2],
    /// Attractor orbit radii around the seeding origin.
    pub attractor_radius: [f32; 2],
    /// Attractor phase advance per millisecond.
    pub attractor_speed: f32,
    /// Pull toward the pseudo-neighbor centroid.
    pub cohesion: f32,
    /// Seeding origin height above the bottom edge.
    pub baseline_offset: f32,
    /// Slots further than this above the top edge respawn.
    pub top_margin: f32,
    /// Slots further than this past either side respawn.
    pub side_margin: f32,
    /// Amplitude of the hashed jitter added on respawn.
    pub respawn_jitter: f32,
}

impl Default for KernelTuning {
    fn default() -> Self {
        Self {
            damping: 0.985,
            buoyancy: -0.009,
            sway_strength: 0.0012,
            vorticity: [0.00008, 0.00006],
            attractor_radius: [30.0, 20.0],
            attractor_speed: 0.0003,
            cohesion: 0.0005,
            baseline_offset: 40.0,
            top_margin: 50.0,
            side_margin: 100.0,
            respawn_jitter: 1.5,
        }
    }
}

/// The fixed-size GPU population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub enabled: bool,
    pub particle_count: u32,
    pub backend: BackendPreference,
    pub kernel: KernelTuning,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            particle_count: 25_000,
            backend: BackendPreference::Auto,
            kernel: KernelTuning::default(),
        }
    }
}

impl GpuConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.particle_count == 0 {
            return Err(ConfigError::invalid(
                "gpu.particle_count",
                "must be positive when the GPU population is enabled",
            ));
        }
        let k = &self.kernel;
        if !(0.0..=1.0).contains(&k.damping) {
            return Err(ConfigError::invalid(
                "gpu.kernel.damping",
                "must be within [0, 1]",
            ));
        }
        if k.top_margin < 0.0 || k.side_margin < 0.0 {
            return Err(ConfigError::invalid(
                "gpu.kernel",
                "respawn margins must be non-negative",
            ));
        }
        Ok(())
    }
}
