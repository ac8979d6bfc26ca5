//! The fixed-size particle population stepped by a vectorized kernel.
//!
//! [`GpuParticleManager`] owns a structure-of-arrays of positions and
//! velocities and advances it one kernel pass per frame. The pass itself is
//! delegated to a [`ComputeBackend`]:
//!
//! | Backend | Runs on |
//! |---------|---------|
//! | [`WgpuBackend`] | GPU via a WGSL compute shader (`gpu` feature) |
//! | [`CpuBackend`] | CPU threads via rayon |
//!
//! Nothing here is allowed to stop the frame loop. Initialization failure
//! is reported as `false`, a failed or malformed step as `None`; in both
//! cases the last good buffer stays readable.
//!
//! # Example
//!
//! ```ignore
//! let mut gpu = GpuParticleManager::new(KernelTuning::default(), VelocityClamp::default(), 16.666);
//! if gpu.initialize(25_000, 800.0, 600.0) {
//!     if let Some(positions) = gpu.step(frame.dt_ms, frame.now_ms) {
//!         renderer.draw_points(positions);
//!     }
//! }
//! ```

mod cpu_backend;
pub mod kernel;
#[cfg(feature = "gpu")]
mod wgpu_backend;

use glam::Vec2;
use log::{debug, info, warn};

pub use cpu_backend::CpuBackend;
pub use kernel::{integrate_slot, KernelUniforms, KERNEL_WGSL, WORKGROUP_SIZE};
#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuBackend;

use crate::config::{BackendPreference, FireConfig, KernelTuning, VelocityClamp};
use crate::error::ComputeError;
use crate::viewport::Viewport;

/// Positions and velocities, index-aligned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleBuffers {
    pub positions: Vec<Vec2>,
    pub velocities: Vec<Vec2>,
}

impl ParticleBuffers {
    /// Slot count, taken from the position array.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Resize both arrays to `count`, zero-filling new slots.
    pub fn resize(&mut self, count: usize) {
        self.positions.resize(count, Vec2::ZERO);
        self.velocities.resize(count, Vec2::ZERO);
    }
}

/// Executes one kernel pass.
///
/// `input` is the previous step and is never aliased with `output`.
/// Implementations fill `output` with the next step for every slot.
pub trait ComputeBackend {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Allocate whatever `count` slots need. Called once from initialize.
    fn prepare(&mut self, _count: usize) -> Result<(), ComputeError> {
        Ok(())
    }

    fn run(
        &mut self,
        input: &ParticleBuffers,
        uniforms: &KernelUniforms,
        output: &mut ParticleBuffers,
    ) -> Result<(), ComputeError>;
}

/// Pick a backend for `preference`.
///
/// `Auto` falls back to [`CpuBackend`] when no device is usable; `Gpu`
/// reports the failure instead.
pub fn select_backend(
    preference: BackendPreference,
) -> Result<Box<dyn ComputeBackend>, ComputeError> {
    match preference {
        BackendPreference::Cpu => Ok(Box::new(CpuBackend)),
        BackendPreference::Gpu => hardware_backend(),
        BackendPreference::Auto => match hardware_backend() {
            Ok(backend) => Ok(backend),
            Err(err) => {
                warn!("GPU compute unavailable ({err}), running the kernel on CPU threads");
                Ok(Box::new(CpuBackend))
            }
        },
    }
}

#[cfg(feature = "gpu")]
fn hardware_backend() -> Result<Box<dyn ComputeBackend>, ComputeError> {
    Ok(Box::new(WgpuBackend::new()?))
}

#[cfg(not(feature = "gpu"))]
fn hardware_backend() -> Result<Box<dyn ComputeBackend>, ComputeError> {
    Err(ComputeError::AdapterUnavailable)
}

/// Owns the fixed-size population and its compute backend.
pub struct GpuParticleManager {
    backend: Option<Box<dyn ComputeBackend>>,
    /// Last good step; what callers read.
    front: ParticleBuffers,
    /// Kernel output target; swapped with `front` on success.
    back: ParticleBuffers,
    viewport: Viewport,
    tuning: KernelTuning,
    clamp: VelocityClamp,
    frame_ms: f32,
    steps: u32,
    failures: u64,
}

impl GpuParticleManager {
    pub fn new(tuning: KernelTuning, clamp: VelocityClamp, frame_ms: f32) -> Self {
        Self {
            backend: None,
            front: ParticleBuffers::default(),
            back: ParticleBuffers::default(),
            viewport: Viewport::default(),
            tuning,
            clamp,
            frame_ms,
            steps: 0,
            failures: 0,
        }
    }

    pub fn from_config(config: &FireConfig) -> Self {
        Self::new(
            config.gpu.kernel.clone(),
            config.physics.velocity_clamp.clone(),
            config.physics.frame_ms,
        )
    }

    /// Acquire a backend (GPU first, CPU threads as fallback) and seed
    /// `count` slots near the bottom center of a `width` x `height` viewport.
    pub fn initialize(&mut self, count: usize, width: f32, height: f32) -> bool {
        self.initialize_preferred(BackendPreference::Auto, count, width, height)
    }

    /// Like [`initialize`](Self::initialize) with an explicit backend choice.
    pub fn initialize_preferred(
        &mut self,
        preference: BackendPreference,
        count: usize,
        width: f32,
        height: f32,
    ) -> bool {
        match select_backend(preference) {
            Ok(backend) => self.initialize_with_backend(backend, count, width, height),
            Err(err) => {
                warn!("GPU particle manager disabled: {err}");
                self.backend = None;
                false
            }
        }
    }

    /// Seed the population and adopt `backend`.
    pub fn initialize_with_backend(
        &mut self,
        mut backend: Box<dyn ComputeBackend>,
        count: usize,
        width: f32,
        height: f32,
    ) -> bool {
        self.backend = None;
        if count == 0 {
            warn!("GPU particle manager disabled: particle count is zero");
            return false;
        }
        if let Err(err) = backend.prepare(count) {
            warn!("GPU particle manager disabled: {err}");
            return false;
        }

        self.viewport = Viewport::new(width, height);
        self.front.positions.clear();
        self.front.velocities.clear();
        for i in 0..count {
            let (p, v) = kernel::seed_slot(i as u32, self.viewport, self.tuning.baseline_offset);
            self.front.positions.push(p);
            self.front.velocities.push(v);
        }
        self.back = self.front.clone();
        self.steps = 0;
        self.failures = 0;

        info!("GPU particle manager: {count} slots on the {} backend", backend.name());
        self.backend = Some(backend);
        true
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Slot count, zero before initialization.
    pub fn count(&self) -> usize {
        if self.is_initialized() {
            self.front.len()
        } else {
            0
        }
    }

    /// Steps that failed since initialization.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Bounds and respawn origin follow the new size from the next step on.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Advance one kernel pass.
    ///
    /// Returns the new positions, or `None` if the manager is not
    /// initialized or the pass failed. A failed pass leaves the previous
    /// buffer in place.
    pub fn step(&mut self, dt_ms: f32, now_ms: f32) -> Option<&[Vec2]> {
        match self.try_step(dt_ms, now_ms) {
            Ok(()) => Some(self.front.positions.as_slice()),
            Err(ComputeError::NotInitialized) => {
                debug!("GPU step skipped: manager not initialized");
                None
            }
            Err(err) => {
                self.failures += 1;
                warn!("GPU step failed, keeping previous frame: {err}");
                None
            }
        }
    }

    /// [`step`](Self::step) with the failure cause.
    pub fn try_step(&mut self, dt_ms: f32, now_ms: f32) -> Result<(), ComputeError> {
        let backend = self.backend.as_mut().ok_or(ComputeError::NotInitialized)?;
        let count = self.front.len();

        let dt_ms = if dt_ms.is_finite() { dt_ms.max(0.0) } else { 0.0 };
        let now_ms = if now_ms.is_finite() { now_ms } else { 0.0 };
        let uniforms = KernelUniforms::new(
            &self.tuning,
            &self.clamp,
            self.viewport,
            count as u32,
            now_ms,
            dt_ms / self.frame_ms,
            self.steps,
        );
        self.steps = self.steps.wrapping_add(1);

        self.back.resize(count);
        backend.run(&self.front, &uniforms, &mut self.back)?;

        if self.back.positions.len() != count || self.back.velocities.len() != count {
            return Err(ComputeError::MalformedOutput {
                expected: count,
                actual: self.back.positions.len().min(self.back.velocities.len()),
            });
        }
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    /// Positions from the last good step, `None` before initialization.
    pub fn positions(&self) -> Option<&[Vec2]> {
        self.is_initialized().then_some(self.front.positions.as_slice())
    }

    pub fn velocities(&self) -> Option<&[Vec2]> {
        self.is_initialized().then_some(self.front.velocities.as_slice())
    }
}
