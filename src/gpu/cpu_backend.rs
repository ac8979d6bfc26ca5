//! Data-parallel CPU rendition of the kernel.

use rayon::prelude::*;

use super::kernel::{integrate_slot, KernelUniforms};
use super::{ComputeBackend, ParticleBuffers};
use crate::error::ComputeError;

/// Runs [`integrate_slot`] across the rayon thread pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn run(
        &mut self,
        input: &ParticleBuffers,
        uniforms: &KernelUniforms,
        output: &mut ParticleBuffers,
    ) -> Result<(), ComputeError> {
        let count = input.len();
        if count == 0 || input.velocities.len() != count {
            return Err(ComputeError::MalformedOutput {
                expected: count,
                actual: input.velocities.len(),
            });
        }
        output.resize(count);

        output
            .positions
            .par_iter_mut()
            .zip(output.velocities.par_iter_mut())
            .enumerate()
            .for_each(|(i, (position, velocity))| {
                let (p, v) = integrate_slot(i, &input.positions, &input.velocities, uniforms);
                *position = p;
                *velocity = v;
            });
        Ok(())
    }
}
