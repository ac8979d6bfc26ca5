//! Hardware rendition of the kernel via wgpu.
//!
//! The device is headless: no surface is requested, so this works in
//! terminals and CI machines that have a compute-capable adapter. Each
//! step uploads the previous buffers, dispatches [`KERNEL_WGSL`] once and
//! blocks on the readback, which keeps the call synchronous from the
//! manager's point of view.

use std::mem::size_of;
use std::sync::mpsc;

use glam::Vec2;
use log::{info, warn};

use super::kernel::{KernelUniforms, KERNEL_WGSL, WORKGROUP_SIZE};
use super::{ComputeBackend, ParticleBuffers};
use crate::error::ComputeError;

/// Bytes per slot in each SoA buffer.
const SLOT_BYTES: u64 = size_of::<Vec2>() as u64;

/// Device buffers for one population size.
struct SlotBuffers {
    count: usize,
    pos_in: wgpu::Buffer,
    vel_in: wgpu::Buffer,
    pos_out: wgpu::Buffer,
    vel_out: wgpu::Buffer,
    /// Positions then velocities, mapped for readback.
    staging: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl SlotBuffers {
    fn new(
        device: &wgpu::Device,
        pipeline: &wgpu::ComputePipeline,
        uniforms: &wgpu::Buffer,
        count: usize,
    ) -> Self {
        let bytes = count as u64 * SLOT_BYTES;
        let storage = |label: &str, extra: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE | extra,
                mapped_at_creation: false,
            })
        };

        let pos_in = storage("Fire Positions In", wgpu::BufferUsages::COPY_DST);
        let vel_in = storage("Fire Velocities In", wgpu::BufferUsages::COPY_DST);
        let pos_out = storage("Fire Positions Out", wgpu::BufferUsages::COPY_SRC);
        let vel_out = storage("Fire Velocities Out", wgpu::BufferUsages::COPY_SRC);

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fire Readback Buffer"),
            size: bytes * 2,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fire Kernel Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pos_in.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: vel_in.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: pos_out.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: vel_out.as_entire_binding(),
                },
            ],
        });

        Self {
            count,
            pos_in,
            vel_in,
            pos_out,
            vel_out,
            staging,
            bind_group,
        }
    }

    fn bytes(&self) -> u64 {
        self.count as u64 * SLOT_BYTES
    }
}

/// A compute device running the fire kernel.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    uniform_buffer: wgpu::Buffer,
    buffers: Option<SlotBuffers>,
    adapter_name: String,
    max_workgroups: u32,
}

impl WgpuBackend {
    /// Acquire an adapter and device and build the kernel pipeline.
    pub fn new() -> Result<Self, ComputeError> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, ComputeError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ComputeError::AdapterUnavailable)?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Hearth Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        // Errors are reported through error scopes; anything that escapes
        // them is logged instead of aborting the process.
        device.on_uncaptured_error(Box::new(|err| {
            warn!("Uncaptured GPU error: {err}");
        }));

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fire Kernel"),
            source: wgpu::ShaderSource::Wgsl(KERNEL_WGSL.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Fire Kernel Pipeline"),
            layout: None, // Auto layout
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(err) = device.pop_error_scope().await {
            return Err(ComputeError::Validation(err.to_string()));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fire Kernel Uniforms"),
            size: size_of::<KernelUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let max_workgroups = device.limits().max_compute_workgroups_per_dimension;
        info!("GPU compute device ready: {adapter_name}");

        Ok(Self {
            device,
            queue,
            pipeline,
            uniform_buffer,
            buffers: None,
            adapter_name,
            max_workgroups,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn workgroups(&self, count: usize) -> Result<u32, ComputeError> {
        let groups = count.div_ceil(WORKGROUP_SIZE as usize);
        match u32::try_from(groups) {
            Ok(groups) if groups <= self.max_workgroups => Ok(groups),
            _ => Err(ComputeError::Validation(format!(
                "{count} slots exceed the device dispatch limit"
            ))),
        }
    }

    fn ensure_buffers(&mut self, count: usize) -> Result<&SlotBuffers, ComputeError> {
        self.workgroups(count)?;
        let stale = self.buffers.as_ref().map_or(true, |b| b.count != count);
        if stale {
            self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
            let buffers = SlotBuffers::new(&self.device, &self.pipeline, &self.uniform_buffer, count);
            if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
                return Err(ComputeError::Execution(err.to_string()));
            }
            self.buffers = Some(buffers);
        }
        self.buffers.as_ref().ok_or(ComputeError::NotInitialized)
    }
}

/// Decode little-endian `vec2<f32>` values.
fn decode_vec2(bytes: &[u8], out: &mut Vec<Vec2>) {
    out.clear();
    out.extend(bytes.chunks_exact(8).map(|c| {
        Vec2::new(
            f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
        )
    }));
}

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn prepare(&mut self, count: usize) -> Result<(), ComputeError> {
        self.ensure_buffers(count).map(|_| ())
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
        let workgroups = self.workgroups(count)?;
        self.ensure_buffers(count)?;
        let (device, queue) = (&self.device, &self.queue);
        let buffers = self.buffers.as_ref().ok_or(ComputeError::NotInitialized)?;
        let bytes = buffers.bytes();

        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        queue.write_buffer(&buffers.pos_in, 0, bytemuck::cast_slice(&input.positions));
        queue.write_buffer(&buffers.vel_in, 0, bytemuck::cast_slice(&input.velocities));

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fire Kernel Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Fire Kernel Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&buffers.pos_out, 0, &buffers.staging, 0, bytes);
        encoder.copy_buffer_to_buffer(&buffers.vel_out, 0, &buffers.staging, bytes, bytes);
        queue.submit(Some(encoder.finish()));
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(ComputeError::Execution(err.to_string()));
        }

        let slice = buffers.staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(ComputeError::BufferMapping(err.to_string())),
            Err(err) => return Err(ComputeError::BufferMapping(err.to_string())),
        }

        {
            let data = slice.get_mapped_range();
            let (positions, velocities) = data.split_at(bytes as usize);
            decode_vec2(positions, &mut output.positions);
            decode_vec2(velocities, &mut output.velocities);
        }
        buffers.staging.unmap();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vec2() {
        let mut bytes = Vec::new();
        for v in [1.5f32, -2.0, 0.25, 8.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut out = vec![Vec2::ZERO; 7];
        decode_vec2(&bytes, &mut out);
        assert_eq!(out, vec![Vec2::new(1.5, -2.0), Vec2::new(0.25, 8.0)]);
    }

    #[test]
    fn test_slot_bytes() {
        assert_eq!(SLOT_BYTES, 8);
    }
}
