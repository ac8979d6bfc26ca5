//! The per-slot integration kernel.
//!
//! One function, two renditions: [`integrate_slot`] in Rust for the CPU
//! backend and [`KERNEL_WGSL`] for the wgpu backend. Both read a snapshot of
//! the previous step and produce the slot's next position and velocity, so
//! slots can be computed in any order or all at once.
//!
//! Per slot `i` at position `p` with velocity `v`:
//!
//! 1. `v *= damping`, `v.y += buoyancy`
//! 2. lateral sway from summed sines of position, index and time
//! 3. tangential pull around an attractor orbiting the seeding origin
//! 4. cohesion toward the midpoint of slots `7i mod n` and `(13i + 17) mod n`
//! 5. velocity clamp, then `p += v * frames`
//! 6. respawn near the origin if `p` left the bounding region

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::config::{clamp_component, KernelTuning, VelocityClamp};
use crate::viewport::Viewport;

/// Invocations per workgroup in [`KERNEL_WGSL`].
pub const WORKGROUP_SIZE: u32 = 256;

/// Kernel parameters, laid out to match `KernelParams` in [`KERNEL_WGSL`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct KernelUniforms {
    pub width: f32,
    pub height: f32,
    pub time_ms: f32,
    pub frames: f32,
    pub damping: f32,
    pub buoyancy: f32,
    pub sway_strength: f32,
    pub cohesion: f32,
    pub vorticity_x: f32,
    pub vorticity_y: f32,
    pub attractor_rx: f32,
    pub attractor_ry: f32,
    pub attractor_speed: f32,
    pub baseline_offset: f32,
    pub top_margin: f32,
    pub side_margin: f32,
    pub respawn_jitter: f32,
    pub vx_min: f32,
    pub vx_max: f32,
    pub vy_min: f32,
    pub vy_max: f32,
    pub count: u32,
    /// Varies per step; feeds the respawn jitter hash.
    pub seed: u32,
    pub _pad: u32,
}

impl KernelUniforms {
    pub fn new(
        tuning: &KernelTuning,
        clamp: &VelocityClamp,
        viewport: Viewport,
        count: u32,
        time_ms: f32,
        frames: f32,
        seed: u32,
    ) -> Self {
        let (vx_min, vx_max) = clamp.x.ordered();
        let (vy_min, vy_max) = clamp.y.ordered();
        Self {
            width: viewport.width,
            height: viewport.height,
            time_ms,
            frames,
            damping: tuning.damping,
            buoyancy: tuning.buoyancy,
            sway_strength: tuning.sway_strength,
            cohesion: tuning.cohesion,
            vorticity_x: tuning.vorticity[0],
            vorticity_y: tuning.vorticity[1],
            attractor_rx: tuning.attractor_radius[0],
            attractor_ry: tuning.attractor_radius[1],
            attractor_speed: tuning.attractor_speed,
            baseline_offset: tuning.baseline_offset,
            top_margin: tuning.top_margin,
            side_margin: tuning.side_margin,
            respawn_jitter: tuning.respawn_jitter,
            vx_min,
            vx_max,
            vy_min,
            vy_max,
            count,
            seed,
            _pad: 0,
        }
    }

    #[inline]
    fn viewport_max(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Integer hash (xorshift-multiply).
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// Map a hash to `[0, 1]`.
#[inline]
fn to_unit(h: u32) -> f32 {
    h as f32 / u32::MAX as f32
}

/// Initial position and velocity of slot `i`.
pub fn seed_slot(i: u32, viewport: Viewport, baseline_offset: f32) -> (Vec2, Vec2) {
    let position = Vec2::new(
        viewport.center_x() + ((i % 17) as f32 - 8.0) * 0.6,
        viewport.baseline(baseline_offset) + ((i % 13) as f32 - 6.0) * 0.8,
    );
    let velocity = Vec2::new(((i % 19) as f32 - 9.0) * 0.004, -0.6 - (i % 7) as f32 * 0.002);
    (viewport.clamp(position), velocity)
}

/// Respawn position and velocity of slot `i`.
fn respawn_slot(i: u32, u: &KernelUniforms) -> (Vec2, Vec2) {
    let h = hash(i ^ hash(u.seed));
    let jitter = Vec2::new(to_unit(h) * 2.0 - 1.0, to_unit(hash(h)) * 2.0 - 1.0) * u.respawn_jitter;
    let position = Vec2::new(
        u.width * 0.5 + ((i % 31) as f32 - 15.0) * 0.6,
        u.height - u.baseline_offset + ((i % 13) as f32 - 6.0) * 0.6,
    ) + jitter;
    let velocity = Vec2::new(((i % 17) as f32 - 8.0) * 0.002, -0.4 - (i % 7) as f32 * 0.001);
    (position.clamp(Vec2::ZERO, u.viewport_max()), velocity)
}

/// Whether `p` is inside the region slots may roam.
///
/// Written so that NaN coordinates count as outside.
#[inline]
fn in_bounds(p: Vec2, u: &KernelUniforms) -> bool {
    p.y >= -u.top_margin && p.x >= -u.side_margin && p.x <= u.width + u.side_margin
}

/// Next `(position, velocity)` of slot `i`.
///
/// `positions` and `velocities` are the previous step and must have the
/// same non-zero length, greater than `i`.
pub fn integrate_slot(
    i: usize,
    positions: &[Vec2],
    velocities: &[Vec2],
    u: &KernelUniforms,
) -> (Vec2, Vec2) {
    let n = positions.len();
    let slot = i as u32;
    let fi = i as f32;
    let t = u.time_ms;
    let p = positions[i];

    let mut v = velocities[i] * u.damping;
    v.y += u.buoyancy;

    let sway = ((p.x * 0.006 + fi * 3.7 + t * 0.0006).sin() * 0.4
        + (p.y * 0.004 + fi * 1.3 + t * 0.0009).cos() * 0.4)
        * u.sway_strength;
    v.x += sway;

    let a = (slot % 360) as f32 * 0.01745 + t * u.attractor_speed;
    let cx = u.width * 0.5 + (a * 0.7).sin() * u.attractor_rx;
    let cy = u.height - u.baseline_offset - (a * 0.9).cos() * u.attractor_ry;
    v.x += -(p.y - cy) * u.vorticity_x;
    v.y += (p.x - cx) * u.vorticity_y;

    let a_idx = i.wrapping_mul(7) % n;
    let b_idx = i.wrapping_mul(13).wrapping_add(17) % n;
    let mean = (positions[a_idx] + positions[b_idx]) * 0.5;
    v += (mean - p) * u.cohesion;

    v = Vec2::new(
        clamp_component(v.x, u.vx_min, u.vx_max),
        clamp_component(v.y, u.vy_min, u.vy_max),
    );

    let next = p + v * u.frames;
    if in_bounds(next, u) {
        (next, v)
    } else {
        respawn_slot(slot, u)
    }
}

/// WGSL rendition of [`integrate_slot`].
///
/// Bindings: 0 uniform params, 1-2 previous positions and velocities
/// (read-only), 3-4 next positions and velocities.
pub const KERNEL_WGSL: &str = r#"
struct KernelParams {
    width: f32,
    height: f32,
    time_ms: f32,
    frames: f32,
    damping: f32,
    buoyancy: f32,
    sway_strength: f32,
    cohesion: f32,
    vorticity_x: f32,
    vorticity_y: f32,
    attractor_rx: f32,
    attractor_ry: f32,
    attractor_speed: f32,
    baseline_offset: f32,
    top_margin: f32,
    side_margin: f32,
    respawn_jitter: f32,
    vx_min: f32,
    vx_max: f32,
    vy_min: f32,
    vy_max: f32,
    count: u32,
    seed: u32,
    pad: u32,
}

@group(0) @binding(0) var<uniform> params: KernelParams;
@group(0) @binding(1) var<storage, read> pos_in: array<vec2<f32>>;
@group(0) @binding(2) var<storage, read> vel_in: array<vec2<f32>>;
@group(0) @binding(3) var<storage, read_write> pos_out: array<vec2<f32>>;
@group(0) @binding(4) var<storage, read_write> vel_out: array<vec2<f32>>;

fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

fn to_unit(h: u32) -> f32 {
    return f32(h) / 4294967295.0;
}

// NaN maps to zero.
fn clamp_or_zero(x: f32, lo: f32, hi: f32) -> f32 {
    return select(0.0, clamp(x, lo, hi), x == x);
}

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let i = global_id.x;
    let n = params.count;
    if (i >= n) {
        return;
    }

    let fi = f32(i);
    let t = params.time_ms;
    let p = pos_in[i];

    var v = vel_in[i] * params.damping;
    v.y += params.buoyancy;

    let sway = (sin(p.x * 0.006 + fi * 3.7 + t * 0.0006) * 0.4
        + cos(p.y * 0.004 + fi * 1.3 + t * 0.0009) * 0.4) * params.sway_strength;
    v.x += sway;

    let a = f32(i % 360u) * 0.01745 + t * params.attractor_speed;
    let cx = params.width * 0.5 + sin(a * 0.7) * params.attractor_rx;
    let cy = params.height - params.baseline_offset - cos(a * 0.9) * params.attractor_ry;
    v.x += -(p.y - cy) * params.vorticity_x;
    v.y += (p.x - cx) * params.vorticity_y;

    let a_idx = (i * 7u) % n;
    let b_idx = (i * 13u + 17u) % n;
    let mean = (pos_in[a_idx] + pos_in[b_idx]) * 0.5;
    v += (mean - p) * params.cohesion;

    v = vec2<f32>(
        clamp_or_zero(v.x, params.vx_min, params.vx_max),
        clamp_or_zero(v.y, params.vy_min, params.vy_max),
    );

    var next = p + v * params.frames;
    let inside = next.y >= -params.top_margin
        && next.x >= -params.side_margin
        && next.x <= params.width + params.side_margin;
    if (!inside) {
        let h = hash(i ^ hash(params.seed));
        let jitter = vec2<f32>(to_unit(h) * 2.0 - 1.0, to_unit(hash(h)) * 2.0 - 1.0) * params.respawn_jitter;
        next = vec2<f32>(
            params.width * 0.5 + (f32(i % 31u) - 15.0) * 0.6,
            params.height - params.baseline_offset + (f32(i % 13u) - 6.0) * 0.6,
        ) + jitter;
        next = clamp(next, vec2<f32>(0.0), vec2<f32>(params.width, params.height));
        v = vec2<f32>((f32(i % 17u) - 8.0) * 0.002, -0.4 - f32(i % 7u) * 0.001);
    }

    pos_out[i] = next;
    vel_out[i] = v;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(module)
    }

    fn uniforms(count: u32) -> KernelUniforms {
        KernelUniforms::new(
            &KernelTuning::default(),
            &VelocityClamp::default(),
            Viewport::new(800.0, 600.0),
            count,
            1000.0,
            1.0,
            3,
        )
    }

    fn seeded(count: u32) -> (Vec<Vec2>, Vec<Vec2>) {
        (0..count)
            .map(|i| seed_slot(i, Viewport::new(800.0, 600.0), 40.0))
            .unzip()
    }

    #[test]
    fn test_kernel_wgsl_validates() {
        let module = validate_wgsl(KERNEL_WGSL).unwrap();
        let entry = module
            .entry_points
            .iter()
            .find(|e| e.name == "main")
            .expect("main entry point");
        assert_eq!(entry.workgroup_size, [WORKGROUP_SIZE, 1, 1]);
    }

    #[test]
    fn test_uniform_layout() {
        // 24 four-byte scalars; a multiple of 16 as uniform buffers require.
        assert_eq!(std::mem::size_of::<KernelUniforms>(), 96);
        for field in ["vy_max: f32", "count: u32", "seed: u32"] {
            assert!(KERNEL_WGSL.contains(field));
        }
    }

    #[test]
    fn test_hash_spreads() {
        assert_eq!(hash(0), 0);
        assert_ne!(hash(1), hash(2));
        let mean = (1..1000u32).map(|i| to_unit(hash(i))).sum::<f32>() / 999.0;
        assert!((mean - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_seed_near_bottom_center() {
        let viewport = Viewport::new(800.0, 600.0);
        for i in 0..500 {
            let (p, v) = seed_slot(i, viewport, 40.0);
            assert!(viewport.contains(p));
            assert!((p.x - 400.0).abs() <= 5.0);
            assert!((p.y - 560.0).abs() <= 5.0);
            assert!(v.y < 0.0);
        }
    }

    #[test]
    fn test_seed_clamped_in_tiny_viewport() {
        let viewport = Viewport::new(4.0, 4.0);
        for i in 0..50 {
            assert!(viewport.contains(seed_slot(i, viewport, 40.0).0));
        }
    }

    #[test]
    fn test_velocity_stays_clamped() {
        let (mut positions, mut velocities) = seeded(64);
        velocities[3] = Vec2::new(1e20, -1e20);
        velocities[4] = Vec2::new(f32::NAN, f32::NAN);
        positions[5] = Vec2::new(1e9, 1e9);
        let u = uniforms(64);
        let clamp = VelocityClamp::default();
        for i in 0..64 {
            let (_, v) = integrate_slot(i, &positions, &velocities, &u);
            assert!(clamp.x.contains(v.x) && clamp.y.contains(v.y), "slot {i}: {v:?}");
        }
    }

    #[test]
    fn test_out_of_bounds_respawns() {
        let (mut positions, velocities) = seeded(32);
        positions[0] = Vec2::new(400.0, -500.0);
        positions[1] = Vec2::new(-1000.0, 300.0);
        positions[2] = Vec2::new(5000.0, 300.0);
        positions[3] = Vec2::new(f32::NAN, 300.0);
        let u = uniforms(32);
        for i in 0..4 {
            let (p, v) = integrate_slot(i, &positions, &velocities, &u);
            assert!(p.is_finite());
            assert!((p.x - 400.0).abs() <= 12.0, "slot {i}: {p:?}");
            assert!((p.y - 560.0).abs() <= 6.0, "slot {i}: {p:?}");
            assert!(v.y < 0.0);
        }
    }

    #[test]
    fn test_in_bounds_slot_moves_up() {
        let (positions, velocities) = seeded(16);
        let u = uniforms(16);
        let (p, _) = integrate_slot(7, &positions, &velocities, &u);
        assert!(p.y < positions[7].y);
    }

    #[test]
    fn test_single_slot_population() {
        let positions = vec![Vec2::new(400.0, 500.0)];
        let velocities = vec![Vec2::ZERO];
        let (p, v) = integrate_slot(0, &positions, &velocities, &uniforms(1));
        assert!(p.is_finite() && v.is_finite());
    }
}
