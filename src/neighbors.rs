//! Neighbor queries for particle cohesion.
//!
//! Each pool step takes a snapshot of every particle's position and kind,
//! then builds one [`NeighborSampler`] over it. Particles ask the sampler
//! for their cohesion pull: the weighted mean offset toward neighbors
//! within the cohesion radius.
//!
//! | Sampler | Cost per query | Exact |
//! |---------|----------------|-------|
//! | [`LinearScan`] | O(n) | yes |
//! | [`SpatialGrid`] | O(k) after an O(n log n) build | yes |
//! | [`IndexWindow`] | O(w) | no |
//!
//! [`SpatialGrid`] buckets the snapshot by the Morton code (Z-order curve)
//! of its cell, with the cell size equal to the search radius, so every
//! neighbor of a point lies in the surrounding 3x3 block of cells.

use glam::Vec2;

use crate::config::{CohesionConfig, CohesionStrategy};
use crate::particle::ParticleKind;

/// Cells per axis. Positions outside the grid clamp to its edge cells.
pub const GRID_RESOLUTION: u32 = 1024;

/// One entry of the per-step snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborPoint {
    pub position: Vec2,
    pub kind: ParticleKind,
}

/// Answers cohesion queries against a fixed population.
pub trait NeighborSampler {
    /// Weighted mean offset from `origin` toward the neighbors of `slot`.
    ///
    /// Returns zero when no other particle lies within the radius.
    fn cohesion(&self, slot: usize, origin: Vec2) -> Vec2;
}

/// Sampler for populations without cohesion.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNeighbors;

impl NeighborSampler for NoNeighbors {
    fn cohesion(&self, _slot: usize, _origin: Vec2) -> Vec2 {
        Vec2::ZERO
    }
}

/// Neighbor weighting: `(1 - d / radius)`, boosted for core particles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CohesionKernel {
    pub radius: f32,
    pub core_weight: f32,
}

impl CohesionKernel {
    /// Radius and core weight from the cohesion config.
    pub fn from_config(config: &CohesionConfig) -> Self {
        Self {
            radius: config.radius,
            core_weight: config.core_weight,
        }
    }

    /// Weight of a neighbor at distance `d`, or `None` if it does not count.
    ///
    /// Coincident points (`d == 0`) are skipped, so a particle never pulls
    /// on itself.
    #[inline]
    pub fn weight(&self, d: f32, kind: ParticleKind) -> Option<f32> {
        if d > 0.0 && d < self.radius {
            let w = 1.0 - d / self.radius;
            Some(if kind == ParticleKind::Core { w * self.core_weight } else { w })
        } else {
            None
        }
    }
}

#[derive(Default)]
struct Accumulator {
    sum: Vec2,
    count: u32,
}

impl Accumulator {
    #[inline]
    fn add(&mut self, kernel: &CohesionKernel, origin: Vec2, other: &NeighborPoint) {
        let offset = other.position - origin;
        if let Some(w) = kernel.weight(offset.length(), other.kind) {
            self.sum += offset * w;
            self.count += 1;
        }
    }

    fn finish(self) -> Vec2 {
        if self.count == 0 {
            Vec2::ZERO
        } else {
            self.sum / self.count as f32
        }
    }
}

/// Compares against every other point.
pub struct LinearScan<'a> {
    points: &'a [NeighborPoint],
    kernel: CohesionKernel,
}

impl<'a> LinearScan<'a> {
    /// Scan `points` with `kernel`.
    pub fn new(points: &'a [NeighborPoint], kernel: CohesionKernel) -> Self {
        Self { points, kernel }
    }
}

impl NeighborSampler for LinearScan<'_> {
    fn cohesion(&self, slot: usize, origin: Vec2) -> Vec2 {
        let mut acc = Accumulator::default();
        for (i, other) in self.points.iter().enumerate() {
            if i != slot {
                acc.add(&self.kernel, origin, other);
            }
        }
        acc.finish()
    }
}

/// Compares only against points inserted near `slot`.
///
/// Particles emitted in the same burst sit next to each other in the pool,
/// so this approximates the true neighborhood cheaply while the fire is
/// young.
pub struct IndexWindow<'a> {
    points: &'a [NeighborPoint],
    kernel: CohesionKernel,
    half_width: usize,
}

impl<'a> IndexWindow<'a> {
    /// Consider slots within `half_width` of the querying slot, on each side.
    pub fn new(points: &'a [NeighborPoint], kernel: CohesionKernel, half_width: usize) -> Self {
        Self {
            points,
            kernel,
            half_width,
        }
    }
}

impl NeighborSampler for IndexWindow<'_> {
    fn cohesion(&self, slot: usize, origin: Vec2) -> Vec2 {
        let start = slot.saturating_sub(self.half_width);
        let end = slot
            .saturating_add(self.half_width)
            .saturating_add(1)
            .min(self.points.len());
        let mut acc = Accumulator::default();
        for i in start..end {
            if i != slot {
                acc.add(&self.kernel, origin, &self.points[i]);
            }
        }
        acc.finish()
    }
}

/// Expand a 10-bit integer to 20 bits by inserting a zero between each bit.
#[inline]
fn expand_bits(v: u32) -> u32 {
    let mut x = v & 0x0000_03FF;
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}

/// 20-bit Morton code for a 2D cell (each coordinate 0-1023).
#[inline]
pub fn morton_encode(x: u32, y: u32) -> u32 {
    expand_bits(x) | (expand_bits(y) << 1)
}

/// Uniform grid keyed by Morton code.
pub struct SpatialGrid<'a> {
    points: &'a [NeighborPoint],
    kernel: CohesionKernel,
    origin: Vec2,
    /// `(morton code, point index)`, sorted by code.
    entries: Vec<(u32, u32)>,
}

impl<'a> SpatialGrid<'a> {
    /// Bucket `points` into cells of side `kernel.radius`.
    ///
    /// The grid origin is the minimum finite position, so every finite
    /// point gets non-negative cell coordinates. Non-finite points land in
    /// cell zero and never count as neighbors, because their distance is
    /// never below the radius.
    pub fn build(points: &'a [NeighborPoint], kernel: CohesionKernel) -> Self {
        let origin = points
            .iter()
            .map(|p| p.position)
            .filter(|p| p.is_finite())
            .reduce(Vec2::min)
            .unwrap_or(Vec2::ZERO);

        let mut grid = Self {
            points,
            kernel,
            origin,
            entries: Vec::with_capacity(points.len()),
        };
        for (i, p) in points.iter().enumerate() {
            let (cx, cy) = grid.cell_of(p.position);
            grid.entries.push((morton_encode(cx, cy), i as u32));
        }
        grid.entries.sort_unstable();
        grid
    }

    /// Cell coordinates of `position`, clamped into the grid.
    fn cell_of(&self, position: Vec2) -> (u32, u32) {
        let max = (GRID_RESOLUTION - 1) as f32;
        let cell = ((position - self.origin) / self.kernel.radius).floor();
        // NaN casts to zero.
        (cell.x.clamp(0.0, max) as u32, cell.y.clamp(0.0, max) as u32)
    }

    /// Points whose cell has the given Morton code.
    fn bucket(&self, code: u32) -> &[(u32, u32)] {
        let start = self.entries.partition_point(|e| e.0 < code);
        let end = self.entries.partition_point(|e| e.0 <= code);
        &self.entries[start..end]
    }

    /// Number of non-empty cells.
    pub fn occupied_cells(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for &(code, _) in &self.entries {
            if last != Some(code) {
                count += 1;
                last = Some(code);
            }
        }
        count
    }
}

impl NeighborSampler for SpatialGrid<'_> {
    fn cohesion(&self, slot: usize, origin: Vec2) -> Vec2 {
        let (cx, cy) = self.cell_of(origin);
        let mut acc = Accumulator::default();
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let nx = cx as i32 + dx;
                let ny = cy as i32 + dy;
                if nx < 0 || ny < 0 || nx >= GRID_RESOLUTION as i32 || ny >= GRID_RESOLUTION as i32 {
                    continue;
                }
                for &(_, i) in self.bucket(morton_encode(nx as u32, ny as u32)) {
                    let i = i as usize;
                    if i != slot {
                        acc.add(&self.kernel, origin, &self.points[i]);
                    }
                }
            }
        }
        acc.finish()
    }
}

/// Build the sampler `config` asks for over `points`.
///
/// Returns [`NoNeighbors`] when cohesion is disabled or there is nobody to
/// pull toward.
pub fn build_sampler<'a>(
    points: &'a [NeighborPoint],
    config: &CohesionConfig,
) -> Box<dyn NeighborSampler + 'a> {
    if !config.enabled || points.len() < 2 {
        return Box::new(NoNeighbors);
    }
    let kernel = CohesionKernel::from_config(config);
    match config.strategy {
        CohesionStrategy::Linear => Box::new(LinearScan::new(points, kernel)),
        CohesionStrategy::Grid => Box::new(SpatialGrid::build(points, kernel)),
        CohesionStrategy::Window { half_width } => {
            Box::new(IndexWindow::new(points, kernel, half_width))
        }
        CohesionStrategy::Auto { grid_threshold } => {
            if points.len() >= grid_threshold {
                Box::new(SpatialGrid::build(points, kernel))
            } else {
                Box::new(LinearScan::new(points, kernel))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn kernel() -> CohesionKernel {
        CohesionKernel::from_config(&CohesionConfig::default())
    }

    fn point(x: f32, y: f32) -> NeighborPoint {
        NeighborPoint {
            position: Vec2::new(x, y),
            kind: ParticleKind::Flame,
        }
    }

    fn scatter(n: usize, seed: u64) -> Vec<NeighborPoint> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|i| NeighborPoint {
                position: Vec2::new(rng.gen_range(200.0..600.0), rng.gen_range(100.0..560.0)),
                kind: ParticleKind::ALL[i % 3],
            })
            .collect()
    }

    #[test]
    fn test_morton_encode() {
        assert_eq!(morton_encode(0, 0), 0);
        assert_eq!(morton_encode(1, 0), 1);
        assert_eq!(morton_encode(0, 1), 2);
        assert_eq!(morton_encode(1, 1), 3);
        assert_eq!(morton_encode(2, 0), 4);
        assert_eq!(morton_encode(1023, 1023), (1 << 20) - 1);
    }

    #[test]
    fn test_empty_and_single() {
        let empty: Vec<NeighborPoint> = Vec::new();
        let single = vec![point(10.0, 10.0)];
        let config = CohesionConfig::default();

        assert_eq!(build_sampler(&empty, &config).cohesion(0, Vec2::ZERO), Vec2::ZERO);
        assert_eq!(build_sampler(&single, &config).cohesion(0, Vec2::new(10.0, 10.0)), Vec2::ZERO);
        assert_eq!(LinearScan::new(&single, kernel()).cohesion(0, Vec2::new(10.0, 10.0)), Vec2::ZERO);
        assert_eq!(SpatialGrid::build(&single, kernel()).cohesion(0, Vec2::new(10.0, 10.0)), Vec2::ZERO);
    }

    #[test]
    fn test_coincident_points_ignored() {
        let points = vec![point(5.0, 5.0), point(5.0, 5.0)];
        let scan = LinearScan::new(&points, kernel());
        assert_eq!(scan.cohesion(0, Vec2::new(5.0, 5.0)), Vec2::ZERO);
    }

    #[test]
    fn test_pull_toward_neighbor() {
        let points = vec![point(0.0, 0.0), point(12.0, 0.0), point(100.0, 0.0)];
        let pull = LinearScan::new(&points, kernel()).cohesion(0, Vec2::ZERO);
        // One neighbor at half the radius: offset 12 weighted by 0.5.
        assert!((pull.x - 6.0).abs() < 1e-5);
        assert_eq!(pull.y, 0.0);
    }

    #[test]
    fn test_core_neighbors_weigh_more() {
        let flame = vec![point(0.0, 0.0), point(12.0, 0.0)];
        let mut core = flame.clone();
        core[1].kind = ParticleKind::Core;
        let a = LinearScan::new(&flame, kernel()).cohesion(0, Vec2::ZERO);
        let b = LinearScan::new(&core, kernel()).cohesion(0, Vec2::ZERO);
        assert!((b.x / a.x - 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_grid_matches_linear() {
        let points = scatter(800, 4);
        let scan = LinearScan::new(&points, kernel());
        let grid = SpatialGrid::build(&points, kernel());
        for (i, p) in points.iter().enumerate() {
            let a = scan.cohesion(i, p.position);
            let b = grid.cohesion(i, p.position);
            assert!((a - b).length() < 1e-4, "slot {i}: {a:?} vs {b:?}");
        }
        assert!(grid.occupied_cells() > 1);
    }

    #[test]
    fn test_grid_tolerates_outliers() {
        let mut points = scatter(50, 9);
        points.push(point(f32::NAN, 3.0));
        points.push(point(1e9, -1e9));
        let scan = LinearScan::new(&points, kernel());
        let grid = SpatialGrid::build(&points, kernel());
        for (i, p) in points.iter().enumerate().take(50) {
            let a = scan.cohesion(i, p.position);
            let b = grid.cohesion(i, p.position);
            assert!((a - b).length() < 1e-4);
        }
    }

    #[test]
    fn test_window_sees_only_nearby_slots() {
        let points = vec![point(0.0, 0.0), point(100.0, 0.0), point(100.0, 0.0), point(5.0, 0.0)];
        let window = IndexWindow::new(&points, kernel(), 1);
        assert_eq!(window.cohesion(0, Vec2::ZERO), Vec2::ZERO);
        let wide = IndexWindow::new(&points, kernel(), 3);
        assert!(wide.cohesion(0, Vec2::ZERO).x > 0.0);
    }

    #[test]
    fn test_disabled_config_yields_nothing() {
        let points = scatter(10, 1);
        let config = CohesionConfig {
            enabled: false,
            ..Default::default()
        };
        let sampler = build_sampler(&points, &config);
        for (i, p) in points.iter().enumerate() {
            assert_eq!(sampler.cohesion(i, p.position), Vec2::ZERO);
        }
    }
}
