//! Force model tunables: particle physics, cohesion and turbulence.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::Span;
use crate::error::ConfigError;

/// Clamp one component, mapping NaN to zero.
///
/// Unlike `f32::clamp` this never panics on NaN or inverted bounds.
#[inline]
pub(crate) fn clamp_component(v: f32, lo: f32, hi: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.max(lo).min(hi)
    }
}

/// Per-axis velocity bounds, pixels per frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VelocityClamp {
    pub x: Span,
    pub y: Span,
}

impl Default for VelocityClamp {
    fn default() -> Self {
        Self {
            x: Span::new(-1.0, 1.0),
            y: Span::new(-1.6, 0.5),
        }
    }
}

impl VelocityClamp {
    pub fn apply(&self, v: Vec2) -> Vec2 {
        let (x_lo, x_hi) = self.x.ordered();
        let (y_lo, y_hi) = self.y.ordered();
        Vec2::new(
            clamp_component(v.x, x_lo, x_hi),
            clamp_component(v.y, y_lo, y_hi),
        )
    }
}

/// Constants of the per-particle update rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Upward force per unit heat.
    pub buoyancy_scale: f32,
    pub drag_coefficient: f32,
    /// Size at which drag equals `drag_coefficient * velocity`.
    pub drag_reference_size: f32,
    pub flutter_base: f32,
    pub flutter_heat_gain: f32,
    pub flutter_spatial_scale: f32,
    pub flutter_time_scale: f32,
    /// Duration of the reference frame velocities are expressed in.
    pub frame_ms: f32,
    /// Particles at or below this size are dead.
    pub min_visible_size: f32,
    /// Particles further than this above the top edge are dead.
    pub offscreen_margin: f32,
    pub velocity_clamp: VelocityClamp,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            buoyancy_scale: 0.0025,
            drag_coefficient: 0.015,
            drag_reference_size: 6.0,
            flutter_base: 0.002,
            flutter_heat_gain: 0.01,
            flutter_spatial_scale: 0.01,
            flutter_time_scale: 0.0012,
            frame_ms: 16.666,
            min_visible_size: 0.6,
            offscreen_margin: 50.0,
            velocity_clamp: VelocityClamp::default(),
        }
    }
}

impl PhysicsConfig {
    /// Convert elapsed milliseconds into reference frames.
    #[inline]
    pub fn frames(&self, dt_ms: f32) -> f32 {
        dt_ms / self.frame_ms
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.frame_ms.is_finite() && self.frame_ms > 0.0) {
            return Err(ConfigError::invalid("physics.frame_ms", "must be positive"));
        }
        if !(self.drag_reference_size.is_finite() && self.drag_reference_size > 0.0) {
            return Err(ConfigError::invalid(
                "physics.drag_reference_size",
                "must be positive",
            ));
        }
        if !self.velocity_clamp.x.is_finite() || !self.velocity_clamp.y.is_finite() {
            return Err(ConfigError::invalid(
                "physics.velocity_clamp",
                "bounds must be finite",
            ));
        }
        Ok(())
    }
}

/// Which [`NeighborSampler`](crate::neighbors::NeighborSampler) the pool builds each step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CohesionStrategy {
    /// Exact linear scan over every particle.
    Linear,
    /// Exact uniform grid with cell size equal to the search radius.
    Grid,
    /// Approximate: only particles within `half_width` insertion slots.
    Window { half_width: usize },
    /// Linear below `grid_threshold` live particles, grid at or above.
    Auto { grid_threshold: usize },
}

impl Default for CohesionStrategy {
    fn default() -> Self {
        CohesionStrategy::Auto { grid_threshold: 256 }
    }
}

/// Local clustering between nearby CPU particles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohesionConfig {
    pub enabled: bool,
    pub radius: f32,
    /// Weight multiplier for core neighbors.
    pub core_weight: f32,
    pub strength: f32,
    /// Added to heat before scaling the averaged pull.
    pub heat_bias: f32,
    pub strategy: CohesionStrategy,
}

impl Default for CohesionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 24.0,
            core_weight: 1.2,
            strength: 0.005,
            heat_bias: 0.6,
            strategy: CohesionStrategy::default(),
        }
    }
}

impl CohesionConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ConfigError::invalid("cohesion.radius", "must be positive"));
        }
        if let CohesionStrategy::Window { half_width: 0 } = self.strategy {
            return Err(ConfigError::invalid(
                "cohesion.strategy.half_width",
                "window must include at least one neighbor",
            ));
        }
        Ok(())
    }
}

/// Bounds on a single turbulence sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForceClamp {
    /// Horizontal component stays within `±lateral`.
    pub lateral: f32,
    pub vertical: Span,
}

impl Default for ForceClamp {
    fn default() -> Self {
        Self {
            lateral: 1.0,
            vertical: Span::new(-1.0, 0.1),
        }
    }
}

impl ForceClamp {
    pub fn apply(&self, f: Vec2) -> Vec2 {
        let lateral = self.lateral.abs();
        let (lo, hi) = self.vertical.ordered();
        Vec2::new(
            clamp_component(f.x, -lateral, lateral),
            clamp_component(f.y, lo, hi),
        )
    }
}

/// Coherent-noise airflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurbulenceConfig {
    pub base_strength: f32,
    pub noise_scale: f32,
    /// Noise time axis per millisecond.
    pub time_scale: f32,
    /// Full width of the swirl angle, radians.
    pub swirl_spread: f32,
    pub lateral_gain: f32,
    pub vertical_gain: f32,
    /// Height above the burner baseline over which the burner bias fades out.
    pub burner_zone_height: f32,
    /// Extra vertical gain right at the burners.
    pub burner_vertical_boost: f32,
    /// Vertical gain far above the burner zone.
    pub altitude_vertical_floor: f32,
    /// Extra lateral gain far above the burner zone.
    pub altitude_lateral_boost: f32,
    pub clamp: ForceClamp,
}

impl Default for TurbulenceConfig {
    fn default() -> Self {
        Self {
            base_strength: 0.0025,
            noise_scale: 0.0025,
            time_scale: 0.0002,
            swirl_spread: std::f32::consts::PI * 0.6,
            lateral_gain: 60.0,
            vertical_gain: 120.0,
            burner_zone_height: 160.0,
            burner_vertical_boost: 0.4,
            altitude_vertical_floor: 0.6,
            altitude_lateral_boost: 0.5,
            clamp: ForceClamp::default(),
        }
    }
}

impl TurbulenceConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.burner_zone_height.is_finite() && self.burner_zone_height > 0.0) {
            return Err(ConfigError::invalid(
                "turbulence.burner_zone_height",
                "must be positive",
            ));
        }
        if !self.clamp.lateral.is_finite() || !self.clamp.vertical.is_finite() {
            return Err(ConfigError::invalid(
                "turbulence.clamp",
                "bounds must be finite",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_clamp_handles_non_finite() {
        let clamp = VelocityClamp::default();
        let v = clamp.apply(Vec2::new(f32::INFINITY, f32::NAN));
        assert_eq!(v, Vec2::new(1.0, 0.0));
        let v = clamp.apply(Vec2::new(-1e9, -1e9));
        assert_eq!(v, Vec2::new(-1.0, -1.6));
    }

    #[test]
    fn test_clamp_component_with_bad_bounds() {
        assert_eq!(clamp_component(2.0, f32::NAN, 1.0), 1.0);
        assert_eq!(clamp_component(2.0, 1.0, -1.0), -1.0);
        assert_eq!(clamp_component(f32::NAN, 1.0, -1.0), 0.0);
    }

    #[test]
    fn test_force_clamp() {
        let clamp = ForceClamp::default();
        assert_eq!(clamp.apply(Vec2::new(5.0, 5.0)), Vec2::new(1.0, 0.1));
        assert_eq!(clamp.apply(Vec2::new(-5.0, -5.0)), Vec2::new(-1.0, -1.0));
    }

    #[test]
    fn test_strategy_json_shape() {
        let json = serde_json::to_string(&CohesionStrategy::Window { half_width: 8 }).unwrap();
        assert_eq!(json, r#"{"kind":"window","half_width":8}"#);
        let back: CohesionStrategy = serde_json::from_str(r#"{"kind":"grid"}"#).unwrap();
        assert_eq!(back, CohesionStrategy::Grid);
    }
}
