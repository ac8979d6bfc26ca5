//! Turbulent airflow acting on the CPU particle pool.
//!
//! The field is a pure function of position and time: a swirl angle and a
//! strength are read from coherent noise at independent frequencies and
//! combined into a mostly-upward push. Near the burners the push is
//! stronger and more vertical; higher up it weakens and turns sideways,
//! which lets flame tips lick left and right.
//!
//! Every sample is clamped by [`ForceClamp`], so no single sample can
//! destabilize a particle however the noise lines up.

use glam::Vec2;

use crate::config::{ForceClamp, TurbulenceConfig};
use crate::noise::CoherentNoise;
use crate::viewport::Viewport;

/// Offset between the angle and strength noise lookups.
const STRENGTH_OFFSET: f32 = 10.0;

/// Stateless airflow over the viewport.
#[derive(Clone, Debug)]
pub struct TurbulenceField {
    config: TurbulenceConfig,
    noise: CoherentNoise,
    viewport: Viewport,
    baseline_offset: f32,
}

impl TurbulenceField {
    /// `baseline_offset` is the burner height above the bottom edge.
    pub fn new(
        config: TurbulenceConfig,
        noise: CoherentNoise,
        viewport: Viewport,
        baseline_offset: f32,
    ) -> Self {
        Self {
            config,
            noise,
            viewport,
            baseline_offset,
        }
    }

    /// Follow a resized viewport. The burner zone moves with the bottom
    /// edge.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Bounds every [`force`](Self::force) sample stays within.
    pub fn clamp(&self) -> &ForceClamp {
        &self.config.clamp
    }

    /// Burner proximity in `[0, 1]`: 1 at or below the baseline, fading to
    /// 0 over `burner_zone_height` pixels above it.
    pub fn burner_weight(&self, y: f32) -> f32 {
        if !y.is_finite() {
            return 0.0;
        }
        let baseline = self.viewport.baseline(self.baseline_offset);
        let above = baseline - y;
        (1.0 - above / self.config.burner_zone_height).clamp(0.0, 1.0)
    }

    /// Lateral (`x`) and vertical (`y`) gain multipliers at height `y`.
    pub fn altitude_bias(&self, y: f32) -> Vec2 {
        let c = &self.config;
        let burner = self.burner_weight(y);
        Vec2::new(
            1.0 + c.altitude_lateral_boost * (1.0 - burner),
            c.altitude_vertical_floor
                + (1.0 + c.burner_vertical_boost - c.altitude_vertical_floor) * burner,
        )
    }

    /// Force at `position` at time `now_ms`.
    pub fn force(&self, position: Vec2, now_ms: f32) -> Vec2 {
        let c = &self.config;
        if !(position.is_finite() && now_ms.is_finite()) {
            return Vec2::ZERO;
        }

        let nx = position.x * c.noise_scale;
        let ny = position.y * c.noise_scale;
        let t = now_ms * c.time_scale;

        let angle = (self.noise.sample3(nx, ny, t) - 0.5) * c.swirl_spread;
        let strength = c.base_strength
            * (1.0 + self.noise.sample3(nx + STRENGTH_OFFSET, ny + STRENGTH_OFFSET, t));

        let bias = self.altitude_bias(position.y);
        let fx = angle.sin() * strength * c.lateral_gain * bias.x;
        let fy = -angle.cos().abs() * strength * c.vertical_gain * bias.y;

        c.clamp.apply(Vec2::new(fx, fy))
    }
}
