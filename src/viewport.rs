//! Viewport dimensions supplied by the windowing layer.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Width and height of the drawing surface, in pixels.
///
/// The y axis points down: `y = 0` is the top edge and `y = height` the
/// bottom, where the burners sit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: sanitize(width),
            height: sanitize(height),
        }
    }

    /// Horizontal center line.
    #[inline]
    pub fn center_x(&self) -> f32 {
        self.width * 0.5
    }

    /// The y coordinate `offset` pixels above the bottom edge.
    #[inline]
    pub fn baseline(&self, offset: f32) -> f32 {
        self.height - offset
    }

    /// Clamp a point into `[0, width] x [0, height]`.
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x.max(0.0).min(self.width), p.y.max(0.0).min(self.height))
    }

    pub fn contains(&self, p: Vec2) -> bool {
        (0.0..=self.width).contains(&p.x) && (0.0..=self.height).contains(&p.y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

fn sanitize(v: f32) -> f32 {
    if v.is_finite() {
        v.max(1.0)
    } else {
        1.0
    }
}
