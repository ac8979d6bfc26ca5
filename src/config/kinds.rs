//! Per-kind tuning tables.

use serde::{Deserialize, Serialize};

use super::Span;
use crate::error::ConfigError;
use crate::particle::ParticleKind;

/// Constants selected by a particle's kind at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KindTuning {
    /// Buoyancy and flutter coefficient. Hotter particles rise faster.
    pub heat: f32,
    /// Initial horizontal velocity, pixels per frame.
    pub velocity_x: Span,
    /// Initial vertical velocity, pixels per frame (negative is up).
    pub velocity_y: Span,
    pub lifespan_ms: Span,
    pub base_size: Span,
}

impl KindTuning {
    pub fn flame() -> Self {
        Self {
            heat: 0.7,
            velocity_x: Span::new(-0.18, 0.18),
            velocity_y: Span::new(-0.1, -0.36),
            lifespan_ms: Span::new(1400.0, 2400.0),
            base_size: Span::new(1.8, 4.2),
        }
    }

    pub fn ember() -> Self {
        Self {
            heat: 0.45,
            velocity_x: Span::new(-0.06, 0.06),
            velocity_y: Span::new(-0.2, -0.08),
            lifespan_ms: Span::new(1800.0, 3600.0),
            base_size: Span::new(0.6, 1.4),
        }
    }

    pub fn core() -> Self {
        Self {
            heat: 1.0,
            velocity_x: Span::new(-0.12, 0.12),
            velocity_y: Span::new(-0.12, -0.28),
            lifespan_ms: Span::new(2000.0, 3200.0),
            base_size: Span::new(6.0, 14.0),
        }
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !self.heat.is_finite() || self.heat < 0.0 {
            return Err(ConfigError::invalid(field, "heat must be non-negative"));
        }
        for span in [
            &self.velocity_x,
            &self.velocity_y,
            &self.lifespan_ms,
            &self.base_size,
        ] {
            if !span.is_finite() {
                return Err(ConfigError::invalid(field, "ranges must be finite"));
            }
        }
        if self.lifespan_ms.ordered().0 <= 0.0 {
            return Err(ConfigError::invalid(field, "lifespan must be positive"));
        }
        if self.base_size.ordered().0 < 0.0 {
            return Err(ConfigError::invalid(field, "base size must be non-negative"));
        }
        Ok(())
    }
}

/// One [`KindTuning`] per [`ParticleKind`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindTable {
    pub flame: KindTuning,
    pub ember: KindTuning,
    pub core: KindTuning,
}

impl Default for KindTable {
    fn default() -> Self {
        Self {
            flame: KindTuning::flame(),
            ember: KindTuning::ember(),
            core: KindTuning::core(),
        }
    }
}

impl KindTable {
    #[inline]
    pub fn get(&self, kind: ParticleKind) -> &KindTuning {
        match kind {
            ParticleKind::Flame => &self.flame,
            ParticleKind::Ember => &self.ember,
            ParticleKind::Core => &self.core,
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.flame.validate("kinds.flame")?;
        self.ember.validate("kinds.ember")?;
        self.core.validate("kinds.core")
    }
}
