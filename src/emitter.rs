//! Burners that seed the CPU particle pool.
//!
//! Emission is rate based. An [`EmissionAccumulator`] turns elapsed time
//! into whole emission events, carrying the fractional remainder between
//! frames. Each event picks one burner and produces a small cluster:
//!
//! | Kind | Count per event | Offset from burner |
//! |------|-----------------|--------------------|
//! | flame | `cluster_min..=cluster_max` | `±flame_jitter` |
//! | ember | 0 or 1 (`ember_chance`) | `±ember_jitter` |
//! | core | 0 or 1 (`core_chance`) | `±core_jitter` |
//!
//! Burner origins are laid out from the viewport and must be rebuilt with
//! [`EmitterSet::layout`] whenever it changes size.
//!
//! # Example
//!
//! ```ignore
//! let mut burners = EmitterSet::new(config.emission.clone(), viewport, &mut rng);
//! let mut spawns = Vec::new();
//! let events = burners.emit(frame.dt_ms, &mut rng, &mut spawns);
//! for spawn in spawns.drain(..) {
//!     pool.spawn(Particle::spawn(spawn.position, spawn.kind, kinds.get(spawn.kind), &physics, &mut rng));
//! }
//! ```

use glam::Vec2;
use rand::Rng;

use crate::config::{EmissionConfig, EmitterSelection};
use crate::particle::ParticleKind;
use crate::viewport::Viewport;

/// A single burner origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emitter {
    pub origin: Vec2,
}

/// A particle the driver should create.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnRequest {
    pub position: Vec2,
    pub kind: ParticleKind,
}

/// Converts a rate and elapsed time into whole events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmissionAccumulator {
    pending: f32,
}

impl EmissionAccumulator {
    /// Add `rate_per_sec * dt_ms / 1000` and return the whole events due.
    pub fn advance(&mut self, rate_per_sec: f32, dt_ms: f32) -> u32 {
        let added = rate_per_sec * dt_ms / 1000.0;
        if added.is_finite() && added > 0.0 {
            self.pending += added;
        }
        let whole = self.pending.floor();
        self.pending -= whole;
        whole as u32
    }

    /// Fraction of an event carried into the next frame.
    pub fn pending(&self) -> f32 {
        self.pending
    }

    pub fn reset(&mut self) {
        self.pending = 0.0;
    }
}

#[inline]
fn jitter<R: Rng + ?Sized>(rng: &mut R, extent: [f32; 2]) -> Vec2 {
    Vec2::new(symmetric(rng, extent[0]), symmetric(rng, extent[1]))
}

#[inline]
fn symmetric<R: Rng + ?Sized>(rng: &mut R, half: f32) -> f32 {
    let half = half.abs();
    if half.is_finite() && half > 0.0 {
        half * (rng.gen::<f32>() * 2.0 - 1.0)
    } else {
        0.0
    }
}

/// The burners plus their emission state.
#[derive(Clone, Debug)]
pub struct EmitterSet {
    config: EmissionConfig,
    emitters: Vec<Emitter>,
    accumulator: EmissionAccumulator,
    next: usize,
}

impl EmitterSet {
    pub fn new<R: Rng + ?Sized>(config: EmissionConfig, viewport: Viewport, rng: &mut R) -> Self {
        let mut set = Self {
            config,
            emitters: Vec::new(),
            accumulator: EmissionAccumulator::default(),
            next: 0,
        };
        set.layout(viewport, rng);
        set
    }

    /// Rebuild burner origins for `viewport`.
    ///
    /// Burners are centered on the viewport, `emitter_spacing * width`
    /// apart, at `baseline_offset` above the bottom edge, each jittered by
    /// `origin_jitter`.
    pub fn layout<R: Rng + ?Sized>(&mut self, viewport: Viewport, rng: &mut R) {
        let count = self.config.emitter_count.max(1);
        let spacing = self.config.emitter_spacing * viewport.width;
        let middle = (count - 1) as f32 * 0.5;
        let baseline = viewport.baseline(self.config.baseline_offset);

        self.emitters.clear();
        for k in 0..count {
            let center = Vec2::new(viewport.center_x() + (k as f32 - middle) * spacing, baseline);
            let origin = viewport.clamp(center + jitter(rng, self.config.origin_jitter));
            self.emitters.push(Emitter { origin });
        }
        self.next = 0;
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    pub fn accumulator(&self) -> &EmissionAccumulator {
        &self.accumulator
    }

    /// Run the emission for `dt_ms` elapsed, appending particles to `out`.
    ///
    /// Returns the number of emission events.
    pub fn emit<R: Rng + ?Sized>(
        &mut self,
        dt_ms: f32,
        rng: &mut R,
        out: &mut Vec<SpawnRequest>,
    ) -> u32 {
        let events = self.accumulator.advance(self.config.rate_per_sec, dt_ms);
        for _ in 0..events {
            self.emit_event(rng, out);
        }
        events
    }

    /// Emit one cluster from the next selected burner.
    pub fn emit_event<R: Rng + ?Sized>(&mut self, rng: &mut R, out: &mut Vec<SpawnRequest>) {
        let Some(origin) = self.select(rng) else {
            return;
        };
        let c = &self.config;

        let cluster = if c.cluster_max > c.cluster_min {
            rng.gen_range(c.cluster_min..=c.cluster_max)
        } else {
            c.cluster_min
        };
        for _ in 0..cluster {
            out.push(SpawnRequest {
                position: origin + jitter(rng, c.flame_jitter),
                kind: ParticleKind::Flame,
            });
        }

        if rng.gen::<f32>() < c.ember_chance {
            out.push(SpawnRequest {
                position: origin + jitter(rng, c.ember_jitter),
                kind: ParticleKind::Ember,
            });
        }
        if rng.gen::<f32>() < c.core_chance {
            out.push(SpawnRequest {
                position: origin + jitter(rng, c.core_jitter),
                kind: ParticleKind::Core,
            });
        }
    }

    fn select<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Vec2> {
        if self.emitters.is_empty() {
            return None;
        }
        let index = match self.config.selection {
            EmitterSelection::Random => rng.gen_range(0..self.emitters.len()),
            EmitterSelection::RoundRobin => {
                let i = self.next % self.emitters.len();
                self.next = i + 1;
                i
            }
        };
        Some(self.emitters[index].origin)
    }
}
