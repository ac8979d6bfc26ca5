//! Frame timing.
//!
//! Every stepping function takes elapsed time as an explicit argument; the
//! [`Clock`] is the one place that produces it. Times are milliseconds.
//!
//! ```ignore
//! let mut clock = Clock::new();
//! loop {
//!     let frame = clock.tick();
//!     sim.frame(frame);
//! }
//! ```
//!
//! Headless runs and tests use [`Clock::fixed`], which advances simulated
//! time by a constant step regardless of the wall clock.

use std::time::Instant;

/// Timing for one simulation step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTime {
    /// Elapsed time since the previous frame, in milliseconds.
    pub dt_ms: f32,
    /// Monotonic time since the clock started, excluding pauses.
    pub now_ms: f32,
    /// Frames produced so far, including this one.
    pub frame: u64,
}

impl FrameTime {
    /// A frame at an explicit point in time.
    pub fn new(dt_ms: f32, now_ms: f32) -> Self {
        Self {
            dt_ms,
            now_ms,
            frame: 0,
        }
    }
}

#[derive(Debug)]
enum Source {
    Wall {
        last_frame: Instant,
    },
    Fixed {
        step_ms: f32,
    },
}

/// Produces [`FrameTime`]s from wall time or a fixed step.
#[derive(Debug)]
pub struct Clock {
    source: Source,
    now_ms: f32,
    frame: u64,
    paused: bool,
    time_scale: f32,
}

impl Clock {
    /// Clock driven by wall time.
    pub fn new() -> Self {
        Self::with_source(Source::Wall {
            last_frame: Instant::now(),
        })
    }

    /// Clock that advances by `step_ms` per tick.
    pub fn fixed(step_ms: f32) -> Self {
        Self::with_source(Source::Fixed {
            step_ms: step_ms.max(0.0),
        })
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            now_ms: 0.0,
            frame: 0,
            paused: false,
            time_scale: 1.0,
        }
    }

    /// Advance to the next frame.
    pub fn tick(&mut self) -> FrameTime {
        let dt_ms = match &mut self.source {
            Source::Wall { last_frame } => {
                let now = Instant::now();
                let raw = now.duration_since(*last_frame);
                *last_frame = now;
                if self.paused {
                    0.0
                } else {
                    raw.as_secs_f32() * 1000.0 * self.time_scale
                }
            }
            Source::Fixed { step_ms } => {
                if self.paused {
                    0.0
                } else {
                    *step_ms * self.time_scale
                }
            }
        };

        self.now_ms += dt_ms;
        self.frame += 1;

        FrameTime {
            dt_ms,
            now_ms: self.now_ms,
            frame: self.frame,
        }
    }

    #[inline]
    pub fn now_ms(&self) -> f32 {
        self.now_ms
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// While paused, ticks report `dt_ms = 0` and `now_ms` stays put.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Set time scale multiplier. Negative values clamp to zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Restart at time zero, keeping the source kind.
    pub fn reset(&mut self) {
        if let Source::Wall { last_frame } = &mut self.source {
            *last_frame = Instant::now();
        }
        self.now_ms = 0.0;
        self.frame = 0;
        self.paused = false;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
