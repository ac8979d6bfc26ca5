//! Coherent noise shared by the turbulence field and particle flutter.

use ::noise::{NoiseFn, Perlin, Seedable};
use std::fmt;

/// Seeded multi-octave Perlin noise normalized to `[0, 1]`.
///
/// Nearby inputs give nearby outputs, so sampling along a slowly moving
/// time axis produces smooth gusts rather than jitter. Non-finite inputs
/// sample as the neutral value `0.5`.
#[derive(Clone)]
pub struct CoherentNoise {
    perlin: Perlin,
    octaves: u32,
    falloff: f64,
}

impl CoherentNoise {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            octaves: 4,
            falloff: 0.5,
        }
    }

    /// Number of summed octaves (at least one).
    pub fn with_octaves(mut self, octaves: u32) -> Self {
        self.octaves = octaves.max(1);
        self
    }

    pub fn sample2(&self, x: f32, y: f32) -> f32 {
        if !(x.is_finite() && y.is_finite()) {
            return 0.5;
        }
        self.fbm(|freq| self.perlin.get([x as f64 * freq, y as f64 * freq]))
    }

    pub fn sample3(&self, x: f32, y: f32, z: f32) -> f32 {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return 0.5;
        }
        self.fbm(|freq| {
            self.perlin
                .get([x as f64 * freq, y as f64 * freq, z as f64 * freq])
        })
    }

    fn fbm(&self, octave: impl Fn(f64) -> f64) -> f32 {
        let mut sum = 0.0;
        let mut total = 0.0;
        let mut amplitude = 0.5;
        let mut freq = 1.0;
        for _ in 0..self.octaves {
            sum += amplitude * (octave(freq) * 0.5 + 0.5);
            total += amplitude;
            amplitude *= self.falloff;
            freq *= 2.0;
        }
        ((sum / total) as f32).clamp(0.0, 1.0)
    }
}

impl fmt::Debug for CoherentNoise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoherentNoise")
            .field("seed", &self.perlin.seed())
            .field("octaves", &self.octaves)
            .finish()
    }
}

impl Default for CoherentNoise {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range() {
        let noise = CoherentNoise::new(3);
        for i in 0..500 {
            let t = i as f32 * 0.173;
            let v = noise.sample3(t, t * 0.5, -t);
            assert!((0.0..=1.0).contains(&v));
            let v = noise.sample2(t * 3.1, 1e6);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_continuity() {
        let noise = CoherentNoise::new(11);
        let a = noise.sample2(1.2345, 0.5);
        let b = noise.sample2(1.2346, 0.5);
        assert!((a - b).abs() < 0.01);
    }

    #[test]
    fn test_same_seed_same_field() {
        let a = CoherentNoise::new(9);
        let b = CoherentNoise::new(9);
        assert_eq!(a.sample3(0.3, 0.7, 1.1), b.sample3(0.3, 0.7, 1.1));
    }

    #[test]
    fn test_non_finite_input() {
        let noise = CoherentNoise::default();
        assert_eq!(noise.sample2(f32::NAN, 0.0), 0.5);
        assert_eq!(noise.sample3(0.0, f32::INFINITY, 0.0), 0.5);
    }

    #[test]
    fn test_octave_count() {
        let one = CoherentNoise::new(5).with_octaves(1);
        let none = CoherentNoise::new(5).with_octaves(0);
        let four = CoherentNoise::new(5);
        assert_eq!(one.sample2(0.37, 1.91), none.sample2(0.37, 1.91));
        let v = one.sample3(0.37, 1.91, 2.2);
        assert!((0.0..=1.0).contains(&v));
        assert_ne!(one.sample2(0.37, 1.91), four.sample2(0.37, 1.91));
    }
}
