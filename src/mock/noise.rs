//! Gaussian noise with deterministic seeding

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Noise source for synthetic sensor data.
///
/// Seed 0 draws from entropy; any other seed reproduces the same stream.
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Gaussian noise with the given standard deviation.
    #[inline]
    pub fn gaussian(&mut self, stddev: f64) -> f64 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * stddev
    }

    /// Uniform random in [0, 1).
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        Uniform::new(0.0f64, 1.0).sample(&mut self.rng)
    }

    /// Returns true with the given probability.
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        self.uniform() < probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_seed() {
        let mut a = NoiseGenerator::new(42);
        let mut b = NoiseGenerator::new(42);
        for _ in 0..100 {
            assert_eq!(a.gaussian(1.0), b.gaussian(1.0));
        }
    }

    #[test]
    fn zero_stddev_is_silent() {
        let mut noise = NoiseGenerator::new(42);
        for _ in 0..10 {
            assert_eq!(noise.gaussian(0.0), 0.0);
        }
    }

    #[test]
    fn chance_tracks_probability() {
        let mut noise = NoiseGenerator::new(42);
        let trials = 10_000;
        let hits = (0..trials).filter(|_| noise.chance(0.3)).count();
        let ratio = hits as f64 / trials as f64;
        assert!((ratio - 0.3).abs() < 0.05);
    }
}
