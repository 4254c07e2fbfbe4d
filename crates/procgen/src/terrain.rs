//! Heightfield sampling using noise functions.
//!
//! **Seed-based determinism:** All noise is derived from `config.seed` so that the same seed
//! always produces the same height at every world sample coordinate, regardless of which ring
//! slot a chunk lands in or the order chunks are streamed.

use noise::{NoiseFn, Perlin, Simplex};

/// Derive a deterministic u32 noise seed from a world seed and an offset.
/// Same (seed, offset) always gives the same result so terrain is reproducible.
#[inline]
fn deterministic_noise_seed(seed: u64, offset: u64) -> u32 {
    ((seed.wrapping_add(offset))
        .wrapping_mul(0x9e3779b97f4a7c15_u64)
        .wrapping_add(offset.wrapping_mul(0x6c078965_u64))
        >> 32) as u32
}

/// Configuration for heightmap generation.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightmapConfig {
    /// Seed for noise generation.
    pub seed: u64,
    /// Noise frequency per sample (lower = smoother).
    pub frequency: f64,
    /// Number of octaves for fractal noise.
    pub octaves: u32,
    /// Lacunarity (frequency multiplier per octave).
    pub lacunarity: f64,
    /// Persistence (amplitude multiplier per octave).
    pub persistence: f64,
    /// Maximum height in world units. Samples are stored already scaled.
    pub height_scale: f32,
}

impl Default for HeightmapConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            frequency: 0.004,
            octaves: 5,
            lacunarity: 2.0,
            persistence: 0.5,
            height_scale: 120.0,
        }
    }
}

/// Noise-backed height function over integer world sample coordinates.
pub struct HeightField {
    perlin: Perlin,
    simplex: Simplex,
    config: HeightmapConfig,
}

impl std::fmt::Debug for HeightField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeightField").field("config", &self.config).finish()
    }
}

impl HeightField {
    pub fn new(config: HeightmapConfig) -> Self {
        Self {
            perlin: Perlin::new(deterministic_noise_seed(config.seed, 0)),
            simplex: Simplex::new(deterministic_noise_seed(config.seed, 1)),
            config,
        }
    }

    pub fn config(&self) -> &HeightmapConfig {
        &self.config
    }

    /// Height in world units at world sample coordinate (x, z).
    pub fn sample(&self, x: i64, z: i64) -> f32 {
        (self.fractal_noise(x as f64, z as f64) as f32) * self.config.height_scale
    }

    /// Fill `out` (row-major, `resolution` samples per row) with the block whose first sample
    /// sits at world sample coordinate `origin`.
    pub fn fill_block(&self, origin: (i64, i64), resolution: u32, out: &mut Vec<f32>) {
        let res = resolution as i64;
        out.clear();
        out.reserve((res * res) as usize);
        for j in 0..res {
            for i in 0..res {
                out.push(self.sample(origin.0 + i, origin.1 + j));
            }
        }
    }

    /// Fractal noise normalised to 0-1.
    fn fractal_noise(&self, x: f64, z: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.config.frequency;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            // Mix Perlin and Simplex for variety
            let perlin_sample = self.perlin.get([x * frequency, z * frequency]);
            let simplex_sample = self.simplex.get([x * frequency + 1000.0, z * frequency + 1000.0]);

            value += (perlin_sample * 0.7 + simplex_sample * 0.3) * amplitude;
            max_value += amplitude;

            amplitude *= self.config.persistence;
            frequency *= self.config.lacunarity;
        }

        if max_value == 0.0 {
            return 0.0;
        }
        ((value / max_value + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Same seed must produce identical samples (replayability).
    #[test]
    fn heightfield_deterministic_same_seed() {
        let config = HeightmapConfig { seed: 98765, ..Default::default() };
        let a = HeightField::new(config.clone());
        let b = HeightField::new(config);
        for (x, z) in [(0, 0), (17, -3), (-400, 912), (100_000, 5)] {
            assert_eq!(a.sample(x, z), b.sample(x, z), "sample ({}, {}) should match", x, z);
        }
    }

    /// Different seeds must produce different terrain.
    #[test]
    fn heightfield_different_seed_different_heights() {
        let a = HeightField::new(HeightmapConfig { seed: 11111, ..Default::default() });
        let b = HeightField::new(HeightmapConfig { seed: 22222, ..Default::default() });
        let differs = (0..64).any(|i| a.sample(i * 7, i * 13) != b.sample(i * 7, i * 13));
        assert!(differs, "different seeds should produce different heights");
    }

    #[test]
    fn samples_stay_within_height_scale() {
        let field = HeightField::new(HeightmapConfig { seed: 3, height_scale: 50.0, ..Default::default() });
        let mut block = Vec::new();
        field.fill_block((-32, -32), 64, &mut block);
        assert_eq!(block.len(), 64 * 64);
        assert!(block.iter().all(|&h| (0.0..=50.0).contains(&h)));
    }

    #[test]
    fn zero_octaves_is_flat() {
        let field = HeightField::new(HeightmapConfig { octaves: 0, ..Default::default() });
        assert_eq!(field.sample(10, 10), 0.0);
    }
}
