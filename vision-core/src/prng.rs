//! Small deterministic PRNG for exercise randomness.
//!
//! Not cryptographically secure. Used for target placement, optotype
//! orientation and saccade jumps, where reproducibility in tests matters
//! more than quality.

use uuid::Uuid;

const ZERO_STATE_REPLACEMENT: u64 = 0x9E37_79B9_7F4A_7C15;

/// xorshift64* generator.
#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    /// Create a generator from a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            ZERO_STATE_REPLACEMENT
        } else {
            seed
        };
        Self { state }
    }

    /// Create a generator seeded from a random UUID.
    ///
    /// With the `wasm` feature the UUID draws on `crypto.getRandomValues()`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_entropy() -> Self {
        let bits = Uuid::new_v4().as_u128();
        let hi = (bits >> 64) as u64;
        let lo = bits as u64;
        Self::new(hi ^ lo.rotate_left(17))
    }

    /// Create a generator from an optional seed, falling back to entropy.
    #[must_use]
    pub fn seeded_or_random(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::new)
    }

    /// Derive an independent generator, advancing this one.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64())
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform float in `[0, 1)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn next_f64(&mut self) -> f64 {
        // 53 high bits give every representable step in [0, 1).
        (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
    }

    /// Uniform float in `[low, high)`. Returns `low` for an empty range.
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        low + (high - low) * self.next_f64()
    }

    /// Uniform index in `[0, len)`. Returns 0 when `len` is 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn gen_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.next_u64() % len as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Prng::new(42);
        let mut b = Prng::new(42);
        for _ in 0..100 {
            assert_eq!(a.gen_index(1000), b.gen_index(1000));
        }
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = Prng::new(0);
        let values: Vec<_> = (0..10).map(|_| rng.gen_index(1_000_000)).collect();
        assert!(values.iter().any(|&v| v != values[0]));
    }

    #[test]
    fn test_ranges_are_respected() {
        let mut rng = Prng::new(7);
        for _ in 0..1000 {
            let f = rng.gen_range_f64(10.0, 20.0);
            assert!((10.0..20.0).contains(&f));
            assert!(rng.gen_index(5) < 5);
        }
        assert_eq!(rng.gen_index(0), 0);
        assert!((rng.gen_range_f64(3.0, 3.0) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fork_diverges() {
        let mut parent = Prng::new(9);
        let mut child = parent.fork();
        assert_ne!(parent.next_u64(), child.next_u64());
    }
}
