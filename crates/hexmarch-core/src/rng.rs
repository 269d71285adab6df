use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seedable randomness for combat effects and AI scoring, suitable for
/// reproducing decisions in tests and replays.
///
/// Every roll the engine makes goes through this wrapper; nothing else in
/// the crate touches a thread-local RNG.
#[derive(Clone, Debug)]
pub struct CombatRng {
    inner: ChaCha8Rng,
}

impl CombatRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `[lo, hi]`, both inclusive.
    pub fn roll_range(&mut self, lo: i32, hi: i32) -> i32 {
        self.inner.gen_range(lo..=hi)
    }

    /// Uniform float in `[lo, hi)`, used as multiplicative score noise.
    pub fn noise(&mut self, lo: f32, hi: f32) -> f32 {
        self.inner.gen_range(lo..hi)
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        self.inner.gen::<f32>() < p
    }
}
