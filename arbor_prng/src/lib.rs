// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Hand-rolled so that a given seed yields the same armature on every platform.
//
// This crate is the only randomness source for `arbor_armature`. Grammar
// expansion draws weighted alternatives and optional-rule inclusion from an
// `ArmatureRng` that the caller passes in explicitly; nothing in the generator
// reaches for ambient or OS entropy. Parallel candidate expansion derives one
// child stream per candidate with `fork()`, so replaying a seed replays every
// candidate exactly.
//
// **Critical constraint: determinism.** Every method on `ArmatureRng` must
// produce identical output given the same prior state. The core generator
// uses integer arithmetic only; float helpers are derived from its output
// with fixed-width mantissa fills.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG used for all stochastic grammar decisions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArmatureRng {
    s: [u64; 4],
}

impl ArmatureRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Derive an independent child stream.
    ///
    /// Advances this generator by one step and seeds the child from that
    /// output, so forking N children in order is itself deterministic.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64())
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f32` in [0, 1), from the upper 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform `f64` in [0, 1), from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform value in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_f32(&mut self, low: f32, high: f32) -> f32 {
        assert!(low < high, "range_f32: low must be less than high");
        low + self.next_f32() * (high - low)
    }

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false and `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick an index with probability proportional to its weight.
    ///
    /// Weights are relative and need not sum to 1. Non-positive and
    /// non-finite weights are never selected. Returns `None` when no weight
    /// is selectable.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let usable = |w: f64| w.is_finite() && w > 0.0;
        let total: f64 = weights.iter().copied().filter(|&w| usable(w)).sum();
        if !(total.is_finite() && total > 0.0) {
            return None;
        }

        let mut remaining = self.next_f64() * total;
        let mut last_usable = None;
        for (i, &w) in weights.iter().enumerate() {
            if !usable(w) {
                continue;
            }
            if remaining < w {
                return Some(i);
            }
            remaining -= w;
            last_usable = Some(i);
        }
        // Accumulated rounding can leave a sliver past the final bucket.
        last_usable
    }
}

/// SplitMix64, used only to expand a `u64` seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
