// Seeded pseudo-random number generator for the accompaniment search.
//
// xoshiro256++ (Blackman & Vigna, 2019) with its state expanded from a single
// `u64` seed by SplitMix64. Every random decision the evolutionary search
// makes (random chords, mutation coin flips, crossover cut points) draws from
// an `EvoRng` that is threaded explicitly through the call chain, so a run is
// fully reproducible from its seed.
//
// Integer sampling uses rejection sampling rather than a float multiply so
// results do not depend on floating-point rounding. The only float path is
// `next_f64`, which is exact (53 bits straight into the mantissa).

use serde::{Deserialize, Serialize};

/// xoshiro256++ generator. Cheap to clone; a clone continues the same stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvoRng {
    s: [u64; 4],
}

impl EvoRng {
    /// Seed a generator. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let s = [
            splitmix64(&mut sm),
            splitmix64(&mut sm),
            splitmix64(&mut sm),
            splitmix64(&mut sm),
        ];
        Self { s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = &mut self.s;
        let result = s0.wrapping_add(*s3).rotate_left(23).wrapping_add(*s0);

        let t = *s1 << 17;
        *s2 ^= *s0;
        *s3 ^= *s1;
        *s1 ^= *s2;
        *s0 ^= *s3;
        *s2 ^= t;
        *s3 = s3.rotate_left(45);

        result
    }

    /// Uniform `f64` in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high)`. Panics if the range is empty.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: empty range {low}..{high}");
        let span = high - low;
        if span.is_power_of_two() {
            return low + (self.next_u64() & (span - 1));
        }
        // Reject the short tail of the u64 space that would bias `% span`.
        let threshold = span.wrapping_neg() % span;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + r % span;
            }
        }
    }

    /// Uniform `usize` in `[low, high)`. Panics if the range is empty.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Uniform `usize` in `[low, high]`. Panics if `low > high`.
    pub fn range_usize_inclusive(&mut self, low: usize, high: usize) -> usize {
        assert!(low <= high, "range_usize_inclusive: {low} > {high}");
        self.range_u64(low as u64, high as u64 + 1) as usize
    }

    /// `true` with probability `p`. `p <= 0` never fires, `p >= 1` always does.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// A uniformly chosen element, or `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.range_usize(0, items.len());
        items.get(idx)
    }
}

/// SplitMix64 step, used only to expand the seed.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = EvoRng::new(7);
        let mut b = EvoRng::new(7);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = EvoRng::new(7);
        let mut b = EvoRng::new(8);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn clone_continues_stream() {
        let mut a = EvoRng::new(99);
        for _ in 0..17 {
            a.next_u64();
        }
        let mut b = a.clone();
        assert_eq!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn f64_in_unit_interval() {
        let mut rng = EvoRng::new(2024);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "next_f64 out of range: {v}");
        }
    }

    #[test]
    fn range_usize_stays_in_bounds() {
        let mut rng = EvoRng::new(3);
        for _ in 0..10_000 {
            let v = rng.range_usize(4, 13);
            assert!((4..13).contains(&v), "range_usize out of range: {v}");
        }
    }

    #[test]
    fn range_usize_inclusive_reaches_both_ends() {
        let mut rng = EvoRng::new(11);
        let mut seen = [false; 4];
        for _ in 0..10_000 {
            let v = rng.range_usize_inclusive(0, 3);
            assert!(v <= 3);
            seen[v] = true;
        }
        assert!(seen.iter().all(|&s| s), "every value in 0..=3 should appear");
    }

    #[test]
    fn inclusive_range_of_one_value() {
        let mut rng = EvoRng::new(5);
        for _ in 0..100 {
            assert_eq!(rng.range_usize_inclusive(0, 0), 0);
        }
    }

    #[test]
    fn random_bool_rate_is_close_to_p() {
        let mut rng = EvoRng::new(42);
        let n = 20_000;
        let hits = (0..n).filter(|_| rng.random_bool(0.1)).count();
        let rate = hits as f64 / n as f64;
        assert!((0.08..0.12).contains(&rate), "expected ~10%, got {rate}");
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = EvoRng::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn choose_covers_every_item() {
        let mut rng = EvoRng::new(1);
        let items = [45u8, 47, 48];
        let mut seen = [false; 3];
        for _ in 0..1000 {
            let v = *rng.choose(&items).unwrap();
            let idx = items.iter().position(|&i| i == v).unwrap();
            seen[idx] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn choose_from_empty_is_none() {
        let mut rng = EvoRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
    }

    #[test]
    fn serde_roundtrip_preserves_state() {
        let mut rng = EvoRng::new(42);
        for _ in 0..50 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: EvoRng = serde_json::from_str(&json).unwrap();
        for _ in 0..50 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
