//! Deterministic random sources for damage rolls.
//!
//! The damage calculator never touches global randomness. Callers hand it a
//! [`RandomSource`], which keeps every roll reproducible: a seeded
//! [`PcgRng`] in production, a scripted [`FixedRolls`] in tests.

/// Source of random draws for a single attack resolution.
pub trait RandomSource {
    /// Generate the next random u32 value.
    fn next_u32(&mut self) -> u32;

    /// Roll a d100 (1-100 inclusive).
    fn roll_d100(&mut self) -> u32 {
        (self.next_u32() % 100) + 1
    }
}

/// PCG random number generator (PCG-XSH-RR, 64-bit state, 32-bit output).
///
/// Same seed, same sequence. Cheap enough to construct one per attack.
#[derive(Clone, Copy, Debug)]
pub struct PcgRng {
    state: u64,
}

impl PcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub const fn from_seed(seed: u64) -> Self {
        Self { state: seed }
    }

    /// `state' = state * multiplier + increment (mod 2^64)`
    #[inline]
    fn step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    /// XSH-RR output permutation.
    #[inline]
    fn output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

impl RandomSource for PcgRng {
    fn next_u32(&mut self) -> u32 {
        self.state = Self::step(self.state);
        Self::output(self.state)
    }
}

/// Scripted random source that replays a fixed list of raw values.
///
/// Cycles when exhausted. An empty script always yields `u32::MAX`.
#[derive(Clone, Debug, Default)]
pub struct FixedRolls {
    values: Vec<u32>,
    cursor: usize,
}

impl FixedRolls {
    pub fn new(values: impl Into<Vec<u32>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }

    /// A source whose first `roll_d100` returns `roll` (1-100).
    pub fn d100(roll: u32) -> Self {
        Self::new(vec![roll.clamp(1, 100) - 1])
    }

    /// Forces a critical hit under any positive crit chance.
    pub fn critical() -> Self {
        Self::d100(1)
    }

    /// Forces a regular hit under any crit chance below 100%.
    pub fn regular() -> Self {
        Self::d100(100)
    }
}

impl RandomSource for FixedRolls {
    fn next_u32(&mut self) -> u32 {
        if self.values.is_empty() {
            return u32::MAX;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}

/// Compute a deterministic seed for one attack.
///
/// Mixes the raid's base seed with the attack nonce and a per-caller salt
/// (SplitMix64-style avalanche).
pub fn compute_seed(base_seed: u64, nonce: u64, salt: u64) -> u64 {
    let mut hash = base_seed;
    hash ^= nonce.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= salt.wrapping_mul(0x517cc1b727220a95);

    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;

    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcg_is_deterministic_per_seed() {
        let mut a = PcgRng::from_seed(42);
        let mut b = PcgRng::from_seed(42);
        let seq_a: Vec<u32> = (0..8).map(|_| a.next_u32()).collect();
        let seq_b: Vec<u32> = (0..8).map(|_| b.next_u32()).collect();
        assert_eq!(seq_a, seq_b);

        let mut c = PcgRng::from_seed(43);
        let seq_c: Vec<u32> = (0..8).map(|_| c.next_u32()).collect();
        assert_ne!(seq_a, seq_c);
    }

    #[test]
    fn d100_stays_in_range() {
        let mut rng = PcgRng::from_seed(7);
        for _ in 0..1_000 {
            let roll = rng.roll_d100();
            assert!((1..=100).contains(&roll));
        }
    }

    #[test]
    fn fixed_rolls_replay_script() {
        let mut rolls = FixedRolls::d100(37);
        assert_eq!(rolls.roll_d100(), 37);
        assert_eq!(rolls.roll_d100(), 37);

        assert_eq!(FixedRolls::critical().roll_d100(), 1);
        assert_eq!(FixedRolls::regular().roll_d100(), 100);
    }

    #[test]
    fn seed_depends_on_every_input() {
        let seed = compute_seed(1, 2, 3);
        assert_ne!(seed, compute_seed(0, 2, 3));
        assert_ne!(seed, compute_seed(1, 0, 3));
        assert_ne!(seed, compute_seed(1, 2, 0));
    }
}
