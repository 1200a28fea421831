//! A small deterministic random source for the random LFO waveform and
//! arpeggiator.  Every engine owns its own generator, seeded explicitly, so
//! two runs with the same seed produce the same register stream.

use oorandom::Rand32;

/// Seeded pseudo-random generator
#[derive(Clone)]
pub struct RandomGenerator {
    rng: Rand32,
    seed: u64,
}

impl RandomGenerator {
    /// Create a new generator from a seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Rand32::new(seed),
            seed,
        }
    }
    /// Restart the sequence from the original seed
    pub fn reset(&mut self) {
        self.rng = Rand32::new(self.seed);
    }
    /// A uniformly distributed 16 bit value
    pub fn next_u16(&mut self) -> u16 {
        (self.rng.rand_u32() >> 16) as u16
    }
    /// A uniformly distributed signed 16 bit value
    pub fn next_i16(&mut self) -> i16 {
        self.next_u16() as i16
    }
    /// A value in `0..n`, or 0 if `n` is 0
    pub fn below(&mut self, n: u8) -> u8 {
        if n == 0 {
            0
        } else {
            self.rng.rand_range(0..n as u32) as u8
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RANDOM_SEED)
    }
}
