//! Fixed-Point math and lookup tables used internally by the engine.
//!
//! All of the tables here are generated at compile time by `const fn`s so the
//! tick path only ever performs lookups and linear interpolation.

pub use fixed::types::*;

/// A unsigned 16 bit fixed point number representing a note/pitch, with 7
/// integral bits and 9 fractional.  The integral bits correspond to the MIDI
/// note numbers, so this is the "linear frequency" of a voice.
pub type Note = U7F9;
/// A signed variant of the above, used for pitch offsets (pitch bend, detune,
/// fine tune).
pub type SignedNote = I7F9;
/// A signed 16 bit fixed point number in the interval `[-1, 1)`.
pub type IScalar = I1F15;
/// A unsigned 16 bit fixed point number in the interval `[0, 1)`.
pub type Scalar = U0F16;

/// Clock of a PAL machine, which is the reference tuning of the chip
const SID_CLOCK_HZ: f64 = 985248.0;
/// 2^(1/12)
const SEMITONE: f64 = 1.0594630943592953;

// The functions below are helpers because the ones in std are not const
// evaluable on stable.

// Calculate x!
const fn factorial(mut x: u64) -> u64 {
    let mut ret = 1;
    while x > 1 {
        ret *= x;
        x -= 1;
    }
    ret
}

// Calculate x^n
const fn float_powi(x: f32, mut n: u64) -> f32 {
    let mut ret = 1f32;
    while n > 0 {
        ret *= x;
        n -= 1;
    }
    ret
}

// Absolute value
const fn f_abs(x: f32) -> f32 {
    if x < 0f32 {
        -x
    } else {
        x
    }
}

/// Calculate sin(x*pi)
pub fn sin_pi(x: IScalar) -> IScalar {
    const fn calc(theta: IScalar) -> IScalar {
        const DELTA: f32 = 1f32 / (1 << 17) as f32;
        const CONV_FACTOR: f32 = (1u16 << 15) as f32;
        let theta_float = core::f32::consts::PI * (theta.to_bits() as f32) / CONV_FACTOR;
        let mut n = 1u64;
        let mut term = theta_float;
        let mut acc = theta_float;
        while f_abs(term) > DELTA {
            let sign = if n % 2 != 0 { -1f32 } else { 1f32 };
            let exp = 2 * n + 1;
            term = sign * float_powi(theta_float, exp) / factorial(exp) as f32;
            acc += term;
            n += 1;
        }
        let scaled = acc * CONV_FACTOR;
        if scaled >= i16::MAX as f32 {
            IScalar::MAX
        } else if scaled <= i16::MIN as f32 {
            IScalar::MIN
        } else {
            IScalar::from_bits(scaled as i16)
        }
    }
    const fn generate() -> [IScalar; 257] {
        let mut table = [IScalar::ZERO; 257];
        let mut i = i8::MIN as isize;
        while i <= i8::MAX as isize {
            let value = IScalar::from_bits((i as i16) << 8);
            table[(i - (i8::MIN as isize)) as usize] = calc(value);
            i += 1;
        }
        // sin(pi) wraps back around to zero
        table[256] = IScalar::ZERO;
        table
    }
    const LOOKUP_TABLE: [IScalar; 257] = generate();
    let x_bits = (x.to_bits() as i32).wrapping_add(1 << 15) as u16;
    let idx = (x_bits >> 8) as usize;
    let frac = Scalar::from_bits((x_bits & 0xFF) << 8);
    LOOKUP_TABLE[idx]
        + IScalar::from_num((LOOKUP_TABLE[idx + 1] - LOOKUP_TABLE[idx]).wide_mul_unsigned(frac))
}

/// Chip frequency register values for MIDI notes 0..=128 (the extra entry
/// allows interpolation above note 127)
const SID_FREQ_TABLE: [u16; 129] = {
    const fn generate() -> [u16; 129] {
        let mut table = [0u16; 129];
        let mut note = 0usize;
        while note < 129 {
            let mut freq = 440f64;
            let mut n = note as i32 - 69;
            while n > 0 {
                freq *= SEMITONE;
                n -= 1;
            }
            while n < 0 {
                freq /= SEMITONE;
                n += 1;
            }
            let reg = freq * 16777216f64 / SID_CLOCK_HZ;
            table[note] = if reg >= 65535f64 { 0xFFFF } else { reg as u16 };
            note += 1;
        }
        table
    }
    generate()
};

/// Convert a linear frequency into the chip's native 16 bit frequency register
/// value, interpolating between semitones.  Notes above the chip's range
/// saturate at the maximum register value.
pub fn note_to_sid_frequency(note: Note) -> u16 {
    let idx = note.int().to_num::<usize>();
    let frac = (note.frac().to_bits() & 0x1FF) as u32;
    let lo = SID_FREQ_TABLE[idx] as u32;
    let hi = SID_FREQ_TABLE[idx + 1] as u32;
    (lo + (((hi - lo) * frac) >> 9)) as u16
}

// 2^(r/20), approximated piecewise linearly between octaves
const fn pow2_approx(r: u32) -> u32 {
    ((1u32 << (r / 20)) * (20 + r % 20)) / 20
}

/// Number of ticks (at an update speed factor of 1) a full scale envelope
/// segment takes for a given rate parameter.  Rate 0 is immediate.
pub const fn env_rate_ticks(rate: u8) -> u32 {
    if rate == 0 {
        0
    } else {
        rate as u32 + pow2_approx(rate as u32) - 1
    }
}

/// Per-tick increments of a 16 bit envelope counter for each rate parameter
pub const ENV_RATE_TABLE: [u16; 256] = {
    const fn generate() -> [u16; 256] {
        let mut table = [0u16; 256];
        let mut i = 0usize;
        while i < 256 {
            let ticks = env_rate_ticks(i as u8);
            table[i] = if ticks == 0 {
                0xFFFF
            } else {
                ((0xFFFF + ticks - 1) / ticks) as u16
            };
            i += 1;
        }
        table
    }
    generate()
};

/// Per-tick phase increments of a 16 bit LFO phase accumulator for each rate
/// parameter (about 0.008Hz to 50Hz at 500 ticks per second)
pub const LFO_RATE_TABLE: [u16; 256] = {
    const fn generate() -> [u16; 256] {
        let mut table = [0u16; 256];
        let mut i = 0u32;
        while i < 256 {
            table[i as usize] = (1 + i * i / 10) as u16;
            i += 1;
        }
        table
    }
    generate()
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a440_frequency() {
        // 440Hz * 2^24 / 985248Hz
        let reg = note_to_sid_frequency(Note::from_num(69));
        assert!((7491..=7493).contains(&reg));
    }

    #[test]
    fn frequency_is_monotonic() {
        let mut last = 0u16;
        for bits in (0u32..=0xFFFF).step_by(64) {
            let reg = note_to_sid_frequency(Note::from_bits(bits as u16));
            assert!(reg >= last);
            last = reg;
        }
        assert_eq!(note_to_sid_frequency(Note::MAX), 0xFFFF);
    }

    #[test]
    fn octave_doubles() {
        let c3 = note_to_sid_frequency(Note::from_num(48)) as i32;
        let c4 = note_to_sid_frequency(Note::from_num(60)) as i32;
        assert!((c4 - 2 * c3).abs() <= 2);
    }

    #[test]
    fn env_rates() {
        assert_eq!(ENV_RATE_TABLE[0], 0xFFFF);
        assert_eq!(env_rate_ticks(5), 5);
        assert_eq!(env_rate_ticks(10), 10);
        for i in 1..255 {
            assert!(ENV_RATE_TABLE[i] >= ENV_RATE_TABLE[i + 1]);
        }
    }

    #[test]
    fn sine_quadrants() {
        assert!(sin_pi(IScalar::ZERO).abs() < IScalar::from_num(0.001));
        assert!(sin_pi(IScalar::from_num(0.5)) > IScalar::from_num(0.99));
        assert!(sin_pi(IScalar::from_num(-0.5)) < IScalar::from_num(-0.99));
    }
}
