use super::*;
use crate::fixedmath::{sin_pi, IScalar, LFO_RATE_TABLE};
use crate::random::RandomGenerator;

/// Enum to represent the waveform of an LFO
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum LfoWave {
    /// Sine wave
    #[default]
    Sine,
    /// Triangle wave
    Triangle,
    /// Rising sawtooth
    SawUp,
    /// Falling sawtooth
    SawDown,
    /// Square wave
    Pulse,
    /// A new random value once per period
    Random,
    /// Sine wave, rectified into 0..=i16::MAX
    PosSine,
    /// Triangle wave, rectified into 0..=i16::MAX
    PosTriangle,
    /// Rising sawtooth, rectified into 0..=i16::MAX
    PosSaw,
    /// Square wave, rectified into 0..=i16::MAX
    PosPulse,
}

impl LfoWave {
    const ELEM: [LfoWave; 10] = [
        Self::Sine,
        Self::Triangle,
        Self::SawUp,
        Self::SawDown,
        Self::Pulse,
        Self::Random,
        Self::PosSine,
        Self::PosTriangle,
        Self::PosSaw,
        Self::PosPulse,
    ];
    /// Get a list of all of the waveforms
    pub const fn waveforms() -> &'static [LfoWave] {
        &Self::ELEM
    }
    /// Convert to a human-readable string
    pub const fn to_str(&self) -> &'static str {
        match self {
            Self::Sine => "Sine",
            Self::Triangle => "Triangle",
            Self::SawUp => "Saw Up",
            Self::SawDown => "Saw Down",
            Self::Pulse => "Pulse",
            Self::Random => "Random",
            Self::PosSine => "Sine (+)",
            Self::PosTriangle => "Triangle (+)",
            Self::PosSaw => "Saw (+)",
            Self::PosPulse => "Pulse (+)",
        }
    }
    /// Convert a u8 to an LfoWave, if in range
    pub const fn new_from_u8(value: u8) -> Option<Self> {
        if (value as usize) < Self::ELEM.len() {
            Some(Self::ELEM[value as usize])
        } else {
            None
        }
    }
    /// Evaluate the bipolar waveform at `phase`
    fn bipolar(&self, phase: u16, random: i16) -> i16 {
        match self {
            Self::Sine | Self::PosSine => sin_pi(IScalar::from_bits(phase as i16)).to_bits(),
            Self::Triangle | Self::PosTriangle => {
                let x = phase.wrapping_add(0x4000) as i32;
                let v = if x < 0x8000 { 2 * x } else { 0x1FFFF - 2 * x };
                crate::clamp_i16(v - 0x8000)
            }
            Self::SawUp | Self::PosSaw => (phase as i32 - 0x8000) as i16,
            Self::SawDown => (0x7FFF - phase as i32) as i16,
            Self::Pulse | Self::PosPulse => {
                if phase < 0x8000 {
                    i16::MAX
                } else {
                    i16::MIN
                }
            }
            Self::Random => random,
        }
    }
    /// True for the rectified variants
    pub const fn is_positive(&self) -> bool {
        matches!(
            self,
            Self::PosSine | Self::PosTriangle | Self::PosSaw | Self::PosPulse
        )
    }
    /// The value of this waveform at `phase`
    pub fn value(&self, phase: u16, random: i16) -> i16 {
        let v = self.bipolar(phase, random);
        if self.is_positive() {
            ((v as i32 + 0x8000) >> 1) as i16
        } else {
            v
        }
    }
}

impl TryFrom<u8> for LfoWave {
    type Error = &'static str;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new_from_u8(value).ok_or("Invalid LFO Waveform")
    }
}

/// LFO option flags packed the same way as the patch's mode byte
#[repr(transparent)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct LfoOptions {
    bits: u8,
}

impl LfoOptions {
    const ENABLE: u8 = 1 << 0;
    const CLOCK_SYNC: u8 = 1 << 1;
    const KEY_SYNC: u8 = 1 << 2;
    const ONESHOT: u8 = 1 << 3;
    const WAVE_SHIFT: u8 = 4;
    /// Build from the raw mode byte
    pub const fn from_bits(bits: u8) -> Self {
        Self { bits }
    }
    /// The raw mode byte
    pub const fn bits(&self) -> u8 {
        self.bits
    }
    /// An enabled LFO with the given waveform and no other options
    pub const fn with_wave(wave: LfoWave) -> Self {
        Self {
            bits: Self::ENABLE | ((wave as u8) << Self::WAVE_SHIFT),
        }
    }
    /// Is the LFO running?
    pub const fn enabled(&self) -> bool {
        self.bits & Self::ENABLE != 0
    }
    /// Does the phase follow the tempo clock?
    pub const fn clock_sync(&self) -> bool {
        self.bits & Self::CLOCK_SYNC != 0
    }
    /// Does a note on restart the LFO?
    pub const fn key_sync(&self) -> bool {
        self.bits & Self::KEY_SYNC != 0
    }
    /// Does the LFO stop after a single period?
    pub const fn oneshot(&self) -> bool {
        self.bits & Self::ONESHOT != 0
    }
    /// The waveform.  Unknown waveforms fall back to [LfoWave::Sine].
    pub const fn wave(&self) -> LfoWave {
        match LfoWave::new_from_u8(self.bits >> Self::WAVE_SHIFT) {
            Some(w) => w,
            None => LfoWave::Sine,
        }
    }
    /// Set the clock sync option
    pub const fn set_clock_sync(&mut self, sync: bool) {
        self.bits &= !Self::CLOCK_SYNC;
        self.bits |= if sync { Self::CLOCK_SYNC } else { 0 };
    }
    /// Set the oneshot option
    pub const fn set_oneshot(&mut self, oneshot: bool) {
        self.bits &= !Self::ONESHOT;
        self.bits |= if oneshot { Self::ONESHOT } else { 0 };
    }
}

/// Parameters for an [LfoGenerator]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LfoParams {
    /// Mode flags and waveform
    pub opts: LfoOptions,
    /// Output scaling, 128 = no output
    pub depth: u8,
    /// Index into the rate table, or in clock sync mode the divider
    /// selection in the upper nibble
    pub rate: u8,
    /// Delay after a restart before the LFO starts
    pub delay: u8,
    /// Start phase after a restart (upper 8 bits)
    pub phase: u8,
}

/// The modulation applied to an LFO this tick
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LfoInput {
    /// A tempo clock pulse occurred
    pub clock: bool,
    /// Depth destination accumulator
    pub depth_mod: i32,
    /// Rate destination accumulator
    pub rate_mod: i32,
}

/// Clock pulses (96 ppqn) per period in clock sync mode, indexed by the
/// upper nibble of the rate: from 4 bars down to a 64th note
const CLOCK_DIVIDERS: [u16; 16] = [
    1536, 1152, 768, 576, 384, 288, 192, 144, 96, 72, 48, 36, 24, 18, 12, 6,
];

/// A low frequency oscillator producing a signed 16 bit modulation value
#[derive(Clone)]
pub struct LfoGenerator {
    phase: u16,
    clk_ctr: u16,
    delay_ctr: u16,
    restart_req: bool,
    halted: bool,
    wrapped: bool,
    random: i16,
    rng: RandomGenerator,
    out: i16,
}

impl LfoGenerator {
    /// Constructor, with a seed for the random waveform
    pub fn new(seed: u64) -> Self {
        let mut rng = RandomGenerator::new(seed);
        Self {
            phase: 0,
            clk_ctr: 0,
            delay_ctr: 0,
            restart_req: false,
            halted: false,
            wrapped: false,
            random: rng.next_i16(),
            rng,
            out: 0,
        }
    }
    /// Restart at the start phase on the next tick
    pub fn restart(&mut self) {
        self.restart_req = true;
    }
    /// Restart the random sequence and clear the phase
    pub fn reset(&mut self) {
        self.rng.reset();
        self.random = self.rng.next_i16();
        self.phase = 0;
        self.clk_ctr = 0;
        self.delay_ctr = 0;
        self.restart_req = false;
        self.halted = false;
        self.wrapped = false;
        self.out = 0;
    }
    /// The current phase
    pub fn phase(&self) -> u16 {
        self.phase
    }
    /// The output of the last tick
    pub fn out(&self) -> i16 {
        self.out
    }
    /// True for the one tick in which a period ended
    pub fn period_wrapped(&self) -> bool {
        self.wrapped
    }
}

impl Device for LfoGenerator {
    type Input = LfoInput;
    type Params = LfoParams;
    type Output = i16;
    fn next(&mut self, context: &EngineContext, input: LfoInput, params: &LfoParams) -> i16 {
        self.wrapped = false;
        let opts = params.opts;
        if !opts.enabled() {
            self.out = 0;
            return 0;
        }
        let start_phase = (params.phase as u16) << 8;
        if self.restart_req {
            self.restart_req = false;
            self.halted = false;
            self.phase = start_phase;
            self.clk_ctr = 0;
            self.delay_ctr = context.scale_ticks(params.delay as u16 * 4);
        }
        if self.delay_ctr > 0 {
            self.delay_ctr -= 1;
            self.out = 0;
            return 0;
        }
        if !self.halted {
            if opts.clock_sync() {
                if input.clock {
                    let divider = CLOCK_DIVIDERS[(params.rate >> 4) as usize];
                    self.clk_ctr += 1;
                    if self.clk_ctr >= divider {
                        self.clk_ctr = 0;
                        self.wrapped = true;
                    }
                    let offset = (self.clk_ctr as u32 * 0x10000 / divider as u32) as u16;
                    self.phase = start_phase.wrapping_add(offset);
                }
            } else {
                let rate = (params.rate as i32 + (input.rate_mod >> 8)).clamp(0, 255);
                let inc = context.scale_increment(LFO_RATE_TABLE[rate as usize]);
                let (phase, overflow) = self.phase.overflowing_add(inc);
                self.phase = phase;
                self.wrapped = overflow;
            }
            if self.wrapped {
                self.random = self.rng.next_i16();
                if opts.oneshot() {
                    self.halted = true;
                    self.phase = u16::MAX;
                }
            }
        }
        let depth = (centered(params.depth) + (input.depth_mod >> 8)).clamp(-128, 128);
        let wave = opts.wave().value(self.phase, self.random);
        self.out = crate::clamp_i16(wave as i32 * depth / 128);
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(wave: LfoWave, rate: u8) -> LfoParams {
        LfoParams {
            opts: LfoOptions::with_wave(wave),
            depth: 0xFF,
            rate,
            delay: 0,
            phase: 0,
        }
    }

    #[test]
    fn disabled_outputs_zero() {
        let mut lfo = LfoGenerator::new(1);
        let mut p = params(LfoWave::Pulse, 100);
        p.opts = LfoOptions::from_bits(0);
        for _ in 0..100 {
            assert_eq!(lfo.next(&EngineContext::default(), LfoInput::default(), &p), 0);
        }
    }

    #[test]
    fn neutral_depth_outputs_zero() {
        let mut lfo = LfoGenerator::new(1);
        let mut p = params(LfoWave::SawUp, 100);
        p.depth = 128;
        for _ in 0..100 {
            assert_eq!(lfo.next(&EngineContext::default(), LfoInput::default(), &p), 0);
        }
    }

    #[test]
    fn saw_wraps_once_per_period() {
        let ctx = EngineContext::maybe_create(1).unwrap();
        let p = params(LfoWave::SawUp, 255);
        let inc = LFO_RATE_TABLE[255] as u32;
        let ticks = (0x10000 + inc - 1) / inc;
        let mut lfo = LfoGenerator::new(1);
        let mut wraps = 0;
        let mut last = i16::MIN;
        for _ in 0..(ticks * 4) {
            let out = lfo.next(&ctx, LfoInput::default(), &p);
            if lfo.period_wrapped() {
                wraps += 1;
            } else {
                assert!(out > last);
            }
            last = out;
        }
        assert!((3..=4).contains(&wraps));
    }

    #[test]
    fn positive_waves_are_positive() {
        for wave in [
            LfoWave::PosSine,
            LfoWave::PosTriangle,
            LfoWave::PosSaw,
            LfoWave::PosPulse,
        ] {
            let mut lfo = LfoGenerator::new(1);
            let p = params(wave, 200);
            for _ in 0..1000 {
                assert!(lfo.next(&EngineContext::default(), LfoInput::default(), &p) >= 0);
            }
        }
    }

    #[test]
    fn triangle_shape() {
        assert_eq!(LfoWave::Triangle.value(0, 0), 0);
        assert_eq!(LfoWave::Triangle.value(0x4000, 0), i16::MAX);
        assert_eq!(LfoWave::Triangle.value(0xC000, 0), i16::MIN);
        assert_eq!(LfoWave::PosTriangle.value(0xC000, 0), 0);
    }

    #[test]
    fn oneshot_halts() {
        let ctx = EngineContext::maybe_create(1).unwrap();
        let mut p = params(LfoWave::SawUp, 255);
        p.opts.set_oneshot(true);
        let mut lfo = LfoGenerator::new(1);
        let mut wraps = 0;
        for _ in 0..2000 {
            lfo.next(&ctx, LfoInput::default(), &p);
            wraps += lfo.period_wrapped() as u32;
        }
        assert_eq!(wraps, 1);
        assert_eq!(lfo.phase(), u16::MAX);
        lfo.restart();
        lfo.next(&ctx, LfoInput::default(), &p);
        assert!(lfo.phase() < 0x8000);
    }

    #[test]
    fn clock_sync_follows_pulses() {
        let mut p = params(LfoWave::SawUp, 0xF0);
        p.opts.set_clock_sync(true);
        let mut lfo = LfoGenerator::new(1);
        let clock = LfoInput {
            clock: true,
            ..Default::default()
        };
        let mut wraps = 0;
        for i in 0..60 {
            let input = if i % 2 == 0 { clock } else { LfoInput::default() };
            lfo.next(&EngineContext::default(), input, &p);
            wraps += lfo.period_wrapped() as u32;
        }
        // 30 pulses with 6 pulses per period
        assert_eq!(wraps, 5);
    }

    #[test]
    fn delay_gates_output() {
        let ctx = EngineContext::maybe_create(1).unwrap();
        let mut p = params(LfoWave::Pulse, 10);
        p.delay = 2;
        let mut lfo = LfoGenerator::new(1);
        lfo.restart();
        for _ in 0..8 {
            assert_eq!(lfo.next(&ctx, LfoInput::default(), &p), 0);
        }
        assert!(lfo.next(&ctx, LfoInput::default(), &p) != 0);
    }

    #[test]
    fn random_latches_per_period() {
        let ctx = EngineContext::maybe_create(1).unwrap();
        let p = params(LfoWave::Random, 255);
        let mut lfo = LfoGenerator::new(42);
        let mut last = lfo.next(&ctx, LfoInput::default(), &p);
        for _ in 0..500 {
            let out = lfo.next(&ctx, LfoInput::default(), &p);
            if !lfo.period_wrapped() {
                assert_eq!(out, last);
            }
            last = out;
        }
    }

    #[test]
    fn wave_conversion() {
        for (i, w) in LfoWave::waveforms().iter().enumerate() {
            assert_eq!(LfoWave::try_from(i as u8), Ok(*w));
        }
        assert!(LfoWave::try_from(10).is_err());
    }
}
