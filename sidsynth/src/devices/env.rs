use super::*;
use crate::fixedmath::{env_rate_ticks, ENV_RATE_TABLE};

/// The segment an envelope is currently in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvState {
    /// Not triggered, output 0
    #[default]
    Idle,
    /// Rising towards the attack level
    Attack1,
    /// Rising from the attack level towards the maximum
    Attack2,
    /// Falling towards the decay level
    Decay1,
    /// Falling from the decay level towards the sustain level
    Decay2,
    /// Holding the sustain level
    Sustain,
    /// Moving towards the release level
    Release1,
    /// Falling from the release level towards 0
    Release2,
}

/// Envelope option flags packed the same way as the patch's mode byte
#[repr(transparent)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct EnvOptions {
    bits: u8,
}

impl EnvOptions {
    const CLOCK_SYNC: u8 = 1 << 0;
    const MINIMAL: u8 = 1 << 1;
    const CURVE_ATTACK: u8 = 1 << 4;
    const CURVE_DECAY: u8 = 1 << 5;
    const CURVE_RELEASE: u8 = 1 << 6;
    /// Build from the raw mode byte
    pub const fn from_bits(bits: u8) -> Self {
        Self { bits }
    }
    /// The raw mode byte
    pub const fn bits(&self) -> u8 {
        self.bits
    }
    /// Segments advance only on clock pulses
    pub const fn clock_sync(&self) -> bool {
        self.bits & Self::CLOCK_SYNC != 0
    }
    /// Use the reduced attack/decay/sustain/release model
    pub const fn minimal(&self) -> bool {
        self.bits & Self::MINIMAL != 0
    }
    /// Attack segments use the exponential curve
    pub const fn curve_attack(&self) -> bool {
        self.bits & Self::CURVE_ATTACK != 0
    }
    /// Decay segments use the exponential curve
    pub const fn curve_decay(&self) -> bool {
        self.bits & Self::CURVE_DECAY != 0
    }
    /// Release segments use the exponential curve
    pub const fn curve_release(&self) -> bool {
        self.bits & Self::CURVE_RELEASE != 0
    }
    /// Set or clear the reduced model
    pub const fn set_minimal(&mut self, minimal: bool) {
        self.bits &= !Self::MINIMAL;
        self.bits |= if minimal { Self::MINIMAL } else { 0 };
    }
    /// Set or clear clock synchronisation
    pub const fn set_clock_sync(&mut self, sync: bool) {
        self.bits &= !Self::CLOCK_SYNC;
        self.bits |= if sync { Self::CLOCK_SYNC } else { 0 };
    }
}

/// Parameters for an [EnvelopeGenerator].  Rates are 0..=255 (0 is
/// immediate), levels are 0..=255, `depth` is centered at 128.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvParams {
    /// Mode flags
    pub opts: EnvOptions,
    /// Output scaling, 128 = no output, 0 = fully inverted
    pub depth: u8,
    /// Delay before the attack starts
    pub delay: u8,
    /// Rate of the first attack segment
    pub attack1: u8,
    /// Target of the first attack segment
    pub attack_level: u8,
    /// Rate of the second attack segment
    pub attack2: u8,
    /// Rate of the first decay segment
    pub decay1: u8,
    /// Target of the first decay segment
    pub decay_level: u8,
    /// Rate of the second decay segment
    pub decay2: u8,
    /// Sustain level
    pub sustain: u8,
    /// Rate of the first release segment
    pub release1: u8,
    /// Target of the first release segment
    pub release_level: u8,
    /// Rate of the second release segment
    pub release2: u8,
    /// Decay rate used instead of `decay1` for accented notes
    pub decay_accent: u8,
}

impl EnvParams {
    /// A plain attack/decay/sustain/release envelope using the reduced model
    /// at full positive depth
    pub const fn adsr(attack: u8, decay: u8, sustain: u8, release: u8) -> Self {
        let mut opts = EnvOptions::from_bits(0);
        opts.set_minimal(true);
        Self {
            opts,
            depth: 0xFF,
            delay: 0,
            attack1: attack,
            attack_level: 0xFF,
            attack2: 0,
            decay1: decay,
            decay_level: sustain,
            decay2: 0,
            sustain,
            release1: release,
            release_level: 0,
            release2: 0,
            decay_accent: decay,
        }
    }
}

impl Default for EnvParams {
    fn default() -> Self {
        let mut ret = Self::adsr(0, 0, 0xFF, 0);
        ret.depth = 0x80;
        ret
    }
}

/// A multi segment envelope producing a signed 16 bit modulation value
#[derive(Clone, Debug, Default)]
pub struct EnvelopeGenerator {
    state: EnvState,
    ctr: u16,
    delay_ctr: u16,
    restart_req: bool,
    release_req: bool,
    accent_req: bool,
    accent: bool,
    sustain_reached: bool,
    out: i16,
}

// more than enough to skip every zero length segment of the full model
const MAX_SEGMENTS_PER_TICK: usize = 8;

impl EnvelopeGenerator {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }
    /// Restart from the attack phase on the next tick
    pub fn restart(&mut self) {
        self.restart_req = true;
    }
    /// Enter the release phase on the next tick
    pub fn release(&mut self) {
        self.release_req = true;
    }
    /// Select the accented decay rate for the next restart
    pub fn request_accent(&mut self, accent: bool) {
        self.accent_req = accent;
    }
    /// Go back to idle immediately
    pub fn reset(&mut self) {
        *self = Self::default();
    }
    /// The current segment
    pub fn state(&self) -> EnvState {
        self.state
    }
    /// The unscaled 16 bit level
    pub fn level(&self) -> u16 {
        self.ctr
    }
    /// The scaled output of the last tick
    pub fn out(&self) -> i16 {
        self.out
    }
    /// True for the one tick in which the sustain phase was reached
    pub fn sustain_reached(&self) -> bool {
        self.sustain_reached
    }

    /// Move the level towards `target`; returns true once it is reached.
    fn step(&mut self, context: &EngineContext, target: u16, rate: u8, curve: bool) -> bool {
        let mut inc = if rate == 0 {
            0x10000
        } else {
            context.scale_increment(ENV_RATE_TABLE[rate as usize]) as u32
        };
        let ctr = self.ctr as u32;
        if curve && rate != 0 {
            let weight = if target > self.ctr {
                0x11000 - ctr
            } else {
                ctr + 0x1000
            };
            inc = ((inc as u64 * weight as u64) >> 15).max(1) as u32;
        }
        let target = target as u32;
        if target > ctr {
            self.ctr = (ctr + inc).min(target) as u16;
        } else if target < ctr {
            self.ctr = ctr.saturating_sub(inc).max(target) as u16;
        }
        self.ctr as u32 == target
    }

    /// Advance the current segment.  Returns true if the envelope moved on to
    /// another segment without changing its level, in which case the caller
    /// should run the next segment within the same tick.
    fn advance(&mut self, context: &EngineContext, params: &EnvParams) -> bool {
        let opts = params.opts;
        let minimal = opts.minimal();
        let before = (self.state, self.ctr);
        let next = match self.state {
            EnvState::Idle | EnvState::Sustain => {
                if self.state == EnvState::Sustain {
                    self.ctr = level16(params.sustain);
                }
                return false;
            }
            EnvState::Attack1 => {
                let target = if minimal {
                    0xFFFF
                } else {
                    level16(params.attack_level)
                };
                let done = self.step(context, target, params.attack1, opts.curve_attack());
                match (done, minimal) {
                    (false, _) => None,
                    (true, true) => Some(EnvState::Decay1),
                    (true, false) => Some(EnvState::Attack2),
                }
            }
            EnvState::Attack2 => self
                .step(context, 0xFFFF, params.attack2, opts.curve_attack())
                .then_some(EnvState::Decay1),
            EnvState::Decay1 => {
                let rate = if self.accent {
                    params.decay_accent
                } else {
                    params.decay1
                };
                let target = if minimal {
                    level16(params.sustain)
                } else {
                    level16(params.decay_level)
                };
                let done = self.step(context, target, rate, opts.curve_decay());
                match (done, minimal) {
                    (false, _) => None,
                    (true, true) => Some(EnvState::Sustain),
                    (true, false) => Some(EnvState::Decay2),
                }
            }
            EnvState::Decay2 => self
                .step(
                    context,
                    level16(params.sustain),
                    params.decay2,
                    opts.curve_decay(),
                )
                .then_some(EnvState::Sustain),
            EnvState::Release1 => {
                let target = if minimal {
                    0
                } else {
                    level16(params.release_level)
                };
                let done = self.step(context, target, params.release1, opts.curve_release());
                match (done, minimal) {
                    (false, _) => None,
                    (true, true) => Some(EnvState::Idle),
                    (true, false) => Some(EnvState::Release2),
                }
            }
            EnvState::Release2 => self
                .step(context, 0, params.release2, opts.curve_release())
                .then_some(EnvState::Idle),
        };
        match next {
            Some(state) => {
                if state == EnvState::Sustain {
                    self.sustain_reached = true;
                }
                self.state = state;
                before.1 == self.ctr && state != EnvState::Idle
            }
            None => false,
        }
    }
}

impl Device for EnvelopeGenerator {
    /// True on ticks carrying a clock pulse
    type Input = bool;
    type Params = EnvParams;
    type Output = i16;
    fn next(&mut self, context: &EngineContext, clock: bool, params: &EnvParams) -> i16 {
        self.sustain_reached = false;

        if self.restart_req {
            self.restart_req = false;
            self.release_req = false;
            self.accent = self.accent_req;
            self.ctr = 0;
            self.delay_ctr = if params.delay == 0 {
                0
            } else {
                let ticks = env_rate_ticks(params.delay).min(u16::MAX as u32) as u16;
                context.scale_ticks(ticks)
            };
            self.state = if !params.opts.minimal() && params.attack_level == 0 {
                EnvState::Attack2
            } else {
                EnvState::Attack1
            };
        }
        if self.release_req {
            self.release_req = false;
            if self.state != EnvState::Idle {
                self.state = EnvState::Release1;
                self.delay_ctr = 0;
            }
        }

        let hold = params.opts.clock_sync() && !clock;
        if self.delay_ctr > 0 {
            self.delay_ctr -= 1;
        } else if !hold {
            for _ in 0..MAX_SEGMENTS_PER_TICK {
                if !self.advance(context, params) {
                    break;
                }
            }
        }

        let scaled = ((self.ctr >> 1) as i32 * centered(params.depth)) / 128;
        self.out = crate::clamp_i16(scaled);
        self.out
    }
}
