//! This module contains the per-voice pitch, pulse width and gate logic, plus
//! the note bookkeeping used by the engines to drive voices: the voice
//! allocation queue, the note stack and the arpeggiator.

use crate::context::EngineContext;
use crate::devices::Device;
use crate::fixedmath::{Note, ENV_RATE_TABLE};
use crate::registers::VoiceRegs;

mod alloc;
mod arp;
mod notestack;

pub use alloc::{VoiceAllocator, VoiceQueueEntry};
pub use arp::{ArpEvent, ArpMode, ArpOptions, ArpParams, Arpeggiator};
pub use notestack::{HeldNote, NoteStack, NOTE_STACK_SIZE};

/// Waveform selection and flags of a voice, as stored in the patch (bits 0-3
/// triangle/saw/pulse/noise, bit 4 off, bit 5 sync, bit 6 ring modulation)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoiceWaveform {
    /// Triangle
    pub triangle: bool,
    /// Sawtooth
    pub saw: bool,
    /// Pulse
    pub pulse: bool,
    /// Noise
    pub noise: bool,
    /// Voice silenced (test bit set, no waveform)
    pub off: bool,
    /// Hard sync to the previous voice
    pub sync: bool,
    /// Ring modulation with the previous voice
    pub ring: bool,
}

impl VoiceWaveform {
    /// Decode the patch byte
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            triangle: bits & 0x01 != 0,
            saw: bits & 0x02 != 0,
            pulse: bits & 0x04 != 0,
            noise: bits & 0x08 != 0,
            off: bits & 0x10 != 0,
            sync: bits & 0x20 != 0,
            ring: bits & 0x40 != 0,
        }
    }
    /// Encode the patch byte
    pub const fn to_bits(&self) -> u8 {
        self.wave_nibble()
            | (self.off as u8) << 4
            | (self.sync as u8) << 5
            | (self.ring as u8) << 6
    }
    const fn wave_nibble(&self) -> u8 {
        self.triangle as u8
            | (self.saw as u8) << 1
            | (self.pulse as u8) << 2
            | (self.noise as u8) << 3
    }
    /// The control register bits other than the gate
    pub const fn control_bits(&self) -> u8 {
        let wave = if self.off { 0 } else { self.wave_nibble() };
        wave << 4 | (self.off as u8) << 3 | (self.ring as u8) << 2 | (self.sync as u8) << 1
    }
    /// Decode a control register value
    pub const fn from_control(control: u8) -> Self {
        let mut ret = Self::from_bits(control >> 4);
        ret.off = control & 0x08 != 0;
        ret.ring = control & 0x04 != 0;
        ret.sync = control & 0x02 != 0;
        ret
    }
}

/// How a voice glides between notes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PortamentoMode {
    /// Move a fraction of the remaining distance every tick
    #[default]
    Normal,
    /// Reach the target in a fixed time regardless of the interval
    ConstantTime,
    /// Constant time, quantised to semitones
    Glissando,
}

impl PortamentoMode {
    const ELEM: [PortamentoMode; 3] = [Self::Normal, Self::ConstantTime, Self::Glissando];
    /// Convert a u8 to a PortamentoMode, if in range
    pub const fn new_from_u8(value: u8) -> Option<Self> {
        if (value as usize) < Self::ELEM.len() {
            Some(Self::ELEM[value as usize])
        } else {
            None
        }
    }
    /// Convert to a human-readable string
    pub const fn to_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::ConstantTime => "Constant Time",
            Self::Glissando => "Glissando",
        }
    }
}

impl TryFrom<u8> for PortamentoMode {
    type Error = &'static str;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new_from_u8(value).ok_or("Invalid Portamento Mode")
    }
}

/// The static parameters of a voice
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceParams {
    /// Waveform and flags
    pub waveform: VoiceWaveform,
    /// Attack/decay register
    pub attack_decay: u8,
    /// Sustain/release register
    pub sustain_release: u8,
    /// Pulse width, 12 bits
    pub pulsewidth: u16,
    /// Transposition in semitones
    pub transpose: i8,
    /// Fine tuning, in 1/128 of a semitone
    pub finetune: i8,
    /// Pitch bend range in semitones
    pub bend_range: u8,
    /// Portamento rate, 0 disables portamento
    pub portamento: u8,
    /// Portamento behaviour
    pub porta_mode: PortamentoMode,
    /// Delay between a note on and the gate being set, in ticks at an update
    /// speed factor of 1
    pub gate_delay: u8,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            waveform: VoiceWaveform {
                pulse: true,
                ..Default::default()
            },
            attack_decay: 0x00,
            sustain_release: 0xF0,
            pulsewidth: 0x800,
            transpose: 0,
            finetune: 0,
            bend_range: 2,
            portamento: 0,
            porta_mode: PortamentoMode::Normal,
            gate_delay: 0,
        }
    }
}

/// Everything computed elsewhere in the engine that affects a voice this tick
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VoiceInput {
    /// Pitch destination accumulator, in 1/512 semitones
    pub pitch_mod: i32,
    /// Pulse width destination accumulator
    pub pw_mod: i32,
    /// Pitch bend, -8192..=8191
    pub pitch_bend: i16,
    /// Detune offset, in 1/512 semitones
    pub detune: i32,
    /// Note played by a wavetable, overriding the voice's note
    pub wt_note: Option<u8>,
    /// Waveform played by a wavetable, overriding the patch waveform
    pub wt_waveform: Option<VoiceWaveform>,
}

/// How a note should be started
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NoteTrigger {
    /// MIDI note number
    pub note: u8,
    /// MIDI velocity
    pub velocity: u8,
    /// Keep the gate open if it already is
    pub legato: bool,
    /// Glide from the previous note if portamento is enabled
    pub glide: bool,
    /// Accented note
    pub accent: bool,
}

/// A single voice of the chip
#[derive(Clone, Debug, Default)]
pub struct Voice {
    note: u8,
    velocity: u8,
    accent: bool,
    played: bool,
    gate: bool,
    gate_set_req: bool,
    gate_clr_req: bool,
    set_delay_ctr: u16,
    clr_delay_ctr: u16,
    porta_active: bool,
    porta_begin: i32,
    porta_end: i32,
    porta_ctr: u32,
    linear_frq: i32,
    regs: VoiceRegs,
}

const MAX_LINEAR_FRQ: i32 = u16::MAX as i32;

impl Voice {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }
    /// The note currently played
    pub fn note(&self) -> u8 {
        self.note
    }
    /// The velocity of the current note
    pub fn velocity(&self) -> u8 {
        self.velocity
    }
    /// True if the current note is accented
    pub fn accent(&self) -> bool {
        self.accent
    }
    /// The state of the gate bit
    pub fn gate(&self) -> bool {
        self.gate
    }
    /// True while a portamento is in progress
    pub fn portamento_active(&self) -> bool {
        self.porta_active
    }
    /// Linear pitch before modulation, detune and pitch bend
    pub fn linear_frq(&self) -> Note {
        Note::from_bits(self.linear_frq.clamp(0, MAX_LINEAR_FRQ) as u16)
    }
    /// The registers computed on the last tick
    pub fn regs(&self) -> &VoiceRegs {
        &self.regs
    }

    /// Start a note.  Unless `legato` is set on an open gate, the gate is
    /// (re)triggered: cleared immediately if it was open, then set after the
    /// gate delay (at least one tick when retriggering).
    pub fn note_on(&mut self, context: &EngineContext, params: &VoiceParams, trigger: NoteTrigger) {
        self.set_note(params, trigger);
        self.retrigger(context, params, trigger.legato);
    }
    /// Change the note without touching the gate
    pub fn set_note(&mut self, params: &VoiceParams, trigger: NoteTrigger) {
        let target = ((trigger.note as i32 + params.transpose as i32).clamp(0, 127)) << 9;
        if trigger.glide && params.portamento > 0 && self.played {
            self.porta_begin = self.linear_frq;
            self.porta_end = target;
            self.porta_ctr = 0;
            self.porta_active = self.porta_begin != target;
        } else {
            self.porta_active = false;
            self.linear_frq = target;
        }
        self.note = trigger.note;
        self.velocity = trigger.velocity;
        self.accent = trigger.accent;
        self.played = true;
    }
    /// Open the gate after the gate delay, closing it first if it is open.
    /// With `legato`, an open gate is left alone.
    pub fn retrigger(&mut self, context: &EngineContext, params: &VoiceParams, legato: bool) {
        let gate_open = self.gate || self.gate_set_req;
        if legato && gate_open {
            self.gate_clr_req = false;
            return;
        }
        let delay = context.scale_ticks(params.gate_delay as u16);
        if gate_open {
            self.gate = false;
            self.set_delay_ctr = delay.max(1);
        } else {
            self.set_delay_ctr = delay;
        }
        self.gate_set_req = true;
        self.gate_clr_req = false;
    }
    /// Release the current note after `delay` ticks
    pub fn note_off(&mut self, delay: u16) {
        self.gate_set_req = false;
        self.gate_clr_req = true;
        self.clr_delay_ctr = delay;
    }
    /// Set the gate without changing the note (trigger matrix)
    pub fn gate_on(&mut self) {
        self.gate_set_req = true;
        self.set_delay_ctr = 0;
        self.gate_clr_req = false;
    }
    /// Silence the voice immediately
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn update_gate(&mut self) {
        if self.gate_clr_req {
            if self.clr_delay_ctr > 0 {
                self.clr_delay_ctr -= 1;
            } else {
                self.gate_clr_req = false;
                self.gate = false;
            }
        }
        if self.gate_set_req {
            if self.set_delay_ctr > 0 {
                self.set_delay_ctr -= 1;
            } else {
                self.gate_set_req = false;
                self.gate = true;
            }
        }
    }

    fn update_portamento(&mut self, context: &EngineContext, params: &VoiceParams) {
        if !self.porta_active {
            return;
        }
        let inc = context.scale_increment(ENV_RATE_TABLE[params.portamento as usize]) as u32;
        let distance = self.porta_end - self.porta_begin;
        match params.porta_mode {
            PortamentoMode::Normal => {
                let remaining = self.porta_end - self.linear_frq;
                let mut step = (remaining as i64 * inc as i64 / 0x10000) as i32;
                if step == 0 {
                    step = remaining.signum();
                }
                self.linear_frq += step;
                self.porta_active = self.linear_frq != self.porta_end;
            }
            PortamentoMode::ConstantTime | PortamentoMode::Glissando => {
                self.porta_ctr = (self.porta_ctr + inc).min(0x10000);
                let mut frq =
                    self.porta_begin + (distance as i64 * self.porta_ctr as i64 / 0x10000) as i32;
                if params.porta_mode == PortamentoMode::Glissando {
                    frq = (frq + 0x100) & !0x1FF;
                }
                self.linear_frq = frq;
                if self.porta_ctr >= 0x10000 {
                    self.linear_frq = self.porta_end;
                    self.porta_active = false;
                }
            }
        }
    }
}

impl Device for Voice {
    type Input = VoiceInput;
    type Params = VoiceParams;
    type Output = VoiceRegs;
    fn next(&mut self, context: &EngineContext, input: VoiceInput, params: &VoiceParams) -> VoiceRegs {
        self.update_portamento(context, params);
        self.update_gate();

        let base = match input.wt_note {
            Some(note) => ((note as i32 + params.transpose as i32).clamp(0, 127)) << 9,
            None => self.linear_frq,
        };
        let bend = input.pitch_bend as i32 * params.bend_range as i32 * 512 / 8192;
        let frq = base
            + params.finetune as i32 * 4
            + input.detune
            + bend
            + input.pitch_mod;
        let note = Note::from_bits(frq.clamp(0, MAX_LINEAR_FRQ) as u16);

        self.regs = VoiceRegs {
            freq: crate::note_to_sid_frequency(note),
            pw: crate::clamp12(params.pulsewidth as i32 + (input.pw_mod >> 4)),
            waveform: input.wt_waveform.unwrap_or(params.waveform),
            gate: self.gate,
            attack_decay: params.attack_decay,
            sustain_release: params.sustain_release,
        };
        self.regs
    }
}
