//! One engine drives one chip pair.  An [EngineInstance] owns everything the
//! engine needs (patch, voices, generators, filters and the register block)
//! and hands the per-kind work to one of the Lead, Bassline, Drum or Multi
//! implementations.

use arrayvec::ArrayVec;

use crate::clock::ClockEvents;
use crate::config::{EngineConfig, MidiRouting, NUM_ROUTING_SLOTS};
use crate::context::EngineContext;
use crate::devices::Device;
use crate::filter::{FilterEngine, FilterInput};
use crate::midi::{self, MidiEvent};
use crate::patch::{
    EngineKind, EnginePatch, Knob, Patch, KNOB_AFTERTOUCH, KNOB_PITCHBEND, KNOB_VELOCITY,
    NUM_KNOBS,
};
use crate::random::RandomGenerator;
use crate::registers::RegisterBlock;
use crate::voice::Voice;
use crate::{NUM_FILTERS, NUM_VOICES, VOICES_PER_CHIP};

mod bassline;
mod drum;
mod lead;
mod multi;
pub mod trigger;

use bassline::BasslineEngine;
use drum::DrumEngine;
use lead::LeadEngine;
use multi::MultiEngine;

/// Notes played at or above this velocity are accented
pub const ACCENT_VELOCITY: u8 = 100;

/// A note event for one instrument slot, after MIDI routing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteEvent {
    /// Key pressed
    On {
        /// Note number after transposition
        note: u8,
        /// Velocity
        velocity: u8,
    },
    /// Key released
    Off {
        /// Note number after transposition
        note: u8,
    },
}

/// A program change the host should resolve through its patch bank
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramRequest {
    /// The engine that received the program change
    pub engine: u8,
    /// The bank selected with CC 0
    pub bank: u8,
    /// The requested program
    pub program: u8,
}

/// Performance controllers received over MIDI
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Controllers {
    /// CC 1
    pub mod_wheel: u8,
    /// Channel aftertouch
    pub aftertouch: u8,
    /// Pitch bend of each instrument slot
    pub pitch_bend: [i16; NUM_ROUTING_SLOTS],
    /// Bank selected with CC 0
    pub bank: u8,
}

/// State shared by every engine kind
#[derive(Clone)]
pub(crate) struct EngineCore {
    pub voices: [Voice; NUM_VOICES],
    pub num_voices: usize,
    pub rng: RandomGenerator,
    pub controllers: Controllers,
    pub knobs: [Knob; NUM_KNOBS],
}

impl EngineCore {
    fn new(num_voices: usize, seed: u64) -> Self {
        Self {
            voices: core::array::from_fn(|_| Voice::new()),
            num_voices,
            rng: RandomGenerator::new(seed),
            controllers: Controllers::default(),
            knobs: [Knob::default(); NUM_KNOBS],
        }
    }
}

/// The per-kind half of an engine
pub(crate) trait EngineVariant {
    /// The engine specific part of the patch
    type Patch;
    /// Forget all playing notes and generator state, and pick up a new patch
    fn load(&mut self, core: &mut EngineCore, patch: &Self::Patch);
    /// A parameter of the patch changed while playing
    fn refresh(&mut self, _core: &mut EngineCore, _patch: &Self::Patch) {}
    /// A note event for instrument `slot`
    fn note(
        &mut self,
        context: &EngineContext,
        core: &mut EngineCore,
        patch: &Self::Patch,
        slot: usize,
        event: NoteEvent,
    );
    /// Release every note
    fn all_notes_off(&mut self, core: &mut EngineCore);
    /// Advance by one tick: run generators and voices, and return the
    /// modulation of both filters
    fn tick(
        &mut self,
        context: &EngineContext,
        clock: &ClockEvents,
        core: &mut EngineCore,
        patch: &Self::Patch,
    ) -> [FilterInput; NUM_FILTERS];
}

#[derive(Clone)]
enum Variant {
    Lead(LeadEngine),
    Bassline(BasslineEngine),
    Drum(DrumEngine),
    Multi(MultiEngine),
}

impl Variant {
    fn new(kind: EngineKind, seed: u64) -> Self {
        match kind {
            EngineKind::Lead => Self::Lead(LeadEngine::new(seed)),
            EngineKind::Bassline => Self::Bassline(BasslineEngine::new(seed)),
            EngineKind::Drum => Self::Drum(DrumEngine::new()),
            EngineKind::Multi => Self::Multi(MultiEngine::new(seed)),
        }
    }
    fn kind(&self) -> EngineKind {
        match self {
            Self::Lead(_) => EngineKind::Lead,
            Self::Bassline(_) => EngineKind::Bassline,
            Self::Drum(_) => EngineKind::Drum,
            Self::Multi(_) => EngineKind::Multi,
        }
    }
}

// Run `$body` with the variant engine and its patch bound to `$e` and `$p`
macro_rules! with_variant {
    ($self:ident, $e:ident, $p:ident => $body:expr, $mismatch:expr) => {
        match (&mut $self.variant, &$self.patch.engine) {
            (Variant::Lead($e), EnginePatch::Lead($p)) => $body,
            (Variant::Bassline($e), EnginePatch::Bassline($p)) => $body,
            (Variant::Drum($e), EnginePatch::Drum($p)) => $body,
            (Variant::Multi($e), EnginePatch::Multi($p)) => $body,
            _ => $mismatch,
        }
    };
}

/// The number of MIDI routing slots (instruments) an engine kind listens to
pub const fn instrument_slots(kind: EngineKind) -> usize {
    match kind {
        EngineKind::Lead | EngineKind::Drum => 1,
        EngineKind::Bassline => 2,
        EngineKind::Multi => NUM_ROUTING_SLOTS,
    }
}

/// Scale a 7 bit controller onto a full scale knob value
const fn knob_from_u7(value: u8) -> u8 {
    (value << 1) | (value >> 6)
}

/// The sound engine of one chip pair
#[derive(Clone)]
pub struct EngineInstance {
    index: u8,
    seed: u64,
    config: EngineConfig,
    patch: Patch,
    core: EngineCore,
    variant: Variant,
    filters: [FilterEngine; NUM_FILTERS],
    regs: RegisterBlock,
}

impl EngineInstance {
    /// Create engine number `index` with a default Lead patch
    pub fn new(index: u8, config: EngineConfig, seed: u64) -> Self {
        let patch = Patch::default();
        let mut ret = Self {
            index,
            seed,
            config,
            core: EngineCore::new(config.num_voices(), seed),
            variant: Variant::new(patch.kind(), seed),
            filters: config.filter_calibration.map(FilterEngine::new),
            patch,
            regs: RegisterBlock::new(),
        };
        ret.load_patch(Patch::default());
        ret
    }
    /// The index of this engine in the orchestrator
    pub fn index(&self) -> u8 {
        self.index
    }
    /// The configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
    /// The current patch
    pub fn patch(&self) -> &Patch {
        &self.patch
    }
    /// The kind of engine selected by the patch
    pub fn kind(&self) -> EngineKind {
        self.variant.kind()
    }
    /// The register image computed on the last tick
    pub fn registers(&self) -> &RegisterBlock {
        &self.regs
    }
    /// Voice `v`
    pub fn voice(&self, v: usize) -> Option<&Voice> {
        self.core.voices.get(v)
    }
    /// The performance controllers
    pub fn controllers(&self) -> &Controllers {
        &self.core.controllers
    }

    /// Replace the configuration.  Changing the voice count silences the
    /// engine.
    pub fn set_config(&mut self, config: EngineConfig) {
        for (filter, cal) in self.filters.iter_mut().zip(config.filter_calibration) {
            filter.set_calibration(cal);
        }
        let reload = config.num_voices() != self.config.num_voices();
        self.config = config;
        if reload {
            self.core.num_voices = config.num_voices();
            self.load_patch(self.patch.clone());
        }
    }

    /// Replace the patch, silencing all voices and restarting every
    /// generator from its initial state
    pub fn load_patch(&mut self, patch: Patch) {
        log::debug!("engine {}: loading {} patch '{}'", self.index, patch.kind().to_str(), patch.name());
        self.patch = patch;
        for voice in self.core.voices.iter_mut() {
            voice.reset();
        }
        self.core.rng = RandomGenerator::new(self.seed);
        if self.variant.kind() != self.patch.kind() {
            self.variant = Variant::new(self.patch.kind(), self.seed);
        }
        with_variant!(self, e, p => e.load(&mut self.core, p), ());
    }

    fn patch_changed(&mut self) {
        if self.variant.kind() != self.patch.kind() {
            log::info!("engine {}: switching to {}", self.index, self.patch.kind().to_str());
            self.load_patch(self.patch.clone());
        } else {
            with_variant!(self, e, p => e.refresh(&mut self.core, p), ());
        }
    }

    /// Write one parameter of the encoded patch, with write option `wopt`
    /// (see [crate::patch::wopt_addresses]).  Returns false if the address
    /// is outside the patch.
    pub fn write_param(&mut self, addr: u16, wopt: u8, value: u8) -> bool {
        let ret = self.patch.write_wopt(addr, wopt, value);
        if ret {
            self.patch_changed();
        }
        ret
    }

    fn set_knob(&mut self, k: usize, value: u8) {
        if self.patch.set_knob(k, value) > 0 {
            self.patch_changed();
        }
    }

    fn note(&mut self, context: &EngineContext, slot: usize, event: NoteEvent) {
        with_variant!(self, e, p => e.note(context, &mut self.core, p, slot, event), ());
    }

    /// Release every note
    pub fn all_notes_off(&mut self) {
        with_variant!(self, e, _p => e.all_notes_off(&mut self.core), ());
    }

    fn controller(&mut self, controller: u8, value: u8) -> Option<ProgramRequest> {
        match controller {
            midi::CC_BANK_SELECT => self.core.controllers.bank = value,
            midi::CC_MOD_WHEEL => {
                self.core.controllers.mod_wheel = value;
                self.set_knob(0, knob_from_u7(value));
            }
            c if (midi::CC_KNOB2..midi::CC_KNOB2 + 4).contains(&c) => {
                self.set_knob((c - midi::CC_KNOB2) as usize + 1, knob_from_u7(value));
            }
            midi::CC_ALL_SOUND_OFF | midi::CC_ALL_NOTES_OFF => self.all_notes_off(),
            _ => log::trace!("engine {}: ignoring CC {}", self.index, controller),
        }
        None
    }

    /// Apply a channel message to every instrument slot whose routing accepts
    /// it.  Returns a program change request for the host, if any.
    pub fn handle_midi(&mut self, context: &EngineContext, event: &MidiEvent) -> Option<ProgramRequest> {
        let channel = event.channel()?;
        let slots = instrument_slots(self.kind());
        let accepting: ArrayVec<(usize, MidiRouting), NUM_ROUTING_SLOTS> = self.config.routing[..slots]
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, r)| r.accepts_channel(channel))
            .collect();
        if accepting.is_empty() {
            return None;
        }
        match *event {
            MidiEvent::NoteOn { note, velocity, .. } => {
                self.set_knob(KNOB_VELOCITY, knob_from_u7(velocity));
                for (slot, r) in &accepting {
                    if let Some(note) = r.map_note(channel, note) {
                        self.note(context, *slot, NoteEvent::On { note, velocity });
                    }
                }
                None
            }
            MidiEvent::NoteOff { note, .. } => {
                for (slot, r) in &accepting {
                    if let Some(note) = r.map_note(channel, note) {
                        self.note(context, *slot, NoteEvent::Off { note });
                    }
                }
                None
            }
            MidiEvent::PitchBend { value, .. } => {
                for (slot, _) in &accepting {
                    self.core.controllers.pitch_bend[*slot] = value;
                }
                self.set_knob(KNOB_PITCHBEND, ((value as i32 + 0x2000) >> 6) as u8);
                None
            }
            MidiEvent::Aftertouch { value, .. } => {
                self.core.controllers.aftertouch = value;
                self.set_knob(KNOB_AFTERTOUCH, knob_from_u7(value));
                None
            }
            MidiEvent::ControlChange { controller, value, .. } => self.controller(controller, value),
            MidiEvent::ProgramChange { program, .. } => Some(ProgramRequest {
                engine: self.index,
                bank: self.core.controllers.bank,
                program,
            }),
            MidiEvent::Realtime(_) => None,
        }
    }

    /// Recompute the register image.  Returns true if any register changed.
    pub fn tick(&mut self, context: &EngineContext, clock: &ClockEvents) -> bool {
        self.core.knobs = self.patch.knobs;
        let mismatch = || {
            log::error!("engine state does not match the patch");
            [FilterInput::default(); NUM_FILTERS]
        };
        let inputs = with_variant!(self, e, p => e.tick(context, clock, &mut self.core, p), mismatch());

        let mut changed = false;
        for v in 0..self.core.num_voices {
            changed |= self.regs.set_voice(v, self.core.voices[v].regs());
        }
        let num_filters = self.core.num_voices.div_ceil(VOICES_PER_CHIP);
        for f in 0..num_filters {
            let input = FilterInput {
                volume: self.patch.volume,
                ..inputs[f]
            };
            let regs = self.filters[f].next(context, input, &self.patch.filters[f]);
            changed |= self.regs.set_filter(f, &regs);
        }
        changed
    }
}
