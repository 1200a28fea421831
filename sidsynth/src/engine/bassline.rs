use super::{EngineCore, EngineVariant, NoteEvent, ACCENT_VELOCITY};
use crate::clock::ClockEvents;
use crate::context::EngineContext;
use crate::devices::{Device, EnvelopeGenerator, LfoGenerator, LfoInput};
use crate::filter::FilterInput;
use crate::modulation::depth_scale;
use crate::patch::{BasslineInstrument, BasslinePatch};
use crate::voice::{NoteStack, NoteTrigger, Voice, VoiceInput};
use crate::{NOTE_C3, NUM_FILTERS, VOICES_PER_CHIP};

/// A note played from the keyboard; legato notes glide
fn keyed(note: u8, velocity: u8, legato: bool) -> NoteTrigger {
    NoteTrigger {
        note,
        velocity,
        legato,
        glide: legato,
        accent: velocity >= ACCENT_VELOCITY,
    }
}

/// Playback position of a step sequence
#[derive(Clone, Debug, Default)]
struct SeqState {
    running: bool,
    restart_req: bool,
    pos: u8,
    div_ctr: u8,
    gate_ctr: u8,
    slide: bool,
}

#[derive(Clone)]
struct Instrument {
    notes: NoteStack,
    env: EnvelopeGenerator,
    lfos: [LfoGenerator; 2],
    seq: SeqState,
}

impl Instrument {
    fn new(seed: u64) -> Self {
        Self {
            notes: NoteStack::new(),
            env: EnvelopeGenerator::new(),
            lfos: [
                LfoGenerator::new(seed.wrapping_add(1)),
                LfoGenerator::new(seed.wrapping_add(2)),
            ],
            seq: SeqState::default(),
        }
    }

    fn reset(&mut self) {
        self.notes.clear();
        self.env.reset();
        for lfo in self.lfos.iter_mut() {
            lfo.reset();
        }
        self.seq = SeqState::default();
    }

    fn release(&mut self, voice: &mut Voice) {
        voice.note_off(0);
        self.env.release();
    }

    /// Play a note on the voice.  A legato note glides and keeps the
    /// envelope running.
    fn play(&mut self, context: &EngineContext, voice: &mut Voice, params: &BasslineInstrument, trigger: NoteTrigger) {
        voice.note_on(context, &params.voice, trigger);
        if !trigger.legato {
            self.env.request_accent(trigger.accent);
            self.env.restart();
            for (lfo, p) in self.lfos.iter_mut().zip(params.lfos.iter()) {
                if p.lfo.opts.key_sync() {
                    lfo.restart();
                }
            }
        }
    }

    fn note(&mut self, context: &EngineContext, voice: &mut Voice, params: &BasslineInstrument, event: NoteEvent) {
        match event {
            NoteEvent::On { note, velocity } => {
                let first = self.notes.is_empty();
                self.notes.push(note, velocity);
                if params.seq.enabled {
                    if first {
                        self.seq.restart_req = true;
                    }
                } else {
                    self.play(context, voice, params, keyed(note, velocity, !first));
                }
            }
            NoteEvent::Off { note } => {
                let was_playing = self.notes.last().is_some_and(|n| n.note == note);
                if !self.notes.remove(note) {
                    return;
                }
                match self.notes.last() {
                    None => {
                        self.seq.running = false;
                        self.release(voice);
                    }
                    Some(held) if was_playing && !params.seq.enabled => {
                        self.play(context, voice, params, keyed(held.note, held.velocity, true));
                    }
                    Some(_) => {}
                }
            }
        }
    }

    /// Advance the step sequencer by one tick
    fn sequence(&mut self, context: &EngineContext, clock: &ClockEvents, voice: &mut Voice, params: &BasslineInstrument) {
        let seq = &params.seq;
        let Some(key) = self.notes.last() else {
            return;
        };
        if clock.start {
            self.seq.restart_req = true;
        }
        let mut step = false;
        if self.seq.restart_req {
            self.seq = SeqState {
                running: true,
                ..Default::default()
            };
            step = true;
        } else if self.seq.running && clock.clock {
            if self.seq.gate_ctr > 0 {
                self.seq.gate_ctr -= 1;
                if self.seq.gate_ctr == 0 && !self.seq.slide {
                    self.release(voice);
                }
            }
            self.seq.div_ctr += 1;
            if self.seq.div_ctr > seq.speed {
                self.seq.div_ctr = 0;
                self.seq.pos = (self.seq.pos + 1) % seq.length.max(1);
                step = true;
            }
        }
        if !step {
            return;
        }
        let s = seq.steps[self.seq.pos as usize];
        if !s.gate {
            self.seq.slide = false;
            self.release(voice);
            return;
        }
        let note = (key.note as i16 + s.note as i16 - NOTE_C3 as i16).clamp(0, 127) as u8;
        let trigger = NoteTrigger {
            note,
            velocity: if s.accent { 127 } else { key.velocity },
            legato: self.seq.slide,
            glide: self.seq.slide,
            accent: s.accent,
        };
        self.play(context, voice, params, trigger);
        self.seq.slide = s.slide;
        self.seq.gate_ctr = if seq.gatelen == 0 { 0 } else { seq.gatelen + 1 };
    }
}

/// The Bassline engine: two monophonic instruments, each playing the first
/// voice of its chip
#[derive(Clone)]
pub(crate) struct BasslineEngine {
    instruments: [Instrument; 2],
}

impl BasslineEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            instruments: [Instrument::new(seed), Instrument::new(seed.wrapping_add(2))],
        }
    }

    // instruments beyond the configured voices stay silent
    fn active(core: &EngineCore) -> usize {
        core.num_voices.div_ceil(VOICES_PER_CHIP)
    }
}

impl EngineVariant for BasslineEngine {
    type Patch = BasslinePatch;

    fn load(&mut self, _core: &mut EngineCore, _patch: &BasslinePatch) {
        for ins in self.instruments.iter_mut() {
            ins.reset();
        }
    }

    fn note(
        &mut self,
        context: &EngineContext,
        core: &mut EngineCore,
        patch: &BasslinePatch,
        slot: usize,
        event: NoteEvent,
    ) {
        if slot >= Self::active(core) {
            return;
        }
        let voice = &mut core.voices[slot * VOICES_PER_CHIP];
        self.instruments[slot].note(context, voice, &patch.instruments[slot], event);
    }

    fn all_notes_off(&mut self, core: &mut EngineCore) {
        for (i, ins) in self.instruments.iter_mut().enumerate() {
            ins.notes.clear();
            ins.seq.running = false;
            ins.release(&mut core.voices[i * VOICES_PER_CHIP]);
        }
    }

    fn tick(
        &mut self,
        context: &EngineContext,
        clock: &ClockEvents,
        core: &mut EngineCore,
        patch: &BasslinePatch,
    ) -> [FilterInput; NUM_FILTERS] {
        let mut ret = [FilterInput::default(); NUM_FILTERS];
        for i in 0..Self::active(core) {
            let ins = &mut self.instruments[i];
            let params = &patch.instruments[i];
            let voice = &mut core.voices[i * VOICES_PER_CHIP];
            if params.seq.enabled {
                ins.sequence(context, clock, voice, params);
            }

            let env = ins.env.next(context, clock.clock, &params.env) as i32 / 2;
            let mut input = VoiceInput {
                pitch_mod: depth_scale(env, params.env_pitch),
                pitch_bend: core.controllers.pitch_bend[i],
                ..Default::default()
            };
            let mut cutoff_mod = depth_scale(env, params.env_cutoff);
            for (lfo, p) in ins.lfos.iter_mut().zip(params.lfos.iter()) {
                let out = lfo.next(
                    context,
                    LfoInput {
                        clock: clock.clock,
                        ..Default::default()
                    },
                    &p.lfo,
                ) as i32
                    / 2;
                input.pitch_mod += depth_scale(out, p.depth_pitch);
                input.pw_mod += depth_scale(out, p.depth_pw);
                cutoff_mod += depth_scale(out, p.depth_cutoff);
            }
            if voice.accent() {
                cutoff_mod += params.accent_cutoff as i32 * 32 * ins.env.level() as i32 / 0xFFFF;
            }
            voice.next(context, input, &params.voice);
            ret[i] = FilterInput {
                cutoff_mod,
                keytrack_frq: voice.linear_frq(),
                ..Default::default()
            };
        }
        ret
    }
}
