use super::{EngineCore, EngineVariant, NoteEvent, ACCENT_VELOCITY};
use crate::clock::ClockEvents;
use crate::context::EngineContext;
use crate::devices::{Device, EnvelopeGenerator, LfoGenerator, LfoInput};
use crate::filter::FilterInput;
use crate::modulation::depth_scale;
use crate::patch::{MultiPatch, MULTI_INSTRUMENTS};
use crate::voice::{NoteTrigger, VoiceAllocator, VoiceInput};
use crate::{NUM_FILTERS, NUM_VOICES, VOICES_PER_CHIP};

/// Per voice state: which instrument plays it, and that instrument's
/// modulators for this voice
#[derive(Clone)]
struct VoiceSlot {
    instrument: Option<u8>,
    note: u8,
    held: bool,
    env: EnvelopeGenerator,
    lfos: [LfoGenerator; 2],
}

impl VoiceSlot {
    fn new(seed: u64) -> Self {
        Self {
            instrument: None,
            note: 0,
            held: false,
            env: EnvelopeGenerator::new(),
            lfos: [
                LfoGenerator::new(seed.wrapping_add(1)),
                LfoGenerator::new(seed.wrapping_add(2)),
            ],
        }
    }

    fn reset(&mut self) {
        self.instrument = None;
        self.note = 0;
        self.held = false;
        self.env.reset();
        for lfo in self.lfos.iter_mut() {
            lfo.reset();
        }
    }
}

/// The Multi engine: six polyphonic instruments sharing the voices
#[derive(Clone)]
pub(crate) struct MultiEngine {
    alloc: VoiceAllocator,
    slots: [VoiceSlot; NUM_VOICES],
}

impl MultiEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            alloc: VoiceAllocator::new(),
            slots: core::array::from_fn(|v| VoiceSlot::new(seed.wrapping_add(2 * v as u64))),
        }
    }
}

impl EngineVariant for MultiEngine {
    type Patch = MultiPatch;

    fn load(&mut self, core: &mut EngineCore, patch: &MultiPatch) {
        self.alloc.reset();
        for slot in self.slots.iter_mut() {
            slot.reset();
        }
        self.refresh(core, patch);
    }

    fn refresh(&mut self, core: &mut EngineCore, patch: &MultiPatch) {
        self.alloc.init_exclusive(&patch.policies(), core.num_voices);
    }

    fn note(
        &mut self,
        context: &EngineContext,
        core: &mut EngineCore,
        patch: &MultiPatch,
        slot: usize,
        event: NoteEvent,
    ) {
        if slot >= MULTI_INSTRUMENTS {
            return;
        }
        let ins = &patch.instruments[slot];
        match event {
            NoteEvent::On { note, velocity } => {
                let v = self.alloc.get(slot as u8, ins.policy, core.num_voices) as usize;
                let state = &mut self.slots[v];
                state.instrument = Some(slot as u8);
                state.note = note;
                state.held = true;
                let trigger = NoteTrigger {
                    note,
                    velocity,
                    accent: velocity >= ACCENT_VELOCITY,
                    ..Default::default()
                };
                core.voices[v].note_on(context, &ins.voice, trigger);
                state.env.request_accent(trigger.accent);
                state.env.restart();
                for (lfo, p) in state.lfos.iter_mut().zip(ins.lfos.iter()) {
                    if p.lfo.opts.key_sync() {
                        lfo.restart();
                    }
                }
            }
            NoteEvent::Off { note } => {
                for (v, state) in self.slots.iter_mut().enumerate() {
                    if state.held && state.note == note && state.instrument == Some(slot as u8) {
                        state.held = false;
                        state.env.release();
                        core.voices[v].note_off(0);
                        self.alloc.release(v as u8);
                    }
                }
            }
        }
    }

    fn all_notes_off(&mut self, core: &mut EngineCore) {
        for (v, state) in self.slots.iter_mut().enumerate() {
            state.held = false;
            state.env.release();
            core.voices[v].note_off(0);
            self.alloc.release(v as u8);
        }
    }

    fn tick(
        &mut self,
        context: &EngineContext,
        clock: &ClockEvents,
        core: &mut EngineCore,
        patch: &MultiPatch,
    ) -> [FilterInput; NUM_FILTERS] {
        let mut cutoff = [0i32; NUM_FILTERS];
        for v in 0..core.num_voices {
            let state = &mut self.slots[v];
            let Some(i) = state.instrument else {
                continue;
            };
            let ins = &patch.instruments[i as usize];
            let env = state.env.next(context, clock.clock, &ins.env) as i32 / 2;
            let mut input = VoiceInput {
                pitch_mod: depth_scale(env, ins.env_pitch),
                pitch_bend: core.controllers.pitch_bend[i as usize],
                ..Default::default()
            };
            let mut cutoff_mod = depth_scale(env, ins.env_cutoff);
            for (lfo, p) in state.lfos.iter_mut().zip(ins.lfos.iter()) {
                let lfo_in = LfoInput {
                    clock: clock.clock,
                    ..Default::default()
                };
                let out = lfo.next(context, lfo_in, &p.lfo) as i32 / 2;
                input.pitch_mod += depth_scale(out, p.depth_pitch);
                input.pw_mod += depth_scale(out, p.depth_pw);
                cutoff_mod += depth_scale(out, p.depth_cutoff);
            }
            cutoff[v / VOICES_PER_CHIP] += cutoff_mod;
            core.voices[v].next(context, input, &ins.voice);
        }
        core::array::from_fn(|f| FilterInput {
            cutoff_mod: cutoff[f],
            keytrack_frq: core.voices[f * VOICES_PER_CHIP].linear_frq(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::EnvParams;
    use crate::voice::VoiceWaveform;

    struct Rig {
        ctx: EngineContext,
        core: EngineCore,
        engine: MultiEngine,
        patch: MultiPatch,
    }

    impl Rig {
        fn new(patch: MultiPatch) -> Self {
            let mut ret = Self {
                ctx: EngineContext::default(),
                core: EngineCore::new(NUM_VOICES, 5),
                engine: MultiEngine::new(5),
                patch,
            };
            ret.engine.load(&mut ret.core, &ret.patch);
            ret
        }
        fn note(&mut self, slot: usize, event: NoteEvent) {
            self.engine.note(&self.ctx, &mut self.core, &self.patch, slot, event);
        }
        fn tick(&mut self) -> [FilterInput; NUM_FILTERS] {
            self.engine.tick(&self.ctx, &ClockEvents::default(), &mut self.core, &self.patch)
        }
        fn playing(&self) -> usize {
            self.core.voices.iter().filter(|v| v.gate()).count()
        }
    }

    fn on(note: u8) -> NoteEvent {
        NoteEvent::On { note, velocity: 64 }
    }

    #[test]
    fn chords_are_polyphonic() {
        let mut rig = Rig::new(MultiPatch::default());
        for note in [60, 64, 67] {
            rig.note(0, on(note));
        }
        rig.tick();
        assert_eq!(rig.playing(), 3);
        rig.note(0, NoteEvent::Off { note: 64 });
        rig.tick();
        assert_eq!(rig.playing(), 2);
        let notes: Vec<u8> = rig.core.voices.iter().filter(|v| v.gate()).map(|v| v.note()).collect();
        assert!(notes.contains(&60) && notes.contains(&67));
    }

    #[test]
    fn note_off_only_releases_own_instrument() {
        let mut rig = Rig::new(MultiPatch::default());
        rig.note(0, on(60));
        rig.note(1, on(60));
        rig.tick();
        assert_eq!(rig.playing(), 2);
        rig.note(1, NoteEvent::Off { note: 60 });
        rig.tick();
        assert_eq!(rig.playing(), 1);
        assert_eq!(rig.engine.slots[0].instrument, Some(0));
        assert!(rig.core.voices[0].gate());
    }

    #[test]
    fn instruments_use_their_own_voice_params() {
        let mut patch = MultiPatch::default();
        patch.instruments[2].voice.waveform = VoiceWaveform {
            saw: true,
            ..Default::default()
        };
        // instrument 2 is pinned to the right chip
        patch.instruments[2].policy = 2;
        let mut rig = Rig::new(patch);
        rig.note(2, on(50));
        rig.note(0, on(50));
        rig.tick();
        assert!(rig.core.voices[3].regs().waveform.saw);
        assert!(rig.core.voices[0].regs().waveform.pulse);
    }

    #[test]
    fn envelope_sums_into_chip_cutoff() {
        let mut patch = MultiPatch::default();
        for ins in patch.instruments.iter_mut() {
            ins.env = EnvParams::adsr(0, 0, 0xFF, 0);
            ins.env_cutoff = 0xC0;
        }
        let mut rig = Rig::new(patch);
        rig.note(0, on(60));
        let single = (0..5).map(|_| rig.tick()[0].cutoff_mod).last().unwrap_or(0);
        assert!(single > 0);
        rig.note(0, on(64));
        let double = (0..5).map(|_| rig.tick()[0].cutoff_mod).last().unwrap_or(0);
        assert!(double > single);
        assert_eq!(rig.tick()[1].cutoff_mod, 0);
    }
}
