use super::{EngineCore, EngineVariant, NoteEvent, ACCENT_VELOCITY};
use crate::clock::ClockEvents;
use crate::context::EngineContext;
use crate::devices::{Device, DrumWavetable};
use crate::filter::FilterInput;
use crate::patch::{DrumInstrument, DrumPatch};
use crate::voice::{NoteTrigger, VoiceAllocator, VoiceInput, VoiceParams};
use crate::{NUM_FILTERS, NUM_VOICES, VOICES_PER_CHIP};

fn voice_params(ins: &DrumInstrument, wt: &DrumWavetable) -> VoiceParams {
    VoiceParams {
        waveform: wt.waveform(),
        attack_decay: ins.attack_decay,
        sustain_release: ins.sustain_release,
        pulsewidth: (ins.pulsewidth as u16) << 4,
        transpose: ins.tune,
        ..Default::default()
    }
}

/// The Drum engine: up to 16 instruments, each triggered by its own note and
/// played by a drum model on whichever voice the allocator hands out
#[derive(Clone)]
pub(crate) struct DrumEngine {
    alloc: VoiceAllocator,
    wts: [DrumWavetable; NUM_VOICES],
    // the instrument each voice last played
    instrument: [Option<u8>; NUM_VOICES],
    gate_ctr: [u16; NUM_VOICES],
}

impl DrumEngine {
    pub fn new() -> Self {
        Self {
            alloc: VoiceAllocator::new(),
            wts: Default::default(),
            instrument: [None; NUM_VOICES],
            gate_ctr: [0; NUM_VOICES],
        }
    }
}

impl EngineVariant for DrumEngine {
    type Patch = DrumPatch;

    fn load(&mut self, core: &mut EngineCore, patch: &DrumPatch) {
        *self = Self::new();
        self.refresh(core, patch);
    }

    fn refresh(&mut self, core: &mut EngineCore, patch: &DrumPatch) {
        self.alloc.init_exclusive(&patch.policies(), core.num_voices);
    }

    fn note(
        &mut self,
        context: &EngineContext,
        core: &mut EngineCore,
        patch: &DrumPatch,
        _slot: usize,
        event: NoteEvent,
    ) {
        // drums ring out for their gate length, note offs are ignored
        let NoteEvent::On { note, velocity } = event else {
            return;
        };
        let Some(i) = patch.instrument_for(note) else {
            log::trace!("no drum instrument on note {}", note);
            return;
        };
        let ins = &patch.instruments[i];
        let v = self.alloc.get(i as u8, ins.policy, core.num_voices) as usize;
        self.wts[v].restart(ins.model);
        self.instrument[v] = Some(i as u8);
        self.gate_ctr[v] = context.scale_ticks(ins.gatelen.max(1) as u16);
        let trigger = NoteTrigger {
            note,
            velocity,
            accent: velocity >= ACCENT_VELOCITY,
            ..Default::default()
        };
        core.voices[v].note_on(context, &voice_params(ins, &self.wts[v]), trigger);
    }

    fn all_notes_off(&mut self, core: &mut EngineCore) {
        for v in 0..NUM_VOICES {
            core.voices[v].note_off(0);
            self.gate_ctr[v] = 0;
            self.alloc.release(v as u8);
        }
    }

    fn tick(
        &mut self,
        context: &EngineContext,
        _clock: &ClockEvents,
        core: &mut EngineCore,
        patch: &DrumPatch,
    ) -> [FilterInput; NUM_FILTERS] {
        for v in 0..core.num_voices {
            let Some(i) = self.instrument[v] else {
                continue;
            };
            let ins = &patch.instruments[i as usize];
            let wt = &mut self.wts[v];
            wt.tick(context, ins.speed);
            if self.gate_ctr[v] > 0 {
                self.gate_ctr[v] -= 1;
                if self.gate_ctr[v] == 0 {
                    core.voices[v].note_off(0);
                    self.alloc.release(v as u8);
                }
            }
            let input = VoiceInput {
                wt_note: Some(wt.note()),
                ..Default::default()
            };
            core.voices[v].next(context, input, &voice_params(ins, wt));
        }
        core::array::from_fn(|f| FilterInput {
            keytrack_frq: core.voices[f * VOICES_PER_CHIP].linear_frq(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::DRUM_MODELS;

    struct Rig {
        ctx: EngineContext,
        core: EngineCore,
        engine: DrumEngine,
        patch: DrumPatch,
    }

    impl Rig {
        fn new(patch: DrumPatch) -> Self {
            let mut ret = Self {
                ctx: EngineContext::default(),
                core: EngineCore::new(NUM_VOICES, 1),
                engine: DrumEngine::new(),
                patch,
            };
            ret.engine.load(&mut ret.core, &ret.patch);
            ret
        }
        fn hit(&mut self, note: u8) {
            let event = NoteEvent::On { note, velocity: 90 };
            self.engine.note(&self.ctx, &mut self.core, &self.patch, 0, event);
        }
        fn tick(&mut self) {
            self.engine.tick(&self.ctx, &ClockEvents::default(), &mut self.core, &self.patch);
        }
        fn gates(&self) -> usize {
            self.core.voices.iter().filter(|v| v.gate()).count()
        }
    }

    #[test]
    fn hit_plays_model_for_gate_length() {
        let mut rig = Rig::new(DrumPatch::default());
        rig.hit(36);
        rig.tick();
        assert_eq!(rig.gates(), 1);
        assert_eq!(rig.engine.instrument[0], Some(0));
        let first = DRUM_MODELS[0].steps[0];
        assert_eq!(rig.core.voices[0].regs().waveform.to_bits(), first.waveform);
        // the gate length counts update-speed-scaled ticks
        let gate_ticks = rig.ctx.scale_ticks(20);
        for _ in 0..gate_ticks - 2 {
            rig.tick();
        }
        assert_eq!(rig.gates(), 1);
        rig.tick();
        assert_eq!(rig.gates(), 0);
        rig.hit(36);
        rig.hit(36);
        assert_eq!(rig.engine.alloc.queue().iter().filter(|e| e.assigned).count(), 2);
    }

    #[test]
    fn note_offs_and_unknown_notes_are_ignored() {
        let mut rig = Rig::new(DrumPatch::default());
        rig.hit(10);
        rig.tick();
        assert_eq!(rig.gates(), 0);
        rig.hit(38);
        rig.engine.note(&rig.ctx, &mut rig.core, &rig.patch, 0, NoteEvent::Off { note: 38 });
        rig.tick();
        assert_eq!(rig.gates(), 1);
    }

    #[test]
    fn hits_rotate_through_voices() {
        let mut rig = Rig::new(DrumPatch::default());
        for note in 36..42 {
            rig.hit(note);
        }
        rig.tick();
        assert_eq!(rig.gates(), NUM_VOICES);
    }

    #[test]
    fn dedicated_voice_policy() {
        let mut patch = DrumPatch::default();
        // instrument 0 owns voice 4
        patch.instruments[0].policy = 3 + 4;
        let mut rig = Rig::new(patch);
        rig.hit(36);
        rig.tick();
        assert!(rig.core.voices[4].gate());
        for note in 37..42 {
            rig.hit(note);
        }
        assert_eq!(rig.engine.instrument[4], Some(0));
    }

    #[test]
    fn tune_transposes_model() {
        let mut patch = DrumPatch::default();
        patch.instruments[0].tune = 12;
        let mut rig = Rig::new(patch);
        rig.hit(36);
        rig.tick();
        let note = DRUM_MODELS[0].steps[0].note;
        let expected = crate::note_to_sid_frequency(crate::NoteFxP::from_bits(((note + 12) as u16) << 9));
        assert_eq!(rig.core.voices[0].regs().freq, expected);
    }
}
