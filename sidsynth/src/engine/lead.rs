use super::trigger::{TriggerSource, TriggerTargets};
use super::{EngineCore, EngineVariant, NoteEvent, ACCENT_VELOCITY};
use crate::clock::ClockEvents;
use crate::context::EngineContext;
use crate::devices::{Device, EnvelopeGenerator, LfoGenerator, LfoInput, WavetableSequencer, WtInput};
use crate::filter::FilterInput;
use crate::modulation::{ModDestinations, ModDst, ModMatrix, ModSources, ModSrc};
use crate::patch::{LeadPatch, LEAD_ENVS, LEAD_LFOS, LEAD_WTS};
use crate::voice::{ArpEvent, Arpeggiator, NoteStack, NoteTrigger, VoiceInput};
use crate::{NUM_FILTERS, NUM_VOICES, VOICES_PER_CHIP};

/// Detune direction of each voice
const DETUNE_SPREAD: [i32; NUM_VOICES] = [0, 1, -1, 0, -1, 1];

/// The Lead engine: one monophonic instrument on all voices, with the
/// modulation matrix, the trigger matrix and four wavetable sequencers
#[derive(Clone)]
pub(crate) struct LeadEngine {
    notes: NoteStack,
    arp: Arpeggiator,
    envs: [EnvelopeGenerator; LEAD_ENVS],
    lfos: [LfoGenerator; LEAD_LFOS],
    wts: [WavetableSequencer; LEAD_WTS],
    matrix: ModMatrix,
    src: ModSources,
    dst: ModDestinations,
    // bit n: TriggerSource n fired and has not been applied yet
    pending: u16,
    accent: bool,
}

impl LeadEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            notes: NoteStack::new(),
            arp: Arpeggiator::new(),
            envs: Default::default(),
            lfos: core::array::from_fn(|l| LfoGenerator::new(seed.wrapping_add(l as u64 + 1))),
            wts: Default::default(),
            matrix: ModMatrix::new(),
            src: ModSources::default(),
            dst: ModDestinations::default(),
            pending: 0,
            accent: false,
        }
    }

    fn fire(&mut self, src: TriggerSource) {
        self.pending |= 1 << src as u16;
    }

    fn fired(&self, src: TriggerSource) -> bool {
        self.pending & (1 << src as u16) != 0
    }

    /// Move every voice to `note`.  Unless played legato, fire the note on
    /// trigger.
    fn play(&mut self, core: &mut EngineCore, patch: &LeadPatch, note: u8, velocity: u8, legato: bool) {
        let trigger = NoteTrigger {
            note,
            velocity,
            legato,
            glide: true,
            accent: velocity >= ACCENT_VELOCITY,
        };
        for (voice, params) in core.voices.iter_mut().zip(patch.voices.iter()).take(core.num_voices) {
            voice.set_note(params, trigger);
        }
        if !legato {
            self.accent = trigger.accent;
            self.fire(TriggerSource::NoteOn);
        }
    }

    /// Merge the rows of all pending sources and act on them.  Returns the
    /// wavetable step requests.
    fn apply_triggers(&mut self, context: &EngineContext, core: &mut EngineCore, patch: &LeadPatch) -> u8 {
        if self.pending == 0 {
            return 0;
        }
        let mut on = 0;
        let mut off = 0;
        for src in TriggerSource::elements() {
            if !self.fired(*src) {
                continue;
            }
            let row = patch.triggers.row(*src).bits();
            if *src == TriggerSource::NoteOff {
                off |= row;
            } else {
                on |= row;
            }
        }
        let note_on = self.fired(TriggerSource::NoteOn);
        self.pending = 0;
        let (on, off) = (TriggerTargets::from_bits(on), TriggerTargets::from_bits(off));

        for v in 0..core.num_voices {
            if off.gate(v) {
                core.voices[v].note_off(0);
            }
            if on.gate(v) {
                if note_on {
                    core.voices[v].retrigger(context, &patch.voices[v], false);
                } else {
                    core.voices[v].gate_on();
                }
            }
        }

        let env_bits = [
            (TriggerTargets::ENV1_ATTACK, TriggerTargets::ENV1_RELEASE),
            (TriggerTargets::ENV2_ATTACK, TriggerTargets::ENV2_RELEASE),
        ];
        let any = on.bits() | off.bits();
        for (env, (attack, release)) in self.envs.iter_mut().zip(env_bits) {
            if any & release != 0 {
                env.release();
            }
            if any & attack != 0 {
                env.request_accent(self.accent);
                env.restart();
            }
        }
        for (l, lfo) in self.lfos.iter_mut().enumerate() {
            if on.lfo_restart(l) || (note_on && patch.lfos[l].opts.key_sync()) {
                lfo.restart();
            }
        }
        let mut steps = 0;
        for (w, wt) in self.wts.iter_mut().enumerate() {
            if on.wt_restart(w) || (note_on && patch.wavetables[w].key_sync) {
                wt.restart();
            }
            if on.wt_step(w) {
                steps |= 1 << w;
            }
        }
        steps
    }

    fn update_sources(&mut self, core: &EngineCore) {
        let src = &mut self.src;
        for k in 0..5 {
            src.set(ModSrc::knob(k), core.knobs[k].mod_value());
        }
        let voice = &core.voices[0];
        src.set(ModSrc::ModWheel, (core.controllers.mod_wheel as i16) << 8);
        src.set(ModSrc::Key, (voice.note() as i16 & 0x7F) << 8);
        src.set(ModSrc::Velocity, (voice.velocity() as i16 & 0x7F) << 8);
        src.set(ModSrc::PitchBend, core.controllers.pitch_bend[0] << 2);
        src.set(ModSrc::Aftertouch, (core.controllers.aftertouch as i16 & 0x7F) << 8);
    }
}

impl EngineVariant for LeadEngine {
    type Patch = LeadPatch;

    fn load(&mut self, _core: &mut EngineCore, _patch: &LeadPatch) {
        self.notes.clear();
        self.arp.reset();
        for env in self.envs.iter_mut() {
            env.reset();
        }
        for lfo in self.lfos.iter_mut() {
            lfo.reset();
        }
        self.wts = Default::default();
        self.matrix.reset();
        self.src = ModSources::default();
        self.dst.clear();
        self.pending = 0;
        self.accent = false;
    }

    fn note(
        &mut self,
        _context: &EngineContext,
        core: &mut EngineCore,
        patch: &LeadPatch,
        slot: usize,
        event: NoteEvent,
    ) {
        if slot != 0 {
            return;
        }
        let arp = patch.arp.opts.enabled();
        match event {
            NoteEvent::On { note, velocity } if arp => self.arp.note_on(note, velocity, &patch.arp),
            NoteEvent::Off { note } if arp => self.arp.note_off(note, &patch.arp),
            NoteEvent::On { note, velocity } => {
                let legato = patch.legato && !self.notes.is_empty();
                self.notes.push(note, velocity);
                self.play(core, patch, note, velocity, legato);
            }
            NoteEvent::Off { note } => {
                let was_playing = self.notes.last().is_some_and(|n| n.note == note);
                if !self.notes.remove(note) {
                    return;
                }
                match self.notes.last() {
                    None => self.fire(TriggerSource::NoteOff),
                    Some(held) if was_playing => {
                        self.play(core, patch, held.note, held.velocity, patch.legato)
                    }
                    Some(_) => {}
                }
            }
        }
    }

    fn all_notes_off(&mut self, core: &mut EngineCore) {
        self.notes.clear();
        self.arp.reset();
        for voice in core.voices.iter_mut() {
            voice.note_off(0);
        }
        for env in self.envs.iter_mut() {
            env.release();
        }
    }

    fn tick(
        &mut self,
        context: &EngineContext,
        clock: &ClockEvents,
        core: &mut EngineCore,
        patch: &LeadPatch,
    ) -> [FilterInput; NUM_FILTERS] {
        for (fired, src) in [
            (clock.clock, TriggerSource::Clock),
            (clock.clock6, TriggerSource::Clock6),
            (clock.clock24, TriggerSource::Clock24),
            (clock.start, TriggerSource::MidiStart),
        ] {
            if fired {
                self.fire(src);
            }
        }
        if patch.arp.opts.enabled() {
            match self.arp.tick(clock.clock, &patch.arp, &mut core.rng) {
                ArpEvent::NoteOn { note, velocity } => self.play(core, patch, note, velocity, false),
                ArpEvent::NoteOff => self.fire(TriggerSource::NoteOff),
                ArpEvent::None => {}
            }
        }
        let steps = self.apply_triggers(context, core, patch);

        self.update_sources(core);
        for (l, lfo) in self.lfos.iter_mut().enumerate() {
            let input = LfoInput {
                clock: clock.clock,
                depth_mod: self.dst[ModDst::lfo_depth(l)],
                rate_mod: self.dst[ModDst::lfo_rate(l)],
            };
            let out = lfo.next(context, input, &patch.lfos[l]);
            self.src.set(ModSrc::lfo(l), out);
            if lfo.period_wrapped() {
                self.pending |= 1 << TriggerSource::lfo(l) as u16;
            }
        }
        let sustain = [TriggerSource::Env1Sustain, TriggerSource::Env2Sustain];
        for (e, env) in self.envs.iter_mut().enumerate() {
            let out = env.next(context, clock.clock, &patch.envs[e]);
            self.src.set(ModSrc::ELEM[ModSrc::Env1 as usize + e], out);
            if env.sustain_reached() {
                self.pending |= 1 << sustain[e] as u16;
            }
        }
        for (w, wt) in self.wts.iter_mut().enumerate() {
            let input = WtInput {
                clock: clock.clock,
                step: steps & (1 << w) != 0,
                position_mod: self.dst[ModDst::wavetable(w)],
            };
            wt.tick(&input, &patch.wavetables[w], &patch.wt_memory);
            self.src.set(ModSrc::wavetable(w), wt.mod_source());
        }
        self.matrix.evaluate(&patch.routes, &mut self.src, &mut self.dst);

        let detune = patch.detune as i32 / 2;
        for v in 0..core.num_voices {
            let mut input = VoiceInput {
                pitch_mod: self.dst[ModDst::pitch(v)],
                pw_mod: self.dst[ModDst::pw(v)],
                pitch_bend: core.controllers.pitch_bend[0],
                detune: DETUNE_SPREAD[v] * detune,
                ..Default::default()
            };
            for (wt, params) in self.wts.iter().zip(patch.wavetables.iter()) {
                if params.voices & (1 << v) == 0 || wt.position().is_none() {
                    continue;
                }
                if wt.note() != 0 {
                    input.wt_note = Some(wt.note());
                }
                if let Some(waveform) = wt.waveform() {
                    input.wt_waveform = Some(waveform);
                }
            }
            core.voices[v].next(context, input, &patch.voices[v]);
        }

        core::array::from_fn(|f| FilterInput {
            cutoff_mod: self.dst[ModDst::filter(f)],
            volume_mod: self.dst[ModDst::volume(f)],
            volume: 0,
            keytrack_frq: core.voices[f * VOICES_PER_CHIP].linear_frq(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{EnvParams, LfoOptions, LfoWave, WtParams};
    use crate::modulation::ModRoute;
    use crate::voice::{ArpMode, ArpOptions};

    struct Rig {
        ctx: EngineContext,
        core: EngineCore,
        engine: LeadEngine,
        patch: LeadPatch,
    }

    impl Rig {
        fn new(patch: LeadPatch) -> Self {
            let mut ret = Self {
                ctx: EngineContext::default(),
                core: EngineCore::new(NUM_VOICES, 7),
                engine: LeadEngine::new(7),
                patch,
            };
            ret.engine.load(&mut ret.core, &ret.patch);
            ret
        }
        fn note(&mut self, event: NoteEvent) {
            self.engine.note(&self.ctx, &mut self.core, &self.patch, 0, event);
        }
        fn tick_with(&mut self, clock: ClockEvents) -> [FilterInput; NUM_FILTERS] {
            self.engine.tick(&self.ctx, &clock, &mut self.core, &self.patch)
        }
        fn tick(&mut self) -> [FilterInput; NUM_FILTERS] {
            self.tick_with(ClockEvents::default())
        }
        fn gates(&self) -> [bool; NUM_VOICES] {
            core::array::from_fn(|v| self.core.voices[v].gate())
        }
    }

    fn on(note: u8) -> NoteEvent {
        NoteEvent::On { note, velocity: 64 }
    }

    #[test]
    fn note_opens_and_closes_all_gates() {
        let mut rig = Rig::new(LeadPatch::default());
        rig.note(on(60));
        rig.tick();
        assert_eq!(rig.gates(), [true; NUM_VOICES]);
        rig.note(NoteEvent::Off { note: 60 });
        rig.tick();
        assert_eq!(rig.gates(), [false; NUM_VOICES]);
    }

    #[test]
    fn last_note_priority() {
        let mut rig = Rig::new(LeadPatch::default());
        rig.note(on(60));
        rig.note(on(64));
        rig.tick();
        assert_eq!(rig.core.voices[0].note(), 64);
        rig.note(NoteEvent::Off { note: 64 });
        rig.tick();
        assert_eq!(rig.core.voices[0].note(), 60);
        // releasing a note that is not sounding changes nothing
        rig.note(on(67));
        rig.note(NoteEvent::Off { note: 60 });
        rig.tick();
        rig.tick();
        assert_eq!(rig.core.voices[0].note(), 67);
        assert!(rig.core.voices[0].gate());
    }

    #[test]
    fn legato_keeps_gate_open() {
        let patch = LeadPatch {
            legato: true,
            ..Default::default()
        };
        let mut rig = Rig::new(patch);
        rig.note(on(60));
        rig.tick();
        rig.note(on(62));
        rig.tick();
        assert!(rig.core.voices[0].gate());
        assert_eq!(rig.core.voices[0].note(), 62);

        let mut rig = Rig::new(LeadPatch::default());
        rig.note(on(60));
        rig.tick();
        rig.note(on(62));
        rig.tick();
        // retriggered: closed for one tick
        assert!(!rig.core.voices[0].gate());
        rig.tick();
        assert!(rig.core.voices[0].gate());
    }

    #[test]
    fn trigger_row_selects_gates() {
        let mut patch = LeadPatch::default();
        patch.triggers.rows[TriggerSource::NoteOn as usize] =
            TriggerTargets::from_bits(0b000_001 | TriggerTargets::ENV1_ATTACK);
        let mut rig = Rig::new(patch);
        rig.note(on(60));
        rig.tick();
        assert_eq!(rig.gates(), [true, false, false, false, false, false]);
    }

    #[test]
    fn envelope_modulates_pitch() {
        let mut patch = LeadPatch::default();
        patch.envs[0] = EnvParams::adsr(0, 0, 0xFF, 0);
        patch.routes[0] = ModRoute::simple(ModSrc::Env1, ModDst::Pitch1, 0xFF);
        let mut rig = Rig::new(patch);
        rig.note(on(60));
        for _ in 0..10 {
            rig.tick();
        }
        let plain = crate::note_to_sid_frequency(rig.core.voices[1].linear_frq());
        assert_eq!(rig.core.voices[1].regs().freq, plain);
        assert!(rig.core.voices[0].regs().freq > plain);
    }

    #[test]
    fn lfo_period_fires_trigger() {
        let mut patch = LeadPatch::default();
        patch.lfos[0].opts = LfoOptions::with_wave(LfoWave::SawUp);
        patch.lfos[0].rate = 0xFF;
        patch.triggers.rows[TriggerSource::NoteOn as usize] = TriggerTargets::default();
        patch.triggers.rows[TriggerSource::Lfo1Period as usize] = TriggerTargets::from_bits(0b100);
        let mut rig = Rig::new(patch);
        let mut opened = false;
        for _ in 0..2000 {
            rig.tick();
            opened |= rig.core.voices[2].gate();
        }
        assert!(opened);
        assert!(!rig.core.voices[0].gate());
    }

    #[test]
    fn key_synced_wavetable_plays_notes() {
        let mut patch = LeadPatch::default();
        patch.wavetables[0] = WtParams {
            divider: 0,
            key_sync: true,
            voices: 0b000_001,
            begin: 0,
            end: 1,
            ..Default::default()
        };
        patch.wt_memory[0] = 48;
        patch.wt_memory[1] = 72;
        let mut rig = Rig::new(patch);
        rig.note(on(60));
        rig.tick();
        assert_eq!(rig.engine.wts[0].position(), Some(0));
        assert_eq!(rig.core.voices[0].regs().freq, crate::note_to_sid_frequency(crate::NoteFxP::from_bits(48 << 9)));
        assert_eq!(rig.core.voices[1].regs().freq, crate::note_to_sid_frequency(crate::NoteFxP::from_bits(60 << 9)));
        let clock = ClockEvents {
            clock: true,
            ..Default::default()
        };
        rig.tick_with(clock);
        assert_eq!(rig.engine.wts[0].position(), Some(1));
        assert_eq!(rig.engine.src[ModSrc::Wt1], 72 << 8);
    }

    #[test]
    fn arpeggiator_steps_on_clock() {
        let mut patch = LeadPatch::default();
        patch.arp.opts = ArpOptions::with_mode(ArpMode::Up);
        let mut rig = Rig::new(patch);
        rig.note(on(60));
        rig.note(on(64));
        let clock = ClockEvents {
            clock: true,
            ..Default::default()
        };
        let mut played = [false; 2];
        for _ in 0..16 {
            rig.tick_with(clock);
            match rig.core.voices[0].note() {
                60 => played[0] = true,
                64 => played[1] = true,
                _ => {}
            }
        }
        assert_eq!(played, [true, true]);
    }

    #[test]
    fn filter_inputs_follow_voices() {
        let mut rig = Rig::new(LeadPatch::default());
        rig.note(on(72));
        let inputs = rig.tick();
        assert_eq!(inputs[0].keytrack_frq, rig.core.voices[0].linear_frq());
        assert_eq!(inputs[1].keytrack_frq, rig.core.voices[3].linear_frq());
        assert_eq!(inputs[0].cutoff_mod, 0);
    }
}
