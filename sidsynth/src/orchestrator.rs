//! The top level of the sound engine: one shared clock and one
//! [EngineInstance] per chip pair.

use arrayvec::ArrayVec;

use crate::clock::{ClockGenerator, ClockMode};
use crate::config::SynthConfig;
use crate::context::EngineContext;
use crate::engine::{EngineInstance, ProgramRequest};
use crate::midi::MidiEvent;
use crate::patch::Patch;
use crate::registers::RegisterBlock;
use crate::MAX_ENGINES;

/// Owns the clock and the engines, and dispatches MIDI input between ticks
#[derive(Clone)]
pub struct Orchestrator {
    context: EngineContext,
    clock: ClockGenerator,
    engines: ArrayVec<EngineInstance, MAX_ENGINES>,
}

impl Orchestrator {
    /// Build the clock and one engine per configured chip pair.  Engine `n`
    /// seeds its random generators with `random_seed + n`.
    pub fn new(config: &SynthConfig) -> Self {
        let context = config.context();
        let mut clock = ClockGenerator::new(&context);
        clock.set_mode(config.clock_mode);
        clock.bpm_set(&context, config.bpm);
        let engines = config
            .engines
            .iter()
            .enumerate()
            .map(|(n, cfg)| EngineInstance::new(n as u8, *cfg, config.random_seed.wrapping_add(n as u64)))
            .collect();
        log::info!(
            "{} engine(s), tick period {} us",
            config.engines.len(),
            context.tick_period_us()
        );
        Self {
            context,
            clock,
            engines,
        }
    }
    /// The processing context shared by all engines
    pub fn context(&self) -> &EngineContext {
        &self.context
    }
    /// The clock
    pub fn clock(&self) -> &ClockGenerator {
        &self.clock
    }
    /// Select master/slave behaviour of the clock
    pub fn set_clock_mode(&mut self, mode: ClockMode) {
        self.clock.set_mode(mode);
    }
    /// Set the tempo of the internal clock
    pub fn set_bpm(&mut self, bpm: f32) {
        self.clock.bpm_set(&self.context, bpm);
    }
    /// All engines
    pub fn engines(&self) -> &[EngineInstance] {
        &self.engines
    }
    /// Engine `n`, if configured
    pub fn engine(&self, n: usize) -> Option<&EngineInstance> {
        self.engines.get(n)
    }
    /// The register image of engine `n`
    pub fn registers(&self, n: usize) -> Option<&RegisterBlock> {
        self.engines.get(n).map(EngineInstance::registers)
    }

    /// Replace the patch of engine `n`.  Returns false if there is no such
    /// engine.
    pub fn load_patch(&mut self, n: usize, patch: Patch) -> bool {
        match self.engines.get_mut(n) {
            Some(engine) => {
                engine.load_patch(patch);
                true
            }
            None => {
                log::warn!("load_patch: no engine {}", n);
                false
            }
        }
    }

    /// Write one byte of the patch of engine `n`, see
    /// [EngineInstance::write_param]
    pub fn write_param(&mut self, n: usize, addr: u16, wopt: u8, value: u8) -> bool {
        match self.engines.get_mut(n) {
            Some(engine) => engine.write_param(addr, wopt, value),
            None => {
                log::warn!("write_param: no engine {}", n);
                false
            }
        }
    }

    /// Apply one MIDI event.  Realtime messages go to the clock, channel
    /// messages to every engine whose routing accepts them.  Program changes
    /// are returned for the caller to resolve.
    pub fn handle_midi(&mut self, event: &MidiEvent) -> ArrayVec<ProgramRequest, MAX_ENGINES> {
        let mut requests = ArrayVec::new();
        if let MidiEvent::Realtime(rt) = event {
            self.clock.midi_realtime(*rt);
            return requests;
        }
        for engine in self.engines.iter_mut() {
            if let Some(req) = engine.handle_midi(&self.context, event) {
                requests.push(req);
            }
        }
        requests
    }

    /// Advance everything by one tick.  Returns true if any register of any
    /// engine changed.
    pub fn tick(&mut self) -> bool {
        let clock = self.clock.tick();
        let mut changed = false;
        for engine in self.engines.iter_mut() {
            changed |= engine.tick(&self.context, &clock);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RealtimeEvent;
    use crate::config::{EngineConfig, MidiRouting};

    fn two_engines() -> SynthConfig {
        let mut config = SynthConfig::default();
        let mut second = EngineConfig::default();
        second.routing[0] = MidiRouting::on_channel(1);
        config.engines.push(second);
        config
    }

    fn note_on(channel: u8) -> MidiEvent {
        MidiEvent::NoteOn {
            channel,
            note: 60,
            velocity: 100,
        }
    }

    #[test]
    fn channels_select_engines() {
        let mut orch = Orchestrator::new(&two_engines());
        assert_eq!(orch.engines().len(), 2);
        orch.handle_midi(&note_on(1));
        assert!(orch.tick());
        assert!(!orch.registers(0).is_some_and(|r| r.voice(0).gate));
        assert!(orch.registers(1).is_some_and(|r| r.voice(0).gate));
    }

    #[test]
    fn quiet_when_nothing_moves() {
        let mut orch = Orchestrator::new(&SynthConfig::default());
        orch.handle_midi(&note_on(0));
        for _ in 0..4 {
            orch.tick();
        }
        assert!(!orch.tick());
    }

    #[test]
    fn program_changes_are_returned() {
        let mut config = two_engines();
        config.engines[1].routing[0] = MidiRouting::on_channel(0);
        let mut orch = Orchestrator::new(&config);
        let requests = orch.handle_midi(&MidiEvent::ProgramChange { channel: 0, program: 5 });
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].engine, 1);
        assert_eq!(requests[1].program, 5);
    }

    #[test]
    fn realtime_drives_clock() {
        let mut orch = Orchestrator::new(&SynthConfig::default());
        orch.handle_midi(&MidiEvent::Realtime(RealtimeEvent::Start));
        assert!(orch.clock().is_running());
        orch.handle_midi(&MidiEvent::Realtime(RealtimeEvent::Stop));
        assert!(!orch.clock().is_running());
    }

    #[test]
    fn bad_engine_index() {
        let mut orch = Orchestrator::new(&SynthConfig::default());
        assert!(!orch.write_param(3, 0x60, 0, 1));
        assert!(!orch.load_patch(3, Patch::default()));
        assert!(orch.write_param(0, 0x60, 3, 2));
        assert_eq!(orch.engine(0).map(|e| e.patch().encode()[0xB0]), Some(2));
    }
}
