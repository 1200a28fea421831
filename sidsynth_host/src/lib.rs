//! Runs the `sidsynth` engine in real time on a std host.
//!
//! A [SynthHost] owns a driver thread that ticks an [Orchestrator] at the
//! configured tick period.  Other threads talk to it through a bounded queue
//! of [HostEvent]s, which the driver drains completely at the start of every
//! tick.  Register images go out through a [RegisterSink] after every tick
//! that changed something.

use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sidsynth::config::SynthConfig;
use sidsynth::context::UpdateSpeed;
use sidsynth::midi::MidiEvent;
use sidsynth::orchestrator::Orchestrator;
use sidsynth::patch::Patch;
use sidsynth::registers::RegisterBlock;
use wmidi::MidiMessage;

pub mod bank;
pub mod error;
pub mod instrumentation;

pub use bank::PatchBank;
pub use error::{HostError, Result};
use instrumentation::TickStats;

/// Name of the driver thread
pub const DRIVER_THREAD_NAME: &str = "sidsynth-tick";

/// Host configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// The engine configuration
    pub synth: SynthConfig,
    /// Capacity of the event queue
    pub queue_depth: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            synth: SynthConfig::default(),
            queue_depth: 64,
        }
    }
}

impl HostConfig {
    /// Reject configurations the host cannot run.  The core falls back to
    /// defaults for bad values, the host refuses them up front.
    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 {
            return Err(HostError::InvalidConfig("queue depth must be at least 1"));
        }
        if self.synth.engines.is_empty() {
            return Err(HostError::InvalidConfig("no engines configured"));
        }
        UpdateSpeed::try_from(self.synth.update_speed_factor).map_err(HostError::InvalidConfig)?;
        if !self.synth.bpm.is_finite() || self.synth.bpm < 1.0 {
            return Err(HostError::InvalidConfig("tempo must be at least 1 BPM"));
        }
        Ok(())
    }
}

/// Something for the driver thread to do before its next tick
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// A decoded MIDI event
    Midi(MidiEvent),
    /// Write one parameter of an engine's patch
    WriteParam {
        /// Engine index
        engine: usize,
        /// Patch address
        addr: u16,
        /// Write option (stereo/group fan-out)
        wopt: u8,
        /// New value
        value: u8,
    },
    /// Replace an engine's patch
    LoadPatch {
        /// Engine index
        engine: usize,
        /// The new patch
        patch: Box<Patch>,
    },
}

/// Receives the register image of each engine after a tick that changed it
pub trait RegisterSink: Send {
    /// Write the registers of `engine`
    fn write(&mut self, engine: usize, regs: &RegisterBlock);
}

impl<F: FnMut(usize, &RegisterBlock) + Send> RegisterSink for F {
    fn write(&mut self, engine: usize, regs: &RegisterBlock) {
        self(engine, regs)
    }
}

fn enqueue(tx: &SyncSender<HostEvent>, event: HostEvent) -> Result<()> {
    tx.try_send(event).map_err(|e| match e {
        TrySendError::Full(ev) => {
            log::warn!("event queue full, dropping {:?}", ev);
            HostError::QueueFull
        }
        TrySendError::Disconnected(_) => HostError::Disconnected,
    })
}

/// The state owned by the driver thread
struct Driver<S: RegisterSink> {
    orch: Orchestrator,
    bank: PatchBank,
    sink: S,
    rx: Receiver<HostEvent>,
    stats: TickStats,
}

impl<S: RegisterSink> Driver<S> {
    fn new(config: &SynthConfig, bank: PatchBank, sink: S, rx: Receiver<HostEvent>) -> Self {
        Self {
            orch: Orchestrator::new(config),
            bank,
            sink,
            rx,
            stats: TickStats::new(),
        }
    }

    fn apply(&mut self, event: HostEvent) {
        match event {
            HostEvent::Midi(midi) => {
                for req in self.orch.handle_midi(&midi) {
                    if let Some(patch) = self.bank.resolve(&req) {
                        log::info!("engine {}: program {} '{}'", req.engine, req.program, patch.name());
                        self.orch.load_patch(req.engine as usize, patch.clone());
                    }
                }
            }
            HostEvent::WriteParam {
                engine,
                addr,
                wopt,
                value,
            } => {
                if !self.orch.write_param(engine, addr, wopt, value) {
                    log::warn!("engine {}: ignored write of {:#04x} to {:#05x}", engine, value, addr);
                }
            }
            HostEvent::LoadPatch { engine, patch } => {
                self.orch.load_patch(engine, *patch);
            }
        }
    }

    /// Drain the queue and run one tick.  Returns false once every sender is
    /// gone.
    fn step(&mut self) -> bool {
        let m = self.stats.begin();
        let mut connected = true;
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    connected = false;
                    break;
                }
            }
        }
        if self.orch.tick() {
            for (n, engine) in self.orch.engines().iter().enumerate() {
                self.sink.write(n, engine.registers());
            }
        }
        self.stats.end(m);
        connected
    }

    fn run(mut self, running: &AtomicBool) -> TickStats {
        let period = Duration::from_micros(self.orch.context().tick_period_us() as u64);
        let mut deadline = Instant::now() + period;
        while running.load(Relaxed) {
            if !self.step() {
                log::debug!("all senders gone, stopping");
                break;
            }
            let now = Instant::now();
            if now < deadline {
                thread::sleep(deadline - now);
                deadline += period;
            } else {
                // drop the ticks we are late for rather than bursting
                let late = (now - deadline).as_micros() / period.as_micros().max(1);
                let missed = late as u32;
                if missed > 0 {
                    log::warn!("tick deadline missed, dropping {} tick(s)", missed);
                    self.stats.record_missed(missed as u64);
                }
                deadline += period * (missed + 1);
            }
        }
        self.stats
    }
}

/// Handle to a running synthesizer.  Dropping it stops the driver thread.
pub struct SynthHost {
    tx: SyncSender<HostEvent>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<TickStats>>,
}

impl SynthHost {
    /// Validate `config` and start the driver thread
    pub fn start<S: RegisterSink + 'static>(config: HostConfig, bank: PatchBank, sink: S) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = sync_channel(config.queue_depth);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let thread = thread::Builder::new()
            .name(DRIVER_THREAD_NAME.into())
            .spawn(move || Driver::new(&config.synth, bank, sink, rx).run(&flag))?;
        log::info!("tick driver started");
        Ok(Self {
            tx,
            running,
            thread: Some(thread),
        })
    }

    /// Queue an event for the next tick
    pub fn send(&self, event: HostEvent) -> Result<()> {
        enqueue(&self.tx, event)
    }

    /// Queue a raw MIDI message.  Messages the engine does not use are
    /// dropped silently.
    pub fn midi(&self, msg: &MidiMessage<'_>) -> Result<()> {
        match MidiEvent::try_from(msg) {
            Ok(event) => self.send(HostEvent::Midi(event)),
            Err(e) => {
                log::trace!("{}: {:?}", e, msg);
                Ok(())
            }
        }
    }

    /// Queue a parameter write
    pub fn write_param(&self, engine: usize, addr: u16, wopt: u8, value: u8) -> Result<()> {
        self.send(HostEvent::WriteParam {
            engine,
            addr,
            wopt,
            value,
        })
    }

    /// Queue a patch change
    pub fn load_patch(&self, engine: usize, patch: Patch) -> Result<()> {
        self.send(HostEvent::LoadPatch {
            engine,
            patch: Box::new(patch),
        })
    }

    /// Stop the driver thread and return its timing statistics
    pub fn stop(mut self) -> Result<TickStats> {
        self.shutdown().unwrap_or(Err(HostError::Disconnected))
    }

    fn shutdown(&mut self) -> Option<Result<TickStats>> {
        self.running.store(false, Relaxed);
        let thread = self.thread.take()?;
        Some(thread.join().map_err(|_| HostError::Panicked))
    }
}

impl Drop for SynthHost {
    fn drop(&mut self) {
        if let Some(Err(e)) = self.shutdown() {
            log::error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidsynth::patch::EngineKind;
    use std::sync::mpsc::{channel, Sender};

    type Captured = Sender<(usize, RegisterBlock)>;

    fn capture(tx: Captured) -> impl RegisterSink {
        move |n: usize, regs: &RegisterBlock| {
            let _ = tx.send((n, regs.clone()));
        }
    }

    fn note_on(note: u8) -> HostEvent {
        HostEvent::Midi(MidiEvent::NoteOn {
            channel: 0,
            note,
            velocity: 100,
        })
    }

    fn driver(bank: PatchBank) -> (SyncSender<HostEvent>, Driver<impl RegisterSink>, Receiver<(usize, RegisterBlock)>) {
        let (tx, rx) = sync_channel(8);
        let (out_tx, out_rx) = channel();
        let driver = Driver::new(&SynthConfig::default(), bank, capture(out_tx), rx);
        (tx, driver, out_rx)
    }

    #[test]
    fn events_apply_before_the_tick() {
        let (tx, mut driver, out) = driver(PatchBank::new());
        let patch = Box::new(Patch::new(EngineKind::Bassline));
        assert!(enqueue(&tx, HostEvent::LoadPatch { engine: 0, patch }).is_ok());
        assert!(enqueue(&tx, note_on(40)).is_ok());
        assert!(driver.step());
        assert_eq!(driver.orch.engine(0).map(|e| e.kind()), Some(EngineKind::Bassline));
        let (n, regs) = out.try_recv().unwrap_or_default();
        assert_eq!(n, 0);
        assert!(regs.voice(0).gate);
    }

    #[test]
    fn quiet_ticks_write_nothing() {
        let (tx, mut driver, out) = driver(PatchBank::new());
        assert!(enqueue(&tx, note_on(60)).is_ok());
        for _ in 0..5 {
            driver.step();
        }
        while out.try_recv().is_ok() {}
        driver.step();
        assert!(out.try_recv().is_err());
    }

    #[test]
    fn program_change_loads_from_bank() {
        let mut bank = PatchBank::new();
        bank.insert(0, 3, Patch::new(EngineKind::Drum));
        let (tx, mut driver, _out) = driver(bank);
        let pc = HostEvent::Midi(MidiEvent::ProgramChange { channel: 0, program: 3 });
        assert!(enqueue(&tx, pc).is_ok());
        driver.step();
        assert_eq!(driver.orch.engine(0).map(|e| e.kind()), Some(EngineKind::Drum));
        // an empty slot keeps the current patch
        let pc = HostEvent::Midi(MidiEvent::ProgramChange { channel: 0, program: 4 });
        assert!(enqueue(&tx, pc).is_ok());
        driver.step();
        assert_eq!(driver.orch.engine(0).map(|e| e.kind()), Some(EngineKind::Drum));
    }

    #[test]
    fn parameter_writes_reach_the_patch() {
        let (tx, mut driver, _out) = driver(PatchBank::new());
        let write = HostEvent::WriteParam {
            engine: 0,
            addr: 0x042,
            wopt: 0,
            value: 0x20,
        };
        assert!(enqueue(&tx, write).is_ok());
        driver.step();
        assert_eq!(driver.orch.engine(0).map(|e| e.patch().volume), Some(0x20));
    }

    #[test]
    fn full_queue_and_disconnect() {
        let (tx, rx) = sync_channel(1);
        assert!(enqueue(&tx, note_on(60)).is_ok());
        assert!(matches!(enqueue(&tx, note_on(61)), Err(HostError::QueueFull)));
        drop(rx);
        assert!(matches!(enqueue(&tx, note_on(62)), Err(HostError::Disconnected)));

        let (tx, mut driver, _out) = driver(PatchBank::new());
        drop(tx);
        assert!(!driver.step());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(HostConfig::default().validate().is_ok());
        let mut config = HostConfig {
            queue_depth: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HostError::InvalidConfig(_))));
        config.queue_depth = 4;
        config.synth.update_speed_factor = 9;
        assert!(matches!(config.validate(), Err(HostError::InvalidConfig(_))));
        config.synth.update_speed_factor = 2;
        config.synth.engines.clear();
        let sink = |_: usize, _: &RegisterBlock| {};
        assert!(matches!(
            SynthHost::start(config, PatchBank::new(), sink),
            Err(HostError::InvalidConfig(_))
        ));
    }

    #[test]
    fn running_host_plays_notes() {
        let (out_tx, out_rx) = channel();
        let host = match SynthHost::start(HostConfig::default(), PatchBank::new(), capture(out_tx)) {
            Ok(host) => host,
            Err(e) => panic!("{}", e),
        };
        let msg = MidiMessage::NoteOn(wmidi::Channel::Ch1, wmidi::Note::C4, wmidi::Velocity::MAX);
        assert!(host.midi(&msg).is_ok());
        // sysex is not for us
        assert!(host.midi(&MidiMessage::SysEx(&[])).is_ok());
        let deadline = Duration::from_secs(5);
        let gate = loop {
            match out_rx.recv_timeout(deadline) {
                Ok((_, regs)) if regs.voice(0).gate => break true,
                Ok(_) => continue,
                Err(_) => break false,
            }
        };
        assert!(gate);
        assert!(host.stop().is_ok());
    }
}
