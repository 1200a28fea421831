//! The shared tempo clock.
//!
//! Internally the engine runs at 96 pulses per quarter note.  As a master, the
//! pulses come from a BPM accumulator advanced once per tick.  As a slave,
//! each incoming 24 ppqn MIDI clock byte yields one pulse immediately and up
//! to three more, interpolated at a quarter of the measured period between
//! the last two clock bytes.

use serde::{Deserialize, Serialize};

use crate::context::EngineContext;

/// How the clock decides between master and slave operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ClockMode {
    /// Slave while MIDI clock bytes are arriving, master otherwise
    #[default]
    Auto,
    /// Always generate the clock from the internal BPM
    Master,
    /// Always follow incoming MIDI clock
    Slave,
}

/// MIDI realtime messages consumed by the clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// 0xF8
    Clock,
    /// 0xFA
    Start,
    /// 0xFB
    Continue,
    /// 0xFC
    Stop,
}

/// The events produced by one clock tick.  Every flag is valid for exactly
/// this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClockEvents {
    /// A 96 ppqn pulse
    pub clock: bool,
    /// The mod 6 pulse counter wrapped on this pulse (16th note)
    pub clock6: bool,
    /// The mod 24 counter wrapped on this pulse
    pub clock24: bool,
    /// MIDI Start was received
    pub start: bool,
    /// MIDI Stop was received
    pub stop: bool,
    /// MIDI Continue was received
    pub cont: bool,
}

/// Incoming clock counter value below which auto mode follows MIDI clock
const SLAVE_THRESHOLD: u16 = 0xFFF;
/// BPM accumulator increment per tick
const BPM_CTR_INC: u32 = 1_000_000;
/// Internal pulses per incoming MIDI clock
const PULSES_PER_MIDI_CLOCK: u8 = 4;

/// The master/slave clock state machine
#[derive(Clone, Debug)]
pub struct ClockGenerator {
    mode: ClockMode,
    slave: bool,
    running: bool,
    bpm: f32,
    incoming_clk_ctr: u16,
    incoming_clk_delay: u16,
    sent_clk_delay: u16,
    sent_clk_ctr: u8,
    clk_req_ctr: u16,
    tmp_bpm_ctr: u32,
    tmp_bpm_ctr_mod: u32,
    ctr6: u8,
    ctr24: u8,
    pending: ClockEvents,
}

impl ClockGenerator {
    /// Create a new clock at 120 BPM in auto mode
    pub fn new(context: &EngineContext) -> Self {
        let mut ret = Self {
            mode: ClockMode::Auto,
            slave: false,
            running: false,
            bpm: 120.0,
            incoming_clk_ctr: 0xFFFF,
            incoming_clk_delay: 0,
            sent_clk_delay: 0,
            sent_clk_ctr: 0,
            clk_req_ctr: 0,
            tmp_bpm_ctr: 0,
            tmp_bpm_ctr_mod: 0,
            ctr6: 0,
            ctr24: 0,
            pending: ClockEvents::default(),
        };
        ret.bpm_set(context, 120.0);
        ret
    }
    /// Select master/slave behaviour
    pub fn set_mode(&mut self, mode: ClockMode) {
        self.mode = mode;
    }
    /// The configured clock mode
    pub fn mode(&self) -> ClockMode {
        self.mode
    }
    /// Set the tempo of the internal clock.  Tempos below 1 BPM are replaced
    /// by 120 BPM.
    pub fn bpm_set(&mut self, context: &EngineContext, bpm: f32) {
        let bpm = if bpm.is_nan() || bpm < 1.0 {
            log::warn!("invalid tempo {}, using 120 BPM", bpm);
            120.0
        } else {
            bpm
        };
        self.bpm = bpm;
        // (60/bpm) / (2ms/usf) ticks per quarter, times 1_000_000/96
        let modulus = 312_500_000f32 * context.update_speed_factor() as f32 / bpm;
        self.tmp_bpm_ctr_mod = if modulus < 1.0 {
            1
        } else if modulus >= u32::MAX as f32 {
            u32::MAX
        } else {
            modulus as u32
        };
    }
    /// The tempo of the internal clock
    pub fn bpm(&self) -> f32 {
        self.bpm
    }
    /// True if currently following an external clock
    pub fn is_slave(&self) -> bool {
        self.slave
    }
    /// True between MIDI Start/Continue and Stop
    pub fn is_running(&self) -> bool {
        self.running
    }
    /// Global pulse counter, modulo 6
    pub fn ctr6(&self) -> u8 {
        self.ctr6
    }
    /// Global counter of 6-pulse groups, modulo 24
    pub fn ctr24(&self) -> u8 {
        self.ctr24
    }
    /// Apply a realtime byte received from MIDI.  Must not be interleaved with
    /// [ClockGenerator::tick]; the owner applies queued bytes between ticks.
    pub fn midi_realtime(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::Clock => {
                self.incoming_clk_delay = self.incoming_clk_ctr;
                self.incoming_clk_ctr = 0;
                // catch up on interpolated pulses that did not make it out
                self.clk_req_ctr = self
                    .clk_req_ctr
                    .saturating_add((PULSES_PER_MIDI_CLOCK - self.sent_clk_ctr) as u16);
                self.sent_clk_ctr = 0;
                // the tick consuming this byte counts towards the delay
                self.sent_clk_delay = (self.incoming_clk_delay >> 2).saturating_add(1);
            }
            RealtimeEvent::Start => {
                self.pending.start = true;
                self.running = true;
                self.ctr6 = 0;
                self.ctr24 = 0;
                self.clk_req_ctr = 0;
                // the next clock byte starts the new phase
                self.sent_clk_ctr = PULSES_PER_MIDI_CLOCK - 1;
            }
            RealtimeEvent::Continue => {
                self.pending.cont = true;
                self.running = true;
            }
            RealtimeEvent::Stop => {
                self.pending.stop = true;
                self.running = false;
            }
        }
    }
    /// Advance the clock by one tick
    pub fn tick(&mut self) -> ClockEvents {
        let mut events = core::mem::take(&mut self.pending);

        self.incoming_clk_ctr = self.incoming_clk_ctr.saturating_add(1);

        self.slave = match self.mode {
            ClockMode::Auto => self.incoming_clk_ctr < SLAVE_THRESHOLD,
            ClockMode::Master => false,
            ClockMode::Slave => true,
        };

        if self.slave {
            if self.sent_clk_delay > 0 {
                self.sent_clk_delay -= 1;
                if self.sent_clk_delay == 0 && self.sent_clk_ctr < PULSES_PER_MIDI_CLOCK - 1 {
                    self.sent_clk_ctr += 1;
                    self.clk_req_ctr = self.clk_req_ctr.saturating_add(1);
                    self.sent_clk_delay = self.incoming_clk_delay >> 2;
                }
            }
        } else {
            self.tmp_bpm_ctr = self.tmp_bpm_ctr.saturating_add(BPM_CTR_INC);
            while self.tmp_bpm_ctr > self.tmp_bpm_ctr_mod {
                self.tmp_bpm_ctr -= self.tmp_bpm_ctr_mod;
                self.clk_req_ctr = self.clk_req_ctr.saturating_add(1);
            }
        }

        if self.clk_req_ctr > 0 {
            self.clk_req_ctr -= 1;
            events.clock = true;
            self.ctr6 += 1;
            if self.ctr6 >= 6 {
                self.ctr6 = 0;
                events.clock6 = true;
                self.ctr24 += 1;
                if self.ctr24 >= 24 {
                    self.ctr24 = 0;
                    events.clock24 = true;
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_ticks(clock: &mut ClockGenerator, n: usize, offset: usize, out: &mut Vec<usize>) {
        for i in 0..n {
            if clock.tick().clock {
                out.push(offset + i);
            }
        }
    }

    #[test]
    fn slave_interpolates_four_pulses() {
        let mut clock = ClockGenerator::new(&EngineContext::default());
        let period = 24;
        let mut pulses = Vec::new();
        for n in 0..10 {
            clock.midi_realtime(RealtimeEvent::Clock);
            clock_ticks(&mut clock, period, n * period, &mut pulses);
        }
        assert!(clock.is_slave());
        // steady state after priming: exactly 4 evenly spaced pulses per byte
        for n in 3..10 {
            let base = n * period;
            let in_period: Vec<usize> = pulses
                .iter()
                .copied()
                .filter(|&t| t >= base && t < base + period)
                .collect();
            assert_eq!(in_period, vec![base, base + 6, base + 12, base + 18]);
        }
    }

    #[test]
    fn master_rate_matches_bpm() {
        let ctx = EngineContext::maybe_create(1).unwrap();
        let mut clock = ClockGenerator::new(&ctx);
        clock.set_mode(ClockMode::Master);
        clock.bpm_set(&ctx, 120.0);
        // 120 BPM at 500 ticks per second: one quarter note every 250 ticks
        let mut count = 0;
        for _ in 0..2500 {
            if clock.tick().clock {
                count += 1;
            }
        }
        assert!((959..=961).contains(&count));
    }

    #[test]
    fn invalid_bpm_clamps() {
        let ctx = EngineContext::default();
        let mut clock = ClockGenerator::new(&ctx);
        clock.bpm_set(&ctx, 0.5);
        assert_eq!(clock.bpm(), 120.0);
    }

    #[test]
    fn auto_mode_falls_back_to_master() {
        let mut clock = ClockGenerator::new(&EngineContext::default());
        clock.midi_realtime(RealtimeEvent::Clock);
        clock.tick();
        assert!(clock.is_slave());
        for _ in 0..0x1000 {
            clock.tick();
        }
        assert!(!clock.is_slave());
    }

    #[test]
    fn start_resets_counters() {
        let mut clock = ClockGenerator::new(&EngineContext::default());
        clock.set_mode(ClockMode::Slave);
        for _ in 0..5 {
            clock.midi_realtime(RealtimeEvent::Clock);
            for _ in 0..24 {
                clock.tick();
            }
        }
        clock.midi_realtime(RealtimeEvent::Start);
        let ev = clock.tick();
        assert!(ev.start);
        assert!(!ev.clock);
        assert_eq!(clock.ctr6(), 0);
        assert!(clock.is_running());
        assert!(!clock.tick().start);
        // no interpolated pulses until the next clock byte
        for _ in 0..30 {
            assert!(!clock.tick().clock);
        }
        clock.midi_realtime(RealtimeEvent::Clock);
        assert!(clock.tick().clock);
        assert_eq!(clock.ctr6(), 1);
        clock.midi_realtime(RealtimeEvent::Stop);
        assert!(clock.tick().stop);
        assert!(!clock.is_running());
    }

    #[test]
    fn counters_wrap() {
        let mut clock = ClockGenerator::new(&EngineContext::default());
        clock.set_mode(ClockMode::Slave);
        let mut wraps6 = 0;
        let mut wraps24 = 0;
        // 36 clock bytes = 144 pulses = 24 groups of 6
        for _ in 0..40 {
            clock.midi_realtime(RealtimeEvent::Clock);
            for _ in 0..24 {
                let ev = clock.tick();
                wraps6 += ev.clock6 as u32;
                wraps24 += ev.clock24 as u32;
            }
        }
        assert!(wraps6 >= 24);
        assert!(wraps24 >= 1);
    }

    #[test]
    fn stalled_ticks_saturate_pending_pulses() {
        let ctx = EngineContext::maybe_create(1).unwrap();
        let mut clk = ClockGenerator::new(&ctx);
        clk.set_mode(ClockMode::Slave);
        for _ in 0..20_000 {
            clk.midi_realtime(RealtimeEvent::Clock);
        }
        assert_eq!(clk.clk_req_ctr, u16::MAX);
        assert!(clk.tick().clock);
    }
}
