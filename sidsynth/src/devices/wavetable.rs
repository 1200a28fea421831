use super::*;
use crate::voice::VoiceWaveform;

/// Size of the step memory shared by the wavetable sequencers of a patch
pub const WT_MEMORY_SIZE: usize = 128;

/// Position reported while a oneshot wavetable has finished
pub const WT_POS_STOPPED: u8 = 0xAA;

/// Parameters of one [WavetableSequencer], see the patch layout
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WtParams {
    /// Clock pulses per step, minus one
    pub divider: u8,
    /// Restart on note on
    pub key_sync: bool,
    /// Bitmask of the voices driven by this wavetable
    pub voices: u8,
    /// Position is taken from the modulation destination instead of the clock
    pub position_mod: bool,
    /// First step
    pub begin: u8,
    /// Last step
    pub end: u8,
    /// Step to continue at after `end`
    pub loop_pos: u8,
    /// Stop after reaching `end`
    pub oneshot: bool,
}

/// What drives a wavetable this tick
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WtInput {
    /// A tempo clock pulse occurred
    pub clock: bool,
    /// The trigger matrix requested a step
    pub step: bool,
    /// Position destination accumulator
    pub position_mod: i32,
}

/// A sequencer stepping through the patch's wavetable memory.  Each memory
/// byte with bit 7 clear sets the note (0 keeps the current one), each byte
/// with bit 7 set sets the waveform from its low 7 bits.
#[derive(Clone, Debug)]
pub struct WavetableSequencer {
    pos: u8,
    div_ctr: u8,
    restart_req: bool,
    note: u8,
    waveform: Option<VoiceWaveform>,
}

impl Default for WavetableSequencer {
    fn default() -> Self {
        Self {
            pos: WT_POS_STOPPED,
            div_ctr: 0,
            restart_req: false,
            note: 0,
            waveform: None,
        }
    }
}

impl WavetableSequencer {
    /// Constructor.  The sequencer starts out stopped.
    pub fn new() -> Self {
        Self::default()
    }
    /// Go back to `begin` on the next tick
    pub fn restart(&mut self) {
        self.restart_req = true;
    }
    /// The current step, or `None` while stopped
    pub fn position(&self) -> Option<u8> {
        (self.pos != WT_POS_STOPPED).then_some(self.pos)
    }
    /// The raw position, [WT_POS_STOPPED] while stopped
    pub fn raw_position(&self) -> u8 {
        self.pos
    }
    /// The note set by the last note step (0 until the first one)
    pub fn note(&self) -> u8 {
        self.note
    }
    /// The waveform set by the last waveform step
    pub fn waveform(&self) -> Option<VoiceWaveform> {
        self.waveform
    }
    /// The value published to the modulation matrix
    pub fn mod_source(&self) -> i16 {
        ((self.note as u16) << 8) as i16
    }

    fn load(&mut self, memory: &[u8; WT_MEMORY_SIZE]) {
        let step = memory[(self.pos as usize) % WT_MEMORY_SIZE];
        if step & 0x80 != 0 {
            self.waveform = Some(VoiceWaveform::from_bits(step & 0x7F));
        } else if step != 0 {
            self.note = step;
        }
    }

    /// Advance by one tick.  Returns true if a new step was loaded.
    pub fn tick(
        &mut self,
        input: &WtInput,
        params: &WtParams,
        memory: &[u8; WT_MEMORY_SIZE],
    ) -> bool {
        let begin = params.begin & 0x7F;
        let end = params.end & 0x7F;
        if self.restart_req {
            self.restart_req = false;
            self.div_ctr = 0;
            self.pos = begin;
            self.load(memory);
            return true;
        }
        if params.position_mod {
            let value = (input.position_mod >> 8).clamp(0, 127) as u32;
            let pos = if end >= begin {
                begin as u32 + value * (end - begin + 1) as u32 / 128
            } else {
                begin as u32 - value * (begin - end + 1) as u32 / 128
            } as u8;
            if pos == self.pos {
                return false;
            }
            self.pos = pos;
            self.load(memory);
            return true;
        }
        if self.pos == WT_POS_STOPPED {
            return false;
        }
        let mut step = input.step;
        if input.clock {
            self.div_ctr += 1;
            if self.div_ctr > (params.divider & 0x3F) {
                self.div_ctr = 0;
                step = true;
            }
        }
        if !step {
            return false;
        }
        if self.pos == end {
            if params.oneshot {
                self.pos = WT_POS_STOPPED;
                return false;
            }
            self.pos = params.loop_pos & 0x7F;
        } else if self.pos < end {
            self.pos += 1;
        } else {
            self.pos -= 1;
        }
        self.load(memory);
        true
    }
}

/// The drum variant: steps through a fixed [DrumModel] on a tick divider,
/// independent of the tempo clock
#[derive(Clone, Debug)]
pub struct DrumWavetable {
    model: usize,
    pos: u8,
    div_ctr: u16,
    note: u8,
    waveform: VoiceWaveform,
}

impl Default for DrumWavetable {
    fn default() -> Self {
        Self {
            model: 0,
            pos: WT_POS_STOPPED,
            div_ctr: 0,
            note: 0,
            waveform: VoiceWaveform::default(),
        }
    }
}

impl DrumWavetable {
    /// Constructor.  The sequencer starts out stopped.
    pub fn new() -> Self {
        Self::default()
    }
    /// Start playing the model with the given index from its first step.
    /// Unknown models fall back to the first one.
    pub fn restart(&mut self, model: u8) {
        self.model = if (model as usize) < DRUM_MODELS.len() {
            model as usize
        } else {
            log::debug!("unknown drum model {}", model);
            0
        };
        self.div_ctr = 0;
        self.pos = 0;
        self.load();
    }
    /// The current step, or `None` while stopped
    pub fn position(&self) -> Option<u8> {
        (self.pos != WT_POS_STOPPED).then_some(self.pos)
    }
    /// The note of the current step
    pub fn note(&self) -> u8 {
        self.note
    }
    /// The waveform of the current step
    pub fn waveform(&self) -> VoiceWaveform {
        self.waveform
    }
    /// The model currently played
    pub fn model(&self) -> &'static DrumModel {
        &DRUM_MODELS[self.model]
    }

    fn load(&mut self) {
        let model = self.model();
        match model.steps.get(self.pos as usize) {
            Some(step) if step.note != 0 => {
                self.note = step.note;
                self.waveform = VoiceWaveform::from_bits(step.waveform);
            }
            _ => match model.loop_pos {
                Some(pos) if (pos as usize) < model.steps.len() && self.pos != pos => {
                    self.pos = pos;
                    self.load();
                }
                _ => self.pos = WT_POS_STOPPED,
            },
        }
    }

    /// Advance by one tick, stepping every `speed` ticks (scaled by the
    /// update speed factor).  Returns true if a new step was loaded.
    pub fn tick(&mut self, context: &EngineContext, speed: u8) -> bool {
        if self.pos == WT_POS_STOPPED {
            return false;
        }
        self.div_ctr += 1;
        if self.div_ctr < context.scale_ticks(speed.max(1) as u16) {
            return false;
        }
        self.div_ctr = 0;
        self.pos += 1;
        self.load();
        self.pos != WT_POS_STOPPED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> [u8; WT_MEMORY_SIZE] {
        let mut mem = [0u8; WT_MEMORY_SIZE];
        for (i, m) in mem.iter_mut().enumerate() {
            *m = 36 + i as u8 % 64;
        }
        mem
    }

    fn clocked(wt: &mut WavetableSequencer, params: &WtParams, mem: &[u8; WT_MEMORY_SIZE]) {
        let input = WtInput {
            clock: true,
            ..Default::default()
        };
        wt.tick(&input, params, mem);
    }

    #[test]
    fn oneshot_stops_at_sentinel() {
        let mem = memory();
        let params = WtParams {
            begin: 0,
            end: 3,
            oneshot: true,
            ..Default::default()
        };
        let mut wt = WavetableSequencer::new();
        wt.restart();
        clocked(&mut wt, &params, &mem);
        assert_eq!(wt.position(), Some(0));
        for expected in 1..=3 {
            clocked(&mut wt, &params, &mem);
            assert_eq!(wt.position(), Some(expected));
        }
        for _ in 0..100 {
            clocked(&mut wt, &params, &mem);
            assert_eq!(wt.raw_position(), WT_POS_STOPPED);
        }
        assert_eq!(wt.note(), mem[3]);
        wt.restart();
        clocked(&mut wt, &params, &mem);
        assert_eq!(wt.position(), Some(0));
    }

    #[test]
    fn loops_back() {
        let mem = memory();
        let params = WtParams {
            begin: 4,
            end: 6,
            loop_pos: 5,
            ..Default::default()
        };
        let mut wt = WavetableSequencer::new();
        wt.restart();
        let mut seen = Vec::new();
        for _ in 0..7 {
            clocked(&mut wt, &params, &mem);
            seen.push(wt.position().unwrap());
        }
        assert_eq!(seen, vec![4, 5, 6, 5, 6, 5, 6]);
    }

    #[test]
    fn divider_and_reverse() {
        let mem = memory();
        let params = WtParams {
            divider: 1,
            begin: 10,
            end: 8,
            loop_pos: 10,
            ..Default::default()
        };
        let mut wt = WavetableSequencer::new();
        wt.restart();
        let mut seen = Vec::new();
        for _ in 0..7 {
            clocked(&mut wt, &params, &mem);
            seen.push(wt.position().unwrap());
        }
        assert_eq!(seen, vec![10, 10, 9, 9, 8, 8, 10]);
    }

    #[test]
    fn step_requests_bypass_divider() {
        let mem = memory();
        let params = WtParams {
            divider: 63,
            end: 10,
            ..Default::default()
        };
        let mut wt = WavetableSequencer::new();
        wt.restart();
        wt.tick(&WtInput::default(), &params, &mem);
        let step = WtInput {
            step: true,
            ..Default::default()
        };
        assert!(wt.tick(&step, &params, &mem));
        assert_eq!(wt.position(), Some(1));
    }

    #[test]
    fn modulated_position_inverted_range() {
        let mem = memory();
        let params = WtParams {
            position_mod: true,
            begin: 20,
            end: 10,
            ..Default::default()
        };
        let mut wt = WavetableSequencer::new();
        let input = |v: i32| WtInput {
            position_mod: v << 8,
            ..Default::default()
        };
        wt.tick(&input(0), &params, &mem);
        assert_eq!(wt.position(), Some(20));
        wt.tick(&input(127), &params, &mem);
        assert_eq!(wt.position(), Some(10));
        wt.tick(&input(64), &params, &mem);
        assert_eq!(wt.position(), Some(15));
    }

    #[test]
    fn waveform_steps() {
        let mut mem = [0u8; WT_MEMORY_SIZE];
        mem[0] = 60;
        mem[1] = 0x80 | 0x04;
        mem[2] = 0;
        let params = WtParams {
            end: 2,
            ..Default::default()
        };
        let mut wt = WavetableSequencer::new();
        wt.restart();
        clocked(&mut wt, &params, &mem);
        assert_eq!(wt.note(), 60);
        assert_eq!(wt.mod_source(), 60 << 8);
        clocked(&mut wt, &params, &mem);
        clocked(&mut wt, &params, &mem);
        assert_eq!(wt.note(), 60);
        assert!(wt.waveform().unwrap().pulse);
    }

    #[test]
    fn drum_steps_on_ticks() {
        let ctx = EngineContext::maybe_create(1).unwrap();
        let mut drum = DrumWavetable::new();
        assert!(!drum.tick(&ctx, 1));
        drum.restart(0);
        assert_eq!(drum.position(), Some(0));
        let first = drum.model().steps[0];
        assert_eq!(drum.note(), first.note);
        assert!(!drum.tick(&ctx, 2));
        assert!(drum.tick(&ctx, 2));
        assert_eq!(drum.position(), Some(1));
    }

    #[test]
    fn drum_models_terminate_or_loop() {
        let ctx = EngineContext::maybe_create(1).unwrap();
        for (i, model) in DRUM_MODELS.iter().enumerate() {
            let mut drum = DrumWavetable::new();
            drum.restart(i as u8);
            for _ in 0..1000 {
                drum.tick(&ctx, 1);
            }
            match model.loop_pos {
                Some(_) => assert!(drum.position().is_some(), "{}", model.name),
                None => assert!(drum.position().is_none(), "{}", model.name),
            }
        }
    }
}
