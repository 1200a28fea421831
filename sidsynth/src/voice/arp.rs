use arrayvec::ArrayVec;

use super::notestack::{HeldNote, NOTE_STACK_SIZE};
use crate::random::RandomGenerator;

/// The order in which held notes are played
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ArpMode {
    /// Lowest to highest
    #[default]
    Up,
    /// Highest to lowest
    Down,
    /// Up, then down, without repeating the end notes
    UpDown,
    /// Down, then up, without repeating the end notes
    DownUp,
    /// Random held notes
    Random,
    /// In the order the notes were played
    AsPlayed,
}

impl ArpMode {
    const ELEM: [ArpMode; 6] = [
        Self::Up,
        Self::Down,
        Self::UpDown,
        Self::DownUp,
        Self::Random,
        Self::AsPlayed,
    ];
    /// Get a list of all the modes
    pub const fn modes() -> &'static [ArpMode] {
        &Self::ELEM
    }
    /// Convert a u8 to an ArpMode, if in range
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
            Self::Up => "Up",
            Self::Down => "Down",
            Self::UpDown => "Up/Down",
            Self::DownUp => "Down/Up",
            Self::Random => "Random",
            Self::AsPlayed => "As Played",
        }
    }
    const fn starts_down(&self) -> bool {
        matches!(self, Self::Down | Self::DownUp)
    }
}

impl TryFrom<u8> for ArpMode {
    type Error = &'static str;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new_from_u8(value).ok_or("Invalid Arpeggiator Mode")
    }
}

/// Arpeggiator flags packed the same way as the patch's flag byte
#[repr(transparent)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct ArpOptions {
    bits: u8,
}

impl ArpOptions {
    const ENABLE: u8 = 1 << 0;
    const SORT: u8 = 1 << 1;
    const HOLD: u8 = 1 << 2;
    const MODE_SHIFT: u8 = 4;
    /// Build from the raw flag byte
    pub const fn from_bits(bits: u8) -> Self {
        Self { bits }
    }
    /// The raw flag byte
    pub const fn bits(&self) -> u8 {
        self.bits
    }
    /// An enabled, sorting arpeggiator in the given mode
    pub const fn with_mode(mode: ArpMode) -> Self {
        Self {
            bits: Self::ENABLE | Self::SORT | (mode as u8) << Self::MODE_SHIFT,
        }
    }
    /// Is the arpeggiator active?
    pub const fn enabled(&self) -> bool {
        self.bits & Self::ENABLE != 0
    }
    /// Are notes ordered by pitch (rather than by arrival)?
    pub const fn sort(&self) -> bool {
        self.bits & Self::SORT != 0
    }
    /// Do notes keep playing after their keys are released?
    pub const fn hold(&self) -> bool {
        self.bits & Self::HOLD != 0
    }
    /// The play order.  Unknown modes fall back to [ArpMode::Up].
    pub const fn mode(&self) -> ArpMode {
        match ArpMode::new_from_u8((self.bits >> Self::MODE_SHIFT) & 0x07) {
            Some(m) => m,
            None => ArpMode::Up,
        }
    }
    /// Set the hold option
    pub const fn set_hold(&mut self, hold: bool) {
        self.bits &= !Self::HOLD;
        self.bits |= if hold { Self::HOLD } else { 0 };
    }
}

/// Parameters of an [Arpeggiator]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ArpParams {
    /// Flags and mode
    pub opts: ArpOptions,
    /// Clock pulses per step, minus one
    pub speed: u8,
    /// Clock pulses the gate stays open, 0 to keep it open until the next step
    pub gatelen: u8,
    /// Additional octaves played above the held notes (0..=3)
    pub range: u8,
}

/// What the arpeggiator wants the voice to do this tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpEvent {
    /// Nothing changes
    None,
    /// Play a new note
    NoteOn {
        /// MIDI note number
        note: u8,
        /// MIDI velocity
        velocity: u8,
    },
    /// Close the gate
    NoteOff,
}

/// A clock driven arpeggiator over the held notes of an instrument
#[derive(Clone, Debug, Default)]
pub struct Arpeggiator {
    played: ArrayVec<HeldNote, NOTE_STACK_SIZE>,
    keys_down: u8,
    restart_req: bool,
    div_ctr: u8,
    gate_ctr: u8,
    gate_on: bool,
    pos: usize,
    up: bool,
}

impl Arpeggiator {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }
    /// Forget all notes
    pub fn reset(&mut self) {
        *self = Self::default();
    }
    /// The notes the arpeggiator cycles through, in arrival order
    pub fn notes(&self) -> &[HeldNote] {
        &self.played
    }
    /// A key was pressed
    pub fn note_on(&mut self, note: u8, velocity: u8, params: &ArpParams) {
        if params.opts.hold() && self.keys_down == 0 {
            self.played.clear();
        }
        if let Some(pos) = self.played.iter().position(|n| n.note == note) {
            self.played.remove(pos);
        }
        if self.played.is_full() {
            self.played.remove(0);
        }
        if self.played.is_empty() {
            self.restart_req = true;
        }
        self.played.push(HeldNote { note, velocity });
        self.keys_down = self.keys_down.saturating_add(1);
    }
    /// A key was released
    pub fn note_off(&mut self, note: u8, params: &ArpParams) {
        self.keys_down = self.keys_down.saturating_sub(1);
        if !params.opts.hold() {
            if let Some(pos) = self.played.iter().position(|n| n.note == note) {
                self.played.remove(pos);
            }
        }
    }

    fn note_at(&self, pos: usize, params: &ArpParams) -> HeldNote {
        let n = self.played.len();
        let mut ordered = self.played.clone();
        if params.opts.sort() && params.opts.mode() != ArpMode::AsPlayed {
            ordered.sort_unstable_by_key(|n| n.note);
        }
        let held = ordered[pos % n];
        HeldNote {
            note: (held.note as usize + 12 * (pos / n)).min(127) as u8,
            velocity: held.velocity,
        }
    }

    fn advance(&mut self, total: usize, mode: ArpMode, rng: &mut RandomGenerator) {
        self.pos = match mode {
            ArpMode::Up | ArpMode::AsPlayed => (self.pos + 1) % total,
            ArpMode::Down => (self.pos + total - 1) % total,
            ArpMode::UpDown | ArpMode::DownUp => {
                if total == 1 {
                    0
                } else if self.up {
                    if self.pos + 1 >= total {
                        self.up = false;
                        total - 2
                    } else {
                        self.pos + 1
                    }
                } else if self.pos == 0 {
                    self.up = true;
                    1
                } else {
                    self.pos - 1
                }
            }
            ArpMode::Random => rng.below(total.min(u8::MAX as usize) as u8) as usize,
        };
    }

    /// Advance by one tick
    pub fn tick(&mut self, clock: bool, params: &ArpParams, rng: &mut RandomGenerator) -> ArpEvent {
        if self.played.is_empty() {
            self.restart_req = false;
            if self.gate_on {
                self.gate_on = false;
                return ArpEvent::NoteOff;
            }
            return ArpEvent::None;
        }
        let mode = params.opts.mode();
        let total = self.played.len() * (params.range.min(3) as usize + 1);
        let mut step = false;
        if self.restart_req {
            self.restart_req = false;
            self.div_ctr = 0;
            self.up = !mode.starts_down();
            self.pos = match mode {
                ArpMode::Random => rng.below(total as u8) as usize,
                m if m.starts_down() => total - 1,
                _ => 0,
            };
            step = true;
        } else if clock {
            self.gate_ctr = self.gate_ctr.saturating_add(1);
            self.div_ctr += 1;
            if self.div_ctr > params.speed {
                self.div_ctr = 0;
                self.pos %= total;
                self.advance(total, mode, rng);
                step = true;
            }
        }
        if step {
            let held = self.note_at(self.pos, params);
            self.gate_on = true;
            self.gate_ctr = 0;
            return ArpEvent::NoteOn {
                note: held.note,
                velocity: held.velocity,
            };
        }
        if self.gate_on && params.gatelen > 0 && self.gate_ctr >= params.gatelen {
            self.gate_on = false;
            return ArpEvent::NoteOff;
        }
        ArpEvent::None
    }
}
