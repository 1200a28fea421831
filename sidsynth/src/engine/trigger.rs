//! The Lead engine's trigger matrix: events that restart, release or step
//! other parts of the engine.

/// Events that can fire triggers
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerSource {
    /// A note was played
    NoteOn,
    /// The last held note was released
    NoteOff,
    /// Envelope 1 reached its sustain phase
    Env1Sustain,
    /// Envelope 2 reached its sustain phase
    Env2Sustain,
    /// LFO 1 completed a period
    Lfo1Period,
    /// LFO 2 completed a period
    Lfo2Period,
    /// LFO 3 completed a period
    Lfo3Period,
    /// LFO 4 completed a period
    Lfo4Period,
    /// LFO 5 completed a period
    Lfo5Period,
    /// LFO 6 completed a period
    Lfo6Period,
    /// Every clock pulse (24 per quarter note after interpolation)
    Clock,
    /// Every sixth clock pulse
    Clock6,
    /// Every 24th clock pulse
    Clock24,
    /// MIDI start
    MidiStart,
}

impl TriggerSource {
    const ELEM: [TriggerSource; 14] = [
        Self::NoteOn,
        Self::NoteOff,
        Self::Env1Sustain,
        Self::Env2Sustain,
        Self::Lfo1Period,
        Self::Lfo2Period,
        Self::Lfo3Period,
        Self::Lfo4Period,
        Self::Lfo5Period,
        Self::Lfo6Period,
        Self::Clock,
        Self::Clock6,
        Self::Clock24,
        Self::MidiStart,
    ];
    /// All sources, in patch order
    pub const fn elements() -> &'static [TriggerSource] {
        &Self::ELEM
    }
    /// The number of sources
    pub const fn numel() -> usize {
        Self::ELEM.len()
    }
    /// The period signal of LFO `n`
    pub const fn lfo(n: usize) -> Self {
        Self::ELEM[Self::Lfo1Period as usize + n]
    }
    /// Display name
    pub const fn to_str(&self) -> &'static str {
        match self {
            Self::NoteOn => "NOn",
            Self::NoteOff => "NOff",
            Self::Env1Sustain => "E1S",
            Self::Env2Sustain => "E2S",
            Self::Lfo1Period => "L1P",
            Self::Lfo2Period => "L2P",
            Self::Lfo3Period => "L3P",
            Self::Lfo4Period => "L4P",
            Self::Lfo5Period => "L5P",
            Self::Lfo6Period => "L6P",
            Self::Clock => "Clk",
            Self::Clock6 => "Clk6",
            Self::Clock24 => "Clk24",
            Self::MidiStart => "MSt",
        }
    }
}

/// A 24 bit mask of things to do when a [TriggerSource] fires.
///
/// Bits 0..=5 are the voice gates O1L, O2L, O3L, O1R, O2R, O3R.  In the
/// [TriggerSource::NoteOff] row they close the gates, in every other row they
/// open them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriggerTargets(u32);

impl TriggerTargets {
    /// Mask of the six voice gates
    pub const GATES: u32 = 0x3F;
    /// Restart envelope 1
    pub const ENV1_ATTACK: u32 = 1 << 6;
    /// Restart envelope 2
    pub const ENV2_ATTACK: u32 = 1 << 7;
    /// Release envelope 1
    pub const ENV1_RELEASE: u32 = 1 << 8;
    /// Release envelope 2
    pub const ENV2_RELEASE: u32 = 1 << 9;
    const LFO_RESTART: u32 = 10;
    const WT_RESTART: u32 = 16;
    const WT_STEP: u32 = 20;
    /// The bytes used by one encoded mask
    pub const SIZE: usize = 3;

    /// Build a mask from raw bits; only the low 24 bits are kept
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & 0xFF_FFFF)
    }
    /// The raw bits
    pub const fn bits(&self) -> u32 {
        self.0
    }
    /// Decode from the little endian patch layout
    pub const fn from_bytes(b: [u8; 3]) -> Self {
        Self(b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16)
    }
    /// Encode to the little endian patch layout
    pub const fn to_bytes(&self) -> [u8; 3] {
        [self.0 as u8, (self.0 >> 8) as u8, (self.0 >> 16) as u8]
    }
    /// Gate bit of voice `v`
    pub const fn gate(&self, v: usize) -> bool {
        self.0 & (1 << v) != 0
    }
    /// Restart bit of LFO `n` (0..=5)
    pub const fn lfo_restart(&self, n: usize) -> bool {
        self.0 & (1 << (Self::LFO_RESTART as usize + n)) != 0
    }
    /// Restart bit of wavetable `n` (0..=3)
    pub const fn wt_restart(&self, n: usize) -> bool {
        self.0 & (1 << (Self::WT_RESTART as usize + n)) != 0
    }
    /// Step bit of wavetable `n` (0..=3)
    pub const fn wt_step(&self, n: usize) -> bool {
        self.0 & (1 << (Self::WT_STEP as usize + n)) != 0
    }
    /// Set or clear the bits of `mask`
    pub const fn set(&mut self, mask: u32, on: bool) {
        if on {
            self.0 |= mask & 0xFF_FFFF;
        } else {
            self.0 &= !mask;
        }
    }
    /// Mask with the restart bit of LFO `n`
    pub const fn lfo_restart_mask(n: usize) -> u32 {
        1 << (Self::LFO_RESTART as usize + n)
    }
    /// Mask with the restart bit of wavetable `n`
    pub const fn wt_restart_mask(n: usize) -> u32 {
        1 << (Self::WT_RESTART as usize + n)
    }
    /// Mask with the step bit of wavetable `n`
    pub const fn wt_step_mask(n: usize) -> u32 {
        1 << (Self::WT_STEP as usize + n)
    }
}

/// The trigger matrix of a Lead patch, one row per [TriggerSource]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerMatrix {
    /// Rows, indexed by [TriggerSource]
    pub rows: [TriggerTargets; 14],
}

impl Default for TriggerMatrix {
    /// Note on opens all gates and starts both envelopes, note off closes the
    /// gates and releases them
    fn default() -> Self {
        let mut rows = [TriggerTargets::default(); 14];
        rows[TriggerSource::NoteOn as usize] = TriggerTargets::from_bits(
            TriggerTargets::GATES | TriggerTargets::ENV1_ATTACK | TriggerTargets::ENV2_ATTACK,
        );
        rows[TriggerSource::NoteOff as usize] = TriggerTargets::from_bits(
            TriggerTargets::GATES | TriggerTargets::ENV1_RELEASE | TriggerTargets::ENV2_RELEASE,
        );
        Self { rows }
    }
}

impl TriggerMatrix {
    /// The targets of `src`
    pub fn row(&self, src: TriggerSource) -> TriggerTargets {
        self.rows[src as usize]
    }
    /// OR together the rows of every source that fired
    pub fn collect(&self, fired: &[TriggerSource]) -> (TriggerTargets, TriggerTargets) {
        let mut on = 0;
        let mut off = 0;
        for src in fired {
            match src {
                TriggerSource::NoteOff => off |= self.row(*src).bits(),
                _ => on |= self.row(*src).bits(),
            }
        }
        (TriggerTargets::from_bits(on), TriggerTargets::from_bits(off))
    }
}
