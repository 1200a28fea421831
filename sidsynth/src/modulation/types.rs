/// An enum representing a modulation source slot.  The discriminant is the
/// slot index; patches store it plus one (0 means "no source").
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModSrc {
    /// Envelope 1
    #[default]
    Env1,
    /// Envelope 2
    Env2,
    /// LFO 1
    Lfo1,
    /// LFO 2
    Lfo2,
    /// LFO 3
    Lfo3,
    /// LFO 4
    Lfo4,
    /// LFO 5
    Lfo5,
    /// LFO 6
    Lfo6,
    /// Unscaled result of modulation route 1
    Mod1,
    /// Unscaled result of modulation route 2
    Mod2,
    /// Unscaled result of modulation route 3
    Mod3,
    /// Unscaled result of modulation route 4
    Mod4,
    /// Unscaled result of modulation route 5
    Mod5,
    /// Unscaled result of modulation route 6
    Mod6,
    /// Unscaled result of modulation route 7
    Mod7,
    /// Unscaled result of modulation route 8
    Mod8,
    /// The modulation wheel (MIDI CC #1)
    ModWheel,
    /// The current (played) note
    Key,
    /// Knob 1
    Knob1,
    /// Knob 2
    Knob2,
    /// Knob 3
    Knob3,
    /// Knob 4
    Knob4,
    /// Knob 5
    Knob5,
    /// MIDI Note On velocity
    Velocity,
    /// MIDI pitch bend
    PitchBend,
    /// MIDI Channel aftertouch
    Aftertouch,
    /// Wavetable 1 note
    Wt1,
    /// Wavetable 2 note
    Wt2,
    /// Wavetable 3 note
    Wt3,
    /// Wavetable 4 note
    Wt4,
}

impl ModSrc {
    /// An array containing all possible `ModSrc` values, in order
    pub const ELEM: [ModSrc; Self::numel()] = [
        Self::Env1,
        Self::Env2,
        Self::Lfo1,
        Self::Lfo2,
        Self::Lfo3,
        Self::Lfo4,
        Self::Lfo5,
        Self::Lfo6,
        Self::Mod1,
        Self::Mod2,
        Self::Mod3,
        Self::Mod4,
        Self::Mod5,
        Self::Mod6,
        Self::Mod7,
        Self::Mod8,
        Self::ModWheel,
        Self::Key,
        Self::Knob1,
        Self::Knob2,
        Self::Knob3,
        Self::Knob4,
        Self::Knob5,
        Self::Velocity,
        Self::PitchBend,
        Self::Aftertouch,
        Self::Wt1,
        Self::Wt2,
        Self::Wt3,
        Self::Wt4,
    ];
    /// All the different elements in `ModSrc`
    pub const fn elements() -> &'static [ModSrc] {
        &Self::ELEM
    }
    /// The number of different modulation sources
    pub const fn numel() -> usize {
        Self::Wt4 as usize + 1
    }
    /// Convert a slot index to a `ModSrc`
    pub const fn new_from_u8(val: u8) -> Option<Self> {
        if (val as usize) < Self::numel() {
            Some(Self::ELEM[val as usize])
        } else {
            None
        }
    }
    /// The slot of LFO `n` (0 based)
    pub const fn lfo(n: usize) -> Self {
        Self::ELEM[Self::Lfo1 as usize + n]
    }
    /// The feedback slot of route `n` (0 based)
    pub const fn route(n: usize) -> Self {
        Self::ELEM[Self::Mod1 as usize + n]
    }
    /// The slot of knob `n` (0 based)
    pub const fn knob(n: usize) -> Self {
        Self::ELEM[Self::Knob1 as usize + n]
    }
    /// The slot of wavetable `n` (0 based)
    pub const fn wavetable(n: usize) -> Self {
        Self::ELEM[Self::Wt1 as usize + n]
    }
    /// The string representation of the modulation source
    pub const fn to_str(&self) -> &'static str {
        match self {
            Self::Env1 => "ENV1",
            Self::Env2 => "ENV2",
            Self::Lfo1 => "LFO1",
            Self::Lfo2 => "LFO2",
            Self::Lfo3 => "LFO3",
            Self::Lfo4 => "LFO4",
            Self::Lfo5 => "LFO5",
            Self::Lfo6 => "LFO6",
            Self::Mod1 => "MOD1",
            Self::Mod2 => "MOD2",
            Self::Mod3 => "MOD3",
            Self::Mod4 => "MOD4",
            Self::Mod5 => "MOD5",
            Self::Mod6 => "MOD6",
            Self::Mod7 => "MOD7",
            Self::Mod8 => "MOD8",
            Self::ModWheel => "Mod Wheel",
            Self::Key => "Key",
            Self::Knob1 => "Knob1",
            Self::Knob2 => "Knob2",
            Self::Knob3 => "Knob3",
            Self::Knob4 => "Knob4",
            Self::Knob5 => "Knob5",
            Self::Velocity => "Velocity",
            Self::PitchBend => "Pitch Bend",
            Self::Aftertouch => "Aftertouch",
            Self::Wt1 => "WT1",
            Self::Wt2 => "WT2",
            Self::Wt3 => "WT3",
            Self::Wt4 => "WT4",
        }
    }
}

impl TryFrom<u8> for ModSrc {
    type Error = &'static str;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new_from_u8(value).ok_or("Invalid Modulation Source")
    }
}

/// An enum representing a modulation destination accumulator.  The
/// discriminant is the accumulator index; patches store it plus one (0 means
/// "no destination").
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModDst {
    /// Pitch of voice 1
    #[default]
    Pitch1,
    /// Pitch of voice 2
    Pitch2,
    /// Pitch of voice 3
    Pitch3,
    /// Pitch of voice 4
    Pitch4,
    /// Pitch of voice 5
    Pitch5,
    /// Pitch of voice 6
    Pitch6,
    /// Pulse width of voice 1
    Pw1,
    /// Pulse width of voice 2
    Pw2,
    /// Pulse width of voice 3
    Pw3,
    /// Pulse width of voice 4
    Pw4,
    /// Pulse width of voice 5
    Pw5,
    /// Pulse width of voice 6
    Pw6,
    /// Cutoff of the left filter
    Filter1,
    /// Cutoff of the right filter
    Filter2,
    /// Volume of the left chip
    Volume1,
    /// Volume of the right chip
    Volume2,
    /// Depth of LFO 1
    LfoDepth1,
    /// Depth of LFO 2
    LfoDepth2,
    /// Depth of LFO 3
    LfoDepth3,
    /// Depth of LFO 4
    LfoDepth4,
    /// Depth of LFO 5
    LfoDepth5,
    /// Depth of LFO 6
    LfoDepth6,
    /// Rate of LFO 1
    LfoRate1,
    /// Rate of LFO 2
    LfoRate2,
    /// Rate of LFO 3
    LfoRate3,
    /// Rate of LFO 4
    LfoRate4,
    /// Rate of LFO 5
    LfoRate5,
    /// Rate of LFO 6
    LfoRate6,
    /// External output 1
    Ext1,
    /// External output 2
    Ext2,
    /// External output 3
    Ext3,
    /// External output 4
    Ext4,
    /// External output 5
    Ext5,
    /// External output 6
    Ext6,
    /// External output 7
    Ext7,
    /// External output 8
    Ext8,
    /// Position of wavetable 1
    Wt1,
    /// Position of wavetable 2
    Wt2,
    /// Position of wavetable 3
    Wt3,
    /// Position of wavetable 4
    Wt4,
}

impl ModDst {
    /// An array containing all possible `ModDst` values, in order
    pub const ELEM: [ModDst; Self::numel()] = [
        Self::Pitch1,
        Self::Pitch2,
        Self::Pitch3,
        Self::Pitch4,
        Self::Pitch5,
        Self::Pitch6,
        Self::Pw1,
        Self::Pw2,
        Self::Pw3,
        Self::Pw4,
        Self::Pw5,
        Self::Pw6,
        Self::Filter1,
        Self::Filter2,
        Self::Volume1,
        Self::Volume2,
        Self::LfoDepth1,
        Self::LfoDepth2,
        Self::LfoDepth3,
        Self::LfoDepth4,
        Self::LfoDepth5,
        Self::LfoDepth6,
        Self::LfoRate1,
        Self::LfoRate2,
        Self::LfoRate3,
        Self::LfoRate4,
        Self::LfoRate5,
        Self::LfoRate6,
        Self::Ext1,
        Self::Ext2,
        Self::Ext3,
        Self::Ext4,
        Self::Ext5,
        Self::Ext6,
        Self::Ext7,
        Self::Ext8,
        Self::Wt1,
        Self::Wt2,
        Self::Wt3,
        Self::Wt4,
    ];
    /// All the different elements in `ModDst`
    pub const fn elements() -> &'static [ModDst] {
        &Self::ELEM
    }
    /// The number of modulation destinations
    pub const fn numel() -> usize {
        Self::Wt4 as usize + 1
    }
    /// Convert an accumulator index to a `ModDst`
    pub const fn new_from_u8(val: u8) -> Option<Self> {
        if (val as usize) < Self::numel() {
            Some(Self::ELEM[val as usize])
        } else {
            None
        }
    }
    /// Pitch of voice `v` (0 based)
    pub const fn pitch(v: usize) -> Self {
        Self::ELEM[Self::Pitch1 as usize + v]
    }
    /// Pulse width of voice `v` (0 based)
    pub const fn pw(v: usize) -> Self {
        Self::ELEM[Self::Pw1 as usize + v]
    }
    /// Cutoff of filter `f` (0 = left)
    pub const fn filter(f: usize) -> Self {
        Self::ELEM[Self::Filter1 as usize + f]
    }
    /// Volume of chip `f` (0 = left)
    pub const fn volume(f: usize) -> Self {
        Self::ELEM[Self::Volume1 as usize + f]
    }
    /// Depth of LFO `n` (0 based)
    pub const fn lfo_depth(n: usize) -> Self {
        Self::ELEM[Self::LfoDepth1 as usize + n]
    }
    /// Rate of LFO `n` (0 based)
    pub const fn lfo_rate(n: usize) -> Self {
        Self::ELEM[Self::LfoRate1 as usize + n]
    }
    /// Position of wavetable `n` (0 based)
    pub const fn wavetable(n: usize) -> Self {
        Self::ELEM[Self::Wt1 as usize + n]
    }
    /// The destinations hard wired to the bits of the left direct mask
    pub const DIRECT_L: [ModDst; 8] = [
        Self::Pitch1,
        Self::Pitch2,
        Self::Pitch3,
        Self::Pw1,
        Self::Pw2,
        Self::Pw3,
        Self::Filter1,
        Self::Volume1,
    ];
    /// The destinations hard wired to the bits of the right direct mask
    pub const DIRECT_R: [ModDst; 8] = [
        Self::Pitch4,
        Self::Pitch5,
        Self::Pitch6,
        Self::Pw4,
        Self::Pw5,
        Self::Pw6,
        Self::Filter2,
        Self::Volume2,
    ];
    /// The string representation of this modulation destination
    pub const fn to_str(&self) -> &'static str {
        match self {
            Self::Pitch1 => "Pitch1",
            Self::Pitch2 => "Pitch2",
            Self::Pitch3 => "Pitch3",
            Self::Pitch4 => "Pitch4",
            Self::Pitch5 => "Pitch5",
            Self::Pitch6 => "Pitch6",
            Self::Pw1 => "PW1",
            Self::Pw2 => "PW2",
            Self::Pw3 => "PW3",
            Self::Pw4 => "PW4",
            Self::Pw5 => "PW5",
            Self::Pw6 => "PW6",
            Self::Filter1 => "Filter L",
            Self::Filter2 => "Filter R",
            Self::Volume1 => "Volume L",
            Self::Volume2 => "Volume R",
            Self::LfoDepth1 => "LFO1 Depth",
            Self::LfoDepth2 => "LFO2 Depth",
            Self::LfoDepth3 => "LFO3 Depth",
            Self::LfoDepth4 => "LFO4 Depth",
            Self::LfoDepth5 => "LFO5 Depth",
            Self::LfoDepth6 => "LFO6 Depth",
            Self::LfoRate1 => "LFO1 Rate",
            Self::LfoRate2 => "LFO2 Rate",
            Self::LfoRate3 => "LFO3 Rate",
            Self::LfoRate4 => "LFO4 Rate",
            Self::LfoRate5 => "LFO5 Rate",
            Self::LfoRate6 => "LFO6 Rate",
            Self::Ext1 => "EXT1",
            Self::Ext2 => "EXT2",
            Self::Ext3 => "EXT3",
            Self::Ext4 => "EXT4",
            Self::Ext5 => "EXT5",
            Self::Ext6 => "EXT6",
            Self::Ext7 => "EXT7",
            Self::Ext8 => "EXT8",
            Self::Wt1 => "WT1",
            Self::Wt2 => "WT2",
            Self::Wt3 => "WT3",
            Self::Wt4 => "WT4",
        }
    }
}

impl TryFrom<u8> for ModDst {
    type Error = &'static str;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new_from_u8(value).ok_or("Invalid Modulation Destination")
    }
}

/// The operator combining the two sources of a route
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModOp {
    /// Route disabled
    #[default]
    Off,
    /// Source 1 only
    Src1,
    /// Source 2 only
    Src2,
    /// Sum
    Add,
    /// Difference
    Sub,
    /// Product, scaled down by 8192
    Mul,
    /// Bitwise exclusive or
    Xor,
    /// Bitwise or
    Or,
    /// Bitwise and
    And,
    /// Minimum
    Min,
    /// Maximum
    Max,
    /// 0x7FFF if source 1 is less than source 2, else 0
    Lt,
    /// 0x7FFF if source 1 is greater than source 2, else 0
    Gt,
    /// 0x7FFF if the sources are within 64 of each other, else 0
    Eq,
    /// Latch source 1 when source 2 goes from negative to non-negative
    SampleHold,
    /// Reserved, always 0
    Nop,
}

impl ModOp {
    /// An array containing all possible `ModOp` values, in order
    pub const ELEM: [ModOp; 16] = [
        Self::Off,
        Self::Src1,
        Self::Src2,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Xor,
        Self::Or,
        Self::And,
        Self::Min,
        Self::Max,
        Self::Lt,
        Self::Gt,
        Self::Eq,
        Self::SampleHold,
        Self::Nop,
    ];
    /// Decode the low nibble of a route's operator byte
    pub const fn from_nibble(val: u8) -> Self {
        Self::ELEM[(val & 0x0F) as usize]
    }
    /// The string representation of this operator
    pub const fn to_str(&self) -> &'static str {
        match self {
            Self::Off => "--",
            Self::Src1 => "SRC1",
            Self::Src2 => "SRC2",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Xor => "XOR",
            Self::Or => "OR",
            Self::And => "AND",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Eq => "==",
            Self::SampleHold => "S&H",
            Self::Nop => "NOP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_counts() {
        assert_eq!(ModSrc::numel(), 30);
        assert_eq!(ModDst::numel(), 40);
        for (i, src) in ModSrc::elements().iter().enumerate() {
            assert_eq!(*src as usize, i);
        }
        for (i, dst) in ModDst::elements().iter().enumerate() {
            assert_eq!(*dst as usize, i);
        }
    }

    #[test]
    fn helpers() {
        assert_eq!(ModSrc::lfo(5), ModSrc::Lfo6);
        assert_eq!(ModSrc::route(0), ModSrc::Mod1);
        assert_eq!(ModDst::pitch(3), ModDst::Pitch4);
        assert_eq!(ModDst::wavetable(3), ModDst::Wt4);
        assert!(ModSrc::try_from(30).is_err());
        assert!(ModDst::try_from(40).is_err());
        assert_eq!(ModOp::from_nibble(0x4E), ModOp::SampleHold);
    }
}
