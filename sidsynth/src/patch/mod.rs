//! The patch: everything that defines the sound of one engine.
//!
//! Patches are exchanged as a 512 byte blob (see [Patch::encode] and
//! [Patch::decode]); the engines work on the decoded form.  Single parameters
//! are changed through [Patch::write], which edits the encoded byte and
//! decodes the result, so every change goes through the same validation.

use arrayvec::ArrayVec;

use crate::devices::LfoParams;
use crate::filter::FilterParams;
use crate::{NUM_FILTERS, VOICES_PER_CHIP};

mod bassline;
mod drum;
mod lead;
mod multi;
mod records;

pub use bassline::{BasslineInstrument, BasslinePatch, SeqStep, StepSequence, SEQ_STEPS};
pub use drum::{DrumInstrument, DrumPatch, DRUM_INSTRUMENTS};
pub use lead::{LeadPatch, LEAD_ENVS, LEAD_LFOS, LEAD_WTS};
pub use multi::{MultiInstrument, MultiPatch, MULTI_INSTRUMENTS};

/// The size of an encoded patch
pub const PATCH_SIZE: usize = 512;
/// The length of the patch name
pub const NAME_LEN: usize = 16;
/// The number of knob records
pub const NUM_KNOBS: usize = 8;
/// Knob driven by note velocity
pub const KNOB_VELOCITY: usize = 5;
/// Knob driven by pitch bend
pub const KNOB_PITCHBEND: usize = 6;
/// Knob driven by channel aftertouch
pub const KNOB_AFTERTOUCH: usize = 7;

/// An encoded patch
pub type PatchBytes = [u8; PATCH_SIZE];

const ENGINE: usize = 0x010;
const KNOBS: usize = 0x014;
const KNOB_RECORD: usize = 5;
const VOLUME: usize = 0x042;
const FILTERS: usize = 0x044;

/// The four kinds of engine a patch can select
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineKind {
    /// One monophonic instrument on six voices
    #[default]
    Lead,
    /// Two monophonic instruments with step sequencers
    Bassline,
    /// Sixteen drum instruments
    Drum,
    /// Six polyphonic instruments
    Multi,
}

impl EngineKind {
    const ELEM: [EngineKind; 4] = [Self::Lead, Self::Bassline, Self::Drum, Self::Multi];
    /// All kinds
    pub const fn kinds() -> &'static [EngineKind] {
        &Self::ELEM
    }
    /// Convert from the engine byte of a patch
    pub const fn new_from_u8(value: u8) -> Option<Self> {
        if (value as usize) < Self::ELEM.len() {
            Some(Self::ELEM[value as usize])
        } else {
            None
        }
    }
    /// Display name
    pub const fn to_str(&self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Bassline => "Bassline",
            Self::Drum => "Drum",
            Self::Multi => "Multi",
        }
    }
}

impl TryFrom<u8> for EngineKind {
    type Error = &'static str;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new_from_u8(value).ok_or("Invalid Engine Kind")
    }
}

/// A knob: a value that is written, scaled into `min..=max`, to up to two
/// patch addresses whenever it changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Knob {
    /// Assigned parameters: 0 for none, otherwise patch address `0x03F + n`
    pub assign: [u8; 2],
    /// Current value
    pub value: u8,
    /// Parameter value at knob value 0
    pub min: u8,
    /// Parameter value at knob value 255
    pub max: u8,
}

impl Default for Knob {
    fn default() -> Self {
        Self {
            assign: [0; 2],
            value: 0,
            min: 0,
            max: 0xFF,
        }
    }
}

impl Knob {
    const ASSIGN_BASE: u16 = 0x03F;
    /// The patch address selected by an assignment byte
    pub const fn address(assign: u8) -> Option<u16> {
        match assign {
            0 => None,
            n => Some(Self::ASSIGN_BASE + n as u16),
        }
    }
    /// The value written to the assigned parameters.  `min > max` inverts.
    pub const fn scaled(&self) -> u8 {
        let (min, max) = (self.min as i32, self.max as i32);
        (min + self.value as i32 * (max - min) / 255) as u8
    }
    /// The value as a modulation source
    pub const fn mod_value(&self) -> i16 {
        (self.value as i16) << 7
    }
}

/// An LFO of a Bassline or Multi instrument, with fixed destinations
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InstrumentLfo {
    /// The LFO
    pub lfo: LfoParams,
    /// Depth to the voice's pitch, 128 is neutral
    pub depth_pitch: u8,
    /// Depth to the voice's pulse width, 128 is neutral
    pub depth_pw: u8,
    /// Depth to the filter cutoff, 128 is neutral
    pub depth_cutoff: u8,
}

/// A run of equally sized records that are mirrored by write options
pub(crate) struct SymmetricArea {
    base: u16,
    stride: u16,
    count: u8,
}

impl SymmetricArea {
    fn index(&self, addr: u16) -> Option<(u8, u16)> {
        let offset = addr.checked_sub(self.base)?;
        let index = offset / self.stride;
        (index < self.count as u16).then_some((index as u8, offset % self.stride))
    }
}

const FILTER_AREA: SymmetricArea = SymmetricArea {
    base: FILTERS as u16,
    stride: records::FILTER_RECORD as u16,
    count: NUM_FILTERS as u8,
};

/// The addresses written when `addr` is written with write option `wopt`,
/// in ascending order:
///  - 0: `addr` only
///  - 1: `addr` and the same parameter on the other chip
///  - 2: the same parameter on every voice of the chip
///  - 3: the same parameter on every voice
///
/// Addresses outside the per voice, per instrument and filter records are
/// always written directly.
pub fn wopt_addresses(kind: EngineKind, addr: u16, wopt: u8) -> ArrayVec<u16, 6> {
    let areas: &[SymmetricArea] = match kind {
        EngineKind::Lead => lead::SYMMETRIC,
        EngineKind::Bassline => bassline::SYMMETRIC,
        EngineKind::Drum => &[],
        EngineKind::Multi => multi::SYMMETRIC,
    };
    let mut ret = ArrayVec::new();
    let found = core::iter::once(&FILTER_AREA)
        .chain(areas.iter())
        .find_map(|area| area.index(addr).map(|(i, off)| (area, i, off)));
    let Some((area, index, offset)) = found else {
        ret.push(addr);
        return ret;
    };
    let half = (area.count / 2).clamp(1, VOICES_PER_CHIP as u8);
    for i in 0..area.count {
        let mirror = i == index || i == (index + half) % area.count;
        let group = i / half == index / half;
        let selected = match wopt {
            1 => mirror,
            2 => group,
            3 => true,
            _ => i == index,
        };
        if selected {
            ret.push(area.base + area.stride * i as u16 + offset);
        }
    }
    ret
}

/// Engine specific part of a patch
#[derive(Clone, Debug, PartialEq)]
pub enum EnginePatch {
    /// See [LeadPatch]
    Lead(LeadPatch),
    /// See [BasslinePatch]
    Bassline(BasslinePatch),
    /// See [DrumPatch]
    Drum(DrumPatch),
    /// See [MultiPatch]
    Multi(MultiPatch),
}

impl EnginePatch {
    /// Default parameters for an engine kind
    pub fn new(kind: EngineKind) -> Self {
        match kind {
            EngineKind::Lead => Self::Lead(LeadPatch::default()),
            EngineKind::Bassline => Self::Bassline(BasslinePatch::default()),
            EngineKind::Drum => Self::Drum(DrumPatch::default()),
            EngineKind::Multi => Self::Multi(MultiPatch::default()),
        }
    }
    /// The engine kind these parameters are for
    pub fn kind(&self) -> EngineKind {
        match self {
            Self::Lead(_) => EngineKind::Lead,
            Self::Bassline(_) => EngineKind::Bassline,
            Self::Drum(_) => EngineKind::Drum,
            Self::Multi(_) => EngineKind::Multi,
        }
    }
}

/// A complete patch
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    /// Name, NUL padded
    pub name: [u8; NAME_LEN],
    /// Knobs K1..K5, velocity, pitch bend and aftertouch
    pub knobs: [Knob; NUM_KNOBS],
    /// Static volume, 0..=127
    pub volume: u8,
    /// Filters of the left and right chip
    pub filters: [FilterParams; NUM_FILTERS],
    /// Engine parameters
    pub engine: EnginePatch,
}

impl Default for Patch {
    fn default() -> Self {
        Self::new(EngineKind::Lead)
    }
}

impl Patch {
    /// A patch with default parameters for `kind`
    pub fn new(kind: EngineKind) -> Self {
        let mut ret = Self {
            name: [0; NAME_LEN],
            knobs: [Knob::default(); NUM_KNOBS],
            volume: 127,
            filters: [FilterParams::default(); NUM_FILTERS],
            engine: EnginePatch::new(kind),
        };
        ret.knobs[KNOB_PITCHBEND].value = 0x80;
        ret.set_name(kind.to_str());
        ret
    }
    /// The engine kind
    pub fn kind(&self) -> EngineKind {
        self.engine.kind()
    }
    /// The name up to the first NUL, or "" if it is not valid UTF-8
    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|c| *c == 0).unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }
    /// Set the name, truncated to [NAME_LEN] bytes
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_LEN];
        let mut len = name.len().min(NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        self.name[..len].copy_from_slice(&name.as_bytes()[..len]);
    }

    /// Encode to the 512 byte patch layout
    pub fn encode(&self) -> PatchBytes {
        let mut b = [0u8; PATCH_SIZE];
        b[..NAME_LEN].copy_from_slice(&self.name);
        b[ENGINE] = self.kind() as u8;
        for (k, knob) in self.knobs.iter().enumerate() {
            let at = KNOBS + KNOB_RECORD * k;
            b[at..at + KNOB_RECORD]
                .copy_from_slice(&[knob.assign[0], knob.assign[1], knob.value, knob.min, knob.max]);
        }
        b[VOLUME] = self.volume;
        for (f, filter) in self.filters.iter().enumerate() {
            let at = FILTERS + records::FILTER_RECORD * f;
            records::encode_filter(filter, &mut b[at..at + records::FILTER_RECORD]);
        }
        match &self.engine {
            EnginePatch::Lead(p) => p.encode(&mut b),
            EnginePatch::Bassline(p) => p.encode(&mut b),
            EnginePatch::Drum(p) => p.encode(&mut b),
            EnginePatch::Multi(p) => p.encode(&mut b),
        }
        b
    }

    /// Decode a 512 byte patch.  An unknown engine byte selects the Lead
    /// engine.
    pub fn decode(bytes: &[u8]) -> Result<Self, &'static str> {
        let b: &PatchBytes = bytes.try_into().map_err(|_| "Invalid patch length")?;
        let kind = EngineKind::new_from_u8(b[ENGINE]).unwrap_or_else(|| {
            log::warn!("unknown engine {} in patch, using Lead", b[ENGINE]);
            EngineKind::Lead
        });
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&b[..NAME_LEN]);
        let mut knobs = [Knob::default(); NUM_KNOBS];
        for (k, knob) in knobs.iter_mut().enumerate() {
            let r = &b[KNOBS + KNOB_RECORD * k..][..KNOB_RECORD];
            *knob = Knob {
                assign: [r[0], r[1]],
                value: r[2],
                min: r[3],
                max: r[4],
            };
        }
        let mut filters = [FilterParams::default(); NUM_FILTERS];
        for (f, filter) in filters.iter_mut().enumerate() {
            *filter = records::decode_filter(&b[FILTERS + records::FILTER_RECORD * f..]);
        }
        let engine = match kind {
            EngineKind::Lead => EnginePatch::Lead(LeadPatch::decode(b)),
            EngineKind::Bassline => EnginePatch::Bassline(BasslinePatch::decode(b)),
            EngineKind::Drum => EnginePatch::Drum(DrumPatch::decode(b)),
            EngineKind::Multi => EnginePatch::Multi(MultiPatch::decode(b)),
        };
        Ok(Self {
            name,
            knobs,
            volume: b[VOLUME] & 0x7F,
            filters,
            engine,
        })
    }

    /// Read one byte of the encoded patch
    pub fn read(&self, addr: u16) -> Option<u8> {
        self.encode().get(addr as usize).copied()
    }

    /// Write one byte of the encoded patch.  Writes outside the patch are
    /// logged and ignored; returns false in that case.
    pub fn write(&mut self, addr: u16, value: u8) -> bool {
        self.write_wopt(addr, 0, value)
    }

    /// Write one byte to every address selected by the write option `wopt`
    /// (see [wopt_addresses])
    pub fn write_wopt(&mut self, addr: u16, wopt: u8, value: u8) -> bool {
        if addr as usize >= PATCH_SIZE {
            log::warn!("parameter write outside the patch: {:#05x}", addr);
            return false;
        }
        let mut b = self.encode();
        for a in wopt_addresses(self.kind(), addr, wopt) {
            b[a as usize] = value;
        }
        match Self::decode(&b) {
            Ok(patch) => {
                *self = patch;
                true
            }
            Err(e) => {
                log::error!("{}", e);
                false
            }
        }
    }

    /// Move knob `k` and write its assigned parameters.  Returns the
    /// number of parameters written.
    pub fn set_knob(&mut self, k: usize, value: u8) -> usize {
        let Some(knob) = self.knobs.get_mut(k) else {
            log::debug!("ignoring unknown knob {}", k);
            return 0;
        };
        knob.value = value;
        let knob = *knob;
        knob.assign
            .iter()
            .filter_map(|a| Knob::address(*a))
            .filter(|addr| self.write(*addr, knob.scaled()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wopt_all_lead_voices() {
        let addrs = wopt_addresses(EngineKind::Lead, 0x60, 3);
        assert_eq!(addrs.as_slice(), &[0x60, 0x70, 0x80, 0x90, 0xA0, 0xB0]);

        let mut patch = Patch::new(EngineKind::Lead);
        assert!(patch.write_wopt(0x60, 3, 0x41));
        let b = patch.encode();
        for a in [0x60, 0x70, 0x80, 0x90, 0xA0, 0xB0] {
            assert_eq!(b[a], 0x41);
        }
    }

    #[test]
    fn wopt_mirror_and_group() {
        assert_eq!(wopt_addresses(EngineKind::Lead, 0x93, 1).as_slice(), &[0x63, 0x93]);
        assert_eq!(wopt_addresses(EngineKind::Lead, 0x93, 2).as_slice(), &[0x93, 0xA3, 0xB3]);
        assert_eq!(wopt_addresses(EngineKind::Lead, 0x93, 0).as_slice(), &[0x93]);
        // filters mirror but have no group
        assert_eq!(wopt_addresses(EngineKind::Drum, 0x045, 1).as_slice(), &[0x045, 0x04B]);
        assert_eq!(wopt_addresses(EngineKind::Drum, 0x04B, 2).as_slice(), &[0x04B]);
        assert_eq!(wopt_addresses(EngineKind::Bassline, 0x0E5, 3).as_slice(), &[0x065, 0x0E5]);
        assert_eq!(
            wopt_addresses(EngineKind::Multi, 0x061, 2).as_slice(),
            &[0x061, 0x091, 0x0C1]
        );
        // outside a symmetric area
        assert_eq!(wopt_addresses(EngineKind::Lead, 0x100, 3).as_slice(), &[0x100]);
        assert_eq!(wopt_addresses(EngineKind::Drum, 0x060, 3).as_slice(), &[0x060]);
    }

    #[test]
    fn decode_checks_length() {
        assert!(Patch::decode(&[0u8; 100]).is_err());
        let b = Patch::new(EngineKind::Multi).encode();
        let patch = Patch::decode(&b).unwrap();
        assert_eq!(patch.kind(), EngineKind::Multi);
        assert_eq!(patch.name(), "Multi");
    }

    #[test]
    fn unknown_engine_is_lead() {
        let mut b = Patch::new(EngineKind::Drum).encode();
        b[ENGINE] = 9;
        assert_eq!(Patch::decode(&b).unwrap().kind(), EngineKind::Lead);
    }

    #[test]
    fn write_roundtrips_through_decode() {
        let mut patch = Patch::new(EngineKind::Lead);
        assert!(patch.write(0x042, 0x40));
        assert_eq!(patch.volume, 0x40);
        // volume is 7 bits
        assert!(patch.write(0x042, 0xFF));
        assert_eq!(patch.volume, 0x7F);
        assert_eq!(patch.read(0x042), Some(0x7F));
        assert!(!patch.write(0x200, 1));
        assert_eq!(patch.read(0x200), None);
        // changing the engine byte switches the engine
        assert!(patch.write(0x010, EngineKind::Bassline as u8));
        assert_eq!(patch.kind(), EngineKind::Bassline);
    }

    #[test]
    fn knob_writes_assigned_parameters() {
        let mut patch = Patch::new(EngineKind::Lead);
        patch.knobs[0] = Knob {
            assign: [0x42 - 0x3F, 0],
            value: 0,
            min: 0x10,
            max: 0x50,
        };
        assert_eq!(patch.set_knob(0, 0xFF), 1);
        assert_eq!(patch.volume, 0x50);
        assert_eq!(patch.knobs[0].value, 0xFF);
        patch.set_knob(0, 0);
        assert_eq!(patch.volume, 0x10);
        assert_eq!(patch.set_knob(12, 0), 0);
    }

    #[test]
    fn inverted_knob_range() {
        let knob = Knob {
            assign: [0; 2],
            value: 0xFF,
            min: 0xFF,
            max: 0x00,
        };
        assert_eq!(knob.scaled(), 0);
        assert_eq!(Knob { value: 0, ..knob }.scaled(), 0xFF);
    }

    #[test]
    fn names() {
        let mut patch = Patch::default();
        patch.set_name("A very long patch name");
        assert_eq!(patch.name(), "A very long patc");
        patch.set_name("Bass");
        assert_eq!(patch.name(), "Bass");
        assert_eq!(Patch::decode(&patch.encode()).unwrap(), patch);
    }
}
