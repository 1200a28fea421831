use super::PatchBytes;
use crate::devices::DRUM_MODELS;

/// The number of instruments of a drum patch
pub const DRUM_INSTRUMENTS: usize = 16;

const INSTRUMENTS: usize = 0x060;
const INSTRUMENT_STRIDE: usize = 10;

/// One drum instrument, played on any voice its policy allows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrumInstrument {
    /// Voice assignment policy, see [crate::voice::VoiceAllocator]
    pub policy: u8,
    /// Index into [DRUM_MODELS]
    pub model: u8,
    /// Attack/decay register
    pub attack_decay: u8,
    /// Sustain/release register
    pub sustain_release: u8,
    /// Transposition of the model's notes in semitones
    pub tune: i8,
    /// Ticks the gate stays open, at an update speed factor of 1
    pub gatelen: u8,
    /// Ticks per model step, at an update speed factor of 1
    pub speed: u8,
    /// Upper 8 bits of the pulse width
    pub pulsewidth: u8,
    /// MIDI note triggering this instrument
    pub note: u8,
}

impl DrumInstrument {
    fn decode(b: &[u8]) -> Self {
        Self {
            policy: b[0],
            model: b[1],
            attack_decay: b[2],
            sustain_release: b[3],
            tune: (b[4] as i16 - 128) as i8,
            gatelen: b[5],
            speed: b[6],
            pulsewidth: b[7],
            note: b[8] & 0x7F,
        }
    }

    fn encode(&self, b: &mut [u8]) {
        b[0] = self.policy;
        b[1] = self.model;
        b[2] = self.attack_decay;
        b[3] = self.sustain_release;
        b[4] = (self.tune as i16 + 128) as u8;
        b[5] = self.gatelen;
        b[6] = self.speed;
        b[7] = self.pulsewidth;
        b[8] = self.note;
    }
}

/// Parameters of the Drum engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrumPatch {
    /// Instruments
    pub instruments: [DrumInstrument; DRUM_INSTRUMENTS],
}

impl Default for DrumPatch {
    /// Instrument `i` plays model `i` (wrapping) on note 36 + i
    fn default() -> Self {
        let mut instruments = [DrumInstrument {
            policy: 0,
            model: 0,
            attack_decay: 0x09,
            sustain_release: 0x00,
            tune: 0,
            gatelen: 20,
            speed: 4,
            pulsewidth: 0x80,
            note: 0,
        }; DRUM_INSTRUMENTS];
        for (i, ins) in instruments.iter_mut().enumerate() {
            ins.model = (i % DRUM_MODELS.len()) as u8;
            ins.note = 36 + i as u8;
        }
        Self { instruments }
    }
}

impl DrumPatch {
    /// The instrument triggered by `note`
    pub fn instrument_for(&self, note: u8) -> Option<usize> {
        self.instruments.iter().position(|i| i.note == note)
    }
    /// The voice policy of every instrument
    pub fn policies(&self) -> [u8; DRUM_INSTRUMENTS] {
        self.instruments.map(|i| i.policy)
    }

    pub(super) fn decode(b: &PatchBytes) -> Self {
        let mut ret = Self::default();
        for (i, ins) in ret.instruments.iter_mut().enumerate() {
            *ins = DrumInstrument::decode(&b[INSTRUMENTS + INSTRUMENT_STRIDE * i..][..INSTRUMENT_STRIDE]);
        }
        ret
    }

    pub(super) fn encode(&self, b: &mut PatchBytes) {
        for (i, ins) in self.instruments.iter().enumerate() {
            ins.encode(&mut b[INSTRUMENTS + INSTRUMENT_STRIDE * i..][..INSTRUMENT_STRIDE]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PATCH_SIZE;

    #[test]
    fn note_lookup() {
        let patch = DrumPatch::default();
        assert_eq!(patch.instrument_for(36), Some(0));
        assert_eq!(patch.instrument_for(51), Some(15));
        assert_eq!(patch.instrument_for(20), None);
        assert_eq!(patch.instruments[13].model, 1);
    }

    #[test]
    fn layout() {
        let mut patch = DrumPatch::default();
        patch.instruments[15].tune = -12;
        patch.instruments[1].policy = 4;
        let mut b = [0u8; PATCH_SIZE];
        patch.encode(&mut b);
        assert_eq!(b[0x060 + 150 + 4], 116);
        assert_eq!(b[0x06A], 4);
        assert_eq!(DrumPatch::decode(&b), patch);
        assert_eq!(patch.policies()[1], 4);
    }
}
