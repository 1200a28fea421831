use super::records::*;
use super::{InstrumentLfo, PatchBytes, SymmetricArea};
use crate::devices::EnvParams;
use crate::voice::VoiceParams;

/// The number of steps of a bassline sequence
pub const SEQ_STEPS: usize = 16;

const INSTRUMENTS: usize = 0x060;
const INSTRUMENT_STRIDE: usize = 0x80;
const ENV: usize = 0x10;
const ENV_CUTOFF: usize = 0x16;
const ENV_PITCH: usize = 0x17;
const LFOS: usize = 0x18;
const ACCENT: usize = 0x28;
const SEQ: usize = 0x30;
const SEQ_NOTES: usize = 0x40;
const SEQ_FLAGS: usize = 0x50;

pub(super) const SYMMETRIC: &[SymmetricArea] = &[SymmetricArea {
    base: INSTRUMENTS as u16,
    stride: INSTRUMENT_STRIDE as u16,
    count: 2,
}];

/// One step of the sequencer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeqStep {
    /// Note relative to the played key, [crate::NOTE_C3] plays the key itself
    pub note: u8,
    /// Play a note on this step
    pub gate: bool,
    /// Accent the note
    pub accent: bool,
    /// Glide into the next step without retriggering
    pub slide: bool,
}

impl SeqStep {
    const fn flags(&self) -> u8 {
        self.gate as u8 | (self.accent as u8) << 1 | (self.slide as u8) << 2
    }
}

/// The step sequencer of a bassline instrument
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepSequence {
    /// Play the sequence while a key is held instead of the key itself
    pub enabled: bool,
    /// Clock pulses per step, minus one
    pub speed: u8,
    /// Number of steps played, 1..=16
    pub length: u8,
    /// Clock pulses the gate stays open, 0 to keep it open until the next step
    pub gatelen: u8,
    /// Steps
    pub steps: [SeqStep; SEQ_STEPS],
}

impl Default for StepSequence {
    fn default() -> Self {
        let mut steps = [SeqStep {
            note: crate::NOTE_C3,
            gate: true,
            ..Default::default()
        }; SEQ_STEPS];
        for (i, step) in steps.iter_mut().enumerate() {
            step.accent = i % 4 == 0;
        }
        Self {
            enabled: false,
            speed: 5,
            length: SEQ_STEPS as u8,
            gatelen: 3,
            steps,
        }
    }
}

/// One of the two instruments of a bassline patch, playing voice 1 of its chip
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BasslineInstrument {
    /// The voice
    pub voice: VoiceParams,
    /// Envelope, always the reduced model
    pub env: EnvParams,
    /// Envelope to filter depth, 128 is neutral
    pub env_cutoff: u8,
    /// Envelope to pitch depth, 128 is neutral
    pub env_pitch: u8,
    /// LFOs
    pub lfos: [InstrumentLfo; 2],
    /// Cutoff boost of accented notes
    pub accent_cutoff: u8,
    /// Step sequencer
    pub seq: StepSequence,
}

impl Default for BasslineInstrument {
    fn default() -> Self {
        Self {
            voice: VoiceParams::default(),
            env: EnvParams::adsr(0, 0x40, 0, 0x20),
            env_cutoff: 0xC0,
            env_pitch: 0x80,
            lfos: [InstrumentLfo::default(); 2],
            accent_cutoff: 0x40,
            seq: StepSequence::default(),
        }
    }
}

impl BasslineInstrument {
    fn decode(b: &[u8]) -> Self {
        let mut seq = StepSequence {
            enabled: b[SEQ] & 0x01 != 0,
            speed: b[SEQ + 1],
            length: b[SEQ + 2].clamp(1, SEQ_STEPS as u8),
            gatelen: b[SEQ + 3],
            ..Default::default()
        };
        for (i, step) in seq.steps.iter_mut().enumerate() {
            let flags = b[SEQ_FLAGS + i];
            *step = SeqStep {
                note: b[SEQ_NOTES + i] & 0x7F,
                gate: flags & 0x01 != 0,
                accent: flags & 0x02 != 0,
                slide: flags & 0x04 != 0,
            };
        }
        Self {
            voice: decode_voice(&b[..VOICE_RECORD]),
            env: decode_minimal_env(&b[ENV..][..MINIMAL_ENV_RECORD]),
            env_cutoff: b[ENV_CUTOFF],
            env_pitch: b[ENV_PITCH],
            lfos: [
                decode_instrument_lfo(&b[LFOS..][..INSTRUMENT_LFO_RECORD]),
                decode_instrument_lfo(&b[LFOS + INSTRUMENT_LFO_RECORD..][..INSTRUMENT_LFO_RECORD]),
            ],
            accent_cutoff: b[ACCENT],
            seq,
        }
    }

    fn encode(&self, b: &mut [u8]) {
        encode_voice(&self.voice, &mut b[..VOICE_RECORD]);
        encode_minimal_env(&self.env, &mut b[ENV..][..MINIMAL_ENV_RECORD]);
        b[ENV_CUTOFF] = self.env_cutoff;
        b[ENV_PITCH] = self.env_pitch;
        for (l, lfo) in self.lfos.iter().enumerate() {
            encode_instrument_lfo(
                lfo,
                &mut b[LFOS + INSTRUMENT_LFO_RECORD * l..][..INSTRUMENT_LFO_RECORD],
            );
        }
        b[ACCENT] = self.accent_cutoff;
        b[SEQ] = self.seq.enabled as u8;
        b[SEQ + 1] = self.seq.speed;
        b[SEQ + 2] = self.seq.length;
        b[SEQ + 3] = self.seq.gatelen;
        for (i, step) in self.seq.steps.iter().enumerate() {
            b[SEQ_NOTES + i] = step.note;
            b[SEQ_FLAGS + i] = step.flags();
        }
    }
}

/// Parameters of the Bassline engine: two monophonic instruments, one per chip
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasslinePatch {
    /// Left and right instrument
    pub instruments: [BasslineInstrument; 2],
}

impl BasslinePatch {
    pub(super) fn decode(b: &PatchBytes) -> Self {
        let mut ret = Self::default();
        for (i, ins) in ret.instruments.iter_mut().enumerate() {
            *ins = BasslineInstrument::decode(&b[INSTRUMENTS + INSTRUMENT_STRIDE * i..][..INSTRUMENT_STRIDE]);
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
    fn instrument_layout() {
        let mut patch = BasslinePatch::default();
        patch.instruments[1].seq.steps[3] = SeqStep {
            note: 67,
            gate: true,
            accent: false,
            slide: true,
        };
        patch.instruments[1].lfos[1].depth_cutoff = 0x33;
        let mut b = [0u8; PATCH_SIZE];
        patch.encode(&mut b);
        assert_eq!(b[0x0E0 + 0x43], 67);
        assert_eq!(b[0x0E0 + 0x53], 0x05);
        assert_eq!(b[0x0E0 + 0x27], 0x33);
        assert_eq!(BasslinePatch::decode(&b), patch);
    }

    #[test]
    fn sequence_length_is_clamped() {
        let mut b = [0u8; PATCH_SIZE];
        BasslinePatch::default().encode(&mut b);
        b[0x060 + SEQ + 2] = 0;
        b[0x0E0 + SEQ + 2] = 200;
        let patch = BasslinePatch::decode(&b);
        assert_eq!(patch.instruments[0].seq.length, 1);
        assert_eq!(patch.instruments[1].seq.length, 16);
    }
}
