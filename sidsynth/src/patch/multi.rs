use super::records::*;
use super::{InstrumentLfo, PatchBytes, SymmetricArea};
use crate::devices::EnvParams;
use crate::voice::VoiceParams;

/// The number of instruments of a multi patch
pub const MULTI_INSTRUMENTS: usize = 6;

const INSTRUMENTS: usize = 0x060;
const INSTRUMENT_STRIDE: usize = 0x30;
const VOICE: usize = 0x01;
const ENV: usize = 0x0C;
const ENV_PITCH: usize = 0x12;
const ENV_CUTOFF: usize = 0x13;
const LFOS: usize = 0x14;

pub(super) const SYMMETRIC: &[SymmetricArea] = &[SymmetricArea {
    base: INSTRUMENTS as u16,
    stride: INSTRUMENT_STRIDE as u16,
    count: MULTI_INSTRUMENTS as u8,
}];

/// One polyphonic instrument of a multi patch
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultiInstrument {
    /// Voice assignment policy, see [crate::voice::VoiceAllocator]
    pub policy: u8,
    /// Voice parameters
    pub voice: VoiceParams,
    /// Envelope, always the reduced model
    pub env: EnvParams,
    /// Envelope to pitch depth, 128 is neutral
    pub env_pitch: u8,
    /// Envelope to filter depth, 128 is neutral
    pub env_cutoff: u8,
    /// LFOs
    pub lfos: [InstrumentLfo; 2],
}

impl Default for MultiInstrument {
    fn default() -> Self {
        Self {
            policy: 0,
            voice: VoiceParams::default(),
            env: EnvParams::adsr(0, 0, 0xFF, 0),
            env_pitch: 0x80,
            env_cutoff: 0x80,
            lfos: [InstrumentLfo::default(); 2],
        }
    }
}

impl MultiInstrument {
    fn decode(b: &[u8]) -> Self {
        Self {
            policy: b[0],
            voice: decode_voice(&b[VOICE..][..VOICE_RECORD]),
            env: decode_minimal_env(&b[ENV..][..MINIMAL_ENV_RECORD]),
            env_pitch: b[ENV_PITCH],
            env_cutoff: b[ENV_CUTOFF],
            lfos: [
                decode_instrument_lfo(&b[LFOS..][..INSTRUMENT_LFO_RECORD]),
                decode_instrument_lfo(&b[LFOS + INSTRUMENT_LFO_RECORD..][..INSTRUMENT_LFO_RECORD]),
            ],
        }
    }

    fn encode(&self, b: &mut [u8]) {
        b[0] = self.policy;
        encode_voice(&self.voice, &mut b[VOICE..][..VOICE_RECORD]);
        encode_minimal_env(&self.env, &mut b[ENV..][..MINIMAL_ENV_RECORD]);
        b[ENV_PITCH] = self.env_pitch;
        b[ENV_CUTOFF] = self.env_cutoff;
        for (l, lfo) in self.lfos.iter().enumerate() {
            encode_instrument_lfo(
                lfo,
                &mut b[LFOS + INSTRUMENT_LFO_RECORD * l..][..INSTRUMENT_LFO_RECORD],
            );
        }
    }
}

/// Parameters of the Multi engine
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiPatch {
    /// Instruments, one per MIDI routing slot
    pub instruments: [MultiInstrument; MULTI_INSTRUMENTS],
}

impl MultiPatch {
    /// The voice policy of every instrument
    pub fn policies(&self) -> [u8; MULTI_INSTRUMENTS] {
        self.instruments.map(|i| i.policy)
    }

    pub(super) fn decode(b: &PatchBytes) -> Self {
        let mut ret = Self::default();
        for (i, ins) in ret.instruments.iter_mut().enumerate() {
            *ins = MultiInstrument::decode(&b[INSTRUMENTS + INSTRUMENT_STRIDE * i..][..INSTRUMENT_STRIDE]);
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
    fn layout() {
        let mut patch = MultiPatch::default();
        patch.instruments[5].policy = 3;
        patch.instruments[5].voice.attack_decay = 0x21;
        patch.instruments[2].env_cutoff = 0x90;
        patch.instruments[0].lfos[1].lfo.rate = 0x44;
        let mut b = [0u8; PATCH_SIZE];
        patch.encode(&mut b);
        assert_eq!(b[0x150], 3);
        assert_eq!(b[0x150 + 2], 0x21);
        assert_eq!(b[0x0C0 + 0x13], 0x90);
        assert_eq!(b[0x060 + 0x1C + 2], 0x44);
        assert_eq!(MultiPatch::decode(&b), patch);
        assert_eq!(patch.policies()[5], 3);
    }
}
