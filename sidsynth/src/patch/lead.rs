use super::records::*;
use super::{PatchBytes, SymmetricArea};
use crate::devices::{EnvParams, LfoParams, WtParams, WT_MEMORY_SIZE};
use crate::engine::trigger::{TriggerMatrix, TriggerTargets};
use crate::modulation::{ModRoute, NUM_ROUTES};
use crate::voice::{ArpOptions, ArpParams, VoiceParams};
use crate::NUM_VOICES;

/// The number of LFOs of a Lead patch
pub const LEAD_LFOS: usize = 6;
/// The number of envelopes of a Lead patch
pub const LEAD_ENVS: usize = 2;
/// The number of wavetables of a Lead patch
pub const LEAD_WTS: usize = 4;

const FLAGS: usize = 0x040;
const DETUNE: usize = 0x041;
const ARP: usize = 0x050;
const VOICES: usize = 0x060;
const VOICE_STRIDE: usize = 0x10;
const LFOS: usize = 0x0C0;
const ENVS: usize = 0x0E0;
const ROUTES: usize = 0x100;
const TRIGGERS: usize = 0x140;
const WTS: usize = 0x16C;
const WT_MEMORY: usize = 0x180;

pub(super) const SYMMETRIC: &[SymmetricArea] = &[SymmetricArea {
    base: VOICES as u16,
    stride: VOICE_STRIDE as u16,
    count: NUM_VOICES as u8,
}];

/// Parameters of the Lead engine: one monophonic instrument playing all six
/// voices, with the full modulation matrix
#[derive(Clone, Debug, PartialEq)]
pub struct LeadPatch {
    /// Keep the gates open when a note is played over a held note
    pub legato: bool,
    /// Detune spread applied across the voices
    pub detune: u8,
    /// Arpeggiator
    pub arp: ArpParams,
    /// Voices O1L, O2L, O3L, O1R, O2R, O3R
    pub voices: [VoiceParams; NUM_VOICES],
    /// LFOs
    pub lfos: [LfoParams; LEAD_LFOS],
    /// Envelopes
    pub envs: [EnvParams; LEAD_ENVS],
    /// Modulation matrix
    pub routes: [ModRoute; NUM_ROUTES],
    /// Trigger matrix
    pub triggers: TriggerMatrix,
    /// Wavetable sequencers
    pub wavetables: [WtParams; LEAD_WTS],
    /// Step memory shared by the wavetables
    pub wt_memory: [u8; WT_MEMORY_SIZE],
}

impl Default for LeadPatch {
    fn default() -> Self {
        Self {
            legato: false,
            detune: 0,
            arp: ArpParams::default(),
            voices: [VoiceParams::default(); NUM_VOICES],
            lfos: [LfoParams::default(); LEAD_LFOS],
            envs: [EnvParams::default(); LEAD_ENVS],
            routes: [ModRoute::default(); NUM_ROUTES],
            triggers: TriggerMatrix::default(),
            wavetables: [WtParams::default(); LEAD_WTS],
            wt_memory: [0; WT_MEMORY_SIZE],
        }
    }
}

impl LeadPatch {
    pub(super) fn decode(b: &PatchBytes) -> Self {
        let mut ret = Self {
            legato: b[FLAGS] & 0x01 != 0,
            detune: b[DETUNE],
            arp: ArpParams {
                opts: ArpOptions::from_bits(b[ARP]),
                speed: b[ARP + 1],
                gatelen: b[ARP + 2],
                range: b[ARP + 3],
            },
            ..Default::default()
        };
        for (v, voice) in ret.voices.iter_mut().enumerate() {
            *voice = decode_voice(&b[VOICES + VOICE_STRIDE * v..][..VOICE_RECORD]);
        }
        for (l, lfo) in ret.lfos.iter_mut().enumerate() {
            *lfo = decode_lfo(&b[LFOS + LFO_RECORD * l..][..LFO_RECORD]);
        }
        for (e, env) in ret.envs.iter_mut().enumerate() {
            *env = decode_env(&b[ENVS + ENV_RECORD * e..][..ENV_RECORD]);
        }
        for (r, route) in ret.routes.iter_mut().enumerate() {
            let mut bytes = [0u8; ModRoute::SIZE];
            bytes.copy_from_slice(&b[ROUTES + ModRoute::SIZE * r..][..ModRoute::SIZE]);
            *route = ModRoute::from_bytes(&bytes);
        }
        for (t, row) in ret.triggers.rows.iter_mut().enumerate() {
            let at = TRIGGERS + TriggerTargets::SIZE * t;
            *row = TriggerTargets::from_bytes([b[at], b[at + 1], b[at + 2]]);
        }
        for (w, wt) in ret.wavetables.iter_mut().enumerate() {
            *wt = decode_wt(&b[WTS + WT_RECORD * w..][..WT_RECORD]);
        }
        ret.wt_memory.copy_from_slice(&b[WT_MEMORY..][..WT_MEMORY_SIZE]);
        ret
    }

    pub(super) fn encode(&self, b: &mut PatchBytes) {
        b[FLAGS] = self.legato as u8;
        b[DETUNE] = self.detune;
        b[ARP] = self.arp.opts.bits();
        b[ARP + 1] = self.arp.speed;
        b[ARP + 2] = self.arp.gatelen;
        b[ARP + 3] = self.arp.range;
        for (v, voice) in self.voices.iter().enumerate() {
            encode_voice(voice, &mut b[VOICES + VOICE_STRIDE * v..][..VOICE_RECORD]);
        }
        for (l, lfo) in self.lfos.iter().enumerate() {
            encode_lfo(lfo, &mut b[LFOS + LFO_RECORD * l..][..LFO_RECORD]);
        }
        for (e, env) in self.envs.iter().enumerate() {
            encode_env(env, &mut b[ENVS + ENV_RECORD * e..][..ENV_RECORD]);
        }
        for (r, route) in self.routes.iter().enumerate() {
            b[ROUTES + ModRoute::SIZE * r..][..ModRoute::SIZE].copy_from_slice(&route.to_bytes());
        }
        for (t, row) in self.triggers.rows.iter().enumerate() {
            let at = TRIGGERS + TriggerTargets::SIZE * t;
            b[at..at + TriggerTargets::SIZE].copy_from_slice(&row.to_bytes());
        }
        for (w, wt) in self.wavetables.iter().enumerate() {
            encode_wt(wt, &mut b[WTS + WT_RECORD * w..][..WT_RECORD]);
        }
        b[WT_MEMORY..][..WT_MEMORY_SIZE].copy_from_slice(&self.wt_memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulation::{ModDst, ModSrc};
    use crate::patch::PATCH_SIZE;

    #[test]
    fn layout_offsets() {
        let mut patch = LeadPatch::default();
        patch.voices[2].attack_decay = 0x5A;
        patch.lfos[5].rate = 0x77;
        patch.envs[1].sustain = 0x66;
        patch.routes[7] = ModRoute::simple(ModSrc::Lfo1, ModDst::Pitch1, 0xC0);
        patch.wavetables[3].begin = 0x12;
        patch.wt_memory[127] = 0x99;
        let mut b = [0u8; PATCH_SIZE];
        patch.encode(&mut b);
        assert_eq!(b[0x081], 0x5A);
        assert_eq!(b[0x0C0 + 25 + 2], 0x77);
        assert_eq!(b[0x0F0 + 9], 0x66);
        assert_eq!(b[0x13B], 0xC0);
        assert_eq!(b[0x16C + 15 + 2], 0x12);
        assert_eq!(b[0x1FF], 0x99);
        // default note on row opens all gates
        assert_eq!(b[0x140], 0xFF);
        assert_eq!(LeadPatch::decode(&b), patch);
    }
}
