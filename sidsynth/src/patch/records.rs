//! Encoding of the records that appear at several places in the patch

use super::InstrumentLfo;
use crate::devices::{EnvOptions, EnvParams, LfoOptions, LfoParams, WtParams};
use crate::filter::FilterParams;
use crate::voice::{PortamentoMode, VoiceParams, VoiceWaveform};

/// Bytes used by a voice record
pub(super) const VOICE_RECORD: usize = 11;
/// Bytes of a full envelope record
pub(super) const ENV_RECORD: usize = 16;
/// Bytes of a reduced envelope record
pub(super) const MINIMAL_ENV_RECORD: usize = 6;
/// Bytes of an LFO record
pub(super) const LFO_RECORD: usize = 5;
/// Bytes of an LFO record with its own routing depths
pub(super) const INSTRUMENT_LFO_RECORD: usize = 8;
/// Bytes of a wavetable parameter record
pub(super) const WT_RECORD: usize = 5;
/// Bytes of a filter record
pub(super) const FILTER_RECORD: usize = 6;

const MINIMAL_MODE_MASK: u8 = 0x71;

/// `[waveform, AD, SR, pw lo, pw hi, transpose, finetune, bend range,
/// portamento, flags, gate delay]`
pub(super) fn decode_voice(b: &[u8]) -> VoiceParams {
    VoiceParams {
        waveform: VoiceWaveform::from_bits(b[0]),
        attack_decay: b[1],
        sustain_release: b[2],
        pulsewidth: u16::from_le_bytes([b[3], b[4] & 0x0F]),
        transpose: (b[5] as i16 - 64).clamp(-64, 63) as i8,
        finetune: (b[6] as i16 - 128) as i8,
        bend_range: b[7],
        portamento: b[8],
        porta_mode: PortamentoMode::new_from_u8(b[9] & 0x03).unwrap_or_default(),
        gate_delay: b[10],
    }
}

pub(super) fn encode_voice(v: &VoiceParams, b: &mut [u8]) {
    let pw = v.pulsewidth.to_le_bytes();
    b[0] = v.waveform.to_bits();
    b[1] = v.attack_decay;
    b[2] = v.sustain_release;
    b[3] = pw[0];
    b[4] = pw[1] & 0x0F;
    b[5] = (v.transpose as i16 + 64) as u8;
    b[6] = (v.finetune as i16 + 128) as u8;
    b[7] = v.bend_range;
    b[8] = v.portamento;
    b[9] = v.porta_mode as u8;
    b[10] = v.gate_delay;
}

/// `[mode, depth, delay, a1, alvl, a2, d1, dlvl, d2, s, r1, rlvl, r2, curve,
/// accent decay, -]`
pub(super) fn decode_env(b: &[u8]) -> EnvParams {
    EnvParams {
        opts: EnvOptions::from_bits((b[0] & 0x0F) | (b[13] & 0x07) << 4),
        depth: b[1],
        delay: b[2],
        attack1: b[3],
        attack_level: b[4],
        attack2: b[5],
        decay1: b[6],
        decay_level: b[7],
        decay2: b[8],
        sustain: b[9],
        release1: b[10],
        release_level: b[11],
        release2: b[12],
        decay_accent: b[14],
    }
}

pub(super) fn encode_env(e: &EnvParams, b: &mut [u8]) {
    b[0] = e.opts.bits() & 0x0F;
    b[1] = e.depth;
    b[2] = e.delay;
    b[3] = e.attack1;
    b[4] = e.attack_level;
    b[5] = e.attack2;
    b[6] = e.decay1;
    b[7] = e.decay_level;
    b[8] = e.decay2;
    b[9] = e.sustain;
    b[10] = e.release1;
    b[11] = e.release_level;
    b[12] = e.release2;
    b[13] = (e.opts.bits() >> 4) & 0x07;
    b[14] = e.decay_accent;
}

/// `[mode, attack, decay, sustain, release, accent decay]`, always the
/// reduced model at full depth
pub(super) fn decode_minimal_env(b: &[u8]) -> EnvParams {
    let mut ret = EnvParams::adsr(b[1], b[2], b[3], b[4]);
    let mut opts = EnvOptions::from_bits(b[0] & MINIMAL_MODE_MASK);
    opts.set_minimal(true);
    ret.opts = opts;
    ret.decay_accent = b[5];
    ret
}

pub(super) fn encode_minimal_env(e: &EnvParams, b: &mut [u8]) {
    b[0] = e.opts.bits() & MINIMAL_MODE_MASK;
    b[1] = e.attack1;
    b[2] = e.decay1;
    b[3] = e.sustain;
    b[4] = e.release1;
    b[5] = e.decay_accent;
}

/// `[mode, depth, rate, delay, phase]`
pub(super) fn decode_lfo(b: &[u8]) -> LfoParams {
    LfoParams {
        opts: LfoOptions::from_bits(b[0]),
        depth: b[1],
        rate: b[2],
        delay: b[3],
        phase: b[4],
    }
}

pub(super) fn encode_lfo(l: &LfoParams, b: &mut [u8]) {
    b[0] = l.opts.bits();
    b[1] = l.depth;
    b[2] = l.rate;
    b[3] = l.delay;
    b[4] = l.phase;
}

/// `[mode, depth, rate, delay, phase, pitch depth, pw depth, cutoff depth]`
pub(super) fn decode_instrument_lfo(b: &[u8]) -> InstrumentLfo {
    InstrumentLfo {
        lfo: decode_lfo(b),
        depth_pitch: b[5],
        depth_pw: b[6],
        depth_cutoff: b[7],
    }
}

pub(super) fn encode_instrument_lfo(l: &InstrumentLfo, b: &mut [u8]) {
    encode_lfo(&l.lfo, b);
    b[5] = l.depth_pitch;
    b[6] = l.depth_pw;
    b[7] = l.depth_cutoff;
}

/// `[speed, assign, begin, end, loop]`
pub(super) fn decode_wt(b: &[u8]) -> WtParams {
    WtParams {
        divider: b[0] & 0x3F,
        key_sync: b[0] & 0x40 != 0,
        voices: b[1] & 0x3F,
        position_mod: b[1] & 0x80 != 0,
        begin: b[2] & 0x7F,
        end: b[3] & 0x7F,
        loop_pos: b[4] & 0x7F,
        oneshot: b[4] & 0x80 != 0,
    }
}

pub(super) fn encode_wt(w: &WtParams, b: &mut [u8]) {
    b[0] = (w.divider & 0x3F) | (w.key_sync as u8) << 6;
    b[1] = (w.voices & 0x3F) | (w.position_mod as u8) << 7;
    b[2] = w.begin & 0x7F;
    b[3] = w.end & 0x7F;
    b[4] = (w.loop_pos & 0x7F) | (w.oneshot as u8) << 7;
}

/// `[channels | mode << 4, cutoff lo, cutoff hi, resonance, keytrack, -]`
pub(super) fn decode_filter(b: &[u8]) -> FilterParams {
    FilterParams {
        channels: b[0] & 0x0F,
        mode: b[0] >> 4,
        cutoff: u16::from_le_bytes([b[1], b[2] & 0x0F]),
        resonance: b[3],
        keytrack: b[4],
    }
}

pub(super) fn encode_filter(f: &FilterParams, b: &mut [u8]) {
    let cutoff = f.cutoff.to_le_bytes();
    b[0] = (f.channels & 0x0F) | (f.mode & 0x0F) << 4;
    b[1] = cutoff[0];
    b[2] = cutoff[1] & 0x0F;
    b[3] = f.resonance;
    b[4] = f.keytrack;
}
