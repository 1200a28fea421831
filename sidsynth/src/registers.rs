//! The register image of the sound chips.  This is the only place that knows
//! the bit layout of the hardware: engines produce plain [VoiceRegs] and
//! [FilterRegs] structs, which are packed here.
//!
//! Per chip the layout is (offsets from the chip base):
//!
//! | offset | contents |
//! |---|---|
//! | `7*v + 0..=1` | frequency, little endian |
//! | `7*v + 2..=3` | pulse width, 12 bits little endian |
//! | `7*v + 4` | control: `waveform << 4 \| test << 3 \| ring << 2 \| sync << 1 \| gate` |
//! | `7*v + 5` | attack/decay |
//! | `7*v + 6` | sustain/release |
//! | `0x15` | cutoff bits 0..=2 |
//! | `0x16` | cutoff bits 3..=10 |
//! | `0x17` | `resonance << 4 \| channel mask` |
//! | `0x18` | `mode << 4 \| volume` |
//!
//! A chip pair is the left chip followed by the right chip.

use crate::voice::VoiceWaveform;
use crate::{NUM_FILTERS, VOICES_PER_CHIP};

/// Registers per chip
pub const CHIP_REGS: usize = 25;
/// Registers per chip pair
pub const PAIR_REGS: usize = CHIP_REGS * 2;
/// Registers per voice
pub const VOICE_REGS: usize = 7;

const FILTER_BASE: usize = 0x15;

/// The registers of one voice
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoiceRegs {
    /// Chip frequency value
    pub freq: u16,
    /// Pulse width, 12 bits
    pub pw: u16,
    /// Waveform selection and flags
    pub waveform: VoiceWaveform,
    /// Gate bit
    pub gate: bool,
    /// Attack (high nibble) and decay (low nibble)
    pub attack_decay: u8,
    /// Sustain (high nibble) and release (low nibble)
    pub sustain_release: u8,
}

impl VoiceRegs {
    /// The control register value.  An "off" waveform selects no waveform and
    /// sets the test bit.
    pub const fn control(&self) -> u8 {
        self.waveform.control_bits() | self.gate as u8
    }
    /// Pack into the chip layout
    pub fn pack(&self) -> [u8; VOICE_REGS] {
        [
            self.freq as u8,
            (self.freq >> 8) as u8,
            self.pw as u8,
            ((self.pw >> 8) & 0x0F) as u8,
            self.control(),
            self.attack_decay,
            self.sustain_release,
        ]
    }
    /// Unpack from the chip layout
    pub fn unpack(regs: &[u8; VOICE_REGS]) -> Self {
        Self {
            freq: u16::from_le_bytes([regs[0], regs[1]]),
            pw: u16::from_le_bytes([regs[2], regs[3] & 0x0F]),
            waveform: VoiceWaveform::from_control(regs[4]),
            gate: regs[4] & 1 != 0,
            attack_decay: regs[5],
            sustain_release: regs[6],
        }
    }
}

/// The filter and volume registers of one chip
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterRegs {
    /// Cutoff, 11 bits
    pub cutoff: u16,
    /// Resonance, 4 bits
    pub resonance: u8,
    /// Bitmask of the voices (and external input) routed through the filter
    pub channels: u8,
    /// Filter mode bits (low pass, band pass, high pass, voice 3 off)
    pub mode: u8,
    /// Master volume, 4 bits
    pub volume: u8,
}

impl FilterRegs {
    /// Pack into the chip layout
    pub fn pack(&self) -> [u8; 4] {
        [
            (self.cutoff & 0x07) as u8,
            ((self.cutoff >> 3) & 0xFF) as u8,
            (self.resonance & 0x0F) << 4 | (self.channels & 0x0F),
            (self.mode & 0x0F) << 4 | (self.volume & 0x0F),
        ]
    }
    /// Unpack from the chip layout
    pub fn unpack(regs: &[u8; 4]) -> Self {
        Self {
            cutoff: (regs[0] & 0x07) as u16 | (regs[1] as u16) << 3,
            resonance: regs[2] >> 4,
            channels: regs[2] & 0x0F,
            mode: regs[3] >> 4,
            volume: regs[3] & 0x0F,
        }
    }
}

/// The register image of one chip pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterBlock {
    regs: [u8; PAIR_REGS],
}

impl Default for RegisterBlock {
    fn default() -> Self {
        Self {
            regs: [0; PAIR_REGS],
        }
    }
}

fn voice_offset(voice: usize) -> usize {
    let chip = voice / VOICES_PER_CHIP;
    chip * CHIP_REGS + (voice % VOICES_PER_CHIP) * VOICE_REGS
}

impl RegisterBlock {
    /// Constructor (all registers 0)
    pub fn new() -> Self {
        Self::default()
    }
    fn write(&mut self, offset: usize, data: &[u8]) -> bool {
        let dst = &mut self.regs[offset..offset + data.len()];
        if dst == data {
            false
        } else {
            dst.copy_from_slice(data);
            true
        }
    }
    /// Write the registers of voice `voice` (0..=5); returns true if
    /// anything changed
    pub fn set_voice(&mut self, voice: usize, regs: &VoiceRegs) -> bool {
        self.write(voice_offset(voice), &regs.pack())
    }
    /// Write the filter registers of chip `chip` (0 = left); returns true if
    /// anything changed
    pub fn set_filter(&mut self, chip: usize, regs: &FilterRegs) -> bool {
        self.write(chip * CHIP_REGS + FILTER_BASE, &regs.pack())
    }
    /// Read back the registers of a voice
    pub fn voice(&self, voice: usize) -> VoiceRegs {
        let offset = voice_offset(voice);
        let mut raw = [0u8; VOICE_REGS];
        raw.copy_from_slice(&self.regs[offset..offset + VOICE_REGS]);
        VoiceRegs::unpack(&raw)
    }
    /// Read back the filter registers of a chip
    pub fn filter(&self, chip: usize) -> FilterRegs {
        let offset = (chip % NUM_FILTERS) * CHIP_REGS + FILTER_BASE;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.regs[offset..offset + 4]);
        FilterRegs::unpack(&raw)
    }
    /// The registers of one chip
    pub fn chip(&self, chip: usize) -> &[u8] {
        let base = (chip % NUM_FILTERS) * CHIP_REGS;
        &self.regs[base..base + CHIP_REGS]
    }
    /// The whole image
    pub fn as_bytes(&self) -> &[u8; PAIR_REGS] {
        &self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_layout() {
        let regs = VoiceRegs {
            freq: 0x1CD6,
            pw: 0x0800,
            waveform: VoiceWaveform {
                pulse: true,
                ring: true,
                ..Default::default()
            },
            gate: true,
            attack_decay: 0x12,
            sustain_release: 0x34,
        };
        let mut block = RegisterBlock::new();
        assert!(block.set_voice(4, &regs));
        assert!(!block.set_voice(4, &regs));
        let base = CHIP_REGS + VOICE_REGS;
        assert_eq!(
            &block.as_bytes()[base..base + 7],
            &[0xD6, 0x1C, 0x00, 0x08, 0x45, 0x12, 0x34]
        );
        assert_eq!(block.voice(4), regs);
    }

    #[test]
    fn off_sets_test_bit() {
        let regs = VoiceRegs {
            waveform: VoiceWaveform {
                saw: true,
                off: true,
                sync: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(regs.control(), 0x0A);
    }

    #[test]
    fn filter_layout() {
        let regs = FilterRegs {
            cutoff: 0x5AB,
            resonance: 0xC,
            channels: 0x7,
            mode: 0x1,
            volume: 0xF,
        };
        let mut block = RegisterBlock::new();
        assert!(block.set_filter(1, &regs));
        let base = CHIP_REGS + 0x15;
        assert_eq!(
            &block.as_bytes()[base..base + 4],
            &[0x03, 0xB5, 0xC7, 0x1F]
        );
        assert_eq!(block.filter(1), regs);
        assert_eq!(block.chip(1)[0x18], 0x1F);
    }
}
