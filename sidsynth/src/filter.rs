//! Filter and volume control of one chip

use crate::config::FilterCalibration;
use crate::context::EngineContext;
use crate::devices::Device;
use crate::fixedmath::Note;
use crate::registers::FilterRegs;
use crate::{clamp12, clamp16, NOTE_C3};

/// Static filter parameters, see the patch's filter record
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterParams {
    /// Voices (bits 0..=2) and external input (bit 3) routed through the filter
    pub channels: u8,
    /// Mode bits: low pass, band pass, high pass, voice 3 off
    pub mode: u8,
    /// Cutoff, 12 bits
    pub cutoff: u16,
    /// Resonance, only the upper 4 bits are used
    pub resonance: u8,
    /// Key tracking depth, 0 disables key tracking
    pub keytrack: u8,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            channels: 0,
            mode: 0x1,
            cutoff: 0x800,
            resonance: 0,
            keytrack: 0,
        }
    }
}

/// Per tick input of a [FilterEngine]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FilterInput {
    /// Filter destination accumulator
    pub cutoff_mod: i32,
    /// Volume destination accumulator
    pub volume_mod: i32,
    /// Static volume, 0..=127
    pub volume: u8,
    /// Pitch of the voice the filter tracks
    pub keytrack_frq: Note,
}

/// Computes the filter registers of one chip
#[derive(Clone, Debug, Default)]
pub struct FilterEngine {
    calibration: FilterCalibration,
    regs: FilterRegs,
}

impl FilterEngine {
    /// Constructor, mapping cutoff onto the calibrated register range
    pub fn new(calibration: FilterCalibration) -> Self {
        Self {
            calibration,
            regs: FilterRegs::default(),
        }
    }
    /// Change the calibration
    pub fn set_calibration(&mut self, calibration: FilterCalibration) {
        self.calibration = calibration;
    }
    /// The registers computed on the last tick
    pub fn regs(&self) -> &FilterRegs {
        &self.regs
    }
    /// The 12 bit cutoff after modulation and key tracking
    pub fn cutoff(input: &FilterInput, params: &FilterParams) -> u16 {
        let mut cutoff = clamp12(params.cutoff as i32 + input.cutoff_mod / 8);
        if params.keytrack != 0 {
            let kt = input.keytrack_frq.to_bits() as i32 * params.keytrack as i32 / 4096
                - ((NOTE_C3 as i32) << 5);
            cutoff = clamp12(cutoff as i32 + kt.clamp(-0xFFF, 0xFFF));
        }
        cutoff
    }
}

impl Device for FilterEngine {
    type Input = FilterInput;
    type Params = FilterParams;
    type Output = FilterRegs;
    fn next(&mut self, _: &EngineContext, input: FilterInput, params: &FilterParams) -> FilterRegs {
        let cutoff = Self::cutoff(&input, params) as i32;
        let (min, max) = (self.calibration.min as i32, self.calibration.max as i32);
        let calibrated = (min + cutoff * (max - min) / 4096).clamp(0, 0x7FF) as u16;
        let volume = clamp16(((input.volume as i32) << 9) + input.volume_mod) >> 12;
        self.regs = FilterRegs {
            cutoff: calibrated,
            resonance: params.resonance >> 4,
            channels: params.channels & 0x0F,
            mode: params.mode & 0x0F,
            volume: volume as u8,
        };
        self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: FilterInput, params: FilterParams) -> FilterRegs {
        FilterEngine::new(FilterCalibration::default()).next(&EngineContext::default(), input, &params)
    }

    #[test]
    fn static_values() {
        let params = FilterParams {
            channels: 0x7,
            mode: 0x1,
            cutoff: 0x800,
            resonance: 0xA5,
            keytrack: 0,
        };
        let input = FilterInput {
            volume: 127,
            ..Default::default()
        };
        let regs = run(input, params);
        assert_eq!(regs.cutoff, 0x3FF);
        assert_eq!(regs.resonance, 0xA);
        assert_eq!(regs.channels, 0x7);
        assert_eq!(regs.volume, 0xF);
    }

    #[test]
    fn modulation_clamps() {
        let params = FilterParams::default();
        let up = FilterInput {
            cutoff_mod: i32::MAX,
            ..Default::default()
        };
        assert_eq!(FilterEngine::cutoff(&up, &params), 0xFFF);
        assert_eq!(run(up, params).cutoff, 0x7FE);
        let down = FilterInput {
            cutoff_mod: -0x8000,
            ..Default::default()
        };
        assert_eq!(FilterEngine::cutoff(&down, &params), 0);
        let vol = FilterInput {
            volume: 127,
            volume_mod: -0x10000,
            ..Default::default()
        };
        assert_eq!(run(vol, params).volume, 0);
    }

    #[test]
    fn keytrack() {
        let params = FilterParams {
            keytrack: 0xFF,
            ..Default::default()
        };
        let low = FilterInput {
            keytrack_frq: Note::from_num(36),
            ..Default::default()
        };
        let high = FilterInput {
            keytrack_frq: Note::from_num(84),
            ..Default::default()
        };
        assert!(FilterEngine::cutoff(&low, &params) < 0x800);
        assert!(FilterEngine::cutoff(&high, &params) > 0x800);
    }

    #[test]
    fn calibration() {
        let mut filter = FilterEngine::new(FilterCalibration { min: 0x100, max: 0x500 });
        let params = FilterParams {
            cutoff: 0,
            ..Default::default()
        };
        let regs = filter.next(&EngineContext::default(), FilterInput::default(), &params);
        assert_eq!(regs.cutoff, 0x100);
    }
}
