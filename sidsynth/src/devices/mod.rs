//! This module contains the modulation generators that run once per tick:
//! envelopes, LFOs and wavetable sequencers.

use crate::context::EngineContext;

mod drum_models;
mod env;
mod lfo;
mod wavetable;

pub use drum_models::{find_model, DrumModel, DrumStep, DRUM_MODELS};
pub use env::{EnvOptions, EnvParams, EnvState, EnvelopeGenerator};
pub use lfo::{LfoGenerator, LfoInput, LfoOptions, LfoParams, LfoWave};
pub use wavetable::{
    DrumWavetable, WavetableSequencer, WtInput, WtParams, WT_MEMORY_SIZE, WT_POS_STOPPED,
};

/// A generator that is advanced exactly once per engine tick
pub trait Device {
    /// The per-tick input (e.g. a clock pulse or modulation values)
    type Input;
    /// The static parameters, normally decoded from the patch
    type Params;
    /// The output for this tick
    type Output;
    /// Within the provided `context`, advance by one tick using `input` and
    /// `params`, and return the new output.
    fn next(
        &mut self,
        context: &EngineContext,
        input: Self::Input,
        params: &Self::Params,
    ) -> Self::Output;
}

/// Map an 8 bit level onto the full 16 bit range (0xFF -> 0xFFFF)
pub(crate) const fn level16(level: u8) -> u16 {
    ((level as u16) << 8) | level as u16
}

/// Convert a signed centered byte (128 = 0) into -128..=127
pub(crate) const fn centered(value: u8) -> i32 {
    value as i32 - 128
}
