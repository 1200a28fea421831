//! This crate contains the sound engine for the synthesizer.  It does not
//! generate any audio itself - the sound chip does that.  Instead, once per
//! tick, it recomputes the complete register image (waveforms, frequencies,
//! pulse widths, gates, filter and volume settings) for every chip pair it
//! drives, from the current patch, the note/arpeggiator/sequencer state, the
//! modulation matrix and the shared MIDI clock.
//!
//! The crate is `no_std` and does not allocate.  All state lives in fixed
//! capacity collections inside an [engine::EngineInstance], and all time is
//! measured in ticks (see [context::EngineContext]).
//!
//! Most users will want to start with [orchestrator::Orchestrator], which owns
//! the clock and one engine per chip pair, and accepts decoded MIDI events
//! through [midi::MidiEvent].
//!
//! Fixed point types follow the same convention as the rest of this workspace:
//! a `FxP` suffix denotes a [fixed] number, so the location of the binary point
//! is part of the type.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

mod fixedmath;

pub mod clock;
pub mod config;
pub mod context;
pub mod devices;
pub mod engine;
pub mod filter;
pub mod midi;
pub mod modulation;
pub mod orchestrator;
pub mod patch;
pub mod random;
pub mod registers;
pub mod voice;

pub use fixedmath::note_to_sid_frequency;
pub use fixedmath::Note as NoteFxP;
pub use fixedmath::SignedNote as SignedNoteFxP;

/// The number of voices driven by one chip pair
pub const NUM_VOICES: usize = 6;
/// The number of voices on a single chip
pub const VOICES_PER_CHIP: usize = 3;
/// The number of filters driven by one chip pair (one per chip)
pub const NUM_FILTERS: usize = 2;
/// The maximum number of chip pairs (and therefore engines) supported by an
/// [orchestrator::Orchestrator]
pub const MAX_ENGINES: usize = 4;

/// MIDI note number of C-3 (middle C in the convention used by the patch
/// format)
pub const NOTE_C3: u8 = 60;

/// Clamp a value into the range of an unsigned 12 bit register field
pub(crate) const fn clamp12(x: i32) -> u16 {
    if x < 0 {
        0
    } else if x > 0xFFF {
        0xFFF
    } else {
        x as u16
    }
}

/// Clamp a value into the range of an unsigned 16 bit field
pub(crate) const fn clamp16(x: i32) -> u16 {
    if x < 0 {
        0
    } else if x > 0xFFFF {
        0xFFFF
    } else {
        x as u16
    }
}

/// Clamp a value into the range of a signed 16 bit modulation source
pub(crate) const fn clamp_i16(x: i32) -> i16 {
    if x < i16::MIN as i32 {
        i16::MIN
    } else if x > i16::MAX as i32 {
        i16::MAX
    } else {
        x as i16
    }
}
