//! Static configuration of the synthesizer: how many chip pairs it drives,
//! the tick rate, the clock mode and the MIDI routing of every engine.
//!
//! These types are `serde` serializable so the host can persist them however
//! it likes.  None of them change while the engine is ticking except through
//! the orchestrator.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::clock::ClockMode;
use crate::context::{EngineContext, UpdateSpeed};
use crate::MAX_ENGINES;

/// The number of MIDI routing slots per engine.  Lead engines use the first
/// slot, Bassline engines the first two, Multi engines all six and Drum
/// engines the first.
pub const NUM_ROUTING_SLOTS: usize = 6;

/// Default seed of the per-engine random generators
pub const DEFAULT_RANDOM_SEED: u64 = 0xce607a9d25ec3d88u64;

/// Which MIDI events an instrument slot listens to, and how they are mapped
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiRouting {
    /// The MIDI channel (0..=15), or `None` if the slot is disabled
    pub channel: Option<u8>,
    /// The lowest note (inclusive) accepted by this slot
    pub split_lower: u8,
    /// The highest note (inclusive) accepted by this slot
    pub split_upper: u8,
    /// Transposition applied to accepted notes, in semitones
    pub transpose: i8,
}

impl MidiRouting {
    /// A slot listening to all notes on the given channel
    pub const fn on_channel(channel: u8) -> Self {
        Self {
            channel: Some(channel & 0x0F),
            split_lower: 0,
            split_upper: 127,
            transpose: 0,
        }
    }
    /// A disabled slot
    pub const fn disabled() -> Self {
        Self {
            channel: None,
            split_lower: 0,
            split_upper: 127,
            transpose: 0,
        }
    }
    /// Does this slot accept channel messages on `channel`?
    pub fn accepts_channel(&self, channel: u8) -> bool {
        self.channel == Some(channel)
    }
    /// If this slot accepts the note `note` on `channel`, return the note
    /// after transposition
    pub fn map_note(&self, channel: u8, note: u8) -> Option<u8> {
        if !self.accepts_channel(channel) || note < self.split_lower || note > self.split_upper {
            return None;
        }
        Some((note as i16 + self.transpose as i16).clamp(0, 127) as u8)
    }
}

impl Default for MidiRouting {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Linear remapping of the 12 bit cutoff onto the usable range of a
/// particular chip's 11 bit cutoff register
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCalibration {
    /// The register value corresponding to a cutoff of 0
    pub min: u16,
    /// The register value corresponding to the maximum cutoff
    pub max: u16,
}

impl Default for FilterCalibration {
    fn default() -> Self {
        Self {
            min: 0,
            max: 0x7FF,
        }
    }
}

/// Configuration of one engine (one chip pair)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// True if both chips of the pair are fitted.  Mono configurations only
    /// drive voices 1-3.
    pub stereo: bool,
    /// MIDI routing per instrument slot
    pub routing: [MidiRouting; NUM_ROUTING_SLOTS],
    /// Calibration of the left and right chip's filter
    pub filter_calibration: [FilterCalibration; 2],
}

impl EngineConfig {
    /// The number of voices available to this engine
    pub const fn num_voices(&self) -> usize {
        if self.stereo {
            crate::NUM_VOICES
        } else {
            crate::VOICES_PER_CHIP
        }
    }
    /// A stereo engine with slot `n` listening on MIDI channel `first_channel + n`
    pub fn with_channels(first_channel: u8) -> Self {
        let mut ret = Self::default();
        for (i, routing) in ret.routing.iter_mut().enumerate() {
            *routing = MidiRouting::on_channel(first_channel.wrapping_add(i as u8));
        }
        ret
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut routing = [MidiRouting::disabled(); NUM_ROUTING_SLOTS];
        routing[0] = MidiRouting::on_channel(0);
        Self {
            stereo: true,
            routing,
            filter_calibration: [FilterCalibration::default(); 2],
        }
    }
}

/// Configuration of the whole synthesizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// The update speed factor (see [EngineContext])
    pub update_speed_factor: u8,
    /// Clock master/slave selection
    pub clock_mode: ClockMode,
    /// Tempo of the internal clock, in beats per minute
    pub bpm: f32,
    /// Seed for the random generators (engine `n` uses `seed + n`)
    pub random_seed: u64,
    /// One entry per chip pair
    pub engines: ArrayVec<EngineConfig, MAX_ENGINES>,
}

impl SynthConfig {
    /// Build the processing context, falling back to the default update speed
    /// (and logging) if the configured factor is out of range.
    pub fn context(&self) -> EngineContext {
        match UpdateSpeed::try_from(self.update_speed_factor) {
            Ok(speed) => EngineContext::new(speed),
            Err(e) => {
                log::warn!("{}: {}, using default", e, self.update_speed_factor);
                EngineContext::default()
            }
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        let mut engines = ArrayVec::new();
        engines.push(EngineConfig::default());
        Self {
            update_speed_factor: UpdateSpeed::default().value(),
            clock_mode: ClockMode::Auto,
            bpm: 120.0,
            random_seed: DEFAULT_RANDOM_SEED,
            engines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_split_and_transpose() {
        let routing = MidiRouting {
            channel: Some(2),
            split_lower: 36,
            split_upper: 59,
            transpose: -12,
        };
        assert_eq!(routing.map_note(2, 48), Some(36));
        assert_eq!(routing.map_note(2, 60), None);
        assert_eq!(routing.map_note(1, 48), None);
        assert_eq!(MidiRouting::disabled().map_note(0, 60), None);
    }

    #[test]
    fn transpose_clamps() {
        let mut routing = MidiRouting::on_channel(0);
        routing.transpose = 24;
        assert_eq!(routing.map_note(0, 120), Some(127));
    }

    #[test]
    fn bad_speed_falls_back() {
        let config = SynthConfig {
            update_speed_factor: 42,
            ..Default::default()
        };
        assert_eq!(config.context(), EngineContext::default());
    }
}
