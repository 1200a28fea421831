//! Decoded MIDI input, as accepted by the orchestrator

use wmidi::MidiMessage;

use crate::clock::RealtimeEvent;

/// Bank select (MSB)
pub const CC_BANK_SELECT: u8 = 0;
/// Modulation wheel, also drives knob 1
pub const CC_MOD_WHEEL: u8 = 1;
/// First of the four controllers driving knobs 2..=5
pub const CC_KNOB2: u8 = 16;
/// All sound off
pub const CC_ALL_SOUND_OFF: u8 = 120;
/// All notes off
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// A MIDI event the engine reacts to.  Channels are 0..=15.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiEvent {
    /// Note on with a non-zero velocity
    NoteOn {
        /// Channel
        channel: u8,
        /// Note number
        note: u8,
        /// Velocity, 1..=127
        velocity: u8,
    },
    /// Note off, or note on with velocity 0
    NoteOff {
        /// Channel
        channel: u8,
        /// Note number
        note: u8,
    },
    /// Control change
    ControlChange {
        /// Channel
        channel: u8,
        /// Controller number
        controller: u8,
        /// Value
        value: u8,
    },
    /// Pitch bend
    PitchBend {
        /// Channel
        channel: u8,
        /// Bend, -8192..=8191
        value: i16,
    },
    /// Channel aftertouch
    Aftertouch {
        /// Channel
        channel: u8,
        /// Pressure
        value: u8,
    },
    /// Program change
    ProgramChange {
        /// Channel
        channel: u8,
        /// Program number
        program: u8,
    },
    /// Clock, start, continue or stop
    Realtime(RealtimeEvent),
}

impl MidiEvent {
    /// The channel of a channel message
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::PitchBend { channel, .. }
            | Self::Aftertouch { channel, .. }
            | Self::ProgramChange { channel, .. } => Some(channel),
            Self::Realtime(_) => None,
        }
    }
}

impl TryFrom<&MidiMessage<'_>> for MidiEvent {
    type Error = &'static str;
    fn try_from(msg: &MidiMessage<'_>) -> Result<Self, Self::Error> {
        Ok(match msg {
            MidiMessage::NoteOn(ch, note, vel) if u8::from(*vel) > 0 => Self::NoteOn {
                channel: ch.index(),
                note: u8::from(*note),
                velocity: u8::from(*vel),
            },
            MidiMessage::NoteOn(ch, note, _) | MidiMessage::NoteOff(ch, note, _) => Self::NoteOff {
                channel: ch.index(),
                note: u8::from(*note),
            },
            MidiMessage::ControlChange(ch, cc, value) => Self::ControlChange {
                channel: ch.index(),
                controller: u8::from(cc.0),
                value: u8::from(*value),
            },
            MidiMessage::PitchBendChange(ch, bend) => Self::PitchBend {
                channel: ch.index(),
                value: u16::from(*bend) as i16 - 0x2000,
            },
            MidiMessage::ChannelPressure(ch, value) => Self::Aftertouch {
                channel: ch.index(),
                value: u8::from(*value),
            },
            MidiMessage::ProgramChange(ch, program) => Self::ProgramChange {
                channel: ch.index(),
                program: u8::from(*program),
            },
            MidiMessage::TimingClock => Self::Realtime(RealtimeEvent::Clock),
            MidiMessage::Start => Self::Realtime(RealtimeEvent::Start),
            MidiMessage::Continue => Self::Realtime(RealtimeEvent::Continue),
            MidiMessage::Stop => Self::Realtime(RealtimeEvent::Stop),
            _ => return Err("Unsupported MIDI message"),
        })
    }
}

impl TryFrom<MidiMessage<'_>> for MidiEvent {
    type Error = &'static str;
    fn try_from(msg: MidiMessage<'_>) -> Result<Self, Self::Error> {
        Self::try_from(&msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmidi::{Channel, ControlFunction, Note, Velocity, U14, U7};

    #[test]
    fn note_on_zero_is_note_off() {
        let on = MidiMessage::NoteOn(Channel::Ch3, Note::C4, Velocity::MAX);
        assert_eq!(
            MidiEvent::try_from(on),
            Ok(MidiEvent::NoteOn {
                channel: 2,
                note: 60,
                velocity: 127
            })
        );
        let off = MidiMessage::NoteOn(Channel::Ch3, Note::C4, Velocity::MIN);
        assert_eq!(
            MidiEvent::try_from(off),
            Ok(MidiEvent::NoteOff { channel: 2, note: 60 })
        );
    }

    #[test]
    fn controllers_and_bend() {
        let cc = MidiMessage::ControlChange(
            Channel::Ch1,
            ControlFunction::MODULATION_WHEEL,
            U7::from_u8_lossy(99),
        );
        assert_eq!(
            MidiEvent::try_from(cc),
            Ok(MidiEvent::ControlChange {
                channel: 0,
                controller: CC_MOD_WHEEL,
                value: 99
            })
        );
        let bend = MidiMessage::PitchBendChange(Channel::Ch16, U14::MIN);
        let event = MidiEvent::try_from(bend);
        assert_eq!(event, Ok(MidiEvent::PitchBend { channel: 15, value: -8192 }));
        assert_eq!(event.ok().and_then(|e| e.channel()), Some(15));
    }

    #[test]
    fn realtime_and_unsupported() {
        assert_eq!(
            MidiEvent::try_from(MidiMessage::TimingClock),
            Ok(MidiEvent::Realtime(RealtimeEvent::Clock))
        );
        assert_eq!(MidiEvent::Realtime(RealtimeEvent::Stop).channel(), None);
        assert!(MidiEvent::try_from(MidiMessage::ActiveSensing).is_err());
    }
}
