//! The fixed drum sounds played by the drum engine.  Each model is a short
//! sequence of (note, waveform) steps; a step with note 0 ends the model,
//! which then either stops or jumps back to its loop point.

const TRI: u8 = 0x01;
const SAW: u8 = 0x02;
const PUL: u8 = 0x04;
const NOI: u8 = 0x08;

/// One step of a drum model
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrumStep {
    /// Absolute note, 0 terminates the model
    pub note: u8,
    /// Voice waveform byte (see [crate::voice::VoiceWaveform])
    pub waveform: u8,
}

const fn s(note: u8, waveform: u8) -> DrumStep {
    DrumStep { note, waveform }
}

const END: DrumStep = s(0, 0);

/// A drum sound
#[derive(Clone, Copy, Debug)]
pub struct DrumModel {
    /// Short display name
    pub name: &'static str,
    /// Step to continue at after the terminating step, or `None` to stop
    pub loop_pos: Option<u8>,
    /// The steps, terminated by a note 0 step
    pub steps: &'static [DrumStep],
}

/// All drum models, indexed by the drum instrument's model byte
pub const DRUM_MODELS: [DrumModel; 12] = [
    DrumModel {
        name: "BD",
        loop_pos: None,
        steps: &[
            s(72, PUL),
            s(48, TRI),
            s(40, TRI),
            s(36, TRI),
            s(33, TRI),
            s(31, TRI),
            END,
        ],
    },
    DrumModel {
        name: "SD",
        loop_pos: Some(3),
        steps: &[s(96, NOI), s(60, TRI), s(55, TRI), s(84, NOI), END],
    },
    DrumModel {
        name: "HH",
        loop_pos: None,
        steps: &[s(120, NOI), s(116, NOI), END],
    },
    DrumModel {
        name: "OH",
        loop_pos: Some(1),
        steps: &[s(120, NOI), s(118, NOI), END],
    },
    DrumModel {
        name: "TomL",
        loop_pos: None,
        steps: &[s(64, PUL), s(45, TRI), s(43, TRI), s(41, TRI), END],
    },
    DrumModel {
        name: "TomH",
        loop_pos: None,
        steps: &[s(76, PUL), s(57, TRI), s(55, TRI), s(53, TRI), END],
    },
    DrumModel {
        name: "Clap",
        loop_pos: Some(4),
        steps: &[s(100, NOI), s(90, NOI), s(100, NOI), s(90, NOI), s(96, NOI), END],
    },
    DrumModel {
        name: "Cow",
        loop_pos: Some(0),
        steps: &[s(79, PUL), s(86, PUL), END],
    },
    DrumModel {
        name: "Rim",
        loop_pos: None,
        steps: &[s(110, NOI), s(84, PUL), s(82, TRI), END],
    },
    DrumModel {
        name: "Crash",
        loop_pos: Some(0),
        steps: &[s(112, NOI), s(109, NOI), s(114, NOI), END],
    },
    DrumModel {
        name: "Zap",
        loop_pos: None,
        steps: &[
            s(96, SAW),
            s(84, SAW),
            s(72, SAW),
            s(60, SAW),
            s(48, SAW),
            s(36, SAW),
            END,
        ],
    },
    DrumModel {
        name: "Blip",
        loop_pos: Some(0),
        steps: &[s(72, TRI | SAW), s(84, TRI | SAW), END],
    },
];

/// Find a drum model by name
pub fn find_model(name: &str) -> Option<u8> {
    DRUM_MODELS
        .iter()
        .position(|m| m.name == name)
        .map(|i| i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_are_terminated() {
        for model in DRUM_MODELS.iter() {
            assert_eq!(model.steps.last().map(|s| s.note), Some(0), "{}", model.name);
            assert!(model.steps[0].note != 0);
            if let Some(pos) = model.loop_pos {
                assert!(model.steps[pos as usize].note != 0);
            }
        }
    }

    #[test]
    fn lookup() {
        assert_eq!(find_model("BD"), Some(0));
        assert_eq!(find_model("nope"), None);
    }
}
