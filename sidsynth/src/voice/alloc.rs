use arrayvec::ArrayVec;

use crate::{NUM_VOICES, VOICES_PER_CHIP};

/// One voice in the allocation queue
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoiceQueueEntry {
    /// The voice index
    pub voice: u8,
    /// The voice is playing a note
    pub assigned: bool,
    /// The voice is reserved for `instrument`
    pub exclusive: bool,
    /// The instrument that last used (or reserved) this voice
    pub instrument: u8,
}

/// Assigns voices to instruments, least recently allocated first.
///
/// Allocation never fails: if no voice matches the requested policy (which
/// only happens with an inconsistent configuration), voice 0 is returned and
/// a warning is logged.
///
/// Assignment policies:
///  - 0: any voice
///  - 1: the left chip's voices
///  - 2: the right chip's voices (the left chip's in mono configurations)
///  - n >= 3: only voice `(n - 3) % num_voices`, reserved for the instrument
#[derive(Clone, Debug)]
pub struct VoiceAllocator {
    queue: ArrayVec<VoiceQueueEntry, NUM_VOICES>,
}

impl Default for VoiceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceAllocator {
    /// Create a queue with voices 0..=5 in order, none assigned
    pub fn new() -> Self {
        Self {
            queue: (0..NUM_VOICES as u8)
                .map(|voice| VoiceQueueEntry {
                    voice,
                    ..Default::default()
                })
                .collect(),
        }
    }
    /// Forget all assignments and reservations
    pub fn reset(&mut self) {
        *self = Self::new();
    }
    /// The queue, least recently allocated first
    pub fn queue(&self) -> &[VoiceQueueEntry] {
        &self.queue
    }

    fn allowed_mask(policy: u8, num_voices: usize) -> u8 {
        let num_voices = num_voices.clamp(1, NUM_VOICES);
        let all = ((1u16 << num_voices) - 1) as u8;
        let left = ((1u16 << VOICES_PER_CHIP) - 1) as u8;
        match policy {
            0 => all,
            1 => left & all,
            2 if num_voices > VOICES_PER_CHIP => (left << VOICES_PER_CHIP) & all,
            2 => left & all,
            n => 1 << ((n - 3) as usize % num_voices),
        }
    }

    fn requeue(&mut self, pos: usize) -> u8 {
        let entry = self.queue.remove(pos);
        self.queue.push(entry);
        entry.voice
    }

    /// Allocate a voice for `instrument`
    pub fn get(&mut self, instrument: u8, policy: u8, num_voices: usize) -> u8 {
        let mask = Self::allowed_mask(policy, num_voices);
        let dedicated = policy >= 3;
        let found = self.queue.iter().position(|e| {
            mask & (1 << e.voice) != 0 && (!e.exclusive || e.instrument == instrument || dedicated)
        });
        match found {
            Some(pos) => {
                let entry = &mut self.queue[pos];
                entry.assigned = true;
                entry.instrument = instrument;
                if dedicated {
                    entry.exclusive = true;
                }
                self.requeue(pos)
            }
            None => {
                log::warn!(
                    "no voice for instrument {} (policy {}), using voice 0",
                    instrument,
                    policy
                );
                0
            }
        }
    }

    /// Keep using `search_voice` if it is still assigned to `instrument`,
    /// otherwise allocate a new voice
    pub fn get_last(
        &mut self,
        instrument: u8,
        policy: u8,
        num_voices: usize,
        search_voice: u8,
    ) -> u8 {
        let found = self.queue.iter().position(|e| {
            e.voice == search_voice
                && e.assigned
                && e.instrument == instrument
                && (search_voice as usize) < num_voices
        });
        match found {
            Some(pos) => self.requeue(pos),
            None => self.get(instrument, policy, num_voices),
        }
    }

    /// Mark a voice as no longer playing.  The queue order is unchanged.
    pub fn release(&mut self, voice: u8) -> u8 {
        match self.queue.iter_mut().find(|e| e.voice == voice) {
            Some(entry) => {
                entry.assigned = false;
                voice
            }
            None => {
                log::warn!("released unknown voice {}, using voice 0", voice);
                0
            }
        }
    }

    /// Reserve the dedicated voices of every instrument whose policy pins it
    /// to a voice.  `policies[i]` is the assignment policy of instrument `i`.
    pub fn init_exclusive(&mut self, policies: &[u8], num_voices: usize) {
        for entry in self.queue.iter_mut() {
            entry.exclusive = false;
        }
        let num_voices = num_voices.clamp(1, NUM_VOICES);
        for (instrument, policy) in policies.iter().enumerate() {
            if *policy < 3 {
                continue;
            }
            let voice = ((*policy - 3) as usize % num_voices) as u8;
            if let Some(entry) = self.queue.iter_mut().find(|e| e.voice == voice) {
                entry.exclusive = true;
                entry.instrument = instrument as u8;
            }
        }
    }
}
