use arrayvec::ArrayVec;

/// The maximum number of held notes remembered per instrument
pub const NOTE_STACK_SIZE: usize = 10;

/// A held note
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeldNote {
    /// MIDI note number
    pub note: u8,
    /// MIDI velocity
    pub velocity: u8,
}

/// The notes currently held on an instrument, in the order they were played.
/// When full, the oldest note is dropped.
#[derive(Clone, Debug, Default)]
pub struct NoteStack {
    notes: ArrayVec<HeldNote, NOTE_STACK_SIZE>,
}

impl NoteStack {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }
    /// Add a note as the most recent one
    pub fn push(&mut self, note: u8, velocity: u8) {
        self.remove(note);
        if self.notes.is_full() {
            self.notes.remove(0);
        }
        self.notes.push(HeldNote { note, velocity });
    }
    /// Remove a note; returns true if it was held
    pub fn remove(&mut self, note: u8) -> bool {
        match self.notes.iter().position(|n| n.note == note) {
            Some(pos) => {
                self.notes.remove(pos);
                true
            }
            None => false,
        }
    }
    /// The most recently played note still held
    pub fn last(&self) -> Option<HeldNote> {
        self.notes.last().copied()
    }
    /// Forget all notes
    pub fn clear(&mut self) {
        self.notes.clear();
    }
    /// The number of held notes
    pub fn len(&self) -> usize {
        self.notes.len()
    }
    /// True if no note is held
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
    /// The held notes, oldest first
    pub fn notes(&self) -> &[HeldNote] {
        &self.notes
    }
}
