//! Voice-note sequencing — a cursor over the fixed clip list.
//!
//! Wrap behavior: wrap-and-play immediately. Every call returns a clip and
//! the cursor advances modulo the list length, so a full cycle of N calls
//! returns every clip once and leaves the cursor back at its initial
//! position. (The alternative — one silent beat per cycle — was rejected.)

/// The fixed voice-note clip list, in playback order.
pub const VOICE_NOTES: [&str; 4] = [
    "dummy-29502.mp3",
    "dummy-laugh-voiced-54997.mp3",
    "insects-69446.mp3",
    "thud-82914.mp3",
];

/// Stateful cursor over [`VOICE_NOTES`]. Not persisted; resets with the app.
#[derive(Debug, Default)]
pub struct VoiceNoteSequencer {
    cursor: usize,
}

impl VoiceNoteSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the clip at the cursor and advance, wrapping after the last.
    pub fn next(&mut self) -> &'static str {
        let clip = VOICE_NOTES[self.cursor];
        self.cursor = (self.cursor + 1) % VOICE_NOTES.len();
        clip
    }

    /// Rewind to the first clip.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
