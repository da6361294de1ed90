//! The atomic musical event.

use serde::{Deserialize, Serialize};

use super::duration::Duration;
use super::pitch::Pitch;

/// What sounds during a note's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    Rest,
    Tone(Pitch),
    /// Multiple simultaneous pitches; emitted by the harmony generator.
    Chord(Vec<Pitch>),
}

/// An immutable note value: content plus catalog duration. Notes are
/// copied, never shared, so the derived tie/tuplet tables reference them
/// by index instead of identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub kind: NoteKind,
    pub duration: Duration,
}

impl Note {
    pub fn rest(duration: Duration) -> Self {
        Self { kind: NoteKind::Rest, duration }
    }

    pub fn tone(pitch: Pitch, duration: Duration) -> Self {
        Self { kind: NoteKind::Tone(pitch), duration }
    }

    pub fn chord(pitches: Vec<Pitch>, duration: Duration) -> Self {
        Self { kind: NoteKind::Chord(pitches), duration }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, NoteKind::Rest)
    }

    /// All sounding pitches, empty for a rest.
    pub fn pitches(&self) -> &[Pitch] {
        match &self.kind {
            NoteKind::Rest => &[],
            NoteKind::Tone(pitch) => std::slice::from_ref(pitch),
            NoteKind::Chord(pitches) => pitches,
        }
    }

    /// The first sounding pitch, if any. Single-pitch operators key off
    /// this for chords.
    pub fn lead_pitch(&self) -> Option<Pitch> {
        self.pitches().first().copied()
    }

    /// Same content at a different duration.
    pub fn with_duration(&self, duration: Duration) -> Self {
        Self { kind: self.kind.clone(), duration }
    }
}
