//! Value-level music model: pitches, durations, scales, notes.
//!
//! Everything here is an immutable value record. The stateful parts of
//! the crate (voices, sessions) are built on top of these.

pub mod duration;
pub mod note;
pub mod pitch;
pub mod scale;

pub use duration::{BaseDuration, Duration};
pub use note::{Note, NoteKind};
pub use pitch::{Pitch, PitchClass, PIANO_KEYS};
pub use scale::{ChordTemplate, Key, Scale};
