//! Measure-quantized note streams and phrase transformation operators.
//!
//! The crate models a small multi-voice composition: exact fractional
//! durations quantized to a measure grid with automatic tie-splitting,
//! tuplet groups, scale- and harmony-constrained random generation, a
//! set of motif transformations, and per-voice undo history, all held
//! together by a [`session::Session`] aggregate.

pub mod error;
pub mod generate;
pub mod history;
pub mod primitives;
pub mod session;
pub mod transform;
pub mod voice;

pub use error::Error;
pub use primitives::{
    BaseDuration, ChordTemplate, Duration, Key, Note, NoteKind, Pitch,
    PitchClass, Scale, PIANO_KEYS,
};
pub use session::{
    Config, Mode, Operator, Session, TimeSignature, VoiceConfig,
};
pub use voice::Voice;
