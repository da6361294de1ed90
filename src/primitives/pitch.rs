//! Pitch classes and absolute pitches.
//!
//! Pitch classes are spelled with flats, matching the display names the
//! rest of the crate uses. An absolute [`Pitch`] is a class plus an
//! octave; its total order follows the piano keyboard.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// One of the 12 chromatic pitch classes, C-based.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum PitchClass {
    C,
    Db,
    D,
    Eb,
    E,
    F,
    Gb,
    G,
    Ab,
    A,
    Bb,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Db,
        PitchClass::D,
        PitchClass::Eb,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Gb,
        PitchClass::G,
        PitchClass::Ab,
        PitchClass::A,
        PitchClass::Bb,
        PitchClass::B,
    ];

    /// Semitone index from C, 0..=11.
    pub fn semitone(self) -> i32 {
        self as i32
    }

    /// Inverse of [`PitchClass::semitone`], wrapping mod 12.
    ///
    /// ```
    /// use motivic::primitives::PitchClass;
    /// assert_eq!(PitchClass::from_semitone(13), PitchClass::Db);
    /// assert_eq!(PitchClass::from_semitone(-1), PitchClass::B);
    /// ```
    pub fn from_semitone(semitone: i32) -> Self {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Db => "Db",
            PitchClass::D => "D",
            PitchClass::Eb => "Eb",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Gb => "Gb",
            PitchClass::G => "G",
            PitchClass::Ab => "Ab",
            PitchClass::A => "A",
            PitchClass::Bb => "Bb",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete pitch: class plus octave (C4 is middle C).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Pitch {
    pub class: PitchClass,
    pub octave: i32,
}

impl Pitch {
    pub fn new(class: PitchClass, octave: i32) -> Self {
        Self { class, octave }
    }

    /// Absolute semitone index: `octave * 12 + semitone(class)`.
    /// C0 is 0, A0 is 9, C8 is 96.
    pub fn index(self) -> i32 {
        self.octave * 12 + self.class.semitone()
    }

    pub fn from_index(index: i32) -> Self {
        Self {
            class: PitchClass::from_semitone(index),
            octave: index.div_euclid(12),
        }
    }
}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index().cmp(&other.index())
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class, self.octave)
    }
}

/// The 88 piano keys, A0..=C8, lowest first. Every voice range is a
/// sub-slice of this table.
pub static PIANO_KEYS: Lazy<Vec<Pitch>> = Lazy::new(|| {
    (Pitch::new(PitchClass::A, 0).index()
        ..=Pitch::new(PitchClass::C, 8).index())
        .map(Pitch::from_index)
        .collect()
});
