//! Scale and chord catalogs.
//!
//! A scale is an ordered set of semitone offsets from a root, always
//! containing 0. A [`Key`] pairs a scale with a concrete root and answers
//! degree lookups for the reflection and transposition operators.

use serde::{Deserialize, Serialize};

use super::pitch::{Pitch, PitchClass};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Scale {
    Chromatic,
    Major,
    Minor,
    PentatonicMajor,
    PentatonicMinor,
    /// Messiaen's modes of limited transposition, 1 (whole tone)
    /// through 7.
    Molt1,
    Molt2,
    Molt3,
    Molt4,
    Molt5,
    Molt6,
    Molt7,
    OvertoneTheoretical,
    OvertoneAudible,
}

impl Scale {
    pub const ALL: [Scale; 14] = [
        Scale::Chromatic,
        Scale::Major,
        Scale::Minor,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Molt1,
        Scale::Molt2,
        Scale::Molt3,
        Scale::Molt4,
        Scale::Molt5,
        Scale::Molt6,
        Scale::Molt7,
        Scale::OvertoneTheoretical,
        Scale::OvertoneAudible,
    ];

    /// Semitone offsets from the root, ascending, starting at 0.
    pub fn offsets(self) -> &'static [i32] {
        match self {
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::PentatonicMajor => &[0, 2, 4, 7, 9],
            Scale::PentatonicMinor => &[0, 3, 5, 7, 10],
            Scale::Molt1 => &[0, 2, 4, 6, 8, 10],
            Scale::Molt2 => &[0, 1, 3, 4, 6, 7, 9, 10],
            Scale::Molt3 => &[0, 2, 3, 4, 6, 7, 8, 10, 11],
            Scale::Molt4 => &[0, 1, 2, 5, 6, 7, 8, 11],
            Scale::Molt5 => &[0, 1, 5, 6, 7, 11],
            Scale::Molt6 => &[0, 2, 4, 5, 6, 8, 10, 11],
            Scale::Molt7 => &[0, 1, 2, 3, 5, 6, 7, 8, 9, 11],
            Scale::OvertoneTheoretical => &[0, 2, 4, 6, 7, 9, 10, 11],
            Scale::OvertoneAudible => &[0, 2, 4, 7, 11],
        }
    }

}

/// Chord templates for the harmony voice, as semitone intervals from a
/// chord root.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum ChordTemplate {
    MajorTriad,
    MinorTriad,
    AugmentedTriad,
    DiminishedTriad,
    Major7,
    Minor7,
    Dominant7,
    Diminished7,
    HalfDiminished7,
}

impl ChordTemplate {
    pub const ALL: [ChordTemplate; 9] = [
        ChordTemplate::MajorTriad,
        ChordTemplate::MinorTriad,
        ChordTemplate::AugmentedTriad,
        ChordTemplate::DiminishedTriad,
        ChordTemplate::Major7,
        ChordTemplate::Minor7,
        ChordTemplate::Dominant7,
        ChordTemplate::Diminished7,
        ChordTemplate::HalfDiminished7,
    ];

    pub fn intervals(self) -> &'static [i32] {
        match self {
            ChordTemplate::MajorTriad => &[0, 4, 7],
            ChordTemplate::MinorTriad => &[0, 3, 7],
            ChordTemplate::AugmentedTriad => &[0, 4, 8],
            ChordTemplate::DiminishedTriad => &[0, 3, 6],
            ChordTemplate::Major7 => &[0, 4, 7, 11],
            ChordTemplate::Minor7 => &[0, 3, 7, 10],
            ChordTemplate::Dominant7 => &[0, 4, 7, 10],
            ChordTemplate::Diminished7 => &[0, 3, 6, 9],
            ChordTemplate::HalfDiminished7 => &[0, 3, 6, 10],
        }
    }

    /// Spell the template out over a root, all members in one octave.
    pub fn pitches(self, root: PitchClass, octave: i32) -> Vec<Pitch> {
        self.intervals()
            .iter()
            .map(|&interval| {
                Pitch::new(
                    PitchClass::from_semitone(root.semitone() + interval),
                    octave,
                )
            })
            .collect()
    }
}

/// A scale anchored at a root pitch class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct Key {
    pub root: PitchClass,
    pub scale: Scale,
}

impl Key {
    pub fn new(root: PitchClass, scale: Scale) -> Self {
        Self { root, scale }
    }

    /// Semitone interval of a pitch class above the root, 0..=11.
    pub fn interval_of(&self, class: PitchClass) -> i32 {
        (class.semitone() - self.root.semitone()).rem_euclid(12)
    }

    pub fn contains(&self, class: PitchClass) -> bool {
        self.scale.offsets().contains(&self.interval_of(class))
    }

    /// Exact scale degree of a pitch class, if it is in the scale.
    ///
    /// ```
    /// use motivic::primitives::{Key, PitchClass, Scale};
    /// let key = Key::new(PitchClass::G, Scale::Major);
    /// assert_eq!(key.degree_of(PitchClass::C), Some(3));
    /// assert_eq!(key.degree_of(PitchClass::Ab), None);
    /// ```
    pub fn degree_of(&self, class: PitchClass) -> Option<usize> {
        let interval = self.interval_of(class);
        self.scale.offsets().iter().position(|&o| o == interval)
    }

    /// Degree of the first scale offset at or above the pitch class's
    /// chromatic interval, wrapping mod 12. Used as the fallback when an
    /// out-of-scale pitch needs a degree: the smallest qualifying offset
    /// is taken, upward.
    pub fn nearest_degree(&self, class: PitchClass) -> usize {
        let interval = self.interval_of(class);
        let offsets = self.scale.offsets();
        for step in 0..12 {
            let probe = (interval + step).rem_euclid(12);
            if let Some(degree) = offsets.iter().position(|&o| o == probe)
            {
                return degree;
            }
        }
        // Offsets always contain 0, so the probe loop always returns.
        0
    }

    /// Pitch class at a (wrapped) scale degree.
    pub fn class_at_degree(&self, degree: usize) -> PitchClass {
        let offsets = self.scale.offsets();
        let offset = offsets[degree % offsets.len()];
        PitchClass::from_semitone(self.root.semitone() + offset)
    }
}
