//! The duration catalog: fractions of a whole note.
//!
//! Durations are exact rationals. The catalog holds the six plain values
//! (whole down to thirty-second) plus the dotted variants of all but the
//! thirty-second, ordered largest first so greedy fills can walk it
//! front to back.

use fraction::Fraction;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum BaseDuration {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl BaseDuration {
    /// Fraction of a whole note.
    pub fn fraction(self) -> Fraction {
        match self {
            BaseDuration::Whole => Fraction::new(1u64, 1u64),
            BaseDuration::Half => Fraction::new(1u64, 2u64),
            BaseDuration::Quarter => Fraction::new(1u64, 4u64),
            BaseDuration::Eighth => Fraction::new(1u64, 8u64),
            BaseDuration::Sixteenth => Fraction::new(1u64, 16u64),
            BaseDuration::ThirtySecond => Fraction::new(1u64, 32u64),
        }
    }
}

/// A notatable duration: a base value, optionally dotted (x1.5).
/// A dotted thirty-second is not in the catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Duration {
    pub base: BaseDuration,
    pub dotted: bool,
}

impl Duration {
    /// All catalog values, largest first.
    pub const CATALOG: [Duration; 11] = [
        Duration::dotted(BaseDuration::Whole),
        Duration::plain(BaseDuration::Whole),
        Duration::dotted(BaseDuration::Half),
        Duration::plain(BaseDuration::Half),
        Duration::dotted(BaseDuration::Quarter),
        Duration::plain(BaseDuration::Quarter),
        Duration::dotted(BaseDuration::Eighth),
        Duration::plain(BaseDuration::Eighth),
        Duration::dotted(BaseDuration::Sixteenth),
        Duration::plain(BaseDuration::Sixteenth),
        Duration::plain(BaseDuration::ThirtySecond),
    ];

    pub const fn plain(base: BaseDuration) -> Self {
        Self { base, dotted: false }
    }

    pub const fn dotted(base: BaseDuration) -> Self {
        Self { base, dotted: true }
    }

    /// Exact fraction of a whole note, dot expansion included.
    pub fn fraction(self) -> Fraction {
        let base = self.base.fraction();
        if self.dotted {
            base * Fraction::new(3u64, 2u64)
        } else {
            base
        }
    }

    /// Reverse-map a fraction to its catalog entry, if one exists.
    pub fn try_from_fraction(value: Fraction) -> Option<Self> {
        Self::CATALOG
            .iter()
            .copied()
            .find(|d| d.fraction() == value)
    }

    /// Reverse-map a fraction that is expected to be a catalog value.
    /// A miss is an invariant violation, reported immediately.
    pub fn from_fraction(value: Fraction) -> Result<Self, Error> {
        Self::try_from_fraction(value)
            .ok_or(Error::UnknownDuration(value))
    }

    /// Greedily split an arbitrary amount into catalog durations,
    /// largest first. Used by measure-boundary tie-splitting and by
    /// renderers padding a trailing partial measure.
    ///
    /// ```
    /// use fraction::Fraction;
    /// use motivic::primitives::Duration;
    /// let fragments =
    ///     Duration::fill(Fraction::new(13u64, 16u64)).unwrap();
    /// let values: Vec<Fraction> =
    ///     fragments.iter().map(|d| d.fraction()).collect();
    /// assert_eq!(
    ///     values,
    ///     vec![
    ///         Fraction::new(3u64, 4u64),
    ///         Fraction::new(1u64, 16u64),
    ///     ]
    /// );
    /// ```
    pub fn fill(amount: Fraction) -> Result<Vec<Self>, Error> {
        let zero = Fraction::from(0.0);
        let mut remaining = amount;
        let mut fragments = Vec::new();
        while remaining > zero {
            let next = Self::CATALOG
                .iter()
                .copied()
                .find(|d| d.fraction() <= remaining)
                .ok_or(Error::Unfillable(remaining))?;
            remaining = remaining - next.fraction();
            fragments.push(next);
        }
        Ok(fragments)
    }
}

/// Lossy view of a fraction for tempo math. Catalog durations are always
/// positive, so the sign is ignored.
pub(crate) fn to_f64(value: Fraction) -> f64 {
    match (value.numer(), value.denom()) {
        (Some(n), Some(d)) if *d != 0 => *n as f64 / *d as f64,
        _ => 0.0,
    }
}
