//! Crate-wide error type.
//!
//! Configuration problems (empty selection, empty source voice) are not
//! errors: operators treat them as no-ops. Errors here are invariant
//! violations that must surface immediately instead of being coerced.

use fraction::Fraction;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A computed fraction does not reverse-map to any catalog duration.
    /// Reaching this means an upstream step produced an unreachable value.
    #[error("duration {0} is not in the catalog")]
    UnknownDuration(Fraction),

    /// The greedy fill could not exhaust a remainder with catalog values.
    #[error("cannot fill remaining duration {0} from the catalog")]
    Unfillable(Fraction),

    /// The generator ran out of restarts: the voice's rhythm range cannot
    /// tile the requested target duration.
    #[error("rhythm range cannot reach target duration {0}")]
    TargetUnreachable(Fraction),
}
