//! Constrained random phrase and harmony generation.
//!
//! All randomness flows through a caller-supplied [`rand::Rng`], so
//! tests drive generation with a seeded generator.

use fraction::Fraction;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Error;
use crate::primitives::{
    ChordTemplate, Duration, Note, NoteKind, Pitch, PitchClass,
};
use crate::session::{Config, Mode};
use crate::voice::{TupletGroup, TupletRatio, Voice};

/// Probability that a pitch pick comes out as a rest.
pub const REST_PROBABILITY: f64 = 0.2;
/// Probability that an eligible duration pick becomes a tuplet.
const TUPLET_PROBABILITY: f64 = 0.5;
const TUPLET_SIZES: [usize; 3] = [3, 5, 7];
/// A phrase that underflows its voice's minimum duration is discarded
/// and regrown; after this many restarts the target is unreachable.
const MAX_RESTARTS: usize = 10_000;

/// A generated note list plus the tuplet groups it contains, ready for
/// [`Voice::rebuild`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPhrase {
    pub notes: Vec<Note>,
    pub tuplets: Vec<TupletGroup>,
}

/// Grow a phrase of exactly `target` total duration for a voice.
///
/// Durations are drawn uniformly from the catalog subset inside the
/// voice's rhythm range. Whenever the remaining target drops below the
/// voice's minimum duration, all progress is discarded and generation
/// restarts: partial phrases shorter than the minimum grain are never
/// emitted. Sub-unit non-dotted picks that are at least one beat unit
/// may become a tuplet of 3, 5 or 7 notes occupying the notated space
/// of two plain notes of the picked duration.
///
/// `start_offset` is the phrase's position from the start of the piece;
/// in harmony mode pitch picks are narrowed to the harmony chord active
/// at the running offset.
pub fn generate_phrase(
    voice: &Voice,
    config: &Config,
    harmony: Option<&Voice>,
    target: Fraction,
    allow_tuplets: bool,
    start_offset: Fraction,
    rng: &mut impl Rng,
) -> Result<GeneratedPhrase, Error> {
    let zero = Fraction::from(0.0);
    let allowed: Vec<Duration> = Duration::CATALOG
        .iter()
        .copied()
        .filter(|d| {
            d.fraction() >= voice.rhythm_range.0.fraction()
                && d.fraction() <= voice.rhythm_range.1.fraction()
        })
        .collect();
    if allowed.is_empty() {
        return Err(Error::TargetUnreachable(target));
    }
    let min = voice.rhythm_range.0.fraction();
    let beat = config.time_signature.beat_unit();

    let mut notes: Vec<Note> = Vec::new();
    let mut tuplets: Vec<TupletGroup> = Vec::new();
    let mut current = zero;
    let mut offset = start_offset;
    let mut restarts = 0usize;

    while current < target {
        if target - current < min {
            restarts += 1;
            if restarts > MAX_RESTARTS {
                debug!(
                    "voice {}: gave up reaching {} after {} restarts",
                    voice.name, target, restarts
                );
                return Err(Error::TargetUnreachable(target));
            }
            notes.clear();
            tuplets.clear();
            current = zero;
            offset = start_offset;
        }

        let duration =
            allowed[rng.gen_range(0..allowed.len())];
        let value = duration.fraction();
        if current + value > target {
            continue;
        }

        let tuplet_eligible = allow_tuplets
            && !duration.dotted
            && value < Fraction::from(1.0)
            && value >= beat
            && target - current >= value * Fraction::from(2.0);
        if tuplet_eligible && rng.gen_bool(TUPLET_PROBABILITY) {
            let played =
                TUPLET_SIZES[rng.gen_range(0..TUPLET_SIZES.len())];
            let real = Duration::from_fraction(
                value * Fraction::from(2.0),
            )?;
            let start = notes.len();
            for _ in 0..played {
                let kind = random_pitch(
                    voice, config, harmony, offset, value, true, rng,
                );
                notes.push(Note { kind, duration });
                offset = offset
                    + value * Fraction::new(2u64, played as u64);
            }
            tuplets.push(TupletGroup {
                indices: (start..start + played).collect(),
                ratio: TupletRatio { played, occupied: 2 },
                real_duration: real,
            });
            current = current + value * Fraction::from(2.0);
        } else {
            let kind = random_pitch(
                voice, config, harmony, offset, value, true, rng,
            );
            notes.push(Note { kind, duration });
            current = current + value;
            offset = offset + value;
        }
    }

    Ok(GeneratedPhrase { notes, tuplets })
}

/// Pick a random pitch for a voice, or a rest.
///
/// The pool is the voice's allowed-pitch set, narrowed in harmony mode
/// to the chord active at `offset`. An empty pool yields a rest even
/// when rests were not asked for: bounds exhaustion substitutes
/// silence rather than failing.
pub fn random_pitch(
    voice: &Voice,
    config: &Config,
    harmony: Option<&Voice>,
    offset: Fraction,
    note_duration: Fraction,
    allow_rest: bool,
    rng: &mut impl Rng,
) -> NoteKind {
    let mut pitches = voice.allowed_pitches();
    if config.mode == Mode::Harmony {
        if let Some(harmony) = harmony {
            pitches =
                harmony_filter(pitches, harmony, offset, note_duration);
        }
    }
    pick_pitch(&pitches, allow_rest, rng)
}

pub(crate) fn pick_pitch(
    pitches: &[Pitch],
    allow_rest: bool,
    rng: &mut impl Rng,
) -> NoteKind {
    if allow_rest
        && (pitches.is_empty() || rng.gen_bool(REST_PROBABILITY))
    {
        return NoteKind::Rest;
    }
    match pitches.choose(rng) {
        Some(pitch) => NoteKind::Tone(*pitch),
        None => NoteKind::Rest,
    }
}

/// Keep only pitches present in the harmony chord sounding at `offset`.
///
/// The harmony voice's durations are scanned front to back until the
/// chord containing (or closest following) the offset is found. When
/// the new note straddles two chords, whichever overlaps it more wins.
fn harmony_filter(
    pitches: Vec<Pitch>,
    harmony: &Voice,
    offset: Fraction,
    note_duration: Fraction,
) -> Vec<Pitch> {
    let chords = harmony.unprocessed_notes();
    let mut searched = Fraction::from(0.0);
    for (i, chord) in chords.iter().enumerate() {
        searched = searched + chord.duration.fraction();
        if searched <= offset && i + 1 < chords.len() {
            continue;
        }
        let mut active = chord;
        let current_overlap = searched - offset;
        let next_overlap = note_duration - current_overlap;
        if next_overlap > current_overlap && i + 1 < chords.len() {
            active = &chords[i + 1];
        }
        let classes: Vec<PitchClass> =
            active.pitches().iter().map(|p| p.class).collect();
        return pitches
            .into_iter()
            .filter(|p| classes.contains(&p.class))
            .collect();
    }
    pitches
}

/// Rebuild the harmony stream from scratch: one chord per step, step
/// durations drawn from the catalog values that evenly divide the beat
/// unit, until `num_measures * measure_length` is filled. Chords never
/// straddle a barline; a meter no catalog value fits into (e.g. a 1/64
/// measure) is reported as unreachable after bounded retries.
pub fn generate_harmony(
    config: &Config,
    rng: &mut impl Rng,
) -> Result<Vec<Note>, Error> {
    let beat = config.time_signature.beat_unit();
    let zero = Fraction::from(0.0);
    let allowed: Vec<Duration> = Duration::CATALOG
        .iter()
        .copied()
        .filter(|d| d.fraction() % beat == zero)
        .collect();
    let measure = config.measure_length();
    let target = config.target_duration();
    if allowed.is_empty() {
        return Err(Error::TargetUnreachable(target));
    }

    let mut notes = Vec::new();
    let mut total = zero;
    let mut failures = 0usize;
    while total < target {
        let duration = allowed[rng.gen_range(0..allowed.len())];
        if duration.fraction() + total % measure > measure {
            failures += 1;
            if failures > MAX_RESTARTS {
                debug!(
                    "harmony: gave up reaching {} after {} failed picks",
                    target, failures
                );
                return Err(Error::TargetUnreachable(target));
            }
            continue;
        }
        failures = 0;
        total = total + duration.fraction();
        let root = PitchClass::ALL[rng.gen_range(0..12)];
        let template = ChordTemplate::ALL
            [rng.gen_range(0..ChordTemplate::ALL.len())];
        notes.push(Note::chord(template.pitches(root, 4), duration));
    }
    debug!("harmony rebuilt: {} chords over {}", notes.len(), target);
    Ok(notes)
}
