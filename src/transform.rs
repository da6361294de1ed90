//! The transformation operators.
//!
//! Every operator reads a voice's unprocessed stream, computes the full
//! transformed note list plus tuplet table in memory, and writes it back
//! with a single [`Voice::rebuild`] call; ties and measure splits are
//! never carried over. Operators on an empty voice are silent no-ops.
//!
//! Unless an operator explicitly changes structure, tuplet groupings are
//! reconstructed over the transformed notes with their ratio and notated
//! span intact.

use std::collections::HashSet;

use fraction::Fraction;
use itertools::Itertools;
use log::warn;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Error;
use crate::generate::{generate_phrase, pick_pitch};
use crate::primitives::{
    Duration, Key, Note, NoteKind, Pitch, PitchClass, Scale,
};
use crate::session::Config;
use crate::voice::{TupletGroup, Voice};

/// Reflection and transposition mirror around/into octave 4.
const AXIS_OCTAVE: i32 = 4;
/// Chance that complicate's sub-notes keep the replaced note's pitch.
const KEEP_PITCH_PROBABILITY: f64 = 0.3;

fn group_of<'a>(
    groups: &'a [TupletGroup],
    index: usize,
) -> Option<(usize, &'a TupletGroup)> {
    groups.iter().enumerate().find(|(_, g)| g.contains(index))
}

/// Octave-shift a pitch class into the voice's range. The class is kept;
/// only whole octaves move.
fn clamp_into_range(
    class: PitchClass,
    octave: i32,
    range: (Pitch, Pitch),
) -> Pitch {
    let index = octave * 12 + class.semitone();
    let min = range.0.index();
    let max = range.1.index();
    let mut octave = octave;
    if index < min {
        octave += (min - index + 11) / 12;
    } else if index > max {
        octave -= (index - max + 11) / 12;
    }
    Pitch::new(class, octave)
}

fn map_pitches(note: &Note, f: impl Fn(Pitch) -> Pitch) -> Note {
    let kind = match &note.kind {
        NoteKind::Rest => NoteKind::Rest,
        NoteKind::Tone(p) => NoteKind::Tone(f(*p)),
        NoteKind::Chord(ps) => {
            NoteKind::Chord(ps.iter().map(|p| f(*p)).collect())
        }
    };
    Note { kind, duration: note.duration }
}

/// Reverse the note order. Tuplet membership is recomputed from the
/// reversed positions; ratio and span are preserved.
pub fn reverse(
    voice: &mut Voice,
    measure: Fraction,
) -> Result<(), Error> {
    let src = voice.unprocessed_notes();
    if src.is_empty() {
        return Ok(());
    }
    let last = src.len() - 1;
    let notes: Vec<Note> = src.iter().rev().cloned().collect();
    let tuplets: Vec<TupletGroup> = voice
        .tuplets()
        .iter()
        .map(|g| TupletGroup {
            indices: g
                .indices
                .iter()
                .map(|&i| last - i)
                .sorted()
                .collect(),
            ratio: g.ratio,
            real_duration: g.real_duration,
        })
        .collect();
    voice.rebuild(notes, tuplets, measure)
}

/// Mirror every pitch around an axis pitch class, in scale-degree space.
///
/// The note's and the axis's degrees are taken relative to the voice's
/// root; notes outside the scale fall back to chromatic degrees. The
/// reflected degree picks the pitch class; the octave comes from
/// mirroring the absolute degree-offset position around the axis
/// (anchored at octave 4), clamped back into range. Rests pass through.
pub fn reflect(
    voice: &mut Voice,
    axis: PitchClass,
    measure: Fraction,
) -> Result<(), Error> {
    if voice.unprocessed_notes().is_empty() {
        return Ok(());
    }
    let key = voice.key;
    let range = voice.pitch_range;
    let notes: Vec<Note> = voice
        .unprocessed_notes()
        .iter()
        .map(|n| map_pitches(n, |p| reflect_pitch(p, axis, key, range)))
        .collect();
    let tuplets = voice.tuplets().to_vec();
    voice.rebuild(notes, tuplets, measure)
}

fn reflect_pitch(
    pitch: Pitch,
    axis: PitchClass,
    key: Key,
    range: (Pitch, Pitch),
) -> Pitch {
    let scale = if key.contains(pitch.class) {
        key.scale
    } else {
        Scale::Chromatic
    };
    let offsets = scale.offsets();
    let len = offsets.len() as i32;
    let note_interval = key.interval_of(pitch.class);
    let note_degree = offsets
        .iter()
        .position(|&o| o == note_interval)
        .unwrap_or_default() as i32;
    let axis_interval = key.interval_of(axis);

    let reflected_degree =
        match offsets.iter().position(|&o| o == axis_interval) {
            Some(axis_degree) => {
                (2 * axis_degree as i32 - note_degree).rem_euclid(len)
            }
            None => {
                // Axis outside the scale: anchor on the smallest
                // in-scale offset above it, then mirror below that.
                let found = key.nearest_degree(axis) as i32;
                let distance = (note_degree - found).rem_euclid(len);
                (found - distance - 1).rem_euclid(len)
            }
        };
    let class = PitchClass::from_semitone(
        key.root.semitone() + offsets[reflected_degree as usize],
    );

    let note_abs = pitch.octave * 12 + note_interval;
    let axis_abs = AXIS_OCTAVE * 12 + axis_interval;
    let reflected_abs = 2 * axis_abs - note_abs;
    clamp_into_range(class, reflected_abs.div_euclid(12), range)
}

/// Prepend a rest of the given duration, shifting everything later.
/// Tuplets are preserved verbatim, one slot down the stream.
pub fn shift(
    voice: &mut Voice,
    distance: Duration,
    measure: Fraction,
) -> Result<(), Error> {
    if voice.unprocessed_notes().is_empty() {
        return Ok(());
    }
    let mut notes = vec![Note::rest(distance)];
    notes.extend(voice.unprocessed_notes().iter().cloned());
    let tuplets: Vec<TupletGroup> = voice
        .tuplets()
        .iter()
        .map(|g| TupletGroup {
            indices: g.indices.iter().map(|&i| i + 1).collect(),
            ratio: g.ratio,
            real_duration: g.real_duration,
        })
        .collect();
    voice.rebuild(notes, tuplets, measure)
}

/// Move every pitched note by a signed number of scale degrees (not
/// semitones), adjusting the octave when the move crosses a pitch-class
/// wraparound, then clamping into range. Rests are unchanged, and a
/// zero delta is the identity.
pub fn transpose(
    voice: &mut Voice,
    degrees: i32,
    measure: Fraction,
) -> Result<(), Error> {
    if degrees == 0 || voice.unprocessed_notes().is_empty() {
        return Ok(());
    }
    let key = voice.key;
    let range = voice.pitch_range;
    let notes: Vec<Note> = voice
        .unprocessed_notes()
        .iter()
        .map(|n| {
            map_pitches(n, |p| transpose_pitch(p, degrees, key, range))
        })
        .collect();
    let tuplets = voice.tuplets().to_vec();
    voice.rebuild(notes, tuplets, measure)
}

fn transpose_pitch(
    pitch: Pitch,
    degrees: i32,
    key: Key,
    range: (Pitch, Pitch),
) -> Pitch {
    let offsets = key.scale.offsets();
    let len = offsets.len() as i32;
    // Out-of-scale pitches resolve to the nearest degree upward.
    let degree = key
        .degree_of(pitch.class)
        .unwrap_or_else(|| key.nearest_degree(pitch.class))
        as i32;
    let new_degree = (degree + degrees).rem_euclid(len) as usize;
    let class = key.class_at_degree(new_degree);

    let original_index = pitch.index();
    let moved_index = pitch.octave * 12 + class.semitone();
    let mut octave = pitch.octave;
    if degrees < 0 && original_index <= moved_index {
        octave -= 1;
    } else if degrees >= 0 && original_index >= moved_index {
        octave += 1;
    }
    clamp_into_range(class, octave, range)
}

/// Randomly permute the duration assignment while keeping the pitch
/// sequence in order. When a drawn duration belongs to a tuplet, the
/// remaining members of that tuplet are drawn next (in random order)
/// until the group is complete, and an equivalent group is recorded at
/// the new positions.
pub fn shuffle_rhythm(
    voice: &mut Voice,
    measure: Fraction,
    rng: &mut impl Rng,
) -> Result<(), Error> {
    let src = voice.unprocessed_notes().to_vec();
    if src.is_empty() {
        return Ok(());
    }
    let groups = voice.tuplets().to_vec();

    let mut pool: Vec<usize> = (0..src.len()).collect();
    let mut notes: Vec<Note> = Vec::with_capacity(src.len());
    let mut tuplets: Vec<TupletGroup> = Vec::new();
    let mut pitch_cursor = 0usize;

    let take = |pool: &mut Vec<usize>, at: usize| pool.remove(at);

    while notes.len() < src.len() {
        let at = rng.gen_range(0..pool.len());
        let rhythm_index = take(&mut pool, at);
        let duration = src[rhythm_index].duration;

        match group_of(&groups, rhythm_index) {
            Some((g_index, group)) => {
                let start = notes.len();
                notes.push(
                    src[pitch_cursor].with_duration(duration),
                );
                pitch_cursor += 1;
                while notes.len() - start < group.ratio.played {
                    let candidates: Vec<usize> = pool
                        .iter()
                        .enumerate()
                        .filter(|(_, &i)| {
                            group_of(&groups, i)
                                .map(|(gi, _)| gi)
                                == Some(g_index)
                        })
                        .map(|(at, _)| at)
                        .collect();
                    let at = candidates
                        [rng.gen_range(0..candidates.len())];
                    let member = take(&mut pool, at);
                    notes.push(
                        src[pitch_cursor]
                            .with_duration(src[member].duration),
                    );
                    pitch_cursor += 1;
                }
                tuplets.push(TupletGroup {
                    indices: (start..start + group.ratio.played)
                        .collect(),
                    ratio: group.ratio,
                    real_duration: group.real_duration,
                });
            }
            None => {
                notes.push(
                    src[pitch_cursor].with_duration(duration),
                );
                pitch_cursor += 1;
            }
        }
    }
    voice.rebuild(notes, tuplets, measure)
}

/// Randomly permute whole notes (pitch and duration together). Tuplet
/// groups are drawn and reinserted as atomic blocks.
pub fn shuffle_notes(
    voice: &mut Voice,
    measure: Fraction,
    rng: &mut impl Rng,
) -> Result<(), Error> {
    let src = voice.unprocessed_notes().to_vec();
    if src.is_empty() {
        return Ok(());
    }
    let groups = voice.tuplets().to_vec();

    let mut pool: Vec<usize> = (0..src.len()).collect();
    let mut notes: Vec<Note> = Vec::with_capacity(src.len());
    let mut tuplets: Vec<TupletGroup> = Vec::new();

    while !pool.is_empty() {
        let at = rng.gen_range(0..pool.len());
        let index = pool.remove(at);
        match group_of(&groups, index) {
            Some((g_index, group)) => {
                let start = notes.len();
                notes.push(src[index].clone());
                while notes.len() - start < group.ratio.played {
                    let candidates: Vec<usize> = pool
                        .iter()
                        .enumerate()
                        .filter(|(_, &i)| {
                            group_of(&groups, i)
                                .map(|(gi, _)| gi)
                                == Some(g_index)
                        })
                        .map(|(at, _)| at)
                        .collect();
                    let at = candidates
                        [rng.gen_range(0..candidates.len())];
                    let member = pool.remove(at);
                    notes.push(src[member].clone());
                }
                tuplets.push(TupletGroup {
                    indices: (start..start + group.ratio.played)
                        .collect(),
                    ratio: group.ratio,
                    real_duration: group.real_duration,
                });
            }
            None => notes.push(src[index].clone()),
        }
    }
    voice.rebuild(notes, tuplets, measure)
}

/// Randomly permute pitches among the non-rest notes only, preserving
/// the duration sequence and every rest position. Tuplet groupings stay
/// at their original positions.
pub fn shuffle_pitch(
    voice: &mut Voice,
    measure: Fraction,
    rng: &mut impl Rng,
) -> Result<(), Error> {
    let src = voice.unprocessed_notes().to_vec();
    if src.is_empty() {
        return Ok(());
    }
    let mut kinds: Vec<NoteKind> = src
        .iter()
        .filter(|n| !n.is_rest())
        .map(|n| n.kind.clone())
        .collect();
    kinds.shuffle(rng);

    let mut drawn = kinds.into_iter();
    let notes: Vec<Note> = src
        .iter()
        .map(|n| {
            if n.is_rest() {
                n.clone()
            } else {
                match drawn.next() {
                    Some(kind) => Note { kind, duration: n.duration },
                    None => n.clone(),
                }
            }
        })
        .collect();
    let tuplets = voice.tuplets().to_vec();
    voice.rebuild(notes, tuplets, measure)
}

/// Replace every note's duration with a uniformly random catalog value,
/// keeping its content. Tuplets are broken and not reconstructed.
pub fn change_rhythm(
    voice: &mut Voice,
    measure: Fraction,
    rng: &mut impl Rng,
) -> Result<(), Error> {
    let src = voice.unprocessed_notes().to_vec();
    if src.is_empty() {
        return Ok(());
    }
    let notes: Vec<Note> = src
        .iter()
        .map(|n| {
            let duration = Duration::CATALOG
                [rng.gen_range(0..Duration::CATALOG.len())];
            n.with_duration(duration)
        })
        .collect();
    voice.rebuild(notes, Vec::new(), measure)
}

/// Replace every non-rest note's content with a fresh scale-constrained
/// pick at the same duration. Rests are excluded and the pick is never
/// harmony-filtered. Tuplets are reconstructed from the original
/// groupings.
pub fn change_pitch(
    voice: &mut Voice,
    measure: Fraction,
    rng: &mut impl Rng,
) -> Result<(), Error> {
    let src = voice.unprocessed_notes().to_vec();
    if src.is_empty() {
        return Ok(());
    }
    let allowed = voice.allowed_pitches();
    let notes: Vec<Note> = src
        .iter()
        .map(|n| {
            if n.is_rest() {
                n.clone()
            } else {
                Note {
                    kind: pick_pitch(&allowed, false, rng),
                    duration: n.duration,
                }
            }
        })
        .collect();
    let tuplets = voice.tuplets().to_vec();
    voice.rebuild(notes, tuplets, measure)
}

/// Reduce rhythmic density.
///
/// Runs of plain notes are greedily merged: consecutive durations are
/// accumulated and, when the combined value exists in the catalog (and
/// is not a full measure) and a coin flip lands, the run collapses into
/// one note carrying the first note's content. Tuplets are thinned to a
/// random smaller size: if the reduced count is odd it stays a tuplet,
/// otherwise its notated span is redistributed evenly as plain notes.
/// An even share that is not a catalog value (a 1/32-base group thinned
/// to four members would need 1/64 notes) keeps the thinned tuplet
/// instead.
pub fn simplify(
    voice: &mut Voice,
    measure: Fraction,
    rng: &mut impl Rng,
) -> Result<(), Error> {
    let src = voice.unprocessed_notes().to_vec();
    if src.is_empty() {
        return Ok(());
    }
    let groups = voice.tuplets().to_vec();

    let mut notes: Vec<Note> = Vec::new();
    let mut tuplets: Vec<TupletGroup> = Vec::new();
    let mut pending: Vec<Note> = Vec::new();
    let mut i = 0usize;

    while i < src.len() {
        let note = &src[i];
        if let Some((_, group)) = group_of(&groups, i) {
            pending.push(note.clone());
            if pending.len() == group.ratio.played {
                // Thin to a count in [2, min(5, size)].
                let cap = usize::min(5, pending.len());
                let reduced = 2 + rng.gen_range(0..cap - 1);
                while pending.len() > reduced {
                    let drop = rng.gen_range(0..pending.len());
                    pending.remove(drop);
                }
                let per = group.real_duration.fraction()
                    / Fraction::new(pending.len() as u64, 1u64);
                let redistributed = if pending.len() % 2 == 0 {
                    Duration::try_from_fraction(per)
                } else {
                    None
                };
                match redistributed {
                    Some(duration) => {
                        for member in pending.drain(..) {
                            notes.push(member.with_duration(duration));
                        }
                    }
                    None => {
                        let start = notes.len();
                        let kept = pending.len();
                        notes.append(&mut pending);
                        tuplets.push(TupletGroup {
                            indices: (start..start + kept).collect(),
                            ratio: crate::voice::TupletRatio {
                                played: kept,
                                occupied: group.ratio.occupied,
                            },
                            real_duration: group.real_duration,
                        });
                    }
                }
            }
            i += 1;
        } else {
            let mut combined = note.duration.fraction();
            let mut merged = false;
            let mut j = i + 1;
            while j < src.len() {
                if group_of(&groups, j).is_some() {
                    break;
                }
                combined = combined + src[j].duration.fraction();
                if combined != measure {
                    if let Some(duration) =
                        Duration::try_from_fraction(combined)
                    {
                        if rng.gen_bool(0.5) {
                            notes.push(note.with_duration(duration));
                            i = j + 1;
                            merged = true;
                            break;
                        }
                    }
                }
                j += 1;
            }
            if !merged {
                notes.push(note.clone());
                i += 1;
            }
        }
    }
    voice.rebuild(notes, tuplets, measure)
}

/// Increase rhythmic density: the inverse of [`simplify`].
///
/// Each plain note above the minimal duration is, with even odds,
/// replaced by a freshly generated sub-phrase of equal total duration
/// (tuplets disallowed inside); each tuplet is replaced once, over its
/// notated span. The first sub-note (and others with a small
/// probability) keeps the replaced note's content.
pub fn complicate(
    voice: &mut Voice,
    config: &Config,
    harmony: Option<&Voice>,
    measure: Fraction,
    rng: &mut impl Rng,
) -> Result<(), Error> {
    let src = voice.unprocessed_notes().to_vec();
    if src.is_empty() {
        return Ok(());
    }
    let groups = voice.tuplets().to_vec();
    let minimal = Duration::CATALOG[Duration::CATALOG.len() - 1];

    let mut notes: Vec<Note> = Vec::new();
    let mut offset = Fraction::from(0.0);
    let mut seen: HashSet<usize> = HashSet::new();

    for (i, note) in src.iter().enumerate() {
        let target = match group_of(&groups, i) {
            Some((g_index, group)) => {
                if !seen.insert(g_index) {
                    continue;
                }
                Some(group.real_duration.fraction())
            }
            None => {
                if note.duration != minimal && rng.gen_bool(0.5) {
                    Some(note.duration.fraction())
                } else {
                    None
                }
            }
        };

        let Some(target) = target else {
            offset = offset + note.duration.fraction();
            notes.push(note.clone());
            continue;
        };

        match generate_phrase(
            voice, config, harmony, target, false, offset, rng,
        ) {
            Ok(phrase) => {
                for (k, sub) in phrase.notes.into_iter().enumerate() {
                    if k == 0 || rng.gen_bool(KEEP_PITCH_PROBABILITY)
                    {
                        notes.push(Note {
                            kind: note.kind.clone(),
                            duration: sub.duration,
                        });
                    } else {
                        notes.push(sub);
                    }
                }
            }
            Err(err) => {
                // Keep the span intact rather than dropping it.
                warn!(
                    "voice {}: complicate fell back on note {}: {}",
                    voice.name, i, err
                );
                for fragment in Duration::fill(target)? {
                    notes.push(note.with_duration(fragment));
                }
            }
        }
        offset = offset + target;
    }
    voice.rebuild(notes, Vec::new(), measure)
}

/// Redistribute one source voice's notes across the whole voice set.
/// Every note goes to one randomly chosen voice whose allowed-pitch
/// set contains it (falling back to the source voice); every other
/// voice receives a rest of matching duration, so the voices stay
/// rhythmically aligned. Tuplet grouping is rebuilt independently per
/// destination voice.
pub fn separate_voice(
    voices: &mut [Voice],
    source_index: usize,
    measure: Fraction,
    rng: &mut impl Rng,
) -> Result<(), Error> {
    let src = voices[source_index].unprocessed_notes().to_vec();
    if src.is_empty() {
        return Ok(());
    }
    let groups = voices[source_index].tuplets().to_vec();
    let allowed: Vec<Vec<Pitch>> =
        voices.iter().map(|v| v.allowed_pitches()).collect();

    let mut new_notes: Vec<Vec<Note>> =
        vec![Vec::new(); voices.len()];
    let mut new_tuplets: Vec<Vec<TupletGroup>> =
        vec![Vec::new(); voices.len()];
    let mut pending: Vec<Vec<usize>> = vec![Vec::new(); voices.len()];

    for (i, note) in src.iter().enumerate() {
        let target = match note.lead_pitch() {
            Some(pitch) => {
                let candidates: Vec<usize> = (0..voices.len())
                    .filter(|&v| allowed[v].contains(&pitch))
                    .collect();
                if candidates.is_empty() {
                    source_index
                } else {
                    candidates[rng.gen_range(0..candidates.len())]
                }
            }
            None => source_index,
        };

        let group = group_of(&groups, i);
        for v in 0..voices.len() {
            let placed = if v == target {
                note.clone()
            } else {
                Note::rest(note.duration)
            };
            let position = new_notes[v].len();
            new_notes[v].push(placed);
            if let Some((_, group)) = group {
                pending[v].push(position);
                if pending[v].len() == group.ratio.played {
                    new_tuplets[v].push(TupletGroup {
                        indices: std::mem::take(&mut pending[v]),
                        ratio: group.ratio,
                        real_duration: group.real_duration,
                    });
                }
            }
        }
    }

    for (v, voice) in voices.iter_mut().enumerate() {
        let notes = std::mem::take(&mut new_notes[v]);
        let tuplets = std::mem::take(&mut new_tuplets[v]);
        voice.rebuild(notes, tuplets, measure)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{BaseDuration, Note, Scale};
    use crate::voice::TupletRatio;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn whole() -> Fraction {
        Fraction::from(1.0)
    }

    fn wide_voice() -> Voice {
        Voice::new(
            "wide",
            (
                Pitch::new(PitchClass::A, 0),
                Pitch::new(PitchClass::C, 8),
            ),
            (
                Duration::plain(BaseDuration::ThirtySecond),
                Duration::plain(BaseDuration::Whole),
            ),
            Key::new(PitchClass::C, Scale::Major),
        )
    }

    fn tone(class: PitchClass, octave: i32, base: BaseDuration) -> Note {
        Note::tone(
            Pitch::new(class, octave),
            Duration::plain(base),
        )
    }

    /// A two-measure line with a triplet in the middle.
    fn seed_voice() -> Voice {
        let mut voice = wide_voice();
        let tuplets = vec![TupletGroup {
            indices: vec![2, 3, 4],
            ratio: TupletRatio { played: 3, occupied: 2 },
            real_duration: Duration::plain(BaseDuration::Half),
        }];
        let notes = vec![
            tone(PitchClass::C, 4, BaseDuration::Quarter),
            Note::rest(Duration::plain(BaseDuration::Quarter)),
            tone(PitchClass::D, 4, BaseDuration::Quarter),
            tone(PitchClass::E, 4, BaseDuration::Quarter),
            tone(PitchClass::F, 4, BaseDuration::Quarter),
            tone(PitchClass::G, 4, BaseDuration::Half),
            tone(PitchClass::A, 4, BaseDuration::Half),
        ];
        voice.rebuild(notes, tuplets, whole()).unwrap();
        voice
    }

    #[test]
    fn reverse_twice_restores() {
        let mut voice = seed_voice();
        let original = voice.unprocessed_notes().to_vec();
        let original_tuplets = voice.tuplets().to_vec();
        reverse(&mut voice, whole()).unwrap();
        assert_ne!(voice.unprocessed_notes(), original.as_slice());
        reverse(&mut voice, whole()).unwrap();
        assert_eq!(voice.unprocessed_notes(), original.as_slice());
        assert_eq!(voice.tuplets(), original_tuplets.as_slice());
    }

    #[test]
    fn reverse_moves_tuplet_to_mirrored_positions() {
        let mut voice = seed_voice();
        reverse(&mut voice, whole()).unwrap();
        assert_eq!(voice.tuplets()[0].indices, vec![2, 3, 4]);
        assert_eq!(voice.tuplets()[0].ratio.played, 3);
    }

    #[test]
    fn reflect_axis_is_a_fixed_point() {
        let mut voice = seed_voice();
        let axis = PitchClass::E;
        reflect(&mut voice, axis, whole()).unwrap();
        // Index 3 held E4 == the axis at its anchor octave.
        assert_eq!(
            voice.unprocessed_notes()[3].lead_pitch(),
            Some(Pitch::new(PitchClass::E, 4))
        );
        // Rests pass through.
        assert!(voice.unprocessed_notes()[1].is_rest());
    }

    #[test]
    fn reflect_mirrors_degrees() {
        let mut voice = seed_voice();
        reflect(&mut voice, PitchClass::E, whole()).unwrap();
        // C4 (two degrees below E) lands on G4 (two above).
        assert_eq!(
            voice.unprocessed_notes()[0].lead_pitch(),
            Some(Pitch::new(PitchClass::G, 4))
        );
        // F4 -> D4, G4 -> C4.
        assert_eq!(
            voice.unprocessed_notes()[4].lead_pitch(),
            Some(Pitch::new(PitchClass::D, 4))
        );
        assert_eq!(
            voice.unprocessed_notes()[5].lead_pitch(),
            Some(Pitch::new(PitchClass::C, 4))
        );
    }

    #[test]
    fn transpose_zero_is_identity() {
        let mut voice = seed_voice();
        let original = voice.unprocessed_notes().to_vec();
        transpose(&mut voice, 0, whole()).unwrap();
        assert_eq!(voice.unprocessed_notes(), original.as_slice());
    }

    #[test]
    fn transpose_round_trip() {
        for degrees in [0, 1, 2, 3, 7] {
            let mut voice = seed_voice();
            let original = voice.unprocessed_notes().to_vec();
            transpose(&mut voice, degrees, whole()).unwrap();
            transpose(&mut voice, -degrees, whole()).unwrap();
            assert_eq!(
                voice.unprocessed_notes(),
                original.as_slice(),
                "degrees {}",
                degrees
            );
        }
    }

    #[test]
    fn transpose_crosses_octave_boundary() {
        let mut voice = wide_voice();
        voice
            .rebuild(
                vec![tone(PitchClass::B, 3, BaseDuration::Quarter)],
                Vec::new(),
                whole(),
            )
            .unwrap();
        transpose(&mut voice, 1, whole()).unwrap();
        assert_eq!(
            voice.unprocessed_notes()[0].lead_pitch(),
            Some(Pitch::new(PitchClass::C, 4))
        );
    }

    #[test]
    fn transpose_full_scale_is_an_octave() {
        let mut voice = wide_voice();
        voice
            .rebuild(
                vec![tone(PitchClass::D, 4, BaseDuration::Quarter)],
                Vec::new(),
                whole(),
            )
            .unwrap();
        transpose(&mut voice, 7, whole()).unwrap();
        assert_eq!(
            voice.unprocessed_notes()[0].lead_pitch(),
            Some(Pitch::new(PitchClass::D, 5))
        );
    }

    #[test]
    fn transpose_clamps_into_range() {
        let mut voice = wide_voice();
        voice.pitch_range = (
            Pitch::new(PitchClass::C, 4),
            Pitch::new(PitchClass::B, 4),
        );
        voice
            .rebuild(
                vec![tone(PitchClass::B, 4, BaseDuration::Quarter)],
                Vec::new(),
                whole(),
            )
            .unwrap();
        transpose(&mut voice, 1, whole()).unwrap();
        // B4 + 1 degree = C5, clamped back to C4.
        assert_eq!(
            voice.unprocessed_notes()[0].lead_pitch(),
            Some(Pitch::new(PitchClass::C, 4))
        );
    }

    #[test]
    fn shift_prepends_rest_and_moves_tuplets() {
        let mut voice = seed_voice();
        let before = voice.unprocessed_notes().to_vec();
        shift(
            &mut voice,
            Duration::plain(BaseDuration::Eighth),
            whole(),
        )
        .unwrap();
        let after = voice.unprocessed_notes();
        assert_eq!(after.len(), before.len() + 1);
        assert!(after[0].is_rest());
        assert_eq!(
            after[0].duration,
            Duration::plain(BaseDuration::Eighth)
        );
        assert_eq!(&after[1..], before.as_slice());
        assert_eq!(voice.tuplets()[0].indices, vec![3, 4, 5]);
    }

    #[test]
    fn shuffle_rhythm_keeps_pitch_order() {
        let mut voice = seed_voice();
        let original = voice.unprocessed_notes().to_vec();
        let mut rng = StdRng::seed_from_u64(5);
        shuffle_rhythm(&mut voice, whole(), &mut rng).unwrap();
        let shuffled = voice.unprocessed_notes();
        assert_eq!(shuffled.len(), original.len());
        for (a, b) in shuffled.iter().zip(original.iter()) {
            assert_eq!(a.kind, b.kind);
        }
        let mut before: Vec<Duration> =
            original.iter().map(|n| n.duration).collect();
        let mut after: Vec<Duration> =
            shuffled.iter().map(|n| n.duration).collect();
        before.sort_by_key(|d| (d.base as u8, d.dotted));
        after.sort_by_key(|d| (d.base as u8, d.dotted));
        assert_eq!(before, after);
        assert_eq!(voice.tuplets().len(), 1);
        assert_eq!(voice.tuplets()[0].indices.len(), 3);
    }

    #[test]
    fn shuffle_notes_preserves_note_multiset() {
        let mut voice = seed_voice();
        let total = voice.running_duration();
        let original = voice.unprocessed_notes().to_vec();
        let mut rng = StdRng::seed_from_u64(8);
        shuffle_notes(&mut voice, whole(), &mut rng).unwrap();
        assert_eq!(voice.running_duration(), total);
        let shuffled = voice.unprocessed_notes();
        assert_eq!(shuffled.len(), original.len());
        for note in original.iter() {
            let want =
                original.iter().filter(|n| *n == note).count();
            let got =
                shuffled.iter().filter(|n| *n == note).count();
            assert_eq!(want, got);
        }
        // The tuplet survived as one contiguous block.
        assert_eq!(voice.tuplets().len(), 1);
        let indices = &voice.tuplets()[0].indices;
        for pair in indices.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
    }

    #[test]
    fn shuffle_pitch_keeps_rhythm_and_rests() {
        let mut voice = seed_voice();
        let original = voice.unprocessed_notes().to_vec();
        let mut rng = StdRng::seed_from_u64(21);
        shuffle_pitch(&mut voice, whole(), &mut rng).unwrap();
        let shuffled = voice.unprocessed_notes();
        for (a, b) in shuffled.iter().zip(original.iter()) {
            assert_eq!(a.duration, b.duration);
            assert_eq!(a.is_rest(), b.is_rest());
        }
        let mut before: Vec<Option<Pitch>> = original
            .iter()
            .filter(|n| !n.is_rest())
            .map(|n| n.lead_pitch())
            .collect();
        let mut after: Vec<Option<Pitch>> = shuffled
            .iter()
            .filter(|n| !n.is_rest())
            .map(|n| n.lead_pitch())
            .collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn change_rhythm_drops_tuplets() {
        let mut voice = seed_voice();
        let original = voice.unprocessed_notes().to_vec();
        let mut rng = StdRng::seed_from_u64(2);
        change_rhythm(&mut voice, whole(), &mut rng).unwrap();
        assert!(voice.tuplets().is_empty());
        let changed = voice.unprocessed_notes();
        assert_eq!(changed.len(), original.len());
        for (a, b) in changed.iter().zip(original.iter()) {
            assert_eq!(a.kind, b.kind);
        }
    }

    #[test]
    fn change_pitch_keeps_rhythm_and_rests() {
        let mut voice = seed_voice();
        let original = voice.unprocessed_notes().to_vec();
        let allowed = voice.allowed_pitches();
        let mut rng = StdRng::seed_from_u64(3);
        change_pitch(&mut voice, whole(), &mut rng).unwrap();
        let changed = voice.unprocessed_notes();
        for (a, b) in changed.iter().zip(original.iter()) {
            assert_eq!(a.duration, b.duration);
            assert_eq!(a.is_rest(), b.is_rest());
            if let Some(pitch) = a.lead_pitch() {
                assert!(allowed.contains(&pitch));
            }
        }
        assert_eq!(voice.tuplets().len(), 1);
    }

    #[test]
    fn simplify_preserves_total_duration() {
        for seed in 0..8u64 {
            let mut voice = seed_voice();
            let total = voice.running_duration();
            let mut rng = StdRng::seed_from_u64(seed);
            simplify(&mut voice, whole(), &mut rng).unwrap();
            assert_eq!(voice.running_duration(), total, "seed {}", seed);
            for group in voice.tuplets() {
                assert_eq!(group.indices.len() % 2, 1);
                assert_eq!(
                    group.indices.len(),
                    group.ratio.played
                );
            }
        }
    }

    #[test]
    fn simplify_keeps_tuplet_when_share_is_not_notatable() {
        // A 1/32-base quintuplet spans 1/16; thinned to four members
        // the even share would be a 1/64 note, which has no catalog
        // entry, so the thinned tuplet must survive instead.
        for seed in 0..32u64 {
            let mut voice = wide_voice();
            let tuplets = vec![TupletGroup {
                indices: vec![0, 1, 2, 3, 4],
                ratio: TupletRatio { played: 5, occupied: 2 },
                real_duration: Duration::plain(BaseDuration::Sixteenth),
            }];
            let notes = vec![
                tone(PitchClass::C, 4, BaseDuration::ThirtySecond);
                5
            ];
            voice.rebuild(notes, tuplets, whole()).unwrap();
            let total = voice.running_duration();
            let mut rng = StdRng::seed_from_u64(seed);
            simplify(&mut voice, whole(), &mut rng).unwrap();
            assert_eq!(voice.running_duration(), total, "seed {}", seed);
            for group in voice.tuplets() {
                assert_eq!(group.indices.len(), group.ratio.played);
            }
        }
    }

    #[test]
    fn complicate_preserves_total_duration() {
        let config = Config::default();
        for seed in 0..8u64 {
            let mut voice = seed_voice();
            let total = voice.running_duration();
            let mut rng = StdRng::seed_from_u64(seed);
            complicate(&mut voice, &config, None, whole(), &mut rng)
                .unwrap();
            assert_eq!(voice.running_duration(), total, "seed {}", seed);
            assert!(voice.tuplets().is_empty());
        }
    }

    #[test]
    fn separate_voice_distributes_and_pads() {
        let mut voices = vec![seed_voice(), wide_voice(), wide_voice()];
        voices[1].name = "second".into();
        voices[2].name = "third".into();
        let source = voices[0].unprocessed_notes().to_vec();
        let mut rng = StdRng::seed_from_u64(30);
        separate_voice(&mut voices, 0, whole(), &mut rng).unwrap();

        for voice in &voices {
            assert_eq!(
                voice.unprocessed_notes().len(),
                source.len()
            );
        }
        for (i, note) in source.iter().enumerate() {
            let placements = voices
                .iter()
                .filter(|v| v.unprocessed_notes()[i] == *note)
                .count();
            if note.is_rest() {
                // A source rest becomes a rest everywhere.
                assert_eq!(placements, voices.len());
            } else {
                assert_eq!(placements, 1, "note {}", i);
                let rests = voices
                    .iter()
                    .filter(|v| v.unprocessed_notes()[i].is_rest())
                    .count();
                assert_eq!(rests, voices.len() - 1);
                for voice in &voices {
                    assert_eq!(
                        voice.unprocessed_notes()[i].duration,
                        note.duration
                    );
                }
            }
        }
        // Every destination kept the tuplet grouping.
        for voice in &voices {
            assert_eq!(voice.tuplets().len(), 1);
            assert_eq!(voice.tuplets()[0].indices, vec![2, 3, 4]);
        }
    }

    #[test]
    fn operators_on_empty_voice_are_noops() {
        let mut voice = wide_voice();
        let mut rng = StdRng::seed_from_u64(0);
        reverse(&mut voice, whole()).unwrap();
        reflect(&mut voice, PitchClass::C, whole()).unwrap();
        transpose(&mut voice, 3, whole()).unwrap();
        shuffle_rhythm(&mut voice, whole(), &mut rng).unwrap();
        shuffle_notes(&mut voice, whole(), &mut rng).unwrap();
        shuffle_pitch(&mut voice, whole(), &mut rng).unwrap();
        change_rhythm(&mut voice, whole(), &mut rng).unwrap();
        change_pitch(&mut voice, whole(), &mut rng).unwrap();
        simplify(&mut voice, whole(), &mut rng).unwrap();
        assert!(voice.unprocessed_notes().is_empty());
        assert!(voice.notes().is_empty());
    }
}
