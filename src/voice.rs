//! A voice: an ordered, measure-quantized note stream.
//!
//! The unprocessed stream is the authoritative musical content. The
//! rendered stream, tie groups and rendered tuplet spans are a derived
//! view, rebuilt from scratch on every mutation: operators compute a new
//! unprocessed list plus tuplet table in memory and write it back through
//! [`Voice::rebuild`], which resets the voice and re-appends every note,
//! re-deriving measure splits and ties. Stale derived state can therefore
//! never survive a transformation.

use fraction::Fraction;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::history::{History, Snapshot};
use crate::primitives::{Duration, Key, Note, Pitch, PIANO_KEYS};

/// Played-to-occupied note counts, e.g. 3:2 for a triplet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct TupletRatio {
    pub played: usize,
    pub occupied: usize,
}

/// A contiguous run of notes compressed into the notated space of
/// `ratio.occupied` plain notes. `indices` point into the unprocessed
/// stream; `indices.len() == ratio.played` always holds. Tuplets are
/// atomic with respect to measure splitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupletGroup {
    pub indices: Vec<usize>,
    pub ratio: TupletRatio,
    /// Notated span of the whole group. Always a catalog value: twice
    /// the members' base duration.
    pub real_duration: Duration,
}

impl TupletGroup {
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn is_last(&self, index: usize) -> bool {
        self.indices.last() == Some(&index)
    }
}

/// Indices (into the rendered stream) of same-pitch fragments that
/// together represent one logical note split by measure boundaries.
/// Derived, never authored; rests are never tied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieGroup {
    pub indices: Vec<usize>,
}

/// One playback event: sounding pitches (None for a rest) and the real
/// sounding duration as a fraction of a whole note. Playback uses the
/// un-split view, so tuplet members carry their compressed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneEvent {
    pub pitches: Option<Vec<Pitch>>,
    pub duration: Fraction,
}

/// A single named musical line with its own pitch, rhythm and scale
/// constraints. Created once per part, cleared but never destroyed.
#[derive(Debug, Clone)]
pub struct Voice {
    pub name: String,
    /// Inclusive absolute pitch bounds.
    pub pitch_range: (Pitch, Pitch),
    /// Inclusive duration bounds (min, max) for generation.
    pub rhythm_range: (Duration, Duration),
    pub key: Key,
    pub muted: bool,
    unprocessed: Vec<Note>,
    notes: Vec<Note>,
    ties: Vec<TieGroup>,
    tuplets: Vec<TupletGroup>,
    rendered_tuplets: Vec<TupletGroup>,
    tones: Vec<ToneEvent>,
    running: Fraction,
    history: History,
}

impl Voice {
    pub fn new(
        name: impl Into<String>,
        pitch_range: (Pitch, Pitch),
        rhythm_range: (Duration, Duration),
        key: Key,
    ) -> Self {
        Self {
            name: name.into(),
            pitch_range,
            rhythm_range,
            key,
            muted: false,
            unprocessed: Vec::new(),
            notes: Vec::new(),
            ties: Vec::new(),
            tuplets: Vec::new(),
            rendered_tuplets: Vec::new(),
            tones: Vec::new(),
            running: Fraction::from(0.0),
            history: History::default(),
        }
    }

    /// The authoritative pre-split stream.
    pub fn unprocessed_notes(&self) -> &[Note] {
        &self.unprocessed
    }

    /// The rendered stream, post tie-splitting.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn ties(&self) -> &[TieGroup] {
        &self.ties
    }

    /// Tuplet groups over the unprocessed stream.
    pub fn tuplets(&self) -> &[TupletGroup] {
        &self.tuplets
    }

    /// Tuplet groups re-indexed into the rendered stream, for layout.
    pub fn rendered_tuplets(&self) -> &[TupletGroup] {
        &self.rendered_tuplets
    }

    /// Playback events in original (un-split) order.
    pub fn tone_events(&self) -> &[ToneEvent] {
        &self.tones
    }

    /// Total appended duration, tuplets counted at their notated span.
    pub fn running_duration(&self) -> Fraction {
        self.running
    }

    /// The tuplet (if any) that claims an unprocessed-stream index.
    pub fn tuplet_containing(
        &self,
        index: usize,
    ) -> Option<(usize, &TupletGroup)> {
        self.tuplets
            .iter()
            .enumerate()
            .find(|(_, t)| t.contains(index))
    }

    /// Clear all content. Configuration and history stay.
    pub fn reset(&mut self) {
        self.unprocessed.clear();
        self.notes.clear();
        self.ties.clear();
        self.tuplets.clear();
        self.rendered_tuplets.clear();
        self.tones.clear();
        self.running = Fraction::from(0.0);
    }

    /// Install the tuplet table that upcoming [`Voice::add_note`] calls
    /// will be matched against. Part of the rebuild cycle.
    fn install_tuplets(&mut self, tuplets: Vec<TupletGroup>) {
        self.rendered_tuplets = tuplets
            .iter()
            .map(|t| TupletGroup {
                indices: Vec::with_capacity(t.ratio.played),
                ratio: t.ratio,
                real_duration: t.real_duration,
            })
            .collect();
        self.tuplets = tuplets;
    }

    /// Append one note to the quantized stream.
    ///
    /// Tuplet members pass through verbatim (tuplets never split); the
    /// group's notated span advances the running duration once, at its
    /// last member. Any other note that would overflow the current
    /// measure is split into greedy largest-first fragments: the fill of
    /// the current measure, whole measures while the overflow exceeds
    /// one, then the residue. Non-rest fragments are registered as one
    /// tie group.
    pub fn add_note(
        &mut self,
        note: Note,
        measure: Fraction,
    ) -> Result<(), Error> {
        let index = self.unprocessed.len();
        self.unprocessed.push(note.clone());

        if let Some((t_index, group)) = self.tuplet_containing(index) {
            let ratio = group.ratio;
            let real = group.real_duration;
            let last = group.is_last(index);
            let rendered_index = self.notes.len();
            self.notes.push(note.clone());
            self.rendered_tuplets[t_index].indices.push(rendered_index);
            let compressed = note.duration.fraction()
                * Fraction::new(ratio.occupied as u64, ratio.played as u64);
            self.push_tone(&note, compressed);
            if last {
                self.running = self.running + real.fraction();
            }
            return Ok(());
        }

        let duration = note.duration.fraction();
        let position = self.running % measure;
        if position + duration > measure {
            let fill = measure - position;
            let mut overflow = duration - fill;
            let mut amounts = vec![fill];
            while overflow > measure {
                amounts.push(measure);
                overflow = overflow - measure;
            }
            amounts.push(overflow);

            let mut tied = Vec::new();
            for amount in amounts {
                for fragment in Duration::fill(amount)? {
                    tied.push(self.notes.len());
                    self.notes.push(note.with_duration(fragment));
                }
            }
            if !note.is_rest() {
                self.ties.push(TieGroup { indices: tied });
            }
        } else {
            self.notes.push(note.clone());
        }
        self.running = self.running + duration;
        self.push_tone(&note, duration);
        Ok(())
    }

    fn push_tone(&mut self, note: &Note, duration: Fraction) {
        let pitches = if note.is_rest() {
            None
        } else {
            Some(note.pitches().to_vec())
        };
        self.tones.push(ToneEvent { pitches, duration });
    }

    /// Reset, install the tuplet table, then re-add every note in order.
    /// Every operator writes its result back through here, so measure
    /// splits and ties are always recomputed from the transformed list.
    pub fn rebuild(
        &mut self,
        notes: Vec<Note>,
        tuplets: Vec<TupletGroup>,
        measure: Fraction,
    ) -> Result<(), Error> {
        self.reset();
        self.install_tuplets(tuplets);
        for note in notes {
            self.add_note(note, measure)?;
        }
        Ok(())
    }

    /// All pitches that are both inside the voice's range and in its
    /// scale. The single source of truth for "in range and in scale",
    /// consumed by generation, reflection, transposition and voice
    /// separation.
    pub fn allowed_pitches(&self) -> Vec<Pitch> {
        PIANO_KEYS
            .iter()
            .copied()
            .filter(|p| {
                *p >= self.pitch_range.0
                    && *p <= self.pitch_range.1
                    && self.key.contains(p.class)
            })
            .collect()
    }

    /// Seconds an unprocessed note sounds for at the given tempo,
    /// tuplet compression applied.
    pub fn note_duration_seconds(&self, index: usize, bpm: f64) -> f64 {
        let Some(note) = self.unprocessed.get(index) else {
            return 0.0;
        };
        let mut quarters =
            crate::primitives::duration::to_f64(note.duration.fraction())
                * 4.0;
        if let Some((_, group)) = self.tuplet_containing(index) {
            quarters *= group.ratio.occupied as f64
                / group.ratio.played as f64;
        }
        quarters * 60.0 / bpm
    }

    /// Save the current state to history. Callers push once per applied
    /// operator.
    pub fn push_snapshot(&mut self) {
        let snapshot = Snapshot {
            notes: self.unprocessed.clone(),
            tuplets: self.tuplets.clone(),
        };
        self.history.push(snapshot);
    }

    /// Move through history and restore that state via rebuild.
    /// Returns whether anything changed; out-of-range is a no-op.
    pub fn navigate_history(
        &mut self,
        delta: i32,
        measure: Fraction,
    ) -> Result<bool, Error> {
        let Some(snapshot) = self.history.navigate(delta) else {
            return Ok(false);
        };
        let notes = snapshot.notes.clone();
        let tuplets = snapshot.tuplets.clone();
        self.rebuild(notes, tuplets, measure)?;
        Ok(true)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{
        BaseDuration, NoteKind, PitchClass, Scale,
    };

    fn test_voice() -> Voice {
        Voice::new(
            "upper",
            (
                Pitch::new(PitchClass::C, 4),
                Pitch::new(PitchClass::C, 6),
            ),
            (
                Duration::plain(BaseDuration::ThirtySecond),
                Duration::plain(BaseDuration::Whole),
            ),
            Key::new(PitchClass::C, Scale::Major),
        )
    }

    fn c4(duration: Duration) -> Note {
        Note::tone(Pitch::new(PitchClass::C, 4), duration)
    }

    fn whole() -> Fraction {
        Fraction::from(1.0)
    }

    #[test]
    fn split_at_measure_boundary() {
        let mut voice = test_voice();
        // Offset 3/4, then a half note: two tied quarters.
        voice
            .add_note(c4(Duration::dotted(BaseDuration::Half)), whole())
            .unwrap();
        voice
            .add_note(c4(Duration::plain(BaseDuration::Half)), whole())
            .unwrap();
        assert_eq!(voice.notes().len(), 3);
        assert_eq!(
            voice.notes()[1].duration,
            Duration::plain(BaseDuration::Quarter)
        );
        assert_eq!(
            voice.notes()[2].duration,
            Duration::plain(BaseDuration::Quarter)
        );
        assert_eq!(voice.ties().len(), 1);
        assert_eq!(voice.ties()[0].indices, vec![1, 2]);
        assert_eq!(voice.running_duration(), Fraction::new(5u64, 4u64));
    }

    #[test]
    fn multi_measure_overflow() {
        let mut voice = test_voice();
        voice
            .add_note(c4(Duration::dotted(BaseDuration::Half)), whole())
            .unwrap();
        // A dotted whole (3/2) from offset 3/4 spans a full middle
        // measure: fragments 1/4, 1, 1/4, all one tie group.
        voice
            .add_note(
                c4(Duration::dotted(BaseDuration::Whole)),
                whole(),
            )
            .unwrap();
        assert_eq!(voice.ties().len(), 1);
        let group = &voice.ties()[0];
        let fragments: Vec<Fraction> = group
            .indices
            .iter()
            .map(|&i| voice.notes()[i].duration.fraction())
            .collect();
        assert_eq!(
            fragments,
            vec![
                Fraction::new(1u64, 4u64),
                Fraction::new(1u64, 1u64),
                Fraction::new(1u64, 4u64),
            ]
        );
    }

    #[test]
    fn overflow_spanning_full_measures() {
        // measure = 1/4 so a whole note spans four measures from zero
        // offset plus an eighth of lead-in.
        let measure = Fraction::new(1u64, 4u64);
        let mut voice = test_voice();
        voice
            .add_note(c4(Duration::plain(BaseDuration::Eighth)), measure)
            .unwrap();
        voice
            .add_note(c4(Duration::plain(BaseDuration::Whole)), measure)
            .unwrap();
        let group = &voice.ties()[0];
        let fragments: Vec<Fraction> = group
            .indices
            .iter()
            .map(|&i| voice.notes()[i].duration.fraction())
            .collect();
        assert_eq!(
            fragments,
            vec![
                Fraction::new(1u64, 8u64),
                Fraction::new(1u64, 4u64),
                Fraction::new(1u64, 4u64),
                Fraction::new(1u64, 4u64),
                Fraction::new(1u64, 8u64),
            ]
        );
        assert_eq!(voice.ties().len(), 1);
    }

    #[test]
    fn rest_overflow_is_not_tied() {
        let mut voice = test_voice();
        voice
            .add_note(
                Note::rest(Duration::dotted(BaseDuration::Half)),
                whole(),
            )
            .unwrap();
        voice
            .add_note(
                Note::rest(Duration::plain(BaseDuration::Half)),
                whole(),
            )
            .unwrap();
        assert_eq!(voice.notes().len(), 3);
        assert!(voice.ties().is_empty());
    }

    #[test]
    fn tuplets_are_atomic() {
        let mut voice = test_voice();
        voice
            .add_note(c4(Duration::dotted(BaseDuration::Half)), whole())
            .unwrap();
        let tuplets = vec![TupletGroup {
            indices: vec![1, 2, 3],
            ratio: TupletRatio { played: 3, occupied: 2 },
            real_duration: Duration::plain(BaseDuration::Half),
        }];
        let mut notes = vec![c4(Duration::dotted(BaseDuration::Half))];
        for _ in 0..3 {
            notes.push(c4(Duration::plain(BaseDuration::Quarter)));
        }
        voice.rebuild(notes, tuplets, whole()).unwrap();
        // The triplet crosses the barline but is never split or tied.
        assert_eq!(voice.notes().len(), 4);
        assert!(voice.ties().is_empty());
        assert_eq!(
            voice.running_duration(),
            Fraction::new(5u64, 4u64)
        );
        assert_eq!(voice.rendered_tuplets()[0].indices, vec![1, 2, 3]);
    }

    #[test]
    fn rendered_tuplet_indices_shift_after_splits() {
        let mut voice = test_voice();
        let tuplets = vec![TupletGroup {
            indices: vec![2, 3, 4],
            ratio: TupletRatio { played: 3, occupied: 2 },
            real_duration: Duration::plain(BaseDuration::Half),
        }];
        let mut notes = vec![
            c4(Duration::dotted(BaseDuration::Half)),
            c4(Duration::plain(BaseDuration::Half)), // splits into two
        ];
        for _ in 0..3 {
            notes.push(c4(Duration::plain(BaseDuration::Quarter)));
        }
        voice.rebuild(notes, tuplets, whole()).unwrap();
        // Unprocessed index 1 became rendered notes 1 and 2.
        assert_eq!(voice.rendered_tuplets()[0].indices, vec![3, 4, 5]);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut voice = test_voice();
        voice
            .add_note(c4(Duration::dotted(BaseDuration::Half)), whole())
            .unwrap();
        voice
            .add_note(c4(Duration::plain(BaseDuration::Half)), whole())
            .unwrap();
        let notes = voice.unprocessed_notes().to_vec();
        let ties = voice.ties().to_vec();
        let rendered = voice.notes().to_vec();
        voice
            .rebuild(notes.clone(), voice.tuplets().to_vec(), whole())
            .unwrap();
        assert_eq!(voice.unprocessed_notes(), notes.as_slice());
        assert_eq!(voice.ties(), ties.as_slice());
        assert_eq!(voice.notes(), rendered.as_slice());
    }

    #[test]
    fn tone_events_use_unsplit_durations() {
        let mut voice = test_voice();
        voice
            .add_note(c4(Duration::dotted(BaseDuration::Half)), whole())
            .unwrap();
        voice
            .add_note(c4(Duration::plain(BaseDuration::Half)), whole())
            .unwrap();
        assert_eq!(voice.tone_events().len(), 2);
        assert_eq!(
            voice.tone_events()[1].duration,
            Fraction::new(1u64, 2u64)
        );
        assert!(matches!(
            voice.unprocessed_notes()[0].kind,
            NoteKind::Tone(_)
        ));
    }

    #[test]
    fn allowed_pitches_respect_scale_and_range() {
        let voice = test_voice();
        let allowed = voice.allowed_pitches();
        assert!(!allowed.is_empty());
        for p in &allowed {
            assert!(*p >= voice.pitch_range.0);
            assert!(*p <= voice.pitch_range.1);
            let interval = (p.class.semitone()
                - voice.key.root.semitone())
            .rem_euclid(12);
            assert!(voice.key.scale.offsets().contains(&interval));
        }
        // C major over two octaves: 7 + 7 + the top C.
        assert_eq!(allowed.len(), 15);
    }

    #[test]
    fn history_restores_through_rebuild() {
        let mut voice = test_voice();
        voice
            .add_note(c4(Duration::plain(BaseDuration::Quarter)), whole())
            .unwrap();
        voice.push_snapshot();
        let first = voice.unprocessed_notes().to_vec();
        voice
            .add_note(c4(Duration::plain(BaseDuration::Half)), whole())
            .unwrap();
        voice.push_snapshot();
        assert!(voice.navigate_history(-1, whole()).unwrap());
        assert_eq!(voice.unprocessed_notes(), first.as_slice());
        assert!(!voice.navigate_history(-1, whole()).unwrap());
        assert!(voice.navigate_history(1, whole()).unwrap());
        assert_eq!(voice.unprocessed_notes().len(), 2);
    }

    #[test]
    fn tuplet_seconds_are_compressed() {
        let mut voice = test_voice();
        let tuplets = vec![TupletGroup {
            indices: vec![0, 1, 2],
            ratio: TupletRatio { played: 3, occupied: 2 },
            real_duration: Duration::plain(BaseDuration::Half),
        }];
        let notes =
            vec![c4(Duration::plain(BaseDuration::Quarter)); 3];
        voice.rebuild(notes, tuplets, whole()).unwrap();
        // Quarter at 120 bpm is 0.5s; in a 3:2 tuplet it sounds for 1/3s.
        let seconds = voice.note_duration_seconds(0, 120.0);
        assert!((seconds - 1.0 / 3.0).abs() < 1e-9);
    }
}
