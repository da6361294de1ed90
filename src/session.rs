//! The top-level composition state.
//!
//! A [`Session`] owns the global configuration, the four melodic voices,
//! the separate harmony voice, the selection set and the clipboard.
//! Every mutation goes through [`Session::apply`], which runs one
//! [`Operator`] over the selected voices and records a history snapshot
//! per touched voice.

use fraction::Fraction;
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::generate::{generate_harmony, generate_phrase};
use crate::primitives::{
    BaseDuration, Duration, Key, Note, Pitch, PitchClass, Scale,
};
use crate::transform;
use crate::voice::{TupletGroup, Voice};

/// A time signature. `measure_length` and `beat_unit` are exact
/// fractions of a whole note, so a 7/8 measure is exactly 7/8.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct TimeSignature {
    pub top: u64,
    pub bottom: u64,
}

impl TimeSignature {
    pub fn new(top: u64, bottom: u64) -> Self {
        Self { top, bottom }
    }

    pub fn measure_length(&self) -> Fraction {
        Fraction::new(self.top, self.bottom)
    }

    pub fn beat_unit(&self) -> Fraction {
        Fraction::new(1u64, self.bottom)
    }
}

/// Pitch-picking mode for generation: free within the scale, or
/// narrowed to the harmony chord sounding at each offset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum Mode {
    Standard,
    Harmony,
}

/// Global settings shared by all voices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub time_signature: TimeSignature,
    pub num_measures: u64,
    pub mode: Mode,
    /// Quarter notes per minute.
    pub tempo: f64,
    pub allow_tuplets: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_signature: TimeSignature::new(4, 4),
            num_measures: 1,
            mode: Mode::Standard,
            tempo: 120.0,
            allow_tuplets: true,
        }
    }
}

impl Config {
    pub fn measure_length(&self) -> Fraction {
        self.time_signature.measure_length()
    }

    /// The duration every generated stream must fill exactly.
    pub fn target_duration(&self) -> Fraction {
        self.measure_length() * Fraction::new(self.num_measures, 1u64)
    }
}

/// One named operation over the selected voices.
#[derive(
    Debug, Clone, Copy, PartialEq, Serialize, Deserialize,
)]
pub enum Operator {
    Generate,
    Reverse,
    Reflect(PitchClass),
    Shift(Duration),
    Transpose(i32),
    ShuffleRhythm,
    ShuffleNotes,
    ShufflePitch,
    ChangeRhythm,
    ChangePitch,
    Simplify,
    Complicate,
    SeparateVoice,
    GenerateHarmony,
}

/// A copied voice content: the unprocessed stream plus its tuplet
/// table, enough to rebuild any voice identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clipboard {
    pub notes: Vec<Note>,
    pub tuplets: Vec<TupletGroup>,
}

/// Per-voice settings the interface layer writes in one piece.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub pitch_range: (Pitch, Pitch),
    pub rhythm_range: (Duration, Duration),
    pub key: Key,
    pub muted: bool,
}

/// One playback step for an exporter: sounding pitches (None for a
/// rest) and the real sounding time at the session tempo.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackNote {
    pub pitches: Option<Vec<Pitch>>,
    pub seconds: f64,
}

pub struct Session {
    pub config: Config,
    voices: Vec<Voice>,
    harmony: Voice,
    selected: Vec<usize>,
    clipboard: Option<Clipboard>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let key = Key::new(PitchClass::C, Scale::Major);
        let rhythms = (
            Duration::plain(BaseDuration::Sixteenth),
            Duration::plain(BaseDuration::Whole),
        );
        let range = |low: (PitchClass, i32), high: (PitchClass, i32)| {
            (Pitch::new(low.0, low.1), Pitch::new(high.0, high.1))
        };
        let mut voices = vec![
            Voice::new(
                "upper",
                range((PitchClass::C, 4), (PitchClass::C, 6)),
                rhythms,
                key,
            ),
            Voice::new(
                "middle",
                range((PitchClass::A, 3), (PitchClass::F, 5)),
                rhythms,
                key,
            ),
            Voice::new(
                "lower",
                range((PitchClass::E, 2), (PitchClass::C, 4)),
                rhythms,
                key,
            ),
            Voice::new(
                "fourth",
                range((PitchClass::D, 3), (PitchClass::B, 5)),
                rhythms,
                key,
            ),
        ];
        let mut harmony = Voice::new(
            "harmony",
            range((PitchClass::E, 3), (PitchClass::E, 6)),
            rhythms,
            key,
        );
        // The empty state is undo-reachable.
        for voice in voices.iter_mut() {
            voice.push_snapshot();
        }
        harmony.push_snapshot();

        Self {
            config: Config::default(),
            voices,
            harmony,
            selected: vec![0],
            clipboard: None,
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voice_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.voices.get_mut(index)
    }

    pub fn harmony_voice(&self) -> &Voice {
        &self.harmony
    }

    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Replace the selection. Out-of-range indices and duplicates are
    /// dropped; an empty result leaves the selection unchanged.
    pub fn select(&mut self, indices: &[usize]) {
        let mut next: Vec<usize> = Vec::new();
        for &i in indices {
            if i < self.voices.len() && !next.contains(&i) {
                next.push(i);
            }
        }
        if !next.is_empty() {
            self.selected = next;
        }
    }

    /// Run one operator over the selection and snapshot every voice it
    /// touched. A voice whose generation target is unreachable is
    /// logged and skipped; every other error aborts the whole apply.
    pub fn apply(
        &mut self,
        op: Operator,
        rng: &mut impl Rng,
    ) -> Result<(), Error> {
        let measure = self.config.measure_length();
        let target = self.config.target_duration();
        let zero = Fraction::from(0.0);
        let harmony = match self.config.mode {
            Mode::Harmony => Some(&self.harmony),
            Mode::Standard => None,
        };

        match op {
            Operator::Generate => {
                for &v in &self.selected {
                    match generate_phrase(
                        &self.voices[v],
                        &self.config,
                        harmony,
                        target,
                        self.config.allow_tuplets,
                        zero,
                        rng,
                    ) {
                        Ok(phrase) => {
                            self.voices[v].rebuild(
                                phrase.notes,
                                phrase.tuplets,
                                measure,
                            )?;
                            self.voices[v].push_snapshot();
                        }
                        Err(Error::TargetUnreachable(t)) => {
                            warn!(
                                "voice {}: cannot fill {}, skipped",
                                self.voices[v].name, t
                            );
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            Operator::Reverse => {
                for &v in &self.selected {
                    transform::reverse(&mut self.voices[v], measure)?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::Reflect(axis) => {
                for &v in &self.selected {
                    transform::reflect(
                        &mut self.voices[v],
                        axis,
                        measure,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::Shift(distance) => {
                for &v in &self.selected {
                    transform::shift(
                        &mut self.voices[v],
                        distance,
                        measure,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::Transpose(degrees) => {
                for &v in &self.selected {
                    transform::transpose(
                        &mut self.voices[v],
                        degrees,
                        measure,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::ShuffleRhythm => {
                for &v in &self.selected {
                    transform::shuffle_rhythm(
                        &mut self.voices[v],
                        measure,
                        rng,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::ShuffleNotes => {
                for &v in &self.selected {
                    transform::shuffle_notes(
                        &mut self.voices[v],
                        measure,
                        rng,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::ShufflePitch => {
                for &v in &self.selected {
                    transform::shuffle_pitch(
                        &mut self.voices[v],
                        measure,
                        rng,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::ChangeRhythm => {
                for &v in &self.selected {
                    transform::change_rhythm(
                        &mut self.voices[v],
                        measure,
                        rng,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::ChangePitch => {
                for &v in &self.selected {
                    transform::change_pitch(
                        &mut self.voices[v],
                        measure,
                        rng,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::Simplify => {
                for &v in &self.selected {
                    transform::simplify(
                        &mut self.voices[v],
                        measure,
                        rng,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::Complicate => {
                for &v in &self.selected {
                    transform::complicate(
                        &mut self.voices[v],
                        &self.config,
                        harmony,
                        measure,
                        rng,
                    )?;
                    self.voices[v].push_snapshot();
                }
            }
            Operator::SeparateVoice => {
                let source = self.selected[0];
                let had_notes = !self.voices[source]
                    .unprocessed_notes()
                    .is_empty();
                transform::separate_voice(
                    &mut self.voices,
                    source,
                    measure,
                    rng,
                )?;
                if had_notes {
                    for voice in self.voices.iter_mut() {
                        voice.push_snapshot();
                    }
                }
            }
            Operator::GenerateHarmony => {
                match generate_harmony(&self.config, rng) {
                    Ok(notes) => {
                        self.harmony.rebuild(
                            notes,
                            Vec::new(),
                            measure,
                        )?;
                        self.harmony.push_snapshot();
                    }
                    Err(Error::TargetUnreachable(t)) => {
                        warn!("harmony: cannot fill {}, skipped", t);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Overwrite one voice's settings. Existing content is untouched;
    /// the new ranges and scale only constrain future operators.
    pub fn configure_voice(&mut self, index: usize, config: VoiceConfig) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.pitch_range = config.pitch_range;
            voice.rhythm_range = config.rhythm_range;
            voice.key = config.key;
            voice.muted = config.muted;
        }
    }

    /// Copy the first selected voice's content to the clipboard.
    pub fn copy(&mut self) {
        let Some(&source) = self.selected.first() else {
            return;
        };
        let voice = &self.voices[source];
        self.clipboard = Some(Clipboard {
            notes: voice.unprocessed_notes().to_vec(),
            tuplets: voice.tuplets().to_vec(),
        });
    }

    /// Rebuild every selected voice from the clipboard. A no-op when
    /// nothing was copied.
    pub fn paste(&mut self) -> Result<(), Error> {
        let Some(clipboard) = self.clipboard.clone() else {
            return Ok(());
        };
        let measure = self.config.measure_length();
        for &v in &self.selected {
            self.voices[v].rebuild(
                clipboard.notes.clone(),
                clipboard.tuplets.clone(),
                measure,
            )?;
            self.voices[v].push_snapshot();
        }
        Ok(())
    }

    /// Step every selected voice through its history. Returns whether
    /// any voice actually moved.
    pub fn navigate_history(
        &mut self,
        delta: i32,
    ) -> Result<bool, Error> {
        let measure = self.config.measure_length();
        let mut moved = false;
        for &v in &self.selected {
            moved |= self.voices[v].navigate_history(delta, measure)?;
        }
        Ok(moved)
    }

    /// The playback step list for one voice at the session tempo.
    /// A muted or unknown voice yields no steps.
    pub fn playback(&self, index: usize) -> Vec<PlaybackNote> {
        let Some(voice) = self.voices.get(index) else {
            return Vec::new();
        };
        if voice.muted {
            return Vec::new();
        }
        voice
            .tone_events()
            .iter()
            .map(|event| PlaybackNote {
                pitches: event.pitches.clone(),
                seconds: crate::primitives::duration::to_f64(
                    event.duration,
                ) * 4.0
                    * 60.0
                    / self.config.tempo,
            })
            .collect()
    }
}
