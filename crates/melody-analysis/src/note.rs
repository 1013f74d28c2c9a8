use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Step id used by transcriptions to mark a rest.
pub const REST_STEP: i32 = -1;

/// Step names starting from step 1 (A0), one octave.
const STEP_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Index into `STEP_NAMES` where the octave number increments.
const OCTAVE_BREAK: i32 = 3;

/// A time signature: `beats` beats of `beat_unit` notes per measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: u32,
    pub beat_unit: u32,
}

impl TimeSignature {
    pub const fn new(beats: u32, beat_unit: u32) -> Self {
        Self { beats, beat_unit }
    }

    /// Ticks per measure on a grid of `grid_resolution` ticks per whole note.
    pub fn ticks(&self, grid_resolution: u32) -> Option<u32> {
        if self.beat_unit == 0 || grid_resolution % self.beat_unit != 0 {
            return None;
        }
        Some(self.beats * (grid_resolution / self.beat_unit))
    }

    /// Measure length as a fraction of a whole note.
    pub fn ratio(&self) -> f64 {
        self.beats as f64 / self.beat_unit as f64
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_unit)
    }
}

impl FromStr for TimeSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (beats, unit) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("time signature '{s}' has no '/'")))?;
        let beats = beats
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("bad beat count in '{s}'")))?;
        let beat_unit = unit
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("bad beat unit in '{s}'")))?;
        Ok(Self { beats, beat_unit })
    }
}

/// A single note (or rest) on the atomic tick grid.
///
/// Ticks are relative to the owning measure when the note sits in a
/// [`Measure`], and absolute when it sits in a [`Piece`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Chromatic step id (1 = A0), `None` for a rest.
    pub step: Option<i32>,
    pub start_tick: u32,
    pub duration: u32,
}

impl Note {
    pub fn new(step: i32, start_tick: u32, duration: u32) -> Self {
        Self {
            step: Some(step),
            start_tick,
            duration,
        }
    }

    pub fn rest(start_tick: u32, duration: u32) -> Self {
        Self {
            step: None,
            start_tick,
            duration,
        }
    }

    /// Build from a transcription step id, mapping the rest sentinel to `None`.
    pub fn from_step_id(step_id: i32, start_tick: u32, duration: u32) -> Self {
        Self {
            step: (step_id != REST_STEP).then_some(step_id),
            start_tick,
            duration,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.step.is_none()
    }

    /// One past the last tick this note covers.
    pub fn end_tick(&self) -> Result<u32> {
        self.start_tick.checked_add(self.duration).ok_or_else(|| {
            Error::InvalidInput(format!(
                "note at {}+{} ends past the tick range",
                self.start_tick, self.duration
            ))
        })
    }

    pub fn sounds_at(&self, tick: u32) -> bool {
        tick >= self.start_tick && tick - self.start_tick < self.duration
    }
}

/// One metered measure with its measure-relative notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub signature: TimeSignature,
    pub notes: Vec<Note>,
}

impl Measure {
    pub fn new(signature: TimeSignature, notes: Vec<Note>) -> Self {
        Self { signature, notes }
    }
}

/// The full note sequence of a piece in absolute ticks.
///
/// Every note carries the signature of the measure it came from, so merge
/// rules can compare meters without going back to the measures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Piece {
    notes: Vec<Note>,
    signatures: Vec<TimeSignature>,
}

impl Piece {
    pub fn new(notes: Vec<Note>, signatures: Vec<TimeSignature>) -> Result<Self> {
        if notes.len() != signatures.len() {
            return Err(Error::InvalidInput(format!(
                "{} notes but {} signatures",
                notes.len(),
                signatures.len()
            )));
        }
        Ok(Self { notes, signatures })
    }

    /// A piece whose notes all share one signature.
    pub fn uniform(notes: Vec<Note>, signature: TimeSignature) -> Self {
        let signatures = vec![signature; notes.len()];
        Self { notes, signatures }
    }

    /// Lay measures end to end, shifting each measure's notes by the ticks
    /// of all measures before it.
    pub fn from_measures(measures: &[Measure], grid_resolution: u32) -> Result<Self> {
        let mut notes = Vec::new();
        let mut signatures = Vec::new();
        let mut offset = 0u32;

        for measure in measures {
            let length = measure
                .signature
                .ticks(grid_resolution)
                .ok_or(Error::UnknownSignature(measure.signature))?;
            for note in &measure.notes {
                let shifted = Note {
                    start_tick: note.start_tick.checked_add(offset).ok_or_else(|| {
                        Error::InvalidInput(format!("note start overflows at offset {offset}"))
                    })?,
                    ..*note
                };
                shifted.end_tick()?;
                notes.push(shifted);
                signatures.push(measure.signature);
            }
            offset = offset.checked_add(length).ok_or_else(|| {
                Error::InvalidInput(format!("piece longer than {} ticks", u32::MAX))
            })?;
        }

        Ok(Self { notes, signatures })
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn note(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    pub fn signature(&self, index: usize) -> Option<TimeSignature> {
        self.signatures.get(index).copied()
    }
}

/// Human-readable name of a step: "R" for rests, otherwise name plus octave.
pub fn step_name(step: Option<i32>) -> String {
    let Some(step) = step else {
        return "R".to_string();
    };
    let index = (step - 1).rem_euclid(12);
    let mut octave = (step - 1).div_euclid(12);
    if index >= OCTAVE_BREAK {
        octave += 1;
    }
    format!("{}{}", STEP_NAMES[index as usize], octave)
}
