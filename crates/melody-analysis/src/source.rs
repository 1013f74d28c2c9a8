//! Boundary between stored transcriptions and the analysis core.
//!
//! A note source hands back raw rows in transcription time units; this module
//! quantizes them to atomic ticks and groups them into measures. Where the
//! rows come from is the source's business.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::note::{Measure, Note, Piece, TimeSignature};
use crate::Error;

/// One stored note row, in raw transcription time units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNote {
    pub measure_id: i64,
    /// Chromatic step id, -1 for a rest.
    pub step_id: i32,
    pub start_time: u64,
    pub duration: u64,
    pub beats: u32,
    pub beat_type: u32,
}

/// A transcription quantized to atomic ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    /// Whole piece, absolute ticks, in onset order.
    pub piece: Piece,
    /// Measures in id order, note starts relative to each measure's first onset.
    pub measures: Vec<Measure>,
}

impl Transcription {
    /// Quantize raw rows. `atomic_time` is the raw length of one tick.
    pub fn from_rows(mut rows: Vec<RawNote>, atomic_time: u32) -> crate::Result<Self> {
        if atomic_time == 0 {
            return Err(Error::InvalidInput("atomic time must be positive".into()));
        }
        let atomic_time = atomic_time as u64;
        rows.sort_by_key(|row| row.start_time);

        let mut notes = Vec::with_capacity(rows.len());
        let mut signatures = Vec::with_capacity(rows.len());
        let mut by_measure: BTreeMap<i64, Vec<&RawNote>> = BTreeMap::new();

        for row in &rows {
            let signature = TimeSignature::new(row.beats, row.beat_type);
            let note = Note::from_step_id(
                row.step_id,
                to_ticks(row.start_time / atomic_time)?,
                to_ticks(row.duration / atomic_time)?,
            );
            note.end_tick()?;
            notes.push(note);
            signatures.push(signature);
            by_measure.entry(row.measure_id).or_default().push(row);
        }

        let mut measures = Vec::with_capacity(by_measure.len());
        for (measure_id, rows) in by_measure {
            let first = rows[0];
            let signature = TimeSignature::new(first.beats, first.beat_type);
            if let Some(odd) = rows
                .iter()
                .find(|r| TimeSignature::new(r.beats, r.beat_type) != signature)
            {
                return Err(Error::InvalidInput(format!(
                    "measure {measure_id} mixes {signature} and {}/{}",
                    odd.beats, odd.beat_type
                )));
            }

            let origin = first.start_time;
            let notes = rows
                .iter()
                .map(|r| -> crate::Result<Note> {
                    Ok(Note::from_step_id(
                        r.step_id,
                        to_ticks((r.start_time - origin) / atomic_time)?,
                        to_ticks(r.duration / atomic_time)?,
                    ))
                })
                .collect::<crate::Result<Vec<_>>>()?;
            measures.push(Measure::new(signature, notes));
        }

        Ok(Self {
            piece: Piece::new(notes, signatures)?,
            measures,
        })
    }
}

fn to_ticks(ticks: u64) -> crate::Result<u32> {
    u32::try_from(ticks).map_err(|_| Error::InvalidInput(format!("{ticks} ticks out of range")))
}

/// Supplies the raw rows of a stored piece.
pub trait NoteSource {
    fn fetch(&self, piece_id: &str) -> Result<Vec<RawNote>>;
}

/// Reads `{dir}/{piece_id}.json`, a JSON array of [`RawNote`] rows.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl NoteSource for JsonFileSource {
    fn fetch(&self, piece_id: &str) -> Result<Vec<RawNote>> {
        let path = self.dir.join(format!("{piece_id}.json"));
        info!(path = %path.display(), "reading transcription");

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading transcription: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing transcription: {}", path.display()))
    }
}
