use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cluster::Part;
use crate::note::TimeSignature;
use crate::rules::MergeRule;
use crate::scoring::Assumption;
use crate::source::{NoteSource, Transcription};
use crate::{Registry, Result};

/// Ranked chord hypotheses for one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureChords {
    pub signature: TimeSignature,
    pub chords: Vec<Assumption>,
}

impl MeasureChords {
    pub fn best(&self) -> Option<&Assumption> {
        self.chords.first()
    }
}

/// Chords per measure plus the part segmentation of a whole piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceAnalysis {
    pub measures: Vec<MeasureChords>,
    pub parts: Vec<Part>,
}

/// Score every measure and segment the piece.
pub fn analyze<R>(registry: &Registry, transcription: &Transcription, rule: &R) -> Result<PieceAnalysis>
where
    R: MergeRule + ?Sized,
{
    let measures = transcription
        .measures
        .iter()
        .map(|measure| -> Result<MeasureChords> {
            Ok(MeasureChords {
                signature: measure.signature,
                chords: registry.rank_measure(measure)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let parts = registry.segment(&transcription.piece, rule)?;

    Ok(PieceAnalysis { measures, parts })
}

/// Fetch a piece from a note source, quantize it, and analyze it.
pub fn analyze_source<S, R>(
    registry: &Registry,
    source: &S,
    piece_id: &str,
    rule: &R,
) -> anyhow::Result<PieceAnalysis>
where
    S: NoteSource + ?Sized,
    R: MergeRule + ?Sized,
{
    let rows = source.fetch(piece_id)?;
    let transcription = Transcription::from_rows(rows, registry.atomic_time())
        .with_context(|| format!("quantizing piece {piece_id}"))?;

    let analysis = analyze(registry, &transcription, rule)
        .with_context(|| format!("analyzing piece {piece_id}"))?;

    info!(
        piece = piece_id,
        measures = analysis.measures.len(),
        parts = analysis.parts.len(),
        "analyzed piece"
    );
    Ok(analysis)
}
