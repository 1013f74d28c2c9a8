//! Chord inference and part segmentation for transcribed melodies.
//!
//! Two engines share one immutable [`Registry`]:
//!
//! - chord ranking: a measure's notes are weighted by metrical stress
//!   ([`meter`], [`weight`]) and every chord inversion of the [`catalog`] is
//!   slid across the resulting profile ([`scoring`]);
//! - segmentation: the note sequence is merged into parts over passes of
//!   doubling distance, governed by a pluggable [`MergeRule`] ([`cluster`]).
//!
//! ```
//! use melody_analysis::{AnalysisConfig, Measure, Note, Registry, TimeSignature};
//!
//! let registry = Registry::new(&AnalysisConfig::default()).unwrap();
//! let measure = Measure::new(
//!     TimeSignature::new(4, 4),
//!     vec![Note::new(40, 0, 32), Note::new(44, 0, 32), Note::new(47, 0, 32)],
//! );
//! let ranked = registry.rank_measure(&measure).unwrap();
//! assert_eq!(ranked[0].chord, "maj3");
//! assert_eq!(ranked[0].root, 40);
//! ```

pub mod analysis;
pub mod catalog;
pub mod cluster;
pub mod config;
pub mod meter;
pub mod note;
pub mod rules;
pub mod scoring;
pub mod source;
pub mod weight;

pub use analysis::{analyze, analyze_source, MeasureChords, PieceAnalysis};
pub use catalog::{Catalog, ChordSpec, ChordTemplate, Transposition};
pub use cluster::{atomic_parts, cluster, Part};
pub use config::{AnalysisConfig, ClusterConfig, ConfigError};
pub use meter::{combine_weights, MeterProfile, WeightModel};
pub use note::{step_name, Measure, Note, Piece, TimeSignature, REST_STEP};
pub use rules::{Always, MergeRule, Never, ToleranceRule};
pub use scoring::{rank_chords, Assumption};
pub use source::{JsonFileSource, NoteSource, RawNote, Transcription};
pub use weight::{accumulate, WeightProfile};

use std::ops::Range;

use tracing::info;

/// Errors from analysis operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no metrical profile for {0}")]
    UnknownSignature(TimeSignature),

    #[error("parts overlap in time: notes {earlier:?} and {later:?}")]
    OverlapViolation {
        earlier: Range<usize>,
        later: Range<usize>,
    },

    #[error("parts are not adjacent: left ends at {left_end}, right starts at {right_start}")]
    NonContiguous { left_end: usize, right_start: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Chord catalog and metrical model, built once and shared read-only.
///
/// Construct during startup and pass by reference; nothing in it changes
/// afterwards, so one registry can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Registry {
    catalog: Catalog,
    model: WeightModel,
    cluster: ClusterConfig,
    tolerance: ToleranceRule,
    atomic_time: u32,
}

impl Registry {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let catalog = Catalog::build(&config.chords)?;
        let model = WeightModel::build(
            config.grid_resolution,
            &config.signatures,
            &config.subdivisions,
        )?;
        let tolerance = ToleranceRule::from_config(&config.cluster, config.grid_resolution)?;

        info!(
            chords = catalog.len(),
            transpositions = catalog.transposition_count(),
            signatures = model.len(),
            grid = config.grid_resolution,
            "built analysis registry"
        );

        Ok(Self {
            catalog,
            model,
            cluster: config.cluster.clone(),
            tolerance,
            atomic_time: config.atomic_time(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn weight_model(&self) -> &WeightModel {
        &self.model
    }

    pub fn grid_resolution(&self) -> u32 {
        self.model.grid_resolution()
    }

    /// Raw transcription units per atomic tick.
    pub fn atomic_time(&self) -> u32 {
        self.atomic_time
    }

    /// Metrical weight of each step sounding in the measure.
    pub fn measure_weights(&self, measure: &Measure) -> Result<WeightProfile> {
        let meter = self.model.profile(measure.signature)?;
        accumulate(&measure.notes, meter)
    }

    pub fn rank(&self, profile: &WeightProfile) -> Vec<Assumption> {
        rank_chords(profile, &self.catalog)
    }

    pub fn rank_measure(&self, measure: &Measure) -> Result<Vec<Assumption>> {
        Ok(self.rank(&self.measure_weights(measure)?))
    }

    /// Rank chords over several measures treated as one window.
    pub fn rank_window(&self, measures: &[Measure]) -> Result<Vec<Assumption>> {
        let mut window = WeightProfile::new();
        for measure in measures {
            window.absorb(&self.measure_weights(measure)?);
        }
        Ok(self.rank(&window))
    }

    /// Partition a piece into parts, up to the configured merge distance.
    pub fn segment<R>(&self, piece: &Piece, rule: &R) -> Result<Vec<Part>>
    where
        R: MergeRule + ?Sized,
    {
        cluster(piece, rule, self.cluster.max_threshold)
    }

    /// The configured tolerance-table rule.
    pub fn tolerance_rule(&self) -> ToleranceRule {
        self.tolerance.clone()
    }
}
