//! Analysis configuration: chord qualities, metrical profiles, clustering.
//!
//! Every field has a compiled default, so an empty TOML file (or none at all)
//! yields the stock setup. Example:
//!
//! ```toml
//! grid_resolution = 32
//! whole_note_time = 26880
//!
//! [[chords]]
//! name = "maj3"
//! intervals = [0, 4, 7]
//!
//! [[signatures]]
//! beats = 6
//! beat_unit = 8
//! groups = [[0.6, 0.4], [0.45, 0.3, 0.25]]
//!
//! [[subdivisions]]
//! beat_unit = 8
//! groups = [[0.4, 0.2, 0.3, 0.1]]
//!
//! [cluster]
//! max_threshold = 32
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ChordSpec;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Per-beat stress for one time signature.
///
/// `groups` are combined by outer product, so a compound meter is written as
/// stress-per-group times stress-per-subgroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureProfile {
    pub beats: u32,
    pub beat_unit: u32,
    pub groups: Vec<Vec<f64>>,
}

/// Stress of the grid ticks inside one beat of the given unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdivisionProfile {
    pub beat_unit: u32,
    pub groups: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Largest merge distance in ticks; thresholds double from 1 up to this.
    /// Default: 32 (one whole note)
    #[serde(default = "ClusterConfig::default_max_threshold")]
    pub max_threshold: u32,

    /// Allowed merged length per distance bucket, longest first.
    /// Default: 32, 30, ..., 2
    #[serde(default = "ClusterConfig::default_tolerance")]
    pub tolerance: Vec<u32>,
}

impl ClusterConfig {
    fn default_max_threshold() -> u32 {
        32
    }

    fn default_tolerance() -> Vec<u32> {
        (1..=16).rev().map(|l| l * 2).collect()
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_threshold: Self::default_max_threshold(),
            tolerance: Self::default_tolerance(),
        }
    }
}

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Atomic ticks per whole note; every beat unit must divide it.
    /// Default: 32
    #[serde(default = "AnalysisConfig::default_grid_resolution")]
    pub grid_resolution: u32,

    /// Raw transcription time units per whole note.
    /// Default: 26880
    #[serde(default = "AnalysisConfig::default_whole_note_time")]
    pub whole_note_time: u32,

    #[serde(default = "default_chords")]
    pub chords: Vec<ChordSpec>,

    #[serde(default = "default_signatures")]
    pub signatures: Vec<SignatureProfile>,

    #[serde(default = "default_subdivisions")]
    pub subdivisions: Vec<SubdivisionProfile>,

    #[serde(default)]
    pub cluster: ClusterConfig,
}

impl AnalysisConfig {
    fn default_grid_resolution() -> u32 {
        32
    }

    fn default_whole_note_time() -> u32 {
        26880
    }

    /// Raw time units per atomic tick.
    pub fn atomic_time(&self) -> u32 {
        self.whole_note_time / self.grid_resolution.max(1)
    }

    /// Parse from a TOML string; missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            grid_resolution: Self::default_grid_resolution(),
            whole_note_time: Self::default_whole_note_time(),
            chords: default_chords(),
            signatures: default_signatures(),
            subdivisions: default_subdivisions(),
            cluster: ClusterConfig::default(),
        }
    }
}

const WEIGHT_1: &[f64] = &[1.0];
const WEIGHT_2: &[f64] = &[0.6, 0.4];
const WEIGHT_3: &[f64] = &[0.45, 0.3, 0.25];
const WEIGHT_4: &[f64] = &[0.4, 0.2, 0.3, 0.1];

/// Triads only: major, minor, augmented, diminished.
pub fn default_chords() -> Vec<ChordSpec> {
    vec![
        ChordSpec::new("maj3", &[0, 4, 7]),
        ChordSpec::new("min3", &[0, 3, 7]),
        ChordSpec::new("aug3", &[0, 4, 8]),
        ChordSpec::new("dim3", &[0, 3, 6]),
    ]
}

pub fn default_signatures() -> Vec<SignatureProfile> {
    fn sig(beats: u32, beat_unit: u32, groups: &[&[f64]]) -> SignatureProfile {
        SignatureProfile {
            beats,
            beat_unit,
            groups: groups.iter().map(|g| g.to_vec()).collect(),
        }
    }

    vec![
        sig(1, 4, &[WEIGHT_1]),
        sig(4, 4, &[WEIGHT_4]),
        sig(3, 4, &[WEIGHT_3]),
        sig(2, 4, &[WEIGHT_2]),
        sig(3, 8, &[WEIGHT_3]),
        sig(6, 8, &[WEIGHT_2, WEIGHT_3]),
    ]
}

/// Quarter beats split into eight 32nds, eighth beats into four.
pub fn default_subdivisions() -> Vec<SubdivisionProfile> {
    vec![
        SubdivisionProfile {
            beat_unit: 4,
            groups: vec![WEIGHT_4.to_vec(), WEIGHT_2.to_vec()],
        },
        SubdivisionProfile {
            beat_unit: 8,
            groups: vec![WEIGHT_4.to_vec()],
        },
    ]
}
