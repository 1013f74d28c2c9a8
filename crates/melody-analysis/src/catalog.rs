use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Semitones in an octave; a rotation lifts the lowest tone by this much.
const OCTAVE: i32 = 12;

/// Configured chord quality: a name and its intervals above the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSpec {
    pub name: String,
    pub intervals: Vec<i32>,
}

impl ChordSpec {
    pub fn new(name: impl Into<String>, intervals: &[i32]) -> Self {
        Self {
            name: name.into(),
            intervals: intervals.to_vec(),
        }
    }
}

/// One inversion of a chord: which tone is the bass and the rotated,
/// renormalized intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transposition {
    pub inversion: usize,
    pub intervals: Vec<i32>,
}

impl Transposition {
    /// Largest interval, i.e. the span of the voicing.
    pub fn span(&self) -> i32 {
        self.intervals.last().copied().unwrap_or(0)
    }

    /// Interval at which the root of the root-position chord now sits.
    pub fn root_interval(&self) -> i32 {
        let n = self.intervals.len();
        if n == 0 {
            return 0;
        }
        self.intervals[(n - self.inversion % n) % n]
    }
}

/// A chord quality with its normalized intervals and surviving inversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordTemplate {
    pub name: String,
    pub intervals: Vec<i32>,
    pub transpositions: Vec<Transposition>,
}

impl ChordTemplate {
    pub fn tone_count(&self) -> usize {
        self.intervals.len()
    }
}

/// All chord templates in configuration order.
///
/// No two transpositions anywhere in the catalog share an interval set:
/// symmetric shapes (augmented triad, diminished seventh) keep only the first
/// rotation that produced them, even across chord names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    templates: Vec<ChordTemplate>,
}

impl Catalog {
    pub fn build(specs: &[ChordSpec]) -> Result<Self> {
        let mut seen: HashSet<Vec<i32>> = HashSet::new();
        let mut templates = Vec::with_capacity(specs.len());

        for spec in specs {
            if spec.intervals.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "chord '{}' has no intervals",
                    spec.name
                )));
            }

            let mut order = spec.intervals.clone();
            order.sort_unstable();
            let order = normalize(order);

            let mut transpositions = Vec::new();
            let mut rotated = order.clone();
            for inversion in 0..order.len() {
                if seen.insert(rotated.clone()) {
                    transpositions.push(Transposition {
                        inversion,
                        intervals: rotated.clone(),
                    });
                }
                rotated = rotate(&rotated);
            }

            templates.push(ChordTemplate {
                name: spec.name.clone(),
                intervals: order,
                transpositions,
            });
        }

        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[ChordTemplate] {
        &self.templates
    }

    pub fn get(&self, name: &str) -> Option<&ChordTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn transposition_count(&self) -> usize {
        self.templates.iter().map(|t| t.transpositions.len()).sum()
    }
}

/// Shift so the lowest interval is 0. Input must be ascending.
fn normalize(mut order: Vec<i32>) -> Vec<i32> {
    if let Some(&min) = order.first() {
        for interval in &mut order {
            *interval -= min;
        }
    }
    order
}

/// Next inversion: lift the bass an octave and renormalize.
fn rotate(order: &[i32]) -> Vec<i32> {
    let Some((&bass, rest)) = order.split_first() else {
        return Vec::new();
    };
    let mut next = rest.to_vec();
    next.push(bass + OCTAVE);
    normalize(next)
}
