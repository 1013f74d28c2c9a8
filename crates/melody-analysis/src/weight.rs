use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::meter::MeterProfile;
use crate::note::Note;
use crate::{Error, Result};

/// Accumulated metrical weight per step. Absent steps weigh zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightProfile {
    weights: BTreeMap<i32, f64>,
}

impl WeightProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, step: i32) -> f64 {
        self.weights.get(&step).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, step: i32, weight: f64) {
        *self.weights.entry(step).or_insert(0.0) += weight;
    }

    /// Sum another profile into this one, e.g. to score a multi-measure window.
    pub fn absorb(&mut self, other: &WeightProfile) {
        for (&step, &weight) in &other.weights {
            self.add(step, weight);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Lowest and highest active step.
    pub fn range(&self) -> Option<(i32, i32)> {
        let min = *self.weights.keys().next()?;
        let max = *self.weights.keys().next_back()?;
        Some((min, max))
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.weights.iter().map(|(&step, &weight)| (step, weight))
    }
}

impl FromIterator<(i32, f64)> for WeightProfile {
    fn from_iter<I: IntoIterator<Item = (i32, f64)>>(iter: I) -> Self {
        let mut profile = Self::new();
        for (step, weight) in iter {
            profile.add(step, weight);
        }
        profile
    }
}

/// Spread a measure's per-tick weight over the steps sounding at each tick.
///
/// A tick's weight is split evenly across the distinct steps sounding there;
/// silent ticks contribute nothing. Notes must lie inside the measure.
pub fn accumulate(notes: &[Note], meter: &MeterProfile) -> Result<WeightProfile> {
    let ticks = meter.ticks();
    let mut sounding: Vec<Vec<i32>> = vec![Vec::new(); ticks];

    for note in notes {
        let Some(step) = note.step else {
            continue;
        };
        let end = note.end_tick()?;
        if end as usize > ticks {
            return Err(Error::InvalidInput(format!(
                "note {step} at {}+{} runs past the {}-tick measure of {}",
                note.start_tick,
                note.duration,
                ticks,
                meter.signature()
            )));
        }
        for tick in note.start_tick..end {
            let steps = &mut sounding[tick as usize];
            if !steps.contains(&step) {
                steps.push(step);
            }
        }
    }

    let mut profile = WeightProfile::new();
    for (weight, steps) in meter.weights().iter().zip(&sounding) {
        if steps.is_empty() {
            continue;
        }
        let share = weight / steps.len() as f64;
        for &step in steps {
            profile.add(step, share);
        }
    }

    Ok(profile)
}
