use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::note::step_name;
use crate::weight::WeightProfile;

/// A scored chord hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
    pub chord: String,
    /// Absolute step of the chord's root.
    pub root: i32,
    pub weight: f64,
    /// Inversion indices that produced this same root and weight.
    pub inversions: Vec<usize>,
}

impl fmt::Display for Assumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({:.3}, inversions {:?})",
            step_name(Some(self.root)),
            self.chord,
            self.weight,
            self.inversions
        )
    }
}

/// Rank every chord and inversion placement against a weight profile.
///
/// Each transposition is slid across the profile's active range; a placement
/// scores the sum of the profile at its tones. Placements of the same chord
/// that agree on root and weight collapse into one assumption listing each
/// contributing inversion. Results are sorted heaviest first; ties keep
/// discovery order. An empty profile yields no assumptions.
pub fn rank_chords(profile: &WeightProfile, catalog: &Catalog) -> Vec<Assumption> {
    let Some((min_step, max_step)) = profile.range() else {
        return Vec::new();
    };

    let mut ranked: Vec<Assumption> = Vec::new();

    for template in catalog.templates() {
        let mut merged: HashMap<(i32, u64), usize> = HashMap::new();

        for transposition in &template.transpositions {
            let root_interval = transposition.root_interval();

            for offset in (min_step - transposition.span())..=max_step {
                let weight: f64 = transposition
                    .intervals
                    .iter()
                    .map(|interval| profile.get(offset + interval))
                    .sum();
                if weight <= 0.0 {
                    continue;
                }

                let root = offset + root_interval;
                let index = *merged.entry((root, weight.to_bits())).or_insert_with(|| {
                    ranked.push(Assumption {
                        chord: template.name.clone(),
                        root,
                        weight,
                        inversions: Vec::new(),
                    });
                    ranked.len() - 1
                });
                ranked[index].inversions.push(transposition.inversion);
            }
        }
    }

    ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    ranked
}
