use std::collections::BTreeMap;

use crate::config::{SignatureProfile, SubdivisionProfile};
use crate::note::TimeSignature;
use crate::{Error, Result};

/// Combine stress profiles by outer product.
///
/// Every choice of one weight per profile multiplies into one entry, ordered
/// with the first profile varying slowest. No profiles yields `[1.0]`.
pub fn combine_weights<W: AsRef<[f64]>>(profiles: &[W]) -> Vec<f64> {
    profiles.iter().fold(vec![1.0], |acc, profile| {
        acc.iter()
            .flat_map(|&outer| profile.as_ref().iter().map(move |&inner| outer * inner))
            .collect()
    })
}

/// Per-tick metrical weight of one time signature.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterProfile {
    signature: TimeSignature,
    weights: Vec<f64>,
}

impl MeterProfile {
    /// Wrap a per-tick weight array, checking it fills the signature's grid.
    pub fn new(signature: TimeSignature, weights: Vec<f64>, grid_resolution: u32) -> Result<Self> {
        let expected = signature.ticks(grid_resolution).ok_or_else(|| {
            Error::InvalidInput(format!(
                "beat unit of {signature} does not divide grid resolution {grid_resolution}"
            ))
        })?;
        if weights.len() != expected as usize {
            return Err(Error::InvalidInput(format!(
                "{signature} needs {expected} tick weights, got {}",
                weights.len()
            )));
        }
        Ok(Self { signature, weights })
    }

    pub fn signature(&self) -> TimeSignature {
        self.signature
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn ticks(&self) -> usize {
        self.weights.len()
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Metrical profiles for every supported signature, built once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightModel {
    grid_resolution: u32,
    profiles: BTreeMap<TimeSignature, MeterProfile>,
}

impl WeightModel {
    pub fn build(
        grid_resolution: u32,
        signatures: &[SignatureProfile],
        subdivisions: &[SubdivisionProfile],
    ) -> Result<Self> {
        if grid_resolution == 0 {
            return Err(Error::InvalidInput("grid resolution must be positive".into()));
        }

        let mut inner: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for sub in subdivisions {
            let weights = combine_weights(&sub.groups);
            if sub.beat_unit as usize * weights.len() != grid_resolution as usize {
                return Err(Error::InvalidInput(format!(
                    "subdivision of 1/{} has {} ticks, expected {}",
                    sub.beat_unit,
                    weights.len(),
                    grid_resolution / sub.beat_unit.max(1)
                )));
            }
            inner.insert(sub.beat_unit, weights);
        }

        let mut profiles = BTreeMap::new();
        for profile in signatures {
            let signature = TimeSignature::new(profile.beats, profile.beat_unit);
            let beat_weights = combine_weights(&profile.groups);
            if beat_weights.len() != profile.beats as usize {
                return Err(Error::InvalidInput(format!(
                    "{signature} has {} beat weights",
                    beat_weights.len()
                )));
            }
            let sub = inner.get(&profile.beat_unit).ok_or_else(|| {
                Error::InvalidInput(format!("no subdivision profile for 1/{}", profile.beat_unit))
            })?;

            let weights = combine_weights(&[beat_weights.as_slice(), sub.as_slice()]);
            profiles.insert(
                signature,
                MeterProfile::new(signature, weights, grid_resolution)?,
            );
        }

        Ok(Self {
            grid_resolution,
            profiles,
        })
    }

    pub fn grid_resolution(&self) -> u32 {
        self.grid_resolution
    }

    pub fn profile(&self, signature: TimeSignature) -> Result<&MeterProfile> {
        self.profiles
            .get(&signature)
            .ok_or(Error::UnknownSignature(signature))
    }

    pub fn signatures(&self) -> impl Iterator<Item = TimeSignature> + '_ {
        self.profiles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_signatures, default_subdivisions};
    use pretty_assertions::assert_eq;

    fn default_model() -> WeightModel {
        WeightModel::build(32, &default_signatures(), &default_subdivisions()).unwrap()
    }

    #[test]
    fn combine_is_beat_major() {
        let combined = combine_weights(&[vec![0.6, 0.4], vec![0.5, 0.25]]);
        assert_eq!(combined, vec![0.3, 0.15, 0.2, 0.1]);
    }

    #[test]
    fn combine_of_nothing_is_unit() {
        assert_eq!(combine_weights::<Vec<f64>>(&[]), vec![1.0]);
    }

    #[test]
    fn compound_six_eight() {
        let six_eight = combine_weights(&[vec![0.6, 0.4], vec![0.45, 0.3, 0.25]]);
        assert_eq!(six_eight.len(), 6);
        assert!((six_eight[0] - 0.27).abs() < 1e-12);
        assert!((six_eight[3] - 0.18).abs() < 1e-12);
    }

    #[test]
    fn every_signature_fills_its_grid() {
        let model = default_model();
        assert_eq!(model.len(), 6);
        for signature in model.signatures() {
            let profile = model.profile(signature).unwrap();
            let expected = signature.beats * (32 / signature.beat_unit);
            assert_eq!(profile.ticks(), expected as usize, "{signature}");
        }
    }

    #[test]
    fn sums_match_beat_profiles() {
        let model = default_model();
        for source in default_signatures() {
            let signature = TimeSignature::new(source.beats, source.beat_unit);
            let beat_sum: f64 = combine_weights(&source.groups).iter().sum();
            let total = model.profile(signature).unwrap().total();
            assert!(
                (total - beat_sum).abs() < 1e-9,
                "{signature}: {total} vs {beat_sum}"
            );
        }
    }

    #[test]
    fn downbeat_is_heaviest_tick() {
        let model = default_model();
        let four_four = model.profile(TimeSignature::new(4, 4)).unwrap();
        let max = four_four.weights().iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(four_four.weights()[0], max);
        assert!((four_four.weights()[0] - 0.4 * 0.4 * 0.6).abs() < 1e-12);
    }

    #[test]
    fn unknown_signature() {
        let model = default_model();
        let err = model.profile(TimeSignature::new(5, 4));
        assert!(matches!(err, Err(Error::UnknownSignature(_))));
    }

    #[test]
    fn mismatched_beat_count_rejected() {
        let bad = vec![SignatureProfile {
            beats: 3,
            beat_unit: 4,
            groups: vec![vec![0.5, 0.5]],
        }];
        let err = WeightModel::build(32, &bad, &default_subdivisions());
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn short_subdivision_rejected() {
        let bad = vec![SubdivisionProfile {
            beat_unit: 4,
            groups: vec![vec![0.5, 0.5]],
        }];
        let err = WeightModel::build(32, &default_signatures(), &bad);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn missing_subdivision_rejected() {
        let subs: Vec<_> = default_subdivisions()
            .into_iter()
            .filter(|s| s.beat_unit == 4)
            .collect();
        let err = WeightModel::build(32, &default_signatures(), &subs);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn meter_profile_checks_length() {
        let sig = TimeSignature::new(2, 4);
        assert!(MeterProfile::new(sig, vec![0.1; 16], 32).is_ok());
        assert!(matches!(
            MeterProfile::new(sig, vec![0.1; 15], 32),
            Err(Error::InvalidInput(_))
        ));
    }
}
