use crate::cluster::Part;
use crate::config::ClusterConfig;
use crate::note::Piece;
use crate::{Error, Result};

/// Decides whether two neighbouring parts belong together.
///
/// Called with the running part, the candidate that follows it, the current
/// pass distance in ticks, and the whole piece for looking up notes. Any
/// `Fn(&Part, &Part, u32, &Piece) -> bool` closure is a rule.
pub trait MergeRule {
    fn can_merge(&self, last: &Part, next: &Part, threshold: u32, piece: &Piece) -> bool;
}

impl<F> MergeRule for F
where
    F: Fn(&Part, &Part, u32, &Piece) -> bool,
{
    fn can_merge(&self, last: &Part, next: &Part, threshold: u32, piece: &Piece) -> bool {
        self(last, next, threshold, piece)
    }
}

/// Approves every merge within the pass distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl MergeRule for Always {
    fn can_merge(&self, _: &Part, _: &Part, _: u32, _: &Piece) -> bool {
        true
    }
}

/// Approves nothing; only time-overlapping parts merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl MergeRule for Never {
    fn can_merge(&self, _: &Part, _: &Part, _: u32, _: &Piece) -> bool {
        false
    }
}

/// Length-limited merging that tightens as parts grow further apart.
///
/// The onset distance between the parts picks a bucket of the tolerance
/// table; the merged onset span must not exceed that bucket's length scaled
/// by the measure's length in whole notes. Parts in different meters never
/// merge, and distances past the table are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceRule {
    tolerance: Vec<u32>,
    bucket_ticks: u32,
}

impl ToleranceRule {
    /// The table's buckets must split the whole-note grid evenly.
    pub fn new(tolerance: Vec<u32>, grid_resolution: u32) -> Result<Self> {
        let buckets = u32::try_from(tolerance.len()).unwrap_or(0);
        if buckets == 0 || grid_resolution % buckets != 0 || grid_resolution < buckets {
            return Err(Error::InvalidInput(format!(
                "{} tolerance buckets do not divide a {grid_resolution}-tick grid",
                tolerance.len()
            )));
        }
        Ok(Self {
            tolerance,
            bucket_ticks: grid_resolution / buckets,
        })
    }

    pub fn from_config(config: &ClusterConfig, grid_resolution: u32) -> Result<Self> {
        Self::new(config.tolerance.clone(), grid_resolution)
    }

    /// Longest merged span allowed at `distance` ticks, in whole-note ticks.
    pub fn allowance(&self, distance: u32) -> Option<u32> {
        self.tolerance
            .get((distance / self.bucket_ticks) as usize)
            .copied()
    }
}

impl MergeRule for ToleranceRule {
    fn can_merge(&self, last: &Part, next: &Part, _threshold: u32, piece: &Piece) -> bool {
        let (Some(signature), Some(next_signature)) =
            (piece.signature(last.start), piece.signature(next.start))
        else {
            return false;
        };
        if signature != next_signature {
            return false;
        }

        let Ok(distance) = next.distance_from(last) else {
            return false;
        };
        let Ok(distance) = u32::try_from(distance) else {
            return false;
        };
        let Some(allowance) = self.allowance(distance) else {
            return false;
        };

        let merged_span = next.last_start as f64 - last.first_start as f64;
        merged_span <= allowance as f64 * signature.ratio()
    }
}
