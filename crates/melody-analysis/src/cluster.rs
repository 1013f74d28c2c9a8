use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::note::{Note, Piece};
use crate::rules::MergeRule;
use crate::{Error, Result};

/// A contiguous run of notes treated as one musical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Index of the first note in the piece.
    pub start: usize,
    /// Number of notes.
    pub len: usize,
    /// Start tick of the first note.
    pub first_start: u32,
    /// Start tick of the last note.
    pub last_start: u32,
    /// Latest end tick of any note in the part.
    pub end_tick: u32,
    /// True when every note is a rest.
    pub rest: bool,
}

impl Part {
    /// A one-note part.
    pub fn atom(index: usize, note: &Note) -> Result<Self> {
        Ok(Self {
            start: index,
            len: 1,
            first_start: note.start_tick,
            last_start: note.start_tick,
            end_tick: note.end_tick()?,
            rest: note.is_rest(),
        })
    }

    /// One past the last note index.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.end()
    }

    pub fn is_rest(&self) -> bool {
        self.rest
    }

    /// Ticks from the first onset to the last release.
    pub fn time_length(&self) -> u32 {
        self.end_tick.saturating_sub(self.first_start)
    }

    /// Append the part that directly follows this one.
    pub fn join(self, next: Part) -> Result<Part> {
        if self.end() != next.start {
            return Err(Error::NonContiguous {
                left_end: self.end(),
                right_start: next.start,
            });
        }
        Ok(Part {
            start: self.start,
            len: self.len + next.len,
            first_start: self.first_start,
            last_start: next.last_start,
            end_tick: self.end_tick.max(next.end_tick),
            rest: self.rest && next.rest,
        })
    }

    /// Onset distance from `earlier` to this part, in ticks.
    ///
    /// Defined only for parts whose onset spans do not interleave; a
    /// negative result means this part actually lies before `earlier`.
    pub fn distance_from(&self, earlier: &Part) -> Result<i64> {
        if self.first_start >= earlier.last_start {
            Ok(self.first_start as i64 - earlier.last_start as i64)
        } else if self.last_start <= earlier.first_start {
            Ok(self.last_start as i64 - earlier.first_start as i64)
        } else {
            Err(Error::OverlapViolation {
                earlier: earlier.indices(),
                later: self.indices(),
            })
        }
    }
}

/// One part per note, with simultaneous onsets and rest runs fused.
pub fn atomic_parts(piece: &Piece) -> Result<Vec<Part>> {
    let mut parts: Vec<Part> = Vec::with_capacity(piece.len());

    for (index, note) in piece.notes().iter().enumerate() {
        let part = Part::atom(index, note)?;
        if let Some(last) = parts.last_mut() {
            if part.first_start == last.last_start || (part.rest && last.rest) {
                *last = last.join(part)?;
                continue;
            }
        }
        parts.push(part);
    }

    Ok(parts)
}

/// Partition a piece into parts by repeated left-to-right merging.
///
/// The merge distance starts at one tick and doubles each pass while it stays
/// within `max_threshold`. A candidate joins the running part when it lies
/// within the distance and either overlaps the running part in time or the
/// rule approves. Rest parts never anchor a merge, but a single rest between
/// two merging parts is absorbed with them. The output covers every note
/// index exactly once, in order.
pub fn cluster<R>(piece: &Piece, rule: &R, max_threshold: u32) -> Result<Vec<Part>>
where
    R: MergeRule + ?Sized,
{
    let mut parts = atomic_parts(piece)?;
    debug!(notes = piece.len(), parts = parts.len(), "atomic segmentation");

    let mut threshold = 1u32;
    while threshold <= max_threshold {
        parts = merge_pass(parts, piece, rule, threshold)?;
        debug!(threshold, parts = parts.len(), "merge pass");
        threshold = match threshold.checked_mul(2) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(parts)
}

fn merge_pass<R>(parts: Vec<Part>, piece: &Piece, rule: &R, threshold: u32) -> Result<Vec<Part>>
where
    R: MergeRule + ?Sized,
{
    let mut merged: Vec<Part> = Vec::with_capacity(parts.len());

    for part in parts {
        let Some(last) = merged.last() else {
            merged.push(part);
            continue;
        };
        if part.is_rest() || (merged.len() == 1 && last.is_rest()) {
            merged.push(part);
            continue;
        }

        let across_rest = last.is_rest();
        let anchor_index = merged.len() - if across_rest { 2 } else { 1 };
        let anchor = &merged[anchor_index];

        let distance = part.distance_from(anchor)?;
        let joinable = distance <= threshold as i64
            && (anchor.end_tick > part.first_start
                || rule.can_merge(anchor, &part, threshold, piece));

        if !joinable {
            merged.push(part);
            continue;
        }

        let mut tail = part;
        if across_rest {
            if let Some(rest) = merged.pop() {
                tail = rest.join(tail)?;
            }
        }
        if let Some(head) = merged.pop() {
            merged.push(head.join(tail)?);
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::TimeSignature;
    use crate::rules::{Always, Never};
    use pretty_assertions::assert_eq;

    const MAX: u32 = 32;

    fn piece(notes: &[(Option<i32>, u32, u32)]) -> Piece {
        let notes = notes
            .iter()
            .map(|&(step, start_tick, duration)| Note {
                step,
                start_tick,
                duration,
            })
            .collect();
        Piece::uniform(notes, TimeSignature::new(4, 4))
    }

    fn spans(parts: &[Part]) -> Vec<(usize, usize)> {
        parts.iter().map(|p| (p.start, p.len)).collect()
    }

    fn assert_partition(parts: &[Part], len: usize) {
        let indices: Vec<usize> = parts.iter().flat_map(Part::indices).collect();
        assert_eq!(indices, (0..len).collect::<Vec<_>>());
    }

    #[test]
    fn empty_piece() {
        let parts = cluster(&Piece::default(), &Always, MAX).unwrap();
        assert!(parts.is_empty());
    }

    #[test]
    fn stacks_and_rest_runs_fuse_first() {
        let piece = piece(&[
            (Some(40), 0, 4),
            (Some(44), 0, 4),
            (None, 4, 4),
            (None, 8, 4),
            (Some(47), 12, 4),
        ]);
        let parts = atomic_parts(&piece).unwrap();
        assert_eq!(spans(&parts), vec![(0, 2), (2, 2), (4, 1)]);
        assert!(parts[1].is_rest());
        assert!(!parts[0].is_rest());
    }

    #[test]
    fn mixed_stack_is_not_a_rest() {
        // A rest and a note at the same onset fuse into a sounding part,
        // whichever comes first.
        let layouts: [[(Option<i32>, u32, u32); 2]; 2] = [
            [(None, 0, 4), (Some(40), 0, 4)],
            [(Some(40), 0, 4), (None, 0, 4)],
        ];
        for layout in layouts {
            let parts = atomic_parts(&piece(&layout)).unwrap();
            assert_eq!(spans(&parts), vec![(0, 2)]);
            assert!(!parts[0].is_rest());
        }
    }

    #[test]
    fn tick_overflow_is_rejected() {
        let piece = piece(&[(Some(40), 0, 4), (Some(42), u32::MAX - 1, 4)]);
        assert!(matches!(
            cluster(&piece, &Always, MAX),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn never_rule_keeps_atomic_parts() {
        let piece = piece(&[
            (Some(40), 0, 4),
            (Some(42), 4, 4),
            (Some(44), 8, 2),
            (Some(45), 8, 2),
            (Some(47), 10, 6),
        ]);
        let parts = cluster(&piece, &Never, MAX).unwrap();
        assert_eq!(parts, atomic_parts(&piece).unwrap());
        assert_eq!(spans(&parts), vec![(0, 1), (1, 1), (2, 2), (4, 1)]);
    }

    #[test]
    fn always_rule_collapses_run() {
        let piece = piece(&[
            (Some(40), 0, 4),
            (Some(42), 4, 4),
            (Some(44), 8, 8),
            (Some(47), 16, 16),
        ]);
        let parts = cluster(&piece, &Always, MAX).unwrap();
        assert_eq!(spans(&parts), vec![(0, 4)]);
        assert_eq!(parts[0].time_length(), 32);
    }

    #[test]
    fn interposed_rest_is_absorbed() {
        let piece = piece(&[(Some(40), 0, 4), (None, 4, 4), (Some(44), 8, 4)]);
        let parts = cluster(&piece, &Always, MAX).unwrap();
        assert_eq!(spans(&parts), vec![(0, 3)]);
        assert!(!parts[0].is_rest());
    }

    #[test]
    fn edge_rests_stay_alone() {
        let piece = piece(&[
            (None, 0, 4),
            (Some(40), 4, 4),
            (Some(42), 8, 4),
            (None, 12, 4),
        ]);
        let parts = cluster(&piece, &Always, MAX).unwrap();
        assert_eq!(spans(&parts), vec![(0, 1), (1, 2), (3, 1)]);
    }

    #[test]
    fn overlap_merges_without_rule() {
        // The second note starts while the first still sounds.
        let piece = piece(&[(Some(40), 0, 8), (Some(44), 2, 2), (Some(47), 16, 2)]);
        let parts = cluster(&piece, &Never, MAX).unwrap();
        assert_eq!(spans(&parts), vec![(0, 2), (2, 1)]);
    }

    #[test]
    fn distant_parts_stay_apart() {
        let piece = piece(&[(Some(40), 0, 4), (Some(44), 64, 4)]);
        let parts = cluster(&piece, &Always, MAX).unwrap();
        assert_eq!(spans(&parts), vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn threshold_gates_rule() {
        // Only approve once the pass distance reaches 8 ticks.
        let late = |_: &Part, _: &Part, threshold: u32, _: &Piece| threshold >= 8;
        let piece = piece(&[(Some(40), 0, 2), (Some(42), 2, 2), (Some(44), 10, 2)]);
        let parts = cluster(&piece, &late, 4).unwrap();
        assert_eq!(spans(&parts), vec![(0, 1), (1, 1), (2, 1)]);
        let parts = cluster(&piece, &late, MAX).unwrap();
        assert_eq!(spans(&parts), vec![(0, 3)]);
    }

    #[test]
    fn rule_sees_anchor_and_candidate() {
        // Merge only parts that start on an even step.
        let even = |last: &Part, next: &Part, _: u32, piece: &Piece| {
            let step = |p: &Part| piece.note(p.start).and_then(|n| n.step).unwrap_or(1);
            step(last) % 2 == 0 && step(next) % 2 == 0
        };
        let piece = piece(&[
            (Some(40), 0, 4),
            (Some(42), 4, 4),
            (Some(43), 8, 4),
            (Some(46), 12, 4),
        ]);
        let parts = cluster(&piece, &even, MAX).unwrap();
        assert_eq!(spans(&parts), vec![(0, 2), (2, 1), (3, 1)]);
    }

    #[test]
    fn output_always_partitions_input() {
        let layouts: Vec<Vec<(Option<i32>, u32, u32)>> = vec![
            vec![(Some(40), 0, 4), (None, 4, 2), (None, 6, 2), (Some(41), 8, 8)],
            vec![(None, 0, 8), (Some(40), 8, 4), (Some(43), 8, 4), (None, 12, 20)],
            vec![
                (Some(40), 0, 2),
                (Some(41), 3, 2),
                (None, 5, 1),
                (Some(42), 6, 2),
                (Some(43), 40, 2),
                (None, 42, 30),
                (Some(44), 72, 4),
            ],
        ];
        let alternate = |last: &Part, _: &Part, threshold: u32, _: &Piece| {
            (last.start + threshold as usize) % 3 != 0
        };

        for layout in layouts {
            let piece = piece(&layout);
            for parts in [
                cluster(&piece, &Always, MAX).unwrap(),
                cluster(&piece, &Never, MAX).unwrap(),
                cluster(&piece, &alternate, MAX).unwrap(),
            ] {
                assert_partition(&parts, piece.len());
            }
        }
    }

    #[test]
    fn distance_is_signed_by_order() {
        let a = Part::atom(0, &Note::new(40, 0, 4)).unwrap();
        let b = Part::atom(1, &Note::new(42, 6, 4)).unwrap();
        assert_eq!(b.distance_from(&a).unwrap(), 6);
        assert_eq!(a.distance_from(&b).unwrap(), -6);
    }

    #[test]
    fn overlapping_parts_have_no_distance() {
        let outer = Part::atom(0, &Note::new(40, 0, 2))
            .unwrap()
            .join(Part::atom(1, &Note::new(42, 8, 2)).unwrap())
            .unwrap();
        let inner = Part::atom(2, &Note::new(44, 4, 2)).unwrap();
        let err = inner.distance_from(&outer).unwrap_err();
        assert!(matches!(
            err,
            Error::OverlapViolation { ref earlier, ref later } if *earlier == (0..2) && *later == (2..3)
        ));
    }

    #[test]
    fn join_requires_adjacency() {
        let a = Part::atom(0, &Note::new(40, 0, 4)).unwrap();
        let c = Part::atom(2, &Note::new(44, 8, 4)).unwrap();
        assert!(matches!(a.join(c), Err(Error::NonContiguous { .. })));
    }

    #[test]
    fn join_tracks_span() {
        let joined = Part::atom(0, &Note::new(40, 0, 12))
            .unwrap()
            .join(Part::atom(1, &Note::rest(4, 2)).unwrap())
            .unwrap();
        assert_eq!(joined.first_start, 0);
        assert_eq!(joined.last_start, 4);
        assert_eq!(joined.end_tick, 12);
        assert!(!joined.is_rest());
    }
}
