//! Positional alignment and gap filling of two recorded sequences.
//!
//! Frame `i` of one sequence is compared with frame `i` of the other; there is
//! no timestamp re-indexing. The shorter sequence is padded with trailing
//! missing entries, then every missing entry is filled by linear interpolation
//! over the frame index. Entries before the first / after the last present
//! sample take that edge value.

use crate::geometry::Point;
use crate::metrics::EvalError;

/// Two fully populated sequences of identical length.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AlignedPair {
    manual: Vec<Point>,
    auto: Vec<Point>,
}

impl AlignedPair {
    pub fn manual(&self) -> &[Point] {
        &self.manual
    }

    pub fn auto(&self) -> &[Point] {
        &self.auto
    }

    pub fn len(&self) -> usize {
        self.manual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manual.is_empty()
    }

    /// `(manual, auto)` pairs in frame order.
    pub fn pairs(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.manual.iter().copied().zip(self.auto.iter().copied())
    }
}

/// Pad both sequences to `max(a, b)` and fill every gap.
///
/// Fails with [`EvalError::NoValidSamples`] when a non-empty sequence has no
/// present entry to interpolate from.
pub fn align_sequences(
    manual: &[Option<Point>],
    auto: &[Option<Point>],
) -> Result<AlignedPair, EvalError> {
    let len = manual.len().max(auto.len());
    if manual.len() != auto.len() {
        tracing::debug!(
            "aligning sequences of unequal length (manual={}, auto={}) to {}",
            manual.len(),
            auto.len(),
            len
        );
    }
    let manual = interpolate_missing(&pad_missing(manual, len)).ok_or(EvalError::NoValidSamples)?;
    let auto = interpolate_missing(&pad_missing(auto, len)).ok_or(EvalError::NoValidSamples)?;
    Ok(AlignedPair { manual, auto })
}

fn pad_missing(entries: &[Option<Point>], len: usize) -> Vec<Option<Point>> {
    let mut padded = entries.to_vec();
    padded.resize(len, None);
    padded
}

/// Fill missing entries by index-parameterized linear interpolation.
///
/// Interpolated coordinates are truncated toward zero. Returns `None` when
/// `entries` is non-empty but has no present entry.
pub fn interpolate_missing(entries: &[Option<Point>]) -> Option<Vec<Point>> {
    let known: Vec<(usize, Point)> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.map(|p| (i, p)))
        .collect();
    if entries.is_empty() {
        return Some(Vec::new());
    }
    let (&(first_idx, first), &(last_idx, last)) = (known.first()?, known.last()?);

    let mut filled = Vec::with_capacity(entries.len());
    // `seg` indexes the known sample at or before `i`.
    let mut seg = 0usize;
    for (i, entry) in entries.iter().enumerate() {
        if let Some(p) = entry {
            filled.push(*p);
            continue;
        }
        if i < first_idx {
            filled.push(first);
            continue;
        }
        if i > last_idx {
            filled.push(last);
            continue;
        }
        while known[seg + 1].0 < i {
            seg += 1;
        }
        let (i0, p0) = known[seg];
        let (i1, p1) = known[seg + 1];
        let t = (i - i0) as f64 / (i1 - i0) as f64;
        filled.push(Point::new(lerp(p0.x, p1.x, t), lerp(p0.y, p1.y, t)));
    }
    Some(filled)
}

#[inline]
fn lerp(a: i32, b: i32, t: f64) -> i32 {
    (a as f64 + (b as f64 - a as f64) * t) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> Option<Point> {
        Some(Point::new(x, y))
    }

    #[test]
    fn pads_shorter_sequence_to_longer_length() {
        let manual = [p(0, 0), p(1, 1), p(2, 2), p(3, 3)];
        let auto = [p(0, 0), p(5, 5)];
        let pair = align_sequences(&manual, &auto).unwrap();
        assert_eq!(pair.manual().len(), 4);
        assert_eq!(pair.auto().len(), 4);
        // Trailing pad takes the last known value.
        assert_eq!(pair.auto()[2], Point::new(5, 5));
        assert_eq!(pair.auto()[3], Point::new(5, 5));
    }

    #[test]
    fn interior_gap_is_linearly_interpolated() {
        let filled = interpolate_missing(&[p(0, 0), None, None, p(9, -9)]).unwrap();
        assert_eq!(
            filled,
            vec![
                Point::new(0, 0),
                Point::new(3, -3),
                Point::new(6, -6),
                Point::new(9, -9)
            ]
        );
    }

    #[test]
    fn interpolation_truncates_toward_zero() {
        let filled = interpolate_missing(&[p(0, 0), None, p(5, -5)]).unwrap();
        assert_eq!(filled[1], Point::new(2, -2));
    }

    #[test]
    fn leading_gap_takes_first_known_value() {
        let filled = interpolate_missing(&[None, None, p(4, 7), p(6, 7)]).unwrap();
        assert_eq!(filled[0], Point::new(4, 7));
        assert_eq!(filled[1], Point::new(4, 7));
    }

    #[test]
    fn complete_equal_length_input_is_unchanged() {
        let manual = [p(1, 2), p(3, 4), p(5, 6)];
        let auto = [p(2, 2), p(4, 4), p(6, 6)];
        let pair = align_sequences(&manual, &auto).unwrap();
        let again = align_sequences(
            &pair.manual().iter().copied().map(Some).collect::<Vec<_>>(),
            &pair.auto().iter().copied().map(Some).collect::<Vec<_>>(),
        )
        .unwrap();
        assert_eq!(pair, again);
        assert_eq!(pair.manual(), &[Point::new(1, 2), Point::new(3, 4), Point::new(5, 6)]);
    }

    #[test]
    fn both_empty_aligns_to_empty_pair() {
        let pair = align_sequences(&[], &[]).unwrap();
        assert!(pair.is_empty());
    }

    #[test]
    fn one_side_without_samples_is_rejected() {
        let err = align_sequences(&[], &[p(1, 1), p(2, 2)]).unwrap_err();
        assert_eq!(err, EvalError::NoValidSamples);
        assert!(interpolate_missing(&[None, None]).is_none());
    }

    #[test]
    fn single_known_sample_fills_everything() {
        let filled = interpolate_missing(&[None, p(3, 3), None]).unwrap();
        assert_eq!(filled, vec![Point::new(3, 3); 3]);
    }
}
