//! Line extraction: cluster salient points by angular alignment.
//!
//! For every point `i`, the bearings to all other points are sorted and
//! scanned greedily. A group starts at an anchor bearing and absorbs the
//! following bearings while they stay within the tolerance of that
//! anchor (drift is measured from the anchor, never from the previous
//! entry). Any group of two or more targets marks `i` and its members
//! as aligned.
//!
//! The union of aligned positions is kept sorted, and one candidate
//! line is emitted per consecutive triple of that sorted list.
//!
//! The per-point scan makes this O(n² log n) in the number of salient
//! points; the prominence filter keeps `n` small.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::types::{CandidateLine, Point};

/// Default angular tolerance in degrees.
pub const DEFAULT_ANGLE_TOLERANCE_DEG: f64 = 2.0;

/// Output of [`extract_lines`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    /// Aligned positions within the input slice, ascending.
    pub aligned: Vec<usize>,
    /// Candidate lines built from consecutive aligned triples.
    pub lines: Vec<CandidateLine>,
    /// Bearings skipped because the target coincided with the origin.
    pub skipped_coincident: usize,
}

/// Extract candidate lines from planar salient points.
///
/// `tolerance` is in radians. Targets with exactly the same coordinates
/// as the origin have no defined bearing; they are skipped for that
/// origin and counted in [`Alignment::skipped_coincident`]. They can
/// still become aligned through other origins.
///
/// Fewer than 3 points produce no lines.
///
/// # Examples
///
/// ```
/// use hydroscan_pipeline::Point;
/// use hydroscan_pipeline::alignment::extract_lines;
///
/// let coords: Vec<Point> = (0..5).map(|i| Point::new(f64::from(i) * 10.0, 0.0)).collect();
/// let alignment = extract_lines(&coords, 2.0_f64.to_radians());
/// let triples: Vec<[usize; 3]> = alignment.lines.iter().map(|l| l.indices).collect();
/// assert_eq!(triples, vec![[0, 1, 2], [1, 2, 3], [2, 3, 4]]);
/// ```
#[must_use]
pub fn extract_lines(coords: &[Point], tolerance: f64) -> Alignment {
    if coords.len() < 3 {
        return Alignment::default();
    }

    let mut aligned = BTreeSet::new();
    let mut bearings: Vec<(f64, usize)> = Vec::with_capacity(coords.len() - 1);
    let mut skipped_coincident = 0;

    for (i, &origin) in coords.iter().enumerate() {
        bearings.clear();
        for (j, &target) in coords.iter().enumerate() {
            if i == j {
                continue;
            }
            if target == origin {
                skipped_coincident += 1;
                continue;
            }
            bearings.push((origin.bearing_to(target), j));
        }
        bearings.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        collect_groups(i, &bearings, tolerance, &mut aligned);
    }

    if skipped_coincident > 0 {
        log::debug!("skipped {skipped_coincident} bearings between coincident salient points");
    }

    let aligned: Vec<usize> = aligned.into_iter().collect();
    let lines = aligned
        .windows(3)
        .map(|w| {
            CandidateLine::new(
                [w[0], w[1], w[2]],
                [coords[w[0]], coords[w[1]], coords[w[2]]],
            )
        })
        .collect();

    Alignment {
        aligned,
        lines,
        skipped_coincident,
    }
}

/// Walk sorted bearings from one origin and record every group of two
/// or more targets, together with the origin, into `aligned`.
fn collect_groups(
    origin: usize,
    bearings: &[(f64, usize)],
    tolerance: f64,
    aligned: &mut BTreeSet<usize>,
) {
    let Some(&(first, _)) = bearings.first() else {
        return;
    };
    let mut anchor = first;
    let mut start = 0;
    for (k, &(angle, _)) in bearings.iter().enumerate().skip(1) {
        if (angle - anchor).abs() <= tolerance {
            continue;
        }
        record_group(origin, &bearings[start..k], aligned);
        start = k;
        anchor = angle;
    }
    record_group(origin, &bearings[start..], aligned);
}

fn record_group(origin: usize, group: &[(f64, usize)], aligned: &mut BTreeSet<usize>) {
    if group.len() >= 2 {
        aligned.insert(origin);
        aligned.extend(group.iter().map(|&(_, j)| j));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 2.0 * std::f64::consts::PI / 180.0;

    fn indices(alignment: &Alignment) -> Vec<[usize; 3]> {
        alignment.lines.iter().map(|l| l.indices).collect()
    }

    #[test]
    fn fewer_than_three_points_yield_nothing() {
        let coords = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        let alignment = extract_lines(&coords, TOL);
        assert!(alignment.aligned.is_empty());
        assert!(alignment.lines.is_empty());
    }

    #[test]
    fn five_collinear_points_give_three_lines() {
        let coords: Vec<Point> = (0..5)
            .map(|i| Point::new(f64::from(i) * 7.5, f64::from(i) * 2.5))
            .collect();
        let alignment = extract_lines(&coords, TOL);
        assert_eq!(alignment.aligned, vec![0, 1, 2, 3, 4]);
        assert_eq!(indices(&alignment), vec![[0, 1, 2], [1, 2, 3], [2, 3, 4]]);
        assert_eq!(alignment.lines[1].vertices[0], coords[1]);
    }

    #[test]
    fn scalene_triangle_has_no_alignment() {
        let coords = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 1.0),
            Point::new(3.0, 8.0),
        ];
        let alignment = extract_lines(&coords, TOL);
        assert!(alignment.aligned.is_empty());
        assert!(alignment.lines.is_empty());
    }

    #[test]
    fn isolated_point_is_not_aligned() {
        // Three collinear points on the x axis plus one far off-axis
        // point that lines up with nothing.
        let coords = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(4.0, 37.0),
        ];
        let alignment = extract_lines(&coords, TOL);
        assert_eq!(alignment.aligned, vec![0, 1, 2]);
        assert_eq!(indices(&alignment), vec![[0, 1, 2]]);
    }

    #[test]
    fn triples_follow_sorted_positions_not_geometry() {
        // Two separate collinear groups: positions 0,2,4 on y=0 and
        // 1,3,5 on x=100. Lines are built from consecutive sorted
        // positions, which interleave the two groups.
        let coords = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(100.0, 30.0),
            Point::new(20.0, 0.0),
            Point::new(100.0, 50.0),
        ];
        let alignment = extract_lines(&coords, TOL);
        assert_eq!(alignment.aligned, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(indices(&alignment).len(), 4);
        assert_eq!(indices(&alignment)[0], [0, 1, 2]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let coords: Vec<Point> = (0..40)
            .map(|i| {
                let t = f64::from(i);
                Point::new((t * 1.7).sin() * 50.0, (t * 0.9).cos() * 50.0 + t)
            })
            .collect();
        let first = extract_lines(&coords, TOL);
        let second = extract_lines(&coords, TOL);
        assert_eq!(first, second);
        assert!(first.aligned.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn coincident_points_are_skipped_deterministically() {
        let coords = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
        ];
        let alignment = extract_lines(&coords, TOL);
        // 0 -> 1 and 1 -> 0 have no bearing.
        assert_eq!(alignment.skipped_coincident, 2);
        assert_eq!(alignment.aligned, vec![0, 1, 2, 3]);
        assert_eq!(alignment, extract_lines(&coords, TOL));
    }

    #[test]
    fn group_drift_is_measured_from_anchor() {
        let step = 1.5_f64.to_radians();
        let bearings = [(0.0, 1), (step, 2), (2.0 * step, 3)];
        let mut aligned = BTreeSet::new();
        collect_groups(0, &bearings, TOL, &mut aligned);
        // 3.0 degrees is beyond 2 degrees from the anchor at 0: target 3
        // starts its own single-member group.
        assert_eq!(aligned.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn trailing_group_is_recorded() {
        let step = 1.5_f64.to_radians();
        let bearings = [(0.0, 1), (step, 2), (2.0 * step, 3), (2.5 * step, 4)];
        let mut aligned = BTreeSet::new();
        collect_groups(0, &bearings, TOL, &mut aligned);
        assert_eq!(aligned.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn singleton_groups_record_nothing() {
        let bearings = [(0.0, 1), (1.0, 2), (2.0, 3)];
        let mut aligned = BTreeSet::new();
        collect_groups(0, &bearings, TOL, &mut aligned);
        assert!(aligned.is_empty());
    }
}
