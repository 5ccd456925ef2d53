//! Intersection aggregation: candidate drilling points where candidate
//! lines cross.
//!
//! Every unordered pair of distinct lines `(i, j)` with `i < j` is
//! evaluated in ascending order. An R*-tree over the lines' bounding
//! boxes prunes pairs that cannot touch; the surviving pairs are tested
//! segment by segment with `geo`'s exact line intersection.
//!
//! Within one pair, points found on several segment pairs (a crossing
//! exactly at a shared vertex) are reported once and ordered by `(x, y)`.
//! Across pairs nothing is merged: a point where three lines meet is
//! reported once per contributing pair.
//!
//! # Overlaps
//!
//! Consecutive candidate lines share two vertices, so collinear overlap
//! is common. An overlap of zero length (two collinear segments touching
//! end to end) counts as an ordinary point. A pair with a
//! positive-length overlap is handled per [`OverlapPolicy`].

use std::cmp::Ordering;

use geo::line_intersection::{LineIntersection, line_intersection};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::types::{CandidateLine, IntersectionPoint, Point};

/// How a line pair that overlaps along a stretch is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// The pair contributes no point at all: its intersection is not a
    /// point set. This is the reference behaviour.
    #[default]
    Skip,
    /// The end points of each overlapping stretch are reported, along
    /// with any isolated crossing points of the pair.
    Endpoints,
}

/// Output of [`intersect_lines`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intersections {
    /// Candidate drilling points, grouped by pair in ascending pair order.
    pub points: Vec<IntersectionPoint>,
    /// Number of pairs whose bounding boxes touched and were tested.
    pub pairs_tested: usize,
    /// Number of tested pairs that overlap along a positive length.
    pub overlapping_pairs: usize,
}

/// A candidate line tagged with its position, for R*-tree storage.
struct IndexedLine {
    envelope: AABB<[f64; 2]>,
    index: usize,
}

impl IndexedLine {
    fn new(line: &CandidateLine, index: usize) -> Self {
        Self {
            envelope: envelope(line),
            index,
        }
    }
}

impl RTreeObject for IndexedLine {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope(line: &CandidateLine) -> AABB<[f64; 2]> {
    let (min, max) = line.bounds();
    AABB::from_corners([min.x, min.y], [max.x, max.y])
}

/// Points where one pair of lines meets.
#[derive(Debug, Default)]
struct PairOutcome {
    /// Isolated crossing or touching points.
    points: Vec<Point>,
    /// End points of positive-length overlaps.
    overlap_ends: Vec<Point>,
}

impl PairOutcome {
    fn overlaps(&self) -> bool {
        !self.overlap_ends.is_empty()
    }
}

/// Compute all pairwise intersections of `lines`.
///
/// # Examples
///
/// ```
/// use hydroscan_pipeline::{CandidateLine, Point};
/// use hydroscan_pipeline::intersections::{intersect_lines, OverlapPolicy};
///
/// let horizontal = CandidateLine::new(
///     [0, 1, 2],
///     [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(4.0, 0.0)],
/// );
/// let vertical = CandidateLine::new(
///     [3, 4, 5],
///     [Point::new(1.0, -2.0), Point::new(1.0, -1.0), Point::new(1.0, 2.0)],
/// );
/// let result = intersect_lines(&[horizontal, vertical], OverlapPolicy::Skip);
/// assert_eq!(result.points.len(), 1);
/// assert_eq!(result.points[0].point, Point::new(1.0, 0.0));
/// ```
#[must_use]
pub fn intersect_lines(lines: &[CandidateLine], policy: OverlapPolicy) -> Intersections {
    let mut result = Intersections::default();
    if lines.len() < 2 {
        return result;
    }

    let tree = RTree::bulk_load(
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| IndexedLine::new(line, i))
            .collect(),
    );

    let mut partners: Vec<usize> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        partners.clear();
        partners.extend(
            tree.locate_in_envelope_intersecting(&envelope(line))
                .map(|entry| entry.index)
                .filter(|&j| j > i),
        );
        partners.sort_unstable();

        for &j in &partners {
            result.pairs_tested += 1;
            let outcome = pair_intersection(line, &lines[j]);
            let mut points = if outcome.overlaps() {
                result.overlapping_pairs += 1;
                match policy {
                    OverlapPolicy::Skip => continue,
                    OverlapPolicy::Endpoints => {
                        let mut all = outcome.points;
                        all.extend(outcome.overlap_ends);
                        all
                    }
                }
            } else {
                outcome.points
            };
            sort_and_dedup(&mut points);
            result
                .points
                .extend(points.into_iter().map(|point| IntersectionPoint {
                    point,
                    lines: [i, j],
                }));
        }
    }

    log::debug!(
        "{} intersection points from {} tested pairs ({} overlapping)",
        result.points.len(),
        result.pairs_tested,
        result.overlapping_pairs,
    );
    result
}

/// Intersect two 3-vertex lines segment by segment.
fn pair_intersection(a: &CandidateLine, b: &CandidateLine) -> PairOutcome {
    let mut outcome = PairOutcome::default();
    for sa in a.segments() {
        for sb in b.segments() {
            match line_intersection(sa, sb) {
                None => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    outcome.points.push(intersection.into());
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    if intersection.start == intersection.end {
                        outcome.points.push(intersection.start.into());
                    } else {
                        outcome.overlap_ends.push(intersection.start.into());
                        outcome.overlap_ends.push(intersection.end.into());
                    }
                }
            }
        }
    }
    outcome
}

fn sort_and_dedup(points: &mut Vec<Point>) {
    points.sort_by(|p, q| {
        p.x.partial_cmp(&q.x)
            .unwrap_or(Ordering::Equal)
            .then(p.y.partial_cmp(&q.y).unwrap_or(Ordering::Equal))
    });
    points.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(indices: [usize; 3], pts: [(f64, f64); 3]) -> CandidateLine {
        CandidateLine::new(indices, pts.map(|(x, y)| Point::new(x, y)))
    }

    fn five_collinear() -> Vec<CandidateLine> {
        let p: Vec<(f64, f64)> = (0..5).map(|i| (f64::from(i) * 10.0, 0.0)).collect();
        vec![
            line([0, 1, 2], [p[0], p[1], p[2]]),
            line([1, 2, 3], [p[1], p[2], p[3]]),
            line([2, 3, 4], [p[2], p[3], p[4]]),
        ]
    }

    #[test]
    fn fewer_than_two_lines_yield_nothing() {
        assert!(intersect_lines(&[], OverlapPolicy::Skip).points.is_empty());
        let single = [line([0, 1, 2], [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)])];
        assert!(intersect_lines(&single, OverlapPolicy::Skip).points.is_empty());
    }

    #[test]
    fn single_crossing_at_interior_point() {
        let lines = [
            line([0, 1, 2], [(0.0, 0.0), (2.0, 0.0), (4.0, 0.0)]),
            line([3, 4, 5], [(1.0, -2.0), (1.0, -1.0), (1.0, 2.0)]),
        ];
        let result = intersect_lines(&lines, OverlapPolicy::Skip);
        assert_eq!(result.points.len(), 1);
        let ix = result.points[0];
        assert!((ix.point.x - 1.0).abs() < 1e-9);
        assert!(ix.point.y.abs() < 1e-9);
        assert_eq!(ix.lines, [0, 1]);
        assert_eq!(result.pairs_tested, 1);
    }

    #[test]
    fn oblique_crossing_coordinates() {
        let lines = [
            line([0, 1, 2], [(0.0, 0.0), (1.0, 1.0), (3.0, 3.0)]),
            line([3, 4, 5], [(0.0, 3.0), (0.5, 2.5), (3.0, 0.0)]),
        ];
        let result = intersect_lines(&lines, OverlapPolicy::Skip);
        assert_eq!(result.points.len(), 1);
        assert!((result.points[0].point.x - 1.5).abs() < 1e-9);
        assert!((result.points[0].point.y - 1.5).abs() < 1e-9);
    }

    #[test]
    fn disjoint_lines_are_pruned() {
        let lines = [
            line([0, 1, 2], [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            line([3, 4, 5], [(10.0, 10.0), (11.0, 10.0), (12.0, 10.0)]),
        ];
        let result = intersect_lines(&lines, OverlapPolicy::Skip);
        assert!(result.points.is_empty());
        assert_eq!(result.pairs_tested, 0);
    }

    #[test]
    fn multiple_crossings_in_one_pair_are_all_reported() {
        // Zig-zag crosses the horizontal line at x=1 and again exactly
        // at its middle vertex x=2, which two segments both report.
        let lines = [
            line([0, 1, 2], [(0.0, 0.0), (2.0, 0.0), (4.0, 0.0)]),
            line([3, 4, 5], [(0.5, 1.0), (1.5, -1.0), (2.5, 1.0)]),
        ];
        let result = intersect_lines(&lines, OverlapPolicy::Skip);
        let xs: Vec<f64> = result.points.iter().map(|p| p.point.x).collect();
        assert_eq!(xs.len(), 2);
        assert!((xs[0] - 1.0).abs() < 1e-9);
        assert!((xs[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_chain_with_skip_reports_shared_endpoint_only() {
        // Lines 0 and 1 overlap on [10, 20], lines 1 and 2 on [20, 30]:
        // both pairs are skipped. Lines 0 and 2 touch only at x=20.
        let result = intersect_lines(&five_collinear(), OverlapPolicy::Skip);
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].point, Point::new(20.0, 0.0));
        assert_eq!(result.points[0].lines, [0, 2]);
        assert_eq!(result.overlapping_pairs, 2);
    }

    #[test]
    fn collinear_chain_with_endpoints_reports_overlap_bounds() {
        let result = intersect_lines(&five_collinear(), OverlapPolicy::Endpoints);
        let got: Vec<([usize; 2], f64)> = result
            .points
            .iter()
            .map(|p| (p.lines, p.point.x))
            .collect();
        assert_eq!(
            got,
            vec![
                ([0, 1], 10.0),
                ([0, 1], 20.0),
                ([0, 2], 20.0),
                ([1, 2], 20.0),
                ([1, 2], 30.0),
            ]
        );
    }

    #[test]
    fn shared_point_is_reported_once_per_pair() {
        // Three lines through the origin: three pairs, three copies.
        let lines = [
            line([0, 1, 2], [(-2.0, 0.0), (-1.0, 0.0), (2.0, 0.0)]),
            line([3, 4, 5], [(0.0, -2.0), (0.0, -1.0), (0.0, 2.0)]),
            line([6, 7, 8], [(-2.0, -2.0), (-1.0, -1.0), (2.0, 2.0)]),
        ];
        let result = intersect_lines(&lines, OverlapPolicy::Skip);
        assert_eq!(result.points.len(), 3);
        for ix in &result.points {
            assert!(ix.point.x.abs() < 1e-9 && ix.point.y.abs() < 1e-9);
        }
        let pairs: Vec<[usize; 2]> = result.points.iter().map(|p| p.lines).collect();
        assert_eq!(pairs, vec![[0, 1], [0, 2], [1, 2]]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let lines = five_collinear();
        assert_eq!(
            intersect_lines(&lines, OverlapPolicy::Endpoints),
            intersect_lines(&lines, OverlapPolicy::Endpoints)
        );
    }
}
