//! Scan trajectory across a prospecting zone.
//!
//! The contour is projected to its UTM zone and enclosed in a circle
//! centred on its centroid, with the longest pairwise contour distance
//! as radius. Ring points are spread evenly on that circle, and each
//! ring point is joined to its diametral opposite by a chord sampled at
//! a fixed step. The chord points (not the ring itself) are what the
//! elevation service is asked to enrich.

use std::cmp::Ordering;
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::projection::UtmZone;
use crate::types::{GeoPoint, PipelineError, Point};

/// Default distance between consecutive chord samples, in metres.
pub const DEFAULT_STEP_M: f64 = 10.0;

/// Default batch size accepted by the elevation service.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Configuration of the trajectory sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Chord sampling step in metres.
    pub step_m: f64,
    /// Fixed number of ring points. `None` derives it from the radius
    /// as `floor(2π · radius)`, one per metre of circumference.
    pub ring_points: Option<usize>,
    /// Upper bound on the derived ring point count.
    pub max_ring_points: Option<usize>,
    /// Maximum points per enrichment batch.
    pub chunk_size: usize,
}

impl SamplerConfig {
    /// Default chord step in metres.
    pub const DEFAULT_STEP_M: f64 = DEFAULT_STEP_M;
    /// Default batch size.
    pub const DEFAULT_CHUNK_SIZE: usize = DEFAULT_CHUNK_SIZE;

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a non-positive step,
    /// a ring of fewer than 2 points, or an empty batch size.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.step_m.is_finite() && self.step_m > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "step_m must be finite and > 0, got {}",
                self.step_m
            )));
        }
        if let Some(n) = self.ring_points
            && n < 2
        {
            return Err(PipelineError::InvalidConfig(format!(
                "ring_points must be at least 2, got {n}"
            )));
        }
        if let Some(n) = self.max_ring_points
            && n < 2
        {
            return Err(PipelineError::InvalidConfig(format!(
                "max_ring_points must be at least 2, got {n}"
            )));
        }
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            step_m: DEFAULT_STEP_M,
            ring_points: None,
            max_ring_points: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A sampled scan trajectory in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Working zone the trajectory was built in.
    pub zone: UtmZone,
    /// Centre of the enclosing circle.
    pub centre: GeoPoint,
    /// Radius of the enclosing circle in metres.
    pub radius_m: f64,
    /// Points on the enclosing circle.
    pub ring: Vec<GeoPoint>,
    /// Chord samples, chord by chord.
    pub scan: Vec<GeoPoint>,
}

impl Trajectory {
    /// Scan points split into batches of at most `max_points`.
    pub fn chunks(&self, max_points: usize) -> std::slice::Chunks<'_, GeoPoint> {
        chunk(&self.scan, max_points)
    }
}

/// Split `points` into batches of at most `max_points` (minimum 1).
pub fn chunk(points: &[GeoPoint], max_points: usize) -> std::slice::Chunks<'_, GeoPoint> {
    points.chunks(max_points.max(1))
}

/// Build the scan trajectory for a contour.
///
/// # Errors
///
/// - [`PipelineError::InvalidConfig`] if `config` is out of range.
/// - [`PipelineError::NonFiniteSample`] for a NaN or infinite contour
///   coordinate.
/// - [`PipelineError::TooFewContourPoints`] if fewer than 3 distinct
///   contour points remain.
/// - [`PipelineError::InvalidLatitude`] outside the UTM band.
pub fn sample_trajectory(
    contour: &[GeoPoint],
    config: &SamplerConfig,
) -> Result<Trajectory, PipelineError> {
    config.validate()?;
    if let Some(index) = contour
        .iter()
        .position(|p| !(p.lon.is_finite() && p.lat.is_finite()))
    {
        return Err(PipelineError::NonFiniteSample { index });
    }
    if contour.len() < 3 {
        return Err(PipelineError::TooFewContourPoints {
            found: contour.len(),
        });
    }

    let zone = UtmZone::from_centroid(contour)?;
    let mut projected: Vec<Point> = contour.iter().map(|&p| zone.forward(p)).collect();
    projected.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
    });
    projected.dedup();
    if projected.len() < 3 {
        return Err(PipelineError::TooFewContourPoints {
            found: projected.len(),
        });
    }

    let centre = mean(&projected);
    let radius = max_pairwise_distance(&projected);
    let n = ring_size(radius, config);
    let ring = ring_points(centre, radius, n);
    let scan = diametral_scan(&ring, config.step_m);

    log::info!(
        "sampled {} scan points on {n} chords (radius {radius:.1} m, {zone})",
        scan.len(),
    );

    Ok(Trajectory {
        zone,
        centre: zone.inverse(centre),
        radius_m: radius,
        ring: ring.into_iter().map(|p| zone.inverse(p)).collect(),
        scan: scan.into_iter().map(|p| zone.inverse(p)).collect(),
    })
}

fn mean(points: &[Point]) -> Point {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

fn max_pairwise_distance(points: &[Point]) -> f64 {
    let mut best = 0.0_f64;
    for (i, &a) in points.iter().enumerate() {
        for &b in &points[i + 1..] {
            best = best.max(a.distance_squared(b));
        }
    }
    best.sqrt()
}

fn ring_size(radius: f64, config: &SamplerConfig) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let derived = (TAU * radius).floor() as usize;
    let n = config.ring_points.unwrap_or_else(|| {
        config
            .max_ring_points
            .map_or(derived, |cap| derived.min(cap))
    });
    n.max(2)
}

/// `n` points on the circle, counter-clockwise from angle 0.
fn ring_points(centre: Point, radius: f64, n: usize) -> Vec<Point> {
    (0..n)
        .map(|k| {
            #[allow(clippy::cast_precision_loss)]
            let theta = TAU * k as f64 / n as f64;
            let (sin, cos) = theta.sin_cos();
            Point::new(
                radius.mul_add(cos, centre.x),
                radius.mul_add(sin, centre.y),
            )
        })
        .collect()
}

/// Sample every chord from the opposite ring point `p2` to `p1`,
/// excluding `p2` and including `p1`.
fn diametral_scan(ring: &[Point], step: f64) -> Vec<Point> {
    let n = ring.len();
    let mut scan = Vec::new();
    for (i, &p1) in ring.iter().enumerate() {
        let p2 = ring[(i + n / 2) % n];
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = ((p1.distance(p2) / step).floor() as usize).max(1);
        #[allow(clippy::cast_precision_loss)]
        let (vx, vy) = ((p1.x - p2.x) / steps as f64, (p1.y - p2.y) / steps as f64);
        scan.extend((1..=steps).map(|j| {
            #[allow(clippy::cast_precision_loss)]
            let j = j as f64;
            Point::new(vx.mul_add(j, p2.x), vy.mul_add(j, p2.y))
        }));
    }
    scan
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A small quadrilateral near Ouagadougou, roughly 110 m across.
    fn contour() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(-1.5200, 12.3700),
            GeoPoint::new(-1.5190, 12.3700),
            GeoPoint::new(-1.5190, 12.3708),
            GeoPoint::new(-1.5200, 12.3708),
            GeoPoint::new(-1.5200, 12.3700),
        ]
    }

    fn small_ring() -> SamplerConfig {
        SamplerConfig {
            ring_points: Some(8),
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let config = SamplerConfig::default();
        assert!((config.step_m - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.chunk_size, 400);
        assert!(config.ring_points.is_none());
        assert!(config.max_ring_points.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_config() {
        let zero_step = SamplerConfig {
            step_m: 0.0,
            ..SamplerConfig::default()
        };
        assert!(matches!(
            zero_step.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
        let one_ring = SamplerConfig {
            ring_points: Some(1),
            ..SamplerConfig::default()
        };
        assert!(one_ring.validate().is_err());
        let no_chunk = SamplerConfig {
            chunk_size: 0,
            ..SamplerConfig::default()
        };
        assert!(no_chunk.validate().is_err());
    }

    #[test]
    fn too_few_contour_points() {
        let result = sample_trajectory(&contour()[..2], &SamplerConfig::default());
        assert_eq!(result, Err(PipelineError::TooFewContourPoints { found: 2 }));
    }

    #[test]
    fn coincident_contour_is_rejected() {
        let p = GeoPoint::new(-1.52, 12.37);
        let result = sample_trajectory(&[p, p, p, p], &SamplerConfig::default());
        assert_eq!(result, Err(PipelineError::TooFewContourPoints { found: 1 }));
    }

    #[test]
    fn non_finite_contour_is_rejected() {
        let mut points = contour();
        points[2].lat = f64::NAN;
        let result = sample_trajectory(&points, &SamplerConfig::default());
        assert_eq!(result, Err(PipelineError::NonFiniteSample { index: 2 }));
    }

    #[test]
    fn ring_lies_on_enclosing_circle() {
        let trajectory = sample_trajectory(&contour(), &small_ring()).unwrap();
        assert_eq!(trajectory.ring.len(), 8);
        let centre = trajectory.zone.forward(trajectory.centre);
        for &p in &trajectory.ring {
            let d = trajectory.zone.forward(p).distance(centre);
            assert!((d - trajectory.radius_m).abs() < 1e-3, "d = {d}");
        }
        // Diagonal of a ~108 m x ~88 m rectangle.
        assert!(trajectory.radius_m > 130.0 && trajectory.radius_m < 150.0);
    }

    #[test]
    fn chords_end_on_their_ring_point() {
        let trajectory = sample_trajectory(&contour(), &small_ring()).unwrap();
        let radius = trajectory.radius_m;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let per_chord = (2.0 * radius / 10.0).floor() as usize;
        assert_eq!(trajectory.scan.len(), 8 * per_chord);

        let zone = trajectory.zone;
        let first_end = zone.forward(trajectory.scan[per_chord - 1]);
        assert!(first_end.distance(zone.forward(trajectory.ring[0])) < 1e-3);

        // Consecutive samples along one chord are one step apart.
        let a = zone.forward(trajectory.scan[0]);
        let b = zone.forward(trajectory.scan[1]);
        let step = 2.0 * radius / f64::from(u32::try_from(per_chord).unwrap());
        assert!((a.distance(b) - step).abs() < 1e-3);
    }

    #[test]
    fn derived_ring_size_follows_circumference() {
        let trajectory = sample_trajectory(&contour(), &SamplerConfig::default()).unwrap();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let expected = (TAU * trajectory.radius_m).floor() as usize;
        assert_eq!(trajectory.ring.len(), expected);
    }

    #[test]
    fn ring_size_cap_applies_to_derived_count() {
        let config = SamplerConfig {
            max_ring_points: Some(12),
            ..SamplerConfig::default()
        };
        assert_eq!(ring_size(1000.0, &config), 12);
        assert_eq!(ring_size(1.0, &config), 6);
        assert_eq!(ring_size(0.1, &SamplerConfig::default()), 2);
    }

    #[test]
    fn short_chords_still_emit_one_point() {
        let ring = ring_points(Point::new(0.0, 0.0), 2.0, 4);
        let scan = diametral_scan(&ring, 10.0);
        assert_eq!(scan.len(), 4);
        for (s, r) in scan.iter().zip(&ring) {
            assert!(s.distance(*r) < 1e-12);
        }
    }

    #[test]
    fn chunks_respect_batch_size() {
        let points: Vec<GeoPoint> = (0..1001)
            .map(|i| GeoPoint::new(f64::from(i) * 1e-5, 0.0))
            .collect();
        let sizes: Vec<usize> = chunk(&points, DEFAULT_CHUNK_SIZE).map(<[GeoPoint]>::len).collect();
        assert_eq!(sizes, vec![400, 400, 201]);
        assert_eq!(chunk(&points, 0).count(), 1001);
    }
}
