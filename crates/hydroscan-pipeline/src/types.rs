//! Shared types for the hydroscan inference pipeline.

use serde::{Deserialize, Serialize};

use crate::alignment::DEFAULT_ANGLE_TOLERANCE_DEG;
use crate::dolines::{DEFAULT_DOLINE_MIN_SAMPLES, DEFAULT_DOLINE_PERCENTILE};
use crate::intersections::OverlapPolicy;
use crate::projection::{CoordinateFrame, PlanarFrame, UtmZone};
use crate::prominence::{DEFAULT_DENSITY_DIVISOR, DEFAULT_THRESHOLDS};

/// A geographic position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees, positive east.
    pub lon: f64,
    /// Latitude in degrees, positive north.
    pub lat: f64,
}

impl GeoPoint {
    /// Create a new geographic point.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// One elevation-tagged point of the scan trajectory.
///
/// An elevation of `0.0` is a legitimate value: the enrichment service
/// reports it when it has nothing better, and the pipeline never treats
/// it as missing data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Elevation in metres.
    pub elevation: f64,
}

impl Sample {
    /// Create a new sample.
    #[must_use]
    pub const fn new(lon: f64, lat: f64, elevation: f64) -> Self {
        Self {
            lon,
            lat,
            elevation,
        }
    }

    /// The horizontal position of this sample.
    #[must_use]
    pub const fn position(self) -> GeoPoint {
        GeoPoint::new(self.lon, self.lat)
    }

    /// Whether all three components are finite numbers.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.lon.is_finite() && self.lat.is_finite() && self.elevation.is_finite()
    }
}

/// A 2D point in the planar (metric) working frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Easting (metres in UTM, degrees of longitude in the geographic frame).
    pub x: f64,
    /// Northing (metres in UTM, degrees of latitude in the geographic frame).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Bearing from `self` to `other`, in radians in `(-π, π]`.
    #[must_use]
    pub fn bearing_to(self, other: Self) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<geo::Coord<f64>> for Point {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

/// A candidate fracture line: a 3-vertex polyline through three
/// consecutive aligned salient points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateLine {
    /// Positions of the three vertices within the salient point set.
    pub indices: [usize; 3],
    /// The vertices in the planar frame.
    pub vertices: [Point; 3],
}

impl CandidateLine {
    /// Create a candidate line from salient-set indices and their coordinates.
    #[must_use]
    pub const fn new(indices: [usize; 3], vertices: [Point; 3]) -> Self {
        Self { indices, vertices }
    }

    /// The two segments of the polyline, in vertex order.
    #[must_use]
    pub fn segments(&self) -> [geo::Line<f64>; 2] {
        let [a, b, c] = self.vertices;
        [
            geo::Line::new(geo::Coord::from(a), geo::Coord::from(b)),
            geo::Line::new(geo::Coord::from(b), geo::Coord::from(c)),
        ]
    }

    /// Axis-aligned bounding box as `(min, max)` corners.
    #[must_use]
    pub fn bounds(&self) -> (Point, Point) {
        let [a, b, c] = self.vertices;
        (
            Point::new(a.x.min(b.x).min(c.x), a.y.min(b.y).min(c.y)),
            Point::new(a.x.max(b.x).max(c.x), a.y.max(b.y).max(c.y)),
        )
    }
}

/// A candidate drilling point: the intersection of two candidate lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionPoint {
    /// Location in the planar frame.
    pub point: Point,
    /// Indices (into the candidate line list) of the two lines, `lines[0] < lines[1]`.
    pub lines: [usize; 2],
}

/// A low-elevation depression zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doline {
    /// Closed exterior ring of the convex hull in the planar frame
    /// (first vertex repeated at the end).
    pub ring: Vec<Point>,
    /// Number of samples strictly below the cutoff.
    pub sample_count: usize,
    /// Elevation cutoff (the configured percentile) in metres.
    pub cutoff: f64,
    /// Hull area in square units of the planar frame.
    pub area: f64,
}

impl Doline {
    /// The hull as a `geo` polygon.
    #[must_use]
    pub fn polygon(&self) -> geo::Polygon<f64> {
        let exterior: Vec<geo::Coord<f64>> = self.ring.iter().copied().map(Into::into).collect();
        geo::Polygon::new(geo::LineString::new(exterior), Vec::new())
    }
}

/// Pipeline step that absorbed a corner case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageName {
    /// Prominence filter.
    Prominence,
    /// Line extraction.
    Alignment,
    /// Intersection aggregation.
    Intersections,
    /// Doline estimation.
    Dolines,
}

/// A recoverable corner case absorbed by a pipeline step.
///
/// Notices never abort the run: the affected artifact is simply empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// Fewer points than a construction step needs.
    InsufficientData {
        /// Step that produced the notice.
        stage: StageName,
        /// Points available.
        available: usize,
        /// Points required.
        required: usize,
    },
    /// Coincident or collinear points made a construction undefined.
    DegenerateGeometry {
        /// Step that produced the notice.
        stage: StageName,
        /// Number of degenerate cases encountered.
        count: usize,
    },
}

/// Configuration for the geometric inference pipeline.
///
/// All parameters have defaults matching the reference behaviour.
/// Call [`validate`](Self::validate) (the pipeline does so itself) to
/// reject out-of-range values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Prominence thresholds in metres, tried first to last.
    pub thresholds: Vec<f64>,

    /// Angular tolerance for line grouping, in degrees.
    pub angle_tolerance_deg: f64,

    /// A threshold is accepted once `count >= n / density_divisor`.
    pub density_divisor: f64,

    /// Elevation percentile below which samples count as depression points.
    pub doline_percentile: f64,

    /// Minimum number of samples in the table before a doline is estimated.
    pub doline_min_samples: usize,

    /// How collinear overlaps between two candidate lines are reported.
    pub overlap_policy: OverlapPolicy,

    /// Planar frame used for every geometric computation.
    pub frame: CoordinateFrame,
}

impl InferenceConfig {
    /// Default prominence ladder.
    pub const DEFAULT_THRESHOLDS: [f64; 4] = DEFAULT_THRESHOLDS;
    /// Default angular tolerance in degrees.
    pub const DEFAULT_ANGLE_TOLERANCE_DEG: f64 = DEFAULT_ANGLE_TOLERANCE_DEG;
    /// Default density divisor.
    pub const DEFAULT_DENSITY_DIVISOR: f64 = DEFAULT_DENSITY_DIVISOR;
    /// Default doline percentile.
    pub const DEFAULT_DOLINE_PERCENTILE: f64 = DEFAULT_DOLINE_PERCENTILE;
    /// Default minimum sample count for doline estimation.
    pub const DEFAULT_DOLINE_MIN_SAMPLES: usize = DEFAULT_DOLINE_MIN_SAMPLES;

    /// Angular tolerance converted to radians.
    #[must_use]
    pub fn angle_tolerance_rad(&self) -> f64 {
        self.angle_tolerance_deg.to_radians()
    }

    /// Check every parameter against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending parameter.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.thresholds.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "thresholds must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .thresholds
            .iter()
            .find(|t| !t.is_finite() || **t < 0.0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold {bad} must be finite and non-negative"
            )));
        }
        if !self.angle_tolerance_deg.is_finite()
            || !(0.0..180.0).contains(&self.angle_tolerance_deg)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "angle_tolerance_deg {} must be in [0, 180)",
                self.angle_tolerance_deg
            )));
        }
        if !self.density_divisor.is_finite() || self.density_divisor <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "density_divisor {} must be finite and positive",
                self.density_divisor
            )));
        }
        if !(0.0..=100.0).contains(&self.doline_percentile) {
            return Err(PipelineError::InvalidConfig(format!(
                "doline_percentile {} must be in [0, 100]",
                self.doline_percentile
            )));
        }
        Ok(())
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            thresholds: Self::DEFAULT_THRESHOLDS.to_vec(),
            angle_tolerance_deg: Self::DEFAULT_ANGLE_TOLERANCE_DEG,
            density_divisor: Self::DEFAULT_DENSITY_DIVISOR,
            doline_percentile: Self::DEFAULT_DOLINE_PERCENTILE,
            doline_min_samples: Self::DEFAULT_DOLINE_MIN_SAMPLES,
            overlap_policy: OverlapPolicy::default(),
            frame: CoordinateFrame::default(),
        }
    }
}

/// Output of one inference run.
///
/// Geometry is held in the planar frame the run worked in; the
/// `*_geographic` accessors convert it back to longitude/latitude for
/// exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Planar frame used by the run.
    pub frame: PlanarFrame,
    /// Number of input samples.
    pub sample_count: usize,
    /// Prominence threshold actually used.
    pub threshold: f64,
    /// Indices (into the input samples) of the salient points, ascending.
    pub salient: Vec<usize>,
    /// Positions (into the salient set) of the aligned points, ascending.
    pub aligned: Vec<usize>,
    /// Candidate fracture lines.
    pub lines: Vec<CandidateLine>,
    /// Candidate drilling points, one entry per contributing line pair.
    pub intersections: Vec<IntersectionPoint>,
    /// Depression zone, if one could be built.
    pub doline: Option<Doline>,
    /// Corner cases absorbed during the run.
    pub notices: Vec<Notice>,
    /// Outline of the prospecting zone, when one was attached with
    /// [`with_contour`](Self::with_contour).
    #[serde(default)]
    pub contour: Vec<GeoPoint>,
}

impl InferenceResult {
    /// Attach the prospecting zone outline to the result.
    #[must_use]
    pub fn with_contour(mut self, contour: Vec<GeoPoint>) -> Self {
        self.contour = contour;
        self
    }

    /// The zone outline as a closed ring, or `None` with fewer than 3
    /// points.
    #[must_use]
    pub fn contour_ring(&self) -> Option<Vec<GeoPoint>> {
        if self.contour.len() < 3 {
            return None;
        }
        let mut ring = self.contour.clone();
        if ring.first() != ring.last() {
            ring.push(self.contour[0]);
        }
        Some(ring)
    }

    /// Area enclosed by the zone outline in square units of the
    /// planar frame (m² under UTM).
    #[must_use]
    pub fn contour_area(&self) -> Option<f64> {
        self.contour_area_in(self.frame)
    }

    /// Zone area in hectares, measured in the UTM zone of the outline
    /// whatever the working frame.
    #[must_use]
    pub fn contour_hectares(&self) -> Option<f64> {
        let zone = UtmZone::from_centroid(&self.contour).ok()?;
        self.contour_area_in(PlanarFrame::Utm(zone))
            .map(|m2| m2 / 10_000.0)
    }

    fn contour_area_in(&self, frame: PlanarFrame) -> Option<f64> {
        let ring: Vec<geo::Coord<f64>> = self
            .contour_ring()?
            .into_iter()
            .map(|p| frame.forward(p).into())
            .collect();
        let polygon = geo::Polygon::new(geo::LineString::new(ring), Vec::new());
        Some(geo::Area::unsigned_area(&polygon))
    }

    /// Candidate lines as geographic polylines.
    #[must_use]
    pub fn lines_geographic(&self) -> Vec<[GeoPoint; 3]> {
        self.lines
            .iter()
            .map(|line| line.vertices.map(|v| self.frame.inverse(v)))
            .collect()
    }

    /// Candidate drilling points in geographic coordinates.
    #[must_use]
    pub fn intersections_geographic(&self) -> Vec<GeoPoint> {
        self.intersections
            .iter()
            .map(|ix| self.frame.inverse(ix.point))
            .collect()
    }

    /// The doline's closed exterior ring in geographic coordinates.
    #[must_use]
    pub fn doline_geographic(&self) -> Option<Vec<GeoPoint>> {
        self.doline
            .as_ref()
            .map(|d| d.ring.iter().map(|&p| self.frame.inverse(p)).collect())
    }
}

/// Errors that can occur during pipeline processing.
///
/// Only structural violations of the input contract surface here;
/// geometric corner cases are absorbed as [`Notice`]s.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// No elevation-tagged points were supplied.
    #[error("no elevation-tagged points supplied")]
    EmptyInput,

    /// A sample carried a NaN or infinite component.
    #[error("sample {index} has a non-finite coordinate or elevation")]
    NonFiniteSample {
        /// Position of the offending sample.
        index: usize,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The contour has too few points to enclose an area.
    #[error("contour has {found} points, at least 3 are required")]
    TooFewContourPoints {
        /// Number of points found.
        found: usize,
    },

    /// The data lies outside the latitude band covered by UTM.
    #[error("latitude {lat} is outside the UTM band [-80, 84]")]
    InvalidLatitude {
        /// Offending latitude in degrees.
        lat: f64,
    },
}
