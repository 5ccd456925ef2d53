//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! [`crate::process`] runs everything in one call. [`Pipeline`] lets the
//! caller drive execution one step at a time:
//!
//! ```rust
//! # use hydroscan_pipeline::{InferenceConfig, Pipeline, PipelineError, Sample};
//! # fn run(samples: Vec<Sample>) -> Result<(), PipelineError> {
//! let filtered = Pipeline::new(samples, InferenceConfig::default())
//!     .validate()?
//!     .project()?
//!     .filter();
//! println!("threshold {}", filtered.threshold());
//!
//! let result = filtered
//!     .extract_lines()
//!     .intersect()
//!     .estimate_dolines()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for the two fallible stages), carrying every earlier
//! intermediate with it. Skipping a stage or calling stages out of order
//! is a compile-time error.
//!
//! Corner cases that leave an artifact empty (too few salient points,
//! collinear depression points, skipped overlaps) are recorded as
//! [`Notice`]s and never abort the run.

use crate::alignment::{Alignment, extract_lines};
use crate::diagnostics::StageMetrics;
use crate::dolines::{DolineEstimate, estimate_doline};
use crate::intersections::{Intersections, OverlapPolicy, intersect_lines};
use crate::projection::PlanarFrame;
use crate::prominence::{ProminenceResult, filter_prominent};
use crate::types::{
    CandidateLine, InferenceConfig, InferenceResult, IntersectionPoint, Notice, PipelineError,
    Point, Sample, StageName,
};

/// Fewest points that can form a candidate line.
const MIN_LINE_POINTS: usize = 3;
/// Fewest lines that can intersect.
const MIN_INTERSECTING_LINES: usize = 2;

fn note(notices: &mut Vec<Notice>, notice: Notice) {
    log::debug!("absorbed corner case: {notice:?}");
    notices.push(notice);
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`validate`](Self::validate) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .validate() to continue"]
pub struct Pending {
    config: InferenceConfig,
    samples: Vec<Sample>,
}

impl Pending {
    /// The raw input samples.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Check the configuration and the input contract.
    ///
    /// Elevation `0.0` is an ordinary value, not a missing one.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an out-of-range
    /// parameter, [`PipelineError::EmptyInput`] when there are no
    /// samples, and [`PipelineError::NonFiniteSample`] for the first
    /// sample carrying a NaN or infinite value.
    pub fn validate(self) -> Result<Validated, PipelineError> {
        self.config.validate()?;
        if self.samples.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if let Some(index) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(PipelineError::NonFiniteSample { index });
        }
        Ok(Validated {
            config: self.config,
            samples: self.samples,
        })
    }
}

// ───────────────────────── Stage 1: Validated ────────────────────────

/// Pipeline state after the input contract has been checked.
#[must_use = "pipeline stages are consumed by advancing; call .project() to continue"]
pub struct Validated {
    config: InferenceConfig,
    samples: Vec<Sample>,
}

impl Validated {
    /// The validated samples.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Resolve the planar frame and project every sample into it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidLatitude`] when the UTM frame is
    /// requested for data outside the UTM band.
    pub fn project(self) -> Result<Projected, PipelineError> {
        let positions: Vec<_> = self.samples.iter().map(|s| s.position()).collect();
        let frame = PlanarFrame::resolve(self.config.frame, &positions)?;
        let coords = positions.into_iter().map(|p| frame.forward(p)).collect();
        log::debug!("projected {} samples to {frame}", self.samples.len());
        Ok(Projected {
            config: self.config,
            samples: self.samples,
            frame,
            coords,
        })
    }
}

// ───────────────────────── Stage 2: Projected ────────────────────────

/// Pipeline state after projection to the planar working frame.
#[must_use = "pipeline stages are consumed by advancing; call .filter() to continue"]
pub struct Projected {
    config: InferenceConfig,
    samples: Vec<Sample>,
    frame: PlanarFrame,
    coords: Vec<Point>,
}

impl Projected {
    /// Frame every later stage works in.
    #[must_use]
    pub const fn frame(&self) -> PlanarFrame {
        self.frame
    }

    /// Planar coordinates, parallel to the samples.
    #[must_use]
    pub fn coords(&self) -> &[Point] {
        &self.coords
    }

    /// Select salient samples with the prominence ladder.
    pub fn filter(self) -> Filtered {
        let elevations: Vec<f64> = self.samples.iter().map(|s| s.elevation).collect();
        let prominence = filter_prominent(
            &elevations,
            &self.config.thresholds,
            self.config.density_divisor,
        );
        Filtered {
            config: self.config,
            frame: self.frame,
            coords: self.coords,
            elevations,
            prominence,
            notices: Vec::new(),
        }
    }
}

// ───────────────────────── Stage 3: Filtered ─────────────────────────

/// Pipeline state after the prominence filter.
#[must_use = "pipeline stages are consumed by advancing; call .extract_lines() to continue"]
pub struct Filtered {
    config: InferenceConfig,
    frame: PlanarFrame,
    coords: Vec<Point>,
    elevations: Vec<f64>,
    prominence: ProminenceResult,
    notices: Vec<Notice>,
}

impl Filtered {
    /// Sample indices of the salient points, ascending.
    #[must_use]
    pub fn salient(&self) -> &[usize] {
        &self.prominence.indices
    }

    /// The prominence threshold that was used.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.prominence.threshold
    }

    /// Cluster the salient points and build candidate lines.
    pub fn extract_lines(self) -> LinesExtracted {
        let mut notices = self.notices;
        let salient_coords: Vec<Point> = self
            .prominence
            .indices
            .iter()
            .map(|&i| self.coords[i])
            .collect();
        if salient_coords.len() < MIN_LINE_POINTS {
            note(
                &mut notices,
                Notice::InsufficientData {
                    stage: StageName::Alignment,
                    available: salient_coords.len(),
                    required: MIN_LINE_POINTS,
                },
            );
        }
        let alignment = extract_lines(&salient_coords, self.config.angle_tolerance_rad());
        if alignment.skipped_coincident > 0 {
            note(
                &mut notices,
                Notice::DegenerateGeometry {
                    stage: StageName::Alignment,
                    count: alignment.skipped_coincident,
                },
            );
        }
        LinesExtracted {
            config: self.config,
            frame: self.frame,
            coords: self.coords,
            elevations: self.elevations,
            prominence: self.prominence,
            alignment,
            notices,
        }
    }
}

// ───────────────────────── Stage 4: LinesExtracted ───────────────────

/// Pipeline state after line extraction.
#[must_use = "pipeline stages are consumed by advancing; call .intersect() to continue"]
pub struct LinesExtracted {
    config: InferenceConfig,
    frame: PlanarFrame,
    coords: Vec<Point>,
    elevations: Vec<f64>,
    prominence: ProminenceResult,
    alignment: Alignment,
    notices: Vec<Notice>,
}

impl LinesExtracted {
    /// Salient-set positions of the aligned points, ascending.
    #[must_use]
    pub fn aligned(&self) -> &[usize] {
        &self.alignment.aligned
    }

    /// Candidate lines.
    #[must_use]
    pub fn lines(&self) -> &[CandidateLine] {
        &self.alignment.lines
    }

    /// Intersect every pair of candidate lines.
    pub fn intersect(self) -> Intersected {
        let mut notices = self.notices;
        let lines = &self.alignment.lines;
        if lines.len() < MIN_INTERSECTING_LINES {
            note(
                &mut notices,
                Notice::InsufficientData {
                    stage: StageName::Intersections,
                    available: lines.len(),
                    required: MIN_INTERSECTING_LINES,
                },
            );
        }
        let intersections = intersect_lines(lines, self.config.overlap_policy);
        if self.config.overlap_policy == OverlapPolicy::Skip && intersections.overlapping_pairs > 0
        {
            note(
                &mut notices,
                Notice::DegenerateGeometry {
                    stage: StageName::Intersections,
                    count: intersections.overlapping_pairs,
                },
            );
        }
        Intersected {
            config: self.config,
            frame: self.frame,
            coords: self.coords,
            elevations: self.elevations,
            prominence: self.prominence,
            alignment: self.alignment,
            intersections,
            notices,
        }
    }
}

// ───────────────────────── Stage 5: Intersected ──────────────────────

/// Pipeline state after intersection aggregation.
#[must_use = "pipeline stages are consumed by advancing; call .estimate_dolines() to continue"]
pub struct Intersected {
    config: InferenceConfig,
    frame: PlanarFrame,
    coords: Vec<Point>,
    elevations: Vec<f64>,
    prominence: ProminenceResult,
    alignment: Alignment,
    intersections: Intersections,
    notices: Vec<Notice>,
}

impl Intersected {
    /// Candidate drilling points.
    #[must_use]
    pub fn intersections(&self) -> &[IntersectionPoint] {
        &self.intersections.points
    }

    /// Build the depression zone from the raw samples.
    pub fn estimate_dolines(self) -> Complete {
        let mut notices = self.notices;
        let estimate = estimate_doline(
            &self.coords,
            &self.elevations,
            self.config.doline_percentile,
            self.config.doline_min_samples,
        );
        match estimate {
            DolineEstimate::Found(_) => {}
            DolineEstimate::TooFewSamples {
                available,
                required,
            } => note(
                &mut notices,
                Notice::InsufficientData {
                    stage: StageName::Dolines,
                    available,
                    required,
                },
            ),
            DolineEstimate::TooFewLowPoints { available } => note(
                &mut notices,
                Notice::InsufficientData {
                    stage: StageName::Dolines,
                    available,
                    required: MIN_LINE_POINTS,
                },
            ),
            DolineEstimate::Degenerate { points } => note(
                &mut notices,
                Notice::DegenerateGeometry {
                    stage: StageName::Dolines,
                    count: points,
                },
            ),
        }
        Complete {
            config: self.config,
            frame: self.frame,
            sample_count: self.coords.len(),
            prominence: self.prominence,
            alignment: self.alignment,
            intersections: self.intersections,
            doline: estimate,
            notices,
        }
    }
}

// ───────────────────────── Stage 6: Complete ─────────────────────────

/// Final pipeline state.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`InferenceResult`].
#[must_use = "call .into_result() to extract the InferenceResult"]
pub struct Complete {
    config: InferenceConfig,
    frame: PlanarFrame,
    sample_count: usize,
    prominence: ProminenceResult,
    alignment: Alignment,
    intersections: Intersections,
    doline: DolineEstimate,
    notices: Vec<Notice>,
}

impl Complete {
    /// Outcome of doline estimation.
    #[must_use]
    pub const fn doline(&self) -> &DolineEstimate {
        &self.doline
    }

    /// Corner cases absorbed so far.
    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Consume the pipeline and return the [`InferenceResult`].
    #[must_use]
    pub fn into_result(self) -> InferenceResult {
        InferenceResult {
            frame: self.frame,
            sample_count: self.sample_count,
            threshold: self.prominence.threshold,
            salient: self.prominence.indices,
            aligned: self.alignment.aligned,
            lines: self.alignment.lines,
            intersections: self.intersections.points,
            doline: self.doline.into_doline(),
            notices: self.notices,
            contour: Vec::new(),
        }
    }
}

// ──────────────────────── PipelineStage trait ────────────────────────

/// Trait implemented by every stage that has done work, giving
/// diagnostics a uniform view of them.
pub trait PipelineStage {
    /// Human-readable name of the stage.
    const NAME: &str;

    /// Position of the stage in the chain (`1` for Validated through `6`
    /// for Complete).
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;
}

impl PipelineStage for Validated {
    const NAME: &str = "validate";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Validate {
            sample_count: self.samples.len(),
            zero_elevation_count: self
                .samples
                .iter()
                .filter(|s| s.elevation.abs() < f64::EPSILON)
                .count(),
        }
    }
}

impl PipelineStage for Projected {
    const NAME: &str = "project";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        let (min, max) = self.coords.iter().fold(
            (
                Point::new(f64::INFINITY, f64::INFINITY),
                Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            ),
            |(lo, hi), p| {
                (
                    Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                    Point::new(hi.x.max(p.x), hi.y.max(p.y)),
                )
            },
        );
        StageMetrics::Project {
            frame: self.frame,
            extent_x: (max.x - min.x).max(0.0),
            extent_y: (max.y - min.y).max(0.0),
        }
    }
}

impl PipelineStage for Filtered {
    const NAME: &str = "filter";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        #[allow(clippy::cast_precision_loss)]
        let density_bar = self.coords.len() as f64 / self.config.density_divisor;
        StageMetrics::Filter {
            threshold: self.prominence.threshold,
            salient_count: self.prominence.indices.len(),
            density_bar,
        }
    }
}

impl PipelineStage for LinesExtracted {
    const NAME: &str = "extract";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Extract {
            tolerance_deg: self.config.angle_tolerance_deg,
            aligned_count: self.alignment.aligned.len(),
            line_count: self.alignment.lines.len(),
            skipped_coincident: self.alignment.skipped_coincident,
        }
    }
}

impl PipelineStage for Intersected {
    const NAME: &str = "intersect";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Intersect {
            policy: self.config.overlap_policy,
            pairs_tested: self.intersections.pairs_tested,
            overlapping_pairs: self.intersections.overlapping_pairs,
            point_count: self.intersections.points.len(),
        }
    }
}

impl PipelineStage for Complete {
    const NAME: &str = "dolines";
    const INDEX: usize = 6;

    fn metrics(&self) -> StageMetrics {
        let (low_point_count, cutoff, area) = match &self.doline {
            DolineEstimate::Found(d) => (d.sample_count, Some(d.cutoff), Some(d.area)),
            DolineEstimate::TooFewSamples { .. } => (0, None, None),
            DolineEstimate::TooFewLowPoints { available } => (*available, None, None),
            DolineEstimate::Degenerate { points } => (*points, None, None),
        };
        StageMetrics::Doline {
            percentile: self.config.doline_percentile,
            low_point_count,
            cutoff,
            area,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental inference pipeline.
///
/// Created via [`Pipeline::new`], which stores the samples and config
/// without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from elevation-tagged samples and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(samples: Vec<Sample>, config: InferenceConfig) -> Pending {
        Pending { config, samples }
    }
}
