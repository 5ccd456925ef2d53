//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`process_with_diagnostics`] runs the same stages as
//! [`process`](crate::process) and records a [`StageDiagnostics`] after
//! each one. The caller supplies the time source through [`Clock`], so
//! the library itself never reads the system clock.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::intersections::OverlapPolicy;
use crate::pipeline::{Pipeline, PipelineStage};
use crate::projection::PlanarFrame;
use crate::types::{InferenceConfig, InferenceResult, PipelineError, Sample};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Input contract check.
    pub validate: StageDiagnostics,
    /// Projection to the planar frame.
    pub project: StageDiagnostics,
    /// Prominence filter.
    pub filter: StageDiagnostics,
    /// Line extraction.
    pub extract: StageDiagnostics,
    /// Intersection aggregation.
    pub intersect: StageDiagnostics,
    /// Doline estimation.
    pub doline: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Input validation metrics.
    Validate {
        /// Number of samples.
        sample_count: usize,
        /// Samples whose elevation is exactly zero.
        zero_elevation_count: usize,
    },
    /// Projection metrics.
    Project {
        /// Frame the run works in.
        frame: PlanarFrame,
        /// Width of the planar bounding box.
        extent_x: f64,
        /// Height of the planar bounding box.
        extent_y: f64,
    },
    /// Prominence filter metrics.
    Filter {
        /// Threshold that was used.
        threshold: f64,
        /// Number of salient points.
        salient_count: usize,
        /// Acceptance bar `n / density_divisor`.
        density_bar: f64,
    },
    /// Line extraction metrics.
    Extract {
        /// Angular tolerance in degrees.
        tolerance_deg: f64,
        /// Number of aligned salient points.
        aligned_count: usize,
        /// Number of candidate lines.
        line_count: usize,
        /// Bearings skipped between coincident points.
        skipped_coincident: usize,
    },
    /// Intersection aggregation metrics.
    Intersect {
        /// Overlap policy in force.
        policy: OverlapPolicy,
        /// Line pairs whose bounding boxes touched.
        pairs_tested: usize,
        /// Tested pairs overlapping along a positive length.
        overlapping_pairs: usize,
        /// Intersection points reported.
        point_count: usize,
    },
    /// Doline estimation metrics.
    Doline {
        /// Configured percentile.
        percentile: f64,
        /// Samples strictly below the cutoff.
        low_point_count: usize,
        /// Elevation cutoff, when a doline was built.
        cutoff: Option<f64>,
        /// Hull area, when a doline was built.
        area: Option<f64>,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Number of input samples.
    pub sample_count: usize,
    /// Number of salient points.
    pub salient_count: usize,
    /// Number of candidate lines.
    pub line_count: usize,
    /// Number of intersection points.
    pub intersection_count: usize,
    /// Whether a doline was built.
    pub doline_found: bool,
    /// Number of absorbed corner cases.
    pub notice_count: usize,
}

/// Time one stage transition and record its metrics.
fn timed<C: Clock, S: PipelineStage, E>(
    clock: &C,
    step: impl FnOnce() -> Result<S, E>,
) -> Result<(S, StageDiagnostics), E> {
    let start = clock.now();
    let stage = step()?;
    let duration = clock.elapsed(&start);
    let metrics = stage.metrics();
    log::trace!("stage {} took {duration:?}", S::NAME);
    Ok((stage, StageDiagnostics { duration, metrics }))
}

/// Run the full pipeline, collecting per-stage diagnostics.
///
/// # Errors
///
/// Returns the same errors as [`process`](crate::process).
pub fn process_with_diagnostics<C: Clock>(
    samples: &[Sample],
    config: &InferenceConfig,
    clock: &C,
) -> Result<(InferenceResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let pending = Pipeline::new(samples.to_vec(), config.clone());

    let (validated, validate) = timed(clock, || pending.validate())?;
    let (projected, project) = timed(clock, || validated.project())?;
    let (filtered, filter) = timed(clock, || Ok::<_, PipelineError>(projected.filter()))?;
    let (lines, extract) = timed(clock, || Ok::<_, PipelineError>(filtered.extract_lines()))?;
    let (intersected, intersect) = timed(clock, || Ok::<_, PipelineError>(lines.intersect()))?;
    let (complete, doline) = timed(clock, || {
        Ok::<_, PipelineError>(intersected.estimate_dolines())
    })?;

    let result = complete.into_result();
    let total_duration = clock.elapsed(&start);

    let summary = PipelineSummary {
        sample_count: result.sample_count,
        salient_count: result.salient.len(),
        line_count: result.lines.len(),
        intersection_count: result.intersections.len(),
        doline_found: result.doline.is_some(),
        notice_count: result.notices.len(),
    };

    Ok((
        result,
        PipelineDiagnostics {
            validate,
            project,
            filter,
            extract,
            intersect,
            doline,
            total_duration,
            summary,
        },
    ))
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Inference Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!("Samples: {}", self.summary.sample_count));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Validate", &self.validate),
            ("Project", &self.project),
            ("Prominence", &self.filter),
            ("Alignment", &self.extract),
            ("Intersections", &self.intersect),
            ("Dolines", &self.doline),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Salient: {}  |  Lines: {}  |  Intersections: {}  |  Doline: {}  |  Notices: {}",
            self.summary.salient_count,
            self.summary.line_count,
            self.summary.intersection_count,
            if self.summary.doline_found { "yes" } else { "no" },
            self.summary.notice_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Validate {
            sample_count,
            zero_elevation_count,
        } => format!("{sample_count} samples ({zero_elevation_count} at 0 m)"),
        StageMetrics::Project {
            frame,
            extent_x,
            extent_y,
        } => format!("{frame} extent {extent_x:.1} x {extent_y:.1}"),
        StageMetrics::Filter {
            threshold,
            salient_count,
            density_bar,
        } => format!("threshold={threshold} {salient_count} salient (bar {density_bar:.3})"),
        StageMetrics::Extract {
            tolerance_deg,
            aligned_count,
            line_count,
            skipped_coincident,
        } => format!(
            "tol={tolerance_deg:.2}deg aligned={aligned_count} lines={line_count} coincident={skipped_coincident}",
        ),
        StageMetrics::Intersect {
            policy,
            pairs_tested,
            overlapping_pairs,
            point_count,
        } => format!(
            "{policy:?} {pairs_tested} pairs ({overlapping_pairs} overlapping) -> {point_count} pts",
        ),
        StageMetrics::Doline {
            percentile,
            low_point_count,
            cutoff,
            area,
        } => match (cutoff, area) {
            (Some(cutoff), Some(area)) => format!(
                "p{percentile:.0} cutoff={cutoff:.2} {low_point_count} pts area={area:.1}",
            ),
            _ => format!("p{percentile:.0} none ({low_point_count} low pts)"),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::projection::CoordinateFrame;

    /// Clock advancing one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get() + 1;
            self.0.set(t);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn samples() -> Vec<Sample> {
        (0..30)
            .map(|i| {
                let e = if i % 3 == 1 { 12.0 } else { 10.0 };
                Sample::new(f64::from(i) * 10.0, f64::from(i % 2), e)
            })
            .collect()
    }

    fn planar() -> InferenceConfig {
        InferenceConfig {
            frame: CoordinateFrame::Geographic,
            ..InferenceConfig::default()
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_match_result() {
        let clock = TickClock(Cell::new(0));
        let (result, diag) = process_with_diagnostics(&samples(), &planar(), &clock).unwrap();
        assert_eq!(diag.summary.sample_count, 30);
        assert_eq!(diag.summary.salient_count, result.salient.len());
        assert_eq!(diag.summary.line_count, result.lines.len());
        assert_eq!(diag.summary.notice_count, result.notices.len());
        assert!(matches!(
            diag.validate.metrics,
            StageMetrics::Validate {
                sample_count: 30,
                ..
            }
        ));
        assert!(diag.filter.duration > Duration::ZERO);
        assert!(diag.total_duration >= diag.doline.duration);
    }

    #[test]
    fn diagnostics_match_plain_process() {
        let clock = TickClock(Cell::new(0));
        let (result, _) = process_with_diagnostics(&samples(), &planar(), &clock).unwrap();
        assert_eq!(result, crate::process(&samples(), &planar()).unwrap());
    }

    #[test]
    fn errors_propagate() {
        let clock = TickClock(Cell::new(0));
        let result = process_with_diagnostics(&[], &planar(), &clock);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn report_lists_every_stage() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) = process_with_diagnostics(&samples(), &planar(), &clock).unwrap();
        let report = diag.report();
        assert!(report.contains("Inference Diagnostics Report"));
        for stage in [
            "Validate",
            "Project",
            "Prominence",
            "Alignment",
            "Intersections",
            "Dolines",
        ] {
            assert!(report.contains(stage), "missing {stage}");
        }
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) = process_with_diagnostics(&samples(), &planar(), &clock).unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json["total_duration"].is_f64());
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.summary.sample_count, 30);
        assert!(matches!(
            back.filter.metrics,
            StageMetrics::Filter {
                salient_count: 10,
                ..
            }
        ));
    }
}
