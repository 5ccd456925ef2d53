//! hydroscan-pipeline: geometric inference over elevation-tagged
//! trajectories (sans-IO).
//!
//! Turns a sequence of `(longitude, latitude, elevation)` samples into
//! candidate geological features through:
//! validate -> project -> prominence filter -> line extraction ->
//! intersection aggregation -> doline estimation.
//!
//! The [`sampler`] module builds the scan trajectory that is sent for
//! elevation enrichment in the first place.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! slices and returns structured data. File formats live in
//! `hydroscan-formats`, filesystem access in the `hydroscan` binary.

pub mod alignment;
pub mod diagnostics;
pub mod dolines;
pub mod intersections;
pub mod pipeline;
pub mod projection;
pub mod prominence;
pub mod sampler;
pub mod types;

pub use intersections::OverlapPolicy;
pub use pipeline::Pipeline;
pub use projection::{CoordinateFrame, PlanarFrame, UtmZone};
pub use sampler::{SamplerConfig, Trajectory};
pub use types::{
    CandidateLine, Doline, GeoPoint, InferenceConfig, InferenceResult, IntersectionPoint, Notice,
    PipelineError, Point, Sample, StageName,
};

/// Run the full inference pipeline.
///
/// # Pipeline steps
///
/// 1. Validate configuration and samples
/// 2. Project to the planar working frame
/// 3. Prominence filter (adaptive threshold ladder)
/// 4. Line extraction (angular alignment around each salient point)
/// 5. Pairwise line intersections
/// 6. Doline hull over the lowest samples
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for an out-of-range
/// parameter, [`PipelineError::EmptyInput`] if `samples` is empty,
/// [`PipelineError::NonFiniteSample`] for a NaN or infinite sample, and
/// [`PipelineError::InvalidLatitude`] when UTM projection is impossible.
pub fn process(
    samples: &[Sample],
    config: &InferenceConfig,
) -> Result<InferenceResult, PipelineError> {
    let result = Pipeline::new(samples.to_vec(), config.clone())
        .validate()?
        .project()?
        .filter()
        .extract_lines()
        .intersect()
        .estimate_dolines()
        .into_result();
    log::info!(
        "{} samples -> {} salient, {} lines, {} intersections, doline: {}",
        result.sample_count,
        result.salient.len(),
        result.lines.len(),
        result.intersections.len(),
        if result.doline.is_some() { "yes" } else { "no" },
    );
    Ok(result)
}
