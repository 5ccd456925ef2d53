//! Doline estimation: the convex hull of the lowest samples.
//!
//! The cutoff is the configured percentile of all elevations, computed
//! with linear interpolation between the two nearest ranks. Samples
//! strictly below the cutoff form the low set; its convex hull is the
//! doline zone.

use geo::{Area, ConvexHull, MultiPoint};

use crate::types::{Doline, Point};

/// Default elevation percentile for the low set.
pub const DEFAULT_DOLINE_PERCENTILE: f64 = 25.0;

/// Default minimum number of samples before a doline is attempted.
pub const DEFAULT_DOLINE_MIN_SAMPLES: usize = 10;

/// Outcome of [`estimate_doline`].
#[derive(Debug, Clone, PartialEq)]
pub enum DolineEstimate {
    /// A hull with positive area.
    Found(Doline),
    /// The survey has fewer samples than the configured minimum.
    TooFewSamples {
        /// Samples supplied.
        available: usize,
        /// Configured minimum.
        required: usize,
    },
    /// Fewer than 3 samples lie strictly below the cutoff.
    TooFewLowPoints {
        /// Samples below the cutoff.
        available: usize,
    },
    /// The low samples are coincident or collinear: the hull has no area.
    Degenerate {
        /// Samples below the cutoff.
        points: usize,
    },
}

impl DolineEstimate {
    /// The doline, if one was found.
    #[must_use]
    pub fn into_doline(self) -> Option<Doline> {
        match self {
            Self::Found(doline) => Some(doline),
            _ => None,
        }
    }
}

/// Percentile `p` (0 to 100) of `values` with linear interpolation.
///
/// Returns `None` for an empty slice.
///
/// ```
/// use hydroscan_pipeline::dolines::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 25.0), Some(1.75));
/// assert_eq!(percentile(&[], 25.0), None);
/// ```
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    #[allow(clippy::cast_precision_loss)]
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    #[allow(clippy::cast_precision_loss)]
    let fraction = rank - lo as f64;
    Some((sorted[hi] - sorted[lo]).mul_add(fraction, sorted[lo]))
}

/// Estimate the doline zone from planar positions and their elevations.
///
/// `coords` and `elevations` are parallel slices.
#[must_use]
pub fn estimate_doline(
    coords: &[Point],
    elevations: &[f64],
    percentile_rank: f64,
    min_samples: usize,
) -> DolineEstimate {
    let n = coords.len().min(elevations.len());
    if n < min_samples.max(1) {
        return DolineEstimate::TooFewSamples {
            available: n,
            required: min_samples,
        };
    }
    let Some(cutoff) = percentile(&elevations[..n], percentile_rank) else {
        return DolineEstimate::TooFewSamples {
            available: 0,
            required: min_samples,
        };
    };

    let low: Vec<geo::Point<f64>> = coords[..n]
        .iter()
        .zip(&elevations[..n])
        .filter(|&(_, &e)| e < cutoff)
        .map(|(&p, _)| geo::Point::from(geo::Coord::from(p)))
        .collect();
    if low.len() < 3 {
        return DolineEstimate::TooFewLowPoints {
            available: low.len(),
        };
    }

    let sample_count = low.len();
    let hull = MultiPoint::new(low).convex_hull();
    let area = hull.unsigned_area();
    if area <= 0.0 {
        log::debug!("{sample_count} low points below {cutoff:.2} are collinear");
        return DolineEstimate::Degenerate {
            points: sample_count,
        };
    }

    log::debug!("doline hull over {sample_count} points below {cutoff:.2}, area {area:.1}");
    DolineEstimate::Found(Doline {
        ring: hull.exterior().coords().copied().map(Point::from).collect(),
        sample_count,
        cutoff,
        area,
    })
}
