//! Prominence filter: keep samples that stand out from both neighbours.
//!
//! An interior sample `i` is a local peak at margin `x` when
//! `e[i] >= e[i-1] + x` and `e[i] >= e[i+1] + x`. Endpoints have only
//! one neighbour and are never selected.
//!
//! The margin is chosen adaptively: thresholds are tried in order and
//! the first one whose peak count reaches `n / density_divisor` wins.
//! When none does, the last threshold's peaks are used anyway. A small
//! or empty result is valid output, not an error.

/// Default prominence ladder in metres, tried first to last.
pub const DEFAULT_THRESHOLDS: [f64; 4] = [1.0, 0.75, 0.5, 0.25];

/// Default density divisor: a threshold is accepted once it keeps at
/// least one sample in 500.
pub const DEFAULT_DENSITY_DIVISOR: f64 = 500.0;

/// Output of [`filter_prominent`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProminenceResult {
    /// Indices of the selected samples, ascending.
    pub indices: Vec<usize>,
    /// The threshold that produced `indices`.
    pub threshold: f64,
}

/// Collect the indices of local peaks exceeding both neighbours by `margin`.
///
/// `out` is cleared first and reused, so repeated calls over a ladder
/// of thresholds do not reallocate.
pub fn local_peaks(elevations: &[f64], margin: f64, out: &mut Vec<usize>) {
    out.clear();
    for (offset, w) in elevations.windows(3).enumerate() {
        if w[1] >= w[0] + margin && w[1] >= w[2] + margin {
            out.push(offset + 1);
        }
    }
}

/// Select salient samples with the adaptive threshold ladder.
///
/// With fewer than 3 elevations there is nothing to compare: the result
/// is empty and reports the last threshold of the ladder. An empty
/// ladder yields no indices and a threshold of `0.0`.
///
/// # Examples
///
/// ```
/// use hydroscan_pipeline::prominence::{filter_prominent, DEFAULT_THRESHOLDS};
///
/// let elevations = [10.0, 10.0, 12.0, 10.0, 10.0, 9.0, 10.0, 15.0, 10.0, 10.0];
/// let result = filter_prominent(&elevations, &DEFAULT_THRESHOLDS, 500.0);
/// assert_eq!(result.indices, vec![2, 7]);
/// assert_eq!(result.threshold, 1.0);
/// ```
#[must_use]
pub fn filter_prominent(
    elevations: &[f64],
    thresholds: &[f64],
    density_divisor: f64,
) -> ProminenceResult {
    let Some(&last) = thresholds.last() else {
        return ProminenceResult {
            indices: Vec::new(),
            threshold: 0.0,
        };
    };
    let n = elevations.len();
    if n < 3 {
        return ProminenceResult {
            indices: Vec::new(),
            threshold: last,
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let required = n as f64 / density_divisor;
    let mut indices = Vec::new();
    for &threshold in thresholds {
        local_peaks(elevations, threshold, &mut indices);
        #[allow(clippy::cast_precision_loss)]
        let count = indices.len() as f64;
        if count >= required {
            log::debug!(
                "prominence threshold {threshold} accepted: {} peaks (required {required:.3})",
                indices.len(),
            );
            return ProminenceResult { indices, threshold };
        }
    }

    // The last iteration already computed the fallback threshold's peaks.
    log::debug!(
        "no prominence threshold reached {required:.3} peaks; falling back to {last} with {}",
        indices.len(),
    );
    ProminenceResult {
        indices,
        threshold: last,
    }
}
