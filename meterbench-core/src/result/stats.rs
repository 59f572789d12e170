use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics as _;

/// Summary statistics over the raw samples of one meter at one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub sample_count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sum of squared samples.
    pub square_sum: f64,
    /// Sample standard deviation (Bessel-corrected); 0 for a single sample.
    pub standard_deviation: f64,
    /// Empirical 5th percentile.
    pub conf05: f64,
    /// Empirical 95th percentile.
    pub conf95: f64,
}

impl Statistics {
    /// Compute statistics over `samples`. Returns `None` when empty.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Some(Self {
            sample_count: samples.len(),
            sum: samples.iter().sum(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: samples.iter().mean(),
            square_sum: square_sum(samples),
            standard_deviation: standard_deviation(samples),
            conf05: percentile(&sorted, 5.0),
            conf95: percentile(&sorted, 95.0),
        })
    }
}

pub(crate) fn square_sum(samples: &[f64]) -> f64 {
    samples.iter().map(|v| v * v).sum()
}

pub(crate) fn standard_deviation(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    samples.iter().std_dev()
}

/// Percentile of an ascending slice, interpolating linearly between the
/// closest ranks.
///
/// This is the R-7 estimator (rank `p/100 * (n - 1)`, as in NumPy's default
/// and Excel's `PERCENTILE.INC`). Results lie between sample values, so the
/// 5th and 95th percentiles of `[3, 5, 7, 11, 13]` are 3.4 and 12.6 rather
/// than the bounding samples 3 and 13.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = rank - lower as f64;
            sorted[lower] + fraction * (sorted[upper] - sorted[lower])
        }
    }
}
