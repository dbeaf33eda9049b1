use crate::config::DistanceMetric;
use crate::errors::{
    CompareError,
    Result,
};
use crate::scoring::matcher::MatchSummary;

/// Counters the set distance is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceInputs {
    pub s_ab: usize,
    pub s_ba: usize,
    pub size_a: usize,
    pub size_b: usize,
    pub comparisons: u64,
}

impl DistanceInputs {
    pub fn from_summary(
        summary: &MatchSummary,
        size_a: usize,
        size_b: usize,
    ) -> Self {
        DistanceInputs {
            s_ab: summary.s_ab,
            s_ba: summary.s_ba,
            size_a,
            size_b,
            comparisons: summary.comparisons,
        }
    }

    pub fn greater_than_cutoff(&self) -> usize {
        self.s_ab + self.s_ba
    }
}

fn asymmetric(inputs: &DistanceInputs) -> f64 {
    match inputs.greater_than_cutoff() {
        0 => f64::INFINITY,
        gtc => inputs.comparisons as f64 / (2. * gtc as f64),
    }
}

fn symmetric_count(inputs: &DistanceInputs) -> f64 {
    match inputs.greater_than_cutoff() {
        0 => f64::INFINITY,
        gtc => (inputs.size_a + inputs.size_b) as f64 / gtc as f64,
    }
}

fn normalized_symmetric(inputs: &DistanceInputs) -> f64 {
    let size_a = inputs.size_a as f64;
    let size_b = inputs.size_b as f64;
    let similarity = inputs.s_ab as f64 / (2. * size_a) + inputs.s_ba as f64 / (2. * size_b);
    if similarity > 0. {
        1. / similarity - 1.
    } else {
        // Nothing shared: grows with the dataset sizes instead of being inf
        4. * size_a * size_b / (size_a + size_b) - 1.
    }
}

/// Set distance between two datasets under the chosen metric.
///
/// Empty datasets are rejected, every other degenerate case has a defined
/// value (`+inf` or the size dependent fallback).
pub fn set_distance(
    inputs: &DistanceInputs,
    metric: DistanceMetric,
) -> Result<f64> {
    if inputs.size_a == 0 || inputs.size_b == 0 {
        return Err(CompareError::EmptyDataset(if inputs.size_a == 0 {
            "A".into()
        } else {
            "B".into()
        }));
    }
    let out = match metric {
        DistanceMetric::Asymmetric => asymmetric(inputs),
        DistanceMetric::SymmetricCount => symmetric_count(inputs),
        DistanceMetric::NormalizedSymmetric => normalized_symmetric(inputs),
    };
    Ok(out)
}
