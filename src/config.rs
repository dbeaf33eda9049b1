use std::path::Path;

use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    CompareError,
    Result,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// comparisons / (2 * greater_than_cutoff)
    Asymmetric,
    /// (|A| + |B|) / greater_than_cutoff
    SymmetricCount,
    /// 1 / (sAB / 2|A| + sBA / 2|B|) - 1
    NormalizedSymmetric,
}

impl DistanceMetric {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(DistanceMetric::Asymmetric),
            1 => Ok(DistanceMetric::SymmetricCount),
            2 => Ok(DistanceMetric::NormalizedSymmetric),
            other => Err(CompareError::Config(format!(
                "unknown distance metric {}, expected 0, 1 or 2",
                other
            ))),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            DistanceMetric::Asymmetric => 0,
            DistanceMetric::SymmetricCount => 1,
            DistanceMetric::NormalizedSymmetric => 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityFunction {
    DotProduct,
    SpectralAngle,
}

impl SimilarityFunction {
    pub fn code(&self) -> u8 {
        match self {
            SimilarityFunction::DotProduct => 0,
            SimilarityFunction::SpectralAngle => 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QcMeasure {
    /// Number of spectra read from the dataset.
    SpectrumCount,
}

impl QcMeasure {
    pub fn code(&self) -> u8 {
        match self {
            QcMeasure::SpectrumCount => 0,
        }
    }
}

/// Upper limit on the number of m/z bins, each spectrum is binned into a
/// dense buffer of this length before being made sparse.
pub const MAX_BINS: usize = 10_000_000;

/// Every tunable of a comparison run.
///
/// Built once from the config file and CLI overrides, validated, and then
/// only read by the engine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ComparisonConfig {
    pub bin_size: f64,
    pub min_mz: f64,
    pub max_mz: f64,
    pub noise: f64,
    pub scaling: f64,
    pub max_scan_diff: f64,
    pub max_rt_diff: f64,
    pub max_precursor_diff: f64,
    pub scan_range: (i64, i64),
    pub rt_range: (f64, f64),
    pub min_peaks: usize,
    pub min_base_peak: f64,
    pub min_total_ion_current: f64,
    pub cutoff: f64,
    pub metric: DistanceMetric,
    pub similarity: SimilarityFunction,
    pub qc: QcMeasure,
    pub precursor_diff_histogram: bool,
    pub top_n: Option<usize>,
    pub max_peaks: Option<usize>,
    pub threads: Option<usize>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            bin_size: 0.2,
            min_mz: 109.,
            max_mz: 2000.,
            noise: 10.,
            scaling: 0.5,
            max_scan_diff: 10000.,
            max_rt_diff: 60.,
            max_precursor_diff: 2.05,
            scan_range: (1, 1_000_000),
            rt_range: (0., 100_000.),
            min_peaks: 20,
            min_base_peak: 10000.,
            min_total_ion_current: 0.,
            cutoff: 0.8,
            metric: DistanceMetric::NormalizedSymmetric,
            similarity: SimilarityFunction::DotProduct,
            qc: QcMeasure::SpectrumCount,
            precursor_diff_histogram: false,
            top_n: None,
            max_peaks: None,
            threads: None,
        }
    }
}

impl ComparisonConfig {
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str =
            std::fs::read_to_string(path).map_err(|e| CompareError::io(path, e))?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: ComparisonConfig = toml::from_str(config_str)?;
        Ok(config)
    }

    /// Number of m/z bins covering `[min_mz, max_mz)`.
    pub fn n_bins(&self) -> usize {
        let span = (self.max_mz - self.min_mz) / self.bin_size;
        span.ceil() as usize
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(CompareError::Config(msg));

        for (name, value) in [
            ("bin_size", self.bin_size),
            ("min_mz", self.min_mz),
            ("max_mz", self.max_mz),
        ] {
            if !value.is_finite() {
                return fail(format!("{} must be a finite number, got {}", name, value));
            }
        }
        if !(self.bin_size > 0.) {
            return fail(format!("bin_size must be positive, got {}", self.bin_size));
        }
        if !(self.min_mz < self.max_mz) {
            return fail(format!(
                "min_mz ({}) must be smaller than max_mz ({})",
                self.min_mz, self.max_mz
            ));
        }
        let span = (self.max_mz - self.min_mz) / self.bin_size;
        if !(span.ceil() >= 1. && span.ceil() <= MAX_BINS as f64) {
            return fail(format!(
                "m/z range [{}, {}) with bin_size {} gives {} bins, expected 1 to {}",
                self.min_mz,
                self.max_mz,
                self.bin_size,
                span.ceil(),
                MAX_BINS
            ));
        }
        if !(self.scaling > 0. && self.scaling <= 1.) {
            return fail(format!(
                "scaling must be in (0, 1], got {}",
                self.scaling
            ));
        }
        for (name, value) in [
            ("noise", self.noise),
            ("max_scan_diff", self.max_scan_diff),
            ("max_rt_diff", self.max_rt_diff),
            ("max_precursor_diff", self.max_precursor_diff),
            ("min_base_peak", self.min_base_peak),
            ("min_total_ion_current", self.min_total_ion_current),
        ] {
            if value.is_nan() || value < 0. {
                return fail(format!("{} must be non-negative, got {}", name, value));
            }
        }
        if self.scan_range.0 > self.scan_range.1 {
            return fail(format!(
                "scan_range start ({}) is after its end ({})",
                self.scan_range.0, self.scan_range.1
            ));
        }
        if !(self.rt_range.0 <= self.rt_range.1) {
            return fail(format!(
                "rt_range start ({}) is after its end ({})",
                self.rt_range.0, self.rt_range.1
            ));
        }
        if !(-1. ..=1.).contains(&self.cutoff) {
            return fail(format!("cutoff must be in [-1, 1], got {}", self.cutoff));
        }
        if self.threads == Some(0) {
            return fail("threads must be at least 1".into());
        }
        if self.max_peaks == Some(0) {
            return fail("max_peaks must be at least 1".into());
        }
        Ok(())
    }
}
