use std::path::Path;
use std::sync::atomic::AtomicBool;

use log::{
    info,
    warn,
};
use serde::{
    Serialize,
    Serializer,
};

use crate::config::ComparisonConfig;
use crate::errors::{
    CompareError,
    InputWarning,
    Result,
};
use crate::ms::mgf::{
    read_mgf_file,
    MgfReadOptions,
};
use crate::ms::sorting::check_sort_order;
use crate::ms::spectrum::Dataset;
use crate::scoring::distance::{
    set_distance,
    DistanceInputs,
};
use crate::scoring::histogram::HistogramRow;
use crate::scoring::matcher::{
    match_datasets,
    MatchParams,
    MatchSummary,
};
use crate::scoring::topk::dataset_cutoff;
use crate::scoring::vectorize::Vectorizer;
use crate::utils;

fn serialize_distance<S>(
    distance: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if distance.is_finite() {
        serializer.serialize_f64(*distance)
    } else {
        serializer.serialize_str("INF")
    }
}

/// Windows the matcher actually applied, `None` where an axis was
/// disabled because a dataset lacked it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectiveWindows {
    pub max_scan_diff: Option<f64>,
    pub max_rt_diff: Option<f64>,
    pub scan_range: Option<(i64, i64)>,
    pub rt_range: Option<(f64, f64)>,
}

impl From<&MatchParams> for EffectiveWindows {
    fn from(params: &MatchParams) -> Self {
        let finite = |v: f64| if v.is_finite() { Some(v) } else { None };
        EffectiveWindows {
            max_scan_diff: finite(params.max_scan_diff),
            max_rt_diff: finite(params.max_rt_diff),
            scan_range: params.scan_range,
            rt_range: params.rt_range,
        }
    }
}

/// Everything a run produced, ready to be written out.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub dataset_a: String,
    pub dataset_b: String,
    pub size_a: usize,
    pub size_b: usize,
    pub qc_a: f64,
    pub qc_b: f64,
    #[serde(serialize_with = "serialize_distance")]
    pub set_distance: f64,
    pub metric: u8,
    pub n_gt_cutoff: usize,
    pub s_ab: usize,
    pub s_ba: usize,
    pub n_comparisons: u64,
    pub compared_a: usize,
    pub compared_b: usize,
    pub intensity_cutoff_a: Option<f64>,
    pub intensity_cutoff_b: Option<f64>,
    pub max_peaks: usize,
    pub n_bins: usize,
    pub config: ComparisonConfig,
    pub effective_windows: EffectiveWindows,
    pub warnings: Vec<String>,
    pub histogram: Vec<HistogramRow>,
    #[serde(skip)]
    pub matches: MatchSummary,
}

fn qc_value(
    config: &ComparisonConfig,
    dataset: &Dataset,
) -> f64 {
    match config.qc {
        crate::config::QcMeasure::SpectrumCount => dataset.len() as f64,
    }
}

/// Widens the windows for axes missing from either dataset.
fn resolve_missing_axes(
    a: &Dataset,
    b: &Dataset,
    params: &mut MatchParams,
) -> Vec<InputWarning> {
    let mut warnings = Vec::new();
    for ds in [a, b] {
        if !ds.has_scan_numbers {
            warnings.push(InputWarning::MissingScanNumbers {
                label: ds.label.clone(),
            });
        }
        if !ds.has_retention_times {
            warnings.push(InputWarning::MissingRetentionTimes {
                label: ds.label.clone(),
            });
        }
    }
    if !(a.has_scan_numbers && b.has_scan_numbers) {
        params.disable_scan_window();
    }
    if !(a.has_retention_times && b.has_retention_times) {
        params.disable_rt_window();
    }
    warnings
}

fn apply_top_n(
    dataset: &mut Dataset,
    top_n: usize,
    params: &MatchParams,
) {
    let cutoff = dataset_cutoff(dataset, top_n, |s| params.in_range(s));
    info!(
        "'{}': keeping the {} most intense spectra (total ion current >= {:.3})",
        dataset.label, top_n, cutoff
    );
    dataset.intensity_cutoff = Some(cutoff);
}

/// Runs a full comparison of two already parsed datasets.
///
/// Setting `cancel` from another thread stops matching early and returns
/// [`CompareError::Cancelled`].
pub fn compare_datasets(
    mut a: Dataset,
    mut b: Dataset,
    config: &ComparisonConfig,
    cancel: &AtomicBool,
    show_progress: bool,
) -> Result<ComparisonReport> {
    config.validate()?;
    for ds in [&a, &b] {
        if ds.is_empty() {
            return Err(CompareError::EmptyDataset(ds.label.clone()));
        }
    }
    let mut timer = utils::ContextTimer::new("compare_datasets", true, utils::LogLevel::INFO);

    let mut params = MatchParams::from(config);
    let mut warnings = resolve_missing_axes(&a, &b, &mut params);

    let (a_order, a_warnings) = check_sort_order(&a);
    let (b_order, b_warnings) = check_sort_order(&b);
    warnings.extend(a_warnings);
    warnings.extend(b_warnings);
    for w in warnings.iter() {
        warn!("{}", w);
    }

    if let Some(top_n) = config.top_n {
        apply_top_n(&mut a, top_n, &params);
        apply_top_n(&mut b, top_n, &params);
    }

    let vectorizer = Vectorizer::from(config);
    info!(
        "spectrum bin size {:.3} Th -> {} bins in [{:.3}, {:.3})",
        config.bin_size, vectorizer.n_bins, config.min_mz, config.max_mz
    );
    let a = vectorizer.vectorize_dataset(a);
    let b = vectorizer.vectorize_dataset(b);

    let run_matching =
        || match_datasets(&a, a_order, &b, b_order, &params, cancel, show_progress);
    let matches = match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| CompareError::Config(format!("could not start {} threads: {}", n, e)))?
            .install(run_matching)?,
        None => run_matching()?,
    };

    let inputs = DistanceInputs::from_summary(&matches, a.len(), b.len());
    let distance = set_distance(&inputs, config.metric)?;
    info!(
        "set distance {} (metric {}) between '{}' and '{}'",
        distance,
        config.metric.code(),
        a.label,
        b.label
    );
    timer.stop(true);

    Ok(ComparisonReport {
        dataset_a: a.label.clone(),
        dataset_b: b.label.clone(),
        size_a: a.len(),
        size_b: b.len(),
        qc_a: qc_value(config, &a),
        qc_b: qc_value(config, &b),
        set_distance: distance,
        metric: config.metric.code(),
        n_gt_cutoff: matches.greater_than_cutoff,
        s_ab: matches.s_ab,
        s_ba: matches.s_ba,
        n_comparisons: matches.comparisons,
        compared_a: matches.compared_a,
        compared_b: matches.compared_b,
        intensity_cutoff_a: a.intensity_cutoff,
        intensity_cutoff_b: b.intensity_cutoff,
        max_peaks: a.max_peak_count.max(b.max_peak_count),
        n_bins: vectorizer.n_bins,
        config: config.clone(),
        effective_windows: EffectiveWindows::from(&params),
        warnings: warnings.iter().map(|w| w.to_string()).collect(),
        histogram: matches.histogram.rows(),
        matches,
    })
}

/// Reads both MGF files and compares them.
///
/// The configuration is validated before any file is opened.
pub fn compare_files(
    path_a: impl AsRef<Path>,
    path_b: impl AsRef<Path>,
    config: &ComparisonConfig,
    cancel: &AtomicBool,
    show_progress: bool,
) -> Result<ComparisonReport> {
    config.validate()?;
    let options = MgfReadOptions {
        max_peaks: config.max_peaks,
    };
    let a = read_mgf_file(path_a, options)?;
    let b = read_mgf_file(path_b, options)?;
    compare_datasets(a, b, config, cancel, show_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceMetric;
    use crate::ms::spectrum::Spectrum;

    fn config() -> ComparisonConfig {
        ComparisonConfig {
            min_peaks: 1,
            min_base_peak: 0.,
            ..Default::default()
        }
    }

    fn peaks(shift: f64) -> Vec<(f64, f64)> {
        vec![
            (200. + shift, 1000.),
            (350. + shift, 400.),
            (500. + shift, 2500.),
        ]
    }

    fn run(
        a: Dataset,
        b: Dataset,
        config: &ComparisonConfig,
    ) -> ComparisonReport {
        compare_datasets(a, b, config, &AtomicBool::new(false), false).unwrap()
    }

    #[test]
    fn test_identical_single_spectra() {
        let a = Dataset::new("a", vec![Spectrum::new(1, 10., 600., peaks(0.))]);
        let b = Dataset::new("b", vec![Spectrum::new(1, 10., 600., peaks(0.))]);
        let report = run(a, b, &config());
        assert_eq!(report.n_gt_cutoff, 2);
        assert_eq!(report.s_ab, 1);
        assert_eq!(report.s_ba, 1);
        assert_eq!(report.set_distance, 0.);
        assert!(report.warnings.is_empty());
        let best = report.matches.best_similarity_a[0].unwrap();
        assert!((best - 1.).abs() < 1e-12);
    }

    #[test]
    fn test_no_precursor_overlap_uses_size_fallback() {
        let a = Dataset::new(
            "a",
            vec![
                Spectrum::new(1, 10., 600., peaks(0.)),
                Spectrum::new(2, 11., 700., peaks(0.)),
            ],
        );
        let b = Dataset::new("b", vec![Spectrum::new(1, 10., 900., peaks(0.))]);
        let report = run(a, b, &config());
        assert_eq!(report.n_comparisons, 0);
        assert_eq!(report.s_ab + report.s_ba, 0);
        assert_eq!(report.set_distance, 4. * 2. * 1. / 3. - 1.);
        assert!(report.set_distance.is_finite());
    }

    #[test]
    fn test_swapping_datasets_keeps_distance() {
        let a = Dataset::new(
            "a",
            vec![
                Spectrum::new(1, 10., 600., peaks(0.)),
                Spectrum::new(2, 12., 650., peaks(3.)),
                Spectrum::new(3, 14., 700., peaks(7.)),
            ],
        );
        let b = Dataset::new(
            "b",
            vec![
                Spectrum::new(1, 10., 600., peaks(0.)),
                Spectrum::new(2, 15., 700., peaks(40.)),
            ],
        );
        let ab = run(a.clone(), b.clone(), &config());
        let ba = run(b, a, &config());
        assert_eq!(ab.set_distance, ba.set_distance);
        assert_eq!(ab.s_ab, ba.s_ba);
        assert_eq!(ab.s_ba, ba.s_ab);
        assert_eq!(ab.n_comparisons, ba.n_comparisons);
    }

    #[test]
    fn test_missing_scans_disable_window() {
        let mut a = Dataset::new("a", vec![Spectrum::new(0, 10., 600., peaks(0.))]);
        a.has_scan_numbers = false;
        let b = Dataset::new("b", vec![Spectrum::new(50_000, 10., 600., peaks(0.))]);
        let report = run(a, b, &config());
        assert_eq!(report.n_comparisons, 2);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("scan"));
        assert_eq!(report.config.max_scan_diff, 10000.);
        assert_eq!(report.effective_windows.max_scan_diff, None);
        assert_eq!(report.effective_windows.scan_range, None);
        assert_eq!(report.effective_windows.max_rt_diff, Some(60.));
        assert_eq!(report.effective_windows.rt_range, Some((0., 100_000.)));
    }

    #[test]
    fn test_top_n_restricts_anchors() {
        let spectra = |label: &str| {
            Dataset::new(
                label,
                (1..=4)
                    .map(|i| {
                        let p = peaks(0.)
                            .into_iter()
                            .map(|(mz, int)| (mz, int * i as f64))
                            .collect();
                        Spectrum::new(i, i as f64, 600., p)
                    })
                    .collect(),
            )
        };
        let config = ComparisonConfig {
            top_n: Some(2),
            ..config()
        };
        let report = run(spectra("a"), spectra("b"), &config);
        assert_eq!(report.compared_a, 2);
        assert_eq!(report.compared_b, 2);
        assert_eq!(report.n_comparisons, 8);
        assert!(report.intensity_cutoff_a.is_some());
    }

    #[test]
    fn test_empty_dataset_is_error() {
        let a = Dataset::new("a", vec![]);
        let b = Dataset::new("b", vec![Spectrum::new(1, 10., 600., peaks(0.))]);
        let out = compare_datasets(a, b, &config(), &AtomicBool::new(false), false);
        assert!(matches!(out, Err(CompareError::EmptyDataset(label)) if label == "a"));
    }

    #[test]
    fn test_invalid_config_fails_before_io() {
        let config = ComparisonConfig {
            bin_size: 0.,
            ..config()
        };
        let out = compare_files(
            "missing_a.mgf",
            "missing_b.mgf",
            &config,
            &AtomicBool::new(false),
            false,
        );
        assert!(matches!(out, Err(CompareError::Config(_))));
    }

    #[test]
    fn test_cancel_flag_stops_comparison() {
        let a = Dataset::new("a", vec![Spectrum::new(1, 10., 600., peaks(0.))]);
        let b = Dataset::new("b", vec![Spectrum::new(1, 10., 600., peaks(0.))]);
        let out = compare_datasets(a, b, &config(), &AtomicBool::new(true), false);
        assert!(matches!(out, Err(CompareError::Cancelled)));
    }

    #[test]
    fn test_unbounded_binning_is_config_error() {
        for config in [
            ComparisonConfig {
                bin_size: f64::INFINITY,
                ..config()
            },
            ComparisonConfig {
                max_mz: f64::INFINITY,
                ..config()
            },
        ] {
            let a = Dataset::new("a", vec![Spectrum::new(1, 10., 600., peaks(0.))]);
            let b = Dataset::new("b", vec![Spectrum::new(1, 10., 600., peaks(0.))]);
            let out = compare_datasets(a, b, &config, &AtomicBool::new(false), false);
            assert!(matches!(out, Err(CompareError::Config(_))));
        }
    }

    #[test]
    fn test_report_json_renders_infinite_distance() {
        let a = Dataset::new("a", vec![Spectrum::new(1, 10., 600., peaks(0.))]);
        let b = Dataset::new("b", vec![Spectrum::new(1, 10., 900., peaks(0.))]);
        let config = ComparisonConfig {
            metric: DistanceMetric::SymmetricCount,
            ..config()
        };
        let report = run(a, b, &config);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["set_distance"], "INF");
        assert_eq!(json["metric"], 1);
        assert_eq!(json["histogram"].as_array().unwrap().len(), 200);
    }
}
