use std::f64::consts::PI;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use indicatif::ParallelProgressIterator;
use log::{
    debug,
    info,
};
use rayon::prelude::*;

use crate::config::{
    ComparisonConfig,
    SimilarityFunction,
};
use crate::errors::{
    CompareError,
    Result,
};
use crate::ms::sorting::SortedAxes;
use crate::ms::spectrum::{
    Dataset,
    Spectrum,
};
use crate::scoring::histogram::{
    PrecursorDiffHistogram,
    SimilarityHistogram,
};
use crate::utils;

/// `1 - 2 * acos(x) / pi`, maps -1, 0 and 1 onto themselves.
pub fn spectral_angle(dot: f64) -> f64 {
    let out = 1. - 2. * dot.clamp(-1., 1.).acos() / PI;
    out.clamp(-1., 1.)
}

/// Filters and windows used while matching.
#[derive(Debug, Clone, Copy)]
pub struct MatchParams {
    pub max_scan_diff: f64,
    pub max_rt_diff: f64,
    pub max_precursor_diff: f64,
    /// `None` admits every scan number.
    pub scan_range: Option<(i64, i64)>,
    /// `None` admits every retention time.
    pub rt_range: Option<(f64, f64)>,
    pub min_peaks: usize,
    pub min_base_peak: f64,
    pub min_total_ion_current: f64,
    pub cutoff: f64,
    pub similarity: SimilarityFunction,
    pub precursor_diff_histogram: bool,
}

impl From<&ComparisonConfig> for MatchParams {
    fn from(config: &ComparisonConfig) -> Self {
        MatchParams {
            max_scan_diff: config.max_scan_diff,
            max_rt_diff: config.max_rt_diff,
            max_precursor_diff: config.max_precursor_diff,
            scan_range: Some(config.scan_range),
            rt_range: Some(config.rt_range),
            min_peaks: config.min_peaks,
            min_base_peak: config.min_base_peak,
            min_total_ion_current: config.min_total_ion_current,
            cutoff: config.cutoff,
            similarity: config.similarity,
            precursor_diff_histogram: config.precursor_diff_histogram,
        }
    }
}

impl MatchParams {
    /// Used when a dataset has no scan numbers.
    pub fn disable_scan_window(&mut self) {
        self.max_scan_diff = f64::INFINITY;
        self.scan_range = None;
    }

    /// Used when a dataset has no retention times.
    pub fn disable_rt_window(&mut self) {
        self.max_rt_diff = f64::INFINITY;
        self.rt_range = None;
    }

    /// Scan and retention time admission ranges.
    pub fn in_range(
        &self,
        spectrum: &Spectrum,
    ) -> bool {
        if let Some((start, end)) = self.scan_range {
            if spectrum.scan < start || spectrum.scan > end {
                return false;
            }
        }
        if let Some((start, end)) = self.rt_range {
            if spectrum.retention_time < start || spectrum.retention_time > end {
                return false;
            }
        }
        true
    }

    /// Whether a spectrum takes part in matching at all, either as an
    /// anchor or as a candidate.
    pub fn admits(
        &self,
        dataset: &Dataset,
        spectrum: &Spectrum,
    ) -> bool {
        dataset.passes_intensity_cutoff(spectrum)
            && self.in_range(spectrum)
            && spectrum.num_peaks() >= self.min_peaks
            && spectrum.base_peak_intensity >= self.min_base_peak
            && spectrum.total_ion_current >= self.min_total_ion_current
    }

    pub fn score(
        &self,
        a: &Spectrum,
        b: &Spectrum,
    ) -> f64 {
        let dot = match (a.binned(), b.binned()) {
            (Some(va), Some(vb)) => va.dot(vb),
            _ => 0.,
        };
        match self.similarity {
            SimilarityFunction::DotProduct => dot,
            SimilarityFunction::SpectralAngle => spectral_angle(dot),
        }
    }

    fn precursor_within_tolerance(
        &self,
        a: &Spectrum,
        b: &Spectrum,
    ) -> bool {
        (b.precursor_mz - a.precursor_mz).abs() < self.max_precursor_diff
    }
}

/// Per-worker state of a matching pass, merged once all workers finish.
#[derive(Debug, Clone, Default)]
struct MatchAccumulator {
    histogram: SimilarityHistogram,
    precursor_diff_histogram: Option<PrecursorDiffHistogram>,
    comparisons: u64,
    anchors_compared: usize,
    shared: usize,
    best: Vec<(usize, f64)>,
}

impl MatchAccumulator {
    fn new(with_precursor_diffs: bool) -> Self {
        MatchAccumulator {
            precursor_diff_histogram: if with_precursor_diffs {
                Some(PrecursorDiffHistogram::default())
            } else {
                None
            },
            ..Default::default()
        }
    }

    fn add_comparison(
        &mut self,
        similarity: f64,
        precursor_diff: f64,
    ) {
        self.histogram.add(similarity);
        if let Some(h) = self.precursor_diff_histogram.as_mut() {
            h.add(precursor_diff, similarity);
        }
        self.comparisons += 1;
    }

    fn add_anchor(
        &mut self,
        anchor_index: usize,
        best: f64,
        cutoff: f64,
    ) {
        self.anchors_compared += 1;
        if best > cutoff {
            self.shared += 1;
        }
        self.best.push((anchor_index, best));
    }

    fn combine(
        mut self,
        other: Self,
    ) -> Self {
        self.histogram.merge(&other.histogram);
        match (
            self.precursor_diff_histogram.as_mut(),
            other.precursor_diff_histogram.as_ref(),
        ) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (None, Some(theirs)) => self.precursor_diff_histogram = Some(theirs.clone()),
            _ => {},
        }
        self.comparisons += other.comparisons;
        self.anchors_compared += other.anchors_compared;
        self.shared += other.shared;
        self.best.extend(other.best);
        self
    }

    fn finish(
        mut self,
        n_anchors: usize,
    ) -> DirectionMatches {
        let mut best_similarity = vec![None; n_anchors];
        self.best.sort_unstable_by_key(|(i, _)| *i);
        for (i, best) in self.best {
            best_similarity[i] = Some(best);
        }
        DirectionMatches {
            histogram: self.histogram,
            precursor_diff_histogram: self.precursor_diff_histogram,
            comparisons: self.comparisons,
            anchors_compared: self.anchors_compared,
            shared: self.shared,
            best_similarity,
        }
    }
}

/// Outcome of matching every anchor of one dataset against the other.
#[derive(Debug, Clone)]
pub struct DirectionMatches {
    pub histogram: SimilarityHistogram,
    pub precursor_diff_histogram: Option<PrecursorDiffHistogram>,
    pub comparisons: u64,
    /// Anchors that passed all filters.
    pub anchors_compared: usize,
    /// Anchors whose best match is above the cutoff.
    pub shared: usize,
    /// Best similarity per anchor, `None` for anchors that were filtered
    /// out. Starts from 0, so anchors with only negative matches report 0.
    pub best_similarity: Vec<Option<f64>>,
}

/// Candidate dataset prepared for repeated windowed lookups.
struct CandidateIndex<'a> {
    spectra: &'a [Spectrum],
    admitted: Vec<bool>,
    order: SortedAxes,
}

impl<'a> CandidateIndex<'a> {
    fn new(
        dataset: &'a Dataset,
        order: SortedAxes,
        params: &MatchParams,
    ) -> Self {
        let admitted = dataset
            .spectra
            .iter()
            .map(|s| params.admits(dataset, s))
            .collect();
        CandidateIndex {
            spectra: &dataset.spectra,
            admitted,
            order,
        }
    }

    /// First index that is not too far behind the anchor on any sorted
    /// axis. Everything before it would only be skipped.
    fn window_start(
        &self,
        anchor: &Spectrum,
        params: &MatchParams,
    ) -> usize {
        let mut start = 0;
        if self.order.scan && params.max_scan_diff.is_finite() {
            start = start.max(self.spectra.partition_point(|b| {
                (anchor.scan - b.scan) as f64 > params.max_scan_diff
            }));
        }
        if self.order.retention_time && params.max_rt_diff.is_finite() {
            start = start.max(self.spectra.partition_point(|b| {
                anchor.retention_time - b.retention_time > params.max_rt_diff
            }));
        }
        start
    }

    /// Best similarity of one anchor, feeding every comparison into `acc`.
    fn match_anchor(
        &self,
        anchor: &Spectrum,
        params: &MatchParams,
        acc: &mut MatchAccumulator,
    ) -> f64 {
        let mut best = 0.;
        let start = self.window_start(anchor, params);
        for (b, admitted) in self.spectra[start..]
            .iter()
            .zip(self.admitted[start..].iter())
        {
            if (b.scan - anchor.scan) as f64 > params.max_scan_diff {
                if self.order.scan {
                    break;
                }
                continue;
            }
            if (anchor.scan - b.scan) as f64 > params.max_scan_diff {
                continue;
            }
            if b.retention_time - anchor.retention_time > params.max_rt_diff {
                if self.order.retention_time {
                    break;
                }
                continue;
            }
            if anchor.retention_time - b.retention_time > params.max_rt_diff {
                continue;
            }
            if !*admitted || !params.precursor_within_tolerance(anchor, b) {
                continue;
            }

            let similarity = params.score(anchor, b);
            acc.add_comparison(similarity, b.precursor_mz - anchor.precursor_mz);
            if similarity > best {
                best = similarity;
            }
        }
        best
    }
}

/// Matches every admitted anchor spectrum against the candidates.
///
/// Anchors are independent, so they are spread over the rayon pool, each
/// worker filling its own histograms and counters.
/// `candidate_order` tells which axes of `candidates` may be used to stop
/// scanning early.
pub fn match_direction(
    anchors: &Dataset,
    candidates: &Dataset,
    candidate_order: SortedAxes,
    params: &MatchParams,
    cancel: &AtomicBool,
    show_progress: bool,
) -> Result<DirectionMatches> {
    let mut timer = utils::ContextTimer::new(
        &format!("match::{}->{}", anchors.label, candidates.label),
        true,
        utils::LogLevel::INFO,
    );
    let index = CandidateIndex::new(candidates, candidate_order, params);

    let progbar = if show_progress {
        indicatif::ProgressBar::new(anchors.len() as u64)
    } else {
        indicatif::ProgressBar::hidden()
    };

    let acc = anchors
        .spectra
        .par_iter()
        .enumerate()
        .progress_with(progbar)
        .fold(
            || MatchAccumulator::new(params.precursor_diff_histogram),
            |mut acc, (i, anchor)| {
                if cancel.load(Ordering::Relaxed) || !params.admits(anchors, anchor) {
                    return acc;
                }
                let best = index.match_anchor(anchor, params, &mut acc);
                acc.add_anchor(i, best, params.cutoff);
                acc
            },
        )
        .reduce(
            || MatchAccumulator::new(params.precursor_diff_histogram),
            MatchAccumulator::combine,
        );

    if cancel.load(Ordering::Relaxed) {
        return Err(CompareError::Cancelled);
    }

    let out = acc.finish(anchors.len());
    info!(
        "'{}' vs '{}': {} of {} spectra compared, {} above cutoff, {} comparisons",
        anchors.label,
        candidates.label,
        out.anchors_compared,
        anchors.len(),
        out.shared,
        out.comparisons
    );
    timer.stop(true);
    Ok(out)
}

/// Reference matcher comparing every admitted pair, without early stops.
///
/// The scan and retention time windows are applied as plain filters, so on
/// sorted input it produces the same counts as [`match_direction`].
pub fn match_direction_unpruned(
    anchors: &Dataset,
    candidates: &Dataset,
    params: &MatchParams,
) -> DirectionMatches {
    let mut acc = MatchAccumulator::new(params.precursor_diff_histogram);
    for (i, a) in anchors.spectra.iter().enumerate() {
        if !params.admits(anchors, a) {
            continue;
        }
        let mut best = 0.;
        for b in candidates.spectra.iter() {
            if !params.admits(candidates, b) {
                continue;
            }
            if ((a.scan - b.scan).abs() as f64) > params.max_scan_diff
                || (a.retention_time - b.retention_time).abs() > params.max_rt_diff
                || !params.precursor_within_tolerance(a, b)
            {
                continue;
            }
            let similarity = params.score(a, b);
            acc.add_comparison(similarity, b.precursor_mz - a.precursor_mz);
            if similarity > best {
                best = similarity;
            }
        }
        acc.add_anchor(i, best, params.cutoff);
    }
    acc.finish(anchors.len())
}

/// Counters of a full, two directional comparison.
#[derive(Debug, Clone)]
pub struct MatchSummary {
    /// Similarities of both directions.
    pub histogram: SimilarityHistogram,
    /// Only filled from the A anchored direction.
    pub precursor_diff_histogram: Option<PrecursorDiffHistogram>,
    pub comparisons: u64,
    pub greater_than_cutoff: usize,
    pub s_ab: usize,
    pub s_ba: usize,
    pub compared_a: usize,
    pub compared_b: usize,
    pub best_similarity_a: Vec<Option<f64>>,
    pub best_similarity_b: Vec<Option<f64>>,
}

impl MatchSummary {
    pub fn from_directions(
        ab: DirectionMatches,
        ba: DirectionMatches,
    ) -> Self {
        let mut histogram = ab.histogram;
        histogram.merge(&ba.histogram);
        MatchSummary {
            histogram,
            precursor_diff_histogram: ab.precursor_diff_histogram,
            comparisons: ab.comparisons + ba.comparisons,
            greater_than_cutoff: ab.shared + ba.shared,
            s_ab: ab.shared,
            s_ba: ba.shared,
            compared_a: ab.anchors_compared,
            compared_b: ba.anchors_compared,
            best_similarity_a: ab.best_similarity,
            best_similarity_b: ba.best_similarity,
        }
    }
}

/// Runs A against B and B against A.
pub fn match_datasets(
    a: &Dataset,
    a_order: SortedAxes,
    b: &Dataset,
    b_order: SortedAxes,
    params: &MatchParams,
    cancel: &AtomicBool,
    show_progress: bool,
) -> Result<MatchSummary> {
    let ab = match_direction(a, b, b_order, params, cancel, show_progress)?;
    let ba = match_direction(b, a, a_order, params, cancel, show_progress)?;
    let summary = MatchSummary::from_directions(ab, ba);
    debug!(
        "sAB={} sBA={} comparisons={}",
        summary.s_ab, summary.s_ba, summary.comparisons
    );
    Ok(summary)
}
