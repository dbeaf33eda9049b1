use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::Path;

use log::info;

use crate::errors::{
    CompareError,
    Result,
};
use crate::pipeline::ComparisonReport;
use crate::scoring::histogram::{
    PrecursorDiffHistogram,
    PRECURSOR_DIFF_BINS,
    SIMILARITY_BINS,
};

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| CompareError::io(path, e))?;
    Ok(BufWriter::new(file))
}

fn tsv_writer<W: Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(inner)
}

fn format_distance(distance: f64) -> String {
    if distance.is_finite() {
        format!("{:.10}", distance)
    } else {
        "INF".to_string()
    }
}

fn put<W: Write, I>(
    wtr: &mut csv::Writer<W>,
    key: &str,
    values: I,
) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    wtr.write_field(key)?;
    for value in values {
        wtr.write_field(value)?;
    }
    wtr.write_record(None::<&[u8]>)?;
    Ok(())
}

/// Writes the key / value report, one record per line, tab separated.
pub fn write_tsv_report<W: Write>(
    report: &ComparisonReport,
    inner: W,
) -> Result<()> {
    let config = &report.config;
    let mut wtr = tsv_writer(inner);

    put(&mut wtr, "dataset_A", [report.dataset_a.clone()])?;
    put(&mut wtr, "dataset_B", [report.dataset_b.clone()])?;
    put(&mut wtr, "set_distance", [format_distance(report.set_distance)])?;
    put(&mut wtr, "set_metric", [report.metric.to_string()])?;
    put(
        &mut wtr,
        "scan_range",
        [config.scan_range.0.to_string(), config.scan_range.1.to_string()],
    )?;
    put(
        &mut wtr,
        "rt_range",
        [
            format!("{:.5}", config.rt_range.0),
            format!("{:.5}", config.rt_range.1),
        ],
    )?;
    put(&mut wtr, "max_scan_diff", [format!("{:.5}", config.max_scan_diff)])?;
    put(&mut wtr, "max_rt_diff", [format!("{:.5}", config.max_rt_diff)])?;
    put(&mut wtr, "max_m/z_diff", [format!("{:.5}", config.max_precursor_diff)])?;
    put(&mut wtr, "scaling_power", [format!("{:.5}", config.scaling)])?;
    put(&mut wtr, "noise_threshold", [format!("{:.5}", config.noise)])?;
    put(&mut wtr, "similarity_function", [config.similarity.code().to_string()])?;
    put(&mut wtr, "cutoff", [format!("{:.5}", config.cutoff)])?;
    put(&mut wtr, "dataset_A_size", [report.size_a.to_string()])?;
    put(&mut wtr, "dataset_B_size", [report.size_b.to_string()])?;
    put(&mut wtr, "dataset_A_QC", [format!("{:.4}", report.qc_a)])?;
    put(&mut wtr, "dataset_B_QC", [format!("{:.4}", report.qc_b)])?;
    put(&mut wtr, "n_gt_cutoff", [report.n_gt_cutoff.to_string()])?;
    put(&mut wtr, "s_AB", [report.s_ab.to_string()])?;
    put(&mut wtr, "s_BA", [report.s_ba.to_string()])?;
    put(&mut wtr, "n_comparisons", [report.n_comparisons.to_string()])?;
    put(&mut wtr, "n_compared_A", [report.compared_a.to_string()])?;
    put(&mut wtr, "n_compared_B", [report.compared_b.to_string()])?;
    if let Some(top_n) = config.top_n {
        put(&mut wtr, "top_n", [top_n.to_string()])?;
    }
    put(&mut wtr, "min_peaks", [config.min_peaks.to_string()])?;
    put(&mut wtr, "min_base_peak", [format!("{:.4}", config.min_base_peak)])?;
    put(&mut wtr, "max_peaks", [report.max_peaks.to_string()])?;
    put(
        &mut wtr,
        "m/z_range",
        [format!("{:.4}", config.min_mz), format!("{:.4}", config.max_mz)],
    )?;
    put(&mut wtr, "m/z_bin_size", [format!("{:.4}", config.bin_size)])?;
    put(&mut wtr, "n_m/z_bins", [report.n_bins.to_string()])?;
    let windows = &report.effective_windows;
    let disabled = || "disabled".to_string();
    put(
        &mut wtr,
        "effective_max_scan_diff",
        [windows
            .max_scan_diff
            .map_or_else(disabled, |v| format!("{:.5}", v))],
    )?;
    put(
        &mut wtr,
        "effective_max_rt_diff",
        [windows
            .max_rt_diff
            .map_or_else(disabled, |v| format!("{:.5}", v))],
    )?;
    put(
        &mut wtr,
        "effective_scan_range",
        match windows.scan_range {
            Some((start, end)) => vec![start.to_string(), end.to_string()],
            None => vec![disabled()],
        },
    )?;
    put(
        &mut wtr,
        "effective_rt_range",
        match windows.rt_range {
            Some((start, end)) => vec![format!("{:.5}", start), format!("{:.5}", end)],
            None => vec![disabled()],
        },
    )?;
    for warning in report.warnings.iter() {
        put(&mut wtr, "warning", [warning.clone()])?;
    }
    for row in report.histogram.iter() {
        put(
            &mut wtr,
            "histogram",
            [
                format!("{:.3}", row.lower),
                format!("{:.3}", row.upper),
                format!("{:.3}", row.midpoint),
                row.count.to_string(),
            ],
        )?;
    }
    wtr.flush().map_err(|e| CompareError::io("<report>", e))?;
    Ok(())
}

pub fn write_tsv_report_file(
    report: &ComparisonReport,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    info!("Writing report to: {}", path.display());
    write_tsv_report(report, create(path)?).map_err(|e| relabel_io(e, path))
}

pub fn write_json_report_file(
    report: &ComparisonReport,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    info!("Writing JSON report to: {}", path.display());
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, report)?;
    out.flush().map_err(|e| CompareError::io(path, e))?;
    Ok(())
}

/// One line per similarity bin, one column per precursor difference row.
pub fn write_precursor_diff_tsv<W: Write>(
    histogram: &PrecursorDiffHistogram,
    inner: W,
) -> Result<()> {
    let mut wtr = tsv_writer(inner);
    for sim_bin in 0..SIMILARITY_BINS {
        let line = (0..PRECURSOR_DIFF_BINS).map(|row| histogram.get(row, sim_bin).to_string());
        wtr.write_record(line)?;
    }
    wtr.flush().map_err(|e| CompareError::io("<histogram>", e))?;
    Ok(())
}

pub fn write_precursor_diff_file(
    histogram: &PrecursorDiffHistogram,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    info!("Writing precursor difference histogram to: {}", path.display());
    write_precursor_diff_tsv(histogram, create(path)?).map_err(|e| relabel_io(e, path))
}

fn relabel_io(
    err: CompareError,
    path: &Path,
) -> CompareError {
    match err {
        CompareError::Io { source, .. } => CompareError::io(path, source),
        other => other,
    }
}
