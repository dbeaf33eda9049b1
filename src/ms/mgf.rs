use std::borrow::Cow;
use std::fs::File;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::Path;

use log::{
    debug,
    info,
    trace,
    warn,
};

use crate::errors::{
    CompareError,
    Result,
};
use crate::ms::spectrum::{
    Dataset,
    Peak,
    Spectrum,
};

const BEGIN_MARKER: &str = "BEGIN IONS";
const END_MARKER: &str = "END IONS";
const VENDOR_SCAN_MARKER: &str = "###MSMS:";

#[derive(Debug, Clone, Copy, Default)]
pub struct MgfReadOptions {
    /// Maximum number of peaks stored per spectrum. Peaks past this
    /// are still counted in the base peak and total ion current.
    pub max_peaks: Option<usize>,
}

#[derive(Debug, Default)]
struct SpectrumBuilder {
    scans_field: Option<i64>,
    vendor_scan: Option<i64>,
    title_scan: Option<i64>,
    retention_time: Option<f64>,
    precursor_mz: f64,
    charge: Option<i8>,
    peaks: Vec<Peak>,
    base_peak_intensity: f64,
    total_ion_current: f64,
    dropped_peaks: usize,
}

impl SpectrumBuilder {
    fn scan(&self) -> Option<i64> {
        self.scans_field.or(self.vendor_scan).or(self.title_scan)
    }

    fn add_peak(
        &mut self,
        peak: Peak,
        max_peaks: Option<usize>,
    ) {
        self.base_peak_intensity = self.base_peak_intensity.max(peak.1);
        self.total_ion_current += peak.1;
        match max_peaks {
            Some(max) if self.peaks.len() >= max => self.dropped_peaks += 1,
            _ => self.peaks.push(peak),
        }
    }

    fn build(self) -> (Spectrum, bool, bool) {
        let scan = self.scan();
        let mut spectrum = Spectrum::new(
            scan.unwrap_or(0),
            self.retention_time.unwrap_or(0.),
            self.precursor_mz,
            self.peaks,
        );
        spectrum.charge = self.charge;
        spectrum.base_peak_intensity = self.base_peak_intensity;
        spectrum.total_ion_current = self.total_ion_current;
        (spectrum, scan.is_some(), self.retention_time.is_some())
    }
}

/// Parses the leading number of a token, the way `atof` would accept
/// `445.23` out of `445.23` or `12` out of `12+`.
fn leading_f64(token: &str) -> Option<f64> {
    let token = token.trim();
    let end = token
        .char_indices()
        .find(|(i, c)| {
            !(c.is_ascii_digit()
                || *c == '.'
                || ((*c == '-' || *c == '+') && *i == 0)
                || *c == 'e'
                || *c == 'E')
        })
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    let mut candidate = &token[..end];
    // Back off trailing exponent markers, e.g. "12e"
    while !candidate.is_empty() {
        if let Ok(v) = candidate.parse::<f64>() {
            return Some(v);
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    None
}

/// First run of ascii digits found in the text.
fn first_integer(text: &str) -> Option<i64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn scan_from_title(title: &str) -> Option<i64> {
    let lower = title.to_ascii_lowercase();
    let pos = lower.find("scan=")?;
    let after = &title[pos + "scan=".len()..];
    if after.starts_with(|c: char| c.is_ascii_digit()) {
        first_integer(after)
    } else {
        None
    }
}

fn parse_charge(value: &str) -> Option<i8> {
    let value = value.trim();
    let magnitude = first_integer(value)?;
    let digits_end = value
        .find(|c: char| c.is_ascii_digit())
        .map(|s| {
            s + value[s..]
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(value.len() - s)
        })?;
    let negative = value.starts_with('-') || value[digits_end..].starts_with('-');
    let charge = i8::try_from(magnitude).ok()?;
    Some(if negative { -charge } else { charge })
}

/// A peak line is two whitespace separated numbers. Tokens that do not
/// parse count as zero so a malformed line never adds signal.
fn parse_peak_line(line: &str) -> Peak {
    let mut tokens = line.split_whitespace();
    let mz = tokens.next().and_then(leading_f64).unwrap_or(0.);
    let intensity = tokens.next().and_then(leading_f64).unwrap_or(0.);
    if !mz.is_finite() || !intensity.is_finite() {
        return (0., 0.);
    }
    (mz, intensity)
}

fn is_peak_line(line: &str) -> bool {
    line.starts_with(|c: char| c.is_ascii_digit())
}

fn apply_field(
    builder: &mut SpectrumBuilder,
    key: &str,
    value: &str,
) {
    match key.trim().to_ascii_uppercase().as_str() {
        "TITLE" => builder.title_scan = scan_from_title(value),
        "PEPMASS" => {
            builder.precursor_mz = value
                .split_whitespace()
                .next()
                .and_then(leading_f64)
                .unwrap_or(0.)
        },
        "CHARGE" => builder.charge = parse_charge(value),
        "SCANS" => builder.scans_field = first_integer(value),
        "RTINSECONDS" => builder.retention_time = leading_f64(value),
        _ => {},
    }
}

/// Reads every spectrum block of an MGF source.
///
/// Spectra are kept in file order. Records with few peaks are kept as
/// well, quality filtering happens at matching time.
pub fn read_mgf<R: BufRead>(
    mut reader: R,
    label: &str,
    options: MgfReadOptions,
) -> Result<Dataset> {
    let mut spectra: Vec<Spectrum> = Vec::new();
    let mut all_have_scans = true;
    let mut all_have_rts = true;
    let mut dropped_peaks = 0;
    let mut current: Option<SpectrumBuilder> = None;

    let mut finish = |builder: SpectrumBuilder, spectra: &mut Vec<Spectrum>| {
        dropped_peaks += builder.dropped_peaks;
        let (spectrum, has_scan, has_rt) = builder.build();
        all_have_scans &= has_scan;
        all_have_rts &= has_rt;
        spectra.push(spectrum);
    };

    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        let n_read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| CompareError::io(label, e))?;
        if n_read == 0 {
            break;
        }
        line_no += 1;
        // Vendor exports carry latin-1 text in titles
        let decoded = String::from_utf8_lossy(&buf);
        if matches!(decoded, Cow::Owned(_)) {
            debug!("'{}' line {}: not valid UTF-8, decoded lossily", label, line_no);
        }
        let line = decoded.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case(BEGIN_MARKER) {
            if let Some(open) = current.take() {
                warn!(
                    "'{}' line {}: spectrum block opened before the previous one was closed",
                    label,
                    line_no
                );
                finish(open, &mut spectra);
            }
            current = Some(SpectrumBuilder::default());
            continue;
        }

        let builder = match current.as_mut() {
            Some(b) => b,
            None => {
                trace!("'{}' line {}: outside of a spectrum block", label, line_no);
                continue;
            },
        };

        if line.eq_ignore_ascii_case(END_MARKER) {
            if let Some(done) = current.take() {
                finish(done, &mut spectra);
            }
        } else if let Some(rest) = line.strip_prefix(VENDOR_SCAN_MARKER) {
            builder.vendor_scan = first_integer(rest);
        } else if is_peak_line(line) {
            builder.add_peak(parse_peak_line(line), options.max_peaks);
        } else if let Some((key, value)) = line.split_once('=') {
            apply_field(builder, key, value);
        }
    }

    if let Some(open) = current.take() {
        warn!("'{}' ended inside a spectrum block, keeping it", label);
        finish(open, &mut spectra);
    }

    if dropped_peaks > 0 {
        warn!(
            "'{}': {} peaks past the per-spectrum capacity were not stored",
            label, dropped_peaks
        );
    }

    let mut dataset = Dataset::new(label, spectra);
    dataset.has_scan_numbers &= all_have_scans;
    dataset.has_retention_times &= all_have_rts;

    debug!(
        "'{}': {} spectra, max {} peaks, scans present: {}, retention times present: {}",
        label,
        dataset.len(),
        dataset.max_peak_count,
        dataset.has_scan_numbers,
        dataset.has_retention_times
    );
    Ok(dataset)
}

pub fn read_mgf_file(
    path: impl AsRef<Path>,
    options: MgfReadOptions,
) -> Result<Dataset> {
    let path = path.as_ref();
    info!("Reading spectra from: {}", path.display());
    let file = File::open(path).map_err(|e| CompareError::io(path, e))?;
    let label = path.display().to_string();
    read_mgf(BufReader::new(file), &label, options).map_err(|e| match e {
        CompareError::Io { source, .. } => CompareError::io(path, source),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SPECTRA: &str = "\
MASS=Monoisotopic
BEGIN IONS
TITLE=run1.100.100.2 File:\"run1.raw\", NativeID:\"controllerType=0 controllerNumber=1 scan=100\"
PEPMASS=445.12 12000
CHARGE=2+
RTINSECONDS=60.5
SCANS=100
200.1 1000
300.2 2500.5

END IONS
BEGIN IONS
TITLE=second
PEPMASS=512.3
CHARGE=3+
RTINSECONDS=61.0
SCANS=105
150.0 10
END IONS
";

    fn read_str(text: &str) -> Dataset {
        read_mgf(text.as_bytes(), "test", MgfReadOptions::default()).unwrap()
    }

    #[test]
    fn test_reads_blocks() {
        let ds = read_str(TWO_SPECTRA);
        assert_eq!(ds.len(), 2);
        assert!(ds.has_scan_numbers);
        assert!(ds.has_retention_times);
        assert_eq!(ds.max_peak_count, 2);

        let first = &ds.spectra[0];
        assert_eq!(first.scan, 100);
        assert_eq!(first.precursor_mz, 445.12);
        assert_eq!(first.charge, Some(2));
        assert_eq!(first.retention_time, 60.5);
        assert_eq!(first.peaks, vec![(200.1, 1000.), (300.2, 2500.5)]);
        assert_eq!(first.base_peak_intensity, 2500.5);
        assert_eq!(first.total_ion_current, 3500.5);

        assert_eq!(ds.spectra[1].scan, 105);
        assert_eq!(ds.spectra[1].charge, Some(3));
    }

    #[test]
    fn test_scan_dialects() {
        let text = "\
BEGIN IONS
TITLE=Spectrum 1 scan=42 rt=3.2
PEPMASS=400
END IONS
BEGIN IONS
###MSMS: 43/43
TITLE=no scan here
PEPMASS=400
END IONS
BEGIN IONS
TITLE=scan=99
SCANS=44
PEPMASS=400
END IONS
";
        let ds = read_str(text);
        let scans: Vec<i64> = ds.spectra.iter().map(|s| s.scan).collect();
        assert_eq!(scans, vec![42, 43, 44]);
        assert!(ds.has_scan_numbers);
        assert!(!ds.has_retention_times);
    }

    #[test]
    fn test_missing_scans_reported() {
        let text = "\
BEGIN IONS
TITLE=a
PEPMASS=400
RTINSECONDS=1
END IONS
BEGIN IONS
TITLE=b
SCANS=2
PEPMASS=400
RTINSECONDS=2
END IONS
";
        let ds = read_str(text);
        assert_eq!(ds.len(), 2);
        assert!(!ds.has_scan_numbers);
        assert!(ds.has_retention_times);
    }

    #[test]
    fn test_malformed_peak_line_adds_nothing() {
        let text = "\
BEGIN IONS
PEPMASS=400
100.0 50
200.0 abc
300.0
END IONS
";
        let ds = read_str(text);
        let spectrum = &ds.spectra[0];
        assert_eq!(spectrum.num_peaks(), 3);
        assert_eq!(spectrum.total_ion_current, 50.);
        assert_eq!(spectrum.base_peak_intensity, 50.);
    }

    #[test]
    fn test_peak_capacity() {
        let text = "\
BEGIN IONS
PEPMASS=400
100.0 5
200.0 7
300.0 9
END IONS
";
        let ds = read_mgf(
            text.as_bytes(),
            "cap",
            MgfReadOptions {
                max_peaks: Some(2),
            },
        )
        .unwrap();
        let spectrum = &ds.spectra[0];
        assert_eq!(spectrum.num_peaks(), 2);
        assert_eq!(spectrum.total_ion_current, 21.);
        assert_eq!(spectrum.base_peak_intensity, 9.);
    }

    #[test]
    fn test_latin1_title_is_decoded_lossily() {
        let bytes: &[u8] = b"BEGIN IONS\nTITLE=sample \xB5L run scan=7\nPEPMASS=400\n100 5\nEND IONS\n\
BEGIN IONS\nTITLE=second \xB5L\nSCANS=8\nPEPMASS=410\n100 6\nEND IONS\n";
        let ds = read_mgf(bytes, "latin1", MgfReadOptions::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.spectra[0].scan, 7);
        assert_eq!(ds.spectra[1].scan, 8);
        assert_eq!(ds.spectra[1].peaks, vec![(100., 6.)]);
    }

    #[test]
    fn test_unterminated_block_is_kept() {
        let ds = read_str("BEGIN IONS\nPEPMASS=300\n100 1\n");
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.spectra[0].precursor_mz, 300.);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let out = read_mgf_file("definitely/not/here.mgf", MgfReadOptions::default());
        assert!(matches!(out, Err(CompareError::Io { .. })));
    }

    #[test]
    fn test_number_helpers() {
        assert_eq!(leading_f64("12+"), Some(12.));
        assert_eq!(leading_f64("1.5e3"), Some(1500.));
        assert_eq!(leading_f64("12e"), Some(12.));
        assert_eq!(leading_f64("abc"), None);
        assert_eq!(parse_charge("2+"), Some(2));
        assert_eq!(parse_charge("3-"), Some(-3));
        assert_eq!(parse_charge("2+ and 3+"), Some(2));
        assert_eq!(first_integer("index=17,foo"), Some(17));
    }
}
