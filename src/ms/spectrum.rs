/// Peaks are mz-intensity pairs
pub type Peak = (f64, f64);

/// Fixed length vector of binned intensities.
///
/// Only the non-zero bins are stored, sorted by bin index, but the vector
/// behaves as a dense vector of `len()` elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BinnedVector {
    n_bins: usize,
    indices: Vec<u32>,
    values: Vec<f64>,
}

impl BinnedVector {
    pub fn from_dense(dense: &[f64]) -> Self {
        let (indices, values) = dense
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.)
            .map(|(i, v)| (i as u32, *v))
            .unzip();
        BinnedVector {
            n_bins: dense.len(),
            indices,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.n_bins
    }

    pub fn is_empty(&self) -> bool {
        self.n_bins == 0
    }

    /// True when every bin is zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.)
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices
            .iter()
            .zip(self.values.iter())
            .map(|(i, v)| (*i as usize, *v))
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Dot product of two vectors with the same number of bins.
    ///
    /// Walks both sorted index lists once.
    pub fn dot(
        &self,
        other: &BinnedVector,
    ) -> f64 {
        debug_assert_eq!(self.n_bins, other.n_bins);
        let mut i = 0;
        let mut j = 0;
        let mut out = 0.;
        while i < self.indices.len() && j < other.indices.len() {
            let (a, b) = (self.indices[i], other.indices[j]);
            if a == b {
                out += self.values[i] * other.values[j];
                i += 1;
                j += 1;
            } else if a < b {
                i += 1;
            } else {
                j += 1;
            }
        }
        out
    }
}

/// One MS/MS scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum {
    pub scan: i64,
    pub retention_time: f64,
    pub precursor_mz: f64,
    pub charge: Option<i8>,
    pub peaks: Vec<Peak>,
    pub base_peak_intensity: f64,
    pub total_ion_current: f64,
    binned: Option<BinnedVector>,
}

impl Spectrum {
    pub fn new(
        scan: i64,
        retention_time: f64,
        precursor_mz: f64,
        peaks: Vec<Peak>,
    ) -> Self {
        let mut out = Spectrum {
            scan,
            retention_time,
            precursor_mz,
            peaks,
            ..Default::default()
        };
        out.update_intensity_summaries();
        out
    }

    /// Recomputes base peak and total ion current from the peak list.
    pub fn update_intensity_summaries(&mut self) {
        self.base_peak_intensity = self
            .peaks
            .iter()
            .map(|(_, int)| *int)
            .fold(0., f64::max);
        self.total_ion_current = self.peaks.iter().map(|(_, int)| *int).sum();
    }

    pub fn num_peaks(&self) -> usize {
        self.peaks.len()
    }

    pub fn binned(&self) -> Option<&BinnedVector> {
        self.binned.as_ref()
    }

    /// Attaches the binned vector. A spectrum is binned exactly once.
    pub fn with_binned(
        mut self,
        binned: BinnedVector,
    ) -> Self {
        debug_assert!(self.binned.is_none(), "Spectrum binned twice");
        self.binned = Some(binned);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub label: String,
    pub spectra: Vec<Spectrum>,
    pub has_scan_numbers: bool,
    pub has_retention_times: bool,
    pub max_peak_count: usize,
    /// Spectra whose total ion current is below this value are skipped
    /// during matching.
    pub intensity_cutoff: Option<f64>,
}

impl Dataset {
    pub fn new(
        label: impl Into<String>,
        spectra: Vec<Spectrum>,
    ) -> Self {
        let max_peak_count = spectra.iter().map(|s| s.num_peaks()).max().unwrap_or(0);
        let has_spectra = !spectra.is_empty();
        Dataset {
            label: label.into(),
            spectra,
            has_scan_numbers: has_spectra,
            has_retention_times: has_spectra,
            max_peak_count,
            intensity_cutoff: None,
        }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn passes_intensity_cutoff(
        &self,
        spectrum: &Spectrum,
    ) -> bool {
        match self.intensity_cutoff {
            Some(cutoff) => spectrum.total_ion_current >= cutoff,
            None => true,
        }
    }
}

#[cfg(test)]
impl BinnedVector {
    pub fn get(
        &self,
        bin: usize,
    ) -> f64 {
        match self.indices.binary_search(&(bin as u32)) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.,
        }
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut out = vec![0.; self.n_bins];
        for (i, v) in self.iter() {
            out[i] = v;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binned_dot_matches_dense() {
        let a = [0., 1., 0., 2., 0., 3.];
        let b = [4., 0., 0., 5., 6., 1.];
        let dense_dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

        let va = BinnedVector::from_dense(&a);
        let vb = BinnedVector::from_dense(&b);
        assert_eq!(va.nnz(), 3);
        assert_eq!(va.len(), 6);
        assert_eq!(va.dot(&vb), dense_dot);
        assert_eq!(vb.dot(&va), dense_dot);
        assert_eq!(va.to_dense(), a.to_vec());
        assert_eq!(va.get(3), 2.);
        assert_eq!(va.get(4), 0.);
    }

    #[test]
    fn test_zero_vector() {
        let v = BinnedVector::from_dense(&[0.; 10]);
        assert_eq!(v.len(), 10);
        assert_eq!(v.nnz(), 0);
        assert!(v.is_zero());
        assert_eq!(v.norm(), 0.);
        assert_eq!(v.dot(&BinnedVector::from_dense(&[1.; 10])), 0.);
    }

    #[test]
    fn test_intensity_summaries() {
        let spectrum = Spectrum::new(1, 10., 500., vec![(200., 5.), (300., 50.), (400., 10.)]);
        assert_eq!(spectrum.base_peak_intensity, 50.);
        assert_eq!(spectrum.total_ion_current, 65.);
        assert!(spectrum.binned().is_none());
    }
}
