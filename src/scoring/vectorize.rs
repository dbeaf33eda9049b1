use log::info;
use rayon::prelude::*;

use crate::config::ComparisonConfig;
use crate::ms::spectrum::{
    BinnedVector,
    Dataset,
    Peak,
};
use crate::utils;

/// Turns peak lists into unit length binned vectors.
#[derive(Debug, Clone, Copy)]
pub struct Vectorizer {
    pub min_mz: f64,
    pub max_mz: f64,
    pub bin_size: f64,
    pub n_bins: usize,
    pub noise: f64,
    pub scaling: f64,
}

impl From<&ComparisonConfig> for Vectorizer {
    fn from(config: &ComparisonConfig) -> Self {
        Vectorizer {
            min_mz: config.min_mz,
            max_mz: config.max_mz,
            bin_size: config.bin_size,
            n_bins: config.n_bins(),
            noise: config.noise,
            scaling: config.scaling,
        }
    }
}

fn normalize_in_place(values: &mut [f64]) {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0. {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}

impl Vectorizer {
    /// Bin for an m/z value, `None` outside of `[min_mz, max_mz)`.
    pub fn bin_index(
        &self,
        mz: f64,
    ) -> Option<usize> {
        if self.n_bins == 0 || !(mz >= self.min_mz && mz < self.max_mz) {
            return None;
        }
        let bin = ((mz - self.min_mz) / self.bin_size).round() as usize;
        Some(bin.min(self.n_bins - 1))
    }

    pub fn vectorize(
        &self,
        peaks: &[Peak],
    ) -> BinnedVector {
        let mut intensities: Vec<f64> = peaks
            .iter()
            .map(|(_, int)| {
                if *int > self.noise {
                    int.powf(self.scaling)
                } else {
                    0.
                }
            })
            .collect();
        normalize_in_place(&mut intensities);

        let mut bins = vec![0.; self.n_bins];
        for ((mz, _), int) in peaks.iter().zip(intensities.iter()) {
            if let Some(bin) = self.bin_index(*mz) {
                bins[bin] += int;
            }
        }
        normalize_in_place(&mut bins);

        BinnedVector::from_dense(&bins)
    }

    /// Bins every spectrum of the dataset.
    pub fn vectorize_dataset(
        &self,
        dataset: Dataset,
    ) -> Dataset {
        let mut timer = utils::ContextTimer::new(
            &format!("vectorize::{}", dataset.label),
            true,
            utils::LogLevel::DEBUG,
        );
        let Dataset {
            label,
            spectra,
            has_scan_numbers,
            has_retention_times,
            max_peak_count,
            intensity_cutoff,
        } = dataset;

        let spectra = if cfg!(feature = "par_dataprep") {
            spectra
                .into_par_iter()
                .map(|s| {
                    let binned = self.vectorize(&s.peaks);
                    s.with_binned(binned)
                })
                .collect::<Vec<_>>()
        } else {
            spectra
                .into_iter()
                .map(|s| {
                    let binned = self.vectorize(&s.peaks);
                    s.with_binned(binned)
                })
                .collect::<Vec<_>>()
        };

        let n_zero = spectra
            .iter()
            .filter(|s| s.binned().map_or(true, |b| b.is_zero()))
            .count();
        info!(
            "Binned {} spectra from '{}' into {} bins ({} without signal)",
            spectra.len(),
            label,
            self.n_bins,
            n_zero
        );
        timer.stop(true);

        Dataset {
            label,
            spectra,
            has_scan_numbers,
            has_retention_times,
            max_peak_count,
            intensity_cutoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectorizer() -> Vectorizer {
        let config = ComparisonConfig {
            min_mz: 100.,
            max_mz: 200.,
            bin_size: 1.,
            noise: 10.,
            scaling: 0.5,
            ..Default::default()
        };
        Vectorizer::from(&config)
    }

    fn assert_close(
        a: f64,
        b: f64,
    ) {
        assert!((a - b).abs() < 1e-12, "{} != {}", a, b);
    }

    #[test]
    fn test_unit_norm() {
        let v = vectorizer().vectorize(&[(120., 400.), (150.2, 100.), (180.7, 25.)]);
        assert_eq!(v.len(), 100);
        assert_close(v.norm(), 1.);
    }

    #[test]
    fn test_scaling_and_rounding() {
        // sqrt(400) = 20 and sqrt(100) = 10, 150.6 rounds into bin 51
        let v = vectorizer().vectorize(&[(120., 400.), (150.6, 100.)]);
        let norm = (20f64 * 20. + 10. * 10.).sqrt();
        assert_close(v.get(20), 20. / norm);
        assert_close(v.get(51), 10. / norm);
        assert_eq!(v.nnz(), 2);
    }

    #[test]
    fn test_noise_floor_is_inclusive() {
        let v = vectorizer().vectorize(&[(120., 10.), (130., 9.)]);
        assert!(v.is_zero());
        assert_eq!(v.norm(), 0.);
        assert!(v.to_dense().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_range_is_half_open() {
        let vec = vectorizer();
        assert_eq!(vec.bin_index(100.), Some(0));
        assert_eq!(vec.bin_index(200.), None);
        assert_eq!(vec.bin_index(99.999), None);
        // Rounds up to n_bins, clamped into the last bin
        assert_eq!(vec.bin_index(199.9), Some(99));

        let only_max = vec.vectorize(&[(200., 1000.)]);
        assert!(only_max.is_zero());
        let only_min = vec.vectorize(&[(100., 1000.)]);
        assert_close(only_min.get(0), 1.);
    }

    #[test]
    fn test_out_of_range_peaks_still_normalize_first() {
        // The out of range peak takes part in the first normalization
        // but the binned vector is renormalized, so the result is unit.
        let v = vectorizer().vectorize(&[(50., 10000.), (150., 100.)]);
        assert_close(v.get(50), 1.);
    }

    #[test]
    fn test_dataset_binning() {
        use crate::ms::spectrum::Spectrum;
        let ds = Dataset::new(
            "v",
            vec![
                Spectrum::new(1, 1., 400., vec![(120., 400.)]),
                Spectrum::new(2, 2., 400., vec![]),
            ],
        );
        let ds = vectorizer().vectorize_dataset(ds);
        assert_close(ds.spectra[0].binned().unwrap().norm(), 1.);
        assert!(ds.spectra[1].binned().unwrap().is_zero());
        assert_eq!(ds.label, "v");
    }
}
