use rand::Rng;

use crate::ms::spectrum::{
    Dataset,
    Spectrum,
};

/// Moves every value `>= pivot` to the left of the returned index.
fn partition_desc(
    values: &mut [f64],
    pivot_index: usize,
) -> usize {
    let last = values.len() - 1;
    values.swap(pivot_index, last);
    let pivot = values[last];
    let mut store = 0;
    for i in 0..last {
        if values[i] >= pivot {
            values.swap(i, store);
            store += 1;
        }
    }
    values.swap(store, last);
    store
}

/// Finds the value that would sit at position `k` if `values` were sorted
/// in descending order. The slice is reordered in place.
///
/// Pivots are random, so the arrangement of tied values (and thus which
/// of several equal spectra ends up "at" position `k`) is not
/// deterministic. The returned value is.
pub fn select_desc_with_rng<R: Rng>(
    values: &mut [f64],
    k: usize,
    rng: &mut R,
) -> f64 {
    assert!(k < values.len(), "k={} out of bounds for {}", k, values.len());
    let mut left = 0;
    let mut right = values.len();
    loop {
        if right - left == 1 {
            return values[left];
        }
        let pivot = rng.gen_range(0..(right - left));
        let pivot_pos = left + partition_desc(&mut values[left..right], pivot);
        match k.cmp(&pivot_pos) {
            std::cmp::Ordering::Equal => return values[k],
            std::cmp::Ordering::Less => right = pivot_pos,
            std::cmp::Ordering::Greater => left = pivot_pos + 1,
        }
    }
}

pub fn select_desc(
    values: &mut [f64],
    k: usize,
) -> f64 {
    select_desc_with_rng(values, k, &mut rand::thread_rng())
}

/// Intensity threshold that keeps the `top_n` most intense values.
///
/// Values greater than or equal to the threshold are kept, so ties with
/// the `top_n`-th value are kept too.
/// - `top_n >= values.len()` keeps everything (`-inf`).
/// - no values, or `top_n == 0`, keeps nothing (`+inf`).
pub fn top_n_cutoff(
    values: &[f64],
    top_n: usize,
) -> f64 {
    if values.is_empty() || top_n == 0 {
        return f64::INFINITY;
    }
    if top_n >= values.len() {
        return f64::NEG_INFINITY;
    }
    let mut buf = values.to_vec();
    select_desc(&mut buf, top_n - 1)
}

/// Cutoff on total ion current over the spectra accepted by `admit`.
pub fn dataset_cutoff<F>(
    dataset: &Dataset,
    top_n: usize,
    admit: F,
) -> f64
where
    F: Fn(&Spectrum) -> bool,
{
    let intensities = dataset
        .spectra
        .iter()
        .filter(|s| admit(s))
        .map(|s| s.total_ion_current)
        .collect::<Vec<_>>();
    top_n_cutoff(&intensities, top_n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reference_kth_largest(
        values: &[f64],
        k: usize,
    ) -> f64 {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| b.total_cmp(a));
        sorted[k - 1]
    }

    #[test]
    fn test_matches_full_sort() {
        let mut rng = StdRng::seed_from_u64(42);
        for len in [1usize, 2, 3, 10, 57, 200] {
            let values: Vec<f64> = (0..len).map(|_| rng.gen_range(0..50) as f64).collect();
            for k in 1..len {
                assert_eq!(
                    top_n_cutoff(&values, k),
                    reference_kth_largest(&values, k),
                    "len={} k={}",
                    len,
                    k
                );
            }
        }
    }

    #[test]
    fn test_ties_are_retained() {
        let values = [5., 9., 7., 7., 7., 1.];
        let cutoff = top_n_cutoff(&values, 2);
        assert_eq!(cutoff, 7.);
        let kept = values.iter().filter(|v| **v >= cutoff).count();
        assert_eq!(kept, 4);
    }

    #[test]
    fn test_edge_cases() {
        assert_eq!(top_n_cutoff(&[1., 2., 3.], 3), f64::NEG_INFINITY);
        assert_eq!(top_n_cutoff(&[1., 2., 3.], 10), f64::NEG_INFINITY);
        assert_eq!(top_n_cutoff(&[], 5), f64::INFINITY);
        assert_eq!(top_n_cutoff(&[1., 2.], 0), f64::INFINITY);
    }

    #[test]
    fn test_select_is_seed_independent() {
        let values = [3., 1., 4., 1., 5., 9., 2., 6., 5., 3., 5.];
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut buf = values.to_vec();
            assert_eq!(select_desc_with_rng(&mut buf, 3, &mut rng), 5.);
        }
    }

    #[test]
    fn test_dataset_cutoff_respects_admission() {
        let spectra = (1..=5)
            .map(|i| Spectrum::new(i, 0., 400., vec![(200., i as f64 * 10.)]))
            .collect();
        let ds = Dataset::new("topk", spectra);
        // Only scans 1..=3 admitted: TICs 10, 20, 30
        let cutoff = dataset_cutoff(&ds, 2, |s| s.scan <= 3);
        assert_eq!(cutoff, 20.);
        let cutoff = dataset_cutoff(&ds, 2, |_| false);
        assert_eq!(cutoff, f64::INFINITY);
    }
}
