use crate::errors::InputWarning;
use crate::ms::spectrum::{
    Dataset,
    Spectrum,
};

/// Whether the matcher can stop scanning a dataset early along each axis.
///
/// The early stop is only valid when the dataset is in non-decreasing
/// order along that axis. The window itself is still applied as a filter
/// when early stopping is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortedAxes {
    pub scan: bool,
    pub retention_time: bool,
}

fn is_sorted_by_key<F>(
    spectra: &[Spectrum],
    key: F,
) -> bool
where
    F: Fn(&Spectrum) -> f64,
{
    spectra.windows(2).all(|w| key(&w[0]) <= key(&w[1]))
}

/// Checks scan and retention time order of a dataset.
///
/// Axes missing from the source count as sorted, since all their values
/// are identical.
pub fn check_sort_order(dataset: &Dataset) -> (SortedAxes, Vec<InputWarning>) {
    let mut warnings = Vec::new();
    let scan = is_sorted_by_key(&dataset.spectra, |s| s.scan as f64);
    let retention_time = is_sorted_by_key(&dataset.spectra, |s| s.retention_time);

    if dataset.has_scan_numbers && !scan {
        warnings.push(InputWarning::UnsortedScanNumbers {
            label: dataset.label.clone(),
        });
    }
    if dataset.has_retention_times && !retention_time {
        warnings.push(InputWarning::UnsortedRetentionTimes {
            label: dataset.label.clone(),
        });
    }

    (
        SortedAxes {
            scan,
            retention_time,
        },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(points: &[(i64, f64)]) -> Dataset {
        let spectra = points
            .iter()
            .map(|(scan, rt)| Spectrum::new(*scan, *rt, 500., vec![]))
            .collect();
        Dataset::new("sorting", spectra)
    }

    #[test]
    fn test_sorted_dataset() {
        let ds = dataset(&[(1, 1.), (2, 1.), (2, 3.), (5, 4.)]);
        let (axes, warnings) = check_sort_order(&ds);
        assert!(axes.scan);
        assert!(axes.retention_time);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unsorted_axes_are_independent() {
        let ds = dataset(&[(1, 5.), (3, 4.), (2, 6.)]);
        let (axes, warnings) = check_sort_order(&ds);
        assert!(!axes.scan);
        assert!(!axes.retention_time);
        assert_eq!(warnings.len(), 2);

        let ds = dataset(&[(1, 5.), (2, 4.), (3, 6.)]);
        let (axes, warnings) = check_sort_order(&ds);
        assert!(axes.scan);
        assert!(!axes.retention_time);
        assert_eq!(
            warnings,
            vec![InputWarning::UnsortedRetentionTimes {
                label: "sorting".into()
            }]
        );
    }
}
