use serde::Serialize;

pub const SIMILARITY_BINS: usize = 200;
pub const PRECURSOR_DIFF_BINS: usize = 320;
/// Width of a precursor difference row, in m/z.
pub const PRECURSOR_DIFF_BIN_WIDTH: f64 = 0.01;

/// Histogram bin of a similarity in `[-1, 1]`.
///
/// Values are clamped first, so floating point overshoot such as
/// `1.0000000000000002` lands in the last bin instead of past it.
pub fn similarity_bin(similarity: f64) -> usize {
    let half = (SIMILARITY_BINS / 2) as f64;
    let s = similarity.clamp(-1., 1.);
    let offset = (s * (half - 1e-9)).floor() as i64;
    (SIMILARITY_BINS as i64 / 2 + offset) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramRow {
    pub lower: f64,
    pub upper: f64,
    pub midpoint: f64,
    pub count: u64,
}

/// Counts of pairwise similarities over `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityHistogram {
    counts: Vec<u64>,
}

impl Default for SimilarityHistogram {
    fn default() -> Self {
        SimilarityHistogram {
            counts: vec![0; SIMILARITY_BINS],
        }
    }
}

impl SimilarityHistogram {
    pub fn add(
        &mut self,
        similarity: f64,
    ) {
        if similarity.is_nan() {
            return;
        }
        self.counts[similarity_bin(similarity)] += 1;
    }

    pub fn merge(
        &mut self,
        other: &Self,
    ) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn rows(&self) -> Vec<HistogramRow> {
        let half = (SIMILARITY_BINS / 2) as f64;
        self.counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                let i = i as f64;
                HistogramRow {
                    lower: (i - half) / half,
                    upper: (i + 1. - half) / half,
                    midpoint: (i + 0.5 - half) / half,
                    count: *count,
                }
            })
            .collect()
    }
}

/// Counts of (precursor m/z difference, similarity) pairs.
///
/// Rows cover differences of `[-1.6, 1.6)` m/z in 0.01 steps, columns are
/// the similarity bins. Pairs outside the difference range are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecursorDiffHistogram {
    counts: Vec<u64>,
}

impl Default for PrecursorDiffHistogram {
    fn default() -> Self {
        PrecursorDiffHistogram {
            counts: vec![0; PRECURSOR_DIFF_BINS * SIMILARITY_BINS],
        }
    }
}

impl PrecursorDiffHistogram {
    fn row(precursor_diff: f64) -> Option<usize> {
        let offset = (precursor_diff / PRECURSOR_DIFF_BIN_WIDTH).floor();
        let row = (PRECURSOR_DIFF_BINS / 2) as f64 + offset;
        if row >= 0. && row < PRECURSOR_DIFF_BINS as f64 {
            Some(row as usize)
        } else {
            None
        }
    }

    pub fn add(
        &mut self,
        precursor_diff: f64,
        similarity: f64,
    ) {
        if similarity.is_nan() {
            return;
        }
        if let Some(row) = Self::row(precursor_diff) {
            self.counts[row * SIMILARITY_BINS + similarity_bin(similarity)] += 1;
        }
    }

    pub fn merge(
        &mut self,
        other: &Self,
    ) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }

    pub fn get(
        &self,
        row: usize,
        similarity_bin: usize,
    ) -> u64 {
        self.counts[row * SIMILARITY_BINS + similarity_bin]
    }

    /// One slice per precursor difference row.
    pub fn rows(&self) -> impl Iterator<Item = &[u64]> {
        self.counts.chunks(SIMILARITY_BINS)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
