//! Global comparison of two collections of tandem mass spectra.
//!
//! Spectra are read from MGF, binned into unit vectors, matched within
//! scan / retention time / precursor windows and the share of spectra with
//! a close match in the other dataset is turned into a set distance.
//!
//! ```text
//!  MGF A, MGF B
//!      │  ms::mgf
//!      ▼
//!   Dataset ──► scoring::topk ──► scoring::vectorize
//!                                       │
//!                                       ▼
//!                 scoring::matcher (A→B, B→A)
//!                                       │
//!                                       ▼
//!                 scoring::distance ──► pipeline::ComparisonReport ──► output
//! ```

pub mod config;
pub mod errors;
pub mod ms;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod utils;

pub use config::{
    ComparisonConfig,
    DistanceMetric,
    QcMeasure,
    SimilarityFunction,
};
pub use errors::{
    CompareError,
    InputWarning,
};
pub use pipeline::{
    compare_datasets,
    compare_files,
    ComparisonReport,
    EffectiveWindows,
};
