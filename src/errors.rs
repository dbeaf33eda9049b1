use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("dataset '{0}' contains no spectra")]
    EmptyDataset(String),

    #[error("comparison was cancelled")]
    Cancelled,

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write delimited report: {0}")]
    Csv(#[from] csv::Error),
}

impl CompareError {
    pub fn io(
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        CompareError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompareError>;

/// Recoverable problems with an input dataset.
///
/// None of these abort a run, the engine widens the affected
/// pruning window instead and records the warning in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputWarning {
    MissingScanNumbers { label: String },
    MissingRetentionTimes { label: String },
    UnsortedScanNumbers { label: String },
    UnsortedRetentionTimes { label: String },
}

impl fmt::Display for InputWarning {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            InputWarning::MissingScanNumbers { label } => write!(
                f,
                "no scan numbers found in '{}', scan window and scan range disabled",
                label
            ),
            InputWarning::MissingRetentionTimes { label } => write!(
                f,
                "no retention times found in '{}', retention time window and range disabled",
                label
            ),
            InputWarning::UnsortedScanNumbers { label } => write!(
                f,
                "scan numbers in '{}' are not sorted, scan window will not stop early",
                label
            ),
            InputWarning::UnsortedRetentionTimes { label } => write!(
                f,
                "retention times in '{}' are not sorted, retention time window will not stop early",
                label
            ),
        }
    }
}
