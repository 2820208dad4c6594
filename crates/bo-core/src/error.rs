//! Error types for binopt

use std::path::PathBuf;

use thiserror::Error;

/// binopt error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bin edges are not a valid binning (too short, not strictly increasing,
    /// non-finite, or more bins than allowed).
    #[error("invalid bin edges: {0}")]
    InvalidBinEdges(String),

    /// Histogram or requested binning has an unsupported number of dimensions.
    #[error("unsupported number of dimensions: {0}")]
    UnsupportedDimension(String),

    /// The new axis range does not contain the old axis range.
    #[error("{axis} ranges are not compatible: old [{old_min}, {old_max}] is not inside new [{new_min}, {new_max}]")]
    IncompatibleRange {
        /// Axis label (`x` or `y`).
        axis: &'static str,
        /// Old axis lower edge.
        old_min: f64,
        /// Old axis upper edge.
        old_max: f64,
        /// New axis lower edge.
        new_min: f64,
        /// New axis upper edge.
        new_max: f64,
    },

    /// A new bin would split an old bin.
    #[error("incompatible {axis} bin edges: old bin [{old_low}, {old_high}) is split by the new binning")]
    IncompatibleBinEdges {
        /// Axis label (`x` or `y`).
        axis: &'static str,
        /// Low edge of the offending old bin.
        old_low: f64,
        /// High edge of the offending old bin.
        old_high: f64,
    },

    /// Shape inputs are inconsistent with each other or with the datacard.
    #[error("histogram mismatch: {0}")]
    HistogramMismatch(String),

    /// The solver ran but its output contains no expected limit.
    #[error("limit not found for POI '{poi}'")]
    LimitNotFound {
        /// Parameter of interest that was requested.
        poi: String,
    },

    /// A preceding category has not been finalized yet.
    #[error("datacard '{}' for previous category '{category}' not found", path.display())]
    MissingPriorCategory {
        /// Category that is missing.
        category: String,
        /// Expected location of its finalized datacard.
        path: PathBuf,
    },

    /// A binning suggestion entry has an unknown shape.
    #[error("unknown format of suggested binning for category '{category}' in '{}'", source_file.display())]
    UnrecognizedSuggestionFormat {
        /// Suggestion file.
        source_file: PathBuf,
        /// Category key of the offending entry.
        category: String,
    },

    /// An external command exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ExternalToolFailure {
        /// Program that was invoked.
        tool: String,
        /// Exit status or spawn error.
        message: String,
    },

    /// A search finished without any evaluated binning.
    #[error("unable to find best binning for '{0}'")]
    NoResults(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
