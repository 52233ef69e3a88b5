//! Error types for EconStat

use thiserror::Error;

use crate::types::Method;

/// Coarse classification of an [`Error`], used by callers that map failures
/// onto transport-level responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-correctable input problem (unknown method, missing parameter or column).
    Validation,
    /// The data cannot support the requested fit (duplicate panel keys, too few rows,
    /// collinear design).
    DataQuality,
    /// The numerical routine failed.
    Estimation,
    /// Failure reading or decoding external input.
    Ingest,
    /// Remote data provider failed.
    Provider,
    /// I/O or serialization failure.
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name, used in JSON error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::DataQuality => "data_quality",
            ErrorKind::Estimation => "estimation",
            ErrorKind::Ingest => "ingest",
            ErrorKind::Provider => "provider",
            ErrorKind::Internal => "internal",
        }
    }
}

/// EconStat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Method name is not one of the supported estimators
    #[error("Unknown method '{0}' (expected one of OLS, 2SLS, FE, RE)")]
    UnknownMethod(String),

    /// A required parameter was not supplied
    #[error("{method} requires '{field}'")]
    MissingParameter { method: Method, field: &'static str },

    /// A referenced column is absent from the dataset
    #[error("{method}: column '{column}' not found in dataset")]
    MissingColumn { method: Method, column: String },

    /// A column used in the fit holds a non-numeric value
    #[error("{method}: column '{column}' has non-numeric value at row {row}")]
    NonNumeric { method: Method, column: String, row: usize },

    /// Two observations share the same (entity, time) key
    #[error("{method}: duplicate panel observation for entity '{entity}', time '{time}'")]
    DuplicatePanelKey { method: Method, entity: String, time: String },

    /// Not enough usable rows after listwise deletion
    #[error("{method}: insufficient data ({rows} usable rows for {params} parameters)")]
    InsufficientData { method: Method, rows: usize, params: usize },

    /// Design matrix is rank deficient
    #[error("{method}: design matrix is singular (collinear columns among {columns:?})")]
    Singular { method: Method, columns: Vec<String> },

    /// Numerical failure inside an estimator
    #[error("{method}: estimation failed: {message}")]
    Estimation { method: Method, message: String },

    /// Malformed upload or external table
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Remote indicator provider error
    #[error("Provider error: {0}")]
    Provider(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_)
            | Error::UnknownMethod(_)
            | Error::MissingParameter { .. }
            | Error::MissingColumn { .. }
            | Error::NonNumeric { .. } => ErrorKind::Validation,
            Error::DuplicatePanelKey { .. }
            | Error::InsufficientData { .. }
            | Error::Singular { .. } => ErrorKind::DataQuality,
            Error::Estimation { .. } => ErrorKind::Estimation,
            Error::Ingest(_) => ErrorKind::Ingest,
            Error::Provider(_) => ErrorKind::Provider,
            Error::Io(_) | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// Whether the error arose while fitting (data-quality or numerical), as opposed
    /// to while validating the request.
    pub fn is_estimation_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::DataQuality | ErrorKind::Estimation)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
