//! # ec-core
//!
//! Core types for EconStat: the tabular [`Dataset`], the [`Method`] selector,
//! the uniform [`AnalysisResult`] record and the shared [`Error`] type.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dataset;
pub mod error;
pub mod traits;
pub mod types;

pub use dataset::{Dataset, Row, Value, is_null_token};
pub use error::{Error, ErrorKind, Result};
pub use traits::{IndicatorSource, PanelRequest};
pub use types::{AnalysisResult, INTERCEPT, Method};

/// Crate version, reported by the CLI and the server health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
