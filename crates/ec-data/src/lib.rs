//! # ec-data
//!
//! Data ingestion for EconStat: CSV uploads and remote indicator panels.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Metric name → indicator code catalog.
pub mod catalog;
/// CSV and Excel parsing with null normalization.
pub mod ingest;
/// World Bank API client.
pub mod world_bank;

pub use catalog::IndicatorCatalog;
pub use ingest::{UploadFormat, parse_cell, parse_csv, parse_excel, parse_upload, read_file};
pub use world_bank::{WorldBankClient, WorldBankConfig, merge_panel, parse_indicator_page};
