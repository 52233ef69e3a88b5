//! # ec-inference
//!
//! Estimators and analysis dispatch for EconStat.
//!
//! This crate provides:
//! - Pooled OLS, IV-2SLS, panel fixed effects and random effects
//! - Parameter resolution from loosely-typed requests
//! - A single entry point, [`analyze`], returning a uniform [`ec_core::AnalysisResult`]
//!
//! ## Architecture
//!
//! Estimators work on plain row-major `f64` slices; only [`dispatch`] knows
//! about [`ec_core::Dataset`]. Nothing here performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Dataset shaping and method dispatch.
pub mod dispatch;
/// Econometric estimators (OLS, IV, FE, RE).
pub mod econometrics;
/// Parameter bag and typed per-method parameters.
pub mod params;
/// Text regression tables.
pub mod summary;

pub use dispatch::{analyze, analyze_named, analyze_spec};
pub use params::{AnalysisSpec, InstrumentalParams, PanelParams, ParamBag, PooledParams};
