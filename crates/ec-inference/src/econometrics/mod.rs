//! Econometric estimators.
//!
//! This module provides:
//! - **Pooled OLS** with classical standard errors.
//! - **Instrumental Variables** (IV / 2SLS) with first-stage F-statistic and
//!   weak-instrument diagnostics (Stock–Yogo critical values).
//! - **Panel fixed effects** (entity "within" estimator).
//! - **Panel random effects** (Swamy–Arora quasi-demeaning).
//!
//! All estimators report classical (homoskedastic) standard errors and
//! two-sided Student-t p-values with the estimator's residual degrees of freedom.

pub mod iv;
pub mod linalg;
pub mod ols;
pub mod panel;
pub mod random_effects;

pub use iv::{FirstStageResult, IvData, IvResult, iv_2sls};
pub use linalg::CoefTable;
pub use ols::{OlsResult, ols_fit};
pub use panel::{PanelFEResult, panel_fe_fit};
pub use random_effects::{RandomEffectsResult, random_effects_fit};
