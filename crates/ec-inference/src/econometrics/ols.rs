//! Pooled ordinary least squares.
//!
//! Single-equation least squares that ignores any panel structure. Inference
//! is classical with `n - k` residual degrees of freedom.

use ec_core::{Error, Method, Result};
use nalgebra::{DMatrix, DVector};

use super::linalg::{CoefTable, centered_tss, least_squares, r_squared};

/// Result of a pooled OLS regression.
#[derive(Debug, Clone)]
pub struct OlsResult {
    /// Coefficients, standard errors and p-values in design order.
    pub table: CoefTable,
    /// Unadjusted centered R².
    pub r_squared: f64,
    /// Adjusted R².
    pub adj_r_squared: f64,
    /// Overall F statistic (all slopes zero), when the design has an intercept
    /// and at least one slope.
    pub f_statistic: Option<f64>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Number of observations.
    pub n_obs: usize,
}

/// Fit OLS.
///
/// # Arguments
///
/// - `y`: response (length n).
/// - `x`: design matrix, row-major, shape (n, k). Include the intercept column if desired.
/// - `names`: column labels for `x` (length k).
pub fn ols_fit(y: &[f64], x: &[f64], names: &[String]) -> Result<OlsResult> {
    let method = Method::Ols;
    let n = y.len();
    let k = names.len();
    if k == 0 {
        return Err(Error::Validation("OLS design must have at least one column".into()));
    }
    if x.len() != n * k {
        return Err(Error::Validation(format!("x length ({}) != n*k ({})", x.len(), n * k)));
    }
    if n <= k {
        return Err(Error::InsufficientData { method, rows: n, params: k });
    }

    let x_mat = DMatrix::from_row_slice(n, k, x);
    let y_vec = DVector::from_column_slice(y);
    let ls = least_squares(method, &x_mat, &y_vec, names)?;

    let df_resid = (n - k) as f64;
    let table =
        CoefTable::classical(method, names.to_vec(), &ls.beta, &ls.xtx_inv, ls.rss, df_resid)?;

    let tss = centered_tss(y);
    let r2 = r_squared(ls.rss, tss);
    let adj_r_squared = 1.0 - (1.0 - r2) * (n as f64 - 1.0) / df_resid;

    let has_intercept = (0..k).any(|j| x_mat.column(j).iter().all(|&v| v == 1.0));
    let f_statistic = if has_intercept && k > 1 && ls.rss > 0.0 {
        Some(((tss - ls.rss) / (k - 1) as f64) / (ls.rss / df_resid))
    } else {
        None
    };

    Ok(OlsResult {
        table,
        r_squared: r2,
        adj_r_squared,
        f_statistic,
        rss: ls.rss,
        n_obs: n,
    })
}
