//! Least-squares kernel shared by all estimators.
//!
//! Every estimator reduces to one or more classical least-squares solves on a
//! transformed design. This module performs the solve with a rank check and
//! turns coefficients plus `(X'X)^{-1}` into classical standard errors and
//! two-sided Student-t p-values.

use ec_core::{Error, Method, Result};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Scaled singular values below `RANK_TOL * s_max` are treated as zero.
const RANK_TOL: f64 = 1e-10;

/// Loading above which a column is reported as part of a collinear set.
const NULLSPACE_LOADING: f64 = 1e-3;

/// Coefficient table common to all estimator results.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefTable {
    /// Regressor names, in design order.
    pub names: Vec<String>,
    /// Point estimates.
    pub coefficients: Vec<f64>,
    /// Classical standard errors.
    pub std_errors: Vec<f64>,
    /// t statistics.
    pub t_values: Vec<f64>,
    /// Two-sided p-values under t(df_resid).
    pub p_values: Vec<f64>,
    /// Residual degrees of freedom used for inference.
    pub df_resid: f64,
}

impl CoefTable {
    /// Classical (homoskedastic) inference: `V = σ² (X'X)^{-1}`, `σ² = RSS / df`.
    pub(crate) fn classical(
        method: Method,
        names: Vec<String>,
        beta: &DVector<f64>,
        xtx_inv: &DMatrix<f64>,
        rss: f64,
        df_resid: f64,
    ) -> Result<Self> {
        if df_resid <= 0.0 {
            return Err(Error::Estimation {
                method,
                message: format!("no residual degrees of freedom (df={df_resid})"),
            });
        }
        let sigma2 = rss / df_resid;
        let dist = StudentsT::new(0.0, 1.0, df_resid).map_err(|e| Error::Estimation {
            method,
            message: format!("invalid t distribution (df={df_resid}): {e}"),
        })?;

        let p = beta.len();
        let coefficients: Vec<f64> = beta.iter().copied().collect();
        let std_errors: Vec<f64> =
            (0..p).map(|j| (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt()).collect();
        let t_values: Vec<f64> =
            coefficients.iter().zip(&std_errors).map(|(&b, &se)| t_stat(b, se)).collect();
        let p_values: Vec<f64> = t_values.iter().map(|&t| two_sided_p(&dist, t)).collect();

        if coefficients.iter().chain(&std_errors).any(|v| v.is_nan()) {
            return Err(Error::Estimation {
                method,
                message: "non-finite coefficient or standard error".into(),
            });
        }

        Ok(Self { names, coefficients, std_errors, t_values, p_values, df_resid })
    }
}

fn t_stat(beta: f64, se: f64) -> f64 {
    if se > 0.0 {
        beta / se
    } else if beta == 0.0 {
        0.0
    } else {
        beta.signum() * f64::INFINITY
    }
}

fn two_sided_p(dist: &StudentsT, t: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0)
}

/// Output of a least-squares solve.
#[derive(Debug, Clone)]
pub(crate) struct LeastSquares {
    pub beta: DVector<f64>,
    pub xtx_inv: DMatrix<f64>,
    pub resid: DVector<f64>,
    pub rss: f64,
}

/// Solve `min ||y - X b||²` after verifying that `X` has full column rank.
///
/// `names` label the columns of `X` and are used to report collinear sets.
pub(crate) fn least_squares(
    method: Method,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    names: &[String],
) -> Result<LeastSquares> {
    let (n, p) = x.shape();
    if n < p || n == 0 {
        return Err(Error::InsufficientData { method, rows: n, params: p });
    }
    ensure_full_rank(method, x, names)?;

    let xtx = x.transpose() * x;
    let chol = xtx.cholesky().ok_or_else(|| Error::Singular { method, columns: names.to_vec() })?;
    let xtx_inv = chol.inverse();
    let beta = chol.solve(&(x.transpose() * y));

    let resid = y - x * &beta;
    let rss = resid.norm_squared();
    if !rss.is_finite() {
        return Err(Error::Estimation { method, message: "residual sum of squares is not finite".into() });
    }

    Ok(LeastSquares { beta, xtx_inv, resid, rss })
}

/// Residual sum of squares of a least-squares fit that tolerates rank deficiency,
/// together with the numerical rank of `X`.
///
/// Used for auxiliary regressions (variance components) where only the
/// residual variance matters.
pub(crate) fn residual_ss_pinv(
    method: Method,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
) -> Result<(f64, usize)> {
    if x.ncols() == 0 {
        return Ok((y.norm_squared(), 0));
    }
    let svd = x.clone().svd(true, true);
    let s_max = svd.singular_values.iter().fold(0.0_f64, |a, &b| a.max(b));
    let eps = s_max * RANK_TOL;
    let rank = svd.singular_values.iter().filter(|&&s| s > eps).count();
    let beta = svd
        .solve(y, eps)
        .map_err(|e| Error::Estimation { method, message: format!("SVD solve failed: {e}") })?;
    let resid = y - x * beta;
    Ok((resid.norm_squared(), rank))
}

/// Reject designs whose unit-scaled columns are numerically collinear.
///
/// Reports the columns loading on the near-null right singular vectors.
fn ensure_full_rank(method: Method, x: &DMatrix<f64>, names: &[String]) -> Result<()> {
    let p = x.ncols();
    let mut scaled = x.clone();
    for j in 0..p {
        let norm = scaled.column(j).norm();
        if norm == 0.0 {
            let col = names.get(j).cloned().unwrap_or_else(|| format!("x{j}"));
            return Err(Error::Singular { method, columns: vec![col] });
        }
        scaled.column_mut(j).scale_mut(1.0 / norm);
    }

    let svd = scaled.svd(false, true);
    let svals = &svd.singular_values;
    let s_max = svals.iter().fold(0.0_f64, |a, &b| a.max(b));
    let deficient: Vec<usize> =
        (0..svals.len()).filter(|&i| svals[i] <= RANK_TOL * s_max).collect();
    if deficient.is_empty() {
        return Ok(());
    }

    let mut columns = Vec::new();
    if let Some(v_t) = svd.v_t.as_ref() {
        for j in 0..p {
            if deficient.iter().any(|&i| v_t[(i, j)].abs() > NULLSPACE_LOADING) {
                columns.push(names.get(j).cloned().unwrap_or_else(|| format!("x{j}")));
            }
        }
    }
    if columns.is_empty() {
        columns = names.to_vec();
    }
    log::debug!("{method}: rank-deficient design, collinear set {columns:?}");
    Err(Error::Singular { method, columns })
}

/// Centered total sum of squares.
pub(crate) fn centered_tss(y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    y.iter().map(|v| (v - mean).powi(2)).sum()
}

/// `1 - rss / tss`, or NaN when the response has no variation.
pub(crate) fn r_squared(rss: f64, tss: f64) -> f64 {
    if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN }
}
