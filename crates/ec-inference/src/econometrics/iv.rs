//! Instrumental Variables / Two-Stage Least Squares (2SLS).
//!
//! Standard 2SLS with a single-equation first stage per endogenous regressor,
//! first-stage F-statistic and weak-instrument flag (Stock–Yogo critical values).
//!
//! # References
//!
//! - Wooldridge, *Econometric Analysis of Cross Section and Panel Data*, Ch. 5.
//! - Stock & Yogo (2005), "Testing for weak instruments in linear IV regression."

use ec_core::{Error, Method, Result};
use nalgebra::{DMatrix, DVector};

use super::linalg::{CoefTable, centered_tss, least_squares, r_squared, residual_ss_pinv};

/// First-stage regression diagnostics.
#[derive(Debug, Clone)]
pub struct FirstStageResult {
    /// Endogenous regressor this stage predicts.
    pub endog_name: String,
    /// First-stage F-statistic (joint significance of excluded instruments).
    pub f_stat: f64,
    /// First-stage R².
    pub r_squared: f64,
    /// Partial R² of excluded instruments.
    pub partial_r_squared: f64,
    /// Whether the instruments pass the Stock–Yogo 10% maximal IV size
    /// critical value.
    pub passes_stock_yogo_10: bool,
}

/// Result of a 2SLS regression.
#[derive(Debug, Clone)]
pub struct IvResult {
    /// Second-stage coefficients in `[exog | endog]` order.
    pub table: CoefTable,
    /// IV R²: `1 - RSS/TSS` from structural residuals. May be negative.
    pub r_squared: f64,
    /// First-stage diagnostics (one per endogenous regressor).
    pub first_stage: Vec<FirstStageResult>,
    /// Number of observations.
    pub n_obs: usize,
    /// Number of excluded instruments.
    pub n_instruments: usize,
}

/// Row-major design blocks for [`iv_2sls`]. Every block has `y.len()` rows.
#[derive(Debug, Clone, Copy)]
pub struct IvData<'a> {
    /// Dependent variable (length n).
    pub y: &'a [f64],
    /// Exogenous regressors, (n × exog_names.len()). Include the intercept column if desired.
    pub x_exog: &'a [f64],
    /// Endogenous regressors, (n × endog_names.len()).
    pub x_endog: &'a [f64],
    /// Excluded instruments, (n × instrument_names.len()).
    pub z: &'a [f64],
    /// Labels of the exogenous columns.
    pub exog_names: &'a [String],
    /// Labels of the endogenous columns.
    pub endog_names: &'a [String],
    /// Labels of the instrument columns.
    pub instrument_names: &'a [String],
}

/// Stock–Yogo 10% maximal IV size critical values for one endogenous regressor.
fn stock_yogo_cv(k_endog: usize, m: usize) -> f64 {
    match (k_endog, m) {
        (1, 1) => 16.38,
        (1, 2) => 19.93,
        (1, 3) => 22.30,
        _ => 10.0,
    }
}

/// Two-Stage Least Squares (2SLS) estimator.
pub fn iv_2sls(data: IvData<'_>) -> Result<IvResult> {
    let method = Method::Tsls;
    let y = data.y;
    let n = y.len();
    let k_exog = data.exog_names.len();
    let k_endog = data.endog_names.len();
    let m = data.instrument_names.len();

    if data.x_exog.len() != n * k_exog {
        return Err(Error::Validation(format!(
            "x_exog length ({}) != n*k_exog ({})",
            data.x_exog.len(),
            n * k_exog
        )));
    }
    if data.x_endog.len() != n * k_endog {
        return Err(Error::Validation(format!(
            "x_endog length ({}) != n*k_endog ({})",
            data.x_endog.len(),
            n * k_endog
        )));
    }
    if data.z.len() != n * m {
        return Err(Error::Validation(format!("z length ({}) != n*m ({})", data.z.len(), n * m)));
    }
    if k_endog == 0 {
        return Err(Error::Validation("Must have at least 1 endogenous regressor".into()));
    }
    if m < k_endog {
        return Err(Error::Validation(format!(
            "Under-identified: {} instruments < {} endogenous regressors",
            m, k_endog
        )));
    }

    let k_full_z = k_exog + m;
    let k_total = k_exog + k_endog;
    if n <= k_full_z.max(k_total) {
        return Err(Error::InsufficientData { method, rows: n, params: k_full_z.max(k_total) });
    }

    let y_vec = DVector::from_column_slice(y);
    let x_endog_mat = DMatrix::from_row_slice(n, k_endog, data.x_endog);
    let x_exog_mat = DMatrix::from_row_slice(n, k_exog, data.x_exog);

    // Full instrument matrix: [X_exog | Z]
    let z_full = DMatrix::from_fn(n, k_full_z, |i, j| {
        if j < k_exog { data.x_exog[i * k_exog + j] } else { data.z[i * m + (j - k_exog)] }
    });
    let z_names: Vec<String> =
        data.exog_names.iter().chain(data.instrument_names).cloned().collect();

    // ---- First stage: regress each endogenous var on Z_full ----
    let mut first_stage = Vec::with_capacity(k_endog);
    let mut x_endog_hat = DMatrix::<f64>::zeros(n, k_endog);
    for e in 0..k_endog {
        let endog_vec = x_endog_mat.column(e).clone_owned();
        let fs = least_squares(method, &z_full, &endog_vec, &z_names)?;
        x_endog_hat.set_column(e, &(&endog_vec - &fs.resid));

        let endog_col: Vec<f64> = endog_vec.iter().copied().collect();
        let tss_fs = centered_tss(&endog_col);
        let rss_fs = fs.rss;
        let fs_r2 = if tss_fs > 0.0 { 1.0 - rss_fs / tss_fs } else { 0.0 };

        // Partial F: joint significance of excluded instruments.
        let rss_restricted =
            if k_exog > 0 { residual_ss_pinv(method, &x_exog_mat, &endog_vec)?.0 } else { tss_fs };
        let f_stat = if rss_fs > 0.0 {
            ((rss_restricted - rss_fs) / m as f64) / (rss_fs / (n - k_full_z) as f64)
        } else {
            f64::INFINITY
        };
        let partial_r_squared =
            if rss_restricted > 0.0 { (rss_restricted - rss_fs) / rss_restricted } else { 0.0 };

        first_stage.push(FirstStageResult {
            endog_name: data.endog_names[e].clone(),
            f_stat,
            r_squared: fs_r2,
            partial_r_squared,
            passes_stock_yogo_10: f_stat > stock_yogo_cv(k_endog, m),
        });
    }

    // ---- Second stage: regress y on [X_exog | X̂_endog] ----
    let x2 = DMatrix::from_fn(n, k_total, |i, j| {
        if j < k_exog { x_exog_mat[(i, j)] } else { x_endog_hat[(i, j - k_exog)] }
    });
    let names: Vec<String> = data.exog_names.iter().chain(data.endog_names).cloned().collect();
    let second = least_squares(method, &x2, &y_vec, &names)?;

    // Structural residuals use the ORIGINAL endogenous regressors.
    let x_orig = DMatrix::from_fn(n, k_total, |i, j| {
        if j < k_exog { x_exog_mat[(i, j)] } else { x_endog_mat[(i, j - k_exog)] }
    });
    let resid = &y_vec - &x_orig * &second.beta;
    let rss = resid.norm_squared();

    let df_resid = (n - k_total) as f64;
    let table = CoefTable::classical(method, names, &second.beta, &second.xtx_inv, rss, df_resid)?;

    Ok(IvResult {
        table,
        r_squared: r_squared(rss, centered_tss(y)),
        first_stage,
        n_obs: n,
        n_instruments: m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_iv_2sls_exact_identification() {
        // True model: y = 1 + 2*x_endog, x_endog = 0.5*z + small wiggle.
        let n = 100;
        let mut y = Vec::with_capacity(n);
        let mut x_exog = Vec::with_capacity(n);
        let mut x_endog = Vec::with_capacity(n);
        let mut z = Vec::with_capacity(n);

        for i in 0..n {
            let zi = (i as f64) / 10.0;
            let xi = 0.5 * zi + if i % 2 == 0 { 0.01 } else { -0.01 };
            x_exog.push(1.0);
            x_endog.push(xi);
            z.push(zi);
            y.push(1.0 + 2.0 * xi);
        }

        let (exog, endog, inst) = (s(&["const"]), s(&["x"]), s(&["z"]));
        let res = iv_2sls(IvData {
            y: &y,
            x_exog: &x_exog,
            x_endog: &x_endog,
            z: &z,
            exog_names: &exog,
            endog_names: &endog,
            instrument_names: &inst,
        })
        .unwrap();

        assert_eq!(res.n_obs, n);
        assert_eq!(res.n_instruments, 1);
        assert_eq!(res.table.names, s(&["const", "x"]));
        assert_abs_diff_eq!(res.table.coefficients[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(res.table.coefficients[1], 2.0, epsilon = 1e-6);
        assert!(res.first_stage[0].f_stat > 0.0);
        assert!(res.first_stage[0].r_squared > 0.99);
        assert!(res.first_stage[0].passes_stock_yogo_10);
        assert_abs_diff_eq!(res.r_squared, 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_iv_corrects_endogeneity() {
        // u is a common shock: x = z + u, y = 3 + 1.5 x + u.
        // OLS is biased upward; 2SLS with z recovers 1.5 on average.
        let n = 400;
        let (mut y, mut x_exog, mut x_endog, mut z) = (vec![], vec![], vec![], vec![]);
        for i in 0..n {
            let zi = ((i * 37) % 101) as f64 / 10.0;
            let ui = (((i * 53) % 97) as f64 / 97.0 - 0.5) * 2.0;
            let xi = zi + ui;
            x_exog.push(1.0);
            x_endog.push(xi);
            z.push(zi);
            y.push(3.0 + 1.5 * xi + ui);
        }
        let (exog, endog, inst) = (s(&["const"]), s(&["x"]), s(&["z"]));
        let res = iv_2sls(IvData {
            y: &y,
            x_exog: &x_exog,
            x_endog: &x_endog,
            z: &z,
            exog_names: &exog,
            endog_names: &endog,
            instrument_names: &inst,
        })
        .unwrap();
        assert!((res.table.coefficients[1] - 1.5).abs() < 0.15, "beta={}", res.table.coefficients[1]);
        assert!(res.table.p_values.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_iv_under_identified() {
        let y = vec![1.0, 2.0, 3.0];
        let x_exog = vec![1.0, 1.0, 1.0];
        let x_endog = vec![1.0, 2.0, 2.0, 3.0, 3.0, 4.0];
        let z = vec![0.5, 1.0, 1.5];
        let (exog, endog, inst) = (s(&["const"]), s(&["a", "b"]), s(&["z"]));

        let res = iv_2sls(IvData {
            y: &y,
            x_exog: &x_exog,
            x_endog: &x_endog,
            z: &z,
            exog_names: &exog,
            endog_names: &endog,
            instrument_names: &inst,
        });
        assert!(res.is_err());
    }

    #[test]
    fn test_iv_validation() {
        let endog = s(&["x"]);
        let inst = s(&["z"]);
        let res = iv_2sls(IvData {
            y: &[],
            x_exog: &[],
            x_endog: &[1.0],
            z: &[],
            exog_names: &[],
            endog_names: &endog,
            instrument_names: &inst,
        });
        assert!(res.is_err());
    }
}
