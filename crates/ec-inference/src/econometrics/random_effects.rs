//! Random-effects panel regression (Swamy–Arora variance components).
//!
//! Entity heterogeneity is modelled as a random intercept. The estimator
//! quasi-demeans every column by `θᵢ · mean_i`, with
//! `θᵢ = 1 - sqrt(σ²ₑ / (Tᵢ σ²ᵤ + σ²ₑ))`, then runs OLS on the transformed data.
//!
//! Variance components:
//! - `σ²ₑ` from the within regression, `RSS_w / (n - G - rank_w)`;
//! - `σ²ᵤ = max(0, RSS_b / (G - k) - σ²ₑ / T̄)`, where `RSS_b` is from the
//!   between regression on entity means and `T̄` is the harmonic mean of `Tᵢ`.
//!
//! # References
//!
//! - Swamy & Arora (1972), "The exact finite sample properties of the estimators
//!   of coefficients in the error components regression models."
//! - Baltagi, *Econometric Analysis of Panel Data*, Ch. 2.

use ec_core::{Error, INTERCEPT, Method, Result};
use nalgebra::{DMatrix, DVector};

use super::linalg::{CoefTable, centered_tss, least_squares, r_squared, residual_ss_pinv};
use super::panel::{EntityGroups, validate_panel_inputs};

/// Result of a random-effects regression.
#[derive(Debug, Clone)]
pub struct RandomEffectsResult {
    /// `const` followed by the regressors.
    pub table: CoefTable,
    /// Overall R²: untransformed data against the RE coefficients.
    pub r_squared_overall: f64,
    /// R² of the quasi-demeaned regression.
    pub r_squared_gls: f64,
    /// Idiosyncratic error variance.
    pub sigma2_e: f64,
    /// Entity effect variance.
    pub sigma2_u: f64,
    /// Quasi-demeaning weight per entity, in order of first appearance.
    pub theta: Vec<f64>,
    /// Number of observations.
    pub n_obs: usize,
    /// Number of entities.
    pub n_entities: usize,
}

/// Fit a random-effects regression.
///
/// Arguments follow [`super::panel::panel_fe_fit`]: `x` excludes the intercept,
/// which is added and reported as `const`.
pub fn random_effects_fit(
    entity_ids: &[u64],
    x: &[f64],
    y: &[f64],
    names: &[String],
) -> Result<RandomEffectsResult> {
    let method = Method::RandomEffects;
    let p = names.len();
    validate_panel_inputs(entity_ids, x, y, p)?;
    let n = y.len();
    let k = p + 1;

    let groups = EntityGroups::new(entity_ids);
    let n_entities = groups.len();
    if n_entities <= k {
        return Err(Error::InsufficientData { method, rows: n_entities, params: k });
    }
    if n <= n_entities + p {
        return Err(Error::InsufficientData { method, rows: n, params: n_entities + p });
    }

    // ---- Within regression: idiosyncratic variance ----
    let y_w = DVector::from_vec(groups.quasi_demean(y, 1, |_| 1.0));
    let x_w = DMatrix::from_row_slice(n, p, &groups.quasi_demean(x, p, |_| 1.0));
    let (rss_w, rank_w) = residual_ss_pinv(method, &x_w, &y_w)?;
    let df_w = n as f64 - n_entities as f64 - rank_w as f64;
    if df_w <= 0.0 {
        return Err(Error::InsufficientData { method, rows: n, params: n_entities + rank_w });
    }
    let sigma2_e = rss_w / df_w;

    // ---- Between regression on entity means: [1 | x̄ᵢ] → ȳᵢ ----
    let y_means = groups.means(y, 1);
    let x_means = groups.means(x, p);
    let x_b = DMatrix::from_fn(n_entities, k, |g, j| if j == 0 { 1.0 } else { x_means[g][j - 1] });
    let y_b = DVector::from_iterator(n_entities, y_means.iter().map(|m| m[0]));
    let (rss_b, _) = residual_ss_pinv(method, &x_b, &y_b)?;
    let s2_between = rss_b / (n_entities - k) as f64;

    let t_i: Vec<f64> = groups.groups.iter().map(|rows| rows.len() as f64).collect();
    let t_harmonic = n_entities as f64 / t_i.iter().map(|t| 1.0 / t).sum::<f64>();
    let sigma2_u = (s2_between - sigma2_e / t_harmonic).max(0.0);

    let theta: Vec<f64> = t_i
        .iter()
        .map(|&t| {
            let denom = t * sigma2_u + sigma2_e;
            if denom > 0.0 { 1.0 - (sigma2_e / denom).sqrt() } else { 0.0 }
        })
        .collect();

    // ---- GLS via quasi-demeaning, intercept column included ----
    let mut x_full = Vec::with_capacity(n * k);
    for i in 0..n {
        x_full.push(1.0);
        x_full.extend_from_slice(&x[i * p..(i + 1) * p]);
    }
    let y_star = groups.quasi_demean(y, 1, |g| theta[g]);
    let x_star = groups.quasi_demean(&x_full, k, |g| theta[g]);

    let mut all_names = Vec::with_capacity(k);
    all_names.push(INTERCEPT.to_string());
    all_names.extend_from_slice(names);

    let design = DMatrix::from_row_slice(n, k, &x_star);
    let response = DVector::from_column_slice(&y_star);
    let ls = least_squares(method, &design, &response, &all_names)?;

    let df_resid = (n - k) as f64;
    let table = CoefTable::classical(method, all_names, &ls.beta, &ls.xtx_inv, ls.rss, df_resid)?;

    let x_orig = DMatrix::from_row_slice(n, k, &x_full);
    let resid_overall = DVector::from_column_slice(y) - &x_orig * &ls.beta;
    let r_squared_overall = r_squared(resid_overall.norm_squared(), centered_tss(y));
    let r_squared_gls = r_squared(ls.rss, centered_tss(&y_star));

    log::debug!(
        "RE: n={n}, entities={n_entities}, sigma2_e={sigma2_e:.4e}, sigma2_u={sigma2_u:.4e}"
    );

    Ok(RandomEffectsResult {
        table,
        r_squared_overall,
        r_squared_gls,
        sigma2_e,
        sigma2_u,
        theta,
        n_obs: n,
        n_entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    /// Five entities, six periods, y = 2 + 1.5 x + a_i + e_it.
    fn panel() -> (Vec<u64>, Vec<f64>, Vec<f64>) {
        let effects = [0.8, -0.5, 0.3, -0.9, 0.4];
        let noise = [0.05, -0.03, 0.02, -0.04, 0.01, -0.01];
        let mut ids = Vec::new();
        let mut x = Vec::new();
        let mut y = Vec::new();
        for (g, a) in effects.iter().enumerate() {
            for (t, e) in noise.iter().enumerate() {
                let xi = (t as f64) + 0.3 * g as f64 + if (g + t) % 3 == 0 { 0.7 } else { 0.0 };
                ids.push(g as u64);
                x.push(xi);
                y.push(2.0 + 1.5 * xi + a + e * (1.0 + g as f64 * 0.2));
            }
        }
        (ids, x, y)
    }

    #[test]
    fn test_re_recovers_slope() {
        let (ids, x, y) = panel();
        let res = random_effects_fit(&ids, &x, &y, &s(&["x"])).unwrap();
        assert_eq!(res.n_obs, 30);
        assert_eq!(res.n_entities, 5);
        assert_eq!(res.table.names, s(&["const", "x"]));
        assert_abs_diff_eq!(res.table.coefficients[1], 1.5, epsilon = 0.05);
        assert!(res.sigma2_u > 0.0);
        // Large entity variance relative to noise: θ close to 1.
        assert!(res.theta.iter().all(|&t| t > 0.8 && t < 1.0));
        assert!(res.r_squared_overall > 0.9);
        assert_abs_diff_eq!(res.table.df_resid, 28.0);
    }

    #[test]
    fn test_re_without_entity_variance_is_pooled_ols() {
        // No entity effect at all: σ²ᵤ clamps to 0, θ = 0, RE == pooled OLS.
        let ids = vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3];
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let e = [0.1, -0.1, 0.0, -0.1, 0.1, 0.0, 0.1, 0.0, -0.1, 0.0, -0.1, 0.1];
        let y: Vec<f64> = x.iter().zip(e).map(|(xi, ei)| 1.0 + 0.5 * xi + ei).collect();

        let res = random_effects_fit(&ids, &x, &y, &s(&["x"])).unwrap();
        if res.sigma2_u == 0.0 {
            assert!(res.theta.iter().all(|&t| t == 0.0));
            let xs: Vec<f64> = x.iter().flat_map(|&v| [1.0, v]).collect();
            let ols = crate::econometrics::ols::ols_fit(&y, &xs, &s(&["const", "x"])).unwrap();
            assert_abs_diff_eq!(res.table.coefficients[1], ols.table.coefficients[1], epsilon = 1e-10);
        }
        assert_abs_diff_eq!(res.table.coefficients[1], 0.5, epsilon = 0.05);
    }

    #[test]
    fn test_re_needs_more_entities_than_parameters() {
        let ids = vec![0, 0, 1, 1];
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![1.0, 2.0, 3.0, 5.0];
        let err = random_effects_fit(&ids, &x, &y, &s(&["x"])).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { rows: 2, params: 2, .. }));
    }
}
