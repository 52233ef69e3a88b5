//! Panel linear regression with entity fixed effects.
//!
//! Implements the entity-demeaned ("within") OLS estimator for balanced and
//! unbalanced panels. Grand means are added back after demeaning so that a
//! common intercept is identified alongside the absorbed entity effects; the
//! per-entity effects themselves are never reported.
//!
//! # References
//!
//! - Wooldridge, *Econometric Analysis of Cross Section and Panel Data*, Ch. 10.

use ec_core::{Error, INTERCEPT, Method, Result};
use nalgebra::{DMatrix, DVector};

use super::linalg::{CoefTable, centered_tss, least_squares, r_squared};

/// Result of a panel fixed-effects regression.
#[derive(Debug, Clone)]
pub struct PanelFEResult {
    /// `const` followed by the regressors (entity effects excluded).
    pub table: CoefTable,
    /// R² (within).
    pub r_squared_within: f64,
    /// R² of the fitted common part on untransformed data.
    pub r_squared_overall: f64,
    /// Number of observations.
    pub n_obs: usize,
    /// Number of entities (groups).
    pub n_entities: usize,
    /// Residual sum of squares.
    pub rss: f64,
}

/// Row indices grouped by entity, in order of first appearance.
#[derive(Debug, Clone)]
pub(crate) struct EntityGroups {
    pub groups: Vec<Vec<usize>>,
}

impl EntityGroups {
    pub(crate) fn new(entity_ids: &[u64]) -> Self {
        let mut index: std::collections::HashMap<u64, usize> = std::collections::HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (i, &eid) in entity_ids.iter().enumerate() {
            let g = *index.entry(eid).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(i);
        }
        Self { groups }
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    /// Entity mean of each column of a row-major (n × p) block.
    pub(crate) fn means(&self, data: &[f64], p: usize) -> Vec<Vec<f64>> {
        self.groups
            .iter()
            .map(|rows| {
                let ni = rows.len() as f64;
                let mut m = vec![0.0; p];
                for &i in rows {
                    for (j, mj) in m.iter_mut().enumerate() {
                        *mj += data[i * p + j];
                    }
                }
                m.iter_mut().for_each(|v| *v /= ni);
                m
            })
            .collect()
    }

    /// Subtract `weight(g) * entity mean` from every row of a row-major (n × p) block.
    pub(crate) fn quasi_demean(
        &self,
        data: &[f64],
        p: usize,
        weight: impl Fn(usize) -> f64,
    ) -> Vec<f64> {
        let means = self.means(data, p);
        let mut out = data.to_vec();
        for (g, rows) in self.groups.iter().enumerate() {
            let w = weight(g);
            for &i in rows {
                for j in 0..p {
                    out[i * p + j] -= w * means[g][j];
                }
            }
        }
        out
    }
}

pub(crate) fn validate_panel_inputs(entity_ids: &[u64], x: &[f64], y: &[f64], p: usize) -> Result<()> {
    let n = y.len();
    if n == 0 {
        return Err(Error::Validation("y must be non-empty".into()));
    }
    if entity_ids.len() != n {
        return Err(Error::Validation(format!(
            "entity_ids length ({}) != n ({})",
            entity_ids.len(),
            n
        )));
    }
    if x.len() != n * p {
        return Err(Error::Validation(format!("x length ({}) != n*p ({})", x.len(), n * p)));
    }
    Ok(())
}

/// Fit a panel fixed-effects ("within") regression.
///
/// # Arguments
///
/// - `entity_ids`: group identifier for each observation (length n).
/// - `x`: regressors, row-major, shape (n, p). No intercept column; one is added.
/// - `y`: dependent variable (length n).
/// - `names`: regressor labels (length p).
///
/// Residual degrees of freedom are `n - G - p`.
pub fn panel_fe_fit(entity_ids: &[u64], x: &[f64], y: &[f64], names: &[String]) -> Result<PanelFEResult> {
    let method = Method::FixedEffects;
    let p = names.len();
    validate_panel_inputs(entity_ids, x, y, p)?;
    let n = y.len();

    let groups = EntityGroups::new(entity_ids);
    let n_entities = groups.len();
    if n <= n_entities + p {
        return Err(Error::InsufficientData { method, rows: n, params: n_entities + p });
    }

    let y_dm = groups.quasi_demean(y, 1, |_| 1.0);
    let x_dm = groups.quasi_demean(x, p, |_| 1.0);
    let y_bar = y.iter().sum::<f64>() / n as f64;
    let x_bar: Vec<f64> =
        (0..p).map(|j| (0..n).map(|i| x[i * p + j]).sum::<f64>() / n as f64).collect();

    // [const | x - x̄ᵢ + x̄], response y - ȳᵢ + ȳ
    let design = DMatrix::from_fn(n, p + 1, |i, j| {
        if j == 0 { 1.0 } else { x_dm[i * p + j - 1] + x_bar[j - 1] }
    });
    let response = DVector::from_iterator(n, y_dm.iter().map(|v| v + y_bar));

    let mut all_names = Vec::with_capacity(p + 1);
    all_names.push(INTERCEPT.to_string());
    all_names.extend_from_slice(names);

    let ls = least_squares(method, &design, &response, &all_names)?;

    let df_resid = (n - n_entities - p) as f64;
    let table = CoefTable::classical(method, all_names, &ls.beta, &ls.xtx_inv, ls.rss, df_resid)?;

    let tss_within: f64 = y_dm.iter().map(|v| v * v).sum();
    let r_squared_within = r_squared(ls.rss, tss_within);

    let rss_overall: f64 = (0..n)
        .map(|i| {
            let fit = ls.beta[0] + (0..p).map(|j| ls.beta[j + 1] * x[i * p + j]).sum::<f64>();
            (y[i] - fit).powi(2)
        })
        .sum();
    let r_squared_overall = r_squared(rss_overall, centered_tss(y));

    log::debug!("FE: n={n}, entities={n_entities}, regressors={p}, rss={:.6e}", ls.rss);

    Ok(PanelFEResult {
        table,
        r_squared_within,
        r_squared_overall,
        n_obs: n,
        n_entities,
        rss: ls.rss,
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
    fn test_panel_fe_two_entities() {
        // Entity 1: x=[1,2,3], y=[2,4,6] => within beta=2
        // Entity 2: x=[10,20,30], y=[20,40,60] => within beta=2
        let entity_ids = vec![1, 1, 1, 2, 2, 2];
        let x = vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
        let y = vec![2.0, 4.0, 6.0, 20.0, 40.0, 60.0];

        let res = panel_fe_fit(&entity_ids, &x, &y, &s(&["x"])).unwrap();
        assert_eq!(res.n_obs, 6);
        assert_eq!(res.n_entities, 2);
        assert_eq!(res.table.names, s(&["const", "x"]));
        assert_abs_diff_eq!(res.table.coefficients[1], 2.0, epsilon = 1e-10);
        // const = ȳ - β x̄ = 22 - 2*11 = 0
        assert_abs_diff_eq!(res.table.coefficients[0], 0.0, epsilon = 1e-9);
        assert!(res.r_squared_within > 0.999);
        assert!(res.rss < 1e-20);
    }

    #[test]
    fn test_panel_fe_absorbs_entity_intercepts() {
        // Entity 1: y ≈ 5 + 3x, Entity 2: y ≈ 10 + 3x
        let entity_ids = vec![1, 1, 1, 1, 2, 2, 2, 2];
        let x = vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![8.1, 11.0, 13.9, 17.1, 13.0, 16.1, 18.9, 22.0];

        let res = panel_fe_fit(&entity_ids, &x, &y, &s(&["x"])).unwrap();
        assert!((res.table.coefficients[1] - 3.0).abs() < 0.2, "beta={}", res.table.coefficients[1]);
        assert!(res.table.std_errors[1] > 0.0);
        // Residual df = 8 - 2 - 1
        assert_abs_diff_eq!(res.table.df_resid, 5.0);
        assert!(res.table.p_values[1] < 1e-4);
    }

    #[test]
    fn test_panel_fe_time_invariant_regressor_is_singular() {
        let entity_ids = vec![1, 1, 2, 2, 3, 3];
        // z is constant within entity -> collinear with absorbed effects
        let x = vec![1.0, 5.0, 2.0, 5.0, 3.0, 7.0, 4.0, 7.0, 5.0, 9.0, 7.0, 9.0];
        let y = vec![1.0, 2.0, 2.5, 3.5, 5.0, 6.5];
        let err = panel_fe_fit(&entity_ids, &x, &y, &s(&["x", "z"])).unwrap_err();
        match err {
            Error::Singular { columns, .. } => assert!(columns.contains(&"z".to_string())),
            other => panic!("expected Singular, got {other:?}"),
        }
    }

    #[test]
    fn test_panel_fe_validation() {
        assert!(panel_fe_fit(&[], &[], &[], &s(&["x"])).is_err());
        assert!(panel_fe_fit(&[1], &[1.0], &[1.0, 2.0], &s(&["x"])).is_err());
        // one observation per entity leaves no within variation
        let err = panel_fe_fit(&[1, 2, 3], &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], &s(&["x"]))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }
}
