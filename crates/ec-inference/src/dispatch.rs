//! Analysis dispatch: dataset + method + parameters → [`AnalysisResult`].
//!
//! The dispatcher validates parameters, checks that every referenced column
//! exists, shapes the rows into the design the chosen estimator needs
//! (listwise deletion, panel keying), runs the estimator and normalizes its
//! output. It holds no state and performs no I/O.

use std::collections::{HashMap, HashSet};

use ec_core::{AnalysisResult, Dataset, Error, INTERCEPT, Method, Result};

use crate::econometrics::{
    CoefTable, IvData, iv_2sls, ols_fit, panel_fe_fit, random_effects_fit,
};
use crate::params::{AnalysisSpec, InstrumentalParams, PanelParams, ParamBag, PooledParams};
use crate::summary::{Summary, fmt_stat};

const SE_NOTE: &str =
    "Standard errors are classical (homoskedastic); p-values are two-sided t(df_resid).";

/// Run an analysis from a method selector and a loose parameter bag.
pub fn analyze(dataset: &Dataset, method: Method, params: &ParamBag) -> Result<AnalysisResult> {
    let spec = params.resolve(method)?;
    analyze_spec(dataset, &spec)
}

/// Like [`analyze`], with the method given by name (`"OLS"`, `"2SLS"`, `"FE"`, `"RE"`).
pub fn analyze_named(dataset: &Dataset, method: &str, params: &ParamBag) -> Result<AnalysisResult> {
    let method: Method = method.parse()?;
    analyze(dataset, method, params)
}

/// Run a fully-typed analysis.
pub fn analyze_spec(dataset: &Dataset, spec: &AnalysisSpec) -> Result<AnalysisResult> {
    spec.validate()?;
    let method = spec.method();
    for column in spec.columns() {
        if !dataset.has_column(column) {
            return Err(Error::MissingColumn { method, column: column.to_string() });
        }
    }
    log::info!("{method}: dispatching on {} rows", dataset.len());

    match spec {
        AnalysisSpec::Pooled(p) => run_pooled(dataset, p),
        AnalysisSpec::Instrumental(p) => run_instrumental(dataset, p),
        AnalysisSpec::FixedEffects(p) => run_panel(dataset, method, p),
        AnalysisSpec::RandomEffects(p) => run_panel(dataset, method, p),
    }
}

// ---------------------------------------------------------------------------
// Shaping helpers
// ---------------------------------------------------------------------------

/// Read `names` as numeric columns. Missing cells become `None`.
fn numeric_columns(dataset: &Dataset, method: Method, names: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
    names
        .iter()
        .map(|name| {
            dataset
                .column(name)
                .enumerate()
                .map(|(row, v)| {
                    v.to_f64().map_err(|_| Error::NonNumeric { method, column: name.clone(), row })
                })
                .collect()
        })
        .collect()
}

/// Rows with a value in every column (listwise deletion).
fn complete_rows(columns: &[Vec<Option<f64>>], n: usize, keep: impl Fn(usize) -> bool) -> Vec<usize> {
    (0..n).filter(|&i| keep(i) && columns.iter().all(|c| c[i].is_some())).collect()
}

/// Row-major block of the selected rows; `intercept` prepends a column of ones.
fn row_major(columns: &[Vec<Option<f64>>], rows: &[usize], intercept: bool) -> Vec<f64> {
    let mut out = Vec::with_capacity(rows.len() * (columns.len() + usize::from(intercept)));
    for &i in rows {
        if intercept {
            out.push(1.0);
        }
        out.extend(columns.iter().map(|c| c[i].unwrap_or(f64::NAN)));
    }
    out
}

fn column_values(column: &[Option<f64>], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&i| column[i].unwrap_or(f64::NAN)).collect()
}

/// Order-preserving de-duplication.
fn dedup(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}

fn reject_overlap(method: Method, role_a: &str, a: &[String], role_b: &str, b: &[String]) -> Result<()> {
    if let Some(dup) = a.iter().find(|x| b.contains(x)) {
        return Err(Error::Validation(format!(
            "{method}: column '{dup}' is used both as {role_a} and as {role_b}"
        )));
    }
    Ok(())
}

/// Names that would collide with the intercept in the reported parameters.
fn reject_intercept_name(method: Method, role: &str, names: &[String]) -> Result<()> {
    if names.iter().any(|n| n == INTERCEPT) {
        return Err(Error::Validation(format!(
            "{method}: '{INTERCEPT}' is reserved for the intercept and cannot be used as {role}"
        )));
    }
    Ok(())
}

fn finish(method: Method, table: &CoefTable, r_squared: f64, summary: Summary) -> Result<AnalysisResult> {
    AnalysisResult::new(
        method,
        &table.names,
        &table.coefficients,
        &table.p_values,
        r_squared,
        summary.render(),
    )
}

// ---------------------------------------------------------------------------
// Pooled OLS
// ---------------------------------------------------------------------------

fn run_pooled(dataset: &Dataset, p: &PooledParams) -> Result<AnalysisResult> {
    let method = Method::Ols;
    let regressors = dedup(std::iter::once(p.base_regressor.clone()).chain(p.controls.iter().cloned()));
    let dependent = vec![p.dependent_variable.clone()];
    reject_overlap(method, "dependent variable", &dependent, "regressor", &regressors)?;
    reject_intercept_name(method, "a regressor", &regressors)?;

    let y_col = numeric_columns(dataset, method, &dependent)?;
    let x_cols = numeric_columns(dataset, method, &regressors)?;
    let all: Vec<Vec<Option<f64>>> = y_col.iter().chain(&x_cols).cloned().collect();
    let rows = complete_rows(&all, dataset.len(), |_| true);
    log::debug!("OLS: {} of {} rows complete", rows.len(), dataset.len());

    let y = column_values(&y_col[0], &rows);
    let x = row_major(&x_cols, &rows, true);
    let names: Vec<String> =
        std::iter::once(INTERCEPT.to_string()).chain(regressors.iter().cloned()).collect();

    let res = ols_fit(&y, &x, &names)?;

    let summary = Summary::new("OLS Regression Results")
        .stat("Dep. Variable", p.dependent_variable.as_str())
        .stat("R-squared", fmt_stat(res.r_squared))
        .stat("Method", method.title())
        .stat("Adj. R-squared", fmt_stat(res.adj_r_squared))
        .stat("No. Observations", res.n_obs.to_string())
        .stat("F-statistic", res.f_statistic.map(fmt_stat).unwrap_or_else(|| "n/a".into()))
        .stat("Df Residuals", format!("{}", res.table.df_resid))
        .stat("Rows dropped", (dataset.len() - rows.len()).to_string())
        .table(&res.table)
        .note(SE_NOTE);

    finish(method, &res.table, res.r_squared, summary)
}

// ---------------------------------------------------------------------------
// 2SLS
// ---------------------------------------------------------------------------

fn run_instrumental(dataset: &Dataset, p: &InstrumentalParams) -> Result<AnalysisResult> {
    let method = Method::Tsls;
    let dependent = vec![p.dependent_variable.clone()];
    let endog = vec![p.base_regressor.clone()];
    let controls = dedup(p.controls.iter().cloned());
    let instruments = dedup(p.instruments.iter().cloned());

    reject_overlap(method, "dependent variable", &dependent, "regressor", &endog)?;
    reject_overlap(method, "dependent variable", &dependent, "control", &controls)?;
    reject_overlap(method, "dependent variable", &dependent, "instrument", &instruments)?;
    reject_overlap(method, "endogenous regressor", &endog, "control", &controls)?;
    reject_overlap(method, "endogenous regressor", &endog, "instrument", &instruments)?;
    reject_overlap(method, "instrument", &instruments, "control", &controls)?;
    reject_intercept_name(method, "the endogenous regressor", &endog)?;
    reject_intercept_name(method, "a control", &controls)?;
    reject_intercept_name(method, "an instrument", &instruments)?;

    let y_col = numeric_columns(dataset, method, &dependent)?;
    let endog_col = numeric_columns(dataset, method, &endog)?;
    let ctrl_cols = numeric_columns(dataset, method, &controls)?;
    let inst_cols = numeric_columns(dataset, method, &instruments)?;
    let all: Vec<Vec<Option<f64>>> =
        y_col.iter().chain(&endog_col).chain(&ctrl_cols).chain(&inst_cols).cloned().collect();
    let rows = complete_rows(&all, dataset.len(), |_| true);
    log::debug!("2SLS: {} of {} rows complete", rows.len(), dataset.len());

    let y = column_values(&y_col[0], &rows);
    let x_exog = row_major(&ctrl_cols, &rows, true);
    let x_endog = column_values(&endog_col[0], &rows);
    let z = row_major(&inst_cols, &rows, false);
    let exog_names: Vec<String> =
        std::iter::once(INTERCEPT.to_string()).chain(controls.iter().cloned()).collect();

    let res = iv_2sls(IvData {
        y: &y,
        x_exog: &x_exog,
        x_endog: &x_endog,
        z: &z,
        exog_names: &exog_names,
        endog_names: &endog,
        instrument_names: &instruments,
    })?;

    let mut summary = Summary::new("IV-2SLS Estimation Summary")
        .stat("Dep. Variable", p.dependent_variable.as_str())
        .stat("R-squared (IV)", fmt_stat(res.r_squared))
        .stat("Method", method.title())
        .stat("Instruments", res.n_instruments.to_string())
        .stat("No. Observations", res.n_obs.to_string())
        .stat("Df Residuals", format!("{}", res.table.df_resid))
        .table(&res.table)
        .note(SE_NOTE)
        .note(format!("Endogenous: {}", p.base_regressor))
        .note(format!("Instruments: {}", instruments.join(", ")));
    for fs in &res.first_stage {
        summary = summary.note(format!(
            "First stage ({}): F = {}, R² = {}, partial R² = {}{}",
            fs.endog_name,
            fmt_stat(fs.f_stat),
            fmt_stat(fs.r_squared),
            fmt_stat(fs.partial_r_squared),
            if fs.passes_stock_yogo_10 { "" } else { " (weak instruments)" }
        ));
    }

    finish(method, &res.table, res.r_squared, summary)
}

// ---------------------------------------------------------------------------
// Panel (FE / RE)
// ---------------------------------------------------------------------------

/// Rows of a keyed panel after duplicate checking and listwise deletion.
struct PanelData {
    entity_ids: Vec<u64>,
    y: Vec<f64>,
    x: Vec<f64>,
    n_periods: usize,
    dropped: usize,
}

fn shape_panel(
    dataset: &Dataset,
    method: Method,
    p: &PanelParams,
    regressors: &[String],
) -> Result<PanelData> {
    let entity_keys: Vec<Option<String>> =
        dataset.column(&p.entity_column).map(|v| v.key_string()).collect();
    let time_keys: Vec<Option<String>> =
        dataset.column(&p.time_column).map(|v| v.key_string()).collect();

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for (e, t) in entity_keys.iter().zip(&time_keys) {
        if let (Some(e), Some(t)) = (e, t)
            && !seen.insert((e.as_str(), t.as_str()))
        {
            return Err(Error::DuplicatePanelKey { method, entity: e.clone(), time: t.clone() });
        }
    }

    let y_col = numeric_columns(dataset, method, std::slice::from_ref(&p.dependent_variable))?;
    let x_cols = numeric_columns(dataset, method, regressors)?;
    let all: Vec<Vec<Option<f64>>> = y_col.iter().chain(&x_cols).cloned().collect();
    let rows = complete_rows(&all, dataset.len(), |i| {
        entity_keys[i].is_some() && time_keys[i].is_some()
    });

    let mut index: HashMap<&str, u64> = HashMap::new();
    let mut entity_ids = Vec::with_capacity(rows.len());
    let mut periods: HashSet<&str> = HashSet::new();
    for &i in &rows {
        if let (Some(e), Some(t)) = (&entity_keys[i], &time_keys[i]) {
            let next = index.len() as u64;
            entity_ids.push(*index.entry(e.as_str()).or_insert(next));
            periods.insert(t.as_str());
        }
    }

    Ok(PanelData {
        entity_ids,
        y: column_values(&y_col[0], &rows),
        x: row_major(&x_cols, &rows, false),
        n_periods: periods.len(),
        dropped: dataset.len() - rows.len(),
    })
}

fn run_panel(dataset: &Dataset, method: Method, p: &PanelParams) -> Result<AnalysisResult> {
    let regressors = dedup(p.exogenous_regressors.iter().cloned());
    let dependent = vec![p.dependent_variable.clone()];
    let keys = vec![p.entity_column.clone()];
    reject_overlap(method, "dependent variable", &dependent, "regressor", &regressors)?;
    let time = vec![p.time_column.clone()];
    reject_overlap(method, "dependent variable", &dependent, "entity column", &keys)?;
    reject_overlap(method, "dependent variable", &dependent, "time column", &time)?;
    reject_overlap(method, "entity column", &keys, "regressor", &regressors)?;
    reject_intercept_name(method, "a regressor", &regressors)?;
    if p.entity_column == p.time_column {
        return Err(Error::Validation(format!(
            "{method}: entity and time columns must differ (both '{}')",
            p.entity_column
        )));
    }

    let panel = shape_panel(dataset, method, p, &regressors)?;
    log::debug!(
        "{method}: {} observations kept, {} dropped, {} periods",
        panel.y.len(),
        panel.dropped,
        panel.n_periods
    );

    let header = |title: &str, r2_label: &str, r2: f64, n_obs: usize, n_entities: usize| {
        Summary::new(title)
            .stat("Dep. Variable", p.dependent_variable.as_str())
            .stat(r2_label, fmt_stat(r2))
            .stat("Method", method.title())
            .stat("No. Observations", n_obs.to_string())
            .stat("Entities", n_entities.to_string())
            .stat("Time periods", panel.n_periods.to_string())
            .stat("Rows dropped", panel.dropped.to_string())
    };

    if method == Method::FixedEffects {
        let res = panel_fe_fit(&panel.entity_ids, &panel.x, &panel.y, &regressors)?;
        let summary =
            header("PanelOLS Estimation Summary", "R-squared (within)", res.r_squared_within, res.n_obs, res.n_entities)
                .stat("R-squared (overall)", fmt_stat(res.r_squared_overall))
                .stat("Df Residuals", format!("{}", res.table.df_resid))
                .table(&res.table)
                .note(SE_NOTE)
                .note(format!(
                    "Entity effects absorbed ({}); {} is the grand-mean intercept.",
                    p.entity_column, INTERCEPT
                ));
        finish(method, &res.table, res.r_squared_within, summary)
    } else {
        let res = random_effects_fit(&panel.entity_ids, &panel.x, &panel.y, &regressors)?;
        let theta_min = res.theta.iter().copied().fold(f64::INFINITY, f64::min);
        let theta_max = res.theta.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let theta = if (theta_max - theta_min).abs() < 1e-12 {
            fmt_stat(theta_min)
        } else {
            format!("{} .. {}", fmt_stat(theta_min), fmt_stat(theta_max))
        };
        let summary =
            header("RandomEffects Estimation Summary", "R-squared (overall)", res.r_squared_overall, res.n_obs, res.n_entities)
                .stat("R-squared (GLS)", fmt_stat(res.r_squared_gls))
                .stat("Df Residuals", format!("{}", res.table.df_resid))
                .stat("Theta", theta)
                .stat("sigma2 (effects)", fmt_stat(res.sigma2_u))
                .stat("sigma2 (idiosyncratic)", fmt_stat(res.sigma2_e))
                .table(&res.table)
                .note(SE_NOTE);
        finish(method, &res.table, res.r_squared_overall, summary)
    }
}
