//! Common data types for EconStat

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name given to the intercept column in every design.
pub const INTERCEPT: &str = "const";

/// Econometric method selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    /// Pooled ordinary least squares.
    #[serde(rename = "OLS")]
    Ols,
    /// Two-stage least squares (instrumental variables).
    #[serde(rename = "2SLS")]
    Tsls,
    /// Entity fixed-effects panel regression.
    #[serde(rename = "FE")]
    FixedEffects,
    /// Random-effects panel regression.
    #[serde(rename = "RE")]
    RandomEffects,
}

impl Method {
    /// All methods, in wire order.
    pub const ALL: [Method; 4] =
        [Method::Ols, Method::Tsls, Method::FixedEffects, Method::RandomEffects];

    /// Short wire name (`"OLS"`, `"2SLS"`, `"FE"`, `"RE"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Ols => "OLS",
            Method::Tsls => "2SLS",
            Method::FixedEffects => "FE",
            Method::RandomEffects => "RE",
        }
    }

    /// Long human-readable name, used in summaries.
    pub fn title(&self) -> &'static str {
        match self {
            Method::Ols => "Pooled OLS",
            Method::Tsls => "IV-2SLS",
            Method::FixedEffects => "Fixed Effects (within)",
            Method::RandomEffects => "Random Effects (Swamy-Arora)",
        }
    }

    /// Whether the method requires an (entity, time) panel index.
    pub fn is_panel(&self) -> bool {
        matches!(self, Method::FixedEffects | Method::RandomEffects)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ols" | "pooled" => Ok(Method::Ols),
            "2sls" | "tsls" | "iv" => Ok(Method::Tsls),
            "fe" | "fixed_effects" => Ok(Method::FixedEffects),
            "re" | "random_effects" => Ok(Method::RandomEffects),
            _ => Err(Error::UnknownMethod(s.to_string())),
        }
    }
}

/// Uniform output of every estimator.
///
/// `params` and `pvalues` always share the same key set: one entry per fitted
/// regressor, including the intercept ([`INTERCEPT`]) where the design has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Method that produced the record.
    pub method: Method,

    /// Regressor name → coefficient.
    pub params: BTreeMap<String, f64>,

    /// Regressor name → two-sided p-value.
    pub pvalues: BTreeMap<String, f64>,

    /// Goodness of fit. Which R² depends on the method; `None` when not finite.
    pub r_squared: Option<f64>,

    /// Plain-text regression table.
    pub summary: String,
}

impl AnalysisResult {
    /// Build a record from parallel name/coefficient/p-value slices.
    pub fn new(
        method: Method,
        names: &[String],
        coefficients: &[f64],
        pvalues: &[f64],
        r_squared: f64,
        summary: String,
    ) -> Result<Self> {
        if names.len() != coefficients.len() || names.len() != pvalues.len() {
            return Err(Error::Estimation {
                method,
                message: format!(
                    "estimator returned {} names, {} coefficients, {} p-values",
                    names.len(),
                    coefficients.len(),
                    pvalues.len()
                ),
            });
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(Error::Estimation {
                method,
                message: format!("regressor '{dup}' appears more than once in the fitted design"),
            });
        }

        let params = names.iter().cloned().zip(coefficients.iter().copied()).collect();
        let pvalues = names.iter().cloned().zip(pvalues.iter().copied()).collect();
        let r_squared = r_squared.is_finite().then_some(r_squared);

        Ok(Self { method, params, pvalues, r_squared, summary })
    }

    /// Coefficient for `name`, if it was fitted.
    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }

    /// p-value for `name`, if it was fitted.
    pub fn p_value(&self, name: &str) -> Option<f64> {
        self.pvalues.get(name).copied()
    }

    /// Names of all fitted regressors, in key order.
    pub fn regressors(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }
}
