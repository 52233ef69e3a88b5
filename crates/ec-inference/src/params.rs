//! Analysis parameters.
//!
//! Callers hand in a flat [`ParamBag`] of optional fields; [`ParamBag::resolve`]
//! checks it against the selected [`Method`] and produces an [`AnalysisSpec`],
//! a tagged variant carrying exactly the fields that method needs.

use ec_core::{Error, Method, Result};
use serde::{Deserialize, Serialize};

/// Loosely-typed parameter bag, as received from HTTP or CLI callers.
///
/// Accepts both the canonical field names and the short names used by older
/// clients (`dependent_var`, `base_var`, `control_vars`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamBag {
    /// Response column.
    #[serde(default, alias = "dependent_var")]
    pub dependent_variable: Option<String>,
    /// Regressor of interest (endogenous regressor for 2SLS).
    #[serde(default, alias = "base_var")]
    pub base_regressor: Option<String>,
    /// Control columns (exogenous controls for 2SLS).
    #[serde(default, alias = "control_vars")]
    pub controls: Option<Vec<String>>,
    /// Excluded instruments for 2SLS.
    #[serde(default, alias = "instrument_vars")]
    pub instruments: Option<Vec<String>>,
    /// Regressors for panel methods.
    #[serde(default, alias = "exog_vars")]
    pub exogenous_regressors: Option<Vec<String>>,
    /// Entity (cross-section) column for panel methods.
    #[serde(default, alias = "entity")]
    pub entity_column: Option<String>,
    /// Time column for panel methods.
    #[serde(default, alias = "time")]
    pub time_column: Option<String>,
}

/// Parameters of a pooled OLS regression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PooledParams {
    /// Response column.
    pub dependent_variable: String,
    /// Regressor of interest.
    pub base_regressor: String,
    /// Additional regressors.
    #[serde(default)]
    pub controls: Vec<String>,
}

/// Parameters of a 2SLS regression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentalParams {
    /// Response column.
    pub dependent_variable: String,
    /// Endogenous regressor.
    pub base_regressor: String,
    /// Excluded instruments (non-empty).
    pub instruments: Vec<String>,
    /// Exogenous controls.
    #[serde(default)]
    pub controls: Vec<String>,
}

/// Parameters of a fixed- or random-effects panel regression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelParams {
    /// Response column.
    pub dependent_variable: String,
    /// Entity (cross-section) identifier column.
    pub entity_column: String,
    /// Time identifier column.
    pub time_column: String,
    /// Regressors.
    #[serde(default)]
    pub exogenous_regressors: Vec<String>,
}

/// Fully-specified analysis: one variant per method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum AnalysisSpec {
    /// Pooled OLS.
    #[serde(rename = "OLS")]
    Pooled(PooledParams),
    /// Two-stage least squares.
    #[serde(rename = "2SLS")]
    Instrumental(InstrumentalParams),
    /// Entity fixed effects.
    #[serde(rename = "FE")]
    FixedEffects(PanelParams),
    /// Random effects.
    #[serde(rename = "RE")]
    RandomEffects(PanelParams),
}

impl AnalysisSpec {
    /// Method selected by this spec.
    pub fn method(&self) -> Method {
        match self {
            AnalysisSpec::Pooled(_) => Method::Ols,
            AnalysisSpec::Instrumental(_) => Method::Tsls,
            AnalysisSpec::FixedEffects(_) => Method::FixedEffects,
            AnalysisSpec::RandomEffects(_) => Method::RandomEffects,
        }
    }

    /// Response column.
    pub fn dependent_variable(&self) -> &str {
        match self {
            AnalysisSpec::Pooled(p) => &p.dependent_variable,
            AnalysisSpec::Instrumental(p) => &p.dependent_variable,
            AnalysisSpec::FixedEffects(p) | AnalysisSpec::RandomEffects(p) => &p.dependent_variable,
        }
    }

    /// Every dataset column the analysis reads, response first, without duplicates.
    pub fn columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = vec![self.dependent_variable()];
        match self {
            AnalysisSpec::Pooled(p) => {
                cols.push(&p.base_regressor);
                cols.extend(p.controls.iter().map(String::as_str));
            }
            AnalysisSpec::Instrumental(p) => {
                cols.push(&p.base_regressor);
                cols.extend(p.controls.iter().map(String::as_str));
                cols.extend(p.instruments.iter().map(String::as_str));
            }
            AnalysisSpec::FixedEffects(p) | AnalysisSpec::RandomEffects(p) => {
                cols.push(&p.entity_column);
                cols.push(&p.time_column);
                cols.extend(p.exogenous_regressors.iter().map(String::as_str));
            }
        }
        let mut seen = std::collections::HashSet::new();
        cols.retain(|c| seen.insert(*c));
        cols
    }

    /// Check required fields: non-blank names and, for 2SLS, at least one instrument.
    pub fn validate(&self) -> Result<()> {
        let method = self.method();
        let blank = |field: &'static str, v: &str| {
            if v.trim().is_empty() { Err(Error::MissingParameter { method, field }) } else { Ok(()) }
        };
        blank("dependent_variable", self.dependent_variable())?;
        match self {
            AnalysisSpec::Pooled(p) => blank("base_regressor", &p.base_regressor)?,
            AnalysisSpec::Instrumental(p) => {
                blank("base_regressor", &p.base_regressor)?;
                if p.instruments.iter().all(|s| s.trim().is_empty()) {
                    return Err(Error::MissingParameter { method, field: "instruments" });
                }
            }
            AnalysisSpec::FixedEffects(p) | AnalysisSpec::RandomEffects(p) => {
                blank("entity_column", &p.entity_column)?;
                blank("time_column", &p.time_column)?;
            }
        }
        Ok(())
    }
}

fn required(method: Method, field: &'static str, value: &Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(Error::MissingParameter { method, field }),
    }
}

fn optional_list(value: &Option<Vec<String>>) -> Vec<String> {
    value
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl ParamBag {
    /// Validate the bag for `method` and build the typed spec.
    ///
    /// Fails with [`Error::MissingParameter`] naming the first missing field.
    pub fn resolve(&self, method: Method) -> Result<AnalysisSpec> {
        let dependent_variable = required(method, "dependent_variable", &self.dependent_variable)?;
        let spec = match method {
            Method::Ols => AnalysisSpec::Pooled(PooledParams {
                dependent_variable,
                base_regressor: required(method, "base_regressor", &self.base_regressor)?,
                controls: optional_list(&self.controls),
            }),
            Method::Tsls => {
                let base_regressor = required(method, "base_regressor", &self.base_regressor)?;
                let instruments = optional_list(&self.instruments);
                if instruments.is_empty() {
                    return Err(Error::MissingParameter { method, field: "instruments" });
                }
                AnalysisSpec::Instrumental(InstrumentalParams {
                    dependent_variable,
                    base_regressor,
                    instruments,
                    controls: optional_list(&self.controls),
                })
            }
            Method::FixedEffects | Method::RandomEffects => {
                let params = PanelParams {
                    dependent_variable,
                    entity_column: required(method, "entity_column", &self.entity_column)?,
                    time_column: required(method, "time_column", &self.time_column)?,
                    exogenous_regressors: optional_list(&self.exogenous_regressors),
                };
                if method == Method::FixedEffects {
                    AnalysisSpec::FixedEffects(params)
                } else {
                    AnalysisSpec::RandomEffects(params)
                }
            }
        };
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag() -> ParamBag {
        ParamBag {
            dependent_variable: Some("gdp".into()),
            base_regressor: Some("inflation".into()),
            controls: Some(vec!["trade".into(), " ".into()]),
            instruments: Some(vec!["oil".into()]),
            exogenous_regressors: Some(vec!["inflation".into()]),
            entity_column: Some("country".into()),
            time_column: Some("year".into()),
        }
    }

    #[test]
    fn resolves_each_method() {
        let b = bag();
        match b.resolve(Method::Ols).unwrap() {
            AnalysisSpec::Pooled(p) => assert_eq!(p.controls, vec!["trade".to_string()]),
            other => panic!("{other:?}"),
        }
        assert_eq!(b.resolve(Method::Tsls).unwrap().method(), Method::Tsls);
        assert_eq!(b.resolve(Method::FixedEffects).unwrap().method(), Method::FixedEffects);
        assert_eq!(b.resolve(Method::RandomEffects).unwrap().method(), Method::RandomEffects);
    }

    #[test]
    fn missing_fields_are_named() {
        let cases: [(Method, fn(&mut ParamBag), &str); 7] = [
            (Method::Ols, |b| b.dependent_variable = None, "dependent_variable"),
            (Method::Ols, |b| b.base_regressor = None, "base_regressor"),
            (Method::Tsls, |b| b.base_regressor = Some("".into()), "base_regressor"),
            (Method::Tsls, |b| b.instruments = Some(vec![]), "instruments"),
            (Method::FixedEffects, |b| b.entity_column = None, "entity_column"),
            (Method::RandomEffects, |b| b.time_column = None, "time_column"),
            (Method::RandomEffects, |b| b.dependent_variable = Some("  ".into()), "dependent_variable"),
        ];
        for (method, strip, field) in cases {
            let mut b = bag();
            strip(&mut b);
            let err = b.resolve(method).unwrap_err();
            match &err {
                Error::MissingParameter { method: m, field: f } => {
                    assert_eq!(*m, method);
                    assert_eq!(*f, field);
                }
                other => panic!("expected MissingParameter, got {other:?}"),
            }
            assert!(err.to_string().contains(field));
            assert!(err.to_string().contains(method.as_str()));
        }
    }

    #[test]
    fn optional_lists_default_to_empty() {
        let b = ParamBag {
            dependent_variable: Some("y".into()),
            entity_column: Some("id".into()),
            time_column: Some("t".into()),
            ..Default::default()
        };
        match b.resolve(Method::FixedEffects).unwrap() {
            AnalysisSpec::FixedEffects(p) => assert!(p.exogenous_regressors.is_empty()),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn bag_accepts_short_aliases() {
        let b: ParamBag = serde_json::from_value(serde_json::json!({
            "dependent_var": "gdp",
            "base_var": "inflation",
            "control_vars": ["trade"],
            "entity": "country",
            "time": "year"
        }))
        .unwrap();
        assert_eq!(b.dependent_variable.as_deref(), Some("gdp"));
        assert_eq!(b.controls, Some(vec!["trade".to_string()]));
        assert_eq!(b.time_column.as_deref(), Some("year"));
    }

    #[test]
    fn spec_serializes_with_method_tag() {
        let spec = bag().resolve(Method::Tsls).unwrap();
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v["method"], "2SLS");
        assert_eq!(v["instruments"], serde_json::json!(["oil"]));
        let back: AnalysisSpec = serde_json::from_value(v).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn spec_validate_rejects_blank_fields() {
        let spec = AnalysisSpec::Instrumental(InstrumentalParams {
            dependent_variable: "y".into(),
            base_regressor: "x".into(),
            instruments: vec![],
            controls: vec![],
        });
        assert!(matches!(
            spec.validate(),
            Err(Error::MissingParameter { field: "instruments", .. })
        ));
    }

    #[test]
    fn columns_are_deduplicated() {
        let spec = AnalysisSpec::Pooled(PooledParams {
            dependent_variable: "y".into(),
            base_regressor: "x".into(),
            controls: vec!["x".into(), "z".into()],
        });
        assert_eq!(spec.columns(), vec!["y", "x", "z"]);
    }
}
