//! Metric name → provider indicator code.

use std::collections::BTreeMap;

use ec_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Built-in World Bank indicator codes.
const DEFAULT_INDICATORS: &[(&str, &str)] = &[
    ("co2_per_capita", "EN.ATM.CO2E.PC"),
    ("education_spending", "SE.XPD.TOTL.GD.ZS"),
    ("exports", "NE.EXP.GNFS.ZS"),
    ("fdi", "BX.KLT.DINV.WD.GD.ZS"),
    ("gdp", "NY.GDP.MKTP.CD"),
    ("gdp_growth", "NY.GDP.MKTP.KD.ZG"),
    ("gdp_per_capita", "NY.GDP.PCAP.CD"),
    ("government_debt", "GC.DOD.TOTL.GD.ZS"),
    ("gross_capital_formation", "NE.GDI.TOTL.ZS"),
    ("imports", "NE.IMP.GNFS.ZS"),
    ("inflation", "FP.CPI.TOTL.ZG"),
    ("internet_users", "IT.NET.USER.ZS"),
    ("life_expectancy", "SP.DYN.LE00.IN"),
    ("population", "SP.POP.TOTL"),
    ("real_interest_rate", "FR.INR.RINR"),
    ("trade", "NE.TRD.GNFS.ZS"),
    ("unemployment", "SL.UEM.TOTL.ZS"),
    ("urban_population", "SP.URB.TOTL.IN.ZS"),
];

/// Mapping from user-facing metric names to indicator codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorCatalog {
    entries: BTreeMap<String, String>,
}

impl Default for IndicatorCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_INDICATORS.iter().map(|(m, c)| (m.to_string(), c.to_string())))
    }
}

impl IndicatorCatalog {
    /// Build from `(metric, code)` pairs.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }

    /// Indicator code for `metric`.
    pub fn code(&self, metric: &str) -> Option<&str> {
        self.entries.get(metric).map(String::as_str)
    }

    /// Entries in metric-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(m, c)| (m.as_str(), c.as_str()))
    }

    /// Number of metrics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add or replace entries.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = (String, String)>) {
        self.entries.extend(entries);
    }

    /// Resolve metric names to `(code, metric)` pairs, de-duplicated in input order.
    ///
    /// Unknown names fail with a validation error listing all of them, sorted.
    pub fn resolve<'a>(&self, metrics: impl IntoIterator<Item = &'a str>) -> Result<Vec<(String, String)>> {
        let mut resolved: Vec<(String, String)> = Vec::new();
        let mut unknown: Vec<&str> = Vec::new();
        for metric in metrics {
            match self.code(metric) {
                Some(code) => {
                    if !resolved.iter().any(|(_, m)| m == metric) {
                        resolved.push((code.to_string(), metric.to_string()));
                    }
                }
                None => unknown.push(metric),
            }
        }
        if !unknown.is_empty() {
            unknown.sort_unstable();
            unknown.dedup();
            return Err(Error::Validation(format!("Unknown metrics: {}", unknown.join(", "))));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_core_metrics() {
        let cat = IndicatorCatalog::default();
        assert_eq!(cat.code("gdp"), Some("NY.GDP.MKTP.CD"));
        assert_eq!(cat.code("inflation"), Some("FP.CPI.TOTL.ZG"));
        assert_eq!(cat.len(), DEFAULT_INDICATORS.len());
    }

    #[test]
    fn resolve_dedups_in_order() {
        let cat = IndicatorCatalog::default();
        let r = cat.resolve(["inflation", "gdp", "inflation"]).unwrap();
        assert_eq!(
            r,
            vec![
                ("FP.CPI.TOTL.ZG".to_string(), "inflation".to_string()),
                ("NY.GDP.MKTP.CD".to_string(), "gdp".to_string()),
            ]
        );
    }

    #[test]
    fn resolve_lists_unknown_sorted() {
        let cat = IndicatorCatalog::default();
        let err = cat.resolve(["zeta", "gdp", "alpha", "zeta"]).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Unknown metrics: alpha, zeta");
    }

    #[test]
    fn deserializes_from_plain_map() {
        let cat: IndicatorCatalog =
            serde_json::from_value(serde_json::json!({"oil": "X.OIL"})).unwrap();
        assert_eq!(cat.code("oil"), Some("X.OIL"));
        assert_eq!(cat.len(), 1);
    }
}
