//! Core traits for EconStat
//!
//! Collaborators that produce datasets are abstracted here so that the server
//! depends on the trait, not on a concrete provider client.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{Dataset, Result};

/// Request for an indicator panel from a remote statistics provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelRequest {
    /// Country codes or names understood by the provider.
    pub countries: Vec<String>,
    /// `(indicator code, output column name)` pairs.
    pub indicators: Vec<(String, String)>,
    /// First year, inclusive.
    pub start_year: i32,
    /// Last year, inclusive.
    pub end_year: i32,
}

/// Source of country/year indicator panels.
pub trait IndicatorSource: Send + Sync {
    /// Fetch one row per (country, year) with one column per requested indicator.
    fn fetch_panel<'a>(&'a self, request: &'a PanelRequest) -> BoxFuture<'a, Result<Dataset>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}
