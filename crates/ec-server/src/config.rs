//! Server configuration file.
//!
//! ```toml
//! [indicators]
//! oil_rents = "NY.GDP.PETR.RT.ZS"
//!
//! [world_bank]
//! base_url = "https://api.worldbank.org/v2"
//! timeout_secs = 30
//! per_page = 1000
//! ```
//!
//! `[indicators]` entries extend (and override) the built-in catalog.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use ec_data::{IndicatorCatalog, WorldBankConfig};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Extra metric name → indicator code entries.
    #[serde(default)]
    pub indicators: BTreeMap<String, String>,

    /// World Bank client settings.
    #[serde(default)]
    pub world_bank: WorldBankConfig,
}

impl ServerConfig {
    /// Load from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Built-in catalog merged with `[indicators]`.
    pub fn catalog(&self) -> IndicatorCatalog {
        let mut catalog = IndicatorCatalog::default();
        catalog.extend(self.indicators.clone());
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        let cfg = ServerConfig::load(None).unwrap();
        assert!(cfg.indicators.is_empty());
        assert_eq!(cfg.world_bank, WorldBankConfig::default());
        assert_eq!(cfg.catalog(), IndicatorCatalog::default());
    }

    #[test]
    fn file_extends_catalog_and_overrides_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("econstat.toml");
        std::fs::write(
            &path,
            "[indicators]\noil_rents = \"NY.GDP.PETR.RT.ZS\"\ngdp = \"NY.GDP.MKTP.KD\"\n\n\
             [world_bank]\nbase_url = \"http://localhost:8080\"\n",
        )
        .unwrap();

        let cfg = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.world_bank.base_url, "http://localhost:8080");
        assert_eq!(cfg.world_bank.per_page, WorldBankConfig::default().per_page);
        let catalog = cfg.catalog();
        assert_eq!(catalog.code("oil_rents"), Some("NY.GDP.PETR.RT.ZS"));
        assert_eq!(catalog.code("gdp"), Some("NY.GDP.MKTP.KD"));
        assert_eq!(catalog.code("inflation"), Some("FP.CPI.TOTL.ZG"));
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[world_bank\n").unwrap();
        let err = ServerConfig::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));
    }
}
