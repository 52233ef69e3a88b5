//! World Bank indicators API client.
//!
//! One request (plus pagination) per indicator:
//! `GET {base}/country/{c1;c2}/indicator/{code}?date={start}:{end}&format=json&per_page=N`.
//! The payload is a two-element array `[meta, [observation, ...]]`; errors come
//! back as `[{"message": [...]}]` with a 200 status.

use std::collections::BTreeMap;
use std::time::Duration;

use ec_core::{Dataset, Error, IndicatorSource, PanelRequest, Result, Row, Value};
use futures::future::{BoxFuture, try_join_all};
use serde::{Deserialize, Serialize};

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";

/// Client settings (`[world_bank]` in the server config file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldBankConfig {
    /// API root, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Page size requested from the API.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for WorldBankConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            per_page: default_per_page(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_per_page() -> u32 {
    1000
}

/// One country-year value of one indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Country name as reported by the API.
    pub country: String,
    /// ISO3 code (falls back to the API's 2-letter id).
    pub country_code: String,
    /// Observation year.
    pub year: i32,
    /// Value, `None` when the API reports null.
    pub value: Option<f64>,
}

/// Pagination block of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// Current page (1-based).
    pub page: u32,
    /// Total pages.
    pub pages: u32,
}

#[derive(Deserialize)]
struct RawRef {
    #[serde(default)]
    id: Option<String>,
    value: String,
}

#[derive(Deserialize)]
struct RawObservation {
    country: RawRef,
    #[serde(default)]
    countryiso3code: Option<String>,
    date: String,
    value: Option<f64>,
}

fn meta_u32(meta: &serde_json::Value, key: &str) -> Option<u32> {
    match meta.get(key)? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn provider_message(entry: &serde_json::Value) -> Option<String> {
    let messages = entry.get("message")?.as_array()?;
    let text: Vec<String> = messages
        .iter()
        .map(|m| {
            let key = m.get("key").and_then(|v| v.as_str()).unwrap_or("error");
            match m.get("value").and_then(|v| v.as_str()) {
                Some(value) => format!("{key}: {}", value.trim()),
                None => key.to_string(),
            }
        })
        .collect();
    Some(text.join("; "))
}

/// Parse one page of an indicator response.
pub fn parse_indicator_page(body: &str) -> Result<(PageInfo, Vec<Observation>)> {
    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Provider(format!("malformed World Bank response: {e}")))?;
    let parts = payload
        .as_array()
        .ok_or_else(|| Error::Provider("World Bank response is not an array".into()))?;

    let meta = parts.first().ok_or_else(|| Error::Provider("empty World Bank response".into()))?;
    if let Some(msg) = provider_message(meta) {
        return Err(Error::Provider(msg));
    }
    let info = PageInfo {
        page: meta_u32(meta, "page").unwrap_or(1),
        pages: meta_u32(meta, "pages").unwrap_or(1),
    };

    let raw: Vec<RawObservation> = match parts.get(1) {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(data) => serde_json::from_value(data.clone())
            .map_err(|e| Error::Provider(format!("unexpected observation format: {e}")))?,
    };

    let observations = raw
        .into_iter()
        .filter_map(|o| {
            let Ok(year) = o.date.trim().parse::<i32>() else {
                log::warn!("skipping non-annual observation date '{}'", o.date);
                return None;
            };
            let country_code = o
                .countryiso3code
                .filter(|c| !c.trim().is_empty())
                .or(o.country.id)
                .unwrap_or_default();
            Some(Observation { country: o.country.value, country_code, year, value: o.value })
        })
        .collect();
    Ok((info, observations))
}

/// Merge per-indicator series into one row per (country, year).
///
/// `country` is lower-cased and trimmed; every metric column is present on
/// every row (null where the series has no value). Rows are ordered by
/// country, then year.
pub fn merge_panel(series: &[(String, Vec<Observation>)]) -> Dataset {
    let mut rows: BTreeMap<(String, i32), Row> = BTreeMap::new();
    for (metric, observations) in series {
        for obs in observations {
            let country = obs.country.trim().to_lowercase();
            let row = rows.entry((country.clone(), obs.year)).or_insert_with(|| {
                let mut row = Row::new();
                row.insert("country".into(), Value::Text(country));
                row.insert("country_code".into(), Value::Text(obs.country_code.clone()));
                row.insert("year".into(), Value::from(i64::from(obs.year)));
                for (m, _) in series {
                    row.insert(m.clone(), Value::Null);
                }
                row
            });
            row.insert(metric.clone(), obs.value.into());
        }
    }
    rows.into_values().collect()
}

/// HTTP client for the World Bank API.
#[derive(Debug, Clone)]
pub struct WorldBankClient {
    config: WorldBankConfig,
    http: reqwest::Client,
}

impl WorldBankClient {
    /// Build a client with the configured timeout.
    pub fn new(config: WorldBankConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("econstat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Provider(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Active settings.
    pub fn config(&self) -> &WorldBankConfig {
        &self.config
    }

    /// URL of one page of `code` for the request's countries and years.
    pub fn indicator_url(&self, request: &PanelRequest, code: &str, page: u32) -> String {
        let countries: Vec<&str> = request.countries.iter().map(|c| c.trim()).collect();
        format!(
            "{}/country/{}/indicator/{}?date={}:{}&format=json&per_page={}&page={}",
            self.config.base_url.trim_end_matches('/'),
            countries.join(";"),
            code,
            request.start_year,
            request.end_year,
            self.config.per_page,
            page
        )
    }

    async fn fetch_page(&self, url: &str) -> Result<(PageInfo, Vec<Observation>)> {
        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Provider(format!("World Bank request timed out after {}s", self.config.timeout_secs))
            } else if e.is_connect() {
                Error::Provider(format!("cannot connect to {}", self.config.base_url))
            } else {
                Error::Provider(format!("World Bank request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Provider(format!("failed to read World Bank response: {e}")))?;
        if !status.is_success() {
            return Err(Error::Provider(format!("World Bank API error {status}: {}", body.trim())));
        }
        parse_indicator_page(&body)
    }

    /// All observations of one indicator, following pagination.
    pub async fn fetch_indicator(&self, request: &PanelRequest, code: &str) -> Result<Vec<Observation>> {
        let mut out = Vec::new();
        let mut page = 1;
        loop {
            let url = self.indicator_url(request, code, page);
            log::debug!("GET {url}");
            let (info, observations) = self.fetch_page(&url).await?;
            out.extend(observations);
            if info.page >= info.pages {
                break;
            }
            page = info.page + 1;
        }
        Ok(out)
    }
}

impl IndicatorSource for WorldBankClient {
    fn fetch_panel<'a>(&'a self, request: &'a PanelRequest) -> BoxFuture<'a, Result<Dataset>> {
        Box::pin(async move {
            if request.countries.is_empty() {
                return Err(Error::Validation("at least one country is required".into()));
            }
            if request.start_year > request.end_year {
                return Err(Error::Validation(format!(
                    "start_year ({}) must not exceed end_year ({})",
                    request.start_year, request.end_year
                )));
            }
            let series = try_join_all(request.indicators.iter().map(|(code, column)| async move {
                let observations = self.fetch_indicator(request, code).await?;
                Ok::<_, Error>((column.clone(), observations))
            }))
            .await?;
            let dataset = merge_panel(&series);
            log::info!(
                "World Bank: {} indicators, {} countries, {} rows",
                request.indicators.len(),
                request.countries.len(),
                dataset.len()
            );
            Ok(dataset)
        })
    }

    fn name(&self) -> &str {
        "world_bank"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"[
        {"page": 1, "pages": 2, "per_page": "2", "total": 3},
        [
            {"indicator": {"id": "NY.GDP.MKTP.CD", "value": "GDP"},
             "country": {"id": "US", "value": "United States"},
             "countryiso3code": "USA", "date": "2001", "value": 10.5,
             "unit": "", "obs_status": "", "decimal": 0},
            {"indicator": {"id": "NY.GDP.MKTP.CD", "value": "GDP"},
             "country": {"id": "DE", "value": "Germany"},
             "countryiso3code": "", "date": "2000", "value": null,
             "unit": "", "obs_status": "", "decimal": 0}
        ]
    ]"#;

    fn obs(country: &str, year: i32, value: Option<f64>) -> Observation {
        Observation { country: country.into(), country_code: "X".into(), year, value }
    }

    #[test]
    fn parses_page_and_meta() {
        let (info, data) = parse_indicator_page(PAGE).unwrap();
        assert_eq!(info, PageInfo { page: 1, pages: 2 });
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].country_code, "USA");
        assert_eq!(data[0].year, 2001);
        assert_eq!(data[0].value, Some(10.5));
        assert_eq!(data[1].country_code, "DE");
        assert_eq!(data[1].value, None);
    }

    #[test]
    fn provider_message_becomes_error() {
        let body = r#"[{"message": [{"id": "120", "key": "Invalid value", "value": "The provided parameter value is not valid"}]}]"#;
        let err = parse_indicator_page(body).unwrap_err();
        assert!(matches!(err, Error::Provider(ref m) if m.contains("Invalid value")));
    }

    #[test]
    fn null_data_is_empty() {
        let (info, data) =
            parse_indicator_page(r#"[{"page": 0, "pages": 0, "total": 0}, null]"#).unwrap();
        assert_eq!(info.pages, 0);
        assert!(data.is_empty());
    }

    #[test]
    fn malformed_payload_is_provider_error() {
        assert!(matches!(parse_indicator_page("<html>"), Err(Error::Provider(_))));
        assert!(matches!(parse_indicator_page("{}"), Err(Error::Provider(_))));
    }

    #[test]
    fn merge_orders_rows_and_fills_nulls() {
        let series = vec![
            ("gdp".to_string(), vec![obs(" Germany", 2001, Some(2.0)), obs("United States", 2000, Some(1.0))]),
            ("inflation".to_string(), vec![obs("germany", 2000, Some(0.5))]),
        ];
        let ds = merge_panel(&series);
        assert_eq!(ds.len(), 3);
        let keys: Vec<(Value, Value)> =
            ds.rows().iter().map(|r| (r["country"].clone(), r["year"].clone())).collect();
        assert_eq!(
            keys,
            vec![
                (Value::from("germany"), Value::Number(2000.0)),
                (Value::from("germany"), Value::Number(2001.0)),
                (Value::from("united states"), Value::Number(2000.0)),
            ]
        );
        assert!(ds.rows()[0]["gdp"].is_null());
        assert_eq!(ds.rows()[0]["inflation"], Value::Number(0.5));
        assert!(ds.rows()[1]["inflation"].is_null());
        assert!(ds.rows().iter().all(|r| r.contains_key("country_code")));
    }

    #[test]
    fn url_matches_api_shape() {
        let client = WorldBankClient::new(WorldBankConfig {
            base_url: "http://localhost:9/v2/".into(),
            ..Default::default()
        })
        .unwrap();
        let request = PanelRequest {
            countries: vec!["USA".into(), " DEU".into()],
            indicators: vec![],
            start_year: 2000,
            end_year: 2010,
        };
        assert_eq!(
            client.indicator_url(&request, "FP.CPI.TOTL.ZG", 1),
            "http://localhost:9/v2/country/USA;DEU/indicator/FP.CPI.TOTL.ZG?date=2000:2010&format=json&per_page=1000&page=1"
        );
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: WorldBankConfig = serde_json::from_str(r#"{"timeout_secs": 5}"#).unwrap();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.per_page, 1000);
    }
}
