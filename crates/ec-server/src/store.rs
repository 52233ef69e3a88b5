//! In-memory stores for uploaded datasets and study history.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ec_core::{AnalysisResult, Dataset, Method};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::auth::{UserId, random_hex};

/// Maximum number of uploaded datasets kept per user; the oldest is evicted.
const MAX_DATASETS_PER_USER: usize = 100;

/// An uploaded dataset owned by one user.
#[derive(Debug, Clone)]
pub struct StoredDataset {
    pub id: String,
    pub user_id: UserId,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub data: Arc<Dataset>,
}

/// Listing entry for `GET /v1/datasets`.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub dataset_id: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub n_rows: usize,
    pub columns: Vec<String>,
}

impl StoredDataset {
    fn info(&self) -> DatasetInfo {
        DatasetInfo {
            dataset_id: self.id.clone(),
            file_name: self.file_name.clone(),
            created_at: self.created_at,
            n_rows: self.data.len(),
            columns: self.data.columns(),
        }
    }
}

#[derive(Clone, Default)]
pub struct DatasetStore {
    inner: Arc<Mutex<Vec<StoredDataset>>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` for `user_id` and return its id.
    pub async fn insert(&self, user_id: &str, file_name: &str, data: Dataset) -> String {
        let mut all = self.inner.lock().await;
        if all.iter().filter(|d| d.user_id == user_id).count() >= MAX_DATASETS_PER_USER
            && let Some(oldest) = all.iter().position(|d| d.user_id == user_id)
        {
            all.remove(oldest);
        }
        let id = random_hex(16);
        all.push(StoredDataset {
            id: id.clone(),
            user_id: user_id.to_string(),
            file_name: file_name.to_string(),
            created_at: Utc::now(),
            data: Arc::new(data),
        });
        id
    }

    /// Dataset `id` if it belongs to `user_id`.
    pub async fn get(&self, user_id: &str, id: &str) -> Option<StoredDataset> {
        self.inner.lock().await.iter().find(|d| d.id == id && d.user_id == user_id).cloned()
    }

    /// The user's datasets in upload order.
    pub async fn list(&self, user_id: &str) -> Vec<DatasetInfo> {
        self.inner.lock().await.iter().filter(|d| d.user_id == user_id).map(StoredDataset::info).collect()
    }
}

/// One persisted analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct StudyRecord {
    pub id: String,
    #[serde(skip)]
    pub user_id: UserId,
    pub method: Method,
    pub dependent_metric: String,
    pub base_metric: Option<String>,
    pub control_metrics: Vec<String>,
    /// Every metric the analysis read.
    pub metrics: Vec<String>,
    pub countries: Vec<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub uploaded_dataset_id: Option<String>,
    pub r_squared: Option<f64>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl StudyRecord {
    /// Fill the result-derived fields from `result`.
    pub fn with_result(mut self, result: &AnalysisResult) -> Self {
        self.method = result.method;
        self.r_squared = result.r_squared;
        self.summary = result.summary.clone();
        self
    }
}

/// Listing entry for `GET /v1/studies`.
#[derive(Debug, Clone, Serialize)]
pub struct StudyInfo {
    pub id: String,
    pub method: Method,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub countries: Vec<String>,
    pub metrics: Vec<String>,
    pub r_squared: Option<f64>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StudyRecord> for StudyInfo {
    fn from(r: &StudyRecord) -> Self {
        Self {
            id: r.id.clone(),
            method: r.method,
            start_year: r.start_year,
            end_year: r.end_year,
            countries: r.countries.clone(),
            metrics: r.metrics.clone(),
            r_squared: r.r_squared,
            summary: r.summary.clone(),
            created_at: r.created_at,
        }
    }
}

#[derive(Clone, Default)]
pub struct StudyStore {
    inner: Arc<Mutex<Vec<StudyRecord>>>,
}

impl StudyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: StudyRecord) {
        self.inner.lock().await.push(record);
    }

    /// The user's studies, newest first.
    pub async fn list(&self, user_id: &str) -> Vec<StudyInfo> {
        self.inner.lock().await.iter().rev().filter(|r| r.user_id == user_id).map(StudyInfo::from).collect()
    }

    /// Snapshot of every study, oldest first.
    pub async fn all(&self) -> Vec<StudyRecord> {
        self.inner.lock().await.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ec_core::Value;

    pub(crate) fn record(user: &str, method: Method, dep: &str, base: &str, controls: &[&str]) -> StudyRecord {
        StudyRecord {
            id: random_hex(8),
            user_id: user.to_string(),
            method,
            dependent_metric: dep.to_string(),
            base_metric: Some(base.to_string()),
            control_metrics: controls.iter().map(|c| c.to_string()).collect(),
            metrics: vec![dep.to_string(), base.to_string()],
            countries: vec!["usa".to_string()],
            start_year: Some(2000),
            end_year: Some(2010),
            uploaded_dataset_id: None,
            r_squared: Some(0.5),
            summary: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn datasets_are_scoped_to_owner() {
        let store = DatasetStore::new();
        let data = Dataset::from_columns(vec![("x", vec![Value::Number(1.0)])]);
        let id = store.insert("alice", "a.csv", data).await;

        assert!(store.get("alice", &id).await.is_some());
        assert!(store.get("bob", &id).await.is_none());

        let listed = store.list("alice").await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_name, "a.csv");
        assert_eq!(listed[0].n_rows, 1);
        assert_eq!(listed[0].columns, vec!["x".to_string()]);
        assert!(store.list("bob").await.is_empty());
    }

    #[tokio::test]
    async fn studies_list_newest_first() {
        let store = StudyStore::new();
        let first = record("alice", Method::Ols, "gdp", "inflation", &[]);
        let second = record("alice", Method::FixedEffects, "gdp", "trade", &[]);
        let other = record("bob", Method::Ols, "gdp", "inflation", &[]);
        let (first_id, second_id) = (first.id.clone(), second.id.clone());
        store.insert(first).await;
        store.insert(other).await;
        store.insert(second).await;

        let listed = store.list("alice").await;
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![second_id.as_str(), first_id.as_str()]);
        assert_eq!(store.all().await.len(), 3);
    }
}
