//! Shared application state for the EconStat server.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

use ec_core::IndicatorSource;
use ec_data::IndicatorCatalog;

use crate::auth::{SessionStore, UserStore};
use crate::store::{DatasetStore, StudyStore};

/// Shared state available to all request handlers.
pub struct AppState {
    /// Server start time (for uptime reporting).
    pub started_at: Instant,

    /// In-flight request counter (for /health).
    pub inflight: AtomicU64,

    /// Total requests served (for /health).
    pub total_requests: AtomicU64,

    pub users: UserStore,
    pub sessions: SessionStore,
    pub datasets: DatasetStore,
    pub studies: StudyStore,

    /// Metric name → indicator code.
    pub catalog: IndicatorCatalog,

    /// Remote panel provider.
    pub source: Arc<dyn IndicatorSource>,
}

impl AppState {
    pub fn new(catalog: IndicatorCatalog, source: Arc<dyn IndicatorSource>, token_ttl: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            inflight: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            users: UserStore::new(),
            sessions: SessionStore::new(token_ttl),
            datasets: DatasetStore::new(),
            studies: StudyStore::new(),
            catalog,
            source,
        }
    }
}

/// Type alias used in axum handlers.
pub type SharedState = Arc<AppState>;
