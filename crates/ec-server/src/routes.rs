//! HTTP route handlers for the EconStat server.
//!
//! All endpoints live under `/v1/` and accept/return JSON (dataset upload
//! takes a raw CSV or Excel body).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use ec_core::{AnalysisResult, ErrorKind, Method, PanelRequest};
use ec_data::UploadFormat;
use ec_inference::{ParamBag, analyze};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, User, auth_middleware};
use crate::popularity::{PopularStudy, popular_studies};
use crate::state::SharedState;
use crate::store::{DatasetInfo, StudyInfo, StudyRecord};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: SharedState) -> Router {
    let protected = Router::new()
        .route("/v1/users/me", get(me_handler))
        .route("/v1/datasets", post(upload_handler).get(list_datasets_handler))
        .route("/v1/analysis", post(analysis_handler))
        .route("/v1/studies", get(list_studies_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/v1/health", get(health_handler))
        .route("/v1/register", post(register_handler))
        .route("/v1/token", post(token_handler))
        .route("/v1/studies/popular", get(popular_handler))
        .merge(protected)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: u64,
}

async fn issue_token(state: &SharedState, user: &User) -> TokenResponse {
    TokenResponse {
        access_token: state.sessions.issue(&user.id).await,
        token_type: "bearer",
        expires_in: state.sessions.ttl().as_secs(),
    }
}

async fn register_handler(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state.users.register(&req.email, &req.password).await.map_err(AppError::bad_request)?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok(Json(issue_token(&state, &user).await))
}

async fn token_handler(
    State(state): State<SharedState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let Some(user) = state.users.authenticate(&req.username, &req.password).await else {
        tracing::warn!("failed login attempt");
        return Err(AppError::unauthorized("Incorrect email or password".into()));
    };
    Ok(Json(issue_token(&state, &user).await))
}

async fn me_handler(
    State(state): State<SharedState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    state.users.get(&user_id).await.map(Json).ok_or_else(|| AppError::not_found("User not found".into()))
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UploadQuery {
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    dataset_id: String,
    status: &'static str,
}

async fn upload_handler(
    State(state): State<SharedState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);
    state.total_requests.fetch_add(1, Ordering::Relaxed);

    let file_name = query.file_name.unwrap_or_else(|| "upload.csv".to_string());
    let Some(format) = UploadFormat::from_file_name(&file_name) else {
        return Err(AppError::bad_request(format!(
            "unsupported file type '{file_name}': upload CSV or Excel (.xls, .xlsx)"
        )));
    };

    let dataset = tokio::task::spawn_blocking(move || ec_data::parse_upload(format, &body))
        .await
        .map_err(|e| AppError::internal(format!("task panicked: {e}")))??;
    let n_rows = dataset.len();
    let dataset_id = state.datasets.insert(&user_id, &file_name, dataset).await;
    tracing::info!(%dataset_id, file_name = %file_name, ?format, n_rows, "dataset uploaded");

    Ok(Json(UploadResponse { dataset_id, status: "uploaded successfully" }))
}

async fn list_datasets_handler(
    State(state): State<SharedState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Json<Vec<DatasetInfo>> {
    Json(state.datasets.list(&user_id).await)
}

// ---------------------------------------------------------------------------
// POST /v1/analysis
// ---------------------------------------------------------------------------

/// Request body for `/v1/analysis`.
#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    #[serde(default)]
    countries: Vec<String>,
    method: String,
    dependent_metric: String,
    base_metric: Option<String>,
    #[serde(default)]
    control_metrics: Vec<String>,
    #[serde(default)]
    instrument_metrics: Vec<String>,
    #[serde(default)]
    exog_metrics: Vec<String>,
    entity: Option<String>,
    time: Option<String>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    uploaded_dataset_id: Option<String>,
}

impl AnalysisRequest {
    fn params(&self, method: Method) -> ParamBag {
        let (entity, time) = if method.is_panel() {
            (
                Some(self.entity.clone().unwrap_or_else(|| "country".to_string())),
                Some(self.time.clone().unwrap_or_else(|| "year".to_string())),
            )
        } else {
            (self.entity.clone(), self.time.clone())
        };
        ParamBag {
            dependent_variable: Some(self.dependent_metric.clone()),
            base_regressor: self.base_metric.clone(),
            controls: Some(self.control_metrics.clone()),
            instruments: Some(self.instrument_metrics.clone()),
            exogenous_regressors: Some(self.exog_metrics.clone()),
            entity_column: entity,
            time_column: time,
        }
    }

    /// Metric columns the analysis reads, in first-mention order.
    fn metrics(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let all = std::iter::once(&self.dependent_metric)
            .chain(self.base_metric.as_ref())
            .chain(&self.control_metrics)
            .chain(&self.instrument_metrics)
            .chain(&self.exog_metrics);
        for m in all {
            let m = m.trim();
            if !m.is_empty() && !out.iter().any(|o| o == m) {
                out.push(m.to_string());
            }
        }
        out
    }

    fn panel_request(&self, state: &SharedState) -> Result<PanelRequest, AppError> {
        let countries: Vec<String> =
            self.countries.iter().map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect();
        if countries.is_empty() {
            return Err(AppError::bad_request("at least one country is required".into()));
        }
        let (Some(start_year), Some(end_year)) = (self.start_year, self.end_year) else {
            return Err(AppError::bad_request("start_year and end_year are required".into()));
        };
        if start_year > end_year {
            return Err(AppError::bad_request(format!(
                "start_year ({start_year}) must not exceed end_year ({end_year})"
            )));
        }
        let metrics = self.metrics();
        let indicators = state.catalog.resolve(metrics.iter().map(String::as_str))?;
        Ok(PanelRequest { countries, indicators, start_year, end_year })
    }
}

async fn analysis_handler(
    State(state): State<SharedState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);
    state.total_requests.fetch_add(1, Ordering::Relaxed);

    let method: Method = req.method.parse()?;
    let params = req.params(method);
    params.resolve(method)?;

    let dataset = match &req.uploaded_dataset_id {
        Some(id) => state
            .datasets
            .get(&user_id, id)
            .await
            .ok_or_else(|| AppError::not_found(format!("dataset '{id}' not found")))?
            .data,
        None => {
            let request = req.panel_request(&state)?;
            let data = state.source.fetch_panel(&request).await?;
            if data.is_empty() {
                return Err(AppError::unprocessable(
                    "no observations returned for the requested countries and years".into(),
                ));
            }
            std::sync::Arc::new(data)
        }
    };

    let t0 = Instant::now();
    let result = tokio::task::spawn_blocking(move || analyze(&dataset, method, &params))
        .await
        .map_err(|e| AppError::internal(format!("task panicked: {e}")))?
        .inspect_err(|e| tracing::warn!(%method, error = %e, "analysis failed"))?;

    tracing::info!(
        %method,
        dependent = %req.dependent_metric,
        wall_time_s = t0.elapsed().as_secs_f64(),
        "analysis completed"
    );

    let record = StudyRecord {
        id: crate::auth::random_hex(16),
        user_id,
        method,
        dependent_metric: req.dependent_metric.trim().to_string(),
        base_metric: req.base_metric.as_ref().map(|b| b.trim().to_string()),
        control_metrics: req
            .control_metrics
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        metrics: req.metrics(),
        countries: req.countries.clone(),
        start_year: req.start_year,
        end_year: req.end_year,
        uploaded_dataset_id: req.uploaded_dataset_id.clone(),
        r_squared: None,
        summary: String::new(),
        created_at: Utc::now(),
    }
    .with_result(&result);
    state.studies.insert(record).await;

    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Studies
// ---------------------------------------------------------------------------

async fn list_studies_handler(
    State(state): State<SharedState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Json<Vec<StudyInfo>> {
    Json(state.studies.list(&user_id).await)
}

#[derive(Debug, Deserialize)]
struct PopularQuery {
    #[serde(default = "default_top_n")]
    top_n: usize,
}

fn default_top_n() -> usize {
    10
}

async fn popular_handler(
    State(state): State<SharedState>,
    Query(query): Query<PopularQuery>,
) -> Json<Vec<PopularStudy>> {
    let records = state.studies.all().await;
    Json(popular_studies(&records, query.top_n))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_s: f64,
    indicator_source: String,
    users: usize,
    inflight: u64,
    total_requests: u64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: ec_core::VERSION,
        uptime_s: state.started_at.elapsed().as_secs_f64(),
        indicator_source: state.source.name().to_string(),
        users: state.users.len().await,
        inflight: state.inflight.load(Ordering::Relaxed),
        total_requests: state.total_requests.load(Ordering::Relaxed),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Structured JSON error response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    fn bad_request(msg: String) -> Self {
        Self { status: StatusCode::BAD_REQUEST, kind: "validation", message: msg }
    }

    fn unauthorized(msg: String) -> Self {
        Self { status: StatusCode::UNAUTHORIZED, kind: "auth", message: msg }
    }

    fn not_found(msg: String) -> Self {
        Self { status: StatusCode::NOT_FOUND, kind: "not_found", message: msg }
    }

    fn unprocessable(msg: String) -> Self {
        Self { status: StatusCode::UNPROCESSABLE_ENTITY, kind: "data_quality", message: msg }
    }

    fn internal(msg: String) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, kind: "internal", message: msg }
    }
}

impl From<ec_core::Error> for AppError {
    fn from(e: ec_core::Error) -> Self {
        let kind = e.kind();
        let status = match kind {
            ErrorKind::Validation | ErrorKind::Ingest => StatusCode::BAD_REQUEST,
            ErrorKind::DataQuality | ErrorKind::Estimation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Provider => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, kind: kind.as_str(), message: e.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
            "kind": self.kind,
        });
        (self.status, Json(body)).into_response()
    }
}

/// RAII guard to decrement an atomic counter on drop.
struct DecrementOnDrop<'a>(&'a AtomicU64);

impl Drop for DecrementOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
