//! HTTP routes
//!
//! Tourist-facing endpoints authenticate with a bearer token issued at
//! registration or login. Dashboard endpoints are read-only joins over the
//! engine state. The cron endpoint runs one anomaly scan on demand and is
//! guarded by a shared secret.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use safety_engine::{
    views::{AlertView, AnomalyView, TouristView},
    AnomalyStatus, Registration, SafetyError, SafetyService, ScanReport, TouristId,
};
use safety_zones::SafetyZone;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::sessions::SessionStore;

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SafetyService>,
    pub sessions: Arc<SessionStore>,
    /// Unset disables the cron endpoint
    pub cron_secret: Option<Arc<str>>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn reject(e: SafetyError) -> (StatusCode, String) {
    let status = match &e {
        SafetyError::TouristNotFound(_)
        | SafetyError::PhoneNotFound(_)
        | SafetyError::AnomalyNotFound(_) => StatusCode::NOT_FOUND,
        SafetyError::InvalidCoordinates(_) | SafetyError::InvalidRegistration(_) => {
            StatusCode::BAD_REQUEST
        }
        SafetyError::AlreadyRegistered => StatusCode::CONFLICT,
        SafetyError::InvalidConfig(_) | SafetyError::Zone(_) | SafetyError::Storage(_) => {
            warn!("request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(state: &AppState, headers: &HeaderMap, now: DateTime<Utc>) -> Result<TouristId, (StatusCode, String)> {
    let token = bearer_token(headers).ok_or((
        StatusCode::UNAUTHORIZED,
        "Missing bearer token".to_string(),
    ))?;
    state
        .sessions
        .resolve(token, now)
        .ok_or((StatusCode::UNAUTHORIZED, "Session expired or unknown".to_string()))
}

/// Compares digests; `blake3::Hash` equality is constant time, and hashing
/// hides the secret's length
fn secret_matches(presented: &[u8], secret: &str) -> bool {
    blake3::hash(presented) == blake3::hash(secret.as_bytes())
}

// ========== Request/Response Types ==========

#[derive(Serialize)]
pub struct SessionResponse {
    pub tourist_id: TouristId,
    pub digital_id: String,
    pub name: String,
    pub token: String,
    pub visit_end_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub phone: String,
}

#[derive(Deserialize)]
pub struct LocationRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Serialize)]
pub struct LocationResponse {
    pub status: &'static str,
    pub safety_score: u8,
    pub zones: Vec<String>,
    pub alerts: Vec<String>,
    pub resolved_anomalies: usize,
}

#[derive(Serialize)]
pub struct PanicResponse {
    pub status: &'static str,
    pub alert_id: Uuid,
    pub safety_score: u8,
}

#[derive(Serialize)]
pub struct ZonesResponse {
    pub safety_zones: Vec<SafetyZone>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct AnomalyQuery {
    #[serde(default)]
    pub active_only: bool,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub id: Uuid,
    pub tourist_id: TouristId,
    pub status: AnomalyStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ========== Route Handlers ==========

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "safety-gateway",
        "zones": state.service.list_zones().len(),
        "scanner": state.service.config().detection,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Register a tourist and open a session
async fn register(
    State(state): State<AppState>,
    Json(req): Json<Registration>,
) -> ApiResult<SessionResponse> {
    let now = Utc::now();
    let tourist = state.service.register_tourist(req, now).map_err(reject)?;
    let token = state.sessions.issue(tourist.id, now);

    Ok(Json(SessionResponse {
        tourist_id: tourist.id,
        digital_id: tourist.digital_id,
        name: tourist.name,
        token,
        visit_end_date: tourist.visit_end_date,
    }))
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<SessionResponse> {
    let now = Utc::now();
    let tourist = state.service.tourist_by_phone(&req.phone).map_err(reject)?;
    let token = state.sessions.issue(tourist.id, now);

    Ok(Json(SessionResponse {
        tourist_id: tourist.id,
        digital_id: tourist.digital_id,
        name: tourist.name,
        token,
        visit_end_date: tourist.visit_end_date,
    }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    match bearer_token(&headers) {
        Some(token) if state.sessions.revoke(token) => StatusCode::NO_CONTENT,
        _ => StatusCode::UNAUTHORIZED,
    }
}

/// The body is parsed after authentication so an anonymous caller always
/// gets 401, and any unusable body is a 400.
async fn update_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LocationRequest>, JsonRejection>,
) -> ApiResult<LocationResponse> {
    let now = Utc::now();
    let tourist_id = authenticate(&state, &headers, now)?;

    let Json(req) = body.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Invalid location body: {}", e.body_text()),
        )
    })?;
    let (Some(lat), Some(lon)) = (req.latitude, req.longitude) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Missing latitude or longitude".to_string(),
        ));
    };

    let outcome = state
        .service
        .update_location(tourist_id, lat, lon, now)
        .map_err(reject)?;

    Ok(Json(LocationResponse {
        status: "success",
        safety_score: outcome.safety_score,
        zones: outcome.zones,
        alerts: outcome
            .issued_alerts
            .iter()
            .map(|a| a.alert_type.to_string())
            .collect(),
        resolved_anomalies: outcome.resolved_anomalies.len(),
    }))
}

async fn panic_button(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<PanicResponse> {
    let now = Utc::now();
    let tourist_id = authenticate(&state, &headers, now)?;
    let outcome = state.service.trigger_panic(tourist_id, now).map_err(reject)?;

    Ok(Json(PanicResponse {
        status: "alert_sent",
        alert_id: outcome.alert.id,
        safety_score: outcome.safety_score,
    }))
}

async fn list_zones(State(state): State<AppState>) -> Json<ZonesResponse> {
    Json(ZonesResponse {
        safety_zones: state.service.list_zones(),
    })
}

async fn dashboard_tourists(State(state): State<AppState>) -> ApiResult<Vec<TouristView>> {
    state.service.list_tourists().map(Json).map_err(reject)
}

async fn dashboard_alerts(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Vec<AlertView>> {
    state
        .service
        .list_alerts(q.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .map(Json)
        .map_err(reject)
}

async fn dashboard_anomalies(
    State(state): State<AppState>,
    Query(q): Query<AnomalyQuery>,
) -> ApiResult<Vec<AnomalyView>> {
    state
        .service
        .list_anomalies(q.active_only, q.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .map(Json)
        .map_err(reject)
}

async fn resolve_anomaly(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<ResolveResponse> {
    let anomaly = state.service.resolve_anomaly(id, Utc::now()).map_err(reject)?;

    Ok(Json(ResolveResponse {
        id: anomaly.id,
        tourist_id: anomaly.tourist_id,
        status: anomaly.status,
        resolved_at: anomaly.resolved_at,
    }))
}

/// Run one anomaly scan on behalf of an external scheduler
async fn cron_scan(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<ScanReport> {
    let Some(secret) = state.cron_secret.as_deref() else {
        return Err((StatusCode::NOT_FOUND, "Cron endpoint disabled".to_string()));
    };
    let presented = headers
        .get(CRON_SECRET_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();
    if !secret_matches(presented, secret) {
        return Err((StatusCode::FORBIDDEN, "Invalid cron secret".to_string()));
    }

    state.service.run_scan(Utc::now()).map(Json).map_err(reject)
}

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/location", post(update_location))
        .route("/panic", post(panic_button))
        .route("/safety-zones", get(list_zones))
        .route("/dashboard/tourists", get(dashboard_tourists))
        .route("/dashboard/alerts", get(dashboard_alerts))
        .route("/dashboard/anomalies", get(dashboard_anomalies))
        .route("/anomalies/:id/resolve", post(resolve_anomaly))
        .route("/cron/scan", post(cron_scan))
        .with_state(state)
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/api/v1", api_routes(state))
}
