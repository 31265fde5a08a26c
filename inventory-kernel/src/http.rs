/**
 * API REST INVENTAIRE - Serveur HTTP du kernel
 *
 * RÔLE :
 * Expose en lecture les tables alimentées par le pipeline de polling, plus les
 * écritures de configuration (credentials, intervalles, tags), le
 * déclenchement manuel d'un cycle et la collecte des logs d'un châssis.
 *
 * FONCTIONNEMENT :
 * - Routes : /health, /api, /system/health, /api/{chassis,cards,ports,sensors,licenses},
 *   /api/performance, /api/ixnetwork, /api/poll/{category}, /api/logs/collect,
 *   /api/config/{credentials,ixnetwork-servers,intervals,reset}, /api/tags/{add,remove}
 * - Lectures via Store::read (connexions read-only bornées)
 * - Erreurs sérialisées en `{ "error": message }` (400 / 404 / 500 / 502)
 */

use crate::client::{ChassisConnector, ClientError};
use crate::credentials::{parse_upload, CredentialError, CredentialReport};
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{
    CardRecord, Category, ChassisSummaryRecord, IxNetworkServerRecord, LicenseRecord, PollSetting, PortRecord,
    SensorRecord, UtilizationSample,
};
use crate::poller::Poller;
use crate::store::settings::{self, split_tags, CredentialScope, TagOperation};
use crate::store::{inventory, schema, Store, StoreError};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub poller: Poller,
    pub health_tracker: HealthTracker,
    /// Sessions vendor ouvertes à la demande (collecte de logs)
    pub connector: Arc<dyn ChassisConnector>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
    /// Le châssis a refusé ou raté l'opération
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => {
                error!(error = %m, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
            ApiError::Upstream(m) => {
                warn!(error = %m, "chassis operation failed");
                (StatusCode::BAD_GATEWAY, m)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(m) => ApiError::BadRequest(m),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ClientError> for ApiError {
    fn from(e: ClientError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api", get(api_info))
        .route("/system/health", get(get_system_health))
        .route("/api/chassis", get(list_chassis))
        .route("/api/chassis/{ip}", get(get_chassis))
        .route("/api/cards", get(list_cards))
        .route("/api/ports", get(list_ports))
        .route("/api/sensors", get(list_sensors))
        .route("/api/licenses", get(list_licenses))
        .route("/api/performance", get(list_performance))
        .route("/api/performance/chassis-list", get(list_performance_chassis))
        .route("/api/performance/{ip}", get(get_performance))
        .route("/api/ixnetwork", get(list_ixnetwork_servers))
        .route("/api/poll/{category}", post(trigger_poll))
        .route("/api/logs/collect", post(collect_logs))
        .route("/api/config/credentials", get(get_credentials).post(upload_credentials))
        .route("/api/config/ixnetwork-servers", get(get_ixnetwork_credentials).post(upload_ixnetwork_credentials))
        .route("/api/config/intervals", get(get_intervals).put(put_intervals))
        .route("/api/config/reset", delete(reset_database))
        .route("/api/tags/add", post(add_tags))
        .route("/api/tags/remove", post(remove_tags))
        .with_state(app_state)
}

async fn api_info() -> Json<Value> {
    Json(json!({ "name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") }))
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(app.store.write_stats()))
}

#[derive(Debug, Deserialize)]
struct IpFilter {
    ip: Option<String>,
}

/// `{ "<key>": [...], "count": n }`
fn listing<T: Serialize>(key: &str, items: Vec<T>) -> Json<Value> {
    let count = items.len();
    Json(json!({ key: items, "count": count }))
}

async fn list_chassis(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows: Vec<ChassisSummaryRecord> = app.store.read(|conn| inventory::read_summary(conn)).await?;
    Ok(listing("chassis", rows))
}

async fn get_chassis(State(app): State<AppState>, Path(ip): Path<String>) -> ApiResult<ChassisSummaryRecord> {
    let lookup = ip.clone();
    app.store
        .read(move |conn| inventory::read_summary_by_ip(conn, &lookup))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("chassis {ip} not found")))
}

async fn read_table<R>(store: &Store, ip: Option<String>) -> Result<Vec<R>, ApiError>
where
    R: inventory::TableRow + Send + 'static,
{
    Ok(store.read(move |conn| inventory::read_rows::<R>(conn, ip.as_deref())).await?)
}

async fn list_cards(State(app): State<AppState>, Query(filter): Query<IpFilter>) -> Result<Json<Value>, ApiError> {
    Ok(listing("cards", read_table::<CardRecord>(&app.store, filter.ip).await?))
}

async fn list_ports(State(app): State<AppState>, Query(filter): Query<IpFilter>) -> Result<Json<Value>, ApiError> {
    Ok(listing("ports", read_table::<PortRecord>(&app.store, filter.ip).await?))
}

async fn list_sensors(State(app): State<AppState>, Query(filter): Query<IpFilter>) -> Result<Json<Value>, ApiError> {
    Ok(listing("sensors", read_table::<SensorRecord>(&app.store, filter.ip).await?))
}

async fn list_licenses(State(app): State<AppState>, Query(filter): Query<IpFilter>) -> Result<Json<Value>, ApiError> {
    Ok(listing("licenses", read_table::<LicenseRecord>(&app.store, filter.ip).await?))
}

async fn list_performance(State(app): State<AppState>) -> ApiResult<Vec<UtilizationSample>> {
    Ok(Json(app.store.read(|conn| inventory::read_utilization(conn, None)).await?))
}

async fn get_performance(State(app): State<AppState>, Path(ip): Path<String>) -> ApiResult<Vec<UtilizationSample>> {
    Ok(Json(app.store.read(move |conn| inventory::read_utilization(conn, Some(ip.as_str()))).await?))
}

// Châssis sélectionnables pour les graphes d'utilisation
async fn list_performance_chassis(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(listing("chassis", masked_credentials(&app.store, CredentialScope::Chassis).await?))
}

async fn list_ixnetwork_servers(
    State(app): State<AppState>,
    Query(filter): Query<IpFilter>,
) -> Result<Json<Value>, ApiError> {
    Ok(listing("servers", read_table::<IxNetworkServerRecord>(&app.store, filter.ip).await?))
}

// POST /api/poll/{category} : fire-and-forget
async fn trigger_poll(
    State(app): State<AppState>,
    Path(category): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let category: Category = category.parse().map_err(ApiError::BadRequest)?;
    if !category.fetches_from_chassis() {
        return Err(ApiError::BadRequest(format!("{category} cannot be triggered manually")));
    }
    app.poller.run_cycle_now(category);
    info!(category = %category, "manual poll triggered");
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started", "category": category }))))
}

#[derive(Debug, Serialize)]
struct CredentialView {
    ip: String,
    username: String,
    password: &'static str,
}

async fn masked_credentials(store: &Store, scope: CredentialScope) -> Result<Vec<CredentialView>, ApiError> {
    let creds = store.read(move |conn| settings::read_credentials(conn, scope)).await?;
    Ok(creds
        .into_iter()
        .map(|c| CredentialView { ip: c.ip, username: c.username, password: "******" })
        .collect())
}

async fn get_credentials(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(listing("credentials", masked_credentials(&app.store, CredentialScope::Chassis).await?))
}

async fn get_ixnetwork_credentials(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(listing("api_servers", masked_credentials(&app.store, CredentialScope::IxNetwork).await?))
}

#[derive(Debug, Deserialize)]
struct CredentialUpload {
    text: String,
}

// Rien n'est appliqué si une ligne est invalide
async fn apply_upload(store: &Store, scope: CredentialScope, text: &str) -> ApiResult<CredentialReport> {
    let ops = parse_upload(text)?;
    let report = store.write("credentials", move |tx| settings::apply_credentials(tx, scope, &ops)).await?;
    info!(
        scope = ?scope,
        added = report.added,
        updated = report.updated,
        deleted = report.deleted,
        "credentials updated"
    );
    Ok(Json(report))
}

async fn upload_credentials(
    State(app): State<AppState>,
    Json(body): Json<CredentialUpload>,
) -> ApiResult<CredentialReport> {
    apply_upload(&app.store, CredentialScope::Chassis, &body.text).await
}

async fn upload_ixnetwork_credentials(
    State(app): State<AppState>,
    Json(body): Json<CredentialUpload>,
) -> ApiResult<CredentialReport> {
    apply_upload(&app.store, CredentialScope::IxNetwork, &body.text).await
}

// DELETE /api/config/reset : inventaire, credentials et réglages effacés
async fn reset_database(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    app.store.write("reset", |tx| schema::reset(tx)).await?;
    warn!("database reset");
    Ok(Json(json!({ "message": "Database reset successfully", "success": true })))
}

#[derive(Debug, Deserialize)]
struct LogRequest {
    ip: String,
}

// POST /api/logs/collect : l'archive reste sur le châssis, seule son URL est renvoyée
async fn collect_logs(State(app): State<AppState>, Json(body): Json<LogRequest>) -> Result<Json<Value>, ApiError> {
    let creds = app.store.read(|conn| settings::read_credentials(conn, CredentialScope::Chassis)).await?;
    let credential = creds
        .into_iter()
        .find(|c| c.ip == body.ip)
        .ok_or_else(|| ApiError::NotFound(format!("chassis {} not configured", body.ip)))?;

    let session = app.connector.connect(&credential).await?;
    let result_url = session.collect_logs().await?;
    info!(chassis_ip = %credential.ip, result_url = %result_url, "chassis logs collected");
    Ok(Json(json!({
        "resultUrl": result_url,
        "message": "Log in to the chassis and open this URL to download the logs",
    })))
}

async fn get_intervals(State(app): State<AppState>) -> ApiResult<PollSetting> {
    let setting = app.store.read(|conn| settings::read_poll_setting(conn)).await?;
    Ok(Json(setting.unwrap_or_default()))
}

async fn put_intervals(State(app): State<AppState>, Json(setting): Json<PollSetting>) -> ApiResult<PollSetting> {
    setting.validate().map_err(ApiError::BadRequest)?;
    let stored = setting.clone();
    app.store.write("poll_setting", move |tx| settings::write_poll_setting(tx, &stored)).await?;
    Ok(Json(setting))
}

#[derive(Debug, Deserialize)]
struct TagRequest {
    ip: String,
    tags: String,
}

#[derive(Debug, Serialize)]
struct TagResponse {
    ip: String,
    tags: Vec<String>,
}

async fn add_tags(State(app): State<AppState>, Json(body): Json<TagRequest>) -> ApiResult<TagResponse> {
    update_tags(&app.store, body, TagOperation::Add).await
}

async fn remove_tags(State(app): State<AppState>, Json(body): Json<TagRequest>) -> ApiResult<TagResponse> {
    update_tags(&app.store, body, TagOperation::Remove).await
}

async fn update_tags(store: &Store, body: TagRequest, operation: TagOperation) -> ApiResult<TagResponse> {
    let tags = split_tags(&body.tags);
    if tags.is_empty() {
        return Err(ApiError::BadRequest("no tags given".into()));
    }
    let ip = body.ip.trim().to_string();
    let target = ip.clone();
    let tags = store.write("tags", move |tx| settings::update_tags(tx, &target, &tags, operation)).await?;
    Ok(Json(TagResponse { ip, tags }))
}
