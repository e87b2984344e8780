use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::time::{Duration, sleep};

pub const PATH_OK: &str = "/ok";
pub const PATH_STATUS: &str = "/status/{code}";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_REPORTS_APP: &str = "/reports/app";
pub const PATH_REPORTS_SENSOR: &str = "/reports/sensor";
pub const PATH_SENSOR: &str = "/sensor";
pub const PATH_INMUEBLE: &str = "/inmueble";
pub const PATH_PROPERTY_PAY: &str = "/property/pay";
pub const PATH_RESERVATIONS: &str = "/reservations";
pub const PATH_RESERVATION_APPROVE: &str = "/reservations/{id}/approve";
pub const PATH_RESERVATION_REMOVE: &str = "/reservations/{id}/remove";
pub const PATH_RESERVATIONS_PAY: &str = "/reservations/pay";

pub const AUTH_HEADER: &str = "auth";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    unauthorized_total: Arc<AtomicU64>,
    rejected_total: Arc<AtomicU64>,
    sensors_registered: Arc<AtomicU64>,
    reports_received: Arc<AtomicU64>,
    properties_paid: Arc<AtomicU64>,
    reservations_created: Arc<AtomicU64>,
    reservations_approved: Arc<AtomicU64>,
    reservations_paid: Arc<AtomicU64>,
    reservations_removed: Arc<AtomicU64>,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl TestServerStats {
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn unauthorized_total(&self) -> u64 {
        self.unauthorized_total.load(Ordering::Relaxed)
    }

    /// Requests answered with 406 for any reason.
    pub fn rejected_total(&self) -> u64 {
        self.rejected_total.load(Ordering::Relaxed)
    }

    pub fn sensors_registered(&self) -> u64 {
        self.sensors_registered.load(Ordering::Relaxed)
    }

    pub fn reports_received(&self) -> u64 {
        self.reports_received.load(Ordering::Relaxed)
    }

    pub fn properties_paid(&self) -> u64 {
        self.properties_paid.load(Ordering::Relaxed)
    }

    pub fn reservations_created(&self) -> u64 {
        self.reservations_created.load(Ordering::Relaxed)
    }

    pub fn reservations_approved(&self) -> u64 {
        self.reservations_approved.load(Ordering::Relaxed)
    }

    pub fn reservations_paid(&self) -> u64 {
        self.reservations_paid.load(Ordering::Relaxed)
    }

    pub fn reservations_removed(&self) -> u64 {
        self.reservations_removed.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Reservation {
    #[serde(default)]
    id: String,
    document: String,
    name: String,
    last_name: String,
    email: String,
    phone: String,
    address: String,
    nationality: String,
    country: String,
    adults: u32,
    minors: u32,
    property: String,
    reserved_from: String,
    reserved_until: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardInfo {
    card_number: String,
    name: String,
    cvv: String,
    exp_date: String,
}

impl CardInfo {
    fn is_valid(&self) -> bool {
        self.card_number.len() == 16
            && self.card_number.bytes().all(|b| b.is_ascii_digit())
            && !self.name.is_empty()
            && self.cvv.len() == 3
            && !self.exp_date.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyPayment {
    property_id: String,
    card_info: CardInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationPayment {
    reservation_id: String,
    card_info: CardInfo,
}

#[derive(Debug, Deserialize)]
struct AppReport {
    #[serde(rename = "sensorID")]
    sensor_id: String,
    date: String,
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "propertyId")]
    property_id: String,
}

#[derive(Debug, Deserialize)]
struct SensorReading {
    value: String,
    #[allow(dead_code)]
    unit: String,
}

#[derive(Debug, Deserialize)]
struct SensorReport {
    #[serde(rename = "sensorID")]
    sensor_id: String,
    date: String,
    reports: BTreeMap<String, SensorReading>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sensor {
    id: String,
    description: String,
    serial_number: String,
    brand: String,
    address: String,
    report_structure: ReportStructure,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportStructure {
    reports: Vec<ReportField>,
    sensor_id: String,
}

#[derive(Debug, Deserialize)]
struct ReportField {
    #[serde(rename = "type")]
    kind: String,
    #[allow(dead_code)]
    unit: String,
    value: String,
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    reservations: HashMap<String, Reservation>,
}

#[derive(Debug, Clone, Default)]
struct AppState {
    stats: TestServerStats,
    store: Arc<Mutex<Store>>,
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn rejected(state: &AppState, text: &str) -> Response {
    bump(&state.stats.rejected_total);
    message(StatusCode::NOT_ACCEPTABLE, text)
}

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let ok = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().is_empty());
    if !ok {
        bump(&state.stats.unauthorized_total);
    }
    ok
}

fn parse<T: serde::de::DeserializeOwned>(body: &[u8]) -> Option<T> {
    serde_json::from_slice(body).ok()
}

async fn handle_ok(State(state): State<AppState>) -> &'static str {
    bump(&state.stats.requests_total);
    "ok"
}

async fn handle_status(State(state): State<AppState>, Path(code): Path<u16>) -> Response {
    bump(&state.stats.requests_total);
    match StatusCode::from_u16(code) {
        Ok(status) => (status, "status").into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "bad status").into_response(),
    }
}

async fn handle_slow(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> &'static str {
    bump(&state.stats.requests_total);
    let ms = query
        .get("ms")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(50);
    sleep(Duration::from_millis(ms)).await;
    "slow"
}

async fn handle_app_report(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    bump(&state.stats.requests_total);
    let Some(report) = parse::<AppReport>(&body) else {
        return rejected(&state, "failed to read report");
    };
    if report.sensor_id.is_empty()
        || report.date.is_empty()
        || report.kind.is_empty()
        || report.value.is_empty()
        || report.property_id.is_empty()
    {
        return rejected(&state, "report is missing fields");
    }
    bump(&state.stats.reports_received);
    message(StatusCode::OK, "Success")
}

async fn handle_sensor_report(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    bump(&state.stats.requests_total);
    let Some(report) = parse::<SensorReport>(&body) else {
        return rejected(&state, "failed to read report");
    };
    if report.sensor_id.is_empty()
        || report.date.is_empty()
        || report.reports.is_empty()
        || report.reports.values().any(|r| r.value.is_empty())
    {
        return rejected(&state, "report is missing fields");
    }
    bump(&state.stats.reports_received);
    message(StatusCode::OK, "Success")
}

async fn handle_sensor(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    bump(&state.stats.requests_total);
    if !authorized(&state, &headers) {
        return rejected(&state, "failed to read auth token");
    }
    let Some(sensor) = parse::<Sensor>(&body) else {
        return rejected(&state, "failed to read sensor");
    };
    let complete = !sensor.id.is_empty()
        && !sensor.description.is_empty()
        && !sensor.serial_number.is_empty()
        && !sensor.brand.is_empty()
        && !sensor.address.is_empty()
        && sensor.report_structure.sensor_id == sensor.id
        && !sensor.report_structure.reports.is_empty()
        && sensor
            .report_structure
            .reports
            .iter()
            .all(|r| !r.kind.is_empty() && !r.value.is_empty());
    if !complete {
        return rejected(&state, "sensor is missing fields");
    }
    bump(&state.stats.sensors_registered);
    message(StatusCode::CREATED, "Success")
}

async fn handle_inmueble(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    bump(&state.stats.requests_total);
    let page = query.get("page").and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);
    let size = query.get("size").and_then(|v| v.parse::<u64>().ok()).unwrap_or(10);
    let items: Vec<_> = (0..size)
        .map(|i| {
            json!({
                "id": format!("prop{:011}", page.saturating_sub(1) * size + i),
                "hasAC": query.get("hasAC").is_some_and(|v| v == "true"),
            })
        })
        .collect();
    (
        StatusCode::OK,
        Json(json!({ "page": page, "size": size, "items": items })),
    )
        .into_response()
}

async fn handle_property_pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    bump(&state.stats.requests_total);
    if !authorized(&state, &headers) {
        return rejected(&state, "failed to read auth token");
    }
    match parse::<PropertyPayment>(&body) {
        Some(p) if !p.property_id.is_empty() && p.card_info.is_valid() => {
            bump(&state.stats.properties_paid);
            message(StatusCode::CREATED, "Success")
        }
        _ => rejected(&state, "invalid payment"),
    }
}

async fn handle_create_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    bump(&state.stats.requests_total);
    if !authorized(&state, &headers) {
        return rejected(&state, "failed to read auth token");
    }
    let Some(mut reservation) = parse::<Reservation>(&body) else {
        return rejected(&state, "failed to read reservation");
    };
    if reservation.email.is_empty() || reservation.property.is_empty() {
        return rejected(&state, "reservation is missing fields");
    }

    let mut store = state.store.lock().await;
    store.next_id += 1;
    reservation.id = format!("r{:014}", store.next_id);
    reservation.status = "pending".to_string();
    store
        .reservations
        .insert(reservation.id.clone(), reservation);
    drop(store);

    bump(&state.stats.reservations_created);
    message(StatusCode::CREATED, "Success")
}

async fn handle_list_reservations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    bump(&state.stats.requests_total);
    if !authorized(&state, &headers) {
        return rejected(&state, "failed to read auth token");
    }

    let email = query.get("email");
    let property = query.get("propertyId");
    let store = state.store.lock().await;
    let mut found: Vec<Reservation> = store
        .reservations
        .values()
        .filter(|r| email.is_none_or(|e| &r.email == e))
        .filter(|r| property.is_none_or(|p| &r.property == p))
        .cloned()
        .collect();
    drop(store);
    found.sort_by(|a, b| a.id.cmp(&b.id));

    // The real backend answers this listing with 201.
    (StatusCode::CREATED, Json(found)).into_response()
}

async fn update_reservation(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    apply: impl FnOnce(&mut Store, &str) -> bool,
) -> Option<Response> {
    bump(&state.stats.requests_total);
    if !authorized(state, headers) {
        return Some(rejected(state, "failed to read auth token"));
    }
    let mut store = state.store.lock().await;
    if !apply(&mut store, id) {
        drop(store);
        return Some(rejected(state, "reservation not found"));
    }
    None
}

async fn handle_approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let failed = update_reservation(&state, &headers, &id, |store, id| {
        match store.reservations.get_mut(id) {
            Some(r) => {
                r.status = "approved".to_string();
                true
            }
            None => false,
        }
    })
    .await;
    if let Some(res) = failed {
        return res;
    }
    bump(&state.stats.reservations_approved);
    message(StatusCode::OK, "Success")
}

async fn handle_remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let failed = update_reservation(&state, &headers, &id, |store, id| {
        store.reservations.remove(id).is_some()
    })
    .await;
    if let Some(res) = failed {
        return res;
    }
    bump(&state.stats.reservations_removed);
    message(StatusCode::OK, "Success")
}

async fn handle_reservation_pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let Some(payment) = parse::<ReservationPayment>(&body) else {
        bump(&state.stats.requests_total);
        return rejected(&state, "invalid payment");
    };
    if !payment.card_info.is_valid() {
        bump(&state.stats.requests_total);
        return rejected(&state, "invalid card");
    }

    let failed = update_reservation(&state, &headers, &payment.reservation_id, |store, id| {
        match store.reservations.get_mut(id) {
            Some(r) if r.status == "approved" => {
                r.status = "paid".to_string();
                true
            }
            _ => false,
        }
    })
    .await;
    if let Some(res) = failed {
        return res;
    }
    bump(&state.stats.reservations_paid);
    message(StatusCode::CREATED, "Success")
}

fn app(state: AppState) -> Router {
    Router::new()
        .route(PATH_OK, get(handle_ok))
        .route(PATH_STATUS, get(handle_status))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_REPORTS_APP, post(handle_app_report))
        .route(PATH_REPORTS_SENSOR, post(handle_sensor_report))
        .route(PATH_SENSOR, post(handle_sensor))
        .route(PATH_INMUEBLE, get(handle_inmueble))
        .route(PATH_PROPERTY_PAY, post(handle_property_pay))
        .route(
            PATH_RESERVATIONS,
            post(handle_create_reservation).get(handle_list_reservations),
        )
        .route(PATH_RESERVATIONS_PAY, post(handle_reservation_pay))
        .route(PATH_RESERVATION_APPROVE, post(handle_approve))
        .route(PATH_RESERVATION_REMOVE, post(handle_remove))
        .with_state(state)
}

pub fn router(stats: TestServerStats) -> Router {
    app(AppState {
        stats,
        store: Arc::default(),
    })
}

/// In-process stub of the property/reservation/sensor backend, bound to an ephemeral port.
pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
