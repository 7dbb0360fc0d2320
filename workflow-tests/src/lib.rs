//! End-to-end workflow tests for the dorm admin dashboard.
//!
//! Each test spawns an in-process mock of the dormitory backend plus the
//! real dashboard router, then drives the dashboard over HTTP the way a
//! browser running htmx would.
//!
//! ## Usage
//!
//! ```bash
//! cargo test -p workflow-tests
//! ```

use anyhow::{anyhow, Result};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dorm_admin::config::ApiSettings;
use dorm_admin::meter::AnnexRule;
use dorm_admin::services::ApiClient;
use dorm_admin::startup::{build_router, RouterOptions};
use dorm_admin::AppState;
use secrecy::Secret;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

pub const SERVICE_TOKEN: &str = "service-token";
pub const ADMIN_TOKEN: &str = "tok-admin";
pub const CLERK_TOKEN: &str = "tok-clerk";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,dorm_admin=debug,workflow_tests=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A write the dashboard made against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Reading { room_id: String, authorization: String },
    Invoice { room_id: String },
}

#[derive(Default)]
struct Recorded {
    calls: Vec<BackendCall>,
    failing_readings: HashSet<String>,
    failing_invoices: HashSet<String>,
}

/// In-process stand-in for the dormitory REST API.
///
/// Fixture: building "Main" with rooms 101 (tenant Anan) and 102 (no
/// contract), building "North Annex" with room 201 (tenant Boon).
#[derive(Clone, Default)]
pub struct MockBackend {
    recorded: Arc<Mutex<Recorded>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `POST /meter-readings` fail for this room.
    pub fn fail_reading_for(&self, room_id: &str) {
        self.lock().failing_readings.insert(room_id.to_string());
    }

    /// Make `POST /invoices/generate` fail for this room.
    pub fn fail_invoice_for(&self, room_id: &str) {
        self.lock().failing_invoices.insert(room_id.to_string());
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/me", get(me))
            .route("/api/staff/line/:id", get(line_staff))
            .route("/api/rooms", get(rooms))
            .route("/api/buildings", get(buildings))
            .route("/api/contracts", get(contracts))
            .route("/api/meter-readings", get(readings).post(create_reading))
            .route("/api/invoices", get(|| async { Json(json!([])) }))
            .route("/api/invoices/generate", post(generate_invoice))
            .route("/api/maintenance", get(|| async { Json(json!([])) }))
            .route("/api/line/chats/recent", get(|| async { Json(json!([])) }))
            .with_state(self.clone())
    }

    /// Serve on an ephemeral port and return the API base URL.
    pub async fn spawn(&self) -> Result<String> {
        let address = serve(self.router()).await?;
        Ok(format!("http://{}/api", address))
    }
}

async fn serve(router: Router) -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Test server stopped");
        }
    });
    Ok(address)
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn login(Json(credentials): Json<Credentials>) -> Response {
    let token = match (credentials.username.as_str(), credentials.password.as_str()) {
        ("admin", "secret") => ADMIN_TOKEN,
        ("clerk", "secret") => CLERK_TOKEN,
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Invalid credentials"})),
            )
                .into_response()
        }
    };
    Json(json!({"token": token})).into_response()
}

async fn me(headers: HeaderMap) -> Response {
    match bearer(&headers).as_str() {
        ADMIN_TOKEN => Json(json!({
            "id": 1,
            "username": "admin",
            "displayName": "Somchai Admin",
            "role": "admin"
        }))
        .into_response(),
        CLERK_TOKEN => Json(json!({
            "id": 2,
            "username": "clerk",
            "role": "staff",
            "permissions": ["maintenance"]
        }))
        .into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"}))).into_response(),
    }
}

async fn line_staff(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "U-meter" => Json(json!({
            "isStaff": true,
            "displayName": "Meter Reader",
            "role": "staff",
            "permissions": ["meter"]
        }))
        .into_response(),
        "U-chat" => Json(json!({
            "isStaff": true,
            "role": "staff",
            "permissions": ["chat"]
        }))
        .into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "Staff not found"}))).into_response(),
    }
}

async fn rooms() -> Json<Value> {
    Json(json!([
        {"id": "r3", "number": "201", "floor": 2, "buildingId": "b2", "status": "occupied"},
        {"id": "r2", "number": "102", "floor": 1, "buildingId": "b1", "status": "vacant"},
        {"id": "r1", "roomNumber": 101, "floor": 1, "buildingId": "b1", "status": "occupied", "monthlyPrice": 3500}
    ]))
}

async fn buildings() -> Json<Value> {
    Json(json!([
        {"id": "b2", "name": "North Annex"},
        {"id": "b1", "name": "Main", "code": "M"}
    ]))
}

async fn contracts() -> Json<Value> {
    Json(json!([
        {"id": 10, "roomId": "r1", "tenantName": "Anan", "isActive": true},
        {"id": 11, "roomId": "r2", "tenantName": "Former Tenant", "isActive": false},
        {"id": 12, "roomId": "r3", "tenantName": "Boon", "isActive": true}
    ]))
}

async fn readings() -> Json<Value> {
    Json(json!([
        {"id": 1, "roomId": "r1", "month": 2, "year": 2026, "waterReading": 120, "electricReading": "1000", "createdAt": "2026-02-27T09:00:00Z"}
    ]))
}

async fn create_reading(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let room_id = body["roomId"].as_str().unwrap_or_default().to_string();
    let mut recorded = backend.lock();
    recorded.calls.push(BackendCall::Reading {
        room_id: room_id.clone(),
        authorization: bearer(&headers),
    });
    if recorded.failing_readings.contains(&room_id) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "database unavailable"})),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn generate_invoice(State(backend): State<MockBackend>, Json(body): Json<Value>) -> Response {
    let room_id = body["roomId"].as_str().unwrap_or_default().to_string();
    let mut recorded = backend.lock();
    recorded.calls.push(BackendCall::Invoice {
        room_id: room_id.clone(),
    });
    if recorded.failing_invoices.contains(&room_id) {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": "invoice already exists"})),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(json!({"id": format!("inv-{}", room_id)}))).into_response()
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

/// The dashboard under test, wired to a [`MockBackend`].
pub struct TestApp {
    pub address: SocketAddr,
    pub backend: MockBackend,
    /// Keeps cookies between requests like a browser; never follows redirects.
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(MockBackend::new()).await
    }

    pub async fn spawn_with(backend: MockBackend) -> Result<Self> {
        init_tracing();

        let settings = ApiSettings {
            base_url: backend.spawn().await?,
            request_timeout_secs: 5,
            service_token: Some(Secret::new(SERVICE_TOKEN.to_string())),
            host_overrides: Vec::new(),
        };
        let api = ApiClient::new(&settings, None)?;
        let state = AppState::new(api, AnnexRule::default())
            .with_service_token(settings.service_token.clone());
        let router = build_router(
            state,
            RouterOptions {
                secure_cookies: false,
                static_dir: "../dorm-admin/static".to_string(),
            },
        );
        let address = serve(router).await?;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            address,
            backend,
            client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self.client.get(self.url(path)).send().await?)
    }

    /// POST a form the way htmx does.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url(path))
            .header("HX-Request", "true")
            .form(fields)
            .send()
            .await?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<reqwest::Response> {
        self.post_form("/login", &[("username", username), ("password", password)])
            .await
    }

    /// Poll a batch until it stops running. Returns the last response's
    /// status, `HX-Redirect` header and body.
    pub async fn wait_for_batch(&self, batch_id: &str) -> Result<BatchPoll> {
        for _ in 0..100 {
            let response = self
                .client
                .get(self.url(&format!("/meter/batches/{}", batch_id)))
                .header("HX-Request", "true")
                .send()
                .await?;
            let status = response.status().as_u16();
            let redirect = response
                .headers()
                .get("HX-Redirect")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await?;

            if redirect.is_some() || !body.contains("hx-trigger=\"load delay:1s\"") {
                return Ok(BatchPoll {
                    status,
                    redirect,
                    body,
                });
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Err(anyhow!("batch {} did not finish", batch_id))
    }
}

#[derive(Debug)]
pub struct BatchPoll {
    pub status: u16,
    pub redirect: Option<String>,
    pub body: String,
}

/// Batch id from a progress fragment's polling URL.
pub fn batch_id_from(html: &str) -> Option<String> {
    let start = html.find("/meter/batches/")? + "/meter/batches/".len();
    let id: String = html[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit() || *c == '-')
        .collect();
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_is_read_from_polling_url() {
        let html = r#"<div hx-get="/meter/batches/5f0c8a52-1d7e-4b8e-9a53-0c4f1e2d3b4a" hx-trigger="load delay:1s">"#;
        assert_eq!(
            batch_id_from(html).as_deref(),
            Some("5f0c8a52-1d7e-4b8e-9a53-0c4f1e2d3b4a")
        );
        assert!(batch_id_from("<p>done</p>").is_none());
    }
}
