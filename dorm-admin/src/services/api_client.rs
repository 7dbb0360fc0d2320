//! Typed client for the dormitory backend REST API.
//!
//! Every method is a single request/response with no retries or caching.
//! Non-2xx responses become [`ApiError::Status`] with a best-effort message.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ApiSettings;
use crate::models::{
    Building, Contract, GenerateInvoice, Invoice, MaintenanceRequest, MeterReading,
    MeterReadingQuery, NewMaintenanceRequest, NewMeterReading, RecentChat, Room, StaffLookup,
    StaffProfile,
};
use crate::models::BillingPeriod;

const MAX_MESSAGE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from backend: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

/// Calls the batch orchestrator depends on.
#[async_trait]
pub trait MeterApi: Send + Sync {
    async fn create_meter_reading(&self, reading: &NewMeterReading) -> Result<(), ApiError>;
    async fn generate_invoice(&self, request: &GenerateInvoice) -> Result<(), ApiError>;
}

/// Staff lookup by LINE user id; `Ok(None)` means the id is not staff.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn staff_by_line_user(&self, line_user_id: &str)
        -> Result<Option<StaffLookup>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken")]
    token: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct PeriodQuery {
    month: u32,
    year: i32,
}

/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    request_id: Option<String>,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings, public_host: Option<&str>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        let base_url = settings
            .effective_base_url(public_host)
            .trim_end_matches('/')
            .to_string();

        tracing::info!(base_url = %base_url, "Configured backend API client");

        Ok(Self {
            client,
            base_url,
            token: None,
            request_id: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A client that sends `token` as bearer auth and forwards `request_id`.
    pub fn scoped(&self, token: Option<&str>, request_id: Option<&str>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: token.map(str::to_string),
            request_id: request_id.map(str::to_string),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut request = self.client.traced_get(&url);
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request
            .maybe_bearer_auth(self.token.as_deref())
            .request_id(self.request_id.as_deref())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "GET request to backend failed");
                ApiError::Transport(e)
            })?;

        decode(response).await
    }

    async fn post<B>(&self, path: &str, body: &B) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let response = self
            .client
            .traced_post(&url)
            .json(body)
            .maybe_bearer_auth(self.token.as_deref())
            .request_id(self.request_id.as_deref())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "POST request to backend failed");
                ApiError::Transport(e)
            })?;

        ensure_success(response).await
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get::<_, ()>("/rooms", None).await
    }

    pub async fn list_buildings(&self) -> Result<Vec<Building>, ApiError> {
        self.get::<_, ()>("/buildings", None).await
    }

    pub async fn list_contracts(&self) -> Result<Vec<Contract>, ApiError> {
        self.get::<_, ()>("/contracts", None).await
    }

    pub async fn list_meter_readings(
        &self,
        query: &MeterReadingQuery,
    ) -> Result<Vec<MeterReading>, ApiError> {
        self.get("/meter-readings", Some(query)).await
    }

    pub async fn create_meter_reading(&self, reading: &NewMeterReading) -> Result<(), ApiError> {
        self.post("/meter-readings", reading).await.map(drop)
    }

    pub async fn generate_invoice(&self, request: &GenerateInvoice) -> Result<(), ApiError> {
        self.post("/invoices/generate", request).await.map(drop)
    }

    pub async fn list_invoices(&self, period: BillingPeriod) -> Result<Vec<Invoice>, ApiError> {
        let query = PeriodQuery {
            month: period.month(),
            year: period.year(),
        };
        self.get("/invoices", Some(&query)).await
    }

    pub async fn staff_by_line_user(
        &self,
        line_user_id: &str,
    ) -> Result<Option<StaffLookup>, ApiError> {
        let path = line_staff_path(line_user_id);
        match self.get::<StaffLookup, ()>(&path, None).await {
            Ok(lookup) => Ok(Some(lookup)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .post("/auth/login", &LoginRequest { username, password })
            .await?;
        let bytes = response.bytes().await?;
        let login: LoginResponse = serde_json::from_slice(&bytes)?;
        Ok(login.token)
    }

    /// Profile of the token holder (`GET /auth/me`).
    pub async fn current_profile(&self, token: &str) -> Result<StaffProfile, ApiError> {
        self.scoped(Some(token), self.request_id.as_deref())
            .get::<_, ()>("/auth/me", None)
            .await
    }

    pub async fn list_maintenance(&self) -> Result<Vec<MaintenanceRequest>, ApiError> {
        self.get::<_, ()>("/maintenance", None).await
    }

    pub async fn create_maintenance(
        &self,
        request: &NewMaintenanceRequest,
    ) -> Result<MaintenanceRequest, ApiError> {
        let response = self.post("/maintenance", request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn recent_chats(&self) -> Result<Vec<RecentChat>, ApiError> {
        self.get::<_, ()>("/line/chats/recent", None).await
    }
}

#[async_trait]
impl MeterApi for ApiClient {
    async fn create_meter_reading(&self, reading: &NewMeterReading) -> Result<(), ApiError> {
        ApiClient::create_meter_reading(self, reading).await
    }

    async fn generate_invoice(&self, request: &GenerateInvoice) -> Result<(), ApiError> {
        ApiClient::generate_invoice(self, request).await
    }
}

#[async_trait]
impl StaffDirectory for ApiClient {
    async fn staff_by_line_user(
        &self,
        line_user_id: &str,
    ) -> Result<Option<StaffLookup>, ApiError> {
        ApiClient::staff_by_line_user(self, line_user_id).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(status, &body);
    tracing::warn!(status = status.as_u16(), message = %message, "Backend returned an error");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Best-effort human message from an error body: JSON `message` (string or
/// list of strings), then JSON `error`, then the raw text, then the status reason.
pub(crate) fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            let text = match value.get(key) {
                Some(serde_json::Value::String(s)) => s.trim().to_string(),
                Some(serde_json::Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => String::new(),
            };
            if !text.is_empty() {
                return truncate(text);
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('<') && !trimmed.starts_with('{') {
        return truncate(trimmed.to_string());
    }

    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

fn truncate(mut message: String) -> String {
    if message.chars().count() > MAX_MESSAGE_LEN {
        message = message.chars().take(MAX_MESSAGE_LEN).collect::<String>() + "…";
    }
    message
}

fn line_staff_path(line_user_id: &str) -> String {
    format!("/staff/line/{}", urlencoding::encode(line_user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_field_wins() {
        let body = r#"{"message":"Room not found","error":"Not Found"}"#;
        assert_eq!(
            extract_error_message(StatusCode::NOT_FOUND, body),
            "Room not found"
        );
    }

    #[test]
    fn validation_message_lists_are_joined() {
        let body = r#"{"message":["month must be an integer","year is required"]}"#;
        assert_eq!(
            extract_error_message(StatusCode::BAD_REQUEST, body),
            "month must be an integer; year is required"
        );
    }

    #[test]
    fn error_field_is_second_choice() {
        let body = r#"{"error":"duplicate reading"}"#;
        assert_eq!(
            extract_error_message(StatusCode::CONFLICT, body),
            "duplicate reading"
        );
    }

    #[test]
    fn plain_text_body_is_used() {
        assert_eq!(
            extract_error_message(StatusCode::BAD_GATEWAY, "upstream timeout\n"),
            "upstream timeout"
        );
    }

    #[test]
    fn html_or_empty_body_falls_back_to_reason() {
        assert_eq!(
            extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>"),
            "Internal Server Error"
        );
        assert_eq!(
            extract_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[test]
    fn line_user_id_is_percent_encoded_in_path() {
        assert_eq!(line_staff_path("U1234abc"), "/staff/line/U1234abc");
        assert_eq!(line_staff_path("a/b c"), "/staff/line/a%2Fb%20c");
    }

    #[test]
    fn status_helpers() {
        let err = ApiError::Status {
            status: 401,
            message: "expired".into(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "expired (HTTP 401)");
    }
}
