use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidateUrl};

use super::de::id_string;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Open,
    InProgress,
    Resolved,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Open => "open",
            MaintenanceStatus::InProgress => "in_progress",
            MaintenanceStatus::Resolved => "resolved",
            MaintenanceStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportChannel {
    #[default]
    Staff,
    Line,
    WalkIn,
}

impl ReportChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportChannel::Staff => "staff",
            ReportChannel::Line => "line",
            ReportChannel::WalkIn => "walk_in",
        }
    }
}

/// Structured data stored next to the free-text note of a ticket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceDetails {
    #[serde(default)]
    #[validate(custom(function = "validate_image_urls"))]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub reported_via: ReportChannel,
}

fn validate_image_urls(urls: &[String]) -> Result<(), ValidationError> {
    let all_http = urls
        .iter()
        .all(|u| u.validate_url() && (u.starts_with("https://") || u.starts_with("http://")));
    if all_http {
        Ok(())
    } else {
        Err(ValidationError::new("image_url"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRequest {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub room_id: String,
    pub title: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub details: MaintenanceDetails,
    #[serde(default)]
    pub status: MaintenanceStatus,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /maintenance`.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewMaintenanceRequest {
    #[validate(length(min = 1, message = "room is required"))]
    pub room_id: String,
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub note: String,
    #[validate(nested)]
    pub details: MaintenanceDetails,
}

/// Urgent tickets first, then newest first.
pub fn sort_for_display(requests: &mut [MaintenanceRequest]) {
    requests.sort_by(|a, b| {
        b.details
            .urgent
            .cmp(&a.details.urgent)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}
