use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form,
};
use chrono::Local;
use serde::Deserialize;
use service_core::middleware::RequestId;
use std::collections::HashMap;
use validator::Validate;

use super::{denied_page, error_fragment, hx_redirect};
use crate::models::maintenance::sort_for_display;
use crate::models::{Capability, MaintenanceDetails, NewMaintenanceRequest, ReportChannel, Room};
use crate::session::{Access, SessionContext};
use crate::AppState;

#[derive(Deserialize)]
pub struct MaintenanceForm {
    pub room_id: String,
    pub title: String,
    #[serde(default)]
    pub note: String,
    /// One URL per line.
    #[serde(default)]
    pub image_urls: String,
    pub urgent: Option<String>,
    #[serde(default)]
    pub reported_via: ReportChannel,
}

impl MaintenanceForm {
    fn into_request(self) -> NewMaintenanceRequest {
        NewMaintenanceRequest {
            room_id: self.room_id.trim().to_string(),
            title: self.title.trim().to_string(),
            note: self.note.trim().to_string(),
            details: MaintenanceDetails {
                image_urls: self
                    .image_urls
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
                urgent: self.urgent.is_some(),
                reported_via: self.reported_via,
            },
        }
    }
}

pub struct TicketRow {
    pub room: String,
    pub title: String,
    pub note: String,
    pub image_urls: Vec<String>,
    pub urgent: bool,
    pub reported_via: &'static str,
    pub status: &'static str,
    pub created_at: String,
}

pub struct RoomOption {
    pub id: String,
    pub number: String,
}

#[derive(Template)]
#[template(path = "maintenance.html")]
pub struct MaintenanceTemplate {
    pub current_page: &'static str,
    pub tickets: Vec<TicketRow>,
    pub rooms: Vec<RoomOption>,
    pub error: Option<String>,
}

fn room_options(rooms: &[Room]) -> Vec<RoomOption> {
    let mut options: Vec<RoomOption> = rooms
        .iter()
        .map(|r| RoomOption {
            id: r.id.clone(),
            number: r.number.clone(),
        })
        .collect();
    options.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.id.cmp(&b.id)));
    options
}

pub async fn maintenance_page(
    State(state): State<AppState>,
    ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
) -> Response {
    let api = state.api_for(&ctx, request_id.as_ref().map(|Extension(id)| id));
    if ctx.authorize(Capability::Maintenance, &api).await == Access::Denied {
        return denied_page(Capability::Maintenance, "maintenance");
    }

    let (tickets, rooms, error) =
        match tokio::try_join!(api.list_maintenance(), api.list_rooms()) {
            Ok((mut tickets, rooms)) => {
                sort_for_display(&mut tickets);
                let numbers: HashMap<&str, &str> = rooms
                    .iter()
                    .map(|r| (r.id.as_str(), r.number.as_str()))
                    .collect();
                let rows = tickets
                    .into_iter()
                    .map(|t| TicketRow {
                        room: numbers
                            .get(t.room_id.as_str())
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| t.room_id.clone()),
                        title: t.title,
                        note: t.note,
                        image_urls: t.details.image_urls,
                        urgent: t.details.urgent,
                        reported_via: t.details.reported_via.as_str(),
                        status: t.status.as_str(),
                        created_at: t
                            .created_at
                            .with_timezone(&Local)
                            .format("%d/%m/%Y %H:%M")
                            .to_string(),
                    })
                    .collect();
                (rows, room_options(&rooms), None)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load maintenance tickets");
                (
                    Vec::new(),
                    Vec::new(),
                    Some(format!("Could not load maintenance tickets: {}", e)),
                )
            }
        };

    MaintenanceTemplate {
        current_page: "maintenance",
        tickets,
        rooms,
        error,
    }
    .into_response()
}

pub async fn create_maintenance(
    State(state): State<AppState>,
    ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Form(form): Form<MaintenanceForm>,
) -> Response {
    let api = state.api_for(&ctx, request_id.as_ref().map(|Extension(id)| id));
    if ctx.authorize(Capability::Maintenance, &api).await == Access::Denied {
        return error_fragment(
            StatusCode::FORBIDDEN,
            "You do not have access to maintenance tickets",
        );
    }

    let request = form.into_request();
    if let Err(errors) = request.validate() {
        tracing::info!(error = %errors, "Maintenance ticket rejected");
        return error_fragment(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Please choose a room, give a title and use http(s) links for images",
        );
    }

    match api.create_maintenance(&request).await {
        Ok(ticket) => {
            tracing::info!(
                ticket_id = %ticket.id,
                room_id = %request.room_id,
                urgent = request.details.urgent,
                "Maintenance ticket created"
            );
            hx_redirect("/maintenance")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create maintenance ticket");
            error_fragment(
                StatusCode::BAD_GATEWAY,
                &format!("Could not create the ticket: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_urls_are_split_per_line_and_blank_lines_dropped() {
        let form = MaintenanceForm {
            room_id: " r1 ".into(),
            title: "Leak".into(),
            note: String::new(),
            image_urls: "https://a.example/1.jpg\n\n  https://a.example/2.jpg  \r\n".into(),
            urgent: Some("on".into()),
            reported_via: ReportChannel::WalkIn,
        };

        let request = form.into_request();
        assert_eq!(request.room_id, "r1");
        assert_eq!(
            request.details.image_urls,
            vec!["https://a.example/1.jpg", "https://a.example/2.jpg"]
        );
        assert!(request.details.urgent);
        assert!(request.validate().is_ok());
    }
}
