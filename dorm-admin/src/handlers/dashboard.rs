use askama::Template;
use axum::{extract::State, response::IntoResponse, Extension};
use service_core::middleware::RequestId;

use crate::models::{BillingPeriod, Capability, MaintenanceStatus, RoomStatus, StaffProfile};
use crate::session::SessionContext;
use crate::AppState;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub staff_name: String,
    pub initials: String,
    pub role: &'static str,
    pub current_page: &'static str,
    pub period: String,
    pub month: u32,
    pub year: i32,
    pub total_rooms: usize,
    pub occupied_rooms: usize,
    pub vacant_rooms: usize,
    pub open_tickets: usize,
    pub can_meter: bool,
    pub can_chat: bool,
    pub error: Option<String>,
}

pub async fn dashboard_handler(
    State(state): State<AppState>,
    mut ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
) -> impl IntoResponse {
    if let Err(e) = ctx.refresh(&state.api).await {
        tracing::warn!(error = %e, "Could not refresh staff profile");
    }

    let api = state.api_for(&ctx, request_id.as_ref().map(|Extension(id)| id));
    let (rooms, tickets) = tokio::join!(api.list_rooms(), api.list_maintenance());

    let mut errors = Vec::new();
    let rooms = rooms.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load rooms");
        errors.push("rooms");
        Vec::new()
    });
    let open_tickets = match tickets {
        Ok(tickets) => tickets
            .iter()
            .filter(|t| t.status != MaintenanceStatus::Resolved)
            .count(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load maintenance tickets");
            errors.push("maintenance tickets");
            0
        }
    };

    let count = |status: RoomStatus| rooms.iter().filter(|r| r.status == status).count();
    let fallback = StaffProfile {
        id: String::new(),
        username: "staff".to_string(),
        display_name: None,
        role: Default::default(),
        permissions: Vec::new(),
    };
    let profile = ctx.profile().unwrap_or(&fallback);
    let period = BillingPeriod::current();

    DashboardTemplate {
        staff_name: profile.name().to_string(),
        initials: profile.initials(),
        role: profile.role.as_str(),
        current_page: "dashboard",
        period: period.to_string(),
        month: period.month(),
        year: period.year(),
        total_rooms: rooms.len(),
        occupied_rooms: count(RoomStatus::Occupied) + count(RoomStatus::Overdue),
        vacant_rooms: count(RoomStatus::Vacant),
        open_tickets,
        can_meter: profile.can(Capability::Meter),
        can_chat: profile.can(Capability::Chat),
        error: (!errors.is_empty()).then(|| format!("Could not load {}", errors.join(" and "))),
    }
}
