pub mod app;
pub mod auth;
pub mod chats;
pub mod dashboard;
pub mod invoices;
pub mod maintenance;
pub mod meter;
pub mod metrics;
pub mod rooms;

use askama::Template;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::models::Capability;

#[derive(Template)]
#[template(path = "partials/error.html")]
pub struct ErrorFragment<'a> {
    pub message: &'a str,
}

#[derive(Template)]
#[template(path = "denied.html")]
pub struct DeniedTemplate {
    pub capability: &'static str,
    pub current_page: &'static str,
}

pub struct MonthOption {
    pub value: u32,
    pub selected: bool,
}

pub fn month_options(selected: u32) -> Vec<MonthOption> {
    (1..=12)
        .map(|value| MonthOption {
            value,
            selected: value == selected,
        })
        .collect()
}

/// Inline error for htmx targets.
pub fn error_fragment(status: StatusCode, message: &str) -> Response {
    (status, ErrorFragment { message }).into_response()
}

/// Full-page navigation for htmx requests.
pub fn hx_redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::OK, [("HX-Redirect", value)]).into_response(),
        Err(_) => {
            tracing::error!(location, "Invalid redirect location");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn denied_page(capability: Capability, current_page: &'static str) -> Response {
    tracing::info!(capability = capability.as_str(), "Access denied");
    (
        StatusCode::FORBIDDEN,
        DeniedTemplate {
            capability: capability.as_str(),
            current_page,
        },
    )
        .into_response()
}
