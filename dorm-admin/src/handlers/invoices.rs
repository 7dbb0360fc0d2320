use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;
use service_core::error::AppError;
use service_core::middleware::RequestId;
use std::collections::HashMap;

use super::{denied_page, month_options, MonthOption};
use crate::models::{BillingPeriod, Capability};
use crate::session::{Access, SessionContext};
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct InvoicesQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
    /// Summary of the meter batch that redirected here.
    pub created: Option<usize>,
    pub generated: Option<usize>,
    pub failed: Option<usize>,
}

pub struct InvoiceRow {
    pub room: String,
    pub amount: String,
    pub status: &'static str,
}

pub struct BatchBanner {
    pub created: usize,
    pub generated: usize,
    pub failed: usize,
}

#[derive(Template)]
#[template(path = "invoices.html")]
pub struct InvoicesTemplate {
    pub current_page: &'static str,
    pub period: String,
    pub month: u32,
    pub year: i32,
    pub months: Vec<MonthOption>,
    pub rows: Vec<InvoiceRow>,
    pub total: String,
    pub banner: Option<BatchBanner>,
    pub error: Option<String>,
}

pub async fn invoices_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Query(query): Query<InvoicesQuery>,
) -> Response {
    let api = state.api_for(&ctx, request_id.as_ref().map(|Extension(id)| id));
    if ctx.authorize(Capability::Invoices, &api).await == Access::Denied {
        return denied_page(Capability::Invoices, "invoices");
    }

    let period = match BillingPeriod::from_parts(query.month, query.year) {
        Ok(period) => period,
        Err(e) => return AppError::BadRequest(anyhow::Error::new(e)).into_response(),
    };

    let (rows, total, error) = match tokio::try_join!(api.list_invoices(period), api.list_rooms()) {
        Ok((invoices, rooms)) => {
            let numbers: HashMap<&str, &str> = rooms
                .iter()
                .map(|r| (r.id.as_str(), r.number.as_str()))
                .collect();
            let total: f64 = invoices.iter().map(|i| i.total_amount).sum();
            let mut rows: Vec<(String, InvoiceRow)> = invoices
                .iter()
                .map(|invoice| {
                    let room = numbers
                        .get(invoice.room_id.as_str())
                        .copied()
                        .unwrap_or(invoice.room_id.as_str())
                        .to_string();
                    (
                        invoice.id.clone(),
                        InvoiceRow {
                            room,
                            amount: format!("{:.2}", invoice.total_amount),
                            status: invoice.status.as_str(),
                        },
                    )
                })
                .collect();
            rows.sort_by(|(a_id, a), (b_id, b)| a.room.cmp(&b.room).then_with(|| a_id.cmp(b_id)));
            (
                rows.into_iter().map(|(_, row)| row).collect(),
                format!("{:.2}", total),
                None,
            )
        }
        Err(e) => {
            tracing::error!(error = %e, period = %period, "Failed to load invoices");
            (
                Vec::new(),
                "-".to_string(),
                Some(format!("Could not load invoices: {}", e)),
            )
        }
    };

    let banner = query.created.map(|created| BatchBanner {
        created,
        generated: query.generated.unwrap_or(0),
        failed: query.failed.unwrap_or(0),
    });

    InvoicesTemplate {
        current_page: "invoices",
        period: period.to_string(),
        month: period.month(),
        year: period.year(),
        months: month_options(period.month()),
        rows,
        total,
        banner,
        error,
    }
    .into_response()
}
