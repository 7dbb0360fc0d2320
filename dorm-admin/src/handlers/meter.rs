use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;
use service_core::error::AppError;
use service_core::middleware::RequestId;
use uuid::Uuid;

use super::{denied_page, error_fragment, hx_redirect, month_options, MonthOption};
use crate::meter::{
    meter_sections, visible_rooms, BatchError, BatchPlan, BatchProgress, BatchStatus,
    BuildingSection, MeterForm, MeterFormFields, PreConfirmed, PreviousReadings, RoomFilter,
};
use crate::meter::form::is_checked;
use crate::models::{ActiveContracts, BillingPeriod, Building, Capability, MeterReadingQuery, Room};
use crate::services::{ApiClient, ApiError};
use crate::session::{Access, SessionContext};
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct MeterQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
    #[serde(rename = "lineUserId")]
    pub line_user_id: Option<String>,
    #[serde(default)]
    pub search: String,
    pub building_id: Option<String>,
    pub only_incomplete: Option<String>,
}

impl MeterQuery {
    fn room_filter(&self) -> RoomFilter {
        RoomFilter {
            search: self.search.clone(),
            building_id: self.building_id.clone().filter(|id| !id.trim().is_empty()),
            only_incomplete: self.only_incomplete.as_deref().is_some_and(is_checked),
        }
    }
}

pub struct HiddenInput {
    pub name: String,
    pub value: String,
}

#[derive(Template)]
#[template(path = "meter.html")]
pub struct MeterTemplate {
    pub current_page: &'static str,
    pub period: String,
    pub previous_period: String,
    pub month: u32,
    pub year: i32,
    pub months: Vec<MonthOption>,
    pub buildings: Vec<Building>,
    pub search: String,
    pub building_id: String,
    pub only_incomplete: bool,
    pub sections: Vec<BuildingSection>,
    pub hidden_inputs: Vec<HiddenInput>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "partials/meter_rows.html")]
pub struct MeterRowsFragment {
    pub sections: Vec<BuildingSection>,
    pub hidden_inputs: Vec<HiddenInput>,
}

#[derive(Template)]
#[template(path = "partials/batch_confirm.html")]
pub struct BatchConfirmFragment {
    pub count: usize,
    pub period: String,
    pub room_numbers: Vec<String>,
}

#[derive(Template)]
#[template(path = "partials/batch_progress.html")]
pub struct BatchProgressFragment {
    pub id: Uuid,
    pub percent: u8,
    pub completed: usize,
    pub total: usize,
    pub readings_created: usize,
    pub invoices_generated: usize,
    pub invoice_failures: usize,
    pub running: bool,
    pub error: Option<String>,
}

impl BatchProgressFragment {
    fn new(id: Uuid, progress: &BatchProgress) -> Self {
        let error = match &progress.status {
            BatchStatus::Aborted { message, .. } => Some(message.clone()),
            _ => None,
        };
        Self {
            id,
            percent: progress.percent(),
            completed: progress.completed,
            total: progress.total,
            readings_created: progress.readings_created,
            invoices_generated: progress.invoices_generated,
            invoice_failures: progress.invoice_failures,
            running: !progress.status.is_finished(),
            error,
        }
    }
}

/// Everything the meter page needs from the backend.
struct MeterData {
    rooms: Vec<Room>,
    buildings: Vec<Building>,
    contracts: ActiveContracts,
    previous: PreviousReadings,
}

async fn load_meter_data(api: &ApiClient, period: BillingPeriod) -> Result<MeterData, ApiError> {
    let previous_query = MeterReadingQuery::for_period(period.previous());
    let (rooms, buildings, contracts, previous) = tokio::try_join!(
        api.list_rooms(),
        api.list_buildings(),
        api.list_contracts(),
        api.list_meter_readings(&previous_query),
    )?;

    Ok(MeterData {
        rooms,
        buildings,
        contracts: ActiveContracts::new(contracts),
        previous: PreviousReadings::from_readings(previous),
    })
}

/// Inputs of rooms the current filter hides, so they survive a re-render.
fn hidden_inputs(form: &MeterForm, sections: &[BuildingSection]) -> Vec<HiddenInput> {
    let mut hidden: Vec<HiddenInput> = form
        .entries()
        .filter(|(room_id, _)| {
            !sections
                .iter()
                .any(|s| s.rows.iter().any(|r| r.room_id == *room_id))
        })
        .flat_map(|(room_id, input)| {
            [
                HiddenInput {
                    name: format!("water_{}", room_id),
                    value: input.water.clone(),
                },
                HiddenInput {
                    name: format!("electric_{}", room_id),
                    value: input.electric.clone(),
                },
            ]
        })
        .filter(|h| !h.value.is_empty())
        .collect();
    hidden.sort_by(|a, b| a.name.cmp(&b.name));
    hidden
}

fn render_sections(
    state: &AppState,
    data: &MeterData,
    form: &MeterForm,
    filter: &RoomFilter,
) -> Vec<BuildingSection> {
    let groups = visible_rooms(
        &data.rooms,
        &data.buildings,
        &data.contracts,
        form,
        filter,
        &state.annex,
    );
    meter_sections(&groups, &data.contracts, &data.previous, form, &state.annex)
}

fn request_id_of(request_id: &Option<Extension<RequestId>>) -> Option<&RequestId> {
    request_id.as_ref().map(|Extension(id)| id)
}

pub async fn meter_page(
    State(state): State<AppState>,
    mut ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Query(query): Query<MeterQuery>,
) -> Response {
    if let Some(line_user_id) = query.line_user_id.as_deref() {
        if let Err(e) = ctx.remember_line_user(line_user_id).await {
            tracing::error!(error = %e, "Failed to remember LINE user");
        }
    }
    if !ctx.is_signed_in() && ctx.line_user_id().is_none() {
        return Redirect::to("/login").into_response();
    }

    let api = state.api_for(&ctx, request_id_of(&request_id));
    if ctx.authorize(Capability::Meter, &api).await == Access::Denied {
        return denied_page(Capability::Meter, "meter");
    }

    let period = match BillingPeriod::from_parts(query.month, query.year) {
        Ok(period) => period,
        Err(e) => return AppError::BadRequest(anyhow::Error::new(e)).into_response(),
    };
    let filter = query.room_filter();

    let (sections, buildings, error) = match load_meter_data(&api, period).await {
        Ok(data) => {
            let sections = render_sections(&state, &data, &MeterForm::default(), &filter);
            (sections, data.buildings, None)
        }
        Err(e) => {
            tracing::error!(error = %e, period = %period, "Failed to load meter page data");
            (
                Vec::new(),
                Vec::new(),
                Some(format!("Could not load rooms and readings: {}", e)),
            )
        }
    };

    MeterTemplate {
        current_page: "meter",
        period: period.to_string(),
        previous_period: period.previous().to_string(),
        month: period.month(),
        year: period.year(),
        months: month_options(period.month()),
        buildings,
        search: filter.search,
        building_id: filter.building_id.unwrap_or_default(),
        only_incomplete: filter.only_incomplete,
        sections,
        hidden_inputs: Vec::new(),
        error,
    }
    .into_response()
}

/// Shared prologue of the meter POST endpoints: gate, parse, load.
async fn prepare(
    state: &AppState,
    ctx: &SessionContext,
    request_id: Option<&RequestId>,
    fields: Vec<(String, String)>,
) -> Result<(ApiClient, MeterFormFields, MeterData), Response> {
    let api = state.api_for(ctx, request_id);
    if ctx.authorize(Capability::Meter, &api).await == Access::Denied {
        return Err(error_fragment(
            StatusCode::FORBIDDEN,
            "You do not have access to meter readings",
        ));
    }

    let fields = MeterFormFields::parse(fields)
        .map_err(|e| error_fragment(StatusCode::BAD_REQUEST, &e.to_string()))?;

    let data = load_meter_data(&api, fields.period).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to load meter data");
        error_fragment(
            StatusCode::BAD_GATEWAY,
            &format!("Could not load rooms and readings: {}", e),
        )
    })?;

    Ok((api, fields, data))
}

pub async fn meter_rows(
    State(state): State<AppState>,
    ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let (_, fields, data) = match prepare(&state, &ctx, request_id_of(&request_id), fields).await {
        Ok(prepared) => prepared,
        Err(response) => return response,
    };

    let sections = render_sections(&state, &data, &fields.form, &fields.filter);
    let hidden_inputs = hidden_inputs(&fields.form, &sections);
    MeterRowsFragment {
        sections,
        hidden_inputs,
    }
    .into_response()
}

fn plan_for(state: &AppState, data: &MeterData, fields: &MeterFormFields) -> Result<BatchPlan, BatchError> {
    let groups = visible_rooms(
        &data.rooms,
        &data.buildings,
        &data.contracts,
        &fields.form,
        &fields.filter,
        &state.annex,
    );
    BatchPlan::build(&groups, &fields.form, &data.contracts, fields.period)
}

fn plan_error(e: &BatchError) -> Response {
    tracing::info!(error = %e, "Meter batch rejected");
    match e {
        BatchError::NothingToSubmit => error_fragment(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Nothing to submit: fill in both readings for at least one room",
        ),
        BatchError::InvalidInput { .. } => {
            error_fragment(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string())
        }
        BatchError::NotConfirmed => error_fragment(
            StatusCode::BAD_REQUEST,
            "Please confirm before saving the readings",
        ),
        BatchError::ReadingFailed { .. } => error_fragment(StatusCode::BAD_GATEWAY, &e.to_string()),
    }
}

pub async fn batch_preview(
    State(state): State<AppState>,
    ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let (_, fields, data) = match prepare(&state, &ctx, request_id_of(&request_id), fields).await {
        Ok(prepared) => prepared,
        Err(response) => return response,
    };

    match plan_for(&state, &data, &fields) {
        Ok(plan) => BatchConfirmFragment {
            count: plan.len(),
            period: plan.period().to_string(),
            room_numbers: plan
                .candidates()
                .iter()
                .map(|c| c.room_number.clone())
                .collect(),
        }
        .into_response(),
        Err(e) => plan_error(&e),
    }
}

pub async fn start_batch(
    State(state): State<AppState>,
    ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let (api, fields, data) =
        match prepare(&state, &ctx, request_id_of(&request_id), fields).await {
            Ok(prepared) => prepared,
            Err(response) => return response,
        };

    let batch = match plan_for(&state, &data, &fields)
        .and_then(|plan| plan.confirm(&PreConfirmed(fields.confirmed)))
    {
        Ok(batch) => batch,
        Err(e) => return plan_error(&e),
    };

    let initial = batch.initial_progress();
    let id = state.batches.start(api, batch);
    tracing::info!(batch_id = %id, rooms = initial.total, period = %initial.period, "Meter batch started");

    BatchProgressFragment::new(id, &initial).into_response()
}

pub async fn batch_progress(
    State(state): State<AppState>,
    ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Path(id): Path<Uuid>,
) -> Response {
    let api = state.api_for(&ctx, request_id_of(&request_id));
    if ctx.authorize(Capability::Meter, &api).await == Access::Denied {
        return error_fragment(
            StatusCode::FORBIDDEN,
            "You do not have access to meter readings",
        );
    }

    let Some(progress) = state.batches.progress(&id) else {
        return error_fragment(StatusCode::NOT_FOUND, "This batch is no longer available");
    };

    if progress.status == BatchStatus::Completed {
        let summary = progress.summary();
        return hx_redirect(&format!(
            "/invoices?month={}&year={}&created={}&generated={}&failed={}",
            summary.period.month(),
            summary.period.year(),
            summary.readings_created,
            summary.invoices_generated,
            summary.invoice_failures,
        ));
    }

    BatchProgressFragment::new(id, &progress).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_checkbox_matches_form_checkbox() {
        for value in ["on", "true", "1", "yes"] {
            let query = MeterQuery {
                only_incomplete: Some(value.to_string()),
                ..MeterQuery::default()
            };
            assert!(query.room_filter().only_incomplete, "{value}");
        }

        let query = MeterQuery {
            only_incomplete: Some("off".to_string()),
            building_id: Some("  ".to_string()),
            ..MeterQuery::default()
        };
        let filter = query.room_filter();
        assert!(!filter.only_incomplete);
        assert_eq!(filter.building_id, None);
    }
}
