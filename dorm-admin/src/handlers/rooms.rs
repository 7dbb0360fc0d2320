use askama::Template;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension,
};
use serde::Deserialize;
use service_core::middleware::RequestId;

use crate::meter::{visible_rooms, MeterForm, RoomFilter};
use crate::models::{ActiveContracts, Building};
use crate::session::SessionContext;
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct RoomsQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub building_id: Option<String>,
}

pub struct RoomRow {
    pub number: String,
    pub floor: i32,
    pub status: &'static str,
    pub tenant: String,
    pub monthly_price: String,
}

pub struct RoomSection {
    pub label: String,
    pub rows: Vec<RoomRow>,
}

#[derive(Template)]
#[template(path = "rooms.html")]
pub struct RoomsTemplate {
    pub current_page: &'static str,
    pub sections: Vec<RoomSection>,
    pub buildings: Vec<Building>,
    pub search: String,
    pub building_id: String,
    pub error: Option<String>,
}

pub async fn rooms_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
    request_id: Option<Extension<RequestId>>,
    Query(query): Query<RoomsQuery>,
) -> impl IntoResponse {
    let api = state.api_for(&ctx, request_id.as_ref().map(|Extension(id)| id));
    let filter = RoomFilter {
        search: query.search.clone(),
        building_id: query.building_id.clone(),
        only_incomplete: false,
    };

    let loaded = tokio::try_join!(api.list_rooms(), api.list_buildings(), api.list_contracts());
    let (rooms, buildings, contracts) = match loaded {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load rooms");
            return RoomsTemplate {
                current_page: "rooms",
                sections: Vec::new(),
                buildings: Vec::new(),
                search: query.search,
                building_id: query.building_id.unwrap_or_default(),
                error: Some(format!("Could not load rooms: {}", e)),
            };
        }
    };
    let contracts = ActiveContracts::new(contracts);

    let sections = visible_rooms(
        &rooms,
        &buildings,
        &contracts,
        &MeterForm::default(),
        &filter,
        &state.annex,
    )
    .iter()
    .map(|group| RoomSection {
        label: group.label(),
        rows: group
            .rooms
            .iter()
            .map(|room| RoomRow {
                number: room.number.clone(),
                floor: room.floor,
                status: room.status.as_str(),
                tenant: contracts.tenant_name(&room.id).unwrap_or("-").to_string(),
                monthly_price: format!("{:.2}", room.monthly_price),
            })
            .collect(),
    })
    .collect();

    RoomsTemplate {
        current_page: "rooms",
        sections,
        buildings,
        search: query.search,
        building_id: query.building_id.unwrap_or_default(),
        error: None,
    }
}
