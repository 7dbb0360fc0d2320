use super::filter::{AnnexRule, RoomGroup};
use super::form::{MeterForm, PreviousReadings};
use super::usage::{format_units, UsageDelta, Utility};
use crate::models::ActiveContracts;

/// One table row of the meter page, with every cell already rendered to text.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterRow {
    pub room_id: String,
    pub room_number: String,
    pub floor: i32,
    pub tenant: String,
    pub has_contract: bool,
    pub previous_water: String,
    pub previous_electric: String,
    pub water_input: String,
    pub electric_input: String,
    pub water_delta: String,
    pub electric_delta: String,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingSection {
    pub building_id: String,
    pub label: String,
    pub annex: bool,
    pub rows: Vec<MeterRow>,
}

pub fn meter_sections(
    groups: &[RoomGroup<'_>],
    contracts: &ActiveContracts,
    previous: &PreviousReadings,
    form: &MeterForm,
    annex: &AnnexRule,
) -> Vec<BuildingSection> {
    groups
        .iter()
        .map(|group| BuildingSection {
            building_id: group.building_id.clone(),
            label: group.label(),
            annex: group.building.is_some_and(|b| annex.is_annex(b)),
            rows: group
                .rooms
                .iter()
                .map(|room| {
                    let input = form.input(&room.id);
                    let prev_water = previous.value(&room.id, Utility::Water);
                    let prev_electric = previous.value(&room.id, Utility::Electric);

                    MeterRow {
                        room_id: room.id.clone(),
                        room_number: room.number.clone(),
                        floor: room.floor,
                        tenant: contracts
                            .tenant_name(&room.id)
                            .unwrap_or("-")
                            .to_string(),
                        has_contract: contracts.has_active(&room.id),
                        previous_water: prev_water.map(format_units).unwrap_or_else(dash),
                        previous_electric: prev_electric
                            .map(format_units)
                            .unwrap_or_else(dash),
                        water_delta: UsageDelta::compute(prev_water, &input.water).to_string(),
                        electric_delta: UsageDelta::compute(prev_electric, &input.electric)
                            .to_string(),
                        complete: input.is_complete(),
                        water_input: input.water,
                        electric_input: input.electric,
                    }
                })
                .collect(),
        })
        .collect()
}

fn dash() -> String {
    "-".to_string()
}
