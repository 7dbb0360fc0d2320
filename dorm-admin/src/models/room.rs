use serde::{Deserialize, Serialize};

use super::de::{flexible_f64, id_string, optional_f64};

/// Room occupancy status as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Vacant,
    Occupied,
    Maintenance,
    Overdue,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Vacant => "vacant",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
            RoomStatus::Overdue => "overdue",
            RoomStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    /// Display number, e.g. "101" or "A12".
    #[serde(alias = "roomNumber", deserialize_with = "id_string")]
    pub number: String,
    #[serde(default)]
    pub floor: i32,
    #[serde(deserialize_with = "id_string")]
    pub building_id: String,
    #[serde(default)]
    pub status: RoomStatus,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub monthly_price: f64,
    /// Per-room overrides of the building's utility prices.
    #[serde(default, deserialize_with = "optional_f64")]
    pub water_rate: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub electric_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub floors: u32,
}

impl Building {
    pub fn label(&self) -> String {
        match self.code.as_deref().filter(|c| !c.is_empty()) {
            Some(code) if code != self.name => format!("{} ({})", self.name, code),
            _ => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_accepts_numeric_ids_and_string_amounts() {
        let room: Room = serde_json::from_value(serde_json::json!({
            "id": 12,
            "roomNumber": 101,
            "floor": 1,
            "buildingId": "b-1",
            "status": "occupied",
            "monthlyPrice": "3500.00",
            "waterRate": null,
            "electricRate": 8
        }))
        .unwrap();

        assert_eq!(room.id, "12");
        assert_eq!(room.number, "101");
        assert_eq!(room.status, RoomStatus::Occupied);
        assert_eq!(room.monthly_price, 3500.0);
        assert_eq!(room.water_rate, None);
        assert_eq!(room.electric_rate, Some(8.0));
    }

    #[test]
    fn unknown_status_does_not_fail() {
        let room: Room = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "number": "A1",
            "buildingId": "b1",
            "status": "reserved"
        }))
        .unwrap();

        assert_eq!(room.status, RoomStatus::Unknown);
        assert_eq!(room.floor, 0);
    }

    #[test]
    fn building_label_includes_distinct_code() {
        let building = Building {
            id: "b1".into(),
            name: "Main".into(),
            code: Some("M".into()),
            floors: 4,
        };
        assert_eq!(building.label(), "Main (M)");
    }
}
