use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::de::{flexible_f64, id_string};
use super::BillingPeriod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub room_id: String,
    pub month: u32,
    pub year: i32,
    #[serde(deserialize_with = "flexible_f64")]
    pub water_reading: f64,
    #[serde(deserialize_with = "flexible_f64")]
    pub electric_reading: f64,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /meter-readings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeterReading {
    pub room_id: String,
    pub month: u32,
    pub year: i32,
    pub water_reading: f64,
    pub electric_reading: f64,
}

/// Query of `GET /meter-readings`; unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReadingQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl MeterReadingQuery {
    pub fn for_period(period: BillingPeriod) -> Self {
        Self {
            room_id: None,
            month: Some(period.month()),
            year: Some(period.year()),
        }
    }
}
