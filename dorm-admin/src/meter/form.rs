use std::collections::HashMap;

use super::filter::RoomFilter;
use super::usage::Utility;
use crate::models::{BillingPeriod, MeterReading, PeriodError};

/// What staff typed for one room; kept as text until submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingInput {
    pub water: String,
    pub electric: String,
}

impl ReadingInput {
    pub fn value(&self, utility: Utility) -> &str {
        match utility {
            Utility::Water => &self.water,
            Utility::Electric => &self.electric,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.water.trim().is_empty() && !self.electric.trim().is_empty()
    }
}

/// Current-period inputs keyed by room id.
#[derive(Debug, Clone, Default)]
pub struct MeterForm {
    inputs: HashMap<String, ReadingInput>,
}

impl MeterForm {
    pub fn input(&self, room_id: &str) -> ReadingInput {
        self.inputs.get(room_id).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, room_id: &str, utility: Utility, value: impl Into<String>) {
        let entry = self.inputs.entry(room_id.to_string()).or_default();
        match utility {
            Utility::Water => entry.water = value.into(),
            Utility::Electric => entry.electric = value.into(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ReadingInput)> {
        self.inputs.iter().map(|(id, input)| (id.as_str(), input))
    }

    pub fn is_complete(&self, room_id: &str) -> bool {
        self.inputs
            .get(room_id)
            .map(ReadingInput::is_complete)
            .unwrap_or(false)
    }

    /// Accepts `water_<roomId>` / `electric_<roomId>` fields; returns false
    /// for any other key.
    fn accept(&mut self, key: &str, value: &str) -> bool {
        for utility in [Utility::Water, Utility::Electric] {
            if let Some(room_id) = key.strip_prefix(utility.field_prefix()) {
                if !room_id.is_empty() {
                    self.set(room_id, utility, value);
                    return true;
                }
            }
        }
        false
    }
}

/// Everything the meter page posts: period, filter, readings and the
/// confirmation flag of the save step.
#[derive(Debug, Clone)]
pub struct MeterFormFields {
    pub period: BillingPeriod,
    pub filter: RoomFilter,
    pub form: MeterForm,
    pub confirmed: bool,
}

impl MeterFormFields {
    pub fn parse<I>(fields: I) -> Result<Self, PeriodError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut form = MeterForm::default();
        let mut filter = RoomFilter::default();
        let mut month = None;
        let mut year = None;
        let mut confirmed = false;

        for (key, value) in fields {
            if form.accept(&key, &value) {
                continue;
            }
            match key.as_str() {
                "month" => month = value.trim().parse().ok(),
                "year" => year = value.trim().parse().ok(),
                "search" => filter.search = value,
                "building_id" => {
                    filter.building_id = Some(value).filter(|v| !v.trim().is_empty())
                }
                "only_incomplete" => filter.only_incomplete = is_checked(&value),
                "confirmed" => confirmed = is_checked(&value),
                _ => {}
            }
        }

        Ok(Self {
            period: BillingPeriod::from_parts(month, year)?,
            filter,
            form,
            confirmed,
        })
    }
}

/// Checkbox semantics shared by form posts and query strings.
pub(crate) fn is_checked(value: &str) -> bool {
    matches!(value.trim(), "on" | "true" | "1" | "yes")
}

/// Previous-period readings, one per room: the most recently created.
#[derive(Debug, Clone, Default)]
pub struct PreviousReadings {
    by_room: HashMap<String, MeterReading>,
}

impl PreviousReadings {
    pub fn from_readings(readings: Vec<MeterReading>) -> Self {
        let mut by_room: HashMap<String, MeterReading> = HashMap::new();
        for reading in readings {
            match by_room.get(&reading.room_id) {
                Some(existing) if existing.created_at >= reading.created_at => {}
                _ => {
                    by_room.insert(reading.room_id.clone(), reading);
                }
            }
        }
        Self { by_room }
    }

    pub fn get(&self, room_id: &str) -> Option<&MeterReading> {
        self.by_room.get(room_id)
    }

    pub fn value(&self, room_id: &str, utility: Utility) -> Option<f64> {
        self.get(room_id).map(|r| match utility {
            Utility::Water => r.water_reading,
            Utility::Electric => r.electric_reading,
        })
    }
}
