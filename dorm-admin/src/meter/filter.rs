use std::cmp::Ordering;
use std::collections::HashMap;

use super::form::MeterForm;
use crate::models::{ActiveContracts, Building, Room};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub search: String,
    /// `None` shows every building.
    pub building_id: Option<String>,
    pub only_incomplete: bool,
}

impl RoomFilter {
    fn needle(&self) -> Option<String> {
        let trimmed = self.search.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
    }
}

/// Buildings whose name contains one of these patterns are secondary
/// ("annex") buildings and are listed after the others.
#[derive(Debug, Clone)]
pub struct AnnexRule {
    patterns: Vec<String>,
}

impl AnnexRule {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    pub fn is_annex(&self, building: &Building) -> bool {
        let name = building.name.to_lowercase();
        self.patterns.iter().any(|p| name.contains(p.as_str()))
    }
}

impl Default for AnnexRule {
    fn default() -> Self {
        Self::new(["annex"])
    }
}

/// Rooms of one building, in display order. `building` is `None` for rooms
/// whose building is missing from the building list.
#[derive(Debug, Clone)]
pub struct RoomGroup<'a> {
    pub building_id: String,
    pub building: Option<&'a Building>,
    pub rooms: Vec<&'a Room>,
}

impl RoomGroup<'_> {
    pub fn label(&self) -> String {
        match self.building {
            Some(building) => building.label(),
            None => self.building_id.clone(),
        }
    }
}

/// Filter, sort and group rooms for display. Pure and deterministic: the
/// same inputs always yield the same order regardless of input order.
pub fn visible_rooms<'a>(
    rooms: &'a [Room],
    buildings: &'a [Building],
    contracts: &ActiveContracts,
    form: &MeterForm,
    filter: &RoomFilter,
    annex: &AnnexRule,
) -> Vec<RoomGroup<'a>> {
    let by_id: HashMap<&str, &Building> = buildings.iter().map(|b| (b.id.as_str(), b)).collect();
    let needle = filter.needle();
    let selected = filter
        .building_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let mut grouped: HashMap<&str, Vec<&Room>> = HashMap::new();
    for room in rooms {
        if let Some(selected) = selected {
            if room.building_id != selected {
                continue;
            }
        }
        if filter.only_incomplete && form.is_complete(&room.id) {
            continue;
        }
        if let Some(needle) = &needle {
            let building = by_id.get(room.building_id.as_str()).copied();
            if !matches_search(room, building, contracts, needle) {
                continue;
            }
        }
        grouped.entry(room.building_id.as_str()).or_default().push(room);
    }

    let mut groups: Vec<RoomGroup<'a>> = grouped
        .into_iter()
        .map(|(building_id, mut rooms)| {
            rooms.sort_by(|a, b| compare_rooms(a, b));
            RoomGroup {
                building_id: building_id.to_string(),
                building: by_id.get(building_id).copied(),
                rooms,
            }
        })
        .collect();

    groups.sort_by(|a, b| compare_groups(a, b, annex));
    groups
}

fn matches_search(
    room: &Room,
    building: Option<&Building>,
    contracts: &ActiveContracts,
    needle: &str,
) -> bool {
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);

    contracts.tenant_name(&room.id).is_some_and(contains)
        || contains(&room.number)
        || building.is_some_and(|b| {
            contains(&b.name) || b.code.as_deref().is_some_and(contains)
        })
}

/// Case-folded comparison, ties broken by the raw text.
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Numeric room numbers ascend by value and come before non-numeric ones.
fn compare_room_numbers(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => compare_text(a, b),
    }
}

fn compare_rooms(a: &Room, b: &Room) -> Ordering {
    a.floor
        .cmp(&b.floor)
        .then_with(|| compare_room_numbers(&a.number, &b.number))
        .then_with(|| a.id.cmp(&b.id))
}

fn group_rank(group: &RoomGroup<'_>, annex: &AnnexRule) -> u8 {
    match group.building {
        Some(building) if annex.is_annex(building) => 1,
        Some(_) => 0,
        None => 2,
    }
}

fn compare_groups(a: &RoomGroup<'_>, b: &RoomGroup<'_>, annex: &AnnexRule) -> Ordering {
    group_rank(a, annex)
        .cmp(&group_rank(b, annex))
        .then_with(|| match (a.building, b.building) {
            (Some(x), Some(y)) => compare_text(&x.name, &y.name),
            _ => Ordering::Equal,
        })
        .then_with(|| a.building_id.cmp(&b.building_id))
}
