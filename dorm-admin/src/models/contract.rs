use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::de::id_string;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub room_id: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Active contracts indexed by room. When the backend reports more than one
/// active contract for a room, the first one listed wins.
#[derive(Debug, Clone, Default)]
pub struct ActiveContracts {
    by_room: HashMap<String, Contract>,
}

impl ActiveContracts {
    pub fn new(contracts: Vec<Contract>) -> Self {
        let mut by_room = HashMap::new();
        for contract in contracts.into_iter().filter(|c| c.is_active) {
            by_room.entry(contract.room_id.clone()).or_insert(contract);
        }
        Self { by_room }
    }

    pub fn has_active(&self, room_id: &str) -> bool {
        self.by_room.contains_key(room_id)
    }

    pub fn tenant_name(&self, room_id: &str) -> Option<&str> {
        self.by_room
            .get(room_id)
            .and_then(|c| c.tenant_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.by_room.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_room.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(id: &str, room: &str, tenant: &str, active: bool) -> Contract {
        Contract {
            id: id.into(),
            room_id: room.into(),
            tenant_name: Some(tenant.into()),
            is_active: active,
        }
    }

    #[test]
    fn inactive_contracts_are_ignored() {
        let contracts = ActiveContracts::new(vec![
            contract("c1", "r1", "Old Tenant", false),
            contract("c2", "r1", "Somchai", true),
            contract("c3", "r2", "Former", false),
        ]);

        assert!(contracts.has_active("r1"));
        assert!(!contracts.has_active("r2"));
        assert_eq!(contracts.tenant_name("r1"), Some("Somchai"));
        assert_eq!(contracts.len(), 1);
    }

    #[test]
    fn first_active_contract_wins() {
        let contracts = ActiveContracts::new(vec![
            contract("c1", "r1", "First", true),
            contract("c2", "r1", "Second", true),
        ]);
        assert_eq!(contracts.tenant_name("r1"), Some("First"));
    }
}
