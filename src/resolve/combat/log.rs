//! Stored combat logs, retrievable by id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::info::{CombatEvent, CombatInfo};
use crate::universe::{EmpireId, ObjectId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatLog {
    pub id: u64,
    pub turn: i32,
    pub system: ObjectId,
    pub empires: BTreeSet<EmpireId>,
    pub participants: Vec<ObjectId>,
    pub destroyed: Vec<ObjectId>,
    pub events: Vec<CombatEvent>,
}

impl CombatLog {
    fn from_info(id: u64, info: &CombatInfo) -> Self {
        CombatLog {
            id,
            turn: info.turn,
            system: info.system,
            empires: info.empires(),
            participants: info.objects.keys().copied().collect(),
            destroyed: info.destroyed.iter().copied().collect(),
            events: info.events.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatLogManager {
    logs: BTreeMap<u64, CombatLog>,
    next_id: u64,
}

impl CombatLogManager {
    pub fn new() -> Self {
        CombatLogManager::default()
    }

    /// Files a summary of `info` and returns its new log id.
    pub fn add(&mut self, info: &CombatInfo) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.logs.insert(id, CombatLog::from_info(id, info));
        id
    }

    pub fn get(&self, id: u64) -> Option<&CombatLog> {
        self.logs.get(&id)
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Ids of logs for battles `empire` took part in, ascending.
    pub fn ids_for_empire(&self, empire: EmpireId) -> Vec<u64> {
        self.logs
            .values()
            .filter(|log| log.empires.contains(&empire))
            .map(|log| log.id)
            .collect()
    }
}
