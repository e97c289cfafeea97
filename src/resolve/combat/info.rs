//! The per-system combat working set.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::empire::EmpireManager;
use crate::universe::{is_detectable, EmpireId, ObjectId, ObjectKind, Universe, UniverseObject, Visibility};

/// One entry in a combat's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    WeaponFire {
        bout: u32,
        attacker: ObjectId,
        attacker_owner: Option<EmpireId>,
        target: ObjectId,
        target_owner: Option<EmpireId>,
        damage: f32,
    },
    Destroyed {
        bout: u32,
        object: ObjectId,
        owner: Option<EmpireId>,
    },
}

/// Snapshot of everything taking part in one battle. Resolvers mutate the
/// copies held here; the results are written back to the universe
/// afterwards.
#[derive(Debug, Clone)]
pub struct CombatInfo {
    pub system: ObjectId,
    pub turn: i32,
    /// Fleets, ships, and planets in the system, copied from the universe.
    pub objects: BTreeMap<ObjectId, UniverseObject>,
    /// What each empire present could see at the start of the battle, for
    /// the objects above. Updated as attackers reveal themselves.
    pub empire_visibility: BTreeMap<EmpireId, BTreeMap<ObjectId, Visibility>>,
    pub monster_detection_strength: f32,
    pub destroyed: BTreeSet<ObjectId>,
    pub events: Vec<CombatEvent>,
    war: BTreeSet<(EmpireId, EmpireId)>,
}

impl CombatInfo {
    pub fn new(
        universe: &Universe,
        empires: &EmpireManager,
        system: ObjectId,
        turn: i32,
        monster_detection_strength: f32,
    ) -> CombatInfo {
        let objects: BTreeMap<ObjectId, UniverseObject> = universe
            .objects_in_system(system)
            .into_iter()
            .filter_map(|id| universe.get(id))
            .filter(|o| matches!(o.kind, ObjectKind::Fleet(_) | ObjectKind::Ship(_) | ObjectKind::Planet(_)))
            .map(|o| (o.id, o.clone()))
            .collect();

        let present: BTreeSet<EmpireId> = objects.values().filter_map(|o| o.owner).collect();
        let mut war = BTreeSet::new();
        for &a in &present {
            for &b in &present {
                if empires.at_war(a, b) {
                    war.insert((a, b));
                }
            }
        }
        let empire_visibility = present
            .iter()
            .map(|&e| {
                let vis = objects
                    .keys()
                    .map(|&id| (id, universe.visibility(e, id)))
                    .filter(|(_, v)| *v > Visibility::Invisible)
                    .collect();
                (e, vis)
            })
            .collect();

        CombatInfo {
            system,
            turn,
            objects,
            empire_visibility,
            monster_detection_strength,
            destroyed: BTreeSet::new(),
            events: Vec::new(),
            war,
        }
    }

    /// Empires owning at least one participant.
    pub fn empires(&self) -> BTreeSet<EmpireId> {
        self.objects.values().filter_map(|o| o.owner).collect()
    }

    /// Same rule as [`EmpireManager::hostile`], frozen at battle start.
    pub fn hostile(&self, a: Option<EmpireId>, b: Option<EmpireId>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.war.contains(&(a, b)),
            (None, None) => false,
            _ => true,
        }
    }

    /// Whether `viewer` (None for monsters) can target `id`.
    pub fn can_see(&self, viewer: Option<EmpireId>, id: ObjectId) -> bool {
        match viewer {
            Some(e) => self
                .empire_visibility
                .get(&e)
                .and_then(|m| m.get(&id))
                .is_some_and(|v| *v >= Visibility::Partial),
            None => self
                .objects
                .get(&id)
                .is_some_and(|o| is_detectable(o.stealth(), self.monster_detection_strength)),
        }
    }

    pub fn reveal(&mut self, to: EmpireId, id: ObjectId) {
        let entry = self.empire_visibility.entry(to).or_default().entry(id).or_default();
        *entry = (*entry).max(Visibility::Partial);
    }

    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id) && !self.destroyed.contains(&id)
    }
}
