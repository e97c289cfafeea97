//! The per-empire record.
//!
//! An empire is created once at game start and never destroyed; elimination
//! only flags it so diplomacy and victory bookkeeping keep working.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::pools::ResourcePools;
use super::queue::{ProductionQueue, ResearchQueue};
use super::sitrep::{SitRep, SitRepKind};
use crate::content::{GameRules, PolicyCategory};
use crate::universe::{EmpireId, Focus, ObjectId};

/// Fraction of a policy's adoption cost charged every turn it stays adopted.
pub const POLICY_UPKEEP_FRACTION: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptedPolicy {
    pub category: PolicyCategory,
    pub adoption_turn: i32,
    pub adoption_cost: f32,
    /// Turns the policy has been continuously adopted.
    pub current_turns_adopted: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusChange {
    pub turn: i32,
    pub planet: ObjectId,
    pub from: Option<Focus>,
    pub to: Option<Focus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Empire {
    pub id: EmpireId,
    pub name: String,
    pub player_name: String,
    pub ai_controlled: bool,
    pub capital: Option<ObjectId>,
    /// Set when the empire's orders for this turn are in.
    pub ready: bool,
    pub eliminated: bool,
    pub won: bool,
    pub victory_reasons: BTreeSet<String>,
    pub detection_strength: f32,
    pub supply_range_bonus: f32,
    pub troops_bonus: f32,
    pub explored_systems: BTreeSet<ObjectId>,
    pub researched_techs: BTreeSet<String>,
    pub available_designs: BTreeSet<String>,
    pub available_buildings: BTreeSet<String>,
    pub production_queue: ProductionQueue,
    pub research_queue: ResearchQueue,
    pub pools: ResourcePools,
    pub influence_stockpile: f32,
    pub adopted_policies: BTreeMap<String, AdoptedPolicy>,
    pub policy_slots: BTreeMap<PolicyCategory, usize>,
    pub focus_history: Vec<FocusChange>,
    /// Enemy ships destroyed, by design name.
    pub ships_destroyed: BTreeMap<String, u32>,
    /// Own ships lost, by design name.
    pub ships_lost: BTreeMap<String, u32>,
    pub planets_invaded: u32,
    pub sitreps: Vec<SitRep>,
}

impl Empire {
    pub fn new(id: EmpireId, name: &str, player_name: &str) -> Self {
        Empire {
            id,
            name: name.to_string(),
            player_name: player_name.to_string(),
            ai_controlled: false,
            capital: None,
            ready: false,
            eliminated: false,
            won: false,
            victory_reasons: BTreeSet::new(),
            detection_strength: 10.0,
            supply_range_bonus: 0.0,
            troops_bonus: 0.0,
            explored_systems: BTreeSet::new(),
            researched_techs: BTreeSet::new(),
            available_designs: BTreeSet::new(),
            available_buildings: BTreeSet::new(),
            production_queue: ProductionQueue::default(),
            research_queue: ResearchQueue::default(),
            pools: ResourcePools::default(),
            influence_stockpile: 0.0,
            adopted_policies: BTreeMap::new(),
            policy_slots: BTreeMap::new(),
            focus_history: Vec::new(),
            ships_destroyed: BTreeMap::new(),
            ships_lost: BTreeMap::new(),
            planets_invaded: 0,
            sitreps: Vec::new(),
        }
    }

    /// Creates an empire with the starting unlocks from `rules`.
    pub fn with_rules(id: EmpireId, name: &str, player_name: &str, rules: &GameRules) -> Self {
        let mut empire = Empire::new(id, name, player_name);
        empire.detection_strength = rules.starting_detection_strength;
        empire.available_designs = rules.starting_designs.iter().cloned().collect();
        empire.available_buildings = rules.starting_buildings.iter().cloned().collect();
        empire.policy_slots = rules.starting_policy_slots.clone();
        empire
    }

    pub fn add_sitrep(&mut self, turn: i32, kind: SitRepKind) {
        self.sitreps.push(SitRep::new(turn, kind));
    }

    /// Marks the empire as having won for `reason`. Returns false if it had
    /// already won for the same reason.
    pub fn win(&mut self, reason: &str) -> bool {
        self.won = true;
        self.victory_reasons.insert(reason.to_string())
    }

    /// Flags the empire as eliminated. Object cleanup is the caller's job.
    pub fn eliminate(&mut self) {
        self.eliminated = true;
        self.capital = None;
        self.ready = false;
        self.production_queue.items.clear();
        self.research_queue.techs.clear();
    }

    pub fn slots(&self, category: PolicyCategory) -> usize {
        self.policy_slots.get(&category).copied().unwrap_or(0)
    }

    pub fn adopted_in(&self, category: PolicyCategory) -> usize {
        self.adopted_policies.values().filter(|p| p.category == category).count()
    }

    /// Influence charged each turn for the currently adopted policies.
    pub fn policy_upkeep(&self) -> f32 {
        self.adopted_policies
            .values()
            .map(|p| p.adoption_cost * POLICY_UPKEEP_FRACTION)
            .sum()
    }

    pub fn record_ship_destroyed(&mut self, design: &str) {
        *self.ships_destroyed.entry(design.to_string()).or_default() += 1;
    }

    pub fn record_ship_lost(&mut self, design: &str) {
        *self.ships_lost.entry(design.to_string()).or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_rules_grants_starting_unlocks() {
        let rules = GameRules::default();
        let empire = Empire::with_rules(EmpireId(1), "Terrans", "alice", &rules);
        assert!(empire.available_designs.contains("SD_SCOUT"));
        assert!(empire.available_buildings.contains("BLD_SHIPYARD_BASE"));
        assert_eq!(empire.slots(PolicyCategory::Economic), 1);
    }

    #[test]
    fn win_is_recorded_once_per_reason() {
        let mut empire = Empire::new(EmpireId(1), "A", "a");
        assert!(empire.win("VICTORY_ALL_ENEMIES_ELIMINATED"));
        assert!(!empire.win("VICTORY_ALL_ENEMIES_ELIMINATED"));
        assert!(empire.won);
    }

    #[test]
    fn eliminate_clears_capital_and_queues() {
        let mut empire = Empire::new(EmpireId(1), "A", "a");
        empire.capital = Some(ObjectId(4));
        empire.research_queue.insert("X".into(), None);
        empire.eliminate();
        assert!(empire.eliminated);
        assert!(empire.capital.is_none());
        assert!(empire.research_queue.techs.is_empty());
    }

    #[test]
    fn upkeep_scales_with_adoption_cost() {
        let mut empire = Empire::new(EmpireId(1), "A", "a");
        empire.adopted_policies.insert(
            "PLC_X".into(),
            AdoptedPolicy {
                category: PolicyCategory::Economic,
                adoption_turn: 1,
                adoption_cost: 20.0,
                current_turns_adopted: 0,
            },
        );
        assert!((empire.policy_upkeep() - 2.0).abs() < 1e-6);
    }
}
