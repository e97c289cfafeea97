//! Fleets and ships.
//!
//! A fleet is the unit of movement and combat presence; it owns a set of ship
//! ids. Each ship points back at its fleet by id. The two sides are kept in
//! agreement by [`Universe`](super::Universe) helpers, never by callers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ids::{EmpireId, ObjectId};

/// Fleet stance controlling combat initiation and blockades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FleetAggression {
    /// Never triggers combat, never blockades, tries to stay hidden.
    Passive,
    /// Returns fire if dragged into combat but does not blockade.
    Defensive,
    /// Blockades enemy movement and supply but does not start combat.
    Obstructive,
    /// Attacks visible enemies and blockades.
    Aggressive,
}

impl FleetAggression {
    pub const fn can_obstruct(self) -> bool {
        matches!(self, FleetAggression::Obstructive | FleetAggression::Aggressive)
    }

    pub const fn can_initiate_combat(self) -> bool {
        matches!(self, FleetAggression::Aggressive)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    pub ships: BTreeSet<ObjectId>,
    pub aggression: FleetAggression,
    /// Remaining systems to visit, in order. Computed when a move order is
    /// applied; movement only consumes it.
    pub travel_route: Vec<ObjectId>,
    pub prev_system: Option<ObjectId>,
    pub next_system: Option<ObjectId>,
    /// The system the fleet entered its current system from. Equal to the
    /// current system when the fleet's presence there is unrestricted.
    pub arrival_starlane: Option<ObjectId>,
    pub arrived_this_turn: bool,
    pub last_turn_move_ordered: i32,
    pub ordered_given_to_empire: Option<EmpireId>,
}

impl Fleet {
    pub fn new(aggression: FleetAggression) -> Self {
        Fleet {
            ships: BTreeSet::new(),
            aggression,
            travel_route: Vec::new(),
            prev_system: None,
            next_system: None,
            arrival_starlane: None,
            arrived_this_turn: false,
            last_turn_move_ordered: -1,
            ordered_given_to_empire: None,
        }
    }

    pub fn final_destination(&self) -> Option<ObjectId> {
        self.travel_route.last().copied()
    }

    /// Cancels any remaining movement.
    pub fn clear_route(&mut self) {
        self.travel_route.clear();
        self.next_system = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub fleet_id: ObjectId,
    pub design: String,
    pub species: Option<String>,
    /// Damage per bout of each mounted weapon.
    pub weapons: Vec<f32>,
    pub colony_capacity: f32,
    pub troop_capacity: f32,
    pub can_colonize: bool,
    pub ordered_scrapped: bool,
    pub ordered_colonize_planet: Option<ObjectId>,
    pub ordered_invade_planet: Option<ObjectId>,
    pub ordered_bombard_planet: Option<ObjectId>,
    pub ordered_given_to_empire: Option<EmpireId>,
    pub last_turn_active_in_combat: i32,
    pub arrived_on_turn: i32,
}

impl Ship {
    pub fn is_armed(&self) -> bool {
        self.weapons.iter().any(|&damage| damage > 0.0)
    }

    pub fn total_attack(&self) -> f32 {
        self.weapons.iter().sum()
    }

    pub fn has_troops(&self) -> bool {
        self.troop_capacity > 0.0
    }

    /// Clears colonize, invade, bombard, scrap, and gift flags.
    pub fn clear_order_flags(&mut self) {
        self.ordered_scrapped = false;
        self.ordered_colonize_planet = None;
        self.ordered_invade_planet = None;
        self.ordered_bombard_planet = None;
        self.ordered_given_to_empire = None;
    }
}
