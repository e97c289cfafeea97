//! Order types and per-empire order sets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::empire::ProductionKind;
use crate::universe::{EmpireId, FleetAggression, Focus, ObjectId};

/// A single instruction from an empire for the coming turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Order {
    FleetMove { fleet: ObjectId, destination: ObjectId },
    FleetAggression { fleet: ObjectId, aggression: FleetAggression },
    /// Splits `ships` off into a new fleet at their current system.
    NewFleet { name: String, ships: Vec<ObjectId>, aggression: FleetAggression },
    /// Moves every ship of `fleet` into `into`.
    MergeFleet { fleet: ObjectId, into: ObjectId },
    Rename { object: ObjectId, name: String },
    Colonize { ship: ObjectId, planet: ObjectId },
    Invade { ship: ObjectId, planet: ObjectId },
    Bombard { ship: ObjectId, planet: ObjectId },
    Scrap { object: ObjectId },
    GiveObjectToEmpire { object: ObjectId, recipient: EmpireId },
    ChangeFocus { planet: ObjectId, focus: Focus },
    ProductionEnqueue { item: ProductionKind, location: ObjectId, quantity: u32 },
    ProductionDequeue { index: usize },
    ResearchEnqueue { tech: String, position: Option<usize> },
    ResearchDequeue { tech: String },
    AdoptPolicy { policy: String },
    DeAdoptPolicy { policy: String },
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::FleetMove { fleet, destination } => write!(f, "move {} to {}", fleet, destination),
            Order::FleetAggression { fleet, aggression } => {
                write!(f, "set {} {:?}", fleet, aggression)
            }
            Order::NewFleet { name, ships, .. } => write!(f, "new fleet '{}' of {} ships", name, ships.len()),
            Order::MergeFleet { fleet, into } => write!(f, "merge {} into {}", fleet, into),
            Order::Rename { object, name } => write!(f, "rename {} to '{}'", object, name),
            Order::Colonize { ship, planet } => write!(f, "colonize {} with {}", planet, ship),
            Order::Invade { ship, planet } => write!(f, "invade {} with {}", planet, ship),
            Order::Bombard { ship, planet } => write!(f, "bombard {} with {}", planet, ship),
            Order::Scrap { object } => write!(f, "scrap {}", object),
            Order::GiveObjectToEmpire { object, recipient } => {
                write!(f, "give {} to {}", object, recipient)
            }
            Order::ChangeFocus { planet, focus } => write!(f, "focus {} on {:?}", planet, focus),
            Order::ProductionEnqueue { item, location, quantity } => {
                write!(f, "build {}x {} at {}", quantity, item, location)
            }
            Order::ProductionDequeue { index } => write!(f, "dequeue production #{}", index),
            Order::ResearchEnqueue { tech, .. } => write!(f, "research {}", tech),
            Order::ResearchDequeue { tech } => write!(f, "stop researching {}", tech),
            Order::AdoptPolicy { policy } => write!(f, "adopt {}", policy),
            Order::DeAdoptPolicy { policy } => write!(f, "de-adopt {}", policy),
        }
    }
}

/// Orders keyed by order id. Ids are assigned in insertion order, so
/// iteration order is issue order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderSet {
    orders: BTreeMap<u32, Order>,
}

impl OrderSet {
    pub fn new() -> Self {
        OrderSet::default()
    }

    /// Appends an order and returns its id.
    pub fn issue(&mut self, order: Order) -> u32 {
        let id = self.orders.keys().next_back().map_or(0, |&last| last + 1);
        self.orders.insert(id, order);
        id
    }

    /// Withdraws a previously issued order.
    pub fn rescind(&mut self, id: u32) -> Option<Order> {
        self.orders.remove(&id)
    }

    pub fn get(&self, id: u32) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Orders in issue order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Order)> {
        self.orders.iter().map(|(&id, order)| (id, order))
    }
}

impl FromIterator<Order> for OrderSet {
    fn from_iter<I: IntoIterator<Item = Order>>(iter: I) -> Self {
        let mut set = OrderSet::new();
        for order in iter {
            set.issue(order);
        }
        set
    }
}
