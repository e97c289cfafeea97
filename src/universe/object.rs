//! The universe object record and its variants.
//!
//! Every object shares an id, owner, position, meters, and specials; the
//! variant-specific data lives in [`ObjectKind`]. Code that branches on the
//! variant matches on the enum exhaustively.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::fleet::{Fleet, Ship};
use super::ids::{EmpireId, ObjectId};
use super::meter::{MeterType, Meters};
use super::planet::Planet;

/// Discriminant of [`ObjectKind`], for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    System,
    Planet,
    Fleet,
    Ship,
    Building,
    Field,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StarType {
    Blue,
    White,
    Yellow,
    Orange,
    Red,
    Neutron,
    BlackHole,
    NoStar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub star: StarType,
    /// Orbit slots; each holds at most one planet.
    pub orbits: Vec<Option<ObjectId>>,
    pub starlanes: BTreeSet<ObjectId>,
    /// Every object located in the system, of any type.
    pub objects: BTreeSet<ObjectId>,
    pub last_turn_battle_here: i32,
}

impl System {
    pub fn new(star: StarType, orbit_count: usize) -> Self {
        System {
            star,
            orbits: vec![None; orbit_count],
            starlanes: BTreeSet::new(),
            objects: BTreeSet::new(),
            last_turn_battle_here: -1,
        }
    }

    /// Index of the first empty orbit slot.
    pub fn free_orbit(&self) -> Option<usize> {
        self.orbits.iter().position(Option::is_none)
    }

    pub fn has_starlane_to(&self, other: ObjectId) -> bool {
        self.starlanes.contains(&other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_type: String,
    pub planet_id: ObjectId,
    pub ordered_scrapped: bool,
    pub ordered_given_to_empire: Option<EmpireId>,
}

impl Building {
    /// Drops pending scrap and gift orders, which belong to the previous owner.
    pub fn clear_order_flags(&mut self) {
        self.ordered_scrapped = false;
        self.ordered_given_to_empire = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub field_type: String,
    pub radius: f32,
    /// Per-turn drift applied by turn events.
    pub drift: (f32, f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    System(System),
    Planet(Planet),
    Fleet(Fleet),
    Ship(Ship),
    Building(Building),
    Field(Field),
}

/// One entry in the universe arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseObject {
    pub id: ObjectId,
    pub name: String,
    pub owner: Option<EmpireId>,
    pub x: f32,
    pub y: f32,
    /// Containing system, or `None` for systems and objects in transit.
    pub system_id: Option<ObjectId>,
    pub created_turn: i32,
    pub meters: Meters,
    pub specials: BTreeMap<String, f32>,
    pub kind: ObjectKind,
}

macro_rules! kind_accessors {
    ($as_ref:ident, $as_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $as_ref(&self) -> Option<&$ty> {
            match &self.kind {
                ObjectKind::$variant(inner) => Some(inner),
                _ => None,
            }
        }

        pub fn $as_mut(&mut self) -> Option<&mut $ty> {
            match &mut self.kind {
                ObjectKind::$variant(inner) => Some(inner),
                _ => None,
            }
        }
    };
}

impl UniverseObject {
    pub fn new(name: impl Into<String>, x: f32, y: f32, kind: ObjectKind) -> Self {
        UniverseObject {
            id: ObjectId(-1),
            name: name.into(),
            owner: None,
            x,
            y,
            system_id: None,
            created_turn: 0,
            meters: Meters::new(),
            specials: BTreeMap::new(),
            kind,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self.kind {
            ObjectKind::System(_) => ObjectType::System,
            ObjectKind::Planet(_) => ObjectType::Planet,
            ObjectKind::Fleet(_) => ObjectType::Fleet,
            ObjectKind::Ship(_) => ObjectType::Ship,
            ObjectKind::Building(_) => ObjectType::Building,
            ObjectKind::Field(_) => ObjectType::Field,
        }
    }

    kind_accessors!(as_system, as_system_mut, System, System);
    kind_accessors!(as_planet, as_planet_mut, Planet, Planet);
    kind_accessors!(as_fleet, as_fleet_mut, Fleet, Fleet);
    kind_accessors!(as_ship, as_ship_mut, Ship, Ship);
    kind_accessors!(as_building, as_building_mut, Building, Building);
    kind_accessors!(as_field, as_field_mut, Field, Field);

    pub fn owned_by(&self, empire: EmpireId) -> bool {
        self.owner == Some(empire)
    }

    pub fn unowned(&self) -> bool {
        self.owner.is_none()
    }

    /// A planet with a species and positive population.
    pub fn is_populated_planet(&self) -> bool {
        match &self.kind {
            ObjectKind::Planet(planet) => {
                planet.species.is_some() && self.meters.current(MeterType::Population) > 0.0
            }
            _ => false,
        }
    }

    pub fn stealth(&self) -> f32 {
        self.meters.current(MeterType::Stealth)
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}
