//! Planets: orbit a system, host population, buildings, and a focus.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ids::{EmpireId, ObjectId};

/// The environment class of a planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlanetType {
    Swamp,
    Toxic,
    Inferno,
    Radiated,
    Barren,
    Tundra,
    Desert,
    Terran,
    Ocean,
    Asteroids,
    GasGiant,
}

pub const ALL_PLANET_TYPES: [PlanetType; 11] = [
    PlanetType::Swamp,
    PlanetType::Toxic,
    PlanetType::Inferno,
    PlanetType::Radiated,
    PlanetType::Barren,
    PlanetType::Tundra,
    PlanetType::Desert,
    PlanetType::Terran,
    PlanetType::Ocean,
    PlanetType::Asteroids,
    PlanetType::GasGiant,
];

/// Planet size class. Determines base population capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlanetSize {
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
    Asteroids,
    GasGiant,
}

impl PlanetSize {
    /// Population capacity multiplier for this size.
    pub const fn capacity(self) -> f32 {
        match self {
            PlanetSize::Tiny => 1.0,
            PlanetSize::Small => 2.0,
            PlanetSize::Medium => 3.0,
            PlanetSize::Large => 4.0,
            PlanetSize::Huge => 6.0,
            PlanetSize::Asteroids => 1.0,
            PlanetSize::GasGiant => 1.5,
        }
    }

    /// Base supply range projected by an owned planet of this size.
    pub const fn supply_range(self) -> f32 {
        match self {
            PlanetSize::Tiny => 2.0,
            PlanetSize::Small => 1.0,
            PlanetSize::Medium | PlanetSize::Asteroids => 1.0,
            PlanetSize::Large => 0.0,
            PlanetSize::Huge | PlanetSize::GasGiant => 0.0,
        }
    }
}

/// What a populated planet's output is directed toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Focus {
    Industry,
    Research,
    Influence,
    Protection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub planet_type: PlanetType,
    pub size: PlanetSize,
    pub orbit: usize,
    pub species: Option<String>,
    pub focus: Option<Focus>,
    /// Focus at the start of the current turn, for change detection.
    pub initial_focus: Option<Focus>,
    pub last_turn_focus_changed: i32,
    pub buildings: BTreeSet<ObjectId>,
    pub last_turn_colonized: i32,
    pub last_turn_conquered: i32,
    pub last_turn_attacked_by_ship: i32,
    pub is_about_to_be_colonized: bool,
    pub is_about_to_be_invaded: bool,
    pub is_about_to_be_bombarded: bool,
    pub ordered_given_to_empire: Option<EmpireId>,
}

impl Planet {
    pub fn new(planet_type: PlanetType, size: PlanetSize, orbit: usize) -> Self {
        Planet {
            planet_type,
            size,
            orbit,
            species: None,
            focus: None,
            initial_focus: None,
            last_turn_focus_changed: -1,
            buildings: BTreeSet::new(),
            last_turn_colonized: -1,
            last_turn_conquered: -1,
            last_turn_attacked_by_ship: -1,
            is_about_to_be_colonized: false,
            is_about_to_be_invaded: false,
            is_about_to_be_bombarded: false,
            ordered_given_to_empire: None,
        }
    }

    /// Clears all transient per-turn order flags.
    pub fn reset_order_flags(&mut self) {
        self.is_about_to_be_colonized = false;
        self.is_about_to_be_invaded = false;
        self.is_about_to_be_bombarded = false;
        self.ordered_given_to_empire = None;
    }

    /// Strips species and focus, leaving an outpost or an empty rock.
    pub fn depopulate(&mut self) {
        self.species = None;
        self.focus = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_planet_has_no_species_or_flags() {
        let planet = Planet::new(PlanetType::Terran, PlanetSize::Medium, 2);
        assert!(planet.species.is_none());
        assert!(!planet.is_about_to_be_colonized);
        assert_eq!(planet.last_turn_colonized, -1);
    }

    #[test]
    fn reset_order_flags_clears_gift() {
        let mut planet = Planet::new(PlanetType::Ocean, PlanetSize::Large, 0);
        planet.ordered_given_to_empire = Some(EmpireId(2));
        planet.is_about_to_be_invaded = true;
        planet.reset_order_flags();
        assert!(planet.ordered_given_to_empire.is_none());
        assert!(!planet.is_about_to_be_invaded);
    }

    #[test]
    fn larger_planets_hold_more_population() {
        assert!(PlanetSize::Huge.capacity() > PlanetSize::Small.capacity());
    }
}
