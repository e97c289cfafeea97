//! The object arena.
//!
//! Objects live in a single map keyed by [`ObjectId`]. Containment (system
//! contents, fleet ships, planet buildings) is stored as id sets on the
//! container with an id back-reference on the contained object; the helpers
//! here are the only code that edits both sides.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::fleet::{Fleet, FleetAggression, Ship};
use super::ids::{EmpireId, ObjectId};
use super::meter::{MeterType, Meters};
use super::object::{Building, ObjectKind, ObjectType, StarType, System, UniverseObject};
use super::planet::Planet;
use super::visibility::Visibility;
use crate::content::ShipDesign;

/// Errors from structural edits to the object graph.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UniverseError {
    #[error("no object with id {0}")]
    NoSuchObject(ObjectId),

    #[error("object {id} is not a {expected:?}")]
    WrongType { id: ObjectId, expected: ObjectType },

    #[error("orbit {orbit} of system {system} is already occupied")]
    OrbitOccupied { system: ObjectId, orbit: usize },

    #[error("system {0} has no free orbit")]
    NoFreeOrbit(ObjectId),

    #[error("object {0} is not in a system")]
    NotInSystem(ObjectId),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Universe {
    objects: BTreeMap<ObjectId, UniverseObject>,
    next_object_id: i32,
    destroyed_object_ids: BTreeSet<ObjectId>,
    empire_object_visibility: BTreeMap<EmpireId, BTreeMap<ObjectId, Visibility>>,
    empire_known_destroyed: BTreeMap<EmpireId, BTreeSet<ObjectId>>,
}

impl Universe {
    pub fn new() -> Self {
        Universe::default()
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    pub fn get(&self, id: ObjectId) -> Option<&UniverseObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut UniverseObject> {
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UniverseObject> {
        self.objects.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut UniverseObject> {
        self.objects.values_mut()
    }

    /// Ids of all objects of the given type, ascending.
    pub fn ids_of_type(&self, ty: ObjectType) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.object_type() == ty)
            .map(|o| o.id)
            .collect()
    }

    pub fn system(&self, id: ObjectId) -> Option<&System> {
        self.get(id).and_then(UniverseObject::as_system)
    }

    pub fn planet(&self, id: ObjectId) -> Option<&Planet> {
        self.get(id).and_then(UniverseObject::as_planet)
    }

    pub fn planet_mut(&mut self, id: ObjectId) -> Option<&mut Planet> {
        self.get_mut(id).and_then(UniverseObject::as_planet_mut)
    }

    pub fn fleet(&self, id: ObjectId) -> Option<&Fleet> {
        self.get(id).and_then(UniverseObject::as_fleet)
    }

    pub fn fleet_mut(&mut self, id: ObjectId) -> Option<&mut Fleet> {
        self.get_mut(id).and_then(UniverseObject::as_fleet_mut)
    }

    pub fn ship(&self, id: ObjectId) -> Option<&Ship> {
        self.get(id).and_then(UniverseObject::as_ship)
    }

    pub fn ship_mut(&mut self, id: ObjectId) -> Option<&mut Ship> {
        self.get_mut(id).and_then(UniverseObject::as_ship_mut)
    }

    pub fn building(&self, id: ObjectId) -> Option<&Building> {
        self.get(id).and_then(UniverseObject::as_building)
    }

    pub fn building_mut(&mut self, id: ObjectId) -> Option<&mut Building> {
        self.get_mut(id).and_then(UniverseObject::as_building_mut)
    }

    /// Objects located in `system`, ascending by id.
    pub fn objects_in_system(&self, system: ObjectId) -> Vec<ObjectId> {
        self.system(system)
            .map(|s| s.objects.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Fleets located in `system`, ascending by id.
    pub fn fleets_in_system(&self, system: ObjectId) -> Vec<ObjectId> {
        self.objects_in_system(system)
            .into_iter()
            .filter(|id| self.fleet(*id).is_some())
            .collect()
    }

    pub fn planets_in_system(&self, system: ObjectId) -> Vec<ObjectId> {
        self.objects_in_system(system)
            .into_iter()
            .filter(|id| self.planet(*id).is_some())
            .collect()
    }

    pub fn fleet_ships(&self, fleet: ObjectId) -> Vec<ObjectId> {
        self.fleet(fleet)
            .map(|f| f.ships.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Ids of every object owned by `empire`.
    pub fn owned_by(&self, empire: EmpireId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.owned_by(empire))
            .map(|o| o.id)
            .collect()
    }

    pub fn starlanes(&self, system: ObjectId) -> Vec<ObjectId> {
        self.system(system)
            .map(|s| s.starlanes.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn distance(&self, a: ObjectId, b: ObjectId) -> Option<f32> {
        let a = self.get(a)?;
        let b = self.get(b)?;
        Some(a.distance_to(b.x, b.y))
    }

    // ---------------------------------------------------------------------
    // Fleet aggregates
    // ---------------------------------------------------------------------

    /// Slowest ship speed in the fleet, 0 for an empty fleet.
    pub fn fleet_speed(&self, fleet: ObjectId) -> f32 {
        let speeds: Vec<f32> = self
            .fleet_ships(fleet)
            .into_iter()
            .filter_map(|s| self.get(s))
            .map(|s| s.meters.current(MeterType::Speed))
            .collect();
        speeds.into_iter().reduce(f32::min).unwrap_or(0.0)
    }

    pub fn fleet_is_armed(&self, fleet: ObjectId) -> bool {
        self.fleet_ships(fleet)
            .into_iter()
            .filter_map(|s| self.ship(s))
            .any(Ship::is_armed)
    }

    /// Lowest fuel among the fleet's ships.
    pub fn fleet_fuel(&self, fleet: ObjectId) -> f32 {
        self.fleet_ships(fleet)
            .into_iter()
            .filter_map(|s| self.get(s))
            .map(|s| s.meters.current(MeterType::Fuel))
            .reduce(f32::min)
            .unwrap_or(0.0)
    }

    /// True if an armed fleet that can blockade sits in `system` and is
    /// hostile to `owner` according to `is_hostile`.
    pub fn has_obstructive_fleet<F>(&self, system: ObjectId, mut is_hostile: F) -> bool
    where
        F: FnMut(&UniverseObject) -> bool,
    {
        self.fleets_in_system(system).into_iter().any(|fid| {
            let Some(obj) = self.get(fid) else { return false };
            let Some(fleet) = obj.as_fleet() else { return false };
            fleet.aggression.can_obstruct() && self.fleet_is_armed(fid) && is_hostile(obj)
        })
    }

    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    /// Inserts `obj`, assigning it the next unused id.
    pub fn insert(&mut self, mut obj: UniverseObject, turn: i32) -> ObjectId {
        let id = ObjectId(self.next_object_id);
        self.next_object_id += 1;
        obj.id = id;
        obj.created_turn = turn;
        self.objects.insert(id, obj);
        id
    }

    pub fn add_system(
        &mut self,
        name: &str,
        x: f32,
        y: f32,
        star: StarType,
        orbits: usize,
        turn: i32,
    ) -> ObjectId {
        let obj = UniverseObject::new(name, x, y, ObjectKind::System(System::new(star, orbits)));
        self.insert(obj, turn)
    }

    pub fn add_starlane(&mut self, a: ObjectId, b: ObjectId) -> Result<(), UniverseError> {
        if a == b {
            return Ok(());
        }
        for (from, to) in [(a, b), (b, a)] {
            let sys = self
                .get_mut(from)
                .ok_or(UniverseError::NoSuchObject(from))?
                .as_system_mut()
                .ok_or(UniverseError::WrongType { id: from, expected: ObjectType::System })?;
            sys.starlanes.insert(to);
        }
        Ok(())
    }

    /// Places a planet in `system`. `planet.orbit` must name a free slot.
    pub fn add_planet(
        &mut self,
        system: ObjectId,
        name: &str,
        planet: Planet,
        turn: i32,
    ) -> Result<ObjectId, UniverseError> {
        let orbit = planet.orbit;
        let (x, y) = {
            let sys_obj = self.get(system).ok_or(UniverseError::NoSuchObject(system))?;
            let sys = sys_obj
                .as_system()
                .ok_or(UniverseError::WrongType { id: system, expected: ObjectType::System })?;
            match sys.orbits.get(orbit) {
                Some(None) => {}
                Some(Some(_)) => return Err(UniverseError::OrbitOccupied { system, orbit }),
                None => return Err(UniverseError::NoFreeOrbit(system)),
            }
            (sys_obj.x, sys_obj.y)
        };
        let mut obj = UniverseObject::new(name, x, y, ObjectKind::Planet(planet));
        obj.system_id = Some(system);
        let id = self.insert(obj, turn);
        if let Some(sys) = self.get_mut(system).and_then(UniverseObject::as_system_mut) {
            sys.orbits[orbit] = Some(id);
            sys.objects.insert(id);
        }
        Ok(id)
    }

    pub fn add_building(
        &mut self,
        planet: ObjectId,
        building_type: &str,
        owner: Option<EmpireId>,
        turn: i32,
    ) -> Result<ObjectId, UniverseError> {
        let (x, y, system) = {
            let p = self.get(planet).ok_or(UniverseError::NoSuchObject(planet))?;
            if p.as_planet().is_none() {
                return Err(UniverseError::WrongType { id: planet, expected: ObjectType::Planet });
            }
            (p.x, p.y, p.system_id.ok_or(UniverseError::NotInSystem(planet))?)
        };
        let building = Building {
            building_type: building_type.to_string(),
            planet_id: planet,
            ordered_scrapped: false,
            ordered_given_to_empire: None,
        };
        let mut obj = UniverseObject::new(building_type, x, y, ObjectKind::Building(building));
        obj.owner = owner;
        obj.system_id = Some(system);
        let id = self.insert(obj, turn);
        if let Some(p) = self.planet_mut(planet) {
            p.buildings.insert(id);
        }
        if let Some(sys) = self.get_mut(system).and_then(UniverseObject::as_system_mut) {
            sys.objects.insert(id);
        }
        Ok(id)
    }

    /// Creates an empty fleet at `system`.
    pub fn create_fleet(
        &mut self,
        name: &str,
        system: ObjectId,
        owner: Option<EmpireId>,
        aggression: FleetAggression,
        turn: i32,
    ) -> Result<ObjectId, UniverseError> {
        let (x, y) = {
            let s = self.get(system).ok_or(UniverseError::NoSuchObject(system))?;
            if s.as_system().is_none() {
                return Err(UniverseError::WrongType { id: system, expected: ObjectType::System });
            }
            (s.x, s.y)
        };
        let mut fleet = Fleet::new(aggression);
        fleet.arrival_starlane = Some(system);
        let mut obj = UniverseObject::new(name, x, y, ObjectKind::Fleet(fleet));
        obj.owner = owner;
        obj.system_id = Some(system);
        let id = self.insert(obj, turn);
        if let Some(sys) = self.get_mut(system).and_then(UniverseObject::as_system_mut) {
            sys.objects.insert(id);
        }
        Ok(id)
    }

    /// Adds a ship to `fleet`, at the fleet's position.
    pub fn create_ship(
        &mut self,
        fleet: ObjectId,
        name: &str,
        mut ship: Ship,
        meters: Meters,
        turn: i32,
    ) -> Result<ObjectId, UniverseError> {
        let (x, y, system, owner) = {
            let f = self.get(fleet).ok_or(UniverseError::NoSuchObject(fleet))?;
            if f.as_fleet().is_none() {
                return Err(UniverseError::WrongType { id: fleet, expected: ObjectType::Fleet });
            }
            (f.x, f.y, f.system_id, f.owner)
        };
        ship.fleet_id = fleet;
        ship.arrived_on_turn = turn;
        let mut obj = UniverseObject::new(name, x, y, ObjectKind::Ship(ship));
        obj.owner = owner;
        obj.system_id = system;
        obj.meters = meters;
        let id = self.insert(obj, turn);
        if let Some(f) = self.fleet_mut(fleet) {
            f.ships.insert(id);
        }
        if let Some(sys_id) = system {
            if let Some(sys) = self.get_mut(sys_id).and_then(UniverseObject::as_system_mut) {
                sys.objects.insert(id);
            }
        }
        Ok(id)
    }

    /// Builds a ship of `design` into `fleet`.
    pub fn create_ship_from_design(
        &mut self,
        fleet: ObjectId,
        design: &ShipDesign,
        species: Option<String>,
        turn: i32,
    ) -> Result<ObjectId, UniverseError> {
        let ship = Ship {
            fleet_id: fleet,
            design: design.name.clone(),
            species: if design.colony_capacity > 0.0 || design.troop_capacity > 0.0 {
                species
            } else {
                None
            },
            weapons: design.weapons.clone(),
            colony_capacity: design.colony_capacity,
            troop_capacity: design.troop_capacity,
            can_colonize: design.can_colonize,
            ordered_scrapped: false,
            ordered_colonize_planet: None,
            ordered_invade_planet: None,
            ordered_bombard_planet: None,
            ordered_given_to_empire: None,
            last_turn_active_in_combat: -1,
            arrived_on_turn: turn,
        };
        let meters = Meters::with(&[
            (MeterType::Structure, design.structure),
            (MeterType::MaxStructure, design.structure),
            (MeterType::Fuel, design.fuel),
            (MeterType::MaxFuel, design.fuel),
            (MeterType::Speed, design.speed),
            (MeterType::Detection, design.detection),
            (MeterType::Stealth, design.stealth),
        ]);
        self.create_ship(fleet, &design.name, ship, meters, turn)
    }

    // ---------------------------------------------------------------------
    // Containment edits
    // ---------------------------------------------------------------------

    /// Moves `ship` out of its fleet into `new_fleet`. Destroys the old
    /// fleet if this empties it.
    pub fn move_ship_to_fleet(
        &mut self,
        ship: ObjectId,
        new_fleet: ObjectId,
    ) -> Result<Option<ObjectId>, UniverseError> {
        if self.fleet(new_fleet).is_none() {
            return Err(UniverseError::WrongType { id: new_fleet, expected: ObjectType::Fleet });
        }
        let old_fleet = self
            .ship(ship)
            .ok_or(UniverseError::WrongType { id: ship, expected: ObjectType::Ship })?
            .fleet_id;
        if old_fleet == new_fleet {
            return Ok(None);
        }
        if let Some(f) = self.fleet_mut(old_fleet) {
            f.ships.remove(&ship);
        }
        if let Some(f) = self.fleet_mut(new_fleet) {
            f.ships.insert(ship);
        }
        if let Some(s) = self.ship_mut(ship) {
            s.fleet_id = new_fleet;
        }
        let emptied = self.fleet(old_fleet).is_some_and(|f| f.ships.is_empty());
        if emptied {
            self.destroy(old_fleet);
            return Ok(Some(old_fleet));
        }
        Ok(None)
    }

    /// Removes `id` from its system's content set and marks it in transit.
    pub fn remove_from_system(&mut self, id: ObjectId) {
        let Some(system) = self.get(id).and_then(|o| o.system_id) else { return };
        if let Some(sys) = self.get_mut(system).and_then(UniverseObject::as_system_mut) {
            sys.objects.remove(&id);
        }
        if let Some(obj) = self.get_mut(id) {
            obj.system_id = None;
        }
    }

    /// Places `id` into `system` at the system's coordinates.
    pub fn insert_into_system(&mut self, id: ObjectId, system: ObjectId) {
        let Some((x, y)) = self.get(system).map(|s| (s.x, s.y)) else { return };
        self.remove_from_system(id);
        if let Some(sys) = self.get_mut(system).and_then(UniverseObject::as_system_mut) {
            sys.objects.insert(id);
        }
        if let Some(obj) = self.get_mut(id) {
            obj.system_id = Some(system);
            obj.x = x;
            obj.y = y;
        }
    }

    /// Moves a fleet and its ships to `(x, y)`, inside `system` if given.
    pub fn set_fleet_position(&mut self, fleet: ObjectId, x: f32, y: f32, system: Option<ObjectId>) {
        let mut ids = self.fleet_ships(fleet);
        ids.push(fleet);
        for id in ids {
            match system {
                Some(sys) => self.insert_into_system(id, sys),
                None => self.remove_from_system(id),
            }
            if let Some(obj) = self.get_mut(id) {
                obj.x = x;
                obj.y = y;
            }
        }
    }

    /// Sets the owner of a single object without cascading.
    pub fn set_owner(&mut self, id: ObjectId, owner: Option<EmpireId>) {
        if let Some(obj) = self.get_mut(id) {
            obj.owner = owner;
        }
    }

    // ---------------------------------------------------------------------
    // Destruction
    // ---------------------------------------------------------------------

    /// Destroys `id` and everything it contains. Destroying a ship that is
    /// the last in its fleet also destroys the fleet. Returns every
    /// destroyed id.
    pub fn destroy(&mut self, id: ObjectId) -> Vec<ObjectId> {
        let mut destroyed = Vec::new();
        self.destroy_inner(id, &mut destroyed);
        destroyed
    }

    fn destroy_inner(&mut self, id: ObjectId, destroyed: &mut Vec<ObjectId>) {
        let Some(obj) = self.objects.remove(&id) else { return };
        self.destroyed_object_ids.insert(id);
        destroyed.push(id);
        self.record_destruction_knowledge(&obj);
        debug!("destroyed {:?} {} ({})", obj.object_type(), id, obj.name);

        if let Some(system) = obj.system_id {
            if let Some(sys) = self.get_mut(system).and_then(UniverseObject::as_system_mut) {
                sys.objects.remove(&id);
                for slot in sys.orbits.iter_mut() {
                    if *slot == Some(id) {
                        *slot = None;
                    }
                }
            }
        }

        match obj.kind {
            ObjectKind::System(sys) => {
                for child in sys.objects {
                    self.destroy_inner(child, destroyed);
                }
                for lane in sys.starlanes {
                    if let Some(other) = self.get_mut(lane).and_then(UniverseObject::as_system_mut) {
                        other.starlanes.remove(&id);
                    }
                }
            }
            ObjectKind::Planet(planet) => {
                for building in planet.buildings {
                    self.destroy_inner(building, destroyed);
                }
            }
            ObjectKind::Fleet(fleet) => {
                for ship in fleet.ships {
                    self.destroy_inner(ship, destroyed);
                }
            }
            ObjectKind::Ship(ship) => {
                let emptied = match self.fleet_mut(ship.fleet_id) {
                    Some(fleet) => {
                        fleet.ships.remove(&id);
                        fleet.ships.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    self.destroy_inner(ship.fleet_id, destroyed);
                }
            }
            ObjectKind::Building(building) => {
                if let Some(planet) = self.planet_mut(building.planet_id) {
                    planet.buildings.remove(&id);
                }
            }
            ObjectKind::Field(_) => {}
        }
    }

    fn record_destruction_knowledge(&mut self, obj: &UniverseObject) {
        let knowers: Vec<EmpireId> = self
            .empire_object_visibility
            .iter()
            .filter(|(_, vis)| vis.get(&obj.id).copied().unwrap_or_default() >= Visibility::Basic)
            .map(|(&empire, _)| empire)
            .chain(obj.owner)
            .collect();
        for empire in knowers {
            self.empire_known_destroyed.entry(empire).or_default().insert(obj.id);
        }
    }

    /// Deletes fleets that have no ships. Returns the deleted ids.
    pub fn delete_empty_fleets(&mut self) -> Vec<ObjectId> {
        let empty: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| o.as_fleet().is_some_and(|f| f.ships.is_empty()))
            .map(|o| o.id)
            .collect();
        for &id in &empty {
            self.destroy(id);
        }
        empty
    }

    pub fn is_destroyed(&self, id: ObjectId) -> bool {
        self.destroyed_object_ids.contains(&id)
    }

    // ---------------------------------------------------------------------
    // Meters
    // ---------------------------------------------------------------------

    /// Copies every meter's current value into its initial value.
    pub fn back_propagate_meters(&mut self) {
        for obj in self.objects.values_mut() {
            obj.meters.back_propagate();
        }
    }

    /// Back-propagates only the listed objects.
    pub fn back_propagate_object_meters(&mut self, ids: &[ObjectId]) {
        for id in ids {
            if let Some(obj) = self.objects.get_mut(id) {
                obj.meters.back_propagate();
            }
        }
    }

    pub fn clamp_meters(&mut self) {
        for obj in self.objects.values_mut() {
            obj.meters.clamp();
        }
    }

    // ---------------------------------------------------------------------
    // Visibility
    // ---------------------------------------------------------------------

    pub fn visibility(&self, empire: EmpireId, id: ObjectId) -> Visibility {
        self.empire_object_visibility
            .get(&empire)
            .and_then(|m| m.get(&id))
            .copied()
            .unwrap_or_default()
    }

    /// Raises an empire's visibility of `id` to at least `level`.
    pub fn raise_visibility(&mut self, empire: EmpireId, id: ObjectId, level: Visibility) {
        let entry = self
            .empire_object_visibility
            .entry(empire)
            .or_default()
            .entry(id)
            .or_default();
        *entry = (*entry).max(level);
    }

    pub(crate) fn replace_visibilities(
        &mut self,
        vis: BTreeMap<EmpireId, BTreeMap<ObjectId, Visibility>>,
    ) {
        self.empire_object_visibility = vis;
    }

    pub fn known_destroyed(&self, empire: EmpireId) -> BTreeSet<ObjectId> {
        self.empire_known_destroyed.get(&empire).cloned().unwrap_or_default()
    }

    pub fn add_known_destroyed(&mut self, empire: EmpireId, id: ObjectId) {
        self.empire_known_destroyed.entry(empire).or_default().insert(id);
    }

    /// Drops visibility records for an empire, used on elimination.
    pub fn forget_empire(&mut self, empire: EmpireId) {
        self.empire_object_visibility.remove(&empire);
    }

    /// Checks the fleet/ship and system/planet back-reference invariants,
    /// logging any violation. Returns the number of violations found.
    pub fn verify_containment(&self) -> usize {
        let mut violations = 0;
        for obj in self.objects.values() {
            match &obj.kind {
                ObjectKind::Fleet(fleet) => {
                    for ship in &fleet.ships {
                        if self.ship(*ship).map(|s| s.fleet_id) != Some(obj.id) {
                            warn!("fleet {} lists ship {} which does not point back", obj.id, ship);
                            violations += 1;
                        }
                    }
                }
                ObjectKind::Ship(ship) => {
                    if !self.fleet(ship.fleet_id).is_some_and(|f| f.ships.contains(&obj.id)) {
                        warn!("ship {} not listed in fleet {}", obj.id, ship.fleet_id);
                        violations += 1;
                    }
                }
                ObjectKind::System(sys) => {
                    let mut seen = BTreeSet::new();
                    for planet in sys.orbits.iter().flatten() {
                        if !seen.insert(*planet) || self.planet(*planet).is_none() {
                            warn!("system {} orbit table is inconsistent at {}", obj.id, planet);
                            violations += 1;
                        }
                    }
                }
                _ => {}
            }
        }
        violations
    }

    #[cfg(test)]
    pub(crate) fn create_test_ship(
        &mut self,
        fleet: ObjectId,
        owner: Option<EmpireId>,
        attack: f32,
        turn: i32,
    ) -> Result<ObjectId, UniverseError> {
        let ship = Ship {
            fleet_id: fleet,
            design: "SD_TEST".to_string(),
            species: None,
            weapons: if attack > 0.0 { vec![attack] } else { Vec::new() },
            colony_capacity: 0.0,
            troop_capacity: 0.0,
            can_colonize: false,
            ordered_scrapped: false,
            ordered_colonize_planet: None,
            ordered_invade_planet: None,
            ordered_bombard_planet: None,
            ordered_given_to_empire: None,
            last_turn_active_in_combat: -1,
            arrived_on_turn: turn,
        };
        let meters = Meters::with(&[
            (MeterType::Structure, 10.0),
            (MeterType::MaxStructure, 10.0),
            (MeterType::Speed, 75.0),
        ]);
        let id = self.create_ship(fleet, "Test Ship", ship, meters, turn)?;
        if let Some(obj) = self.get_mut(id) {
            obj.owner = owner;
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::planet::{PlanetSize, PlanetType};

    fn one_system() -> (Universe, ObjectId) {
        let mut universe = Universe::new();
        let sys = universe.add_system("Sol", 10.0, 20.0, StarType::Yellow, 4, 0);
        (universe, sys)
    }

    #[test]
    fn ids_are_monotonic_and_not_reused() {
        let (mut universe, sys) = one_system();
        let a = universe.create_fleet("A", sys, None, FleetAggression::Passive, 0).unwrap();
        universe.destroy(a);
        let b = universe.create_fleet("B", sys, None, FleetAggression::Passive, 0).unwrap();
        assert!(b > a);
        assert!(universe.is_destroyed(a));
    }

    #[test]
    fn orbit_slot_holds_one_planet() {
        let (mut universe, sys) = one_system();
        let p = Planet::new(PlanetType::Terran, PlanetSize::Medium, 1);
        universe.add_planet(sys, "P1", p.clone(), 0).unwrap();
        let err = universe.add_planet(sys, "P2", p, 0).unwrap_err();
        assert_eq!(err, UniverseError::OrbitOccupied { system: sys, orbit: 1 });
    }

    #[test]
    fn destroying_last_ship_destroys_fleet() {
        let (mut universe, sys) = one_system();
        let fleet = universe.create_fleet("F", sys, Some(EmpireId(1)), FleetAggression::Passive, 0).unwrap();
        let ship = universe.create_test_ship(fleet, Some(EmpireId(1)), 0.0, 0).unwrap();
        let destroyed = universe.destroy(ship);
        assert!(destroyed.contains(&ship));
        assert!(destroyed.contains(&fleet));
        assert!(universe.get(fleet).is_none());
        assert!(universe.objects_in_system(sys).is_empty());
    }

    #[test]
    fn destroying_planet_destroys_buildings() {
        let (mut universe, sys) = one_system();
        let planet = universe
            .add_planet(sys, "P", Planet::new(PlanetType::Ocean, PlanetSize::Large, 0), 0)
            .unwrap();
        let building = universe.add_building(planet, "BLD_SHIPYARD", Some(EmpireId(1)), 0).unwrap();
        universe.destroy(planet);
        assert!(universe.get(building).is_none());
        assert_eq!(universe.system(sys).unwrap().orbits[0], None);
    }

    #[test]
    fn destroying_system_cascades() {
        let (mut universe, sys) = one_system();
        let fleet = universe.create_fleet("F", sys, None, FleetAggression::Aggressive, 0).unwrap();
        let ship = universe.create_test_ship(fleet, None, 5.0, 0).unwrap();
        universe.destroy(sys);
        assert!(universe.get(ship).is_none());
        assert!(universe.get(fleet).is_none());
        assert!(universe.is_empty());
    }

    #[test]
    fn move_ship_keeps_back_references_in_sync() {
        let (mut universe, sys) = one_system();
        let a = universe.create_fleet("A", sys, Some(EmpireId(1)), FleetAggression::Passive, 0).unwrap();
        let b = universe.create_fleet("B", sys, Some(EmpireId(1)), FleetAggression::Passive, 0).unwrap();
        let s1 = universe.create_test_ship(a, Some(EmpireId(1)), 0.0, 0).unwrap();
        let s2 = universe.create_test_ship(a, Some(EmpireId(1)), 0.0, 0).unwrap();

        assert_eq!(universe.move_ship_to_fleet(s1, b).unwrap(), None);
        assert_eq!(universe.ship(s1).unwrap().fleet_id, b);
        assert_eq!(universe.verify_containment(), 0);

        assert_eq!(universe.move_ship_to_fleet(s2, b).unwrap(), Some(a));
        assert!(universe.get(a).is_none());
        assert_eq!(universe.fleet_ships(b), vec![s1, s2]);
    }

    #[test]
    fn owner_learns_of_destruction() {
        let (mut universe, sys) = one_system();
        let fleet = universe.create_fleet("F", sys, Some(EmpireId(2)), FleetAggression::Passive, 0).unwrap();
        universe.destroy(fleet);
        assert!(universe.known_destroyed(EmpireId(2)).contains(&fleet));
    }

    #[test]
    fn fleet_speed_is_slowest_ship() {
        let (mut universe, sys) = one_system();
        let fleet = universe.create_fleet("F", sys, None, FleetAggression::Passive, 0).unwrap();
        let fast = universe.create_test_ship(fleet, None, 0.0, 0).unwrap();
        let slow = universe.create_test_ship(fleet, None, 0.0, 0).unwrap();
        universe.get_mut(fast).unwrap().meters.set(MeterType::Speed, 90.0);
        universe.get_mut(slow).unwrap().meters.set(MeterType::Speed, 40.0);
        assert_eq!(universe.fleet_speed(fleet), 40.0);
    }
}
