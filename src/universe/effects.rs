//! Meter effects applied after combat.
//!
//! Target and max meters are recomputed from species, planet size, focus,
//! buildings, and empire techs. Current meters then move toward their
//! targets, regenerate, take bombardment, and are clamped. Planets whose
//! population hits zero lose their species.

use std::collections::BTreeMap;

use log::debug;

use super::arena::Universe;
use super::ids::{EmpireId, ObjectId};
use super::meter::{MeterType, Meters};
use super::object::ObjectKind;
use super::planet::Focus;
use crate::content::GameRules;
use crate::empire::{EmpireManager, SitRepKind};
use crate::resolve::SupplyManager;

/// Focused output per unit of population.
pub const FOCUS_OUTPUT_PER_POP: f32 = 0.2;
pub const INFLUENCE_FOCUS_OUTPUT: f32 = 3.0;
/// Influence drained by each populated planet not focused on influence.
pub const COLONY_UPKEEP: f32 = 0.25;
pub const BASE_DETECTION_RANGE: f32 = 50.0;
pub const PLANET_SHIELD: f32 = 5.0;
pub const PLANET_DEFENSE: f32 = 5.0;
/// Fraction of max structure repaired per turn out of combat.
pub const STRUCTURE_REPAIR_FRACTION: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
struct Bonus {
    troops: f32,
    supply: f32,
    detection: f32,
}

/// Sums building bonuses per hosting planet.
fn building_bonuses(universe: &Universe, rules: &GameRules) -> BTreeMap<ObjectId, Bonus> {
    let mut bonuses: BTreeMap<ObjectId, Bonus> = BTreeMap::new();
    for obj in universe.iter() {
        let Some(building) = obj.as_building() else { continue };
        let Some(ty) = rules.building(&building.building_type) else { continue };
        let b = bonuses.entry(building.planet_id).or_default();
        b.troops += ty.troops_bonus;
        b.supply += ty.supply_bonus;
        b.detection += ty.detection_bonus;
    }
    bonuses
}

/// Recomputes target and max meters of every planet.
pub fn update_target_meters(universe: &mut Universe, empires: &EmpireManager, rules: &GameRules) {
    let buildings = building_bonuses(universe, rules);
    let techs: BTreeMap<EmpireId, Bonus> = empires
        .iter()
        .map(|e| {
            let bonus = Bonus { troops: e.troops_bonus, supply: e.supply_range_bonus, detection: 0.0 };
            (e.id, bonus)
        })
        .collect();

    for obj in universe.iter_mut() {
        let owner = obj.owner;
        let populated = obj.is_populated_planet();
        let id = obj.id;
        let Some(planet) = obj.as_planet() else { continue };
        let (size, planet_type, focus) = (planet.size, planet.planet_type, planet.focus);
        let population_target = planet
            .species
            .as_deref()
            .and_then(|s| rules.species(s))
            .map_or(0.0, |s| s.environment(planet_type).population_factor() * size.capacity());

        let mut bonus = buildings.get(&id).copied().unwrap_or_default();
        if let Some(tech) = owner.and_then(|e| techs.get(&e)) {
            bonus.troops += tech.troops;
            bonus.supply += tech.supply;
        }
        let protection = if focus == Some(Focus::Protection) { 2.0 } else { 1.0 };
        let pop = obj.meters.current(MeterType::Population);
        let focused = |f: Focus| if populated && focus == Some(f) { pop * FOCUS_OUTPUT_PER_POP } else { 0.0 };

        let m = &mut obj.meters;
        m.set_current(MeterType::TargetPopulation, population_target);
        m.set_current(MeterType::TargetIndustry, focused(Focus::Industry));
        m.set_current(MeterType::TargetResearch, focused(Focus::Research));
        let influence = match (owner, populated) {
            (Some(_), true) if focus == Some(Focus::Influence) => INFLUENCE_FOCUS_OUTPUT,
            (Some(_), true) => -COLONY_UPKEEP,
            _ => 0.0,
        };
        m.set_current(MeterType::TargetInfluence, influence);

        let troops = match (owner, populated) {
            (Some(_), true) => size.capacity() * 2.0 + bonus.troops,
            (Some(_), false) => bonus.troops,
            // Natives defend with their own garrison.
            (None, true) => size.capacity() * 3.0,
            (None, false) => 0.0,
        };
        m.set_current(MeterType::MaxTroops, troops * protection);

        if owner.is_some() {
            m.set_current(MeterType::MaxShield, PLANET_SHIELD * protection);
            m.set_current(MeterType::MaxDefense, PLANET_DEFENSE * protection);
            m.set_current(MeterType::MaxSupply, (1.0 + size.supply_range() + bonus.supply).max(0.0));
            m.set_current(MeterType::Detection, BASE_DETECTION_RANGE + bonus.detection);
        } else {
            m.set_current(MeterType::MaxShield, 0.0);
            m.set_current(MeterType::MaxDefense, 0.0);
            m.set_current(MeterType::MaxSupply, 0.0);
        }
    }
}

/// Moves `ty` one `step` toward its target meter.
fn grow_toward(meters: &mut Meters, ty: MeterType, target: MeterType, step: f32) {
    let current = meters.current(ty);
    let goal = meters.current(target);
    let next = if current < goal { (current + step).min(goal) } else { (current - step).max(goal) };
    meters.set_current(ty, next);
}

/// Bombarding ships still in their target's system each take one unit of
/// population. Bombard flags are cleared either way.
fn apply_bombardment(universe: &mut Universe, empires: &mut EmpireManager, turn: i32) {
    let orders: Vec<(ObjectId, ObjectId, Option<EmpireId>, Option<ObjectId>)> = universe
        .iter()
        .filter_map(|o| {
            let planet = o.as_ship()?.ordered_bombard_planet?;
            Some((o.id, planet, o.owner, o.system_id))
        })
        .collect();

    for (ship, planet, by, system) in orders {
        if let Some(s) = universe.ship_mut(ship) {
            s.ordered_bombard_planet = None;
        }
        let Some(pobj) = universe.get_mut(planet) else { continue };
        if let Some(p) = pobj.as_planet_mut() {
            p.is_about_to_be_bombarded = false;
        }
        if pobj.system_id != system {
            continue;
        }
        let pop = pobj.meters.current(MeterType::Population);
        pobj.meters.set_current(MeterType::Population, pop - 1.0);
        debug!("ship {} bombards planet {}", ship, planet);
        if let Some(e) = pobj.owner.and_then(|o| empires.get_mut(o)) {
            e.add_sitrep(turn, SitRepKind::PlanetBombarded { planet, by });
        }
    }
}

/// Applies one turn of meter effects to the whole universe.
pub fn apply_meter_effects(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    supply: &SupplyManager,
    rules: &GameRules,
    turn: i32,
) {
    update_target_meters(universe, empires, rules);

    for obj in universe.iter_mut() {
        let owner = obj.owner;
        let system = obj.system_id;
        match &obj.kind {
            ObjectKind::Planet(planet) => {
                let attacked = planet.last_turn_attacked_by_ship >= turn;
                let m = &mut obj.meters;
                if planet.species.is_some() {
                    grow_toward(m, MeterType::Population, MeterType::TargetPopulation, 1.0);
                }
                grow_toward(m, MeterType::Industry, MeterType::TargetIndustry, 1.0);
                grow_toward(m, MeterType::Research, MeterType::TargetResearch, 1.0);
                grow_toward(m, MeterType::Influence, MeterType::TargetInfluence, 1.0);
                m.get_mut(MeterType::Troops).add_to_current(1.0);
                m.get_mut(MeterType::Supply).add_to_current(1.0);
                if !attacked {
                    let shield = m.current(MeterType::MaxShield);
                    let defense = m.current(MeterType::MaxDefense);
                    m.set_current(MeterType::Shield, shield);
                    m.set_current(MeterType::Defense, defense);
                }
            }
            ObjectKind::Ship(ship) => {
                let m = &mut obj.meters;
                if ship.last_turn_active_in_combat < turn {
                    let repair = m.current(MeterType::MaxStructure) * STRUCTURE_REPAIR_FRACTION;
                    m.get_mut(MeterType::Structure).add_to_current(repair);
                }
                let supplied = match (owner, system) {
                    (Some(e), Some(sys)) => supply.fleet_supplyable(e, sys),
                    _ => false,
                };
                if supplied {
                    let max = m.current(MeterType::MaxFuel);
                    m.set_current(MeterType::Fuel, max);
                }
            }
            _ => {}
        }
    }

    apply_bombardment(universe, empires, turn);
    universe.clamp_meters();

    let starving: Vec<(ObjectId, Option<EmpireId>)> = universe
        .iter()
        .filter(|o| {
            o.as_planet().is_some_and(|p| p.species.is_some())
                && o.meters.current(MeterType::Population) <= 0.0
        })
        .map(|o| (o.id, o.owner))
        .collect();
    for (planet, owner) in starving {
        if let Some(p) = universe.planet_mut(planet) {
            p.depopulate();
        }
        debug!("planet {} depopulated", planet);
        if let Some(e) = owner.and_then(|o| empires.get_mut(o)) {
            e.add_sitrep(turn, SitRepKind::PlanetDepopulated { planet });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empire::Empire;
    use crate::universe::{FleetAggression, Planet, PlanetSize, PlanetType, StarType};

    fn colony(planet_type: PlanetType, pop: f32, focus: Focus) -> (Universe, EmpireManager, ObjectId) {
        let mut u = Universe::new();
        let sys = u.add_system("Sol", 0.0, 0.0, StarType::Yellow, 2, 0);
        let mut planet = Planet::new(planet_type, PlanetSize::Medium, 0);
        planet.species = Some("SP_HUMAN".to_string());
        planet.focus = Some(focus);
        let p = u.add_planet(sys, "Earth", planet, 0).unwrap();
        let obj = u.get_mut(p).unwrap();
        obj.owner = Some(EmpireId(1));
        obj.meters.set(MeterType::Population, pop);
        let mut em = EmpireManager::new();
        em.insert(Empire::new(EmpireId(1), "A", "a"));
        (u, em, p)
    }

    #[test]
    fn focus_sets_targets_and_population_grows() {
        let (mut u, mut em, p) = colony(PlanetType::Terran, 10.0, Focus::Industry);
        apply_meter_effects(&mut u, &mut em, &SupplyManager::new(), &GameRules::default(), 1);
        let m = &u.get(p).unwrap().meters;
        // Good environment on a medium planet: 5 * 3.
        assert_eq!(m.current(MeterType::TargetPopulation), 15.0);
        assert_eq!(m.current(MeterType::Population), 11.0);
        assert!((m.current(MeterType::TargetIndustry) - 2.0).abs() < 1e-5);
        assert_eq!(m.current(MeterType::Industry), 1.0);
        assert_eq!(m.current(MeterType::TargetResearch), 0.0);
        assert_eq!(m.current(MeterType::TargetInfluence), -COLONY_UPKEEP);
        assert_eq!(m.current(MeterType::Shield), PLANET_SHIELD);
        assert_eq!(m.current(MeterType::MaxSupply), 2.0);
    }

    #[test]
    fn protection_focus_doubles_defenses() {
        let (mut u, em, p) = colony(PlanetType::Terran, 10.0, Focus::Protection);
        update_target_meters(&mut u, &em, &GameRules::default());
        let m = &u.get(p).unwrap().meters;
        assert_eq!(m.current(MeterType::MaxTroops), 12.0);
        assert_eq!(m.current(MeterType::MaxShield), PLANET_SHIELD * 2.0);
    }

    #[test]
    fn hostile_world_dies_off() {
        let (mut u, mut em, p) = colony(PlanetType::Radiated, 1.0, Focus::Industry);
        apply_meter_effects(&mut u, &mut em, &SupplyManager::new(), &GameRules::default(), 2);
        assert!(u.planet(p).unwrap().species.is_none());
        assert_eq!(
            em.get(EmpireId(1)).unwrap().sitreps[0].kind,
            SitRepKind::PlanetDepopulated { planet: p }
        );
    }

    #[test]
    fn bombardment_costs_population() {
        let (mut u, mut em, p) = colony(PlanetType::Terran, 5.0, Focus::Industry);
        let sys = u.get(p).unwrap().system_id.unwrap();
        let fleet = u.create_fleet("B", sys, Some(EmpireId(2)), FleetAggression::Aggressive, 0).unwrap();
        let ship = u.create_test_ship(fleet, Some(EmpireId(2)), 3.0, 0).unwrap();
        u.ship_mut(ship).unwrap().ordered_bombard_planet = Some(p);
        u.planet_mut(p).unwrap().is_about_to_be_bombarded = true;
        apply_meter_effects(&mut u, &mut em, &SupplyManager::new(), &GameRules::default(), 3);
        // Grows by one, then loses one.
        assert_eq!(u.get(p).unwrap().meters.current(MeterType::Population), 5.0);
        assert!(u.ship(ship).unwrap().ordered_bombard_planet.is_none());
        assert!(!u.planet(p).unwrap().is_about_to_be_bombarded);
        assert!(em
            .get(EmpireId(1))
            .unwrap()
            .sitreps
            .iter()
            .any(|s| s.kind == SitRepKind::PlanetBombarded { planet: p, by: Some(EmpireId(2)) }));
    }

    #[test]
    fn ships_repair_only_out_of_combat() {
        let (mut u, mut em, p) = colony(PlanetType::Terran, 5.0, Focus::Industry);
        let sys = u.get(p).unwrap().system_id.unwrap();
        let fleet = u.create_fleet("F", sys, Some(EmpireId(1)), FleetAggression::Passive, 0).unwrap();
        let calm = u.create_test_ship(fleet, Some(EmpireId(1)), 0.0, 0).unwrap();
        let busy = u.create_test_ship(fleet, Some(EmpireId(1)), 0.0, 0).unwrap();
        for ship in [calm, busy] {
            u.get_mut(ship).unwrap().meters.set(MeterType::Structure, 5.0);
        }
        u.ship_mut(busy).unwrap().last_turn_active_in_combat = 4;
        apply_meter_effects(&mut u, &mut em, &SupplyManager::new(), &GameRules::default(), 4);
        assert_eq!(u.get(calm).unwrap().meters.current(MeterType::Structure), 6.0);
        assert_eq!(u.get(busy).unwrap().meters.current(MeterType::Structure), 5.0);
    }

    #[test]
    fn fuel_refills_in_supply() {
        let (mut u, mut em, p) = colony(PlanetType::Terran, 5.0, Focus::Industry);
        let sys = u.get(p).unwrap().system_id.unwrap();
        em.get_mut(EmpireId(1)).unwrap().explored_systems.insert(sys);
        let fleet = u.create_fleet("F", sys, Some(EmpireId(1)), FleetAggression::Passive, 0).unwrap();
        let ship = u.create_test_ship(fleet, Some(EmpireId(1)), 0.0, 0).unwrap();
        let m = &mut u.get_mut(ship).unwrap().meters;
        m.set(MeterType::MaxFuel, 5.0);
        m.set(MeterType::Fuel, 1.0);
        u.get_mut(p).unwrap().meters.set(MeterType::Supply, 1.0);
        let mut supply = SupplyManager::new();
        supply.update(&u, &em);
        apply_meter_effects(&mut u, &mut em, &supply, &GameRules::default(), 1);
        assert_eq!(u.get(ship).unwrap().meters.current(MeterType::Fuel), 5.0);
    }
}
