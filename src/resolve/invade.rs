//! Invasion pass and ground combat.

use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::empire::{EmpireManager, SitRepKind};
use crate::universe::{EmpireId, MeterType, ObjectId, Universe};

/// Troops per faction on one planet. `None` is the unowned faction:
/// natives and rebels.
pub type GroundForces = BTreeMap<Option<EmpireId>, f32>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroundCombatOutcome {
    /// One faction holds the planet with the given troops left.
    Victor { faction: Option<EmpireId>, troops: f32 },
    /// Every side was wiped out.
    Stalemate,
}

/// Resolves ground combat between the factions in `forces`.
///
/// Allied factions fight as one side. The strongest side keeps its total
/// minus the second-strongest side's total and every other side is wiped
/// out. Equal top sides cancel out. Within the winning side the faction with
/// the most troops (ties: the lowest id, unowned last) takes the planet.
/// On return `forces` holds the survivors only.
pub fn resolve_ground_combat(forces: &mut GroundForces, empires: &EmpireManager) -> GroundCombatOutcome {
    forces.retain(|_, troops| *troops > 0.0);
    if forces.is_empty() {
        return GroundCombatOutcome::Stalemate;
    }

    let mut sides: Vec<Vec<Option<EmpireId>>> = Vec::new();
    for &faction in forces.keys() {
        let joined = sides.iter_mut().find(|side| {
            side.iter().all(|&member| match (member, faction) {
                (Some(a), Some(b)) => empires.are_allied(a, b),
                _ => false,
            })
        });
        match joined {
            Some(side) => side.push(faction),
            None => sides.push(vec![faction]),
        }
    }

    let mut totals: Vec<(f32, usize)> = sides
        .iter()
        .enumerate()
        .map(|(i, side)| (side.iter().map(|f| forces[f]).sum(), i))
        .collect();
    totals.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    let (best, best_side) = totals[0];
    let runner_up = totals.get(1).map_or(0.0, |t| t.0);
    let remaining = best - runner_up;
    if remaining <= 0.0 {
        forces.clear();
        return GroundCombatOutcome::Stalemate;
    }

    let winner = sides[best_side]
        .iter()
        .copied()
        .max_by(|a, b| {
            forces[a]
                .total_cmp(&forces[b])
                .then_with(|| faction_rank(*b).cmp(&faction_rank(*a)))
        })
        .unwrap_or(None);
    forces.clear();
    forces.insert(winner, remaining);
    GroundCombatOutcome::Victor { faction: winner, troops: remaining }
}

/// Sort key putting empires by id before the unowned faction.
fn faction_rank(faction: Option<EmpireId>) -> (bool, i32) {
    match faction {
        Some(id) => (false, id.0),
        None => (true, 0),
    }
}

/// Resolves every pending invade order. All invading ships are consumed.
/// Returns the planets whose owner changed.
pub fn handle_invasion(universe: &mut Universe, empires: &mut EmpireManager, turn: i32) -> Vec<ObjectId> {
    let mut invasions: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
    for obj in universe.iter() {
        let Some(ship) = obj.as_ship() else { continue };
        let Some(planet) = ship.ordered_invade_planet else { continue };
        invasions.entry(planet).or_default().push(obj.id);
    }

    let mut changed = Vec::new();
    for (planet, ships) in invasions {
        let Some(pobj) = universe.get(planet) else {
            for ship in ships {
                universe.destroy(ship);
            }
            continue;
        };
        let system = pobj.system_id;
        let old_owner = pobj.owner;

        let mut forces = GroundForces::new();
        let garrison = pobj.meters.current(MeterType::Troops);
        if garrison > 0.0 {
            *forces.entry(old_owner).or_default() += garrison;
        }
        let rebels = pobj.meters.current(MeterType::RebelTroops);
        if rebels > 0.0 {
            *forces.entry(None).or_default() += rebels;
        }

        let mut stakeholders: BTreeSet<EmpireId> = old_owner.into_iter().collect();
        for &ship in &ships {
            let Some(sobj) = universe.get(ship) else { continue };
            let Some(s) = sobj.as_ship() else { continue };
            if sobj.system_id != system {
                continue;
            }
            *forces.entry(sobj.owner).or_default() += s.troop_capacity;
            stakeholders.extend(sobj.owner);
        }
        for ship in ships {
            universe.destroy(ship);
        }
        if let Some(p) = universe.planet_mut(planet) {
            p.is_about_to_be_invaded = false;
        }

        let factions: Vec<Option<EmpireId>> =
            forces.iter().filter(|(_, &t)| t > 0.0).map(|(&f, _)| f).collect();
        let outcome = match factions.as_slice() {
            [] => continue,
            [only] if *only == old_owner => continue,
            [only] => GroundCombatOutcome::Victor { faction: *only, troops: forces[only] },
            _ => resolve_ground_combat(&mut forces, empires),
        };
        let contested = factions.len() > 1;

        let new_owner = match outcome {
            GroundCombatOutcome::Victor { faction, troops } => {
                set_planet_troops(universe, planet, troops);
                faction
            }
            GroundCombatOutcome::Stalemate => {
                set_planet_troops(universe, planet, 0.0);
                None
            }
        };

        if new_owner != old_owner {
            transfer_planet(universe, empires, planet, new_owner);
            if let Some(p) = universe.planet_mut(planet) {
                p.last_turn_conquered = turn;
            }
            changed.push(planet);
        }

        info!(
            "invasion of {}: {:?} (was {:?}, now {:?})",
            planet, outcome, old_owner, new_owner
        );
        for empire in stakeholders {
            let Some(e) = empires.get_mut(empire) else { continue };
            if contested {
                e.add_sitrep(
                    turn,
                    SitRepKind::GroundCombat {
                        planet,
                        victor: new_owner,
                        stalemate: outcome == GroundCombatOutcome::Stalemate,
                    },
                );
            }
            match new_owner {
                Some(by) if new_owner != old_owner => {
                    e.add_sitrep(turn, SitRepKind::PlanetCaptured { planet, by, from: old_owner });
                }
                None if old_owner.is_some() => {
                    e.add_sitrep(turn, SitRepKind::PlanetRebelled { planet });
                }
                _ => {}
            }
        }
        if let Some(by) = new_owner.filter(|_| new_owner != old_owner) {
            if let Some(e) = empires.get_mut(by) {
                e.planets_invaded += 1;
            }
        }
    }
    changed
}

/// Surviving troops become the garrison. Rebels never outlast a ground
/// battle as rebels.
fn set_planet_troops(universe: &mut Universe, planet: ObjectId, troops: f32) {
    if let Some(obj) = universe.get_mut(planet) {
        obj.meters.set(MeterType::Troops, troops);
        obj.meters.set(MeterType::RebelTroops, 0.0);
    }
}

/// Gives `planet` and its buildings to `owner`, clearing the previous
/// owner's capital if it was this planet. Orders the previous owner gave
/// for the planet or its buildings are void.
pub fn transfer_planet(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    planet: ObjectId,
    owner: Option<EmpireId>,
) {
    let Some(obj) = universe.get(planet) else { return };
    let old_owner = obj.owner;
    let buildings: Vec<ObjectId> = obj
        .as_planet()
        .map(|p| p.buildings.iter().copied().collect())
        .unwrap_or_default();
    universe.set_owner(planet, owner);
    for b in buildings {
        universe.set_owner(b, owner);
        if let Some(building) = universe.building_mut(b) {
            building.clear_order_flags();
        }
    }
    if let Some(p) = universe.planet_mut(planet) {
        p.reset_order_flags();
    }
    if let Some(old) = old_owner.and_then(|o| empires.get_mut(o)) {
        if old.capital == Some(planet) {
            old.capital = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empire::{DiplomaticStatus, Empire};
    use crate::universe::{FleetAggression, Planet, PlanetSize, PlanetType, StarType};

    fn manager(n: i32) -> EmpireManager {
        let mut m = EmpireManager::new();
        for i in 1..=n {
            m.insert(Empire::new(EmpireId(i), "E", "p"));
        }
        m
    }

    #[test]
    fn equal_enemies_cancel_out() {
        let em = manager(2);
        let mut forces = GroundForces::from([(Some(EmpireId(1)), 10.0), (Some(EmpireId(2)), 10.0)]);
        assert_eq!(resolve_ground_combat(&mut forces, &em), GroundCombatOutcome::Stalemate);
        assert!(forces.is_empty());
    }

    #[test]
    fn stronger_side_keeps_difference() {
        let em = manager(2);
        let mut forces = GroundForces::from([(Some(EmpireId(1)), 12.0), (Some(EmpireId(2)), 5.0)]);
        assert_eq!(
            resolve_ground_combat(&mut forces, &em),
            GroundCombatOutcome::Victor { faction: Some(EmpireId(1)), troops: 7.0 }
        );
        assert_eq!(forces.get(&Some(EmpireId(1))), Some(&7.0));
    }

    #[test]
    fn allies_combine_against_a_common_enemy() {
        let mut em = manager(3);
        em.set_status(EmpireId(1), EmpireId(2), DiplomaticStatus::Allied);
        let mut forces = GroundForces::from([
            (Some(EmpireId(1)), 4.0),
            (Some(EmpireId(2)), 6.0),
            (Some(EmpireId(3)), 8.0),
        ]);
        assert_eq!(
            resolve_ground_combat(&mut forces, &em),
            GroundCombatOutcome::Victor { faction: Some(EmpireId(2)), troops: 2.0 }
        );
    }

    #[test]
    fn natives_defend_as_unowned_faction() {
        let em = manager(1);
        let mut forces = GroundForces::from([(None, 9.0), (Some(EmpireId(1)), 6.0)]);
        assert_eq!(
            resolve_ground_combat(&mut forces, &em),
            GroundCombatOutcome::Victor { faction: None, troops: 3.0 }
        );
    }

    fn invasion_setup(garrison: f32) -> (Universe, EmpireManager, ObjectId, ObjectId) {
        let mut u = Universe::new();
        let sys = u.add_system("S", 0.0, 0.0, StarType::Yellow, 2, 0);
        let planet = u
            .add_planet(sys, "P", Planet::new(PlanetType::Terran, PlanetSize::Medium, 0), 0)
            .unwrap();
        let obj = u.get_mut(planet).unwrap();
        obj.owner = Some(EmpireId(2));
        obj.meters.set(MeterType::Troops, garrison);
        obj.meters.set(MeterType::MaxTroops, garrison);
        (u, manager(2), sys, planet)
    }

    fn troop_ship(u: &mut Universe, sys: ObjectId, planet: ObjectId, troops: f32) -> ObjectId {
        let fleet = u.create_fleet("T", sys, Some(EmpireId(1)), FleetAggression::Passive, 0).unwrap();
        let ship = u.create_test_ship(fleet, Some(EmpireId(1)), 0.0, 0).unwrap();
        let s = u.ship_mut(ship).unwrap();
        s.troop_capacity = troops;
        s.ordered_invade_planet = Some(planet);
        ship
    }

    #[test]
    fn successful_invasion_captures_planet() {
        let (mut u, mut em, sys, planet) = invasion_setup(3.0);
        let ship = troop_ship(&mut u, sys, planet, 6.0);
        assert_eq!(handle_invasion(&mut u, &mut em, 4), vec![planet]);
        assert!(u.get(ship).is_none());
        let p = u.get(planet).unwrap();
        assert_eq!(p.owner, Some(EmpireId(1)));
        assert_eq!(p.meters.current(MeterType::Troops), 3.0);
        assert_eq!(em.get(EmpireId(1)).unwrap().planets_invaded, 1);
        assert!(em
            .get(EmpireId(2))
            .unwrap()
            .sitreps
            .iter()
            .any(|s| matches!(s.kind, SitRepKind::PlanetCaptured { .. })));
    }

    #[test]
    fn stalemate_leaves_planet_unowned() {
        let (mut u, mut em, sys, planet) = invasion_setup(10.0);
        let ship = troop_ship(&mut u, sys, planet, 10.0);
        assert_eq!(handle_invasion(&mut u, &mut em, 4), vec![planet]);
        assert!(u.get(ship).is_none());
        let p = u.get(planet).unwrap();
        assert_eq!(p.owner, None);
        assert_eq!(p.meters.current(MeterType::Troops), 0.0);
    }

    #[test]
    fn captured_building_loses_previous_owners_scrap_order() {
        let (mut u, mut em, sys, planet) = invasion_setup(1.0);
        let building = u.add_building(planet, "BLD_MILITARY_COMMAND", Some(EmpireId(2)), 0).unwrap();
        u.building_mut(building).unwrap().ordered_scrapped = true;
        troop_ship(&mut u, sys, planet, 5.0);

        assert_eq!(handle_invasion(&mut u, &mut em, 4), vec![planet]);
        assert_eq!(u.get(building).unwrap().owner, Some(EmpireId(1)));
        assert!(!u.building(building).unwrap().ordered_scrapped);
        assert!(crate::resolve::handle_scrapping(&mut u, &mut em, 4).is_empty());
        assert!(u.get(building).is_some());
    }

    #[test]
    fn failed_invasion_still_consumes_ships() {
        let (mut u, mut em, sys, planet) = invasion_setup(10.0);
        let ship = troop_ship(&mut u, sys, planet, 4.0);
        assert!(handle_invasion(&mut u, &mut em, 4).is_empty());
        assert!(u.get(ship).is_none());
        assert_eq!(u.get(planet).unwrap().meters.current(MeterType::Troops), 6.0);
    }
}
