//! Colonization pass.
//!
//! Ships flagged to colonize are grouped by target planet. A planet targeted
//! by more than one empire in the same turn is colonized by nobody. A lone
//! colonizer is still blocked by an armed obstructive fleet that is hostile
//! to it.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::empire::{EmpireManager, SitRepKind};
use crate::universe::{EmpireId, Focus, MeterType, ObjectId, Universe};

/// Resolves every pending colonize order. Returns the colonized planets.
pub fn handle_colonization(universe: &mut Universe, empires: &mut EmpireManager, turn: i32) -> Vec<ObjectId> {
    // planet -> empire -> ships
    let mut claims: BTreeMap<ObjectId, BTreeMap<EmpireId, Vec<ObjectId>>> = BTreeMap::new();
    for obj in universe.iter() {
        let Some(ship) = obj.as_ship() else { continue };
        let (Some(planet), Some(owner)) = (ship.ordered_colonize_planet, obj.owner) else { continue };
        claims.entry(planet).or_default().entry(owner).or_default().push(obj.id);
    }

    let mut colonized = Vec::new();
    for (planet, by_empire) in claims {
        let all_ships: Vec<ObjectId> = by_empire.values().flatten().copied().collect();

        if by_empire.len() > 1 {
            let rivals: Vec<EmpireId> = by_empire.keys().copied().collect();
            debug!("colonization of {} contested by {:?}", planet, rivals);
            for &empire in &rivals {
                let others = rivals.iter().copied().filter(|&e| e != empire).collect();
                if let Some(e) = empires.get_mut(empire) {
                    e.add_sitrep(turn, SitRepKind::ColonizationConflict { planet, rivals: others });
                }
            }
            cancel(universe, planet, &all_ships);
            continue;
        }

        let Some((&empire, ships)) = by_empire.iter().next() else { continue };
        let ship = ships[0];

        let Some(system) = universe.get(planet).and_then(|p| p.system_id) else {
            cancel(universe, planet, &all_ships);
            continue;
        };
        let still_valid = universe.get(planet).is_some_and(|p| {
            p.owner.is_none() && p.meters.current(MeterType::Population) <= 0.0
        }) && universe.get(ship).and_then(|s| s.system_id) == Some(system);
        if !still_valid {
            cancel(universe, planet, &all_ships);
            continue;
        }

        let obstructed = universe.has_obstructive_fleet(system, |f| empires.hostile(f.owner, Some(empire)));
        if obstructed {
            if let Some(e) = empires.get_mut(empire) {
                e.add_sitrep(turn, SitRepKind::ColonizationObstructed { planet });
            }
            cancel(universe, planet, &all_ships);
            continue;
        }

        let Some((species, capacity)) = universe
            .ship(ship)
            .map(|s| (s.species.clone(), s.colony_capacity))
        else {
            continue;
        };
        let species = if capacity > 0.0 { species } else { None };

        if let Some(obj) = universe.get_mut(planet) {
            obj.owner = Some(empire);
            obj.meters.set(MeterType::Population, capacity.max(0.0));
            if let Some(p) = obj.as_planet_mut() {
                p.species = species.clone();
                p.focus = species.as_ref().map(|_| Focus::Industry);
                p.initial_focus = p.focus;
                p.last_turn_colonized = turn;
                p.is_about_to_be_colonized = false;
            }
        }
        // Extra ships of the same empire keep existing.
        cancel(universe, planet, &ships[1..]);
        universe.destroy(ship);

        info!("{} colonized {} ({})", empire, planet, species.as_deref().unwrap_or("outpost"));
        if let Some(e) = empires.get_mut(empire) {
            e.explored_systems.insert(system);
            e.add_sitrep(turn, SitRepKind::PlanetColonized { planet, species });
        }
        colonized.push(planet);
    }
    colonized
}

fn cancel(universe: &mut Universe, planet: ObjectId, ships: &[ObjectId]) {
    for &ship in ships {
        if let Some(s) = universe.ship_mut(ship) {
            s.ordered_colonize_planet = None;
        }
    }
    if let Some(p) = universe.planet_mut(planet) {
        p.is_about_to_be_colonized = false;
    }
}
