//! Fleet movement.
//!
//! Fleets consume the route computed when their move order was applied, up
//! to their speed for the turn. Monster fleets move first and obstruction is
//! recomputed before owned fleets move, so a monster leaving a system does not
//! blockade it for the rest of the turn.
//!
//! A fleet arriving in a system obstructed for it stops there, and until the
//! blockade lifts it may only leave back along the lane it came in by.

use std::collections::VecDeque;

use log::debug;

use crate::empire::{EmpireManager, SitRepKind};
use crate::universe::{EmpireId, MeterType, ObjectId, ObjectType, Universe};

use super::supply::SupplyManager;

/// Clears the per-turn arrival flags. Called at the start of each turn.
pub fn clear_arrival_flags(universe: &mut Universe) {
    for obj in universe.iter_mut() {
        if let Some(f) = obj.as_fleet_mut() {
            f.arrived_this_turn = false;
        }
    }
}

/// Moves every fleet with a route. Returns the fleets that entered at least
/// one system this turn.
pub fn move_fleets(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    supply: &mut SupplyManager,
    turn: i32,
) -> Vec<ObjectId> {
    let (monsters, owned): (Vec<ObjectId>, Vec<ObjectId>) = universe
        .ids_of_type(ObjectType::Fleet)
        .into_iter()
        .partition(|&id| universe.get(id).is_some_and(|o| o.unowned()));

    let mut arrived = Vec::new();
    for fleet in monsters {
        if move_fleet(universe, empires, supply, fleet, turn) {
            arrived.push(fleet);
        }
    }
    supply.update_unobstructed_systems(universe, empires, true);
    for fleet in owned {
        if move_fleet(universe, empires, supply, fleet, turn) {
            arrived.push(fleet);
        }
    }
    arrived
}

fn move_fleet(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    supply: &SupplyManager,
    fleet: ObjectId,
    turn: i32,
) -> bool {
    let Some(obj) = universe.get(fleet) else { return false };
    let Some(f) = obj.as_fleet() else { return false };
    if f.travel_route.is_empty() {
        return false;
    }
    let owner = obj.owner;
    let current = obj.system_id;
    let arrival_lane = f.arrival_starlane;
    let mut route: VecDeque<ObjectId> = f.travel_route.iter().copied().collect();
    let mut last_system = current.or(f.prev_system);
    let (mut x, mut y) = (obj.x, obj.y);

    let speed = universe.fleet_speed(fleet);
    if speed <= 0.0 {
        return false;
    }

    if let (Some(sys), Some(empire)) = (current, owner) {
        let restricted = arrival_lane != Some(sys) && !supply.unobstructed(empire, sys);
        if restricted && route.front().copied() != arrival_lane {
            debug!("{} is blockaded at {}", fleet, sys);
            stop(universe, fleet);
            if let Some(e) = empires.get_mut(empire) {
                e.add_sitrep(turn, SitRepKind::FleetBlockaded { fleet, system: sys });
            }
            return false;
        }
        if !can_depart(universe, supply, fleet, empire, route[0]) {
            debug!("{} lacks fuel to leave {}", fleet, sys);
            stop(universe, fleet);
            return false;
        }
    }

    let mut remaining = speed;
    let mut arrived = false;
    while let Some(&next) = route.front() {
        if remaining <= 0.0 {
            break;
        }
        let Some((nx, ny)) = universe.get(next).map(|s| (s.x, s.y)) else {
            route.clear();
            break;
        };
        let dist = ((nx - x).powi(2) + (ny - y).powi(2)).sqrt();
        if dist > remaining {
            let t = remaining / dist;
            x += (nx - x) * t;
            y += (ny - y) * t;
            universe.set_fleet_position(fleet, x, y, None);
            break;
        }

        remaining -= dist;
        x = nx;
        y = ny;
        route.pop_front();
        universe.set_fleet_position(fleet, x, y, Some(next));
        arrived = true;
        let blockaded = arrive(universe, empires, supply, fleet, owner, next, last_system, turn);
        last_system = Some(next);

        if blockaded && !route.is_empty() {
            route.clear();
            if let Some(e) = owner.and_then(|o| empires.get_mut(o)) {
                e.add_sitrep(turn, SitRepKind::FleetBlockaded { fleet, system: next });
            }
            break;
        }
        match (owner, route.front()) {
            (Some(empire), Some(&after)) if !can_depart(universe, supply, fleet, empire, after) => {
                debug!("{} stops at {}: out of fuel", fleet, next);
                route.clear();
            }
            (Some(empire), None) => {
                if let Some(e) = empires.get_mut(empire) {
                    e.add_sitrep(turn, SitRepKind::FleetArrived { fleet, system: next });
                }
            }
            _ => {}
        }
    }

    if let Some(f) = universe.fleet_mut(fleet) {
        f.travel_route = route.into();
        f.prev_system = last_system;
        f.next_system = f.travel_route.first().copied();
    }
    arrived
}

/// Handles entering `system`. Returns true if the system is obstructed for
/// the fleet's owner.
#[allow(clippy::too_many_arguments)]
fn arrive(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    supply: &SupplyManager,
    fleet: ObjectId,
    owner: Option<EmpireId>,
    system: ObjectId,
    from: Option<ObjectId>,
    turn: i32,
) -> bool {
    let obstructed = owner.is_some_and(|e| !supply.unobstructed(e, system));
    if let Some(f) = universe.fleet_mut(fleet) {
        f.arrived_this_turn = true;
        f.arrival_starlane = if obstructed { from.or(Some(system)) } else { Some(system) };
    }

    let supplied = owner.map_or(true, |e| supply.fleet_supplyable(e, system));
    for ship in universe.fleet_ships(fleet) {
        if let Some(s) = universe.ship_mut(ship) {
            s.arrived_on_turn = turn;
        }
        if !supplied {
            if let Some(obj) = universe.get_mut(ship) {
                let fuel = obj.meters.current(MeterType::Fuel);
                obj.meters.set_current(MeterType::Fuel, (fuel - 1.0).max(0.0));
            }
        }
    }
    if let Some(e) = owner.and_then(|o| empires.get_mut(o)) {
        e.explored_systems.insert(system);
    }
    obstructed
}

/// Ships need a unit of fuel to jump into a system outside friendly supply.
fn can_depart(universe: &Universe, supply: &SupplyManager, fleet: ObjectId, empire: EmpireId, to: ObjectId) -> bool {
    supply.fleet_supplyable(empire, to) || universe.fleet_fuel(fleet) >= 1.0
}

fn stop(universe: &mut Universe, fleet: ObjectId) {
    if let Some(f) = universe.fleet_mut(fleet) {
        f.clear_route();
    }
}
