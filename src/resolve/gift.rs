//! Gifting pass.

use log::{debug, info};

use crate::empire::{EmpireManager, SitRepKind};
use crate::universe::{EmpireId, ObjectId, ObjectKind, ObjectType, Universe};

use super::invade::transfer_planet;

/// Transfers every object flagged for gifting whose recipient owns another
/// object in the same system. Objects consumed earlier in the turn are gone
/// from the arena and are skipped. Returns the transferred ids.
pub fn handle_gifting(universe: &mut Universe, empires: &mut EmpireManager, turn: i32) -> Vec<ObjectId> {
    let pending: Vec<(ObjectId, EmpireId)> = universe
        .iter()
        .filter_map(|obj| {
            let to = match &obj.kind {
                ObjectKind::Fleet(f) => f.ordered_given_to_empire,
                ObjectKind::Ship(s) => s.ordered_given_to_empire,
                ObjectKind::Planet(p) => p.ordered_given_to_empire,
                ObjectKind::Building(b) => b.ordered_given_to_empire,
                _ => None,
            }?;
            Some((obj.id, to))
        })
        .collect();

    let mut gifted = Vec::new();
    for (id, recipient) in pending {
        clear_gift_flag(universe, id);
        let Some(obj) = universe.get(id) else { continue };
        let (Some(giver), Some(system)) = (obj.owner, obj.system_id) else { continue };
        if giver == recipient {
            continue;
        }
        let recipient_alive = empires.get(recipient).is_some_and(|e| !e.eliminated);
        let present = universe
            .objects_in_system(system)
            .into_iter()
            .filter(|&other| other != id)
            .any(|other| universe.get(other).is_some_and(|o| o.owned_by(recipient)));
        if !recipient_alive || !present {
            debug!("gift of {} to {} dropped: recipient not present in {}", id, recipient, system);
            continue;
        }

        match obj.object_type() {
            ObjectType::Fleet => give_fleet(universe, id, recipient),
            ObjectType::Ship => give_ship(universe, id, system, recipient, turn),
            ObjectType::Planet => {
                transfer_planet(universe, empires, id, Some(recipient));
                let moved = empires
                    .get_mut(giver)
                    .map(|e| e.production_queue.take_items_at(id))
                    .unwrap_or_default();
                if let Some(e) = empires.get_mut(recipient) {
                    for item in moved {
                        e.production_queue.push(item);
                    }
                }
            }
            ObjectType::Building => {
                universe.set_owner(id, Some(recipient));
                if let Some(b) = universe.building_mut(id) {
                    b.clear_order_flags();
                }
            }
            _ => continue,
        }

        info!("{} gave {} to {}", giver, id, recipient);
        if let Some(e) = empires.get_mut(giver) {
            e.add_sitrep(turn, SitRepKind::ObjectGifted { object: id, to: recipient });
        }
        if let Some(e) = empires.get_mut(recipient) {
            e.add_sitrep(turn, SitRepKind::ObjectReceived { object: id, from: giver });
        }
        gifted.push(id);
    }
    gifted
}

fn clear_gift_flag(universe: &mut Universe, id: ObjectId) {
    let Some(obj) = universe.get_mut(id) else { return };
    match &mut obj.kind {
        ObjectKind::Fleet(f) => f.ordered_given_to_empire = None,
        ObjectKind::Ship(s) => s.ordered_given_to_empire = None,
        ObjectKind::Planet(p) => p.ordered_given_to_empire = None,
        ObjectKind::Building(b) => b.ordered_given_to_empire = None,
        _ => {}
    }
}

fn give_fleet(universe: &mut Universe, fleet: ObjectId, recipient: EmpireId) {
    for ship in universe.fleet_ships(fleet) {
        universe.set_owner(ship, Some(recipient));
        if let Some(s) = universe.ship_mut(ship) {
            s.clear_order_flags();
        }
    }
    universe.set_owner(fleet, Some(recipient));
    if let Some(f) = universe.fleet_mut(fleet) {
        f.clear_route();
    }
}

/// A single ship leaves its fleet and forms a new fleet for the recipient.
fn give_ship(universe: &mut Universe, ship: ObjectId, system: ObjectId, recipient: EmpireId, turn: i32) {
    let aggression = universe
        .ship(ship)
        .and_then(|s| universe.fleet(s.fleet_id))
        .map(|f| f.aggression);
    let Some(aggression) = aggression else { return };
    let fleet = match universe.create_fleet("Gifted fleet", system, Some(recipient), aggression, turn) {
        Ok(fleet) => fleet,
        Err(e) => {
            debug!("could not create fleet for gifted ship {}: {}", ship, e);
            return;
        }
    };
    if let Err(e) = universe.move_ship_to_fleet(ship, fleet) {
        debug!("could not move gifted ship {}: {}", ship, e);
        universe.destroy(fleet);
        return;
    }
    universe.set_owner(ship, Some(recipient));
    if let Some(s) = universe.ship_mut(ship) {
        s.clear_order_flags();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empire::{Empire, ProductionItem, ProductionKind};
    use crate::universe::{FleetAggression, Planet, PlanetSize, PlanetType, StarType};

    fn setup() -> (Universe, EmpireManager, ObjectId, ObjectId) {
        let mut u = Universe::new();
        let a = u.add_system("A", 0.0, 0.0, StarType::Yellow, 2, 0);
        let b = u.add_system("B", 50.0, 0.0, StarType::Yellow, 2, 0);
        u.add_starlane(a, b).unwrap();
        let mut em = EmpireManager::new();
        for i in 1..=3 {
            em.insert(Empire::new(EmpireId(i), "E", "p"));
        }
        (u, em, a, b)
    }

    fn fleet_with_ship(u: &mut Universe, sys: ObjectId, owner: EmpireId) -> (ObjectId, ObjectId) {
        let fleet = u.create_fleet("F", sys, Some(owner), FleetAggression::Passive, 0).unwrap();
        let ship = u.create_test_ship(fleet, Some(owner), 0.0, 0).unwrap();
        (fleet, ship)
    }

    #[test]
    fn fleet_gift_requires_recipient_presence() {
        let (mut u, mut em, a, b) = setup();
        let (fleet, _) = fleet_with_ship(&mut u, a, EmpireId(1));
        fleet_with_ship(&mut u, b, EmpireId(3));
        u.fleet_mut(fleet).unwrap().ordered_given_to_empire = Some(EmpireId(3));
        assert!(handle_gifting(&mut u, &mut em, 1).is_empty());
        assert_eq!(u.get(fleet).unwrap().owner, Some(EmpireId(1)));
        assert!(u.fleet(fleet).unwrap().ordered_given_to_empire.is_none());
    }

    #[test]
    fn fleet_gift_transfers_fleet_and_ships() {
        let (mut u, mut em, a, _) = setup();
        let (fleet, ship) = fleet_with_ship(&mut u, a, EmpireId(1));
        fleet_with_ship(&mut u, a, EmpireId(2));
        u.ship_mut(ship).unwrap().ordered_scrapped = true;
        u.fleet_mut(fleet).unwrap().ordered_given_to_empire = Some(EmpireId(2));
        assert_eq!(handle_gifting(&mut u, &mut em, 1), vec![fleet]);
        assert_eq!(u.get(fleet).unwrap().owner, Some(EmpireId(2)));
        assert_eq!(u.get(ship).unwrap().owner, Some(EmpireId(2)));
        assert!(!u.ship(ship).unwrap().ordered_scrapped);
        assert!(em
            .get(EmpireId(2))
            .unwrap()
            .sitreps
            .iter()
            .any(|s| matches!(s.kind, SitRepKind::ObjectReceived { .. })));
    }

    #[test]
    fn single_ship_gift_forms_new_fleet() {
        let (mut u, mut em, a, _) = setup();
        let (fleet, ship) = fleet_with_ship(&mut u, a, EmpireId(1));
        let keep = u.create_test_ship(fleet, Some(EmpireId(1)), 0.0, 0).unwrap();
        fleet_with_ship(&mut u, a, EmpireId(2));
        u.ship_mut(ship).unwrap().ordered_given_to_empire = Some(EmpireId(2));
        handle_gifting(&mut u, &mut em, 1);
        let new_fleet = u.ship(ship).unwrap().fleet_id;
        assert_ne!(new_fleet, fleet);
        assert_eq!(u.get(new_fleet).unwrap().owner, Some(EmpireId(2)));
        assert_eq!(u.fleet_ships(fleet), vec![keep]);
        assert_eq!(u.verify_containment(), 0);
    }

    #[test]
    fn planet_gift_moves_buildings_and_production() {
        let (mut u, mut em, a, _) = setup();
        let planet = u
            .add_planet(a, "P", Planet::new(PlanetType::Terran, PlanetSize::Medium, 0), 0)
            .unwrap();
        u.get_mut(planet).unwrap().owner = Some(EmpireId(1));
        let building = u.add_building(planet, "BLD_SHIPYARD_BASE", Some(EmpireId(1)), 0).unwrap();
        fleet_with_ship(&mut u, a, EmpireId(2));
        let item = ProductionKind::Ship { design: "SD_SCOUT".into() };
        em.get_mut(EmpireId(1))
            .unwrap()
            .production_queue
            .push(ProductionItem::new(item.clone(), planet, 1));
        u.planet_mut(planet).unwrap().ordered_given_to_empire = Some(EmpireId(2));

        assert_eq!(handle_gifting(&mut u, &mut em, 1), vec![planet]);
        assert_eq!(u.get(building).unwrap().owner, Some(EmpireId(2)));
        assert!(em.get(EmpireId(1)).unwrap().production_queue.is_empty());
        assert!(em.get(EmpireId(2)).unwrap().production_queue.contains(&item, planet));
    }

    fn owned_building(u: &mut Universe, sys: ObjectId, owner: EmpireId) -> ObjectId {
        let planet = u
            .add_planet(sys, "P", Planet::new(PlanetType::Terran, PlanetSize::Medium, 0), 0)
            .unwrap();
        u.get_mut(planet).unwrap().owner = Some(owner);
        let building = u.add_building(planet, "BLD_SHIPYARD_BASE", Some(owner), 0).unwrap();
        let b = u.building_mut(building).unwrap();
        b.ordered_scrapped = true;
        b.ordered_given_to_empire = Some(EmpireId(2));
        building
    }

    #[test]
    fn failed_building_gift_keeps_scrap_order() {
        let (mut u, mut em, a, b) = setup();
        let building = owned_building(&mut u, a, EmpireId(1));
        fleet_with_ship(&mut u, b, EmpireId(2));

        assert!(handle_gifting(&mut u, &mut em, 1).is_empty());
        assert!(u.building(building).unwrap().ordered_scrapped);
        assert_eq!(crate::resolve::handle_scrapping(&mut u, &mut em, 1), vec![building]);
        assert!(u.get(building).is_none());
    }

    #[test]
    fn successful_building_gift_wins_over_scrap() {
        let (mut u, mut em, a, _) = setup();
        let building = owned_building(&mut u, a, EmpireId(1));
        fleet_with_ship(&mut u, a, EmpireId(2));

        assert_eq!(handle_gifting(&mut u, &mut em, 1), vec![building]);
        assert_eq!(u.get(building).unwrap().owner, Some(EmpireId(2)));
        assert!(crate::resolve::handle_scrapping(&mut u, &mut em, 1).is_empty());
    }

    #[test]
    fn consumed_objects_are_not_gifted() {
        let (mut u, mut em, a, _) = setup();
        let (fleet, ship) = fleet_with_ship(&mut u, a, EmpireId(1));
        fleet_with_ship(&mut u, a, EmpireId(2));
        u.fleet_mut(fleet).unwrap().ordered_given_to_empire = Some(EmpireId(2));
        u.destroy(ship);
        assert!(handle_gifting(&mut u, &mut em, 1).is_empty());
    }
}
