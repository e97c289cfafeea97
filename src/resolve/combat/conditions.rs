//! Combat eligibility.

use std::collections::BTreeSet;

use log::trace;

use crate::empire::EmpireManager;
use crate::universe::{is_detectable, EmpireId, MeterType, ObjectId, Universe, UniverseObject, Visibility};

/// Whether a battle happens in `system` this turn.
///
/// Requires at least two distinct owners among the fleets and the owned or
/// populated planets present (unowned counts as an owner), at least one
/// armed fleet able to start a fight, and for at least one such aggressor,
/// a hostile fleet or planet its owner can see. Monsters see whatever their
/// detection strength pierces.
pub fn combat_conditions_in_system(
    universe: &Universe,
    empires: &EmpireManager,
    system: ObjectId,
    monster_detection_strength: f32,
) -> bool {
    let contents: Vec<&UniverseObject> = universe
        .objects_in_system(system)
        .into_iter()
        .filter_map(|id| universe.get(id))
        .collect();

    let owners: BTreeSet<Option<EmpireId>> = contents
        .iter()
        .filter(|o| o.as_fleet().is_some() || (o.as_planet().is_some() && (o.owner.is_some() || o.is_populated_planet())))
        .map(|o| o.owner)
        .collect();
    if owners.len() < 2 {
        return false;
    }

    let aggressors: BTreeSet<Option<EmpireId>> = contents
        .iter()
        .filter(|o| {
            let Some(fleet) = o.as_fleet() else { return false };
            let armed = universe.fleet_is_armed(o.id);
            armed && (fleet.aggression.can_initiate_combat() || (o.unowned() && fleet.aggression.can_obstruct()))
        })
        .map(|o| o.owner)
        .collect();
    if aggressors.is_empty() {
        return false;
    }

    let result = aggressors.iter().any(|&aggressor| {
        contents.iter().any(|target| {
            let targetable = target.as_fleet().is_some()
                || (target.as_planet().is_some() && (target.owner.is_some() || target.is_populated_planet()));
            if !targetable || !empires.hostile(aggressor, target.owner) {
                return false;
            }
            match aggressor {
                Some(e) => universe.visibility(e, target.id) >= Visibility::Partial,
                None => monster_detects(universe, target, monster_detection_strength),
            }
        })
    });
    trace!("combat conditions at {}: {}", system, result);
    result
}

/// A fleet is detected if any of its ships is. Uses start-of-turn stealth.
fn monster_detects(universe: &Universe, target: &UniverseObject, strength: f32) -> bool {
    if target.as_fleet().is_some() {
        return universe
            .fleet_ships(target.id)
            .into_iter()
            .filter_map(|s| universe.get(s))
            .any(|s| is_detectable(s.meters.initial(MeterType::Stealth), strength));
    }
    is_detectable(target.meters.initial(MeterType::Stealth), strength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empire::{DiplomaticStatus, Empire};
    use crate::universe::{update_empire_object_visibilities, FleetAggression, StarType};

    fn setup() -> (Universe, EmpireManager, ObjectId) {
        let mut u = Universe::new();
        let sys = u.add_system("X", 0.0, 0.0, StarType::Yellow, 2, 0);
        let mut em = EmpireManager::new();
        em.insert(Empire::new(EmpireId(1), "A", "a"));
        em.insert(Empire::new(EmpireId(2), "B", "b"));
        (u, em, sys)
    }

    fn armed_fleet(
        u: &mut Universe,
        sys: ObjectId,
        owner: Option<EmpireId>,
        aggression: FleetAggression,
    ) -> ObjectId {
        let fleet = u.create_fleet("F", sys, owner, aggression, 0).unwrap();
        let ship = u.create_test_ship(fleet, owner, 5.0, 0).unwrap();
        u.get_mut(ship).unwrap().meters.set(MeterType::Detection, 50.0);
        fleet
    }

    #[test]
    fn passive_fleets_never_fight() {
        let (mut u, em, sys) = setup();
        armed_fleet(&mut u, sys, Some(EmpireId(1)), FleetAggression::Passive);
        armed_fleet(&mut u, sys, Some(EmpireId(2)), FleetAggression::Passive);
        update_empire_object_visibilities(&mut u, &em);
        assert!(!combat_conditions_in_system(&u, &em, sys, 10.0));
    }

    #[test]
    fn visible_enemy_triggers_combat() {
        let (mut u, em, sys) = setup();
        armed_fleet(&mut u, sys, Some(EmpireId(1)), FleetAggression::Aggressive);
        armed_fleet(&mut u, sys, Some(EmpireId(2)), FleetAggression::Passive);
        update_empire_object_visibilities(&mut u, &em);
        assert!(combat_conditions_in_system(&u, &em, sys, 10.0));
    }

    #[test]
    fn cloaked_enemy_does_not_trigger_combat() {
        let (mut u, em, sys) = setup();
        armed_fleet(&mut u, sys, Some(EmpireId(1)), FleetAggression::Aggressive);
        let cloaked = armed_fleet(&mut u, sys, Some(EmpireId(2)), FleetAggression::Passive);
        for ship in u.fleet_ships(cloaked) {
            u.get_mut(ship).unwrap().meters.set(MeterType::Stealth, 45.0);
        }
        update_empire_object_visibilities(&mut u, &em);
        assert!(!combat_conditions_in_system(&u, &em, sys, 10.0));
    }

    #[test]
    fn peace_prevents_combat() {
        let (mut u, mut em, sys) = setup();
        em.set_status(EmpireId(1), EmpireId(2), DiplomaticStatus::Peace);
        armed_fleet(&mut u, sys, Some(EmpireId(1)), FleetAggression::Aggressive);
        armed_fleet(&mut u, sys, Some(EmpireId(2)), FleetAggression::Aggressive);
        update_empire_object_visibilities(&mut u, &em);
        assert!(!combat_conditions_in_system(&u, &em, sys, 10.0));
    }

    #[test]
    fn monsters_attack_what_they_detect() {
        let (mut u, em, sys) = setup();
        armed_fleet(&mut u, sys, None, FleetAggression::Aggressive);
        let prey = armed_fleet(&mut u, sys, Some(EmpireId(1)), FleetAggression::Passive);
        update_empire_object_visibilities(&mut u, &em);
        assert!(combat_conditions_in_system(&u, &em, sys, 10.0));

        for ship in u.fleet_ships(prey) {
            u.get_mut(ship).unwrap().meters.set(MeterType::Stealth, 25.0);
        }
        assert!(!combat_conditions_in_system(&u, &em, sys, 10.0));
    }
}
