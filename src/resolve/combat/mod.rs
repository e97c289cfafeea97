//! Combat: eligibility, per-system resolution, and result dissemination.

pub mod apply;
pub mod auto;
pub mod conditions;
pub mod info;
pub mod log;

pub use self::apply::apply_combat_results;
pub use self::auto::{AutoResolveCombat, CombatResolver};
pub use self::conditions::combat_conditions_in_system;
pub use self::info::{CombatEvent, CombatInfo};
pub use self::log::{CombatLog, CombatLogManager};

use crate::empire::EmpireManager;
use crate::universe::{ObjectId, ObjectType, Universe};

/// Runs every qualifying battle this turn, each in isolation and in
/// ascending system order. Returns the systems where combat happened.
pub fn process_combats(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    logs: &mut CombatLogManager,
    resolver: &dyn CombatResolver,
    monster_detection_strength: f32,
    turn: i32,
) -> Vec<ObjectId> {
    let systems: Vec<ObjectId> = universe
        .ids_of_type(ObjectType::System)
        .into_iter()
        .filter(|&sys| combat_conditions_in_system(universe, empires, sys, monster_detection_strength))
        .collect();

    for &system in &systems {
        let mut info = CombatInfo::new(universe, empires, system, turn, monster_detection_strength);
        resolver.resolve(&mut info);
        let log_id = logs.add(&info);
        ::log::info!("combat at {} resolved as log {}", system, log_id);
        apply_combat_results(universe, empires, &info, log_id);
    }
    systems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empire::{Empire, SitRepKind};
    use crate::universe::{update_empire_object_visibilities, EmpireId, FleetAggression, MeterType, StarType};

    #[test]
    fn battle_updates_universe_stats_and_logs() {
        let mut u = Universe::new();
        let sys = u.add_system("X", 0.0, 0.0, StarType::Yellow, 1, 0);
        let quiet = u.add_system("Y", 90.0, 0.0, StarType::Red, 1, 0);
        let mut em = EmpireManager::new();
        em.insert(Empire::new(EmpireId(1), "A", "a"));
        em.insert(Empire::new(EmpireId(2), "B", "b"));

        let hunter = u.create_fleet("H", sys, Some(EmpireId(1)), FleetAggression::Aggressive, 0).unwrap();
        let gun = u.create_test_ship(hunter, Some(EmpireId(1)), 50.0, 0).unwrap();
        u.get_mut(gun).unwrap().meters.set(MeterType::Detection, 50.0);
        let prey = u.create_fleet("P", sys, Some(EmpireId(2)), FleetAggression::Passive, 0).unwrap();
        let victim = u.create_test_ship(prey, Some(EmpireId(2)), 0.0, 0).unwrap();
        update_empire_object_visibilities(&mut u, &em);

        let mut logs = CombatLogManager::new();
        let resolver = AutoResolveCombat::default();
        let systems = process_combats(&mut u, &mut em, &mut logs, &resolver, 10.0, 5);

        assert_eq!(systems, vec![sys]);
        assert!(!systems.contains(&quiet));
        assert!(u.get(victim).is_none());
        assert!(u.get(prey).is_none());
        assert!(u.known_destroyed(EmpireId(2)).contains(&victim));
        assert_eq!(em.get(EmpireId(1)).unwrap().ships_destroyed.get("SD_TEST"), Some(&1));
        assert_eq!(em.get(EmpireId(2)).unwrap().ships_lost.get("SD_TEST"), Some(&1));
        assert_eq!(logs.ids_for_empire(EmpireId(2)), vec![0]);
        assert_eq!(u.system(sys).unwrap().last_turn_battle_here, 5);
        assert_eq!(u.get(gun).unwrap().meters.initial(MeterType::Structure), 10.0);
        assert!(em
            .get(EmpireId(2))
            .unwrap()
            .sitreps
            .iter()
            .any(|s| s.kind == SitRepKind::CombatOccurred { system: sys, log_id: 0 }));
    }

    #[test]
    fn survivors_get_a_damage_report() {
        let mut u = Universe::new();
        let sys = u.add_system("X", 0.0, 0.0, StarType::Yellow, 1, 0);
        let mut em = EmpireManager::new();
        em.insert(Empire::new(EmpireId(1), "A", "a"));
        em.insert(Empire::new(EmpireId(2), "B", "b"));

        let hunter = u.create_fleet("H", sys, Some(EmpireId(1)), FleetAggression::Aggressive, 0).unwrap();
        let gun = u.create_test_ship(hunter, Some(EmpireId(1)), 5.0, 0).unwrap();
        u.get_mut(gun).unwrap().meters.set(MeterType::Detection, 50.0);
        let prey = u.create_fleet("P", sys, Some(EmpireId(2)), FleetAggression::Passive, 0).unwrap();
        let tank = u.create_test_ship(prey, Some(EmpireId(2)), 0.0, 0).unwrap();
        let meters = &mut u.get_mut(tank).unwrap().meters;
        meters.set(MeterType::Structure, 1000.0);
        meters.set(MeterType::MaxStructure, 1000.0);
        update_empire_object_visibilities(&mut u, &em);

        let mut logs = CombatLogManager::new();
        process_combats(&mut u, &mut em, &mut logs, &AutoResolveCombat::default(), 10.0, 5);

        assert!(u.get(tank).is_some());
        let lost = 1000.0 - u.get(tank).unwrap().meters.current(MeterType::Structure);
        assert!(lost > 0.0);
        let reports: Vec<&SitRepKind> = em
            .get(EmpireId(2))
            .unwrap()
            .sitreps
            .iter()
            .map(|s| &s.kind)
            .filter(|k| matches!(k, SitRepKind::ObjectDamaged { .. }))
            .collect();
        assert_eq!(reports, vec![&SitRepKind::ObjectDamaged { object: tank, system: sys, damage: lost }]);
        assert!(!em
            .get(EmpireId(1))
            .unwrap()
            .sitreps
            .iter()
            .any(|s| matches!(s.kind, SitRepKind::ObjectDamaged { .. })));
    }
}
