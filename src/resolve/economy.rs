//! Empire economy: resource pools, production, research, influence.
//!
//! Pools are recomputed after supply, one task per empire on a bounded
//! rayon pool. Each task reads the universe and supply map and writes only
//! its own empire's pools, so no locking is needed.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use rayon::prelude::*;

use super::supply::SupplyManager;
use crate::content::{GameRules, TechEffect};
use crate::empire::{
    advance_policy_turns, compute_resource_pools, Empire, EmpireManager, FocusChange, ProductionKind,
    SitRepKind,
};
use crate::universe::{EmpireId, FleetAggression, ObjectId, Universe};

/// Progress within this of the cost counts as complete.
const COST_EPSILON: f32 = 1e-4;

/// Records every owned planet whose focus differs from its start-of-turn
/// focus in the owner's focus history, then makes the new focus the
/// baseline.
pub fn record_focus_changes(universe: &mut Universe, empires: &mut EmpireManager, turn: i32) {
    for obj in universe.iter_mut() {
        let Some(owner) = obj.owner else { continue };
        let id = obj.id;
        let Some(planet) = obj.as_planet_mut() else { continue };
        if planet.focus == planet.initial_focus {
            continue;
        }
        if let Some(empire) = empires.get_mut(owner) {
            empire.focus_history.push(FocusChange {
                turn,
                planet: id,
                from: planet.initial_focus,
                to: planet.focus,
            });
        }
        planet.last_turn_focus_changed = turn;
        planet.initial_focus = planet.focus;
    }
}

/// Recomputes every living empire's resource pools from the current supply
/// groups, with up to `threads` workers. Falls back to a sequential pass if
/// the worker pool cannot be built.
pub fn update_resource_pools(
    universe: &Universe,
    empires: &mut EmpireManager,
    supply: &SupplyManager,
    rules: &GameRules,
    threads: usize,
) {
    let compute = |empire: &mut Empire| {
        if empire.eliminated {
            return;
        }
        let pools = compute_resource_pools(empire, universe, supply.resource_groups(empire.id), rules);
        empire.pools = pools;
    };

    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| {
            empires.map_mut().par_iter_mut().for_each(|(_, empire)| compute(empire));
        }),
        Err(e) => {
            warn!("resource pool workers unavailable ({}), updating sequentially", e);
            empires.map_mut().values_mut().for_each(|empire| compute(empire));
        }
    }
}

/// Cost and minimum build time of a production item.
fn production_cost(rules: &GameRules, kind: &ProductionKind) -> Option<(f32, u32)> {
    match kind {
        ProductionKind::Ship { design } => rules.design(design).map(|d| (d.cost, d.min_turns)),
        ProductionKind::Building { building_type } => {
            rules.building(building_type).map(|b| (b.cost, b.min_turns))
        }
    }
}

/// Spends each empire's industry on its production queue in queue order and
/// spawns whatever completes. Industry is only spent in the resource group
/// containing the item's location, and no item takes more than
/// `cost / min_turns` in one turn. Items whose location was lost are dropped.
/// Returns the ids of created objects.
pub fn process_production(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    rules: &GameRules,
    turn: i32,
) -> Vec<ObjectId> {
    let mut created = Vec::new();
    for empire_id in empires.living_ids() {
        let Some(empire) = empires.get_mut(empire_id) else { continue };
        let mut items = std::mem::take(&mut empire.production_queue.items);
        let mut kept = Vec::with_capacity(items.len());

        for mut item in items.drain(..) {
            item.allocated = 0.0;
            let location_owned = universe.get(item.location).is_some_and(|p| p.owned_by(empire_id));
            let Some((cost, min_turns)) = production_cost(rules, &item.kind).filter(|_| location_owned)
            else {
                debug!("{} drops {} at {}", empire_id, item.kind, item.location);
                empire.add_sitrep(
                    turn,
                    SitRepKind::ProductionDropped {
                        item: item.kind.name().to_string(),
                        location: item.location,
                    },
                );
                continue;
            };

            let group = universe
                .get(item.location)
                .and_then(|p| p.system_id)
                .and_then(|sys| empire.pools.group_of(sys));
            let Some(group) = group else {
                kept.push(item);
                continue;
            };
            let per_turn = cost / min_turns.max(1) as f32;
            let available = empire.pools.groups[group].available();
            let spend = per_turn.min(cost - item.progress).min(available).max(0.0);
            empire.pools.groups[group].spent += spend;
            item.progress += spend;
            item.allocated = spend;
            if spend > 0.0 {
                item.turns_in_progress += 1;
            }

            if item.progress + COST_EPSILON >= cost {
                match spawn_item(universe, rules, empire_id, &item.kind, item.location, turn) {
                    Some(id) => {
                        created.push(id);
                        empire.add_sitrep(
                            turn,
                            SitRepKind::ProductionComplete {
                                item: item.kind.name().to_string(),
                                location: item.location,
                            },
                        );
                    }
                    None => warn!("{} could not place {} at {}", empire_id, item.kind, item.location),
                }
                item.remaining = item.remaining.saturating_sub(1);
                item.progress = 0.0;
                item.turns_in_progress = 0;
            }
            if item.remaining > 0 {
                kept.push(item);
            }
        }
        empire.production_queue.items = kept;
    }
    created
}

/// Places a finished item at `location`. Ships form a new fleet in the
/// location's system, crewed by the planet's species.
fn spawn_item(
    universe: &mut Universe,
    rules: &GameRules,
    empire: EmpireId,
    kind: &ProductionKind,
    location: ObjectId,
    turn: i32,
) -> Option<ObjectId> {
    match kind {
        ProductionKind::Ship { design } => {
            let design = rules.design(design)?;
            let (system, species) = {
                let obj = universe.get(location)?;
                (obj.system_id?, obj.as_planet()?.species.clone())
            };
            let aggression = if design.weapons.iter().any(|&w| w > 0.0) {
                FleetAggression::Obstructive
            } else {
                FleetAggression::Passive
            };
            let fleet = universe.create_fleet("New fleet", system, Some(empire), aggression, turn).ok()?;
            universe.create_ship_from_design(fleet, design, species, turn).ok()
        }
        ProductionKind::Building { building_type } => {
            universe.add_building(location, building_type, Some(empire), turn).ok()
        }
    }
}

/// Applies one researched tech's effects to its empire.
pub fn apply_tech_effects(empire: &mut Empire, rules: &GameRules, tech: &str) {
    let Some(tech) = rules.tech(tech) else { return };
    for effect in &tech.effects {
        match effect {
            TechEffect::DetectionStrength(strength) => {
                empire.detection_strength = empire.detection_strength.max(*strength);
            }
            TechEffect::SupplyRange(bonus) => empire.supply_range_bonus += bonus,
            TechEffect::PolicySlot(category) => {
                *empire.policy_slots.entry(*category).or_default() += 1;
            }
            TechEffect::UnlockDesign(design) => {
                empire.available_designs.insert(design.clone());
            }
            TechEffect::UnlockBuilding(building) => {
                empire.available_buildings.insert(building.clone());
            }
            TechEffect::MaxTroops(bonus) => empire.troops_bonus += bonus,
        }
    }
}

/// Spends each empire's research on its queue in order. A tech whose
/// prerequisites are not yet known waits without taking points. Returns the
/// techs completed, per empire.
pub fn process_research(empires: &mut EmpireManager, rules: &GameRules, turn: i32) -> Vec<(EmpireId, String)> {
    let mut completed = Vec::new();
    for empire_id in empires.living_ids() {
        let Some(empire) = empires.get_mut(empire_id) else { continue };
        let mut budget = (empire.pools.research - empire.pools.research_spent).max(0.0);
        let mut finished = Vec::new();

        for name in empire.research_queue.techs.clone() {
            if empire.researched_techs.contains(&name) {
                finished.push(name);
                continue;
            }
            let Some(tech) = rules.tech(&name) else {
                finished.push(name);
                continue;
            };
            if !tech.prerequisites.iter().all(|p| empire.researched_techs.contains(p)) {
                continue;
            }
            let progress = empire.research_queue.progress(&name);
            let per_turn = tech.cost / tech.min_turns.max(1) as f32;
            let spend = per_turn.min(tech.cost - progress).min(budget).max(0.0);
            budget -= spend;
            empire.pools.research_spent += spend;
            let progress = progress + spend;
            if progress + COST_EPSILON >= tech.cost {
                empire.research_queue.progress.remove(&name);
                empire.researched_techs.insert(name.clone());
                apply_tech_effects(empire, rules, &name);
                empire.add_sitrep(turn, SitRepKind::TechResearched { tech: name.clone() });
                info!("{} researched {}", empire_id, name);
                completed.push((empire_id, name.clone()));
                finished.push(name);
            } else {
                empire.research_queue.progress.insert(name, progress);
            }
        }
        let finished: BTreeSet<String> = finished.into_iter().collect();
        empire.research_queue.techs.retain(|t| !finished.contains(t));
    }
    completed
}

/// Adds influence income less policy upkeep to each living empire's
/// stockpile and advances policy adoption counters.
pub fn update_influence(empires: &mut EmpireManager) {
    for empire in empires.iter_mut().filter(|e| !e.eliminated) {
        let upkeep = empire.policy_upkeep();
        empire.influence_stockpile += empire.pools.influence_income - upkeep;
        advance_policy_turns(empire);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empire::{AdoptedPolicy, GroupPool, ProductionItem};
    use crate::universe::{Focus, MeterType, Planet, PlanetSize, PlanetType, StarType};

    fn home() -> (Universe, EmpireManager, ObjectId, ObjectId) {
        let mut u = Universe::new();
        let sys = u.add_system("Sol", 0.0, 0.0, StarType::Yellow, 3, 0);
        let mut planet = Planet::new(PlanetType::Terran, PlanetSize::Medium, 0);
        planet.species = Some("SP_HUMAN".to_string());
        let p = u.add_planet(sys, "Earth", planet, 0).unwrap();
        let obj = u.get_mut(p).unwrap();
        obj.owner = Some(EmpireId(1));
        obj.meters.set(MeterType::Population, 10.0);
        let mut em = EmpireManager::new();
        em.insert(Empire::with_rules(EmpireId(1), "Terrans", "alice", &GameRules::default()));
        (u, em, sys, p)
    }

    fn fund(em: &mut EmpireManager, sys: ObjectId, industry: f32) {
        let empire = em.get_mut(EmpireId(1)).unwrap();
        empire.pools.groups = vec![GroupPool {
            systems: BTreeSet::from([sys]),
            industry,
            spent: 0.0,
        }];
    }

    #[test]
    fn production_is_capped_per_turn_and_spawns_a_fleet() {
        let (mut u, mut em, sys, p) = home();
        let rules = GameRules::default();
        // SD_FRIGATE: cost 25 over at least 3 turns.
        em.get_mut(EmpireId(1)).unwrap().production_queue.push(ProductionItem::new(
            ProductionKind::Ship { design: "SD_FRIGATE".to_string() },
            p,
            1,
        ));
        let mut created = Vec::new();
        for turn in 1..=3 {
            fund(&mut em, sys, 100.0);
            created.extend(process_production(&mut u, &mut em, &rules, turn));
            let spent = em.get(EmpireId(1)).unwrap().pools.groups[0].spent;
            assert!((spent - 25.0 / 3.0).abs() < 1e-3);
        }
        assert_eq!(created.len(), 1);
        let ship = u.ship(created[0]).unwrap();
        assert_eq!(ship.design, "SD_FRIGATE");
        let fleet = u.get(ship.fleet_id).unwrap();
        assert_eq!(fleet.owner, Some(EmpireId(1)));
        assert_eq!(fleet.system_id, Some(sys));
        assert_eq!(fleet.as_fleet().unwrap().aggression, FleetAggression::Obstructive);
        assert!(em.get(EmpireId(1)).unwrap().production_queue.is_empty());
    }

    #[test]
    fn production_waits_without_industry_in_group() {
        let (mut u, mut em, _, p) = home();
        em.get_mut(EmpireId(1)).unwrap().production_queue.push(ProductionItem::new(
            ProductionKind::Building { building_type: "BLD_SHIPYARD_BASE".to_string() },
            p,
            1,
        ));
        process_production(&mut u, &mut em, &GameRules::default(), 1);
        let queue = &em.get(EmpireId(1)).unwrap().production_queue;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.items[0].progress, 0.0);
    }

    #[test]
    fn lost_location_drops_item() {
        let (mut u, mut em, sys, p) = home();
        em.get_mut(EmpireId(1)).unwrap().production_queue.push(ProductionItem::new(
            ProductionKind::Ship { design: "SD_SCOUT".to_string() },
            p,
            2,
        ));
        u.get_mut(p).unwrap().owner = Some(EmpireId(2));
        fund(&mut em, sys, 50.0);
        process_production(&mut u, &mut em, &GameRules::default(), 1);
        let empire = em.get(EmpireId(1)).unwrap();
        assert!(empire.production_queue.is_empty());
        assert!(matches!(empire.sitreps[0].kind, SitRepKind::ProductionDropped { .. }));
    }

    #[test]
    fn research_completes_and_unlocks() {
        let (_, mut em, _, _) = home();
        let rules = GameRules::default();
        let empire = em.get_mut(EmpireId(1)).unwrap();
        empire.research_queue.insert("SHP_ZORTRIUM_PLATE".to_string(), None);
        empire.research_queue.insert("SPY_DETECT_3".to_string(), None);
        // 40 over 4 turns.
        for turn in 1..=4 {
            em.get_mut(EmpireId(1)).unwrap().pools.research = 100.0;
            em.get_mut(EmpireId(1)).unwrap().pools.research_spent = 0.0;
            process_research(&mut em, &rules, turn);
        }
        let empire = em.get(EmpireId(1)).unwrap();
        assert!(empire.researched_techs.contains("SHP_ZORTRIUM_PLATE"));
        assert!(empire.available_designs.contains("SD_CRUISER"));
        // Prerequisite SPY_DETECT_2 is unknown, so it never started.
        assert_eq!(empire.research_queue.techs, vec!["SPY_DETECT_3".to_string()]);
        assert_eq!(empire.research_queue.progress("SPY_DETECT_3"), 0.0);
    }

    #[test]
    fn tech_effects_stack_on_empire() {
        let rules = GameRules::default();
        let mut empire = Empire::with_rules(EmpireId(1), "A", "a", &rules);
        apply_tech_effects(&mut empire, &rules, "SPY_DETECT_2");
        apply_tech_effects(&mut empire, &rules, "SOC_PLANETARY_ADMIN");
        apply_tech_effects(&mut empire, &rules, "DEF_GARRISON_1");
        assert_eq!(empire.detection_strength, 30.0);
        assert_eq!(empire.slots(crate::content::PolicyCategory::Social), 2);
        assert_eq!(empire.troops_bonus, 4.0);
        assert!(empire.available_buildings.contains("BLD_MILITARY_COMMAND"));
    }

    #[test]
    fn influence_pays_policy_upkeep() {
        let (_, mut em, _, _) = home();
        let empire = em.get_mut(EmpireId(1)).unwrap();
        empire.influence_stockpile = 5.0;
        empire.pools.influence_income = 3.0;
        empire.adopted_policies.insert(
            "PLC_CENTRALIZATION".to_string(),
            AdoptedPolicy {
                category: crate::content::PolicyCategory::Economic,
                adoption_turn: 1,
                adoption_cost: 10.0,
                current_turns_adopted: 0,
            },
        );
        update_influence(&mut em);
        let empire = em.get(EmpireId(1)).unwrap();
        assert!((empire.influence_stockpile - 7.0).abs() < 1e-4);
        assert_eq!(empire.adopted_policies["PLC_CENTRALIZATION"].current_turns_adopted, 1);
    }

    #[test]
    fn focus_changes_are_recorded_once() {
        let (mut u, mut em, _, p) = home();
        u.planet_mut(p).unwrap().focus = Some(Focus::Research);
        record_focus_changes(&mut u, &mut em, 4);
        record_focus_changes(&mut u, &mut em, 4);
        let history = &em.get(EmpireId(1)).unwrap().focus_history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to, Some(Focus::Research));
        assert_eq!(u.planet(p).unwrap().last_turn_focus_changed, 4);
    }

    #[test]
    fn parallel_pools_match_sequential() {
        let (mut u, mut em, sys, p) = home();
        u.get_mut(p).unwrap().meters.set(MeterType::Industry, 6.0);
        em.insert(Empire::new(EmpireId(2), "B", "b"));
        let mut supply = SupplyManager::new();
        em.get_mut(EmpireId(1)).unwrap().explored_systems.insert(sys);
        u.get_mut(p).unwrap().meters.set(MeterType::Supply, 1.0);
        supply.update(&u, &em);
        let rules = GameRules::default();

        let mut single = em.clone();
        update_resource_pools(&u, &mut single, &supply, &rules, 1);
        update_resource_pools(&u, &mut em, &supply, &rules, 4);
        assert_eq!(single, em);
        assert_eq!(em.get(EmpireId(1)).unwrap().pools.total_industry(), 6.0);
    }
}
