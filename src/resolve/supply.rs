//! Supply propagation and obstruction.
//!
//! Each empire projects supply range from its planets. Range spreads along
//! starlanes into explored systems, losing one per jump, and does not spread
//! out of systems obstructed for that empire. Where non-allied empires reach
//! the same system, the highest score keeps it:
//!
//! score = range + [`PLANET_BONUS`] if the empire owns a planet there
//!               + [`INCUMBENT_BONUS`] if it supplied the system last turn
//!
//! Ties go to the lower empire id. Losers are barred from the system and
//! propagation reruns; the barred set only grows, so this terminates.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::empire::EmpireManager;
use crate::universe::{EmpireId, MeterType, ObjectId, ObjectType, Universe};

pub const PLANET_BONUS: f32 = 0.5;
pub const INCUMBENT_BONUS: f32 = 0.25;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SupplyManager {
    /// Supply range each empire holds in each system after contests.
    ranges: BTreeMap<EmpireId, BTreeMap<ObjectId, f32>>,
    /// Systems where each empire's fleets are resupplied (own plus allied).
    fleet_supplyable: BTreeMap<EmpireId, BTreeSet<ObjectId>>,
    /// Connected groups of each empire's supplied systems.
    resource_groups: BTreeMap<EmpireId, Vec<BTreeSet<ObjectId>>>,
    /// Systems each empire can move and project supply through freely.
    unobstructed: BTreeMap<EmpireId, BTreeSet<ObjectId>>,
}

impl SupplyManager {
    pub fn new() -> Self {
        SupplyManager::default()
    }

    /// Systems supplied by `empire` (its own range, not allies').
    pub fn supplied_systems(&self, empire: EmpireId) -> BTreeSet<ObjectId> {
        self.ranges
            .get(&empire)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn range(&self, empire: EmpireId, system: ObjectId) -> Option<f32> {
        self.ranges.get(&empire).and_then(|m| m.get(&system)).copied()
    }

    pub fn fleet_supplyable(&self, empire: EmpireId, system: ObjectId) -> bool {
        self.fleet_supplyable
            .get(&empire)
            .is_some_and(|s| s.contains(&system))
    }

    pub fn resource_groups(&self, empire: EmpireId) -> &[BTreeSet<ObjectId>] {
        self.resource_groups.get(&empire).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn unobstructed(&self, empire: EmpireId, system: ObjectId) -> bool {
        self.unobstructed.get(&empire).is_some_and(|s| s.contains(&system))
    }

    /// Empires supplying `system`, ascending.
    pub fn suppliers_of(&self, system: ObjectId) -> Vec<EmpireId> {
        self.ranges
            .iter()
            .filter(|(_, m)| m.contains_key(&system))
            .map(|(&e, _)| e)
            .collect()
    }

    /// Recomputes which systems each living empire may move and supply
    /// through. A system is obstructed for an empire when a hostile armed
    /// obstructive fleet is there and the empire has no armed fleet holding
    /// the system. Before combat, fleets that only arrived this turn do not
    /// hold a system.
    pub fn update_unobstructed_systems(
        &mut self,
        universe: &Universe,
        empires: &EmpireManager,
        precombat: bool,
    ) {
        self.unobstructed.clear();
        let systems = universe.ids_of_type(ObjectType::System);
        for empire in empires.iter().filter(|e| !e.eliminated) {
            let id = empire.id;
            let mut free = BTreeSet::new();
            for &sys in &systems {
                let blockaded = universe.has_obstructive_fleet(sys, |f| empires.hostile(f.owner, Some(id)));
                if !blockaded || holds_system(universe, id, sys, precombat) {
                    free.insert(sys);
                }
            }
            self.unobstructed.insert(id, free);
        }
    }

    /// Recomputes supply ranges, contests, fleet supply and resource groups.
    pub fn update(&mut self, universe: &Universe, empires: &EmpireManager) {
        let previous: BTreeMap<EmpireId, BTreeSet<ObjectId>> = self
            .ranges
            .iter()
            .map(|(&e, m)| (e, m.keys().copied().collect()))
            .collect();

        let living: Vec<EmpireId> = empires.living_ids();
        let mut sources: BTreeMap<EmpireId, BTreeMap<ObjectId, f32>> = BTreeMap::new();
        let mut planet_systems: BTreeMap<EmpireId, BTreeSet<ObjectId>> = BTreeMap::new();
        for obj in universe.iter() {
            let (Some(owner), Some(sys)) = (obj.owner, obj.system_id) else { continue };
            if obj.as_planet().is_none() || !living.contains(&owner) {
                continue;
            }
            planet_systems.entry(owner).or_default().insert(sys);
            let range = obj.meters.current(MeterType::Supply).max(0.0).floor();
            let best = sources.entry(owner).or_default().entry(sys).or_insert(range);
            *best = best.max(range);
        }

        let mut barred: BTreeSet<(EmpireId, ObjectId)> = BTreeSet::new();
        let mut ranges: BTreeMap<EmpireId, BTreeMap<ObjectId, f32>>;
        loop {
            ranges = BTreeMap::new();
            for &empire in &living {
                let Some(src) = sources.get(&empire) else { continue };
                let explored = empires.get(empire).map(|e| &e.explored_systems);
                let propagated = self.propagate(universe, empire, src, explored, &barred);
                ranges.insert(empire, propagated);
            }

            let mut newly_barred = Vec::new();
            let mut contested: BTreeMap<ObjectId, Vec<(EmpireId, f32)>> = BTreeMap::new();
            for (&empire, m) in &ranges {
                for (&sys, &range) in m {
                    let mut score = range;
                    if planet_systems.get(&empire).is_some_and(|s| s.contains(&sys)) {
                        score += PLANET_BONUS;
                    }
                    if previous.get(&empire).is_some_and(|s| s.contains(&sys)) {
                        score += INCUMBENT_BONUS;
                    }
                    contested.entry(sys).or_default().push((empire, score));
                }
            }
            for (sys, mut claims) in contested {
                if claims.len() < 2 {
                    continue;
                }
                // Highest score first, then lowest id.
                claims.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
                let winner = claims[0].0;
                for &(empire, _) in &claims[1..] {
                    if !empires.are_allied(winner, empire) {
                        newly_barred.push((empire, sys));
                    }
                }
            }
            let mut changed = false;
            for entry in newly_barred {
                changed |= barred.insert(entry);
            }
            if !changed {
                break;
            }
        }

        self.fleet_supplyable.clear();
        self.resource_groups.clear();
        for &empire in &living {
            let own: BTreeSet<ObjectId> = ranges
                .get(&empire)
                .map(|m| m.keys().copied().collect())
                .unwrap_or_default();
            let mut fleet = own.clone();
            for (&other, m) in &ranges {
                if empires.are_allied(empire, other) {
                    fleet.extend(m.keys().copied());
                }
            }
            self.resource_groups.insert(empire, connected_groups(universe, &own));
            self.fleet_supplyable.insert(empire, fleet);
            debug!("{} supplies {} systems", empire, own.len());
        }
        self.ranges = ranges;
    }

    fn propagate(
        &self,
        universe: &Universe,
        empire: EmpireId,
        sources: &BTreeMap<ObjectId, f32>,
        explored: Option<&BTreeSet<ObjectId>>,
        barred: &BTreeSet<(EmpireId, ObjectId)>,
    ) -> BTreeMap<ObjectId, f32> {
        let mut ranges: BTreeMap<ObjectId, f32> = BTreeMap::new();
        let mut queue: VecDeque<ObjectId> = VecDeque::new();
        for (&sys, &range) in sources {
            if barred.contains(&(empire, sys)) {
                continue;
            }
            ranges.insert(sys, range);
            queue.push_back(sys);
        }
        while let Some(sys) = queue.pop_front() {
            let range = ranges.get(&sys).copied().unwrap_or(0.0);
            if range < 1.0 || !self.unobstructed(empire, sys) {
                continue;
            }
            for next in universe.starlanes(sys) {
                if barred.contains(&(empire, next)) {
                    continue;
                }
                if !explored.is_some_and(|e| e.contains(&next)) {
                    continue;
                }
                let candidate = range - 1.0;
                if ranges.get(&next).map_or(true, |&r| candidate > r) {
                    ranges.insert(next, candidate);
                    queue.push_back(next);
                }
            }
        }
        ranges
    }
}

/// An empire holds a system if it has an armed, blockade-capable fleet
/// there that is not newly arrived (before combat).
fn holds_system(universe: &Universe, empire: EmpireId, system: ObjectId, precombat: bool) -> bool {
    universe.fleets_in_system(system).into_iter().any(|fid| {
        let Some(obj) = universe.get(fid) else { return false };
        let Some(fleet) = obj.as_fleet() else { return false };
        obj.owned_by(empire)
            && fleet.aggression.can_obstruct()
            && universe.fleet_is_armed(fid)
            && !(precombat && fleet.arrived_this_turn)
    })
}

/// Splits `systems` into starlane-connected components.
fn connected_groups(universe: &Universe, systems: &BTreeSet<ObjectId>) -> Vec<BTreeSet<ObjectId>> {
    let mut groups = Vec::new();
    let mut seen: BTreeSet<ObjectId> = BTreeSet::new();
    for &start in systems {
        if !seen.insert(start) {
            continue;
        }
        let mut group = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(sys) = queue.pop_front() {
            for next in universe.starlanes(sys) {
                if systems.contains(&next) && seen.insert(next) {
                    group.insert(next);
                    queue.push_back(next);
                }
            }
        }
        groups.push(group);
    }
    groups
}
