//! Writing battle results back into the universe.

use std::collections::BTreeSet;

use log::debug;

use super::info::{CombatEvent, CombatInfo};
use crate::empire::{EmpireManager, SitRepKind};
use crate::universe::{EmpireId, MeterType, ObjectId, ObjectKind, Universe, UniverseObject, Visibility};

const DAMAGE_METERS: [MeterType; 3] = [MeterType::Structure, MeterType::Shield, MeterType::Defense];

/// Applies a resolved battle: copies surviving participants' meters and
/// combat bookkeeping back, destroys what died, records kills and losses,
/// merges what each side learned, and issues sitreps, including a damage
/// report to the owner of every survivor that lost meters. Touched objects are
/// back-propagated so later meter effects start from post-battle values.
pub fn apply_combat_results(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    info: &CombatInfo,
    log_id: u64,
) -> Vec<ObjectId> {
    let mut touched = Vec::new();
    let mut damaged = Vec::new();
    for (&id, snapshot) in &info.objects {
        if info.destroyed.contains(&id) {
            continue;
        }
        let Some(obj) = universe.get_mut(id) else { continue };
        let damage = damage_taken(obj, snapshot);
        if let (Some(owner), true) = (obj.owner, damage > 0.0) {
            damaged.push((owner, id, damage));
        }
        obj.meters = snapshot.meters.clone();
        match (&mut obj.kind, &snapshot.kind) {
            (ObjectKind::Ship(live), ObjectKind::Ship(snap)) => {
                live.last_turn_active_in_combat = snap.last_turn_active_in_combat;
            }
            (ObjectKind::Planet(live), ObjectKind::Planet(snap)) => {
                live.last_turn_attacked_by_ship = snap.last_turn_attacked_by_ship;
            }
            _ => {}
        }
        touched.push(id);
    }
    universe.back_propagate_object_meters(&touched);

    record_kills(empires, info);

    // What each side saw, including attackers revealed by their fire.
    for (&empire, vis) in &info.empire_visibility {
        for (&id, &level) in vis {
            if universe.contains(id) {
                universe.raise_visibility(empire, id, level);
            }
        }
    }
    let participants = info.empires();
    let mut destroyed = Vec::new();
    for &id in &info.destroyed {
        let owner = info.objects.get(&id).and_then(|o| o.owner);
        for &empire in &participants {
            let saw = info
                .empire_visibility
                .get(&empire)
                .and_then(|m| m.get(&id))
                .is_some_and(|v| *v >= Visibility::Basic);
            if saw || owner == Some(empire) {
                universe.add_known_destroyed(empire, id);
                if let Some(e) = empires.get_mut(empire) {
                    e.add_sitrep(info.turn, SitRepKind::ObjectDestroyed { object: id, system: info.system });
                }
            }
        }
        destroyed.extend(universe.destroy(id));
    }

    if let Some(sys) = universe.get_mut(info.system).and_then(|o| o.as_system_mut()) {
        sys.last_turn_battle_here = info.turn;
    }
    for &empire in &participants {
        if let Some(e) = empires.get_mut(empire) {
            e.add_sitrep(info.turn, SitRepKind::CombatOccurred { system: info.system, log_id });
        }
    }
    for (owner, object, damage) in damaged {
        if let Some(e) = empires.get_mut(owner) {
            e.add_sitrep(info.turn, SitRepKind::ObjectDamaged { object, system: info.system, damage });
        }
    }
    debug!(
        "battle at {} (log {}): {} events, {} destroyed",
        info.system,
        log_id,
        info.events.len(),
        destroyed.len()
    );
    destroyed
}

fn damage_taken(before: &UniverseObject, after: &UniverseObject) -> f32 {
    DAMAGE_METERS
        .iter()
        .map(|&m| (before.meters.current(m) - after.meters.current(m)).max(0.0))
        .sum()
}

/// Each destroyed ship counts once as a kill for every empire that hit it
/// and once as a loss for its owner.
fn record_kills(empires: &mut EmpireManager, info: &CombatInfo) {
    let mut kills: BTreeSet<(EmpireId, ObjectId)> = BTreeSet::new();
    for event in &info.events {
        if let CombatEvent::WeaponFire { attacker_owner: Some(by), target, .. } = event {
            if info.destroyed.contains(target) {
                kills.insert((*by, *target));
            }
        }
    }
    let design_of = |id: ObjectId| info.objects.get(&id).and_then(|o| o.as_ship()).map(|s| s.design.clone());
    for (by, target) in kills {
        if let (Some(design), Some(e)) = (design_of(target), empires.get_mut(by)) {
            e.record_ship_destroyed(&design);
        }
    }
    for &id in &info.destroyed {
        let owner = info.objects.get(&id).and_then(|o| o.owner);
        if let (Some(design), Some(e)) = (design_of(id), owner.and_then(|o| empires.get_mut(o))) {
            e.record_ship_lost(&design);
        }
    }
}
