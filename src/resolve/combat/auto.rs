//! The default combat resolver.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::universe::{FleetAggression, MeterType, ObjectId, ObjectKind};

use super::info::{CombatEvent, CombatInfo};

/// Resolves one battle in place.
pub trait CombatResolver {
    fn resolve(&self, info: &mut CombatInfo);
}

/// Bout-based auto resolution.
///
/// Each bout, every armed ship whose fleet is not passive fires each of its
/// weapons at a random visible hostile target, and every planet with defense
/// fires once for its defense value. Ship damage comes off structure; planet
/// damage comes off shields first, then defense. The order of fire and the
/// target choice come from a generator seeded by the game seed, turn, and
/// system, so replays reproduce.
#[derive(Debug, Clone)]
pub struct AutoResolveCombat {
    pub bouts: u32,
    pub seed: u64,
}

impl Default for AutoResolveCombat {
    fn default() -> Self {
        AutoResolveCombat { bouts: 4, seed: 0 }
    }
}

struct Shot {
    attacker: ObjectId,
    damage: f32,
}

impl AutoResolveCombat {
    pub fn new(bouts: u32, seed: u64) -> Self {
        AutoResolveCombat { bouts, seed }
    }

    fn rng_for(&self, info: &CombatInfo) -> SmallRng {
        let mix = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add((info.turn as u64) << 32)
            .wrapping_add(info.system.0 as u64);
        SmallRng::seed_from_u64(mix)
    }

    fn shots(info: &CombatInfo) -> Vec<Shot> {
        let mut shots = Vec::new();
        for (&id, obj) in &info.objects {
            if !info.is_alive(id) {
                continue;
            }
            match &obj.kind {
                ObjectKind::Ship(ship) => {
                    let passive = info
                        .objects
                        .get(&ship.fleet_id)
                        .and_then(|f| f.as_fleet())
                        .map_or(true, |f| f.aggression == FleetAggression::Passive);
                    if passive {
                        continue;
                    }
                    for &damage in ship.weapons.iter().filter(|&&d| d > 0.0) {
                        shots.push(Shot { attacker: id, damage });
                    }
                }
                ObjectKind::Planet(_) => {
                    let defense = obj.meters.current(MeterType::Defense);
                    if defense > 0.0 {
                        shots.push(Shot { attacker: id, damage: defense });
                    }
                }
                _ => {}
            }
        }
        shots
    }

    fn targets(info: &CombatInfo, attacker: ObjectId) -> Vec<ObjectId> {
        let Some(owner) = info.objects.get(&attacker).map(|o| o.owner) else { return Vec::new() };
        info.objects
            .values()
            .filter(|o| info.is_alive(o.id))
            .filter(|o| match &o.kind {
                ObjectKind::Ship(_) => true,
                ObjectKind::Planet(_) => o.owner.is_some() || o.is_populated_planet(),
                _ => false,
            })
            .filter(|o| info.hostile(owner, o.owner) && info.can_see(owner, o.id))
            .map(|o| o.id)
            .collect()
    }

    fn fire(info: &mut CombatInfo, bout: u32, attacker: ObjectId, target: ObjectId, damage: f32) {
        let attacker_owner = info.objects.get(&attacker).and_then(|o| o.owner);
        let turn = info.turn;
        let Some(obj) = info.objects.get_mut(&target) else { return };
        let target_owner = obj.owner;
        let destroyed = match &mut obj.kind {
            ObjectKind::Ship(_) => {
                let structure = obj.meters.current(MeterType::Structure) - damage;
                obj.meters.set_current(MeterType::Structure, structure.max(0.0));
                structure <= 0.0
            }
            ObjectKind::Planet(planet) => {
                planet.last_turn_attacked_by_ship = turn;
                let shield = obj.meters.current(MeterType::Shield);
                let through = (damage - shield).max(0.0);
                obj.meters.set_current(MeterType::Shield, (shield - damage).max(0.0));
                let defense = obj.meters.current(MeterType::Defense);
                obj.meters.set_current(MeterType::Defense, (defense - through).max(0.0));
                false
            }
            _ => false,
        };
        if let Some(ship) = info.objects.get_mut(&attacker).and_then(|o| o.as_ship_mut()) {
            ship.last_turn_active_in_combat = turn;
        }
        info.events.push(CombatEvent::WeaponFire {
            bout,
            attacker,
            attacker_owner,
            target,
            target_owner,
            damage,
        });
        if let Some(owner) = target_owner {
            info.reveal(owner, attacker);
            if let Some(fleet) = info.objects.get(&attacker).and_then(|o| o.as_ship()).map(|s| s.fleet_id) {
                info.reveal(owner, fleet);
            }
        }
        if destroyed {
            info.destroyed.insert(target);
            info.events.push(CombatEvent::Destroyed { bout, object: target, owner: target_owner });
        }
    }
}

impl CombatResolver for AutoResolveCombat {
    fn resolve(&self, info: &mut CombatInfo) {
        let mut rng = self.rng_for(info);
        for bout in 1..=self.bouts {
            let mut shots = Self::shots(info);
            shots.shuffle(&mut rng);
            let mut fired = false;
            for shot in shots {
                // Ships destroyed earlier in the bout still get their shots off.
                let targets = Self::targets(info, shot.attacker);
                let Some(&target) = targets.choose(&mut rng) else { continue };
                Self::fire(info, bout, shot.attacker, target, shot.damage);
                fired = true;
            }
            if !fired {
                break;
            }
        }
        // Fleets whose ships all died go with them.
        let dead_fleets: Vec<ObjectId> = info
            .objects
            .values()
            .filter_map(|o| o.as_fleet().map(|f| (o.id, f)))
            .filter(|(_, f)| !f.ships.is_empty() && f.ships.iter().all(|s| info.destroyed.contains(s)))
            .map(|(id, _)| id)
            .collect();
        info.destroyed.extend(dead_fleets);
    }
}
