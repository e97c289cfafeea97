//! Elimination and victory checks, run once per turn after production.

use log::info;

use crate::config::ServerConfig;
use crate::empire::{DiplomaticStatus, EmpireManager, SitRepKind};
use crate::universe::{EmpireId, Universe};

pub const VICTORY_ALL_ENEMIES_ELIMINATED: &str = "VICTORY_ALL_ENEMIES_ELIMINATED";
pub const VICTORY_FEW_HUMANS_ALIVE: &str = "VICTORY_FEW_HUMANS_ALIVE";

/// Game options the victory checks consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VictoryRules {
    pub alliance_victory: bool,
    pub diplomacy_enabled: bool,
    /// Zero disables the few-humans-alive check.
    pub human_victory_threshold: usize,
}

impl From<&ServerConfig> for VictoryRules {
    fn from(config: &ServerConfig) -> Self {
        VictoryRules {
            alliance_victory: config.alliance_victory,
            diplomacy_enabled: config.diplomacy_enabled,
            human_victory_threshold: config.human_victory_threshold,
        }
    }
}

/// An empire is out once it owns no populated planet and no ship.
pub fn empire_eliminated(universe: &Universe, empire: EmpireId) -> bool {
    !universe
        .iter()
        .any(|o| o.owned_by(empire) && (o.is_populated_planet() || o.as_ship().is_some()))
}

/// Flags `empire` as eliminated and releases whatever it still owns
/// (outposts, buildings) to nobody. Every empire is told.
pub fn eliminate_empire(universe: &mut Universe, empires: &mut EmpireManager, empire: EmpireId, turn: i32) {
    let Some(record) = empires.get_mut(empire) else { return };
    record.eliminate();
    for id in universe.owned_by(empire) {
        universe.set_owner(id, None);
    }
    universe.forget_empire(empire);
    for e in empires.iter_mut() {
        e.add_sitrep(turn, SitRepKind::EmpireEliminated { empire });
    }
    info!("{} eliminated on turn {}", empire, turn);
}

/// Whether the surviving human empires may share a victory: always when
/// alliance victory is off; otherwise no pair may be at war, and without
/// diplomacy only an alliance counts.
fn humans_may_share_victory(empires: &EmpireManager, humans: &[EmpireId], rules: &VictoryRules) -> bool {
    if !rules.alliance_victory {
        return true;
    }
    humans.iter().enumerate().all(|(i, &a)| {
        humans[i + 1..].iter().all(|&b| match empires.status(a, b) {
            DiplomaticStatus::Allied => true,
            DiplomaticStatus::Peace => rules.diplomacy_enabled,
            DiplomaticStatus::War => false,
        })
    })
}

fn grant_victory(empires: &mut EmpireManager, empire: EmpireId, reason: &str, turn: i32) {
    let Some(e) = empires.get_mut(empire) else { return };
    if e.win(reason) {
        e.add_sitrep(turn, SitRepKind::Victory { reason: reason.to_string() });
        info!("{} wins: {}", empire, reason);
    }
}

/// Eliminates empires with nothing left, then awards victories. Both
/// victory conditions are independent and may fire in the same turn.
/// Returns the empires eliminated this turn.
pub fn check_victory(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    rules: &VictoryRules,
    turn: i32,
) -> Vec<EmpireId> {
    let eliminated: Vec<EmpireId> = empires
        .living_ids()
        .into_iter()
        .filter(|&e| empire_eliminated(universe, e))
        .collect();
    for &empire in &eliminated {
        eliminate_empire(universe, empires, empire, turn);
    }

    let living = empires.living_ids();
    if empires.len() > 1 && living.len() == 1 {
        grant_victory(empires, living[0], VICTORY_ALL_ENEMIES_ELIMINATED, turn);
    }

    let humans: Vec<EmpireId> = living
        .iter()
        .copied()
        .filter(|&e| empires.get(e).is_some_and(|e| !e.ai_controlled))
        .collect();
    if rules.human_victory_threshold > 0
        && !humans.is_empty()
        && humans.len() <= rules.human_victory_threshold
        && humans_may_share_victory(empires, &humans, rules)
    {
        for &empire in &humans {
            grant_victory(empires, empire, VICTORY_FEW_HUMANS_ALIVE, turn);
        }
    }
    eliminated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empire::Empire;
    use crate::universe::{FleetAggression, MeterType, Planet, PlanetSize, PlanetType, StarType};

    fn rules(threshold: usize) -> VictoryRules {
        VictoryRules { alliance_victory: true, diplomacy_enabled: true, human_victory_threshold: threshold }
    }

    fn galaxy(n: i32) -> (Universe, EmpireManager, Vec<crate::universe::ObjectId>) {
        let mut u = Universe::new();
        let sys = u.add_system("X", 0.0, 0.0, StarType::Yellow, 4, 0);
        let mut em = EmpireManager::new();
        let mut fleets = Vec::new();
        for i in 1..=n {
            em.insert(Empire::new(EmpireId(i), &format!("E{}", i), &format!("p{}", i)));
            let fleet = u.create_fleet("F", sys, Some(EmpireId(i)), FleetAggression::Passive, 0).unwrap();
            u.create_test_ship(fleet, Some(EmpireId(i)), 0.0, 0).unwrap();
            fleets.push(fleet);
        }
        (u, em, fleets)
    }

    #[test]
    fn empire_with_outpost_only_is_eliminated() {
        let (mut u, mut em, fleets) = galaxy(3);
        let sys = u.get(fleets[0]).unwrap().system_id.unwrap();
        let outpost = u
            .add_planet(sys, "O", Planet::new(PlanetType::Barren, PlanetSize::Small, 0), 0)
            .unwrap();
        u.get_mut(outpost).unwrap().owner = Some(EmpireId(1));
        u.destroy(fleets[0]);

        let out = check_victory(&mut u, &mut em, &rules(0), 7);
        assert_eq!(out, vec![EmpireId(1)]);
        assert!(em.get(EmpireId(1)).unwrap().eliminated);
        assert_eq!(u.get(outpost).unwrap().owner, None);
        assert!(em
            .get(EmpireId(2))
            .unwrap()
            .sitreps
            .iter()
            .any(|s| s.kind == SitRepKind::EmpireEliminated { empire: EmpireId(1) }));
        assert!(!em.get(EmpireId(2)).unwrap().won);
    }

    #[test]
    fn populated_planet_keeps_empire_alive() {
        let (mut u, _, fleets) = galaxy(1);
        let sys = u.get(fleets[0]).unwrap().system_id.unwrap();
        let mut planet = Planet::new(PlanetType::Ocean, PlanetSize::Small, 0);
        planet.species = Some("SP_HUMAN".to_string());
        let p = u.add_planet(sys, "P", planet, 0).unwrap();
        let obj = u.get_mut(p).unwrap();
        obj.owner = Some(EmpireId(1));
        obj.meters.set(MeterType::Population, 3.0);
        u.destroy(fleets[0]);
        assert!(!empire_eliminated(&u, EmpireId(1)));
    }

    #[test]
    fn last_empire_standing_wins() {
        let (mut u, mut em, fleets) = galaxy(2);
        u.destroy(fleets[1]);
        check_victory(&mut u, &mut em, &rules(0), 3);
        let winner = em.get(EmpireId(1)).unwrap();
        assert!(winner.won);
        assert!(winner.victory_reasons.contains(VICTORY_ALL_ENEMIES_ELIMINATED));

        // Winning again the next turn adds nothing new.
        check_victory(&mut u, &mut em, &rules(0), 4);
        let victories = em
            .get(EmpireId(1))
            .unwrap()
            .sitreps
            .iter()
            .filter(|s| matches!(s.kind, SitRepKind::Victory { .. }))
            .count();
        assert_eq!(victories, 1);
    }

    #[test]
    fn lone_empire_game_is_not_an_instant_win() {
        let (mut u, mut em, _) = galaxy(1);
        check_victory(&mut u, &mut em, &rules(0), 1);
        assert!(!em.get(EmpireId(1)).unwrap().won);
    }

    #[test]
    fn few_humans_win_only_when_not_at_war() {
        let (mut u, mut em, _) = galaxy(3);
        em.get_mut(EmpireId(3)).unwrap().ai_controlled = true;

        check_victory(&mut u, &mut em, &rules(2), 1);
        assert!(!em.get(EmpireId(1)).unwrap().won);

        em.set_status(EmpireId(1), EmpireId(2), DiplomaticStatus::Peace);
        check_victory(&mut u, &mut em, &rules(2), 2);
        assert!(em.get(EmpireId(1)).unwrap().victory_reasons.contains(VICTORY_FEW_HUMANS_ALIVE));
        assert!(em.get(EmpireId(2)).unwrap().won);
        assert!(!em.get(EmpireId(3)).unwrap().won);
    }

    #[test]
    fn without_diplomacy_only_alliance_shares_victory() {
        let (mut u, mut em, _) = galaxy(2);
        em.set_status(EmpireId(1), EmpireId(2), DiplomaticStatus::Peace);
        let strict = VictoryRules { diplomacy_enabled: false, ..rules(2) };
        check_victory(&mut u, &mut em, &strict, 1);
        assert!(!em.get(EmpireId(1)).unwrap().won);

        em.set_status(EmpireId(1), EmpireId(2), DiplomaticStatus::Allied);
        check_victory(&mut u, &mut em, &strict, 2);
        assert!(em.get(EmpireId(1)).unwrap().won);
        assert!(em.get(EmpireId(2)).unwrap().won);
    }
}
