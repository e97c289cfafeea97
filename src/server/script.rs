//! The built-in script host: galaxy generation and per-turn events.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::collab::{Role, ScriptError, ScriptHost};
use super::players::PlayerSetup;
use super::state::GameState;
use crate::empire::SitRepKind;
use crate::universe::generate::MONSTER_DESIGN;
use crate::universe::{generate_universe, FleetAggression, ObjectId, ObjectType};

/// Chance per turn that a new monster appears somewhere.
const MONSTER_SPAWN_CHANCE: f64 = 0.08;

#[derive(Debug, Default)]
pub struct BuiltinScriptHost {
    /// Players allowed to join. `None` admits everyone.
    allowed: Option<BTreeSet<String>>,
    delegation: BTreeMap<String, Vec<String>>,
    restarts: u32,
}

impl BuiltinScriptHost {
    pub fn new() -> Self {
        BuiltinScriptHost::default()
    }

    pub fn with_allow_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BuiltinScriptHost {
            allowed: Some(names.into_iter().map(Into::into).collect()),
            ..BuiltinScriptHost::default()
        }
    }

    pub fn delegate(&mut self, player: &str, to: &str) {
        self.delegation.entry(player.to_string()).or_default().push(to.to_string());
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

impl ScriptHost for BuiltinScriptHost {
    fn create_universe(&mut self, state: &mut GameState, setup: &[PlayerSetup]) -> Result<(), ScriptError> {
        let playing = setup.iter().filter(|p| p.client_type.plays()).count();
        if playing != state.empires.len() {
            return Err(ScriptError::Failed(format!(
                "{} playing setups for {} empires",
                playing,
                state.empires.len()
            )));
        }
        let galaxy = state.galaxy_setup();
        let universe = generate_universe(&galaxy, &mut state.empires, &state.rules)
            .map_err(|e| ScriptError::Failed(e.to_string()))?;
        info!("generated {} objects for {} empires", universe.len(), playing);
        state.universe = universe;
        Ok(())
    }

    fn execute_turn_events(&mut self, state: &mut GameState) -> Result<(), ScriptError> {
        let turn = state.current_turn;
        let seed = state.config.seed ^ (turn as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = SmallRng::seed_from_u64(seed);
        if state.config.monsters && rng.gen_bool(MONSTER_SPAWN_CHANCE) {
            spawn_monster(state, &mut rng)?;
        }
        drift_fields(state);
        Ok(())
    }

    fn is_authorized(&self, player_name: &str, address: &str) -> Result<(bool, BTreeSet<Role>), ScriptError> {
        let ok = self.allowed.as_ref().map_or(true, |names| names.contains(player_name));
        debug!("authorization for {} from {}: {}", player_name, address, ok);
        let roles = if ok {
            [Role::Player, Role::Observer].into_iter().collect()
        } else {
            BTreeSet::new()
        };
        Ok((ok, roles))
    }

    fn player_delegation(&self, player_name: &str) -> Result<Vec<String>, ScriptError> {
        Ok(self.delegation.get(player_name).cloned().unwrap_or_default())
    }

    fn restart(&mut self) -> Result<(), ScriptError> {
        self.restarts += 1;
        Ok(())
    }
}

/// Drops a monster fleet into a system no empire has settled.
fn spawn_monster(state: &mut GameState, rng: &mut SmallRng) -> Result<(), ScriptError> {
    let Some(design) = state.rules.design(MONSTER_DESIGN).cloned() else {
        return Err(ScriptError::Failed(format!("missing monster design {}", MONSTER_DESIGN)));
    };
    let universe = &state.universe;
    let wild: Vec<ObjectId> = universe
        .ids_of_type(ObjectType::System)
        .into_iter()
        .filter(|&sys| {
            universe
                .objects_in_system(sys)
                .iter()
                .all(|&o| universe.get(o).map_or(true, |obj| obj.owner.is_none()))
        })
        .collect();
    let Some(&system) = wild.choose(rng) else { return Ok(()) };

    let turn = state.current_turn;
    let fleet = state
        .universe
        .create_fleet("Monsters", system, None, FleetAggression::Aggressive, turn)
        .map_err(|e| ScriptError::Failed(e.to_string()))?;
    state
        .universe
        .create_ship_from_design(fleet, &design, None, turn)
        .map_err(|e| ScriptError::Failed(e.to_string()))?;
    info!("monster spawned at {}", system);

    for empire in state.empires.iter_mut() {
        if !empire.eliminated && empire.explored_systems.contains(&system) {
            empire.add_sitrep(turn, SitRepKind::MonsterSpawned { system });
        }
    }
    Ok(())
}

/// Moves every field by its drift, reflecting off the galaxy's bounding box.
fn drift_fields(state: &mut GameState) {
    let systems: Vec<(f32, f32)> = state
        .universe
        .iter()
        .filter(|o| o.as_system().is_some())
        .map(|o| (o.x, o.y))
        .collect();
    if systems.is_empty() {
        return;
    }
    let (min_x, max_x) = systems.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &(x, _)| (lo.min(x), hi.max(x)));
    let (min_y, max_y) = systems.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));

    for obj in state.universe.iter_mut() {
        let (x, y) = (obj.x, obj.y);
        let Some(field) = obj.as_field_mut() else { continue };
        let (mut dx, mut dy) = field.drift;
        let mut nx = x + dx;
        let mut ny = y + dy;
        if nx < min_x || nx > max_x {
            dx = -dx;
            nx = x + dx;
        }
        if ny < min_y || ny > max_y {
            dy = -dy;
            ny = y + dy;
        }
        field.drift = (dx, dy);
        obj.x = nx;
        obj.y = ny;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::content::GameRules;
    use crate::empire::Empire;
    use crate::server::players::ClientType;
    use crate::universe::{EmpireId, Field, ObjectKind, UniverseObject};

    fn setup(n: i32) -> (GameState, Vec<PlayerSetup>) {
        let mut config = ServerConfig::default();
        config.galaxy_systems = 12;
        config.seed = 7;
        let mut state = GameState::new(GameRules::default(), config);
        let mut players = Vec::new();
        for i in 1..=n {
            let id = EmpireId(i);
            state.empires.insert(Empire::with_rules(id, &format!("E{}", i), &format!("p{}", i), &state.rules));
            players.push(PlayerSetup {
                player_name: format!("p{}", i),
                empire_name: format!("E{}", i),
                empire_id: id,
                client_type: ClientType::Human,
            });
        }
        (state, players)
    }

    #[test]
    fn creates_a_universe_with_capitals() {
        let (mut state, players) = setup(2);
        let mut host = BuiltinScriptHost::new();
        host.create_universe(&mut state, &players).unwrap();
        assert!(!state.universe.is_empty());
        assert!(state.empires.iter().all(|e| e.capital.is_some()));
    }

    #[test]
    fn mismatched_setup_fails() {
        let (mut state, mut players) = setup(2);
        players.pop();
        let mut host = BuiltinScriptHost::new();
        assert!(matches!(host.create_universe(&mut state, &players), Err(ScriptError::Failed(_))));
    }

    #[test]
    fn allow_list_limits_joins() {
        let host = BuiltinScriptHost::with_allow_list(["alice"]);
        assert!(host.is_authorized("alice", "127.0.0.1").unwrap().0);
        let (ok, roles) = host.is_authorized("mallory", "127.0.0.1").unwrap();
        assert!(!ok);
        assert!(roles.is_empty());
    }

    #[test]
    fn delegation_is_reported() {
        let mut host = BuiltinScriptHost::new();
        host.delegate("alice", "bob");
        assert_eq!(host.player_delegation("alice").unwrap(), vec!["bob".to_string()]);
        assert!(host.player_delegation("bob").unwrap().is_empty());
    }

    #[test]
    fn fields_bounce_at_the_edge() {
        let (mut state, players) = setup(1);
        let mut host = BuiltinScriptHost::new();
        host.create_universe(&mut state, &players).unwrap();
        let max_x = state.universe.iter().filter(|o| o.as_system().is_some()).map(|o| o.x).fold(f32::MIN, f32::max);
        let field = Field { field_type: "FLD_ION_STORM".to_string(), radius: 20.0, drift: (5.0, 0.0) };
        let mut obj = UniverseObject::new("storm", max_x - 1.0, 0.0, ObjectKind::Field(field));
        obj.y = state.universe.iter().filter(|o| o.as_system().is_some()).map(|o| o.y).fold(f32::MAX, f32::min);
        let id = state.universe.insert(obj, 1);

        drift_fields(&mut state);
        let storm = state.universe.get(id).unwrap();
        assert!((storm.x - (max_x - 6.0)).abs() < 1e-3);
        assert_eq!(storm.as_field().unwrap().drift, (-5.0, 0.0));
    }

    #[test]
    fn turn_events_are_deterministic() {
        let (mut a, players) = setup(2);
        let mut host = BuiltinScriptHost::new();
        host.create_universe(&mut a, &players).unwrap();
        let mut b = a.clone();
        for turn in 1..30 {
            a.current_turn = turn;
            b.current_turn = turn;
            host.execute_turn_events(&mut a).unwrap();
            host.execute_turn_events(&mut b).unwrap();
        }
        assert_eq!(
            serde_json::to_string(&a.universe).unwrap(),
            serde_json::to_string(&b.universe).unwrap()
        );
    }
}
