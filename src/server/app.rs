//! The server shell: players, collaborators, and the event queue.
//!
//! Events are queued and drained one at a time. After each event the
//! shell checks whether every empire's orders are in and, if so, resolves
//! the turn and reports the outcome to players.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::{error, info, warn};

use super::collab::{
    AiHandle, AiProcesses, Messenger, Role, SaveError, SaveGame, SavePreview, SaveStore, ScriptError,
    ScriptHost, ServerMessage, TurnProgressPhase,
};
use super::players::{ClientType, PlayerConnection, PlayerSaveGameData, PlayerSetup};
use super::state::GameState;
use super::turn::{ServerPhase, TurnError, TurnOrchestrator};
use crate::config::ConfigError;
use crate::empire::{DiplomacyError, DiplomaticAction, Empire};
use crate::order::OrderSet;
use crate::resolve::update_resource_pools;
use crate::universe::{update_empire_object_visibilities, EmpireId, PlayerId};

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Join { name: String, client_type: ClientType, address: String },
    StartGame { seed: Option<u64> },
    TurnOrders { player: String, orders: OrderSet, ui_data: Option<String> },
    RevokeReadiness { player: String },
    Disconnect { player: String },
    ExpireTurn,
    Diplomacy { player: String, action: DiplomaticAction, target: EmpireId },
    SaveGame { name: String },
    LoadGame { name: String },
    ListPreviews { player: Option<String>, directory: String },
    RequestCombatLogs { player: String, ids: Vec<u64> },
    SetOption { name: String, value: String },
    Shutdown { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("unknown player '{0}'")]
    UnknownPlayer(String),

    #[error("player '{0}' is not authorized")]
    NotAuthorized(String),

    #[error("player name '{0}' is already connected")]
    NameTaken(String),

    #[error("player '{0}' has no empire")]
    NotPlaying(String),

    #[error("a game is already running")]
    GameInProgress,

    #[error("no game is running")]
    NoGame,

    #[error("no active players remain")]
    NoActivePlayers,

    #[error("no players are eligible to play")]
    NoEligiblePlayers,

    #[error("script host could not be restarted: {0}")]
    ScriptRestartFailed(ScriptError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Turn(#[from] TurnError),

    #[error(transparent)]
    Diplomacy(#[from] DiplomacyError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ServerError {
    /// Errors after which the server shuts down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::NoActivePlayers | ServerError::NoEligiblePlayers | ServerError::ScriptRestartFailed(_)
        )
    }
}

pub struct ServerApp<M: Messenger> {
    state: GameState,
    turn: TurnOrchestrator,
    players: BTreeMap<PlayerId, PlayerConnection>,
    next_player: i32,
    started: bool,
    events: VecDeque<ServerEvent>,
    messenger: M,
    script: Box<dyn ScriptHost>,
    saves: Box<dyn SaveStore>,
    ai: Box<dyn AiProcesses>,
    /// Running AI processes by player name.
    ai_handles: BTreeMap<String, AiHandle>,
}

impl<M: Messenger> ServerApp<M> {
    pub fn new(
        state: GameState,
        messenger: M,
        script: Box<dyn ScriptHost>,
        saves: Box<dyn SaveStore>,
        ai: Box<dyn AiProcesses>,
    ) -> Self {
        ServerApp {
            state,
            turn: TurnOrchestrator::new(),
            players: BTreeMap::new(),
            next_player: 1,
            started: false,
            events: VecDeque::new(),
            messenger,
            script,
            saves,
            ai,
            ai_handles: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    pub fn messenger_mut(&mut self) -> &mut M {
        &mut self.messenger
    }

    pub fn phase(&self) -> ServerPhase {
        self.turn.phase()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn player(&self, name: &str) -> Option<&PlayerConnection> {
        self.players.values().find(|p| p.name == name)
    }

    pub fn ai_handles(&self) -> &BTreeMap<String, AiHandle> {
        &self.ai_handles
    }

    pub fn push(&mut self, event: ServerEvent) {
        self.events.push_back(event);
    }

    /// One-line summary for the `status` command.
    pub fn status_line(&self) -> String {
        let living = self.state.empires.living_ids().len();
        format!(
            "turn {} phase {:?} players {} empires {} living {} ready {}",
            self.state.current_turn,
            self.turn.phase(),
            self.players.len(),
            self.state.empires.len(),
            living,
            self.state.empires.iter().filter(|e| e.ready && !e.eliminated).count(),
        )
    }

    /// Drains the event queue. Non-fatal errors are reported to players and
    /// processing continues; a fatal error shuts the server down and is
    /// returned.
    pub fn run_pending(&mut self) -> Result<(), ServerError> {
        while let Some(event) = self.events.pop_front() {
            if self.turn.phase() == ServerPhase::ShuttingDown {
                self.events.clear();
                break;
            }
            let player = event_player(&event).and_then(|n| self.player(n)).map(|p| p.id);
            let result = self.handle_event(event).and_then(|()| self.advance_turn_if_ready());
            if let Err(e) = result {
                if e.is_fatal() {
                    error!("fatal: {}", e);
                    self.send_error(None, &e.to_string(), true);
                    self.shutdown(&e.to_string());
                    return Err(e);
                }
                warn!("{}", e);
                self.send_error(player, &e.to_string(), false);
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: ServerEvent) -> Result<(), ServerError> {
        match event {
            ServerEvent::Join { name, client_type, address } => self.handle_join(&name, client_type, &address),
            ServerEvent::StartGame { seed } => self.handle_start(seed),
            ServerEvent::TurnOrders { player, orders, ui_data } => self.handle_orders(&player, orders, ui_data),
            ServerEvent::RevokeReadiness { player } => {
                let empire = self.playing_empire(&player)?;
                self.turn.revoke_readiness(&mut self.state, empire);
                Ok(())
            }
            ServerEvent::Disconnect { player } => self.handle_disconnect(&player),
            ServerEvent::ExpireTurn => {
                info!("turn {} expired", self.state.current_turn);
                self.turn.expire_turn();
                Ok(())
            }
            ServerEvent::Diplomacy { player, action, target } => {
                let from = self.playing_empire(&player)?;
                let enabled = self.state.config.diplomacy_enabled;
                let turn = self.state.current_turn;
                self.state.empires.handle_diplomatic_action(from, target, action, enabled, turn)?;
                Ok(())
            }
            ServerEvent::SaveGame { name } => self.handle_save(&name),
            ServerEvent::LoadGame { name } => self.handle_load(&name),
            ServerEvent::ListPreviews { player, directory } => {
                let previews = self.saves.list_previews(&directory)?;
                match player.and_then(|n| self.player(&n)).map(|p| p.id) {
                    Some(id) => self.messenger.send_to_player(id, ServerMessage::SavePreviews(previews)),
                    None => self.messenger.send_to_all(ServerMessage::SavePreviews(previews)),
                }
                Ok(())
            }
            ServerEvent::RequestCombatLogs { player, ids } => self.handle_combat_logs(&player, &ids),
            ServerEvent::SetOption { name, value } => {
                self.state.config.set_option(&name, &value)?;
                info!("option {} = {}", name, value);
                Ok(())
            }
            ServerEvent::Shutdown { reason } => {
                self.shutdown(&reason);
                Ok(())
            }
        }
    }

    fn find_player(&self, name: &str) -> Result<&PlayerConnection, ServerError> {
        self.player(name).ok_or_else(|| ServerError::UnknownPlayer(name.to_string()))
    }

    fn playing_empire(&self, name: &str) -> Result<EmpireId, ServerError> {
        if !self.started {
            return Err(ServerError::NoGame);
        }
        self.find_player(name)?
            .empire
            .ok_or_else(|| ServerError::NotPlaying(name.to_string()))
    }

    fn send_error(&mut self, player: Option<PlayerId>, text: &str, fatal: bool) {
        let message = ServerMessage::ErrorMessage { text: text.to_string(), fatal };
        match player {
            Some(id) => self.messenger.send_to_player(id, message),
            None => self.messenger.send_to_all(message),
        }
    }

    fn handle_join(&mut self, name: &str, client_type: ClientType, address: &str) -> Result<(), ServerError> {
        if let Some(existing) = self.players.values_mut().find(|p| p.name == name) {
            if existing.connected {
                return Err(ServerError::NameTaken(name.to_string()));
            }
            existing.connected = true;
            let (id, empire) = (existing.id, existing.empire);
            info!("{} reconnected", name);
            self.messenger.send_to_player(id, ServerMessage::Joined { player: id, empire });
            return Ok(());
        }

        let (authorized, mut roles) = self.script.is_authorized(name, address)?;
        if !authorized {
            return Err(ServerError::NotAuthorized(name.to_string()));
        }
        if client_type == ClientType::Observer {
            roles.retain(|r| *r == Role::Observer);
        } else if client_type == ClientType::Human && !self.players.values().any(PlayerConnection::is_host) {
            roles.insert(Role::Host);
        }
        let delegates = self.script.player_delegation(name)?;

        let id = PlayerId(self.next_player);
        self.next_player += 1;
        let mut player = PlayerConnection::new(id, name, client_type, roles);
        player.delegates = delegates;
        self.players.insert(id, player);
        info!("{} joined as {:?} from {}", name, client_type, address);
        self.messenger.send_to_player(id, ServerMessage::Joined { player: id, empire: None });
        Ok(())
    }

    /// Runs universe creation, restarting the script host once after an
    /// interpreter error.
    fn create_universe(&mut self, setups: &[PlayerSetup]) -> Result<(), ServerError> {
        match self.script.create_universe(&mut self.state, setups) {
            Err(ScriptError::Interpreter(msg)) => {
                warn!("universe creation hit an interpreter error, restarting: {}", msg);
                self.script.restart().map_err(ServerError::ScriptRestartFailed)?;
                self.script.create_universe(&mut self.state, setups).map_err(|e| match e {
                    ScriptError::Interpreter(_) => ServerError::ScriptRestartFailed(e),
                    other => ServerError::Script(other),
                })
            }
            other => other.map_err(ServerError::Script),
        }
    }

    fn handle_start(&mut self, seed: Option<u64>) -> Result<(), ServerError> {
        if self.started {
            return Err(ServerError::GameInProgress);
        }
        if let Some(seed) = seed {
            self.state.config.seed = seed;
        }
        let playing: Vec<(PlayerId, String, ClientType)> = self
            .players
            .values()
            .filter(|p| p.connected && p.client_type.plays())
            .map(|p| (p.id, p.name.clone(), p.client_type))
            .collect();
        if playing.is_empty() {
            return Err(ServerError::NoEligiblePlayers);
        }

        let mut setups = Vec::new();
        for (i, (_, name, client_type)) in playing.iter().enumerate() {
            let id = EmpireId(i as i32 + 1);
            let empire_name = format!("Empire of {}", name);
            let mut empire = Empire::with_rules(id, &empire_name, name, &self.state.rules);
            empire.ai_controlled = *client_type == ClientType::Ai;
            self.state.empires.insert(empire);
            setups.push(PlayerSetup {
                player_name: name.clone(),
                empire_name,
                empire_id: id,
                client_type: *client_type,
            });
        }

        self.send_progress_to(&playing.iter().map(|p| p.0).collect::<Vec<_>>(), TurnProgressPhase::GeneratingUniverse);
        if let Err(e) = self.create_universe(&setups) {
            self.state.empires = Default::default();
            return Err(e);
        }
        for ((player, _, _), setup) in playing.iter().zip(&setups) {
            if let Some(p) = self.players.get_mut(player) {
                p.empire = Some(setup.empire_id);
            }
        }
        self.spawn_ais(&setups);

        let state = &mut self.state;
        state.supply.update_unobstructed_systems(&state.universe, &state.empires, true);
        state.supply.update(&state.universe, &state.empires);
        update_empire_object_visibilities(&mut state.universe, &state.empires);
        update_resource_pools(&state.universe, &mut state.empires, &state.supply, &state.rules, state.config.effects_threads);

        self.started = true;
        self.turn.begin_turn_sequence(&self.state.empires);
        self.turn.set_phase(ServerPhase::AwaitingOrders);
        info!("game started with {} empires, seed {}", setups.len(), self.state.config.seed);

        let turn = self.state.current_turn;
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in ids {
            let empire = self.players.get(&id).and_then(|p| p.empire);
            self.messenger.send_to_player(id, ServerMessage::GameStart { empire, turn });
        }
        self.send_turn_updates();
        Ok(())
    }

    fn spawn_ais(&mut self, setups: &[PlayerSetup]) {
        let ai_setups: Vec<&PlayerSetup> = setups.iter().filter(|s| s.client_type == ClientType::Ai).collect();
        if ai_setups.is_empty() {
            return;
        }
        let Some(exe) = self.state.config.ai_executable.clone() else {
            warn!("no AI executable configured; AI empires must send their own orders");
            return;
        };
        for setup in ai_setups {
            let args = vec![
                "--player".to_string(),
                setup.player_name.clone(),
                "--empire".to_string(),
                setup.empire_id.0.to_string(),
            ];
            match self.ai.spawn(&exe, &args) {
                Ok(handle) => {
                    if self.state.config.ai_low_priority && !self.ai.set_low_priority(handle, true) {
                        warn!("could not lower priority of AI {}", setup.player_name);
                    }
                    self.ai_handles.insert(setup.player_name.clone(), handle);
                }
                Err(e) => error!("AI {} not started: {}", setup.player_name, e),
            }
        }
    }

    fn handle_orders(&mut self, name: &str, orders: OrderSet, ui_data: Option<String>) -> Result<(), ServerError> {
        let empire = self.playing_empire(name)?;
        let client_type = self.find_player(name)?.client_type;
        let data = PlayerSaveGameData { name: name.to_string(), empire_id: empire, orders, ui_data, client_type };
        self.turn.submit_orders(&mut self.state, data)?;
        let id = self.find_player(name)?.id;
        self.messenger.send_to_player(id, ServerMessage::TurnOrdersAccepted { turn: self.state.current_turn });
        Ok(())
    }

    fn handle_disconnect(&mut self, name: &str) -> Result<(), ServerError> {
        let id = self.find_player(name)?.id;
        if !self.started {
            self.players.remove(&id);
            info!("{} left before the game started", name);
            return Ok(());
        }
        if let Some(p) = self.players.get_mut(&id) {
            p.connected = false;
        }
        info!("{} disconnected", name);
        let humans_left = self
            .players
            .values()
            .any(|p| p.connected && p.client_type == ClientType::Human);
        if !humans_left {
            return Err(ServerError::NoActivePlayers);
        }
        Ok(())
    }

    fn save_game_data(&self, name: &str) -> SaveGame {
        let players: Vec<PlayerSaveGameData> = self
            .players
            .values()
            .filter_map(|p| {
                let empire = p.empire?;
                Some(self.turn.orders_of(empire).cloned().unwrap_or_else(|| PlayerSaveGameData {
                    name: p.name.clone(),
                    empire_id: empire,
                    orders: OrderSet::new(),
                    ui_data: None,
                    client_type: p.client_type,
                }))
            })
            .collect();
        SaveGame {
            preview: SavePreview {
                name: name.to_string(),
                turn: self.state.current_turn,
                players: players.iter().map(|p| p.name.clone()).collect(),
            },
            players,
            state: self.state.clone(),
        }
    }

    fn handle_save(&mut self, name: &str) -> Result<(), ServerError> {
        if !self.started {
            return Err(ServerError::NoGame);
        }
        let save = self.save_game_data(name);
        let path = self.saves.save_game(name, &save)?;
        self.messenger.send_to_all(ServerMessage::GameSaved { path: path.display().to_string() });
        Ok(())
    }

    /// Replaces the running game with a saved one. Players are matched to
    /// their empires by name; unsubmitted orders from the save are restored.
    fn handle_load(&mut self, name: &str) -> Result<(), ServerError> {
        let save = self.saves.load_game(name)?;
        let config = self.state.config.clone();
        self.state = save.state;
        self.state.config.save_root = config.save_root;
        self.turn = TurnOrchestrator::new();
        self.turn.begin_turn_sequence(&self.state.empires);
        self.started = true;

        for p in self.players.values_mut() {
            p.empire = None;
        }
        for data in &save.players {
            match self.players.values_mut().find(|p| p.name == data.name) {
                Some(p) => p.empire = Some(data.empire_id),
                None => warn!("saved player {} is not connected", data.name),
            }
            if !data.orders.is_empty() {
                if let Err(e) = self.turn.submit_orders(&mut self.state, data.clone()) {
                    warn!("could not restore orders for {}: {}", data.name, e);
                }
            }
        }
        for empire in self.state.empires.iter_mut() {
            empire.ready = false;
        }
        info!("loaded {} at turn {}", name, self.state.current_turn);

        let turn = self.state.current_turn;
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in ids {
            let empire = self.players.get(&id).and_then(|p| p.empire);
            self.messenger.send_to_player(id, ServerMessage::GameStart { empire, turn });
        }
        self.send_turn_updates();
        Ok(())
    }

    /// Sends the logs the player's empire took part in. Observers see all.
    fn handle_combat_logs(&mut self, name: &str, ids: &[u64]) -> Result<(), ServerError> {
        let player = self.find_player(name)?;
        let (id, empire) = (player.id, player.empire);
        let observer = player.client_type == ClientType::Observer;
        let logs = ids
            .iter()
            .filter_map(|&log_id| self.state.combat_logs.get(log_id))
            .filter(|log| observer || empire.map_or(false, |e| log.empires.contains(&e)))
            .cloned()
            .collect();
        self.messenger.send_to_player(id, ServerMessage::CombatLogs(logs));
        Ok(())
    }

    fn send_progress_to(&mut self, players: &[PlayerId], phase: TurnProgressPhase) {
        for &p in players {
            self.messenger.send_to_player(p, ServerMessage::TurnProgress(phase));
        }
    }

    /// Connected players whose empire is still alive.
    fn living_players(&self) -> Vec<(PlayerId, EmpireId)> {
        self.players
            .values()
            .filter(|p| p.connected)
            .filter_map(|p| {
                let empire = p.empire?;
                let alive = self.state.empires.get(empire).map_or(false, |e| !e.eliminated);
                alive.then_some((p.id, empire))
            })
            .collect()
    }

    fn send_turn_updates(&mut self) {
        let turn = self.state.current_turn;
        for (player, empire) in self.living_players() {
            let sitreps = self.state.empires.get(empire).map(|e| e.sitreps.clone()).unwrap_or_default();
            self.messenger.send_to_player(player, ServerMessage::TurnUpdate { turn, empire, sitreps });
        }
    }

    fn advance_turn_if_ready(&mut self) -> Result<(), ServerError> {
        if !self.started
            || self.turn.phase() != ServerPhase::AwaitingOrders
            || self.turn.sequenced_empires().is_empty()
            || !self.turn.all_orders_received(&self.state.empires)
        {
            return Ok(());
        }

        let recipients: Vec<PlayerId> = self.living_players().into_iter().map(|(p, _)| p).collect();
        let messenger = &mut self.messenger;
        let mut progress = |phase: TurnProgressPhase| {
            for &p in &recipients {
                messenger.send_to_player(p, ServerMessage::TurnProgress(phase));
            }
        };
        let report = self.turn.process_turn(&mut self.state, self.script.as_mut(), &mut progress);

        for &empire in &report.eliminated {
            self.messenger.send_to_all(ServerMessage::PlayerEliminated { empire });
            let ai_player = self
                .players
                .values()
                .find(|p| p.empire == Some(empire) && p.client_type == ClientType::Ai)
                .map(|p| p.name.clone());
            if let Some(handle) = ai_player.and_then(|n| self.ai_handles.remove(&n)) {
                if let Err(e) = self.ai.kill(handle) {
                    warn!("failed to stop AI of eliminated {}: {}", empire, e);
                }
            }
        }
        for (empire, reason) in &report.new_victories {
            self.messenger.send_to_all(ServerMessage::Victory { empire: *empire, reason: reason.clone() });
        }
        self.send_turn_updates();

        if let Some(e) = report.script_error {
            self.send_error(None, &e.to_string(), false);
            if let ScriptError::Interpreter(_) = e {
                self.script.restart().map_err(ServerError::ScriptRestartFailed)?;
                info!("script host restarted");
            }
        }
        if self.turn.phase() == ServerPhase::GameOver {
            self.messenger.send_to_all(ServerMessage::EndGame { reason: "no empires remain".to_string() });
        }
        Ok(())
    }

    /// Tells everyone the game is over and stops AI processes.
    pub fn shutdown(&mut self, reason: &str) {
        if self.turn.phase() == ServerPhase::ShuttingDown {
            return;
        }
        info!("shutting down: {}", reason);
        self.turn.set_phase(ServerPhase::ShuttingDown);
        self.messenger.send_to_all(ServerMessage::EndGame { reason: reason.to_string() });
        for (name, handle) in std::mem::take(&mut self.ai_handles) {
            if let Err(e) = self.ai.kill(handle) {
                warn!("failed to stop AI {}: {}", name, e);
            }
        }
        self.events.clear();
    }
}

fn event_player(event: &ServerEvent) -> Option<&str> {
    match event {
        ServerEvent::Join { name, .. } => Some(name),
        ServerEvent::TurnOrders { player, .. }
        | ServerEvent::RevokeReadiness { player }
        | ServerEvent::Disconnect { player }
        | ServerEvent::Diplomacy { player, .. }
        | ServerEvent::RequestCombatLogs { player, .. } => Some(player),
        ServerEvent::ListPreviews { player, .. } => player.as_deref(),
        _ => None,
    }
}

/// Roles a player holds, for display.
pub fn role_names(roles: &BTreeSet<Role>) -> Vec<&'static str> {
    roles
        .iter()
        .map(|r| match r {
            Role::Host => "host",
            Role::Player => "player",
            Role::Observer => "observer",
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::content::GameRules;
    use crate::server::ai::NullLauncher;
    use crate::server::collab::RecordingMessenger;
    use crate::server::save::JsonSaveStore;
    use crate::server::script::BuiltinScriptHost;

    fn app() -> ServerApp<RecordingMessenger> {
        let mut config = ServerConfig::default();
        config.galaxy_systems = 10;
        config.monsters = false;
        let state = GameState::new(GameRules::default(), config);
        ServerApp::new(
            state,
            RecordingMessenger::new(),
            Box::new(BuiltinScriptHost::new()),
            Box::new(JsonSaveStore::new(std::env::temp_dir().join("starlane-app-tests"))),
            Box::new(NullLauncher::default()),
        )
    }

    fn join(app: &mut ServerApp<RecordingMessenger>, name: &str, client_type: ClientType) {
        app.push(ServerEvent::Join { name: name.to_string(), client_type, address: "127.0.0.1".to_string() });
    }

    fn orders(app: &mut ServerApp<RecordingMessenger>, name: &str) {
        app.push(ServerEvent::TurnOrders { player: name.to_string(), orders: OrderSet::new(), ui_data: None });
    }

    #[test]
    fn first_human_is_host() {
        let mut app = app();
        join(&mut app, "alice", ClientType::Human);
        join(&mut app, "bob", ClientType::Human);
        join(&mut app, "eve", ClientType::Observer);
        app.run_pending().unwrap();
        assert!(app.player("alice").unwrap().is_host());
        assert!(!app.player("bob").unwrap().is_host());
        assert_eq!(role_names(&app.player("eve").unwrap().roles), vec!["observer"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut app = app();
        join(&mut app, "alice", ClientType::Human);
        join(&mut app, "alice", ClientType::Human);
        app.run_pending().unwrap();
        let alice = app.player("alice").unwrap().id;
        assert!(app
            .messenger()
            .seen_by(alice)
            .iter()
            .any(|m| matches!(m, ServerMessage::ErrorMessage { fatal: false, .. })));
    }

    #[test]
    fn start_without_players_is_fatal() {
        let mut app = app();
        app.push(ServerEvent::StartGame { seed: None });
        assert!(matches!(app.run_pending(), Err(ServerError::NoEligiblePlayers)));
        assert_eq!(app.phase(), ServerPhase::ShuttingDown);
    }

    #[test]
    fn turn_advances_when_everyone_is_ready() {
        let mut app = app();
        join(&mut app, "alice", ClientType::Human);
        join(&mut app, "bob", ClientType::Human);
        app.push(ServerEvent::StartGame { seed: Some(3) });
        app.run_pending().unwrap();
        assert!(app.is_started());
        assert_eq!(app.state().current_turn, 1);

        orders(&mut app, "alice");
        app.run_pending().unwrap();
        assert_eq!(app.state().current_turn, 1);
        orders(&mut app, "bob");
        app.run_pending().unwrap();
        assert_eq!(app.state().current_turn, 2);

        let alice = app.player("alice").unwrap().id;
        assert!(app
            .messenger()
            .seen_by(alice)
            .iter()
            .any(|m| matches!(m, ServerMessage::TurnProgress(TurnProgressPhase::Combat))));
    }

    #[test]
    fn expiry_skips_absent_humans() {
        let mut app = app();
        join(&mut app, "alice", ClientType::Human);
        join(&mut app, "bob", ClientType::Human);
        app.push(ServerEvent::StartGame { seed: Some(3) });
        orders(&mut app, "alice");
        app.push(ServerEvent::ExpireTurn);
        app.run_pending().unwrap();
        assert_eq!(app.state().current_turn, 2);
    }

    #[test]
    fn ai_empires_get_processes() {
        let mut app = app();
        app.state_mut().config.ai_executable = Some("/usr/bin/starlane-ai".into());
        join(&mut app, "alice", ClientType::Human);
        join(&mut app, "robot", ClientType::Ai);
        app.push(ServerEvent::StartGame { seed: Some(1) });
        app.run_pending().unwrap();
        assert!(app.ai_handles().contains_key("robot"));
        let robot = app.player("robot").unwrap().empire.unwrap();
        assert!(app.state().empires.get(robot).unwrap().ai_controlled);

        app.push(ServerEvent::Shutdown { reason: "host quit".to_string() });
        app.run_pending().unwrap();
        assert!(app.ai_handles().is_empty());
        assert_eq!(app.phase(), ServerPhase::ShuttingDown);
    }

    #[test]
    fn last_human_leaving_is_fatal() {
        let mut app = app();
        join(&mut app, "alice", ClientType::Human);
        app.push(ServerEvent::StartGame { seed: Some(1) });
        app.push(ServerEvent::Disconnect { player: "alice".to_string() });
        assert!(matches!(app.run_pending(), Err(ServerError::NoActivePlayers)));
    }

    #[test]
    fn orders_before_start_are_rejected() {
        let mut app = app();
        join(&mut app, "alice", ClientType::Human);
        orders(&mut app, "alice");
        app.run_pending().unwrap();
        let alice = app.player("alice").unwrap().id;
        assert!(app
            .messenger()
            .seen_by(alice)
            .iter()
            .any(|m| matches!(m, ServerMessage::ErrorMessage { text, .. } if text.contains("no game"))));
    }
}
