//! Collaborator interfaces the server core calls out to.
//!
//! Transport, scripting, persistence, and AI process management live behind
//! these traits so the turn pipeline can run against in-memory doubles.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::players::{PlayerSaveGameData, PlayerSetup};
use super::state::GameState;
use crate::empire::SitRep;
use crate::resolve::CombatLog;
use crate::universe::{EmpireId, PlayerId};

/// Progress notices sent while a turn resolves. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnProgressPhase {
    GeneratingUniverse,
    ProcessingOrders,
    ColonizeAndScrap,
    FleetMovement,
    Combat,
    EmpireProduction,
    Downloading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Joined { player: PlayerId, empire: Option<EmpireId> },
    GameStart { empire: Option<EmpireId>, turn: i32 },
    TurnProgress(TurnProgressPhase),
    /// New turn state for one empire.
    TurnUpdate { turn: i32, empire: EmpireId, sitreps: Vec<SitRep> },
    TurnOrdersAccepted { turn: i32 },
    PlayerEliminated { empire: EmpireId },
    Victory { empire: EmpireId, reason: String },
    CombatLogs(Vec<CombatLog>),
    SavePreviews(Vec<SavePreview>),
    GameSaved { path: String },
    ErrorMessage { text: String, fatal: bool },
    EndGame { reason: String },
}

/// Delivers messages to connected players.
pub trait Messenger {
    fn send_to_player(&mut self, player: PlayerId, message: ServerMessage);

    fn send_to_all(&mut self, message: ServerMessage);
}

/// Keeps every message sent, broadcasts under `None`.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    pub sent: Vec<(Option<PlayerId>, ServerMessage)>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        RecordingMessenger::default()
    }

    /// Messages a given player saw, including broadcasts.
    pub fn seen_by(&self, player: PlayerId) -> Vec<&ServerMessage> {
        self.sent
            .iter()
            .filter(|(to, _)| to.map_or(true, |p| p == player))
            .map(|(_, m)| m)
            .collect()
    }
}

impl Messenger for RecordingMessenger {
    fn send_to_player(&mut self, player: PlayerId, message: ServerMessage) {
        self.sent.push((Some(player), message));
    }

    fn send_to_all(&mut self, message: ServerMessage) {
        self.sent.push((None, message));
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// The interpreter itself is in a bad state; a restart may recover it.
    #[error("script interpreter error: {0}")]
    Interpreter(String),

    /// A script ran and reported failure.
    #[error("script failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Host,
    Player,
    Observer,
}

/// Content generation and authorization, usually backed by scripts.
pub trait ScriptHost {
    /// Fills `state.universe` for the players in `setup`.
    fn create_universe(&mut self, state: &mut GameState, setup: &[PlayerSetup]) -> Result<(), ScriptError>;

    fn execute_turn_events(&mut self, state: &mut GameState) -> Result<(), ScriptError>;

    fn is_authorized(&self, player_name: &str, address: &str) -> Result<(bool, BTreeSet<Role>), ScriptError>;

    fn player_delegation(&self, player_name: &str) -> Result<Vec<String>, ScriptError>;

    /// Re-initialises the host after an interpreter error.
    fn restart(&mut self) -> Result<(), ScriptError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("save i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed save: {0}")]
    Format(#[from] serde_json::Error),

    #[error("save name '{0}' is not allowed")]
    InvalidName(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePreview {
    pub name: String,
    pub turn: i32,
    pub players: Vec<String>,
}

/// Everything needed to resume a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveGame {
    pub preview: SavePreview,
    pub players: Vec<PlayerSaveGameData>,
    pub state: GameState,
}

pub trait SaveStore {
    /// Writes `save` under `name`, returning where it went.
    fn save_game(&mut self, name: &str, save: &SaveGame) -> Result<PathBuf, SaveError>;

    fn load_game(&self, name: &str) -> Result<SaveGame, SaveError>;

    /// Previews of saves in `directory`, relative to the store's root.
    fn list_previews(&self, directory: &str) -> Result<Vec<SavePreview>, SaveError>;
}

/// Handle to a spawned AI client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AiHandle(pub u32);

#[derive(Debug, thiserror::Error)]
pub enum AiProcessError {
    #[error("failed to spawn {exe}: {source}")]
    Spawn {
        exe: PathBuf,
        source: std::io::Error,
    },

    #[error("no AI process {0:?}")]
    NoSuchProcess(AiHandle),

    #[error("failed to stop AI process: {0}")]
    Kill(std::io::Error),
}

pub trait AiProcesses {
    fn spawn(&mut self, exe: &Path, args: &[String]) -> Result<AiHandle, AiProcessError>;

    /// Stops the process, force-killing it after the launcher's grace period.
    fn kill(&mut self, handle: AiHandle) -> Result<(), AiProcessError>;

    fn set_low_priority(&mut self, handle: AiHandle, low: bool) -> bool;
}
