//! The server: game state, turn orchestration, and the collaborators that
//! connect it to players, scripts, saves, and AI processes.

pub mod ai;
pub mod app;
pub mod collab;
pub mod players;
pub mod save;
pub mod script;
pub mod state;
pub mod turn;

pub use ai::{ChildProcessLauncher, NullLauncher};
pub use app::{ServerApp, ServerError, ServerEvent};
pub use collab::{
    AiHandle, AiProcessError, AiProcesses, Messenger, RecordingMessenger, Role, SaveError, SaveGame,
    SavePreview, SaveStore, ScriptError, ScriptHost, ServerMessage, TurnProgressPhase,
};
pub use players::{ClientType, PlayerConnection, PlayerSaveGameData, PlayerSetup};
pub use save::JsonSaveStore;
pub use script::BuiltinScriptHost;
pub use state::{GameState, FIRST_TURN};
pub use turn::{ServerPhase, TurnError, TurnOrchestrator, TurnReport};
