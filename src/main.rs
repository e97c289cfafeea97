//! Starlane server binary.
//!
//! Reads commands from stdin and writes server messages to stdout, one per
//! line. Logging goes to stderr and is controlled by `RUST_LOG`.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use starlane::config::ServerConfig;
use starlane::content::{await_content_load, begin_content_load};
use starlane::protocol::{parse_command, Command, LineMessenger};
use starlane::server::{
    BuiltinScriptHost, ChildProcessLauncher, GameState, JsonSaveStore, Messenger, ServerApp, ServerEvent,
    ServerMessage,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON server configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// What the main loop waits on: stdin lines and termination signals.
enum Input {
    Line(String),
    Closed,
    Signal,
}

/// Forwards stdin lines on a thread so a signal can interrupt a blocked read.
fn spawn_stdin_reader(tx: mpsc::Sender<Input>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Input::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Input::Closed);
    });
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match ServerConfig::from_json_file(path) {
            Ok(c) => c,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };
    let content = begin_content_load(config.content_path.clone());
    let rules = match await_content_load(content) {
        Ok(r) => r,
        Err(e) => {
            error!("content failed to load: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let saves = JsonSaveStore::new(config.save_root.clone());
    let ai = ChildProcessLauncher::new(Duration::from_millis(config.ai_shutdown_grace_ms));
    let mut app = ServerApp::new(
        GameState::new(rules, config),
        LineMessenger::new(io::stdout()),
        Box::new(BuiltinScriptHost::new()),
        Box::new(saves),
        Box::new(ai),
    );
    info!("ready");

    let (tx, rx) = mpsc::channel();
    let signal_tx = tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = signal_tx.send(Input::Signal);
    }) {
        warn!("no signal handler installed: {}", e);
    }
    spawn_stdin_reader(tx);

    for input in rx {
        let line = match input {
            Input::Line(l) => l,
            Input::Closed => break,
            Input::Signal => {
                info!("termination signal received");
                app.shutdown("terminated by signal");
                return ExitCode::SUCCESS;
            }
        };

        let cmd = match parse_command(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) => {
                app.messenger_mut().write_line(&format!("error {}", e));
                continue;
            }
        };

        let event = match cmd {
            Command::Join { name, client_type, address } => ServerEvent::Join { name, client_type, address },
            Command::Start { seed } => ServerEvent::StartGame { seed },
            Command::Orders { player, orders } => ServerEvent::TurnOrders { player, orders, ui_data: None },
            Command::Unready { player } => ServerEvent::RevokeReadiness { player },
            Command::Disconnect { player } => ServerEvent::Disconnect { player },
            Command::Expire => ServerEvent::ExpireTurn,
            Command::Diplo { player, action, target } => ServerEvent::Diplomacy { player, action, target },
            Command::Save { name } => ServerEvent::SaveGame { name },
            Command::Load { name } => ServerEvent::LoadGame { name },
            Command::Previews { directory } => ServerEvent::ListPreviews { player: None, directory },
            Command::CombatLog { id, player: Some(player) } => ServerEvent::RequestCombatLogs { player, ids: vec![id] },
            Command::CombatLog { id, player: None } => {
                let logs = app.state().combat_logs.get(id).cloned().into_iter().collect();
                app.messenger_mut().send_to_all(ServerMessage::CombatLogs(logs));
                continue;
            }
            Command::SetOption { name, value } => ServerEvent::SetOption { name, value },
            Command::Status => {
                let status = app.status_line();
                app.messenger_mut().write_line(&format!("status {}", status));
                continue;
            }
            Command::Quit => ServerEvent::Shutdown { reason: "server quit".to_string() },
        };
        let quitting = matches!(event, ServerEvent::Shutdown { .. });
        app.push(event);
        if let Err(e) = app.run_pending() {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
        if quitting {
            return ExitCode::SUCCESS;
        }
    }

    app.shutdown("input closed");
    ExitCode::SUCCESS
}
