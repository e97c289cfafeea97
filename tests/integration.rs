//! Integration tests for the starlane server binary.
//!
//! Spawns the server, sends commands on stdin, and checks the lines it
//! writes to stdout.

use std::io::{BufRead, Write};
use std::process::{Command, Stdio};

/// Sends a sequence of commands to the server and collects stdout lines.
fn run_server(commands: &[&str]) -> Vec<String> {
    let exe = env!("CARGO_BIN_EXE_starlane");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start starlane");

    let mut stdin = child.stdin.take().unwrap();
    let stdout = child.stdout.take().unwrap();
    let reader = std::io::BufReader::new(stdout);

    for cmd in commands {
        writeln!(stdin, "{}", cmd).unwrap();
    }
    stdin.flush().unwrap();
    drop(stdin);

    let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
    let status = child.wait().expect("failed to wait on child");
    assert!(status.success());
    lines
}

#[test]
fn join_and_start_announce_the_game() {
    let lines = run_server(&["join alice human", "start 9", "quit"]);
    assert!(lines.iter().any(|l| l.starts_with("to 1 {\"Joined\"")));
    assert!(lines.iter().any(|l| l.starts_with("to 1 {\"GameStart\"")));
    assert!(lines.iter().any(|l| l.starts_with("to 1 {\"TurnUpdate\"")));
    assert!(lines.last().is_some_and(|l| l.starts_with("all {\"EndGame\"")));
}

#[test]
fn orders_advance_the_turn() {
    let lines = run_server(&["join alice human", "start 9", "status", "orders alice {}", "status", "quit"]);
    let statuses: Vec<&String> = lines.iter().filter(|l| l.starts_with("status ")).collect();
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].starts_with("status turn 1 "));
    assert!(statuses[1].starts_with("status turn 2 "));
    assert!(lines.iter().any(|l| l.contains("\"TurnOrdersAccepted\":{\"turn\":1}")));
    assert!(lines.iter().any(|l| l.contains("\"TurnProgress\":\"Combat\"")));
}

#[test]
fn bad_commands_are_reported_and_ignored() {
    let lines = run_server(&["xyzzy", "orders alice {", "status", "quit"]);
    assert!(lines.iter().any(|l| l == "error unknown command: xyzzy"));
    assert!(lines.iter().any(|l| l.starts_with("error malformed orders")));
    assert!(lines.iter().any(|l| l.starts_with("status turn 1 ")));
}

#[test]
fn orders_before_start_get_an_error_message() {
    let lines = run_server(&["join alice human", "orders alice {}", "quit"]);
    assert!(lines
        .iter()
        .any(|l| l.starts_with("to 1 {\"ErrorMessage\"") && l.contains("no game is running")));
}

#[test]
fn setoption_rejects_unknown_names() {
    let lines = run_server(&["setoption name bogus value 1", "quit"]);
    assert!(lines.iter().any(|l| l.starts_with("all {\"ErrorMessage\"") && l.contains("bogus")));
}

#[test]
fn closing_stdin_shuts_down_cleanly() {
    let lines = run_server(&["join alice human"]);
    assert!(lines.last().is_some_and(|l| l.starts_with("all {\"EndGame\"")));
}

#[cfg(unix)]
#[test]
fn interrupt_signal_shuts_down_cleanly() {
    let exe = env!("CARGO_BIN_EXE_starlane");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start starlane");

    let mut stdin = child.stdin.take().unwrap();
    let mut lines = std::io::BufReader::new(child.stdout.take().unwrap()).lines();
    writeln!(stdin, "join alice human").unwrap();
    stdin.flush().unwrap();
    let joined = lines.next().unwrap().unwrap();
    assert!(joined.starts_with("to 1 {\"Joined\""));

    let killed = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("failed to run kill");
    assert!(killed.success());

    let rest: Vec<String> = lines.map(|l| l.unwrap()).collect();
    assert!(rest.last().is_some_and(|l| l.starts_with("all {\"EndGame\"")));
    assert!(child.wait().expect("failed to wait on child").success());
    drop(stdin);
}
