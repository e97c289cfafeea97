//! Command parser for the server's stdin protocol.
//!
//! Each line is one command. Player names and save names are single
//! tokens; an order set is the JSON text filling the rest of the line.

use crate::empire::DiplomaticAction;
use crate::order::OrderSet;
use crate::server::ClientType;
use crate::universe::EmpireId;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed {command}: expected '{usage}'")]
    Usage { command: &'static str, usage: &'static str },

    #[error("invalid {what} '{value}'")]
    InvalidValue { what: &'static str, value: String },

    #[error("malformed orders: {0}")]
    Orders(String),
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join { name: String, client_type: ClientType, address: String },
    Start { seed: Option<u64> },
    Orders { player: String, orders: OrderSet },
    Unready { player: String },
    Disconnect { player: String },
    Expire,
    Diplo { player: String, action: DiplomaticAction, target: EmpireId },
    Save { name: String },
    Load { name: String },
    Previews { directory: String },
    Status,
    /// Without a player the log is printed as the host sees it.
    CombatLog { id: u64, player: Option<String> },
    SetOption { name: String, value: String },
    Quit,
}

fn usage(command: &'static str, usage: &'static str) -> ProtocolError {
    ProtocolError::Usage { command, usage }
}

fn parse_number<T: std::str::FromStr>(what: &'static str, token: &str) -> Result<T, ProtocolError> {
    token.parse().map_err(|_| ProtocolError::InvalidValue { what, value: token.to_string() })
}

fn parse_client_type(token: &str) -> Result<ClientType, ProtocolError> {
    match token {
        "human" => Ok(ClientType::Human),
        "ai" => Ok(ClientType::Ai),
        "observer" => Ok(ClientType::Observer),
        other => Err(ProtocolError::InvalidValue { what: "client type", value: other.to_string() }),
    }
}

fn parse_action(token: &str) -> Result<DiplomaticAction, ProtocolError> {
    match token {
        "war" => Ok(DiplomaticAction::DeclareWar),
        "peace" => Ok(DiplomaticAction::ProposePeace),
        "ally" => Ok(DiplomaticAction::ProposeAlliance),
        "unally" => Ok(DiplomaticAction::EndAlliance),
        other => Err(ProtocolError::InvalidValue { what: "diplomatic action", value: other.to_string() }),
    }
}

/// Parses one line. Blank lines give `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, ProtocolError> {
    let trimmed = line.trim();
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let Some(&head) = tokens.first() else {
        return Ok(None);
    };

    let cmd = match head {
        "expire" => Command::Expire,
        "status" => Command::Status,
        "quit" => Command::Quit,

        "join" => match tokens.as_slice() {
            [_, name, kind] => Command::Join {
                name: name.to_string(),
                client_type: parse_client_type(kind)?,
                address: "local".to_string(),
            },
            [_, name, kind, address] => Command::Join {
                name: name.to_string(),
                client_type: parse_client_type(kind)?,
                address: address.to_string(),
            },
            _ => return Err(usage("join", "join <name> <human|ai|observer> [address]")),
        },
        "start" => match tokens.as_slice() {
            [_] => Command::Start { seed: None },
            [_, seed] => Command::Start { seed: Some(parse_number("seed", seed)?) },
            _ => return Err(usage("start", "start [seed]")),
        },
        "orders" => parse_orders(&tokens, trimmed)?,
        "unready" => match tokens.as_slice() {
            [_, player] => Command::Unready { player: player.to_string() },
            _ => return Err(usage("unready", "unready <player>")),
        },
        "disconnect" => match tokens.as_slice() {
            [_, player] => Command::Disconnect { player: player.to_string() },
            _ => return Err(usage("disconnect", "disconnect <player>")),
        },
        "diplo" => match tokens.as_slice() {
            [_, player, action, target] => Command::Diplo {
                player: player.to_string(),
                action: parse_action(action)?,
                target: EmpireId(parse_number("empire", target)?),
            },
            _ => return Err(usage("diplo", "diplo <player> <war|peace|ally|unally> <empire>")),
        },
        "save" => match tokens.as_slice() {
            [_, name] => Command::Save { name: name.to_string() },
            _ => return Err(usage("save", "save <name>")),
        },
        "load" => match tokens.as_slice() {
            [_, name] => Command::Load { name: name.to_string() },
            _ => return Err(usage("load", "load <name>")),
        },
        "previews" => match tokens.as_slice() {
            [_] => Command::Previews { directory: String::new() },
            [_, dir] => Command::Previews { directory: dir.to_string() },
            _ => return Err(usage("previews", "previews [directory]")),
        },
        "combatlog" => match tokens.as_slice() {
            [_, id] => Command::CombatLog { id: parse_number("combat log id", id)?, player: None },
            [_, id, player] => Command::CombatLog {
                id: parse_number("combat log id", id)?,
                player: Some(player.to_string()),
            },
            _ => return Err(usage("combatlog", "combatlog <id> [player]")),
        },
        "setoption" => parse_setoption(&tokens)?,
        other => return Err(ProtocolError::UnknownCommand(other.to_string())),
    };
    Ok(Some(cmd))
}

/// Parses `orders <player> <json>`, where the JSON may contain spaces.
fn parse_orders(tokens: &[&str], line: &str) -> Result<Command, ProtocolError> {
    let [_, player, ..] = tokens else {
        return Err(usage("orders", "orders <player> <json>"));
    };
    let json = line["orders".len()..].trim_start()[player.len()..].trim();
    if json.is_empty() {
        return Err(usage("orders", "orders <player> <json>"));
    }
    let orders: OrderSet = serde_json::from_str(json).map_err(|e| ProtocolError::Orders(e.to_string()))?;
    Ok(Command::Orders { player: player.to_string(), orders })
}

/// Parses `setoption name <id> value <x>`.
fn parse_setoption(tokens: &[&str]) -> Result<Command, ProtocolError> {
    const USAGE: &str = "setoption name <id> value <x>";
    if tokens.len() < 5 || tokens[1] != "name" {
        return Err(usage("setoption", USAGE));
    }
    let Some(value_idx) = tokens.iter().position(|&t| t == "value") else {
        return Err(usage("setoption", USAGE));
    };
    let name = tokens[2..value_idx].join(" ");
    let value = tokens[value_idx + 1..].join(" ");
    if name.is_empty() || value.is_empty() {
        return Err(usage("setoption", USAGE));
    }
    Ok(Command::SetOption { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;
    use crate::universe::ObjectId;

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command("expire").unwrap(), Some(Command::Expire));
        assert_eq!(parse_command("  status  ").unwrap(), Some(Command::Status));
        assert_eq!(parse_command("quit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn parse_empty_line_returns_none() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn parse_unknown_command() {
        assert_eq!(parse_command("xyzzy"), Err(ProtocolError::UnknownCommand("xyzzy".to_string())));
    }

    #[test]
    fn parse_join() {
        assert_eq!(
            parse_command("join alice human").unwrap(),
            Some(Command::Join {
                name: "alice".to_string(),
                client_type: ClientType::Human,
                address: "local".to_string()
            })
        );
        assert!(matches!(
            parse_command("join bot ai 10.0.0.2").unwrap(),
            Some(Command::Join { client_type: ClientType::Ai, ref address, .. }) if address == "10.0.0.2"
        ));
        assert!(matches!(parse_command("join alice robot"), Err(ProtocolError::InvalidValue { .. })));
        assert!(matches!(parse_command("join"), Err(ProtocolError::Usage { .. })));
    }

    #[test]
    fn parse_start_with_and_without_seed() {
        assert_eq!(parse_command("start").unwrap(), Some(Command::Start { seed: None }));
        assert_eq!(parse_command("start 42").unwrap(), Some(Command::Start { seed: Some(42) }));
        assert!(matches!(parse_command("start x"), Err(ProtocolError::InvalidValue { .. })));
    }

    #[test]
    fn parse_orders_json_with_spaces() {
        let mut expected = OrderSet::new();
        expected.issue(Order::Scrap { object: ObjectId(7) });
        let json = serde_json::to_string(&expected).unwrap();
        let line = format!("orders alice   {}", json.replace(':', ": "));
        assert_eq!(
            parse_command(&line).unwrap(),
            Some(Command::Orders { player: "alice".to_string(), orders: expected })
        );
    }

    #[test]
    fn parse_orders_rejects_bad_json() {
        assert!(matches!(parse_command("orders alice {nope"), Err(ProtocolError::Orders(_))));
        assert!(matches!(parse_command("orders alice"), Err(ProtocolError::Usage { .. })));
    }

    #[test]
    fn parse_diplo() {
        assert_eq!(
            parse_command("diplo alice peace 2").unwrap(),
            Some(Command::Diplo {
                player: "alice".to_string(),
                action: DiplomaticAction::ProposePeace,
                target: EmpireId(2)
            })
        );
        assert!(matches!(parse_command("diplo alice hug 2"), Err(ProtocolError::InvalidValue { .. })));
    }

    #[test]
    fn parse_combatlog() {
        assert_eq!(parse_command("combatlog 3").unwrap(), Some(Command::CombatLog { id: 3, player: None }));
        assert_eq!(
            parse_command("combatlog 3 bob").unwrap(),
            Some(Command::CombatLog { id: 3, player: Some("bob".to_string()) })
        );
    }

    #[test]
    fn parse_setoption_with_value() {
        assert_eq!(
            parse_command("setoption name effects.server.threads value 8").unwrap(),
            Some(Command::SetOption { name: "effects.server.threads".to_string(), value: "8".to_string() })
        );
        assert!(matches!(parse_command("setoption name seed"), Err(ProtocolError::Usage { .. })));
    }

    #[test]
    fn parse_save_load_previews() {
        assert_eq!(parse_command("save g1").unwrap(), Some(Command::Save { name: "g1".to_string() }));
        assert_eq!(parse_command("load g1").unwrap(), Some(Command::Load { name: "g1".to_string() }));
        assert_eq!(
            parse_command("previews").unwrap(),
            Some(Command::Previews { directory: String::new() })
        );
    }
}
