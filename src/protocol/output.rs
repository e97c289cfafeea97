//! Writes server messages as JSON lines.

use std::io::Write;

use log::error;

use crate::server::{Messenger, ServerMessage};
use crate::universe::PlayerId;

pub struct LineMessenger<W: Write> {
    out: W,
}

impl<W: Write> LineMessenger<W> {
    pub fn new(out: W) -> Self {
        LineMessenger { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes a raw line, for replies that are not server messages.
    pub fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|()| self.out.flush()) {
            error!("failed to write output: {}", e);
        }
    }

    fn write_message(&mut self, prefix: &str, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(json) => self.write_line(&format!("{} {}", prefix, json)),
            Err(e) => error!("failed to encode {:?}: {}", message, e),
        }
    }
}

impl<W: Write> Messenger for LineMessenger<W> {
    fn send_to_player(&mut self, player: PlayerId, message: ServerMessage) {
        self.write_message(&format!("to {}", player.0), &message);
    }

    fn send_to_all(&mut self, message: ServerMessage) {
        self.write_message("all", &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_one_json_line_each() {
        let mut m = LineMessenger::new(Vec::new());
        m.send_to_player(PlayerId(2), ServerMessage::TurnOrdersAccepted { turn: 3 });
        m.send_to_all(ServerMessage::EndGame { reason: "done".to_string() });
        let text = String::from_utf8(m.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"to 2 {"TurnOrdersAccepted":{"turn":3}}"#);
        assert_eq!(lines[1], r#"all {"EndGame":{"reason":"done"}}"#);
    }
}
