//! The line protocol spoken by the `starlane` binary.
//!
//! Commands arrive one per line on stdin; server messages leave one per
//! line on stdout as `to <player> <json>` or `all <json>`.

pub mod output;
pub mod parser;

pub use output::LineMessenger;
pub use parser::{parse_command, Command, ProtocolError};
