//! Connected players and their per-turn order buffers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::collab::Role;
use crate::order::OrderSet;
use crate::universe::{EmpireId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    Human,
    Ai,
    Observer,
}

impl ClientType {
    pub fn plays(self) -> bool {
        !matches!(self, ClientType::Observer)
    }
}

/// One player's submission for the current turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSaveGameData {
    pub name: String,
    pub empire_id: EmpireId,
    pub orders: OrderSet,
    /// Opaque client state, stored and returned untouched.
    pub ui_data: Option<String>,
    pub client_type: ClientType,
}

/// What universe generation needs to know about a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSetup {
    pub player_name: String,
    pub empire_name: String,
    pub empire_id: EmpireId,
    pub client_type: ClientType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConnection {
    pub id: PlayerId,
    pub name: String,
    pub client_type: ClientType,
    pub empire: Option<EmpireId>,
    pub connected: bool,
    pub roles: BTreeSet<Role>,
    /// Other players this one may act for.
    pub delegates: Vec<String>,
}

impl PlayerConnection {
    pub fn new(id: PlayerId, name: &str, client_type: ClientType, roles: BTreeSet<Role>) -> Self {
        PlayerConnection {
            id,
            name: name.to_string(),
            client_type,
            empire: None,
            connected: true,
            roles,
            delegates: Vec::new(),
        }
    }

    pub fn is_host(&self) -> bool {
        self.roles.contains(&Role::Host)
    }
}
