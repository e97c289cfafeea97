//! Integer identifiers for objects, empires, and players.
//!
//! Relations between objects are stored as ids resolved through the
//! [`Universe`](super::Universe) arena, never as owning references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a universe object. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i32);

/// Identifies an empire. Assigned 1..N at game start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmpireId(pub i32);

/// Identifies a connected player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for EmpireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "empire {}", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// Formats an optional owner, with `None` rendered as "unowned".
pub fn owner_label(owner: Option<EmpireId>) -> String {
    match owner {
        Some(id) => id.to_string(),
        None => "unowned".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_numerically() {
        assert!(ObjectId(3) < ObjectId(10));
        assert!(EmpireId(1) < EmpireId(2));
    }

    #[test]
    fn owner_label_formats_unowned() {
        assert_eq!(owner_label(None), "unowned");
        assert_eq!(owner_label(Some(EmpireId(4))), "empire 4");
    }

    #[test]
    fn ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&ObjectId(17)).unwrap();
        assert_eq!(json, "17");
        let back: EmpireId = serde_json::from_str("5").unwrap();
        assert_eq!(back, EmpireId(5));
    }
}
