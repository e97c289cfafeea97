//! Situation reports: per-empire, per-turn notices of notable events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::universe::{owner_label, EmpireId, ObjectId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SitRepKind {
    PlanetColonized { planet: ObjectId, species: Option<String> },
    /// Ships of several empires targeted the same planet.
    ColonizationConflict { planet: ObjectId, rivals: Vec<EmpireId> },
    ColonizationObstructed { planet: ObjectId },
    GroundCombat { planet: ObjectId, victor: Option<EmpireId>, stalemate: bool },
    PlanetCaptured { planet: ObjectId, by: EmpireId, from: Option<EmpireId> },
    PlanetRebelled { planet: ObjectId },
    PlanetDepopulated { planet: ObjectId },
    PlanetBombarded { planet: ObjectId, by: Option<EmpireId> },
    ObjectGifted { object: ObjectId, to: EmpireId },
    ObjectReceived { object: ObjectId, from: EmpireId },
    ObjectScrapped { object: ObjectId },
    FleetArrived { fleet: ObjectId, system: ObjectId },
    FleetBlockaded { fleet: ObjectId, system: ObjectId },
    CombatOccurred { system: ObjectId, log_id: u64 },
    ObjectDestroyed { object: ObjectId, system: ObjectId },
    /// Structure, shield, and defense lost in a battle the object survived.
    ObjectDamaged { object: ObjectId, system: ObjectId, damage: f32 },
    ProductionComplete { item: String, location: ObjectId },
    ProductionDropped { item: String, location: ObjectId },
    TechResearched { tech: String },
    PolicyReverted { policy: String },
    DiplomaticStatusChanged { other: EmpireId, status: String },
    MonsterSpawned { system: ObjectId },
    EmpireEliminated { empire: EmpireId },
    Victory { reason: String },
    OrderRejected { order_id: u32, reason: String },
    TurnEventsFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitRep {
    pub turn: i32,
    pub kind: SitRepKind,
}

impl SitRep {
    pub fn new(turn: i32, kind: SitRepKind) -> Self {
        SitRep { turn, kind }
    }
}

impl fmt::Display for SitRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[turn {}] ", self.turn)?;
        match &self.kind {
            SitRepKind::PlanetColonized { planet, species: Some(s) } => {
                write!(f, "planet {} colonized by {}", planet, s)
            }
            SitRepKind::PlanetColonized { planet, species: None } => {
                write!(f, "outpost established on planet {}", planet)
            }
            SitRepKind::ColonizationConflict { planet, rivals } => {
                let names: Vec<String> = rivals.iter().map(ToString::to_string).collect();
                write!(f, "colonization of planet {} blocked: contested by {}", planet, names.join(", "))
            }
            SitRepKind::ColonizationObstructed { planet } => {
                write!(f, "colonization of planet {} blocked by enemy armed ships", planet)
            }
            SitRepKind::GroundCombat { planet, victor, stalemate } => {
                if *stalemate {
                    write!(f, "ground combat on planet {} ended in stalemate", planet)
                } else {
                    write!(f, "ground combat on planet {} won by {}", planet, owner_label(*victor))
                }
            }
            SitRepKind::PlanetCaptured { planet, by, from } => {
                write!(f, "planet {} captured by {} from {}", planet, by, owner_label(*from))
            }
            SitRepKind::PlanetRebelled { planet } => write!(f, "planet {} is now independent", planet),
            SitRepKind::PlanetDepopulated { planet } => write!(f, "planet {} depopulated", planet),
            SitRepKind::PlanetBombarded { planet, by } => {
                write!(f, "planet {} bombarded by {}", planet, owner_label(*by))
            }
            SitRepKind::ObjectGifted { object, to } => write!(f, "object {} given to {}", object, to),
            SitRepKind::ObjectReceived { object, from } => {
                write!(f, "object {} received from {}", object, from)
            }
            SitRepKind::ObjectScrapped { object } => write!(f, "object {} scrapped", object),
            SitRepKind::FleetArrived { fleet, system } => {
                write!(f, "fleet {} arrived at system {}", fleet, system)
            }
            SitRepKind::FleetBlockaded { fleet, system } => {
                write!(f, "fleet {} blockaded at system {}", fleet, system)
            }
            SitRepKind::CombatOccurred { system, log_id } => {
                write!(f, "combat at system {} (log {})", system, log_id)
            }
            SitRepKind::ObjectDestroyed { object, system } => {
                write!(f, "object {} destroyed at system {}", object, system)
            }
            SitRepKind::ObjectDamaged { object, system, damage } => {
                write!(f, "object {} took {:.1} damage at system {}", object, damage, system)
            }
            SitRepKind::ProductionComplete { item, location } => {
                write!(f, "{} completed at {}", item, location)
            }
            SitRepKind::ProductionDropped { item, location } => {
                write!(f, "{} at {} removed from queue", item, location)
            }
            SitRepKind::TechResearched { tech } => write!(f, "researched {}", tech),
            SitRepKind::PolicyReverted { policy } => write!(f, "adoption of {} reverted", policy),
            SitRepKind::DiplomaticStatusChanged { other, status } => {
                write!(f, "now at {} with {}", status, other)
            }
            SitRepKind::MonsterSpawned { system } => write!(f, "monsters sighted at system {}", system),
            SitRepKind::EmpireEliminated { empire } => write!(f, "{} has been eliminated", empire),
            SitRepKind::Victory { reason } => write!(f, "victory: {}", reason),
            SitRepKind::OrderRejected { order_id, reason } => {
                write!(f, "order {} rejected: {}", order_id, reason)
            }
            SitRepKind::TurnEventsFailed => write!(f, "turn events had errors"),
        }
    }
}
