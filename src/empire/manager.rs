//! The empire registry and the diplomatic status matrix.
//!
//! Every pair of empires starts at war. Peace and alliance need a proposal
//! from each side; declaring war and ending an alliance are unilateral.

use std::collections::BTreeMap;
use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use super::sitrep::SitRepKind;
use super::state::Empire;
use crate::universe::EmpireId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiplomaticStatus {
    War,
    Peace,
    Allied,
}

impl fmt::Display for DiplomaticStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiplomaticStatus::War => write!(f, "war"),
            DiplomaticStatus::Peace => write!(f, "peace"),
            DiplomaticStatus::Allied => write!(f, "alliance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiplomaticAction {
    DeclareWar,
    ProposePeace,
    ProposeAlliance,
    EndAlliance,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiplomacyError {
    #[error("diplomacy is disabled for this game")]
    Disabled,

    #[error("no such empire: {0}")]
    NoSuchEmpire(EmpireId),

    #[error("an empire cannot negotiate with itself")]
    SameEmpire,

    #[error("{0} has been eliminated")]
    Eliminated(EmpireId),

    #[error("cannot {action:?} while at {status}")]
    InvalidTransition { action: DiplomaticAction, status: DiplomaticStatus },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmpireManager {
    empires: BTreeMap<EmpireId, Empire>,
    /// Symmetric: both `[a][b]` and `[b][a]` are stored.
    statuses: BTreeMap<EmpireId, BTreeMap<EmpireId, DiplomaticStatus>>,
    /// Pending proposals, proposer first.
    proposals: BTreeMap<EmpireId, BTreeMap<EmpireId, DiplomaticStatus>>,
}

impl EmpireManager {
    pub fn new() -> Self {
        EmpireManager::default()
    }

    /// Registers an empire at war with every existing one.
    pub fn insert(&mut self, empire: Empire) {
        let id = empire.id;
        let others: Vec<EmpireId> = self.empires.keys().copied().filter(|&o| o != id).collect();
        for other in others {
            self.set_status(id, other, DiplomaticStatus::War);
        }
        self.empires.insert(id, empire);
    }

    pub fn get(&self, id: EmpireId) -> Option<&Empire> {
        self.empires.get(&id)
    }

    pub fn get_mut(&mut self, id: EmpireId) -> Option<&mut Empire> {
        self.empires.get_mut(&id)
    }

    pub fn contains(&self, id: EmpireId) -> bool {
        self.empires.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.empires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.empires.is_empty()
    }

    /// Empires in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Empire> {
        self.empires.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Empire> {
        self.empires.values_mut()
    }

    pub fn ids(&self) -> Vec<EmpireId> {
        self.empires.keys().copied().collect()
    }

    /// Ids of empires that have not been eliminated.
    pub fn living_ids(&self) -> Vec<EmpireId> {
        self.empires.values().filter(|e| !e.eliminated).map(|e| e.id).collect()
    }

    /// Direct map access, for per-empire parallel passes.
    pub fn map_mut(&mut self) -> &mut BTreeMap<EmpireId, Empire> {
        &mut self.empires
    }

    pub fn status(&self, a: EmpireId, b: EmpireId) -> DiplomaticStatus {
        if a == b {
            return DiplomaticStatus::Allied;
        }
        self.statuses
            .get(&a)
            .and_then(|m| m.get(&b))
            .copied()
            .unwrap_or(DiplomaticStatus::War)
    }

    pub fn set_status(&mut self, a: EmpireId, b: EmpireId, status: DiplomaticStatus) {
        if a == b {
            return;
        }
        self.statuses.entry(a).or_default().insert(b, status);
        self.statuses.entry(b).or_default().insert(a, status);
    }

    pub fn at_war(&self, a: EmpireId, b: EmpireId) -> bool {
        a != b && self.status(a, b) == DiplomaticStatus::War
    }

    pub fn are_allied(&self, a: EmpireId, b: EmpireId) -> bool {
        a != b && self.status(a, b) == DiplomaticStatus::Allied
    }

    /// Hostility between two possibly-unowned parties. Unowned objects are
    /// hostile to every empire but not to each other.
    pub fn hostile(&self, a: Option<EmpireId>, b: Option<EmpireId>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.at_war(a, b),
            (None, None) => false,
            _ => true,
        }
    }

    pub fn pending_proposal(&self, from: EmpireId, to: EmpireId) -> Option<DiplomaticStatus> {
        self.proposals.get(&from).and_then(|m| m.get(&to)).copied()
    }

    fn clear_proposals(&mut self, a: EmpireId, b: EmpireId) {
        if let Some(m) = self.proposals.get_mut(&a) {
            m.remove(&b);
        }
        if let Some(m) = self.proposals.get_mut(&b) {
            m.remove(&a);
        }
    }

    /// Applies a diplomatic action from `from` toward `to`. Returns the new
    /// status when the pair's status changed, `None` when a proposal was
    /// only recorded.
    pub fn handle_diplomatic_action(
        &mut self,
        from: EmpireId,
        to: EmpireId,
        action: DiplomaticAction,
        enabled: bool,
        turn: i32,
    ) -> Result<Option<DiplomaticStatus>, DiplomacyError> {
        if !enabled {
            return Err(DiplomacyError::Disabled);
        }
        if from == to {
            return Err(DiplomacyError::SameEmpire);
        }
        for id in [from, to] {
            match self.get(id) {
                None => return Err(DiplomacyError::NoSuchEmpire(id)),
                Some(e) if e.eliminated => return Err(DiplomacyError::Eliminated(id)),
                Some(_) => {}
            }
        }

        let status = self.status(from, to);
        let invalid = DiplomacyError::InvalidTransition { action, status };
        let target = match action {
            DiplomaticAction::DeclareWar if status != DiplomaticStatus::War => {
                Some(DiplomaticStatus::War)
            }
            DiplomaticAction::EndAlliance if status == DiplomaticStatus::Allied => {
                Some(DiplomaticStatus::Peace)
            }
            DiplomaticAction::ProposePeace if status == DiplomaticStatus::War => {
                self.propose(from, to, DiplomaticStatus::Peace)
            }
            DiplomaticAction::ProposeAlliance if status == DiplomaticStatus::Peace => {
                self.propose(from, to, DiplomaticStatus::Allied)
            }
            _ => return Err(invalid),
        };

        if let Some(new_status) = target {
            self.set_status(from, to, new_status);
            self.clear_proposals(from, to);
            info!("{} and {} now at {}", from, to, new_status);
            for (me, other) in [(from, to), (to, from)] {
                if let Some(e) = self.get_mut(me) {
                    e.add_sitrep(
                        turn,
                        SitRepKind::DiplomaticStatusChanged { other, status: new_status.to_string() },
                    );
                }
            }
        }
        Ok(target)
    }

    /// Records a proposal, or returns the proposed status if the other side
    /// already proposed the same.
    fn propose(
        &mut self,
        from: EmpireId,
        to: EmpireId,
        proposed: DiplomaticStatus,
    ) -> Option<DiplomaticStatus> {
        if self.pending_proposal(to, from) == Some(proposed) {
            return Some(proposed);
        }
        self.proposals.entry(from).or_default().insert(to, proposed);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> EmpireManager {
        let mut m = EmpireManager::new();
        for i in 1..=3 {
            m.insert(Empire::new(EmpireId(i), &format!("E{}", i), &format!("p{}", i)));
        }
        m
    }

    #[test]
    fn empires_start_at_war() {
        let m = three();
        assert!(m.at_war(EmpireId(1), EmpireId(2)));
        assert!(m.at_war(EmpireId(3), EmpireId(1)));
        assert!(!m.at_war(EmpireId(2), EmpireId(2)));
    }

    #[test]
    fn peace_requires_both_sides() {
        let mut m = three();
        let r = m
            .handle_diplomatic_action(EmpireId(1), EmpireId(2), DiplomaticAction::ProposePeace, true, 1)
            .unwrap();
        assert_eq!(r, None);
        assert!(m.at_war(EmpireId(1), EmpireId(2)));
        let r = m
            .handle_diplomatic_action(EmpireId(2), EmpireId(1), DiplomaticAction::ProposePeace, true, 1)
            .unwrap();
        assert_eq!(r, Some(DiplomaticStatus::Peace));
        assert_eq!(m.status(EmpireId(1), EmpireId(2)), DiplomaticStatus::Peace);
        assert_eq!(m.get(EmpireId(1)).unwrap().sitreps.len(), 1);
    }

    #[test]
    fn alliance_needs_peace_first() {
        let mut m = three();
        let err = m
            .handle_diplomatic_action(EmpireId(1), EmpireId(2), DiplomaticAction::ProposeAlliance, true, 1)
            .unwrap_err();
        assert!(matches!(err, DiplomacyError::InvalidTransition { .. }));
    }

    #[test]
    fn war_is_unilateral() {
        let mut m = three();
        m.set_status(EmpireId(1), EmpireId(3), DiplomaticStatus::Allied);
        let r = m
            .handle_diplomatic_action(EmpireId(3), EmpireId(1), DiplomaticAction::DeclareWar, true, 2)
            .unwrap();
        assert_eq!(r, Some(DiplomaticStatus::War));
        assert!(m.at_war(EmpireId(1), EmpireId(3)));
    }

    #[test]
    fn disabled_diplomacy_rejects_everything() {
        let mut m = three();
        let err = m
            .handle_diplomatic_action(EmpireId(1), EmpireId(2), DiplomaticAction::ProposePeace, false, 1)
            .unwrap_err();
        assert_eq!(err, DiplomacyError::Disabled);
    }

    #[test]
    fn unowned_is_hostile_to_empires_only() {
        let m = three();
        assert!(m.hostile(None, Some(EmpireId(1))));
        assert!(!m.hostile(None, None));
    }

    #[test]
    fn manager_round_trips_through_json() {
        let mut m = three();
        m.set_status(EmpireId(1), EmpireId(2), DiplomaticStatus::Peace);
        let text = serde_json::to_string(&m).unwrap();
        let back: EmpireManager = serde_json::from_str(&text).unwrap();
        assert_eq!(back, m);
    }
}
