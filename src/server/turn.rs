//! The turn orchestrator: collects orders and resolves turns.
//!
//! A turn runs pre-combat, combat, and post-combat strictly in sequence.
//! No phase is skipped, so an empty turn still advances the turn counter.

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::collab::{ScriptError, ScriptHost, TurnProgressPhase};
use super::players::PlayerSaveGameData;
use super::state::GameState;
use crate::empire::{validate_adopted_policies, EmpireManager, SitRepKind};
use crate::order::apply_order_set;
use crate::resolve::{
    check_victory, clear_arrival_flags, handle_colonization, handle_gifting, handle_invasion,
    handle_scrapping, move_fleets, process_combats, process_production, process_research,
    record_focus_changes, update_influence, update_resource_pools,
};
use crate::universe::{apply_meter_effects, update_empire_object_visibilities, EmpireId, ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerPhase {
    AwaitingOrders,
    ResolvingPreCombat,
    ResolvingCombat,
    ResolvingPostCombat,
    GameOver,
    ShuttingDown,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("{0} is not expected to submit orders this turn")]
    NotInSequence(EmpireId),

    #[error("orders are not accepted while {0:?}")]
    WrongPhase(ServerPhase),
}

/// What one post-combat pass changed, for the server shell to report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReport {
    /// Turn that was resolved.
    pub turn: i32,
    pub combat_systems: Vec<ObjectId>,
    pub eliminated: Vec<EmpireId>,
    pub new_victories: Vec<(EmpireId, String)>,
    pub script_error: Option<ScriptError>,
}

#[derive(Debug)]
pub struct TurnOrchestrator {
    phase: ServerPhase,
    /// Empires waited on this turn and the orders each has sent.
    turn_sequence: BTreeMap<EmpireId, Option<PlayerSaveGameData>>,
    expired: bool,
}

impl Default for TurnOrchestrator {
    fn default() -> Self {
        TurnOrchestrator::new()
    }
}

impl TurnOrchestrator {
    pub fn new() -> Self {
        TurnOrchestrator {
            phase: ServerPhase::AwaitingOrders,
            turn_sequence: BTreeMap::new(),
            expired: false,
        }
    }

    pub fn phase(&self) -> ServerPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: ServerPhase) {
        self.phase = phase;
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Empires in the turn sequence, ascending.
    pub fn sequenced_empires(&self) -> Vec<EmpireId> {
        self.turn_sequence.keys().copied().collect()
    }

    pub fn orders_of(&self, empire: EmpireId) -> Option<&PlayerSaveGameData> {
        self.turn_sequence.get(&empire).and_then(Option::as_ref)
    }

    /// Opens order collection for every living empire.
    pub fn begin_turn_sequence(&mut self, empires: &EmpireManager) {
        self.turn_sequence = empires.living_ids().into_iter().map(|id| (id, None)).collect();
    }

    pub fn remove_empire(&mut self, empire: EmpireId) {
        self.turn_sequence.remove(&empire);
    }

    /// Stores an empire's orders for this turn and marks it ready. A later
    /// submission replaces an earlier one.
    pub fn submit_orders(
        &mut self,
        state: &mut GameState,
        data: PlayerSaveGameData,
    ) -> Result<(), TurnError> {
        if self.phase != ServerPhase::AwaitingOrders {
            return Err(TurnError::WrongPhase(self.phase));
        }
        let empire = data.empire_id;
        let Some(slot) = self.turn_sequence.get_mut(&empire) else {
            return Err(TurnError::NotInSequence(empire));
        };
        *slot = Some(data);
        if let Some(e) = state.empires.get_mut(empire) {
            e.ready = true;
        }
        Ok(())
    }

    /// Un-readies an empire; its orders stay until replaced.
    pub fn revoke_readiness(&mut self, state: &mut GameState, empire: EmpireId) {
        if let Some(e) = state.empires.get_mut(empire) {
            e.ready = false;
        }
    }

    /// Lets the turn advance without missing human orders. Cleared when the
    /// next turn starts resolving.
    pub fn expire_turn(&mut self) {
        self.expired = true;
    }

    /// True when every living sequenced empire has sent orders and is
    /// ready, or the turn was expired and the empire is human. AI empires
    /// always have to submit.
    pub fn all_orders_received(&self, empires: &EmpireManager) -> bool {
        self.turn_sequence.iter().all(|(&id, entry)| {
            let Some(empire) = empires.get(id) else { return true };
            if empire.eliminated {
                return true;
            }
            (entry.is_some() && empire.ready) || (self.expired && !empire.ai_controlled)
        })
    }

    /// Applies orders, runs the colonize/invade/gift/scrap pipeline,
    /// propagates supply from the resulting ownership, and moves fleets.
    pub fn pre_combat(&mut self, state: &mut GameState, progress: &mut dyn FnMut(TurnProgressPhase)) {
        self.phase = ServerPhase::ResolvingPreCombat;
        self.expired = false;
        let turn = state.current_turn;
        info!("turn {}: pre-combat", turn);
        progress(TurnProgressPhase::ProcessingOrders);

        // Keeps reports raised while orders were collected this turn.
        for empire in state.empires.iter_mut() {
            empire.sitreps.retain(|s| s.turn >= turn);
        }
        clear_arrival_flags(&mut state.universe);

        let submitted = std::mem::take(&mut self.turn_sequence);
        for (empire, data) in submitted {
            let Some(data) = data else { continue };
            if state.empires.get(empire).map_or(true, |e| e.eliminated) {
                warn!("ignoring orders from eliminated {}", empire);
                continue;
            }
            let applied = apply_order_set(&mut state.order_context(), empire, &data.orders);
            info!("{}: {} of {} orders applied", empire, applied, data.orders.len());
        }

        record_focus_changes(&mut state.universe, &mut state.empires, turn);
        for empire in state.empires.iter_mut().filter(|e| !e.eliminated) {
            validate_adopted_policies(empire, turn);
            empire.ready = false;
        }
        state.universe.delete_empty_fleets();

        progress(TurnProgressPhase::ColonizeAndScrap);
        handle_colonization(&mut state.universe, &mut state.empires, turn);
        handle_invasion(&mut state.universe, &mut state.empires, turn);
        handle_gifting(&mut state.universe, &mut state.empires, turn);
        handle_scrapping(&mut state.universe, &mut state.empires, turn);

        state.supply.update_unobstructed_systems(&state.universe, &state.empires, true);
        state.supply.update(&state.universe, &state.empires);

        progress(TurnProgressPhase::FleetMovement);
        move_fleets(&mut state.universe, &mut state.empires, &mut state.supply, turn);
        update_empire_object_visibilities(&mut state.universe, &state.empires);
    }

    /// Resolves every qualifying battle. Returns the battle systems.
    pub fn process_combats(
        &mut self,
        state: &mut GameState,
        progress: &mut dyn FnMut(TurnProgressPhase),
    ) -> Vec<ObjectId> {
        self.phase = ServerPhase::ResolvingCombat;
        progress(TurnProgressPhase::Combat);
        let resolver = state.combat_resolver();
        let systems = process_combats(
            &mut state.universe,
            &mut state.empires,
            &mut state.combat_logs,
            &resolver,
            state.rules.monster_detection_strength,
            state.current_turn,
        );
        info!("turn {}: {} battles", state.current_turn, systems.len());
        systems
    }

    /// Applies effects and the economy, runs turn events, checks elimination
    /// and victory, and advances the turn counter by exactly one. A turn
    /// event failure is reported but never stops the turn.
    pub fn post_combat(
        &mut self,
        state: &mut GameState,
        script: &mut dyn ScriptHost,
        progress: &mut dyn FnMut(TurnProgressPhase),
    ) -> TurnReport {
        self.phase = ServerPhase::ResolvingPostCombat;
        let turn = state.current_turn;
        progress(TurnProgressPhase::EmpireProduction);

        apply_meter_effects(&mut state.universe, &mut state.empires, &state.supply, &state.rules, turn);
        state.supply.update_unobstructed_systems(&state.universe, &state.empires, false);
        state.supply.update(&state.universe, &state.empires);
        update_resource_pools(
            &state.universe,
            &mut state.empires,
            &state.supply,
            &state.rules,
            state.config.effects_threads,
        );
        process_production(&mut state.universe, &mut state.empires, &state.rules, turn);
        process_research(&mut state.empires, &state.rules, turn);
        update_influence(&mut state.empires);

        let script_error = script.execute_turn_events(state).err();
        if let Some(e) = &script_error {
            warn!("turn {} events failed: {}", turn, e);
            for empire in state.empires.iter_mut().filter(|e| !e.eliminated) {
                empire.add_sitrep(turn, SitRepKind::TurnEventsFailed);
            }
        }

        let reasons_before: BTreeMap<EmpireId, BTreeSet<String>> = state
            .empires
            .iter()
            .map(|e| (e.id, e.victory_reasons.clone()))
            .collect();
        let rules = state.victory_rules();
        let eliminated = check_victory(&mut state.universe, &mut state.empires, &rules, turn);
        let mut new_victories = Vec::new();
        for empire in state.empires.iter() {
            let before = reasons_before.get(&empire.id);
            new_victories.extend(
                empire
                    .victory_reasons
                    .iter()
                    .filter(|r| before.map_or(true, |b| !b.contains(*r)))
                    .map(|r| (empire.id, r.clone())),
            );
        }
        for &empire in &eliminated {
            self.remove_empire(empire);
        }

        update_empire_object_visibilities(&mut state.universe, &state.empires);
        state.universe.back_propagate_meters();
        state.current_turn += 1;
        self.begin_turn_sequence(&state.empires);
        self.phase = if state.empires.living_ids().is_empty() {
            ServerPhase::GameOver
        } else {
            ServerPhase::AwaitingOrders
        };
        progress(TurnProgressPhase::Downloading);
        info!("turn {} begins", state.current_turn);

        TurnReport { turn, combat_systems: Vec::new(), eliminated, new_victories, script_error }
    }

    /// Runs all three phases of one turn.
    pub fn process_turn(
        &mut self,
        state: &mut GameState,
        script: &mut dyn ScriptHost,
        progress: &mut dyn FnMut(TurnProgressPhase),
    ) -> TurnReport {
        self.pre_combat(state, progress);
        let combat_systems = self.process_combats(state, progress);
        let mut report = self.post_combat(state, script, progress);
        report.combat_systems = combat_systems;
        report
    }
}
