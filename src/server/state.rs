//! The authoritative game state threaded through every turn phase.

use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::content::GameRules;
use crate::empire::EmpireManager;
use crate::order::OrderContext;
use crate::resolve::{AutoResolveCombat, CombatLogManager, SupplyManager, VictoryRules};
use crate::universe::{GalaxySetup, Universe};

/// The first turn of a new game.
pub const FIRST_TURN: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub universe: Universe,
    pub empires: EmpireManager,
    pub supply: SupplyManager,
    pub combat_logs: CombatLogManager,
    pub rules: GameRules,
    pub config: ServerConfig,
    pub current_turn: i32,
}

impl GameState {
    pub fn new(rules: GameRules, config: ServerConfig) -> Self {
        GameState {
            universe: Universe::new(),
            empires: EmpireManager::new(),
            supply: SupplyManager::new(),
            combat_logs: CombatLogManager::new(),
            rules,
            config,
            current_turn: FIRST_TURN,
        }
    }

    pub fn order_context(&mut self) -> OrderContext<'_> {
        OrderContext {
            universe: &mut self.universe,
            empires: &mut self.empires,
            rules: &self.rules,
            turn: self.current_turn,
        }
    }

    pub fn galaxy_setup(&self) -> GalaxySetup {
        GalaxySetup {
            seed: self.config.seed,
            systems: self.config.galaxy_systems,
            monsters: self.config.monsters,
            natives: self.config.natives,
        }
    }

    pub fn combat_resolver(&self) -> AutoResolveCombat {
        AutoResolveCombat::new(self.config.combat_bouts, self.config.seed)
    }

    pub fn victory_rules(&self) -> VictoryRules {
        VictoryRules::from(&self.config)
    }
}
