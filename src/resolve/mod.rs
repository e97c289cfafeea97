//! Turn resolution passes.
//!
//! The post-order pipeline (colonize, invade, gift, scrap) consumes flags set
//! during order application; supply, movement, combat, the economy, and the
//! elimination/victory checks run around it in the order the turn
//! orchestrator drives them.

pub mod colonize;
pub mod combat;
pub mod economy;
pub mod gift;
pub mod invade;
pub mod movement;
pub mod scrap;
pub mod supply;
pub mod victory;

pub use colonize::handle_colonization;
pub use combat::{
    apply_combat_results, combat_conditions_in_system, process_combats, AutoResolveCombat,
    CombatEvent, CombatInfo, CombatLog, CombatLogManager, CombatResolver,
};
pub use economy::{
    apply_tech_effects, process_production, process_research, record_focus_changes,
    update_influence, update_resource_pools,
};
pub use gift::handle_gifting;
pub use invade::{
    handle_invasion, resolve_ground_combat, transfer_planet, GroundCombatOutcome, GroundForces,
};
pub use movement::{clear_arrival_flags, move_fleets};
pub use scrap::handle_scrapping;
pub use supply::SupplyManager;
pub use victory::{
    check_victory, eliminate_empire, empire_eliminated, VictoryRules, VICTORY_ALL_ENEMIES_ELIMINATED,
    VICTORY_FEW_HUMANS_ALIVE,
};
