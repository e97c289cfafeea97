//! Empire registry: per-empire state, diplomacy, sitreps, economy queues.

pub mod manager;
pub mod policy;
pub mod pools;
pub mod queue;
pub mod sitrep;
pub mod state;

pub use manager::{DiplomacyError, DiplomaticAction, DiplomaticStatus, EmpireManager};
pub use policy::{advance_policy_turns, validate_adopted_policies};
pub use pools::{compute_resource_pools, GroupPool, ResourcePools};
pub use queue::{ProductionItem, ProductionKind, ProductionQueue, ResearchQueue};
pub use sitrep::{SitRep, SitRepKind};
pub use state::{AdoptedPolicy, Empire, FocusChange, POLICY_UPKEEP_FRACTION};
