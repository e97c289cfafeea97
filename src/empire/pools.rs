//! Resource pools: what an empire produces this turn and where it can spend it.
//!
//! Industry is only spendable inside the resource-sharing group (a connected
//! set of supplied systems) where it was produced. Research and influence
//! are empire-wide.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::state::Empire;
use crate::content::GameRules;
use crate::universe::{MeterType, ObjectId, Universe};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupPool {
    pub systems: BTreeSet<ObjectId>,
    pub industry: f32,
    pub spent: f32,
}

impl GroupPool {
    pub fn available(&self) -> f32 {
        (self.industry - self.spent).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourcePools {
    pub groups: Vec<GroupPool>,
    pub research: f32,
    pub research_spent: f32,
    pub influence_income: f32,
    pub population: f32,
    /// Owned planets with population.
    pub population_centers: usize,
}

impl ResourcePools {
    pub fn total_industry(&self) -> f32 {
        self.groups.iter().map(|g| g.industry).sum()
    }

    /// Index of the group containing `system`.
    pub fn group_of(&self, system: ObjectId) -> Option<usize> {
        self.groups.iter().position(|g| g.systems.contains(&system))
    }
}

/// Sums output of `empire`'s planets into pools split by `groups`.
pub fn compute_resource_pools(
    empire: &Empire,
    universe: &Universe,
    groups: &[BTreeSet<ObjectId>],
    rules: &GameRules,
) -> ResourcePools {
    let (industry_bonus, research_bonus) = empire
        .adopted_policies
        .keys()
        .filter_map(|name| rules.policy(name))
        .fold((0.0, 0.0), |(i, r), p| (i + p.industry_bonus, r + p.research_bonus));

    let mut pools = ResourcePools {
        groups: groups
            .iter()
            .map(|systems| GroupPool { systems: systems.clone(), industry: 0.0, spent: 0.0 })
            .collect(),
        ..ResourcePools::default()
    };

    for obj in universe.iter().filter(|o| o.owned_by(empire.id)) {
        if obj.as_planet().is_none() {
            continue;
        }
        let industry = obj.meters.current(MeterType::Industry) * (1.0 + industry_bonus);
        if let Some(group) = obj.system_id.and_then(|s| pools.group_of(s)) {
            pools.groups[group].industry += industry;
        }
        pools.research += obj.meters.current(MeterType::Research) * (1.0 + research_bonus);
        pools.influence_income += obj.meters.current(MeterType::Influence);
        let pop = obj.meters.current(MeterType::Population);
        pools.population += pop;
        if obj.is_populated_planet() {
            pools.population_centers += 1;
        }
    }
    pools
}
