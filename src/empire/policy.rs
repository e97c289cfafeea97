//! Adopted-policy bookkeeping.

use log::debug;

use super::sitrep::SitRepKind;
use super::state::Empire;

/// Re-checks adopted policies after orders are applied.
///
/// Reverts adoptions that exceed the category's slots (latest adopted
/// first), then reverts policies adopted this turn while the influence
/// stockpile is negative, refunding their cost. Nothing is re-charged.
/// Returns the names of reverted policies.
pub fn validate_adopted_policies(empire: &mut Empire, turn: i32) -> Vec<String> {
    let mut reverted = Vec::new();

    let mut by_recency: Vec<(i32, String)> = empire
        .adopted_policies
        .iter()
        .map(|(name, p)| (p.adoption_turn, name.clone()))
        .collect();
    by_recency.sort_by(|a, b| b.cmp(a));

    for (_, name) in &by_recency {
        let Some(policy) = empire.adopted_policies.get(name) else { continue };
        let category = policy.category;
        if empire.adopted_in(category) > empire.slots(category) {
            if let Some(p) = empire.adopted_policies.remove(name) {
                if p.adoption_turn == turn {
                    empire.influence_stockpile += p.adoption_cost;
                }
            }
            reverted.push(name.clone());
        }
    }

    for (adopted_turn, name) in &by_recency {
        if empire.influence_stockpile >= 0.0 {
            break;
        }
        if *adopted_turn != turn {
            continue;
        }
        if let Some(p) = empire.adopted_policies.remove(name) {
            empire.influence_stockpile += p.adoption_cost;
            reverted.push(name.clone());
        }
    }

    for name in &reverted {
        debug!("{} policy {} reverted", empire.id, name);
        empire.add_sitrep(turn, SitRepKind::PolicyReverted { policy: name.clone() });
    }
    reverted
}

/// Advances the continuous-adoption counter of every adopted policy.
pub fn advance_policy_turns(empire: &mut Empire) {
    for policy in empire.adopted_policies.values_mut() {
        policy.current_turns_adopted += 1;
    }
}
