//! Per-empire object visibility.
//!
//! An empire sees an object if one of its detectors has the object in range
//! and the object's stealth does not exceed the empire's detection strength.
//! Owned objects are always fully visible and explored systems are always at
//! least basically visible. Allies pool what they see.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::arena::Universe;
use super::ids::{EmpireId, ObjectId};
use super::meter::MeterType;
use super::object::{ObjectKind, ObjectType};
use crate::empire::EmpireManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Invisible,
    Basic,
    Partial,
    Full,
}

/// Whether `stealth` is pierced by `detection_strength`.
pub fn is_detectable(stealth: f32, detection_strength: f32) -> bool {
    stealth <= detection_strength
}

struct Detector {
    x: f32,
    y: f32,
    range: f32,
}

/// Recomputes the visibility map of every non-eliminated empire.
pub fn update_empire_object_visibilities(universe: &mut Universe, empires: &EmpireManager) {
    let mut all: BTreeMap<EmpireId, BTreeMap<ObjectId, Visibility>> = BTreeMap::new();

    for empire in empires.iter().filter(|e| !e.eliminated) {
        let detectors: Vec<Detector> = universe
            .iter()
            .filter(|obj| obj.owned_by(empire.id))
            .filter_map(|obj| {
                let range = obj.meters.current(MeterType::Detection);
                (range > 0.0).then_some(Detector { x: obj.x, y: obj.y, range })
            })
            .collect();

        let mut vis: BTreeMap<ObjectId, Visibility> = BTreeMap::new();
        for obj in universe.iter() {
            let mut level = Visibility::Invisible;
            if obj.owned_by(empire.id) {
                level = Visibility::Full;
            } else if obj.as_fleet().is_none() {
                // Fleets carry no stealth of their own; see below.
                let in_range = detectors
                    .iter()
                    .any(|d| obj.distance_to(d.x, d.y) <= d.range);
                if in_range && is_detectable(obj.stealth(), empire.detection_strength) {
                    level = Visibility::Partial;
                }
            }
            if empire.explored_systems.contains(&obj.id) {
                level = level.max(Visibility::Basic);
            }
            // Systems and planets once seen stay on the map.
            if matches!(obj.object_type(), ObjectType::System | ObjectType::Planet)
                && universe.visibility(empire.id, obj.id) >= Visibility::Basic
            {
                level = level.max(Visibility::Basic);
            }
            if level > Visibility::Invisible {
                vis.insert(obj.id, level);
            }
        }

        // A fleet is as visible as its most visible ship.
        for obj in universe.iter() {
            if let ObjectKind::Fleet(fleet) = &obj.kind {
                let best = fleet
                    .ships
                    .iter()
                    .filter_map(|s| vis.get(s).copied())
                    .max()
                    .unwrap_or(Visibility::Invisible);
                let entry = vis.entry(obj.id).or_default();
                *entry = (*entry).max(best);
                if *entry == Visibility::Invisible {
                    vis.remove(&obj.id);
                }
            }
        }

        debug!("{} sees {} objects", empire.id, vis.len());
        all.insert(empire.id, vis);
    }

    share_allied_visibility(&mut all, empires);
    universe.replace_visibilities(all);
}

fn share_allied_visibility(
    all: &mut BTreeMap<EmpireId, BTreeMap<ObjectId, Visibility>>,
    empires: &EmpireManager,
) {
    let ids: Vec<EmpireId> = all.keys().copied().collect();
    let snapshot = all.clone();
    for &a in &ids {
        for &b in &ids {
            if a == b || !empires.are_allied(a, b) {
                continue;
            }
            let Some(theirs) = snapshot.get(&b) else { continue };
            let Some(mine) = all.get_mut(&a) else { continue };
            for (&obj, &level) in theirs {
                // Allies share detections but not ownership-level access.
                let shared = level.min(Visibility::Partial);
                let entry = mine.entry(obj).or_default();
                *entry = (*entry).max(shared);
            }
        }
    }
}
