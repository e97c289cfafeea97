//! Scrapping pass. Runs last so it never touches a consumed or gifted object.

use log::debug;

use crate::empire::{EmpireManager, SitRepKind};
use crate::universe::{ObjectId, ObjectKind, Universe};

/// Destroys ships and buildings flagged for scrapping. Returns the scrapped
/// ids.
pub fn handle_scrapping(universe: &mut Universe, empires: &mut EmpireManager, turn: i32) -> Vec<ObjectId> {
    let flagged: Vec<ObjectId> = universe
        .iter()
        .filter(|obj| match &obj.kind {
            ObjectKind::Ship(s) => s.ordered_scrapped,
            ObjectKind::Building(b) => b.ordered_scrapped,
            _ => false,
        })
        .map(|obj| obj.id)
        .collect();

    let mut scrapped = Vec::new();
    for id in flagged {
        let Some(owner) = universe.get(id).map(|o| o.owner) else { continue };
        debug!("scrapping {}", id);
        universe.destroy(id);
        if let Some(e) = owner.and_then(|o| empires.get_mut(o)) {
            e.add_sitrep(turn, SitRepKind::ObjectScrapped { object: id });
        }
        scrapped.push(id);
    }
    scrapped
}
