//! Starlane routing.
//!
//! Galaxies are small (tens to a few hundred systems) so a plain
//! array-scan Dijkstra is used; ties break on the lower system id, which
//! keeps routes reproducible.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::arena::Universe;
use super::ids::ObjectId;

/// A route between two systems along starlanes.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Systems visited, starting with the origin and ending with the destination.
    pub systems: Vec<ObjectId>,
    pub length: f32,
}

/// Finds the shortest starlane route from `from` to `to`, only entering
/// systems for which `passable` returns true. The origin is always allowed.
pub fn shortest_path<F>(universe: &Universe, from: ObjectId, to: ObjectId, passable: F) -> Option<Route>
where
    F: Fn(ObjectId) -> bool,
{
    universe.system(from)?;
    universe.system(to)?;
    if from == to {
        return Some(Route { systems: vec![from], length: 0.0 });
    }

    let mut dist: BTreeMap<ObjectId, f32> = BTreeMap::new();
    let mut prev: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
    let mut done: BTreeSet<ObjectId> = BTreeSet::new();
    dist.insert(from, 0.0);

    loop {
        let current = dist
            .iter()
            .filter(|(id, _)| !done.contains(*id))
            .min_by(|a, b| a.1.total_cmp(b.1).then(a.0.cmp(b.0)))
            .map(|(&id, &d)| (id, d));
        let Some((current, current_dist)) = current else { return None };
        if current == to {
            break;
        }
        done.insert(current);

        for next in universe.starlanes(current) {
            if done.contains(&next) || !passable(next) {
                continue;
            }
            let Some(lane) = universe.distance(current, next) else { continue };
            let candidate = current_dist + lane;
            let better = dist.get(&next).map_or(true, |&d| candidate < d);
            if better {
                dist.insert(next, candidate);
                prev.insert(next, current);
            }
        }
    }

    let mut systems = vec![to];
    let mut cursor = to;
    while let Some(&p) = prev.get(&cursor) {
        systems.push(p);
        cursor = p;
    }
    systems.reverse();
    let length = dist.get(&to).copied().unwrap_or(0.0);
    Some(Route { systems, length })
}

/// Starlane jump counts from `start` to every reachable system within
/// `max_jumps`.
pub fn jumps_within(universe: &Universe, start: ObjectId, max_jumps: u32) -> BTreeMap<ObjectId, u32> {
    let mut out = BTreeMap::new();
    if universe.system(start).is_none() {
        return out;
    }
    let mut queue = VecDeque::new();
    out.insert(start, 0);
    queue.push_back(start);
    while let Some(sys) = queue.pop_front() {
        let jumps = out[&sys];
        if jumps >= max_jumps {
            continue;
        }
        for next in universe.starlanes(sys) {
            if !out.contains_key(&next) {
                out.insert(next, jumps + 1);
                queue.push_back(next);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::object::StarType;

    /// a(0,0) - b(10,0) - c(20,0), plus a long detour a - d(0,50) - c.
    fn line() -> (Universe, [ObjectId; 4]) {
        let mut u = Universe::new();
        let a = u.add_system("a", 0.0, 0.0, StarType::Yellow, 1, 0);
        let b = u.add_system("b", 10.0, 0.0, StarType::Yellow, 1, 0);
        let c = u.add_system("c", 20.0, 0.0, StarType::Yellow, 1, 0);
        let d = u.add_system("d", 0.0, 50.0, StarType::Red, 1, 0);
        u.add_starlane(a, b).unwrap();
        u.add_starlane(b, c).unwrap();
        u.add_starlane(a, d).unwrap();
        u.add_starlane(d, c).unwrap();
        (u, [a, b, c, d])
    }

    #[test]
    fn picks_shortest_route() {
        let (u, [a, b, c, _]) = line();
        let route = shortest_path(&u, a, c, |_| true).unwrap();
        assert_eq!(route.systems, vec![a, b, c]);
        assert!((route.length - 20.0).abs() < 1e-4);
    }

    #[test]
    fn respects_impassable_systems() {
        let (u, [a, b, c, d]) = line();
        let route = shortest_path(&u, a, c, |s| s != b).unwrap();
        assert_eq!(route.systems, vec![a, d, c]);
    }

    #[test]
    fn unreachable_returns_none() {
        let (mut u, [a, ..]) = line();
        let island = u.add_system("island", 500.0, 500.0, StarType::Blue, 1, 0);
        assert!(shortest_path(&u, a, island, |_| true).is_none());
    }

    #[test]
    fn jumps_within_counts_hops() {
        let (u, [a, b, c, d]) = line();
        let jumps = jumps_within(&u, a, 1);
        assert_eq!(jumps.get(&a), Some(&0));
        assert_eq!(jumps.get(&b), Some(&1));
        assert_eq!(jumps.get(&d), Some(&1));
        assert_eq!(jumps.get(&c), None);
    }
}
