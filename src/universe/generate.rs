//! Galaxy generation.
//!
//! Lays out systems at random, links each to its nearest neighbours and
//! then joins any disconnected clusters, seeds planets, and places one home
//! world per empire as far apart as the layout allows. Natives, monsters,
//! and ion storms are optional extras. Everything draws from one `SmallRng`
//! seeded by the game seed, so the same setup always yields the same galaxy.

use std::collections::{BTreeSet, VecDeque};

use log::info;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::arena::{Universe, UniverseError};
use super::effects::update_target_meters;
use super::fleet::FleetAggression;
use super::ids::{EmpireId, ObjectId};
use super::meter::MeterType;
use super::object::{Field, ObjectKind, StarType, UniverseObject};
use super::planet::{Focus, Planet, PlanetSize, PlanetType, ALL_PLANET_TYPES};
use crate::content::{Environment, GameRules};
use crate::empire::EmpireManager;
use crate::order::SHIPYARD;

const STAR_NAMES: [&str; 24] = [
    "Achernar", "Aldebaran", "Altair", "Antares", "Arcturus", "Bellatrix", "Betelgeuse", "Canopus",
    "Capella", "Castor", "Deneb", "Fomalhaut", "Hadar", "Mimosa", "Mira", "Mizar", "Polaris",
    "Pollux", "Procyon", "Regulus", "Rigel", "Sirius", "Spica", "Vega",
];

const STAR_TYPES: [StarType; 7] = [
    StarType::Blue,
    StarType::White,
    StarType::Yellow,
    StarType::Yellow,
    StarType::Orange,
    StarType::Red,
    StarType::Neutron,
];

/// Systems closer than this are re-rolled.
const MIN_SYSTEM_SPACING: f32 = 40.0;
const SPACING_ATTEMPTS: usize = 50;
const NEIGHBOURS: usize = 2;
const HOME_FLEET_FRIGATES: usize = 2;
pub const MONSTER_DESIGN: &str = "SM_KRILL_SWARM";
pub const NATIVE_SPECIES: &str = "SP_NATIVE_ABADDONI";
pub const ION_STORM: &str = "FLD_ION_STORM";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("no empires to place")]
    NoEmpires,

    #[error("{systems} systems cannot hold {empires} home worlds")]
    TooFewSystems { systems: usize, empires: usize },

    #[error("content has no colonizing species")]
    NoSpecies,

    #[error("content is missing '{0}'")]
    MissingContent(String),

    #[error(transparent)]
    Universe(#[from] UniverseError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalaxySetup {
    pub seed: u64,
    pub systems: usize,
    pub monsters: bool,
    pub natives: bool,
}

fn system_name(index: usize) -> String {
    let base = STAR_NAMES[index % STAR_NAMES.len()];
    match index / STAR_NAMES.len() {
        0 => base.to_string(),
        n => format!("{} {}", base, n + 1),
    }
}

fn random_planet(rng: &mut SmallRng, orbit: usize) -> Planet {
    let planet_type = *ALL_PLANET_TYPES.choose(rng).unwrap_or(&PlanetType::Barren);
    let size = match planet_type {
        PlanetType::Asteroids => PlanetSize::Asteroids,
        PlanetType::GasGiant => PlanetSize::GasGiant,
        _ => *[PlanetSize::Tiny, PlanetSize::Small, PlanetSize::Medium, PlanetSize::Large, PlanetSize::Huge]
            .choose(rng)
            .unwrap_or(&PlanetSize::Medium),
    };
    Planet::new(planet_type, size, orbit)
}

/// Builds a new galaxy for the empires in `empires`, setting each empire's
/// capital and explored home system.
pub fn generate_universe(
    setup: &GalaxySetup,
    empires: &mut EmpireManager,
    rules: &GameRules,
) -> Result<Universe, GenerateError> {
    let empire_ids = empires.ids();
    if empire_ids.is_empty() {
        return Err(GenerateError::NoEmpires);
    }
    if setup.systems < empire_ids.len() {
        return Err(GenerateError::TooFewSystems { systems: setup.systems, empires: empire_ids.len() });
    }
    let mut rng = SmallRng::seed_from_u64(setup.seed);
    let mut universe = Universe::new();

    let systems = place_systems(&mut universe, &mut rng, setup.systems);
    link_starlanes(&mut universe, &systems)?;
    let homes = pick_home_systems(&universe, &systems, empire_ids.len());

    for (&empire, &home) in empire_ids.iter().zip(&homes) {
        place_home(&mut universe, empires, rules, empire, home)?;
    }
    for &sys in &systems {
        let free: Vec<usize> = universe
            .system(sys)
            .map(|s| (0..s.orbits.len()).filter(|&i| s.orbits[i].is_none()).collect())
            .unwrap_or_default();
        for orbit in free {
            if rng.gen_bool(0.6) {
                let planet = random_planet(&mut rng, orbit);
                let name = format!("{} {}", universe.get(sys).map_or("", |o| o.name.as_str()), orbit + 1);
                universe.add_planet(sys, &name, planet, 0)?;
            }
        }
    }

    let mut wild: Vec<ObjectId> = systems.iter().copied().filter(|s| !homes.contains(s)).collect();
    wild.shuffle(&mut rng);
    if setup.natives {
        place_natives(&mut universe, rules, &wild[..wild.len() / 4])?;
    }
    if setup.monsters {
        let near_home: BTreeSet<ObjectId> = homes
            .iter()
            .flat_map(|&h| universe.starlanes(h).into_iter().chain([h]))
            .collect();
        let lairs: Vec<ObjectId> = wild
            .iter()
            .rev()
            .copied()
            .filter(|s| !near_home.contains(s))
            .take(setup.systems / 6)
            .collect();
        place_monsters(&mut universe, rules, &lairs)?;
    }
    for _ in 0..setup.systems / 10 {
        let Some(&sys) = systems.choose(&mut rng) else { break };
        let (x, y) = universe.get(sys).map_or((0.0, 0.0), |o| (o.x, o.y));
        let field = Field {
            field_type: ION_STORM.to_string(),
            radius: rng.gen_range(30.0..80.0),
            drift: (rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)),
        };
        universe.insert(UniverseObject::new(ION_STORM, x, y, ObjectKind::Field(field)), 0);
    }

    fill_starting_meters(&mut universe, empires, rules);
    info!(
        "generated {} systems, {} objects for {} empires",
        systems.len(),
        universe.len(),
        empire_ids.len()
    );
    Ok(universe)
}

fn place_systems(universe: &mut Universe, rng: &mut SmallRng, count: usize) -> Vec<ObjectId> {
    let width = (count as f32).sqrt() * 120.0;
    let mut placed: Vec<(f32, f32)> = Vec::with_capacity(count);
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let mut pos = (rng.gen_range(0.0..width), rng.gen_range(0.0..width));
        for _ in 0..SPACING_ATTEMPTS {
            let crowded = placed
                .iter()
                .any(|&(x, y)| ((x - pos.0).powi(2) + (y - pos.1).powi(2)).sqrt() < MIN_SYSTEM_SPACING);
            if !crowded {
                break;
            }
            pos = (rng.gen_range(0.0..width), rng.gen_range(0.0..width));
        }
        placed.push(pos);
        let star = *STAR_TYPES.choose(rng).unwrap_or(&StarType::Yellow);
        let orbits = rng.gen_range(3..=5);
        ids.push(universe.add_system(&system_name(i), pos.0, pos.1, star, orbits, 0));
    }
    ids
}

fn distance(universe: &Universe, a: ObjectId, b: ObjectId) -> f32 {
    universe.distance(a, b).unwrap_or(f32::MAX)
}

/// Links every system to its nearest neighbours, then bridges clusters by
/// their closest pair until the lane graph is connected.
fn link_starlanes(universe: &mut Universe, systems: &[ObjectId]) -> Result<(), UniverseError> {
    for &sys in systems {
        let mut others: Vec<ObjectId> = systems.iter().copied().filter(|&o| o != sys).collect();
        others.sort_by(|&a, &b| distance(universe, sys, a).total_cmp(&distance(universe, sys, b)));
        for &other in others.iter().take(NEIGHBOURS) {
            universe.add_starlane(sys, other)?;
        }
    }

    loop {
        let reached = reachable(universe, systems[0]);
        if reached.len() >= systems.len() {
            return Ok(());
        }
        let mut best: Option<(f32, ObjectId, ObjectId)> = None;
        for &a in &reached {
            for &b in systems.iter().filter(|s| !reached.contains(s)) {
                let d = distance(universe, a, b);
                if best.map_or(true, |(bd, _, _)| d < bd) {
                    best = Some((d, a, b));
                }
            }
        }
        match best {
            Some((_, a, b)) => universe.add_starlane(a, b)?,
            None => return Ok(()),
        }
    }
}

fn reachable(universe: &Universe, start: ObjectId) -> BTreeSet<ObjectId> {
    let mut seen = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(sys) = queue.pop_front() {
        for next in universe.starlanes(sys) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

/// Greedy farthest-point selection starting from the first system.
fn pick_home_systems(universe: &Universe, systems: &[ObjectId], count: usize) -> Vec<ObjectId> {
    let mut homes = vec![systems[0]];
    while homes.len() < count {
        let next = systems
            .iter()
            .copied()
            .filter(|s| !homes.contains(s))
            .max_by(|&a, &b| {
                let da = homes.iter().map(|&h| distance(universe, a, h)).fold(f32::MAX, f32::min);
                let db = homes.iter().map(|&h| distance(universe, b, h)).fold(f32::MAX, f32::min);
                da.total_cmp(&db).then(b.cmp(&a))
            });
        match next {
            Some(sys) => homes.push(sys),
            None => break,
        }
    }
    homes
}

fn place_home(
    universe: &mut Universe,
    empires: &mut EmpireManager,
    rules: &GameRules,
    empire: EmpireId,
    home: ObjectId,
) -> Result<(), GenerateError> {
    let colonists: Vec<_> = rules.species.values().filter(|s| s.can_colonize).collect();
    if colonists.is_empty() {
        return Err(GenerateError::NoSpecies);
    }
    let species = colonists[(empire.0.unsigned_abs() as usize) % colonists.len()];
    let planet_type = ALL_PLANET_TYPES
        .iter()
        .copied()
        .find(|&pt| species.environment(pt) == Environment::Good)
        .unwrap_or(PlanetType::Terran);

    let mut planet = Planet::new(planet_type, PlanetSize::Medium, 0);
    planet.species = Some(species.name.clone());
    planet.focus = Some(Focus::Industry);
    planet.initial_focus = planet.focus;
    let system_name = universe.get(home).map(|o| o.name.clone()).unwrap_or_default();
    let capital = universe.add_planet(home, &format!("{} Prime", system_name), planet, 0)?;
    let population = Environment::Good.population_factor() * PlanetSize::Medium.capacity();
    if let Some(obj) = universe.get_mut(capital) {
        obj.owner = Some(empire);
        obj.meters.set(MeterType::Population, population);
    }
    universe.add_building(capital, SHIPYARD, Some(empire), 0)?;

    let design = |name: &str| {
        rules.design(name).ok_or_else(|| GenerateError::MissingContent(name.to_string()))
    };
    let battle = universe.create_fleet("Battle Fleet", home, Some(empire), FleetAggression::Aggressive, 0)?;
    for _ in 0..HOME_FLEET_FRIGATES {
        universe.create_ship_from_design(battle, design("SD_FRIGATE")?, None, 0)?;
    }
    let colony = universe.create_fleet("Colony Fleet", home, Some(empire), FleetAggression::Passive, 0)?;
    universe.create_ship_from_design(colony, design("SD_COLONY_SHIP")?, Some(species.name.clone()), 0)?;
    let scout = universe.create_fleet("Scout Fleet", home, Some(empire), FleetAggression::Passive, 0)?;
    universe.create_ship_from_design(scout, design("SD_SCOUT")?, None, 0)?;

    if let Some(e) = empires.get_mut(empire) {
        e.capital = Some(capital);
        e.explored_systems.insert(home);
    }
    Ok(())
}

/// Settles natives on the first habitable-sized planet of each system.
fn place_natives(universe: &mut Universe, rules: &GameRules, systems: &[ObjectId]) -> Result<(), GenerateError> {
    let species = rules
        .species(NATIVE_SPECIES)
        .ok_or_else(|| GenerateError::MissingContent(NATIVE_SPECIES.to_string()))?;
    let home_type = ALL_PLANET_TYPES
        .iter()
        .copied()
        .find(|&pt| species.environment(pt) == Environment::Good)
        .unwrap_or(PlanetType::Inferno);
    for &sys in systems {
        let target = universe.planets_in_system(sys).into_iter().find(|&p| {
            universe
                .planet(p)
                .is_some_and(|p| !matches!(p.size, PlanetSize::Asteroids | PlanetSize::GasGiant))
        });
        let Some(planet) = target else { continue };
        let Some(obj) = universe.get_mut(planet) else { continue };
        let capacity = match obj.as_planet_mut() {
            Some(p) => {
                p.planet_type = home_type;
                p.species = Some(species.name.clone());
                p.size.capacity()
            }
            None => continue,
        };
        obj.meters.set(MeterType::Population, Environment::Good.population_factor() * capacity);
    }
    Ok(())
}

fn place_monsters(universe: &mut Universe, rules: &GameRules, lairs: &[ObjectId]) -> Result<(), GenerateError> {
    let design = rules
        .design(MONSTER_DESIGN)
        .ok_or_else(|| GenerateError::MissingContent(MONSTER_DESIGN.to_string()))?;
    for &sys in lairs {
        let fleet = universe.create_fleet("Krill Swarm", sys, None, FleetAggression::Aggressive, 0)?;
        universe.create_ship_from_design(fleet, design, None, 0)?;
    }
    Ok(())
}

/// Starts every planet at its targets and maxima.
fn fill_starting_meters(universe: &mut Universe, empires: &EmpireManager, rules: &GameRules) {
    update_target_meters(universe, empires, rules);
    let pairs = [
        (MeterType::Industry, MeterType::TargetIndustry),
        (MeterType::Research, MeterType::TargetResearch),
        (MeterType::Influence, MeterType::TargetInfluence),
        (MeterType::Troops, MeterType::MaxTroops),
        (MeterType::Shield, MeterType::MaxShield),
        (MeterType::Defense, MeterType::MaxDefense),
        (MeterType::Supply, MeterType::MaxSupply),
    ];
    for obj in universe.iter_mut() {
        if obj.as_planet().is_none() {
            continue;
        }
        for (current, max) in pairs {
            let value = obj.meters.current(max);
            obj.meters.set(current, value);
        }
        if !obj.meters.has(MeterType::Stealth) {
            obj.meters.set(MeterType::Stealth, 5.0);
        }
    }
    universe.back_propagate_meters();
}
