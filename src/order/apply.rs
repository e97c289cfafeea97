//! Order validation and execution.
//!
//! Each order is checked against the current object graph and either
//! applied or rejected with an [`OrderError`]. A rejected order never
//! aborts the rest of its order set.

use log::debug;

use super::set::{Order, OrderSet};
use crate::content::{Environment, GameRules};
use crate::empire::{
    AdoptedPolicy, EmpireManager, ProductionItem, ProductionKind, SitRepKind,
};
use crate::universe::{
    shortest_path, EmpireId, FleetAggression, Focus, MeterType, ObjectId, ObjectType, Universe,
    Visibility,
};

/// Building that lets a planet produce ships.
pub const SHIPYARD: &str = "BLD_SHIPYARD_BASE";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("no object {0}")]
    NoSuchObject(ObjectId),

    #[error("object {0} is not owned by the ordering empire")]
    NotOwned(ObjectId),

    #[error("object {id} is not a {expected:?}")]
    WrongType { id: ObjectId, expected: ObjectType },

    #[error("object {0} is not in a system")]
    NotInSystem(ObjectId),

    #[error("objects {0} and {1} are not in the same system")]
    DifferentSystems(ObjectId, ObjectId),

    #[error("system {0} is unknown to the ordering empire")]
    UnknownDestination(ObjectId),

    #[error("no known route from {from} to {to}")]
    Unreachable { from: ObjectId, to: ObjectId },

    #[error("ship {0} cannot colonize")]
    CannotColonize(ObjectId),

    #[error("planet {planet} cannot be colonized: {reason}")]
    NotColonizable { planet: ObjectId, reason: &'static str },

    #[error("ship {0} carries no troops")]
    NoTroops(ObjectId),

    #[error("ship {0} is unarmed")]
    Unarmed(ObjectId),

    #[error("planet {0} still has shields up")]
    ShieldsUp(ObjectId),

    #[error("planet {0} is not a hostile target")]
    NotHostile(ObjectId),

    #[error("planet {0} has no population")]
    Unpopulated(ObjectId),

    #[error("ship {0} already has an order this turn")]
    AlreadyOrdered(ObjectId),

    #[error("planet {0} is already targeted by another of this empire's ships")]
    AlreadyTargeted(ObjectId),

    #[error("{0} cannot receive objects")]
    InvalidRecipient(EmpireId),

    #[error("unknown {kind} '{name}'")]
    UnknownContent { kind: &'static str, name: String },

    #[error("{kind} '{name}' is not available")]
    Unavailable { kind: &'static str, name: String },

    #[error("planet {0} has no shipyard")]
    NoShipyard(ObjectId),

    #[error("'{0}' is already queued or present")]
    AlreadyQueued(String),

    #[error("'{0}' is already researched")]
    AlreadyResearched(String),

    #[error("no production queue entry {0}")]
    QueueIndex(usize),

    #[error("policy '{0}' is already adopted")]
    AlreadyAdopted(String),

    #[error("policy '{0}' is not adopted")]
    NotAdopted(String),

    #[error("name must be 1 to 64 characters")]
    InvalidName,

    #[error("no ships given")]
    EmptyShipList,

    #[error("no such empire {0}")]
    NoSuchEmpire(EmpireId),
}

/// Mutable state an order may touch.
pub struct OrderContext<'a> {
    pub universe: &'a mut Universe,
    pub empires: &'a mut EmpireManager,
    pub rules: &'a GameRules,
    pub turn: i32,
}

/// Applies every order in `orders` for `empire`. Rejected orders are logged
/// and reported back to the empire as sitreps. Returns the number applied.
pub fn apply_order_set(ctx: &mut OrderContext<'_>, empire: EmpireId, orders: &OrderSet) -> usize {
    let mut applied = 0;
    for (id, order) in orders.iter() {
        match execute_order(ctx, empire, order) {
            Ok(()) => applied += 1,
            Err(e) => {
                debug!("{} order {} ({}) rejected: {}", empire, id, order, e);
                if let Some(emp) = ctx.empires.get_mut(empire) {
                    emp.add_sitrep(
                        ctx.turn,
                        SitRepKind::OrderRejected { order_id: id, reason: e.to_string() },
                    );
                }
            }
        }
    }
    applied
}

/// Validates and applies one order.
pub fn execute_order(ctx: &mut OrderContext<'_>, empire: EmpireId, order: &Order) -> Result<(), OrderError> {
    match order {
        Order::FleetMove { fleet, destination } => move_fleet(ctx, empire, *fleet, *destination),
        Order::FleetAggression { fleet, aggression } => {
            owned(ctx.universe, empire, *fleet, ObjectType::Fleet)?;
            if let Some(f) = ctx.universe.fleet_mut(*fleet) {
                f.aggression = *aggression;
            }
            Ok(())
        }
        Order::NewFleet { name, ships, aggression } => new_fleet(ctx, empire, name, ships, *aggression),
        Order::MergeFleet { fleet, into } => merge_fleet(ctx, empire, *fleet, *into),
        Order::Rename { object, name } => {
            if name.trim().is_empty() || name.chars().count() > 64 {
                return Err(OrderError::InvalidName);
            }
            let obj = ctx.universe.get_mut(*object).ok_or(OrderError::NoSuchObject(*object))?;
            if !obj.owned_by(empire) {
                return Err(OrderError::NotOwned(*object));
            }
            obj.name = name.trim().to_string();
            Ok(())
        }
        Order::Colonize { ship, planet } => colonize(ctx, empire, *ship, *planet),
        Order::Invade { ship, planet } => invade(ctx, empire, *ship, *planet),
        Order::Bombard { ship, planet } => bombard(ctx, empire, *ship, *planet),
        Order::Scrap { object } => scrap(ctx, empire, *object),
        Order::GiveObjectToEmpire { object, recipient } => give(ctx, empire, *object, *recipient),
        Order::ChangeFocus { planet, focus } => change_focus(ctx, empire, *planet, *focus),
        Order::ProductionEnqueue { item, location, quantity } => {
            enqueue_production(ctx, empire, item, *location, *quantity)
        }
        Order::ProductionDequeue { index } => {
            let emp = ctx.empires.get_mut(empire).ok_or(OrderError::NoSuchEmpire(empire))?;
            emp.production_queue.remove(*index).ok_or(OrderError::QueueIndex(*index))?;
            Ok(())
        }
        Order::ResearchEnqueue { tech, position } => enqueue_research(ctx, empire, tech, *position),
        Order::ResearchDequeue { tech } => {
            let emp = ctx.empires.get_mut(empire).ok_or(OrderError::NoSuchEmpire(empire))?;
            if !emp.research_queue.remove(tech) {
                return Err(OrderError::UnknownContent { kind: "queued tech", name: tech.clone() });
            }
            Ok(())
        }
        Order::AdoptPolicy { policy } => adopt_policy(ctx, empire, policy),
        Order::DeAdoptPolicy { policy } => {
            let turn = ctx.turn;
            let emp = ctx.empires.get_mut(empire).ok_or(OrderError::NoSuchEmpire(empire))?;
            let removed = emp
                .adopted_policies
                .remove(policy)
                .ok_or_else(|| OrderError::NotAdopted(policy.clone()))?;
            if removed.adoption_turn == turn {
                emp.influence_stockpile += removed.adoption_cost;
            }
            Ok(())
        }
    }
}

/// Checks that `id` exists, is of type `ty`, and is owned by `empire`.
fn owned(universe: &Universe, empire: EmpireId, id: ObjectId, ty: ObjectType) -> Result<(), OrderError> {
    let obj = universe.get(id).ok_or(OrderError::NoSuchObject(id))?;
    if obj.object_type() != ty {
        return Err(OrderError::WrongType { id, expected: ty });
    }
    if !obj.owned_by(empire) {
        return Err(OrderError::NotOwned(id));
    }
    Ok(())
}

fn system_of(universe: &Universe, id: ObjectId) -> Result<ObjectId, OrderError> {
    universe
        .get(id)
        .ok_or(OrderError::NoSuchObject(id))?
        .system_id
        .ok_or(OrderError::NotInSystem(id))
}

fn same_system(universe: &Universe, a: ObjectId, b: ObjectId) -> Result<ObjectId, OrderError> {
    let sa = system_of(universe, a)?;
    let sb = system_of(universe, b)?;
    if sa != sb {
        return Err(OrderError::DifferentSystems(a, b));
    }
    Ok(sa)
}

/// Rejects ships that already carry a colonize, invade, bombard, or scrap
/// order.
fn ship_is_free(universe: &Universe, ship: ObjectId) -> Result<(), OrderError> {
    let s = universe
        .ship(ship)
        .ok_or(OrderError::WrongType { id: ship, expected: ObjectType::Ship })?;
    if s.ordered_colonize_planet.is_some()
        || s.ordered_invade_planet.is_some()
        || s.ordered_bombard_planet.is_some()
        || s.ordered_scrapped
    {
        return Err(OrderError::AlreadyOrdered(ship));
    }
    Ok(())
}

fn move_fleet(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    fleet: ObjectId,
    destination: ObjectId,
) -> Result<(), OrderError> {
    owned(ctx.universe, empire, fleet, ObjectType::Fleet)?;
    if ctx.universe.system(destination).is_none() {
        return Err(OrderError::WrongType { id: destination, expected: ObjectType::System });
    }
    if ctx.universe.visibility(empire, destination) < Visibility::Basic {
        return Err(OrderError::UnknownDestination(destination));
    }
    let (current, next) = {
        let obj = ctx.universe.get(fleet).ok_or(OrderError::NoSuchObject(fleet))?;
        let f = obj.as_fleet().ok_or(OrderError::WrongType { id: fleet, expected: ObjectType::Fleet })?;
        (obj.system_id, f.next_system)
    };
    // A fleet in transit routes from the system it is heading to.
    let start = current.or(next).ok_or(OrderError::NotInSystem(fleet))?;

    let universe = &*ctx.universe;
    let route = shortest_path(universe, start, destination, |sys| {
        universe.visibility(empire, sys) >= Visibility::Basic
    })
    .ok_or(OrderError::Unreachable { from: start, to: destination })?;

    let turn = ctx.turn;
    let f = ctx
        .universe
        .fleet_mut(fleet)
        .ok_or(OrderError::WrongType { id: fleet, expected: ObjectType::Fleet })?;
    f.travel_route = if current.is_some() {
        route.systems.into_iter().skip(1).collect()
    } else {
        route.systems
    };
    f.next_system = f.travel_route.first().copied();
    f.last_turn_move_ordered = turn;
    Ok(())
}

fn new_fleet(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    name: &str,
    ships: &[ObjectId],
    aggression: FleetAggression,
) -> Result<(), OrderError> {
    let first = *ships.first().ok_or(OrderError::EmptyShipList)?;
    let system = system_of(ctx.universe, first)?;
    for &ship in ships {
        owned(ctx.universe, empire, ship, ObjectType::Ship)?;
        if system_of(ctx.universe, ship)? != system {
            return Err(OrderError::DifferentSystems(first, ship));
        }
    }
    let name = if name.trim().is_empty() { "New fleet" } else { name.trim() };
    let fleet = ctx
        .universe
        .create_fleet(name, system, Some(empire), aggression, ctx.turn)
        .map_err(|_| OrderError::NotInSystem(first))?;
    for &ship in ships {
        ctx.universe
            .move_ship_to_fleet(ship, fleet)
            .map_err(|_| OrderError::WrongType { id: ship, expected: ObjectType::Ship })?;
    }
    Ok(())
}

fn merge_fleet(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    fleet: ObjectId,
    into: ObjectId,
) -> Result<(), OrderError> {
    owned(ctx.universe, empire, fleet, ObjectType::Fleet)?;
    owned(ctx.universe, empire, into, ObjectType::Fleet)?;
    if fleet == into {
        return Ok(());
    }
    same_system(ctx.universe, fleet, into)?;
    for ship in ctx.universe.fleet_ships(fleet) {
        ctx.universe
            .move_ship_to_fleet(ship, into)
            .map_err(|_| OrderError::WrongType { id: ship, expected: ObjectType::Ship })?;
    }
    Ok(())
}

fn colonize(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    ship: ObjectId,
    planet: ObjectId,
) -> Result<(), OrderError> {
    owned(ctx.universe, empire, ship, ObjectType::Ship)?;
    ship_is_free(ctx.universe, ship)?;
    let s = ctx
        .universe
        .ship(ship)
        .ok_or(OrderError::WrongType { id: ship, expected: ObjectType::Ship })?;
    if !s.can_colonize {
        return Err(OrderError::CannotColonize(ship));
    }
    let capacity = s.colony_capacity;
    let species = s.species.clone();

    let pobj = ctx.universe.get(planet).ok_or(OrderError::NoSuchObject(planet))?;
    let p = pobj
        .as_planet()
        .ok_or(OrderError::WrongType { id: planet, expected: ObjectType::Planet })?;
    if pobj.owner.is_some() {
        return Err(OrderError::NotColonizable { planet, reason: "already owned" });
    }
    if pobj.meters.current(MeterType::Population) > 0.0 {
        return Err(OrderError::NotColonizable { planet, reason: "already populated" });
    }
    if capacity > 0.0 {
        let name = species.ok_or(OrderError::CannotColonize(ship))?;
        let sp = ctx
            .rules
            .species(&name)
            .ok_or(OrderError::UnknownContent { kind: "species", name: name.clone() })?;
        if !sp.can_colonize {
            return Err(OrderError::CannotColonize(ship));
        }
        let env = sp.environment(p.planet_type);
        if env.population_factor() <= 0.0 || env == Environment::Uninhabitable {
            return Err(OrderError::NotColonizable { planet, reason: "uninhabitable for species" });
        }
    }
    same_system(ctx.universe, ship, planet)?;

    let rival_own_ship = ctx.universe.iter().any(|o| {
        o.owned_by(empire)
            && o.id != ship
            && o.as_ship().is_some_and(|s| s.ordered_colonize_planet == Some(planet))
    });
    if rival_own_ship {
        return Err(OrderError::AlreadyTargeted(planet));
    }

    if let Some(s) = ctx.universe.ship_mut(ship) {
        s.ordered_colonize_planet = Some(planet);
    }
    if let Some(p) = ctx.universe.planet_mut(planet) {
        p.is_about_to_be_colonized = true;
    }
    Ok(())
}

/// Checks that `planet` is a valid hostile ground or orbital target for
/// `empire`: not its own, owned by an empire at war or unowned and
/// populated, and with shields down.
fn hostile_target(
    universe: &Universe,
    empires: &EmpireManager,
    empire: EmpireId,
    planet: ObjectId,
) -> Result<(), OrderError> {
    let pobj = universe.get(planet).ok_or(OrderError::NoSuchObject(planet))?;
    if pobj.as_planet().is_none() {
        return Err(OrderError::WrongType { id: planet, expected: ObjectType::Planet });
    }
    match pobj.owner {
        Some(owner) if owner == empire || !empires.at_war(empire, owner) => {
            return Err(OrderError::NotHostile(planet))
        }
        None if !pobj.is_populated_planet() => return Err(OrderError::NotHostile(planet)),
        _ => {}
    }
    if pobj.meters.current(MeterType::Shield) > 0.0 {
        return Err(OrderError::ShieldsUp(planet));
    }
    if universe.visibility(empire, planet) < Visibility::Basic {
        return Err(OrderError::NoSuchObject(planet));
    }
    Ok(())
}

fn invade(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    ship: ObjectId,
    planet: ObjectId,
) -> Result<(), OrderError> {
    owned(ctx.universe, empire, ship, ObjectType::Ship)?;
    ship_is_free(ctx.universe, ship)?;
    if !ctx.universe.ship(ship).is_some_and(|s| s.has_troops()) {
        return Err(OrderError::NoTroops(ship));
    }
    // Unowned planets can be invaded even without population.
    let unowned_empty = ctx
        .universe
        .get(planet)
        .is_some_and(|p| p.as_planet().is_some() && p.owner.is_none() && !p.is_populated_planet());
    if !unowned_empty {
        hostile_target(ctx.universe, ctx.empires, empire, planet)?;
    }
    same_system(ctx.universe, ship, planet)?;
    if let Some(s) = ctx.universe.ship_mut(ship) {
        s.ordered_invade_planet = Some(planet);
    }
    if let Some(p) = ctx.universe.planet_mut(planet) {
        p.is_about_to_be_invaded = true;
    }
    Ok(())
}

fn bombard(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    ship: ObjectId,
    planet: ObjectId,
) -> Result<(), OrderError> {
    owned(ctx.universe, empire, ship, ObjectType::Ship)?;
    ship_is_free(ctx.universe, ship)?;
    if !ctx.universe.ship(ship).is_some_and(|s| s.is_armed()) {
        return Err(OrderError::Unarmed(ship));
    }
    hostile_target(ctx.universe, ctx.empires, empire, planet)?;
    if !ctx.universe.get(planet).is_some_and(|p| p.is_populated_planet()) {
        return Err(OrderError::Unpopulated(planet));
    }
    same_system(ctx.universe, ship, planet)?;
    if let Some(s) = ctx.universe.ship_mut(ship) {
        s.ordered_bombard_planet = Some(planet);
    }
    if let Some(p) = ctx.universe.planet_mut(planet) {
        p.is_about_to_be_bombarded = true;
    }
    Ok(())
}

fn scrap(ctx: &mut OrderContext<'_>, empire: EmpireId, object: ObjectId) -> Result<(), OrderError> {
    let obj = ctx.universe.get(object).ok_or(OrderError::NoSuchObject(object))?;
    if !obj.owned_by(empire) {
        return Err(OrderError::NotOwned(object));
    }
    match obj.object_type() {
        ObjectType::Ship => {
            system_of(ctx.universe, object)?;
            ship_is_free(ctx.universe, object)?;
            if let Some(s) = ctx.universe.ship_mut(object) {
                s.ordered_scrapped = true;
            }
        }
        ObjectType::Building => {
            if let Some(b) = ctx.universe.building_mut(object) {
                b.ordered_scrapped = true;
            }
        }
        _ => return Err(OrderError::WrongType { id: object, expected: ObjectType::Ship }),
    }
    Ok(())
}

fn give(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    object: ObjectId,
    recipient: EmpireId,
) -> Result<(), OrderError> {
    match ctx.empires.get(recipient) {
        Some(r) if r.id != empire && !r.eliminated => {}
        _ => return Err(OrderError::InvalidRecipient(recipient)),
    }
    let obj = ctx.universe.get(object).ok_or(OrderError::NoSuchObject(object))?;
    if !obj.owned_by(empire) {
        return Err(OrderError::NotOwned(object));
    }
    if obj.system_id.is_none() {
        return Err(OrderError::NotInSystem(object));
    }
    match obj.object_type() {
        ObjectType::Fleet => {
            if let Some(f) = ctx.universe.fleet_mut(object) {
                f.ordered_given_to_empire = Some(recipient);
            }
        }
        ObjectType::Ship => {
            if let Some(s) = ctx.universe.ship_mut(object) {
                s.ordered_given_to_empire = Some(recipient);
            }
        }
        ObjectType::Planet => {
            if let Some(p) = ctx.universe.planet_mut(object) {
                p.ordered_given_to_empire = Some(recipient);
            }
        }
        ObjectType::Building => {
            if let Some(b) = ctx.universe.building_mut(object) {
                b.ordered_given_to_empire = Some(recipient);
            }
        }
        _ => return Err(OrderError::WrongType { id: object, expected: ObjectType::Fleet }),
    }
    Ok(())
}

fn change_focus(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    planet: ObjectId,
    focus: Focus,
) -> Result<(), OrderError> {
    owned(ctx.universe, empire, planet, ObjectType::Planet)?;
    if !ctx.universe.get(planet).is_some_and(|p| p.is_populated_planet()) {
        return Err(OrderError::Unpopulated(planet));
    }
    if let Some(p) = ctx.universe.planet_mut(planet) {
        p.focus = Some(focus);
    }
    Ok(())
}

fn enqueue_production(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    item: &ProductionKind,
    location: ObjectId,
    quantity: u32,
) -> Result<(), OrderError> {
    owned(ctx.universe, empire, location, ObjectType::Planet)?;
    let emp = ctx.empires.get(empire).ok_or(OrderError::NoSuchEmpire(empire))?;
    match item {
        ProductionKind::Ship { design } => {
            let d = ctx
                .rules
                .design(design)
                .ok_or_else(|| OrderError::UnknownContent { kind: "design", name: design.clone() })?;
            if !d.producible || !emp.available_designs.contains(design) {
                return Err(OrderError::Unavailable { kind: "design", name: design.clone() });
            }
            let planet = ctx
                .universe
                .planet(location)
                .ok_or(OrderError::WrongType { id: location, expected: ObjectType::Planet })?;
            let has_yard = planet.buildings.iter().any(|b| {
                ctx.universe
                    .get(*b)
                    .and_then(|o| o.as_building())
                    .is_some_and(|b| b.building_type == SHIPYARD)
            });
            if !has_yard {
                return Err(OrderError::NoShipyard(location));
            }
            if !ctx.universe.get(location).is_some_and(|p| p.is_populated_planet()) {
                return Err(OrderError::Unpopulated(location));
            }
        }
        ProductionKind::Building { building_type } => {
            if ctx.rules.building(building_type).is_none() {
                return Err(OrderError::UnknownContent {
                    kind: "building",
                    name: building_type.clone(),
                });
            }
            if !emp.available_buildings.contains(building_type) {
                return Err(OrderError::Unavailable { kind: "building", name: building_type.clone() });
            }
            let planet = ctx
                .universe
                .planet(location)
                .ok_or(OrderError::WrongType { id: location, expected: ObjectType::Planet })?;
            let present = planet.buildings.iter().any(|b| {
                ctx.universe
                    .get(*b)
                    .and_then(|o| o.as_building())
                    .is_some_and(|b| &b.building_type == building_type)
            });
            if present || emp.production_queue.contains(item, location) {
                return Err(OrderError::AlreadyQueued(building_type.clone()));
            }
        }
    }
    let quantity = match item {
        ProductionKind::Building { .. } => 1,
        ProductionKind::Ship { .. } => quantity,
    };
    if let Some(emp) = ctx.empires.get_mut(empire) {
        emp.production_queue.push(ProductionItem::new(item.clone(), location, quantity));
    }
    Ok(())
}

fn enqueue_research(
    ctx: &mut OrderContext<'_>,
    empire: EmpireId,
    tech: &str,
    position: Option<usize>,
) -> Result<(), OrderError> {
    if ctx.rules.tech(tech).is_none() {
        return Err(OrderError::UnknownContent { kind: "tech", name: tech.to_string() });
    }
    let emp = ctx.empires.get_mut(empire).ok_or(OrderError::NoSuchEmpire(empire))?;
    if emp.researched_techs.contains(tech) {
        return Err(OrderError::AlreadyResearched(tech.to_string()));
    }
    // Re-enqueueing moves the tech.
    emp.research_queue.remove(tech);
    emp.research_queue.insert(tech.to_string(), position);
    Ok(())
}

fn adopt_policy(ctx: &mut OrderContext<'_>, empire: EmpireId, name: &str) -> Result<(), OrderError> {
    let policy = ctx
        .rules
        .policy(name)
        .ok_or_else(|| OrderError::UnknownContent { kind: "policy", name: name.to_string() })?;
    let turn = ctx.turn;
    let emp = ctx.empires.get_mut(empire).ok_or(OrderError::NoSuchEmpire(empire))?;
    if emp.adopted_policies.contains_key(name) {
        return Err(OrderError::AlreadyAdopted(name.to_string()));
    }
    if emp.slots(policy.category) == 0 {
        return Err(OrderError::Unavailable { kind: "policy slot", name: name.to_string() });
    }
    emp.influence_stockpile -= policy.adoption_cost;
    emp.adopted_policies.insert(
        name.to_string(),
        AdoptedPolicy {
            category: policy.category,
            adoption_turn: turn,
            adoption_cost: policy.adoption_cost,
            current_turns_adopted: 0,
        },
    );
    Ok(())
}
