//! The shared object graph.
//!
//! Systems, planets, fleets, ships, buildings, and fields live in one
//! [`Universe`] arena keyed by [`ObjectId`]; this module also carries the
//! per-empire visibility bookkeeping, starlane routing, meter effects, and
//! galaxy generation that operate on it.

pub mod arena;
pub mod effects;
pub mod fleet;
pub mod generate;
pub mod ids;
pub mod meter;
pub mod object;
pub mod pathing;
pub mod planet;
pub mod visibility;

pub use arena::{Universe, UniverseError};
pub use effects::{apply_meter_effects, update_target_meters};
pub use fleet::{Fleet, FleetAggression, Ship};
pub use generate::{generate_universe, GalaxySetup, GenerateError};
pub use ids::{owner_label, EmpireId, ObjectId, PlayerId};
pub use meter::{Meter, MeterPairing, MeterType, Meters, METER_LIMIT};
pub use object::{Building, Field, ObjectKind, ObjectType, StarType, System, UniverseObject};
pub use pathing::{jumps_within, shortest_path, Route};
pub use planet::{Focus, Planet, PlanetSize, PlanetType, ALL_PLANET_TYPES};
pub use visibility::{is_detectable, update_empire_object_visibilities, Visibility};
