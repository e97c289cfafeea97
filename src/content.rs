//! Game content: ship designs, building types, species, techs, policies.
//!
//! Content is either the built-in default set or a JSON file. Loading from
//! disk runs on a background thread behind a two-step API: call
//! [`begin_content_load`] early, then [`await_content_load`] before building
//! the server. Nothing else in the crate touches the loader thread.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use log::info;
use serde::{Deserialize, Serialize};

use crate::universe::{PlanetType, ALL_PLANET_TYPES};

/// Errors raised while loading content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read content file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse content file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("content loader thread panicked")]
    LoaderPanicked,

    #[error("content is missing required entry '{0}'")]
    Missing(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipDesign {
    pub name: String,
    pub cost: f32,
    pub min_turns: u32,
    pub structure: f32,
    pub weapons: Vec<f32>,
    pub speed: f32,
    pub fuel: f32,
    pub detection: f32,
    pub stealth: f32,
    pub colony_capacity: f32,
    pub troop_capacity: f32,
    pub can_colonize: bool,
    pub producible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingType {
    pub name: String,
    pub cost: f32,
    pub min_turns: u32,
    /// Added to the hosting planet's max troops.
    pub troops_bonus: f32,
    /// Added to the hosting planet's supply range.
    pub supply_bonus: f32,
    /// Added to the hosting planet's detection range.
    pub detection_bonus: f32,
}

/// How well a species lives on a planet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Environment {
    Uninhabitable,
    Hostile,
    Poor,
    Adequate,
    Good,
}

impl Environment {
    /// Target population per unit of planet size.
    pub const fn population_factor(self) -> f32 {
        match self {
            Environment::Uninhabitable => 0.0,
            Environment::Hostile => -1.0,
            Environment::Poor => 1.0,
            Environment::Adequate => 3.0,
            Environment::Good => 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub can_colonize: bool,
    pub environments: BTreeMap<PlanetType, Environment>,
}

impl Species {
    pub fn environment(&self, planet_type: PlanetType) -> Environment {
        self.environments
            .get(&planet_type)
            .copied()
            .unwrap_or(Environment::Uninhabitable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PolicyCategory {
    Economic,
    Social,
    Military,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub category: PolicyCategory,
    pub adoption_cost: f32,
    /// Multiplier applied to the matching focus output while adopted.
    pub industry_bonus: f32,
    pub research_bonus: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TechEffect {
    DetectionStrength(f32),
    SupplyRange(f32),
    PolicySlot(PolicyCategory),
    UnlockDesign(String),
    UnlockBuilding(String),
    MaxTroops(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tech {
    pub name: String,
    pub cost: f32,
    pub min_turns: u32,
    pub prerequisites: Vec<String>,
    pub effects: Vec<TechEffect>,
}

/// All content the turn pipeline consults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    pub ship_designs: BTreeMap<String, ShipDesign>,
    pub building_types: BTreeMap<String, BuildingType>,
    pub species: BTreeMap<String, Species>,
    pub techs: BTreeMap<String, Tech>,
    pub policies: BTreeMap<String, Policy>,
    /// Designs every empire may build from the start.
    pub starting_designs: Vec<String>,
    pub starting_buildings: Vec<String>,
    pub starting_detection_strength: f32,
    /// Detection strength used for unowned monsters.
    pub monster_detection_strength: f32,
    pub starting_policy_slots: BTreeMap<PolicyCategory, usize>,
}

impl GameRules {
    pub fn design(&self, name: &str) -> Option<&ShipDesign> {
        self.ship_designs.get(name)
    }

    pub fn species(&self, name: &str) -> Option<&Species> {
        self.species.get(name)
    }

    pub fn building(&self, name: &str) -> Option<&BuildingType> {
        self.building_types.get(name)
    }

    pub fn tech(&self, name: &str) -> Option<&Tech> {
        self.techs.get(name)
    }

    pub fn policy(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Reads content from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<GameRules, ContentError> {
        let text = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rules: GameRules = serde_json::from_str(&text).map_err(|source| ContentError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Checks cross references between content entries.
    pub fn validate(&self) -> Result<(), ContentError> {
        for name in self.starting_designs.iter() {
            if !self.ship_designs.contains_key(name) {
                return Err(ContentError::Missing(name.clone()));
            }
        }
        for name in self.starting_buildings.iter() {
            if !self.building_types.contains_key(name) {
                return Err(ContentError::Missing(name.clone()));
            }
        }
        for tech in self.techs.values() {
            for prereq in &tech.prerequisites {
                if !self.techs.contains_key(prereq) {
                    return Err(ContentError::Missing(prereq.clone()));
                }
            }
        }
        Ok(())
    }
}

fn design(
    name: &str,
    cost: f32,
    structure: f32,
    weapons: &[f32],
    speed: f32,
    detection: f32,
) -> ShipDesign {
    ShipDesign {
        name: name.to_string(),
        cost,
        min_turns: 3,
        structure,
        weapons: weapons.to_vec(),
        speed,
        fuel: 5.0,
        detection,
        stealth: 5.0,
        colony_capacity: 0.0,
        troop_capacity: 0.0,
        can_colonize: false,
        producible: true,
    }
}

fn species(name: &str, good: &[PlanetType], adequate: &[PlanetType], poor: &[PlanetType]) -> Species {
    let mut environments = BTreeMap::new();
    for &pt in ALL_PLANET_TYPES.iter() {
        let env = if good.contains(&pt) {
            Environment::Good
        } else if adequate.contains(&pt) {
            Environment::Adequate
        } else if poor.contains(&pt) {
            Environment::Poor
        } else if matches!(pt, PlanetType::Asteroids | PlanetType::GasGiant) {
            Environment::Uninhabitable
        } else {
            Environment::Hostile
        };
        environments.insert(pt, env);
    }
    Species { name: name.to_string(), can_colonize: true, environments }
}

impl Default for GameRules {
    fn default() -> Self {
        use PlanetType::*;

        let mut ship_designs = BTreeMap::new();
        let scout = ShipDesign {
            fuel: 8.0,
            stealth: 25.0,
            ..design("SD_SCOUT", 12.0, 5.0, &[], 75.0, 75.0)
        };
        let outpost = ShipDesign {
            colony_capacity: 0.0,
            can_colonize: true,
            min_turns: 5,
            ..design("SD_OUTPOST_SHIP", 50.0, 10.0, &[], 60.0, 25.0)
        };
        let colony = ShipDesign {
            colony_capacity: 1.0,
            can_colonize: true,
            min_turns: 5,
            ..design("SD_COLONY_SHIP", 60.0, 10.0, &[], 60.0, 25.0)
        };
        let troops = ShipDesign {
            troop_capacity: 6.0,
            ..design("SD_TROOP_SHIP", 20.0, 10.0, &[], 75.0, 25.0)
        };
        let frigate = design("SD_FRIGATE", 25.0, 24.0, &[6.0], 75.0, 25.0);
        let cruiser = design("SD_CRUISER", 60.0, 60.0, &[9.0, 9.0, 9.0], 75.0, 50.0);
        let monster = ShipDesign {
            producible: false,
            fuel: 0.0,
            ..design("SM_KRILL_SWARM", 0.0, 40.0, &[4.0, 4.0], 30.0, 25.0)
        };
        for d in [scout, outpost, colony, troops, frigate, cruiser, monster] {
            ship_designs.insert(d.name.clone(), d);
        }

        let mut building_types = BTreeMap::new();
        for b in [
            BuildingType {
                name: "BLD_SHIPYARD_BASE".to_string(),
                cost: 10.0,
                min_turns: 4,
                troops_bonus: 0.0,
                supply_bonus: 0.0,
                detection_bonus: 0.0,
            },
            BuildingType {
                name: "BLD_MILITARY_COMMAND".to_string(),
                cost: 40.0,
                min_turns: 5,
                troops_bonus: 6.0,
                supply_bonus: 1.0,
                detection_bonus: 0.0,
            },
            BuildingType {
                name: "BLD_SCANNING_FACILITY".to_string(),
                cost: 25.0,
                min_turns: 5,
                troops_bonus: 0.0,
                supply_bonus: 0.0,
                detection_bonus: 75.0,
            },
        ] {
            building_types.insert(b.name.clone(), b);
        }

        let mut species_map = BTreeMap::new();
        for s in [
            species("SP_HUMAN", &[Ocean, Terran], &[Tundra, Desert, Swamp], &[Inferno, Toxic]),
            species("SP_SCYLIOR", &[Ocean], &[Swamp, Toxic], &[Terran]),
            species("SP_EGASSEM", &[Inferno, Toxic], &[Barren, Radiated], &[Desert]),
            Species {
                can_colonize: false,
                ..species("SP_NATIVE_ABADDONI", &[Inferno], &[Toxic], &[Barren])
            },
        ] {
            species_map.insert(s.name.clone(), s);
        }

        let mut techs = BTreeMap::new();
        for t in [
            Tech {
                name: "SPY_DETECT_2".to_string(),
                cost: 48.0,
                min_turns: 4,
                prerequisites: Vec::new(),
                effects: vec![TechEffect::DetectionStrength(30.0)],
            },
            Tech {
                name: "CON_ORBITAL_CON".to_string(),
                cost: 60.0,
                min_turns: 5,
                prerequisites: Vec::new(),
                effects: vec![TechEffect::SupplyRange(1.0)],
            },
            Tech {
                name: "SHP_ZORTRIUM_PLATE".to_string(),
                cost: 40.0,
                min_turns: 4,
                prerequisites: Vec::new(),
                effects: vec![TechEffect::UnlockDesign("SD_CRUISER".to_string())],
            },
            Tech {
                name: "DEF_GARRISON_1".to_string(),
                cost: 30.0,
                min_turns: 3,
                prerequisites: Vec::new(),
                effects: vec![
                    TechEffect::MaxTroops(4.0),
                    TechEffect::UnlockBuilding("BLD_MILITARY_COMMAND".to_string()),
                ],
            },
            Tech {
                name: "SPY_DETECT_3".to_string(),
                cost: 150.0,
                min_turns: 6,
                prerequisites: vec!["SPY_DETECT_2".to_string()],
                effects: vec![
                    TechEffect::DetectionStrength(50.0),
                    TechEffect::UnlockBuilding("BLD_SCANNING_FACILITY".to_string()),
                ],
            },
            Tech {
                name: "SOC_PLANETARY_ADMIN".to_string(),
                cost: 80.0,
                min_turns: 5,
                prerequisites: Vec::new(),
                effects: vec![TechEffect::PolicySlot(PolicyCategory::Social)],
            },
        ] {
            techs.insert(t.name.clone(), t);
        }

        let mut policies = BTreeMap::new();
        for p in [
            Policy {
                name: "PLC_CENTRALIZATION".to_string(),
                category: PolicyCategory::Economic,
                adoption_cost: 8.0,
                industry_bonus: 0.2,
                research_bonus: 0.0,
            },
            Policy {
                name: "PLC_TECHNOCRACY".to_string(),
                category: PolicyCategory::Economic,
                adoption_cost: 6.0,
                industry_bonus: 0.0,
                research_bonus: 0.1,
            },
            Policy {
                name: "PLC_LIBERTY".to_string(),
                category: PolicyCategory::Social,
                adoption_cost: 5.0,
                industry_bonus: 0.0,
                research_bonus: 0.05,
            },
            Policy {
                name: "PLC_ALLIED_REPAIR".to_string(),
                category: PolicyCategory::Military,
                adoption_cost: 4.0,
                industry_bonus: 0.0,
                research_bonus: 0.0,
            },
        ] {
            policies.insert(p.name.clone(), p);
        }

        let mut starting_policy_slots = BTreeMap::new();
        starting_policy_slots.insert(PolicyCategory::Economic, 1);
        starting_policy_slots.insert(PolicyCategory::Social, 1);
        starting_policy_slots.insert(PolicyCategory::Military, 0);

        GameRules {
            ship_designs,
            building_types,
            species: species_map,
            techs,
            policies,
            starting_designs: vec![
                "SD_SCOUT".to_string(),
                "SD_OUTPOST_SHIP".to_string(),
                "SD_COLONY_SHIP".to_string(),
                "SD_TROOP_SHIP".to_string(),
                "SD_FRIGATE".to_string(),
            ],
            starting_buildings: vec!["BLD_SHIPYARD_BASE".to_string()],
            starting_detection_strength: 10.0,
            monster_detection_strength: 10.0,
            starting_policy_slots,
        }
    }
}

/// In-flight background content load.
pub struct ContentLoadHandle {
    handle: JoinHandle<Result<GameRules, ContentError>>,
}

/// Starts loading content on a background thread. `None` loads the
/// built-in defaults.
pub fn begin_content_load(path: Option<PathBuf>) -> ContentLoadHandle {
    let handle = thread::spawn(move || match path {
        Some(path) => {
            info!("loading content from {}", path.display());
            GameRules::from_json_file(&path)
        }
        None => {
            let rules = GameRules::default();
            rules.validate()?;
            Ok(rules)
        }
    });
    ContentLoadHandle { handle }
}

/// Blocks until the background load started by [`begin_content_load`] ends.
pub fn await_content_load(handle: ContentLoadHandle) -> Result<GameRules, ContentError> {
    handle.handle.join().map_err(|_| ContentError::LoaderPanicked)?
}
