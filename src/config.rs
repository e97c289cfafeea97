//! Server configuration.
//!
//! Starts from [`ServerConfig::default`], optionally overlaid by a JSON file,
//! then by individual `setoption` commands.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("invalid value '{value}' for option '{name}'")]
    InvalidValue { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Worker threads for per-empire resource pool updates.
    pub effects_threads: usize,
    pub save_root: PathBuf,
    pub alliance_victory: bool,
    pub diplomacy_enabled: bool,
    /// Remaining human empires win once at most this many are left. Zero
    /// disables the check.
    pub human_victory_threshold: usize,
    pub ai_shutdown_grace_ms: u64,
    pub ai_executable: Option<PathBuf>,
    pub ai_low_priority: bool,
    pub content_path: Option<PathBuf>,
    pub seed: u64,
    pub galaxy_systems: usize,
    pub monsters: bool,
    pub natives: bool,
    pub combat_bouts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            effects_threads: 4,
            save_root: PathBuf::from("saves"),
            alliance_victory: true,
            diplomacy_enabled: true,
            human_victory_threshold: 0,
            ai_shutdown_grace_ms: 2000,
            ai_executable: None,
            ai_low_priority: true,
            content_path: None,
            seed: 0,
            galaxy_systems: 20,
            monsters: true,
            natives: true,
            combat_bouts: 4,
        }
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn optional_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty() && value != "none").then(|| PathBuf::from(value))
}

impl ServerConfig {
    pub fn from_json(text: &str) -> Result<ServerConfig, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<ServerConfig, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ServerConfig::from_json(&text)
    }

    /// Sets one option by name.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        match name {
            "effects_threads" | "effects.server.threads" => {
                self.effects_threads = parse_value(name, value)?
            }
            "save_root" => self.save_root = PathBuf::from(value.trim()),
            "alliance_victory" => self.alliance_victory = parse_value(name, value)?,
            "diplomacy_enabled" => self.diplomacy_enabled = parse_value(name, value)?,
            "human_victory_threshold" => self.human_victory_threshold = parse_value(name, value)?,
            "ai_shutdown_grace_ms" => self.ai_shutdown_grace_ms = parse_value(name, value)?,
            "ai_executable" => self.ai_executable = optional_path(value),
            "ai_low_priority" => self.ai_low_priority = parse_value(name, value)?,
            "content_path" => self.content_path = optional_path(value),
            "seed" => self.seed = parse_value(name, value)?,
            "galaxy_systems" => self.galaxy_systems = parse_value(name, value)?,
            "monsters" => self.monsters = parse_value(name, value)?,
            "natives" => self.natives = parse_value(name, value)?,
            "combat_bouts" => self.combat_bouts = parse_value(name, value)?,
            _ => return Err(ConfigError::UnknownOption(name.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_option_parses_typed_values() {
        let mut config = ServerConfig::default();
        config.set_option("effects.server.threads", "8").unwrap();
        config.set_option("alliance_victory", "false").unwrap();
        config.set_option("ai_executable", "/usr/bin/ai").unwrap();
        assert_eq!(config.effects_threads, 8);
        assert!(!config.alliance_victory);
        assert_eq!(config.ai_executable, Some(PathBuf::from("/usr/bin/ai")));
        config.set_option("ai_executable", "none").unwrap();
        assert_eq!(config.ai_executable, None);
    }

    #[test]
    fn set_option_rejects_bad_input() {
        let mut config = ServerConfig::default();
        assert!(matches!(
            config.set_option("seed", "abc"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set_option("nonsense", "1"),
            Err(ConfigError::UnknownOption(_))
        ));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = ServerConfig::from_json(r#"{"galaxy_systems": 12, "monsters": false}"#).unwrap();
        assert_eq!(config.galaxy_systems, 12);
        assert!(!config.monsters);
        assert_eq!(config.combat_bouts, ServerConfig::default().combat_bouts);
    }
}
