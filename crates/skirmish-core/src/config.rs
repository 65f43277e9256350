//! Engine configuration file.
//!
//! The canonical configuration lives in `skirmish-config.yaml` at the
//! project root. The `SKIRMISH_CONFIG` environment variable points the
//! loader at a different file. Every field has a default, so an empty file
//! is a valid configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use skirmish_entities::{CollisionMap, ConfigDocument, GameConfig, MAX_DURATION, TileRect};
use skirmish_types::Tick;

use crate::environment::EnvironmentConfig;

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "SKIRMISH_CONFIG";

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "skirmish-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum EngineConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is outside its allowed range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// An inline game document was rejected.
    #[error("invalid game document: {source}")]
    Game {
        /// The underlying settings error.
        #[from]
        source: skirmish_entities::ConfigError,
    },
}

impl From<serde_yml::Error> for EngineConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration. Mirrors the structure of `skirmish-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SkirmishConfig {
    /// Scheduler and trailing-state settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Arena shape.
    #[serde(default)]
    pub map: MapConfig,

    /// Game settings documents loaded before the first tick.
    #[serde(default)]
    pub game: Vec<ConfigDocument>,

    /// Operation log replayed into the environment, one JSON operation per
    /// line.
    #[serde(default)]
    pub replay: Option<PathBuf>,
}

impl SkirmishConfig {
    /// Path of the configuration file: `SKIRMISH_CONFIG` when set,
    /// otherwise [`DEFAULT_CONFIG_PATH`].
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineConfigError::Io`] if the file cannot be read,
    /// [`EngineConfigError::Yaml`] if it is not valid YAML and
    /// [`EngineConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, EngineConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`EngineConfigError::Yaml`] if the string is not valid YAML
    /// and [`EngineConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, EngineConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), EngineConfigError> {
        let invalid = |field, reason| Err(EngineConfigError::Invalid { field, reason });
        if self.engine.tick_length_ms == 0 {
            return invalid("engine.tick_length_ms", "must be positive");
        }
        if self.engine.trailing_states == 0 {
            return invalid("engine.trailing_states", "need at least one state");
        }
        if !(1..=MAX_DURATION).contains(&self.engine.trailing_state_delay) {
            return invalid("engine.trailing_state_delay", "must be between 1 and 2^24");
        }
        if !(2..=MAX_DURATION).contains(&self.engine.history_margin) {
            return invalid("engine.history_margin", "must be between 2 and 2^24");
        }
        if self.engine.worker_threads == 0 {
            return invalid("engine.worker_threads", "need at least one worker");
        }
        if self.map.width <= 0 || self.map.height <= 0 {
            return invalid("map", "width and height must be positive");
        }
        Ok(())
    }

    /// Trailing-state shape for [`crate::Environment::new`].
    pub const fn environment(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            trailing_states: self.engine.trailing_states,
            trailing_state_delay: self.engine.trailing_state_delay,
            history_margin: self.engine.history_margin,
        }
    }

    /// The arena described by the `map` section.
    pub fn collision_map(&self) -> CollisionMap {
        CollisionMap::with_rects(self.map.width, self.map.height, &self.map.solid)
    }

    /// Default game settings with every inline document loaded.
    ///
    /// # Errors
    ///
    /// Returns [`EngineConfigError::Game`] for the first rejected document.
    pub fn game_config(&self) -> Result<GameConfig, EngineConfigError> {
        let mut game = GameConfig::default();
        for document in &self.game {
            game.load(document.clone())?;
        }
        Ok(game)
    }
}

/// Scheduler and trailing-state settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_length_ms")]
    pub tick_length_ms: u64,

    /// Number of trailing states, including the newest.
    #[serde(default = "default_trailing_states")]
    pub trailing_states: usize,

    /// Ticks between neighboring states.
    #[serde(default = "default_trailing_state_delay")]
    pub trailing_state_delay: Tick,

    /// Extra entity history beyond the oldest state's delay.
    #[serde(default = "default_history_margin")]
    pub history_margin: Tick,

    /// Size of the worker pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Stop after this many ticks. Runs until interrupted when absent.
    #[serde(default)]
    pub max_ticks: Option<Tick>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_length_ms: default_tick_length_ms(),
            trailing_states: default_trailing_states(),
            trailing_state_delay: default_trailing_state_delay(),
            history_margin: default_history_margin(),
            worker_threads: default_worker_threads(),
            max_ticks: None,
        }
    }
}

const fn default_tick_length_ms() -> u64 {
    10
}

const fn default_trailing_states() -> usize {
    3
}

const fn default_trailing_state_delay() -> Tick {
    32
}

const fn default_history_margin() -> Tick {
    16
}

const fn default_worker_threads() -> usize {
    2
}

/// Arena shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapConfig {
    /// Width in tiles.
    #[serde(default = "default_map_size")]
    pub width: i32,

    /// Height in tiles.
    #[serde(default = "default_map_size")]
    pub height: i32,

    /// Solid tile rectangles.
    #[serde(default)]
    pub solid: Vec<TileRect>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_map_size(),
            height: default_map_size(),
            solid: Vec::new(),
        }
    }
}

const fn default_map_size() -> i32 {
    64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skirmish_types::{ShipId, WeaponSlot};

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SkirmishConfig::parse("{}").unwrap();
        assert_eq!(config, SkirmishConfig::default());
        assert_eq!(config.environment(), EnvironmentConfig::default());
        assert_eq!(config.collision_map().width(), 64);
    }

    #[test]
    fn parses_full_document() {
        let config = SkirmishConfig::parse(
            r"
engine:
  tick_length_ms: 16
  trailing_states: 4
  trailing_state_delay: 20
  max_ticks: 600
map:
  width: 32
  height: 24
  solid:
    - { x: 10, y: 10, width: 2, height: 3 }
game:
  - name: burst
    from_tick: 0
    weapons:
      burst:
        projectiles: 8
        spread: 8192
    ships:
      0:
        slots:
          burst: burst
replay: ops.jsonl
",
        )
        .unwrap();

        assert_eq!(config.engine.tick_length_ms, 16);
        assert_eq!(config.engine.worker_threads, 2);
        assert_eq!(config.engine.max_ticks, Some(600));
        assert_eq!(config.environment().highest_delay(), 60);
        assert_eq!(config.replay.as_deref(), Some(Path::new("ops.jsonl")));

        let map = config.collision_map();
        assert!(map.is_solid(skirmish_types::TileCoord::new(11, 12)));
        assert!(!map.is_solid(skirmish_types::TileCoord::new(12, 12)));

        let game = config.game_config().unwrap();
        let weapon = game
            .settings_at(0)
            .slot_weapon(ShipId(0), WeaponSlot::Burst)
            .cloned()
            .unwrap();
        assert_eq!(weapon.projectiles, 8);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = SkirmishConfig::parse("engine: { trailing_states: 0 }").unwrap_err();
        assert!(matches!(
            err,
            EngineConfigError::Invalid {
                field: "engine.trailing_states",
                ..
            }
        ));
        assert!(SkirmishConfig::parse("engine: { tick_length_ms: 0 }").is_err());
        assert!(SkirmishConfig::parse("map: { width: 0 }").is_err());
        assert!(
            SkirmishConfig::parse("engine: { trailing_state_delay: 9223372036854775807 }").is_err()
        );
        assert!(SkirmishConfig::parse("engine: { history_margin: 9223372036854775807 }").is_err());
    }

    #[test]
    fn rejects_game_document_with_unbounded_lifetime() {
        let config = SkirmishConfig::parse(
            r"
game:
  - name: forever
    weapons:
      bullet:
        lifetime: 9223372036854775807
        fire_delay: 9223372036854775807
",
        )
        .unwrap();
        assert!(matches!(
            config.game_config(),
            Err(EngineConfigError::Game {
                source: skirmish_entities::ConfigError::OutOfRange { .. }
            })
        ));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = SkirmishConfig::parse("engine: [").unwrap_err();
        assert!(matches!(err, EngineConfigError::Yaml { .. }));
    }

    #[test]
    fn rejects_unknown_weapon_in_game_document() {
        let config = SkirmishConfig::parse(
            r"
game:
  - name: broken
    ships:
      0:
        slots:
          mine: nonexistent
",
        )
        .unwrap();
        assert!(matches!(
            config.game_config(),
            Err(EngineConfigError::Game { .. })
        ));
    }
}
