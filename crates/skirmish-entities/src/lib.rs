//! Entities of the Skirmish simulation core.
//!
//! Each trailing state owns one [`EntityStore`] of actors and projectiles.
//! Every mutable entity field has a per-tick [`RollingHistory`], which both
//! answers historical queries and serves as the checkpoint a state rewinds
//! to when a late operation forces a replay.
//!
//! # Modules
//!
//! - [`history`] -- Rolling per-tick value history
//! - [`energy`] -- Setter-tagged energy history
//! - [`config`] -- Tick-scoped ship and weapon settings
//! - [`map`] -- Tile collision map
//! - [`motion`] -- Fixed-point integration with tile bouncing
//! - [`actor`] -- Player ships
//! - [`projectile`] -- Weapon projectiles
//! - [`store`] -- Per-state entity store
//! - [`weapon`] -- Weapon discharge and spawn placement

pub mod actor;
pub mod config;
pub mod energy;
pub mod history;
pub mod map;
pub mod motion;
pub mod projectile;
pub mod store;
pub mod weapon;

pub use actor::{Actor, ActorFrame};
pub use config::{
    ConfigDocument, ConfigError, GameConfig, GameSettings, MAX_CHAIN_DEPTH, MAX_DISTANCE,
    MAX_DURATION, MAX_ENERGY, ShipPatch, ShipSettings, WeaponPatch, WeaponSettings,
};
pub use energy::{EnergyChange, EnergyHistory, SetterId};
pub use history::RollingHistory;
pub use map::{CollisionMap, TileRect};
pub use motion::{FRICTION_ONE, Motion, integrate};
pub use projectile::{Projectile, ProjectileFrame};
pub use store::EntityStore;
pub use weapon::{FireOrigin, fire_weapon, spawn_point, spread_rotation};
