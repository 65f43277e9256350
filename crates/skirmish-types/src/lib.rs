//! Shared type definitions for the Skirmish simulation core.
//!
//! This crate is the single source of truth for identifiers, keys and the
//! operation model used across the workspace. Everything here is plain data:
//! no simulation logic lives in this crate.
//!
//! # Modules
//!
//! - [`ids`] -- Pid, ship and weapon slot identifiers plus the [`Tick`] alias
//! - [`geometry`] -- Fixed-point positions, tiles and rotation helpers
//! - [`movement`] -- Per-tick movement input bitmask
//! - [`keys`] -- Cause-derived projectile and event keys
//! - [`operation`] -- Timestamped operations fed in by the network layer

pub mod geometry;
pub mod ids;
pub mod keys;
pub mod movement;
pub mod operation;

// Re-export all public types at crate root for convenience.
pub use geometry::{
    PIXEL, PhysicsPoint, ROTATION_POINTS, TILE, TILE_PIXELS, TileCoord, direction,
    normalize_rotation,
};
pub use ids::{Pid, ShipId, Tick, WeaponSlot};
pub use keys::{ActorDiedKey, EventKey, ExplosionKey, FireCause, ProjectileKey, WeaponKey};
pub use movement::Movement;
pub use operation::{MotionHint, Operation, OperationKind};
