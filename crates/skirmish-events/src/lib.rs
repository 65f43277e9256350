//! Keyed events with per-state execution histories.
//!
//! An event is an interesting occurrence (a projectile exploded, an actor
//! died) identified by a key derived from its cause. The environment keeps
//! exactly one event object per key and every event stores one history per
//! trailing state. Comparing the histories of two states is how divergence
//! between them is detected.
//!
//! # Modules
//!
//! - [`behavior`] -- The [`EventBehavior`] contract
//! - [`explosion`] -- Projectile explosions and the [`explode`] operation
//! - [`death`] -- Actor deaths
//! - [`registry`] -- The [`EventRegistry`] and consistency sweep

pub mod behavior;
pub mod death;
pub mod explosion;
pub mod registry;

pub use behavior::EventBehavior;
pub use death::{ActorDied, DeathOccurrence};
pub use explosion::{
    ExplosionContext, ExplosionOccurrence, ExplosionReason, ProjectileExplosion, explode,
};
pub use registry::{Desync, Event, EventRegistry};
