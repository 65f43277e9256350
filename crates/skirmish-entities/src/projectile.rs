//! Projectiles created by weapon fires.

use std::sync::Arc;

use skirmish_types::{PhysicsPoint, ProjectileKey, Tick};

use crate::config::WeaponSettings;
use crate::history::RollingHistory;
use crate::store::EntityStore;

/// Mutable per-tick state of a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileFrame {
    /// Position in sub-pixel units.
    pub position: PhysicsPoint,
    /// Velocity in sub-pixel units per tick.
    pub velocity: PhysicsPoint,
    /// Rotation it was fired with.
    pub rotation: i32,
    /// Tile bounces left before a tile hit explodes it.
    pub bounces_left: u16,
}

/// A projectile and its rolling history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projectile {
    /// Cause-derived key.
    pub key: ProjectileKey,
    /// Weapon settings captured at fire time.
    pub weapon: Arc<WeaponSettings>,
    /// Tick the projectile was fired at.
    pub created_at: Tick,
    /// Tick the projectile expires at.
    pub expires_at: Tick,
    /// Tick the projectile was removed at (exploded or removed as a coupled
    /// sibling).
    pub removed_at: Option<Tick>,
    /// State being built for the current tick.
    pub now: ProjectileFrame,
    /// Committed frames, one per tick.
    pub frames: RollingHistory<ProjectileFrame>,
}

impl Projectile {
    /// Whether the projectile exists at `tick`.
    pub fn exists_at(&self, tick: Tick) -> bool {
        self.created_at <= tick && self.removed_at.is_none_or(|removed| tick < removed)
    }

    /// Committed position at `tick`.
    pub fn position_at(&self, tick: Tick) -> Option<PhysicsPoint> {
        self.frames.get(tick).map(|f| f.position)
    }

    /// Store the frame being built as the committed frame of `tick`.
    pub fn commit(&mut self, tick: Tick) {
        self.frames.record(tick, self.now);
    }

    /// Restore the projectile to the end of `tick`.
    ///
    /// Returns `false` when it was fired after `tick` and must be dropped.
    pub fn rewind(&mut self, tick: Tick) -> bool {
        if self.created_at > tick {
            return false;
        }
        if self.removed_at.is_some_and(|removed| removed > tick) {
            self.removed_at = None;
        }
        self.frames.truncate_after(tick);
        if let Some(frame) = self.frames.latest() {
            self.now = *frame;
        }
        true
    }

    /// The same projectile in another state's store.
    pub fn find_in_other_state<'a>(&self, other: &'a EntityStore) -> Option<&'a Self> {
        other.projectile(&self.key)
    }
}
