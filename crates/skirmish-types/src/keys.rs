//! Deterministic keys for projectiles and events.
//!
//! Every key is derived from its cause, never from allocation order, so two
//! trailing states that simulate the same occurrence produce equal keys even
//! when their entity instances are unrelated. Ordering is structural: all
//! projectiles of one owner and one weapon fire are contiguous when sorted,
//! which is what makes coupled siblings a cheap range lookup.

use std::sync::Arc;

use crate::ids::{Pid, Tick, WeaponSlot};

/// What caused a weapon to fire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FireCause {
    /// An actor fired one of its weapon slots.
    Slot(WeaponSlot),
    /// A projectile's explosion chain-fired a follow-up weapon.
    Chain(Arc<ProjectileKey>),
}

/// Identity of one weapon discharge. All projectiles created by the same
/// discharge share it and are "coupled".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeaponKey {
    /// Tick the weapon fired at.
    pub fired_at: Tick,
    /// Slot or parent projectile that fired.
    pub cause: FireCause,
}

impl WeaponKey {
    /// Key for an actor firing a slot.
    pub const fn slot(fired_at: Tick, slot: WeaponSlot) -> Self {
        Self {
            fired_at,
            cause: FireCause::Slot(slot),
        }
    }

    /// Key for a chain fire caused by `parent` exploding.
    pub fn chain(fired_at: Tick, parent: &ProjectileKey) -> Self {
        Self {
            fired_at,
            cause: FireCause::Chain(Arc::new(parent.clone())),
        }
    }
}

/// Identity of a projectile: `(owner, weapon key, index)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectileKey {
    /// Actor that owns the projectile.
    pub owner: Pid,
    /// The discharge that created it.
    pub weapon: WeaponKey,
    /// Index within the coupled set.
    pub index: u16,
}

impl ProjectileKey {
    /// Create a projectile key.
    pub const fn new(owner: Pid, weapon: WeaponKey, index: u16) -> Self {
        Self {
            owner,
            weapon,
            index,
        }
    }

    /// Number of chain fires between this projectile and the actor's
    /// original slot fire.
    pub fn chain_depth(&self) -> usize {
        let mut depth: usize = 0;
        let mut cause = &self.weapon.cause;
        while let FireCause::Chain(parent) = cause {
            depth = depth.saturating_add(1);
            cause = &parent.weapon.cause;
        }
        depth
    }

    /// Tick of the original slot fire at the root of any chain.
    pub fn origin_tick(&self) -> Tick {
        let mut key = self;
        while let FireCause::Chain(parent) = &key.weapon.cause {
            key = parent;
        }
        key.weapon.fired_at
    }

    /// Smallest key of the sibling set this projectile belongs to.
    pub fn first_sibling(&self) -> Self {
        Self::new(self.owner, self.weapon.clone(), 0)
    }

    /// Largest key of the sibling set this projectile belongs to.
    pub fn last_sibling(&self) -> Self {
        Self::new(self.owner, self.weapon.clone(), u16::MAX)
    }

    /// Whether two projectiles came from the same discharge.
    pub fn is_coupled_with(&self, other: &Self) -> bool {
        self.owner == other.owner && self.weapon == other.weapon
    }
}

/// Key of a projectile explosion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExplosionKey {
    /// The projectile that exploded.
    pub projectile: ProjectileKey,
}

/// Key of an actor death.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorDiedKey {
    /// The explosion that killed the actor.
    pub cause: ExplosionKey,
    /// The actor that died.
    pub died: Pid,
}

/// Key of any event. The key-to-event mapping is 1:1 per environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKey {
    /// A projectile explosion.
    ProjectileExplosion(ExplosionKey),
    /// An actor death.
    ActorDied(ActorDiedKey),
}

impl EventKey {
    /// Tick of the slot fire that ultimately caused this event. No history
    /// of the event can precede it.
    pub fn origin_tick(&self) -> Tick {
        match self {
            Self::ProjectileExplosion(key) => key.projectile.origin_tick(),
            Self::ActorDied(key) => key.cause.projectile.origin_tick(),
        }
    }
}

impl From<ExplosionKey> for EventKey {
    fn from(key: ExplosionKey) -> Self {
        Self::ProjectileExplosion(key)
    }
}

impl From<ActorDiedKey> for EventKey {
    fn from(key: ActorDiedKey) -> Self {
        Self::ActorDied(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gun_key(owner: i32, tick: Tick, index: u16) -> ProjectileKey {
        ProjectileKey::new(Pid(owner), WeaponKey::slot(tick, WeaponSlot::Gun), index)
    }

    #[test]
    fn siblings_sort_contiguously() {
        let a = gun_key(1, 10, 0);
        let b = gun_key(1, 10, 1);
        let other_fire = gun_key(1, 11, 0);
        assert!(a < b);
        assert!(b < other_fire);
        assert!(a.first_sibling() <= a && a <= a.last_sibling());
        assert!(other_fire > a.last_sibling());
    }

    #[test]
    fn chain_depth_counts_parents() {
        let root = gun_key(1, 10, 0);
        let child = ProjectileKey::new(Pid(1), WeaponKey::chain(20, &root), 2);
        let grandchild = ProjectileKey::new(Pid(1), WeaponKey::chain(30, &child), 0);
        assert_eq!(root.chain_depth(), 0);
        assert_eq!(child.chain_depth(), 1);
        assert_eq!(grandchild.chain_depth(), 2);
        assert_eq!(grandchild.origin_tick(), 10);
    }

    #[test]
    fn chain_keys_from_different_parents_differ() {
        let p1 = gun_key(1, 10, 0);
        let p2 = gun_key(1, 11, 0);
        assert_ne!(WeaponKey::chain(20, &p1), WeaponKey::chain(20, &p2));
    }

    #[test]
    fn coupling_requires_same_discharge() {
        assert!(gun_key(1, 10, 0).is_coupled_with(&gun_key(1, 10, 3)));
        assert!(!gun_key(1, 10, 0).is_coupled_with(&gun_key(2, 10, 0)));
    }
}
