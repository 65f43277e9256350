//! Entity store of one trailing state.
//!
//! Entities are owned by exactly one state. Everything else (events, other
//! states, the environment) refers to them by [`Pid`] or [`ProjectileKey`]
//! and resolves through the store, so there are no cross-entity pointers to
//! keep alive or re-target.

use std::collections::BTreeMap;

use skirmish_types::{Pid, ProjectileKey, Tick};

use crate::actor::Actor;
use crate::projectile::Projectile;

/// Actors and projectiles of one state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStore {
    actors: BTreeMap<Pid, Actor>,
    projectiles: BTreeMap<ProjectileKey, Projectile>,
}

impl EntityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Actor by pid, including removed ones not yet collected.
    pub fn actor(&self, pid: Pid) -> Option<&Actor> {
        self.actors.get(&pid)
    }

    /// Mutable actor by pid.
    pub fn actor_mut(&mut self, pid: Pid) -> Option<&mut Actor> {
        self.actors.get_mut(&pid)
    }

    /// Insert or replace an actor.
    pub fn insert_actor(&mut self, actor: Actor) {
        self.actors.insert(actor.pid, actor);
    }

    /// Every stored actor in pid order.
    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// Every stored actor in pid order, mutably.
    pub fn actors_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.actors.values_mut()
    }

    /// Actors that exist at `tick`.
    pub fn actors_at(&self, tick: Tick) -> impl Iterator<Item = &Actor> {
        self.actors.values().filter(move |a| a.exists_at(tick))
    }

    /// Pids of actors that exist at `tick`.
    pub fn actor_pids_at(&self, tick: Tick) -> Vec<Pid> {
        self.actors_at(tick).map(|a| a.pid).collect()
    }

    /// Projectile by key.
    pub fn projectile(&self, key: &ProjectileKey) -> Option<&Projectile> {
        self.projectiles.get(key)
    }

    /// Mutable projectile by key.
    pub fn projectile_mut(&mut self, key: &ProjectileKey) -> Option<&mut Projectile> {
        self.projectiles.get_mut(key)
    }

    /// Insert or replace a projectile.
    pub fn insert_projectile(&mut self, projectile: Projectile) {
        self.projectiles.insert(projectile.key.clone(), projectile);
    }

    /// Every stored projectile in key order.
    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    /// Keys of projectiles that exist at `tick`, in key order.
    pub fn projectile_keys_at(&self, tick: Tick) -> Vec<ProjectileKey> {
        self.projectiles
            .values()
            .filter(|p| p.exists_at(tick))
            .map(|p| p.key.clone())
            .collect()
    }

    /// Every projectile from the same discharge as `key`, including itself.
    pub fn siblings<'a>(&'a self, key: &ProjectileKey) -> impl Iterator<Item = &'a Projectile> {
        self.projectiles
            .range(key.first_sibling()..=key.last_sibling())
            .map(|(_, p)| p)
    }

    /// Commit the frame being built for every entity alive at `tick`.
    pub fn commit(&mut self, tick: Tick) {
        for actor in self.actors.values_mut() {
            if actor.created_at <= tick {
                actor.commit(tick);
            }
        }
        for projectile in self.projectiles.values_mut() {
            if projectile.created_at <= tick {
                projectile.commit(tick);
            }
        }
    }

    /// Restore every entity to the end of `tick`. Entities created later are
    /// dropped, removals after `tick` are undone.
    pub fn rewind(&mut self, tick: Tick) {
        self.actors.retain(|_, actor| actor.rewind(tick));
        self.projectiles.retain(|_, projectile| projectile.rewind(tick));
    }

    /// Drop entities removed before `cutoff` and fold old energy entries.
    ///
    /// Returns the number of entities dropped.
    pub fn collect_garbage(&mut self, cutoff: Tick) -> usize {
        let before = self.actors.len().saturating_add(self.projectiles.len());
        self.actors
            .retain(|_, actor| actor.removed_at.is_none_or(|removed| removed >= cutoff));
        self.projectiles
            .retain(|_, projectile| projectile.removed_at.is_none_or(|removed| removed >= cutoff));
        for actor in self.actors.values_mut() {
            actor.energy.prune(cutoff);
        }
        before
            .saturating_sub(self.actors.len())
            .saturating_sub(self.projectiles.len())
    }

    /// Number of stored actors, including removed ones not yet collected.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Number of stored projectiles, including removed ones not yet collected.
    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::sync::Arc;

    use skirmish_types::{PhysicsPoint, ShipId, WeaponKey, WeaponSlot};

    use super::*;
    use crate::actor::ActorFrame;
    use crate::config::WeaponSettings;
    use crate::history::RollingHistory;
    use crate::projectile::ProjectileFrame;

    fn actor(pid: i32, created_at: Tick) -> Actor {
        Actor::new(
            Pid(pid),
            format!("p{pid}"),
            0,
            created_at,
            ActorFrame::spawned(PhysicsPoint::ZERO, ShipId(0)),
            100,
            32,
        )
    }

    fn projectile(owner: i32, fired_at: Tick, index: u16) -> Projectile {
        Projectile {
            key: ProjectileKey::new(Pid(owner), WeaponKey::slot(fired_at, WeaponSlot::Gun), index),
            weapon: Arc::new(WeaponSettings::named("bullet")),
            created_at: fired_at,
            expires_at: fired_at + 100,
            removed_at: None,
            now: ProjectileFrame {
                position: PhysicsPoint::ZERO,
                velocity: PhysicsPoint::ZERO,
                rotation: 0,
                bounces_left: 0,
            },
            frames: RollingHistory::new(32),
        }
    }

    #[test]
    fn siblings_are_a_contiguous_range() {
        let mut store = EntityStore::new();
        for index in 0..3 {
            store.insert_projectile(projectile(1, 5, index));
        }
        store.insert_projectile(projectile(1, 6, 0));
        store.insert_projectile(projectile(2, 5, 0));

        let key = ProjectileKey::new(Pid(1), WeaponKey::slot(5, WeaponSlot::Gun), 1);
        let indices: Vec<u16> = store.siblings(&key).map(|p| p.key.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn rewind_drops_late_entities_and_restores_removed() {
        let mut store = EntityStore::new();
        store.insert_actor(actor(1, 0));
        store.insert_actor(actor(2, 8));
        store.insert_projectile(projectile(1, 3, 0));
        for t in 0..10 {
            store.commit(t);
        }
        store.projectile_mut(&projectile(1, 3, 0).key).unwrap().removed_at = Some(7);

        store.rewind(5);
        assert!(store.actor(Pid(1)).is_some());
        assert!(store.actor(Pid(2)).is_none());
        let p = store.projectile(&projectile(1, 3, 0).key).unwrap();
        assert_eq!(p.removed_at, None);
        assert_eq!(p.frames.newest_tick(), Some(5));
    }

    #[test]
    fn garbage_collection_respects_cutoff() {
        let mut store = EntityStore::new();
        let mut a = actor(1, 0);
        a.removed_at = Some(10);
        store.insert_actor(a);
        store.insert_actor(actor(2, 0));
        let mut p = projectile(2, 1, 0);
        p.removed_at = Some(20);
        store.insert_projectile(p);

        assert_eq!(store.collect_garbage(10), 0);
        assert_eq!(store.collect_garbage(11), 1);
        assert_eq!(store.actor_pids_at(11), vec![Pid(2)]);
        assert_eq!(store.collect_garbage(21), 1);
        assert_eq!(store.projectile_count(), 0);
    }
}
