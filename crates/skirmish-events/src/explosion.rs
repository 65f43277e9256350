//! Projectile explosions.
//!
//! [`explode`] is the only place projectiles damage actors. It runs on the
//! state being simulated, writes every consequence into that state's entity
//! store and records the occurrence (and any deaths it caused) in the event
//! registry under the state's index.

use std::collections::BTreeSet;
use std::sync::Arc;

use skirmish_entities::{
    EnergyChange, EntityStore, FireOrigin, GameSettings, MAX_CHAIN_DEPTH, SetterId,
    WeaponSettings, fire_weapon,
};
use skirmish_types::{
    ActorDiedKey, EventKey, ExplosionKey, PhysicsPoint, Pid, ProjectileKey, Tick, TileCoord,
    WeaponKey,
};
use tracing::trace;

use crate::behavior::EventBehavior;
use crate::death::DeathOccurrence;
use crate::registry::EventRegistry;

/// Why a projectile exploded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExplosionReason {
    /// Lifetime ran out.
    Expired,
    /// An enemy ship came within the proximity radius.
    Proximity,
    /// Hit a solid tile with no bounces left.
    HitTile {
        /// The tile hit.
        tile: TileCoord,
    },
    /// Hit a ship directly.
    HitShip {
        /// The ship hit.
        pid: Pid,
    },
}

/// What happened when a projectile exploded in one state.
///
/// Every field except `velocity` is causal and compared for consistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplosionOccurrence {
    /// Tick of the explosion.
    pub tick: Tick,
    /// Where it exploded.
    pub position: PhysicsPoint,
    /// Projectile velocity at the time.
    pub velocity: PhysicsPoint,
    /// Why it exploded.
    pub reason: ExplosionReason,
    /// Actors killed by the damage.
    pub killed: BTreeSet<Pid>,
    /// Coupled siblings removed with it.
    pub removed_coupled: BTreeSet<ProjectileKey>,
    /// Projectiles fired by the expiration chain.
    pub chain_fired: Vec<ProjectileKey>,
}

impl ExplosionOccurrence {
    fn same_cause(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.position == other.position
            && self.reason == other.reason
            && self.killed == other.killed
            && self.removed_coupled == other.removed_coupled
            && self.chain_fired == other.chain_fired
    }

    fn resolved_in(&self, target: &EntityStore) -> Self {
        Self {
            killed: self
                .killed
                .iter()
                .copied()
                .filter(|pid| target.actor(*pid).is_some())
                .collect(),
            removed_coupled: self
                .removed_coupled
                .iter()
                .filter(|key| target.projectile(key).is_some())
                .cloned()
                .collect(),
            chain_fired: self
                .chain_fired
                .iter()
                .filter(|key| target.projectile(key).is_some())
                .cloned()
                .collect(),
            ..self.clone()
        }
    }
}

/// A projectile explosion, with one history per state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectileExplosion {
    key: ExplosionKey,
    histories: Vec<Option<ExplosionOccurrence>>,
}

impl ProjectileExplosion {
    /// An explosion that has not occurred in any of `state_count` states.
    pub fn new(key: ExplosionKey, state_count: usize) -> Self {
        Self {
            key,
            histories: vec![None; state_count],
        }
    }

    /// The typed key.
    pub const fn explosion_key(&self) -> &ExplosionKey {
        &self.key
    }

    /// Occurrence in `state`.
    pub fn history(&self, state: usize) -> Option<&ExplosionOccurrence> {
        self.histories.get(state).and_then(Option::as_ref)
    }

    /// Record the occurrence in `state`.
    pub fn record(&mut self, state: usize, occurrence: ExplosionOccurrence) {
        if let Some(slot) = self.histories.get_mut(state) {
            *slot = Some(occurrence);
        }
    }
}

impl EventBehavior for ProjectileExplosion {
    fn key(&self) -> EventKey {
        EventKey::ProjectileExplosion(self.key.clone())
    }

    fn occurred_at(&self, state: usize) -> Option<Tick> {
        self.history(state).map(|h| h.tick)
    }

    fn is_consistent(&self, older: usize, newer: usize) -> bool {
        match (self.history(older), self.history(newer)) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_cause(b),
            _ => false,
        }
    }

    fn reset_execution_history(
        &mut self,
        state: usize,
        reset_from_state: usize,
        reset_from_event: Option<&Self>,
        target: &EntityStore,
    ) {
        let source = reset_from_event.unwrap_or(self);
        let copied = source
            .history(reset_from_state)
            .map(|h| h.resolved_in(target));
        if let Some(slot) = self.histories.get_mut(state) {
            *slot = copied;
        }
    }

    fn reset_from_tick(&mut self, state: usize, tick: Tick) -> bool {
        match self.histories.get_mut(state) {
            Some(slot) if slot.as_ref().is_some_and(|h| h.tick >= tick) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

/// Everything [`explode`] needs from the state being simulated.
pub struct ExplosionContext<'a> {
    /// Index of the state being simulated.
    pub state: usize,
    /// Tick being simulated.
    pub tick: Tick,
    /// The state's entities.
    pub store: &'a mut EntityStore,
    /// Settings in effect at `tick`.
    pub settings: &'a GameSettings,
    /// The environment's events.
    pub events: &'a mut EventRegistry,
    /// Capacity of new projectiles' histories.
    pub history_capacity: usize,
}

/// Explode the projectile `key` for `reason`.
///
/// Returns the explosion key, or `None` if the projectile does not exist at
/// the context's tick.
#[allow(clippy::too_many_lines)]
pub fn explode(
    ctx: &mut ExplosionContext<'_>,
    key: &ProjectileKey,
    reason: ExplosionReason,
) -> Option<ExplosionKey> {
    let tick = ctx.tick;
    let projectile = ctx.store.projectile(key).filter(|p| p.exists_at(tick))?;
    let weapon = Arc::clone(&projectile.weapon);
    let frame = projectile.now;
    let owner = key.owner;
    let explosion_key = ExplosionKey {
        projectile: key.clone(),
    };

    let direct_hit = match reason {
        ExplosionReason::HitShip { pid } => Some(pid),
        _ => None,
    };

    let mut killed = BTreeSet::new();
    for pid in ctx.store.actor_pids_at(tick) {
        let Some(actor) = ctx.store.actor_mut(pid) else {
            continue;
        };
        if actor.now.dead {
            continue;
        }

        let mut damage = 0_i64;
        if direct_hit == Some(pid) {
            damage = damage.saturating_add(i64::from(weapon.damage));
        }
        if weapon.splash_radius > 0 && (pid != owner || weapon.self_damage) {
            let distance = actor.now.position.distance(frame.position);
            damage = damage.saturating_add(splash(&weapon, distance));
        }
        if damage <= 0 {
            continue;
        }

        let damage = i32::try_from(damage).unwrap_or(i32::MAX);
        actor.energy.set(
            tick,
            SetterId::Explosion(explosion_key.clone()),
            EnergyChange::Relative(damage.saturating_neg()),
        );
        trace!(tick, %pid, damage, "Explosion damage");

        if actor.energy.value_at(tick) <= 0 {
            let respawn_delay = ctx
                .settings
                .ship(actor.now.ship)
                .map_or(0, |ship| ship.respawn_delay);
            actor.now.dead = true;
            actor.now.respawn_at = Some(tick.saturating_add(respawn_delay));
            actor.now.velocity = PhysicsPoint::ZERO;
            killed.insert(pid);

            let died_key = ActorDiedKey {
                cause: explosion_key.clone(),
                died: pid,
            };
            ctx.events.record_death(
                ctx.state,
                died_key,
                DeathOccurrence {
                    tick,
                    died: pid,
                    killer: owner,
                    position: actor.now.position,
                },
            );
        }
    }

    let mut removed_coupled = BTreeSet::new();
    if weapon.remove_coupled {
        let siblings: Vec<ProjectileKey> = ctx
            .store
            .siblings(key)
            .filter(|p| p.key != *key && p.exists_at(tick))
            .map(|p| p.key.clone())
            .collect();
        for sibling in siblings {
            if let Some(p) = ctx.store.projectile_mut(&sibling) {
                p.removed_at = Some(tick);
            }
            removed_coupled.insert(sibling);
        }
    }

    let mut chain_fired = Vec::new();
    if reason == ExplosionReason::Expired && key.chain_depth() < MAX_CHAIN_DEPTH {
        let chained = weapon
            .expiration_chain
            .as_deref()
            .and_then(|name| ctx.settings.weapon(name));
        if let Some(chained) = chained {
            chain_fired = fire_weapon(
                ctx.store,
                owner,
                &WeaponKey::chain(tick, key),
                chained,
                FireOrigin {
                    position: frame.position,
                    velocity: frame.velocity,
                    rotation: frame.rotation,
                },
                0,
                tick,
                ctx.history_capacity,
            );
        }
    }

    if let Some(p) = ctx.store.projectile_mut(key) {
        p.removed_at = Some(tick);
    }

    ctx.events.record_explosion(
        ctx.state,
        explosion_key.clone(),
        ExplosionOccurrence {
            tick,
            position: frame.position,
            velocity: frame.velocity,
            reason,
            killed,
            removed_coupled,
            chain_fired,
        },
    );
    Some(explosion_key)
}

/// Splash damage at `distance` from the center, falling off linearly to zero
/// at the splash radius.
fn splash(weapon: &WeaponSettings, distance: i64) -> i64 {
    let radius = i64::from(weapon.splash_radius);
    if distance >= radius {
        return 0;
    }
    i64::from(weapon.splash_damage)
        .saturating_mul(radius.saturating_sub(distance))
        .checked_div(radius)
        .unwrap_or(0)
}
