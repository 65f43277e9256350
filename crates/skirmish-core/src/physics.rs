//! Per-tick actor and projectile physics.

use std::sync::Arc;

use skirmish_entities::{
    Actor, ActorFrame, CollisionMap, EnergyChange, EntityStore, FRICTION_ONE, GameSettings,
    SetterId, ShipSettings, WeaponSettings, integrate, spawn_point,
};
use skirmish_events::{ExplosionContext, ExplosionReason, explode};
use skirmish_types::{PhysicsPoint, Pid, Tick, direction, normalize_rotation};
use tracing::trace;

use crate::state::StepContext;

/// Move, turn, recharge and respawn every actor that exists at `tick`.
pub(crate) fn step_actors(
    store: &mut EntityStore,
    tick: Tick,
    settings: &GameSettings,
    map: &CollisionMap,
) {
    for actor in store.actors_mut() {
        if !actor.exists_at(tick) {
            continue;
        }
        let Some(ship) = settings.ship(actor.now.ship) else {
            continue;
        };

        if actor.now.dead {
            if actor.now.respawn_at.is_some_and(|at| at <= tick) {
                respawn(actor, ship, map, tick);
            }
            continue;
        }

        let movement = actor.now.movement;
        let frame = &mut actor.now;
        let turn = movement.rotation_sign().saturating_mul(ship.rotation_speed);
        frame.rotation = normalize_rotation(frame.rotation.saturating_add(turn));
        let thrust = movement.thrust_sign().saturating_mul(ship.thrust);
        if thrust != 0 {
            frame.velocity = frame.velocity.saturating_add(direction(frame.rotation, thrust));
        }
        frame.velocity = frame.velocity.clamp_length(ship.max_speed);

        let motion = integrate(
            map,
            frame.position,
            frame.velocity,
            ship.radius,
            ship.bounce_friction,
        );
        frame.position = motion.position;
        frame.velocity = motion.velocity;

        recharge(actor, ship, tick);
    }
}

fn respawn(actor: &mut Actor, ship: &ShipSettings, map: &CollisionMap, tick: Tick) {
    let position = spawn_point(map, ship, actor.seed, tick);
    actor.now = ActorFrame {
        weapon_ready_at: actor.now.weapon_ready_at,
        ..ActorFrame::spawned(position, actor.now.ship)
    };
    actor.energy.set(
        tick,
        SetterId::Spawn,
        EnergyChange::Absolute(ship.max_energy),
    );
    trace!(tick, pid = %actor.pid, "Actor respawned");
}

fn recharge(actor: &mut Actor, ship: &ShipSettings, tick: Tick) {
    let missing = ship.max_energy.saturating_sub(actor.energy.value_at(tick));
    let amount = ship.recharge.min(missing);
    if amount > 0 {
        actor
            .energy
            .set(tick, SetterId::Recharge, EnergyChange::Relative(amount));
    }
}

/// Move every projectile that exists at `tick` and explode those that
/// expire, hit a wall without bounces left, hit a ship or trigger their
/// proximity fuse.
///
/// Projectiles fired during `tick` start moving on the next tick.
pub(crate) fn step_projectiles(
    state: usize,
    store: &mut EntityStore,
    tick: Tick,
    settings: &GameSettings,
    ctx: &mut StepContext<'_>,
) {
    for key in store.projectile_keys_at(tick) {
        let Some(projectile) = store.projectile(&key) else {
            continue;
        };
        // An earlier explosion this tick may have removed a coupled sibling.
        if !projectile.exists_at(tick) || projectile.created_at == tick {
            continue;
        }
        let weapon = Arc::clone(&projectile.weapon);
        let mut frame = projectile.now;

        let reason = if tick >= projectile.expires_at {
            Some(ExplosionReason::Expired)
        } else {
            let motion = integrate(
                ctx.map,
                frame.position,
                frame.velocity,
                weapon.radius,
                FRICTION_ONE,
            );
            frame.position = motion.position;
            frame.velocity = motion.velocity;
            match motion.hit_tile {
                Some(tile) if frame.bounces_left == 0 => Some(ExplosionReason::HitTile { tile }),
                Some(_) => {
                    frame.bounces_left = frame.bounces_left.saturating_sub(1);
                    ship_contact(store, settings, &weapon, key.owner, frame.position, tick)
                }
                None => ship_contact(store, settings, &weapon, key.owner, frame.position, tick),
            }
        };

        if let Some(projectile) = store.projectile_mut(&key) {
            projectile.now = frame;
        }

        if let Some(reason) = reason {
            let mut explosion = ExplosionContext {
                state,
                tick,
                store: &mut *store,
                settings,
                events: &mut *ctx.events,
                history_capacity: ctx.history_capacity,
            };
            explode(&mut explosion, &key, reason);
        }
    }
}

/// The first ship (in pid order) the projectile hits directly, otherwise the
/// first enemy within its proximity fuse.
fn ship_contact(
    store: &EntityStore,
    settings: &GameSettings,
    weapon: &WeaponSettings,
    owner: Pid,
    position: PhysicsPoint,
    tick: Tick,
) -> Option<ExplosionReason> {
    let targets: Vec<(Pid, i64, i64)> = store
        .actors_at(tick)
        .filter(|actor| actor.pid != owner && actor.is_active(tick))
        .map(|actor| {
            let radius = settings.ship(actor.now.ship).map_or(0, |ship| ship.radius);
            (
                actor.pid,
                actor.now.position.distance(position),
                i64::from(radius),
            )
        })
        .collect();

    if weapon.hit_ships {
        let hit = targets
            .iter()
            .find(|(_, distance, radius)| {
                *distance <= radius.saturating_add(i64::from(weapon.radius))
            });
        if let Some((pid, _, _)) = hit {
            return Some(ExplosionReason::HitShip { pid: *pid });
        }
    }

    if weapon.proximity_radius > 0 {
        let fuse = i64::from(weapon.proximity_radius);
        if targets
            .iter()
            .any(|(_, distance, radius)| *distance <= radius.saturating_add(fuse))
        {
            return Some(ExplosionReason::Proximity);
        }
    }
    None
}
