//! Applying one operation to one state.
//!
//! Acceptance checks that only depend on the operation itself happen in the
//! environment. Everything that depends on the state (does the actor exist,
//! is it alive, is the weapon ready) is checked here; an operation failing
//! those checks is skipped in this state only.

use skirmish_entities::{
    Actor, ActorFrame, CollisionMap, EnergyChange, EntityStore, FireOrigin, GameSettings,
    SetterId, fire_weapon, spawn_point,
};
use skirmish_types::{
    MotionHint, Operation, OperationKind, PhysicsPoint, Pid, ShipId, TILE, Tick, WeaponKey,
    WeaponSlot, normalize_rotation,
};
use tracing::debug;

/// How far a weapon hint may be from the simulated position and still be
/// used as the firing origin.
pub const HINT_TOLERANCE: i32 = 2 * TILE;

/// Apply `operation` at its tick. Returns whether it took effect.
pub(crate) fn apply_operation(
    store: &mut EntityStore,
    operation: &Operation,
    settings: &GameSettings,
    map: &CollisionMap,
    history_capacity: usize,
    state: usize,
) -> bool {
    let tick = operation.tick;
    let pid = operation.pid;
    let result = match &operation.kind {
        OperationKind::ActorNew { name, seed, ship } => {
            actor_new(store, settings, map, pid, name, *seed, *ship, tick, history_capacity)
        }
        OperationKind::ActorWarp { hint } => actor_warp(store, settings, map, pid, *hint, tick),
        OperationKind::ActorMove { movement } => live_actor(store, pid, tick).map(|actor| {
            actor.now.movement = *movement;
        }),
        OperationKind::ActorWeapon { slot, hint } => {
            actor_weapon(store, settings, pid, *slot, *hint, tick, history_capacity)
        }
        OperationKind::ActorModification { ship } => {
            actor_modification(store, settings, pid, *ship, tick)
        }
        OperationKind::ActorRemove => existing_actor(store, pid, tick).map(|actor| {
            actor.removed_at = Some(tick);
        }),
    };

    match result {
        Ok(()) => true,
        Err(reason) => {
            debug!(state, tick, %pid, kind = operation.kind.name(), reason, "Operation skipped");
            false
        }
    }
}

fn existing_actor(
    store: &mut EntityStore,
    pid: Pid,
    tick: Tick,
) -> Result<&mut Actor, &'static str> {
    store
        .actor_mut(pid)
        .filter(|actor| actor.exists_at(tick))
        .ok_or("actor does not exist")
}

fn live_actor(store: &mut EntityStore, pid: Pid, tick: Tick) -> Result<&mut Actor, &'static str> {
    let actor = existing_actor(store, pid, tick)?;
    if actor.now.dead {
        return Err("actor is dead");
    }
    Ok(actor)
}

#[allow(clippy::too_many_arguments)]
fn actor_new(
    store: &mut EntityStore,
    settings: &GameSettings,
    map: &CollisionMap,
    pid: Pid,
    name: &str,
    seed: u64,
    ship: ShipId,
    tick: Tick,
    history_capacity: usize,
) -> Result<(), &'static str> {
    if store.actor(pid).is_some() {
        return Err("pid already used");
    }
    let ship_settings = settings.ship(ship).ok_or("unknown ship")?;
    let position = spawn_point(map, ship_settings, seed, tick);
    store.insert_actor(Actor::new(
        pid,
        name.to_owned(),
        seed,
        tick,
        ActorFrame::spawned(position, ship),
        ship_settings.max_energy,
        history_capacity,
    ));
    Ok(())
}

fn actor_warp(
    store: &mut EntityStore,
    settings: &GameSettings,
    map: &CollisionMap,
    pid: Pid,
    hint: Option<MotionHint>,
    tick: Tick,
) -> Result<(), &'static str> {
    let actor = live_actor(store, pid, tick)?;
    match hint {
        Some(hint) => {
            actor.now.position = hint.position;
            actor.now.velocity = hint.velocity;
            actor.now.rotation = normalize_rotation(hint.rotation);
        }
        None => {
            let ship = settings.ship(actor.now.ship).ok_or("unknown ship")?;
            actor.now.position = spawn_point(map, ship, actor.seed, tick);
            actor.now.velocity = PhysicsPoint::ZERO;
        }
    }
    Ok(())
}

fn actor_weapon(
    store: &mut EntityStore,
    settings: &GameSettings,
    pid: Pid,
    slot: WeaponSlot,
    hint: Option<MotionHint>,
    tick: Tick,
    history_capacity: usize,
) -> Result<(), &'static str> {
    let actor = live_actor(store, pid, tick)?;
    let ship = settings.ship(actor.now.ship).ok_or("unknown ship")?;
    let weapon = settings
        .slot_weapon(actor.now.ship, slot)
        .ok_or("slot not equipped")?;
    if actor.now.ready_at(slot) > tick {
        return Err("weapon cooling down");
    }
    if actor.energy.value_at(tick) < weapon.energy_cost {
        return Err("not enough energy");
    }

    let origin = match hint {
        Some(hint)
            if hint.position.distance(actor.now.position) <= i64::from(HINT_TOLERANCE) =>
        {
            FireOrigin {
                position: hint.position,
                velocity: hint.velocity,
                rotation: normalize_rotation(hint.rotation),
            }
        }
        _ => FireOrigin {
            position: actor.now.position,
            velocity: actor.now.velocity,
            rotation: actor.now.rotation,
        },
    };

    actor.energy.set(
        tick,
        SetterId::WeaponCost(slot),
        EnergyChange::Relative(weapon.energy_cost.saturating_neg()),
    );
    actor.now.set_ready_at(slot, tick.saturating_add(weapon.fire_delay));
    let offset = ship.radius;

    fire_weapon(
        store,
        pid,
        &WeaponKey::slot(tick, slot),
        weapon,
        origin,
        offset,
        tick,
        history_capacity,
    );
    Ok(())
}

fn actor_modification(
    store: &mut EntityStore,
    settings: &GameSettings,
    pid: Pid,
    ship: ShipId,
    tick: Tick,
) -> Result<(), &'static str> {
    let ship_settings = settings.ship(ship).ok_or("unknown ship")?;
    let actor = existing_actor(store, pid, tick)?;
    actor.now.ship = ship;
    actor.energy.set(
        tick,
        SetterId::Spawn,
        EnergyChange::Absolute(ship_settings.max_energy),
    );
    Ok(())
}
