//! Integration tests for the trailing-state environment.
//!
//! Every test drives an [`Environment`] only through its public operation
//! and tick API, the same way the network layer would.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use skirmish_core::{Environment, EnvironmentConfig, OperationError};
use skirmish_entities::{
    CollisionMap, ConfigDocument, EntityStore, GameConfig, MAX_DURATION, TileRect,
};
use skirmish_events::{Event, ExplosionOccurrence, ExplosionReason};
use skirmish_types::{
    ActorDiedKey, EventKey, ExplosionKey, MotionHint, Movement, PIXEL, PhysicsPoint, Pid,
    ProjectileKey, ShipId, Tick, TileCoord, WeaponKey, WeaponSlot,
};

const SHOOTER: Pid = Pid(1);
const VICTIM: Pid = Pid(2);

fn game(documents: &[&str]) -> GameConfig {
    let mut game = GameConfig::default();
    for yaml in documents {
        game.load(ConfigDocument::from_yaml(yaml).unwrap()).unwrap();
    }
    game
}

fn environment(game: GameConfig) -> Environment {
    Environment::new(
        EnvironmentConfig::default(),
        CollisionMap::new(64, 64),
        game,
        0,
    )
}

fn explosion_in_newest(env: &Environment, projectile: ProjectileKey) -> ExplosionOccurrence {
    match env.event(&EventKey::ProjectileExplosion(ExplosionKey { projectile })) {
        Some(Event::ProjectileExplosion(explosion)) => explosion.history(0).cloned(),
        _ => None,
    }
    .unwrap()
}

fn tick_until(env: &mut Environment, tick: Tick) {
    while env.tick_now() < tick {
        let summary = env.tick();
        assert!(summary.desyncs.is_empty(), "desync at {}", summary.tick);
    }
}

fn hint(x: i32, y: i32) -> Option<MotionHint> {
    Some(MotionHint {
        position: PhysicsPoint::new(x * PIXEL, y * PIXEL),
        velocity: PhysicsPoint::ZERO,
        rotation: 0,
    })
}

/// Two ships at rest, the victim 30 pixels straight above the shooter.
fn duel(env: &mut Environment) {
    tick_until(env, 10);
    env.actor_new(10, SHOOTER, "shooter", 7, ShipId(0)).unwrap();
    env.actor_new(10, VICTIM, "victim", 11, ShipId(0)).unwrap();
    tick_until(env, 20);
    env.actor_warp(20, SHOOTER, hint(512, 600)).unwrap();
    env.actor_warp(20, VICTIM, hint(512, 570)).unwrap();
}

/// A short scripted session with movement and weapon fire.
fn scripted_session(env: &mut Environment, late: bool) {
    duel(env);
    let moves: [(Tick, u8); 4] = [(25, 0b0001), (26, 0b1001), (27, 0b0100), (40, 0b0010)];
    let fire_at = 35;
    if !late {
        for (tick, code) in moves {
            tick_until(env, tick);
            env.actor_move(tick, VICTIM, Movement::from_code(code).unwrap())
                .unwrap();
            if tick == 27 {
                tick_until(env, fire_at);
                env.actor_weapon(fire_at, SHOOTER, WeaponSlot::Bomb, None)
                    .unwrap();
            }
        }
    } else {
        tick_until(env, 60);
        env.actor_weapon(fire_at, SHOOTER, WeaponSlot::Bomb, None)
            .unwrap();
        for (tick, code) in moves.into_iter().rev() {
            env.actor_move(tick, VICTIM, Movement::from_code(code).unwrap())
                .unwrap();
        }
    }
    tick_until(env, 60);
}

#[test]
fn identical_inputs_produce_identical_states() {
    let mut a = environment(GameConfig::default());
    let mut b = environment(GameConfig::default());
    scripted_session(&mut a, false);
    scripted_session(&mut b, false);

    for state in 0..a.state_count() {
        assert_eq!(
            a.state(state).unwrap().entities(),
            b.state(state).unwrap().entities()
        );
    }
    let a_events: Vec<&Event> = a.events().collect();
    let b_events: Vec<&Event> = b.events().collect();
    assert!(!a_events.is_empty());
    assert_eq!(a_events, b_events);
}

#[test]
fn late_operations_converge_with_timely_ones() {
    let mut timely = environment(GameConfig::default());
    let mut late = environment(GameConfig::default());
    scripted_session(&mut timely, false);
    scripted_session(&mut late, true);

    assert_eq!(timely.tick_now(), late.tick_now());
    for state in 0..timely.state_count() {
        assert_eq!(
            timely.state(state).unwrap().entities(),
            late.state(state).unwrap().entities()
        );
    }
    assert!(late.take_desyncs().is_empty());
}

#[test]
fn replay_leaves_earlier_ticks_untouched() {
    let mut env = environment(GameConfig::default());
    duel(&mut env);
    tick_until(&mut env, 60);

    let before: Vec<_> = (20..40)
        .map(|tick| env.actor(0, VICTIM).unwrap().frame_at(tick).cloned())
        .collect();

    env.actor_move(40, VICTIM, Movement::from_flags(true, false, false, false))
        .unwrap();

    let victim = env.actor(0, VICTIM).unwrap();
    let after: Vec<_> = (20..40).map(|tick| victim.frame_at(tick).cloned()).collect();
    assert_eq!(before, after);
    assert_eq!(env.tick_now(), 60);
    assert_ne!(victim.position_at(41), victim.position_at(39));
}

#[test]
fn older_states_match_newer_history() {
    let mut env = environment(GameConfig::default());
    scripted_session(&mut env, true);
    tick_until(&mut env, 100);

    let oldest = env.state_count() - 1;
    let tick = env.state_tick(oldest).unwrap();
    for pid in [SHOOTER, VICTIM] {
        let newest = env.actor(0, pid).unwrap();
        let trailing = env.actor(oldest, pid).unwrap();
        assert_eq!(newest.frame_at(tick), trailing.frame_at(tick));
        assert_eq!(newest.energy_at(tick), trailing.energy_at(tick));
    }
}

#[test]
fn window_boundary_is_inclusive() {
    let mut env = environment(GameConfig::default());
    tick_until(&mut env, 100);
    let oldest = env.oldest_accepted_tick();
    assert_eq!(oldest, 100 - env.highest_delay());

    assert!(env.actor_move(oldest, SHOOTER, Movement::NONE).is_ok());
    assert!(matches!(
        env.actor_move(oldest - 1, SHOOTER, Movement::NONE),
        Err(OperationError::TooOld { .. })
    ));
    assert!(env.actor_move(100, SHOOTER, Movement::NONE).is_ok());
    assert!(matches!(
        env.actor_move(101, SHOOTER, Movement::NONE),
        Err(OperationError::InFuture { tick: 101, newest: 100 })
    ));
}

#[test]
fn rejected_operations_never_reach_todo_lists() {
    let mut env = environment(GameConfig::default());
    tick_until(&mut env, 10);
    env.actor_new(10, SHOOTER, "shooter", 1, ShipId(0)).unwrap();

    assert!(matches!(
        env.actor_new(10, VICTIM, "victim", 1, ShipId(9)),
        Err(OperationError::UnknownShip { .. })
    ));
    assert!(matches!(
        env.actor_new(10, SHOOTER, "again", 1, ShipId(0)),
        Err(OperationError::DuplicateActor { pid: SHOOTER })
    ));
    for state in 0..env.state_count() {
        assert_eq!(env.todo_list_iter(state).count(), 1);
    }
}

#[test]
fn direct_hit_kills_in_every_state() {
    let mut env = environment(game(&["
name: deadly
weapons:
  bullet:
    damage: 1024
"]));
    duel(&mut env);
    tick_until(&mut env, 49);
    env.actor_weapon(49, SHOOTER, WeaponSlot::Gun, None).unwrap();

    tick_until(&mut env, 100);
    let victim = env.actor(0, VICTIM).unwrap();
    assert_eq!(victim.energy_at(50), -24);
    assert_eq!(victim.dead_at(49), Some(false));
    assert_eq!(victim.dead_at(50), Some(true));

    let key = EventKey::ActorDied(ActorDiedKey {
        cause: ExplosionKey {
            projectile: ProjectileKey::new(SHOOTER, WeaponKey::slot(49, WeaponSlot::Gun), 0),
        },
        died: VICTIM,
    });
    let died = match env.event(&key) {
        Some(Event::ActorDied(died)) => Some(died),
        _ => None,
    }
    .unwrap();
    let newest = died.history(0).cloned().unwrap();
    assert_eq!(newest.tick, 50);
    assert_eq!(newest.killer, SHOOTER);
    assert_eq!(died.history(1), Some(&newest));

    // The oldest state reaches tick 50 last.
    let target = 50 + env.highest_delay();
    tick_until(&mut env, target);
    let died = match env.event(&key) {
        Some(Event::ActorDied(died)) => Some(died),
        _ => None,
    }
    .unwrap();
    assert_eq!(died.history(2), Some(&newest));
    assert!(env.take_desyncs().is_empty());
}

#[test]
fn late_fire_replays_the_kill() {
    let mut env = environment(game(&["
name: deadly
weapons:
  bullet:
    damage: 1024
"]));
    duel(&mut env);
    tick_until(&mut env, 90);
    assert_eq!(env.actor(1, VICTIM).unwrap().dead_at(50), Some(false));

    env.actor_weapon(49, SHOOTER, WeaponSlot::Gun, None).unwrap();
    assert_eq!(env.actor(0, VICTIM).unwrap().dead_at(50), Some(true));
    assert_eq!(env.actor(1, VICTIM).unwrap().dead_at(50), Some(true));
    assert!(env.take_desyncs().is_empty());
}

#[test]
fn later_duplicate_movement_wins() {
    let mut env = environment(GameConfig::default());
    let mut reference = environment(GameConfig::default());
    for env in [&mut env, &mut reference] {
        tick_until(env, 10);
        env.actor_new(10, SHOOTER, "pilot", 3, ShipId(0)).unwrap();
        tick_until(env, 120);
    }

    let up = Movement::from_flags(true, false, false, false);
    let right = Movement::from_flags(false, false, false, true);
    for tick in 100..120 {
        env.actor_move(tick, SHOOTER, up).unwrap();
        let movement = if tick == 105 { right } else { up };
        reference.actor_move(tick, SHOOTER, movement).unwrap();
    }
    env.actor_move(105, SHOOTER, right).unwrap();

    let pilot = env.actor(0, SHOOTER).unwrap();
    assert_eq!(pilot.frame_at(104).unwrap().movement, up);
    assert_eq!(pilot.frame_at(105).unwrap().movement, right);
    assert_eq!(
        env.state(0).unwrap().entities(),
        reference.state(0).unwrap().entities()
    );
}

#[test]
fn expired_projectile_fires_coupled_chain() {
    let mut env = environment(game(&["
name: cluster
weapons:
  shrapnel:
    projectiles: 5
    spread: 4096
    lifetime: 20
    remove_coupled: true
  bomb:
    lifetime: 10
    expiration_chain: shrapnel
"]));
    tick_until(&mut env, 10);
    env.actor_new(10, SHOOTER, "bomber", 5, ShipId(0)).unwrap();
    tick_until(&mut env, 20);
    env.actor_warp(20, SHOOTER, hint(512, 700)).unwrap();
    env.actor_weapon(20, SHOOTER, WeaponSlot::Bomb, None).unwrap();
    tick_until(&mut env, 31);

    let bomb = ProjectileKey::new(SHOOTER, WeaponKey::slot(20, WeaponSlot::Bomb), 0);
    let children: Vec<ProjectileKey> = env.projectile_iter(0).map(|p| p.key.clone()).collect();
    assert_eq!(children.len(), 5);
    for child in &children {
        assert_eq!(child.chain_depth(), 1);
        assert_eq!(child.origin_tick(), 20);
        assert!(child.is_coupled_with(&children[0]));
    }

    let explosion = match env.event(&EventKey::ProjectileExplosion(ExplosionKey {
        projectile: bomb,
    })) {
        Some(Event::ProjectileExplosion(explosion)) => Some(explosion),
        _ => None,
    }
    .unwrap();
    let occurrence = explosion.history(0).unwrap();
    assert_eq!(occurrence.tick, 30);
    assert_eq!(occurrence.chain_fired, children);

    // The first child to expire takes its siblings with it.
    tick_until(&mut env, 50);
    assert_eq!(env.projectile_iter(0).count(), 0);
    let first = match env.event(&EventKey::ProjectileExplosion(ExplosionKey {
        projectile: children[0].clone(),
    })) {
        Some(Event::ProjectileExplosion(explosion)) => Some(explosion),
        _ => None,
    }
    .unwrap();
    assert_eq!(first.history(0).unwrap().removed_coupled.len(), 4);
    assert!(
        env.event(&EventKey::ProjectileExplosion(ExplosionKey {
            projectile: children[1].clone(),
        }))
        .is_none()
    );
}

#[test]
fn timewarp_reproduces_newer_states() {
    let mut env = environment(GameConfig::default());
    scripted_session(&mut env, false);
    let newest = env.state(0).unwrap().entities().clone();
    let tick = env.tick_now();

    env.timewarp(2).unwrap();
    assert_eq!(env.tick_now(), tick);
    assert_eq!(env.state(0).unwrap().entities(), &newest);
    assert!(matches!(
        env.timewarp(7),
        Err(OperationError::InvalidState { state: 7 })
    ));
}

#[test]
fn forks_evolve_independently() {
    let mut env = environment(GameConfig::default());
    duel(&mut env);
    tick_until(&mut env, 30);

    let mut fork = env.fork();
    assert!(env.find_in_other_env(&fork, 0, VICTIM).is_some());

    fork.actor_remove(30, VICTIM).unwrap();
    fork.tick();
    env.tick();
    assert_eq!(fork.actor_iter(0).count(), 1);
    assert_eq!(env.actor_iter(0).count(), 2);
    assert_eq!(env.todo_list_iter(0).count() + 1, fork.todo_list_iter(0).count());
}

#[test]
fn mid_game_config_applies_from_its_tick() {
    let mut env = environment(GameConfig::default());
    tick_until(&mut env, 10);
    env.actor_new(10, SHOOTER, "pilot", 3, ShipId(0)).unwrap();
    tick_until(&mut env, 40);

    let doc = ConfigDocument::from_yaml("
name: heavy
from_tick: 30
ships:
  0:
    max_energy: 500
")
    .unwrap();
    env.load_config(doc).unwrap();
    assert_eq!(env.game().settings_at(29).ship(ShipId(0)).unwrap().max_energy, 1000);
    assert_eq!(env.game().settings_at(30).ship(ShipId(0)).unwrap().max_energy, 500);

    let too_old = ConfigDocument {
        from_tick: env.oldest_accepted_tick() - 1,
        ..ConfigDocument::default()
    };
    assert!(matches!(
        env.load_config(too_old),
        Err(OperationError::TooOld { .. })
    ));
}

#[test]
fn modification_switches_ship_and_resets_energy() {
    let mut env = environment(game(&["
name: scout
ships:
  1:
    max_energy: 300
"]));
    tick_until(&mut env, 10);
    env.actor_new(10, SHOOTER, "pilot", 3, ShipId(0)).unwrap();
    tick_until(&mut env, 20);
    env.actor_modification(20, SHOOTER, ShipId(1)).unwrap();
    assert!(matches!(
        env.actor_modification(20, SHOOTER, ShipId(9)),
        Err(OperationError::UnknownShip { .. })
    ));
    tick_until(&mut env, 30);

    let pilot = env.actor(0, SHOOTER).unwrap();
    assert_eq!(pilot.frame_at(19).unwrap().ship, ShipId(0));
    assert_eq!(pilot.frame_at(20).unwrap().ship, ShipId(1));
    assert_eq!(pilot.energy_at(19), 1000);
    assert_eq!(pilot.energy_at(20), 300);
    assert_eq!(pilot.energy_at(30), 300);

    let target = 20 + env.highest_delay() + 1;

    tick_until(&mut env, target);
    let oldest = env.actor(env.state_count() - 1, SHOOTER).unwrap();
    assert_eq!(oldest.frame_at(20).unwrap().ship, ShipId(1));
    assert_eq!(oldest.energy_at(20), 300);
}

#[test]
fn proximity_fuse_detonates_near_enemy() {
    let mut env = environment(game(&["
name: fused
weapons:
  bomb:
    hit_ships: false
"]));
    duel(&mut env);
    tick_until(&mut env, 21);
    env.actor_warp(21, VICTIM, hint(512, 400)).unwrap();
    tick_until(&mut env, 30);
    env.actor_weapon(30, SHOOTER, WeaponSlot::Bomb, None).unwrap();
    tick_until(&mut env, 61);

    // 586px start, 5px per tick: 36px from the victim after 30 ticks.
    let bomb = ProjectileKey::new(SHOOTER, WeaponKey::slot(30, WeaponSlot::Bomb), 0);
    let occurrence = explosion_in_newest(&env, bomb);
    assert_eq!(occurrence.tick, 60);
    assert_eq!(occurrence.reason, ExplosionReason::Proximity);
    assert_eq!(occurrence.position, PhysicsPoint::new(512 * PIXEL, 436 * PIXEL));
    assert!(occurrence.killed.is_empty());

    let victim = env.actor(0, VICTIM).unwrap();
    assert_eq!(victim.energy_at(59), 1000);
    assert_eq!(victim.energy_at(60), 1000 - 700 * 28 / 64);
    assert_eq!(victim.dead_at(60), Some(false));
}

#[test]
fn wall_hit_explodes_projectile() {
    let wall = TileRect {
        x: 0,
        y: 30,
        width: 64,
        height: 1,
    };
    let mut env = Environment::new(
        EnvironmentConfig::default(),
        CollisionMap::with_rects(64, 64, &[wall]),
        GameConfig::default(),
        0,
    );
    tick_until(&mut env, 10);
    env.actor_new(10, SHOOTER, "shooter", 7, ShipId(0)).unwrap();
    tick_until(&mut env, 20);
    env.actor_warp(20, SHOOTER, hint(512, 600)).unwrap();
    tick_until(&mut env, 30);
    env.actor_weapon(30, SHOOTER, WeaponSlot::Gun, None).unwrap();
    tick_until(&mut env, 50);

    let bullet = ProjectileKey::new(SHOOTER, WeaponKey::slot(30, WeaponSlot::Gun), 0);
    let occurrence = explosion_in_newest(&env, bullet);
    assert_eq!(occurrence.tick, 42);
    assert_eq!(
        occurrence.reason,
        ExplosionReason::HitTile {
            tile: TileCoord::new(32, 30)
        }
    );
    // Blocked before moving: the wall's bottom edge is at 496px.
    assert_eq!(occurrence.position, PhysicsPoint::new(512 * PIXEL, 498 * PIXEL));
    assert_eq!(env.projectile_iter(0).count(), 0);
}

#[test]
fn dead_actor_respawns_after_delay() {
    let mut env = environment(game(&["
name: quick
weapons:
  bullet:
    damage: 1024
ships:
  0:
    respawn_delay: 10
"]));
    duel(&mut env);
    tick_until(&mut env, 49);
    env.actor_weapon(49, SHOOTER, WeaponSlot::Gun, None).unwrap();
    tick_until(&mut env, 70);

    let victim = env.actor(0, VICTIM).unwrap();
    assert_eq!(victim.dead_at(50), Some(true));
    assert_eq!(victim.frame_at(50).unwrap().respawn_at, Some(60));
    assert_eq!(victim.dead_at(59), Some(true));
    assert_eq!(victim.dead_at(60), Some(false));
    assert_eq!(victim.frame_at(60).unwrap().respawn_at, None);
    assert_eq!(victim.energy_at(60), 1000);

    let ship = env.game().settings_at(60).ship(ShipId(0)).cloned().unwrap();
    let spawned = victim.position_at(60).unwrap();
    assert!(spawned.distance(ship.spawn_center) <= i64::from(ship.spawn_radius));

    let target = 60 + env.highest_delay() + 1;

    tick_until(&mut env, target);
    let oldest = env.actor(env.state_count() - 1, VICTIM).unwrap();
    assert_eq!(oldest.dead_at(60), Some(false));
    assert_eq!(oldest.position_at(60), Some(spawned));
}

#[test]
fn entities_resolve_across_states() {
    let mut env = environment(GameConfig::default());
    tick_until(&mut env, 10);
    env.actor_new(10, SHOOTER, "shooter", 7, ShipId(0)).unwrap();
    tick_until(&mut env, 15);
    env.actor_warp(15, SHOOTER, hint(512, 900)).unwrap();
    tick_until(&mut env, 20);
    env.actor_weapon(20, SHOOTER, WeaponSlot::Gun, None).unwrap();
    let target = 20 + env.highest_delay() + 1;
    tick_until(&mut env, target);

    let oldest = env.state(env.state_count() - 1).unwrap();
    let tick = oldest.tick_now();
    assert_eq!(tick, 21);

    let bullet = env.projectile_iter(0).next().unwrap();
    let trailing = bullet.find_in_other_state(oldest.entities()).unwrap();
    assert_eq!(trailing.key, bullet.key);
    assert_eq!(trailing.position_at(tick), bullet.position_at(tick));
    assert!(bullet.find_in_other_state(&EntityStore::new()).is_none());

    let shooter = env.actor(0, SHOOTER).unwrap();
    let trailing = shooter.find_in_other_state(oldest.entities()).unwrap();
    assert_eq!(trailing.frame_at(tick), shooter.frame_at(tick));
}

#[test]
fn longest_durations_saturate_at_the_end_of_time() {
    let doc = format!(
        "
name: endless
weapons:
  bullet:
    lifetime: {MAX_DURATION}
    fire_delay: {MAX_DURATION}
ships:
  0:
    respawn_delay: {MAX_DURATION}
"
    );
    let start = Tick::MAX - 20;
    let mut env = Environment::new(
        EnvironmentConfig::default(),
        CollisionMap::new(64, 64),
        game(&[&doc]),
        start,
    );
    env.actor_new(start, SHOOTER, "shooter", 7, ShipId(0)).unwrap();
    tick_until(&mut env, start + 2);
    env.actor_weapon(start + 2, SHOOTER, WeaponSlot::Gun, None).unwrap();
    tick_until(&mut env, start + 5);
    env.actor_weapon(start + 5, SHOOTER, WeaponSlot::Gun, None).unwrap();
    tick_until(&mut env, start + 10);

    let shooter = env.actor(0, SHOOTER).unwrap();
    assert_eq!(shooter.now.ready_at(WeaponSlot::Gun), Tick::MAX);
    let bullets: Vec<_> = env.projectile_iter(0).collect();
    assert_eq!(bullets.len(), 1);
    assert_eq!(bullets[0].expires_at, Tick::MAX);
}
