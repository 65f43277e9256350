//! Weapon discharge and spawn placement.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skirmish_types::{
    PhysicsPoint, Pid, ProjectileKey, ROTATION_POINTS, Tick, WeaponKey, direction,
};

use crate::config::{ShipSettings, WeaponSettings};
use crate::history::RollingHistory;
use crate::map::CollisionMap;
use crate::projectile::{Projectile, ProjectileFrame};
use crate::store::EntityStore;

/// Attempts at finding an open spawn point before falling back to the
/// spawn center.
const SPAWN_ATTEMPTS: usize = 32;

/// Where a discharge originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireOrigin {
    /// Position of the shooter or exploding projectile.
    pub position: PhysicsPoint,
    /// Velocity inherited by projectiles that inherit velocity.
    pub velocity: PhysicsPoint,
    /// Rotation the discharge is centered on.
    pub rotation: i32,
}

/// Rotation of projectile `index` out of `count`, spread symmetrically
/// around `rotation` and normalized into `0..ROTATION_POINTS`.
///
/// Widened to `i64`: `offset` fits in 18 bits and `spread` in 32.
#[allow(clippy::arithmetic_side_effects)]
pub fn spread_rotation(rotation: i32, spread: i32, index: u16, count: u16) -> i32 {
    let offset = 2 * i64::from(index) - (i64::from(count) - 1);
    let rotation = i64::from(rotation) + offset * i64::from(spread) / 2;
    i32::try_from(rotation.rem_euclid(i64::from(ROTATION_POINTS))).unwrap_or(0)
}

/// Create every projectile of one discharge and return their keys.
///
/// Projectiles start `offset` units from the origin along their own
/// rotation, so a ship does not immediately collide with its own fire.
#[allow(clippy::too_many_arguments)]
pub fn fire_weapon(
    store: &mut EntityStore,
    owner: Pid,
    weapon_key: &WeaponKey,
    weapon: &Arc<WeaponSettings>,
    origin: FireOrigin,
    offset: i32,
    tick: Tick,
    history_capacity: usize,
) -> Vec<ProjectileKey> {
    let inherited = if weapon.inherit_velocity {
        origin.velocity
    } else {
        PhysicsPoint::ZERO
    };

    (0..weapon.projectiles)
        .map(|index| {
            let rotation =
                spread_rotation(origin.rotation, weapon.spread, index, weapon.projectiles);
            let key = ProjectileKey::new(owner, weapon_key.clone(), index);
            store.insert_projectile(Projectile {
                key: key.clone(),
                weapon: Arc::clone(weapon),
                created_at: tick,
                expires_at: tick.saturating_add(weapon.lifetime),
                removed_at: None,
                now: ProjectileFrame {
                    position: origin.position.saturating_add(direction(rotation, offset)),
                    velocity: inherited.saturating_add(direction(rotation, weapon.speed)),
                    rotation,
                    bounces_left: weapon.bounces,
                },
                frames: RollingHistory::new(history_capacity),
            });
            key
        })
        .collect()
}

/// Deterministic spawn point for an actor seeded with `seed` spawning at
/// `tick`.
pub fn spawn_point(map: &CollisionMap, ship: &ShipSettings, seed: u64, tick: Tick) -> PhysicsPoint {
    let mix = u64::from_ne_bytes(tick.to_ne_bytes()).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut rng = StdRng::seed_from_u64(seed ^ mix);
    let radius = ship.spawn_radius.max(0);
    let radius_sq = i64::from(radius).saturating_mul(i64::from(radius));

    for _ in 0..SPAWN_ATTEMPTS {
        let dx = rng.random_range(radius.saturating_neg()..=radius);
        let dy = rng.random_range(radius.saturating_neg()..=radius);
        let offset = PhysicsPoint::new(dx, dy);
        if offset.length_sq() > radius_sq {
            continue;
        }
        let candidate = ship.spawn_center.saturating_add(offset);
        if is_open(map, candidate, ship.radius) {
            return candidate;
        }
    }
    ship.spawn_center
}

fn is_open(map: &CollisionMap, center: PhysicsPoint, radius: i32) -> bool {
    [
        PhysicsPoint::ZERO,
        PhysicsPoint::new(radius, 0),
        PhysicsPoint::new(radius.saturating_neg(), 0),
        PhysicsPoint::new(0, radius),
        PhysicsPoint::new(0, radius.saturating_neg()),
    ]
    .into_iter()
    .all(|probe| !map.is_solid_at(center.saturating_add(probe)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects, clippy::indexing_slicing)]
mod tests {
    use skirmish_types::{PIXEL, TILE, WeaponSlot};

    use super::*;

    #[test]
    fn spread_is_symmetric() {
        assert_eq!(spread_rotation(1000, 100, 0, 1), 1000);
        assert_eq!(spread_rotation(1000, 100, 0, 3), 900);
        assert_eq!(spread_rotation(1000, 100, 1, 3), 1000);
        assert_eq!(spread_rotation(1000, 100, 2, 3), 1100);
        assert_eq!(spread_rotation(1000, 100, 0, 2), 950);
        assert_eq!(spread_rotation(1000, 100, 1, 2), 1050);
        assert_eq!(spread_rotation(0, 100, 0, 3), ROTATION_POINTS - 100);
        assert_eq!(spread_rotation(0, ROTATION_POINTS, u16::MAX, u16::MAX), 0);
    }

    #[test]
    fn expiry_saturates_at_the_end_of_time() {
        let mut store = EntityStore::new();
        let weapon = Arc::new(WeaponSettings {
            lifetime: Tick::MAX,
            ..WeaponSettings::named("forever")
        });
        let origin = FireOrigin {
            position: PhysicsPoint::new(10 * TILE, 10 * TILE),
            velocity: PhysicsPoint::ZERO,
            rotation: 0,
        };
        let key = WeaponKey::slot(20, WeaponSlot::Gun);
        let keys = fire_weapon(&mut store, Pid(1), &key, &weapon, origin, 0, 20, 16);
        assert_eq!(store.projectile(&keys[0]).unwrap().expires_at, Tick::MAX);
    }

    #[test]
    fn fire_creates_coupled_projectiles() {
        let mut store = EntityStore::new();
        let weapon = Arc::new(WeaponSettings {
            projectiles: 3,
            spread: ROTATION_POINTS / 8,
            inherit_velocity: false,
            ..WeaponSettings::named("burst")
        });
        let key = WeaponKey::slot(20, WeaponSlot::Burst);
        let origin = FireOrigin {
            position: PhysicsPoint::new(10 * TILE, 10 * TILE),
            velocity: PhysicsPoint::new(500, 0),
            rotation: 0,
        };
        let keys = fire_weapon(&mut store, Pid(4), &key, &weapon, origin, 0, 20, 16);

        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| k.is_coupled_with(&keys[0])));
        assert_eq!(store.siblings(&keys[0]).count(), 3);
        let middle = store.projectile(&keys[1]).unwrap();
        assert_eq!(middle.now.velocity, PhysicsPoint::new(0, -weapon.speed));
        assert_eq!(middle.expires_at, 20 + weapon.lifetime);
    }

    #[test]
    fn spawn_point_is_deterministic_and_open() {
        let map = CollisionMap::new(64, 64);
        let ship = ShipSettings::default();
        let a = spawn_point(&map, &ship, 42, 7);
        let b = spawn_point(&map, &ship, 42, 7);
        assert_eq!(a, b);
        assert!(a.distance(ship.spawn_center) <= i64::from(ship.spawn_radius));
        assert!(!map.is_solid_at(a));
    }

    #[test]
    fn spawn_point_falls_back_to_center() {
        let map = CollisionMap::new(1, 1);
        let ship = ShipSettings {
            spawn_center: PhysicsPoint::new(8 * PIXEL, 8 * PIXEL),
            spawn_radius: 100 * TILE,
            radius: TILE,
            ..ShipSettings::default()
        };
        assert_eq!(spawn_point(&map, &ship, 1, 1), ship.spawn_center);
    }
}
