//! Fixed-point movement with tile bouncing.
//!
//! Movement is split into sub-steps no longer than half a tile on either
//! axis, and each axis is resolved separately. A blocked axis reflects its
//! velocity component, scaled by the bounce friction, and does not move for
//! the rest of the tick.

use skirmish_types::{PhysicsPoint, TILE, TileCoord};

use crate::map::CollisionMap;

/// Bounce friction that keeps the full velocity.
pub const FRICTION_ONE: i32 = 1024;

/// Outcome of moving a body for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    /// Position after the tick.
    pub position: PhysicsPoint,
    /// Velocity after the tick, reflected on bounces.
    pub velocity: PhysicsPoint,
    /// The first solid tile hit, if any.
    pub hit_tile: Option<TileCoord>,
}

/// Move a body of `radius` along `velocity` for one tick.
pub fn integrate(
    map: &CollisionMap,
    position: PhysicsPoint,
    velocity: PhysicsPoint,
    radius: i32,
    bounce_friction: i32,
) -> Motion {
    let longest = velocity.x.unsigned_abs().max(velocity.y.unsigned_abs());
    let step_limit = (TILE / 2).unsigned_abs();
    let steps = i64::from(longest.div_euclid(step_limit).saturating_add(1));

    let mut position = position;
    let mut out_velocity = velocity;
    let mut hit_tile = None;
    let mut x_blocked = false;
    let mut y_blocked = false;

    for step in 0..steps {
        if !x_blocked {
            let dx = partial(velocity.x, step, steps);
            if dx != 0 {
                let probe = PhysicsPoint::new(
                    position
                        .x
                        .saturating_add(dx)
                        .saturating_add(dx.signum().saturating_mul(radius)),
                    position.y,
                );
                if map.is_solid_at(probe) {
                    hit_tile.get_or_insert(probe.tile());
                    out_velocity.x = reflect(velocity.x, bounce_friction);
                    x_blocked = true;
                } else {
                    position.x = position.x.saturating_add(dx);
                }
            }
        }

        if !y_blocked {
            let dy = partial(velocity.y, step, steps);
            if dy != 0 {
                let probe = PhysicsPoint::new(
                    position.x,
                    position
                        .y
                        .saturating_add(dy)
                        .saturating_add(dy.signum().saturating_mul(radius)),
                );
                if map.is_solid_at(probe) {
                    hit_tile.get_or_insert(probe.tile());
                    out_velocity.y = reflect(velocity.y, bounce_friction);
                    y_blocked = true;
                } else {
                    position.y = position.y.saturating_add(dy);
                }
            }
        }
    }

    if hit_tile.is_some() {
        // Friction scales the whole velocity, not only the reflected axis.
        if !x_blocked {
            out_velocity.x = scale(out_velocity.x, bounce_friction);
        }
        if !y_blocked {
            out_velocity.y = scale(out_velocity.y, bounce_friction);
        }
    }

    Motion {
        position,
        velocity: out_velocity,
        hit_tile,
    }
}

/// The exact share of `total` moved during `step` of `steps`.
///
/// `0 <= step < steps` and `steps` is at most `i32::MAX / (TILE / 2) + 1`, so
/// neither product leaves `i64`.
#[allow(clippy::arithmetic_side_effects)]
fn partial(total: i32, step: i64, steps: i64) -> i32 {
    let total = i64::from(total);
    let delta = total * (step + 1) / steps - total * step / steps;
    i32::try_from(delta).unwrap_or(0)
}

fn reflect(component: i32, friction: i32) -> i32 {
    scale(component, friction).saturating_neg()
}

fn scale(component: i32, friction: i32) -> i32 {
    let scaled = i64::from(component).saturating_mul(i64::from(friction)) / 1024;
    i32::try_from(scaled).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use skirmish_types::PIXEL;

    use super::*;

    fn arena() -> CollisionMap {
        CollisionMap::new(10, 10)
    }

    #[test]
    fn free_movement_adds_velocity() {
        let m = integrate(
            &arena(),
            PhysicsPoint::new(5 * TILE, 5 * TILE),
            PhysicsPoint::new(300, -700),
            PIXEL,
            FRICTION_ONE,
        );
        assert_eq!(m.position, PhysicsPoint::new(5 * TILE + 300, 5 * TILE - 700));
        assert_eq!(m.velocity, PhysicsPoint::new(300, -700));
        assert_eq!(m.hit_tile, None);
    }

    #[test]
    fn long_moves_are_split_exactly() {
        let start = PhysicsPoint::new(2 * TILE, 2 * TILE);
        let velocity = PhysicsPoint::new(TILE + 7, 3);
        let m = integrate(&arena(), start, velocity, 0, FRICTION_ONE);
        assert_eq!(m.position, PhysicsPoint::new(3 * TILE + 7, 2 * TILE + 3));
    }

    #[test]
    fn wall_reflects_velocity_with_friction() {
        // Right edge of the arena is at x = 10 tiles.
        let start = PhysicsPoint::new(10 * TILE - 2 * PIXEL, 5 * TILE);
        let m = integrate(&arena(), start, PhysicsPoint::new(4 * PIXEL, 100), PIXEL, 512);
        assert_eq!(m.hit_tile, Some(TileCoord::new(10, 5)));
        assert_eq!(m.position.x, start.x);
        assert_eq!(m.velocity.x, -2 * PIXEL);
        assert_eq!(m.velocity.y, 50);
    }

    #[test]
    fn thin_walls_do_not_tunnel() {
        let mut map = arena();
        map.set_solid(TileCoord::new(5, 2), true);
        let start = PhysicsPoint::new(4 * TILE + TILE / 2, 2 * TILE + TILE / 2);
        let m = integrate(&map, start, PhysicsPoint::new(TILE + TILE / 2, 0), 0, FRICTION_ONE);
        assert_eq!(m.hit_tile, Some(TileCoord::new(5, 2)));
        assert!(m.position.x < 5 * TILE);
    }
}
