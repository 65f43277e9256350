//! Fixed-point geometry used by the physics step.
//!
//! Positions and velocities are integers in sub-pixel units so that every
//! participant computes bit-identical results. One pixel is [`PIXEL`] units
//! and one map tile is [`TILE_PIXELS`] pixels.

use core::ops::{Add, AddAssign, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Sub-pixel units per pixel.
pub const PIXEL: i32 = 1024;

/// Pixels per map tile.
pub const TILE_PIXELS: i32 = 16;

/// Sub-pixel units per map tile.
pub const TILE: i32 = PIXEL * TILE_PIXELS;

/// Number of distinct rotation values. Rotation 0 faces up (negative y)
/// and increases clockwise.
pub const ROTATION_POINTS: i32 = 1 << 16;

/// A 2D point or vector in sub-pixel units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PhysicsPoint {
    /// Horizontal component.
    pub x: i32,
    /// Vertical component (positive is down).
    pub y: i32,
}

impl PhysicsPoint {
    /// The origin / zero vector.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a point from its components.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise sum, clamped at the `i32` bounds.
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self {
            x: self.x.saturating_add(rhs.x),
            y: self.y.saturating_add(rhs.y),
        }
    }

    /// Component-wise difference, clamped at the `i32` bounds.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self {
            x: self.x.saturating_sub(rhs.x),
            y: self.y.saturating_sub(rhs.y),
        }
    }

    /// Squared euclidean length, widened so it never overflows.
    pub fn length_sq(self) -> i64 {
        let x = i64::from(self.x);
        let y = i64::from(self.y);
        x.saturating_mul(x).saturating_add(y.saturating_mul(y))
    }

    /// Euclidean length, rounded down.
    pub fn length(self) -> i64 {
        // length_sq is never negative.
        i64::try_from(self.length_sq().unsigned_abs().isqrt()).unwrap_or(i64::MAX)
    }

    /// Squared distance between two points.
    pub fn distance_sq(self, other: Self) -> i64 {
        let dx = i64::from(self.x).saturating_sub(i64::from(other.x));
        let dy = i64::from(self.y).saturating_sub(i64::from(other.y));
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Distance between two points, rounded down.
    pub fn distance(self, other: Self) -> i64 {
        i64::try_from(self.distance_sq(other).unsigned_abs().isqrt()).unwrap_or(i64::MAX)
    }

    /// Scale the vector so its length does not exceed `max`.
    ///
    /// Vectors already within the limit are returned unchanged.
    pub fn clamp_length(self, max: i32) -> Self {
        let max = i64::from(max.max(0));
        let len = self.length();
        if len <= max || len == 0 {
            return self;
        }
        Self {
            x: scale(self.x, max, len),
            y: scale(self.y, max, len),
        }
    }

    /// The map tile containing this point.
    pub const fn tile(self) -> TileCoord {
        TileCoord {
            x: self.x.div_euclid(TILE),
            y: self.y.div_euclid(TILE),
        }
    }
}

/// `value * num / den`, rounded toward zero and clamped to `i32`.
fn scale(value: i32, num: i64, den: i64) -> i32 {
    let scaled = i128::from(value)
        .saturating_mul(i128::from(num))
        .checked_div(i128::from(den))
        .unwrap_or(0);
    i32::try_from(scaled).unwrap_or(if scaled < 0 { i32::MIN } else { i32::MAX })
}

impl Add for PhysicsPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl AddAssign for PhysicsPoint {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl Sub for PhysicsPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl Neg for PhysicsPoint {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: self.x.saturating_neg(),
            y: self.y.saturating_neg(),
        }
    }
}

/// Coordinates of a map tile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TileCoord {
    /// Tile column.
    pub x: i32,
    /// Tile row.
    pub y: i32,
}

impl TileCoord {
    /// Create a tile coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Sub-pixel position of the tile's top-left corner.
    pub const fn origin(self) -> PhysicsPoint {
        PhysicsPoint {
            x: self.x.saturating_mul(TILE),
            y: self.y.saturating_mul(TILE),
        }
    }

    /// Sub-pixel position of the tile's center.
    pub const fn center(self) -> PhysicsPoint {
        let origin = self.origin();
        PhysicsPoint {
            x: origin.x.saturating_add(TILE / 2),
            y: origin.y.saturating_add(TILE / 2),
        }
    }
}

/// Normalize any rotation into `0..ROTATION_POINTS`.
pub const fn normalize_rotation(rotation: i32) -> i32 {
    rotation.rem_euclid(ROTATION_POINTS)
}

/// Unit direction for `rotation`, scaled to `magnitude`.
///
/// The result is a pure function of its inputs, so every participant running
/// the same binary computes identical vectors.
#[allow(clippy::cast_possible_truncation, clippy::arithmetic_side_effects)]
pub fn direction(rotation: i32, magnitude: i32) -> PhysicsPoint {
    let turns = f64::from(normalize_rotation(rotation)) / f64::from(ROTATION_POINTS);
    let radians = turns * core::f64::consts::TAU;
    let magnitude = f64::from(magnitude);
    PhysicsPoint {
        x: (radians.sin() * magnitude).round() as i32,
        y: (-radians.cos() * magnitude).round() as i32,
    }
}
