//! Tile collision map.

use serde::Deserialize;
use skirmish_types::{PhysicsPoint, TILE, TileCoord};

/// A solid rectangle of tiles, as written in map configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TileRect {
    /// Left tile column.
    pub x: i32,
    /// Top tile row.
    pub y: i32,
    /// Width in tiles.
    pub width: i32,
    /// Height in tiles.
    pub height: i32,
}

/// Which tiles of the arena are solid. Everything outside the arena counts as
/// solid, so the arena is always closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionMap {
    width: i32,
    height: i32,
    solid: Vec<bool>,
}

impl CollisionMap {
    /// An open arena of `width` x `height` tiles.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let cells =
            usize::try_from(i64::from(width).saturating_mul(i64::from(height))).unwrap_or(0);
        Self {
            width,
            height,
            solid: vec![false; cells],
        }
    }

    /// Build an arena and fill the given rectangles.
    pub fn with_rects(width: i32, height: i32, rects: &[TileRect]) -> Self {
        let mut map = Self::new(width, height);
        for rect in rects {
            map.fill_rect(*rect);
        }
        map
    }

    /// Width in tiles.
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in tiles.
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Arena size in sub-pixel units.
    pub const fn extent(&self) -> PhysicsPoint {
        PhysicsPoint::new(self.width.saturating_mul(TILE), self.height.saturating_mul(TILE))
    }

    fn index(&self, tile: TileCoord) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 || tile.x >= self.width || tile.y >= self.height {
            return None;
        }
        let row = i64::from(tile.y).saturating_mul(i64::from(self.width));
        usize::try_from(row.saturating_add(i64::from(tile.x))).ok()
    }

    /// Mark a single tile. Tiles outside the arena are ignored.
    pub fn set_solid(&mut self, tile: TileCoord, solid: bool) {
        if let Some(cell) = self.index(tile).and_then(|i| self.solid.get_mut(i)) {
            *cell = solid;
        }
    }

    /// Mark every tile of `rect` solid.
    pub fn fill_rect(&mut self, rect: TileRect) {
        for y in rect.y..rect.y.saturating_add(rect.height) {
            for x in rect.x..rect.x.saturating_add(rect.width) {
                self.set_solid(TileCoord::new(x, y), true);
            }
        }
    }

    /// Whether `tile` blocks movement.
    pub fn is_solid(&self, tile: TileCoord) -> bool {
        self.index(tile)
            .and_then(|i| self.solid.get(i).copied())
            .unwrap_or(true)
    }

    /// Whether the tile containing `point` blocks movement.
    pub fn is_solid_at(&self, point: PhysicsPoint) -> bool {
        self.is_solid(point.tile())
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn outside_is_solid() {
        let map = CollisionMap::new(4, 4);
        assert!(!map.is_solid(TileCoord::new(0, 0)));
        assert!(!map.is_solid(TileCoord::new(3, 3)));
        assert!(map.is_solid(TileCoord::new(-1, 0)));
        assert!(map.is_solid(TileCoord::new(4, 0)));
        assert!(map.is_solid(TileCoord::new(0, 4)));
    }

    #[test]
    fn rects_fill_tiles() {
        let map = CollisionMap::with_rects(
            8,
            8,
            &[TileRect {
                x: 2,
                y: 3,
                width: 2,
                height: 1,
            }],
        );
        assert!(map.is_solid(TileCoord::new(2, 3)));
        assert!(map.is_solid(TileCoord::new(3, 3)));
        assert!(!map.is_solid(TileCoord::new(4, 3)));
        assert!(map.is_solid_at(PhysicsPoint::new(2 * TILE + 5, 3 * TILE + 5)));
    }
}
