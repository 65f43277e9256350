//! Per-tick movement input bitmask.

use serde::{Deserialize, Serialize};

/// Movement input for a single tick.
///
/// Four bits give sixteen possible codes. `UP` thrusts forward, `DOWN`
/// thrusts backward, `LEFT` and `RIGHT` rotate. Opposing bits cancel out.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Movement(u8);

impl Movement {
    /// Thrust forward.
    pub const UP: u8 = 1;
    /// Thrust backward.
    pub const DOWN: u8 = 1 << 1;
    /// Rotate counter-clockwise.
    pub const LEFT: u8 = 1 << 2;
    /// Rotate clockwise.
    pub const RIGHT: u8 = 1 << 3;

    /// Highest valid movement code.
    pub const MAX_CODE: u8 = 0b1111;

    /// No input.
    pub const NONE: Self = Self(0);

    /// Build a movement from a raw code. Returns `None` for codes that use
    /// bits outside the four movement bits.
    pub const fn from_code(code: u8) -> Option<Self> {
        if code > Self::MAX_CODE {
            None
        } else {
            Some(Self(code))
        }
    }

    /// Build a movement from individual flags.
    pub const fn from_flags(up: bool, down: bool, left: bool, right: bool) -> Self {
        let mut code = 0;
        if up {
            code |= Self::UP;
        }
        if down {
            code |= Self::DOWN;
        }
        if left {
            code |= Self::LEFT;
        }
        if right {
            code |= Self::RIGHT;
        }
        Self(code)
    }

    /// The raw four-bit code.
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Whether this code fits in the four movement bits.
    pub const fn is_valid(self) -> bool {
        self.0 <= Self::MAX_CODE
    }

    /// Forward thrust requested.
    pub const fn up(self) -> bool {
        self.0 & Self::UP != 0
    }

    /// Backward thrust requested.
    pub const fn down(self) -> bool {
        self.0 & Self::DOWN != 0
    }

    /// Counter-clockwise rotation requested.
    pub const fn left(self) -> bool {
        self.0 & Self::LEFT != 0
    }

    /// Clockwise rotation requested.
    pub const fn right(self) -> bool {
        self.0 & Self::RIGHT != 0
    }

    /// Net thrust direction: `1` forward, `-1` backward, `0` none.
    pub const fn thrust_sign(self) -> i32 {
        match (self.up(), self.down()) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        }
    }

    /// Net rotation direction: `1` clockwise, `-1` counter-clockwise.
    pub const fn rotation_sign(self) -> i32 {
        match (self.right(), self.left()) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_codes_are_valid() {
        for code in 0..=15u8 {
            assert!(Movement::from_code(code).is_some());
        }
        assert!(Movement::from_code(16).is_none());
    }

    #[test]
    fn opposing_bits_cancel() {
        let m = Movement::from_flags(true, true, true, true);
        assert_eq!(m.thrust_sign(), 0);
        assert_eq!(m.rotation_sign(), 0);
    }

    #[test]
    fn flags_round_trip_to_code() {
        let m = Movement::from_flags(true, false, false, true);
        assert_eq!(m.code(), Movement::UP | Movement::RIGHT);
        assert_eq!(m.thrust_sign(), 1);
        assert_eq!(m.rotation_sign(), 1);
    }
}
