//! Type-safe identifier wrappers.
//!
//! Actor pids and ship types are small integers assigned outside the
//! simulation core (pids by the server, ship ids by the game configuration).
//! Wrapping them prevents mixing a ship index with a pid at compile time.

use serde::{Deserialize, Serialize};

/// Discrete simulation time unit.
///
/// Signed so that trailing states can start before tick 0: a state with a
/// delay of `d` ticks starts at `initial_tick - d`.
pub type Tick = i64;

/// Generates a newtype wrapper around an integer with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Actor identity. Server assigned, monotonically increasing and never
    /// reused within a session.
    Pid(i32)
}

define_id! {
    /// Index of a ship type in the game configuration.
    ShipId(u8)
}

/// Weapon input slots an actor can fire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WeaponSlot {
    /// Primary gun.
    Gun,
    /// Bomb launcher.
    Bomb,
    /// Stationary mine layer.
    Mine,
    /// Burst (multi-projectile) weapon.
    Burst,
}

impl WeaponSlot {
    /// Every slot, in declaration order.
    pub const ALL: [Self; 4] = [Self::Gun, Self::Bomb, Self::Mine, Self::Burst];

    /// Position of the slot inside per-slot arrays.
    pub const fn index(self) -> usize {
        match self {
            Self::Gun => 0,
            Self::Bomb => 1,
            Self::Mine => 2,
            Self::Burst => 3,
        }
    }
}

impl core::fmt::Display for WeaponSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Gun => write!(f, "gun"),
            Self::Bomb => write!(f, "bomb"),
            Self::Mine => write!(f, "mine"),
            Self::Burst => write!(f, "burst"),
        }
    }
}
