//! Timestamped operations fed into the simulation by the network layer.
//!
//! An [`Operation`] is immutable once accepted. Within a state, operations
//! apply in `(tick, seq)` order where `seq` is the environment-wide arrival
//! sequence assigned on acceptance.

use serde::{Deserialize, Serialize};

use crate::geometry::PhysicsPoint;
use crate::ids::{Pid, ShipId, Tick, WeaponSlot};
use crate::movement::Movement;

/// Client-supplied motion hint attached to warps and weapon fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MotionHint {
    /// Position the client observed.
    pub position: PhysicsPoint,
    /// Velocity the client observed.
    pub velocity: PhysicsPoint,
    /// Rotation the client observed.
    pub rotation: i32,
}

/// The payload of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    /// Create a new actor.
    ActorNew {
        /// Display name.
        name: String,
        /// Seed for deterministic spawn placement.
        seed: u64,
        /// Initial ship type.
        ship: ShipId,
    },
    /// Teleport an actor. Without a hint the actor warps to a spawn point.
    ActorWarp {
        /// Target position, velocity and rotation.
        hint: Option<MotionHint>,
    },
    /// Movement input for one tick.
    ActorMove {
        /// Input bitmask.
        movement: Movement,
    },
    /// Fire a weapon slot.
    ActorWeapon {
        /// Slot to fire.
        slot: WeaponSlot,
        /// Position the client fired from.
        hint: Option<MotionHint>,
    },
    /// Change ship type.
    ActorModification {
        /// New ship type.
        ship: ShipId,
    },
    /// Remove an actor from the game.
    ActorRemove,
}

impl OperationKind {
    /// Short name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ActorNew { .. } => "actor_new",
            Self::ActorWarp { .. } => "actor_warp",
            Self::ActorMove { .. } => "actor_move",
            Self::ActorWeapon { .. } => "actor_weapon",
            Self::ActorModification { .. } => "actor_modification",
            Self::ActorRemove => "actor_remove",
        }
    }
}

/// A timestamped operation issued by an actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    /// Tick the operation logically occurred at.
    pub tick: Tick,
    /// Issuing actor.
    pub pid: Pid,
    /// Arrival sequence, assigned when the environment accepts the operation.
    #[serde(default)]
    pub seq: u64,
    /// What the operation does.
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    /// Create an operation that has not been sequenced yet.
    pub const fn new(tick: Tick, pid: Pid, kind: OperationKind) -> Self {
        Self {
            tick,
            pid,
            seq: 0,
            kind,
        }
    }

    /// The total-order key within a state's todo list.
    pub const fn order_key(&self) -> (Tick, u64) {
        (self.tick, self.seq)
    }
}
