//! Actors: player-controlled ships.

use skirmish_types::{Movement, PhysicsPoint, Pid, ShipId, Tick, WeaponSlot};

use crate::energy::EnergyHistory;
use crate::history::RollingHistory;
use crate::store::EntityStore;

/// Mutable per-tick state of an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorFrame {
    /// Position in sub-pixel units.
    pub position: PhysicsPoint,
    /// Velocity in sub-pixel units per tick.
    pub velocity: PhysicsPoint,
    /// Rotation in rotation points.
    pub rotation: i32,
    /// Current ship type.
    pub ship: ShipId,
    /// Whether the actor is dead and waiting to respawn.
    pub dead: bool,
    /// Tick the actor respawns at while dead.
    pub respawn_at: Option<Tick>,
    /// Movement input for the tick being simulated. Reset every tick.
    pub movement: Movement,
    /// First tick each weapon slot may fire again.
    pub weapon_ready_at: [Tick; 4],
}

impl ActorFrame {
    /// A live actor at rest.
    pub const fn spawned(position: PhysicsPoint, ship: ShipId) -> Self {
        Self {
            position,
            velocity: PhysicsPoint::ZERO,
            rotation: 0,
            ship,
            dead: false,
            respawn_at: None,
            movement: Movement::NONE,
            weapon_ready_at: [Tick::MIN; 4],
        }
    }

    /// First tick `slot` may fire again.
    pub fn ready_at(&self, slot: WeaponSlot) -> Tick {
        self.weapon_ready_at
            .get(slot.index())
            .copied()
            .unwrap_or(Tick::MIN)
    }

    /// Put `slot` on cooldown until `tick`.
    pub fn set_ready_at(&mut self, slot: WeaponSlot, tick: Tick) {
        if let Some(ready) = self.weapon_ready_at.get_mut(slot.index()) {
            *ready = tick;
        }
    }
}

/// A player-controlled ship and its rolling history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Stable id.
    pub pid: Pid,
    /// Display name.
    pub name: String,
    /// Seed for spawn placement.
    pub seed: u64,
    /// Tick the actor was created at.
    pub created_at: Tick,
    /// Tick the actor was removed at. Removed actors stay until garbage
    /// collection so a rewind can restore them.
    pub removed_at: Option<Tick>,
    /// State being built for the current tick.
    pub now: ActorFrame,
    /// Committed frames, one per tick.
    pub frames: RollingHistory<ActorFrame>,
    /// Energy over time.
    pub energy: EnergyHistory,
}

impl Actor {
    /// Create an actor spawned at `tick` with `energy`.
    pub fn new(
        pid: Pid,
        name: String,
        seed: u64,
        tick: Tick,
        frame: ActorFrame,
        energy: i32,
        history_capacity: usize,
    ) -> Self {
        Self {
            pid,
            name,
            seed,
            created_at: tick,
            removed_at: None,
            now: frame,
            frames: RollingHistory::new(history_capacity),
            energy: EnergyHistory::new(tick.saturating_sub(1), energy),
        }
    }

    /// Whether the actor exists (created and not removed) at `tick`.
    pub fn exists_at(&self, tick: Tick) -> bool {
        self.created_at <= tick && self.removed_at.is_none_or(|removed| tick < removed)
    }

    /// Whether the actor exists and is alive in the frame being built.
    pub fn is_active(&self, tick: Tick) -> bool {
        self.exists_at(tick) && !self.now.dead
    }

    /// Committed frame at `tick`.
    pub fn frame_at(&self, tick: Tick) -> Option<&ActorFrame> {
        self.frames.get(tick)
    }

    /// Committed position at `tick`.
    pub fn position_at(&self, tick: Tick) -> Option<PhysicsPoint> {
        self.frame_at(tick).map(|f| f.position)
    }

    /// Committed velocity at `tick`.
    pub fn velocity_at(&self, tick: Tick) -> Option<PhysicsPoint> {
        self.frame_at(tick).map(|f| f.velocity)
    }

    /// Committed rotation at `tick`.
    pub fn rotation_at(&self, tick: Tick) -> Option<i32> {
        self.frame_at(tick).map(|f| f.rotation)
    }

    /// Energy at the end of `tick`.
    pub fn energy_at(&self, tick: Tick) -> i32 {
        self.energy.value_at(tick)
    }

    /// Whether the actor was dead at the end of `tick`.
    pub fn dead_at(&self, tick: Tick) -> Option<bool> {
        self.frame_at(tick).map(|f| f.dead)
    }

    /// Store the frame being built as the committed frame of `tick`.
    pub fn commit(&mut self, tick: Tick) {
        self.frames.record(tick, self.now.clone());
    }

    /// Restore the actor to the end of `tick`, discarding anything later.
    ///
    /// Returns `false` when the actor did not exist yet at `tick` and must
    /// be dropped by the caller.
    pub fn rewind(&mut self, tick: Tick) -> bool {
        if self.created_at > tick {
            return false;
        }
        if self.removed_at.is_some_and(|removed| removed > tick) {
            self.removed_at = None;
        }
        self.frames.truncate_after(tick);
        if let Some(frame) = self.frames.latest() {
            self.now = frame.clone();
        }
        self.energy.rollback(tick.saturating_add(1));
        true
    }

    /// The same actor in another state's store.
    pub fn find_in_other_state<'a>(&self, other: &'a EntityStore) -> Option<&'a Self> {
        other.actor(self.pid)
    }
}
