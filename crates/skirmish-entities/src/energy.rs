//! Setter-tagged energy history.
//!
//! Several independent causes touch an actor's energy: spawning, recharge,
//! weapon costs and every explosion that hits it. Each cause writes its own
//! entry per tick, tagged with a [`SetterId`]. Writing the same setter at the
//! same tick replaces the previous entry, so re-executing a cause during a
//! replay never counts twice, and two causes on the same tick never lose
//! each other's update. The value at any retained tick is recomputed by
//! folding entries in `(tick, setter)` order.

use std::collections::BTreeMap;

use skirmish_types::{ExplosionKey, Tick, WeaponSlot};

/// Identity of a cause that changes energy.
///
/// Variant order is the application order within one tick.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SetterId {
    /// Spawn or respawn; sets an absolute value.
    Spawn,
    /// Per-tick passive recharge.
    Recharge,
    /// Energy spent firing a weapon slot.
    WeaponCost(WeaponSlot),
    /// Damage from an explosion.
    Explosion(ExplosionKey),
}

/// A change applied by one setter at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnergyChange {
    /// Add to the running value (negative for damage).
    Relative(i32),
    /// Replace the running value.
    Absolute(i32),
}

impl EnergyChange {
    const fn apply(self, value: i32) -> i32 {
        match self {
            Self::Relative(delta) => value.saturating_add(delta),
            Self::Absolute(v) => v,
        }
    }
}

/// Energy of one actor over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyHistory {
    /// Value at the end of `base_tick`; older entries were folded into it.
    base_value: i32,
    /// Newest tick folded into `base_value`.
    base_tick: Tick,
    /// Entries per tick, per setter.
    entries: BTreeMap<Tick, BTreeMap<SetterId, EnergyChange>>,
}

impl EnergyHistory {
    /// Create a history whose value is `initial` up to and including `tick`.
    pub const fn new(tick: Tick, initial: i32) -> Self {
        Self {
            base_value: initial,
            base_tick: tick,
            entries: BTreeMap::new(),
        }
    }

    /// Record `change` for `setter` at `tick`, replacing any earlier entry of
    /// the same setter at the same tick.
    pub fn set(&mut self, tick: Tick, setter: SetterId, change: EnergyChange) {
        self.entries.entry(tick).or_default().insert(setter, change);
    }

    /// Energy at the end of `tick`.
    ///
    /// Ticks older than the folded base return the base value.
    pub fn value_at(&self, tick: Tick) -> i32 {
        self.entries
            .range(..=tick)
            .flat_map(|(_, per_tick)| per_tick.values())
            .fold(self.base_value, |value, change| change.apply(value))
    }

    /// Energy after every recorded entry.
    pub fn latest(&self) -> i32 {
        self.entries
            .values()
            .flat_map(BTreeMap::values)
            .fold(self.base_value, |value, change| change.apply(value))
    }

    /// Discard every entry at `from_tick` or later.
    pub fn rollback(&mut self, from_tick: Tick) {
        drop(self.entries.split_off(&from_tick));
    }

    /// Fold every entry older than `before_tick` into the base value.
    pub fn prune(&mut self, before_tick: Tick) {
        let keep = self.entries.split_off(&before_tick);
        let folded = std::mem::replace(&mut self.entries, keep);
        if let Some((&newest, _)) = folded.last_key_value() {
            self.base_value = folded
                .values()
                .flat_map(BTreeMap::values)
                .fold(self.base_value, |value, change| change.apply(value));
            self.base_tick = self.base_tick.max(newest);
        }
    }

    /// Newest tick folded into the base value.
    pub const fn base_tick(&self) -> Tick {
        self.base_tick
    }

    /// Number of individual setter entries still unfolded.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}
