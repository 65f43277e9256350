//! Rolling per-tick history of a value.
//!
//! Every mutable entity field is committed once per tick into a
//! [`RollingHistory`]. The history is both the query surface ("where was this
//! actor at tick 104?") and the checkpoint a state rewinds to before replaying
//! late operations.

use std::collections::VecDeque;

use skirmish_types::Tick;

/// Values for a contiguous range of ticks, bounded by a capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingHistory<T> {
    /// Maximum number of ticks retained.
    capacity: usize,
    /// Tick of `values[0]`.
    first_tick: Tick,
    /// One value per tick starting at `first_tick`.
    values: VecDeque<T>,
}

impl<T: Clone> RollingHistory<T> {
    /// Create an empty history retaining at most `capacity` ticks.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            first_tick: 0,
            values: VecDeque::new(),
        }
    }

    /// Maximum number of ticks retained.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether nothing has been recorded (or everything was truncated).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Oldest retained tick.
    pub fn oldest_tick(&self) -> Option<Tick> {
        (!self.values.is_empty()).then_some(self.first_tick)
    }

    /// Newest recorded tick.
    pub fn newest_tick(&self) -> Option<Tick> {
        let len = Tick::try_from(self.values.len()).ok()?;
        (len > 0).then(|| self.first_tick.saturating_add(len).saturating_sub(1))
    }

    /// Record `value` for `tick`.
    ///
    /// Recording a tick that is already present discards it and everything
    /// after it first. Gaps are filled by repeating the newest value.
    pub fn record(&mut self, tick: Tick, value: T) {
        let Some(newest) = self.newest_tick() else {
            self.first_tick = tick;
            self.values.push_back(value);
            return;
        };

        if tick < self.first_tick {
            self.values.clear();
            self.first_tick = tick;
            self.values.push_back(value);
            return;
        }

        if tick <= newest {
            self.truncate_after(tick.saturating_sub(1));
        } else if let Some(last) = self.values.back().cloned() {
            for _ in newest.saturating_add(1)..tick {
                self.values.push_back(last.clone());
            }
        }

        if self.values.is_empty() {
            self.first_tick = tick;
        }
        self.values.push_back(value);

        while self.values.len() > self.capacity {
            self.values.pop_front();
            self.first_tick = self.first_tick.saturating_add(1);
        }
    }

    /// Value recorded for `tick`, if it is within the retained range.
    pub fn get(&self, tick: Tick) -> Option<&T> {
        let offset = usize::try_from(tick.checked_sub(self.first_tick)?).ok()?;
        self.values.get(offset)
    }

    /// Newest recorded value.
    pub fn latest(&self) -> Option<&T> {
        self.values.back()
    }

    /// Discard every value recorded after `tick`.
    pub fn truncate_after(&mut self, tick: Tick) {
        if tick < self.first_tick {
            self.values.clear();
            return;
        }
        let kept = tick.saturating_sub(self.first_tick).saturating_add(1);
        if let Ok(keep) = usize::try_from(kept) {
            self.values.truncate(keep);
        }
    }

    /// Iterate `(tick, value)` pairs from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = (Tick, &T)> {
        let first = self.first_tick;
        (first..).zip(self.values.iter())
    }
}
