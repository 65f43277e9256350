//! The contract every event variant implements.

use skirmish_entities::EntityStore;
use skirmish_types::{EventKey, Tick};

/// Shared behavior of keyed events.
///
/// One event object exists per key and environment. It holds one execution
/// history per trailing state, addressed by state index. Index 0 is the
/// newest state; higher indices trail further behind.
pub trait EventBehavior {
    /// The key this event is registered under.
    fn key(&self) -> EventKey;

    /// Whether the event has occurred in `state`.
    fn has_occurred(&self, state: usize) -> bool {
        self.occurred_at(state).is_some()
    }

    /// Tick the event occurred at in `state`.
    fn occurred_at(&self, state: usize) -> Option<Tick>;

    /// Whether the causal outcome recorded in `older` matches `newer`.
    fn is_consistent(&self, older: usize, newer: usize) -> bool;

    /// Replace the history of `state` with a copy of `reset_from_state`.
    ///
    /// The copy is taken from `reset_from_event` when given (an event of
    /// another environment with the same key) and from `self` otherwise.
    /// Entity references are re-resolved against `target`, the store of the
    /// state being reset. References that no longer resolve are dropped.
    fn reset_execution_history(
        &mut self,
        state: usize,
        reset_from_state: usize,
        reset_from_event: Option<&Self>,
        target: &EntityStore,
    );

    /// Forget the occurrence in `state` if it happened at `tick` or later.
    ///
    /// Returns whether anything was forgotten.
    fn reset_from_tick(&mut self, state: usize, tick: Tick) -> bool;
}
