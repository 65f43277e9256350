//! Actor deaths.
//!
//! A death is recorded for notification and consistency bookkeeping only;
//! the simulation itself is driven by the actor's `dead` flag.

use skirmish_entities::EntityStore;
use skirmish_types::{ActorDiedKey, EventKey, PhysicsPoint, Pid, Tick};

use crate::behavior::EventBehavior;

/// What happened when an actor died in one state.
///
/// Causal fields: `tick`, `died`, `killer`. The position is derived from
/// movement and excluded from consistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeathOccurrence {
    /// Tick of death.
    pub tick: Tick,
    /// The actor that died.
    pub died: Pid,
    /// Owner of the projectile that killed it.
    pub killer: Pid,
    /// Where the actor died.
    pub position: PhysicsPoint,
}

impl DeathOccurrence {
    fn same_cause(&self, other: &Self) -> bool {
        self.tick == other.tick && self.died == other.died && self.killer == other.killer
    }
}

/// An actor death, with one history per state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorDied {
    key: ActorDiedKey,
    histories: Vec<Option<DeathOccurrence>>,
}

impl ActorDied {
    /// A death that has not occurred in any of `state_count` states.
    pub fn new(key: ActorDiedKey, state_count: usize) -> Self {
        Self {
            key,
            histories: vec![None; state_count],
        }
    }

    /// The typed key.
    pub const fn died_key(&self) -> &ActorDiedKey {
        &self.key
    }

    /// Occurrence in `state`.
    pub fn history(&self, state: usize) -> Option<&DeathOccurrence> {
        self.histories.get(state).and_then(Option::as_ref)
    }

    /// Record the occurrence in `state`.
    pub fn record(&mut self, state: usize, occurrence: DeathOccurrence) {
        if let Some(slot) = self.histories.get_mut(state) {
            *slot = Some(occurrence);
        }
    }
}

impl EventBehavior for ActorDied {
    fn key(&self) -> EventKey {
        EventKey::ActorDied(self.key.clone())
    }

    fn occurred_at(&self, state: usize) -> Option<Tick> {
        self.history(state).map(|h| h.tick)
    }

    fn is_consistent(&self, older: usize, newer: usize) -> bool {
        match (self.history(older), self.history(newer)) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_cause(b),
            _ => false,
        }
    }

    fn reset_execution_history(
        &mut self,
        state: usize,
        reset_from_state: usize,
        reset_from_event: Option<&Self>,
        target: &EntityStore,
    ) {
        let source = reset_from_event.unwrap_or(self);
        let copied = source
            .history(reset_from_state)
            .filter(|h| target.actor(h.died).is_some())
            .cloned();
        if let Some(slot) = self.histories.get_mut(state) {
            *slot = copied;
        }
    }

    fn reset_from_tick(&mut self, state: usize, tick: Tick) -> bool {
        match self.histories.get_mut(state) {
            Some(slot) if slot.as_ref().is_some_and(|h| h.tick >= tick) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}
