//! The environment-wide event registry and consistency sweep.

use std::collections::{BTreeMap, BTreeSet};

use skirmish_entities::EntityStore;
use skirmish_types::{ActorDiedKey, EventKey, ExplosionKey, Tick};
use tracing::warn;

use crate::behavior::EventBehavior;
use crate::death::{ActorDied, DeathOccurrence};
use crate::explosion::{ExplosionOccurrence, ProjectileExplosion};

/// Any event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A projectile exploded.
    ProjectileExplosion(ProjectileExplosion),
    /// An actor died.
    ActorDied(ActorDied),
}

impl Event {
    fn empty(key: &EventKey, state_count: usize) -> Self {
        match key {
            EventKey::ProjectileExplosion(key) => {
                Self::ProjectileExplosion(ProjectileExplosion::new(key.clone(), state_count))
            }
            EventKey::ActorDied(key) => Self::ActorDied(ActorDied::new(key.clone(), state_count)),
        }
    }

    /// Whether the event has occurred in any state.
    pub fn occurred_anywhere(&self, state_count: usize) -> bool {
        (0..state_count).any(|state| self.has_occurred(state))
    }
}

impl EventBehavior for Event {
    fn key(&self) -> EventKey {
        match self {
            Self::ProjectileExplosion(e) => e.key(),
            Self::ActorDied(e) => e.key(),
        }
    }

    fn occurred_at(&self, state: usize) -> Option<Tick> {
        match self {
            Self::ProjectileExplosion(e) => e.occurred_at(state),
            Self::ActorDied(e) => e.occurred_at(state),
        }
    }

    fn is_consistent(&self, older: usize, newer: usize) -> bool {
        match self {
            Self::ProjectileExplosion(e) => e.is_consistent(older, newer),
            Self::ActorDied(e) => e.is_consistent(older, newer),
        }
    }

    fn reset_execution_history(
        &mut self,
        state: usize,
        reset_from_state: usize,
        reset_from_event: Option<&Self>,
        target: &EntityStore,
    ) {
        match (self, reset_from_event) {
            (Self::ProjectileExplosion(e), Some(Self::ProjectileExplosion(from))) => {
                e.reset_execution_history(state, reset_from_state, Some(from), target);
            }
            (Self::ActorDied(e), Some(Self::ActorDied(from))) => {
                e.reset_execution_history(state, reset_from_state, Some(from), target);
            }
            (Self::ProjectileExplosion(e), _) => {
                e.reset_execution_history(state, reset_from_state, None, target);
            }
            (Self::ActorDied(e), _) => {
                e.reset_execution_history(state, reset_from_state, None, target);
            }
        }
    }

    fn reset_from_tick(&mut self, state: usize, tick: Tick) -> bool {
        match self {
            Self::ProjectileExplosion(e) => e.reset_from_tick(state, tick),
            Self::ActorDied(e) => e.reset_from_tick(state, tick),
        }
    }
}

/// Two adjacent states disagree about an event they have both simulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desync {
    /// The event that diverged.
    pub key: EventKey,
    /// Index of the older (higher index) state.
    pub older: usize,
    /// Index of the newer state.
    pub newer: usize,
    /// Latest occurrence tick of the two histories.
    pub tick: Tick,
}

/// Every event of one environment, keyed deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRegistry {
    state_count: usize,
    events: BTreeMap<EventKey, Event>,
    /// `(event, older state)` pairs already reported as desynced. Cleared
    /// whenever either history of the pair changes.
    reported: BTreeSet<(EventKey, usize)>,
}

impl EventRegistry {
    /// An empty registry for `state_count` states.
    pub fn new(state_count: usize) -> Self {
        Self {
            state_count,
            events: BTreeMap::new(),
            reported: BTreeSet::new(),
        }
    }

    /// Number of states every event keeps a history for.
    pub const fn state_count(&self) -> usize {
        self.state_count
    }

    /// Event by key.
    pub fn get(&self, key: &EventKey) -> Option<&Event> {
        self.events.get(key)
    }

    /// Every event in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    /// Number of registered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are registered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn entry(&mut self, key: EventKey) -> &mut Event {
        let state_count = self.state_count;
        self.events
            .entry(key)
            .or_insert_with_key(|key| Event::empty(key, state_count))
    }

    fn touched(&mut self, key: &EventKey, state: usize) {
        self.reported.remove(&(key.clone(), state));
        self.reported.remove(&(key.clone(), state.saturating_add(1)));
    }

    /// Record an explosion in `state`.
    pub fn record_explosion(
        &mut self,
        state: usize,
        key: ExplosionKey,
        occurrence: ExplosionOccurrence,
    ) {
        let key = EventKey::ProjectileExplosion(key);
        if let Event::ProjectileExplosion(event) = self.entry(key.clone()) {
            event.record(state, occurrence);
        }
        self.touched(&key, state);
    }

    /// Record a death in `state`.
    pub fn record_death(&mut self, state: usize, key: ActorDiedKey, occurrence: DeathOccurrence) {
        let key = EventKey::ActorDied(key);
        if let Event::ActorDied(event) = self.entry(key.clone()) {
            event.record(state, occurrence);
        }
        self.touched(&key, state);
    }

    /// Forget every occurrence in `state` at `tick` or later.
    pub fn reset_from_tick(&mut self, state: usize, tick: Tick) {
        let mut changed = Vec::new();
        for (key, event) in &mut self.events {
            if event.reset_from_tick(state, tick) {
                changed.push(key.clone());
            }
        }
        for key in changed {
            self.touched(&key, state);
        }
    }

    /// Replace every history of state `into` with a copy of state `from`,
    /// resolving entity references against `target` (the store `into` now
    /// holds).
    pub fn copy_state(&mut self, into: usize, from: usize, target: &EntityStore) {
        let keys: Vec<EventKey> = self.events.keys().cloned().collect();
        for key in keys {
            if let Some(event) = self.events.get_mut(&key) {
                event.reset_execution_history(into, from, None, target);
            }
            self.touched(&key, into);
        }
    }

    /// A registry for a forked environment: every event of `self` is copied
    /// state by state, with references resolved in `stores[state]`.
    pub fn fork(&self, stores: &[&EntityStore]) -> Self {
        let mut forked = Self::new(self.state_count);
        for (key, event) in &self.events {
            let mut copy = Event::empty(key, self.state_count);
            for (state, store) in stores.iter().enumerate().take(self.state_count) {
                copy.reset_execution_history(state, state, Some(event), store);
            }
            forked.events.insert(key.clone(), copy);
        }
        forked
    }

    /// Compare every pair of adjacent states that have both simulated past
    /// an event's occurrence. Each divergence is reported once until either
    /// history changes.
    ///
    /// `tick_now[state]` is the current tick of each state.
    pub fn consistency_sweep(&mut self, tick_now: &[Tick]) -> Vec<Desync> {
        let mut desyncs = Vec::new();
        for (key, event) in &self.events {
            for newer in 0..self.state_count.saturating_sub(1) {
                let older = newer.saturating_add(1);
                let Some(&older_now) = tick_now.get(older) else {
                    continue;
                };
                let occurred = event
                    .occurred_at(older)
                    .into_iter()
                    .chain(event.occurred_at(newer))
                    .max();
                let Some(tick) = occurred else {
                    continue;
                };
                if older_now < tick || event.is_consistent(older, newer) {
                    continue;
                }
                if self.reported.contains(&(key.clone(), older)) {
                    continue;
                }
                warn!(?key, older, newer, tick, "Event desync between trailing states");
                desyncs.push(Desync {
                    key: key.clone(),
                    older,
                    newer,
                    tick,
                });
            }
        }
        for desync in &desyncs {
            self.reported.insert((desync.key.clone(), desync.older));
        }
        desyncs
    }

    /// Drop events that can no longer change: those whose every occurrence
    /// is older than `cutoff`, and those that never occurred.
    ///
    /// Returns the number of events dropped.
    pub fn prune(&mut self, cutoff: Tick) -> usize {
        let before = self.events.len();
        let state_count = self.state_count;
        self.events.retain(|_, event| {
            (0..state_count).any(|state| event.occurred_at(state).is_some_and(|t| t >= cutoff))
        });
        let events = &self.events;
        self.reported.retain(|(key, _)| events.contains_key(key));
        before.saturating_sub(self.events.len())
    }
}
