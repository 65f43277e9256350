//! One trailing state: entities, todo list and the per-tick step.

use std::collections::BTreeMap;

use skirmish_entities::{CollisionMap, EntityStore, GameConfig};
use skirmish_events::EventRegistry;
use skirmish_types::{Movement, Operation, Tick};
use tracing::trace;

use crate::apply;
use crate::physics;

/// Shared inputs every state needs to simulate a tick.
pub(crate) struct StepContext<'a> {
    /// Tick-scoped game settings.
    pub game: &'a GameConfig,
    /// Arena collision map.
    pub map: &'a CollisionMap,
    /// The environment's events.
    pub events: &'a mut EventRegistry,
    /// Capacity of entity histories.
    pub history_capacity: usize,
}

/// A full simulation of the game, running `delay` ticks behind the newest
/// state.
#[derive(Debug, Clone)]
pub struct State {
    index: usize,
    delay: Tick,
    tick_now: Tick,
    entities: EntityStore,
    /// Replay log of accepted operations, ordered by `(tick, seq)`.
    todo: BTreeMap<(Tick, u64), Operation>,
}

impl State {
    pub(crate) fn new(index: usize, delay: Tick, tick_now: Tick) -> Self {
        Self {
            index,
            delay,
            tick_now,
            entities: EntityStore::new(),
            todo: BTreeMap::new(),
        }
    }

    /// Index of this state; 0 is the newest.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Ticks this state trails behind the newest one.
    pub const fn delay(&self) -> Tick {
        self.delay
    }

    /// Last tick this state has simulated.
    pub const fn tick_now(&self) -> Tick {
        self.tick_now
    }

    /// The state's entities.
    pub const fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Accepted operations in application order.
    pub fn todo_iter(&self) -> impl Iterator<Item = &Operation> {
        self.todo.values()
    }

    pub(crate) fn insert_operation(&mut self, operation: Operation) {
        self.todo.insert(operation.order_key(), operation);
    }

    /// Replace entities and the simulated tick, keeping the todo list.
    pub(crate) fn restore(&mut self, entities: EntityStore, tick_now: Tick) {
        self.entities = entities;
        self.tick_now = tick_now;
    }

    /// Roll back to the end of `tick`, forgetting every event occurrence
    /// after it.
    pub(crate) fn rewind(&mut self, tick: Tick, events: &mut EventRegistry) {
        self.entities.rewind(tick);
        events.reset_from_tick(self.index, tick.saturating_add(1));
        self.tick_now = tick;
    }

    /// Simulate ticks up to and including `target`. Returns the number of
    /// operations applied.
    pub(crate) fn advance_to(&mut self, target: Tick, ctx: &mut StepContext<'_>) -> usize {
        let mut executed = 0_usize;
        while self.tick_now < target {
            let tick = self.tick_now.saturating_add(1);
            executed = executed.saturating_add(self.step(tick, ctx));
        }
        executed
    }

    /// Simulate `tick`: operations, actors, projectiles, commit.
    fn step(&mut self, tick: Tick, ctx: &mut StepContext<'_>) -> usize {
        let settings = ctx.game.settings_at(tick);

        for actor in self.entities.actors_mut() {
            actor.now.movement = Movement::NONE;
        }

        let mut executed = 0_usize;
        for operation in self.todo.range((tick, 0)..=(tick, u64::MAX)).map(|(_, op)| op) {
            if apply::apply_operation(
                &mut self.entities,
                operation,
                &settings,
                ctx.map,
                ctx.history_capacity,
                self.index,
            ) {
                executed = executed.saturating_add(1);
            }
        }

        physics::step_actors(&mut self.entities, tick, &settings, ctx.map);
        physics::step_projectiles(self.index, &mut self.entities, tick, &settings, ctx);

        self.entities.commit(tick);
        self.tick_now = tick;
        trace!(state = self.index, tick, executed, "State stepped");
        executed
    }

    /// Drop entities, energy entries and operations older than `cutoff`.
    pub(crate) fn collect_garbage(&mut self, cutoff: Tick) -> usize {
        self.todo = self.todo.split_off(&(cutoff, 0));
        self.entities.collect_garbage(cutoff)
    }
}
