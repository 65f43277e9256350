//! The simulation environment: trailing states, operation acceptance and
//! rollback replay.
//!
//! The environment runs several full simulations of the same game, each a
//! fixed number of ticks behind the newest. Every accepted operation lands
//! in every state's todo list. States that have already simulated past the
//! operation's tick rewind their entities to the tick before it and replay
//! forward, so all states converge on the same outcome once they have seen
//! the same operations. Older states act as confidence levels: by the time
//! the oldest state reaches a tick, no operation for it can still arrive.
//!
//! After every change, the event histories of adjacent states are compared.
//! Divergence is reported as a [`Desync`], never repaired automatically
//! (see [`Environment::timewarp`] for the manual reset).

use std::sync::Arc;

use skirmish_entities::{Actor, CollisionMap, ConfigDocument, GameConfig, Projectile};
use skirmish_events::{Desync, Event, EventRegistry};
use skirmish_types::{
    EventKey, MotionHint, Movement, Operation, OperationKind, Pid, ShipId, Tick, WeaponSlot,
};
use tracing::{debug, info};

use crate::error::OperationError;
use crate::state::{State, StepContext};

/// Shape of the trailing states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Number of states, including the newest.
    pub trailing_states: usize,
    /// Delay between neighboring states, in ticks.
    pub trailing_state_delay: Tick,
    /// Extra ticks of entity history beyond the highest delay.
    pub history_margin: Tick,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            trailing_states: 3,
            trailing_state_delay: 32,
            history_margin: 16,
        }
    }
}

impl EnvironmentConfig {
    /// Delay of every state, newest first.
    pub fn delays(&self) -> Vec<Tick> {
        let delay = self.trailing_state_delay.max(1);
        (0..self.trailing_states.max(1))
            .map(|i| Tick::try_from(i).unwrap_or(Tick::MAX).saturating_mul(delay))
            .collect()
    }

    /// Delay of the oldest state. Operations older than the newest state's
    /// tick minus this are rejected.
    pub fn highest_delay(&self) -> Tick {
        self.delays().last().copied().unwrap_or(0)
    }

    /// Ticks of history every entity keeps. Replaying an operation at the
    /// edge of the window needs the tick before it.
    pub fn history_capacity(&self) -> usize {
        let ticks = self.highest_delay().saturating_add(self.history_margin.max(2));
        usize::try_from(ticks).unwrap_or(usize::MAX)
    }
}

/// Outcome of one [`Environment::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Tick the newest state simulated.
    pub tick: Tick,
    /// Operations the newest state applied during that tick.
    pub executed: usize,
    /// Desyncs detected after the tick.
    pub desyncs: Vec<Desync>,
}

/// Trailing states plus everything they share.
#[derive(Debug, Clone)]
pub struct Environment {
    config: EnvironmentConfig,
    highest_delay: Tick,
    history_capacity: usize,
    game: GameConfig,
    map: Arc<CollisionMap>,
    states: Vec<State>,
    events: EventRegistry,
    next_seq: u64,
    desyncs: Vec<Desync>,
}

impl Environment {
    /// Create an environment whose newest state stands at `initial_tick`.
    /// Older states start their delay behind it.
    pub fn new(
        config: EnvironmentConfig,
        map: CollisionMap,
        game: GameConfig,
        initial_tick: Tick,
    ) -> Self {
        let states: Vec<State> = config
            .delays()
            .into_iter()
            .enumerate()
            .map(|(index, delay)| State::new(index, delay, initial_tick.saturating_sub(delay)))
            .collect();
        let state_count = states.len();
        info!(
            states = state_count,
            highest_delay = config.highest_delay(),
            initial_tick,
            "Environment created"
        );
        Self {
            config,
            highest_delay: config.highest_delay(),
            history_capacity: config.history_capacity(),
            game,
            map: Arc::new(map),
            states,
            events: EventRegistry::new(state_count),
            next_seq: 0,
            desyncs: Vec::new(),
        }
    }

    /// The trailing-state configuration.
    pub const fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Delay of the oldest state.
    pub const fn highest_delay(&self) -> Tick {
        self.highest_delay
    }

    /// Tick-scoped game settings.
    pub const fn game(&self) -> &GameConfig {
        &self.game
    }

    /// The arena.
    pub fn map(&self) -> &CollisionMap {
        &self.map
    }

    /// Number of trailing states.
    pub const fn state_count(&self) -> usize {
        self.states.len()
    }

    /// State by index; 0 is the newest.
    pub fn state(&self, state: usize) -> Option<&State> {
        self.states.get(state)
    }

    /// Current tick of the newest state.
    pub fn tick_now(&self) -> Tick {
        self.state_tick(0).unwrap_or_default()
    }

    /// Current tick of `state`.
    pub fn state_tick(&self, state: usize) -> Option<Tick> {
        self.states.get(state).map(State::tick_now)
    }

    /// Oldest tick an operation may carry right now.
    pub fn oldest_accepted_tick(&self) -> Tick {
        self.tick_now().saturating_sub(self.highest_delay)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Create an actor.
    pub fn actor_new(
        &mut self,
        tick: Tick,
        pid: Pid,
        name: &str,
        seed: u64,
        ship: ShipId,
    ) -> Result<u64, OperationError> {
        self.submit(Operation::new(
            tick,
            pid,
            OperationKind::ActorNew {
                name: name.to_owned(),
                seed,
                ship,
            },
        ))
    }

    /// Warp an actor to `hint`, or to a spawn point without one.
    pub fn actor_warp(
        &mut self,
        tick: Tick,
        pid: Pid,
        hint: Option<MotionHint>,
    ) -> Result<u64, OperationError> {
        self.submit(Operation::new(tick, pid, OperationKind::ActorWarp { hint }))
    }

    /// Movement input of an actor for one tick.
    pub fn actor_move(
        &mut self,
        tick: Tick,
        pid: Pid,
        movement: Movement,
    ) -> Result<u64, OperationError> {
        self.submit(Operation::new(tick, pid, OperationKind::ActorMove { movement }))
    }

    /// Fire a weapon slot.
    pub fn actor_weapon(
        &mut self,
        tick: Tick,
        pid: Pid,
        slot: WeaponSlot,
        hint: Option<MotionHint>,
    ) -> Result<u64, OperationError> {
        self.submit(Operation::new(
            tick,
            pid,
            OperationKind::ActorWeapon { slot, hint },
        ))
    }

    /// Change an actor's ship.
    pub fn actor_modification(
        &mut self,
        tick: Tick,
        pid: Pid,
        ship: ShipId,
    ) -> Result<u64, OperationError> {
        self.submit(Operation::new(
            tick,
            pid,
            OperationKind::ActorModification { ship },
        ))
    }

    /// Remove an actor.
    pub fn actor_remove(&mut self, tick: Tick, pid: Pid) -> Result<u64, OperationError> {
        self.submit(Operation::new(tick, pid, OperationKind::ActorRemove))
    }

    fn check_window(&self, tick: Tick) -> Result<(), OperationError> {
        let newest = self.tick_now();
        let oldest = self.oldest_accepted_tick();
        if tick < oldest {
            return Err(OperationError::TooOld { tick, oldest });
        }
        if tick > newest {
            return Err(OperationError::InFuture { tick, newest });
        }
        Ok(())
    }

    fn validate(&self, operation: &Operation) -> Result<(), OperationError> {
        self.check_window(operation.tick)?;
        let tick = operation.tick;
        match &operation.kind {
            OperationKind::ActorNew { ship, .. } | OperationKind::ActorModification { ship } => {
                if self.game.settings_at(tick).ship(*ship).is_none() {
                    return Err(OperationError::UnknownShip { ship: *ship, tick });
                }
            }
            OperationKind::ActorMove { movement } if !movement.is_valid() => {
                return Err(OperationError::InvalidMovement {
                    code: movement.code(),
                });
            }
            _ => {}
        }
        if matches!(operation.kind, OperationKind::ActorNew { .. })
            && self
                .states
                .first()
                .and_then(|newest| newest.entities().actor(operation.pid))
                .is_some_and(|actor| actor.removed_at.is_none())
        {
            return Err(OperationError::DuplicateActor { pid: operation.pid });
        }
        Ok(())
    }

    /// Accept an operation: sequence it, add it to every todo list and
    /// replay every state that has already simulated its tick.
    ///
    /// Returns the assigned sequence number.
    pub fn submit(&mut self, mut operation: Operation) -> Result<u64, OperationError> {
        if let Err(err) = self.validate(&operation) {
            debug!(
                tick = operation.tick,
                pid = %operation.pid,
                kind = operation.kind.name(),
                %err,
                "Operation rejected"
            );
            return Err(err);
        }

        let seq = self.next_seq;
        self.next_seq = seq.saturating_add(1);
        operation.seq = seq;
        let tick = operation.tick;
        debug!(tick, seq, pid = %operation.pid, kind = operation.kind.name(), "Operation accepted");

        for state in &mut self.states {
            state.insert_operation(operation.clone());
        }
        self.rerun_from(tick);
        Ok(seq)
    }

    /// Load a game settings document and replay every state that has already
    /// simulated its first tick.
    pub fn load_config(&mut self, document: ConfigDocument) -> Result<(), OperationError> {
        let tick = document.from_tick;
        self.check_window(tick)?;
        let name = document.name.clone();
        self.game.load(document)?;
        info!(tick, name = %name, "Game config loaded");
        self.rerun_from(tick);
        Ok(())
    }

    /// Rewind every state that has simulated `tick` to the end of
    /// `tick - 1`, replay it back to where it was and run the consistency
    /// sweep.
    fn rerun_from(&mut self, tick: Tick) {
        let mut ctx = StepContext {
            game: &self.game,
            map: self.map.as_ref(),
            events: &mut self.events,
            history_capacity: self.history_capacity,
        };
        for state in &mut self.states {
            let target = state.tick_now();
            if target < tick {
                continue;
            }
            debug!(state = state.index(), from = tick, to = target, "Replaying state");
            state.rewind(tick.saturating_sub(1), ctx.events);
            state.advance_to(target, &mut ctx);
        }
        self.sweep();
    }

    fn sweep(&mut self) -> Vec<Desync> {
        let ticks: Vec<Tick> = self.states.iter().map(State::tick_now).collect();
        let found = self.events.consistency_sweep(&ticks);
        self.desyncs.extend(found.iter().cloned());
        found
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Advance every state by one tick, then sweep and collect garbage.
    pub fn tick(&mut self) -> TickSummary {
        let mut ctx = StepContext {
            game: &self.game,
            map: self.map.as_ref(),
            events: &mut self.events,
            history_capacity: self.history_capacity,
        };
        let mut executed = 0;
        for state in &mut self.states {
            let applied = state.advance_to(state.tick_now().saturating_add(1), &mut ctx);
            if state.index() == 0 {
                executed = applied;
            }
        }

        let desyncs = self.sweep();
        self.collect_garbage();
        TickSummary {
            tick: self.tick_now(),
            executed,
            desyncs,
        }
    }

    fn collect_garbage(&mut self) {
        let cutoff = self.oldest_accepted_tick();
        let entities = self
            .states
            .iter_mut()
            .map(|state| state.collect_garbage(cutoff))
            .fold(0_usize, usize::saturating_add);
        let events = self.events.prune(cutoff);
        if entities > 0 || events > 0 {
            debug!(cutoff, entities, events, "Garbage collected");
        }
    }

    /// Drain every desync detected since the last call.
    pub fn take_desyncs(&mut self) -> Vec<Desync> {
        std::mem::take(&mut self.desyncs)
    }

    // -----------------------------------------------------------------------
    // Timewarp and fork
    // -----------------------------------------------------------------------

    /// Reset every state newer than `from_state` to a copy of it and replay
    /// each forward to its own tick.
    pub fn timewarp(&mut self, from_state: usize) -> Result<(), OperationError> {
        let source = self
            .states
            .get(from_state)
            .ok_or(OperationError::InvalidState { state: from_state })?;
        let entities = source.entities().clone();
        let source_tick = source.tick_now();
        info!(from_state, tick = source_tick, "Timewarp");

        let mut ctx = StepContext {
            game: &self.game,
            map: self.map.as_ref(),
            events: &mut self.events,
            history_capacity: self.history_capacity,
        };
        for state in self.states.iter_mut().take(from_state) {
            let target = state.tick_now();
            state.restore(entities.clone(), source_tick);
            ctx.events.copy_state(state.index(), from_state, state.entities());
            state.advance_to(target, &mut ctx);
        }
        self.sweep();
        Ok(())
    }

    /// An independent copy of this environment. Entities are cloned per
    /// state and event histories are copied with references resolved in the
    /// copy.
    pub fn fork(&self) -> Self {
        let states = self.states.clone();
        let stores: Vec<_> = states.iter().map(State::entities).collect();
        let events = self.events.fork(&stores);
        Self {
            config: self.config,
            highest_delay: self.highest_delay,
            history_capacity: self.history_capacity,
            game: self.game.clone(),
            map: Arc::clone(&self.map),
            states,
            events,
            next_seq: self.next_seq,
            desyncs: Vec::new(),
        }
    }

    /// The actor of this environment that corresponds to `pid` in `state`
    /// of `other`.
    pub fn find_in_other_env<'a>(
        &self,
        other: &'a Self,
        state: usize,
        pid: Pid,
    ) -> Option<&'a Actor> {
        self.actor(state, pid)?;
        other.actor(state, pid)
    }

    // -----------------------------------------------------------------------
    // Read-only traversal
    // -----------------------------------------------------------------------

    /// Accepted operations of `state` in application order.
    pub fn todo_list_iter(&self, state: usize) -> impl Iterator<Item = &Operation> {
        self.states.get(state).into_iter().flat_map(State::todo_iter)
    }

    /// Actors of `state` that exist at its current tick.
    pub fn actor_iter(&self, state: usize) -> impl Iterator<Item = &Actor> {
        self.states
            .get(state)
            .into_iter()
            .flat_map(|s| s.entities().actors_at(s.tick_now()))
    }

    /// Projectiles of `state` that exist at its current tick.
    pub fn projectile_iter(&self, state: usize) -> impl Iterator<Item = &Projectile> {
        self.states.get(state).into_iter().flat_map(|s| {
            let tick = s.tick_now();
            s.entities().projectiles().filter(move |p| p.exists_at(tick))
        })
    }

    /// Actor `pid` in `state`, including one removed but not yet collected.
    pub fn actor(&self, state: usize, pid: Pid) -> Option<&Actor> {
        self.states.get(state)?.entities().actor(pid)
    }

    /// Event by key.
    pub fn event(&self, key: &EventKey) -> Option<&Event> {
        self.events.get(key)
    }

    /// Every event in key order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}
