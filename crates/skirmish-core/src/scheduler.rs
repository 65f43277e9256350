//! Fixed-length tick scheduler with timers and a bounded worker pool.
//!
//! [`TickedEventLoop`] owns the simulation value and runs every callback on
//! one thread. Blocking work (file loading, decoding) runs on the tokio
//! blocking pool, gated by a semaphore so at most `worker_threads` tasks run
//! at once. Finished results travel back over a channel and are handed to
//! their completion callback on the loop thread before the next tick's
//! callbacks, so the simulation value is never touched concurrently.
//!
//! Tick timing comes from a [`MonotonicClock`]. When real time has moved
//! more than one tick length since the last iteration (a stall), the loop
//! runs every due tick back to back; no tick is ever skipped.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use skirmish_types::Tick;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Longest the loop sleeps before re-checking the interrupt flag.
const MAX_IDLE: Duration = Duration::from_millis(5);

/// Errors raised when constructing a scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The tick length is zero or negative.
    #[error("invalid tick length: {nanos} ns")]
    InvalidTickLength {
        /// The rejected length in nanoseconds.
        nanos: i64,
    },

    /// The worker pool has no threads.
    #[error("worker pool needs at least one thread")]
    NoWorkers,
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// A monotonic nanosecond clock.
pub trait MonotonicClock: Send + Sync {
    /// Nanoseconds since an arbitrary fixed origin.
    fn now_nanos(&self) -> i64;
}

/// Wall-clock time based on [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// A clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now_nanos(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicI64>,
}

impl ManualClock {
    /// A clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current time.
    pub fn set(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    /// Move time forward.
    pub fn advance(&self, nanos: i64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Interruption
// ---------------------------------------------------------------------------

/// Read side of the interrupt flag, handed to worker tasks.
#[derive(Debug, Clone)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Whether the loop has been asked to stop.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Write side of the interrupt flag. Safe to use from any thread.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Ask the loop (and any worker watching [`Interrupt`]) to stop.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

type TickCallback<S> = Box<dyn FnMut(&mut S, Tick)>;
type TimerCallback<S> = Box<dyn FnMut(&mut S, Tick) -> bool>;
type Completion<S> = Box<dyn FnOnce(&mut S, Box<dyn Any + Send>)>;
type WorkerResult = (u64, Option<Box<dyn Any + Send>>);

struct Timer<S> {
    interval: Tick,
    next_tick: Tick,
    callback: TimerCallback<S>,
}

/// Single-threaded tick loop owning the simulation value `S`.
pub struct TickedEventLoop<S> {
    state: S,
    clock: Arc<dyn MonotonicClock>,
    tick_length_nanos: i64,
    /// Last tick that ran.
    current_tick: Tick,
    /// Clock time at which `current_tick + 1` is due.
    next_tick_at: i64,
    tick_callbacks: Vec<TickCallback<S>>,
    timers: Vec<Timer<S>>,
    runtime: Handle,
    permits: Arc<Semaphore>,
    results_tx: UnboundedSender<WorkerResult>,
    results_rx: UnboundedReceiver<WorkerResult>,
    pending: BTreeMap<u64, Completion<S>>,
    next_task_id: u64,
    interrupt: Arc<AtomicBool>,
}

impl<S: 'static> TickedEventLoop<S> {
    /// Create a loop whose last completed tick is `start_tick`. The next
    /// tick is due one tick length from now.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if the tick length is not positive or the
    /// worker pool is empty.
    pub fn new(
        state: S,
        clock: Arc<dyn MonotonicClock>,
        tick_length: Duration,
        start_tick: Tick,
        runtime: Handle,
        worker_threads: usize,
    ) -> Result<Self, SchedulerError> {
        let tick_length_nanos = i64::try_from(tick_length.as_nanos()).unwrap_or(i64::MAX);
        if tick_length_nanos <= 0 {
            return Err(SchedulerError::InvalidTickLength {
                nanos: tick_length_nanos,
            });
        }
        if worker_threads == 0 {
            return Err(SchedulerError::NoWorkers);
        }
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let next_tick_at = clock.now_nanos().saturating_add(tick_length_nanos);
        Ok(Self {
            state,
            clock,
            tick_length_nanos,
            current_tick: start_tick,
            next_tick_at,
            tick_callbacks: Vec::new(),
            timers: Vec::new(),
            runtime,
            permits: Arc::new(Semaphore::new(worker_threads)),
            results_tx,
            results_rx,
            pending: BTreeMap::new(),
            next_task_id: 0,
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The simulation value.
    pub const fn state(&self) -> &S {
        &self.state
    }

    /// The simulation value, mutably.
    pub const fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Consume the loop and return the simulation value.
    pub fn into_state(self) -> S {
        self.state
    }

    /// Last tick that ran.
    pub const fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Clock time the next tick is due at.
    pub const fn next_tick_at(&self) -> i64 {
        self.next_tick_at
    }

    /// Worker tasks whose completion has not run yet.
    pub fn pending_tasks(&self) -> usize {
        self.pending.len()
    }

    /// A handle that stops the loop from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            flag: Arc::clone(&self.interrupt),
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Run `callback` on every tick.
    pub fn add_tick_callback(&mut self, callback: impl FnMut(&mut S, Tick) + 'static) {
        self.tick_callbacks.push(Box::new(callback));
    }

    /// Run `callback` every `interval` ticks, starting `interval` ticks from
    /// now. The timer is cancelled when the callback returns `false`.
    pub fn add_timer(
        &mut self,
        interval: Tick,
        callback: impl FnMut(&mut S, Tick) -> bool + 'static,
    ) {
        let interval = interval.max(1);
        self.timers.push(Timer {
            interval,
            next_tick: self.current_tick.saturating_add(interval),
            callback: Box::new(callback),
        });
    }

    /// Run `work` on the worker pool and `done` with its result on the loop
    /// thread. Returns the task id.
    ///
    /// `work` must not touch simulation state; it receives the interrupt
    /// flag so long tasks can stop early.
    pub fn add_worker_task<T, W, D>(&mut self, work: W, done: D) -> u64
    where
        T: Send + 'static,
        W: FnOnce(&Interrupt) -> T + Send + 'static,
        D: FnOnce(&mut S, T) + 'static,
    {
        let id = self.next_task_id;
        self.next_task_id = id.saturating_add(1);

        self.pending.insert(
            id,
            Box::new(move |state: &mut S, result: Box<dyn Any + Send>| {
                match result.downcast::<T>() {
                    Ok(value) => done(state, *value),
                    Err(_) => warn!(task = id, "Worker result had an unexpected type"),
                }
            }),
        );

        let tx = self.results_tx.clone();
        let permits = Arc::clone(&self.permits);
        let interrupt = Interrupt {
            flag: Arc::clone(&self.interrupt),
        };
        self.runtime.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let result = tokio::task::spawn_blocking(move || work(&interrupt)).await;
            let message = match result {
                Ok(value) => Some(Box::new(value) as Box<dyn Any + Send>),
                Err(err) => {
                    warn!(task = id, %err, "Worker task failed");
                    None
                }
            };
            if tx.send((id, message)).is_err() {
                debug!(task = id, "Event loop gone, dropping worker result");
            }
        });
        id
    }

    /// Hand every finished worker result to its completion callback.
    fn deliver_results(&mut self) -> usize {
        let mut delivered = 0_usize;
        while let Ok((id, result)) = self.results_rx.try_recv() {
            let Some(completion) = self.pending.remove(&id) else {
                continue;
            };
            if let Some(result) = result {
                completion(&mut self.state, result);
                delivered = delivered.saturating_add(1);
            }
        }
        delivered
    }

    fn run_tick(&mut self, tick: Tick) {
        for callback in &mut self.tick_callbacks {
            callback(&mut self.state, tick);
        }
        let state = &mut self.state;
        self.timers.retain_mut(|timer| {
            if tick < timer.next_tick {
                return true;
            }
            timer.next_tick = tick.saturating_add(timer.interval);
            (timer.callback)(state, tick)
        });
    }

    /// One loop iteration: deliver worker results, then run every tick
    /// that is due. Returns the number of ticks run.
    pub fn loop_once(&mut self) -> usize {
        self.deliver_results();
        let now = self.clock.now_nanos();
        let mut ran = 0_usize;
        while now >= self.next_tick_at && !self.interrupted() {
            let tick = self.current_tick.saturating_add(1);
            self.run_tick(tick);
            self.current_tick = tick;
            self.next_tick_at = self.next_tick_at.saturating_add(self.tick_length_nanos);
            ran = ran.saturating_add(1);
            self.deliver_results();
        }
        if ran > 1 {
            debug!(ticks = ran, tick = self.current_tick, "Caught up after stall");
        }
        ran
    }

    /// Re-anchor timing so that `tick` corresponds to clock time
    /// `tick_at_nanos`. The tick counter itself is unchanged; only the time
    /// the next tick is due moves.
    pub fn synchronize(&mut self, tick_at_nanos: i64, tick: Tick) {
        let ticks_ahead = self.current_tick.saturating_add(1).saturating_sub(tick);
        self.next_tick_at =
            tick_at_nanos.saturating_add(ticks_ahead.saturating_mul(self.tick_length_nanos));
        debug!(tick, tick_at_nanos, next_tick_at = self.next_tick_at, "Scheduler synchronized");
    }

    /// Loop until interrupted, sleeping between ticks.
    pub fn run(&mut self) {
        info!(
            tick = self.current_tick,
            tick_length_ns = self.tick_length_nanos,
            "Tick loop starting"
        );
        while !self.interrupted() {
            self.loop_once();
            let wait = self.next_tick_at.saturating_sub(self.clock.now_nanos());
            if wait > 0 {
                let wait = Duration::from_nanos(u64::try_from(wait).unwrap_or(0));
                std::thread::sleep(wait.min(MAX_IDLE));
            }
        }
        info!(tick = self.current_tick, pending = self.pending.len(), "Tick loop stopped");
    }
}
