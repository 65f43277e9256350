//! Skirmish simulation engine binary.
//!
//! Wires logging, configuration, the trailing-state environment and the
//! fixed-rate tick loop together, then runs until interrupted (Ctrl-C) or
//! until `engine.max_ticks` is reached.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `skirmish-config.yaml` (or `SKIRMISH_CONFIG`)
//! 3. Build the collision map, game settings and environment
//! 4. Start the worker runtime and the tick loop
//! 5. Queue the replay log on the worker pool, if configured
//! 6. Run the tick loop
//! 7. Log the result

mod error;
mod replay;

use std::sync::Arc;
use std::time::Duration;

use skirmish_core::{Environment, SkirmishConfig, SystemClock, TickedEventLoop};
use skirmish_types::Operation;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::replay::ReplayQueue;

/// Ticks between status lines.
const STATUS_INTERVAL: i64 = 500;

/// Everything the tick loop owns.
struct Engine {
    env: Environment,
    replay: ReplayQueue,
}

impl Engine {
    /// Advance the environment one tick and feed in due replay operations.
    fn on_tick(&mut self) {
        let summary = self.env.tick();
        self.replay.submit_due(&mut self.env);

        // Reset every newer state from the oldest diverging one.
        if let Some(older) = summary.desyncs.iter().map(|d| d.older).max() {
            warn!(
                tick = summary.tick,
                desyncs = summary.desyncs.len(),
                from_state = older,
                "Trailing states diverged, timewarping"
            );
            if let Err(err) = self.env.timewarp(older) {
                error!(%err, "Timewarp failed");
            }
        }
    }

    fn log_status(&self) {
        info!(
            tick = self.env.tick_now(),
            actors = self.env.actor_iter(0).count(),
            projectiles = self.env.projectile_iter(0).count(),
            events = self.env.events().count(),
            queued = self.replay.len(),
            "Engine status"
        );
    }
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("skirmish-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        tick_length_ms = config.engine.tick_length_ms,
        trailing_states = config.engine.trailing_states,
        trailing_state_delay = config.engine.trailing_state_delay,
        worker_threads = config.engine.worker_threads,
        game_documents = config.game.len(),
        "Configuration loaded"
    );

    // 3. Build the environment.
    let game = config.game_config().map_err(EngineError::from)?;
    let env = Environment::new(config.environment(), config.collision_map(), game, 0);
    let start_tick = env.tick_now();

    // 4. Start the worker runtime and the tick loop.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.engine.worker_threads)
        .thread_name("skirmish-worker")
        .enable_all()
        .build()
        .map_err(EngineError::from)?;

    let mut event_loop = TickedEventLoop::new(
        Engine {
            env,
            replay: ReplayQueue::default(),
        },
        Arc::new(SystemClock::new()),
        Duration::from_millis(config.engine.tick_length_ms),
        start_tick,
        runtime.handle().clone(),
        config.engine.worker_threads,
    )
    .map_err(EngineError::from)?;

    let interrupt = event_loop.interrupt_handle();
    let max_ticks = config.engine.max_ticks;
    event_loop.add_tick_callback(move |engine: &mut Engine, tick| {
        engine.on_tick();
        if max_ticks.is_some_and(|max| tick >= max) {
            info!(tick, "Tick limit reached");
            interrupt.interrupt();
        }
    });
    event_loop.add_timer(STATUS_INTERVAL, |engine: &mut Engine, _| {
        engine.log_status();
        true
    });

    let ctrl_c = event_loop.interrupt_handle();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            ctrl_c.interrupt();
        }
    });

    // 5. Queue the replay log.
    if let Some(path) = config.replay.clone() {
        info!(path = %path.display(), "Loading replay log");
        event_loop.add_worker_task(
            move |_| replay::load_operations(&path),
            |engine: &mut Engine, result: anyhow::Result<Vec<Operation>>| match result {
                Ok(operations) => {
                    info!(operations = operations.len(), "Replay log loaded");
                    engine.replay.extend(operations);
                }
                Err(err) => error!(error = %format!("{err:#}"), "Failed to load replay log"),
            },
        );
    }

    // 6. Run.
    event_loop.run();

    // 7. Log results.
    let mut engine = event_loop.into_state();
    engine.log_status();
    info!(
        tick = engine.env.tick_now(),
        desyncs = engine.env.take_desyncs().len(),
        "skirmish-engine shutdown complete"
    );
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}

/// Load the engine configuration.
///
/// Reads `SKIRMISH_CONFIG` if set, otherwise `skirmish-config.yaml` relative
/// to the current working directory. A missing file means defaults.
fn load_config() -> Result<SkirmishConfig, EngineError> {
    let config_path = SkirmishConfig::default_path();
    if config_path.exists() {
        let config = SkirmishConfig::from_file(&config_path)?;
        Ok(config)
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        Ok(SkirmishConfig::default())
    }
}
