//! Trailing-state environment, rollback replay and tick scheduling for the
//! Skirmish simulation core.
//!
//! This crate owns the per-tick step of a state (apply operations, actor
//! physics, projectile physics, commit), the environment that keeps several
//! trailing states in agreement, and the fixed-rate loop that drives it.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `skirmish-config.yaml` into
//!   strongly-typed structs.
//! - [`environment`] -- [`Environment`]: operation acceptance, rollback
//!   replay, consistency sweep, timewarp and fork.
//! - [`error`] -- [`OperationError`] for rejected operations.
//! - [`scheduler`] -- [`TickedEventLoop`] with timers, worker tasks and
//!   clock synchronization.
//! - [`state`] -- A single trailing [`State`].
//!
//! [`Environment`]: environment::Environment
//! [`OperationError`]: error::OperationError
//! [`TickedEventLoop`]: scheduler::TickedEventLoop
//! [`State`]: state::State

mod apply;
pub mod config;
pub mod environment;
pub mod error;
mod physics;
pub mod scheduler;
pub mod state;

pub use apply::HINT_TOLERANCE;
pub use config::{EngineConfig, EngineConfigError, MapConfig, SkirmishConfig};
pub use environment::{Environment, EnvironmentConfig, TickSummary};
pub use error::OperationError;
pub use scheduler::{
    Interrupt, InterruptHandle, ManualClock, MonotonicClock, SchedulerError, SystemClock,
    TickedEventLoop,
};
pub use state::State;
