//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps every failure
//! mode during startup, so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: skirmish_core::EngineConfigError,
    },

    /// The tick loop could not be created.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: skirmish_core::SchedulerError,
    },

    /// The worker runtime failed to start.
    #[error("runtime error: {source}")]
    Runtime {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
