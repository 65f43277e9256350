//! Errors returned when the environment rejects an operation.

use skirmish_types::{Pid, ShipId, Tick};

/// Why an operation or configuration document was rejected.
///
/// A rejected operation never reaches any todo list, so no state is
/// modified.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// The tick is older than the oldest state can replay.
    #[error("operation at tick {tick} is older than the window (oldest accepted {oldest})")]
    TooOld {
        /// Tick of the rejected operation.
        tick: Tick,
        /// Oldest tick that would have been accepted.
        oldest: Tick,
    },

    /// The tick lies beyond the newest state.
    #[error("operation at tick {tick} is in the future (newest state at {newest})")]
    InFuture {
        /// Tick of the rejected operation.
        tick: Tick,
        /// Current tick of the newest state.
        newest: Tick,
    },

    /// The ship id is not defined at the operation's tick.
    #[error("unknown ship {ship} at tick {tick}")]
    UnknownShip {
        /// The undefined ship id.
        ship: ShipId,
        /// Tick of the rejected operation.
        tick: Tick,
    },

    /// The movement code does not fit in four bits.
    #[error("invalid movement code {code}")]
    InvalidMovement {
        /// The rejected code.
        code: u8,
    },

    /// An actor with this pid already exists in the newest state.
    #[error("actor {pid} already exists")]
    DuplicateActor {
        /// The duplicated pid.
        pid: Pid,
    },

    /// A state index is out of range.
    #[error("no trailing state with index {state}")]
    InvalidState {
        /// The requested state index.
        state: usize,
    },

    /// A configuration document failed to load.
    #[error("config error: {source}")]
    Config {
        /// The underlying settings error.
        #[from]
        source: skirmish_entities::ConfigError,
    },
}
