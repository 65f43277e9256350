//! Operation log replay.
//!
//! A replay log holds one JSON [`Operation`] per line. Blank lines and lines
//! starting with `#` are ignored. Loaded operations wait in a
//! [`ReplayQueue`] until the newest state reaches their tick, then enter the
//! environment exactly like operations arriving from the network.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use skirmish_core::Environment;
use skirmish_types::{Operation, Tick};
use tracing::{debug, warn};

/// Parse a replay log.
///
/// # Errors
///
/// Fails on the first line that is not a valid operation.
pub fn parse_operations(text: &str) -> anyhow::Result<Vec<Operation>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid operation on line {}", index.saturating_add(1)))
        })
        .collect()
}

/// Read and parse a replay log from disk.
///
/// # Errors
///
/// Fails if the file cannot be read or any line is not a valid operation.
pub fn load_operations(path: &Path) -> anyhow::Result<Vec<Operation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read replay log {}", path.display()))?;
    parse_operations(&text)
        .with_context(|| format!("failed to parse replay log {}", path.display()))
}

/// Result of one [`ReplayQueue::submit_due`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Submitted {
    /// Operations the environment accepted.
    pub accepted: usize,
    /// Operations the environment rejected.
    pub rejected: usize,
}

/// Operations waiting for the newest state to reach their tick.
#[derive(Debug, Default)]
pub struct ReplayQueue {
    pending: BTreeMap<Tick, Vec<Operation>>,
}

impl ReplayQueue {
    /// Queue operations. Operations sharing a tick keep their log order.
    pub fn extend(&mut self, operations: impl IntoIterator<Item = Operation>) {
        for operation in operations {
            self.pending.entry(operation.tick).or_default().push(operation);
        }
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Submit every queued operation whose tick the newest state has
    /// reached.
    pub fn submit_due(&mut self, env: &mut Environment) -> Submitted {
        let later = self.pending.split_off(&env.tick_now().saturating_add(1));
        let due = std::mem::replace(&mut self.pending, later);

        let mut submitted = Submitted::default();
        for operation in due.into_values().flatten() {
            let tick = operation.tick;
            match env.submit(operation) {
                Ok(seq) => {
                    debug!(tick, seq, "Replayed operation accepted");
                    submitted.accepted = submitted.accepted.saturating_add(1);
                }
                Err(err) => {
                    warn!(tick, %err, "Replayed operation rejected");
                    submitted.rejected = submitted.rejected.saturating_add(1);
                }
            }
        }
        submitted
    }
}
