//! Scheduling modes - how readiness is enforced

use serde::{Deserialize, Serialize};
use std::fmt;

/// Readiness policy for one running period of the scheduler
///
/// - `Unordered`: no readiness checks; everything submitted is runnable.
/// - `OrderedRetry`: readiness checked at dequeue; a stale task goes back to
///   the tail and the next one is tried.
/// - `OrderedPrecompute`: readiness checked once at submission; stale tasks
///   wait in a separate set that idle workers rescan opportunistically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchedulingMode {
    Unordered,
    OrderedRetry,
    #[default]
    OrderedPrecompute,
}

impl SchedulingMode {
    /// All modes, in order of increasing strictness
    pub const ALL: [SchedulingMode; 3] = [
        SchedulingMode::Unordered,
        SchedulingMode::OrderedRetry,
        SchedulingMode::OrderedPrecompute,
    ];

    /// Whether the mode ever consults `Task::is_ready`
    pub fn checks_readiness(&self) -> bool {
        !matches!(self, SchedulingMode::Unordered)
    }

    /// Whether the mode keeps a waiting set
    pub fn uses_waiting_set(&self) -> bool {
        matches!(self, SchedulingMode::OrderedPrecompute)
    }
}

impl fmt::Display for SchedulingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulingMode::Unordered => "UNORDERED",
            SchedulingMode::OrderedRetry => "ORDERED_RETRY",
            SchedulingMode::OrderedPrecompute => "ORDERED_PRECOMPUTE",
        };
        f.write_str(name)
    }
}
