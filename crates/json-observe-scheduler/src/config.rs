use serde::{Deserialize, Serialize};

/// Default bound on the number of turns a single drain may run.
pub const DEFAULT_TURN_LIMIT: usize = 1024;

/// Tuning knobs for [`TaskQueue`](crate::TaskQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of turns [`run_until_idle`](crate::TaskQueue::run_until_idle)
    /// runs before giving up. Tasks that keep scheduling follow-up tasks
    /// would otherwise never let the queue go idle.
    pub turn_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            turn_limit: DEFAULT_TURN_LIMIT,
        }
    }
}

impl QueueConfig {
    pub fn with_turn_limit(mut self, turn_limit: usize) -> Self {
        self.turn_limit = turn_limit;
        self
    }
}
