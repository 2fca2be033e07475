//! FIFO macrotask queue.
//!
//! Tasks live in a map keyed by their handle. Handles grow monotonically, so
//! iteration order is schedule order. A turn runs only the tasks that were
//! already queued when it started; anything scheduled from inside a running
//! task is left for the next turn.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU64;

use tracing::{trace, warn};

use crate::{DrainError, QueueConfig, Scheduler, Task, TaskHandle};

struct QueueState {
    tasks: BTreeMap<u64, Task>,
    next_handle: u64,
    running: bool,
}

/// Single-threaded deferred task queue.
pub struct TaskQueue {
    state: RefCell<QueueState>,
    config: QueueConfig,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TaskQueue")
            .field("pending", &state.tasks.len())
            .field("next_handle", &state.next_handle)
            .field("running", &state.running)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the `running` flag even when a task panics.
struct RunningGuard<'a> {
    state: &'a RefCell<QueueState>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().running = false;
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            state: RefCell::new(QueueState {
                tasks: BTreeMap::new(),
                next_handle: 1,
                running: false,
            }),
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Whether `handle` is still waiting to run.
    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.state.borrow().tasks.contains_key(&handle.get())
    }

    /// Run every task that was queued when this turn started.
    ///
    /// Returns the number of tasks executed. Calling this from inside a
    /// running task does nothing and returns 0; the outer turn (or the next
    /// one) picks the work up.
    pub fn run_turn(&self) -> usize {
        let horizon = {
            let mut state = self.state.borrow_mut();
            if state.running {
                trace!("re-entrant turn ignored");
                return 0;
            }
            state.running = true;
            state.next_handle
        };
        let _guard = RunningGuard { state: &self.state };

        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                match state.tasks.first_key_value() {
                    Some((&handle, _)) if handle < horizon => state.tasks.remove_entry(&handle),
                    _ => None,
                }
            };
            let Some((handle, task)) = next else {
                break;
            };
            trace!(handle, "running task");
            task();
            ran += 1;
        }
        ran
    }

    /// Run turns until no task is left.
    ///
    /// Returns the total number of tasks executed, or
    /// [`DrainError::TurnLimit`] once [`QueueConfig::turn_limit`] turns have
    /// run and tasks are still pending.
    pub fn run_until_idle(&self) -> Result<usize, DrainError> {
        let mut total = 0;
        let mut turns = 0;
        while !self.is_idle() {
            if turns >= self.config.turn_limit {
                let pending = self.pending();
                warn!(turns, pending, "task queue did not go idle");
                return Err(DrainError::TurnLimit { turns, pending });
            }
            let ran = self.run_turn();
            turns += 1;
            if ran == 0 && self.state.borrow().running {
                // Called from inside a task: the outer turn owns the queue.
                break;
            }
            total += ran;
        }
        Ok(total)
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, task: Task) -> TaskHandle {
        let mut state = self.state.borrow_mut();
        let raw = state.next_handle;
        state.next_handle += 1;
        state.tasks.insert(raw, task);
        trace!(handle = raw, "task scheduled");
        // Handles start at 1 and only grow.
        TaskHandle::new(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    fn cancel(&self, handle: TaskHandle) {
        // Drop the task outside the borrow: its captures may touch the queue.
        let removed = self.state.borrow_mut().tasks.remove(&handle.get());
        if removed.is_some() {
            trace!(handle = handle.get(), "task cancelled");
        }
        drop(removed);
    }
}
