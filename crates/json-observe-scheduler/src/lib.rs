//! Deferred single-shot task scheduling for json-observe.
//!
//! A [`Scheduler`] runs a task exactly once, soon after the current
//! synchronous unit of work, and lets the caller cancel a task that has not
//! run yet. This is a same-turn deferral, not a precision timer.
//!
//! [`TaskQueue`] is the default implementation: a FIFO macrotask queue that
//! the host drives one turn at a time. Every thread owns a lazily created
//! queue reachable through [`local_queue`], which plays the role of the host
//! event loop.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use json_observe_scheduler::{local_queue, run_turn, Scheduler};
//!
//! let hits = Rc::new(Cell::new(0));
//! let queue = local_queue();
//!
//! let h = Rc::clone(&hits);
//! let first = queue.schedule(Box::new(move || h.set(h.get() + 1)));
//! let h = Rc::clone(&hits);
//! queue.schedule(Box::new(move || h.set(h.get() + 10)));
//! queue.cancel(first);
//!
//! assert_eq!(run_turn(), 1);
//! assert_eq!(hits.get(), 10);
//! ```

use std::fmt;
use std::num::NonZeroU64;
use std::rc::Rc;

pub mod config;
pub mod error;
pub mod queue;

pub use config::QueueConfig;
pub use error::DrainError;
pub use queue::TaskQueue;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Opaque id of a scheduled task.
///
/// Handles are handed out in increasing order starting at 1, so comparing
/// two handles from the same scheduler compares their schedule time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(NonZeroU64);

impl TaskHandle {
    pub(crate) fn new(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// Raw numeric id.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Schedule-and-cancel contract used by observed nodes to defer flushes.
pub trait Scheduler {
    /// Queue `task` to run once, after the current synchronous execution.
    fn schedule(&self, task: Task) -> TaskHandle;

    /// Prevent a not-yet-run task from running. No-op for handles that
    /// already ran or were already cancelled.
    fn cancel(&self, handle: TaskHandle);
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
    fn schedule(&self, task: Task) -> TaskHandle {
        (**self).schedule(task)
    }

    fn cancel(&self, handle: TaskHandle) {
        (**self).cancel(handle)
    }
}

thread_local! {
    static LOCAL_QUEUE: Rc<TaskQueue> = Rc::new(TaskQueue::new());
}

/// The calling thread's default queue.
pub fn local_queue() -> Rc<TaskQueue> {
    LOCAL_QUEUE.with(Rc::clone)
}

/// Run one turn of the calling thread's default queue.
///
/// Returns the number of tasks executed.
pub fn run_turn() -> usize {
    local_queue().run_turn()
}

/// Drain the calling thread's default queue.
///
/// Returns the number of tasks executed.
pub fn run_until_idle() -> Result<usize, DrainError> {
    local_queue().run_until_idle()
}

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
