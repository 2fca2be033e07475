//! Observable JSON-like state trees.
//!
//! [`wrap`] turns an object or array into an observed [`Node`]. Nested
//! containers become nodes too, now and whenever they are written later.
//! Every effective write is recorded in the node's change batch, and one
//! deferred flush per node delivers the whole batch to the node's listeners
//! after the current synchronous work finishes.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use json_observe::{run_until_idle, wrap};
//! use serde_json::json;
//!
//! let state = wrap(json!({"count": 0, "items": []}));
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! state.on(move |changes| sink.borrow_mut().push(changes.to_json()));
//!
//! state.set("count", 1);
//! state.set("count", 2);
//! state.set("label", "two");
//! run_until_idle().unwrap();
//!
//! assert_eq!(*seen.borrow(), vec![json!({"count": 2, "label": "two"})]);
//! ```
//!
//! Array operations live on the [`Seq`] view of a sequence node; the ones
//! that mutate in place are recorded under their name:
//!
//! ```
//! use json_observe::{run_until_idle, wrap, Value};
//! use serde_json::json;
//!
//! let list = wrap(json!([3, 1, 2])).as_seq().unwrap();
//! list.on(|changes| assert!(changes.contains_key("sort")));
//! list.sort();
//! run_until_idle().unwrap();
//! assert_eq!(list.to_json(), json!([1, 2, 3]));
//! assert_eq!(list.get(0usize), Some(Value::from(1)));
//! ```

pub mod changes;
pub mod error;
pub mod listener;
pub mod node;
pub mod pointer;
pub mod replay;
mod serialize;
pub mod value;

pub use changes::Changes;
pub use error::ObserveError;
pub use listener::Listener;
pub use node::{wrap, Node, Seq, SequenceOp, WeakNode};
pub use pointer::{format_pointer, parse_pointer, PathStep};
pub use value::Value;

pub use json_observe_scheduler::{
    local_queue, run_turn, run_until_idle, DrainError, QueueConfig, Scheduler, Task, TaskHandle,
    TaskQueue,
};

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
