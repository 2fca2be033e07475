//! Change batching: record, (re)arm, flush.
//!
//! Per node the state machine is `Idle -> Armed` on the first recorded
//! change, `Armed -> Armed` on every further change (cancel the pending task,
//! schedule a new one), and `Armed -> Idle` when the task fires.

use std::rc::Rc;

use tracing::{debug, trace};

use super::Node;
use crate::value::Value;

pub(crate) fn record(node: &Node, key: String, value: Value) {
    trace!(key = %key, "change recorded");
    let (scheduler, previous) = {
        let mut state = node.state.borrow_mut();
        state.changes.record(key, value);
        (Rc::clone(&state.scheduler), state.pending.take())
    };
    if let Some(handle) = previous {
        scheduler.cancel(handle);
    }
    // The task owns the node until it runs: an armed flush always fires,
    // even if every other handle is gone by then.
    let armed = node.clone();
    let handle = scheduler.schedule(Box::new(move || flush(&armed)));
    node.state.borrow_mut().pending = Some(handle);
}

/// Deliver the batch to every listener, in registration order.
///
/// The batch is detached before any listener runs: changes made from inside
/// a listener start the next batch. A panicking listener is logged and the
/// rest still run.
pub(crate) fn flush(node: &Node) {
    let (changes, listeners) = {
        let mut state = node.state.borrow_mut();
        state.pending = None;
        (state.changes.take(), state.listeners.snapshot())
    };
    if listeners.is_empty() {
        debug!(changes = changes.len(), "flush without listeners; batch dropped");
        return;
    }
    debug!(
        changes = changes.len(),
        listeners = listeners.len(),
        "flushing changes"
    );
    for listener in &listeners {
        listener.notify(&changes);
    }
}
