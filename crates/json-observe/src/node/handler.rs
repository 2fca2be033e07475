//! Write trap: the policy every keyed or index write goes through.

use std::rc::Rc;

use json_observe_scheduler::Scheduler;
use tracing::debug;

use super::{dispatch, Container, Node, Slot};
use crate::pointer::PathStep;
use crate::value::Value;

/// Wrap plain containers into nodes sharing `scheduler`; anything else,
/// nodes included, is stored as is.
pub(crate) fn adopt(value: Value, scheduler: &Rc<dyn Scheduler>) -> Value {
    if value.is_plain_container() {
        Value::Node(Node::wrap_in(value, Rc::clone(scheduler)))
    } else {
        value
    }
}

/// Commit `value` at `step` and record the change, unless the current value
/// is strictly equal. Always accepts.
pub(crate) fn on_write(node: &Node, step: PathStep, value: Value) -> bool {
    let (slot, scheduler) = {
        let state = node.state.borrow();
        let Some(slot) = state.container.slot(&step) else {
            debug!(key = %step, "key is not a valid sequence index; write ignored");
            return true;
        };
        if state
            .container
            .get(&slot)
            .is_some_and(|current| current.strict_eq(&value))
        {
            return true;
        }
        (slot, Rc::clone(&state.scheduler))
    };

    let stored = adopt(value, &scheduler);
    let put = node.state.borrow_mut().container.put(&slot, stored.clone());
    match put {
        Some(replaced) => {
            drop(replaced);
            dispatch::record(node, slot.change_key(), stored);
        }
        None => debug!(key = %step, "slot cannot hold a value; write ignored"),
    }
    true
}

pub(crate) fn on_remove(node: &Node, step: PathStep) -> Option<Value> {
    let removed = {
        let mut state = node.state.borrow_mut();
        let slot = state.container.slot(&step)?;
        match (&mut state.container, slot) {
            (Container::Keyed(map), Slot::Key(k)) => map.shift_remove(&k).map(|v| (k, v)),
            (Container::Sequence(items), Slot::Index(i)) if i < items.len() => {
                Some((String::from("splice"), items.remove(i)))
            }
            _ => None,
        }
    };
    let (key, old) = removed?;
    let recorded = if node.is_sequence() {
        Value::Node(node.clone())
    } else {
        Value::Null
    };
    dispatch::record(node, key, recorded);
    Some(old)
}
