//! Observed nodes.
//!
//! A [`Node`] owns a keyed or sequence container plus its bookkeeping: the
//! change accumulator, the pending flush handle, the listener registry and
//! the scheduler flushes are deferred on. Every mutation goes through the
//! write trap in `handler`, which filters no-op writes, wraps plain
//! containers into nodes and records the change; `dispatch` turns recorded
//! changes into one deferred flush per node.
//!
//! # Invariants
//!
//! 1. After any write completes, every container reachable from a node is
//!    itself a node. Plain `Value::Array`/`Value::Object` are never stored.
//! 2. A node is never wrapped twice: wrapping a `Value::Node` returns it.
//! 3. At most one flush is pending per node; recording a change cancels the
//!    pending one and schedules a replacement. A pending flush owns its
//!    node, so it fires even after every other handle is dropped.
//! 4. Listeners run in registration order, once per flush, with the whole
//!    batch.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use json_observe_scheduler::{local_queue, Scheduler, TaskHandle};
use tracing::debug;

use crate::changes::Changes;
use crate::error::ObserveError;
use crate::listener::{Listener, Listeners};
use crate::pointer::{parse_pointer, PathStep};
use crate::value::Value;

mod dispatch;
mod handler;
pub mod sequence;

pub use sequence::{SequenceOp, Seq};

/// Where a key lands inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Key(String),
    Index(usize),
}

impl Slot {
    pub fn change_key(&self) -> String {
        match self {
            Slot::Key(k) => k.clone(),
            Slot::Index(i) => i.to_string(),
        }
    }
}

/// Largest index a sequence accepts; larger indices are treated like
/// non-index keys.
pub(crate) const MAX_INDEX: usize = 4_294_967_294;

pub(crate) enum Container {
    Keyed(IndexMap<String, Value>),
    Sequence(Vec<Value>),
}

impl Container {
    fn slot(&self, step: &PathStep) -> Option<Slot> {
        match self {
            Container::Keyed(_) => Some(Slot::Key(step.as_key().into_owned())),
            Container::Sequence(_) => step
                .as_index()
                .filter(|i| *i <= MAX_INDEX)
                .map(Slot::Index),
        }
    }

    fn get(&self, slot: &Slot) -> Option<&Value> {
        match (self, slot) {
            (Container::Keyed(map), Slot::Key(k)) => map.get(k),
            (Container::Sequence(items), Slot::Index(i)) => items.get(*i),
            _ => None,
        }
    }

    /// Store `value`, padding sequences with `Null` up to the index.
    /// Returns the replaced value, or `None` when the slot cannot hold a
    /// value and nothing was stored.
    fn put(&mut self, slot: &Slot, value: Value) -> Option<Option<Value>> {
        match (self, slot) {
            (Container::Keyed(map), Slot::Key(k)) => Some(map.insert(k.clone(), value)),
            (Container::Sequence(items), Slot::Index(i)) => {
                let len = i.checked_add(1)?;
                if len > items.len() {
                    items.resize(len, Value::Null);
                }
                Some(Some(std::mem::replace(&mut items[*i], value)))
            }
            _ => None,
        }
    }

    fn len(&self) -> usize {
        match self {
            Container::Keyed(map) => map.len(),
            Container::Sequence(items) => items.len(),
        }
    }
}

pub(crate) struct NodeState {
    pub container: Container,
    pub changes: Changes,
    pub pending: Option<TaskHandle>,
    pub listeners: Listeners,
    pub scheduler: Rc<dyn Scheduler>,
}

/// An observed object or array.
///
/// Cloning a `Node` yields another handle to the **same** node; identity is
/// compared with [`Node::ptr_eq`].
#[derive(Clone)]
pub struct Node {
    pub(crate) state: Rc<RefCell<NodeState>>,
}

/// Non-owning handle to a [`Node`].
#[derive(Clone)]
pub struct WeakNode {
    state: Weak<RefCell<NodeState>>,
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.state.upgrade().map(|state| Node { state })
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakNode")
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Node")
                .field("sequence", &matches!(state.container, Container::Sequence(_)))
                .field("len", &state.container.len())
                .field("pending_changes", &state.changes.len())
                .field("listeners", &state.listeners.len())
                .field("armed", &state.pending.is_some())
                .finish(),
            Err(_) => f.write_str("Node { <borrowed> }"),
        }
    }
}

impl Node {
    fn empty(container: Container, scheduler: Rc<dyn Scheduler>) -> Node {
        Node {
            state: Rc::new(RefCell::new(NodeState {
                container,
                changes: Changes::new(),
                pending: None,
                listeners: Listeners::default(),
                scheduler,
            })),
        }
    }

    /// Wrap `value` into an observed node, deferring flushes on the calling
    /// thread's default queue.
    ///
    /// Arrays become sequence nodes and objects keyed nodes; nested
    /// containers are wrapped recursively. An existing node is returned as
    /// is. Anything else has nothing to wrap and yields an empty keyed node.
    pub fn wrap(value: impl Into<Value>) -> Node {
        Node::wrap_in(value, local_queue())
    }

    /// Like [`Node::wrap`], deferring flushes on `scheduler`. Nested nodes
    /// created now or by later writes share it.
    pub fn wrap_in(value: impl Into<Value>, scheduler: Rc<dyn Scheduler>) -> Node {
        match value.into() {
            Value::Node(node) => node,
            Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|item| handler::adopt(item, &scheduler))
                    .collect();
                Node::empty(Container::Sequence(items), scheduler)
            }
            Value::Object(map) => {
                let map = map
                    .into_iter()
                    .map(|(k, v)| (k, handler::adopt(v, &scheduler)))
                    .collect();
                Node::empty(Container::Keyed(map), scheduler)
            }
            other => {
                debug!(value = ?other, "nothing to wrap; substituting an empty object");
                Node::empty(Container::Keyed(IndexMap::new()), scheduler)
            }
        }
    }

    /// Empty keyed node on the default queue.
    pub fn object() -> Node {
        Node::empty(Container::Keyed(IndexMap::new()), local_queue())
    }

    /// Empty sequence node on the default queue.
    pub fn array() -> Node {
        Node::empty(Container::Sequence(Vec::new()), local_queue())
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            state: Rc::downgrade(&self.state),
        }
    }

    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::clone(&self.state.borrow().scheduler)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.state.borrow().container, Container::Sequence(_))
    }

    /// Sequence view with the array operations, `None` for keyed nodes.
    pub fn as_seq(&self) -> Option<Seq> {
        self.is_sequence().then(|| Seq::new(self.clone()))
    }

    pub fn len(&self) -> usize {
        self.state.borrow().container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a flush is scheduled and not yet run.
    pub fn is_armed(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    /// Number of changes recorded since the last flush.
    pub fn pending_changes(&self) -> usize {
        self.state.borrow().changes.len()
    }

    // ── reads ─────────────────────────────────────────────────────────────

    pub fn get(&self, step: impl Into<PathStep>) -> Option<Value> {
        let state = self.state.borrow();
        let slot = state.container.slot(&step.into())?;
        state.container.get(&slot).cloned()
    }

    pub fn contains_key(&self, step: impl Into<PathStep>) -> bool {
        let state = self.state.borrow();
        state
            .container
            .slot(&step.into())
            .is_some_and(|slot| state.container.get(&slot).is_some())
    }

    /// Own keys in order; indices in decimal for sequences.
    pub fn keys(&self) -> Vec<String> {
        match &self.state.borrow().container {
            Container::Keyed(map) => map.keys().cloned().collect(),
            Container::Sequence(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }

    pub fn values(&self) -> Vec<Value> {
        match &self.state.borrow().container {
            Container::Keyed(map) => map.values().cloned().collect(),
            Container::Sequence(items) => items.clone(),
        }
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        match &self.state.borrow().container {
            Container::Keyed(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Container::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
        }
    }

    /// Walk `path` from this node. An empty path yields the node itself.
    pub fn find(&self, path: &[PathStep]) -> Option<Value> {
        let mut current = Value::Node(self.clone());
        for step in path {
            current = current.as_node()?.get(step.clone())?;
        }
        Some(current)
    }

    /// [`Node::find`] addressed by a JSON Pointer.
    pub fn find_ptr(&self, pointer: &str) -> Result<Option<Value>, ObserveError> {
        Ok(self.find(&parse_pointer(pointer)?))
    }

    // ── writes ────────────────────────────────────────────────────────────

    /// Write `value` at `step`.
    ///
    /// A value strictly equal to the current one is accepted without
    /// recording anything. Plain containers are wrapped before they are
    /// stored. Writes always succeed: the return value is `true`.
    pub fn set(&self, step: impl Into<PathStep>, value: impl Into<Value>) -> bool {
        handler::on_write(self, step.into(), value.into())
    }

    /// Delete `step`, returning the removed value.
    ///
    /// On keyed nodes the key is recorded with `Null` as its latest value.
    /// On sequences the element is spliced out and recorded as a `splice`.
    pub fn remove(&self, step: impl Into<PathStep>) -> Option<Value> {
        handler::on_remove(self, step.into())
    }

    // ── listeners ─────────────────────────────────────────────────────────

    /// Register `listener`. Registering the same handle twice makes it run
    /// twice per flush.
    pub fn listen(&self, listener: &Listener) -> &Self {
        self.state.borrow_mut().listeners.add(listener.clone());
        self
    }

    /// Register `callback` and return its handle for [`Node::unlisten`].
    pub fn on(&self, callback: impl Fn(&Changes) + 'static) -> Listener {
        let listener = Listener::new(callback);
        self.listen(&listener);
        listener
    }

    /// Remove one registration of `listener`, or every registration when
    /// `None`. An already armed flush still runs (and clears the batch).
    pub fn unlisten(&self, listener: Option<&Listener>) -> &Self {
        let mut state = self.state.borrow_mut();
        match listener {
            Some(l) => {
                state.listeners.remove(l);
            }
            None => state.listeners.clear(),
        }
        drop(state);
        self
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }
}

/// Wrap `value` on the calling thread's default queue. See [`Node::wrap`].
pub fn wrap(value: impl Into<Value>) -> Node {
    Node::wrap(value)
}
