//! Array operations on sequence nodes.
//!
//! In-place operations (`push`, `sort`, `splice`, ...) do not go through
//! per-index writes, so each one is routed through [`Seq::apply`]: run the
//! operation on the underlying items, then, if the operation is classified
//! as mutating in [`SequenceOp`], record the whole node under the operation
//! name. Reading operations delegate and never record.

use std::cmp::Ordering;
use std::ops::{Deref, Range};
use std::rc::Rc;

use tracing::debug;

use super::{dispatch, handler, Container, Node, MAX_INDEX};
use crate::serialize::{join_values, js_string};
use crate::value::Value;

/// Every operation a [`Seq`] exposes, with its dispatch classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceOp {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
    Sort,
    Reverse,
    Fill,
    CopyWithin,
    Map,
    Filter,
    Slice,
    Concat,
    ForEach,
    Reduce,
    ReduceRight,
    Includes,
    IndexOf,
    LastIndexOf,
    Find,
    FindIndex,
    Every,
    Some,
    Join,
    Entries,
    Keys,
    Values,
}

impl SequenceOp {
    /// Every operation, mutating ones first.
    pub const ALL: [SequenceOp; 27] = [
        SequenceOp::Push,
        SequenceOp::Pop,
        SequenceOp::Shift,
        SequenceOp::Unshift,
        SequenceOp::Splice,
        SequenceOp::Sort,
        SequenceOp::Reverse,
        SequenceOp::Fill,
        SequenceOp::CopyWithin,
        SequenceOp::Map,
        SequenceOp::Filter,
        SequenceOp::Slice,
        SequenceOp::Concat,
        SequenceOp::ForEach,
        SequenceOp::Reduce,
        SequenceOp::ReduceRight,
        SequenceOp::Includes,
        SequenceOp::IndexOf,
        SequenceOp::LastIndexOf,
        SequenceOp::Find,
        SequenceOp::FindIndex,
        SequenceOp::Every,
        SequenceOp::Some,
        SequenceOp::Join,
        SequenceOp::Entries,
        SequenceOp::Keys,
        SequenceOp::Values,
    ];

    /// Name recorded in the change batch.
    pub fn name(self) -> &'static str {
        match self {
            SequenceOp::Push => "push",
            SequenceOp::Pop => "pop",
            SequenceOp::Shift => "shift",
            SequenceOp::Unshift => "unshift",
            SequenceOp::Splice => "splice",
            SequenceOp::Sort => "sort",
            SequenceOp::Reverse => "reverse",
            SequenceOp::Fill => "fill",
            SequenceOp::CopyWithin => "copy_within",
            SequenceOp::Map => "map",
            SequenceOp::Filter => "filter",
            SequenceOp::Slice => "slice",
            SequenceOp::Concat => "concat",
            SequenceOp::ForEach => "for_each",
            SequenceOp::Reduce => "reduce",
            SequenceOp::ReduceRight => "reduce_right",
            SequenceOp::Includes => "includes",
            SequenceOp::IndexOf => "index_of",
            SequenceOp::LastIndexOf => "last_index_of",
            SequenceOp::Find => "find",
            SequenceOp::FindIndex => "find_index",
            SequenceOp::Every => "every",
            SequenceOp::Some => "some",
            SequenceOp::Join => "join",
            SequenceOp::Entries => "entries",
            SequenceOp::Keys => "keys",
            SequenceOp::Values => "values",
        }
    }

    /// Whether the operation mutates in place and must trigger a flush.
    pub fn dispatches(self) -> bool {
        matches!(
            self,
            SequenceOp::Push
                | SequenceOp::Pop
                | SequenceOp::Shift
                | SequenceOp::Unshift
                | SequenceOp::Splice
                | SequenceOp::Sort
                | SequenceOp::Reverse
                | SequenceOp::Fill
                | SequenceOp::CopyWithin
        )
    }

    pub fn from_name(name: &str) -> Option<SequenceOp> {
        SequenceOp::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// Resolve a possibly negative position against `len`, clamped to `0..=len`.
fn relative(pos: isize, len: usize) -> usize {
    if pos < 0 {
        len.saturating_sub(pos.unsigned_abs())
    } else {
        pos.unsigned_abs().min(len)
    }
}

fn bounds(start: isize, end: Option<isize>, len: usize) -> Range<usize> {
    let start = relative(start, len);
    let end = end.map_or(len, |e| relative(e, len));
    start..end.max(start)
}

/// Array view of a sequence [`Node`].
///
/// Obtained from [`Node::as_seq`]; derefs to the node for reads, writes and
/// listeners.
#[derive(Debug, Clone)]
pub struct Seq {
    node: Node,
}

impl Deref for Seq {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl Seq {
    pub(crate) fn new(node: Node) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    /// Run `op`, then record it if it is classified as mutating.
    fn apply<R>(&self, op: SequenceOp, run: impl FnOnce() -> R) -> R {
        let out = run();
        if op.dispatches() {
            dispatch::record(&self.node, op.name().to_string(), Value::Node(self.node.clone()));
        }
        out
    }

    fn with_items<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let mut state = self.node.state.borrow_mut();
        match &mut state.container {
            Container::Sequence(items) => f(items),
            // A Seq is only built over sequence nodes.
            Container::Keyed(_) => f(&mut Vec::new()),
        }
    }

    fn adopt(&self, value: Value) -> Value {
        handler::adopt(value, &self.node.state.borrow().scheduler)
    }

    fn adopt_all(&self, values: Vec<Value>) -> Vec<Value> {
        let scheduler = Rc::clone(&self.node.state.borrow().scheduler);
        values
            .into_iter()
            .map(|v| handler::adopt(v, &scheduler))
            .collect()
    }

    /// Copy of the current elements; callbacks run against it so they may
    /// freely read or write the node.
    fn snapshot(&self) -> Vec<Value> {
        self.node.values()
    }

    fn replace_items(&self, items: Vec<Value>) {
        let previous = self.with_items(|current| std::mem::replace(current, items));
        drop(previous);
    }

    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.snapshot().into_iter()
    }

    // ── mutating ──────────────────────────────────────────────────────────

    /// Append `value`; returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        self.push_all(vec![value.into()])
    }

    /// Append every value in one operation; returns the new length.
    pub fn push_all(&self, values: Vec<Value>) -> usize {
        let values = self.adopt_all(values);
        self.apply(SequenceOp::Push, || {
            self.with_items(|items| {
                items.extend(values);
                items.len()
            })
        })
    }

    pub fn pop(&self) -> Option<Value> {
        self.apply(SequenceOp::Pop, || self.with_items(Vec::pop))
    }

    pub fn shift(&self) -> Option<Value> {
        self.apply(SequenceOp::Shift, || {
            self.with_items(|items| (!items.is_empty()).then(|| items.remove(0)))
        })
    }

    /// Prepend `value`; returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        self.unshift_all(vec![value.into()])
    }

    /// Prepend every value, keeping their order; returns the new length.
    pub fn unshift_all(&self, values: Vec<Value>) -> usize {
        let values = self.adopt_all(values);
        self.apply(SequenceOp::Unshift, || {
            self.with_items(|items| {
                items.splice(0..0, values);
                items.len()
            })
        })
    }

    /// Remove `delete_count` elements at `start` (all remaining when `None`)
    /// and insert `insert` in their place. Returns the removed elements.
    pub fn splice(&self, start: isize, delete_count: Option<usize>, insert: Vec<Value>) -> Vec<Value> {
        let insert = self.adopt_all(insert);
        self.apply(SequenceOp::Splice, || {
            self.with_items(|items| {
                let len = items.len();
                let start = relative(start, len);
                let end = delete_count.map_or(len, |n| start.saturating_add(n).min(len));
                items.splice(start..end, insert).collect()
            })
        })
    }

    /// Sort by the elements' string forms. Stable.
    pub fn sort(&self) -> &Self {
        self.apply(SequenceOp::Sort, || {
            let mut items = self.snapshot();
            items.sort_by_cached_key(js_string);
            self.replace_items(items);
        });
        self
    }

    /// Sort with a comparator. Stable.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> &Self {
        self.apply(SequenceOp::Sort, || {
            let mut items = self.snapshot();
            items.sort_by(compare);
            self.replace_items(items);
        });
        self
    }

    pub fn reverse(&self) -> &Self {
        self.apply(SequenceOp::Reverse, || self.with_items(|items| items.reverse()));
        self
    }

    /// Overwrite `start..end` with `value`. A plain container is wrapped once
    /// and the same node is stored at every position.
    pub fn fill(&self, value: impl Into<Value>, start: isize, end: Option<isize>) -> &Self {
        let value = self.adopt(value.into());
        self.apply(SequenceOp::Fill, || {
            let previous: Vec<Value> = self.with_items(|items| {
                let range = bounds(start, end, items.len());
                items[range]
                    .iter_mut()
                    .map(|slot| std::mem::replace(slot, value.clone()))
                    .collect()
            });
            drop(previous);
        });
        self
    }

    /// Copy `start..end` to position `target` within the sequence, without
    /// changing its length.
    pub fn copy_within(&self, target: isize, start: isize, end: Option<isize>) -> &Self {
        self.apply(SequenceOp::CopyWithin, || {
            let previous: Vec<Value> = self.with_items(|items| {
                let len = items.len();
                let to = relative(target, len);
                let from = bounds(start, end, len);
                let count = from.len().min(len - to);
                let copied: Vec<Value> = items[from.start..from.start + count].to_vec();
                items[to..to + count]
                    .iter_mut()
                    .zip(copied)
                    .map(|(slot, v)| std::mem::replace(slot, v))
                    .collect()
            });
            drop(previous);
        });
        self
    }

    /// Truncate or pad with `Null`. Recorded under `"length"` when the
    /// length changes.
    pub fn set_len(&self, len: usize) -> bool {
        if len > MAX_INDEX + 1 {
            debug!(len, "length out of range; ignored");
            return true;
        }
        let previous = self.with_items(|items| {
            if items.len() == len {
                return None;
            }
            let cut = items.split_off(len.min(items.len()));
            items.resize(len, Value::Null);
            Some(cut)
        });
        if let Some(cut) = previous {
            drop(cut);
            dispatch::record(&self.node, "length".to_string(), Value::from(len));
        }
        true
    }

    // ── reading ───────────────────────────────────────────────────────────

    pub fn map<T>(&self, mut f: impl FnMut(&Value, usize) -> T) -> Vec<T> {
        self.apply(SequenceOp::Map, || {
            self.snapshot()
                .iter()
                .enumerate()
                .map(|(i, v)| f(v, i))
                .collect()
        })
    }

    pub fn filter(&self, mut f: impl FnMut(&Value, usize) -> bool) -> Vec<Value> {
        self.apply(SequenceOp::Filter, || {
            self.snapshot()
                .into_iter()
                .enumerate()
                .filter(|(i, v)| f(v, *i))
                .map(|(_, v)| v)
                .collect()
        })
    }

    pub fn slice(&self, start: isize, end: Option<isize>) -> Vec<Value> {
        self.apply(SequenceOp::Slice, || {
            let items = self.snapshot();
            let range = bounds(start, end, items.len());
            items[range].to_vec()
        })
    }

    /// Elements followed by `others`; sequences (plain or observed) among
    /// `others` are spread one level.
    pub fn concat(&self, others: Vec<Value>) -> Vec<Value> {
        self.apply(SequenceOp::Concat, || {
            let mut out = self.snapshot();
            for other in others {
                match other {
                    Value::Array(items) => out.extend(items),
                    Value::Node(ref n) if n.is_sequence() => out.extend(n.values()),
                    v => out.push(v),
                }
            }
            out
        })
    }

    pub fn for_each(&self, mut f: impl FnMut(&Value, usize)) {
        self.apply(SequenceOp::ForEach, || {
            for (i, v) in self.snapshot().iter().enumerate() {
                f(v, i);
            }
        })
    }

    pub fn reduce<A>(&self, init: A, mut f: impl FnMut(A, &Value, usize) -> A) -> A {
        self.apply(SequenceOp::Reduce, || {
            self.snapshot()
                .iter()
                .enumerate()
                .fold(init, |acc, (i, v)| f(acc, v, i))
        })
    }

    pub fn reduce_right<A>(&self, init: A, mut f: impl FnMut(A, &Value, usize) -> A) -> A {
        self.apply(SequenceOp::ReduceRight, || {
            self.snapshot()
                .iter()
                .enumerate()
                .rev()
                .fold(init, |acc, (i, v)| f(acc, v, i))
        })
    }

    pub fn includes(&self, needle: &Value) -> bool {
        self.apply(SequenceOp::Includes, || {
            self.snapshot().iter().any(|v| v.strict_eq(needle))
        })
    }

    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.apply(SequenceOp::IndexOf, || {
            self.snapshot().iter().position(|v| v.strict_eq(needle))
        })
    }

    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        self.apply(SequenceOp::LastIndexOf, || {
            self.snapshot().iter().rposition(|v| v.strict_eq(needle))
        })
    }

    pub fn find(&self, mut f: impl FnMut(&Value, usize) -> bool) -> Option<Value> {
        self.apply(SequenceOp::Find, || {
            self.snapshot()
                .into_iter()
                .enumerate()
                .find(|(i, v)| f(v, *i))
                .map(|(_, v)| v)
        })
    }

    pub fn find_index(&self, mut f: impl FnMut(&Value, usize) -> bool) -> Option<usize> {
        self.apply(SequenceOp::FindIndex, || {
            self.snapshot()
                .iter()
                .enumerate()
                .position(|(i, v)| f(v, i))
        })
    }

    pub fn every(&self, mut f: impl FnMut(&Value, usize) -> bool) -> bool {
        self.apply(SequenceOp::Every, || {
            self.snapshot().iter().enumerate().all(|(i, v)| f(v, i))
        })
    }

    pub fn some(&self, mut f: impl FnMut(&Value, usize) -> bool) -> bool {
        self.apply(SequenceOp::Some, || {
            self.snapshot().iter().enumerate().any(|(i, v)| f(v, i))
        })
    }

    /// Elements' string forms joined by `separator`; `Null` renders empty.
    pub fn join(&self, separator: &str) -> String {
        self.apply(SequenceOp::Join, || join_values(&self.snapshot(), separator))
    }

    pub fn entries(&self) -> Vec<(usize, Value)> {
        self.apply(SequenceOp::Entries, || {
            self.snapshot().into_iter().enumerate().collect()
        })
    }

    /// Element indices.
    pub fn keys(&self) -> Range<usize> {
        self.apply(SequenceOp::Keys, || 0..self.node.len())
    }

    pub fn values(&self) -> Vec<Value> {
        self.apply(SequenceOp::Values, || self.snapshot())
    }
}

impl IntoIterator for &Seq {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use json_observe_scheduler::TaskQueue;
    use serde_json::json;

    fn seq(q: &Rc<TaskQueue>, v: serde_json::Value) -> Seq {
        Node::wrap_in(v, q.clone()).as_seq().unwrap()
    }

    fn nums(values: Vec<Value>) -> Vec<i64> {
        values.iter().filter_map(Value::as_i64).collect()
    }

    #[test]
    fn table_covers_every_operation_once() {
        let all = SequenceOp::ALL;
        for op in &all {
            assert_eq!(SequenceOp::from_name(op.name()), Some(*op));
        }
        let mutating: Vec<&str> = all
            .iter()
            .filter(|op| op.dispatches())
            .map(|op| op.name())
            .collect();
        assert_eq!(
            mutating,
            vec!["push", "pop", "shift", "unshift", "splice", "sort", "reverse", "fill", "copy_within"]
        );
        assert_eq!(SequenceOp::from_name("pushAll"), None);
    }

    #[test]
    fn relative_positions_clamp() {
        assert_eq!(relative(-1, 3), 2);
        assert_eq!(relative(-9, 3), 0);
        assert_eq!(relative(9, 3), 3);
        assert_eq!(bounds(2, Some(1), 4), 2..2);
    }

    #[test]
    fn push_pop_shift_unshift() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([2]));
        assert_eq!(s.push(3), 2);
        assert_eq!(s.unshift(1), 3);
        assert_eq!(nums(s.values()), vec![1, 2, 3]);
        assert_eq!(s.pop(), Some(Value::from(3)));
        assert_eq!(s.shift(), Some(Value::from(1)));
        assert_eq!(nums(s.values()), vec![2]);
        assert_eq!(s.pending_changes(), 4);
    }

    #[test]
    fn pop_on_empty_still_dispatches() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([]));
        assert_eq!(s.pop(), None);
        assert_eq!(s.shift(), None);
        assert!(s.is_armed());
    }

    #[test]
    fn splice_removes_and_inserts() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([1, 2, 3, 4]));
        let removed = s.splice(1, Some(2), vec![Value::from(9)]);
        assert_eq!(nums(removed), vec![2, 3]);
        assert_eq!(nums(s.values()), vec![1, 9, 4]);
        let tail = s.splice(-1, None, vec![]);
        assert_eq!(nums(tail), vec![4]);
        assert_eq!(nums(s.values()), vec![1, 9]);
    }

    #[test]
    fn default_sort_compares_string_forms() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([10, 9, 1]));
        s.sort();
        assert_eq!(nums(s.values()), vec![1, 10, 9]);
        s.sort_by(|a, b| a.as_i64().cmp(&b.as_i64()));
        assert_eq!(nums(s.values()), vec![1, 9, 10]);
    }

    #[test]
    fn fill_and_copy_within() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([1, 2, 3, 4, 5]));
        s.copy_within(0, 3, None);
        assert_eq!(nums(s.values()), vec![4, 5, 3, 4, 5]);
        s.fill(0, 1, Some(-1));
        assert_eq!(nums(s.values()), vec![4, 0, 0, 0, 5]);
    }

    #[test]
    fn fill_with_container_shares_one_node() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([null, null]));
        s.fill(json!({"k": 1}), 0, None);
        let a = s.get(0usize).and_then(Value::into_node).unwrap();
        let b = s.get(1usize).and_then(Value::into_node).unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn reading_operations_never_record() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([1, 2, 3]));
        assert_eq!(s.map(|v, _| v.as_i64().unwrap_or(0) * 2), vec![2, 4, 6]);
        assert_eq!(nums(s.filter(|v, _| v.as_i64() != Some(2))), vec![1, 3]);
        assert_eq!(nums(s.slice(-2, None)), vec![2, 3]);
        assert_eq!(nums(s.concat(vec![Value::from(vec![4, 5]), Value::from(6)])), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(s.reduce(0, |acc, v, _| acc + v.as_i64().unwrap_or(0)), 6);
        assert_eq!(
            s.reduce_right(String::new(), |acc, v, _| format!("{acc}{}", js_string(v))),
            "321"
        );
        assert!(s.includes(&Value::from(2)));
        assert_eq!(s.index_of(&Value::from(3)), Some(2));
        assert_eq!(s.last_index_of(&Value::from(9)), None);
        assert_eq!(s.find(|v, _| v.as_i64() == Some(2)), Some(Value::from(2)));
        assert_eq!(s.find_index(|_, i| i == 1), Some(1));
        assert!(s.every(|v, _| v.as_i64().is_some()));
        assert!(!s.some(|v, _| v.is_null()));
        assert_eq!(s.join("-"), "1-2-3");
        assert_eq!(s.keys(), 0..3);
        assert_eq!(s.entries().len(), 3);
        let mut seen = 0;
        s.for_each(|_, _| seen += 1);
        assert_eq!(seen, 3);
        assert_eq!(s.iter().count(), 3);
        assert_eq!(s.pending_changes(), 0);
        assert!(q.is_idle());
    }

    #[test]
    fn pushed_containers_are_wrapped() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([]));
        s.push(json!({"a": [1]}));
        let first = s.get(0usize).and_then(Value::into_node).unwrap();
        assert!(first.get("a").unwrap().is_node());
    }

    #[test]
    fn set_len_truncates_pads_and_records_length() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([1, 2, 3]));
        s.set_len(3);
        assert_eq!(s.pending_changes(), 0);
        s.set_len(1);
        assert_eq!(nums(s.values()), vec![1]);
        s.set_len(2);
        assert_eq!(s.values(), vec![Value::from(1), Value::Null]);
        assert_eq!(s.pending_changes(), 1);
    }

    #[test]
    fn set_len_out_of_range_is_ignored() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([1]));
        assert!(s.set_len(usize::MAX));
        assert_eq!(s.len(), 1);
        assert_eq!(s.pending_changes(), 0);
    }

    #[test]
    fn callbacks_may_write_to_the_node() {
        let q = Rc::new(TaskQueue::new());
        let s = seq(&q, json!([1, 2]));
        let node = s.node().clone();
        s.for_each(|v, i| {
            node.set(i, v.as_i64().unwrap_or(0) + 10);
        });
        assert_eq!(nums(s.values()), vec![11, 12]);
    }
}
