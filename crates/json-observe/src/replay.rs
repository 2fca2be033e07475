//! Scripted replay of writes against an observed document.
//!
//! Provides the logic behind the `json-observe-replay` binary: wrap a
//! document, run a script of steps against it on a private queue, and
//! collect every delivered flush as a JSON line.
//!
//! A script is a JSON array of steps tagged by `"op"`:
//!
//! ```json
//! [
//!   {"op": "listen", "path": "/items"},
//!   {"op": "call", "path": "/items", "method": "push", "args": [4]},
//!   {"op": "set", "path": "/title", "value": "done"},
//!   {"op": "tick"}
//! ]
//! ```
//!
//! Paths are JSON Pointers into the document; `""` is the root.

use std::cell::RefCell;
use std::rc::Rc;

use json_observe_scheduler::TaskQueue;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ObserveError;
use crate::node::{Node, Seq, SequenceOp};
use crate::pointer::{format_pointer, parse_pointer, PathStep};
use crate::value::Value;

/// One script step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Attach a recording listener to the node at `path`.
    Listen {
        #[serde(default)]
        path: String,
    },
    Set {
        path: String,
        value: serde_json::Value,
    },
    Remove {
        path: String,
    },
    /// Call a sequence operation on the node at `path`.
    Call {
        path: String,
        method: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
    /// Run one scheduler turn.
    Tick,
}

/// Parse a script from JSON text.
pub fn parse_script(script: &str) -> Result<Vec<Step>, ObserveError> {
    Ok(serde_json::from_str(script)?)
}

/// Replay `script` against `doc` and return the output lines: one
/// `{"path", "changes"}` object per delivered flush, then
/// `{"document": ...}` with the final state.
pub fn replay(doc: &str, script: &str) -> Result<Vec<serde_json::Value>, ObserveError> {
    let doc: serde_json::Value = serde_json::from_str(doc)?;
    let steps = parse_script(script)?;
    replay_steps(doc, &steps)
}

pub fn replay_steps(
    doc: serde_json::Value,
    steps: &[Step],
) -> Result<Vec<serde_json::Value>, ObserveError> {
    let queue = Rc::new(TaskQueue::new());
    let root = Node::wrap_in(doc, queue.clone());
    let lines = Rc::new(RefCell::new(Vec::new()));

    for (i, step) in steps.iter().enumerate() {
        debug!(step = i, ?step, "replaying");
        match step {
            Step::Listen { path } => {
                let node = node_at(&root, path)?;
                let sink = Rc::clone(&lines);
                let path = path.clone();
                node.on(move |changes| {
                    sink.borrow_mut()
                        .push(json!({"path": path, "changes": changes.to_json()}));
                });
            }
            Step::Set { path, value } => {
                let (parent, last) = parent_of(&root, path, "set")?;
                parent.set(last, value.clone());
            }
            Step::Remove { path } => {
                let (parent, last) = parent_of(&root, path, "remove")?;
                if parent.remove(last).is_none() {
                    return Err(ObserveError::PathNotFound(path.clone()));
                }
            }
            Step::Call { path, method, args } => {
                let seq = node_at(&root, path)?
                    .as_seq()
                    .ok_or_else(|| ObserveError::NotSequence(path.clone()))?;
                call(&seq, method, args)?;
            }
            Step::Tick => {
                queue.run_turn();
            }
        }
    }
    queue.run_until_idle()?;

    let mut out = lines.take();
    out.push(json!({"document": root.to_json()}));
    Ok(out)
}

fn node_at(root: &Node, pointer: &str) -> Result<Node, ObserveError> {
    root.find_ptr(pointer)?
        .ok_or_else(|| ObserveError::PathNotFound(pointer.to_string()))?
        .into_node()
        .ok_or_else(|| ObserveError::NotObserved(pointer.to_string()))
}

fn parent_of(root: &Node, pointer: &str, method: &str) -> Result<(Node, PathStep), ObserveError> {
    let mut steps = parse_pointer(pointer)?;
    let last = steps.pop().ok_or_else(|| ObserveError::InvalidArgs {
        method: method.to_string(),
        reason: "the root cannot be replaced".to_string(),
    })?;
    let parent = node_at(root, &format_pointer(&steps))?;
    Ok((parent, last))
}

/// Run `method` with JSON `args`, returning the operation's result as JSON.
pub fn call(
    seq: &Seq,
    method: &str,
    args: &[serde_json::Value],
) -> Result<serde_json::Value, ObserveError> {
    let op = SequenceOp::from_name(method)
        .ok_or_else(|| ObserveError::UnknownMethod(method.to_string()))?;
    let args = Args { op, args };
    let values = |items: &[serde_json::Value]| -> Vec<Value> {
        items.iter().cloned().map(Value::from).collect()
    };

    let result = match op {
        SequenceOp::Push => json!(seq.push_all(values(args.args))),
        SequenceOp::Unshift => json!(seq.unshift_all(values(args.args))),
        SequenceOp::Pop => seq.pop().map_or(serde_json::Value::Null, |v| v.to_json()),
        SequenceOp::Shift => seq.shift().map_or(serde_json::Value::Null, |v| v.to_json()),
        SequenceOp::Reverse => {
            seq.reverse();
            serde_json::Value::Null
        }
        SequenceOp::Sort => {
            seq.sort();
            serde_json::Value::Null
        }
        SequenceOp::Splice => {
            let start = args.int(0)?;
            let count = args.opt_count(1)?;
            let items = values(args.args.get(2..).unwrap_or_default());
            Value::from(seq.splice(start, count, items)).to_json()
        }
        SequenceOp::Fill => {
            let value = args.args.first().cloned().unwrap_or_default();
            seq.fill(value, args.int_or(1, 0)?, args.opt_int(2)?);
            serde_json::Value::Null
        }
        SequenceOp::CopyWithin => {
            seq.copy_within(args.int(0)?, args.int_or(1, 0)?, args.opt_int(2)?);
            serde_json::Value::Null
        }
        SequenceOp::Slice => {
            Value::from(seq.slice(args.int_or(0, 0)?, args.opt_int(1)?)).to_json()
        }
        SequenceOp::Concat => Value::from(seq.concat(values(args.args))).to_json(),
        SequenceOp::Includes => json!(seq.includes(&args.value(0))),
        SequenceOp::IndexOf => json!(seq.index_of(&args.value(0))),
        SequenceOp::LastIndexOf => json!(seq.last_index_of(&args.value(0))),
        SequenceOp::Join => {
            let sep = match args.args.first() {
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => ",".to_string(),
            };
            json!(seq.join(&sep))
        }
        SequenceOp::Keys => json!(seq.keys().collect::<Vec<_>>()),
        SequenceOp::Values => Value::from(seq.values()).to_json(),
        SequenceOp::Entries => serde_json::Value::Array(
            seq.entries()
                .into_iter()
                .map(|(i, v)| json!([i, v.to_json()]))
                .collect(),
        ),
        SequenceOp::Map
        | SequenceOp::Filter
        | SequenceOp::ForEach
        | SequenceOp::Reduce
        | SequenceOp::ReduceRight
        | SequenceOp::Find
        | SequenceOp::FindIndex
        | SequenceOp::Every
        | SequenceOp::Some => return Err(args.invalid("takes a callback")),
    };
    Ok(result)
}

struct Args<'a> {
    op: SequenceOp,
    args: &'a [serde_json::Value],
}

impl Args<'_> {
    fn invalid(&self, reason: &str) -> ObserveError {
        ObserveError::InvalidArgs {
            method: self.op.name().to_string(),
            reason: reason.to_string(),
        }
    }

    fn value(&self, i: usize) -> Value {
        self.args.get(i).cloned().map_or(Value::Null, Value::from)
    }

    fn opt_int(&self, i: usize) -> Result<Option<isize>, ObserveError> {
        match self.args.get(i) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => v
                .as_i64()
                .and_then(|n| isize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(&format!("argument {i} must be an integer"))),
        }
    }

    fn int_or(&self, i: usize, default: isize) -> Result<isize, ObserveError> {
        Ok(self.opt_int(i)?.unwrap_or(default))
    }

    fn int(&self, i: usize) -> Result<isize, ObserveError> {
        self.opt_int(i)?
            .ok_or_else(|| self.invalid(&format!("argument {i} is required")))
    }

    fn opt_count(&self, i: usize) -> Result<Option<usize>, ObserveError> {
        match self.opt_int(i)? {
            None => Ok(None),
            Some(n) => usize::try_from(n)
                .map(Some)
                .map_err(|_| self.invalid(&format!("argument {i} must not be negative"))),
        }
    }
}

/// Render output lines, one compact JSON object per line.
pub fn render(lines: &[serde_json::Value]) -> String {
    lines
        .iter()
        .map(serde_json::Value::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
