//! Conversion of nodes back into plain JSON.
//!
//! The output is the unwrapped data only: no listeners, no pending changes,
//! no bookkeeping. Keyed nodes keep insertion order.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::node::{Container, Node};
use crate::value::Value;

impl Value {
    /// Plain JSON form; nodes are unwrapped recursively.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Node(node) => node.to_json(),
        }
    }
}

impl Node {
    /// Plain JSON form of the node: an object for keyed nodes, an array for
    /// sequences.
    pub fn to_json(&self) -> serde_json::Value {
        match &self.state.borrow().container {
            Container::Keyed(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Container::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }

    /// Compact JSON text of [`Node::to_json`].
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Node(node) => node.serialize(serializer),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.state.borrow().container {
            Container::Keyed(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Container::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// String form used for default sorting and joining: what a scripting host
/// would produce when coercing the value to a string.
pub(crate) fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_string(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => join_values(items, ","),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Node(node) if node.is_sequence() => join_values(&node.values(), ","),
        Value::Node(_) => "[object Object]".to_string(),
    }
}

fn number_string(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Join string forms with `separator`; `Null` elements render empty.
pub(crate) fn join_values(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|v| match v {
            Value::Null => String::new(),
            v => js_string(v),
        })
        .collect::<Vec<_>>()
        .join(separator)
}
