use indexmap::map::Iter;
use indexmap::IndexMap;

use crate::value::Value;

/// Per-node change accumulator: changed key -> newest value.
///
/// Keys are property names for keyed nodes, string indices or operation
/// names (`"push"`, `"sort"`, ...) for sequences. A key keeps the position of
/// its first recording within a batch; later recordings only replace the
/// value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    entries: IndexMap<String, Value>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    /// Detach the current batch, leaving the accumulator empty.
    pub(crate) fn take(&mut self) -> Changes {
        std::mem::take(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.entries.iter()
    }

    /// Plain JSON object of the batch; node values are serialized in full.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Changes {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rerecording_keeps_first_position_and_latest_value() {
        let mut c = Changes::new();
        c.record("a".into(), Value::from(1));
        c.record("b".into(), Value::from(2));
        c.record("a".into(), Value::from(3));
        assert_eq!(c.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(c.get("a"), Some(&Value::from(3)));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn take_leaves_accumulator_empty() {
        let mut c = Changes::new();
        c.record("a".into(), Value::from(1));
        let batch = c.take();
        assert!(c.is_empty());
        assert!(batch.contains_key("a"));
        assert_eq!(batch.to_json(), serde_json::json!({"a": 1}));
    }
}
