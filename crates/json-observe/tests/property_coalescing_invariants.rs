use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use json_observe::{Node, TaskQueue, Value};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Step {
    Write(&'static str, i64),
    Remove(&'static str),
    Tick,
}

fn step() -> impl Strategy<Value = Step> {
    let key = prop::sample::select(vec!["a", "b", "c", "d"]);
    prop_oneof![
        6 => (key.clone(), 0i64..4).prop_map(|(k, v)| Step::Write(k, v)),
        1 => key.prop_map(Step::Remove),
        2 => Just(Step::Tick),
    ]
}

/// Reference model: a plain map plus the batch a flush would deliver.
#[derive(Default)]
struct Model {
    current: IndexMap<String, i64>,
    batch: IndexMap<String, serde_json::Value>,
    delivered: Vec<serde_json::Value>,
}

impl Model {
    fn write(&mut self, key: &str, value: i64) {
        if self.current.get(key) != Some(&value) {
            self.current.insert(key.to_string(), value);
            self.batch.insert(key.to_string(), json!(value));
        }
    }

    fn remove(&mut self, key: &str) {
        if self.current.shift_remove(key).is_some() {
            self.batch.insert(key.to_string(), serde_json::Value::Null);
        }
    }

    fn tick(&mut self) {
        if !self.batch.is_empty() {
            let batch = std::mem::take(&mut self.batch);
            self.delivered.push(serde_json::Value::Object(batch.into_iter().collect()));
        }
    }
}

fn json_u64(n: u64) -> serde_json::Value {
    json!(n)
}

fn json_i64(n: i64) -> serde_json::Value {
    json!(n)
}

proptest! {
    #[test]
    fn one_flush_per_turn_with_latest_values(steps in prop::collection::vec(step(), 0..60)) {
        let queue = Rc::new(TaskQueue::new());
        let node = Node::wrap_in(json!({}), queue.clone());
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        node.on(move |c| sink.borrow_mut().push(c.to_json()));
        let mut model = Model::default();

        for s in &steps {
            match s {
                Step::Write(k, v) => {
                    node.set(*k, *v);
                    model.write(k, *v);
                }
                Step::Remove(k) => {
                    node.remove(*k);
                    model.remove(k);
                }
                Step::Tick => {
                    queue.run_turn();
                    model.tick();
                }
            }
            prop_assert!(queue.pending() <= 1);
            prop_assert_eq!(node.is_armed(), !model.batch.is_empty());
        }
        queue.run_until_idle().unwrap();
        model.tick();

        prop_assert_eq!(&*log.borrow(), &model.delivered);
        let expected: serde_json::Map<String, serde_json::Value> = model
            .current
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        prop_assert_eq!(node.to_json(), serde_json::Value::Object(expected));
    }

    #[test]
    fn differing_integer_writes_are_stored_and_recorded(
        a in prop_oneof![any::<u64>().prop_map(json_u64), any::<i64>().prop_map(json_i64)],
        b in prop_oneof![any::<u64>().prop_map(json_u64), any::<i64>().prop_map(json_i64)],
    ) {
        let queue = Rc::new(TaskQueue::new());
        let node = Node::wrap_in(json!({"n": a.clone()}), queue.clone());
        node.set("n", b.clone());

        let stored = node.get("n").map(|v| v.to_json());
        prop_assert_eq!(stored, Some(b.clone()));
        prop_assert_eq!(node.pending_changes(), usize::from(a != b));
    }

    #[test]
    fn every_container_in_the_tree_is_a_node(
        doc in prop::collection::vec(prop::collection::vec(0i64..5, 0..4), 0..4),
        extra in prop::collection::vec(0i64..5, 0..4),
    ) {
        let queue = Rc::new(TaskQueue::new());
        let root = Node::wrap_in(json!({"rows": doc}), queue.clone());
        root.set("extra", json!({"list": extra}));
        let rows = root.get("rows").and_then(Value::into_node).unwrap();
        rows.as_seq().unwrap().push(json!([{"deep": []}]));

        fn check(value: &Value) -> bool {
            match value {
                Value::Array(_) | Value::Object(_) => false,
                Value::Node(n) => n.values().iter().all(check),
                _ => true,
            }
        }
        prop_assert!(check(&Value::Node(root.clone())));
        queue.run_until_idle().unwrap();
        prop_assert!(!root.is_armed());
    }
}
