//! JSON bridge.
//!
//! Hosts usually hold their state as JSON. [`Runtime::insert_json`] turns a
//! `serde_json::Value` into a tree of containers, and [`Runtime::to_json`]
//! takes an untracked snapshot back out.
//!
//! Objects become [`Record`]s and arrays become [`Sequence`]s. On the way
//! out, holes and `Undefined` become `null` inside sequences and are skipped
//! inside records. Non-finite numbers become `null`. A container that is
//! already being serialized higher up the tree (a cycle) becomes `null`.

use std::collections::HashSet;

use serde_json::{Map, Number};
use slotmap::SlotMap;

use crate::container::{Container, Record, Sequence, Shape};
use crate::error::{ReactiveError, Result};
use crate::reactive::{ContainerId, Runtime};
use crate::value::{Key, Value};

impl Runtime {
    /// Insert a JSON document.
    ///
    /// Objects and arrays are inserted as containers, recursively; the
    /// returned value is the root container, or the scalar itself.
    pub fn insert_json(&self, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => {
                let values: Vec<Value> = items.iter().map(|item| self.insert_json(item)).collect();
                Value::Container(self.insert(Sequence::from_values(values)))
            }
            serde_json::Value::Object(entries) => {
                let pairs: Vec<(&str, Value)> = entries
                    .iter()
                    .map(|(name, item)| (name.as_str(), self.insert_json(item)))
                    .collect();
                Value::Container(self.insert(Record::from_pairs(pairs)))
            }
        }
    }

    /// Snapshot a container tree as JSON without tracking any reads.
    pub fn to_json(&self, id: ContainerId) -> Result<serde_json::Value> {
        let containers = self.containers.read();
        if !containers.contains_key(id) {
            return Err(ReactiveError::ReleasedContainer(id));
        }
        let mut ancestors = HashSet::new();
        Ok(container_to_json(&containers, id, &mut ancestors))
    }
}

fn container_to_json(
    containers: &SlotMap<ContainerId, Box<dyn Container>>,
    id: ContainerId,
    ancestors: &mut HashSet<ContainerId>,
) -> serde_json::Value {
    let Some(container) = containers.get(id) else {
        return serde_json::Value::Null;
    };
    if !ancestors.insert(id) {
        return serde_json::Value::Null;
    }

    let json = match container.shape() {
        Shape::Record => {
            let mut map = Map::new();
            for key in container.own_keys() {
                let Key::Name(name) = &key else {
                    continue;
                };
                match container.get(&key) {
                    None | Some(Value::Undefined) => {}
                    Some(value) => {
                        map.insert(name.to_string(), value_to_json(containers, &value, ancestors));
                    }
                }
            }
            serde_json::Value::Object(map)
        }
        Shape::Sequence => serde_json::Value::Array(
            (0..container.len())
                .map(|i| match container.get(&Key::Index(i)) {
                    Some(value) => value_to_json(containers, &value, ancestors),
                    None => serde_json::Value::Null,
                })
                .collect(),
        ),
    };

    ancestors.remove(&id);
    json
}

fn value_to_json(
    containers: &SlotMap<ContainerId, Box<dyn Container>>,
    value: &Value,
    ancestors: &mut HashSet<ContainerId>,
) -> serde_json::Value {
    match value {
        Value::Undefined | Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::Text(s) => serde_json::Value::String(s.to_string()),
        Value::Container(child) => container_to_json(containers, *child, ancestors),
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    // Keep integral values integral so round-tripped documents look the same.
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
