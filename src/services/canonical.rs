//! Order-insensitive JSON canonicalization.
//!
//! Produces one string per "set of facts": every array anywhere in the value
//! is sorted with a total order over JSON values and every object is emitted
//! with sorted keys, using compact separators. Residue lists and similar
//! unordered collections therefore fingerprint identically regardless of the
//! order they were submitted in.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

/// Canonicalize a copy of `value`. The caller's value is left untouched.
pub fn canonicalize(value: &Value) -> Result<String, CanonicalError> {
    let mut owned = value.clone();
    canonicalize_in_place(&mut owned)
}

/// Canonicalize `value` without copying it first. Arrays inside the caller's
/// value are left sorted afterwards.
pub fn canonicalize_in_place(value: &mut Value) -> Result<String, CanonicalError> {
    sort_json_lists(value);
    Ok(serde_json::to_string(value)?)
}

/// Canonicalize anything serde can turn into JSON. Values without a JSON
/// representation (maps keyed by tuples, for example) are rejected.
pub fn canonicalize_serializable<T: Serialize + ?Sized>(
    value: &T,
) -> Result<String, CanonicalError> {
    let mut value = serde_json::to_value(value)?;
    canonicalize_in_place(&mut value)
}

/// Canonicalize a shared-reference JSON graph. Fails if any array or object
/// is reachable twice from the root.
pub fn canonicalize_node(node: &JsonNode) -> Result<String, CanonicalError> {
    let mut value = node.to_tree()?;
    canonicalize_in_place(&mut value)
}

/// Sort children before parents so a parent's order never depends on the
/// submitted order of its children.
fn sort_json_lists(value: &mut Value) {
    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                sort_json_lists(item);
            }
            items.sort_by(compare_json_value);
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, mut item) in entries {
                sort_json_lists(&mut item);
                map.insert(key, item);
            }
        }
        _ => {}
    }
}

/// Total order over JSON values: scalars < objects < arrays.
///
/// Objects compare key by key in sorted key order, recursing into the values
/// when keys tie; an object whose keys are a prefix of the other's sorts
/// first. Arrays compare element-wise, then by length.
pub fn compare_json_value(first: &Value, second: &Value) -> Ordering {
    match (first, second) {
        (Value::Array(a), Value::Array(b)) => compare_json_arrays(a, b),
        (Value::Array(_), _) => Ordering::Greater,
        (_, Value::Array(_)) => Ordering::Less,
        (Value::Object(a), Value::Object(b)) => compare_json_objects(a, b),
        (Value::Object(_), _) => Ordering::Greater,
        (_, Value::Object(_)) => Ordering::Less,
        (a, b) => compare_scalars(a, b),
    }
}

fn compare_json_objects(first: &Map<String, Value>, second: &Map<String, Value>) -> Ordering {
    let mut first_keys: Vec<&String> = first.keys().collect();
    let mut second_keys: Vec<&String> = second.keys().collect();
    first_keys.sort();
    second_keys.sort();

    for (a_key, b_key) in first_keys.iter().zip(second_keys.iter()) {
        match a_key.cmp(b_key) {
            Ordering::Equal => {}
            other => return other,
        }
        match compare_json_value(&first[a_key.as_str()], &second[b_key.as_str()]) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    first_keys.len().cmp(&second_keys.len())
}

fn compare_json_arrays(first: &[Value], second: &[Value]) -> Ordering {
    for (a, b) in first.iter().zip(second.iter()) {
        match compare_json_value(a, b) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    first.len().cmp(&second.len())
}

fn scalar_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
    }
}

fn compare_scalars(first: &Value, second: &Value) -> Ordering {
    match (first, second) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => scalar_rank(first).cmp(&scalar_rank(second)),
    }
}

fn compare_numbers(first: &Number, second: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (first.as_i64(), second.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (first.as_u64(), second.as_u64()) {
        return a.cmp(&b);
    }
    let a = first.as_f64().unwrap_or(f64::NAN);
    let b = second.as_f64().unwrap_or(f64::NAN);
    // 1 and 1.0 are numerically equal but print differently.
    a.total_cmp(&b)
        .then_with(|| first.to_string().cmp(&second.to_string()))
}

/// A JSON-like value whose arrays and objects are shared references, the shape
/// of live in-memory documents that may alias sub-structures.
#[derive(Debug, Clone)]
pub enum JsonNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Rc<RefCell<Vec<JsonNode>>>),
    Object(Rc<RefCell<BTreeMap<String, JsonNode>>>),
}

impl JsonNode {
    pub fn array(items: Vec<JsonNode>) -> Self {
        JsonNode::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, JsonNode)>) -> Self {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        JsonNode::Object(Rc::new(RefCell::new(map)))
    }

    /// Convert into an owned tree, rejecting cycles and shared containers.
    pub fn to_tree(&self) -> Result<Value, CanonicalError> {
        let mut seen = HashSet::new();
        self.to_tree_tracked(&mut seen)
    }

    fn to_tree_tracked(&self, seen: &mut HashSet<usize>) -> Result<Value, CanonicalError> {
        match self {
            JsonNode::Null => Ok(Value::Null),
            JsonNode::Bool(b) => Ok(Value::Bool(*b)),
            JsonNode::Number(n) => Ok(Value::Number(n.clone())),
            JsonNode::String(s) => Ok(Value::String(s.clone())),
            JsonNode::Array(items) => {
                if !seen.insert(Rc::as_ptr(items) as usize) {
                    return Err(CanonicalError::CircularReference);
                }
                let items = items.borrow();
                let values = items
                    .iter()
                    .map(|item| item.to_tree_tracked(seen))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(values))
            }
            JsonNode::Object(entries) => {
                if !seen.insert(Rc::as_ptr(entries) as usize) {
                    return Err(CanonicalError::CircularReference);
                }
                let entries = entries.borrow();
                let mut map = Map::new();
                for (key, item) in entries.iter() {
                    map.insert(key.clone(), item.to_tree_tracked(seen)?);
                }
                Ok(Value::Object(map))
            }
        }
    }
}

impl From<Value> for JsonNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JsonNode::Null,
            Value::Bool(b) => JsonNode::Bool(b),
            Value::Number(n) => JsonNode::Number(n),
            Value::String(s) => JsonNode::String(s),
            Value::Array(items) => JsonNode::array(items.into_iter().map(JsonNode::from).collect()),
            Value::Object(map) => JsonNode::object(map.into_iter().map(|(k, v)| (k, JsonNode::from(v)))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("Circular reference detected")]
    CircularReference,

    #[error("Value is not JSON-representable: {0}")]
    NotJson(#[from] serde_json::Error),
}
