//! Dotted-path access over nested JSON documents.
//!
//! A path such as `owner.login` or `files.0.name` is split on `.` into steps.
//! Each step is a mapping key, or a list position when the container at that
//! point is a list. Writes create missing intermediate containers.
//!
//! # Example
//!
//! ```
//! use json_values_path::{get, parse_path, set, unset};
//! use serde_json::json;
//!
//! let mut doc = json!({});
//! assert!(set(&mut doc, &parse_path("owner.login"), json!("symfony")));
//! assert_eq!(doc, json!({"owner": {"login": "symfony"}}));
//!
//! assert_eq!(get(&doc, &parse_path("owner.login")), Some(&json!("symfony")));
//! assert!(unset(&mut doc, &parse_path("owner.login")));
//! assert_eq!(doc, json!({"owner": {}}));
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

pub mod types;
pub use types::{IntoPath, Path, PathStep};

pub mod validate;
pub use validate::{validate_path, validate_step, PathPolicy, MAX_PATH_LENGTH};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path is {depth} steps deep, the limit is {max}")]
    TooDeep { depth: usize, max: usize },
    #[error("invalid path step {step:?}")]
    InvalidStep { step: String },
    #[error("cannot append to a {found} value")]
    NotAContainer { found: &'static str },
}

/// Parse a dotted path string into steps.
///
/// The empty string is a single top-level key, not the root.
///
/// # Example
///
/// ```
/// use json_values_path::parse_path;
///
/// assert_eq!(parse_path("a.b.0"), vec!["a", "b", "0"]);
/// assert_eq!(parse_path(""), vec![""]);
/// ```
pub fn parse_path(path: &str) -> Path {
    path.split('.').map(str::to_string).collect()
}

/// Join path steps back into a dotted string.
pub fn format_path(path: &[String]) -> String {
    path.join(".")
}

/// Extend a path with one literal step. The key is never split.
///
/// # Example
///
/// ```
/// use json_values_path::{join_key, parse_path};
///
/// assert_eq!(join_key(&parse_path("files"), "a.txt"), vec!["files", "a.txt"]);
/// ```
pub fn join_key(path: &[String], key: &str) -> Path {
    let mut joined = Vec::with_capacity(path.len() + 1);
    joined.extend_from_slice(path);
    joined.push(key.to_string());
    joined
}

/// Check if `child` lies strictly below `parent`.
pub fn is_child(parent: &[String], child: &[String]) -> bool {
    parent.len() < child.len() && child.starts_with(parent)
}

/// Check if `path` equals `prefix` or lies below it.
pub fn is_at_or_under(prefix: &[String], path: &[String]) -> bool {
    path.starts_with(prefix)
}

/// Check if a string consists only of ASCII digits.
pub fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn list_position(step: &str) -> Option<usize> {
    if is_integer(step) {
        step.parse().ok()
    } else {
        None
    }
}

/// Name of a value's JSON type, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Check if a value can hold children.
pub fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Get a value by path.
///
/// Returns `None` when any step does not resolve. Walking through a scalar is
/// not an error, the value is simply absent.
///
/// # Example
///
/// ```
/// use json_values_path::{get, parse_path};
/// use serde_json::json;
///
/// let doc = json!({"a": {"b": [1, 2, 3]}, "s": "x"});
/// assert_eq!(get(&doc, &parse_path("a.b.1")), Some(&json!(2)));
/// assert_eq!(get(&doc, &parse_path("s.x")), None);
/// ```
pub fn get<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = doc;
    for step in path {
        current = match current {
            Value::Object(map) => map.get(step)?,
            Value::Array(items) => items.get(list_position(step)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Get a mutable reference to a value by path.
pub fn get_mut<'a>(doc: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let mut current = doc;
    for step in path {
        current = match current {
            Value::Object(map) => map.get_mut(step)?,
            Value::Array(items) => items.get_mut(list_position(step)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Check if a path holds a non-null value.
pub fn has(doc: &Value, path: &[String]) -> bool {
    get(doc, path).is_some_and(|value| !value.is_null())
}

/// Set a value by path, creating intermediate containers.
///
/// A missing or scalar intermediate is replaced with an empty mapping. On a
/// list, a position inside the list replaces the element and the position
/// equal to its length appends. Any other step converts the list into a
/// mapping keyed by the former positions.
///
/// Returns whether the stored value changed. Setting the root path replaces
/// the whole document.
///
/// # Example
///
/// ```
/// use json_values_path::{parse_path, set};
/// use serde_json::json;
///
/// let mut doc = json!({"a": "scalar"});
/// set(&mut doc, &parse_path("a.b"), json!(1));
/// assert_eq!(doc, json!({"a": {"b": 1}}));
///
/// assert!(!set(&mut doc, &parse_path("a.b"), json!(1)));
/// ```
pub fn set(doc: &mut Value, path: &[String], value: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        let modified = *doc != value;
        *doc = value;
        return modified;
    };
    let mut current = doc;
    for step in parents {
        current = slot(current, step).0;
    }
    let (target, existed) = slot(current, last);
    let modified = !existed || *target != value;
    *target = value;
    modified
}

/// Remove the value at a path.
///
/// Parents are left in place even when they become empty. Removing a list
/// position shifts the later elements down. Returns whether a key was removed.
///
/// # Example
///
/// ```
/// use json_values_path::{parse_path, unset};
/// use serde_json::json;
///
/// let mut doc = json!({"tags": ["a", "b", "c"]});
/// assert!(unset(&mut doc, &parse_path("tags.0")));
/// assert_eq!(doc, json!({"tags": ["b", "c"]}));
/// assert!(!unset(&mut doc, &parse_path("tags.5")));
/// ```
pub fn unset(doc: &mut Value, path: &[String]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    match get_mut(doc, parents) {
        Some(Value::Object(map)) => map.shift_remove(last).is_some(),
        Some(Value::Array(items)) => match list_position(last) {
            Some(position) if position < items.len() => {
                items.remove(position);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Deep structural copy of a value.
///
/// `serde_json::Value` owns its children, so the copy never aliases the source.
pub fn copy(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(copy).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), copy(value)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

/// Make sure a container exists at `path` and return it.
///
/// An absent, null or scalar value at the path is replaced with an empty list.
pub fn ensure_container<'a>(doc: &'a mut Value, path: &[String]) -> &'a mut Value {
    let mut current = doc;
    for step in path {
        current = slot(current, step).0;
    }
    if !is_container(current) {
        *current = Value::Array(Vec::new());
    }
    current
}

/// Append a value to the collection at `path`.
///
/// Without a key the value goes to the next integer position: the end of a
/// list, or one past the largest integer key of a mapping. An explicit key is
/// used as a single literal step, even when it contains dots.
///
/// Returns the assigned key and whether the document changed.
///
/// # Errors
///
/// [`PathError::NotAContainer`] when the path holds a non-null scalar.
///
/// # Example
///
/// ```
/// use json_values_path::{append, parse_path};
/// use serde_json::json;
///
/// let mut doc = json!({});
/// let files = parse_path("files");
/// assert_eq!(append(&mut doc, &files, json!(1), None).unwrap().0, "0");
/// assert_eq!(append(&mut doc, &files, json!(2), Some("a.txt")).unwrap().0, "a.txt");
/// assert_eq!(doc, json!({"files": {"0": 1, "a.txt": 2}}));
/// ```
pub fn append(
    doc: &mut Value,
    path: &[String],
    value: Value,
    key: Option<&str>,
) -> Result<(String, bool), PathError> {
    if let Some(current) = get(doc, path) {
        if !current.is_null() && !is_container(current) {
            return Err(PathError::NotAContainer {
                found: value_kind(current),
            });
        }
    }
    let collection = ensure_container(doc, path);
    match key {
        Some(key) => {
            let (target, existed) = slot(collection, key);
            let modified = !existed || *target != value;
            *target = value;
            Ok((key.to_string(), modified))
        }
        None => Ok((push_next(collection, value), true)),
    }
}

fn push_next(collection: &mut Value, value: Value) -> String {
    match collection {
        Value::Array(items) => {
            items.push(value);
            (items.len() - 1).to_string()
        }
        Value::Object(map) => {
            let next = map
                .keys()
                .filter(|key| is_integer(key))
                .filter_map(|key| key.parse::<u64>().ok())
                .max()
                .map_or(0, |max| max + 1)
                .to_string();
            map.insert(next.clone(), value);
            next
        }
        _ => unreachable!("ensure_container always yields a container"),
    }
}

/// Resolve one step below `node` for writing, creating it as null if missing.
/// Returns the slot and whether it existed before.
fn slot<'a>(node: &'a mut Value, step: &str) -> (&'a mut Value, bool) {
    let position = match &*node {
        Value::Array(items) => list_position(step).filter(|&position| position <= items.len()),
        _ => None,
    };
    match (node, position) {
        (Value::Array(items), Some(position)) => {
            let existed = position < items.len();
            if !existed {
                items.push(Value::Null);
            }
            (&mut items[position], existed)
        }
        (node, _) => {
            let map = as_map_mut(node);
            let existed = map.contains_key(step);
            (map.entry(step.to_string()).or_insert(Value::Null), existed)
        }
    }
}

fn as_map_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        let map = match node.take() {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(position, item)| (position.to_string(), item))
                .collect(),
            _ => Map::new(),
        };
        *node = Value::Object(map);
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
