//! Nested-path accessors over JSON values
//!
//! A [`Path`] locates a value inside arbitrarily nested mappings and
//! sequences. Output projection uses it to lift declared values out of raw
//! node payloads (e.g. `("choices", 0, "message", "content")` into a chat
//! provider response).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step into a nested structure: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathKey {
    Index(usize),
    Key(String),
}

impl From<&str> for PathKey {
    fn from(key: &str) -> Self {
        PathKey::Key(key.to_string())
    }
}

impl From<String> for PathKey {
    fn from(key: String) -> Self {
        PathKey::Key(key)
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

/// A tuple path locating a value inside nested mappings/sequences.
///
/// Built most conveniently with the [`path!`](crate::path!) macro:
/// `path!["choices", 0, "message", "content"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathKey>);

impl Path {
    /// The empty path, which addresses the root value itself.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<PathKey>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[PathKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A new path with `key` appended.
    pub fn child(&self, key: PathKey) -> Self {
        let mut segments = self.0.clone();
        segments.push(key);
        Self(segments)
    }
}

/// Build a [`Path`] from key and index literals.
#[macro_export]
macro_rules! path {
    () => { $crate::Path::new() };
    ($($segment:expr),+ $(,)?) => {
        $crate::Path::from_segments(vec![$($crate::PathKey::from($segment)),+])
    };
}

/// Descend `obj` by each segment of `path`.
///
/// Mapping keys match by equality (an index segment matches its decimal
/// string); sequence keys are coerced to integers with a bounds check. A
/// missing key or out-of-bounds index yields `None`. The empty path returns
/// `obj` itself.
pub fn get_path<'a>(obj: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = obj;
    for key in path.segments() {
        current = match (current, key) {
            (Value::Object(map), PathKey::Key(k)) => map.get(k)?,
            (Value::Object(map), PathKey::Index(i)) => map.get(&i.to_string())?,
            (Value::Array(items), key) => items.get(array_index(key, items.len())?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path` inside `obj`, creating intermediate containers as
/// needed: a map when the next segment is a key, an array when it is an
/// index. A non-container at an intermediate position is overwritten with a
/// fresh container. An out-of-bounds index on an existing array is a silent
/// no-op, as is the empty path.
pub fn put_path(obj: &mut Value, path: &Path, value: Value) {
    if let Some((first, rest)) = path.segments().split_first() {
        put_inner(obj, first, rest, value);
    }
}

fn put_inner(obj: &mut Value, key: &PathKey, rest: &[PathKey], value: Value) {
    match rest.split_first() {
        None => match obj {
            Value::Object(map) => {
                map.insert(key_string(key), value);
            }
            Value::Array(items) => {
                if let Some(i) = array_index(key, items.len()) {
                    items[i] = value;
                }
            }
            _ => {}
        },
        Some((next, tail)) => {
            let slot = match obj {
                Value::Object(map) => map.entry(key_string(key)).or_insert(Value::Null),
                Value::Array(items) => {
                    let Some(i) = array_index(key, items.len()) else {
                        return;
                    };
                    &mut items[i]
                }
                _ => return,
            };
            if !matches!(slot, Value::Object(_) | Value::Array(_)) {
                *slot = match next {
                    PathKey::Key(_) => Value::Object(serde_json::Map::new()),
                    PathKey::Index(_) => Value::Array(Vec::new()),
                };
            }
            put_inner(slot, next, tail, value);
        }
    }
}

fn array_index(key: &PathKey, len: usize) -> Option<usize> {
    let index = match key {
        PathKey::Index(i) => *i,
        PathKey::Key(k) => k.parse().ok()?,
    };
    (index < len).then_some(index)
}

fn key_string(key: &PathKey) -> String {
    match key {
        PathKey::Key(k) => k.clone(),
        PathKey::Index(i) => i.to_string(),
    }
}
