//! Manipulation of JSON values addressed by response paths.

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
use serde_json_bytes::Value;
use std::fmt;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// One segment of a response path: a field's response key or a list index.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index within a list value.
    Index(usize),

    /// The response key of a field within an object value.
    Key(String),
}

/// A path into the response tree, serialized as an array of strings and
/// integers.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PathElement> {
        self.0.iter()
    }

    pub fn join(&self, other: &Path) -> Path {
        let mut elements = self.0.clone();
        elements.extend(other.0.iter().cloned());
        Path(elements)
    }

    /// True if every element of `self` equals the corresponding leading
    /// element of `other`.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }

    /// The path left once the first `start` elements are dropped.
    pub fn slice_from(&self, start: usize) -> Path {
        Path(self.0[start.min(self.0.len())..].to_vec())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path(
            s.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| {
                    if let Ok(index) = segment.parse::<usize>() {
                        PathElement::Index(index)
                    } else {
                        PathElement::Key(segment.to_string())
                    }
                })
                .collect(),
        )
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Path(elements)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, element) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            match element {
                PathElement::Index(index) => write!(f, "{}", index)?,
                PathElement::Key(key) => write!(f, "{}", key)?,
            }
        }
        Ok(())
    }
}

/// Extension trait for [`serde_json_bytes::Value`].
pub trait ValueExt {
    /// Merge another value into this one, recursing through objects and
    /// merging arrays element-wise. Any other combination replaces the
    /// current value.
    fn deep_merge(&mut self, other: Value);

    /// Walk `path` down the value, returning `None` as soon as a segment
    /// does not resolve to a defined value.
    fn data_at_path(&self, path: &Path) -> Option<&Value>;

    /// Build a value nesting `value` under every element of `path`.
    fn from_path(path: &Path, value: Value) -> Value;
}

impl ValueExt for Value {
    fn deep_merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => {
                for (key, value) in b {
                    if let Some(existing) = a.get_mut(&key) {
                        existing.deep_merge(value);
                    } else {
                        a.insert(key, value);
                    }
                }
            }
            (Value::Array(a), Value::Array(b)) => {
                for (i, value) in b.into_iter().enumerate() {
                    if let Some(existing) = a.get_mut(i) {
                        existing.deep_merge(value);
                    } else {
                        a.push(value);
                    }
                }
            }
            (a, b) => {
                *a = b;
            }
        }
    }

    fn data_at_path(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for element in path.iter() {
            current = match element {
                PathElement::Key(key) => current.as_object()?.get(key.as_str())?,
                PathElement::Index(index) => current.as_array()?.get(*index)?,
            };
        }
        Some(current)
    }

    fn from_path(path: &Path, value: Value) -> Value {
        let mut current = value;
        for element in path.iter().rev() {
            current = match element {
                PathElement::Key(key) => {
                    let mut object = Object::default();
                    object.insert(key.as_str(), current);
                    Value::Object(object)
                }
                PathElement::Index(index) => {
                    let mut array = vec![Value::Null; *index];
                    array.push(current);
                    Value::Array(array)
                }
            };
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json_bytes::json;

    #[test]
    fn test_deep_merge() {
        let mut value = json!({"a": {"b": 1, "c": 2}, "list": [{"x": 1}, {"y": 2}]});
        value.deep_merge(json!({"a": {"c": 3, "d": 4}, "list": [{"z": 5}], "e": 6}));
        assert_eq!(
            value,
            json!({
                "a": {"b": 1, "c": 3, "d": 4},
                "list": [{"x": 1, "z": 5}, {"y": 2}],
                "e": 6,
            })
        );
    }

    #[test]
    fn test_data_at_path() {
        let value = json!({"a": {"b": [null, {"c": "value"}]}});
        assert_eq!(
            value.data_at_path(&Path::from("a/b/1/c")),
            Some(&json!("value"))
        );
        // a missing intermediate container short-circuits to "not found"
        assert_eq!(value.data_at_path(&Path::from("a/missing/c")), None);
        assert_eq!(value.data_at_path(&Path::from("a/b/2")), None);
        assert_eq!(value.data_at_path(&Path::empty()), Some(&value));
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            Value::from_path(&Path::from("a/1/b"), json!("value")),
            json!({"a": [null, {"b": "value"}]})
        );
    }

    #[test]
    fn test_path_serde() {
        let path: Path = serde_json::from_str(r#"["hero", 1, "name"]"#).unwrap();
        assert_eq!(path, Path::from("hero/1/name"));
        assert_eq!(
            serde_json::to_value(&path).unwrap(),
            serde_json::json!(["hero", 1, "name"])
        );
    }

    #[test]
    fn test_prefix() {
        assert!(Path::empty().is_prefix_of(&Path::from("a/b")));
        assert!(Path::from("a").is_prefix_of(&Path::from("a/b")));
        assert!(!Path::from("a/b/c").is_prefix_of(&Path::from("a/b")));
        assert!(!Path::from("x").is_prefix_of(&Path::from("a/b")));
        assert_eq!(Path::from("a/b/c").slice_from(1), Path::from("b/c"));
    }
}
