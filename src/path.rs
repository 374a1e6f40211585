//! Dotted field paths over untyped JSON payloads.
//!
//! Resolution is optional-chaining: a missing key, an out-of-range index or a
//! `null` along the way ends the walk with `None`. It never panics and never
//! returns an error.
//!
//! ```
//! use cqrs_hub::FieldPath;
//! use serde_json::json;
//!
//! let body = json!({ "payload": { "id": "p1" } });
//! let path = FieldPath::parse("payload.id");
//!
//! assert_eq!(path.resolve(&body), Some(&json!("p1")));
//! assert_eq!(FieldPath::parse("payload.missing.deeper").resolve(&body), None);
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A parsed dotted path such as `payload.id`.
///
/// The empty path addresses the root value itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Empty segments (`a..b`, a leading dot) are skipped.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk `root` along this path.
    ///
    /// Objects are descended by key, arrays by numeric index.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
            if current.is_null() {
                return None;
            }
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Resolve a dotted path against `root` without keeping the parsed path.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    FieldPath::parse(path).resolve(root)
}
