//! Dynamic values held by entry fields.

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A configuration value.
///
/// Produced by the source parsers and by entry defaults. No coercion happens
/// between variants: a value is stored and copied exactly as it was given.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicit null (`~` in YAML).
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    Sequence(Vec<Self>),
    /// Mapping that keeps source order.
    Mapping(IndexMap<String, Self>),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the number as `f64`; integers are widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_mapping(&self) -> Option<&IndexMap<String, Self>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Converts this value into any deserializable Rust type.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the shapes do not match.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::to_value(self).and_then(serde_json::from_value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Self>> for Value {
    fn from(map: IndexMap<String, Self>) -> Self {
        Self::Mapping(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn accessors_match_only_their_variant() {
        let value = Value::from(42);

        assert_eq!(value.as_i64(), Some(42));
        assert_eq!(value.as_f64(), Some(42.0));
        assert_eq!(value.as_str(), None);
        assert_eq!(value.type_name(), "integer");
    }

    #[test]
    fn none_becomes_null() {
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some("x")), Value::String("x".to_string()));
    }

    #[test]
    fn serializes_as_plain_json() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), Value::from(vec![1, 2]));
        map.insert("a".to_string(), Value::Null);

        let json = serde_json::to_string(&Value::Mapping(map)).unwrap();

        assert_eq!(json, r#"{"b":[1,2],"a":null}"#);
    }

    #[test]
    fn deserialize_into_typed_struct() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Database {
            host: String,
            port: u16,
        }

        let mut map = IndexMap::new();
        map.insert("host".to_string(), Value::from("localhost"));
        map.insert("port".to_string(), Value::from(5432));

        let db: Database = Value::Mapping(map).deserialize_into().unwrap();

        assert_eq!(
            db,
            Database {
                host: "localhost".to_string(),
                port: 5432,
            }
        );
    }

    #[test]
    fn deserialize_into_reports_shape_mismatch() {
        let result = Value::from("not a number").deserialize_into::<u16>();
        assert!(result.is_err());
    }
}
