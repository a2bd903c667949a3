//! The closed value model fed to the canonical encoder.
//!
//! Every payload is mapped into a [`Value`] tree up front, so the encoder can
//! match exhaustively and never inspects types at runtime.

use serde::{Deserialize, Serialize};

/// A field of a [`Value::Record`].
///
/// A field with `present == false` is dropped by the encoder, exactly as if
/// it had never been added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: Value,
    pub present: bool,
}

/// Tagged union of everything the canonical encoder understands.
///
/// Integers are held as `i128` so every signed and unsigned 64-bit source
/// maps to the same variant, and therefore to the same encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    String(String),
    /// Ordered list. Order is significant and preserved.
    Sequence(Vec<Value>),
    /// Fixed, named fields. Construction order is irrelevant to the encoding.
    Record(Vec<Field>),
    /// Dynamic key/value mapping. Keys may be any value.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Start building a record.
    pub fn record() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Build a sequence from anything convertible to values.
    pub fn sequence<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Build a map from key/value pairs.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a present record field, or a map entry with a string key.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields
                .iter()
                .find(|f| f.present && f.name == name)
                .map(|f| &f.value),
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(name))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Iterate the named entries of a record (present fields only) or a map
    /// with string keys, in construction order.
    pub fn named_entries(&self) -> Vec<(&str, &Value)> {
        match self {
            Value::Record(fields) => fields
                .iter()
                .filter(|f| f.present)
                .map(|f| (f.name.as_str(), &f.value))
                .collect(),
            Value::Map(entries) => entries
                .iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Builder for [`Value::Record`].
#[derive(Debug, Default)]
pub struct RecordBuilder {
    fields: Vec<Field>,
}

impl RecordBuilder {
    /// Add a present field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            present: true,
        });
        self
    }

    /// Add a field that is omitted when `value` is `None`.
    pub fn optional<V: Into<Value>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.field(name, v),
            None => self.absent(name),
        }
    }

    /// Add an explicitly absent field.
    pub fn absent(mut self, name: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: Value::Null,
            present: false,
        });
        self
    }

    pub fn build(self) -> Value {
        Value::Record(self.fields)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Integer(n as i128)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Mapping layer from JSON documents.
///
/// Objects become records with every field present; numbers that fit an
/// integer stay integers, everything else becomes a float.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i as i128)
                } else if let Some(u) = n.as_u64() {
                    Value::Integer(u as i128)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Record(
                map.into_iter()
                    .map(|(name, v)| Field {
                        name,
                        value: Value::from(v),
                        present: true,
                    })
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_optional_marks_absent() {
        let v = Value::record()
            .field("a", 1)
            .optional::<i64>("b", None)
            .optional("c", Some("x"))
            .build();

        match &v {
            Value::Record(fields) => {
                assert_eq!(fields.len(), 3);
                assert!(fields[0].present);
                assert!(!fields[1].present);
                assert!(fields[2].present);
            }
            other => panic!("expected record, got {other:?}"),
        }
        assert!(v.get("b").is_none());
        assert_eq!(v.get("c").and_then(Value::as_str), Some("x"));
    }

    #[test]
    fn test_integer_sources_unify() {
        assert_eq!(Value::from(5u32), Value::from(5i64));
        assert_eq!(Value::from(u64::MAX), Value::Integer(u64::MAX as i128));
    }

    #[test]
    fn test_json_mapping() {
        let json = serde_json::json!({"a": 1, "b": [1.5, null], "c": "x", "d": u64::MAX});
        let v = Value::from(json);

        assert_eq!(v.get("a"), Some(&Value::Integer(1)));
        assert_eq!(
            v.get("b"),
            Some(&Value::Sequence(vec![Value::Float(1.5), Value::Null]))
        );
        assert_eq!(v.get("d"), Some(&Value::Integer(u64::MAX as i128)));
    }

    #[test]
    fn test_cbor_roundtrip_is_exact() {
        let v = Value::record()
            .field("f", 0.1)
            .field("max", u64::MAX)
            .field("min", i64::MIN)
            .absent("gone")
            .field("m", Value::map([(Value::Integer(1), Value::Null)]))
            .build();

        let mut buf = Vec::new();
        ciborium::into_writer(&v, &mut buf).unwrap();
        let back: Value = ciborium::from_reader(&buf[..]).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn test_map_string_key_lookup() {
        let v = Value::map([("k", 1), ("j", 2)]);
        assert_eq!(v.get("j"), Some(&Value::Integer(2)));
        assert_eq!(v.named_entries().len(), 2);
    }
}
