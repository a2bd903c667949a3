//! Canonical encoding of [`Value`] trees.
//!
//! The output is a compact JSON-like text whose bytes depend only on the
//! logical content of the value:
//! - Record fields marked absent are dropped
//! - Record and map entries are sorted by the bytes of their encoded key
//! - Sequences keep their order
//! - Integers are plain decimal, floats always carry a `.` or an exponent
//! - Strings use JSON escaping
//!
//! **CRITICAL**: This encoding is the pre-image of every stored hash. Changes
//! invalidate all existing fingerprints.

use std::fmt;

use crate::error::EncodingError;
use crate::value::Value;

/// Stateless canonical encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalEncoder;

impl CanonicalEncoder {
    pub const fn new() -> Self {
        Self
    }

    /// Encode a value to its canonical bytes.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodingError> {
        let mut buf = Vec::new();
        encode_value(&mut buf, value, &Path::root())?;
        Ok(buf)
    }
}

/// Encode a value to canonical bytes.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, EncodingError> {
    CanonicalEncoder.encode(value)
}

/// Location inside the value tree, for error reporting.
#[derive(Debug, Clone)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    fn push_field(&self, field: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(field.to_string());
        Self { segments }
    }

    fn push_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(format!("[{}]", index));
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "root")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// Recursively encode a value.
fn encode_value(buf: &mut Vec<u8>, value: &Value, path: &Path) -> Result<(), EncodingError> {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Integer(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        Value::Float(f) => encode_float(buf, *f, path)?,
        Value::String(s) => encode_text(buf, s)?,
        Value::Sequence(items) => encode_sequence(buf, items, path)?,
        Value::Record(fields) => {
            let mut entries = Vec::with_capacity(fields.len());
            for field in fields.iter().filter(|f| f.present) {
                let mut key = Vec::new();
                encode_text(&mut key, &field.name)?;
                entries.push((key, &field.value));
            }
            encode_entries(buf, entries, path)?;
        }
        Value::Map(pairs) => {
            let mut entries = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                let mut key = Vec::new();
                encode_value(&mut key, k, path)?;
                entries.push((key, v));
            }
            encode_entries(buf, entries, path)?;
        }
    }
    Ok(())
}

/// Encode a float in its shortest round-tripping form.
///
/// `Debug` formatting always emits a fractional part or an exponent, which
/// keeps `0.0` apart from the integer `0`. Negative zero is folded into zero.
fn encode_float(buf: &mut Vec<u8>, f: f64, path: &Path) -> Result<(), EncodingError> {
    if !f.is_finite() {
        return Err(EncodingError::NonFiniteNumber {
            path: path.to_string(),
        });
    }
    let f = if f == 0.0 { 0.0 } else { f };
    buf.extend_from_slice(format!("{:?}", f).as_bytes());
    Ok(())
}

/// Encode a string as a JSON string token.
fn encode_text(buf: &mut Vec<u8>, s: &str) -> Result<(), EncodingError> {
    serde_json::to_writer(&mut *buf, s).map_err(|e| EncodingError::Serialization(e.to_string()))
}

fn encode_sequence(buf: &mut Vec<u8>, items: &[Value], path: &Path) -> Result<(), EncodingError> {
    buf.push(b'[');
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            buf.push(b',');
        }
        encode_value(buf, item, &path.push_index(idx))?;
    }
    buf.push(b']');
    Ok(())
}

/// Encode already-keyed entries as an object.
///
/// Entries are sorted by their encoded key bytes. Two entries with the same
/// encoded key are rejected rather than resolved.
fn encode_entries(
    buf: &mut Vec<u8>,
    mut entries: Vec<(Vec<u8>, &Value)>,
    path: &Path,
) -> Result<(), EncodingError> {
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(EncodingError::DuplicateKey {
            path: path.to_string(),
            key: String::from_utf8_lossy(&pair[0].0).into_owned(),
        });
    }

    buf.push(b'{');
    for (idx, (key, value)) in entries.iter().enumerate() {
        if idx > 0 {
            buf.push(b',');
        }
        buf.extend_from_slice(key);
        buf.push(b':');
        let label = String::from_utf8_lossy(key);
        encode_value(buf, value, &path.push_field(label.trim_matches('"')))?;
    }
    buf.push(b'}');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Field;

    fn encode_str(value: &Value) -> String {
        String::from_utf8(canonical_bytes(value).unwrap()).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(encode_str(&Value::Null), "null");
        assert_eq!(encode_str(&Value::Bool(true)), "true");
        assert_eq!(encode_str(&Value::Bool(false)), "false");
        assert_eq!(encode_str(&Value::Integer(0)), "0");
        assert_eq!(encode_str(&Value::Integer(-42)), "-42");
        assert_eq!(encode_str(&Value::Integer(u64::MAX as i128)), "18446744073709551615");
    }

    #[test]
    fn test_float_forms() {
        assert_eq!(encode_str(&Value::Float(0.0)), "0.0");
        assert_eq!(encode_str(&Value::Float(-0.0)), "0.0");
        assert_eq!(encode_str(&Value::Float(1.5)), "1.5");
        assert_eq!(encode_str(&Value::Float(-2.25)), "-2.25");
        assert_eq!(encode_str(&Value::Float(1e300)), "1e300");
        assert_eq!(encode_str(&Value::Float(1e-7)), "1e-7");
    }

    #[test]
    fn test_non_finite_rejected_with_path() {
        let v = Value::record()
            .field("readings", Value::sequence([Value::Float(1.0), Value::Float(f64::NAN)]))
            .build();
        let err = canonical_bytes(&v).unwrap_err();
        assert_eq!(
            err,
            EncodingError::NonFiniteNumber {
                path: "readings.[1]".into()
            }
        );

        assert!(canonical_bytes(&Value::Float(f64::INFINITY)).is_err());
        assert!(canonical_bytes(&Value::Float(f64::NEG_INFINITY)).is_err());
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(encode_str(&Value::from("a\"b")), r#""a\"b""#);
        assert_eq!(encode_str(&Value::from("line\nbreak")), r#""line\nbreak""#);
        assert_eq!(encode_str(&Value::from("\u{1}")), r#""\u0001""#);
        assert_eq!(encode_str(&Value::from("é")), "\"é\"");
    }

    #[test]
    fn test_record_field_order_irrelevant() {
        let a = Value::record()
            .field("a", 1)
            .field("b", Value::sequence([1, 2]))
            .build();
        let b = Value::record()
            .field("b", Value::sequence([1, 2]))
            .field("a", 1)
            .build();

        assert_eq!(encode_str(&a), r#"{"a":1,"b":[1,2]}"#);
        assert_eq!(encode_str(&a), encode_str(&b));
    }

    #[test]
    fn test_sorted_by_escaped_name() {
        // `"a!"` sorts before `"a"` because '!' (0x21) < '"' (0x22)
        let v = Value::record().field("a", 1).field("a!", 2).build();
        assert_eq!(encode_str(&v), r#"{"a!":2,"a":1}"#);
    }

    #[test]
    fn test_absent_fields_dropped() {
        let with_absent = Value::record().field("a", 1).absent("b").build();
        let without = Value::record().field("a", 1).build();
        let with_null = Value::record().field("a", 1).field("b", Value::Null).build();

        assert_eq!(encode_str(&with_absent), r#"{"a":1}"#);
        assert_eq!(encode_str(&with_absent), encode_str(&without));
        assert_eq!(encode_str(&with_null), r#"{"a":1,"b":null}"#);
    }

    #[test]
    fn test_empty_containers_distinct_from_null() {
        assert_eq!(encode_str(&Value::Sequence(vec![])), "[]");
        assert_eq!(encode_str(&Value::Record(vec![])), "{}");
        assert_eq!(encode_str(&Value::Map(vec![])), "{}");
        assert_ne!(encode_str(&Value::Sequence(vec![])), encode_str(&Value::Null));
    }

    #[test]
    fn test_map_keys_ordered_by_encoding() {
        let v = Value::map([(Value::Integer(10), "ten"), (Value::Integer(2), "two")]);
        // "10" < "2" bytewise
        assert_eq!(encode_str(&v), r#"{10:"ten",2:"two"}"#);

        let mixed = Value::map([(Value::from("k"), 1), (Value::Integer(1), 2)]);
        // '"' (0x22) < '1' (0x31)
        assert_eq!(encode_str(&mixed), r#"{"k":1,1:2}"#);
    }

    #[test]
    fn test_duplicate_record_field_rejected() {
        let v = Value::Record(vec![
            Field {
                name: "x".into(),
                value: Value::Integer(1),
                present: true,
            },
            Field {
                name: "x".into(),
                value: Value::Integer(2),
                present: true,
            },
        ]);
        let err = canonical_bytes(&v).unwrap_err();
        assert!(matches!(err, EncodingError::DuplicateKey { ref key, .. } if key == "\"x\""));
    }

    #[test]
    fn test_duplicate_absent_field_is_not_a_conflict() {
        let v = Value::record().field("x", 1).absent("x").build();
        assert_eq!(encode_str(&v), r#"{"x":1}"#);
    }

    #[test]
    fn test_duplicate_map_key_rejected() {
        let v = Value::map([(Value::Integer(1), "a"), (Value::from(1u8), "b")]);
        assert!(matches!(
            canonical_bytes(&v),
            Err(EncodingError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_injectivity_pairs() {
        let pairs = [
            (
                Value::record().field("a", 1).absent("b").build(),
                Value::record().field("a", 1).field("b", Value::Null).build(),
            ),
            (Value::Sequence(vec![]), Value::Null),
            (Value::Integer(0), Value::Float(0.0)),
            (Value::from("1"), Value::Integer(1)),
            (Value::from("true"), Value::Bool(true)),
            (
                Value::sequence([1, 2]),
                Value::sequence([2, 1]),
            ),
        ];
        for (a, b) in pairs {
            assert_ne!(encode_str(&a), encode_str(&b), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_nested() {
        let v = Value::record()
            .field(
                "outer",
                Value::record().field("z", true).field("m", Value::Null).build(),
            )
            .field("list", Value::sequence([3, 2, 1]))
            .build();
        assert_eq!(
            encode_str(&v),
            r#"{"list":[3,2,1],"outer":{"m":null,"z":true}}"#
        );
    }
}
