//! Proptest generators for property-based testing.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use scain_kernel_core::{Code, DeviceType, Field, HashAlgorithm, Value, CODE_ALPHABET};

/// Generate a finite float, including both zeros.
pub fn finite_float() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        Just(-0.0),
        -1.0e12f64..1.0e12f64,
        prop::num::f64::NORMAL,
    ]
}

/// Generate a scalar value.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        finite_float().prop_map(Value::Float),
        "[a-zA-Z0-9 _\\-\"\\\\\u{e9}\n]{0,12}".prop_map(Value::String),
    ]
}

/// Field names: short, with some characters that need escaping.
pub fn field_name() -> impl Strategy<Value = String> {
    "[a-z\"!]{1,5}".prop_map(String::from)
}

/// Generate an encodable value tree.
///
/// Record fields and map keys are unique, so encoding never fails.
pub fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Sequence),
            prop::collection::btree_map(field_name(), (inner.clone(), any::<bool>()), 0..5).prop_map(
                |fields| {
                    Value::Record(
                        fields
                            .into_iter()
                            .map(|(name, (value, present))| Field {
                                name,
                                value,
                                present,
                            })
                            .collect(),
                    )
                }
            ),
            prop::collection::btree_map(any::<i32>(), inner.clone(), 0..5).prop_map(|entries| {
                Value::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (Value::from(k), v))
                        .collect(),
                )
            }),
            prop::collection::btree_map(field_name(), inner, 0..5).prop_map(|entries| {
                Value::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (Value::String(k), v))
                        .collect(),
                )
            }),
        ]
    })
}

/// Rebuild `value` with every record's fields and every map's entries
/// shuffled by a seeded RNG. Sequences keep their order.
pub fn shuffled(value: &Value, seed: u64) -> Value {
    let mut rng = StdRng::seed_from_u64(seed);
    shuffle_with(value, &mut rng)
}

fn shuffle_with(value: &Value, rng: &mut StdRng) -> Value {
    match value {
        Value::Sequence(items) => Value::Sequence(items.iter().map(|v| shuffle_with(v, rng)).collect()),
        Value::Record(fields) => {
            let mut fields: Vec<Field> = fields
                .iter()
                .map(|f| Field {
                    name: f.name.clone(),
                    value: shuffle_with(&f.value, rng),
                    present: f.present,
                })
                .collect();
            fields.shuffle(rng);
            Value::Record(fields)
        }
        Value::Map(entries) => {
            let mut entries: Vec<(Value, Value)> = entries
                .iter()
                .map(|(k, v)| (shuffle_with(k, rng), shuffle_with(v, rng)))
                .collect();
            entries.shuffle(rng);
            Value::Map(entries)
        }
        other => other.clone(),
    }
}

/// Generate a device type.
pub fn device_type() -> impl Strategy<Value = DeviceType> {
    prop::sample::select(DeviceType::ALL.to_vec())
}

/// Generate a claimable device type.
pub fn claimable_device_type() -> impl Strategy<Value = DeviceType> {
    prop::sample::select(
        DeviceType::ALL
            .into_iter()
            .filter(DeviceType::is_claimable)
            .collect::<Vec<_>>(),
    )
}

/// Generate a well-formed code.
pub fn code() -> impl Strategy<Value = Code> {
    prop::collection::vec(prop::sample::select(CODE_ALPHABET.to_vec()), 8).prop_map(|bytes| {
        let text: String = bytes.into_iter().map(char::from).collect();
        Code::parse(&text).unwrap_or_else(|e| panic!("generated malformed code {text:?}: {e}"))
    })
}

/// Generate a hash algorithm.
pub fn hash_algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![Just(HashAlgorithm::Sha256), Just(HashAlgorithm::Sha512)]
}
