//! Canonical encoding is a pure function of the logical value.
//!
//! Golden vectors pin exact bytes and digests; the property tests check that
//! rebuilding a value in any field order never changes them.

use std::sync::Arc;

use proptest::prelude::*;
use scain_kernel::core::{canonical_bytes, Hasher};
use scain_kernel::store::MemoryStore;
use scain_kernel::{HashAlgorithm, Scain, ScainConfig, Value};
use scain_kernel_testkit::generators::{hash_algorithm, shuffled, value};
use scain_kernel_testkit::vectors::{nested_out_of_order, NESTED_SHA512};
use scain_kernel_testkit::{all_vectors, verify_all_vectors};

#[test]
fn test_golden_vectors() {
    verify_all_vectors().unwrap();
}

#[test]
fn test_golden_vectors_through_facade() {
    let scain = Scain::new(Arc::new(MemoryStore::new()), ScainConfig::default());

    for vector in all_vectors() {
        let value = (vector.build)();
        assert_eq!(
            scain.encode(&value).unwrap(),
            vector.expected_canonical.as_bytes(),
            "{}",
            vector.name
        );
        assert_eq!(
            scain.compute_hash(&value, HashAlgorithm::Sha256).unwrap(),
            vector.expected_sha256,
            "{}",
            vector.name
        );
    }

    assert_eq!(
        scain
            .compute_hash(&nested_out_of_order(), HashAlgorithm::Sha512)
            .unwrap(),
        NESTED_SHA512
    );
}

#[test]
fn test_non_finite_floats_do_not_hash() {
    let hasher = Hasher::new();
    for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let value = Value::record().field("reading", f).build();
        assert!(hasher.compute(&value, HashAlgorithm::Sha256).is_err());
    }
}

fn contains_string(v: &Value) -> bool {
    match v {
        Value::String(_) => true,
        Value::Sequence(items) => items.iter().any(contains_string),
        Value::Record(fields) => fields.iter().any(|f| f.present && contains_string(&f.value)),
        Value::Map(entries) => entries.iter().any(|(k, v)| contains_string(k) || contains_string(v)),
        _ => false,
    }
}

proptest! {
    #[test]
    fn prop_shuffled_value_hashes_identically(v in value(), seed in any::<u64>(), alg in hash_algorithm()) {
        let hasher = Hasher::new();
        let original = hasher.compute(&v, alg).unwrap();
        let reordered = hasher.compute(&shuffled(&v, seed), alg).unwrap();
        prop_assert_eq!(&original, &reordered);
        prop_assert_eq!(original.len(), alg.hex_len());
        prop_assert!(hasher.verify(&shuffled(&v, seed.wrapping_add(1)), &original, alg));
    }

    #[test]
    fn prop_encoding_is_utf8_without_whitespace_outside_strings(v in value()) {
        let bytes = canonical_bytes(&v).unwrap();
        let text = std::str::from_utf8(&bytes);
        prop_assert!(text.is_ok());
        if !contains_string(&v) {
            prop_assert!(!bytes.iter().any(u8::is_ascii_whitespace));
        }
    }
}
