//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical encoding and its SHA-256 digest. Any
//! implementation that hashes the same logical value must reproduce them.

use scain_kernel_core::{canonical_bytes, HashAlgorithm, Hasher, Value};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Builds the input value.
    pub build: fn() -> Value,
    /// Expected canonical encoding (UTF-8).
    pub expected_canonical: &'static str,
    /// Expected SHA-256 of the canonical encoding (hex).
    pub expected_sha256: &'static str,
}

/// SHA-512 of `{"a":1,"b":[1,2]}`.
pub const NESTED_SHA512: &str = "8aa9fb110250d16288c784ded214eb7e0951b53e6f93145314526ffe5e4572f3c4669b18e7fa3542e3a93b27467894352e3556ed55b923f745767c6e6c37f139";

/// `{b:[1,2], a:1}`, built with fields out of order.
pub fn nested_out_of_order() -> Value {
    Value::record()
        .field("b", Value::sequence([1, 2]))
        .field("a", 1)
        .build()
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "null",
            build: || Value::Null,
            expected_canonical: "null",
            expected_sha256: "74234e98afe7498fb5daf1f36ac2d78acc339464f950703b8c019892f982b90b",
        },
        GoldenVector {
            name: "empty record",
            build: || Value::record().build(),
            expected_canonical: "{}",
            expected_sha256: "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a",
        },
        GoldenVector {
            name: "empty sequence",
            build: || Value::Sequence(Vec::new()),
            expected_canonical: "[]",
            expected_sha256: "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945",
        },
        GoldenVector {
            name: "integer zero and float zero stay apart",
            build: || Value::record().field("i", 0).field("f", 0.0).build(),
            expected_canonical: r#"{"f":0.0,"i":0}"#,
            expected_sha256: "eef2602f5ae775931c6b63251a135e847212b190060c82001a7f849d9e7b041c",
        },
        GoldenVector {
            name: "nested record built out of order",
            build: nested_out_of_order,
            expected_canonical: r#"{"a":1,"b":[1,2]}"#,
            expected_sha256: "8baa73198470c7bb4c3ce142a8fd651affc0310d878bb9bd159e37a573fb4874",
        },
        GoldenVector {
            name: "absent field dropped",
            build: || Value::record().field("x", 1).absent("y").build(),
            expected_canonical: r#"{"x":1}"#,
            expected_sha256: "5041bf1f713df204784353e82f6a4a535931cb64f1f4b4a5aeaffcb720918b22",
        },
        GoldenVector {
            name: "escaped string",
            build: || Value::from("line\n\"quoted\""),
            expected_canonical: r#""line\n\"quoted\"""#,
            expected_sha256: "df6b0d43eb9f37e6c76f6e4d1eae5bfd8658557989ecd4850923905b373d2de3",
        },
        GoldenVector {
            name: "non-ascii string kept as utf-8",
            build: || Value::from("caf\u{e9}"),
            expected_canonical: "\"caf\u{e9}\"",
            expected_sha256: "28380feb8724d669bc8d4cf5b5a5bb1adbdc61b81ebd06f3fabc567b4f3b0fc5",
        },
        GoldenVector {
            name: "map with mixed key types",
            build: || Value::map([(Value::Integer(1), Value::Integer(2)), (Value::from("k"), Value::Integer(1))]),
            expected_canonical: r#"{"k":1,1:2}"#,
            expected_sha256: "11a18c501929fa48fd4f7484c27af2ae095d68b00ab5a1c405628bf39a7c2992",
        },
        GoldenVector {
            name: "sensor reading",
            build: || {
                Value::record()
                    .field("temp", 21.5)
                    .field("readings", Value::sequence([Value::from(1), Value::from(-2), Value::from(3.25)]))
                    .field("deviceId", "esp-1")
                    .field("lot", Value::Null)
                    .build()
            },
            expected_canonical: r#"{"deviceId":"esp-1","lot":null,"readings":[1,-2,3.25],"temp":21.5}"#,
            expected_sha256: "4d9cc4d283d4c6dee7609f48e926ab1251bd27d5ea1189f906abd7e4a8dfdb47",
        },
        GoldenVector {
            name: "64-bit extremes",
            build: || Value::sequence([Value::from(u64::MAX), Value::from(i64::MIN)]),
            expected_canonical: "[18446744073709551615,-9223372036854775808]",
            expected_sha256: "7a7261fdd6a77ce2fc95a5d6fa6f1fe460911b33d04f1259008781b2bc635dcf",
        },
        GoldenVector {
            name: "keys ordered by escaped bytes",
            build: || Value::record().field("a", 1).field("a!", 2).build(),
            expected_canonical: r#"{"a!":2,"a":1}"#,
            expected_sha256: "8336bb968143bb3ad6ca74e5f539210932444e05d909aaed41bdf20abdb7a17a",
        },
    ]
}

/// Check every vector, returning a description of the first mismatch.
pub fn verify_all_vectors() -> Result<(), String> {
    let hasher = Hasher::new();

    for vector in all_vectors() {
        let value = (vector.build)();

        let bytes = canonical_bytes(&value).map_err(|e| format!("{}: {e}", vector.name))?;
        if bytes != vector.expected_canonical.as_bytes() {
            return Err(format!(
                "{}: canonical mismatch, got {:?}",
                vector.name,
                String::from_utf8_lossy(&bytes)
            ));
        }

        let digest = hasher
            .compute(&value, HashAlgorithm::Sha256)
            .map_err(|e| format!("{}: {e}", vector.name))?;
        if digest != vector.expected_sha256 {
            return Err(format!("{}: digest mismatch, got {digest}", vector.name));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_verify() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_vectors_have_distinct_digests() {
        let mut digests: Vec<&str> = all_vectors().iter().map(|v| v.expected_sha256).collect();
        digests.sort_unstable();
        digests.dedup();
        assert_eq!(digests.len(), all_vectors().len());
    }

    #[test]
    fn test_sha512_vector() {
        let digest = Hasher::new()
            .compute(&nested_out_of_order(), HashAlgorithm::Sha512)
            .unwrap();
        assert_eq!(digest, NESTED_SHA512);
        assert_eq!(hex::decode(&digest).unwrap().len(), 64);
    }
}
