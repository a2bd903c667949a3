//! Hash command implementation.

use std::path::Path;

use anyhow::{bail, Context, Result};
use scain_kernel::core::{canonical_bytes, Hasher};
use scain_kernel::HashAlgorithm;

use crate::input::read_value;

pub fn run(
    input: Option<&Path>,
    algorithm: HashAlgorithm,
    canonical: bool,
    expect: Option<&str>,
) -> Result<()> {
    let value = read_value(input)?;

    if canonical {
        let bytes = canonical_bytes(&value).context("payload cannot be encoded")?;
        println!("{}", String::from_utf8_lossy(&bytes));
        return Ok(());
    }

    let hasher = Hasher::new();
    let digest = hasher
        .compute(&value, algorithm)
        .context("payload cannot be hashed")?;
    println!("{digest}");

    if let Some(expected) = expect {
        if !hasher.verify(&value, expected, algorithm) {
            bail!("digest mismatch: expected {expected}");
        }
    }
    Ok(())
}
