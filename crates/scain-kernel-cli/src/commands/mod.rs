//! Subcommand implementations.

pub mod claims;
pub mod events;
pub mod hash;
