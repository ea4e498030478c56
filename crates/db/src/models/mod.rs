//! Row structs for the registry and sample relations.
//!
//! Each submodule contains a `FromRow` struct matching the database row and
//! the conversion into the corresponding `fleetwatch-core` type.

pub mod machine;
pub mod sample;
