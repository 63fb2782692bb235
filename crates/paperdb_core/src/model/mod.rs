//! Entity model and identity scheme.
//!
//! # Responsibility
//! - Define the bibliographic records that sources produce.
//! - Assign every record a 128-bit identifier carrying its provenance.
//!
//! # Invariants
//! - Identical defining content always yields the same transient identifier.
//! - Records reference each other by value; only storage references by id.

pub mod entity;
pub mod id;
