//! Engine services: acquisition, import, replay and merge.
//!
//! # Responsibility
//! - Orchestrate repository calls into store-level operations.
//! - Own transaction boundaries and session-local caches.

mod acquire;
pub mod error;
pub mod merge;
pub mod replay;
pub mod session;
