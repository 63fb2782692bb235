//! Content-addressed acquisition and canonicalization engine for
//! bibliographic records.
//!
//! Sources hand typed entity graphs to a [`Session`], which assigns every
//! entity a 128-bit identity, upserts it idempotently, logs the raw records
//! to an append-only history, and can later merge duplicate identities or
//! rebuild the store by replaying that history.

pub mod config;
pub mod db;
pub mod history;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, LoggingConfig, ReplayPolicy, StoreConfig};
pub use history::{HistoryError, HistoryLog, ReplayRange};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{
    Author, DatePrecision, Entity, EntityKind, Identified, Institution, InstitutionCategory, Link,
    Paper, PaperAuthor, Release, Role, Topic, Venue, VenueType,
};
pub use model::id::{EntityId, Provenance};
pub use repo::{RepoError, RepoResult};
pub use service::error::{StoreError, StoreResult};
pub use service::merge::MergeOutcome;
pub use service::replay::ReplayReport;
pub use service::session::Session;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
