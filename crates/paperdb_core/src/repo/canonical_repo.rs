//! Canonical-map persistence.
//!
//! # Responsibility
//! - Load the full `transient -> canonical | null` map for a session snapshot.
//! - Mark transient ids as seen and record merge redirects.
//!
//! # Invariants
//! - Keys are always transient ids; values, when present, are canonical ids.
//! - Marking an id as seen never clears an existing redirect.

use super::{RepoError, RepoResult};
use crate::model::id::EntityId;
use rusqlite::{params, Connection};
use std::collections::HashMap;

/// In-memory snapshot of the canonical-map.
pub type CanonicalMap = HashMap<EntityId, Option<EntityId>>;

/// Loads every canonical-map row.
///
/// Fails with `InvalidData` when a stored key is canonical or a stored value
/// is transient, because acquisition would then resolve to the wrong row.
pub fn load_canonical_map(conn: &Connection) -> RepoResult<CanonicalMap> {
    let mut stmt = conn.prepare("SELECT hashid, canonical FROM canonical_id;")?;
    let mut rows = stmt.query([])?;
    let mut map = CanonicalMap::new();
    while let Some(row) = rows.next()? {
        let hashid: EntityId = row.get(0)?;
        let canonical: Option<EntityId> = row.get(1)?;
        if hashid.is_canonical() {
            return Err(RepoError::InvalidData(format!(
                "canonical id `{hashid}` used as key in canonical_id.hashid"
            )));
        }
        if let Some(target) = canonical.filter(EntityId::is_transient) {
            return Err(RepoError::InvalidData(format!(
                "transient id `{target}` used as redirect target in canonical_id.canonical"
            )));
        }
        map.insert(hashid, canonical);
    }
    Ok(map)
}

/// Records that a transient id has been acquired, without a redirect.
pub fn mark_seen(conn: &Connection, hashid: EntityId) -> RepoResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO canonical_id (hashid, canonical) VALUES (?1, NULL);",
        [hashid],
    )?;
    Ok(())
}

/// Points a transient id at the canonical id that superseded it.
pub fn record_redirect(conn: &Connection, hashid: EntityId, canonical: EntityId) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO canonical_id (hashid, canonical)
         VALUES (?1, ?2)
         ON CONFLICT (hashid) DO UPDATE SET canonical = excluded.canonical;",
        params![hashid, canonical],
    )?;
    Ok(())
}
