//! Bulk statements used by canonicalization merges.
//!
//! # Responsibility
//! - Describe, per entity kind, its table, key, scalar columns and every
//!   edge column that references it.
//! - Rewrite references from folded ids to a target id in bulk.
//! - Delete folded entity rows.
//!
//! # Invariants
//! - Folded ids are always bound as parameters (`IN (?2, ?3, ...)`).
//! - After `rewrite_references` no edge column of the kind references a
//!   folded id: collisions are dropped instead of kept.

use super::RepoResult;
use crate::model::entity::EntityKind;
use crate::model::id::EntityId;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

/// Storage layout of one merge-able entity kind.
#[derive(Debug)]
pub struct KindSchema {
    pub table: &'static str,
    pub key: &'static str,
    pub scalar_columns: &'static [&'static str],
    /// `(table, column)` pairs holding foreign keys to this kind.
    pub references: &'static [(&'static str, &'static str)],
}

const PAPER: KindSchema = KindSchema {
    table: "paper",
    key: "paper_id",
    scalar_columns: &["title", "abstract", "citation_count"],
    references: &[
        ("paper_author", "paper_id"),
        ("paper_author_institution", "paper_id"),
        ("paper_release", "paper_id"),
        ("paper_topic", "paper_id"),
        ("paper_link", "paper_id"),
        ("paper_scraper", "paper_id"),
        ("paper_flag", "paper_id"),
    ],
};

const AUTHOR: KindSchema = KindSchema {
    table: "author",
    key: "author_id",
    scalar_columns: &["name"],
    references: &[
        ("paper_author", "author_id"),
        ("paper_author_institution", "author_id"),
        ("author_link", "author_id"),
        ("author_alias", "author_id"),
        ("author_institution", "author_id"),
    ],
};

const INSTITUTION: KindSchema = KindSchema {
    table: "institution",
    key: "institution_id",
    scalar_columns: &["name", "category"],
    references: &[
        ("paper_author_institution", "institution_id"),
        ("author_institution", "institution_id"),
    ],
};

const RELEASE: KindSchema = KindSchema {
    table: "release",
    key: "release_id",
    scalar_columns: &[
        "date",
        "date_precision",
        "status",
        "volume",
        "publisher",
        "venue_id",
    ],
    references: &[("paper_release", "release_id")],
};

const VENUE: KindSchema = KindSchema {
    table: "venue",
    key: "venue_id",
    scalar_columns: &["type", "name"],
    references: &[("release", "venue_id"), ("venue_link", "venue_id")],
};

const TOPIC: KindSchema = KindSchema {
    table: "topic",
    key: "topic_id",
    scalar_columns: &["topic"],
    references: &[("paper_topic", "topic_id")],
};

/// Returns the storage layout for a kind.
pub fn schema_for(kind: EntityKind) -> &'static KindSchema {
    match kind {
        EntityKind::Paper => &PAPER,
        EntityKind::Author => &AUTHOR,
        EntityKind::Institution => &INSTITUTION,
        EntityKind::Release => &RELEASE,
        EntityKind::Venue => &VENUE,
        EntityKind::Topic => &TOPIC,
    }
}

/// Returns whether an entity row exists.
pub fn row_exists(conn: &Connection, kind: EntityKind, id: EntityId) -> RepoResult<bool> {
    let schema = schema_for(kind);
    let found = conn
        .query_row(
            &format!(
                "SELECT 1 FROM {table} WHERE {key} = ?1;",
                table = schema.table,
                key = schema.key
            ),
            [id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Creates the `target` row as a copy of the `model` row's scalar fields.
///
/// Leaves an existing `target` row untouched. Returns whether a row was created.
pub fn copy_row(
    conn: &Connection,
    kind: EntityKind,
    model: EntityId,
    target: EntityId,
) -> RepoResult<bool> {
    let schema = schema_for(kind);
    let columns = schema.scalar_columns.join(", ");
    let inserted = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {table} ({key}, {columns})
             SELECT ?1, {columns} FROM {table} WHERE {key} = ?2;",
            table = schema.table,
            key = schema.key,
        ),
        params![target, model],
    )?;
    Ok(inserted > 0)
}

/// Counts of rows touched while moving edges onto the merge target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub rewritten: usize,
    pub dropped: usize,
}

/// Moves every edge referencing one of `folded` onto `target`.
///
/// Uses `UPDATE OR IGNORE`; edges left behind because the rewritten key
/// already existed are then deleted.
pub fn rewrite_references(
    conn: &Connection,
    kind: EntityKind,
    target: EntityId,
    folded: &[EntityId],
) -> RepoResult<RewriteStats> {
    let mut stats = RewriteStats::default();
    if folded.is_empty() {
        return Ok(stats);
    }

    let placeholders = placeholder_list(2, folded.len());
    for (table, column) in schema_for(kind).references {
        stats.rewritten += conn.execute(
            &format!(
                "UPDATE OR IGNORE {table} SET {column} = ?1 WHERE {column} IN ({placeholders});"
            ),
            params_from_iter(std::iter::once(target).chain(folded.iter().copied())),
        )?;
        stats.dropped += conn.execute(
            &format!(
                "DELETE FROM {table} WHERE {column} IN ({});",
                placeholder_list(1, folded.len())
            ),
            params_from_iter(folded.iter().copied()),
        )?;
    }
    Ok(stats)
}

/// Deletes the entity rows of `folded`. Returns the number of rows deleted.
pub fn delete_rows(conn: &Connection, kind: EntityKind, folded: &[EntityId]) -> RepoResult<usize> {
    if folded.is_empty() {
        return Ok(0);
    }
    let schema = schema_for(kind);
    let deleted = conn.execute(
        &format!(
            "DELETE FROM {table} WHERE {key} IN ({placeholders});",
            table = schema.table,
            key = schema.key,
            placeholders = placeholder_list(1, folded.len())
        ),
        params_from_iter(folded.iter().copied()),
    )?;
    Ok(deleted)
}

/// Builds `?start, ?start+1, ...` for `count` parameters.
fn placeholder_list(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}
