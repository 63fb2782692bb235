//! Canonicalization of duplicate identities.
//!
//! # Responsibility
//! - Fold a set of ids denoting one real entity into a single canonical id.
//! - Rewrite every edge that referenced a folded id.
//!
//! # Invariants
//! - A merge set holds at most one canonical id; it becomes the target.
//! - The whole merge is one transaction.
//! - With `redirect_merged`, every folded id is redirected to the target in
//!   the canonical-map so re-acquired content cannot resurrect it.

use super::error::{StoreError, StoreResult};
use super::session::Session;
use crate::model::entity::EntityKind;
use crate::model::id::EntityId;
use crate::repo::canonical_repo::record_redirect;
use crate::repo::merge_repo::{copy_row, delete_rows, rewrite_references, row_exists};
use log::{error, info};
use rusqlite::TransactionBehavior;
use std::collections::HashSet;
use std::time::Instant;

/// Result of a completed merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub kind: EntityKind,
    pub target: EntityId,
    /// Ids whose rows were deleted, in input order.
    pub folded: Vec<EntityId>,
    /// Whether `target` was minted by this merge.
    pub minted: bool,
    pub edges_rewritten: usize,
    pub edges_dropped: usize,
}

impl Session {
    /// Merges `ids` (duplicates ignored, first-seen order kept) into one
    /// canonical entity of `kind`.
    ///
    /// When no id is canonical a fresh canonical id is minted and its row is
    /// copied from the first id whose row exists.
    ///
    /// # Errors
    /// - `MergeTooSmall` when fewer than two distinct ids are given.
    /// - `AmbiguousMergeTarget` when more than one id is canonical; nothing
    ///   is started in that case.
    /// - `NotFound` when the canonical target, or every member, has no row.
    pub fn merge(&mut self, kind: EntityKind, ids: &[EntityId]) -> StoreResult<MergeOutcome> {
        let mut seen = HashSet::new();
        let ids: Vec<EntityId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.len() < 2 {
            return Err(StoreError::MergeTooSmall {
                kind,
                distinct: ids.len(),
            });
        }

        let canonical: Vec<EntityId> = ids.iter().copied().filter(EntityId::is_canonical).collect();
        if canonical.len() > 1 {
            return Err(StoreError::AmbiguousMergeTarget { kind, canonical });
        }

        let started_at = Instant::now();
        info!(
            "event=merge module=service status=start kind={kind} ids={}",
            ids.len()
        );
        let result = self.merge_in_transaction(kind, &ids, canonical.first().copied());
        match &result {
            Ok(outcome) => info!(
                "event=merge module=service status=ok kind={kind} target={} folded={} minted={} edges_rewritten={} edges_dropped={} duration_ms={}",
                outcome.target,
                outcome.folded.len(),
                outcome.minted,
                outcome.edges_rewritten,
                outcome.edges_dropped,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=merge module=service status=error kind={kind} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn merge_in_transaction(
        &mut self,
        kind: EntityKind,
        ids: &[EntityId],
        existing_target: Option<EntityId>,
    ) -> StoreResult<MergeOutcome> {
        let redirect = self.config.redirect_merged;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (target, minted) = match existing_target {
            Some(target) => {
                if !row_exists(&tx, kind, target)? {
                    return Err(StoreError::NotFound { kind, id: target });
                }
                (target, false)
            }
            None => {
                let target = EntityId::mint_canonical();
                let mut representative = None;
                for id in ids {
                    if row_exists(&tx, kind, *id)? {
                        representative = Some(*id);
                        break;
                    }
                }
                let representative =
                    representative.ok_or(StoreError::NotFound { kind, id: ids[0] })?;
                copy_row(&tx, kind, representative, target)?;
                (target, true)
            }
        };

        let folded: Vec<EntityId> = ids.iter().copied().filter(|id| *id != target).collect();
        let stats = rewrite_references(&tx, kind, target, &folded)?;
        delete_rows(&tx, kind, &folded)?;
        if redirect {
            for id in &folded {
                record_redirect(&tx, *id, target)?;
            }
        }
        tx.commit()?;

        for id in &folded {
            self.cache.remove(id);
            if redirect {
                self.canonical.insert(*id, Some(target));
            }
        }

        Ok(MergeOutcome {
            kind,
            target,
            folded,
            minted,
            edges_rewritten: stats.rewritten,
            edges_dropped: stats.dropped,
        })
    }
}
