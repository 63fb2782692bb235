//! Single-writer session over the paper store.
//!
//! # Responsibility
//! - Own the store connection, the acquisition cache and the canonical-map
//!   snapshot for one process-local session.
//! - Run acquisition batches as single transactions and append them to the
//!   history log after commit.
//!
//! # Invariants
//! - One session writes a store at a time; callers serialize sessions.
//! - Cache and snapshot only change after a transaction commits.
//! - History is appended only for batches whose transaction committed.

use super::acquire::{Acquisition, Staged};
use super::error::{StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory};
use crate::history::HistoryLog;
use crate::logging::init_logging;
use crate::model::entity::{Entity, EntityKind};
use crate::model::id::EntityId;
use crate::repo::canonical_repo::{load_canonical_map, CanonicalMap};
use crate::repo::entity_repo;
use crate::repo::merge_repo::row_exists;
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashMap;
use std::time::Instant;

pub struct Session {
    pub(super) conn: Connection,
    pub(super) config: StoreConfig,
    history: HistoryLog,
    pub(super) cache: HashMap<EntityId, EntityId>,
    pub(super) canonical: CanonicalMap,
}

impl Session {
    /// Validates `config`, starts logging when configured, then opens the
    /// store (file or in-memory) and its history root.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        if let Some(logging) = &config.logging {
            init_logging(logging)?;
        }
        let conn = match &config.db_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        Self::with_connection(conn, config)
    }

    /// Builds a session over an already migrated connection.
    pub fn with_connection(conn: Connection, config: StoreConfig) -> StoreResult<Self> {
        let history = HistoryLog::open(&config.history_root)?;
        let canonical = load_canonical_map(&conn)?;
        info!(
            "event=session_open module=service status=ok canonical_entries={} history={}",
            canonical.len(),
            history.partition_path().display()
        );
        Ok(Self {
            conn,
            config,
            history,
            cache: HashMap::new(),
            canonical,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Replaces the history writer, e.g. to pin a partition name.
    pub fn set_history(&mut self, history: HistoryLog) {
        self.history = history;
    }

    /// Content identity of a record, without consulting the store.
    pub fn identifier_of(entity: &Entity) -> EntityId {
        entity.identifier()
    }

    /// Follows the canonical-map: the canonical id that superseded `id`, or
    /// `id` itself.
    pub fn resolve(&self, id: EntityId) -> EntityId {
        match self.canonical.get(&id) {
            Some(Some(canonical)) => *canonical,
            _ => id,
        }
    }

    /// Returns whether the transient `id` has ever been acquired by this store.
    pub fn has_seen(&self, id: EntityId) -> bool {
        self.canonical.contains_key(&id)
    }

    /// Acquires one record in its own transaction, without logging it.
    pub fn acquire_one(&mut self, entity: &Entity) -> StoreResult<EntityId> {
        self.transact(|scope| scope.acquire(entity))
    }

    /// Acquires a batch atomically and appends it to the history log.
    ///
    /// Returns the resolved id of each record, in input order. An empty batch
    /// is a no-op. On failure nothing is written and nothing is logged, so the
    /// same batch can be retried.
    pub fn import(&mut self, entities: &[Entity]) -> StoreResult<Vec<EntityId>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let started_at = Instant::now();
        info!(
            "event=import module=service status=start records={}",
            entities.len()
        );

        let result = self
            .transact(|scope| {
                entities
                    .iter()
                    .map(|entity| scope.acquire(entity))
                    .collect::<StoreResult<Vec<_>>>()
            })
            .and_then(|ids| {
                self.history.append(entities)?;
                Ok(ids)
            });

        match &result {
            Ok(_) => info!(
                "event=import module=service status=ok records={} duration_ms={}",
                entities.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=import module=service status=error records={} duration_ms={} error={}",
                entities.len(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Sets an operator flag on a stored paper.
    pub fn set_paper_flag(
        &mut self,
        paper_id: EntityId,
        name: &str,
        value: bool,
    ) -> StoreResult<()> {
        let paper_id = self.resolve(paper_id);
        if !row_exists(&self.conn, EntityKind::Paper, paper_id)? {
            return Err(StoreError::NotFound {
                kind: EntityKind::Paper,
                id: paper_id,
            });
        }
        entity_repo::set_paper_flag(&self.conn, paper_id, name, value)?;
        Ok(())
    }

    /// Lists a paper's flags ordered by name.
    pub fn paper_flags(&self, paper_id: EntityId) -> StoreResult<Vec<(String, bool)>> {
        Ok(entity_repo::list_paper_flags(
            &self.conn,
            self.resolve(paper_id),
        )?)
    }

    /// Runs `work` inside one immediate transaction and folds its staged
    /// cache updates into the session after commit.
    pub(super) fn transact<T>(
        &mut self,
        work: impl FnOnce(&mut Acquisition<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut scope = Acquisition::new(&tx, &self.cache, &self.canonical);
        let value = work(&mut scope)?;
        let staged = scope.into_staged();
        tx.commit()?;
        self.absorb(staged);
        Ok(value)
    }

    fn absorb(&mut self, staged: Staged) {
        for id in staged.resolved {
            self.cache.insert(id, id);
        }
        for id in staged.seen {
            self.canonical.entry(id).or_insert(None);
        }
    }
}
