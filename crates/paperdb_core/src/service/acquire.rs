//! Recursive acquisition of one entity graph inside a transaction.
//!
//! # Responsibility
//! - Resolve sub-entities before the entities that reference them.
//! - Upsert entity rows and edge rows keyed by resolved identifiers.
//! - Stage cache and seen-marker updates until the transaction commits.
//!
//! # Invariants
//! - Content superseded in the canonical-map resolves to its canonical id
//!   and is never rewritten.
//! - Transient ids already cached are returned without touching storage.
//! - Canonical ids are always re-absorbed.

use super::error::{StoreError, StoreResult};
use crate::model::entity::{
    Author, Entity, Identified, Institution, Paper, Release, Topic, Venue,
};
use crate::model::id::EntityId;
use crate::repo::canonical_repo::{mark_seen, CanonicalMap};
use crate::repo::entity_repo::{EntityRepository, ResolvedRole, SqliteEntityRepository};
use log::trace;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

/// Cache entries and seen-markers produced by one transaction.
#[derive(Debug, Default)]
pub(crate) struct Staged {
    pub(crate) resolved: HashSet<EntityId>,
    pub(crate) seen: HashSet<EntityId>,
}

pub(crate) struct Acquisition<'a> {
    conn: &'a Connection,
    repo: SqliteEntityRepository<'a>,
    cache: &'a HashMap<EntityId, EntityId>,
    canonical: &'a CanonicalMap,
    staged: Staged,
}

impl<'a> Acquisition<'a> {
    pub(crate) fn new(
        conn: &'a Connection,
        cache: &'a HashMap<EntityId, EntityId>,
        canonical: &'a CanonicalMap,
    ) -> Self {
        Self {
            conn,
            repo: SqliteEntityRepository::new(conn),
            cache,
            canonical,
            staged: Staged::default(),
        }
    }

    pub(crate) fn into_staged(self) -> Staged {
        self.staged
    }

    /// Acquires one record and returns the identifier it resolved to.
    pub(crate) fn acquire(&mut self, entity: &Entity) -> StoreResult<EntityId> {
        match entity {
            Entity::Paper(paper) => self.paper(paper),
            Entity::Author(author) => self.author(author),
            Entity::Institution(institution) => self.institution(institution),
            Entity::Release(release) => self.release(release),
            Entity::Venue(venue) => self.venue(venue),
            Entity::Topic(topic) => self.topic(topic),
            Entity::Link(_) => Err(StoreError::UnsupportedEntity(entity.tag())),
        }
    }

    fn paper(&mut self, paper: &Paper) -> StoreResult<EntityId> {
        let id = paper.identifier();
        if let Some(resolved) = self.short_circuit(id) {
            return Ok(resolved);
        }

        let mut authors = Vec::with_capacity(paper.authors.len());
        for slot in &paper.authors {
            let author_id = self.author(&slot.author)?;
            let affiliations = slot
                .affiliations
                .iter()
                .map(|institution| self.institution(institution))
                .collect::<StoreResult<Vec<_>>>()?;
            authors.push((author_id, affiliations));
        }
        let releases = paper
            .releases
            .iter()
            .map(|release| self.release(release))
            .collect::<StoreResult<Vec<_>>>()?;
        let topics = paper
            .topics
            .iter()
            .map(|topic| self.topic(topic))
            .collect::<StoreResult<Vec<_>>>()?;

        self.repo.upsert_paper(id, paper)?;
        for (position, (author_id, affiliations)) in authors.into_iter().enumerate() {
            self.repo.put_paper_author(id, author_id, position as u32)?;
            for institution_id in affiliations {
                self.repo
                    .put_paper_author_institution(id, author_id, institution_id)?;
            }
        }
        for release_id in releases {
            self.repo.put_paper_release(id, release_id)?;
        }
        for topic_id in topics {
            self.repo.put_paper_topic(id, topic_id)?;
        }
        for link in &paper.links {
            self.repo.put_paper_link(id, link)?;
        }
        for scraper in &paper.scrapers {
            self.repo.put_paper_scraper(id, scraper)?;
        }

        self.finish("paper", id)
    }

    fn author(&mut self, author: &Author) -> StoreResult<EntityId> {
        let id = author.identifier();
        if let Some(resolved) = self.short_circuit(id) {
            return Ok(resolved);
        }

        let mut roles = Vec::with_capacity(author.roles.len());
        for role in &author.roles {
            roles.push(ResolvedRole {
                institution_id: self.institution(&role.institution)?,
                role: role.role.as_str(),
                start_date: role.start_date,
                end_date: role.end_date,
            });
        }

        self.repo.upsert_author(id, &author.name)?;
        for link in &author.links {
            self.repo.put_author_link(id, link)?;
        }
        for alias in &author.aliases {
            self.repo.put_author_alias(id, alias)?;
        }
        for role in &roles {
            self.repo.put_author_role(id, role)?;
        }

        self.finish("author", id)
    }

    fn institution(&mut self, institution: &Institution) -> StoreResult<EntityId> {
        let id = institution.identifier();
        if let Some(resolved) = self.short_circuit(id) {
            return Ok(resolved);
        }
        self.repo.upsert_institution(id, institution)?;
        self.finish("institution", id)
    }

    fn release(&mut self, release: &Release) -> StoreResult<EntityId> {
        let id = release.identifier();
        if let Some(resolved) = self.short_circuit(id) {
            return Ok(resolved);
        }
        let venue_id = self.venue(&release.venue)?;
        self.repo.upsert_release(id, release, venue_id)?;
        self.finish("release", id)
    }

    fn venue(&mut self, venue: &Venue) -> StoreResult<EntityId> {
        let id = venue.identifier();
        if let Some(resolved) = self.short_circuit(id) {
            return Ok(resolved);
        }
        self.repo.upsert_venue(id, venue)?;
        for link in &venue.links {
            self.repo.put_venue_link(id, link)?;
        }
        self.finish("venue", id)
    }

    fn topic(&mut self, topic: &Topic) -> StoreResult<EntityId> {
        let id = topic.identifier();
        if let Some(resolved) = self.short_circuit(id) {
            return Ok(resolved);
        }
        self.repo.upsert_topic(id, topic)?;
        self.finish("topic", id)
    }

    /// Returns the id to use without writing, when one is already settled.
    fn short_circuit(&self, id: EntityId) -> Option<EntityId> {
        if let Some(Some(canonical)) = self.canonical.get(&id) {
            return Some(*canonical);
        }
        if id.is_transient() {
            if let Some(cached) = self.cache.get(&id) {
                return Some(*cached);
            }
            if self.staged.resolved.contains(&id) {
                return Some(id);
            }
        }
        None
    }

    fn finish(&mut self, tag: &'static str, id: EntityId) -> StoreResult<EntityId> {
        if id.is_transient() {
            if !self.canonical.contains_key(&id) {
                mark_seen(self.conn, id)?;
                self.staged.seen.insert(id);
            }
            self.staged.resolved.insert(id);
        }
        trace!("event=acquire module=service status=written kind={tag} id={id}");
        Ok(id)
    }
}
