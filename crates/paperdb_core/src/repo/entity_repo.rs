//! Entity and edge row writers.
//!
//! # Responsibility
//! - Upsert one entity row per identifier.
//! - Upsert edge rows between already-resolved identifiers.
//!
//! # Invariants
//! - Entity rows use `ON CONFLICT DO UPDATE` so an existing row keeps its
//!   identity and no edge referencing it is disturbed.
//! - Existence-only edges use `INSERT OR IGNORE`; edges with attributes
//!   (author position, role dates) overwrite their attributes.

use super::RepoResult;
use crate::model::entity::{Institution, Link, Paper, Release, Topic, Venue};
use crate::model::id::EntityId;
use chrono::NaiveDate;
use rusqlite::{params, Connection};

/// Write contract used by acquisition.
pub trait EntityRepository {
    fn upsert_paper(&self, id: EntityId, paper: &Paper) -> RepoResult<()>;
    fn upsert_author(&self, id: EntityId, name: &str) -> RepoResult<()>;
    fn upsert_institution(&self, id: EntityId, institution: &Institution) -> RepoResult<()>;
    fn upsert_venue(&self, id: EntityId, venue: &Venue) -> RepoResult<()>;
    fn upsert_release(&self, id: EntityId, release: &Release, venue_id: EntityId)
        -> RepoResult<()>;
    fn upsert_topic(&self, id: EntityId, topic: &Topic) -> RepoResult<()>;

    fn put_paper_author(&self, paper_id: EntityId, author_id: EntityId, position: u32)
        -> RepoResult<()>;
    fn put_paper_author_institution(
        &self,
        paper_id: EntityId,
        author_id: EntityId,
        institution_id: EntityId,
    ) -> RepoResult<()>;
    fn put_paper_release(&self, paper_id: EntityId, release_id: EntityId) -> RepoResult<()>;
    fn put_paper_topic(&self, paper_id: EntityId, topic_id: EntityId) -> RepoResult<()>;
    fn put_paper_link(&self, paper_id: EntityId, link: &Link) -> RepoResult<()>;
    fn put_paper_scraper(&self, paper_id: EntityId, scraper: &str) -> RepoResult<()>;
    fn put_author_link(&self, author_id: EntityId, link: &Link) -> RepoResult<()>;
    fn put_author_alias(&self, author_id: EntityId, alias: &str) -> RepoResult<()>;
    fn put_author_role(&self, author_id: EntityId, role: &ResolvedRole<'_>) -> RepoResult<()>;
    fn put_venue_link(&self, venue_id: EntityId, link: &Link) -> RepoResult<()>;
}

/// Author role whose institution has already been acquired.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRole<'a> {
    pub institution_id: EntityId,
    pub role: &'a str,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn upsert_paper(&self, id: EntityId, paper: &Paper) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO paper (paper_id, title, abstract, citation_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (paper_id) DO UPDATE SET
                title = excluded.title,
                abstract = excluded.abstract,
                citation_count = excluded.citation_count;",
            params![
                id,
                paper.title.as_str(),
                paper.abstract_text.as_deref(),
                paper.citation_count,
            ],
        )?;
        Ok(())
    }

    fn upsert_author(&self, id: EntityId, name: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO author (author_id, name)
             VALUES (?1, ?2)
             ON CONFLICT (author_id) DO UPDATE SET name = excluded.name;",
            params![id, name],
        )?;
        Ok(())
    }

    fn upsert_institution(&self, id: EntityId, institution: &Institution) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO institution (institution_id, name, category)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (institution_id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category;",
            params![
                id,
                institution.name.as_str(),
                institution.category.as_str()
            ],
        )?;
        Ok(())
    }

    fn upsert_venue(&self, id: EntityId, venue: &Venue) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO venue (venue_id, type, name)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (venue_id) DO UPDATE SET
                type = excluded.type,
                name = excluded.name;",
            params![id, venue.venue_type.as_str(), venue.name.as_str()],
        )?;
        Ok(())
    }

    fn upsert_release(
        &self,
        id: EntityId,
        release: &Release,
        venue_id: EntityId,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO release (release_id, date, date_precision, status, volume, publisher, venue_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (release_id) DO UPDATE SET
                date = excluded.date,
                date_precision = excluded.date_precision,
                status = excluded.status,
                volume = excluded.volume,
                publisher = excluded.publisher,
                venue_id = excluded.venue_id;",
            params![
                id,
                release.date.to_string(),
                release.date_precision.as_str(),
                release.status.as_str(),
                release.volume.as_deref(),
                release.publisher.as_deref(),
                venue_id,
            ],
        )?;
        Ok(())
    }

    fn upsert_topic(&self, id: EntityId, topic: &Topic) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO topic (topic_id, topic)
             VALUES (?1, ?2)
             ON CONFLICT (topic_id) DO UPDATE SET topic = excluded.topic;",
            params![id, topic.name.as_str()],
        )?;
        Ok(())
    }

    fn put_paper_author(
        &self,
        paper_id: EntityId,
        author_id: EntityId,
        position: u32,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO paper_author (paper_id, author_id, author_position)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (paper_id, author_id) DO UPDATE SET
                author_position = excluded.author_position;",
            params![paper_id, author_id, position],
        )?;
        Ok(())
    }

    fn put_paper_author_institution(
        &self,
        paper_id: EntityId,
        author_id: EntityId,
        institution_id: EntityId,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO paper_author_institution (paper_id, author_id, institution_id)
             VALUES (?1, ?2, ?3);",
            params![paper_id, author_id, institution_id],
        )?;
        Ok(())
    }

    fn put_paper_release(&self, paper_id: EntityId, release_id: EntityId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO paper_release (paper_id, release_id) VALUES (?1, ?2);",
            params![paper_id, release_id],
        )?;
        Ok(())
    }

    fn put_paper_topic(&self, paper_id: EntityId, topic_id: EntityId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO paper_topic (paper_id, topic_id) VALUES (?1, ?2);",
            params![paper_id, topic_id],
        )?;
        Ok(())
    }

    fn put_paper_link(&self, paper_id: EntityId, link: &Link) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO paper_link (paper_id, type, link) VALUES (?1, ?2, ?3);",
            params![paper_id, link.kind.as_str(), link.link.as_str()],
        )?;
        Ok(())
    }

    fn put_paper_scraper(&self, paper_id: EntityId, scraper: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO paper_scraper (paper_id, scraper) VALUES (?1, ?2);",
            params![paper_id, scraper],
        )?;
        Ok(())
    }

    fn put_author_link(&self, author_id: EntityId, link: &Link) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO author_link (author_id, type, link) VALUES (?1, ?2, ?3);",
            params![author_id, link.kind.as_str(), link.link.as_str()],
        )?;
        Ok(())
    }

    fn put_author_alias(&self, author_id: EntityId, alias: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO author_alias (author_id, alias) VALUES (?1, ?2);",
            params![author_id, alias],
        )?;
        Ok(())
    }

    fn put_author_role(&self, author_id: EntityId, role: &ResolvedRole<'_>) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO author_institution (author_id, institution_id, role, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (author_id, institution_id, role) DO UPDATE SET
                start_date = excluded.start_date,
                end_date = excluded.end_date;",
            params![
                author_id,
                role.institution_id,
                role.role,
                role.start_date.map(|date| date.to_string()),
                role.end_date.map(|date| date.to_string()),
            ],
        )?;
        Ok(())
    }

    fn put_venue_link(&self, venue_id: EntityId, link: &Link) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO venue_link (venue_id, type, link) VALUES (?1, ?2, ?3);",
            params![venue_id, link.kind.as_str(), link.link.as_str()],
        )?;
        Ok(())
    }
}

/// Sets one operator flag on a paper, replacing any previous value.
pub fn set_paper_flag(conn: &Connection, paper_id: EntityId, name: &str, value: bool) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO paper_flag (paper_id, flag_name, flag)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (paper_id, flag_name) DO UPDATE SET flag = excluded.flag;",
        params![paper_id, name, value],
    )?;
    Ok(())
}

/// Lists a paper's flags ordered by name.
pub fn list_paper_flags(conn: &Connection, paper_id: EntityId) -> RepoResult<Vec<(String, bool)>> {
    let mut stmt = conn.prepare(
        "SELECT flag_name, flag
         FROM paper_flag
         WHERE paper_id = ?1
         ORDER BY flag_name ASC;",
    )?;
    let mut rows = stmt.query([paper_id])?;
    let mut flags = Vec::new();
    while let Some(row) = rows.next()? {
        flags.push((row.get(0)?, row.get(1)?));
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::{list_paper_flags, set_paper_flag, EntityRepository, SqliteEntityRepository};
    use crate::db::open_db_in_memory;
    use crate::model::entity::{Topic, Venue, VenueType};
    use crate::model::id::EntityId;

    #[test]
    fn upsert_keeps_single_row_and_refreshes_fields() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteEntityRepository::new(&conn);
        let id = EntityId::mint_canonical();

        let mut venue = Venue {
            id: Some(id),
            venue_type: VenueType::Unknown,
            name: "draft".to_string(),
            links: Vec::new(),
        };
        repo.upsert_venue(id, &venue).unwrap();
        venue.venue_type = VenueType::Journal;
        venue.name = "final".to_string();
        repo.upsert_venue(id, &venue).unwrap();

        let (count, name, kind): (i64, String, String) = conn
            .query_row(
                "SELECT COUNT(*), MAX(name), MAX(type) FROM venue;",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(name, "final");
        assert_eq!(kind, "journal");
    }

    #[test]
    fn identifiers_are_stored_as_packed_blobs() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteEntityRepository::new(&conn);
        let topic = Topic {
            id: None,
            name: "optimization".to_string(),
        };
        let id = EntityId::transient([7; 16]);
        repo.upsert_topic(id, &topic).unwrap();

        let stored: Vec<u8> = conn
            .query_row("SELECT topic_id FROM topic;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, id.to_bytes().to_vec());
        let decoded: EntityId = conn
            .query_row("SELECT topic_id FROM topic;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn paper_flags_upsert_and_list_by_name() {
        let conn = open_db_in_memory().unwrap();
        let paper_id = EntityId::transient([1; 16]);
        conn.execute(
            "INSERT INTO paper (paper_id, title) VALUES (?1, 'T');",
            [paper_id],
        )
        .unwrap();

        set_paper_flag(&conn, paper_id, "validated", false).unwrap();
        set_paper_flag(&conn, paper_id, "excluded", false).unwrap();
        set_paper_flag(&conn, paper_id, "validated", true).unwrap();

        assert_eq!(
            list_paper_flags(&conn, paper_id).unwrap(),
            vec![
                ("excluded".to_string(), false),
                ("validated".to_string(), true),
            ]
        );
        assert!(set_paper_flag(&conn, EntityId::transient([2; 16]), "validated", true).is_err());
    }
}
