//! Typed bibliographic records accepted by the acquisition engine.
//!
//! # Responsibility
//! - Define the record shapes produced by external sources.
//! - Define which fields make up each record's content identity.
//!
//! # Invariants
//! - Records are plain values; the store holds the only mutable projection.
//! - An explicit `id` always wins over the content hash.
//! - Unordered collections (links, aliases, releases, topics, scrapers,
//!   affiliations) hash as sets; author order and role order are significant.

use super::id::{EntityId, IdentityHasher};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Stored entity kinds, i.e. the kinds that own a table and can be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Paper,
    Author,
    Institution,
    Release,
    Venue,
    Topic,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Paper,
        EntityKind::Author,
        EntityKind::Institution,
        EntityKind::Release,
        EntityKind::Venue,
        EntityKind::Topic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Author => "author",
            Self::Institution => "institution",
            Self::Release => "release",
            Self::Venue => "venue",
            Self::Topic => "topic",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
            .ok_or_else(|| format!("unknown entity kind `{value}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueType {
    Conference,
    Journal,
    Preprint,
    Unknown,
}

impl VenueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conference => "conference",
            Self::Journal => "journal",
            Self::Preprint => "preprint",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    Day,
    Month,
    Year,
}

impl DatePrecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionCategory {
    Academia,
    Industry,
    Unknown,
}

impl InstitutionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Academia => "academia",
            Self::Industry => "industry",
            Self::Unknown => "unknown",
        }
    }
}

/// External reference such as a DOI, an arXiv id or a profile URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "type")]
    pub kind: String,
    pub link: String,
}

impl Link {
    pub fn new(kind: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            link: link.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    pub category: InstitutionCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(rename = "type")]
    pub venue_type: VenueType,
    pub name: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// One publication event of a paper at a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub date: NaiveDate,
    pub date_precision: DatePrecision,
    pub status: String,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    pub venue: Venue,
}

/// Position held by an author at an institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub institution: Institution,
    pub role: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Author slot on a paper. The slot index is the author position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperAuthor {
    pub author: Author,
    #[serde(default)]
    pub affiliations: Vec<Institution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub citation_count: Option<u32>,
    #[serde(default)]
    pub authors: Vec<PaperAuthor>,
    #[serde(default)]
    pub releases: Vec<Release>,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub scrapers: Vec<String>,
}

/// Anything with an identity: explicit when assigned, content-derived otherwise.
pub trait Identified {
    fn explicit_id(&self) -> Option<EntityId>;

    fn content_id(&self) -> EntityId;

    fn identifier(&self) -> EntityId {
        self.explicit_id().unwrap_or_else(|| self.content_id())
    }
}

impl Identified for Link {
    fn explicit_id(&self) -> Option<EntityId> {
        None
    }

    fn content_id(&self) -> EntityId {
        IdentityHasher::new("link")
            .str(&self.kind)
            .str(&self.link)
            .finish()
    }
}

impl Identified for Topic {
    fn explicit_id(&self) -> Option<EntityId> {
        self.id
    }

    fn content_id(&self) -> EntityId {
        IdentityHasher::new("topic").str(&self.name).finish()
    }
}

impl Identified for Institution {
    fn explicit_id(&self) -> Option<EntityId> {
        self.id
    }

    fn content_id(&self) -> EntityId {
        IdentityHasher::new("institution")
            .str(&self.name)
            .str(self.category.as_str())
            .finish()
    }
}

impl Identified for Venue {
    fn explicit_id(&self) -> Option<EntityId> {
        self.id
    }

    fn content_id(&self) -> EntityId {
        let mut hasher = IdentityHasher::new("venue");
        hasher.str(self.venue_type.as_str()).str(&self.name);
        hash_links(&mut hasher, &self.links);
        hasher.finish()
    }
}

impl Identified for Release {
    fn explicit_id(&self) -> Option<EntityId> {
        self.id
    }

    fn content_id(&self) -> EntityId {
        IdentityHasher::new("release")
            .str(&self.date.to_string())
            .str(self.date_precision.as_str())
            .str(&self.status)
            .opt_str(self.volume.as_deref())
            .opt_str(self.publisher.as_deref())
            .id(self.venue.identifier())
            .finish()
    }
}

impl Identified for Author {
    fn explicit_id(&self) -> Option<EntityId> {
        self.id
    }

    fn content_id(&self) -> EntityId {
        let mut hasher = IdentityHasher::new("author");
        hasher.str(&self.name);
        hash_links(&mut hasher, &self.links);
        hash_str_set(&mut hasher, self.aliases.iter().map(String::as_str));
        hasher.count(self.roles.len());
        for role in &self.roles {
            hasher
                .id(role.institution.identifier())
                .str(&role.role)
                .opt_str(role.start_date.map(|date| date.to_string()).as_deref())
                .opt_str(role.end_date.map(|date| date.to_string()).as_deref());
        }
        hasher.finish()
    }
}

impl Identified for Paper {
    fn explicit_id(&self) -> Option<EntityId> {
        self.id
    }

    fn content_id(&self) -> EntityId {
        let mut hasher = IdentityHasher::new("paper");
        hasher
            .str(&self.title)
            .opt_str(self.abstract_text.as_deref())
            .opt_int(self.citation_count.map(i64::from));
        hasher.count(self.authors.len());
        for slot in &self.authors {
            hasher.id(slot.author.identifier());
            hash_id_set(&mut hasher, slot.affiliations.iter().map(Identified::identifier));
        }
        hash_id_set(&mut hasher, self.releases.iter().map(Identified::identifier));
        hash_id_set(&mut hasher, self.topics.iter().map(Identified::identifier));
        hash_links(&mut hasher, &self.links);
        hash_str_set(&mut hasher, self.scrapers.iter().map(String::as_str));
        hasher.finish()
    }
}

fn hash_links(hasher: &mut IdentityHasher, links: &[Link]) {
    let set: BTreeSet<&Link> = links.iter().collect();
    hasher.count(set.len());
    for link in set {
        hasher.str(&link.kind).str(&link.link);
    }
}

fn hash_str_set<'a>(hasher: &mut IdentityHasher, values: impl Iterator<Item = &'a str>) {
    let set: BTreeSet<&str> = values.collect();
    hasher.count(set.len());
    for value in set {
        hasher.str(value);
    }
}

fn hash_id_set(hasher: &mut IdentityHasher, ids: impl Iterator<Item = EntityId>) {
    let set: BTreeSet<EntityId> = ids.collect();
    hasher.count(set.len());
    for id in set {
        hasher.id(id);
    }
}

/// Tagged union over every record a source can hand to the engine.
///
/// Serialized with a `kind` discriminator; this is the history log line format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Paper(Paper),
    Author(Author),
    Institution(Institution),
    Release(Release),
    Venue(Venue),
    Topic(Topic),
    Link(Link),
}

impl Entity {
    /// Variant name as written in the `kind` discriminator.
    pub fn tag(&self) -> &'static str {
        match self.stored_kind() {
            Some(kind) => kind.as_str(),
            None => "link",
        }
    }

    /// Table-backed kind, or `None` for records that only exist as edge payload.
    pub fn stored_kind(&self) -> Option<EntityKind> {
        match self {
            Self::Paper(_) => Some(EntityKind::Paper),
            Self::Author(_) => Some(EntityKind::Author),
            Self::Institution(_) => Some(EntityKind::Institution),
            Self::Release(_) => Some(EntityKind::Release),
            Self::Venue(_) => Some(EntityKind::Venue),
            Self::Topic(_) => Some(EntityKind::Topic),
            Self::Link(_) => None,
        }
    }

    pub fn identifier(&self) -> EntityId {
        match self {
            Self::Paper(value) => value.identifier(),
            Self::Author(value) => value.identifier(),
            Self::Institution(value) => value.identifier(),
            Self::Release(value) => value.identifier(),
            Self::Venue(value) => value.identifier(),
            Self::Topic(value) => value.identifier(),
            Self::Link(value) => value.identifier(),
        }
    }
}

macro_rules! entity_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

entity_from!(Paper, Author, Institution, Release, Venue, Topic, Link);

#[cfg(test)]
mod tests {
    use super::*;

    fn venue() -> Venue {
        Venue {
            id: None,
            venue_type: VenueType::Conference,
            name: "V".to_string(),
            links: vec![Link::new("dblp", "conf/v"), Link::new("url", "https://v.org")],
        }
    }

    #[test]
    fn set_fields_hash_independently_of_order() {
        let a = venue();
        let mut b = venue();
        b.links.reverse();
        assert_eq!(a.identifier(), b.identifier());
    }

    #[test]
    fn sub_entity_content_changes_parent_identity() {
        let release = Release {
            id: None,
            date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            date_precision: DatePrecision::Day,
            status: "published".to_string(),
            volume: None,
            publisher: None,
            venue: venue(),
        };
        let mut other = release.clone();
        other.venue.name = "W".to_string();
        assert_ne!(release.identifier(), other.identifier());
    }

    #[test]
    fn explicit_id_overrides_content_hash() {
        let pinned = EntityId::mint_canonical();
        let topic = Topic {
            id: Some(pinned),
            name: "graphs".to_string(),
        };
        assert_eq!(topic.identifier(), pinned);
        assert_ne!(topic.content_id(), pinned);
    }

    #[test]
    fn entity_json_uses_kind_discriminator() {
        let entity = Entity::from(Topic {
            id: None,
            name: "ml".to_string(),
        });
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(json, r#"{"kind":"topic","name":"ml"}"#);
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entity);
        assert_eq!(back.tag(), "topic");
    }

    #[test]
    fn entity_kind_parses_table_names() {
        assert_eq!("author".parse::<EntityKind>(), Ok(EntityKind::Author));
        assert!("link".parse::<EntityKind>().is_err());
    }
}
