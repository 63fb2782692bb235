//! Content-addressed entity identifiers.
//!
//! # Responsibility
//! - Derive transient identifiers from canonical field encodings.
//! - Mint canonical identifiers for operator merges.
//! - Convert identifiers to their packed 16-byte storage form and hex text form.
//!
//! # Invariants
//! - Transient identity is a pure function of content.
//! - Canonical identity is never produced by hashing.
//! - The provenance tag lives in the lowest bit of the last packed byte:
//!   `0` is transient, `1` is canonical.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

const TAG_BYTE: usize = 15;
const TAG_MASK: u8 = 0x01;

/// Packed identifier width in bytes.
pub const ID_LEN: usize = 16;

/// Whether an identifier was derived from content or assigned by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provenance {
    Transient,
    Canonical,
}

/// 128-bit entity identifier with its provenance kept as a separate field.
///
/// `body` always has the tag bit cleared; the bit is only materialized by
/// [`EntityId::to_bytes`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    body: [u8; ID_LEN],
    provenance: Provenance,
}

impl EntityId {
    /// Builds a transient identifier from a content digest.
    pub fn transient(digest: [u8; ID_LEN]) -> Self {
        Self::tagged(digest, Provenance::Transient)
    }

    /// Mints a fresh canonical identifier from random bytes.
    pub fn mint_canonical() -> Self {
        Self::tagged(Uuid::new_v4().into_bytes(), Provenance::Canonical)
    }

    /// Decodes the packed storage form.
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        let provenance = if bytes[TAG_BYTE] & TAG_MASK == 0 {
            Provenance::Transient
        } else {
            Provenance::Canonical
        };
        Self::tagged(bytes, provenance)
    }

    /// Encodes the packed storage form with the provenance tag applied.
    pub fn to_bytes(&self) -> [u8; ID_LEN] {
        let mut bytes = self.body;
        if self.provenance == Provenance::Canonical {
            bytes[TAG_BYTE] |= TAG_MASK;
        }
        bytes
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_canonical(&self) -> bool {
        self.provenance == Provenance::Canonical
    }

    pub fn is_transient(&self) -> bool {
        self.provenance == Provenance::Transient
    }

    fn tagged(mut body: [u8; ID_LEN], provenance: Provenance) -> Self {
        body[TAG_BYTE] &= !TAG_MASK;
        Self { body, provenance }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.to_bytes()).simple())
    }
}

impl Debug for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self.provenance {
            Provenance::Transient => "transient",
            Provenance::Canonical => "canonical",
        };
        write!(f, "EntityId({self}, {label})")
    }
}

/// Error for identifier text that is not 32 hex characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError(pub String);

impl Display for IdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid entity id `{}`", self.0)
    }
}

impl Error for IdParseError {}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.len() != ID_LEN * 2 {
            return Err(IdParseError(value.to_string()));
        }
        Uuid::parse_str(trimmed)
            .map(|uuid| Self::from_bytes(uuid.into_bytes()))
            .map_err(|_| IdParseError(value.to_string()))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for EntityId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Blob(self.to_bytes().to_vec())))
    }
}

impl FromSql for EntityId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        let bytes: [u8; ID_LEN] = blob.try_into().map_err(|_| FromSqlError::InvalidBlobSize {
            expected_size: ID_LEN,
            blob_size: blob.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

/// Incremental canonical encoder feeding a BLAKE3 hasher.
///
/// Every field is length-prefixed so adjacent fields cannot alias
/// (`"ab" + "c"` never hashes like `"a" + "bc"`).
pub struct IdentityHasher {
    inner: blake3::Hasher,
}

impl IdentityHasher {
    /// Starts a hash in the namespace of one entity kind.
    pub fn new(domain: &str) -> Self {
        let mut hasher = Self {
            inner: blake3::Hasher::new(),
        };
        hasher.str(domain);
        hasher
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.count(value.len());
        self.inner.update(value.as_bytes());
        self
    }

    pub fn opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(value) => {
                self.inner.update(&[1]);
                self.str(value)
            }
            None => {
                self.inner.update(&[0]);
                self
            }
        }
    }

    pub fn int(&mut self, value: i64) -> &mut Self {
        self.inner.update(&value.to_le_bytes());
        self
    }

    pub fn opt_int(&mut self, value: Option<i64>) -> &mut Self {
        match value {
            Some(value) => {
                self.inner.update(&[1]);
                self.int(value)
            }
            None => {
                self.inner.update(&[0]);
                self
            }
        }
    }

    pub fn id(&mut self, value: EntityId) -> &mut Self {
        self.inner.update(&value.to_bytes());
        self
    }

    /// Writes a collection length so nested lists keep their boundaries.
    pub fn count(&mut self, len: usize) -> &mut Self {
        self.inner.update(&(len as u64).to_le_bytes());
        self
    }

    pub fn finish(&self) -> EntityId {
        let digest = self.inner.finalize();
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&digest.as_bytes()[..ID_LEN]);
        EntityId::transient(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityId, IdentityHasher, Provenance};

    #[test]
    fn packed_form_carries_provenance() {
        let canonical = EntityId::mint_canonical();
        let decoded = EntityId::from_bytes(canonical.to_bytes());
        assert_eq!(decoded, canonical);
        assert_eq!(decoded.provenance(), Provenance::Canonical);

        let transient = EntityId::transient([0xff; 16]);
        assert_eq!(transient.to_bytes()[15] & 1, 0);
        assert!(EntityId::from_bytes(transient.to_bytes()).is_transient());
    }

    #[test]
    fn hex_text_parses_back() {
        let id = EntityId::mint_canonical();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(text.parse::<EntityId>().unwrap(), id);
        assert!("not-an-id".parse::<EntityId>().is_err());
    }

    #[test]
    fn length_prefix_separates_fields() {
        let mut left = IdentityHasher::new("topic");
        left.str("ab").str("c");
        let mut right = IdentityHasher::new("topic");
        right.str("a").str("bc");
        assert_ne!(left.finish(), right.finish());
    }

    #[test]
    fn domains_do_not_collide() {
        let mut topic = IdentityHasher::new("topic");
        topic.str("x");
        let mut author = IdentityHasher::new("author");
        author.str("x");
        assert_ne!(topic.finish(), author.finish());
        assert!(topic.finish().is_transient());
    }
}
