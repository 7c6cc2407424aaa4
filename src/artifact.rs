//! The stored-artifact data model: identifiers, folders, listing rows.
//!
//! An artifact is created once, read many times, deleted at most once. There
//! is no update path, so every type here is a plain immutable value.

use crate::error::ReportError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Lowest folder number.
pub const MIN_FOLDER: u8 = 1;
/// Highest folder number.
pub const MAX_FOLDER: u8 = 15;

/// Store-generated artifact identifier.
///
/// ULIDs sort by creation time and need no coordination to generate, so two
/// concurrent writes can never collide on an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Ulid);

impl ArtifactId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ArtifactId {
    type Err = ReportError;

    /// A malformed id is reported as not-found: callers cannot tell it apart
    /// from an id that was never issued.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|_| ReportError::NotFound { id: s.to_string() })
    }
}

/// A validated folder number in `1..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Folder(u8);

impl Folder {
    /// Returns `None` outside `1..=15`.
    pub fn new(n: i64) -> Option<Self> {
        if (MIN_FOLDER as i64..=MAX_FOLDER as i64).contains(&n) {
            Some(Self(n as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All fifteen folders in ascending order.
    pub fn all() -> impl Iterator<Item = Folder> {
        (MIN_FOLDER..=MAX_FOLDER).map(Folder)
    }
}

impl TryFrom<i64> for Folder {
    type Error = ReportError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Folder::new(value).ok_or(ReportError::InvalidClassification)
    }
}

impl From<Folder> for u8 {
    fn from(f: Folder) -> u8 {
        f.0
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of a listing: everything about an artifact except its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    #[serde(rename = "fileId")]
    pub id: ArtifactId,
    pub filename: String,
    pub folder: Folder,
    pub upload_date: DateTime<Utc>,
}

/// Listing row plus storage details, returned by [`crate::store::BlobStore::stat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStat {
    #[serde(flatten)]
    pub info: ArtifactInfo,
    /// Total payload length in bytes.
    pub length: u64,
    pub chunk_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_bounds() {
        assert!(Folder::new(0).is_none());
        assert_eq!(Folder::new(1).map(Folder::get), Some(1));
        assert_eq!(Folder::new(15).map(Folder::get), Some(15));
        assert!(Folder::new(16).is_none());
        assert!(Folder::new(-3).is_none());
        assert_eq!(Folder::all().count(), 15);
    }

    #[test]
    fn malformed_id_is_not_found() {
        let err = "not-an-id".parse::<ArtifactId>().unwrap_err();
        assert!(matches!(err, ReportError::NotFound { .. }));
    }

    #[test]
    fn id_round_trips_through_display() {
        let id = ArtifactId::generate();
        let parsed: ArtifactId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn info_serialises_with_wire_names() {
        let info = ArtifactInfo {
            id: ArtifactId::generate(),
            filename: "liquid_ir_1.pdf".into(),
            folder: Folder::new(1).unwrap(),
            upload_date: Utc::now(),
        };
        let v = serde_json::to_value(&info).unwrap();
        assert!(v.get("fileId").is_some());
        assert!(v.get("uploadDate").is_some());
        assert_eq!(v["folder"], 1);
    }
}
