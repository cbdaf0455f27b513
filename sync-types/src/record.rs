//! Listing entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a peer's shared-folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Path relative to the shared root, `/`-separated.
    pub name: String,
    /// Last modification time.
    #[serde(alias = "modTime", alias = "ModTime")]
    pub modified_at: DateTime<Utc>,
    /// Whether the entry is a directory.
    #[serde(default, alias = "isDir", alias = "IsDir")]
    pub is_directory: bool,
}

impl FileRecord {
    /// Record for a regular file.
    pub fn file(name: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            modified_at,
            is_directory: false,
        }
    }

    /// Record for a directory.
    pub fn directory(name: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            modified_at,
            is_directory: true,
        }
    }
}
