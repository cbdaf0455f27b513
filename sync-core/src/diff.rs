//! Listing comparison.
//!
//! Conflict handling is "newer modification time wins": a local file is due
//! for sending when the remote lacks it or holds an older copy.

use std::collections::HashMap;
use sync_types::FileRecord;

/// Local records the remote is missing or holds an older version of.
///
/// Directories are compared by presence only.
pub fn missing_or_outdated(local: &[FileRecord], remote: &[FileRecord]) -> Vec<FileRecord> {
    let remote_by_name: HashMap<&str, &FileRecord> =
        remote.iter().map(|r| (r.name.as_str(), r)).collect();

    local
        .iter()
        .filter(|record| match remote_by_name.get(record.name.as_str()) {
            None => true,
            Some(_) if record.is_directory => false,
            Some(theirs) => record.modified_at > theirs.modified_at,
        })
        .cloned()
        .collect()
}
