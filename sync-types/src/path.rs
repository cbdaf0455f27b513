//! Shared-root relative names.
//!
//! Every `name` that crosses the wire is relative to the shared root and uses
//! `/` as separator regardless of host OS. These helpers normalize incoming
//! names and answer the prefix questions the transfer and delete paths ask.

use crate::SyncError;

/// Normalize a name into canonical relative form.
///
/// Backslashes become `/`, empty and `.` components are dropped. Absolute
/// names, drive-prefixed names and `..` components are rejected.
pub fn normalize(name: &str) -> Result<String, SyncError> {
    let unified = name.replace('\\', "/");

    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(SyncError::InvalidPath(format!("absolute path: {name}")));
    }

    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(SyncError::InvalidPath(format!(
                    "parent component not allowed: {name}"
                )))
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(SyncError::InvalidPath(format!("empty path: {name:?}")));
    }

    Ok(parts.join("/"))
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Last component of a normalized name.
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Whether the name carries a directory prefix.
pub fn has_parent(name: &str) -> bool {
    name.contains('/')
}

/// Whether `name` is `dir` itself or lives anywhere below it.
pub fn is_within(name: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    name == dir || is_below(name, dir)
}

/// Whether `name` lives strictly below `dir`.
pub fn is_below(name: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    name.len() > dir.len() + 1 && name.starts_with(dir) && name.as_bytes()[dir.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unifies_separators() {
        assert_eq!(normalize("docs\\sub\\a.txt").unwrap(), "docs/sub/a.txt");
        assert_eq!(normalize("./docs//a.txt").unwrap(), "docs/a.txt");
        assert_eq!(normalize("docs/").unwrap(), "docs");
    }

    #[test]
    fn normalize_rejects_escapes() {
        assert!(normalize("../etc/passwd").is_err());
        assert!(normalize("docs/../../x").is_err());
        assert!(normalize("/etc/passwd").is_err());
        assert!(normalize("C:\\Windows").is_err());
        assert!(normalize("").is_err());
        assert!(normalize("./").is_err());
    }

    #[test]
    fn base_name_of_nested_and_flat() {
        assert_eq!(base_name("docs/sub/a.txt"), "a.txt");
        assert_eq!(base_name("a.txt"), "a.txt");
    }

    #[test]
    fn within_matches_dir_and_children_only() {
        assert!(is_within("docs", "docs"));
        assert!(is_within("docs/x.txt", "docs"));
        assert!(is_within("docs/x.txt", "docs/"));
        assert!(!is_within("docs2/x.txt", "docs"));
        assert!(!is_within("doc", "docs"));

        assert!(is_below("docs/a/b", "docs"));
        assert!(!is_below("docs", "docs"));
        assert!(!is_below("docsx/a", "docs"));
    }
}
