//! Append-only activity log.
//!
//! One JSON object per line, one line per completed action. Off unless
//! `[activity_log] enabled = true`.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sync_types::{LogAction, PeerId};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// What happened.
    pub action: LogAction,
    /// Relative name affected.
    pub file_name: String,
    /// Peer that held the data.
    pub origin_id: PeerId,
    /// Peer that received the effect.
    pub target_id: PeerId,
    /// When it was recorded.
    pub at: DateTime<Utc>,
}

/// JSON-lines activity file.
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ActivityLog {
    /// Log to `path`; the file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry.
    pub async fn append(&self, entry: &ActivityEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry).map_err(std::io::Error::other)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Every entry recorded so far, oldest first. Unparseable lines are skipped.
    pub async fn entries(&self) -> Result<Vec<ActivityEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable activity line: {}", e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: LogAction, name: &str) -> ActivityEntry {
        ActivityEntry {
            action,
            file_name: name.to_string(),
            origin_id: PeerId::new(1),
            target_id: PeerId::new(2),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_and_reads_back_in_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = ActivityLog::new(dir.path().join("logs/activity.json"));

        log.append(&entry(LogAction::Transfer, "a.txt")).await.unwrap();
        log.append(&entry(LogAction::Delete, "b.txt")).await.unwrap();

        let entries = log.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, LogAction::Transfer);
        assert_eq!(entries[1].file_name, "b.txt");
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = ActivityLog::new(dir.path().join("never-written.json"));
        assert!(log.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lines_use_wire_spelling() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = ActivityLog::new(dir.path().join("activity.json"));
        log.append(&entry(LogAction::Create, "c.txt")).await.unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert!(raw.contains(r#""action":"CREATE""#));
        assert!(raw.contains(r#""fileName":"c.txt""#));
        assert!(raw.ends_with('\n'));
    }
}
