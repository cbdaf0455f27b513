//! The shared root: the directory a node replicates.
//!
//! Every name handled here is relative to the root and validated with
//! [`sync_types::path::normalize`] before it touches the filesystem, so no
//! request can reach outside the root.

use crate::error::{NodeError, Result};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use sync_types::{path, FileRecord};
use tokio::fs;

/// Handle on the replicated directory.
#[derive(Debug, Clone)]
pub struct SharedRoot {
    root: PathBuf,
}

impl SharedRoot {
    /// Open `root`, creating it if missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The root directory on disk.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Normalize `name` and map it below the root.
    pub fn resolve(&self, name: &str) -> Result<(String, PathBuf)> {
        let name = path::normalize(name)?;
        let full = name.split('/').fold(self.root.clone(), |acc, part| acc.join(part));
        Ok((name, full))
    }

    /// Every entry below the root, directories included, in name order.
    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        let mut stack = vec![(String::new(), self.root.clone())];

        while let Some((prefix, dir)) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let name = if prefix.is_empty() {
                    file_name
                } else {
                    format!("{prefix}/{file_name}")
                };

                let metadata = match fs::metadata(entry.path()).await {
                    Ok(metadata) => metadata,
                    // Removed between read_dir and stat.
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };
                let record = to_record(name.clone(), &metadata);
                if record.is_directory {
                    stack.push((name, entry.path()));
                }
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Files (not directories) equal to `dir` or below it, in name order.
    pub async fn files_under(&self, dir: &str) -> Result<Vec<FileRecord>> {
        let (dir, _) = self.resolve(dir)?;
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|record| !record.is_directory && path::is_within(&record.name, &dir))
            .collect())
    }

    /// Metadata for `name`, or `None` if it does not exist.
    pub async fn stat(&self, name: &str) -> Result<Option<FileRecord>> {
        let (name, full) = self.resolve(name)?;
        match fs::metadata(&full).await {
            Ok(metadata) => Ok(Some(to_record(name, &metadata))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Bytes of the file `name`.
    ///
    /// # Errors
    ///
    /// [`NodeError::NotFound`] if missing, [`NodeError::IsDirectory`] for a directory.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let (name, full) = self.resolve(name)?;
        match fs::metadata(&full).await {
            Ok(metadata) if metadata.is_dir() => Err(NodeError::IsDirectory(name)),
            Ok(_) => Ok(fs::read(&full).await?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(NodeError::NotFound(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `content` to `name`, creating intermediate directories.
    pub async fn write(&self, name: &str, content: &[u8]) -> Result<FileRecord> {
        let (name, full) = self.resolve(name)?;
        if fs::metadata(&full).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(NodeError::IsDirectory(name));
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, content).await?;

        let metadata = fs::metadata(&full).await?;
        Ok(to_record(name, &metadata))
    }

    /// Create the directory `name` and its parents.
    pub async fn create_dir(&self, name: &str) -> Result<FileRecord> {
        let (name, full) = self.resolve(name)?;
        fs::create_dir_all(&full).await?;

        let metadata = fs::metadata(&full).await?;
        Ok(to_record(name, &metadata))
    }

    /// Remove a file, or a whole directory tree. Returns whether it was a directory.
    ///
    /// # Errors
    ///
    /// [`NodeError::NotFound`] if `name` does not exist.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let (name, full) = self.resolve(name)?;
        let metadata = match fs::metadata(&full).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(NodeError::NotFound(name)),
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(&full).await?;
        } else {
            fs::remove_file(&full).await?;
        }
        tracing::debug!("Removed {} from shared root", name);
        Ok(metadata.is_dir())
    }

    /// Remove a file or an empty directory, never a populated tree.
    pub async fn remove_entry(&self, name: &str) -> Result<()> {
        let (name, full) = self.resolve(name)?;
        let metadata = match fs::metadata(&full).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(NodeError::NotFound(name)),
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            fs::remove_dir(&full).await?;
        } else {
            fs::remove_file(&full).await?;
        }
        tracing::debug!("Removed {} from shared root", name);
        Ok(())
    }
}

fn to_record(name: String, metadata: &std::fs::Metadata) -> FileRecord {
    let modified_at = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    FileRecord {
        name,
        modified_at,
        is_directory: metadata.is_dir(),
    }
}
