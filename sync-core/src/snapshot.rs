//! Last-known listing per peer.
//!
//! Stale by construction: the live peer is authoritative whenever it is
//! reachable. The cache lets the front-end show what an offline peer holds
//! and lets offline deletes and directory pulls fan out to file granularity.

use dashmap::DashMap;
use std::collections::BTreeMap;
use sync_types::{path, FileRecord};

/// Concurrent map of peer address to its listing, keyed and ordered by name.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    listings: DashMap<String, BTreeMap<String, FileRecord>>,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a peer's whole listing.
    ///
    /// Later records win when a name appears twice.
    pub fn replace(&self, address: &str, records: impl IntoIterator<Item = FileRecord>) {
        let listing = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        self.listings.insert(address.to_string(), listing);
    }

    /// Remove one record; returns it if it was cached.
    pub fn remove(&self, address: &str, name: &str) -> Option<FileRecord> {
        self.listings
            .get_mut(address)
            .and_then(|mut listing| listing.remove(name))
    }

    /// Remove `dir` and everything cached below it.
    ///
    /// Returned in reverse name order, so contents come before the
    /// directories that hold them.
    pub fn remove_under(&self, address: &str, dir: &str) -> Vec<FileRecord> {
        let Some(mut listing) = self.listings.get_mut(address) else {
            return Vec::new();
        };

        let names: Vec<String> = listing
            .keys()
            .filter(|name| path::is_within(name, dir))
            .cloned()
            .collect();

        names
            .iter()
            .rev()
            .filter_map(|name| listing.remove(name))
            .collect()
    }

    /// Insert or overwrite one record, typically for an in-flight transfer.
    pub fn append(&self, address: &str, record: FileRecord) {
        self.listings
            .entry(address.to_string())
            .or_default()
            .insert(record.name.clone(), record);
    }

    /// A peer's listing in name order; empty if never cached.
    pub fn records(&self, address: &str) -> Vec<FileRecord> {
        self.listings
            .get(address)
            .map(|listing| listing.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One cached record.
    pub fn get(&self, address: &str, name: &str) -> Option<FileRecord> {
        self.listings
            .get(address)
            .and_then(|listing| listing.get(name).cloned())
    }

    /// Records equal to `dir` or below it, in name order.
    pub fn entries_under(&self, address: &str, dir: &str) -> Vec<FileRecord> {
        self.listings
            .get(address)
            .map(|listing| {
                listing
                    .values()
                    .filter(|record| path::is_within(&record.name, dir))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether a listing has ever been cached for the peer.
    pub fn contains_peer(&self, address: &str) -> bool {
        self.listings.contains_key(address)
    }
}
