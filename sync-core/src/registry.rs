//! Static peer registry.
//!
//! The peer set is loaded once from configuration and never mutated. Exactly
//! one entry describes the running node; anything else is a configuration
//! error and the node must not start.

use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use sync_types::PeerId;
use thiserror::Error;

/// Errors raised while building the registry or looking peers up.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No entry is marked `is_local`.
    #[error("no peer entry is marked is_local")]
    NoLocalPeer,

    /// More than one entry is marked `is_local`.
    #[error("{count} peer entries are marked is_local, expected exactly one")]
    MultipleLocalPeers {
        /// Number of local entries found.
        count: usize,
    },

    /// Two entries share an id.
    #[error("duplicate peer id {0}")]
    DuplicateId(PeerId),

    /// The peer list could not be parsed.
    #[error("invalid peer list: {0}")]
    Parse(#[source] serde_json::Error),

    /// Lookup of an unknown id.
    #[error("peer {0} not found")]
    NotFound(PeerId),
}

/// One record of the peer configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerEntry {
    /// Peer id.
    pub id: PeerId,
    /// Host name or IP address.
    pub ip: String,
    /// TCP port, written either as a number or a string.
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    /// Whether this entry is the running node.
    #[serde(default)]
    pub is_local: bool,
}

fn port_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Immutable identity of one peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    /// Peer id.
    pub id: PeerId,
    /// `host:port` address.
    pub address: String,
    /// Whether this is the running node.
    pub is_local: bool,
}

impl PeerIdentity {
    /// Create an identity.
    pub fn new(id: impl Into<PeerId>, address: impl Into<String>, is_local: bool) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            is_local,
        }
    }
}

impl From<&PeerEntry> for PeerIdentity {
    fn from(entry: &PeerEntry) -> Self {
        Self {
            id: entry.id,
            address: format!("{}:{}", entry.ip, entry.port),
            is_local: entry.is_local,
        }
    }
}

/// The static peer set.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    peers: Vec<PeerIdentity>,
    local: usize,
}

impl PeerRegistry {
    /// Build a registry from identities.
    ///
    /// # Errors
    ///
    /// Fails unless exactly one identity is local and ids are unique.
    pub fn new(peers: Vec<PeerIdentity>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for peer in &peers {
            if !seen.insert(peer.id) {
                return Err(RegistryError::DuplicateId(peer.id));
            }
        }

        let locals: Vec<usize> = peers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_local)
            .map(|(i, _)| i)
            .collect();

        match locals.as_slice() {
            [] => Err(RegistryError::NoLocalPeer),
            [local] => Ok(Self {
                local: *local,
                peers,
            }),
            many => Err(RegistryError::MultipleLocalPeers { count: many.len() }),
        }
    }

    /// Build a registry from configuration records.
    pub fn from_entries(entries: &[PeerEntry]) -> Result<Self, RegistryError> {
        Self::new(entries.iter().map(PeerIdentity::from).collect())
    }

    /// Parse a JSON array of `{id, ip, port, is_local}` records.
    pub fn from_json(source: &str) -> Result<Self, RegistryError> {
        let entries: Vec<PeerEntry> = serde_json::from_str(source).map_err(RegistryError::Parse)?;
        Self::from_entries(&entries)
    }

    /// The running node.
    pub fn local(&self) -> &PeerIdentity {
        &self.peers[self.local]
    }

    /// Every peer, local included, in configuration order.
    pub fn all(&self) -> &[PeerIdentity] {
        &self.peers
    }

    /// Every peer except the running node.
    pub fn remotes(&self) -> impl Iterator<Item = &PeerIdentity> {
        let local = self.local().id;
        self.peers.iter().filter(move |p| p.id != local)
    }

    /// Look up a peer by id.
    pub fn by_id(&self, id: PeerId) -> Result<&PeerIdentity, RegistryError> {
        self.peers
            .iter()
            .find(|p| p.id == id)
            .ok_or(RegistryError::NotFound(id))
    }

    /// Look up a peer by `host:port` address.
    pub fn by_address(&self, address: &str) -> Option<&PeerIdentity> {
        self.peers.iter().find(|p| p.address == address)
    }

    /// Whether `id` is the running node.
    pub fn is_local(&self, id: PeerId) -> bool {
        self.local().id == id
    }

    /// Number of peers, local included.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Always false for a valid registry; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_PEERS: &str = r#"[
        {"id": 1, "ip": "10.0.0.1", "port": "9000", "is_local": true},
        {"id": 2, "ip": "10.0.0.2", "port": 9000, "is_local": false},
        {"id": 3, "ip": "10.0.0.3", "port": "9001"}
    ]"#;

    #[test]
    fn loads_peers_and_finds_local() {
        let registry = PeerRegistry::from_json(THREE_PEERS).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.local().id, PeerId::new(1));
        assert_eq!(registry.local().address, "10.0.0.1:9000");
        assert_eq!(
            registry.by_id(PeerId::new(3)).unwrap().address,
            "10.0.0.3:9001"
        );
    }

    #[test]
    fn remotes_excludes_local() {
        let registry = PeerRegistry::from_json(THREE_PEERS).unwrap();
        let ids: Vec<_> = registry.remotes().map(|p| p.id.value()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn missing_local_is_fatal() {
        let json = r#"[{"id": 1, "ip": "a", "port": 1}, {"id": 2, "ip": "b", "port": 2}]"#;
        assert!(matches!(
            PeerRegistry::from_json(json),
            Err(RegistryError::NoLocalPeer)
        ));
    }

    #[test]
    fn two_locals_are_fatal() {
        let json = r#"[
            {"id": 1, "ip": "a", "port": 1, "is_local": true},
            {"id": 2, "ip": "b", "port": 2, "is_local": true}
        ]"#;
        assert!(matches!(
            PeerRegistry::from_json(json),
            Err(RegistryError::MultipleLocalPeers { count: 2 })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"[
            {"id": 1, "ip": "a", "port": 1, "is_local": true},
            {"id": 1, "ip": "b", "port": 2}
        ]"#;
        assert!(matches!(
            PeerRegistry::from_json(json),
            Err(RegistryError::DuplicateId(id)) if id == PeerId::new(1)
        ));
    }

    #[test]
    fn unknown_id_lookup_fails() {
        let registry = PeerRegistry::from_json(THREE_PEERS).unwrap();
        assert!(matches!(
            registry.by_id(PeerId::new(9)),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn bad_port_is_a_parse_error() {
        let json = r#"[{"id": 1, "ip": "a", "port": "http", "is_local": true}]"#;
        assert!(matches!(
            PeerRegistry::from_json(json),
            Err(RegistryError::Parse(_))
        ));
    }

    #[test]
    fn lookup_by_address() {
        let registry = PeerRegistry::from_json(THREE_PEERS).unwrap();
        assert_eq!(
            registry.by_address("10.0.0.2:9000").map(|p| p.id),
            Some(PeerId::new(2))
        );
        assert!(registry.by_address("10.0.0.9:9000").is_none());
    }
}
