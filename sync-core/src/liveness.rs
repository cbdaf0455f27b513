//! Peer liveness tracking.
//!
//! Holds the last probe result per peer address. The probe itself is network
//! I/O and lives in sync-client; this module only records results and reports
//! the state transition each result causes.

use dashmap::DashMap;

/// Last known reachability of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerState {
    /// Never probed.
    #[default]
    Unknown,
    /// Last probe failed.
    Offline,
    /// Last probe succeeded.
    Online,
}

impl PeerState {
    /// State recorded for a probe result.
    pub fn observed(online: bool) -> Self {
        if online {
            PeerState::Online
        } else {
            PeerState::Offline
        }
    }

    /// Whether the peer counts as reachable.
    pub fn is_online(&self) -> bool {
        matches!(self, PeerState::Online)
    }
}

/// Effect of recording a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The peer was offline or never probed and is now reachable.
    CameOnline,
    /// The peer was reachable and no longer is.
    WentOffline,
    /// Nothing observable changed.
    Unchanged,
}

impl Transition {
    /// Classify a move between two states.
    pub fn between(previous: PeerState, next: PeerState) -> Self {
        match (previous, next) {
            (PeerState::Online, PeerState::Online) => Transition::Unchanged,
            (_, PeerState::Online) => Transition::CameOnline,
            (PeerState::Online, _) => Transition::WentOffline,
            _ => Transition::Unchanged,
        }
    }
}

/// Concurrent map of peer address to [`PeerState`].
#[derive(Debug, Default)]
pub struct LivenessTracker {
    states: DashMap<String, PeerState>,
}

impl LivenessTracker {
    /// Create an empty tracker; every peer starts as [`PeerState::Unknown`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a probe result and return the transition it caused.
    ///
    /// The swap is atomic per address, so two concurrent writers cannot both
    /// observe the same `CameOnline` edge.
    pub fn set_status(&self, address: &str, online: bool) -> Transition {
        let previous = self.swap(address, online);
        Transition::between(previous, PeerState::observed(online))
    }

    /// Record a probe result and return the state it replaced, atomically.
    pub fn swap(&self, address: &str, online: bool) -> PeerState {
        self.states
            .insert(address.to_string(), PeerState::observed(online))
            .unwrap_or_default()
    }

    /// Whether the peer was reachable at its last probe.
    pub fn get_status(&self, address: &str) -> bool {
        self.state(address).is_online()
    }

    /// Full state of a peer.
    pub fn state(&self, address: &str) -> PeerState {
        self.states
            .get(address)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Every probed address with its state.
    pub fn snapshot(&self) -> Vec<(String, PeerState)> {
        let mut all: Vec<_> = self
            .states
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unknown_peer_reads_offline() {
        let tracker = LivenessTracker::new();
        assert!(!tracker.get_status("10.0.0.2:9000"));
        assert_eq!(tracker.state("10.0.0.2:9000"), PeerState::Unknown);
    }

    #[test]
    fn first_successful_probe_is_an_online_edge() {
        let tracker = LivenessTracker::new();
        assert_eq!(tracker.set_status("a:1", true), Transition::CameOnline);
        assert!(tracker.get_status("a:1"));
    }

    #[test]
    fn first_failed_probe_is_silent() {
        let tracker = LivenessTracker::new();
        assert_eq!(tracker.set_status("a:1", false), Transition::Unchanged);
        assert_eq!(tracker.state("a:1"), PeerState::Offline);
    }

    #[test]
    fn offline_online_offline_cycle() {
        let tracker = LivenessTracker::new();
        tracker.set_status("a:1", false);

        assert_eq!(tracker.set_status("a:1", true), Transition::CameOnline);
        assert_eq!(tracker.set_status("a:1", true), Transition::Unchanged);
        assert_eq!(tracker.set_status("a:1", false), Transition::WentOffline);
        assert_eq!(tracker.set_status("a:1", false), Transition::Unchanged);
        assert_eq!(tracker.set_status("a:1", true), Transition::CameOnline);
    }

    #[test]
    fn swap_returns_replaced_state() {
        let tracker = LivenessTracker::new();
        assert_eq!(tracker.swap("a:1", false), PeerState::Unknown);
        assert_eq!(tracker.swap("a:1", true), PeerState::Offline);
        assert_eq!(tracker.swap("a:1", true), PeerState::Online);
    }

    #[test]
    fn peers_are_tracked_independently() {
        let tracker = LivenessTracker::new();
        tracker.set_status("a:1", true);
        tracker.set_status("b:2", false);

        assert!(tracker.get_status("a:1"));
        assert!(!tracker.get_status("b:2"));
        assert_eq!(
            tracker.snapshot(),
            vec![
                ("a:1".to_string(), PeerState::Online),
                ("b:2".to_string(), PeerState::Offline)
            ]
        );
    }

    #[test]
    fn concurrent_writers_see_one_online_edge() {
        let tracker = Arc::new(LivenessTracker::new());
        tracker.set_status("a:1", false);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.set_status("a:1", true))
            })
            .collect();

        let edges = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|t| *t == Transition::CameOnline)
            .count();

        assert_eq!(edges, 1);
    }
}
