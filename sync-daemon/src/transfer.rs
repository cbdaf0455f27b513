//! Transfer engine.
//!
//! Three primitives move files between peers:
//! - [`Node::send_file`] - local file or tree to a peer
//! - [`Node::request_file`] / [`Node::request_directory`] - peer to local
//! - [`Node::relay`] - peer to peers, brokered without touching local disk
//!
//! [`Node::transfer_file`] picks one of them from the selection's owner and
//! the checked targets.
//!
//! A peer that is offline, or whose dial fails, never makes a transfer fail:
//! the affected file is queued as a [`PendingOperation`] under that peer and
//! replayed by the resync orchestrator when it comes back. Resync itself
//! calls the `*_with` variants in [`OnUnreachable::Fail`] mode so a replay
//! that fails again is reported instead of re-queued.

use crate::error::{NodeError, Result};
use crate::node::{Node, Selection};
use chrono::Utc;
use std::ops::AddAssign;
use sync_client::{ClientError, TransportError};
use sync_core::{PeerIdentity, PendingOperation};
use sync_types::{path, FileRecord, LogAction, PeerId};

/// Result of a single-file request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The file was written locally.
    Done,
    /// The source was unreachable; a `Get` was queued under it.
    Pending,
}

/// Files moved and files queued by one transfer call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Files delivered now.
    pub count: usize,
    /// Files queued for a later resync.
    pub pending: usize,
}

impl TransferReport {
    fn done() -> Self {
        Self {
            count: 1,
            pending: 0,
        }
    }

    fn queued() -> Self {
        Self {
            count: 0,
            pending: 1,
        }
    }

    /// Whether anything was deferred.
    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }
}

impl AddAssign for TransferReport {
    fn add_assign(&mut self, other: Self) {
        self.count += other.count;
        self.pending += other.pending;
    }
}

impl From<Outcome> for TransferReport {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Self::done(),
            Outcome::Pending => Self::queued(),
        }
    }
}

/// What to do when a peer cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnUnreachable {
    /// Queue the operation under the peer.
    Queue,
    /// Return [`NodeError::Unreachable`].
    Fail,
}

impl Node {
    /// Send a local file, or every file below a local directory, to `peer`.
    pub async fn send_file(&self, peer: PeerId, name: &str) -> Result<TransferReport> {
        self.send_with(peer, name, OnUnreachable::Queue).await
    }

    /// Pull `name` from `peer` into the shared root.
    ///
    /// With `flatten` the file is saved under its base name only.
    pub async fn request_file(&self, peer: PeerId, name: &str, flatten: bool) -> Result<Outcome> {
        self.request_with(peer, name, flatten, OnUnreachable::Queue)
            .await
    }

    /// Pull every file at or below `dir` from `peer`, keeping relative paths.
    ///
    /// When `peer` is unreachable the file list comes from its snapshot and
    /// one `Get` is queued per file.
    pub async fn request_directory(&self, peer: PeerId, dir: &str) -> Result<TransferReport> {
        self.request_directory_with(peer, dir, OnUnreachable::Queue)
            .await
    }

    /// Copy `name` from `source` to every peer in `targets` without writing it locally.
    ///
    /// A target that cannot be reached gets a `Send` queued with `source` as
    /// its source, so the replay fetches from the same place.
    pub async fn relay(
        &self,
        source: PeerId,
        name: &str,
        targets: &[PeerId],
    ) -> Result<TransferReport> {
        self.relay_with(source, name, targets, OnUnreachable::Queue)
            .await
    }

    /// Move `selection` according to where it lives and which targets are checked.
    ///
    /// - remote selection, no targets: pull to local
    /// - local selection, targets: send to each target
    /// - remote selection, targets: relay from the owner to each target
    ///
    /// A remote selection with the local node among its targets is pulled as
    /// well as relayed to the others.
    pub async fn transfer_file(
        &self,
        selection: &Selection,
        targets: &[PeerId],
    ) -> Result<TransferReport> {
        let owner = self.peer(selection.peer)?.clone();
        let local = self.local().id;

        let mut checked: Vec<PeerId> = Vec::new();
        for target in targets {
            self.peer(*target)?;
            if *target != owner.id && !checked.contains(target) {
                checked.push(*target);
            }
        }
        if !targets.is_empty() && checked.is_empty() {
            return Err(NodeError::NoTransferOperation);
        }

        let mut report = TransferReport::default();
        match (owner.is_local, checked.is_empty()) {
            (true, false) => {
                for target in checked {
                    report += self.send_file(target, &selection.name).await?;
                }
            }
            (false, true) => {
                report += self.pull(selection).await?;
            }
            (false, false) => {
                let remote_targets: Vec<PeerId> =
                    checked.iter().copied().filter(|t| *t != local).collect();
                if checked.contains(&local) {
                    report += self.pull(selection).await?;
                }
                if !remote_targets.is_empty() {
                    report += self
                        .relay(owner.id, &selection.name, &remote_targets)
                        .await?;
                }
            }
            (true, true) => return Err(NodeError::NoTransferOperation),
        }

        tracing::info!(
            "Transfer of {} from peer {}: {} delivered, {} pending",
            selection.name,
            owner.id,
            report.count,
            report.pending
        );
        Ok(report)
    }

    async fn pull(&self, selection: &Selection) -> Result<TransferReport> {
        self.pull_with(selection.peer, &selection.name, false, OnUnreachable::Queue)
            .await
    }

    /// Pull a file or a whole directory, whichever `name` turns out to be.
    ///
    /// An entry of unknown kind on an unreachable peer is queued as a single
    /// `Get`; its replay asks again once the peer's listing is live.
    pub(crate) async fn pull_with(
        &self,
        peer: PeerId,
        name: &str,
        flatten: bool,
        mode: OnUnreachable,
    ) -> Result<TransferReport> {
        match self.selection_is_dir(&Selection::new(peer, name)).await? {
            Some(true) => self.request_directory_with(peer, name, mode).await,
            Some(false) | None => Ok(self
                .request_with(peer, name, flatten, mode)
                .await?
                .into()),
        }
    }

    pub(crate) async fn send_with(
        &self,
        peer: PeerId,
        name: &str,
        mode: OnUnreachable,
    ) -> Result<TransferReport> {
        let target = self.peer(peer)?.clone();
        if target.is_local {
            return Err(NodeError::NoTransferOperation);
        }
        let (name, _) = self.shared().resolve(name)?;
        let Some(record) = self.shared().stat(&name).await? else {
            return Err(NodeError::NotFound(name));
        };

        let mut report = TransferReport::default();
        if !record.is_directory {
            report += self.send_one(&target, &name, mode).await?;
            return Ok(report);
        }

        // Directories first, parents before children, then the files.
        let entries: Vec<FileRecord> = self
            .shared()
            .list()
            .await?
            .into_iter()
            .filter(|entry| path::is_within(&entry.name, &name))
            .collect();

        for dir in entries.iter().filter(|entry| entry.is_directory) {
            self.announce_directory(&target, &dir.name).await;
        }
        for file in entries.iter().filter(|entry| !entry.is_directory) {
            report += self.send_one(&target, &file.name, mode).await?;
        }
        Ok(report)
    }

    async fn send_one(
        &self,
        target: &PeerIdentity,
        name: &str,
        mode: OnUnreachable,
    ) -> Result<TransferReport> {
        let local = self.local().id;
        if !self.is_online(target) {
            return self.defer_send(target, name, local, mode);
        }

        let content = self.shared().read(name).await?;
        let size = content.len();
        match self.client().send_file(&target.address, name, content).await {
            Ok(()) => {
                tracing::info!("Sent {} ({} bytes) to peer {}", name, size, target.id);
                self.snapshots()
                    .append(&target.address, FileRecord::file(name, Utc::now()));
                self.announce(LogAction::Transfer, name, local, target.id)
                    .await;
                Ok(TransferReport::done())
            }
            Err(ClientError::Transport(TransportError::MessageTooLarge { size, max })) => {
                Err(too_large(name, size, max))
            }
            Err(e) if e.is_unreachable() => {
                tracing::warn!("Send of {} to peer {} failed: {}", name, target.id, e);
                self.mark_unreachable(target);
                self.defer_send(target, name, local, mode)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best effort: a missed announcement only loses an empty directory.
    async fn announce_directory(&self, target: &PeerIdentity, name: &str) {
        if !self.is_online(target) {
            return;
        }
        match self.client().send_directory(&target.address, name).await {
            Ok(()) => {
                self.snapshots()
                    .append(&target.address, FileRecord::directory(name, Utc::now()));
            }
            Err(e) => {
                tracing::warn!("Directory {} not announced to peer {}: {}", name, target.id, e);
                if e.is_unreachable() {
                    self.mark_unreachable(target);
                }
            }
        }
    }

    fn defer_send(
        &self,
        target: &PeerIdentity,
        name: &str,
        source: PeerId,
        mode: OnUnreachable,
    ) -> Result<TransferReport> {
        if mode == OnUnreachable::Fail {
            return Err(NodeError::Unreachable(target.id));
        }
        self.pending()
            .enqueue(target.id, PendingOperation::send(name, source, target.id));
        self.snapshots()
            .append(&target.address, FileRecord::file(name, Utc::now()));
        tracing::info!(
            "Send of {} to peer {} registered as pending",
            name,
            target.id
        );
        Ok(TransferReport::queued())
    }

    pub(crate) async fn request_with(
        &self,
        peer: PeerId,
        name: &str,
        flatten: bool,
        mode: OnUnreachable,
    ) -> Result<Outcome> {
        let source = self.peer(peer)?.clone();
        if source.is_local {
            return Err(NodeError::NoTransferOperation);
        }
        let name = path::normalize(name)?;
        if !self.is_online(&source) {
            return self.defer_get(&source, &name, flatten, mode);
        }

        match self.client().get_file(&source.address, &name).await {
            Ok(content) => {
                let destination = if flatten {
                    path::base_name(&name)
                } else {
                    name.as_str()
                };
                let record = self.shared().write(destination, &content).await?;
                self.snapshots().append(&self.local().address, record);
                tracing::info!(
                    "Pulled {} ({} bytes) from peer {} into {}",
                    name,
                    content.len(),
                    source.id,
                    destination
                );
                self.announce(LogAction::Transfer, &name, source.id, self.local().id)
                    .await;
                Ok(Outcome::Done)
            }
            Err(e) if e.is_unreachable() => {
                tracing::warn!("Pull of {} from peer {} failed: {}", name, source.id, e);
                self.mark_unreachable(&source);
                self.defer_get(&source, &name, flatten, mode)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn defer_get(
        &self,
        source: &PeerIdentity,
        name: &str,
        flatten: bool,
        mode: OnUnreachable,
    ) -> Result<Outcome> {
        if mode == OnUnreachable::Fail {
            return Err(NodeError::Unreachable(source.id));
        }
        let op = PendingOperation::get(name, source.id, self.local().id, flatten);
        self.pending().enqueue(source.id, op);
        tracing::info!(
            "Pull of {} from peer {} registered as pending",
            name,
            source.id
        );
        Ok(Outcome::Pending)
    }

    pub(crate) async fn request_directory_with(
        &self,
        peer: PeerId,
        dir: &str,
        mode: OnUnreachable,
    ) -> Result<TransferReport> {
        let source = self.peer(peer)?.clone();
        if source.is_local {
            return Err(NodeError::NoTransferOperation);
        }
        let dir = path::normalize(dir)?;

        if self.is_online(&source) {
            match self.client().get_files(&source.address).await {
                Ok(files) => {
                    self.snapshots().replace(&source.address, files.clone());
                    let wanted: Vec<FileRecord> = files
                        .into_iter()
                        .filter(|entry| path::is_within(&entry.name, &dir))
                        .collect();

                    for entry in wanted.iter().filter(|entry| entry.is_directory) {
                        self.shared().create_dir(&entry.name).await?;
                    }
                    let mut report = TransferReport::default();
                    for entry in wanted.iter().filter(|entry| !entry.is_directory) {
                        let outcome = self
                            .request_with(source.id, &entry.name, false, mode)
                            .await?;
                        report += TransferReport::from(outcome);
                    }
                    return Ok(report);
                }
                Err(e) if e.is_unreachable() => {
                    tracing::warn!("Listing of peer {} failed: {}", source.id, e);
                    self.mark_unreachable(&source);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if mode == OnUnreachable::Fail {
            return Err(NodeError::Unreachable(source.id));
        }

        let mut names: Vec<String> = self
            .snapshots()
            .entries_under(&source.address, &dir)
            .into_iter()
            .filter(|entry| !entry.is_directory)
            .map(|entry| entry.name)
            .collect();
        if names.is_empty() {
            // Nothing known below it; the replay lists the peer and expands it then.
            names.push(dir.clone());
        }

        let mut report = TransferReport::default();
        for name in names {
            let op = PendingOperation::get(name, source.id, self.local().id, false);
            self.pending().enqueue(source.id, op);
            report.pending += 1;
        }
        tracing::info!(
            "Pull of {} from peer {} registered as pending ({} files)",
            dir,
            source.id,
            report.pending
        );
        Ok(report)
    }

    pub(crate) async fn relay_with(
        &self,
        source: PeerId,
        name: &str,
        targets: &[PeerId],
        mode: OnUnreachable,
    ) -> Result<TransferReport> {
        let source = self.peer(source)?.clone();
        let name = path::normalize(name)?;

        let mut recipients = Vec::new();
        for target in targets {
            let identity = self.peer(*target)?;
            if identity.is_local || identity.id == source.id {
                tracing::debug!("Relay of {} skips peer {}", name, identity.id);
                continue;
            }
            recipients.push(identity.clone());
        }

        if source.is_local {
            let mut report = TransferReport::default();
            for target in &recipients {
                report += self.send_with(target.id, &name, mode).await?;
            }
            return Ok(report);
        }
        if !self.is_online(&source) {
            return Err(NodeError::Unreachable(source.id));
        }

        let listing = match self.client().get_files(&source.address).await {
            Ok(files) => files,
            Err(e) if e.is_unreachable() => {
                self.mark_unreachable(&source);
                return Err(NodeError::Unreachable(source.id));
            }
            Err(e) => return Err(e.into()),
        };
        self.snapshots().replace(&source.address, listing.clone());

        let is_dir = listing.iter().any(|entry| {
            (entry.name == name && entry.is_directory) || path::is_below(&entry.name, &name)
        });
        if !is_dir {
            return self.relay_one(&source, &name, &recipients, mode).await;
        }

        let entries: Vec<FileRecord> = listing
            .into_iter()
            .filter(|entry| path::is_within(&entry.name, &name))
            .collect();
        for dir in entries.iter().filter(|entry| entry.is_directory) {
            for target in &recipients {
                self.announce_directory(target, &dir.name).await;
            }
        }

        let mut report = TransferReport::default();
        for file in entries.iter().filter(|entry| !entry.is_directory) {
            report += self.relay_one(&source, &file.name, &recipients, mode).await?;
        }
        Ok(report)
    }

    async fn relay_one(
        &self,
        source: &PeerIdentity,
        name: &str,
        targets: &[PeerIdentity],
        mode: OnUnreachable,
    ) -> Result<TransferReport> {
        let mut report = TransferReport::default();
        let mut reachable = Vec::new();
        for target in targets {
            if self.is_online(target) {
                reachable.push(target);
            } else {
                report += self.defer_send(target, name, source.id, mode)?;
            }
        }
        if reachable.is_empty() {
            return Ok(report);
        }

        let content = match self.client().get_file(&source.address, name).await {
            Ok(content) => content,
            Err(e) if e.is_unreachable() => {
                self.mark_unreachable(source);
                return Err(NodeError::Unreachable(source.id));
            }
            Err(e) => return Err(e.into()),
        };

        for target in reachable {
            match self
                .client()
                .send_file(&target.address, name, content.clone())
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        "Relayed {} from peer {} to peer {}",
                        name,
                        source.id,
                        target.id
                    );
                    self.snapshots()
                        .append(&target.address, FileRecord::file(name, Utc::now()));
                    self.announce(LogAction::Transfer, name, source.id, target.id)
                        .await;
                    report += TransferReport::done();
                }
                Err(ClientError::Transport(TransportError::MessageTooLarge { size, max })) => {
                    return Err(too_large(name, size, max));
                }
                Err(e) if e.is_unreachable() => {
                    tracing::warn!("Relay of {} to peer {} failed: {}", name, target.id, e);
                    self.mark_unreachable(target);
                    report += self.defer_send(target, name, source.id, mode)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(report)
    }
}

fn too_large(name: &str, size: usize, max: usize) -> NodeError {
    tracing::warn!(
        "{} not sent: {} byte frame exceeds limit of {}",
        name,
        size,
        max
    );
    NodeError::TooLarge {
        name: name.to_string(),
        size,
        max,
    }
}
