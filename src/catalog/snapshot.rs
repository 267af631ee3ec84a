//! Immutable catalog snapshots and their single-writer handoff
//!
//! The refresher owns the only [`SnapshotPublisher`]; any number of
//! [`SnapshotReader`]s take an `Arc<Snapshot>` out of it without waiting on a
//! refresh. Publishing replaces the whole value at once, so a reader sees
//! either the previous snapshot or the new one, never a list being built.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub name: String,
    pub tags: Vec<String>,
}

impl RepositoryInfo {
    pub fn new(name: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }
}

/// Point-in-time listing of public repositories, in catalog order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    repositories: Vec<RepositoryInfo>,
    produced_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(repositories: Vec<RepositoryInfo>, produced_at: DateTime<Utc>) -> Self {
        Self {
            repositories,
            produced_at,
        }
    }

    pub fn repositories(&self) -> &[RepositoryInfo] {
        &self.repositories
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryInfo> {
        self.repositories.iter().find(|repo| repo.name == name)
    }
}

type Slot = Option<Arc<Snapshot>>;

/// Create the publisher/reader pair. The slot starts empty: "never refreshed".
pub fn snapshot_channel() -> (SnapshotPublisher, SnapshotReader) {
    let (tx, rx) = watch::channel(None);
    (SnapshotPublisher { tx }, SnapshotReader { rx })
}

#[derive(Debug)]
pub struct SnapshotPublisher {
    tx: watch::Sender<Slot>,
}

impl SnapshotPublisher {
    /// Swap in `snapshot` as the current one and return the shared handle
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(Some(Arc::clone(&snapshot)));
        snapshot
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Cheap, cloneable read side handed to the presentation layer
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Slot>,
}

impl SnapshotReader {
    /// The current snapshot, or `None` before the first successful refresh
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publish. Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }
}
