//! Single-writer status store.
//!
//! The merge loop owns the [`StatusStore`] and is the only writer. Everything
//! else reads through a [`StatusReader`], which hands out the last committed
//! snapshot as an `Arc`, so a reader can never observe a half-applied update.

use crate::domain::{AggregatedStatus, StatusUpdate};
use std::sync::Arc;
use tokio::sync::watch;

pub struct StatusStore {
    pending: AggregatedStatus,
    dirty: bool,
    published: watch::Sender<Arc<AggregatedStatus>>,
}

/// Cloneable read access to the last committed snapshot.
#[derive(Clone, Debug)]
pub struct StatusReader {
    current: watch::Receiver<Arc<AggregatedStatus>>,
}

impl StatusStore {
    #[must_use]
    pub fn new() -> (Self, StatusReader) {
        let (published, current) = watch::channel(Arc::new(AggregatedStatus::default()));
        let store = Self {
            pending: AggregatedStatus::default(),
            dirty: false,
            published,
        };
        (store, StatusReader { current })
    }

    /// Replace one field of the pending snapshot and mark it for broadcast.
    pub fn apply(&mut self, update: StatusUpdate) {
        self.pending.apply(update);
        self.dirty = true;
    }

    /// Publish the pending snapshot if anything changed since the last commit.
    ///
    /// Returns the published value so the caller can broadcast the exact
    /// snapshot readers now see.
    pub fn commit(&mut self) -> Option<Arc<AggregatedStatus>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        let snapshot = Arc::new(self.pending.clone());
        self.published.send_replace(Arc::clone(&snapshot));
        Some(snapshot)
    }

    #[must_use]
    pub fn current(&self) -> Arc<AggregatedStatus> {
        Arc::clone(&self.published.borrow())
    }

    #[must_use]
    pub fn reader(&self) -> StatusReader {
        StatusReader {
            current: self.published.subscribe(),
        }
    }
}

impl StatusReader {
    /// Last committed snapshot. Never waits on the writer.
    #[must_use]
    pub fn current(&self) -> Arc<AggregatedStatus> {
        Arc::clone(&self.current.borrow())
    }
}
