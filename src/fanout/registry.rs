//! Dynamic set of subscribers for one stream kind.
//!
//! Membership lives in a `HashMap` behind a mutex. The lock only guards map
//! mutation and copying; delivery happens outside it with `try_send` into a
//! bounded per-subscriber channel, so a slow subscriber loses messages instead
//! of stalling the broadcaster.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

/// Messages buffered per subscriber before new ones are dropped.
pub const SUBSCRIBER_BUFFER: usize = 16;

/// Opaque identity of one connected subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Subscriber {id} is already registered for {kind}")]
    DuplicateSubscriber { id: SubscriberId, kind: &'static str },
}

/// Outcome of one broadcast cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers whose buffer was full; they miss this message.
    pub dropped: usize,
    /// Subscribers whose receiver was gone; they were removed.
    pub disconnected: usize,
}

type Clients<T> = HashMap<SubscriberId, mpsc::Sender<T>>;

pub struct Registry<T> {
    kind: &'static str,
    clients: Arc<Mutex<Clients<T>>>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            clients: Arc::clone(&self.clients),
        }
    }
}

impl<T> Registry<T> {
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Insert a subscriber. An id that is already present is rejected and the
    /// existing entry kept.
    pub fn register(&self, id: SubscriberId, tx: mpsc::Sender<T>) -> Result<(), RegistryError> {
        self.register_seeded(id, tx, || None)
    }

    /// Insert a subscriber and enqueue `seed()` as its first message.
    ///
    /// The seed is produced and queued while the lock is held, so no broadcast
    /// can slip in between the seed and the registration.
    pub fn register_seeded(
        &self,
        id: SubscriberId,
        tx: mpsc::Sender<T>,
        seed: impl FnOnce() -> Option<T>,
    ) -> Result<(), RegistryError> {
        let mut clients = self.clients.lock();
        if clients.contains_key(&id) {
            warn!(subscriber = %id, kind = self.kind, "Rejected duplicate subscriber id");
            return Err(RegistryError::DuplicateSubscriber {
                id,
                kind: self.kind,
            });
        }
        if let Some(first) = seed() {
            if let Err(e) = tx.try_send(first) {
                warn!(subscriber = %id, kind = self.kind, error = %e, "Failed to queue initial message");
            }
        }
        clients.insert(id, tx);
        debug!(subscriber = %id, kind = self.kind, clients = clients.len(), "Subscriber registered");
        Ok(())
    }

    /// Remove a subscriber. Returns whether it was present; removing an
    /// unknown id is a no-op.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut clients = self.clients.lock();
        let removed = clients.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, kind = self.kind, clients = clients.len(), "Subscriber unregistered");
        }
        removed
    }

    /// Copy of the current delivery handles, taken under the lock.
    pub fn snapshot(&self) -> Vec<(SubscriberId, mpsc::Sender<T>)> {
        self.clients
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

impl<T: Clone> Registry<T> {
    /// Push `message` to every subscriber without blocking.
    pub fn broadcast(&self, message: &T) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut gone = Vec::new();

        for (id, tx) in self.snapshot() {
            match tx.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    warn!(subscriber = %id, kind = self.kind, "Subscriber is lagging, dropping message");
                }
                Err(TrySendError::Closed(_)) => gone.push(id),
            }
        }

        if !gone.is_empty() {
            let mut clients = self.clients.lock();
            for id in &gone {
                clients.remove(id);
            }
            report.disconnected = gone.len();
            debug!(kind = self.kind, removed = gone.len(), "Removed disconnected subscribers");
        }

        report
    }

    /// Register a fresh subscriber with a generated id.
    pub fn subscribe(&self) -> Result<Subscription<T>, RegistryError> {
        self.subscribe_seeded(|| None)
    }

    /// Like [`Registry::subscribe`], with `seed()` queued as the first message.
    pub fn subscribe_seeded(
        &self,
        seed: impl FnOnce() -> Option<T>,
    ) -> Result<Subscription<T>, RegistryError> {
        let id = SubscriberId::generate();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.register_seeded(id, tx, seed)?;
        Ok(Subscription {
            id,
            rx,
            registry: self.clone(),
        })
    }
}

/// Receiving side of one registration. Dropping it unregisters the subscriber.
pub struct Subscription<T> {
    id: SubscriberId,
    rx: mpsc::Receiver<T>,
    registry: Registry<T>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next message, or `None` once the registry dropped this subscriber.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
