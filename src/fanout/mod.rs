pub mod registry;

pub use registry::{
    BroadcastReport, Registry, RegistryError, SUBSCRIBER_BUFFER, SubscriberId, Subscription,
};

use crate::domain::{AggregatedStatus, LogEvent};
use crate::status::StatusReader;
use std::sync::Arc;

pub type StatusSubscription = Subscription<Arc<AggregatedStatus>>;
pub type EventSubscription = Subscription<Arc<LogEvent>>;

/// Subscriber-facing side of the aggregator: both registries plus read access
/// to the current snapshot. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
    status: Registry<Arc<AggregatedStatus>>,
    events: Registry<Arc<LogEvent>>,
    reader: StatusReader,
}

impl Hub {
    #[must_use]
    pub fn new(reader: StatusReader) -> Self {
        Self {
            status: Registry::new("status"),
            events: Registry::new("events"),
            reader,
        }
    }

    /// Point-in-time snapshot for non-streaming queries.
    pub fn current(&self) -> Arc<AggregatedStatus> {
        self.reader.current()
    }

    /// Subscribe to status snapshots. The current snapshot is always the
    /// first message received.
    pub fn subscribe_status(&self) -> Result<StatusSubscription, RegistryError> {
        let reader = self.reader.clone();
        self.status.subscribe_seeded(move || Some(reader.current()))
    }

    /// Subscribe to raw log events. Nothing is replayed.
    pub fn subscribe_events(&self) -> Result<EventSubscription, RegistryError> {
        self.events.subscribe()
    }

    pub fn status_registry(&self) -> &Registry<Arc<AggregatedStatus>> {
        &self.status
    }

    pub fn event_registry(&self) -> &Registry<Arc<LogEvent>> {
        &self.events
    }
}
