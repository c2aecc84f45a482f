//! Cache events published by grid maps.

use std::sync::Arc;

use tokio::sync::broadcast;

const DEFAULT_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEventKind {
    Put,
    Read,
    Removed,
    Cleared,
}

impl std::fmt::Display for GridEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GridEventKind::Put => "put",
            GridEventKind::Read => "read",
            GridEventKind::Removed => "removed",
            GridEventKind::Cleared => "cleared",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridEvent {
    pub map_name: String,
    pub kind: GridEventKind,
    /// Debug rendering of the key; empty for `Cleared`.
    pub key: String,
}

/// Fan-out of grid events to any number of subscribers. Slow receivers
/// lose the oldest events once the buffer is full.
#[derive(Clone)]
pub struct GridEventBroadcaster {
    sender: broadcast::Sender<GridEvent>,
}

impl GridEventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the number of subscribers that received the event.
    pub fn send(&self, event: GridEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Builds and sends an event only when somebody is listening.
    pub fn publish(&self, map_name: &str, kind: GridEventKind, key: impl FnOnce() -> String) -> usize {
        if !self.has_subscribers() {
            return 0;
        }
        self.send(GridEvent {
            map_name: map_name.to_string(),
            kind,
            key: key(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for GridEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GridEventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridEventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
