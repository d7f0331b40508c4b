use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Event, ProviderId};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for store changes per provider. Subscribers re-run the
/// availability computation whenever something arrives.
pub struct NotifyHub {
    channels: DashMap<ProviderId, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to changes for a provider. Creates the channel if needed.
    pub fn subscribe(&self, provider: ProviderId) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(provider)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(&event.provider()) {
            let _ = sender.send(event.clone());
        }
    }
}
