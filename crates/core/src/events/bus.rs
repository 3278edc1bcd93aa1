use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

use super::types::{HubEvent, Topic, UsageEvent};

/// In-process, topic-keyed event bus backed by one `tokio::broadcast`
/// channel per topic. Delivery is best-effort and at-most-once: a lagging
/// receiver skips what it missed and nothing is redelivered.
#[derive(Debug, Clone)]
pub struct EventBus {
    capacity: usize,
    topics: Arc<Mutex<HashMap<Topic, broadcast::Sender<HubEvent>>>>,
}

impl EventBus {
    /// Create a new event bus; `capacity` bounds each topic's backlog.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to one topic, creating its channel on first use.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<HubEvent> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Fan a usage event out to the key topic and the owner topic. Returns
    /// the number of receivers reached; zero is not an error.
    pub fn publish_usage(&self, event: UsageEvent) -> usize {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        for topic in event.topics() {
            let Some(sender) = topics.get(&topic) else {
                continue;
            };
            match sender.send(HubEvent::ApiKeyUsageUpdated(event.clone())) {
                Ok(n) => delivered += n,
                // Every receiver is gone.
                Err(_) => {
                    topics.remove(&topic);
                }
            }
        }
        tracing::debug!(api_key_id = %event.key_id, delivered, "usage event published");
        delivered
    }

    /// Drop channels nobody listens to any more.
    pub fn prune(&self) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Number of active subscriptions across all topics.
    pub fn subscriber_count(&self) -> usize {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.values().map(broadcast::Sender::receiver_count).sum()
    }

    pub fn topic_count(&self) -> usize {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
