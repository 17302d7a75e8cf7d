//! The pub/sub notifier: publishes `created`/`updated` events on entity
//! mutation over a `tokio::sync::broadcast` channel shared across the
//! process, published to on a best-effort basis.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::debug;

/// One published event: the topic (`<TypeName>.created` / `.updated`) and
/// its JSON payload (`{created<Name>|modified<Name>: id}`).
#[derive(Debug, Clone, PartialEq)]
pub struct PubSubEvent {
    pub topic: String,
    pub payload: JsonValue,
}

/// The pub/sub seam.
#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(&self, topic: &str, payload: JsonValue);
}

/// A `tokio::sync::broadcast`-backed implementation. Publishing is
/// non-blocking and best-effort: if there are no subscribers the event is
/// simply dropped.
pub struct BroadcastPubSub {
    tx: broadcast::Sender<PubSubEvent>,
}

impl BroadcastPubSub {
    /// `capacity` bounds how many unconsumed events may be buffered
    /// before a slow subscriber starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PubSubEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl PubSub for BroadcastPubSub {
    async fn publish(&self, topic: &str, payload: JsonValue) {
        let event = PubSubEvent {
            topic: topic.to_string(),
            payload,
        };
        match self.tx.send(event) {
            Ok(receiver_count) => debug!(topic, receivers = receiver_count, "published event"),
            Err(_) => debug!(topic, "no subscribers for event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_is_received_by_subscriber() {
        let pubsub = BroadcastPubSub::new(16);
        let mut rx = pubsub.subscribe();

        pubsub
            .publish("Manuscript.created", serde_json::json!({"createdManuscript": "abc"}))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "Manuscript.created");
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let pubsub = BroadcastPubSub::new(16);
        pubsub.publish("Manuscript.updated", JsonValue::Null).await;
    }
}
