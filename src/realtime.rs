//! In-process publish/subscribe for chat, notifications, profile changes and
//! upload progress. Subscriptions detach themselves when dropped.

use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

const TOPIC_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct HubEvent {
    pub kind: &'static str,
    pub payload: serde_json::Value,
}

impl HubEvent {
    pub fn new(kind: &'static str, payload: impl Serialize) -> Self {
        Self {
            kind,
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

pub mod topics {
    use uuid::Uuid;

    pub fn chat(thread: &str) -> String {
        format!("chat:{thread}")
    }

    pub fn notifications(user_id: Uuid) -> String {
        format!("notifications:{user_id}")
    }

    pub fn profile(user_id: Uuid) -> String {
        format!("profile:{user_id}")
    }

    pub fn uploads(user_id: Uuid) -> String {
        format!("uploads:{user_id}")
    }
}

#[derive(Clone, Default)]
pub struct SubscriptionHub {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<HubEvent>>>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<HubEvent>>> {
        self.topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let receiver = self
            .lock()
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        tracing::debug!(%topic, "subscription attached");
        Subscription {
            id: Uuid::new_v4(),
            topic,
            receiver,
            hub: self.clone(),
        }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, topic: &str, event: HubEvent) -> usize {
        let topics = self.lock();
        match topics.get(topic) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn topic_count(&self) -> usize {
        self.lock().len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn detach(&self, topic: &str) {
        let mut topics = self.lock();
        // The departing receiver is still alive while its guard drops.
        if topics
            .get(topic)
            .is_some_and(|sender| sender.receiver_count() <= 1)
        {
            topics.remove(topic);
        }
    }
}

pub struct Subscription {
    id: Uuid,
    topic: String,
    receiver: broadcast::Receiver<HubEvent>,
    hub: SubscriptionHub,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event, skipping over anything lost to lag. `None` once the topic
    /// is gone.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_sse(self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let stream = futures::stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            let sse = Event::default()
                .event(event.kind)
                .json_data(&event.payload)
                .unwrap_or_else(|_| Event::default().event(event.kind));
            Some((Ok(sse), sub))
        });
        Sse::new(stream).keep_alive(KeepAlive::default())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::debug!(topic = %self.topic, id = %self.id, "subscription detached");
        self.hub.detach(&self.topic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_events_reach_subscribers() {
        let hub = SubscriptionHub::new();
        let mut sub = hub.subscribe(topics::chat("support:1"));

        let delivered = hub.publish(
            "chat:support:1",
            HubEvent::new("message", serde_json::json!({ "body": "selam" })),
        );
        assert_eq!(delivered, 1);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, "message");
        assert_eq!(event.payload["body"], "selam");
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let hub = SubscriptionHub::new();
        assert_eq!(hub.publish("nobody", HubEvent::new("x", ())), 0);
        assert_eq!(hub.topic_count(), 0);
    }

    #[test]
    fn dropping_last_subscription_removes_topic() {
        let hub = SubscriptionHub::new();
        let first = hub.subscribe("profile:a");
        let second = hub.subscribe("profile:a");
        assert_eq!(hub.subscriber_count("profile:a"), 2);

        drop(first);
        assert_eq!(hub.topic_count(), 1);
        assert_eq!(hub.subscriber_count("profile:a"), 1);

        drop(second);
        assert_eq!(hub.topic_count(), 0);
    }
}
