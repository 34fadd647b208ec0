use crate::domain::ports::{Delivery, EventPublisher};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A message as stored on a topic log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    #[serde(serialize_with = "as_json")]
    pub payload: Vec<u8>,
}

fn as_json<S>(payload: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(value) => value.serialize(serializer),
        Err(_) => serializer.serialize_str(&String::from_utf8_lossy(payload)),
    }
}

/// In-process broker with one append-only, single-partition log per topic.
///
/// Cloning shares the logs, so a clone handed to the service and one kept
/// by the caller observe the same messages.
#[derive(Default, Clone)]
pub struct InMemoryBroker {
    topics: Arc<RwLock<BTreeMap<String, Vec<Vec<u8>>>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published to `topic`, oldest first.
    pub async fn messages(&self, topic: &str) -> Vec<BrokerMessage> {
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .map(|log| to_messages(topic, log))
            .unwrap_or_default()
    }

    /// Every message on every topic, grouped by topic name.
    pub async fn all_messages(&self) -> Vec<BrokerMessage> {
        let topics = self.topics.read().await;
        topics
            .iter()
            .flat_map(|(topic, log)| to_messages(topic, log))
            .collect()
    }
}

fn to_messages(topic: &str, log: &[Vec<u8>]) -> Vec<BrokerMessage> {
    log.iter()
        .enumerate()
        .map(|(offset, payload)| BrokerMessage {
            topic: topic.to_string(),
            partition: 0,
            offset: offset as i64,
            payload: payload.clone(),
        })
        .collect()
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<Delivery> {
        let mut topics = self.topics.write().await;
        let log = topics.entry(topic.to_string()).or_default();
        log.push(payload);
        let offset = log.len() as i64 - 1;
        debug!(topic, offset, "message appended");
        Ok(Delivery {
            topic: topic.to_string(),
            partition: 0,
            offset,
        })
    }
}
