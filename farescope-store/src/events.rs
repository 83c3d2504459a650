use async_trait::async_trait;
use farescope_core::repository::{SearchEventPublisher, StoreError};
use farescope_shared::models::events::SearchPerformedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    pub async fn publish(&self, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                debug!(
                    topic = %self.topic,
                    key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Published event"
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic = %self.topic, error = %e, "Failed to publish event");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SearchEventPublisher for EventProducer {
    async fn publish_search(&self, event: &SearchPerformedEvent) -> Result<(), StoreError> {
        let payload = serde_json::to_string(event)?;
        self.publish(event.partition_key(), &payload)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
