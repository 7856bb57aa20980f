//! Native Kafka publisher, enabled with the `kafka` feature.

use std::time::Duration;

use async_trait::async_trait;
use domain::LifecycleEvent;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};

use crate::{Result, publisher::EventPublisher};

/// Publishes events with an `rdkafka` producer, keyed by order id.
#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaEventPublisher {
    /// Connects a producer to a comma-separated broker list.
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            delivery_timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    #[tracing::instrument(skip(self, event), fields(topic = %event.topic, key = %event.key))]
    async fn emit(&self, event: &LifecycleEvent) -> Result<()> {
        let payload = serde_json::to_vec(&event.payload)?;
        let record = FutureRecord::to(event.topic.as_str())
            .key(&event.key)
            .payload(&payload);

        self.producer
            .send(record, Timeout::After(self.delivery_timeout))
            .await
            .map_err(|(err, _)| err)?;

        tracing::debug!("Published to Kafka");
        Ok(())
    }
}
