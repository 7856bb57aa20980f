//! Publisher for Kafka-compatible HTTP proxies (Redpanda HTTP proxy,
//! Confluent REST proxy).

use std::time::Duration;

use async_trait::async_trait;
use domain::LifecycleEvent;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::{PublishError, Result, publisher::EventPublisher};

const KAFKA_JSON_V2: &str = "application/vnd.kafka.json.v2+json";

#[derive(Serialize)]
struct ProduceRequest<'a> {
    records: [ProduceRecord<'a>; 1],
}

#[derive(Serialize)]
struct ProduceRecord<'a> {
    key: &'a str,
    value: &'a serde_json::Value,
}

/// Publishes events as JSON records through a Kafka REST proxy.
#[derive(Debug, Clone)]
pub struct RestProxyEventPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl RestProxyEventPublisher {
    /// Creates a publisher for the proxy at `base_url` (e.g. `http://localhost:8082`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a publisher that reuses an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Returns the produce endpoint for a topic.
    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{}", self.base_url, topic)
    }

    fn encode(event: &LifecycleEvent) -> Result<Vec<u8>> {
        let body = ProduceRequest {
            records: [ProduceRecord {
                key: &event.key,
                value: &event.payload,
            }],
        };
        Ok(serde_json::to_vec(&body)?)
    }
}

#[async_trait]
impl EventPublisher for RestProxyEventPublisher {
    #[tracing::instrument(skip(self, event), fields(topic = %event.topic, key = %event.key))]
    async fn emit(&self, event: &LifecycleEvent) -> Result<()> {
        let body = Self::encode(event)?;

        let response = self
            .client
            .post(self.topic_url(event.topic.as_str()))
            .header(CONTENT_TYPE, KAFKA_JSON_V2)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Published to REST proxy");
        Ok(())
    }
}
