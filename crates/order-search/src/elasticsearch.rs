//! Elasticsearch-backed search projector over its REST API.

use std::time::Duration;

use async_trait::async_trait;
use domain::OrderDocument;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{Result, SearchError, SearchQuery, projector::SearchProjector};

/// Elasticsearch caps `from + size` at `index.max_result_window` (10k by default).
const MAX_HITS: usize = 10_000;

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: OrderDocument,
}

/// Index mapping for order documents.
///
/// `items` is `nested` so that a line-item clause only matches when a single
/// item satisfies it.
pub fn orders_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "status": { "type": "keyword" },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" },
                "total": {
                    "properties": { "cents": { "type": "long" } }
                },
                "items": {
                    "type": "nested",
                    "properties": {
                        "product_id": { "type": "keyword" },
                        "product_name": { "type": "text" },
                        "quantity": { "type": "integer" },
                        "unit_price": {
                            "properties": { "cents": { "type": "long" } }
                        }
                    }
                }
            }
        }
    })
}

/// Search projector talking to an Elasticsearch (or OpenSearch) node.
#[derive(Debug, Clone)]
pub struct ElasticsearchProjector {
    client: reqwest::Client,
    base_url: String,
}

impl ElasticsearchProjector {
    /// Creates a projector for the node at `base_url` (e.g. `http://localhost:9200`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a projector that reuses an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn index_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }

    fn doc_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/_doc/{}", self.base_url, collection, id)
    }

    fn search_url(&self, collection: &str) -> String {
        format!("{}/{}/_search", self.base_url, collection)
    }

    fn search_body(&self, query: &SearchQuery) -> Value {
        json!({
            "query": query.to_json(),
            "size": MAX_HITS,
            "sort": [{ "created_at": "asc" }]
        })
    }

    /// Creates the collection with the order mapping if it does not exist yet.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_index(&self, collection: &str) -> Result<()> {
        let url = self.index_url(collection);

        let exists = self.client.head(&url).send().await?;
        match exists.status() {
            StatusCode::OK => return Ok(()),
            StatusCode::NOT_FOUND => {}
            status => return Err(unexpected(status, exists).await),
        }

        let response = self.client.put(&url).json(&orders_mapping()).send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(collection, "Created search index");
            return Ok(());
        }

        // Another process may have created it between the two calls.
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
            return Ok(());
        }
        Err(SearchError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

async fn unexpected(status: StatusCode, response: reqwest::Response) -> SearchError {
    SearchError::UnexpectedStatus {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    }
}

fn parse_hits(body: &[u8]) -> Result<Vec<OrderDocument>> {
    let response: SearchResponse = serde_json::from_slice(body)?;
    Ok(response.hits.hits.into_iter().map(|hit| hit.source).collect())
}

#[async_trait]
impl SearchProjector for ElasticsearchProjector {
    #[tracing::instrument(skip(self, doc))]
    async fn upsert(&self, collection: &str, id: &str, doc: &OrderDocument) -> Result<()> {
        let response = self
            .client
            .put(self.doc_url(collection, id))
            .query(&[("refresh", "wait_for")])
            .json(doc)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(unexpected(status, response).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.doc_url(collection, id))
            .query(&[("refresh", "wait_for")])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(unexpected(status, response).await)
    }

    #[tracing::instrument(skip(self, query))]
    async fn query(&self, collection: &str, query: &SearchQuery) -> Result<Vec<OrderDocument>> {
        let response = self
            .client
            .post(self.search_url(collection))
            .json(&self.search_body(query))
            .send()
            .await?;

        let status = response.status();
        // No index yet means nothing has been projected.
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(unexpected(status, response).await);
        }

        let body = response.bytes().await?;
        parse_hits(&body)
    }
}
