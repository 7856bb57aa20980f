//! In-memory search index.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use domain::OrderDocument;

use crate::{Result, SearchError, SearchQuery, projector::SearchProjector};

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, BTreeMap<String, OrderDocument>>,
    fail_on_upsert: bool,
    fail_on_delete: bool,
    fail_on_query: bool,
}

/// In-memory search index for testing.
///
/// Queries are evaluated with [`SearchQuery::matches`]; results come back
/// oldest first.
#[derive(Debug, Clone, Default)]
pub struct InMemorySearchIndex {
    state: Arc<Mutex<State>>,
}

impl InMemorySearchIndex {
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures upserts to fail.
    pub fn set_fail_on_upsert(&self, fail: bool) {
        self.lock().fail_on_upsert = fail;
    }

    /// Configures deletes to fail.
    pub fn set_fail_on_delete(&self, fail: bool) {
        self.lock().fail_on_delete = fail;
    }

    /// Configures queries to fail.
    pub fn set_fail_on_query(&self, fail: bool) {
        self.lock().fail_on_query = fail;
    }

    /// Returns the stored document, if any.
    pub fn document(&self, collection: &str, id: &str) -> Option<OrderDocument> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Returns the number of documents in a collection.
    pub fn document_count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn switched_off(operation: &str) -> SearchError {
    SearchError::Unavailable(format!("in-memory index rejects {operation}"))
}

#[async_trait]
impl SearchProjector for InMemorySearchIndex {
    async fn upsert(&self, collection: &str, id: &str, doc: &OrderDocument) -> Result<()> {
        let mut state = self.lock();
        if state.fail_on_upsert {
            return Err(switched_off("upsert"));
        }

        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc.clone());
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_on_delete {
            return Err(switched_off("delete"));
        }

        if let Some(docs) = state.collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &SearchQuery) -> Result<Vec<OrderDocument>> {
        let state = self.lock();
        if state.fail_on_query {
            return Err(switched_off("query"));
        }

        let mut hits: Vec<OrderDocument> = state
            .collections
            .get(collection)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(hits)
    }
}
