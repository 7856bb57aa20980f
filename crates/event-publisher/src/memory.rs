//! In-memory event publisher.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use domain::{LifecycleEvent, Topic};

use crate::{PublishError, Result, publisher::EventPublisher};

#[derive(Debug, Default)]
struct State {
    events: Vec<LifecycleEvent>,
    fail: bool,
}

/// In-memory publisher for testing.
///
/// Records every accepted event in emission order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<Mutex<State>>,
}

impl InMemoryEventPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to reject every emit call.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    /// Returns all accepted events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.lock().events.clone()
    }

    /// Returns the accepted events for one topic.
    pub fn events_for(&self, topic: Topic) -> Vec<LifecycleEvent> {
        self.lock()
            .events
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Returns the number of accepted events.
    pub fn event_count(&self) -> usize {
        self.lock().events.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn emit(&self, event: &LifecycleEvent) -> Result<()> {
        let mut state = self.lock();

        if state.fail {
            return Err(PublishError::Unavailable(
                "in-memory bus switched off".to_string(),
            ));
        }

        state.events.push(event.clone());
        Ok(())
    }
}
