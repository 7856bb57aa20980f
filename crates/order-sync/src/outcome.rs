//! Partial-success results of order mutations.

/// A downstream step of a mutation, run after the store commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStep {
    /// Emitting the lifecycle event.
    Publish,
    /// Writing or removing the search document.
    Project,
    /// Marking the outbox entry as delivered.
    Acknowledge,
}

impl SyncStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStep::Publish => "publish",
            SyncStep::Project => "project",
            SyncStep::Acknowledge => "acknowledge",
        }
    }
}

impl std::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a downstream step did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The collaborator returned an error.
    Unavailable(String),
    /// The step was skipped because the caller cancelled.
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Unavailable(reason) => write!(f, "unavailable: {reason}"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A downstream step that failed or was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamFailure {
    pub step: SyncStep,
    pub reason: FailureReason,
}

impl DownstreamFailure {
    pub fn new(step: SyncStep, reason: FailureReason) -> Self {
        Self { step, reason }
    }
}

impl std::fmt::Display for DownstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.step, self.reason)
    }
}

/// The committed value of a mutation plus any downstream failures.
///
/// The store write has always happened when a `Synced` is returned. An
/// empty `downstream` list means the event bus and the search index are in
/// step with it; otherwise the outbox relay will repair them later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced<T> {
    pub value: T,
    pub downstream: Vec<DownstreamFailure>,
}

impl<T> Synced<T> {
    pub fn new(value: T, downstream: Vec<DownstreamFailure>) -> Self {
        Self { value, downstream }
    }

    /// Returns true if every downstream step completed.
    pub fn is_fully_synced(&self) -> bool {
        self.downstream.is_empty()
    }

    /// Returns true if the given step failed or was skipped.
    pub fn failed(&self, step: SyncStep) -> bool {
        self.downstream.iter().any(|f| f.step == step)
    }
}
