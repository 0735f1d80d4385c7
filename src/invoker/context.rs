use crate::timeseries::Window;
use chrono::{DateTime, Utc};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Per-invocation values handed to sources, transformers and sinks.
///
/// `started_at` is read from the invoker's clock once; collaborators use it
/// instead of consulting the wall clock themselves.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    id: Uuid,
    collector_name: String,
    started_at: DateTime<Utc>,
    window: Option<Window>,
    cancel: CancellationToken,
}

impl InvocationContext {
    pub fn new(
        collector_name: impl Into<String>,
        started_at: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collector_name: collector_name.into(),
            started_at,
            window: None,
            cancel,
        }
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn collector_name(&self) -> &str {
        &self.collector_name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the invocation has been cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
