//! Invocation-scoped trace collection
//!
//! Each task invocation runs inside its own [`TraceCollector`] scope, held in
//! task-local storage. [`report_trace`] appends to whichever scope is current,
//! so concurrently running rows never see each other's traces.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use super::event::TraceEvent;
use crate::error::{EvalError, Result};

tokio::task_local! {
    static CURRENT_COLLECTOR: TraceCollector;
}

/// Buffer of traces reported during one task invocation
///
/// Clones share the same buffer. A task that spawns its own tokio tasks
/// leaves the task-local scope behind; it can grab [`TraceCollector::current`]
/// first and move the handle into the spawned work.
#[derive(Debug, Clone, Default)]
pub struct TraceCollector {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// The collector of the invocation currently executing, if any
    pub fn current() -> Option<TraceCollector> {
        CURRENT_COLLECTOR.try_with(|collector| collector.clone()).ok()
    }

    /// Append a trace; report order is preserved
    pub fn report(&self, event: TraceEvent) {
        tracing::debug!(
            start = event.start,
            end = event.end,
            has_usage = event.usage.is_some(),
            "Trace reported"
        );
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Number of traces buffered
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been reported
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every buffered trace and reset the buffer
    pub fn drain(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run `fut` with this collector as the current scope
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT_COLLECTOR.scope(self.clone(), fut).await
    }

    /// Run `fut` in a fresh scope and return its output with the traces it reported
    pub async fn collect<F: Future>(fut: F) -> (F::Output, Vec<TraceEvent>) {
        let collector = TraceCollector::new();
        let output = collector.scope(fut).await;
        (output, collector.drain())
    }
}

/// Report a trace from inside a task.
///
/// # Errors
///
/// Returns [`EvalError::NoTraceScope`] when called outside a task invocation;
/// the trace is dropped rather than attributed to an unrelated row.
pub fn report_trace(event: TraceEvent) -> Result<()> {
    CURRENT_COLLECTOR
        .try_with(|collector| collector.report(event))
        .map_err(|_| {
            tracing::warn!("report_trace called outside of a task invocation; trace dropped");
            EvalError::NoTraceScope
        })
}
