//! Fetch worker, one per pool slot.
//!
//! A worker cycles `Idle → Fetching → Classifying → Publishing → Idle` until
//! its cancellation token fires while it is waiting for work. Cancellation
//! is only observed in `Idle`: a request in flight always completes or times
//! out first, and its record is always published.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::classifier::classify;
use crate::error::{QueueError, Result};
use crate::fetcher::Fetcher;
use crate::queue::{SinkQueue, WorkQueue};
use crate::types::Event;

/// Lifecycle state of a fetch worker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the next target
    Idle,
    /// Request in flight
    Fetching,
    /// Turning the outcome into a record
    Classifying,
    /// Handing the record to the writer
    Publishing,
    /// Stopped; terminal
    Cancelled,
}

impl WorkerState {
    /// Lowercase label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Fetching => "fetching",
            WorkerState::Classifying => "classifying",
            WorkerState::Publishing => "publishing",
            WorkerState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a fetch worker needs, bundled to keep the spawn site short
pub(crate) struct WorkerContext {
    pub(crate) index: usize,
    pub(crate) work_queue: Arc<WorkQueue>,
    pub(crate) sink_queue: Arc<SinkQueue>,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) cancel_token: CancellationToken,
}

/// What a worker did before it stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WorkerReport {
    pub(crate) index: usize,
    pub(crate) fetched: usize,
    pub(crate) final_state: WorkerState,
}

struct StateTracker {
    worker: usize,
    state: WorkerState,
}

impl StateTracker {
    fn enter(&mut self, next: WorkerState) {
        tracing::trace!(
            worker = self.worker,
            from = %self.state,
            to = %next,
            "worker state change"
        );
        self.state = next;
    }
}

/// Run one fetch worker until cancelled
///
/// # Errors
///
/// Only queue misuse surfaces here; fetch failures are published as records.
pub(crate) async fn run_fetch_worker(ctx: WorkerContext) -> Result<WorkerReport> {
    let WorkerContext {
        index,
        work_queue,
        sink_queue,
        fetcher,
        event_tx,
        cancel_token,
    } = ctx;

    let mut tracker = StateTracker {
        worker: index,
        state: WorkerState::Idle,
    };
    let mut fetched = 0usize;

    tracing::debug!(worker = index, "fetch worker started");

    loop {
        let target = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            item = work_queue.get() => match item {
                Ok(target) => target,
                Err(QueueError::Closed) => break,
                Err(e) => return Err(e.into()),
            },
        };

        tracker.enter(WorkerState::Fetching);
        let started = Instant::now();
        let outcome = fetcher.fetch(&target).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracker.enter(WorkerState::Classifying);
        let record = classify(&target, &outcome);
        if record.is_reachable() {
            tracing::debug!(
                worker = index,
                url = %record.url,
                status_code = record.status_code,
                elapsed_ms,
                "fetched"
            );
        } else {
            tracing::warn!(
                worker = index,
                url = %record.url,
                outcome = ?outcome,
                elapsed_ms,
                "target unreachable"
            );
        }

        tracker.enter(WorkerState::Publishing);
        event_tx
            .send(Event::Fetched {
                worker: index,
                record: record.clone(),
                elapsed_ms,
            })
            .ok();
        let published = sink_queue.put(record).await;
        // Always settle the work item so the orchestrator's join cannot hang
        work_queue.mark_done()?;
        published?;
        fetched += 1;

        tracker.enter(WorkerState::Idle);
    }

    tracker.enter(WorkerState::Cancelled);
    tracing::debug!(worker = index, fetched, "fetch worker stopped");

    Ok(WorkerReport {
        index,
        fetched,
        final_state: tracker.state,
    })
}
