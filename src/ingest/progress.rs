//! Progress channel between a running batch and its consumer
//!
//! A `ProgressStream` yields exactly one `ProgressSnapshot` per submitted URL, in submission
//! order, and then ends. Dropping it (or calling `cancel`) stops the batch.

use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Outcome of one item, as seen by the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Success,
    Failed,
}

/// One resolved step of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Items resolved so far, starting at 1
    pub completed: usize,
    /// Size of the batch
    pub total: usize,
    /// The URL that was just resolved
    pub url: String,
    /// How that single URL went
    pub status: ProgressStatus,
}

/// Success/failure tally folded from a batch's snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub success_count: usize,
    pub failed_count: usize,
}

impl BatchSummary {
    /// Folds a sequence of snapshots into a summary
    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a ProgressSnapshot>) -> Self {
        snapshots.into_iter().fold(Self::default(), |mut acc, s| {
            acc.record(s);
            acc
        })
    }

    /// Adds one snapshot to the tally
    pub fn record(&mut self, snapshot: &ProgressSnapshot) {
        match snapshot.status {
            ProgressStatus::Success => self.success_count += 1,
            ProgressStatus::Failed => self.failed_count += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failed_count
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count == 0
    }

    /// Human-readable result line for the end of an import
    pub fn message(&self) -> String {
        if self.all_succeeded() {
            format!("Imported {} URLs", self.success_count)
        } else {
            format!(
                "Imported {} URLs and {} imports failed",
                self.success_count, self.failed_count
            )
        }
    }
}

/// Receiving end of a running batch
///
/// Implements `Stream<Item = ProgressSnapshot>`; `next_snapshot` offers the same
/// sequence without pulling in stream combinators.
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressSnapshot>,
    cancel: CancellationToken,
    _guard: DropGuard,
    total: usize,
    batch_id: i64,
}

impl ProgressStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<ProgressSnapshot>,
        cancel: CancellationToken,
        total: usize,
        batch_id: i64,
    ) -> Self {
        let guard = cancel.clone().drop_guard();
        Self {
            rx,
            cancel,
            _guard: guard,
            total,
            batch_id,
        }
    }

    /// Number of snapshots this stream will yield if it runs to completion
    pub fn total(&self) -> usize {
        self.total
    }

    /// Id of the persisted batch run
    pub fn batch_id(&self) -> i64 {
        self.batch_id
    }

    /// Waits for the next snapshot; `None` once the batch is done
    pub async fn next_snapshot(&mut self) -> Option<ProgressSnapshot> {
        self.rx.recv().await
    }

    /// Stops the batch: the in-flight item is aborted and no further items start
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drains the stream and returns the final tally
    pub async fn summarize(mut self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        while let Some(snapshot) = self.next_snapshot().await {
            summary.record(&snapshot);
        }
        summary
    }
}

impl Stream for ProgressStream {
    type Item = ProgressSnapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
