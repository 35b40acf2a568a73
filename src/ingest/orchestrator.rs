//! Batch orchestration
//!
//! This module drives bulk imports, including:
//! - Validating a submitted batch before anything is written
//! - Recording the batch run and processing its URLs strictly in order
//! - Streaming one progress snapshot per URL to the caller
//! - Single-URL imports and reconciliation of items left behind by earlier runs

use crate::config::BatchConfig;
use crate::ingest::extractor::ContentExtractor;
use crate::ingest::pipeline::{with_storage, ItemFailure, ItemPipeline};
use crate::ingest::progress::{BatchSummary, ProgressSnapshot, ProgressStatus, ProgressStream};
use crate::storage::{BatchStatus, SavedItem, Storage, StorageError, StorageResult};
use crate::url::validate_batch;
use crate::PagekeepError;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Coordinates bulk and single-URL imports against a shared store and extractor
pub struct BatchOrchestrator<S> {
    storage: Arc<Mutex<S>>,
    extractor: Arc<dyn ContentExtractor>,
    config: BatchConfig,
    config_hash: String,
}

impl<S> Clone for BatchOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            extractor: Arc::clone(&self.extractor),
            config: self.config.clone(),
            config_hash: self.config_hash.clone(),
        }
    }
}

impl<S: Storage + Send + 'static> BatchOrchestrator<S> {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `storage` - The item store, shared with any other users
    /// * `extractor` - The content extractor used for every URL
    /// * `config` - Batch limits and failure handling settings
    pub fn new(
        storage: Arc<Mutex<S>>,
        extractor: Arc<dyn ContentExtractor>,
        config: BatchConfig,
    ) -> Self {
        Self {
            storage,
            extractor,
            config,
            config_hash: String::new(),
        }
    }

    /// Sets the configuration hash recorded on each batch run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// The shared store
    pub fn storage(&self) -> &Arc<Mutex<S>> {
        &self.storage
    }

    fn pipeline(
        &self,
        owner_id: &str,
        batch_id: Option<i64>,
        cancel: CancellationToken,
    ) -> ItemPipeline<S> {
        ItemPipeline {
            storage: Arc::clone(&self.storage),
            extractor: Arc::clone(&self.extractor),
            config: self.config.clone(),
            owner_id: owner_id.to_string(),
            batch_id,
            cancel,
        }
    }

    /// Starts a bulk import and returns its progress stream
    ///
    /// The whole list is validated first: an empty list, an oversized list or any malformed
    /// URL is rejected before a single record is written. Once accepted, the batch runs on a
    /// spawned task and yields exactly one snapshot per URL unless it is cancelled.
    ///
    /// Surrounding whitespace is trimmed from every URL before it is stored, extracted or
    /// echoed in a snapshot.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn run_batch(
        &self,
        urls: Vec<String>,
        owner_id: &str,
    ) -> Result<ProgressStream, PagekeepError> {
        let urls: Vec<String> = urls.into_iter().map(|u| u.trim().to_string()).collect();
        validate_batch(&urls)?;

        let limit = self.config.max_urls;
        if urls.len() > limit {
            return Err(PagekeepError::BatchTooLarge {
                size: urls.len(),
                limit,
            });
        }

        let total = urls.len();
        let batch_id = with_storage(&self.storage, |s| {
            s.create_batch(owner_id, total as u32, &self.config_hash)
        })?;

        tracing::info!(batch_id, owner_id = %owner_id, total, "Starting batch");

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        let pipeline = self.pipeline(owner_id, Some(batch_id), cancel.clone());

        tokio::spawn(run_worker(pipeline, urls, batch_id, tx));

        Ok(ProgressStream::new(rx, cancel, total, batch_id))
    }

    /// Imports a single URL and returns the stored item
    ///
    /// The item is marked `PROCESSING` while its content is extracted. Extraction and write
    /// failures still return the item as the store holds it (normally `FAILED`); only a failure
    /// to create the record is an error.
    pub async fn import_url(&self, url: &str, owner_id: &str) -> Result<SavedItem, PagekeepError> {
        let url = url.trim();
        crate::url::validate_url(url)
            .map_err(|source| PagekeepError::InvalidUrl { index: 0, source })?;

        let pipeline = self.pipeline(owner_id, None, CancellationToken::new());

        match pipeline.process(url, true).await {
            Ok(item) => {
                tracing::info!(item_id = %item.id, url = %url, "Imported URL");
                Ok(item)
            }
            Err(ItemFailure::Create(e)) => Err(e.into()),
            Err(failure @ (ItemFailure::Extraction { .. } | ItemFailure::Persist { .. })) => {
                tracing::warn!(url = %url, error = %failure, "Import failed");
                let id = failure.item_id().ok_or(PagekeepError::Storage(
                    StorageError::Database("failed item has no id".to_string()),
                ))?;
                Ok(with_storage(&self.storage, |s| s.get_item(id, owner_id))?)
            }
        }
    }

    /// Marks items left unfinished by earlier runs as `FAILED`
    ///
    /// Work older than `batch.stale-after-secs` counts as abandoned.
    pub fn reconcile_stale_items(&self, owner_id: &str) -> Result<Vec<SavedItem>, PagekeepError> {
        let cutoff = self.config.stale_cutoff(Utc::now());
        Ok(with_storage(&self.storage, |s| {
            reconcile_stale_items(s, owner_id, cutoff)
        })?)
    }
}

/// Marks items stuck in `PENDING` or `PROCESSING` as `FAILED`
///
/// Batch runs still `running` but started before `stale_before` are closed as `cancelled`
/// first. Then every non-terminal item of a finished run, and every non-terminal single
/// import created before `stale_before`, is failed. Returns the items that were updated.
/// Younger work is left alone.
pub fn reconcile_stale_items<S: Storage + ?Sized>(
    storage: &mut S,
    owner_id: &str,
    stale_before: DateTime<Utc>,
) -> StorageResult<Vec<SavedItem>> {
    for batch_id in storage.close_abandoned_batches(owner_id, stale_before)? {
        tracing::warn!(batch_id, owner_id = %owner_id, "Closed abandoned batch run");
    }

    let stale = storage.list_stale_items(owner_id, stale_before)?;

    let mut resolved = Vec::with_capacity(stale.len());
    for item in stale {
        let updated = storage.update_on_failure(item.id, owner_id)?;
        tracing::info!(item_id = %updated.id, url = %updated.url, "Reconciled stale item");
        resolved.push(updated);
    }

    Ok(resolved)
}

/// Producer side of a batch: processes URLs in order and sends one snapshot per URL
async fn run_worker<S: Storage>(
    pipeline: ItemPipeline<S>,
    urls: Vec<String>,
    batch_id: i64,
    tx: mpsc::Sender<ProgressSnapshot>,
) {
    let total = urls.len();
    let mut summary = BatchSummary::default();
    let mut cancelled = false;

    for (index, url) in urls.into_iter().enumerate() {
        if pipeline.cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let status = match pipeline.process(&url, false).await {
            Ok(item) => {
                tracing::debug!(item_id = %item.id, url = %url, "Item completed");
                ProgressStatus::Success
            }
            Err(failure) if failure.is_cancelled() => {
                tracing::info!(url = %url, "Batch cancelled during extraction");
                cancelled = true;
                break;
            }
            Err(failure) => {
                tracing::warn!(url = %url, error = %failure, "Item failed");
                ProgressStatus::Failed
            }
        };

        let snapshot = ProgressSnapshot {
            completed: index + 1,
            total,
            url,
            status,
        };
        summary.record(&snapshot);

        tokio::select! {
            sent = tx.send(snapshot) => {
                if sent.is_err() {
                    tracing::info!(batch_id, "Progress receiver dropped, stopping batch");
                    cancelled = index + 1 < total;
                    break;
                }
            }
            _ = pipeline.cancel.cancelled() => {
                tracing::info!(batch_id, "Batch cancelled while waiting for the receiver");
                cancelled = true;
                break;
            }
        }
    }

    let final_status = if cancelled {
        BatchStatus::Cancelled
    } else {
        BatchStatus::Completed
    };

    let finished = with_storage(&pipeline.storage, |s| {
        s.finish_batch(
            batch_id,
            final_status,
            summary.success_count as u32,
            summary.failed_count as u32,
        )
    });

    match finished {
        Ok(()) => tracing::info!(
            batch_id,
            status = final_status.to_db_string(),
            success = summary.success_count,
            failed = summary.failed_count,
            "Batch finished"
        ),
        Err(e) => tracing::error!(batch_id, error = %e, "Failed to record batch result"),
    }
}
