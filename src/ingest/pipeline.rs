//! Per-item ingestion step
//!
//! One call to `ItemPipeline::process` takes a URL from record creation to a terminal state
//! and reports the result as a typed `Result`. The batch loop and single-URL imports both
//! run through here.

use crate::config::BatchConfig;
use crate::ingest::extractor::{ContentExtractor, ExtractionError, ExtractionResult};
use crate::ingest::normalize::normalize_extraction;
use crate::storage::{SavedItem, Storage, StorageError, StorageResult};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a single item did not reach `COMPLETED`
#[derive(Debug, Error)]
pub enum ItemFailure {
    #[error("Failed to create item: {0}")]
    Create(#[source] StorageError),

    #[error("Extraction failed for item {id}: {source}")]
    Extraction { id: Uuid, source: ExtractionError },

    #[error("Failed to persist item {id}: {source}")]
    Persist { id: Uuid, source: StorageError },
}

impl ItemFailure {
    /// Id of the record, if one was created
    pub fn item_id(&self) -> Option<Uuid> {
        match self {
            Self::Create(_) => None,
            Self::Extraction { id, .. } | Self::Persist { id, .. } => Some(*id),
        }
    }

    /// True when the item was interrupted by cancellation rather than failing on its own
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Extraction {
                source: ExtractionError::Cancelled,
                ..
            }
        )
    }
}

/// Runs `op` against the shared store without holding the lock across an await
pub(crate) fn with_storage<S, T>(
    storage: &Mutex<S>,
    op: impl FnOnce(&mut S) -> StorageResult<T>,
) -> StorageResult<T> {
    let mut guard = storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))?;
    op(&mut guard)
}

/// Everything needed to process items for one owner
pub(crate) struct ItemPipeline<S> {
    pub storage: Arc<Mutex<S>>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub config: BatchConfig,
    pub owner_id: String,
    pub batch_id: Option<i64>,
    pub cancel: CancellationToken,
}

impl<S: Storage> ItemPipeline<S> {
    /// Processes one URL end to end
    ///
    /// `persist_processing` records the intermediate `PROCESSING` state before extracting.
    pub async fn process(
        &self,
        url: &str,
        persist_processing: bool,
    ) -> Result<SavedItem, ItemFailure> {
        let item = with_storage(&self.storage, |s| {
            s.create_item(url, &self.owner_id, self.batch_id)
        })
        .map_err(ItemFailure::Create)?;
        let id = item.id;

        tracing::debug!(item_id = %id, url = %url, "Created item");

        if persist_processing {
            let marked = with_storage(&self.storage, |s| s.mark_processing(id, &self.owner_id));
            if let Err(source) = marked {
                self.mark_failed(id).await;
                return Err(ItemFailure::Persist { id, source });
            }
        }

        let result = match self.extract(url).await {
            Ok(result) => result,
            Err(source) => {
                self.mark_failed(id).await;
                return Err(ItemFailure::Extraction { id, source });
            }
        };

        let content = normalize_extraction(result);

        match with_storage(&self.storage, |s| {
            s.update_on_success(id, &self.owner_id, &content)
        }) {
            Ok(updated) => Ok(updated),
            Err(source) => {
                self.mark_failed(id).await;
                Err(ItemFailure::Persist { id, source })
            }
        }
    }

    /// Calls the extractor, bounded by the per-item timeout and the cancellation token
    ///
    /// A panicking extractor fails only the current item.
    async fn extract(&self, url: &str) -> Result<ExtractionResult, ExtractionError> {
        let call = AssertUnwindSafe(self.extractor.extract(url))
            .catch_unwind()
            .map(|caught| caught.unwrap_or_else(|payload| Err(panic_error(payload))));

        let bounded = async {
            match self.config.item_timeout_secs {
                Some(secs) => {
                    let limit = Duration::from_secs(secs);
                    match tokio::time::timeout(limit, call).await {
                        Ok(result) => result,
                        Err(_) => Err(ExtractionError::Timeout(limit)),
                    }
                }
                None => call.await,
            }
        };

        tokio::select! {
            result = bounded => result,
            _ = self.cancel.cancelled() => Err(ExtractionError::Cancelled),
        }
    }

    /// Best-effort write of the `FAILED` status, retried up to the configured attempts
    ///
    /// Returns false when the store still holds a non-terminal status for the item.
    pub async fn mark_failed(&self, id: Uuid) -> bool {
        let attempts = self.config.failure_mark_attempts.max(1);

        for attempt in 1..=attempts {
            match with_storage(&self.storage, |s| s.update_on_failure(id, &self.owner_id)) {
                Ok(_) => return true,
                Err(e @ (StorageError::InvalidTransition { .. } | StorageError::ItemNotFound(_))) => {
                    tracing::error!(item_id = %id, error = %e, "Cannot mark item as failed");
                    return false;
                }
                Err(e) => {
                    tracing::warn!(
                        item_id = %id,
                        attempt,
                        attempts,
                        error = %e,
                        "Failed to mark item as failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                    }
                }
            }
        }

        tracing::error!(
            item_id = %id,
            "Item left in a non-terminal state; run reconciliation to resolve it"
        );
        false
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> ExtractionError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(error = %message, "Extractor panicked");
    ExtractionError::Panicked(message)
}
