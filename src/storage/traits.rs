//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::ItemStatus;
use crate::storage::{BatchRecord, BatchStatus, ItemContent, ItemFilter, SavedItem};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Batch not found: {0}")]
    BatchNotFound(i64),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every item operation is scoped by `owner_id`: an id that exists but belongs to someone
/// else is reported exactly like a missing one.
pub trait Storage {
    // ===== Item Lifecycle =====

    /// Creates a new item in the `PENDING` state
    ///
    /// # Arguments
    ///
    /// * `url` - The URL as submitted by the caller
    /// * `owner_id` - The submitting principal
    /// * `batch_id` - The batch run creating this item, if any
    fn create_item(
        &mut self,
        url: &str,
        owner_id: &str,
        batch_id: Option<i64>,
    ) -> StorageResult<SavedItem>;

    /// Moves a `PENDING` item to `PROCESSING`
    fn mark_processing(&mut self, id: Uuid, owner_id: &str) -> StorageResult<SavedItem>;

    /// Writes extracted content and `COMPLETED` in a single statement
    fn update_on_success(
        &mut self,
        id: Uuid,
        owner_id: &str,
        content: &ItemContent,
    ) -> StorageResult<SavedItem>;

    /// Sets `FAILED` and clears every content field in a single statement
    fn update_on_failure(&mut self, id: Uuid, owner_id: &str) -> StorageResult<SavedItem>;

    // ===== Item Queries =====

    /// Gets an item by id
    fn get_item(&self, id: Uuid, owner_id: &str) -> StorageResult<SavedItem>;

    /// Lists an owner's items, newest first
    fn list_items(&self, owner_id: &str, filter: &ItemFilter) -> StorageResult<Vec<SavedItem>>;

    /// Counts an owner's items in a given status
    fn count_items_by_status(&self, owner_id: &str, status: ItemStatus) -> StorageResult<u64>;

    // ===== Batch Runs =====

    /// Records the start of a batch run and returns its id
    fn create_batch(&mut self, owner_id: &str, total: u32, config_hash: &str)
        -> StorageResult<i64>;

    /// Records the final status and counts of a batch run
    fn finish_batch(
        &mut self,
        batch_id: i64,
        status: BatchStatus,
        success_count: u32,
        failed_count: u32,
    ) -> StorageResult<()>;

    /// Gets one of an owner's batch runs by id
    fn get_batch(&self, batch_id: i64, owner_id: &str) -> StorageResult<BatchRecord>;

    /// Marks an owner's batch runs still `running` but started before `started_before` as
    /// `cancelled`, and returns their ids
    ///
    /// The counts are taken from the items' current statuses.
    fn close_abandoned_batches(
        &mut self,
        owner_id: &str,
        started_before: DateTime<Utc>,
    ) -> StorageResult<Vec<i64>>;

    /// Gets non-terminal items nothing is working on any more, oldest first
    ///
    /// These are items of batch runs which are no longer running, and single imports
    /// created before `created_before`.
    fn list_stale_items(
        &self,
        owner_id: &str,
        created_before: DateTime<Utc>,
    ) -> StorageResult<Vec<SavedItem>>;
}
