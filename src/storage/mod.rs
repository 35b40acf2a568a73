//! Storage module for persisting saved items
//!
//! This module handles all database operations for the library, including:
//! - SQLite database initialization and schema management
//! - Saved item creation and status transitions
//! - Owner-scoped item lookup and listing
//! - Batch run bookkeeping and reconciliation queries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::ItemStatus;
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One saved URL and everything extracted from it
#[derive(Debug, Clone, PartialEq)]
pub struct SavedItem {
    pub id: Uuid,
    pub owner_id: String,
    pub url: String,
    pub status: ItemStatus,
    pub title: Option<String>,
    pub content: Option<String>,
    pub original_image: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub batch_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl SavedItem {
    /// Returns true if none of the extracted content fields are set
    pub fn has_no_content(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.original_image.is_none()
            && self.author.is_none()
            && self.published_at.is_none()
    }
}

/// Content fields written together with the `COMPLETED` status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemContent {
    pub title: Option<String>,
    pub content: Option<String>,
    pub original_image: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Filter applied when listing an owner's items
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Only return items in this status
    pub status: Option<ItemStatus>,
    /// Case-insensitive match against the title or any tag
    pub query: Option<String>,
}

impl ItemFilter {
    /// Returns true if the item passes this filter
    pub fn matches(&self, item: &SavedItem) -> bool {
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }

        match self.query.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(query) => {
                let needle = query.to_lowercase();
                item.title
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&needle))
                    || item.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Represents one `run_batch` invocation
#[derive(Debug, Clone)]
pub struct BatchRecord {
    pub id: i64,
    pub owner_id: String,
    pub total: u32,
    pub success_count: u32,
    pub failed_count: u32,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
}

/// Status of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Running,
    Completed,
    Cancelled,
}

impl BatchStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}
