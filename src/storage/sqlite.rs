//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::ItemStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{BatchRecord, BatchStatus, ItemContent, ItemFilter, SavedItem};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

const ITEM_COLUMNS: &str = "id, owner_id, url, status, title, content, original_image, author,
     published_at, summary, tags, batch_id, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (tests and throwaway runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Builds the error for an update whose WHERE clause matched nothing
    fn rejected(&self, id: Uuid, owner_id: &str, to: ItemStatus) -> StorageError {
        match self.get_item(id, owner_id) {
            Ok(item) => StorageError::InvalidTransition {
                from: item.status,
                to,
            },
            Err(e) => e,
        }
    }
}

/// SQL list of the statuses allowed to move into `to`
fn allowed_sources(to: ItemStatus) -> String {
    ItemStatus::all_states()
        .into_iter()
        .filter(|s| s.can_transition_to(to))
        .map(|s| format!("'{}'", s.to_db_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<SavedItem> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    let status: String = row.get(3)?;
    let status = ItemStatus::from_db_string(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown item status '{}'", status).into(),
        )
    })?;

    let tags: String = row.get(10)?;
    let tags: Vec<String> = serde_json::from_str(&tags)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(SavedItem {
        id,
        owner_id: row.get(1)?,
        url: row.get(2)?,
        status,
        title: row.get(4)?,
        content: row.get(5)?,
        original_image: row.get(6)?,
        author: row.get(7)?,
        published_at: row.get(8)?,
        summary: row.get(9)?,
        tags,
        batch_id: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<BatchRecord> {
    let status: String = row.get(8)?;
    Ok(BatchRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        total: row.get(2)?,
        success_count: row.get(3)?,
        failed_count: row.get(4)?,
        config_hash: row.get(5)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        status: BatchStatus::from_db_string(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                Type::Text,
                format!("unknown batch status '{}'", status).into(),
            )
        })?,
    })
}

impl Storage for SqliteStorage {
    // ===== Item Lifecycle =====

    fn create_item(
        &mut self,
        url: &str,
        owner_id: &str,
        batch_id: Option<i64>,
    ) -> StorageResult<SavedItem> {
        let id = Uuid::new_v4();
        let now: DateTime<Utc> = Utc::now();

        self.conn.execute(
            "INSERT INTO saved_items (id, owner_id, url, status, batch_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                owner_id,
                url,
                ItemStatus::Pending.to_db_string(),
                batch_id,
                now
            ],
        )?;

        self.get_item(id, owner_id)
    }

    fn mark_processing(&mut self, id: Uuid, owner_id: &str) -> StorageResult<SavedItem> {
        let to = ItemStatus::Processing;
        let changed = self.conn.execute(
            &format!(
                "UPDATE saved_items SET status = ?1
                 WHERE id = ?2 AND owner_id = ?3 AND status IN ({})",
                allowed_sources(to)
            ),
            params![to.to_db_string(), id.to_string(), owner_id],
        )?;

        if changed == 0 {
            return Err(self.rejected(id, owner_id, to));
        }
        self.get_item(id, owner_id)
    }

    fn update_on_success(
        &mut self,
        id: Uuid,
        owner_id: &str,
        content: &ItemContent,
    ) -> StorageResult<SavedItem> {
        let to = ItemStatus::Completed;
        let changed = self.conn.execute(
            &format!(
                "UPDATE saved_items SET status = ?1, title = ?2, content = ?3,
                 original_image = ?4, author = ?5, published_at = ?6
                 WHERE id = ?7 AND owner_id = ?8 AND status IN ({})",
                allowed_sources(to)
            ),
            params![
                to.to_db_string(),
                content.title,
                content.content,
                content.original_image,
                content.author,
                content.published_at,
                id.to_string(),
                owner_id
            ],
        )?;

        if changed == 0 {
            return Err(self.rejected(id, owner_id, to));
        }
        self.get_item(id, owner_id)
    }

    fn update_on_failure(&mut self, id: Uuid, owner_id: &str) -> StorageResult<SavedItem> {
        let to = ItemStatus::Failed;
        let changed = self.conn.execute(
            &format!(
                "UPDATE saved_items SET status = ?1, title = NULL, content = NULL,
                 original_image = NULL, author = NULL, published_at = NULL
                 WHERE id = ?2 AND owner_id = ?3 AND status IN ({})",
                allowed_sources(to)
            ),
            params![to.to_db_string(), id.to_string(), owner_id],
        )?;

        if changed == 0 {
            return Err(self.rejected(id, owner_id, to));
        }
        self.get_item(id, owner_id)
    }

    // ===== Item Queries =====

    fn get_item(&self, id: Uuid, owner_id: &str) -> StorageResult<SavedItem> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM saved_items WHERE id = ?1 AND owner_id = ?2",
                    ITEM_COLUMNS
                ),
                params![id.to_string(), owner_id],
                item_from_row,
            )
            .optional()?;

        item.ok_or(StorageError::ItemNotFound(id))
    }

    fn list_items(&self, owner_id: &str, filter: &ItemFilter) -> StorageResult<Vec<SavedItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM saved_items
             WHERE owner_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, rowid DESC",
            ITEM_COLUMNS
        ))?;

        let status = filter.status.map(|s| s.to_db_string());
        let items = stmt
            .query_map(params![owner_id, status], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items.into_iter().filter(|i| filter.matches(i)).collect())
    }

    fn count_items_by_status(&self, owner_id: &str, status: ItemStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM saved_items WHERE owner_id = ?1 AND status = ?2",
            params![owner_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Batch Runs =====

    fn create_batch(
        &mut self,
        owner_id: &str,
        total: u32,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now: DateTime<Utc> = Utc::now();
        self.conn.execute(
            "INSERT INTO batches (owner_id, total, config_hash, started_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                owner_id,
                total,
                config_hash,
                now,
                BatchStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_batch(
        &mut self,
        batch_id: i64,
        status: BatchStatus,
        success_count: u32,
        failed_count: u32,
    ) -> StorageResult<()> {
        let now: DateTime<Utc> = Utc::now();
        let changed = self.conn.execute(
            "UPDATE batches SET status = ?1, success_count = ?2, failed_count = ?3,
             finished_at = ?4 WHERE id = ?5",
            params![
                status.to_db_string(),
                success_count,
                failed_count,
                now,
                batch_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::BatchNotFound(batch_id));
        }
        Ok(())
    }

    fn get_batch(&self, batch_id: i64, owner_id: &str) -> StorageResult<BatchRecord> {
        let batch = self
            .conn
            .query_row(
                "SELECT id, owner_id, total, success_count, failed_count, config_hash,
                 started_at, finished_at, status FROM batches WHERE id = ?1 AND owner_id = ?2",
                params![batch_id, owner_id],
                batch_from_row,
            )
            .optional()?;

        batch.ok_or(StorageError::BatchNotFound(batch_id))
    }

    fn close_abandoned_batches(
        &mut self,
        owner_id: &str,
        started_before: DateTime<Utc>,
    ) -> StorageResult<Vec<i64>> {
        let tx = self.conn.transaction()?;

        let ids = {
            let mut stmt = tx.prepare(
                "SELECT id FROM batches
                 WHERE owner_id = ?1 AND status = ?2 AND started_at < ?3
                 ORDER BY id ASC",
            )?;
            let ids = stmt
                .query_map(
                    params![
                        owner_id,
                        BatchStatus::Running.to_db_string(),
                        started_before
                    ],
                    |row| row.get::<_, i64>(0),
                )?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let now: DateTime<Utc> = Utc::now();
        for id in &ids {
            tx.execute(
                "UPDATE batches SET status = ?1, finished_at = ?2,
                 success_count = (SELECT COUNT(*) FROM saved_items
                                  WHERE batch_id = ?3 AND status = ?4),
                 failed_count = (SELECT COUNT(*) FROM saved_items
                                 WHERE batch_id = ?3 AND status = ?5)
                 WHERE id = ?3",
                params![
                    BatchStatus::Cancelled.to_db_string(),
                    now,
                    id,
                    ItemStatus::Completed.to_db_string(),
                    ItemStatus::Failed.to_db_string()
                ],
            )?;
        }

        tx.commit()?;
        Ok(ids)
    }

    fn list_stale_items(
        &self,
        owner_id: &str,
        created_before: DateTime<Utc>,
    ) -> StorageResult<Vec<SavedItem>> {
        let active = ItemStatus::active_states()
            .iter()
            .map(|s| format!("'{}'", s.to_db_string()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM saved_items
             WHERE owner_id = ?1 AND status IN ({})
             AND (batch_id IN (SELECT id FROM batches WHERE status != ?2)
                  OR (batch_id IS NULL AND created_at < ?3))
             ORDER BY created_at ASC, rowid ASC",
            ITEM_COLUMNS, active
        ))?;

        let items = stmt
            .query_map(
                params![
                    owner_id,
                    BatchStatus::Running.to_db_string(),
                    created_before
                ],
                item_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }
}
