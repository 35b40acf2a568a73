//! Statistics generation from the library database
//!
//! This module provides functionality for counting an owner's items by status and
//! displaying the result.

use crate::state::ItemStatus;
use crate::storage::Storage;
use crate::PagekeepError;
use serde::Serialize;
use std::collections::HashMap;

/// Per-owner library statistics
#[derive(Debug, Clone, Serialize)]
pub struct LibraryStatistics {
    /// Total number of saved items
    pub total_items: u64,

    /// Count of items by status
    pub items_by_status: HashMap<ItemStatus, u64>,
}

impl LibraryStatistics {
    /// Count for one status, zero if absent
    pub fn count(&self, status: ItemStatus) -> u64 {
        self.items_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Items still waiting on, or in the middle of, extraction
    pub fn in_flight(&self) -> u64 {
        ItemStatus::active_states()
            .iter()
            .map(|s| self.count(*s))
            .sum()
    }

    /// Share of terminal items that completed, as a percentage
    pub fn success_rate(&self) -> f64 {
        let completed = self.count(ItemStatus::Completed);
        let terminal = completed + self.count(ItemStatus::Failed);
        if terminal == 0 {
            0.0
        } else {
            (completed as f64 / terminal as f64) * 100.0
        }
    }
}

/// Loads statistics for one owner from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `owner_id` - Whose items to count
pub fn load_statistics(
    storage: &dyn Storage,
    owner_id: &str,
) -> Result<LibraryStatistics, PagekeepError> {
    let mut items_by_status = HashMap::new();
    let mut total_items = 0;

    for status in ItemStatus::all_states() {
        let count = storage.count_items_by_status(owner_id, status)?;
        total_items += count;
        if count > 0 {
            items_by_status.insert(status, count);
        }
    }

    Ok(LibraryStatistics {
        total_items,
        items_by_status,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &LibraryStatistics) {
    println!("=== Library Statistics ===\n");

    println!("Total items: {}", stats.total_items);
    println!();

    println!("Items by Status:");
    for status in ItemStatus::all_states() {
        let count = stats.count(status);
        let percentage = if stats.total_items > 0 {
            (count as f64 / stats.total_items as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if stats.in_flight() > 0 {
        println!(
            "{} items are not finished; run `reconcile` if no import is running",
            stats.in_flight()
        );
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} finished imports)",
        stats.success_rate(),
        stats.count(ItemStatus::Completed),
        stats.count(ItemStatus::Completed) + stats.count(ItemStatus::Failed)
    );
}
