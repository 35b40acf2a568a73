//! Output module for presenting library contents
//!
//! This module handles:
//! - One-line listings of saved items
//! - Detailed views of a single item
//! - Library statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, LibraryStatistics};

use crate::storage::SavedItem;

/// Longest title shown in a one-line listing
const MAX_LISTING_TITLE: usize = 60;

/// Formats an item as a single listing line
pub fn format_item_line(item: &SavedItem) -> String {
    let title = item.title.as_deref().unwrap_or("(untitled)");
    let title = if title.chars().count() > MAX_LISTING_TITLE {
        let cut: String = title.chars().take(MAX_LISTING_TITLE - 3).collect();
        format!("{}...", cut)
    } else {
        title.to_string()
    };

    format!(
        "{}  {:<10}  {}  {}",
        item.id,
        item.status.to_db_string(),
        title,
        item.url
    )
}

/// Formats every stored field of an item for display
pub fn format_item_details(item: &SavedItem) -> String {
    let mut out = String::new();

    out.push_str(&format!("ID:         {}\n", item.id));
    out.push_str(&format!("URL:        {}\n", item.url));
    out.push_str(&format!("Status:     {}\n", item.status));
    out.push_str(&format!("Saved:      {}\n", item.created_at.to_rfc3339()));
    if let Some(batch_id) = item.batch_id {
        out.push_str(&format!("Batch:      {}\n", batch_id));
    }
    if let Some(title) = &item.title {
        out.push_str(&format!("Title:      {}\n", title));
    }
    if let Some(author) = &item.author {
        out.push_str(&format!("Author:     {}\n", author));
    }
    if let Some(published) = &item.published_at {
        out.push_str(&format!("Published:  {}\n", published.to_rfc3339()));
    }
    if let Some(image) = &item.original_image {
        out.push_str(&format!("Image:      {}\n", image));
    }
    if !item.tags.is_empty() {
        out.push_str(&format!("Tags:       {}\n", item.tags.join(", ")));
    }
    if let Some(summary) = &item.summary {
        out.push_str(&format!("\n{}\n", summary));
    }
    if let Some(content) = &item.content {
        out.push_str(&format!("\n{}\n", content));
    }

    out
}
