/// Item status definitions for tracking ingestion progress
///
/// This module defines every state a saved item can be in and the legal moves between them.
use serde::Serialize;
use std::fmt;

/// Represents the lifecycle state of a saved item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    // ===== Active States =====
    /// Record exists, extraction has not resolved yet
    Pending,

    /// Extraction is in flight (persisted only by single-URL imports)
    Processing,

    // ===== Terminal States =====
    /// Content was extracted and written
    Completed,

    /// Extraction or the success write failed
    Failed,
}

impl ItemStatus {
    /// Returns true if no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the item may still be processed
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the target state is reachable in one step
    ///
    /// Batch processing skips `Processing` and moves `Pending` straight to a terminal state.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Processing) => true,
            (Self::Pending | Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }

    /// Database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database representation (case-insensitive)
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all_states() -> [Self; 4] {
        [
            Self::Pending,
            Self::Processing,
            Self::Completed,
            Self::Failed,
        ]
    }

    /// States an item can be in before it resolves
    pub fn active_states() -> [Self; 2] {
        [Self::Pending, Self::Processing]
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
