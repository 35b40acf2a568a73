//! State module for tracking item lifecycles
//!
//! `ItemStatus` models the life of one submitted URL:
//!
//! ```text
//! PENDING ──> PROCESSING ──> COMPLETED
//!    │            │
//!    └────────────┴────────> FAILED
//! ```

mod item_status;

pub use item_status::ItemStatus;
