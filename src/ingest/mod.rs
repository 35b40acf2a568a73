//! Ingestion module for turning URLs into saved items
//!
//! This module handles everything between a submitted URL and a terminal item, including:
//! - The extractor contract and its Firecrawl implementation
//! - Normalizing extracted fields before they are stored
//! - The per-item pipeline and the batch orchestrator
//! - The progress stream handed back to callers

mod extractor;
mod firecrawl;
mod normalize;
mod orchestrator;
mod pipeline;
mod progress;

pub use extractor::{ContentExtractor, ExtractionError, ExtractionResult};
pub use firecrawl::{build_http_client, FirecrawlExtractor};
pub use normalize::{normalize_extraction, parse_published_at};
pub use orchestrator::{reconcile_stale_items, BatchOrchestrator};
pub use pipeline::ItemFailure;
pub use progress::{BatchSummary, ProgressSnapshot, ProgressStatus, ProgressStream};
