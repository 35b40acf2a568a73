//! Configuration module for Pagekeep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pagekeep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagekeep.toml")).unwrap();
//! println!("Extraction API: {}", config.extraction.api_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BatchConfig, Config, ExtractionConfig, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
