//! URL handling module for Pagekeep
//!
//! Submitted URLs are validated but stored exactly as the caller supplied them, so the
//! progress stream can echo them back verbatim.

mod validate;

pub use validate::{validate_batch, validate_url};
