//! Common error types for riffloop
//!
//! One taxonomy across the workspace: configuration errors, time-base
//! errors, asset errors, and render errors are all fatal and carry the
//! offending identifier (song id, part index, stem name) in their message.

use thiserror::Error;

/// Common result type for riffloop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the composers, render driver and writers
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing plan data (invalid repeat count, empty part list)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Degenerate tick ranges (end <= start after quantization, rescale
    /// producing an empty range)
    #[error("Time-base error: {0}")]
    TimeBase(String),

    /// Unreadable or missing source asset (stem metadata, source file)
    #[error("Asset error: {0}")]
    Asset(String),

    /// External render task failure, reported with the stem name and the
    /// attempted operation plan
    #[error("Render error: {0}")]
    Render(String),

    /// Referenced song id or section name does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}
