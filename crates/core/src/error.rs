//! Error types for chumon operations.
//!
//! [`ChumonError`] covers everything that aborts an operation outright:
//! bad input, configuration problems, HTTP client construction and
//! workbook persistence. Per-query outcomes that a batch keeps going
//! through are plain values instead, see [`FetchFailure`] and
//! [`Rejection`].
//!
//! # Example
//!
//! ```rust
//! use chumon_core::{ChumonError, Result};
//!
//! fn sheet_name(raw: &str) -> Result<&str> {
//!     if raw.trim().is_empty() {
//!         return Err(ChumonError::ConfigError("sheet name is empty".to_string()));
//!     }
//!     Ok(raw.trim())
//! }
//! # assert!(sheet_name(" ").is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for chumon.
#[derive(Error, Debug)]
pub enum ChumonError {
    /// HTTP client errors from reqwest that are not tied to a single query,
    /// such as failing to build the client.
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A query line or quantity could not be understood.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file or option errors.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The target workbook is open in another application.
    ///
    /// This is reported separately so the user can close the file and retry
    /// the write with the records that were already extracted.
    #[error("Workbook is locked by another application, close it and retry: {0}")]
    WorkbookLocked(PathBuf),

    /// The workbook could not be read or written.
    #[error("Workbook error: {0}")]
    Workbook(String),
}

/// Result type alias for ChumonError.
pub type Result<T> = std::result::Result<T, ChumonError>;

/// Why a single fetch gave up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Every attempt hit a block status or a soft-block marker.
    #[error("blocked by bot protection, login wall or maintenance page")]
    BotBlocked,

    /// A non-success HTTP status that is not treated as a block.
    #[error("unexpected HTTP status {0}")]
    HttpError(u16),

    /// Every attempt timed out.
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure (DNS, TLS, reset).
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response was empty or not HTML.
    #[error("response contained no HTML content")]
    NoContent,
}

/// Why a query produced no record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The URL belongs to none of the supported sites.
    #[error("URL does not belong to a supported site")]
    UnknownSite,

    /// The page could not be retrieved.
    #[error("fetch failed: {0}")]
    FetchFailed(FetchFailure),

    /// The page was reachable but no field could be extracted.
    #[error("page was fetched but no usable product data was found")]
    NoUsableData,
}

impl Rejection {
    /// Hard failures abort a fail-fast batch. Routing misses never do.
    pub fn is_hard(&self) -> bool {
        !matches!(self, Rejection::UnknownSite)
    }
}
