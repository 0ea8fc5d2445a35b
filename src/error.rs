use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort a merge run
#[derive(Error, Debug)]
pub enum MergeError {
    /// The recipe store could not be read, backed up or written
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The candidate batch could not be read at all
    #[error("Invalid candidate batch {}: {reason}", .path.display())]
    CandidateBatch { path: PathBuf, reason: String },

    /// The HTTP client for candidate pages could not be set up
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Builder configuration error
    #[error("Builder error: {0}")]
    BuilderError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    /// Failed to write a side output such as the video map
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed outside the store
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the on-disk recipe store.
///
/// Every variant is fatal for the run: a store that cannot be read is never
/// treated as empty, and nothing is written forward without a backup.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read store {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store is not JSON, or not an array / `{"recipes": [...]}` object
    #[error("Store {} has an invalid shape: {reason}", .path.display())]
    Shape { path: PathBuf, reason: String },

    #[error("Failed to write backup {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write store {} (backup kept at {backup}): {source}", .path.display())]
    Write {
        path: PathBuf,
        backup: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from fetching and extracting a single candidate page.
///
/// These never abort a batch; the page is dropped and reported.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Failed to fetch recipe from URL
    #[error("Failed to fetch URL: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// No extractor could find a recipe on the page
    #[error("No recipe data found on {0}")]
    NoRecipe(String),
}
