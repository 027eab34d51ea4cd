use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store not initialized at {0}. Run 'jobsync init' first.")]
    NotInitialized(PathBuf),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Not a valid http(s) URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures of the save action on a job page.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("The store was reset since this page was loaded. Reload the page and try saving again.")]
    ContextInvalidated,

    #[error("Storage access failed. Reload the page and try again. ({0})")]
    Read(#[source] StoreError),

    #[error("Failed to save application: {0}")]
    Write(#[source] StoreError),
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Application #{0} not found")]
    NotFound(i64),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Unrecognized date '{0}' (try 2026-02-01 or 1 Feb 2026)")]
    InvalidDate(String),

    #[error("An application with link {0} is already saved")]
    DuplicateLink(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
