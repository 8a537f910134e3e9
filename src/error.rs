use thiserror::Error;

/// Main error type for flowkg
#[derive(Error, Debug)]
pub enum FlowkgError {
    /// The graph snapshot source could not be reached or read.
    /// The previously published snapshot stays active.
    #[error("Graph data unavailable: {0}")]
    DataUnavailable(String),

    /// No statistics have been loaded yet
    #[error("Graph is empty: no statistics loaded")]
    EmptyGraph,

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON snapshot / corpus errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using FlowkgError
pub type Result<T> = std::result::Result<T, FlowkgError>;
