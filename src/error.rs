//! Library error type.
//!
//! Everything below the CLI and the config loader returns [`OracleError`].
//! The transport layer maps variants onto HTTP status codes; the binary
//! converts them into `anyhow` errors at the edge.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("cannot read {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The chunk collection holds no documents.
    #[error("index is empty; run build first")]
    EmptyIndex,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, OracleError>;
