//! Custom error types for the common library
//!
//! This module defines the error types raised by the session record stores.

use thiserror::Error;

/// Custom error type for record store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error occurred while reading or writing a file-backed record
    #[error("Record file error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error occurred while talking to Redis
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Stored bytes are not a readable record
    #[error("Corrupted record at {0}")]
    Corrupted(String),

    /// Record key was rejected before reaching the backend
    #[error("Invalid record key: {0}")]
    InvalidKey(String),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
