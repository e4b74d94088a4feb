//! Custom error types for the step runner

use common::StoreError;
use thiserror::Error;

/// Errors raised by the vendor API client
#[derive(Error, Debug)]
pub enum ApiError {
    /// The identity endpoint refused the account or password
    #[error("invalid account or password")]
    Rejected,

    /// The request could not be sent or the response could not be read
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The vendor answered with something other than the expected shape
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The vendor refused the submitted step data
    #[error("step submission refused: {0}")]
    Submission(String),
}

/// Errors raised while persisting session records
#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize session record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while acquiring a session for an account
#[derive(Error, Debug)]
pub enum SessionError {
    /// Account identifier or password is missing from configuration
    #[error("account or password is not configured")]
    MissingCredentials,

    /// The vendor explicitly rejected the credentials
    #[error("invalid account or password")]
    InvalidCredentials,

    /// Any other login failure, carrying the underlying message
    #[error("login failed: {0}")]
    LoginFailed(String),
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected => SessionError::InvalidCredentials,
            other => SessionError::LoginFailed(other.to_string()),
        }
    }
}
